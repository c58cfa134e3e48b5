//! One-time construction of engines, models and pipelines from configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{
    AuditPipeline, DuplicateStore, ForensicsScanner, InMemoryDuplicateStore, SqliteDuplicateStore,
    VisionExtractor,
};
use crate::error::{DocsenseError, LlmError, Result};
use crate::llm::{ChatModel, OpenAiClient};
use crate::models::config::DocsenseConfig;
use crate::pipeline::DocumentPipeline;
use crate::recognition::{
    ImagePreprocessor, RecognitionAdapter, RemoteOcrEngine, TesseractEngine, TextEngine,
    TextEnhancer,
};
use crate::summary::SummaryGenerator;

/// Every external collaborator, built once at startup and shared by reference.
pub struct Engines {
    config: DocsenseConfig,
    recognizer: RecognitionAdapter,
    chat: Option<Arc<dyn ChatModel>>,
    store: Arc<dyn DuplicateStore>,
}

impl Engines {
    /// Wire engines from `config`.
    ///
    /// The remote OCR engine and the chat model are optional and only wired
    /// when their keys are set; the local engine is always wired.
    pub fn from_config(config: &DocsenseConfig) -> Result<Self> {
        let mut recognizer = RecognitionAdapter::new();

        match RemoteOcrEngine::from_config(&config.recognition) {
            Ok(remote) => recognizer = recognizer.with_primary(Arc::new(remote)),
            Err(e) => warn!("Remote OCR disabled, using the local engine only: {}", e),
        }
        recognizer = recognizer.with_fallback(local_engine(config)?);

        let chat: Option<Arc<dyn ChatModel>> = match OpenAiClient::from_config(&config.llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(LlmError::NotConfigured(reason)) => {
                info!("Generative features disabled: {}", reason);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let store: Arc<dyn DuplicateStore> = match &config.audit.store_path {
            Some(path) => Arc::new(SqliteDuplicateStore::open(path)?),
            None => Arc::new(InMemoryDuplicateStore::new()),
        };

        Ok(Self {
            config: config.clone(),
            recognizer,
            chat,
            store,
        })
    }

    /// Assemble from prebuilt parts.
    pub fn from_parts(
        config: DocsenseConfig,
        recognizer: RecognitionAdapter,
        chat: Option<Arc<dyn ChatModel>>,
        store: Arc<dyn DuplicateStore>,
    ) -> Self {
        Self {
            config,
            recognizer,
            chat,
            store,
        }
    }

    pub fn config(&self) -> &DocsenseConfig {
        &self.config
    }

    pub fn has_chat_model(&self) -> bool {
        self.chat.is_some()
    }

    /// Recognition-to-summary pipeline. Generative tiers are on only with a chat model.
    pub fn document_pipeline(&self) -> DocumentPipeline {
        let mut summarizer = SummaryGenerator::new(self.config.summary.clone());
        let mut enhancer = TextEnhancer::disabled();

        if let Some(chat) = &self.chat {
            summarizer = summarizer.with_model(chat.clone(), self.config.llm.chat_model.clone());
            if self.config.recognition.enhance_text {
                enhancer = TextEnhancer::new(
                    chat.clone(),
                    self.config.llm.chat_model.clone(),
                    self.config.summary.excerpt_length,
                );
            }
        }

        DocumentPipeline::new(self.recognizer.clone(), summarizer)
            .with_preprocessor(ImagePreprocessor::from_config(self.config.preprocess.clone()))
            .with_enhancer(enhancer)
    }

    /// Audit pipeline. Requires the vision model.
    pub fn audit_pipeline(&self) -> Result<AuditPipeline> {
        let chat = self.chat.clone().ok_or_else(|| {
            DocsenseError::Config(
                "auditing needs a vision model; set DOCSENSE_LLM_API_KEY or llm.api_key".to_string(),
            )
        })?;

        let extractor = VisionExtractor::new(
            chat,
            self.config.llm.vision_model.clone(),
            self.config.audit.vision_max_tokens,
        );

        Ok(AuditPipeline::new(extractor, self.store.clone())
            .with_forensics(ForensicsScanner::new(self.config.audit.editing_signatures.clone()))
            .with_verified_threshold(self.config.audit.verified_threshold))
    }
}

#[cfg(feature = "onnx")]
fn local_engine(config: &DocsenseConfig) -> Result<Arc<dyn TextEngine>> {
    match &config.recognition.onnx_model_dir {
        Some(dir) => Ok(Arc::new(crate::recognition::OnnxEngine::from_dir(dir)?)),
        None => Ok(Arc::new(TesseractEngine::from_config(&config.recognition))),
    }
}

#[cfg(not(feature = "onnx"))]
fn local_engine(config: &DocsenseConfig) -> Result<Arc<dyn TextEngine>> {
    if config.recognition.onnx_model_dir.is_some() {
        warn!("onnx_model_dir is set but docsense was built without the `onnx` feature");
    }
    Ok(Arc::new(TesseractEngine::from_config(&config.recognition)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn keyless() -> DocsenseConfig {
        let mut config = DocsenseConfig::default();
        config.recognition.api_key = None;
        config.llm.api_key = None;
        config
    }

    #[test]
    fn test_keyless_config_builds() {
        let engines = Engines::from_config(&keyless()).unwrap();
        assert!(!engines.has_chat_model());

        let err = engines.audit_pipeline().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_audit_available_with_model_key() {
        let mut config = keyless();
        config.llm.api_key = Some("test-key".to_string());
        config.recognition.api_key = Some("ocr-key".to_string());

        let engines = Engines::from_config(&config).unwrap();
        assert!(engines.has_chat_model());
        assert!(engines.audit_pipeline().is_ok());
    }

    #[test]
    fn test_sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = keyless();
        config.audit.store_path = Some(dir.path().join("records.db"));

        Engines::from_config(&config).unwrap();
        assert!(dir.path().join("records.db").exists());
    }
}

//! Configuration structures for the document pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the remote OCR API key.
pub const ENV_OCR_API_KEY: &str = "DOCSENSE_OCR_API_KEY";
/// Environment variable holding the chat/vision model API key.
pub const ENV_LLM_API_KEY: &str = "DOCSENSE_LLM_API_KEY";
/// Environment variable overriding the chat/vision model base URL.
pub const ENV_LLM_BASE_URL: &str = "DOCSENSE_LLM_BASE_URL";

/// Main configuration for the docsense pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsenseConfig {
    /// Image preprocessing configuration.
    pub preprocess: PreprocessConfig,

    /// Text recognition configuration.
    pub recognition: RecognitionConfig,

    /// Chat and vision model configuration.
    pub llm: LlmConfig,

    /// Summary generation configuration.
    pub summary: SummaryConfig,

    /// Authenticity audit configuration.
    pub audit: AuditConfig,
}

/// Image normalization before recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Run preprocessing at all.
    pub enabled: bool,

    /// Images narrower than this are upscaled.
    pub min_width: u32,

    /// Images wider than this are downscaled.
    pub max_width: u32,

    /// Contrast factor (1.0 = unchanged).
    pub contrast: f32,

    /// Sharpness factor (1.0 = unchanged).
    pub sharpness: f32,

    /// Brightness factor (1.0 = unchanged).
    pub brightness: f32,

    /// Gaussian sigma of the denoising blur (0 disables it).
    pub blur_sigma: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_width: 800,
            max_width: 2500,
            contrast: 1.5,
            sharpness: 1.3,
            brightness: 1.1,
            blur_sigma: 0.5,
        }
    }
}

/// Primary (remote) and fallback (local) recognition engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Remote OCR endpoint.
    pub endpoint: String,

    /// Remote OCR API key. The remote engine is skipped when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Remote OCR language code.
    pub language: String,

    /// Remote OCR engine id.
    pub engine: u8,

    /// Remote request timeout in seconds.
    pub timeout_secs: u64,

    /// Path to the tesseract binary.
    pub tesseract_path: String,

    /// Tesseract language pack(s), e.g. "ind+eng".
    pub tesseract_language: String,

    /// Local engine timeout in seconds.
    pub local_timeout_secs: u64,

    /// Run the generative typo-correction pass after recognition.
    pub enhance_text: bool,

    /// Model directory for the pure-Rust ONNX engine (feature `onnx`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onnx_model_dir: Option<PathBuf>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.ocr.space/parse/image".to_string(),
            api_key: None,
            language: "eng".to_string(),
            engine: 2,
            timeout_secs: 30,
            tesseract_path: "tesseract".to_string(),
            tesseract_language: "ind+eng".to_string(),
            local_timeout_secs: 60,
            enhance_text: false,
            onnx_model_dir: None,
        }
    }
}

/// OpenAI-compatible chat/vision endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL (the client appends `/chat/completions`).
    pub base_url: String,

    /// API key. Generative tiers are disabled and audits refuse to run without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for summaries and text enhancement.
    pub chat_model: String,

    /// Vision-capable model used by the audit.
    pub vision_model: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            chat_model: "llama-3.1-8b-instant".to_string(),
            vision_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Summary generation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Hard cap on summary length in characters.
    pub max_length: usize,

    /// Maximum characters of document text sent to the model.
    pub excerpt_length: usize,

    /// Sampling temperature for the generative tier.
    pub temperature: f32,

    /// Output token budget for the generative tier.
    pub max_tokens: u32,

    /// Minimum length of a line accepted by the heuristic fallback.
    pub min_line_length: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_length: 150,
            excerpt_length: 2000,
            temperature: 0.2,
            max_tokens: 120,
            min_line_length: 10,
        }
    }
}

/// Authenticity audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// AI confidence strictly above this yields VERIFIED.
    pub verified_threshold: u8,

    /// Output token budget for the vision extraction.
    pub vision_max_tokens: u32,

    /// SQLite file for duplicate records (in-memory when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Editing-software signatures searched in the raw image bytes.
    pub editing_signatures: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            verified_threshold: 85,
            vision_max_tokens: 1024,
            store_path: None,
            editing_signatures: crate::audit::forensics::DEFAULT_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DocsenseConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Overlay secrets from the environment (and a `.env` file, if present).
    pub fn apply_env(mut self) -> Self {
        let _ = dotenvy::dotenv();
        self.apply_vars(|name| std::env::var(name).ok());
        self
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_OCR_API_KEY) {
            self.recognition.api_key = Some(key);
        }
        if let Some(key) = non_empty(ENV_LLM_API_KEY) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_LLM_BASE_URL) {
            self.llm.base_url = url;
        }
    }
}

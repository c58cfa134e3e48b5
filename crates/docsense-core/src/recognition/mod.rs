//! Hybrid text recognition: a remote primary engine with a local fallback.

pub mod enhancer;
pub mod local;
#[cfg(feature = "onnx")]
pub mod onnx;
mod preprocessing;
pub mod remote;

pub use enhancer::TextEnhancer;
pub use local::TesseractEngine;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
pub use preprocessing::ImagePreprocessor;
pub use remote::RemoteOcrEngine;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::RecognitionError;
use crate::models::document::{EngineUsed, RawImage, RecognitionResult};

/// Text returned when every engine failed. Callers must treat it as
/// "extraction failed", never as document content.
pub const RECOGNITION_FAILED: &str = "Error: text recognition failed on all engines";

/// Prefix engines use to signal failure inside a text payload.
const ERROR_PREFIX: &str = "Error";

/// Whether `text` is the failure sentinel (or an engine's error-prefixed text).
pub fn is_error_sentinel(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_PREFIX)
}

/// Raw output of a single engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    /// Weighted per-token certainty in [0, 100], when the engine reports it.
    pub confidence: Option<f32>,
}

/// A text recognition engine.
#[async_trait]
pub trait TextEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognize text in an image. Exactly one attempt, no retries.
    async fn recognize(&self, image: &RawImage) -> Result<EngineOutput, RecognitionError>;
}

/// Average of per-token confidences weighted by token length.
///
/// Tokens are `(text, confidence)`; negative confidences are ignored.
pub fn weighted_confidence<'a>(tokens: impl IntoIterator<Item = (&'a str, f32)>) -> Option<f32> {
    let mut weighted_sum = 0.0f64;
    let mut total_weight = 0.0f64;

    for (text, confidence) in tokens {
        let weight = text.trim().chars().count() as f64;
        if confidence < 0.0 || weight == 0.0 {
            continue;
        }
        weighted_sum += confidence as f64 * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        None
    } else {
        Some((weighted_sum / total_weight) as f32)
    }
}

/// States of the recognition fallback machine.
enum RecognitionState {
    TryPrimary,
    TryFallback,
    Done(EngineUsed, EngineOutput),
    DoneWithErrorSentinel,
}

/// Runs the primary engine, then the fallback, then gives up with the sentinel.
#[derive(Clone, Default)]
pub struct RecognitionAdapter {
    primary: Option<Arc<dyn TextEngine>>,
    fallback: Option<Arc<dyn TextEngine>>,
}

impl RecognitionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary engine.
    pub fn with_primary(mut self, engine: Arc<dyn TextEngine>) -> Self {
        self.primary = Some(engine);
        self
    }

    /// Set the fallback engine.
    pub fn with_fallback(mut self, engine: Arc<dyn TextEngine>) -> Self {
        self.fallback = Some(engine);
        self
    }

    pub fn has_engines(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    /// Recognize text. Engine errors never escape; they select the next state.
    pub async fn recognize(&self, image: &RawImage) -> RecognitionResult {
        let start = Instant::now();
        let mut state = RecognitionState::TryPrimary;

        let (engine_used, output) = loop {
            state = match state {
                RecognitionState::TryPrimary => {
                    match self.attempt(self.primary.as_deref(), image).await {
                        Some(output) => RecognitionState::Done(EngineUsed::Primary, output),
                        None => RecognitionState::TryFallback,
                    }
                }
                RecognitionState::TryFallback => {
                    match self.attempt(self.fallback.as_deref(), image).await {
                        Some(output) => RecognitionState::Done(EngineUsed::Fallback, output),
                        None => RecognitionState::DoneWithErrorSentinel,
                    }
                }
                RecognitionState::Done(engine_used, output) => break (engine_used, Some(output)),
                RecognitionState::DoneWithErrorSentinel => break (EngineUsed::None, None),
            };
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match output {
            Some(output) => {
                let confidence = output.confidence.unwrap_or(0.0).clamp(0.0, 100.0);
                info!(
                    engine = ?engine_used,
                    chars = output.text.len(),
                    confidence,
                    elapsed_ms,
                    "Recognition complete"
                );
                RecognitionResult {
                    text: output.text,
                    confidence,
                    engine_used,
                    elapsed_ms,
                }
            }
            None => {
                warn!(elapsed_ms, "All recognition engines failed");
                RecognitionResult {
                    text: RECOGNITION_FAILED.to_string(),
                    confidence: 0.0,
                    engine_used: EngineUsed::None,
                    elapsed_ms,
                }
            }
        }
    }

    /// One attempt on one engine. `None` means "move on".
    async fn attempt(&self, engine: Option<&dyn TextEngine>, image: &RawImage) -> Option<EngineOutput> {
        let engine = engine?;

        match engine.recognize(image).await {
            Ok(output) if output.text.trim().is_empty() => {
                debug!("{} returned empty text", engine.name());
                None
            }
            Ok(output) if is_error_sentinel(&output.text) => {
                warn!("{} returned an error payload: {}", engine.name(), output.text.trim());
                None
            }
            Ok(mut output) => {
                output.text = output.text.trim().to_string();
                Some(output)
            }
            Err(e) => {
                warn!("{} failed: {}", engine.name(), e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEngine;
    use super::*;

    fn image() -> RawImage {
        RawImage::new(vec![1, 2, 3], "image/png")
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = FakeEngine::ok("primary", "  INVOICE 123  ", Some(91.0));
        let fallback = FakeEngine::ok("fallback", "other", Some(50.0));
        let adapter = RecognitionAdapter::new()
            .with_primary(primary.clone())
            .with_fallback(fallback.clone());

        let result = adapter.recognize(&image()).await;

        assert_eq!(result.text, "INVOICE 123");
        assert_eq!(result.engine_used, EngineUsed::Primary);
        assert_eq!(result.confidence, 91.0);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_error() {
        let primary = FakeEngine::failing("primary", "connection refused");
        let fallback = FakeEngine::ok("fallback", "RECEIPT", None);
        let adapter = RecognitionAdapter::new()
            .with_primary(primary.clone())
            .with_fallback(fallback.clone());

        let result = adapter.recognize(&image()).await;

        assert_eq!(result.text, "RECEIPT");
        assert_eq!(result.engine_used, EngineUsed::Fallback);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_after_empty_or_error_text() {
        for primary_text in ["   ", "Error: E301 image too large"] {
            let primary = FakeEngine::ok("primary", primary_text, Some(99.0));
            let fallback = FakeEngine::ok("fallback", "PURCHASE ORDER", Some(70.0));
            let adapter = RecognitionAdapter::new()
                .with_primary(primary)
                .with_fallback(fallback);

            let result = adapter.recognize(&image()).await;
            assert_eq!(result.engine_used, EngineUsed::Fallback);
            assert_eq!(result.text, "PURCHASE ORDER");
        }
    }

    #[tokio::test]
    async fn test_both_fail_yields_sentinel() {
        let primary = FakeEngine::failing("primary", "timeout");
        let fallback = FakeEngine::ok("fallback", "", Some(80.0));
        let adapter = RecognitionAdapter::new()
            .with_primary(primary.clone())
            .with_fallback(fallback.clone());

        let result = adapter.recognize(&image()).await;

        assert_eq!(result.text, RECOGNITION_FAILED);
        assert!(is_error_sentinel(&result.text));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.engine_used, EngineUsed::None);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_engines_yields_sentinel() {
        let result = RecognitionAdapter::new().recognize(&image()).await;
        assert_eq!(result.text, RECOGNITION_FAILED);
    }

    #[tokio::test]
    async fn test_confidence_clamped() {
        let adapter =
            RecognitionAdapter::new().with_primary(FakeEngine::ok("primary", "TEXT", Some(140.0)));
        assert_eq!(adapter.recognize(&image()).await.confidence, 100.0);
    }

    #[test]
    fn test_weighted_confidence() {
        let tokens = [("INVOICE", 90.0), ("No", 40.0), ("", 10.0), ("x", -1.0)];
        // (7 * 90 + 2 * 40) / 9
        let confidence = weighted_confidence(tokens).unwrap();
        assert!((confidence - 78.888_89).abs() < 0.001);

        assert_eq!(weighted_confidence([("", 50.0)]), None);
    }
}

//! Best-effort generative correction of recognition typos.

use std::sync::Arc;

use tracing::{debug, warn};

use super::is_error_sentinel;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};

const SYSTEM_PROMPT: &str = "\
You correct OCR output of business documents (invoices, delivery notes, purchase orders, receipts). \
Fix obvious character recognition mistakes (0/O, 1/l/I, 5/S, rn/m, broken words) without adding, \
removing or reordering information. Keep numbers, amounts, dates and codes exactly unless they are \
clearly misread. Return only the corrected text.";

/// Texts shorter than this are not worth a model call.
const MIN_TEXT_LENGTH: usize = 20;

/// Optional typo-correction pass. Never fails: returns the input on any problem.
pub struct TextEnhancer {
    model: Option<Arc<dyn ChatModel>>,
    model_name: String,
    max_input_chars: usize,
}

impl TextEnhancer {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>, max_input_chars: usize) -> Self {
        Self {
            model: Some(model),
            model_name: model_name.into(),
            max_input_chars,
        }
    }

    /// An enhancer that always returns its input.
    pub fn disabled() -> Self {
        Self {
            model: None,
            model_name: String::new(),
            max_input_chars: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    pub async fn enhance(&self, text: &str) -> String {
        let Some(model) = &self.model else {
            return text.to_string();
        };

        let length = text.chars().count();
        if is_error_sentinel(text) || length < MIN_TEXT_LENGTH || length > self.max_input_chars {
            return text.to_string();
        }

        let request = ChatRequest::new(
            self.model_name.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(text)],
        )
        .with_temperature(0.1)
        .with_max_tokens((self.max_input_chars / 2).max(256) as u32);

        match model.complete(&request).await {
            Ok(corrected) => {
                let corrected = corrected.trim();
                let corrected_length = corrected.chars().count();
                if corrected.is_empty() || corrected_length > length * 2 {
                    warn!("Discarding implausible enhancement ({} -> {} chars)", length, corrected_length);
                    text.to_string()
                } else {
                    debug!("Enhanced text ({} -> {} chars)", length, corrected_length);
                    corrected.to_string()
                }
            }
            Err(e) => {
                warn!("Text enhancement skipped: {}", e);
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FakeChatModel;
    use crate::recognition::RECOGNITION_FAILED;

    const OCR_TEXT: &str = "INV0ICE INV-2024-01 PT Maju Jaya";

    #[tokio::test]
    async fn test_enhancement_applied() {
        let model = Arc::new(FakeChatModel::replying("INVOICE INV-2024-01 PT Maju Jaya"));
        let enhancer = TextEnhancer::new(model.clone(), "chat", 2000);

        assert_eq!(enhancer.enhance(OCR_TEXT).await, "INVOICE INV-2024-01 PT Maju Jaya");
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_original() {
        let enhancer = TextEnhancer::new(Arc::new(FakeChatModel::failing()), "chat", 2000);
        assert_eq!(enhancer.enhance(OCR_TEXT).await, OCR_TEXT);
    }

    #[tokio::test]
    async fn test_skips_sentinel_and_short_text() {
        let model = Arc::new(FakeChatModel::replying("something else entirely"));
        let enhancer = TextEnhancer::new(model.clone(), "chat", 2000);

        assert_eq!(enhancer.enhance(RECOGNITION_FAILED).await, RECOGNITION_FAILED);
        assert_eq!(enhancer.enhance("TOTAL 5").await, "TOTAL 5");
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_runaway_output() {
        let model = Arc::new(FakeChatModel::replying(&"x".repeat(500)));
        let enhancer = TextEnhancer::new(model, "chat", 2000);
        assert_eq!(enhancer.enhance(OCR_TEXT).await, OCR_TEXT);
    }

    #[tokio::test]
    async fn test_disabled() {
        assert_eq!(TextEnhancer::disabled().enhance(OCR_TEXT).await, OCR_TEXT);
    }
}

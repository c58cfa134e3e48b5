//! Bounded-length document summaries.
//!
//! Three tiers, first success wins:
//! 1. a per-type template filled from the extracted fields,
//! 2. a generative model call,
//! 3. a line scan of the raw text, ending in a generic message.

pub mod postprocess;
pub mod prompt;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::classifier::contains_indicator;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::config::SummaryConfig;
use crate::models::document::{DocumentType, ExtractedFields, Summary, SummarySource};
use crate::recognition::is_error_sentinel;

pub use postprocess::truncate;

/// Returned when nothing in the document is usable.
pub const GENERIC_SUMMARY: &str = "Dokumen terdeteksi - perlu verifikasi manual";

/// Leading word plus `(prefix, field)` segments. Absent fields drop their segment.
type Template = (&'static str, &'static [(&'static str, &'static str)]);

fn template_for(document_type: DocumentType) -> Option<Template> {
    match document_type {
        DocumentType::Invoice => Some((
            "Invoice",
            &[("", "invoice_number"), ("dari ", "vendor"), ("Rp ", "total_amount"), ("tanggal ", "date")],
        )),
        DocumentType::DeliveryNote => Some((
            "Surat jalan",
            &[("", "delivery_number"), ("dari ", "vendor"), ("untuk ", "recipient"), ("tanggal ", "date")],
        )),
        DocumentType::PurchaseOrder => Some((
            "Purchase order",
            &[("", "po_number"), ("ke ", "vendor"), ("Rp ", "total_amount"), ("tanggal ", "date")],
        )),
        DocumentType::Receipt => Some((
            "Kwitansi",
            &[("", "receipt_number"), ("dari ", "vendor"), ("Rp ", "total_amount"), ("tanggal ", "date")],
        )),
        DocumentType::Unknown => None,
    }
}

/// Produces a [`Summary`] no longer than `config.max_length` characters.
pub struct SummaryGenerator {
    config: SummaryConfig,
    model: Option<Arc<dyn ChatModel>>,
    model_name: String,
}

impl SummaryGenerator {
    /// Generator without the generative tier.
    pub fn new(config: SummaryConfig) -> Self {
        Self {
            config,
            model: None,
            model_name: String::new(),
        }
    }

    /// Enable the generative tier.
    pub fn with_model(mut self, model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        self.model = Some(model);
        self.model_name = model_name.into();
        self
    }

    pub async fn generate(
        &self,
        text: &str,
        document_type: DocumentType,
        fields: &ExtractedFields,
    ) -> Summary {
        if let Some(text) = self.rule_based(document_type, fields) {
            debug!("Summary from template");
            return Summary {
                text,
                source: SummarySource::Rule,
            };
        }

        let readable = !text.trim().is_empty() && !is_error_sentinel(text);
        if readable {
            if let Some(text) = self.generative(text, document_type, fields).await {
                debug!("Summary from model");
                return Summary {
                    text,
                    source: SummarySource::Generative,
                };
            }
        }

        Summary {
            text: self.heuristic(text),
            source: SummarySource::Fallback,
        }
    }

    /// Template tier. `None` for unknown documents or when no template field is present.
    pub fn rule_based(&self, document_type: DocumentType, fields: &ExtractedFields) -> Option<String> {
        if fields.is_empty() {
            return None;
        }
        let (head, segments) = template_for(document_type)?;

        let parts: Vec<String> = segments
            .iter()
            .filter_map(|(prefix, field)| fields.get(field).map(|v| format!("{}{}", prefix, v)))
            .collect();
        if parts.is_empty() {
            return None;
        }

        let sentence = format!("{} {}", head, parts.join(" "));
        Some(truncate(&sentence, self.config.max_length))
    }

    async fn generative(
        &self,
        text: &str,
        document_type: DocumentType,
        fields: &ExtractedFields,
    ) -> Option<String> {
        let model = self.model.as_ref()?;

        let request = ChatRequest::new(
            self.model_name.clone(),
            vec![
                ChatMessage::system(prompt::system_prompt(document_type, self.config.max_length)),
                ChatMessage::user(prompt::user_content(text, fields, self.config.excerpt_length)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        match model.complete(&request).await {
            Ok(output) => {
                let cleaned = postprocess::clean_generated(&output, self.config.max_length);
                if cleaned.is_empty() || is_error_sentinel(&cleaned) {
                    warn!("Discarding unusable generated summary");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(e) => {
                warn!("Generative summary failed: {}", e);
                None
            }
        }
    }

    /// Line-scan tier: the first line naming a document type, else the first
    /// meaningful line, else [`GENERIC_SUMMARY`].
    pub fn heuristic(&self, text: &str) -> String {
        if is_error_sentinel(text) {
            return truncate(GENERIC_SUMMARY, self.config.max_length);
        }

        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let line = lines
            .iter()
            .find(|line| contains_indicator(line))
            .or_else(|| lines.iter().find(|line| self.is_meaningful(line)));

        match line {
            Some(line) => truncate(line, self.config.max_length),
            None => truncate(GENERIC_SUMMARY, self.config.max_length),
        }
    }

    fn is_meaningful(&self, line: &str) -> bool {
        let purely_numeric = line
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c.is_ascii_punctuation());
        line.chars().count() > self.config.min_line_length && !purely_numeric
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::llm::testing::FakeChatModel;
    use crate::recognition::RECOGNITION_FAILED;

    fn invoice_fields() -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        fields.insert("invoice_number", "INV-2024-01");
        fields.insert("vendor", "PT Maju Jaya");
        fields.insert("total_amount", "1.500.000");
        fields.insert("date", "15/12/2024");
        fields
    }

    #[tokio::test]
    async fn test_rule_tier_fills_template() {
        let generator = SummaryGenerator::new(SummaryConfig::default());
        let summary = generator
            .generate("ignored", DocumentType::Invoice, &invoice_fields())
            .await;

        assert_eq!(summary.source, SummarySource::Rule);
        assert_eq!(
            summary.text,
            "Invoice INV-2024-01 dari PT Maju Jaya Rp 1.500.000 tanggal 15/12/2024"
        );
    }

    #[test]
    fn test_rule_tier_omits_absent_segments() {
        let generator = SummaryGenerator::new(SummaryConfig::default());
        let mut fields = ExtractedFields::new();
        fields.insert("receipt_number", "KW-77");
        fields.insert("date", "10/03/2025");

        assert_eq!(
            generator.rule_based(DocumentType::Receipt, &fields).as_deref(),
            Some("Kwitansi KW-77 tanggal 10/03/2025")
        );
        assert_eq!(generator.rule_based(DocumentType::Unknown, &fields), None);

        // Only non-template fields present.
        let mut fields = ExtractedFields::new();
        fields.insert("subtotal", "100.000");
        assert_eq!(generator.rule_based(DocumentType::Invoice, &fields), None);
    }

    #[test]
    fn test_rule_tier_respects_cap() {
        let config = SummaryConfig {
            max_length: 30,
            ..SummaryConfig::default()
        };
        let text = SummaryGenerator::new(config)
            .rule_based(DocumentType::Invoice, &invoice_fields())
            .unwrap();
        assert!(text.chars().count() <= 30);
        assert!(text.ends_with("..."));
    }

    #[tokio::test]
    async fn test_generative_tier() {
        let model = Arc::new(FakeChatModel::replying("\"Memo pembayaran dari PT Abc\""));
        let generator =
            SummaryGenerator::new(SummaryConfig::default()).with_model(model.clone(), "chat");

        let summary = generator
            .generate("MEMO\nPembayaran PT Abc", DocumentType::Unknown, &ExtractedFields::new())
            .await;

        assert_eq!(summary.source, SummarySource::Generative);
        assert_eq!(summary.text, "Memo pembayaran dari PT Abc");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "chat");
        assert_eq!(requests[0].max_tokens, 120);
        assert!(requests[0].messages[1].text().contains("Pembayaran PT Abc"));
    }

    #[tokio::test]
    async fn test_generative_output_capped() {
        let model = Arc::new(FakeChatModel::replying(&"kata ".repeat(100)));
        let generator = SummaryGenerator::new(SummaryConfig::default()).with_model(model, "chat");

        let summary = generator
            .generate("some readable text", DocumentType::Unknown, &ExtractedFields::new())
            .await;
        assert_eq!(summary.source, SummarySource::Generative);
        assert!(summary.text.chars().count() <= 150);
    }

    #[tokio::test]
    async fn test_generative_failure_falls_to_heuristic() {
        let generator = SummaryGenerator::new(SummaryConfig::default())
            .with_model(Arc::new(FakeChatModel::failing()), "chat");

        let summary = generator
            .generate("12/12\nRingkasan rapat bulanan\nlain", DocumentType::Unknown, &ExtractedFields::new())
            .await;

        assert_eq!(summary.source, SummarySource::Fallback);
        assert_eq!(summary.text, "Ringkasan rapat bulanan");
    }

    #[tokio::test]
    async fn test_empty_generation_falls_through() {
        let generator = SummaryGenerator::new(SummaryConfig::default())
            .with_model(Arc::new(FakeChatModel::replying("  \"\"  ")), "chat");

        let summary = generator
            .generate("Nota\n123", DocumentType::Receipt, &ExtractedFields::new())
            .await;
        assert_eq!(summary.source, SummarySource::Fallback);
        assert_eq!(summary.text, "Nota");
    }

    #[tokio::test]
    async fn test_sentinel_reaches_generic_message() {
        let model = Arc::new(FakeChatModel::replying("should not be used"));
        let generator =
            SummaryGenerator::new(SummaryConfig::default()).with_model(model.clone(), "chat");

        let summary = generator
            .generate(RECOGNITION_FAILED, DocumentType::Unknown, &ExtractedFields::new())
            .await;

        assert_eq!(summary.source, SummarySource::Fallback);
        assert_eq!(summary.text, GENERIC_SUMMARY);
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_generic_message_respects_small_cap() {
        let generator = SummaryGenerator::new(SummaryConfig {
            max_length: 20,
            ..SummaryConfig::default()
        });

        let summary = generator
            .generate(RECOGNITION_FAILED, DocumentType::Unknown, &ExtractedFields::new())
            .await;

        assert_eq!(summary.source, SummarySource::Fallback);
        assert!(summary.text.chars().count() <= 20);
        assert!(summary.text.starts_with("Dokumen"));
        assert!(summary.text.ends_with("..."));
    }

    #[test]
    fn test_heuristic_prefers_indicator_lines() {
        let generator = SummaryGenerator::new(SummaryConfig::default());

        assert_eq!(
            generator.heuristic("Jl. Sudirman No. 5 Jakarta\nSURAT JALAN"),
            "SURAT JALAN"
        );
        assert_eq!(generator.heuristic("Jl. Sudirman No. 5 Jakarta"), "Jl. Sudirman No. 5 Jakarta");
        assert_eq!(generator.heuristic("123.456,00\n\n  short  "), GENERIC_SUMMARY);
        assert_eq!(generator.heuristic(""), GENERIC_SUMMARY);
    }
}

//! Structured extraction of invoice data with a vision model.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::AuditError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::audit::AiExtraction;
use crate::models::document::RawImage;

/// Placeholder for text fields the model left out.
pub const UNKNOWN: &str = "UNKNOWN";

const SYSTEM_PROMPT: &str = "\
You are a forensic accountant auditing scanned invoices for fraud. Read the document image and \
report exactly what it states. Look for signs of fraud: a date in the future, subtotal plus tax \
not equal to the grand total, blurred or overwritten prices, inconsistent fonts, a generic or \
suspicious vendor name, missing tax identifiers.
Respond with a single JSON object and nothing else, using this schema:
{
  \"invoice_number\": string,
  \"vendor_name\": string,
  \"date\": \"YYYY-MM-DD\",
  \"subtotal\": number,
  \"tax\": number,
  \"grand_total\": number,
  \"confidence_score\": integer 0-100 (how sure you are the document is authentic and read correctly),
  \"fraud_indicators\": [string]
}
Use null for anything you cannot read. Amounts are plain numbers without currency or separators.";

const USER_PROMPT: &str = "Audit this document and return the JSON object.";

/// Sends the document image to a vision model and parses the answer.
pub struct VisionExtractor {
    model: Arc<dyn ChatModel>,
    model_name: String,
    max_tokens: u32,
}

impl VisionExtractor {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            max_tokens,
        }
    }

    /// One model call. Call failures and malformed answers are both fatal.
    pub async fn extract(&self, image: &RawImage) -> Result<AiExtraction, AuditError> {
        let request = ChatRequest::new(
            self.model_name.clone(),
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user_with_image(USER_PROMPT, image),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(self.max_tokens)
        .with_json_response();

        let content = self.model.complete(&request).await?;
        debug!(chars = content.len(), "Vision model answered");

        parse_extraction(&content, chrono::Local::now().date_naive())
    }
}

/// Lenient view of the schema; every field may be missing or null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtraction {
    invoice_number: Value,
    vendor_name: Value,
    date: Value,
    subtotal: Value,
    tax: Value,
    grand_total: Value,
    confidence_score: Value,
    fraud_indicators: Value,
}

/// Parse the model answer, filling gaps with `UNKNOWN`, zero and `today`.
pub fn parse_extraction(content: &str, today: NaiveDate) -> Result<AiExtraction, AuditError> {
    let json = strip_code_fence(content);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AuditError::MalformedExtraction(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AuditError::MalformedExtraction("expected a JSON object".to_string()));
    }

    let raw: RawExtraction = serde_json::from_value(value)
        .map_err(|e| AuditError::MalformedExtraction(e.to_string()))?;

    Ok(AiExtraction {
        invoice_number: text_or(&raw.invoice_number, UNKNOWN),
        vendor_name: text_or(&raw.vendor_name, UNKNOWN),
        date: text_or(&raw.date, &today.format("%Y-%m-%d").to_string()),
        subtotal: amount(&raw.subtotal, "subtotal")?,
        tax: amount(&raw.tax, "tax")?,
        grand_total: amount(&raw.grand_total, "grand_total")?,
        confidence_score: confidence(&raw.confidence_score)?,
        fraud_indicators: indicators(&raw.fraud_indicators)?,
    })
}

/// Drop a surrounding Markdown code fence and any prose around the object.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn text_or(value: &Value, default: &str) -> String {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}

fn amount(value: &Value, field: &str) -> Result<Decimal, AuditError> {
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .map_err(|e| AuditError::MalformedExtraction(format!("{}: {}", field, e)))
        }
        Value::String(s) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Value::String(s) => parse_amount_text(s)
            .ok_or_else(|| AuditError::MalformedExtraction(format!("{}: not an amount: {:?}", field, s))),
        other => Err(AuditError::MalformedExtraction(format!(
            "{}: expected a number, got {}",
            field, other
        ))),
    }
}

/// Parse amounts written for humans: `Rp 1.500.000`, `1,500,000.00`, `1.234,56`.
pub fn parse_amount_text(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .trim_start_matches(|c: char| c.is_alphabetic() || c == '.' || c.is_whitespace())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = match (last_dot, last_comma) {
        // Both present: the later one is the decimal separator.
        (Some(dot), Some(comma)) if dot > comma => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (Some(_), None) if is_thousands_grouped(&cleaned, '.') => cleaned.replace('.', ""),
        (None, Some(_)) if is_thousands_grouped(&cleaned, ',') => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// `1.500.000` style: every group after the first has exactly three digits.
fn is_thousands_grouped(text: &str, separator: char) -> bool {
    let mut groups = text.split(separator);
    let first_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()));
    let rest: Vec<&str> = groups.collect();
    first_ok && !rest.is_empty() && rest.iter().all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

fn confidence(value: &Value) -> Result<u8, AuditError> {
    let score = match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|_| AuditError::MalformedExtraction(format!("confidence_score: {:?}", s)))?,
        other => {
            return Err(AuditError::MalformedExtraction(format!(
                "confidence_score: expected a number, got {}",
                other
            )))
        }
    };
    Ok(score.clamp(0.0, 100.0).round() as u8)
}

fn indicators(value: &Value) -> Result<Vec<String>, AuditError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.trim().to_string()]),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect()),
        other => Err(AuditError::MalformedExtraction(format!(
            "fraud_indicators: expected a list, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::FakeChatModel;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    #[test]
    fn test_full_extraction() {
        let content = r#"{
            "invoice_number": "INV-2024-01",
            "vendor_name": "PT Maju Jaya",
            "date": "2024-12-15",
            "subtotal": 100000,
            "tax": 11000.5,
            "grand_total": "Rp 111.000,50",
            "confidence_score": 91.6,
            "fraud_indicators": ["future date"]
        }"#;

        let extraction = parse_extraction(content, today()).unwrap();
        assert_eq!(extraction.invoice_number, "INV-2024-01");
        assert_eq!(extraction.vendor_name, "PT Maju Jaya");
        assert_eq!(extraction.date, "2024-12-15");
        assert_eq!(extraction.subtotal, Decimal::from(100_000));
        assert_eq!(extraction.tax, Decimal::new(110005, 1));
        assert_eq!(extraction.grand_total, Decimal::new(11100050, 2));
        assert_eq!(extraction.confidence_score, 92);
        assert_eq!(extraction.fraud_indicators, vec!["future date".to_string()]);
    }

    #[test]
    fn test_missing_fields_defaulted() {
        let content = "```json\n{\"invoice_number\": null, \"confidence_score\": 150}\n```";
        let extraction = parse_extraction(content, today()).unwrap();

        assert_eq!(extraction.invoice_number, UNKNOWN);
        assert_eq!(extraction.vendor_name, UNKNOWN);
        assert_eq!(extraction.date, "2025-01-20");
        assert_eq!(extraction.subtotal, Decimal::ZERO);
        assert_eq!(extraction.grand_total, Decimal::ZERO);
        assert_eq!(extraction.confidence_score, 100);
        assert!(extraction.fraud_indicators.is_empty());
    }

    #[test]
    fn test_malformed_answers_rejected() {
        for content in [
            "I could not read the image",
            "[1, 2, 3]",
            r#"{"grand_total": "about a million"}"#,
            r#"{"subtotal": {"value": 5}}"#,
            r#"{"fraud_indicators": 3}"#,
        ] {
            assert!(
                matches!(parse_extraction(content, today()), Err(AuditError::MalformedExtraction(_))),
                "{}",
                content
            );
        }
    }

    #[test]
    fn test_parse_amount_text() {
        assert_eq!(parse_amount_text("Rp 1.500.000"), Some(Decimal::from(1_500_000)));
        assert_eq!(parse_amount_text("Rp. 1.500.000"), Some(Decimal::from(1_500_000)));
        assert_eq!(parse_amount_text("1,500,000.00"), Some(Decimal::from(1_500_000)));
        assert_eq!(parse_amount_text("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount_text("12,5"), Some(Decimal::new(125, 1)));
        assert_eq!(parse_amount_text("99.95"), Some(Decimal::new(9995, 2)));
        assert_eq!(parse_amount_text("IDR"), None);
        assert_eq!(parse_amount_text("n/a"), None);
    }

    #[tokio::test]
    async fn test_extract_sends_image_and_json_mode() {
        let model = Arc::new(FakeChatModel::replying(r#"{"invoice_number": "A-1"}"#));
        let extractor = VisionExtractor::new(model.clone(), "vision", 512);

        let image = RawImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");
        let extraction = extractor.extract(&image).await.unwrap();
        assert_eq!(extraction.invoice_number, "A-1");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].model, "vision");
        assert!(requests[0].json_response);
        assert_eq!(requests[0].max_tokens, 512);
        let body = serde_json::to_value(&requests[0].messages[1]).unwrap();
        assert_eq!(body["content"][1]["image_url"]["url"], "data:image/jpeg;base64,/9j/");
    }

    #[tokio::test]
    async fn test_call_failure_is_fatal() {
        let extractor = VisionExtractor::new(Arc::new(FakeChatModel::failing()), "vision", 512);
        let image = RawImage::new(vec![1], "image/png");

        assert!(matches!(
            extractor.extract(&image).await,
            Err(AuditError::Extraction(LlmError::Status { status: 503, .. }))
        ));
    }
}

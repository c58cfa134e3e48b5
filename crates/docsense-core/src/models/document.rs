//! Document recognition data model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw image as received from the caller.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,

    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Build from bytes, sniffing the MIME type from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self { bytes, mime_type }
    }

    /// Read an image file from disk.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/tiff" => "tiff",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Which recognition engine produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineUsed {
    Primary,
    Fallback,
    None,
}

/// Outcome of the text recognition adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Recognized text, or the error sentinel.
    pub text: String,

    /// Confidence in [0, 100].
    pub confidence: f32,

    /// Engine that produced the text.
    pub engine_used: EngineUsed,

    /// Wall-clock time spent in recognition.
    pub elapsed_ms: u64,
}

/// Closed vocabulary of business document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    DeliveryNote,
    PurchaseOrder,
    Receipt,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::DeliveryNote => "delivery_note",
            Self::PurchaseOrder => "purchase_order",
            Self::Receipt => "receipt",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::DeliveryNote => "Delivery note",
            Self::PurchaseOrder => "Purchase order",
            Self::Receipt => "Receipt",
            Self::Unknown => "Document",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted key/value fields. A key is present only when a pattern matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields(BTreeMap<String, String>);

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Which summary tier produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Rule,
    Generative,
    Fallback,
}

/// A bounded-length descriptive sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub source: SummarySource,
}

/// Result of `recognize_and_summarize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub raw_text: String,
    pub confidence: f32,
    pub engine_used: EngineUsed,
    pub document_type: DocumentType,
    pub extracted_fields: ExtractedFields,
    pub summary: Summary,
    pub processing_time_ms: u64,
}

//! Authenticity audit data model.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Final ranked verdict of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Tampered,
    Duplicate,
    InvalidMath,
    Verified,
    Suspicious,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tampered => "TAMPERED",
            Self::Duplicate => "DUPLICATE",
            Self::InvalidMath => "INVALID_MATH",
            Self::Verified => "VERIFIED",
            Self::Suspicious => "SUSPICIOUS",
        };
        f.write_str(s)
    }
}

/// Named states of the audit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStage {
    Init,
    Forensics,
    AiExtraction,
    DuplicateCheck,
    MathValidation,
    Final,
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Forensics => "FORENSICS",
            Self::AiExtraction => "AI_EXTRACTION",
            Self::DuplicateCheck => "DUPLICATE_CHECK",
            Self::MathValidation => "MATH_VALIDATION",
            Self::Final => "FINAL",
        };
        f.write_str(s)
    }
}

/// Severity of a log-trail entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One progressive-reporting entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub stage: AuditStage,
    pub message: String,
    pub severity: Severity,
}

/// Output of the byte-signature forensics scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForensicsReport {
    pub is_manipulated: bool,
    pub findings: Vec<String>,
}

/// Structured data the vision model read off the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiExtraction {
    pub invoice_number: String,
    pub vendor_name: String,
    pub date: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
    /// Self-reported confidence in [0, 100].
    pub confidence_score: u8,
    pub fraud_indicators: Vec<String>,
}

/// Arithmetic check `subtotal + tax == grand_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathValidation {
    pub is_valid: bool,
    /// `subtotal + tax`, rounded to 2 places.
    pub expected: Decimal,
    /// Reported grand total, rounded to 2 places.
    pub actual: Decimal,
    /// Absolute difference.
    pub delta: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the duplicate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// The lookup store could not be reached.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_created_at: Option<DateTime<Utc>>,
}

/// Persisted fingerprint of an audited document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub invoice_number: String,
    pub vendor_name: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// The ranked outcome of `audit_document`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub status: AuditStatus,
    /// Confidence in [0, 100].
    pub score: u8,
    pub findings: Vec<String>,
    pub extracted_data: AiExtraction,
    pub math_validation: MathValidation,
    pub is_duplicate: bool,
    pub log_trail: Vec<LogEntry>,
}

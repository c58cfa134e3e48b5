//! The audit state machine.
//!
//! `INIT -> FORENSICS -> AI_EXTRACTION -> DUPLICATE_CHECK -> MATH_VALIDATION -> FINAL`
//!
//! Each transition appends log entries; they are mirrored to `tracing` and,
//! when a progress channel is given, sent as they happen.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::duplicate::DuplicateStore;
use super::forensics::ForensicsScanner;
use super::math;
use super::vision::VisionExtractor;
use crate::error::AuditError;
use crate::models::audit::*;
use crate::models::document::RawImage;

/// Confidence strictly above this is `VERIFIED` when nothing else fired.
pub const DEFAULT_VERIFIED_THRESHOLD: u8 = 85;

enum AuditState {
    Init,
    Forensics,
    AiExtraction {
        forensics: ForensicsReport,
    },
    DuplicateCheck {
        forensics: ForensicsReport,
        extraction: AiExtraction,
    },
    MathValidation {
        forensics: ForensicsReport,
        extraction: AiExtraction,
        duplicate: DuplicateCheck,
    },
    Final {
        forensics: ForensicsReport,
        extraction: AiExtraction,
        duplicate: DuplicateCheck,
        math: MathValidation,
    },
}

/// Collects the log trail and forwards entries to listeners.
struct Trail {
    entries: Vec<LogEntry>,
    progress: Option<UnboundedSender<LogEntry>>,
}

impl Trail {
    fn push(&mut self, stage: AuditStage, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry {
            stage,
            message: message.into(),
            severity,
        };

        match severity {
            Severity::Error | Severity::Warning => warn!(stage = %stage, "{}", entry.message),
            Severity::Info | Severity::Success => info!(stage = %stage, "{}", entry.message),
        }

        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = progress.send(entry.clone());
        }
        self.entries.push(entry);
    }
}

/// Resolve the verdict by strict priority:
/// tampered, duplicate, invalid math, verified, suspicious.
pub fn resolve_status(
    forensics: &ForensicsReport,
    duplicate: &DuplicateCheck,
    math: &MathValidation,
    confidence: u8,
    verified_threshold: u8,
) -> AuditStatus {
    if forensics.is_manipulated {
        AuditStatus::Tampered
    } else if duplicate.is_duplicate {
        AuditStatus::Duplicate
    } else if !math.is_valid {
        AuditStatus::InvalidMath
    } else if confidence > verified_threshold {
        AuditStatus::Verified
    } else {
        AuditStatus::Suspicious
    }
}

/// Four-stage authenticity audit over raw image bytes.
pub struct AuditPipeline {
    forensics: ForensicsScanner,
    extractor: VisionExtractor,
    store: Arc<dyn DuplicateStore>,
    verified_threshold: u8,
}

impl AuditPipeline {
    pub fn new(extractor: VisionExtractor, store: Arc<dyn DuplicateStore>) -> Self {
        Self {
            forensics: ForensicsScanner::default(),
            extractor,
            store,
            verified_threshold: DEFAULT_VERIFIED_THRESHOLD,
        }
    }

    pub fn with_forensics(mut self, forensics: ForensicsScanner) -> Self {
        self.forensics = forensics;
        self
    }

    pub fn with_verified_threshold(mut self, threshold: u8) -> Self {
        self.verified_threshold = threshold;
        self
    }

    /// Audit a document. Only the AI extraction stage can fail the audit.
    pub async fn audit_document(
        &self,
        image: &RawImage,
        user_id: Option<&str>,
    ) -> Result<AuditVerdict, AuditError> {
        self.audit_with_progress(image, user_id, None).await
    }

    /// Like [`audit_document`](Self::audit_document), streaming each log
    /// entry to `progress` as soon as it is recorded.
    pub async fn audit_with_progress(
        &self,
        image: &RawImage,
        user_id: Option<&str>,
        progress: Option<UnboundedSender<LogEntry>>,
    ) -> Result<AuditVerdict, AuditError> {
        let start = Instant::now();
        let mut trail = Trail {
            entries: Vec::new(),
            progress,
        };
        let mut state = AuditState::Init;

        loop {
            state = match state {
                AuditState::Init => {
                    trail.push(
                        AuditStage::Init,
                        Severity::Info,
                        format!("Audit started ({} bytes, {})", image.bytes.len(), image.mime_type),
                    );
                    AuditState::Forensics
                }

                AuditState::Forensics => {
                    let forensics = self.forensics.scan(&image.bytes);
                    if forensics.is_manipulated {
                        for finding in &forensics.findings {
                            trail.push(AuditStage::Forensics, Severity::Error, finding.clone());
                        }
                    } else if forensics.findings.is_empty() {
                        trail.push(
                            AuditStage::Forensics,
                            Severity::Success,
                            "No editing software signatures found",
                        );
                    } else {
                        for finding in &forensics.findings {
                            trail.push(AuditStage::Forensics, Severity::Warning, finding.clone());
                        }
                    }
                    AuditState::AiExtraction { forensics }
                }

                AuditState::AiExtraction { forensics } => {
                    trail.push(
                        AuditStage::AiExtraction,
                        Severity::Info,
                        "Reading document with vision model",
                    );

                    let extraction = match self.extractor.extract(image).await {
                        Ok(extraction) => extraction,
                        Err(e) => {
                            trail.push(AuditStage::AiExtraction, Severity::Error, e.to_string());
                            error!(elapsed_ms = start.elapsed().as_millis() as u64, "Audit aborted: {}", e);
                            return Err(e);
                        }
                    };

                    trail.push(
                        AuditStage::AiExtraction,
                        Severity::Success,
                        format!(
                            "Invoice {} from {}, total {}, confidence {}%",
                            extraction.invoice_number,
                            extraction.vendor_name,
                            extraction.grand_total,
                            extraction.confidence_score
                        ),
                    );
                    if !extraction.fraud_indicators.is_empty() {
                        trail.push(
                            AuditStage::AiExtraction,
                            Severity::Warning,
                            format!(
                                "Model reported fraud indicators: {}",
                                extraction.fraud_indicators.join("; ")
                            ),
                        );
                    }
                    AuditState::DuplicateCheck {
                        forensics,
                        extraction,
                    }
                }

                AuditState::DuplicateCheck {
                    forensics,
                    extraction,
                } => {
                    let duplicate = self.check_duplicate(&extraction, &mut trail).await;
                    AuditState::MathValidation {
                        forensics,
                        extraction,
                        duplicate,
                    }
                }

                AuditState::MathValidation {
                    forensics,
                    extraction,
                    duplicate,
                } => {
                    let math = math::validate(extraction.subtotal, extraction.tax, extraction.grand_total);
                    match &math.error {
                        Some(message) => trail.push(AuditStage::MathValidation, Severity::Error, message.clone()),
                        None => trail.push(
                            AuditStage::MathValidation,
                            Severity::Success,
                            format!("Subtotal + tax matches grand total ({:.2})", math.actual),
                        ),
                    }
                    AuditState::Final {
                        forensics,
                        extraction,
                        duplicate,
                        math,
                    }
                }

                AuditState::Final {
                    forensics,
                    extraction,
                    duplicate,
                    math,
                } => {
                    let status = resolve_status(
                        &forensics,
                        &duplicate,
                        &math,
                        extraction.confidence_score,
                        self.verified_threshold,
                    );

                    if !duplicate.is_duplicate && !duplicate.degraded {
                        self.persist(&extraction, user_id, &mut trail).await;
                    }

                    let mut findings = forensics.findings;
                    findings.extend(extraction.fraud_indicators.iter().cloned());
                    findings.extend(math.error.iter().cloned());

                    let score = extraction.confidence_score.min(100);
                    let severity = match status {
                        AuditStatus::Verified => Severity::Success,
                        AuditStatus::Suspicious => Severity::Warning,
                        _ => Severity::Error,
                    };
                    trail.push(
                        AuditStage::Final,
                        severity,
                        format!("Verdict: {} (score {})", status, score),
                    );
                    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Audit complete");

                    return Ok(AuditVerdict {
                        status,
                        score,
                        findings,
                        extracted_data: extraction,
                        math_validation: math,
                        is_duplicate: duplicate.is_duplicate,
                        log_trail: trail.entries,
                    });
                }
            };
        }
    }

    /// Exact-key lookup. An unreachable store degrades to "not duplicate".
    async fn check_duplicate(&self, extraction: &AiExtraction, trail: &mut Trail) -> DuplicateCheck {
        let lookup = self
            .store
            .find_by_key(
                &extraction.invoice_number,
                &extraction.vendor_name,
                extraction.grand_total,
            )
            .await;

        match lookup {
            Ok(Some(record)) => {
                trail.push(
                    AuditStage::DuplicateCheck,
                    Severity::Error,
                    format!(
                        "Document already submitted on {}",
                        record.created_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                );
                DuplicateCheck {
                    is_duplicate: true,
                    degraded: false,
                    original_created_at: Some(record.created_at),
                }
            }
            Ok(None) => {
                trail.push(
                    AuditStage::DuplicateCheck,
                    Severity::Success,
                    "No previous submission found",
                );
                DuplicateCheck {
                    is_duplicate: false,
                    degraded: false,
                    original_created_at: None,
                }
            }
            Err(e) => {
                trail.push(
                    AuditStage::DuplicateCheck,
                    Severity::Warning,
                    format!("Duplicate store unavailable, assuming not duplicate: {}", e),
                );
                DuplicateCheck {
                    is_duplicate: false,
                    degraded: true,
                    original_created_at: None,
                }
            }
        }
    }

    async fn persist(&self, extraction: &AiExtraction, user_id: Option<&str>, trail: &mut Trail) {
        let record = DuplicateRecord {
            invoice_number: extraction.invoice_number.clone(),
            vendor_name: extraction.vendor_name.clone(),
            total_amount: extraction.grand_total,
            created_at: Utc::now(),
            user_id: user_id.map(str::to_string),
        };

        if let Err(e) = self.store.insert(&record).await {
            trail.push(
                AuditStage::Final,
                Severity::Warning,
                format!("Could not record document for duplicate detection: {}", e),
            );
        }
    }
}

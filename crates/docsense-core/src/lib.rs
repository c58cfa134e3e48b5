//! Core library for business document intelligence and authenticity audits.
//!
//! This crate provides:
//! - Image normalization and hybrid text recognition (remote service with a
//!   local tesseract fallback)
//! - Document classification and field extraction for invoices, delivery
//!   notes, purchase orders and receipts
//! - Bounded-length summaries (template, generative model, line scan)
//! - A four-stage authenticity audit yielding a ranked verdict

pub mod audit;
pub mod document;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod recognition;
pub mod summary;

pub use audit::{AuditPipeline, DuplicateStore};
pub use document::{DocumentClassifier, FieldExtractor};
pub use engine::Engines;
pub use error::{DocsenseError, ErrorKind, ErrorReport, Result};
pub use jobs::{JobId, JobQueue, JobStatus};
pub use models::audit::{AuditStatus, AuditVerdict, LogEntry, Severity};
pub use models::config::DocsenseConfig;
pub use models::document::{DocumentReport, DocumentType, RawImage, RecognitionResult};
pub use pipeline::DocumentPipeline;
pub use recognition::{RecognitionAdapter, TextEngine, RECOGNITION_FAILED};
pub use summary::SummaryGenerator;

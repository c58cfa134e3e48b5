//! Error types for the docsense-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the docsense library.
#[derive(Error, Debug)]
pub enum DocsenseError {
    /// A required engine or model is not configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// Text recognition error.
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Language or vision model error.
    #[error("model error: {0}")]
    Llm(#[from] LlmError),

    /// Audit pipeline error.
    #[error("audit failed: {0}")]
    Audit(#[from] AuditError),

    /// Duplicate-record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a text recognition engine.
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The engine binary or service is not available.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Network failure talking to a remote engine.
    #[error("request failed: {0}")]
    Request(String),

    /// The engine did not answer in time.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The engine reported a processing error.
    #[error("engine reported an error: {0}")]
    Engine(String),

    /// The engine answered with something we could not read.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The engine ran but produced no text.
    #[error("no text recognized")]
    Empty,
}

/// Errors raised by the chat/vision model client.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key or endpoint configured.
    #[error("model client not configured: {0}")]
    NotConfigured(String),

    /// Could not reach the model endpoint.
    #[error("cannot connect to {0}")]
    Connection(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The endpoint returned a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    ResponseParsing(String),

    /// The model returned no usable content.
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Fatal audit errors.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The vision extraction call failed.
    #[error("AI extraction failed: {0}")]
    Extraction(#[from] LlmError),

    /// The vision model answered with JSON that does not match the schema.
    #[error("AI extraction returned malformed data: {0}")]
    MalformedExtraction(String),
}

/// Errors raised by the duplicate-record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// A persisted value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The blocking database task died.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Closed set of error categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Recognition,
    Model,
    AuditFailed,
    Store,
    Image,
    Io,
    /// A background task died before producing a result.
    Internal,
}

/// Structured error object handed to callers instead of internal traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl DocsenseError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Recognition(_) => ErrorKind::Recognition,
            Self::Llm(LlmError::NotConfigured(_)) => ErrorKind::Configuration,
            Self::Llm(_) => ErrorKind::Model,
            Self::Audit(_) => ErrorKind::AuditFailed,
            Self::Store(_) => ErrorKind::Store,
            Self::Image(_) => ErrorKind::Image,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Convert into the structured object shown to callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Result type for the docsense library.
pub type Result<T> = std::result::Result<T, DocsenseError>;

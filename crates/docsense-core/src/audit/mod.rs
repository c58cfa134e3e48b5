//! Document authenticity audit.

pub mod duplicate;
pub mod forensics;
pub mod math;
pub mod pipeline;
pub mod vision;

pub use duplicate::{DuplicateStore, InMemoryDuplicateStore, SqliteDuplicateStore};
pub use forensics::ForensicsScanner;
pub use pipeline::{resolve_status, AuditPipeline};
pub use vision::VisionExtractor;

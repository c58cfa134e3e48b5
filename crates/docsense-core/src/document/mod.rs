//! Document classification and structured field extraction.

pub mod classifier;
pub mod extractor;
pub mod patterns;

pub use classifier::DocumentClassifier;
pub use extractor::FieldExtractor;

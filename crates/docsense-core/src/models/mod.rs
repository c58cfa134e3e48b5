//! Data models shared across the pipeline.

pub mod audit;
pub mod config;
pub mod document;

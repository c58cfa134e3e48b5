//! Type-specific structured field extraction.

use regex::Regex;
use tracing::debug;

use super::patterns::{fields_for, NAME_STOP_WORDS};
use crate::models::document::{DocumentType, ExtractedFields};

/// Fields holding party names; greedy captures are cut at stop words.
const NAME_FIELDS: &[&str] = &["vendor", "recipient"];

/// Extracts key/value fields using the ordered pattern tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract every field of `document_type` found in `text`.
    ///
    /// For each field the first matching pattern decides. A match whose
    /// capture cleans to nothing (only separators or stop words) leaves the
    /// field out; later patterns are not consulted.
    pub fn extract(&self, document_type: DocumentType, text: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::new();

        for (field, patterns) in fields_for(document_type) {
            let value = first_match(field, patterns, text);

            if let Some(value) = value {
                fields.insert(*field, value);
            }
        }

        debug!(
            "Extracted {} fields for {}: {:?}",
            fields.len(),
            document_type,
            fields.iter().map(|(k, _)| k).collect::<Vec<_>>()
        );
        fields
    }
}

/// Cleaned capture of the first pattern that matches `text`, if non-empty.
fn first_match(field: &str, patterns: &[Regex], text: &str) -> Option<String> {
    let raw = patterns
        .iter()
        .find_map(|pattern| pattern.captures(text)?.get(1))?
        .as_str();

    let value = if NAME_FIELDS.contains(&field) {
        clean_name(raw)
    } else {
        clean_value(raw)
    };
    (!value.is_empty()).then_some(value)
}

/// Trim whitespace and stray separators around a captured value.
fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_start_matches([':', '-', '/', '.', '#'])
        .trim_end_matches([':', '-', '/', '.', ',', ';'])
        .trim()
        .to_string()
}

/// Cut a party name at the first stop word and collapse whitespace.
fn clean_name(raw: &str) -> String {
    let words: Vec<&str> = raw
        .split_whitespace()
        .take_while(|word| {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric()).to_uppercase();
            !NAME_STOP_WORDS.contains(&bare.as_str())
        })
        .collect();

    words
        .join(" ")
        .trim_end_matches([',', ';', ':', '-', '/'])
        .trim()
        .to_string()
}

//! Per-type prompts for the generative summary tier.

use crate::models::document::{DocumentType, ExtractedFields};

/// Target format and example sentence per document type.
fn format_hint(document_type: DocumentType) -> (&'static str, &'static str) {
    match document_type {
        DocumentType::Invoice => (
            "Invoice [number] dari [vendor] Rp [total] tanggal [date]",
            "Invoice INV-2024-01 dari PT Maju Jaya Rp 1.500.000 tanggal 15/12/2024",
        ),
        DocumentType::DeliveryNote => (
            "Surat jalan [number] dari [sender] untuk [recipient] tanggal [date]",
            "Surat jalan SJ-0042 dari CV Sumber Rejeki untuk Toko Abadi tanggal 05/01/2025",
        ),
        DocumentType::PurchaseOrder => (
            "Purchase order [number] ke [vendor] Rp [total] tanggal [date]",
            "Purchase order PO-7781 ke PT Sinar Terang Rp 12.000.000 tanggal 02/02/2025",
        ),
        DocumentType::Receipt => (
            "Kwitansi [number] dari [vendor] Rp [total] tanggal [date]",
            "Kwitansi KW-77 dari UD Berkah Rp 250.000 tanggal 10/03/2025",
        ),
        DocumentType::Unknown => (
            "[document kind] [key identifier] dari [issuer] tanggal [date]",
            "Memo internal dari PT Maju Jaya tanggal 01/04/2025",
        ),
    }
}

/// System prompt for `document_type`.
pub fn system_prompt(document_type: DocumentType, max_length: usize) -> String {
    let (format, example) = format_hint(document_type);
    format!(
        "You summarize scanned business documents ({kind}) in one short line of Indonesian.\n\
         Format: {format}\n\
         Example: {example}\n\
         Rules: at most {max_length} characters, no quotes, no explanations, \
         omit parts you cannot find, never invent numbers.",
        kind = document_type.label().to_lowercase(),
    )
}

/// User message: the length-capped excerpt plus already extracted fields.
pub fn user_content(text: &str, fields: &ExtractedFields, excerpt_length: usize) -> String {
    let excerpt: String = text.chars().take(excerpt_length).collect();
    let mut content = format!("Document text:\n{}", excerpt.trim());

    if !fields.is_empty() {
        content.push_str("\n\nAlready extracted:");
        for (field, value) in fields.iter() {
            content.push_str(&format!("\n- {}: {}", field, value));
        }
    }

    content
}

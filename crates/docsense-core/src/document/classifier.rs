//! Keyword-based document type classification.

use tracing::debug;

use crate::models::document::DocumentType;

/// Indicator keywords per type, in priority order. The first type with a
/// hit wins, so a document mentioning both "INVOICE" and "RECEIPT" is an
/// invoice.
pub const INDICATORS: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::Invoice,
        &["INVOICE", "FAKTUR", "TAGIHAN", "BILL TO"],
    ),
    (
        DocumentType::DeliveryNote,
        &[
            "SURAT JALAN",
            "DELIVERY NOTE",
            "DELIVERY ORDER",
            "PACKING LIST",
            "TANDA TERIMA BARANG",
        ],
    ),
    (
        DocumentType::PurchaseOrder,
        &["PURCHASE ORDER", "SURAT PESANAN", "PO NUMBER", "NO. PO", "PO NO"],
    ),
    (
        DocumentType::Receipt,
        &["RECEIPT", "KWITANSI", "KUITANSI", "STRUK", "BUKTI PEMBAYARAN", "NOTA"],
    ),
];

/// Assigns a [`DocumentType`] from the fixed vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentClassifier;

impl DocumentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// First type (in priority order) whose indicators appear in `text`.
    pub fn classify(&self, text: &str) -> DocumentType {
        let upper = text.to_uppercase();

        let document_type = INDICATORS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| upper.contains(k)))
            .map(|(document_type, _)| *document_type)
            .unwrap_or(DocumentType::Unknown);

        debug!("Classified document as {}", document_type);
        document_type
    }
}

/// Whether `line` contains any indicator keyword of any type.
pub fn contains_indicator(line: &str) -> bool {
    let upper = line.to_uppercase();
    INDICATORS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .any(|k| upper.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_type() {
        let classifier = DocumentClassifier::new();

        assert_eq!(classifier.classify("Faktur Pajak No 010"), DocumentType::Invoice);
        assert_eq!(classifier.classify("surat jalan SJ-22"), DocumentType::DeliveryNote);
        assert_eq!(
            classifier.classify("Purchase Order PO-7781"),
            DocumentType::PurchaseOrder
        );
        assert_eq!(classifier.classify("Kwitansi pembayaran"), DocumentType::Receipt);
        assert_eq!(classifier.classify("hello world"), DocumentType::Unknown);
        assert_eq!(classifier.classify(""), DocumentType::Unknown);
    }

    #[test]
    fn test_priority_order_wins() {
        let classifier = DocumentClassifier::new();

        // Receipt keyword first in the text, invoice keyword later.
        assert_eq!(
            classifier.classify("RECEIPT for INVOICE INV-9"),
            DocumentType::Invoice
        );
        assert_eq!(
            classifier.classify("Struk / Delivery Note 12"),
            DocumentType::DeliveryNote
        );
    }

    #[test]
    fn test_matches_iff_indicator_present() {
        let classifier = DocumentClassifier::new();

        for (index, (document_type, keywords)) in INDICATORS.iter().enumerate() {
            for keyword in *keywords {
                let text = format!("xx {} yy", keyword.to_lowercase());
                let higher_priority_hit = INDICATORS[..index]
                    .iter()
                    .any(|(_, ks)| ks.iter().any(|k| text.to_uppercase().contains(k)));
                if !higher_priority_hit {
                    assert_eq!(classifier.classify(&text), *document_type, "keyword {}", keyword);
                }
            }
        }
    }

    #[test]
    fn test_contains_indicator() {
        assert!(contains_indicator("No. Invoice: 7"));
        assert!(!contains_indicator("Jl. Sudirman 5"));
    }
}

//! Ordered regex tables for business document field extraction.
//!
//! Each table lists `(field, patterns)` pairs. Patterns are tried in order
//! and the first match wins; capture group 1 holds the value.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::document::DocumentType;

/// Ordered patterns for one field.
pub type FieldPatterns = (&'static str, Vec<Regex>);

// Amount in Indonesian or international notation: 1.500.000 / 1,500,000.00 / 111000
const AMOUNT: &str = r"([0-9]{1,3}(?:[.,][0-9]{3})+(?:[.,][0-9]{1,2})?|[0-9]+(?:[.,][0-9]{1,2})?)";
const CURRENCY: &str = r"(?:rp\.?|idr)?";
const NUMERIC_DATE: &str = r"(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})";
const MONTH_DATE: &str = r"(\d{1,2}\s+(?:jan|feb|mar|apr|mei|may|jun|jul|agu|aug|sep|okt|oct|nov|des|dec)[a-z]*\.?\s+\d{4})";
// Document codes must contain a digit somewhere.
const CODE: &str = r"([A-Z0-9/._-]*[0-9][A-Z0-9/._-]*)";
// Company names stay on one line.
const COMPANY: &str = r"\b((?:PT|CV|UD)\.?[ \t]+[A-Z][A-Za-z0-9&.'-]*(?:[ \t]+[A-Z][A-Za-z0-9&.'-]*){0,4})";

// Constant patterns only, compiled once inside the lazy_static tables.
fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn labeled_amount(labels: &str) -> Regex {
    re(&format!(r"(?i)\b(?:{})\s*[:.]?\s*{}\s*{}", labels, CURRENCY, AMOUNT))
}

fn date_patterns() -> Vec<Regex> {
    vec![
        re(&format!(r"(?i)\b(?:tanggal|tgl\.?|date|dated)\s*[:.]?\s*{}", NUMERIC_DATE)),
        re(&format!(r"(?i)\b(?:tanggal|tgl\.?|date|dated)\s*[:.]?\s*{}", MONTH_DATE)),
        re(r"\b(\d{1,2}[/.-]\d{1,2}[/.-]\d{4})\b"),
        re(r"\b(\d{4}-\d{2}-\d{2})\b"),
        re(&format!(r"(?i){}", MONTH_DATE)),
    ]
}

fn vendor_patterns() -> Vec<Regex> {
    vec![
        re(COMPANY),
        re(r"(?i)\b(?:vendor|supplier|seller|penjual|bill\s+from|dari|from)\s*:\s*([^\n]+)"),
    ]
}

fn total_patterns() -> Vec<Regex> {
    vec![
        labeled_amount(r"grand\s*total"),
        re(&format!(
            r"(?im)^\s*(?:total|jumlah|total\s+bayar|amount\s+due)\s*[:.]?\s*{}\s*{}",
            CURRENCY, AMOUNT
        )),
        labeled_amount(r"total|jumlah|total\s+bayar|amount\s+due"),
        re(&format!(r"(?i)\b(?:rp\.?|idr)\s*{}", AMOUNT)),
    ]
}

lazy_static! {
    pub static ref INVOICE_FIELDS: Vec<FieldPatterns> = vec![
        ("invoice_number", vec![
            re(&format!(r"(?i)\b(?:invoice|faktur)\s*(?:no\.?|number|nomor|#)\s*[:.]?\s*{}", CODE)),
            re(r"\b(INV[-/.]?[0-9](?:[A-Za-z0-9/._-]*[A-Za-z0-9])?)"),
            re(&format!(r"(?i)\b(?:no\.?|nomor)\s*(?:invoice|faktur)?\s*[:.]\s*{}", CODE)),
        ]),
        ("vendor", vendor_patterns()),
        ("total_amount", total_patterns()),
        ("subtotal", vec![
            labeled_amount(r"sub\s*-?\s*total"),
            labeled_amount(r"dpp"),
        ]),
        ("tax", vec![
            re(&format!(r"(?i)\b(?:ppn|vat|tax|pajak)\b[^\n]{{0,25}}?(?:rp\.?|idr)\s*{}", AMOUNT)),
            re(&format!(
                r"(?i)\b(?:ppn|vat|tax|pajak)\b(?:\s*\d{{1,2}}(?:[.,]\d+)?\s*%)?\s*[:.]?\s*{}",
                AMOUNT
            )),
        ]),
        ("date", date_patterns()),
        ("due_date", vec![
            re(&format!(r"(?i)\b(?:jatuh\s+tempo|due\s+date|due)\s*[:.]?\s*{}", NUMERIC_DATE)),
        ]),
    ];

    pub static ref DELIVERY_NOTE_FIELDS: Vec<FieldPatterns> = vec![
        ("delivery_number", vec![
            re(r"\b((?:SJ|DO)[-/.]?[0-9][A-Za-z0-9/._-]*)"),
            re(&format!(
                r"(?i)\b(?:surat\s+jalan|delivery\s+(?:note|order))\s*(?:no\.?|number|nomor|#)?\s*[:.]?\s*{}",
                CODE
            )),
        ]),
        ("vendor", vendor_patterns()),
        ("recipient", vec![
            re(r"(?i)\b(?:kepada|penerima|ship\s+to|deliver\s+to|to)\s*(?:yth\.?)?\s*:\s*([^\n]+)"),
        ]),
        ("date", date_patterns()),
        ("quantity", vec![
            re(r"(?i)\b(?:total\s+qty|jumlah\s+barang|qty|quantity|jumlah)\s*[:.]?\s*(\d+(?:[.,]\d+)?)"),
        ]),
    ];

    pub static ref PURCHASE_ORDER_FIELDS: Vec<FieldPatterns> = vec![
        ("po_number", vec![
            re(r"\b(PO[-/.]?[0-9][A-Za-z0-9/._-]*)"),
            re(&format!(
                r"(?i)\b(?:purchase\s+order|surat\s+pesanan|p\.?\s?o\.?)\s*(?:no\.?|number|nomor|#)?\s*[:.]?\s*{}",
                CODE
            )),
        ]),
        ("vendor", vendor_patterns()),
        ("total_amount", total_patterns()),
        ("date", date_patterns()),
    ];

    pub static ref RECEIPT_FIELDS: Vec<FieldPatterns> = vec![
        ("receipt_number", vec![
            re(&format!(
                r"(?i)\b(?:receipt|kwitansi|kuitansi|struk|nota|trx|transaksi)\s*(?:no\.?|number|nomor|#)\s*[:.]?\s*{}",
                CODE
            )),
            re(&format!(r"(?i)\bno\.?\s*[:.]\s*{}", CODE)),
        ]),
        ("vendor", vendor_patterns()),
        ("total_amount", total_patterns()),
        ("date", date_patterns()),
        ("payment_method", vec![
            re(r"(?i)\b(cash|tunai|debit|credit\s+card|kartu\s+kredit|kredit|qris|transfer|ovo|gopay|dana)\b"),
        ]),
    ];
}

/// Field table for a document type. `Unknown` has none.
pub fn fields_for(document_type: DocumentType) -> &'static [FieldPatterns] {
    match document_type {
        DocumentType::Invoice => &INVOICE_FIELDS,
        DocumentType::DeliveryNote => &DELIVERY_NOTE_FIELDS,
        DocumentType::PurchaseOrder => &PURCHASE_ORDER_FIELDS,
        DocumentType::Receipt => &RECEIPT_FIELDS,
        DocumentType::Unknown => &[],
    }
}

/// Tokens that end a party name captured by a greedy pattern.
pub const NAME_STOP_WORDS: &[&str] = &[
    "TOTAL", "SUBTOTAL", "GRAND", "TANGGAL", "TGL", "DATE", "RP", "IDR", "NO", "NOMOR",
    "INVOICE", "FAKTUR", "JUMLAH", "PPN", "TAX", "ALAMAT", "JL", "TELP", "TEL", "PHONE",
    "NPWP", "KEPADA", "UNTUK", "QTY", "DUE", "JATUH",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(table: &[FieldPatterns], field: &str, text: &str) -> Option<String> {
        let (_, patterns) = table.iter().find(|(name, _)| *name == field)?;
        patterns
            .iter()
            .find_map(|p| p.captures(text).map(|c| c[1].to_string()))
    }

    #[test]
    fn test_all_patterns_compile() {
        for document_type in [
            DocumentType::Invoice,
            DocumentType::DeliveryNote,
            DocumentType::PurchaseOrder,
            DocumentType::Receipt,
        ] {
            assert!(!fields_for(document_type).is_empty());
        }
        assert!(fields_for(DocumentType::Unknown).is_empty());
    }

    #[test]
    fn test_invoice_number_patterns() {
        assert_eq!(
            first_match(&INVOICE_FIELDS, "invoice_number", "Invoice No: INV/2024/001"),
            Some("INV/2024/001".to_string())
        );
        assert_eq!(
            first_match(&INVOICE_FIELDS, "invoice_number", "INVOICE INV-2024-01 PT Maju"),
            Some("INV-2024-01".to_string())
        );
        assert_eq!(
            first_match(&INVOICE_FIELDS, "invoice_number", "Nomor: 0042/FK/XII"),
            Some("0042/FK/XII".to_string())
        );
        assert_eq!(first_match(&INVOICE_FIELDS, "invoice_number", "INVOICE"), None);
    }

    #[test]
    fn test_amount_patterns() {
        let text = "Sub Total: Rp 100.000\nPPN 11%: Rp 11.000\nTotal: Rp 111.000";
        assert_eq!(first_match(&INVOICE_FIELDS, "subtotal", text), Some("100.000".to_string()));
        assert_eq!(first_match(&INVOICE_FIELDS, "tax", text), Some("11.000".to_string()));
        assert_eq!(
            first_match(&INVOICE_FIELDS, "total_amount", text),
            Some("111.000".to_string())
        );
        assert_eq!(
            first_match(&INVOICE_FIELDS, "total_amount", "GRAND TOTAL IDR 1,250,000.50"),
            Some("1,250,000.50".to_string())
        );
    }

    #[test]
    fn test_date_patterns() {
        assert_eq!(
            first_match(&INVOICE_FIELDS, "date", "TANGGAL 15/12/2024"),
            Some("15/12/2024".to_string())
        );
        assert_eq!(
            first_match(&INVOICE_FIELDS, "date", "Tgl. 3 Desember 2024"),
            Some("3 Desember 2024".to_string())
        );
        assert_eq!(
            first_match(&INVOICE_FIELDS, "date", "issued 2024-12-01"),
            Some("2024-12-01".to_string())
        );
    }

    #[test]
    fn test_purchase_order_number() {
        assert_eq!(
            first_match(&PURCHASE_ORDER_FIELDS, "po_number", "PURCHASE ORDER PO-7781"),
            Some("PO-7781".to_string())
        );
        assert_eq!(
            first_match(&PURCHASE_ORDER_FIELDS, "po_number", "Purchase Order No: 4500012"),
            Some("4500012".to_string())
        );
    }
}

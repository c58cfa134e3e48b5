//! Byte-signature scan for image editing software.

use tracing::debug;

use crate::models::audit::ForensicsReport;

/// Editing tools that leave their name in image metadata.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    "Photoshop",
    "GIMP",
    "Paint.NET",
    "Canva",
    "Pixelmator",
    "Affinity Photo",
    "Lightroom",
    "PicsArt",
    "Snapseed",
    "CorelDRAW",
    "Photopea",
    "Fotor",
    "Krita",
];

/// Case-insensitive substring search over the raw image bytes.
#[derive(Debug, Clone)]
pub struct ForensicsScanner {
    signatures: Vec<String>,
}

impl Default for ForensicsScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect())
    }
}

impl ForensicsScanner {
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures }
    }

    /// Scan `bytes`. Never fails: problems become a diagnostic finding on
    /// a "not manipulated" report.
    pub fn scan(&self, bytes: &[u8]) -> ForensicsReport {
        if bytes.is_empty() {
            return ForensicsReport {
                is_manipulated: false,
                findings: vec!["Forensics scan skipped: image buffer is empty".to_string()],
            };
        }

        let haystack = bytes.to_ascii_lowercase();

        let findings: Vec<String> = self
            .signatures
            .iter()
            .filter(|signature| !signature.is_empty())
            .filter(|signature| contains(&haystack, signature.to_ascii_lowercase().as_bytes()))
            .map(|signature| format!("Editing software signature found: {}", signature))
            .collect();

        debug!(bytes = bytes.len(), hits = findings.len(), "Forensics scan complete");

        ForensicsReport {
            is_manipulated: !findings.is_empty(),
            findings,
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_signature_case_insensitively() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1];
        bytes.extend_from_slice(b"Exif\0\0Software\0ADOBE PHOTOSHOP 25.0 (Windows)");
        bytes.extend_from_slice(&[0x00, 0xFF, 0xD9]);

        let report = ForensicsScanner::default().scan(&bytes);
        assert!(report.is_manipulated);
        assert_eq!(
            report.findings,
            vec!["Editing software signature found: Photoshop".to_string()]
        );
    }

    #[test]
    fn test_clean_image() {
        let report = ForensicsScanner::default().scan(b"\x89PNG\r\n\x1a\n plain scanner output");
        assert!(!report.is_manipulated);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_empty_buffer_is_diagnostic_only() {
        let report = ForensicsScanner::default().scan(&[]);
        assert!(!report.is_manipulated);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_custom_signatures() {
        let scanner = ForensicsScanner::new(vec!["MyEditor".to_string(), String::new()]);
        assert!(scanner.scan(b"..myeditor..").is_manipulated);
        assert!(!scanner.scan(b"GIMP").is_manipulated);
    }
}

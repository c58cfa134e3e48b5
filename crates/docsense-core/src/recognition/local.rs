//! Local recognition through the `tesseract` binary.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{weighted_confidence, EngineOutput, TextEngine};
use crate::error::RecognitionError;
use crate::models::config::RecognitionConfig;
use crate::models::document::RawImage;

/// Tesseract CLI engine. Reads word-level TSV to get per-token confidence.
pub struct TesseractEngine {
    binary: String,
    language: String,
    timeout_secs: u64,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::new(
            config.tesseract_path.clone(),
            config.tesseract_language.clone(),
            config.local_timeout_secs,
        )
    }

    async fn run(&self, path: &std::path::Path) -> Result<String, RecognitionError> {
        let mut command = Command::new(&self.binary);
        command
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("3")
            .arg("tsv")
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), command.output())
            .await
            .map_err(|_| RecognitionError::Timeout(self.timeout_secs))?
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    RecognitionError::EngineUnavailable(format!(
                        "tesseract binary '{}' not found",
                        self.binary
                    ))
                } else {
                    RecognitionError::Request(format!("failed to run tesseract: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One word row of tesseract TSV output.
struct TsvWord<'a> {
    line_key: (u32, u32, u32, u32),
    confidence: f32,
    text: &'a str,
}

fn parse_tsv_row(row: &str) -> Option<TsvWord<'_>> {
    let cols: Vec<&str> = row.splitn(12, '\t').collect();
    if cols.len() < 12 || cols[0] != "5" {
        return None;
    }

    let num = |i: usize| cols[i].trim().parse::<u32>().ok();
    let text = cols[11].trim();
    if text.is_empty() {
        return None;
    }

    Some(TsvWord {
        line_key: (num(1)?, num(2)?, num(3)?, num(4)?),
        confidence: cols[10].trim().parse().ok()?,
        text,
    })
}

/// Rebuild text line by line from TSV word rows and compute confidence.
pub(crate) fn parse_tsv(tsv: &str) -> EngineOutput {
    let words: Vec<TsvWord<'_>> = tsv.lines().skip(1).filter_map(parse_tsv_row).collect();

    let mut lines: Vec<String> = Vec::new();
    let mut current_key = None;

    for word in &words {
        if current_key == Some(word.line_key) {
            if let Some(line) = lines.last_mut() {
                line.push(' ');
                line.push_str(word.text);
            }
        } else {
            lines.push(word.text.to_string());
            current_key = Some(word.line_key);
        }
    }

    let confidence = weighted_confidence(words.iter().map(|w| (w.text, w.confidence)));

    EngineOutput {
        text: lines.join("\n"),
        confidence,
    }
}

#[async_trait]
impl TextEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &RawImage) -> Result<EngineOutput, RecognitionError> {
        // Tesseract needs a file path.
        let file = tempfile::Builder::new()
            .prefix("docsense-ocr-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile()
            .map_err(|e| RecognitionError::Request(format!("failed to create temp file: {}", e)))?;

        tokio::fs::write(file.path(), &image.bytes)
            .await
            .map_err(|e| RecognitionError::Request(format!("failed to write temp file: {}", e)))?;

        let tsv = self.run(file.path()).await?;
        let output = parse_tsv(&tsv);

        debug!(
            "tesseract recognized {} chars (confidence {:?})",
            output.text.len(),
            output.confidence
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t300\t20\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t100\t20\t96.5\tINVOICE
5\t1\t1\t1\t1\t2\t120\t10\t150\t20\t88\tINV-2024-01
5\t1\t1\t1\t2\t1\t10\t40\t100\t20\t90\tTOTAL
5\t1\t1\t1\t2\t2\t120\t40\t40\t20\t-1\t
5\t1\t1\t1\t2\t3\t170\t40\t90\t20\t70\t1.500.000
";

    #[test]
    fn test_parse_tsv_lines() {
        let output = parse_tsv(TSV);
        assert_eq!(output.text, "INVOICE INV-2024-01\nTOTAL 1.500.000");

        // (7*96.5 + 11*88 + 5*90 + 9*70) / 32
        let expected = (7.0 * 96.5 + 11.0 * 88.0 + 5.0 * 90.0 + 9.0 * 70.0) / 32.0;
        assert!((output.confidence.unwrap() - expected).abs() < 0.001);
    }

    #[test]
    fn test_parse_tsv_empty_page() {
        let output = parse_tsv("level\tpage_num\n1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n");
        assert_eq!(output.text, "");
        assert_eq!(output.confidence, None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new("docsense-no-such-tesseract-binary", "eng", 5);
        let image = RawImage::new(vec![0u8; 8], "image/png");

        let err = engine.recognize(&image).await.unwrap_err();
        assert!(matches!(err, RecognitionError::EngineUnavailable(_)));
    }
}

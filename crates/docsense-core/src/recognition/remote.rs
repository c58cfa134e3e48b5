//! Remote OCR service client (OCR.space-compatible API).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;

use super::{weighted_confidence, EngineOutput, TextEngine};
use crate::error::{DocsenseError, RecognitionError};
use crate::models::config::RecognitionConfig;
use crate::models::document::RawImage;

/// Remote recognition engine. Asks for orientation detection and
/// table-aware parsing.
pub struct RemoteOcrEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    engine: u8,
    timeout_secs: u64,
}

impl RemoteOcrEngine {
    /// Build from configuration. Fails when no API key is configured.
    pub fn from_config(config: &RecognitionConfig) -> Result<Self, DocsenseError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DocsenseError::Config("remote OCR API key is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsenseError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            language: config.language.clone(),
            engine: config.engine,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn joined(&self) -> String {
        match self {
            Self::One(s) => s.clone(),
            Self::Many(v) => v.join("; "),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
    #[serde(default)]
    text_overlay: Option<TextOverlay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TextOverlay {
    #[serde(default)]
    lines: Vec<OverlayLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayLine {
    #[serde(default)]
    words: Vec<OverlayWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayWord {
    #[serde(default)]
    word_text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Turn a service response into engine output.
fn parse_response(response: OcrResponse) -> Result<EngineOutput, RecognitionError> {
    if response.is_errored_on_processing {
        let message = response
            .error_message
            .map(|m| m.joined())
            .unwrap_or_else(|| "unknown processing error".to_string());
        return Err(RecognitionError::Engine(message));
    }

    let text = response
        .parsed_results
        .iter()
        .map(|r| r.parsed_text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let confidence = weighted_confidence(
        response
            .parsed_results
            .iter()
            .filter_map(|r| r.text_overlay.as_ref())
            .flat_map(|o| o.lines.iter())
            .flat_map(|l| l.words.iter())
            .filter_map(|w| w.confidence.map(|c| (w.word_text.as_str(), c))),
    );

    Ok(EngineOutput { text, confidence })
}

#[async_trait]
impl TextEngine for RemoteOcrEngine {
    fn name(&self) -> &str {
        "remote-ocr"
    }

    async fn recognize(&self, image: &RawImage) -> Result<EngineOutput, RecognitionError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let data_uri = format!("data:{};base64,{}", image.mime_type, encoded);
        let engine = self.engine.to_string();

        debug!("Sending {} bytes to remote OCR", image.bytes.len());

        let form = [
            ("base64Image", data_uri.as_str()),
            ("language", self.language.as_str()),
            ("OCREngine", engine.as_str()),
            ("detectOrientation", "true"),
            ("isTable", "true"),
            ("scale", "true"),
            ("isOverlayRequired", "true"),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecognitionError::Timeout(self.timeout_secs)
                } else {
                    RecognitionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Engine(format!("HTTP {}: {}", status, body)));
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Malformed(e.to_string()))?;

        parse_response(parsed)
    }
}

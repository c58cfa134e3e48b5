//! Pure Rust local engine using `pure-onnx-ocr` (no external binary).

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{weighted_confidence, EngineOutput, TextEngine};
use crate::error::RecognitionError;
use crate::models::document::RawImage;

/// Local engine backed by PaddleOCR ONNX models on disk.
pub struct OnnxEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl OnnxEngine {
    /// Create an engine from `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`
    /// in `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, RecognitionError> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("latin_rec.onnx");
        let dict_path = model_dir.join("latin_dict.txt");

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| RecognitionError::EngineUnavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { engine })
    }
}

#[async_trait]
impl TextEngine for OnnxEngine {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn recognize(&self, image: &RawImage) -> Result<EngineOutput, RecognitionError> {
        let decoded = image::load_from_memory(&image.bytes)
            .map_err(|e| RecognitionError::Malformed(format!("cannot decode image: {}", e)))?;

        let mut regions = self
            .engine
            .run_from_image(&decoded)
            .map_err(|e| RecognitionError::Engine(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", regions.len());

        // Reading order: rows of ~20px, then left to right.
        regions.sort_by(|a, b| {
            let (ax, ay) = top_left(&a.bounding_box);
            let (bx, by) = top_left(&b.bounding_box);
            let (row_a, row_b) = ((ay / 20.0) as i64, (by / 20.0) as i64);
            row_a
                .cmp(&row_b)
                .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = regions
            .iter()
            .map(|r| r.text.replace("[UNK]", " "))
            .collect::<Vec<_>>()
            .join("\n");

        // Region confidences are 0..1.
        let confidence = weighted_confidence(
            regions
                .iter()
                .map(|r| (r.text.as_str(), r.confidence as f32 * 100.0)),
        );

        Ok(EngineOutput { text, confidence })
    }
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| (x.min(c.x), y.min(c.y)))
}

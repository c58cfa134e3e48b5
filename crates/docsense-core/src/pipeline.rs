//! Recognition-to-summary document pipeline.

use std::time::Instant;

use tracing::info;

use crate::document::{DocumentClassifier, FieldExtractor};
use crate::models::document::{DocumentReport, RawImage};
use crate::recognition::{ImagePreprocessor, RecognitionAdapter, TextEnhancer};
use crate::summary::SummaryGenerator;

/// image -> preprocess -> recognize (+ enhance) -> classify -> extract -> summarize
pub struct DocumentPipeline {
    preprocessor: ImagePreprocessor,
    recognizer: RecognitionAdapter,
    enhancer: TextEnhancer,
    classifier: DocumentClassifier,
    extractor: FieldExtractor,
    summarizer: SummaryGenerator,
}

impl DocumentPipeline {
    pub fn new(recognizer: RecognitionAdapter, summarizer: SummaryGenerator) -> Self {
        Self {
            preprocessor: ImagePreprocessor::default(),
            recognizer,
            enhancer: TextEnhancer::disabled(),
            classifier: DocumentClassifier::new(),
            extractor: FieldExtractor::new(),
            summarizer,
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_enhancer(mut self, enhancer: TextEnhancer) -> Self {
        self.enhancer = enhancer;
        self
    }

    /// Run the whole pipeline. Never fails: unreadable input ends with the
    /// recognition sentinel as text and the generic summary.
    pub async fn recognize_and_summarize(&self, image: &RawImage) -> DocumentReport {
        let start = Instant::now();

        let prepared = self.preprocessor.preprocess(image);
        let recognition = self.recognizer.recognize(&prepared).await;
        let text = self.enhancer.enhance(&recognition.text).await;

        let document_type = self.classifier.classify(&text);
        let extracted_fields = self.extractor.extract(document_type, &text);
        let summary = self
            .summarizer
            .generate(&text, document_type, &extracted_fields)
            .await;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            document_type = %document_type,
            fields = extracted_fields.len(),
            summary_source = ?summary.source,
            processing_time_ms,
            "Document processed"
        );

        DocumentReport {
            raw_text: text,
            confidence: recognition.confidence,
            engine_used: recognition.engine_used,
            document_type,
            extracted_fields,
            summary,
            processing_time_ms,
        }
    }
}

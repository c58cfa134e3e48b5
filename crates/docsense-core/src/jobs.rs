//! Deferred processing: submit now, poll for the report later.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DocsenseError, ErrorKind, ErrorReport};
use crate::models::document::{DocumentReport, RawImage};
use crate::pipeline::DocumentPipeline;

/// Identifier handed back on submission.
pub type JobId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed(DocumentReport),
    Failed(ErrorReport),
}

/// Runs `recognize_and_summarize` on detached tasks.
///
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct JobQueue {
    pipeline: Arc<DocumentPipeline>,
    jobs: Arc<Mutex<HashMap<JobId, JobStatus>>>,
}

impl JobQueue {
    pub fn new(pipeline: Arc<DocumentPipeline>) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue an in-memory image. Returns immediately.
    pub fn submit(&self, image: RawImage) -> JobId {
        let pipeline = self.pipeline.clone();
        self.spawn_job(async move {
            JobStatus::Completed(pipeline.recognize_and_summarize(&image).await)
        })
    }

    /// Queue an image file; read errors fail the job.
    pub fn submit_file(&self, path: PathBuf) -> JobId {
        let pipeline = self.pipeline.clone();
        self.spawn_job(async move {
            match tokio::fs::read(&path).await {
                Ok(bytes) => JobStatus::Completed(
                    pipeline
                        .recognize_and_summarize(&RawImage::from_bytes(bytes))
                        .await,
                ),
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    JobStatus::Failed(DocsenseError::from(e).report())
                }
            }
        })
    }

    /// Current status, or `None` for an unknown id.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.lock().ok()?.get(&id).cloned()
    }

    /// Like [`status`](Self::status), but a finished job is removed from the
    /// queue. Pending jobs stay put.
    pub fn take(&self, id: JobId) -> Option<JobStatus> {
        let mut jobs = self.jobs.lock().ok()?;
        if matches!(jobs.get(&id)?, JobStatus::Pending) {
            return Some(JobStatus::Pending);
        }
        jobs.remove(&id)
    }

    /// Run `work` on a detached task. A panicking task fails the job instead
    /// of leaving it pending.
    fn spawn_job<F>(&self, work: F) -> JobId
    where
        F: Future<Output = JobStatus> + Send + 'static,
    {
        let id = Uuid::new_v4();
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(id, JobStatus::Pending);
        }
        debug!("Job {} queued", id);

        let handle = tokio::spawn(work);
        let queue = self.clone();
        tokio::spawn(async move {
            let status = match handle.await {
                Ok(status) => status,
                Err(e) => {
                    warn!("Job {} aborted: {}", id, e);
                    JobStatus::Failed(ErrorReport {
                        kind: ErrorKind::Internal,
                        message: format!("job aborted: {}", e),
                    })
                }
            };
            queue.finish(id, status);
        });

        id
    }

    fn finish(&self, id: JobId, status: JobStatus) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(id, status);
        }
        debug!("Job {} finished", id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::RecognitionError;
    use crate::models::config::{PreprocessConfig, SummaryConfig};
    use crate::recognition::testing::FakeEngine;
    use crate::recognition::{EngineOutput, ImagePreprocessor, RecognitionAdapter, TextEngine};
    use crate::summary::SummaryGenerator;

    struct PanickingEngine;

    #[async_trait]
    impl TextEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn recognize(&self, _image: &RawImage) -> Result<EngineOutput, RecognitionError> {
            panic!("engine crashed");
        }
    }

    fn queue() -> JobQueue {
        queue_with(
            RecognitionAdapter::new()
                .with_primary(FakeEngine::ok("primary", "RECEIPT No: R-1", Some(75.0))),
        )
    }

    fn queue_with(recognizer: RecognitionAdapter) -> JobQueue {
        let pipeline = DocumentPipeline::new(recognizer, SummaryGenerator::new(SummaryConfig::default()))
            .with_preprocessor(ImagePreprocessor::from_config(PreprocessConfig {
                enabled: false,
                ..PreprocessConfig::default()
            }));
        JobQueue::new(Arc::new(pipeline))
    }

    async fn wait(queue: &JobQueue, id: JobId) -> JobStatus {
        for _ in 0..100 {
            match queue.status(id) {
                Some(JobStatus::Pending) | None => tokio::time::sleep(Duration::from_millis(10)).await,
                Some(status) => return status,
            }
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let queue = queue();
        let id = queue.submit(RawImage::new(vec![1, 2, 3], "image/png"));

        match wait(&queue, id).await {
            JobStatus::Completed(report) => assert_eq!(report.extracted_fields.get("receipt_number"), Some("R-1")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(queue.status(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails_job() {
        let queue = queue();
        let id = queue.submit_file(PathBuf::from("/nonexistent/scan.png"));

        match wait(&queue, id).await {
            JobStatus::Failed(report) => assert_eq!(report.kind, ErrorKind::Io),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_take_removes_finished_jobs() {
        let queue = queue();
        let id = queue.submit(RawImage::new(vec![1, 2, 3], "image/png"));

        assert!(matches!(wait(&queue, id).await, JobStatus::Completed(_)));
        assert!(matches!(queue.take(id), Some(JobStatus::Completed(_))));
        assert!(queue.status(id).is_none());
        assert!(queue.take(id).is_none());
    }

    #[tokio::test]
    async fn test_panicking_job_fails() {
        let queue = queue_with(RecognitionAdapter::new().with_primary(Arc::new(PanickingEngine)));
        let id = queue.submit(RawImage::new(vec![1, 2, 3], "image/png"));

        match wait(&queue, id).await {
            JobStatus::Failed(report) => {
                assert_eq!(report.kind, ErrorKind::Internal);
                assert!(report.message.contains("job aborted"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }
}

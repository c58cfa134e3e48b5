//! Batch command - scan many document images through the job queue.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use docsense_core::models::document::DocumentReport;
use docsense_core::{Engines, JobId, JobQueue, JobStatus};

use super::scan::{format_report, OutputFormat};
use super::{is_supported_image, load_config, surface_error};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of documents in flight
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of scanning a single file.
struct ScanResult {
    path: PathBuf,
    report: Option<DocumentReport>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported_image(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to scan",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let json = matches!(args.format, OutputFormat::Json);
    let engines = Engines::from_config(&config).map_err(|e| surface_error(e, json))?;
    let queue = JobQueue::new(Arc::new(engines.document_pipeline()));

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut waiting: VecDeque<PathBuf> = files.into();
    let mut in_flight: Vec<(PathBuf, JobId)> = Vec::new();
    let mut results = Vec::with_capacity(waiting.len());
    let limit = args.jobs.max(1);

    while !waiting.is_empty() || !in_flight.is_empty() {
        while in_flight.len() < limit {
            let Some(path) = waiting.pop_front() else { break };
            let id = queue.submit_file(path.clone());
            debug!("Submitted {} as job {}", path.display(), id);
            in_flight.push((path, id));
        }

        tokio::time::sleep(POLL_INTERVAL).await;

        let mut still_running = Vec::with_capacity(in_flight.len());
        for (path, id) in in_flight.drain(..) {
            let result = match queue.take(id) {
                Some(JobStatus::Pending) => {
                    still_running.push((path, id));
                    continue;
                }
                Some(JobStatus::Completed(report)) => ScanResult {
                    path,
                    report: Some(report),
                    error: None,
                },
                Some(JobStatus::Failed(report)) => ScanResult {
                    path,
                    report: None,
                    error: Some(report.message),
                },
                None => ScanResult {
                    path,
                    report: None,
                    error: Some("job lost".to_string()),
                },
            };

            if let Some(message) = &result.error {
                if args.continue_on_error {
                    warn!("Failed to scan {}: {}", result.path.display(), message);
                } else {
                    error!("Failed to scan {}: {}", result.path.display(), message);
                    pb.abandon();
                    anyhow::bail!("Scanning failed: {}", message);
                }
            }

            results.push(result);
            pb.inc(1);
        }
        in_flight = still_running;
    }

    pb.finish_with_message("Complete");

    let (successful, failed): (Vec<&ScanResult>, Vec<&ScanResult>) =
        results.iter().partition(|r| r.report.is_some());

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(report) = &result.report {
                let output_name = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                fs::write(&output_path, format_report(report, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Scanned {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[ScanResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "document_type",
        "confidence",
        "engine_used",
        "summary",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        match &result.report {
            Some(report) => {
                let engine = serde_json::to_value(report.engine_used)?;
                wtr.write_record([
                    filename,
                    "success",
                    report.document_type.as_str(),
                    format!("{:.1}", report.confidence).as_str(),
                    engine.as_str().unwrap_or_default(),
                    report.summary.text.as_str(),
                    report.processing_time_ms.to_string().as_str(),
                    "",
                ])?;
            }
            None => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    result.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use docsense_core::models::document::{
        DocumentType, EngineUsed, ExtractedFields, Summary, SummarySource,
    };

    use super::*;

    #[test]
    fn test_summary_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let results = vec![
            ScanResult {
                path: PathBuf::from("scans/a.png"),
                report: Some(DocumentReport {
                    raw_text: "RECEIPT".to_string(),
                    confidence: 80.0,
                    engine_used: EngineUsed::Fallback,
                    document_type: DocumentType::Receipt,
                    extracted_fields: ExtractedFields::new(),
                    summary: Summary {
                        text: "Struk pembayaran".to_string(),
                        source: SummarySource::Fallback,
                    },
                    processing_time_ms: 7,
                }),
                error: None,
            },
            ScanResult {
                path: PathBuf::from("scans/b.png"),
                report: None,
                error: Some("I/O error: denied".to_string()),
            },
        ];

        write_summary(&path, &results).unwrap();
        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "a.png,success,receipt,80.0,fallback,Struk pembayaran,7,");
        assert_eq!(lines[2], "b.png,error,,,,,,I/O error: denied");
    }
}

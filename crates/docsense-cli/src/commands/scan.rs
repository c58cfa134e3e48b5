//! Scan command - recognize, classify and summarize a single document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use docsense_core::models::document::DocumentReport;
use docsense_core::{Engines, RawImage};

use super::{is_supported_image, load_config, surface_error};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Input image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Run the generative typo-correction pass (needs a model key)
    #[arg(long)]
    enhance: bool,

    /// Skip image preprocessing
    #[arg(long)]
    no_preprocess: bool,

    /// Show recognition confidence and timing
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if args.enhance {
        config.recognition.enhance_text = true;
    }
    if args.no_preprocess {
        config.preprocess.enabled = false;
    }

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_supported_image(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    info!("Scanning file: {}", args.input.display());

    let json = matches!(args.format, OutputFormat::Json);
    let engines = Engines::from_config(&config).map_err(|e| surface_error(e, json))?;
    let pipeline = engines.document_pipeline();

    let image = RawImage::from_path(&args.input)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Recognizing text...");

    let report = pipeline.recognize_and_summarize(&image).await;

    pb.finish_and_clear();

    let output = format_report(&report, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Recognition confidence: {:.1}% ({:?} engine)",
            style("ℹ").blue(),
            report.confidence,
            report.engine_used
        );
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            report.processing_time_ms
        );
    }

    debug!("Total scan time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_report(report: &DocumentReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &DocumentReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["field", "value"])?;
    wtr.write_record(["document_type", report.document_type.as_str()])?;
    wtr.write_record(["confidence", format!("{:.1}", report.confidence).as_str()])?;
    for (field, value) in report.extracted_fields.iter() {
        wtr.write_record([field, value])?;
    }
    wtr.write_record(["summary", report.summary.text.as_str()])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(report: &DocumentReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", report.document_type.label()));
    output.push_str(&format!("Summary: {}\n", report.summary.text));
    output.push_str(&format!("  (source: {:?})\n", report.summary.source));

    if !report.extracted_fields.is_empty() {
        output.push('\n');
        output.push_str("Fields:\n");
        for (field, value) in report.extracted_fields.iter() {
            output.push_str(&format!("  {}: {}\n", field, value));
        }
    }

    output.push('\n');
    output.push_str("Text:\n");
    for line in report.raw_text.lines() {
        output.push_str(&format!("  {}\n", line));
    }

    output
}

//! Audit command - run the authenticity audit on a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::info;

use docsense_core::{AuditStatus, AuditVerdict, DocsenseError, Engines, LogEntry, RawImage, Severity};

use super::{is_supported_image, load_config, surface_error};

/// Exit code for a completed audit whose verdict is not VERIFIED.
const EXIT_NOT_VERIFIED: i32 = 2;

/// Arguments for the audit command.
#[derive(Args)]
pub struct AuditArgs {
    /// Input image
    #[arg(required = true)]
    input: PathBuf,

    /// Submitting user, recorded with the document fingerprint
    #[arg(long)]
    user_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: AuditFormat,

    /// Write the verdict to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum AuditFormat {
    /// Full verdict as JSON
    Json,
    /// Live log trail and a verdict summary
    Text,
}

pub async fn run(args: AuditArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let json = matches!(args.format, AuditFormat::Json);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_supported_image(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    let engines = Engines::from_config(&config).map_err(|e| surface_error(e, json))?;
    let pipeline = engines.audit_pipeline().map_err(|e| surface_error(e, json))?;

    let image = RawImage::from_path(&args.input)?;
    info!("Auditing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Auditing...");

    // Render entries while the stages run; JSON output stays quiet until the end
    let (tx, mut rx) = mpsc::unbounded_channel::<LogEntry>();
    let printer = pb.clone();
    let render = tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            if !json {
                printer.println(format_entry(&entry));
            }
            printer.set_message(format!("{}...", entry.stage));
        }
    });

    let outcome = pipeline
        .audit_with_progress(&image, args.user_id.as_deref(), Some(tx))
        .await;
    let _ = render.await;
    pb.finish_and_clear();

    let verdict = outcome.map_err(|e| surface_error(DocsenseError::from(e), json))?;

    let output = match args.format {
        AuditFormat::Json => serde_json::to_string(&verdict)?,
        AuditFormat::Text => format_verdict(&verdict),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Verdict written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if verdict.status != AuditStatus::Verified {
        std::process::exit(EXIT_NOT_VERIFIED);
    }

    Ok(())
}

fn format_entry(entry: &LogEntry) -> String {
    let icon = match entry.severity {
        Severity::Info => style("ℹ").blue(),
        Severity::Success => style("✓").green(),
        Severity::Warning => style("⚠").yellow(),
        Severity::Error => style("✗").red(),
    };
    format!("{} [{}] {}", icon, entry.stage, entry.message)
}

fn format_verdict(verdict: &AuditVerdict) -> String {
    let status = match verdict.status {
        AuditStatus::Verified => style(verdict.status.to_string()).green().bold(),
        AuditStatus::Suspicious => style(verdict.status.to_string()).yellow().bold(),
        _ => style(verdict.status.to_string()).red().bold(),
    };

    let data = &verdict.extracted_data;
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("Verdict: {} (score {})\n", status, verdict.score));
    output.push_str(&format!(
        "Audited at: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    output.push('\n');
    output.push_str(&format!("  Invoice:     {}\n", data.invoice_number));
    output.push_str(&format!("  Vendor:      {}\n", data.vendor_name));
    output.push_str(&format!("  Date:        {}\n", data.date));
    output.push_str(&format!("  Subtotal:    {}\n", data.subtotal));
    output.push_str(&format!("  Tax:         {}\n", data.tax));
    output.push_str(&format!("  Grand total: {}\n", data.grand_total));

    if !verdict.findings.is_empty() {
        output.push('\n');
        output.push_str("Findings:\n");
        for finding in &verdict.findings {
            output.push_str(&format!("  - {}\n", finding));
        }
    }

    output
}

//! Subcommands.

pub mod audit;
pub mod batch;
pub mod config;
pub mod scan;

use std::path::{Path, PathBuf};

use docsense_core::{DocsenseConfig, DocsenseError};

/// Image types the recognition engines accept.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsense")
        .join("config.json")
}

/// Explicit file, else the default file if it exists, else defaults;
/// environment secrets are applied on top.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<DocsenseConfig> {
    let config = match config_path {
        Some(path) => DocsenseConfig::from_file(Path::new(path))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                DocsenseConfig::from_file(&default_path)?
            } else {
                DocsenseConfig::default()
            }
        }
    };

    Ok(config.apply_env())
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Print the structured error object when JSON output was requested.
pub fn surface_error(err: DocsenseError, json: bool) -> anyhow::Error {
    if json {
        if let Ok(report) = serde_json::to_string(&err.report()) {
            println!("{}", report);
        }
    }
    anyhow::Error::new(err)
}

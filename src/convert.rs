//! Batch re-encoding of a directory of images to WebP.
//!
//! Used for the site's welcome banners: every `jpg`/`jpeg`/`png` in the
//! input directory becomes `<output>/<file name>.webp`. Both directories are
//! explicit arguments.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use walkdir::WalkDir;

use crate::encode::{CoverEncoder, WebpEncoder};
use crate::scan::build_globset;
use crate::transform::normalize_color;

pub const DEFAULT_QUALITY: u8 = 50;

const INPUT_PATTERNS: [&str; 3] = ["*.jpg", "*.jpeg", "*.png"];

#[derive(Debug, Default)]
pub struct ConvertReport {
    pub written: Vec<PathBuf>,
    pub failed: u64,
}

/// Output path for `source`: the full file name plus `.webp`.
pub fn output_path(output: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    output.join(format!("{}.webp", name))
}

/// Convert every supported image directly inside `input` into `output`.
pub fn convert_dir(input: &Path, output: &Path, quality: u8) -> Result<ConvertReport> {
    if !input.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", input.display());
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let patterns = build_globset(&INPUT_PATTERNS)?;
    let mut report = ConvertReport::default();

    let walker = WalkDir::new(input).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let lower = entry.file_name().to_string_lossy().to_lowercase();
        if !patterns.is_match(lower.as_str()) {
            continue;
        }

        let source = entry.path();
        match convert_file(source, output, quality) {
            Ok(path) => report.written.push(path),
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(path = %source.display(), error = %reason, "conversion failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn convert_file(source: &Path, output: &Path, quality: u8) -> Result<PathBuf> {
    let image = image::open(source).context("decode")?;
    let bytes = WebpEncoder
        .encode(&normalize_color(image), quality)
        .context("encode")?;
    let target = output_path(output, source);
    std::fs::write(&target, bytes).with_context(|| format!("write {}", target.display()))?;
    Ok(target)
}

/// Run `shelf convert`.
pub fn run_convert(input: &Path, output: &Path, quality: u8) -> Result<()> {
    let report = convert_dir(input, output, quality)?;
    for path in &report.written {
        println!("  wrote {}", path.display());
    }
    println!(
        "convert: {} written, {} failed",
        report.written.len(),
        report.failed
    );
    Ok(())
}

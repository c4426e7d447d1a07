//! Sweep of undersized artifacts.
//!
//! A previous failed download can leave a tiny placeholder image behind
//! under any of the artifact extensions. After every run the destination
//! directory is scanned (non-recursively) and files below the size floor
//! are removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::scan::build_globset;

/// Extensions the sweep considers, including the legacy `.jpeg`.
pub const SWEEP_PATTERNS: [&str; 4] = ["*.jpg", "*.jpeg", "*.webp", "*.avif"];

/// Result of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Files removed (or, in dry-run mode, that would be removed).
    pub deleted: Vec<PathBuf>,
}

impl SweepReport {
    pub fn count(&self) -> u64 {
        self.deleted.len() as u64
    }
}

/// Delete every artifact in `dir` smaller than `min_size` bytes.
///
/// Files that vanish between listing and stat/delete are skipped silently.
/// A missing `dir` sweeps nothing.
pub fn sweep_undersized(dir: &Path, min_size: u64, dry_run: bool) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "destination missing, nothing to sweep");
        return Ok(report);
    }

    let patterns = build_globset(&SWEEP_PATTERNS)?;

    let walker = WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if is_not_found(&e) => continue,
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !patterns.is_match(entry.file_name()) {
            continue;
        }

        let path = entry.path();
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat file, leaving it");
                continue;
            }
        };
        if size >= min_size {
            continue;
        }

        if dry_run {
            println!("[dry-run] delete (too small, {} bytes): {}", size, path.display());
        } else {
            match std::fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), size, "deleted undersized artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete undersized artifact");
                    continue;
                }
            }
        }
        report.deleted.push(path.to_path_buf());
    }

    Ok(report)
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

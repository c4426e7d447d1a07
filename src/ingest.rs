//! Cover ingestion pipeline orchestration.
//!
//! Coordinates the full run: export → candidates → fetch → transform →
//! store → sweep. Records are processed one at a time; a failure on one
//! record is logged and counted, never fatal. Only configuration problems
//! (bad `since`, missing export, missing columns) abort, and they are
//! detected before the first request goes out.
//!
//! Re-running is cheap and safe: an artifact that already exists is not
//! fetched again unless `overwrite` is set, so an interrupted run resumes
//! where it stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::cleanup::sweep_undersized;
use crate::config::{Config, CoversConfig};
use crate::encode::{resolve_encoder, CoverFormat, FallbackEncoder};
use crate::error::{ConfigError, RecordError};
use crate::extract::{load_records, parse_since};
use crate::fetch::{CoverSource, HttpCoverSource};
use crate::models::{artifact_path, SourceRecord};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::transform::transform;

/// A progress notice is emitted every this many written covers.
pub const PROGRESS_EVERY: u64 = 20;

/// Fully resolved settings for one cover run.
#[derive(Debug, Clone)]
pub struct CoverOptions {
    pub csv: PathBuf,
    pub since: NaiveDate,
    pub out_dir: PathBuf,
    pub min_size: u64,
    pub limit: Option<usize>,
    pub overwrite: bool,
    pub dry_run: bool,
    pub format: CoverFormat,
    pub quality: u8,
    /// 0 disables resizing.
    pub max_width: u32,
}

impl CoverOptions {
    /// Validate `[covers]` settings into run options (flags off).
    pub fn from_config(covers: &CoversConfig) -> Result<Self, ConfigError> {
        let quality = u8::try_from(covers.quality)
            .ok()
            .filter(|q| *q <= 100)
            .ok_or_else(|| {
                ConfigError::InvalidOption(format!(
                    "quality must be in [0, 100] (got {})",
                    covers.quality
                ))
            })?;
        Ok(Self {
            csv: covers.csv.clone(),
            since: parse_since(&covers.since)?,
            out_dir: covers.out_dir.clone(),
            min_size: covers.min_size,
            limit: covers.limit,
            overwrite: false,
            dry_run: false,
            format: covers.format,
            quality,
            max_width: covers.max_width,
        })
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Empty or null-token identifier; never fetched.
    Ineligible,
    /// Artifact already present and overwrite is off.
    SkippedExisting,
    /// Dry run: the fetch that would have happened.
    Planned { url: String, path: PathBuf },
    FetchFailed,
    TooSmall,
    DecodeFailed,
    EncodeFailed,
    WriteFailed,
    Written {
        path: PathBuf,
        format: CoverFormat,
        fell_back: bool,
    },
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: u64,
    pub processed: u64,
    pub planned: u64,
    pub skipped_existing: u64,
    pub ineligible: u64,
    pub too_small: u64,
    pub failed: u64,
    pub fallbacks: u64,
    pub deleted: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Ineligible => self.ineligible += 1,
            RecordOutcome::SkippedExisting => self.skipped_existing += 1,
            RecordOutcome::Planned { .. } => self.planned += 1,
            RecordOutcome::TooSmall => self.too_small += 1,
            RecordOutcome::FetchFailed
            | RecordOutcome::DecodeFailed
            | RecordOutcome::EncodeFailed
            | RecordOutcome::WriteFailed => self.failed += 1,
            RecordOutcome::Written { fell_back, .. } => {
                self.processed += 1;
                if *fell_back {
                    self.fallbacks += 1;
                }
            }
        }
    }
}

/// Run `shelf covers` against the configured HTTP source and print a summary.
pub async fn run_covers(
    config: &Config,
    opts: &CoverOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let source = HttpCoverSource::new(
        config.covers.source_url.clone(),
        Duration::from_secs(config.covers.timeout_secs),
    )
    .context("Failed to build HTTP client")?;
    let encoder = Arc::new(resolve_encoder(opts.format));

    let summary = run_pipeline(opts, &source, encoder, progress).await?;

    if opts.dry_run {
        println!("covers (dry-run)");
    } else {
        println!("covers");
    }
    println!("  candidates: {}", summary.candidates);
    if opts.dry_run {
        println!("  would fetch: {}", summary.planned);
    }
    println!("  already present: {}", summary.skipped_existing);
    println!("  no identifier: {}", summary.ineligible);
    println!("  too small: {}", summary.too_small);
    println!("  failed: {}", summary.failed);
    if summary.fallbacks > 0 {
        println!("  written as fallback format: {}", summary.fallbacks);
    }
    println!(
        "done. processed: {}, deleted: {}",
        summary.processed, summary.deleted
    );

    Ok(summary)
}

/// Run the pipeline with an explicit source and encoder.
///
/// Configuration errors surface as `Err` before any fetch; everything
/// else is folded into the returned [`RunSummary`].
pub async fn run_pipeline(
    opts: &CoverOptions,
    source: &dyn CoverSource,
    encoder: Arc<FallbackEncoder>,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let candidates = load_records(&opts.csv, opts.since, opts.limit)?;

    if !opts.dry_run {
        std::fs::create_dir_all(&opts.out_dir).with_context(|| {
            format!(
                "Failed to create destination directory: {}",
                opts.out_dir.display()
            )
        })?;
    }

    let mut summary = RunSummary {
        candidates: candidates.len() as u64,
        ..Default::default()
    };
    info!(
        candidates = summary.candidates,
        since = %opts.since,
        format = %encoder.requested_format(),
        "starting cover run"
    );
    progress.report(ProgressEvent::Started {
        total: summary.candidates,
    });

    for record in &candidates {
        let outcome = process_record(record, opts, source, &encoder).await;
        summary.record(&outcome);

        if let RecordOutcome::Planned { url, path } = &outcome {
            println!("[dry-run] fetch {} -> {}", url, path.display());
        }
        if matches!(outcome, RecordOutcome::Written { .. })
            && summary.processed % PROGRESS_EVERY == 0
        {
            progress.report(ProgressEvent::Processed {
                n: summary.processed,
                total: summary.candidates,
            });
        }
    }

    progress.report(ProgressEvent::Sweeping);
    let sweep = sweep_undersized(&opts.out_dir, opts.min_size, opts.dry_run)?;
    summary.deleted = sweep.count();

    Ok(summary)
}

/// Take one record through skip checks, fetch, transform and write.
///
/// Never returns an error: every failure is logged with the identifier and
/// mapped to a non-`Written` outcome.
pub async fn process_record(
    record: &SourceRecord,
    opts: &CoverOptions,
    source: &dyn CoverSource,
    encoder: &Arc<FallbackEncoder>,
) -> RecordOutcome {
    if !record.is_eligible() {
        debug!(title = %record.title, "no usable identifier, skipping");
        return RecordOutcome::Ineligible;
    }
    let identifier = record.identifier.as_str();

    // A fallback artifact from an earlier run counts as present too.
    if !opts.overwrite {
        let existing = encoder
            .formats()
            .into_iter()
            .map(|format| artifact_path(&opts.out_dir, identifier, format))
            .find(|path| path.exists());
        if let Some(path) = existing {
            debug!(identifier, path = %path.display(), "artifact exists, skipping");
            return RecordOutcome::SkippedExisting;
        }
    }
    let target = artifact_path(&opts.out_dir, identifier, encoder.requested_format());

    if opts.dry_run {
        return RecordOutcome::Planned {
            url: source.describe(identifier),
            path: target,
        };
    }

    let bytes = match source.fetch(identifier).await {
        Ok(b) => b,
        Err(e) => {
            warn!(identifier, error = %e, "cover fetch failed, skipping");
            return RecordOutcome::FetchFailed;
        }
    };

    if (bytes.len() as u64) < opts.min_size {
        let err = RecordError::TooSmall {
            len: bytes.len(),
            min: opts.min_size,
        };
        warn!(identifier, error = %err, "skipping record");
        return RecordOutcome::TooSmall;
    }

    let encoded = {
        let encoder = Arc::clone(encoder);
        let id = identifier.to_string();
        let (quality, max_width) = (opts.quality, opts.max_width);
        tokio::task::spawn_blocking(move || transform(&bytes, &encoder, quality, max_width, &id))
            .await
            .unwrap_or_else(|e| Err(RecordError::Task(e.to_string())))
    };
    let encoded = match encoded {
        Ok(enc) => enc,
        Err(e) => {
            warn!(identifier, error = %e, "cover transform failed, skipping");
            return match e {
                RecordError::Decode(_) => RecordOutcome::DecodeFailed,
                _ => RecordOutcome::EncodeFailed,
            };
        }
    };

    let path = artifact_path(&opts.out_dir, identifier, encoded.format);
    if let Err(e) = write_atomically(&path, &encoded.bytes) {
        warn!(identifier, path = %path.display(), error = %e, "failed to write cover");
        return RecordOutcome::WriteFailed;
    }
    debug!(identifier, path = %path.display(), bytes = encoded.bytes.len(), "cover written");

    RecordOutcome::Written {
        path,
        format: encoded.format,
        fell_back: encoded.fell_back,
    }
}

/// Write to a hidden sibling, then rename over `path`.
///
/// The sibling's `.part` suffix keeps it out of the sweep patterns.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.part", file_name));
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

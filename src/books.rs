//! Book list for the rendering layer.
//!
//! Loads the same export the cover pipeline reads and attaches the public
//! path of whichever cover artifact exists for each book. Covers are looked
//! up across every artifact extension, so a directory holding a mix of old
//! `.jpg` downloads and newer `.webp` ones still resolves.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;

use crate::config::Config;
use crate::error::ConfigError;
use crate::extract::{load_records, parse_since};
use crate::models::{BookEntry, SourceRecord};

/// Cover extensions tried in order; the first existing file wins.
pub const COVER_EXTENSIONS: [&str; 4] = ["webp", "avif", "jpg", "jpeg"];

/// File name of the first existing cover for `identifier` in `covers_dir`.
pub fn find_cover(covers_dir: &Path, identifier: &str) -> Option<String> {
    COVER_EXTENSIONS
        .iter()
        .map(|ext| format!("{}-cover.{}", identifier, ext))
        .find(|name| covers_dir.join(name).is_file())
}

/// Attach the cover's public path (`<url_prefix>/<file>`) to a record.
pub fn resolve_cover(record: SourceRecord, covers_dir: &Path, url_prefix: &str) -> BookEntry {
    let cover = if record.is_eligible() {
        find_cover(covers_dir, &record.identifier)
            .map(|file| format!("{}/{}", url_prefix.trim_end_matches('/'), file))
    } else {
        None
    };
    BookEntry { record, cover }
}

/// Books read since `since`, most recent first, with covers resolved.
pub fn load_books(
    csv: &Path,
    since: NaiveDate,
    covers_dir: &Path,
    url_prefix: &str,
) -> Result<Vec<BookEntry>, ConfigError> {
    Ok(load_records(csv, since, None)?
        .into_iter()
        .map(|record| resolve_cover(record, covers_dir, url_prefix))
        .collect())
}

/// Run `shelf books`: print the list as a table or JSON.
pub fn run_books(config: &Config, since: Option<String>, json: bool) -> Result<()> {
    let since = parse_since(since.as_deref().unwrap_or(&config.covers.since))?;
    let books = load_books(
        &config.covers.csv,
        since,
        &config.covers.out_dir,
        &config.site.covers_url_prefix,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&books)?);
        return Ok(());
    }

    println!(
        "{:<10}  {:<6}  {:<40}  {:<24}  COVER",
        "READ", "RATING", "TITLE", "AUTHOR"
    );
    for book in &books {
        let r = &book.record;
        println!(
            "{:<10}  {:<6}  {:<40}  {:<24}  {}",
            r.date_read,
            r.my_rating.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            truncate(&r.title, 40),
            truncate(&r.author, 24),
            book.cover.as_deref().unwrap_or("-")
        );
    }
    println!("{} books since {}", books.len(), since);
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

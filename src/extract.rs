//! Record extraction from a Goodreads library export.
//!
//! Turns the CSV into an ordered list of [`SourceRecord`]s: headers are
//! case-normalized, rows with an unreadable `Date Read` are dropped, rows
//! older than the threshold are filtered out, identifiers lose their
//! spreadsheet escaping, and the result is sorted most-recent-first.
//!
//! Column validation happens while reading the header row, so a malformed
//! export fails before the pipeline touches the network.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::models::SourceRecord;

/// Date format of the `Date Read` column.
pub const DATE_READ_FORMAT: &str = "%Y/%m/%d";
/// Date format accepted for the `since` threshold.
pub const SINCE_FORMAT: &str = "%Y-%m-%d";

/// Canonical column names, in the order they are looked up.
const REQUIRED_COLUMNS: [&str; 6] = [
    "title",
    "author",
    "date_read",
    "my_rating",
    "average_rating",
    "isbn",
];

/// Parse the `since` threshold. Anything but `YYYY-MM-DD` is a configuration error.
pub fn parse_since(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), SINCE_FORMAT)
        .map_err(|_| ConfigError::InvalidSince(value.to_string()))
}

/// Strip the `="..."` wrapper spreadsheet exports put around numeric codes.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '=' && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Lower-case a header and map the known multi-word names to canonical ones.
fn canonical_column(header: &str) -> String {
    let lower = header.trim().to_lowercase();
    match lower.as_str() {
        "my rating" => "my_rating".to_string(),
        "average rating" => "average_rating".to_string(),
        "date read" => "date_read".to_string(),
        _ => lower,
    }
}

/// Load the export at `path`, keeping rows read on or after `since`.
///
/// Rows come back sorted by `date_read` descending (ties keep file order),
/// deduplicated on eligible identifier and truncated to `limit` if given
/// and non-zero.
pub fn load_records(
    path: &Path,
    since: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<SourceRecord>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::SourceMissing(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|e| ConfigError::Csv {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    read_records(file, path, since, limit)
}

/// Same as [`load_records`] over any reader; `origin` is only used in errors.
pub fn read_records<R: Read>(
    reader: R,
    origin: &Path,
    since: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<SourceRecord>, ConfigError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| ConfigError::Csv {
            path: origin.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(canonical_column)
        .collect::<Vec<_>>();

    let mut index = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
        match headers.iter().position(|h| h == name) {
            Some(pos) => index[slot] = pos,
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(ConfigError::MissingColumns(missing));
    }
    let [title_ix, author_ix, date_ix, my_rating_ix, avg_rating_ix, isbn_ix] = index;

    let mut records = Vec::new();
    let mut undated = 0usize;
    for (row, result) in rdr.records().enumerate() {
        let row_data = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(row = row + 2, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };
        let field = |ix: usize| row_data.get(ix).unwrap_or("").trim();

        let date_read = match NaiveDate::parse_from_str(field(date_ix), DATE_READ_FORMAT) {
            Ok(d) => d,
            Err(_) => {
                undated += 1;
                continue;
            }
        };
        if date_read < since {
            continue;
        }

        records.push(SourceRecord {
            title: field(title_ix).to_string(),
            author: field(author_ix).to_string(),
            date_read,
            my_rating: field(my_rating_ix).parse().ok(),
            average_rating: field(avg_rating_ix).parse().ok(),
            identifier: normalize_identifier(field(isbn_ix)),
        });
    }
    debug!(kept = records.len(), undated, "parsed export");

    // Vec::sort_by is stable, so equal dates keep their file order.
    records.sort_by(|a, b| b.date_read.cmp(&a.date_read));

    let mut seen = HashSet::new();
    records.retain(|r| !r.is_eligible() || seen.insert(r.identifier.clone()));

    // Zero means no limit.
    if let Some(lim) = limit.filter(|&n| n > 0) {
        records.truncate(lim);
    }

    Ok(records)
}

//! Core data models shared by the cover pipeline and the read-side helpers.
//!
//! These types are plain records: the rendering layer consumes them as-is
//! and the pipeline never mutates them after extraction.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::encode::CoverFormat;

/// One row of the Goodreads export after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub title: String,
    pub author: String,
    pub date_read: NaiveDate,
    pub my_rating: Option<u8>,
    pub average_rating: Option<f64>,
    /// ISBN with spreadsheet escaping (`="..."`) stripped.
    pub identifier: String,
}

impl SourceRecord {
    /// Whether the identifier can key a remote fetch and an artifact name.
    pub fn is_eligible(&self) -> bool {
        is_eligible_identifier(&self.identifier)
    }
}

/// Rejects empty identifiers and the null tokens spreadsheets emit.
pub fn is_eligible_identifier(identifier: &str) -> bool {
    let id = identifier.trim();
    !id.is_empty() && !id.eq_ignore_ascii_case("nan") && !id.eq_ignore_ascii_case("none")
}

/// File name of the artifact for `identifier` in `format`.
pub fn artifact_file_name(identifier: &str, format: CoverFormat) -> String {
    format!("{}-cover.{}", identifier, format.extension())
}

/// Full destination path of the artifact for `identifier` in `format`.
pub fn artifact_path(dir: &Path, identifier: &str, format: CoverFormat) -> std::path::PathBuf {
    dir.join(artifact_file_name(identifier, format))
}

/// A book as handed to the rendering layer: record plus resolved cover.
#[derive(Debug, Clone, Serialize)]
pub struct BookEntry {
    #[serde(flatten)]
    pub record: SourceRecord,
    /// Public path of the first existing artifact, if any.
    pub cover: Option<String>,
}

/// A published blog post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub title: String,
    pub summary: String,
    pub date: NaiveDate,
    pub badge: String,
    pub image: String,
    pub body: String,
    /// Markdown file name, used as the post slug.
    pub name: String,
}

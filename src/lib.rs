//! # Bookshelf
//!
//! Data tooling behind a personal site: a blog rendered from markdown and a
//! "books read" list built from a Goodreads export, with covers fetched from
//! OpenLibrary and re-encoded for the web.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────────────┐   ┌─────────┐
//! │ Goodreads│──▶│  Extract   │──▶│ Fetch → Transform │──▶│  Sweep  │
//! │   CSV    │   │ filter/sort│   │  → Encode → Write │   │ (tiny)  │
//! └──────────┘   └────────────┘   └───────────────────┘   └─────────┘
//!                      │
//!                      ▼
//!                ┌────────────┐        ┌────────────┐
//!                │ Book list  │        │ Post store │  (read side)
//!                └────────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shelf covers --since 2023-01-01 --dry-run   # preview
//! shelf covers --format webp --max-width 1200 # fetch and optimize
//! shelf books --json                          # book list with covers
//! shelf posts                                 # published posts
//! shelf convert --input banners/jpg --output banners/webp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Goodreads CSV → sorted records |
//! | [`fetch`] | Remote cover sources |
//! | [`transform`] | Decode, colour normalization, resize |
//! | [`encode`] | WebP / AVIF / JPEG encoders with fallback |
//! | [`ingest`] | Cover pipeline orchestration |
//! | [`cleanup`] | Sweep of undersized artifacts |
//! | [`books`] | Book list with resolved covers |
//! | [`posts`] | Markdown + front-matter posts |
//! | [`convert`] | Directory re-encoding to WebP |
//! | [`progress`] | Progress reporting |
//! | [`scan`] | Glob matching for directory walks |
//! | [`error`] | Error types |

pub mod books;
pub mod cleanup;
pub mod config;
pub mod convert;
pub mod encode;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod posts;
pub mod progress;
pub mod scan;
pub mod transform;

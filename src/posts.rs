//! Markdown post store.
//!
//! Posts are `.md` files anywhere under the posts directory, each starting
//! with a YAML front-matter block:
//!
//! ```text
//! ---
//! title: Shipping a cover pipeline
//! summary: What I learned resizing a few hundred book covers
//! date: 2024-02-11
//! badge: rust
//! image: images/posts/covers.webp
//! ---
//! Body in markdown...
//! ```
//!
//! Posts dated in the future stay unpublished until their date.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::Post;
use crate::scan::build_globset;

const POST_GLOB: &str = "**/*.md";

#[derive(Debug, Deserialize)]
struct FrontMatter {
    title: String,
    #[serde(default)]
    summary: String,
    date: NaiveDate,
    #[serde(default)]
    badge: String,
    #[serde(default)]
    image: String,
}

/// Split `input` into its front-matter YAML and the markdown body.
///
/// The first line must be `---` (a UTF-8 BOM is tolerated); the block ends
/// at the next `---` or `...` line.
pub fn split_front_matter(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start_matches('\u{feff}');
    let rest = input
        .strip_prefix("---\n")
        .or_else(|| input.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// Parse one post file's contents. `name` becomes the post's slug.
pub fn parse_post(name: &str, contents: &str) -> Result<Post> {
    let (yaml, body) =
        split_front_matter(contents).context("missing or unterminated front matter")?;
    let fm: FrontMatter = serde_yaml::from_str(yaml).context("invalid front matter")?;
    Ok(Post {
        title: fm.title,
        summary: fm.summary,
        date: fm.date,
        badge: fm.badge,
        image: fm.image,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
        name: name.to_string(),
    })
}

/// Every parseable post under `dir`, regardless of date.
fn scan_posts(dir: &Path) -> Result<Vec<Post>> {
    if !dir.is_dir() {
        anyhow::bail!("Posts directory does not exist: {}", dir.display());
    }
    let matcher = build_globset(&[POST_GLOB])?;

    let mut posts = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if !matcher.is_match(relative) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read post: {}", path.display()))?;
        match parse_post(&name, &contents) {
            Ok(post) => posts.push(post),
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(path = %path.display(), error = %reason, "skipping post");
            }
        }
    }
    Ok(posts)
}

/// Published posts (dated on or before `today`), newest first.
pub fn load_posts(dir: &Path, today: NaiveDate) -> Result<Vec<Post>> {
    let mut posts = scan_posts(dir)?;
    posts.retain(|p| p.date <= today);
    // Stable sort; same-day posts are tie-broken by name for determinism.
    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
    Ok(posts)
}

/// Look up a single post by file name anywhere under `dir`.
pub fn find_post(dir: &Path, name: &str) -> Result<Option<Post>> {
    Ok(scan_posts(dir)?.into_iter().find(|p| p.name == name))
}

/// Run `shelf posts`: list published posts.
pub fn run_posts(config: &Config, json: bool) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let posts = load_posts(&config.site.posts_dir, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    println!("{:<10}  {:<12}  {:<48}  FILE", "DATE", "BADGE", "TITLE");
    for post in &posts {
        println!(
            "{:<10}  {:<12}  {:<48}  {}",
            post.date, post.badge, post.title, post.name
        );
    }
    println!("{} published posts", posts.len());
    Ok(())
}

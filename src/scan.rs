//! Glob matching shared by the directory walkers (sweep, posts, convert).

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compile `patterns` into one matcher.
pub fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

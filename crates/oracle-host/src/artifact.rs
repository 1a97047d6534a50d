use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;

/// Stage rendered artifact source at its fixed destination.
///
/// The source is written to a temp file in the destination directory and
/// renamed into place, so a concurrent reader never observes a partial
/// write. Callers serialize whole deploys through
/// [`crate::http::AppState`]'s deploy lock; this only protects the file
/// itself.
pub fn stage_artifact_source(source: &str, destination: &Path) -> Result<()> {
    let dir = destination
        .parent()
        .ok_or_else(|| anyhow!("artifact path {} has no parent", destination.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    staged
        .write_all(source.as_bytes())
        .context("failed to write artifact source")?;
    staged
        .persist(destination)
        .with_context(|| format!("failed to move artifact into {}", destination.display()))?;
    Ok(())
}

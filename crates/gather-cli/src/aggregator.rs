//! Match aggregation and staging.

use std::path::{Path, PathBuf};

use gather_drive::LocalImage;

/// Collects confirmed matches into a staging directory.
///
/// The staging directory is created lazily on the first match. Copies keep
/// their base name; a duplicate base name gets a ` (n)` suffix instead of
/// silently overwriting an earlier match. The match set is append-only and
/// preserves processing order.
pub struct MatchAggregator {
    staging_dir: PathBuf,
    matches: Vec<PathBuf>,
}

impl MatchAggregator {
    pub fn new(staging_dir: PathBuf) -> Self {
        Self { staging_dir, matches: Vec::new() }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Stage a copy of a matched image. Called once per positive decision.
    pub fn record(&mut self, image: &LocalImage) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.staging_dir)?;

        let base = image
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let staged = unique_destination(&self.staging_dir, &base);

        std::fs::copy(&image.path, &staged)?;
        tracing::debug!(from = %image.path.display(), to = %staged.display(), "staged match");
        self.matches.push(staged);
        Ok(())
    }

    /// Return the accumulated match set. Called exactly once per run.
    pub fn finalize(self) -> Vec<PathBuf> {
        self.matches
    }
}

/// First free path for `base` inside `dir`: `name.ext`, `name (1).ext`, …
fn unique_destination(dir: &Path, base: &str) -> PathBuf {
    let candidate = dir.join(base);
    if !candidate.exists() {
        return candidate;
    }

    let stem = Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.to_string());
    let ext = Path::new(base).extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

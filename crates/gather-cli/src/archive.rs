//! Archive packaging.

use std::fs::File;
use std::io;
use std::path::Path;

use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Media type of the produced bundle.
pub const ARCHIVE_MEDIA_TYPE: &str = "application/zip";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Write every file under `staging_dir` into one ZIP at `out_path`,
/// preserving paths relative to the staging directory.
///
/// Returns the number of files packaged.
pub fn write_archive(staging_dir: &Path, out_path: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(out_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0usize;
    for entry in WalkDir::new(staging_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(staging_dir)
            .unwrap_or_else(|_| entry.path());
        let name = rel.to_string_lossy().replace('\\', "/");

        writer.start_file(name, options)?;
        let mut src = File::open(entry.path())?;
        io::copy(&mut src, &mut writer)?;
        count += 1;
    }

    writer.finish()?;
    tracing::debug!(files = count, path = %out_path.display(), "archive written");
    Ok(count)
}

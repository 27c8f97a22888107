//! Pipeline orchestration.
//!
//! One run walks the fixed sequence: validate input → list the remote tree
//! → download every leaf → decode and match each candidate in listing order
//! → stage matches → archive. Input and remote errors abort the run; a
//! candidate that fails to decode is skipped.

use std::path::PathBuf;

use thiserror::Error;

use gather_core::decode::is_allowed_reference;
use gather_core::{decode, reference_present, DecodeError, EmbeddingProvider};
use gather_drive::link::InvalidLink;
use gather_drive::{collect_leaf_files, download_all, parse_folder_link, RemoteStore, StoreError};

use crate::aggregator::MatchAggregator;
use crate::archive::{write_archive, ArchiveError};
use crate::config::RunConfig;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidLink(#[from] InvalidLink),
    #[error("reference image not found: {0}")]
    MissingReference(PathBuf),
    #[error("unsupported reference image format: {0} (allowed: jpg, jpeg, png, heic)")]
    UnsupportedReference(PathBuf),
    #[error("failed to decode reference image: {0}")]
    ReferenceDecode(#[from] DecodeError),
    #[error("embedding extraction failed: {0}")]
    Provider(#[from] gather_core::provider::ProviderError),
    #[error("remote store error: {0}")]
    Store(#[from] StoreError),
    #[error("staging failed: {0}")]
    Staging(#[source] std::io::Error),
    #[error("archiving failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl PipelineError {
    /// True for failures the user can fix before the pipeline ever starts.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidLink(_)
                | PipelineError::MissingReference(_)
                | PipelineError::UnsupportedReference(_)
        )
    }
}

/// Terminal state of a completed run.
#[derive(Debug)]
pub enum RunOutcome {
    /// At least one match; the staged copies and the written archive.
    Success { matches: Vec<PathBuf>, archive: PathBuf },
    /// Every candidate was a non-match; no archive produced.
    NoMatches,
}

/// Execute one run. A pipeline instance is one call; nothing is re-entered.
pub async fn run<S, P>(
    store: &S,
    provider: &mut P,
    config: &RunConfig,
) -> Result<RunOutcome, PipelineError>
where
    S: RemoteStore + ?Sized,
    P: EmbeddingProvider + ?Sized,
{
    // Validate input before touching the network.
    let folder_id = parse_folder_link(&config.folder_link)?;
    if !config.reference.exists() {
        return Err(PipelineError::MissingReference(config.reference.clone()));
    }
    if !is_allowed_reference(&config.reference) {
        return Err(PipelineError::UnsupportedReference(config.reference.clone()));
    }

    // The reference embedding set is computed exactly once and never
    // recomputed mid-run. An empty set is not an error: it simply means
    // no candidate can match.
    let reference_raster = decode(&config.reference)?;
    let reference = provider.extract(&reference_raster)?;
    drop(reference_raster);
    if reference.is_empty() {
        tracing::warn!(path = %config.reference.display(), "no detectable face in reference image");
    } else {
        tracing::info!(faces = reference.len(), "reference embeddings ready");
    }

    let entries = collect_leaf_files(store, &folder_id).await?;
    tracing::info!(folder = %folder_id, leaves = entries.len(), "remote tree listed");

    let images = download_all(store, &entries, &config.download_dir).await?;
    tracing::info!(downloaded = images.len(), dir = %config.download_dir.display(), "downloads complete");

    let mut aggregator = MatchAggregator::new(config.staging_dir.clone());
    for image in &images {
        let raster = match decode(&image.path) {
            Ok(raster) => raster,
            Err(err) => {
                // One bad file must not prevent matches elsewhere.
                tracing::warn!(path = %image.path.display(), error = %err, "skipping undecodable candidate");
                continue;
            }
        };

        let candidate = provider.extract(&raster)?;
        drop(raster);

        if reference_present(provider, &reference, &candidate, config.tolerance) {
            tracing::info!(path = %image.path.display(), "match");
            aggregator.record(image).map_err(PipelineError::Staging)?;
        }
    }

    tracing::info!(matches = aggregator.len(), candidates = images.len(), "matching complete");

    if aggregator.is_empty() {
        return Ok(RunOutcome::NoMatches);
    }

    let staging_dir = aggregator.staging_dir().to_path_buf();
    let matches = aggregator.finalize();
    write_archive(&staging_dir, &config.archive_path)?;
    tracing::info!(matches = matches.len(), archive = %config.archive_path.display(), "run complete");

    Ok(RunOutcome::Success { matches, archive: config.archive_path.clone() })
}

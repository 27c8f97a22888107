//! Remote store capability and traversal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote store error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One entry of a remote folder listing. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub is_container: bool,
    pub parent_id: Option<String>,
}

/// A downloaded file on local storage. Read-only after download.
#[derive(Debug, Clone)]
pub struct LocalImage {
    pub path: PathBuf,
    /// Lowercased extension of the remote name, if it had one.
    pub source_format: Option<String>,
}

/// Listing and retrieval capability of a hierarchical remote store.
#[async_trait]
pub trait RemoteStore {
    /// List the direct children of one container.
    async fn list_children(&self, container_id: &str) -> Result<Vec<RemoteEntry>, StoreError>;

    /// Stream one leaf entry to `dest_dir`, creating the directory if absent.
    async fn download(&self, entry: &RemoteEntry, dest_dir: &Path)
        -> Result<LocalImage, StoreError>;
}

/// Recursively enumerate every leaf file reachable from `root`.
///
/// Depth-first with an explicit worklist; the visited-set terminates cyclic
/// container graphs, and a leaf reachable through two paths is returned
/// once (first-seen wins).
pub async fn collect_leaf_files<S: RemoteStore + ?Sized>(
    store: &S,
    root: &str,
) -> Result<Vec<RemoteEntry>, StoreError> {
    let mut leaves = Vec::new();
    let mut seen_leaves: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut worklist = vec![root.to_string()];

    while let Some(container_id) = worklist.pop() {
        if !visited.insert(container_id.clone()) {
            continue;
        }

        let children = store.list_children(&container_id).await?;
        tracing::debug!(container = %container_id, children = children.len(), "listed container");

        let mut subfolders = Vec::new();
        for entry in children {
            if entry.is_container {
                subfolders.push(entry.id);
            } else if seen_leaves.insert(entry.id.clone()) {
                leaves.push(entry);
            }
        }
        // Reverse so the first-listed subfolder is processed next.
        worklist.extend(subfolders.into_iter().rev());
    }

    Ok(leaves)
}

/// Download every entry, in order. The first failure aborts the whole run;
/// files already on disk are left in place.
pub async fn download_all<S: RemoteStore + ?Sized>(
    store: &S,
    entries: &[RemoteEntry],
    dest_dir: &Path,
) -> Result<Vec<LocalImage>, StoreError> {
    let mut images = Vec::with_capacity(entries.len());
    for entry in entries {
        tracing::debug!(id = %entry.id, name = %entry.name, "downloading");
        images.push(store.download(entry, dest_dir).await?);
    }
    Ok(images)
}

/// Lowercased extension of a remote file name.
pub(crate) fn name_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

//! gather-drive — remote store client for Google Drive.
//!
//! Validates folder links, enumerates every leaf file reachable from a root
//! folder (cycle-safe), and streams downloads to local storage. The
//! orchestrator only sees the [`RemoteStore`] capability, so everything here
//! can be swapped for an in-memory store in tests.

pub mod client;
pub mod config;
pub mod link;
pub mod store;

pub use client::DriveClient;
pub use config::DriveConfig;
pub use link::{parse_folder_link, InvalidLink};
pub use store::{collect_leaf_files, download_all, LocalImage, RemoteEntry, RemoteStore, StoreError};

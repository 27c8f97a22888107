//! gather-core — image decoding and face-embedding matching.
//!
//! Normalizes candidate images (standard rasters and HEIC containers) into
//! one RGB representation, extracts face embeddings via ONNX Runtime (SCRFD
//! detection + ArcFace recognition), and decides whether a reference person
//! appears in a candidate image.

pub mod decode;
pub mod onnx;
pub mod provider;
pub mod types;

pub use decode::{decode, DecodeError, ImageKind};
pub use provider::{reference_present, EmbeddingProvider};
pub use types::{Embedding, DEFAULT_TOLERANCE};

/// Default directory for ONNX model files.
pub fn default_model_dir() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
        .join("gallery-gather/models")
}

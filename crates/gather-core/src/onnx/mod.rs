//! Default embedding provider: SCRFD face detection + ArcFace recognition,
//! both running via ONNX Runtime for CPU inference.

pub mod alignment;
pub mod detector;
pub mod recognizer;

pub use detector::{DetectorError, Face, FaceDetector};
pub use recognizer::{FaceRecognizer, RecognizerError};

use image::RgbImage;

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::types::Embedding;

/// ONNX-backed [`EmbeddingProvider`].
///
/// Detects every face in the raster, aligns each to the canonical 112×112
/// position, and extracts one embedding per face.
pub struct OnnxProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxProvider {
    /// Load both models. Fails fast when either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(detector_path)?;
        let recognizer = FaceRecognizer::load(embedder_path)?;
        Ok(Self { detector, recognizer })
    }
}

impl EmbeddingProvider for OnnxProvider {
    fn extract(&mut self, raster: &RgbImage) -> Result<Vec<Embedding>, ProviderError> {
        let faces = self.detector.detect(raster)?;
        tracing::debug!(faces = faces.len(), "detection complete");

        let mut embeddings = Vec::with_capacity(faces.len());
        for face in &faces {
            let aligned = alignment::align_face(raster, &face.landmarks);
            embeddings.push(self.recognizer.extract(&aligned)?);
        }
        Ok(embeddings)
    }
}

//! Embedding provider capability.
//!
//! The pipeline never talks to a model directly; it goes through
//! [`EmbeddingProvider`] so the comparison and aggregation logic can be
//! exercised with a deterministic stub.

use image::RgbImage;
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("detector error: {0}")]
    Detector(#[from] crate::onnx::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] crate::onnx::RecognizerError),
}

/// Face-embedding extraction and distance capability.
///
/// `extract` returns one embedding per detected face, in detection order;
/// an image with no detectable face yields an empty vector, never an error.
pub trait EmbeddingProvider {
    fn extract(&mut self, raster: &RgbImage) -> Result<Vec<Embedding>, ProviderError>;

    /// Distance between two embeddings in the provider's native metric.
    /// [`crate::DEFAULT_TOLERANCE`] is calibrated against this default.
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.euclidean_distance(b)
    }
}

/// Decide whether the reference person appears among the candidate faces.
///
/// True iff at least one reference embedding lies within `tolerance` of at
/// least one candidate embedding. Either side empty means no possible match.
pub fn reference_present<P: EmbeddingProvider + ?Sized>(
    provider: &P,
    reference: &[Embedding],
    candidate: &[Embedding],
    tolerance: f32,
) -> bool {
    for r in reference {
        for c in candidate {
            if provider.distance(r, c) <= tolerance {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EuclideanStub;

    impl EmbeddingProvider for EuclideanStub {
        fn extract(&mut self, _raster: &RgbImage) -> Result<Vec<Embedding>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn emb(values: &[f32]) -> Embedding {
        Embedding { values: values.to_vec(), model_version: None }
    }

    #[test]
    fn test_empty_reference_never_matches() {
        let candidate = vec![emb(&[0.0, 0.0])];
        assert!(!reference_present(&EuclideanStub, &[], &candidate, 10.0));
    }

    #[test]
    fn test_empty_candidate_never_matches() {
        let reference = vec![emb(&[0.0, 0.0])];
        assert!(!reference_present(&EuclideanStub, &reference, &[], 10.0));
    }

    #[test]
    fn test_both_empty_never_matches() {
        assert!(!reference_present(&EuclideanStub, &[], &[], 10.0));
    }

    #[test]
    fn test_single_close_pair_is_sufficient() {
        // Two faces in the reference, three in the candidate; only one
        // cross pair is within tolerance.
        let reference = vec![emb(&[0.0, 0.0]), emb(&[5.0, 5.0])];
        let candidate = vec![emb(&[9.0, 9.0]), emb(&[5.1, 5.0]), emb(&[-9.0, 0.0])];
        assert!(reference_present(&EuclideanStub, &reference, &candidate, 0.6));
    }

    #[test]
    fn test_all_pairs_outside_tolerance() {
        let reference = vec![emb(&[0.0, 0.0])];
        let candidate = vec![emb(&[1.0, 0.0]), emb(&[0.0, 1.0])];
        assert!(!reference_present(&EuclideanStub, &reference, &candidate, 0.6));
    }

    #[test]
    fn test_monotonic_in_tolerance() {
        let reference = vec![emb(&[0.0, 0.0])];
        let candidate = vec![emb(&[0.5, 0.0])];
        assert!(!reference_present(&EuclideanStub, &reference, &candidate, 0.4));
        assert!(reference_present(&EuclideanStub, &reference, &candidate, 0.5));
        assert!(reference_present(&EuclideanStub, &reference, &candidate, 0.9));
    }

    #[test]
    fn test_boundary_distance_equal_to_tolerance_matches() {
        let reference = vec![emb(&[0.0])];
        let candidate = vec![emb(&[0.6])];
        assert!(reference_present(&EuclideanStub, &reference, &candidate, 0.6));
    }
}

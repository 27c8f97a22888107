//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the SCRFD model with 3-stride anchor-free decoding and NMS
//! post-processing on an RGB raster.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A detected face in source-image coordinates.
///
/// Landmarks are the five InsightFace points:
/// [left_eye, right_eye, nose, left_mouth, right_mouth].
#[derive(Debug, Clone)]
pub struct Face {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub landmarks: [(f32, f32); 5],
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self { session, stride_indices })
    }

    /// Detect faces in an RGB raster, sorted by descending confidence.
    pub fn detect(&mut self, raster: &RgbImage) -> Result<Vec<Face>, DetectorError> {
        let (input, letterbox) = preprocess(raster);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();

        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;
            let (_, kps) = outputs[kps_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("kps stride {stride}: {e}"))
            })?;

            all_detections.extend(decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let mut result = nms(all_detections, SCRFD_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Letterbox the raster into a 640×640 NCHW tensor.
///
/// Channels are BGR with (x - 127.5) / 128.0 normalization (the InsightFace
/// input distribution). Padding stays at 0.0, which is exactly the
/// normalized mean.
fn preprocess(raster: &RgbImage) -> (Array4<f32>, LetterboxInfo) {
    let (width, height) = raster.dimensions();
    let scale = (SCRFD_INPUT_SIZE as f32 / width as f32)
        .min(SCRFD_INPUT_SIZE as f32 / height as f32);

    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    let pad_x = (SCRFD_INPUT_SIZE - new_w) as f32 / 2.0;
    let pad_y = (SCRFD_INPUT_SIZE - new_h) as f32 / 2.0;

    let resized = image::imageops::resize(raster, new_w, new_h, FilterType::Triangle);

    let size = SCRFD_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    let x_off = pad_x.floor() as usize;
    let y_off = pad_y.floor() as usize;

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = x as usize + x_off;
        let ty = y as usize + y_off;
        tensor[[0, 0, ty, tx]] = (pixel[2] as f32 - SCRFD_MEAN) / SCRFD_STD;
        tensor[[0, 1, ty, tx]] = (pixel[1] as f32 - SCRFD_MEAN) / SCRFD_STD;
        tensor[[0, 2, ty, tx]] = (pixel[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
    }

    (tensor, LetterboxInfo { scale, pad_x, pad_y })
}

/// Discover output tensor ordering by name.
///
/// SCRFD exports may name tensors "score_8", "bbox_16", "kps_32", … or use
/// generic numeric names. Falls back to the standard positional ordering:
///   [0-2] = scores, [3-5] = bboxes, [6-8] = kps (strides 8, 16, 32 each).
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = SCRFD_STRIDES.iter().all(|&stride| {
        find("score", stride).is_some()
            && find("bbox", stride).is_some()
            && find("kps", stride).is_some()
    });

    if named {
        std::array::from_fn(|i| {
            let stride = SCRFD_STRIDES[i];
            (
                find("score", stride).unwrap(),
                find("bbox", stride).unwrap(),
                find("kps", stride).unwrap(),
            )
        })
    } else {
        tracing::debug!(?names, "SCRFD output names not recognized, using positional mapping");
        [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
    }
}

/// Decode detections for a single stride level back into source coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<Face> {
    let grid = SCRFD_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid) as f32 * stride as f32;
        let anchor_cy = (anchor_idx / grid) as f32 * stride as f32;

        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }
        let kps_off = idx * 10;
        if kps_off + 9 >= kps.len() {
            continue;
        }

        // Offsets are in stride units around the anchor center.
        let x1 = anchor_cx - bboxes[bbox_off] * stride as f32;
        let y1 = anchor_cy - bboxes[bbox_off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[bbox_off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[bbox_off + 3] * stride as f32;

        let unmap = |x: f32, y: f32| -> (f32, f32) {
            (
                (x - letterbox.pad_x) / letterbox.scale,
                (y - letterbox.pad_y) / letterbox.scale,
            )
        };

        let (ox1, oy1) = unmap(x1, y1);
        let (ox2, oy2) = unmap(x2, y2);

        let mut landmarks = [(0.0f32, 0.0f32); 5];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            let lx = anchor_cx + kps[kps_off + i * 2] * stride as f32;
            let ly = anchor_cy + kps[kps_off + i * 2 + 1] * stride as f32;
            *lm = unmap(lx, ly);
        }

        detections.push(Face {
            x1: ox1,
            y1: oy1,
            x2: ox2,
            y2: oy2,
            confidence: score,
            landmarks,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<Face>, iou_threshold: f32) -> Vec<Face> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Face> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-Union between two face boxes.
fn iou(a: &Face, b: &Face) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;

    if union > 0.0 { inter / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_face(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> Face {
        Face {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
            landmarks: [(0.0, 0.0); 5],
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_face(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_face(20.0, 20.0, 30.0, 30.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_face(5.0, 0.0, 15.0, 10.0, 1.0);
        // Overlap 5x10 = 50, union 100+100-50 = 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_face(0.0, 0.0, 100.0, 100.0, 0.9),
            make_face(5.0, 5.0, 105.0, 105.0, 0.8),
            make_face(200.0, 200.0, 250.0, 250.0, 0.7),
        ];
        let result = nms(detections, 0.4);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let raster = RgbImage::new(320, 240);
        let (_, letterbox) = preprocess(&raster);

        let orig = (100.0f32, 50.0f32);
        let mapped = (
            orig.0 * letterbox.scale + letterbox.pad_x,
            orig.1 * letterbox.scale + letterbox.pad_y,
        );
        let recovered = (
            (mapped.0 - letterbox.pad_x) / letterbox.scale,
            (mapped.1 - letterbox.pad_y) / letterbox.scale,
        );

        assert!((recovered.0 - orig.0).abs() < 0.1);
        assert!((recovered.1 - orig.1).abs() < 0.1);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        // 2:1 aspect raster letterboxes with vertical padding; the padded
        // rows stay at the normalized mean (0.0).
        let raster = RgbImage::from_pixel(200, 100, image::Rgb([255, 0, 0]));
        let (tensor, letterbox) = preprocess(&raster);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!(letterbox.pad_y > 0.0);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        // Red pixel in BGR layout: channel 0 (B) is dark, channel 2 (R) bright.
        let mid = 320usize;
        assert!(tensor[[0, 0, mid, mid]] < 0.0);
        assert!(tensor[[0, 2, mid, mid]] > 0.9);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8", "kps_16",
            "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices[0], (0, 3, 6));
        assert_eq!(indices[1], (1, 4, 7));
        assert_eq!(indices[2], (2, 5, 8));
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices[0], (2, 0, 1));
        assert_eq!(indices[1], (5, 3, 4));
        assert_eq!(indices[2], (8, 6, 7));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(
            discover_output_indices(&names),
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        );
    }

    #[test]
    fn test_decode_stride_skips_low_scores() {
        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let grid = 640 / 8;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let scores = vec![0.1f32; anchors];
        let bboxes = vec![0.0f32; anchors * 4];
        let kps = vec![0.0f32; anchors * 10];

        let faces = decode_stride(&scores, &bboxes, &kps, 8, &letterbox, 0.5);
        assert!(faces.is_empty());
    }

    #[test]
    fn test_decode_stride_maps_anchor_center() {
        let letterbox = LetterboxInfo { scale: 2.0, pad_x: 0.0, pad_y: 0.0 };
        let grid = 640 / 32;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        // Anchor at grid cell (1, 0): center x = 32, y = 0.
        scores[SCRFD_ANCHORS_PER_CELL] = 0.9;
        let mut bboxes = vec![0.0f32; anchors * 4];
        // One stride unit in every direction -> 64x64 box around the center.
        let off = SCRFD_ANCHORS_PER_CELL * 4;
        bboxes[off..off + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
        let kps = vec![0.0f32; anchors * 10];

        let faces = decode_stride(&scores, &bboxes, &kps, 32, &letterbox, 0.5);
        assert_eq!(faces.len(), 1);
        // Letterbox scale 2.0 halves everything on the way back.
        assert!((faces[0].x1 - 0.0).abs() < 1e-4);
        assert!((faces[0].x2 - 32.0).abs() < 1e-4);
        assert!((faces[0].y1 + 16.0).abs() < 1e-4);
        assert!((faces[0].y2 - 16.0).abs() < 1e-4);
    }
}

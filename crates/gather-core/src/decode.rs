//! Multi-format image decoding.
//!
//! Every supported encoding converges to one `RgbImage` so downstream face
//! matching is format-agnostic. Standard rasters go through the `image`
//! crate with EXIF orientation applied; HEIC containers have their own read
//! path (libheif) that reconstructs the same pixel layout.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

/// Extensions accepted for the uploaded reference image.
pub const REFERENCE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "heic"];

/// ISO-BMFF brands that identify a HEIF-family container.
const HEIF_BRANDS: [&[u8; 4]; 6] = [b"heic", b"heix", b"hevc", b"hevx", b"mif1", b"msf1"];

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported image format: {0}")]
    Unsupported(PathBuf),
    #[error("image decode failed: {0}")]
    Malformed(#[from] image::ImageError),
    #[cfg(feature = "heif")]
    #[error("heif decode failed: {0}")]
    Heif(#[from] libheif_rs::HeifError),
    #[cfg(feature = "heif")]
    #[error("heif container has an unexpected plane layout")]
    HeifLayout,
    #[cfg(not(feature = "heif"))]
    #[error("heif support not compiled in (enable the `heif` feature)")]
    HeifDisabled,
}

/// Closed classification of decode paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    StandardRaster,
    SpecializedContainer,
    Unsupported,
}

impl ImageKind {
    /// Classify by extension first, then by content signature.
    ///
    /// The signature check matters for Drive downloads: remote names are
    /// user-controlled and an extensionless HEIC still carries its `ftyp`
    /// brand.
    pub fn classify(path: &Path, bytes: &[u8]) -> ImageKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("heic" | "heif") => return ImageKind::SpecializedContainer,
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tif" | "tiff") => {
                return ImageKind::StandardRaster;
            }
            _ => {}
        }

        if has_heif_signature(bytes) {
            ImageKind::SpecializedContainer
        } else if image::guess_format(bytes).is_ok() {
            ImageKind::StandardRaster
        } else {
            ImageKind::Unsupported
        }
    }
}

/// True when the buffer starts with an ISO-BMFF `ftyp` box carrying a
/// HEIF-family major brand.
fn has_heif_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let brand: &[u8] = &bytes[8..12];
    HEIF_BRANDS.iter().any(|b| brand == *b)
}

/// Decode an image file into an RGB raster.
pub fn decode(path: &Path) -> Result<RgbImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match ImageKind::classify(path, &bytes) {
        ImageKind::StandardRaster => decode_standard(&bytes),
        ImageKind::SpecializedContainer => decode_heif(&bytes),
        ImageKind::Unsupported => Err(DecodeError::Unsupported(path.to_path_buf())),
    }
}

/// Decode a standard raster and apply EXIF orientation.
fn decode_standard(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(apply_exif_orientation(bytes, decoded).to_rgb8())
}

/// Apply the EXIF orientation tag, if any.
///
/// Phones often record rotation in metadata instead of rotating pixels; a
/// missing or unreadable tag means "already upright".
fn apply_exif_orientation(bytes: &[u8], image: image::DynamicImage) -> image::DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1);

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Decode a HEIC container and reconstruct the standard raster layout.
#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes)?;
    let handle = ctx.primary_image_handle()?;
    let decoded = lib.decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)?;

    let planes = decoded.planes();
    let plane = planes.interleaved.ok_or(DecodeError::HeifLayout)?;

    let width = plane.width;
    let height = plane.height;
    let stride = plane.stride;

    // The decoded rows may be padded; repack into a tight RGB8 buffer so
    // both decode paths produce the same representation.
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        let row = &plane.data[y * stride..y * stride + width as usize * 3];
        pixels.extend_from_slice(row);
    }

    RgbImage::from_raw(width, height, pixels).ok_or(DecodeError::HeifLayout)
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    Err(DecodeError::HeifDisabled)
}

/// True when the path's extension is on the reference-image allow-list.
pub fn is_allowed_reference(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| REFERENCE_EXTENSIONS.contains(&e.as_str()))
}

//! Production backend: `image` for decode/resample, libwebp for encode.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP, BMP, TIFF) | `image` crate, format sniffed from content |
//! | Flatten alpha / palette | `DynamicImage::to_rgb8` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → WebP | `webp::Encoder::encode_advanced` (lossy, method 6) |
//! | Write | `tempfile` in the destination dir, then atomic rename |

use super::backend::{Dimensions, ImageBackend, TransformError};
use super::params::{Quality, ResizeParams};
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use std::io::Write;
use std::path::Path;

/// Input extensions picked up by `optimize`. Matched case-sensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Extension of every file the optimizer writes.
pub const OUTPUT_EXTENSION: &str = "webp";

/// MIME type of the optimizer's output.
pub const OUTPUT_CONTENT_TYPE: &str = "image/webp";

/// libwebp compression effort, 0 (fast) to 6 (smallest output).
const WEBP_METHOD: i32 = 6;

/// Temp files live next to their destination until renamed into place.
const PARTIAL_PREFIX: &str = ".storeimg-";
const PARTIAL_SUFFIX: &str = ".part";

/// Whether `path` has one of the supported extensions (exact, case-sensitive).
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e))
}

/// Pure Rust decode and resample, libwebp encode.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

type FileReader = ImageReader<std::io::BufReader<std::fs::File>>;

fn open_reader(path: &Path) -> Result<FileReader, TransformError> {
    ImageReader::open(path)?
        .with_guessed_format()
        .map_err(TransformError::Io)
}

/// Decode a source image and flatten it to 8-bit RGB.
///
/// Alpha is dropped and palettes are expanded; the output is always opaque.
fn load_rgb(path: &Path) -> Result<RgbImage, TransformError> {
    let img = open_reader(path)?
        .decode()
        .map_err(|e| TransformError::Decode(format!("{}: {}", path.display(), e)))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(TransformError::Decode(format!(
            "{}: image has zero width or height",
            path.display()
        )));
    }
    Ok(img.to_rgb8())
}

/// Encode an RGB raster as lossy WebP.
fn encode_webp(img: &RgbImage, quality: Quality) -> Result<Vec<u8>, TransformError> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| TransformError::Encode("libwebp config init failed".into()))?;
    config.lossless = 0;
    config.quality = quality.value() as f32;
    config.method = WEBP_METHOD;

    let encoder = webp::Encoder::from_rgb(img.as_raw(), img.width(), img.height());
    let encoded = encoder
        .encode_advanced(&config)
        .map_err(|e| TransformError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(encoded.to_vec())
}

/// Write `bytes` to `path` via a temp file in the same directory.
///
/// The destination either keeps its previous state or holds the complete new
/// file. The temp file is removed on every error path when it is dropped.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), TransformError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let write_err = |e: std::io::Error| {
        TransformError::Encode(format!("cannot write {}: {}", path.display(), e))
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Delete temp files an aborted write left in `dir`. Returns how many went.
///
/// Only names matching the atomic-write pattern are touched. Errors are
/// ignored: this runs on the way out of the process.
pub fn remove_partial_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name().to_str().is_some_and(|name| {
                name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
            })
        })
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, TransformError> {
        let (width, height) = open_reader(path)?
            .into_dimensions()
            .map_err(|e| TransformError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), TransformError> {
        let rgb = load_rgb(&params.source)?;
        let resized =
            image::imageops::resize(&rgb, params.width, params.height, FilterType::Lanczos3);
        drop(rgb);
        let encoded = encode_webp(&resized, params.quality)?;
        write_atomically(&params.output, &encoded)
    }
}

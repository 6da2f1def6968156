//! High-level image operations.
//!
//! These functions combine the geometry calculations with backend execution:
//! read the source dimensions, decide the output size for a variant, run the
//! backend, and measure what it saved.

use super::backend::{ImageBackend, TransformError};
use super::calculations::{calculate_fit_dimensions, reduction_percent};
use super::params::{Quality, ResizeParams};
use crate::catalog::VariantSpec;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Outcome of one successful transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Source file name (no directory).
    pub filename: String,
    /// Source size on disk, in bytes.
    pub original_size: u64,
    /// Output size on disk, in bytes.
    pub compressed_size: u64,
    /// Bytes saved, as a percentage of the original. Negative if the file grew.
    pub reduction_percent: f64,
    /// Output pixel dimensions.
    pub dimensions: (u32, u32),
}

/// Plan a transform without executing it.
///
/// Fails with [`TransformError::Decode`] when the source reports a zero dimension.
pub fn plan_transform(
    source: &Path,
    output: &Path,
    source_dims: (u32, u32),
    spec: &VariantSpec,
) -> Result<ResizeParams> {
    let (width, height) =
        calculate_fit_dimensions(source_dims, (spec.width, spec.height), spec.fit).ok_or_else(
            || {
                TransformError::Decode(format!(
                    "{}: image has zero width or height",
                    source.display()
                ))
            },
        )?;

    Ok(ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        quality: Quality::new(spec.quality),
    })
}

/// Resize and recompress `source` into `output` according to `spec`.
///
/// The source file is never modified.
pub fn transform(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    spec: &VariantSpec,
) -> Result<ProcessedImage> {
    let dims = backend.identify(source)?;
    let params = plan_transform(source, output, (dims.width, dims.height), spec)?;
    log::debug!(
        "{}: {}x{} → {}x{} at quality {}",
        source.display(),
        dims.width,
        dims.height,
        params.width,
        params.height,
        params.quality.value()
    );

    let original_size = std::fs::metadata(source)?.len();
    backend.resize(&params)?;
    let compressed_size = std::fs::metadata(output)?.len();

    Ok(ProcessedImage {
        filename: source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string()),
        original_size,
        compressed_size,
        reduction_percent: reduction_percent(original_size, compressed_size),
        dimensions: (params.width, params.height),
    })
}

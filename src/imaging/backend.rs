//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the optimizer needs:
//! `identify` (read pixel dimensions) and `resize` (decode, flatten, resample,
//! encode to WebP, write). The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests use a recording mock.

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

/// Per-file failure while turning one source image into one WebP.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cancelled before processing")]
    Cancelled,
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, TransformError>;

    /// Decode `params.source`, resample to exactly `width`x`height`, and write
    /// an opaque lossy WebP to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), TransformError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock backend that records operations instead of touching pixels.
    ///
    /// `resize` writes `output_len` zero bytes to the output path so size
    /// statistics have something to measure. Sources registered as broken
    /// fail to identify with a decode error.
    pub struct MockBackend {
        pub dimensions: Mutex<HashMap<PathBuf, Dimensions>>,
        pub default_dimensions: Dimensions,
        pub broken: Mutex<Vec<PathBuf>>,
        pub output_len: usize,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_dimensions(Dimensions {
                width: 800,
                height: 600,
            })
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every source identifies as `dims`.
        pub fn with_dimensions(dims: Dimensions) -> Self {
            Self {
                dimensions: Mutex::new(HashMap::new()),
                default_dimensions: dims,
                broken: Mutex::new(Vec::new()),
                output_len: 64,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn set_dimensions(&self, path: &Path, dims: Dimensions) {
            self.dimensions
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), dims);
        }

        pub fn mark_broken(&self, path: &Path) {
            self.broken.lock().unwrap().push(path.to_path_buf());
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, TransformError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            if self.broken.lock().unwrap().iter().any(|p| p == path) {
                return Err(TransformError::Decode(format!(
                    "{}: not an image",
                    path.display()
                )));
            }

            Ok(self
                .dimensions
                .lock()
                .unwrap()
                .get(path)
                .copied()
                .unwrap_or(self.default_dimensions))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), TransformError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                quality: params.quality.value(),
            });
            std::fs::write(&params.output, vec![0u8; self.output_len])
                .map_err(|e| TransformError::Encode(e.to_string()))
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(Dimensions {
            width: 1024,
            height: 768,
        });

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 1024);
        assert_eq!(result.height, 768);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_broken_source_is_decode_error() {
        let backend = MockBackend::new();
        backend.mark_broken(Path::new("/bad.png"));
        assert!(matches!(
            backend.identify(Path::new("/bad.png")),
            Err(TransformError::Decode(_))
        ));
    }

    #[test]
    fn mock_records_resize_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.webp");
        let backend = MockBackend::new();

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 400,
                height: 300,
                quality: Quality::new(60),
            })
            .unwrap();

        assert_eq!(std::fs::metadata(&output).unwrap().len(), 64);
        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Resize {
                width: 400,
                height: 300,
                quality: 60,
                ..
            }
        ));
    }

    #[test]
    fn transform_error_messages() {
        assert_eq!(
            TransformError::Decode("bad header".into()).to_string(),
            "Decode failed: bad header"
        );
        assert_eq!(
            TransformError::Cancelled.to_string(),
            "Cancelled before processing"
        );
    }
}

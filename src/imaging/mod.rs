//! Image processing: decode, flatten, resample, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Geometry** | [`calculate_fit_dimensions`] (cover / contain) |
//! | **Resize → WebP** | Lanczos3 + libwebp (method 6) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and size statistics
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`transform`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, ImageBackend, TransformError};
pub use calculations::{calculate_fit_dimensions, reduction_percent};
pub use operations::{ProcessedImage, plan_transform, transform};
pub use params::{Quality, ResizeParams};
pub use rust_backend::{
    OUTPUT_CONTENT_TYPE, OUTPUT_EXTENSION, RustBackend, is_supported_input, remove_partial_files,
};

//! # storeimg
//!
//! Image tooling for a storefront: shrink product photography into small
//! lossy WebP files shaped for a named display slot, then push the results to
//! a Supabase Storage bucket.
//!
//! # Two Commands, One Directory Between Them
//!
//! ```text
//! 1. optimize   originals/  →  optimized/*.webp   (resize + recompress)
//! 2. upload     optimized/  →  bucket/prefix/      (Supabase Storage)
//! ```
//!
//! The commands never call each other. `optimize` writes a directory that
//! `upload` later reads; either can be re-run on its own.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Named [`VariantSpec`](catalog::VariantSpec) presets: box, quality, fit mode |
//! | [`config`] | `storeimg.toml` loading, merging over stock defaults, validation; storage credentials |
//! | [`imaging`] | Fit geometry, the [`ImageBackend`](imaging::ImageBackend) trait, decode → resize → WebP |
//! | [`optimize`] | Directory batch driver, per-file outcomes, size-weighted summary |
//! | [`upload`] | Upload driver and the Supabase Storage REST client |
//! | [`cancel`] | Ctrl-C cancellation shared by both drivers |
//! | [`output`] | CLI output formatting, pure `format_*` plus `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## Variants Are Data
//!
//! The six stock variants (`product_card`, `thumbnail`, `mattress_card`,
//! `hero_banner`, `home_banner`, `full_screen`) are ordinary values in a
//! [`VariantCatalog`](catalog::VariantCatalog). A `storeimg.toml` can override
//! any field of a stock variant or add new ones; the driver only ever sees the
//! resolved [`VariantSpec`](catalog::VariantSpec) it is handed.
//!
//! ## Cover Without Cropping
//!
//! `cover` scales so the image covers the box, leaving one axis larger than
//! the box. Nothing is cropped; the storefront's CSS does the framing.
//!
//! ## Per-File Failure Isolation
//!
//! A corrupt file or a rejected upload is recorded and the batch continues.
//! Only problems that make the whole batch meaningless (unknown variant,
//! missing credentials, unreadable input directory) stop the run early.
//!
//! ## Opaque Output
//!
//! Alpha is dropped before encoding, so every produced WebP is RGB regardless
//! of source transparency.

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod imaging;
pub mod optimize;
pub mod output;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;

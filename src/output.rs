//! CLI output formatting for both commands.
//!
//! # Output Format
//!
//! ## Optimize
//!
//! ```text
//! Optimizing images from: originals
//! Output directory: optimized
//! Variant: product_card (300x300, quality 60, cover)
//! ------------------------------------------------------------
//! ✓ sofa.jpg: 812.3KB → 41.0KB (94.9% reduction) 400x300
//! ✗ broken.jpg: Decode failed: broken.jpg: unexpected EOF
//!
//! ============================================================
//! COMPRESSION SUMMARY
//! ============================================================
//! Images processed: 1
//! Total original size: 0.79 MB
//! Total compressed size: 0.04 MB
//! Space saved: 94.9%
//! ============================================================
//!
//! Failed: 1
//!   - broken.jpg: Decode failed: broken.jpg: unexpected EOF
//! ```
//!
//! ## Upload
//!
//! ```text
//! Uploading 2 images to products/cards...
//! ------------------------------------------------------------
//! ✓ sofa.webp
//! ✗ lamp.webp: Storage responded 409: The resource already exists
//! ------------------------------------------------------------
//!
//! Uploaded: 1/2
//!
//! Failed uploads:
//!   - lamp.webp: Storage responded 409: The resource already exists
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::catalog::VariantCatalog;
use crate::catalog::VariantSpec;
use crate::optimize::{OptimizeEvent, Summary};
use crate::upload::{UploadEvent, UploadReport};
use std::path::Path;

const RULE_WIDTH: usize = 60;

fn thin_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn thick_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Bytes as kilobytes with one decimal: `41.0KB`.
fn kilobytes(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}

/// Bytes as megabytes with two decimals: `0.79 MB`.
fn megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// `  - name: message` lines under a failure heading.
fn failure_list(failures: &[(String, String)]) -> Vec<String> {
    failures
        .iter()
        .map(|(name, error)| format!("  - {}: {}", name, error))
        .collect()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Optimize
// ============================================================================

pub fn format_optimize_header(input: &Path, output: &Path, spec: &VariantSpec) -> Vec<String> {
    vec![
        format!("Optimizing images from: {}", input.display()),
        format!("Output directory: {}", output.display()),
        format!("Variant: {}", spec),
        thin_rule(),
    ]
}

pub fn print_optimize_header(input: &Path, output: &Path, spec: &VariantSpec) {
    print_lines(format_optimize_header(input, output, spec));
}

/// One progress line per file, attributed by file name.
pub fn format_optimize_event(event: &OptimizeEvent) -> String {
    match event {
        OptimizeEvent::Processed(image) => format!(
            "\u{2713} {}: {} \u{2192} {} ({:.1}% reduction) {}x{}",
            image.filename,
            kilobytes(image.original_size),
            kilobytes(image.compressed_size),
            image.reduction_percent,
            image.dimensions.0,
            image.dimensions.1
        ),
        OptimizeEvent::Failed { filename, error } => {
            format!("\u{2717} {}: {}", filename, error)
        }
    }
}

pub fn format_summary(summary: &Summary) -> Vec<String> {
    let mut lines = vec![String::new()];
    if summary.processed == 0 {
        lines.push("No images processed.".to_string());
    } else {
        lines.push(thick_rule());
        lines.push("COMPRESSION SUMMARY".to_string());
        lines.push(thick_rule());
        lines.push(format!("Images processed: {}", summary.processed));
        lines.push(format!(
            "Total original size: {}",
            megabytes(summary.total_original)
        ));
        lines.push(format!(
            "Total compressed size: {}",
            megabytes(summary.total_compressed)
        ));
        lines.push(format!("Space saved: {:.1}%", summary.reduction_percent));
        lines.push(thick_rule());
    }

    if !summary.failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("Failed: {}", summary.failures.len()));
        lines.extend(failure_list(&summary.failures));
    }
    lines
}

pub fn print_summary(summary: &Summary) {
    print_lines(format_summary(summary));
}

// ============================================================================
// Upload
// ============================================================================

pub fn format_upload_header(count: usize, bucket: &str, prefix: &str) -> Vec<String> {
    let prefix = prefix.trim_matches('/');
    let target = if prefix.is_empty() {
        bucket.to_string()
    } else {
        format!("{}/{}", bucket, prefix)
    };
    vec![
        String::new(),
        format!("Uploading {} images to {}...", count, target),
        thin_rule(),
    ]
}

pub fn print_upload_header(count: usize, bucket: &str, prefix: &str) {
    print_lines(format_upload_header(count, bucket, prefix));
}

pub fn format_upload_event(event: &UploadEvent) -> String {
    match event {
        UploadEvent::Uploaded { filename, .. } => format!("\u{2713} {}", filename),
        UploadEvent::Failed { filename, error } => {
            format!("\u{2717} {}: {}", filename, error)
        }
    }
}

/// Closing block for an upload run. An empty report only names the directory.
pub fn format_upload_report(report: &UploadReport, local_dir: &Path) -> Vec<String> {
    if report.total() == 0 {
        return vec![format!("No .webp files found in {}", local_dir.display())];
    }

    let mut lines = vec![
        thin_rule(),
        String::new(),
        format!("Uploaded: {}/{}", report.uploaded_count(), report.total()),
    ];
    let failures = report.failures();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Failed uploads:".to_string());
        lines.extend(failure_list(&failures));
    }
    lines
}

pub fn print_upload_report(report: &UploadReport, local_dir: &Path) {
    print_lines(format_upload_report(report, local_dir));
}

// ============================================================================
// Variants
// ============================================================================

/// Catalog listing, one variant per line, default marked with `*`.
pub fn format_variants(catalog: &VariantCatalog, default: &str) -> Vec<String> {
    let width = catalog.names().iter().map(|n| n.len()).max().unwrap_or(0);
    catalog
        .iter()
        .map(|spec| {
            let marker = if spec.name == default { "*" } else { " " };
            format!(
                "{} {:<width$}  {}x{}  quality {:>3}  {}",
                marker,
                spec.name,
                spec.width,
                spec.height,
                spec.quality,
                spec.fit,
                width = width
            )
        })
        .collect()
}

pub fn print_variants(catalog: &VariantCatalog, default: &str) {
    print_lines(format_variants(catalog, default));
}

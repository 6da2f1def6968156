//! Directory batch driver for `storeimg optimize`.
//!
//! Turns every supported image in an input directory into a WebP in the
//! output directory, using one [`VariantSpec`]:
//!
//! ```text
//! originals/                      optimized/
//! ├── sofa-grey.jpg        →      ├── sofa-grey.webp
//! ├── lamp.png             →      ├── lamp.webp
//! ├── notes.txt                   │   (ignored: not an image extension)
//! └── broken.jpg           ✗      └── (failure recorded, batch continues)
//! ```
//!
//! ## Failure Isolation
//!
//! Each file produces a [`FileOutcome`] holding either a
//! [`ProcessedImage`] or the [`TransformError`] that stopped it. A bad file
//! never aborts the batch; only directory-level problems (unreadable input,
//! uncreatable output) are fatal.
//!
//! ## Parallel Processing
//!
//! Files are mapped with [rayon](https://docs.rs/rayon) on whatever pool the
//! caller installed (one thread by default, see
//! [`effective_threads`](crate::config::effective_threads)). The outcome
//! vector keeps directory enumeration order regardless of which worker
//! finishes first; progress events arrive in completion order.

use crate::cancel::CancelToken;
use crate::catalog::VariantSpec;
use crate::imaging::{
    ImageBackend, OUTPUT_EXTENSION, ProcessedImage, RustBackend, TransformError,
    is_supported_input, reduction_percent, transform,
};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("Cannot read input directory {}: {source}", path.display())]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Progress notification, sent once per file as it completes.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeEvent {
    Processed(ProcessedImage),
    Failed { filename: String, error: String },
}

/// What happened to one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub filename: String,
    pub result: Result<ProcessedImage, TransformError>,
}

impl FileOutcome {
    fn event(&self) -> OptimizeEvent {
        match &self.result {
            Ok(image) => OptimizeEvent::Processed(image.clone()),
            Err(e) => OptimizeEvent::Failed {
                filename: self.filename.clone(),
                error: e.to_string(),
            },
        }
    }
}

/// All outcomes of one `optimize` run, in enumeration order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &ProcessedImage> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TransformError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.filename.as_str(), e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.outcomes)
    }
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub processed: usize,
    pub total_original: u64,
    pub total_compressed: u64,
    /// Size-weighted: computed from the byte totals, not averaged per file.
    pub reduction_percent: f64,
    /// `(filename, message)` for every failed file.
    pub failures: Vec<(String, String)>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.processed == 0 && self.failures.is_empty()
    }
}

/// Sum sizes over successful outcomes; failures are listed but not counted.
pub fn summarize(outcomes: &[FileOutcome]) -> Summary {
    let mut summary = Summary {
        processed: 0,
        total_original: 0,
        total_compressed: 0,
        reduction_percent: 0.0,
        failures: Vec::new(),
    };
    for outcome in outcomes {
        match &outcome.result {
            Ok(image) => {
                summary.processed += 1;
                summary.total_original += image.original_size;
                summary.total_compressed += image.compressed_size;
            }
            Err(e) => summary
                .failures
                .push((outcome.filename.clone(), e.to_string())),
        }
    }
    summary.reduction_percent = reduction_percent(summary.total_original, summary.total_compressed);
    summary
}

/// List supported images directly inside `dir`, in enumeration order.
///
/// Not recursive. Extensions are matched exactly (`.JPG` is skipped).
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, OptimizeError> {
    let input_err = |source| OptimizeError::InputDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir).map_err(input_err)? {
        let path = entry.map_err(input_err)?.path();
        if path.is_file() && is_supported_input(&path) {
            inputs.push(path);
        }
    }
    Ok(inputs)
}

/// Output location for a source: same stem, `.webp`, inside `output_dir`.
pub fn output_path_for(source: &Path, output_dir: &Path) -> PathBuf {
    let mut name = source
        .file_stem()
        .unwrap_or(source.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    output_dir.join(name)
}

/// Optimize a directory with the production backend.
pub fn process_directory(
    input_dir: &Path,
    output_dir: &Path,
    spec: &VariantSpec,
    cancel: &CancelToken,
    events: Option<Sender<OptimizeEvent>>,
) -> Result<BatchReport, OptimizeError> {
    process_directory_with_backend(
        &RustBackend::new(),
        input_dir,
        output_dir,
        spec,
        cancel,
        events,
    )
}

/// Optimize a directory using a specific backend (allows testing with mock).
pub fn process_directory_with_backend(
    backend: &impl ImageBackend,
    input_dir: &Path,
    output_dir: &Path,
    spec: &VariantSpec,
    cancel: &CancelToken,
    events: Option<Sender<OptimizeEvent>>,
) -> Result<BatchReport, OptimizeError> {
    let inputs = collect_inputs(input_dir)?;
    fs::create_dir_all(output_dir).map_err(|source| OptimizeError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    log::info!(
        "{} images in {} for variant {}",
        inputs.len(),
        input_dir.display(),
        spec.name
    );
    let claimed_by = output_claims(&inputs);
    // Same directory under any spelling: no output may land on a source.
    let protected: HashSet<&OsStr> = if same_directory(input_dir, output_dir) {
        inputs.iter().filter_map(|p| p.file_name()).collect()
    } else {
        HashSet::new()
    };

    let outcomes: Vec<FileOutcome> = inputs
        .par_iter()
        .zip(claimed_by.par_iter())
        .map(|(source, claimed_by)| {
            let filename = source
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output = output_path_for(source, output_dir);

            let result = if cancel.is_cancelled() {
                Err(TransformError::Cancelled)
            } else if let Some(name) = output.file_name().filter(|n| protected.contains(n)) {
                Err(TransformError::Encode(format!(
                    "output would overwrite source file {}",
                    name.to_string_lossy()
                )))
            } else if let Some(first) = claimed_by {
                Err(TransformError::Encode(format!(
                    "{} is already produced from {}",
                    output.display(),
                    first
                )))
            } else {
                transform(backend, source, &output, spec)
            };

            if let Err(e) = &result {
                log::debug!("{}: {}", source.display(), e);
            }

            let outcome = FileOutcome { filename, result };
            if let Some(tx) = &events {
                // Receiver gone means nobody is printing; the outcome is still recorded.
                tx.send(outcome.event()).ok();
            }
            outcome
        })
        .collect();

    Ok(BatchReport { outcomes })
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// For each input, the file name of an earlier input with the same stem.
///
/// `lamp.jpg` and `lamp.png` both map to `lamp.webp`. The first in
/// enumeration order owns the output; later ones get `Some(owner)` and are
/// never written, so parallel workers cannot race on one path.
fn output_claims(inputs: &[PathBuf]) -> Vec<Option<String>> {
    let mut owners: HashMap<&OsStr, &Path> = HashMap::new();
    inputs
        .iter()
        .map(|source| {
            let stem = source.file_stem().unwrap_or(source.as_os_str());
            match owners.get(stem) {
                Some(owner) => {
                    log::warn!(
                        "{} and {} map to the same output; skipping the latter",
                        owner.display(),
                        source.display()
                    );
                    Some(
                        owner
                            .file_name()
                            .map(|f| f.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    )
                }
                None => {
                    owners.insert(stem, source);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FitMode, VariantCatalog};
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{
        create_garbage_image, create_test_jpeg, create_test_png_with_alpha, decode, dir_listing,
    };
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn card() -> VariantSpec {
        VariantCatalog::stock().lookup("product_card").unwrap().clone()
    }

    fn touch(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    #[test]
    fn collect_inputs_filters_by_extension() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "a.jpg", "b.jpeg", "c.png", "d.webp", "e.bmp", "f.tiff", "g.gif", "h.txt", "i.JPG",
            "j.tif",
        ] {
            touch(tmp.path(), name, 1);
        }
        fs::create_dir(tmp.path().join("nested.jpg")).unwrap();

        let mut names: Vec<String> = collect_inputs(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["a.jpg", "b.jpeg", "c.png", "d.webp", "e.bmp", "f.tiff"]
        );
    }

    #[test]
    fn collect_inputs_missing_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = collect_inputs(&tmp.path().join("nope"));
        assert!(matches!(result, Err(OptimizeError::InputDir { .. })));
    }

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            output_path_for(Path::new("/in/sofa.grey.jpg"), Path::new("/out")),
            PathBuf::from("/out/sofa.grey.webp")
        );
        assert_eq!(
            output_path_for(Path::new("/in/lamp.webp"), Path::new("/out")),
            PathBuf::from("/out/lamp.webp")
        );
    }

    // =========================================================================
    // Batch behaviour with the mock backend
    // =========================================================================

    #[test]
    fn one_broken_file_among_valid_ones() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("out");
        fs::create_dir(&input).unwrap();
        touch(&input, "a.jpg", 1000);
        touch(&input, "b.png", 3000);
        let broken = touch(&input, "c.jpg", 500);

        let backend = MockBackend::new();
        backend.mark_broken(&broken);

        let report = process_directory_with_backend(
            &backend,
            &input,
            &output,
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.successes().count(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "c.jpg");
        assert!(matches!(failures[0].1, TransformError::Decode(_)));

        let summary = report.summary();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.total_original, 4000);
        assert_eq!(summary.total_compressed, 128);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(dir_listing(&output), vec!["a.webp", "b.webp"]);
    }

    #[test]
    fn empty_input_creates_only_output_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("nested/out");
        fs::create_dir(&input).unwrap();

        let report = process_directory_with_backend(
            &MockBackend::new(),
            &input,
            &output,
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert!(report.outcomes.is_empty());
        assert!(report.summary().is_empty());
        assert!(output.is_dir());
        assert!(dir_listing(&output).is_empty());
    }

    #[test]
    fn existing_output_dir_is_fine() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        touch(&input, "a.jpg", 10);
        let output = tmp.path().join("out");
        fs::create_dir(&output).unwrap();

        let report = process_directory_with_backend(
            &MockBackend::new(),
            &input,
            &output,
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();
        assert_eq!(report.successes().count(), 1);
    }

    #[test]
    fn events_sent_once_per_file() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        touch(&input, "a.jpg", 10);
        let broken = touch(&input, "b.jpg", 10);

        let backend = MockBackend::new();
        backend.mark_broken(&broken);
        let (tx, rx) = mpsc::channel();

        process_directory_with_backend(
            &backend,
            &input,
            &tmp.path().join("out"),
            &card(),
            &CancelToken::new(),
            Some(tx),
        )
        .unwrap();

        let events: Vec<OptimizeEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, OptimizeEvent::Processed(img) if img.filename == "a.jpg"))
        );
        assert!(events.iter().any(
            |e| matches!(e, OptimizeEvent::Failed { filename, .. } if filename == "b.jpg")
        ));
    }

    #[test]
    fn cancelled_batch_records_every_file_as_cancelled() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        touch(&input, "a.jpg", 10);
        touch(&input, "b.jpg", 10);

        let cancel = CancelToken::new();
        cancel.cancel();
        let backend = MockBackend::new();
        let output = tmp.path().join("out");

        let report =
            process_directory_with_backend(&backend, &input, &output, &card(), &cancel, None)
                .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(
            report
                .failures()
                .all(|(_, e)| matches!(e, TransformError::Cancelled))
        );
        assert!(backend.get_operations().is_empty());
        assert!(dir_listing(&output).is_empty());
    }

    #[test]
    fn in_place_run_never_overwrites_webp_sources() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "hero.webp", 100);
        touch(tmp.path(), "sofa.jpg", 100);

        let report = process_directory_with_backend(
            &MockBackend::new(),
            tmp.path(),
            tmp.path(),
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        let failures: Vec<_> = report.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["hero.webp"]);
        assert_eq!(fs::read(tmp.path().join("hero.webp")).unwrap(), vec![7u8; 100]);
    }

    #[test]
    fn in_place_guard_sees_through_path_spelling() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        touch(tmp.path(), "hero.webp", 100);
        touch(tmp.path(), "sofa.jpg", 100);

        // `tmp/sub/..` and `tmp` name the same directory.
        let backend = MockBackend::new();
        let report = process_directory_with_backend(
            &backend,
            &tmp.path().join("sub").join(".."),
            tmp.path(),
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        let failures: Vec<_> = report.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["hero.webp"]);
        assert_eq!(fs::read(tmp.path().join("hero.webp")).unwrap(), vec![7u8; 100]);
        assert_eq!(backend.resize_count(), 1);
    }

    #[test]
    fn in_place_guard_with_relative_spelling() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("imgs");
        fs::create_dir(&input).unwrap();
        touch(&input, "hero.webp", 100);

        let report = process_directory_with_backend(
            &MockBackend::new(),
            &input.join("."),
            &input,
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.failures().count(), 1);
        assert_eq!(fs::read(input.join("hero.webp")).unwrap(), vec![7u8; 100]);
    }

    #[test]
    fn in_place_other_extension_cannot_replace_webp_source() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "hero.jpg", 100);
        touch(tmp.path(), "hero.webp", 100);

        let backend = MockBackend::new();
        let report = process_directory_with_backend(
            &backend,
            tmp.path(),
            &tmp.path().join("."),
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.failures().count(), 2);
        assert_eq!(backend.resize_count(), 0);
        assert_eq!(fs::read(tmp.path().join("hero.webp")).unwrap(), vec![7u8; 100]);
    }

    #[test]
    fn same_stem_sources_write_once() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        touch(&input, "lamp.jpg", 10);
        touch(&input, "lamp.png", 10);
        touch(&input, "sofa.jpg", 10);

        let backend = MockBackend::new();
        let report = process_directory_with_backend(
            &backend,
            &input,
            &tmp.path().join("out"),
            &card(),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.successes().count(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.starts_with("lamp."));
        assert!(failures[0].1.to_string().contains("already produced from lamp."));
        assert_eq!(backend.resize_count(), 2);
    }

    #[test]
    fn output_claims_follow_enumeration_order() {
        let inputs = vec![
            PathBuf::from("/in/a.png"),
            PathBuf::from("/in/b.jpg"),
            PathBuf::from("/in/a.jpg"),
            PathBuf::from("/in/a.webp"),
        ];
        assert_eq!(
            output_claims(&inputs),
            vec![None, None, Some("a.png".to_string()), Some("a.png".to_string())]
        );
    }

    #[test]
    fn custom_variant_drives_geometry() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        touch(&input, "wide.jpg", 10);

        let spec = VariantSpec::new("strip", 100, 20, 50, FitMode::Contain);
        let report = process_directory_with_backend(
            &MockBackend::new(), // 800x600 source
            &input,
            &tmp.path().join("out"),
            &spec,
            &CancelToken::new(),
            None,
        )
        .unwrap();

        let image = report.successes().next().unwrap();
        assert_eq!(image.dimensions, (27, 20));
    }

    // =========================================================================
    // Summary
    // =========================================================================

    fn ok(name: &str, original: u64, compressed: u64) -> FileOutcome {
        FileOutcome {
            filename: name.to_string(),
            result: Ok(ProcessedImage {
                filename: name.to_string(),
                original_size: original,
                compressed_size: compressed,
                reduction_percent: reduction_percent(original, compressed),
                dimensions: (300, 300),
            }),
        }
    }

    #[test]
    fn summary_is_size_weighted() {
        // Per-file: 90% and 0% → count-weighted mean would be 45%
        let outcomes = vec![ok("big.jpg", 9000, 900), ok("small.jpg", 1000, 1000)];
        let summary = summarize(&outcomes);
        assert_eq!(summary.total_original, 10000);
        assert_eq!(summary.total_compressed, 1900);
        assert!((summary.reduction_percent - 81.0).abs() < 1e-9);
    }

    #[test]
    fn summary_excludes_failures_from_totals() {
        let outcomes = vec![
            ok("a.jpg", 2000, 500),
            FileOutcome {
                filename: "bad.png".into(),
                result: Err(TransformError::Decode("bad header".into())),
            },
        ];
        let summary = summarize(&outcomes);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.total_original, 2000);
        assert_eq!(
            summary.failures,
            vec![("bad.png".to_string(), "Decode failed: bad header".to_string())]
        );
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = summarize(&[]);
        assert!(summary.is_empty());
        assert_eq!(summary.reduction_percent, 0.0);
    }

    // =========================================================================
    // Real backend end to end
    // =========================================================================

    #[test]
    fn real_backend_batch_produces_decodable_webp() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("out");
        fs::create_dir(&input).unwrap();
        create_test_jpeg(&input.join("sofa.jpg"), 800, 600);
        create_test_png_with_alpha(&input.join("lamp.png"), 600, 800);
        create_garbage_image(&input.join("corrupt.jpeg"));

        let report =
            process_directory(&input, &output, &card(), &CancelToken::new(), None).unwrap();

        assert_eq!(report.successes().count(), 2);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(dir_listing(&output), vec!["lamp.webp", "sofa.webp"]);

        let sofa = decode(&output.join("sofa.webp"));
        assert_eq!((sofa.width(), sofa.height()), (400, 300));
        let lamp = decode(&output.join("lamp.webp"));
        assert_eq!((lamp.width(), lamp.height()), (300, 400));
        assert!(!lamp.color().has_alpha());
    }
}

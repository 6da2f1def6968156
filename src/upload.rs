//! Upload driver and Supabase Storage adapter for `storeimg upload`.
//!
//! The driver walks a directory of `.webp` files and hands each one to a
//! [`StorageClient`]. Files are uploaded one at a time; a failed upload is
//! recorded and the batch moves on.
//!
//! [`SupabaseStorage`] is the production client. It speaks the Storage REST
//! API directly over blocking `reqwest`:
//!
//! ```text
//! POST {SUPABASE_URL}/storage/v1/object/{bucket}/{prefix}/{filename}
//! Authorization: Bearer {SUPABASE_SERVICE_KEY}
//! apikey: {SUPABASE_SERVICE_KEY}
//! Content-Type: image/webp
//! x-upsert: false
//! ```

use crate::cancel::CancelToken;
use crate::config::StorageCredentials;
use crate::imaging::{OUTPUT_CONTENT_TYPE, OUTPUT_EXTENSION};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot read directory {}: {source}", path.display())]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid storage URL '{0}'")]
    InvalidUrl(String),
    #[error("Cancelled before upload")]
    Cancelled,
}

/// Anything that can put bytes into a bucket.
pub trait StorageClient {
    /// Store `bytes` at `path` inside `bucket`. Returns the response body.
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Blocking client for the Supabase Storage REST API.
pub struct SupabaseStorage {
    client: reqwest::blocking::Client,
    base: Url,
    service_key: String,
}

impl SupabaseStorage {
    /// Fails on a malformed `SUPABASE_URL` before any file is read.
    pub fn new(credentials: StorageCredentials) -> Result<Self, UploadError> {
        let base = Url::parse(&credentials.url)
            .map_err(|_| UploadError::InvalidUrl(credentials.url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(UploadError::InvalidUrl(credentials.url));
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("storeimg/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            service_key: credentials.service_key,
        })
    }
}

impl StorageClient for SupabaseStorage {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let url = object_url(&self.base, bucket, path)?;
        let key = &self.service_key;
        log::debug!("POST {} ({} bytes)", url, bytes.len());

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .header("apikey", key)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// `{base}/storage/v1/object/{bucket}/{path}`, with each segment escaped.
pub fn object_url(base: &Url, bucket: &str, path: &str) -> Result<Url, UploadError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UploadError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["storage", "v1", "object", bucket])
        .extend(path.split('/'));
    Ok(url)
}

/// Object key for a file: `prefix/filename`, or just `filename` without a prefix.
///
/// Slashes around the prefix are dropped; a leading one would otherwise
/// become an empty segment in the object URL.
pub fn remote_path(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        filename.to_string()
    } else {
        format!("{prefix}/{filename}")
    }
}

/// Progress notification, sent once per file after its upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Uploaded { filename: String, remote_path: String },
    Failed { filename: String, error: String },
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub filename: String,
    pub remote_path: String,
    pub result: Result<String, UploadError>,
}

impl UploadOutcome {
    fn event(&self) -> UploadEvent {
        match &self.result {
            Ok(_) => UploadEvent::Uploaded {
                filename: self.filename.clone(),
                remote_path: self.remote_path.clone(),
            },
            Err(e) => UploadEvent::Failed {
                filename: self.filename.clone(),
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn uploaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.uploaded_count() < self.total()
    }

    /// `(filename, message)` for every failed upload.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.result
                    .as_ref()
                    .err()
                    .map(|e| (o.filename.clone(), e.to_string()))
            })
            .collect()
    }
}

/// `.webp` files directly inside `dir`, in enumeration order.
pub fn collect_uploads(dir: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let dir_err = |source| UploadError::Dir {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        let is_webp = path.extension().and_then(|e| e.to_str()) == Some(OUTPUT_EXTENSION);
        if path.is_file() && is_webp {
            files.push(path);
        }
    }
    Ok(files)
}

/// Upload every `.webp` in `local_dir` to `bucket` under `prefix`.
///
/// Only a directory that cannot be listed is an error; per-file failures
/// land in the report.
pub fn upload_directory(
    client: &impl StorageClient,
    local_dir: &Path,
    bucket: &str,
    prefix: &str,
    cancel: &CancelToken,
    events: Option<Sender<UploadEvent>>,
) -> Result<UploadReport, UploadError> {
    let files = collect_uploads(local_dir)?;
    log::info!(
        "{} files in {} for bucket {}",
        files.len(),
        local_dir.display(),
        bucket
    );
    Ok(upload_files(client, &files, bucket, prefix, cancel, events))
}

/// Upload `files` sequentially, one outcome per file in input order.
pub fn upload_files(
    client: &impl StorageClient,
    files: &[PathBuf],
    bucket: &str,
    prefix: &str,
    cancel: &CancelToken,
    events: Option<Sender<UploadEvent>>,
) -> UploadReport {
    let mut report = UploadReport::default();
    for path in files {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_path = remote_path(prefix, &filename);

        let result = if cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            fs::read(path)
                .map_err(UploadError::from)
                .and_then(|bytes| client.upload(bucket, &remote_path, bytes, OUTPUT_CONTENT_TYPE))
        };

        if let Err(e) = &result {
            log::debug!("{}: {}", path.display(), e);
        }

        let outcome = UploadOutcome {
            filename,
            remote_path,
            result,
        };
        if let Some(tx) = &events {
            tx.send(outcome.event()).ok();
        }
        report.outcomes.push(outcome);
    }
    report
}

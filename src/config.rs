//! Tool configuration: variant catalog, worker count, upload defaults, credentials.
//!
//! Configuration is layered: the stock defaults are serialized to a TOML value
//! and an optional `storeimg.toml` is merged on top of them key by key, so a
//! config file only needs to mention what it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [variants.product_card]
//! width = 300
//! height = 300
//! quality = 60          # WebP quality (0-100)
//! fit = "cover"         # "cover" or "contain"
//!
//! # ... one table per variant; new names add variants
//!
//! [processing]
//! jobs = 1              # Parallel workers (capped at CPU cores)
//!
//! [upload]
//! bucket = "products"   # Default bucket for `storeimg upload`
//! prefix = ""           # Default remote path prefix
//! ```
//!
//! Overriding a single field of a stock variant works because tables merge:
//!
//! ```toml
//! [variants.hero_banner]
//! quality = 80
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Credentials
//!
//! Upload credentials never live in the config file. They are read once from
//! `SUPABASE_URL` and `SUPABASE_SERVICE_KEY` (after loading an optional `.env`)
//! into a [`StorageCredentials`] value that is passed to the storage client.

use crate::catalog::{self, VariantCatalog, VariantSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILENAME: &str = "storeimg.toml";

/// Environment variable holding the storage base URL.
pub const URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the service-role key.
pub const SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error(
        "Set SUPABASE_URL and SUPABASE_SERVICE_KEY in the environment or a .env file (missing: {0})"
    )]
    MissingCredentials(String),
}

/// Tool configuration loaded from `storeimg.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Variant presets keyed by name.
    pub variants: BTreeMap<String, VariantSpec>,
    /// Worker settings for `optimize`.
    pub processing: ProcessingConfig,
    /// Defaults for `upload`.
    pub upload: UploadConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            variants: catalog::stock_variants()
                .into_iter()
                .map(|spec| (spec.name.clone(), spec))
                .collect(),
            processing: ProcessingConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(ConfigError::Validation(
                "at least one variant must be defined".into(),
            ));
        }
        for (name, spec) in &self.variants {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "variant names must not be empty".into(),
                ));
            }
            if spec.width == 0 || spec.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "variants.{name}: width and height must be non-zero"
                )));
            }
            if spec.quality > 100 {
                return Err(ConfigError::Validation(format!(
                    "variants.{name}: quality must be 0-100"
                )));
            }
        }
        if self.processing.jobs == Some(0) {
            return Err(ConfigError::Validation(
                "processing.jobs must be at least 1".into(),
            ));
        }
        if self.upload.bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upload.bucket must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Build the read-only variant catalog described by this config.
    pub fn catalog(&self) -> VariantCatalog {
        VariantCatalog::from_specs(self.variants.iter().map(|(name, spec)| VariantSpec {
            name: name.clone(),
            ..spec.clone()
        }))
    }
}

/// Worker settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of images encoded at once. Absent means one at a time.
    pub jobs: Option<usize>,
}

/// Resolve the effective worker count.
///
/// - `None` → 1 (sequential)
/// - `Some(n)` → `min(n, cores)`, at least 1 (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.jobs.map(|n| n.clamp(1, cores)).unwrap_or(1)
}

/// Upload defaults, overridable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub bucket: String,
    pub prefix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "products".to_string(),
            prefix: String::new(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(StoreConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<StoreConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StoreConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path` if it exists, otherwise return stock defaults.
pub fn load_config(path: &Path) -> Result<StoreConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        log::debug!("loaded config overlay from {}", path.display());
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Load config from a file the user named explicitly; a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<StoreConfig, ConfigError> {
    match load_raw_config(path)? {
        Some(overlay) => resolve_config(stock_defaults_value(), Some(overlay)),
        None => Err(ConfigError::NotFound(path.to_path_buf())),
    }
}

/// Returns a fully-commented stock `storeimg.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# storeimg configuration
# =====================
# All options are optional. Values below are the stock defaults; delete
# anything you don't want to change.

# Variants: one table per storefront placement.
#   width, height  target box in pixels (non-zero)
#   quality        WebP quality, 0-100 (higher = larger, sharper)
#   fit            "cover"   fill the box, one axis may overshoot
#                  "contain" fit inside the box, one axis may fall short

[variants.product_card]
width = 300
height = 300
quality = 60
fit = "cover"

[variants.thumbnail]
width = 300
height = 300
quality = 60
fit = "cover"

[variants.mattress_card]
width = 420
height = 320
quality = 75
fit = "contain"

[variants.hero_banner]
width = 800
height = 450
quality = 70
fit = "contain"

[variants.home_banner]
width = 800
height = 400
quality = 70
fit = "contain"

[variants.full_screen]
width = 800
height = 800
quality = 75
fit = "contain"

[processing]
# Parallel encoders for `optimize`. Omit for one at a time.
# Values larger than the CPU core count are clamped down.
# jobs = 4

[upload]
bucket = "products"
prefix = ""
"##
}

// =============================================================================
// Storage credentials
// =============================================================================

/// Credentials for the storage backend, read once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    /// Project base URL, without trailing slash.
    pub url: String,
    /// Service-role key, sent as bearer token.
    pub service_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

impl StorageCredentials {
    /// Read credentials from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let url = read(URL_VAR);
        let service_key = read(SERVICE_KEY_VAR);

        match (url, service_key) {
            (Some(url), Some(service_key)) => Ok(Self {
                url: url.trim().trim_end_matches('/').to_string(),
                service_key: service_key.trim().to_string(),
            }),
            (url, key) => {
                let missing: Vec<&str> = [(URL_VAR, url.is_none()), (SERVICE_KEY_VAR, key.is_none())]
                    .into_iter()
                    .filter(|(_, absent)| *absent)
                    .map(|(name, _)| name)
                    .collect();
                Err(ConfigError::MissingCredentials(missing.join(", ")))
            }
        }
    }
}

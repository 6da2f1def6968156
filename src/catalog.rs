//! Variant catalog: named resize presets, one per storefront placement.
//!
//! A variant pins down everything the optimizer needs to produce one image:
//! the target box, the WebP quality, and how the source is fitted into the box.
//!
//! ## Stock Variants
//!
//! ```text
//! product_card    300x300  q60  cover     # grid cards, smallest on the page
//! thumbnail       300x300  q60  cover
//! mattress_card   420x320  q75  contain
//! hero_banner     800x450  q70  contain
//! home_banner     800x400  q70  contain
//! full_screen     800x800  q75  contain   # zoomed product preview
//! ```
//!
//! A catalog is built once at startup (stock, or stock merged with a user
//! `storeimg.toml`, see [`crate::config`]) and is only read afterwards. There
//! is no runtime registration: callers that want different presets build a
//! different catalog and pass it in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Variant used when `--variant` is not given.
pub const DEFAULT_VARIANT: &str = "product_card";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown variant '{name}' (available: {available})")]
    UnknownVariant { name: String, available: String },
}

/// How a source image is fitted into the variant's target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the box; one axis may overshoot (left for a downstream crop).
    Cover,
    /// Fit inside the box; one axis may fall short.
    Contain,
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMode::Cover => f.write_str("cover"),
            FitMode::Contain => f.write_str("contain"),
        }
    }
}

/// Target geometry and encoding quality for one variant.
///
/// The `name` is the catalog key. It is not part of the TOML representation,
/// where the key of the `[variants.<name>]` table plays that role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSpec {
    #[serde(skip)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// WebP quality, 0-100.
    pub quality: u32,
    pub fit: FitMode,
}

impl VariantSpec {
    pub fn new(name: &str, width: u32, height: u32, quality: u32, fit: FitMode) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            quality,
            fit,
        }
    }
}

impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}, quality {}, {})",
            self.name, self.width, self.height, self.quality, self.fit
        )
    }
}

/// Read-only lookup table of variants, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCatalog {
    variants: BTreeMap<String, VariantSpec>,
}

impl VariantCatalog {
    /// The six built-in storefront variants.
    pub fn stock() -> Self {
        Self::from_specs(stock_variants())
    }

    /// Build a catalog from specs. Later entries replace earlier ones with the same name.
    pub fn from_specs(specs: impl IntoIterator<Item = VariantSpec>) -> Self {
        let variants = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { variants }
    }

    /// Look up a variant by exact name.
    pub fn lookup(&self, name: &str) -> Result<&VariantSpec, CatalogError> {
        self.variants
            .get(name)
            .ok_or_else(|| CatalogError::UnknownVariant {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Variant names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.variants.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantSpec> {
        self.variants.values()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::stock()
    }
}

pub(crate) fn stock_variants() -> Vec<VariantSpec> {
    use FitMode::{Contain, Cover};
    vec![
        VariantSpec::new("product_card", 300, 300, 60, Cover),
        VariantSpec::new("thumbnail", 300, 300, 60, Cover),
        VariantSpec::new("mattress_card", 420, 320, 75, Contain),
        VariantSpec::new("hero_banner", 800, 450, 70, Contain),
        VariantSpec::new("home_banner", 800, 400, 70, Contain),
        VariantSpec::new("full_screen", 800, 800, 75, Contain),
    ]
}

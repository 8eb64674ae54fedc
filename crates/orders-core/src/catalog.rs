//! The catalog document a shop uploads to replace its listings.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Largest value a `NUMERIC(10,2)` price column can hold.
const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid catalog: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDocument {
    pub shop: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub goods: Vec<GoodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: i64,
    pub name: String,
}

/// One listing in the document. `id` is the shop's own identifier for the good.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodEntry {
    pub id: i64,
    pub category: i64,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub price: Decimal,
    pub price_rrc: Decimal,
    pub quantity: u32,
    /// Attribute name to value. Scalar YAML values are kept as their text form.
    #[serde(default, deserialize_with = "scalar_map")]
    pub parameters: BTreeMap<String, String>,
}

impl ImportDocument {
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.goods.len()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.goods.iter().map(|g| g.parameters.len()).sum()
    }

    /// Check the document shape before any of it touches the database.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] naming the first offending entry.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.shop.trim().is_empty() {
            return Err(CatalogError::Validation(
                "shop name must be non-empty".to_string(),
            ));
        }

        let mut seen_categories = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(CatalogError::Validation(format!(
                    "category {} has an empty name",
                    category.id
                )));
            }
            if !seen_categories.insert(category.id) {
                return Err(CatalogError::Validation(format!(
                    "duplicate category id: {}",
                    category.id
                )));
            }
        }

        for good in &self.goods {
            validate_good(good)?;
        }

        Ok(())
    }
}

fn validate_good(good: &GoodEntry) -> Result<(), CatalogError> {
    if good.name.trim().is_empty() {
        return Err(CatalogError::Validation(format!(
            "good {} has an empty name",
            good.id
        )));
    }

    for (field, value) in [("price", good.price), ("price_rrc", good.price_rrc)] {
        if value < Decimal::ZERO {
            return Err(CatalogError::Validation(format!(
                "good '{}' has negative {field} {value}",
                good.name
            )));
        }
        if value > MAX_PRICE {
            return Err(CatalogError::Validation(format!(
                "good '{}' has {field} {value} above the maximum {MAX_PRICE}",
                good.name
            )));
        }
    }

    if i32::try_from(good.quantity).is_err() {
        return Err(CatalogError::Validation(format!(
            "good '{}' has quantity {} which is too large",
            good.name, good.quantity
        )));
    }

    if good.parameters.keys().any(|k| k.trim().is_empty()) {
        return Err(CatalogError::Validation(format!(
            "good '{}' has a parameter with an empty name",
            good.name
        )));
    }

    Ok(())
}

/// Parse and validate a catalog document from YAML text.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] for malformed YAML or a wrong shape, and
/// [`CatalogError::Validation`] if the content is inconsistent.
pub fn parse_import_document(content: &str) -> Result<ImportDocument, CatalogError> {
    let document: ImportDocument = serde_yaml::from_str(content)?;
    document.validate()?;
    Ok(document)
}

/// Load and validate a catalog document from a YAML file.
///
/// # Errors
///
/// Returns `CatalogError` if the file cannot be read, parsed, or fails validation.
pub fn load_import_document(path: &Path) -> Result<ImportDocument, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_import_document(&content)
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_yaml::Value>>::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            scalar_to_string(&value)
                .map(|text| (name.clone(), text))
                .ok_or_else(|| {
                    D::Error::custom(format!("parameter '{name}' must be a scalar value"))
                })
        })
        .collect()
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

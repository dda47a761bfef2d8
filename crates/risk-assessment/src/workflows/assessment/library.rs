use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{CategoryCode, Coefficients, RiskItem, RiskText};
use super::reconciler::normalizer::RawCandidate;

/// Immutable template row. Coefficient spellings are normalized on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct CategoryItem {
    #[serde(flatten)]
    pub text: RiskText,
    pub current: Coefficients,
    pub target: Coefficients,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sector_tags: Vec<String>,
}

impl TryFrom<Value> for CategoryItem {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        RawCandidate::from_value(&value)
            .map(|raw| raw.item)
            .ok_or_else(|| "category item must be an object with hazard or risk text".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "code_from_string_or_number")]
    pub code: CategoryCode,
    pub category: String,
    #[serde(default)]
    pub items: Vec<CategoryItem>,
}

fn code_from_string_or_number<'de, D>(deserializer: D) -> Result<CategoryCode, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(code) => Ok(CategoryCode::new(code)),
        Value::Number(code) => Ok(CategoryCode::new(code.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "category code must be a string or number, found {other}"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read category catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid category catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("category catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Read-only catalog of categories and their template items, loaded once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLibrary {
    categories: Vec<Category>,
}

impl CategoryLibrary {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let categories: Vec<Category> = serde_json::from_reader(reader)?;
        Ok(Self::new(categories))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, CatalogError> {
        let categories: Vec<Category> = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Self::new(categories))
    }

    /// Loads from a file path or an http(s) URL. Any failure yields an empty
    /// library: category-based adds become unavailable, nothing else breaks.
    pub async fn load_or_empty(source: Option<&str>) -> Self {
        let Some(source) = source else {
            info!("no category catalog configured");
            return Self::empty();
        };

        let loaded = if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(&reqwest::Client::new(), source).await
        } else {
            Self::from_path(source)
        };

        match loaded {
            Ok(library) => {
                info!(
                    source,
                    categories = library.categories.len(),
                    "category catalog loaded"
                );
                library
            }
            Err(error) => {
                warn!(source, %error, "category catalog unavailable; continuing without templates");
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn list_categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn find_category(&self, code: &CategoryCode) -> Option<&Category> {
        self.categories.iter().find(|category| &category.code == code)
    }

    /// `count(entries in code) + 1`, zero-padded to two digits.
    pub fn next_sequence(&self, code: &CategoryCode, current: &[RiskItem]) -> String {
        format!("{:02}", SequenceCounter::from_entries(current).next_index(code))
    }
}

pub(crate) fn format_risk_no(code: &CategoryCode, sequence: usize) -> String {
    format!("{}.{:02}", code, sequence)
}

/// Running per-category counts used to number a batch without gaps.
#[derive(Debug, Default)]
pub(crate) struct SequenceCounter {
    counts: HashMap<CategoryCode, usize>,
}

impl SequenceCounter {
    pub(crate) fn from_entries(entries: &[RiskItem]) -> Self {
        let mut counts = HashMap::new();
        for entry in entries {
            *counts.entry(entry.category_code.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub(crate) fn next_index(&self, code: &CategoryCode) -> usize {
        self.counts.get(code).copied().unwrap_or(0) + 1
    }

    /// Records one more entry in `code` and returns its number.
    pub(crate) fn advance(&mut self, code: &CategoryCode) -> String {
        let count = self.counts.entry(code.clone()).or_insert(0);
        *count += 1;
        format_risk_no(code, *count)
    }
}

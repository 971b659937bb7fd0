//! Static table of well-known funds, used for listing, search and as the
//! source of fallback figures when the upstream provider is unavailable.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::core::fund::SearchResult;

const EMBEDDED_TABLE: &str = include_str!("../../assets/reference_funds.yaml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceEntry {
    pub symbol: String,
    pub name: String,
    pub category: String,
    pub family: String,
    pub fallback_nav: f64,
    pub one_year_return: Option<f64>,
    pub three_year_return: Option<f64>,
    pub five_year_return: Option<f64>,
}

impl ReferenceEntry {
    fn matches(&self, query_lower: &str) -> bool {
        self.name.to_lowercase().contains(query_lower)
            || self.category.to_lowercase().contains(query_lower)
            || self.family.to_lowercase().contains(query_lower)
    }
}

impl From<&ReferenceEntry> for SearchResult {
    fn from(entry: &ReferenceEntry) -> Self {
        SearchResult {
            symbol: entry.symbol.clone(),
            name: entry.name.clone(),
            category: Some(entry.category.clone()),
            fund_family: Some(entry.family.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceDocument {
    funds: Vec<ReferenceEntry>,
}

/// Read-only for the lifetime of the process. Iteration follows document
/// order.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_yaml_str(EMBEDDED_TABLE).context("Failed to parse embedded reference table")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read reference table: {}",
                path.as_ref().display()
            )
        })?;
        Self::from_yaml_str(&yaml).with_context(|| {
            format!(
                "Failed to parse reference table: {}",
                path.as_ref().display()
            )
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: ReferenceDocument = serde_yaml::from_str(yaml)?;
        Self::from_entries(document.funds)
    }

    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.fallback_nav <= 0.0 {
                bail!(
                    "Reference fund {} has a non-positive fallback NAV",
                    entry.symbol
                );
            }
            if index.insert(entry.symbol.clone(), position).is_some() {
                bail!("Duplicate reference fund symbol: {}", entry.symbol);
            }
        }
        debug!("Loaded {} reference funds", entries.len());
        Ok(ReferenceTable { entries, index })
    }

    pub fn get(&self, symbol: &str) -> Option<&ReferenceEntry> {
        self.index.get(symbol).map(|&position| &self.entries[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose category equals `category` exactly, or all entries.
    pub fn by_category<'a>(
        &'a self,
        category: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ReferenceEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| category.is_none_or(|c| entry.category == c))
    }

    /// Case-insensitive substring match over name, category and family.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let query_lower = query.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.matches(&query_lower))
            .map(SearchResult::from)
            .collect()
    }
}

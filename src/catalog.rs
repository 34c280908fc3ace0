//! In-memory tool catalog.
//!
//! The catalog is the read-mostly collection of recommendable tools,
//! loaded in bulk from a JSON array and replaced wholesale on reload.
//! A failed reload never clears a previously loaded catalog; the swap
//! happens at the snapshot layer only after a successful load.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One recommendable tool. `name` is the unique identity (compared
/// case-insensitively); every other field defaults to empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRecord {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ToolRecord {
    /// Canonical text rendering used for embedding. The same rendering
    /// must be used at index-build time and query time.
    pub fn canonical_text(&self) -> String {
        format!(
            "name: {}. category: {}. description: {}",
            self.name, self.category, self.description
        )
    }
}

/// Immutable snapshot of the tool catalog, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ToolRecord>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from records, validating identity invariants.
    ///
    /// Two records whose names are equal case-insensitively are rejected
    /// rather than collapsed, so a reload cannot silently drop entries.
    pub fn from_records(records: Vec<ToolRecord>) -> Result<Self> {
        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        for record in &records {
            if record.name.is_empty() {
                return Err(AppError::CatalogLoad(
                    "tool record with empty name".to_string(),
                ));
            }
            if !seen.insert(record.name.to_lowercase()) {
                return Err(AppError::CatalogLoad(format!(
                    "duplicate tool name (case-insensitive): {}",
                    record.name
                )));
            }
        }
        Ok(Self { records })
    }

    /// Load the catalog from a JSON array of tool objects.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::CatalogLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let records: Vec<ToolRecord> = serde_json::from_str(&raw).map_err(|e| {
            AppError::CatalogLoad(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let catalog = Self::from_records(records)?;
        tracing::info!(
            path = %path.display(),
            tools = catalog.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Case-insensitive exact lookup by name.
    pub fn find_by_name(&self, name: &str) -> Option<&ToolRecord> {
        self.records
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// All records in insertion order.
    pub fn all(&self) -> &[ToolRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

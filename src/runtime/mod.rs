//! Execution-side machinery for running a recipe over rows.
//!
//! This module contains the pieces the execution collaborator is built from:
//! - [`MedicalTextAnalyzer`]: the capability trait the real API client implements
//! - [`RowBatch`]: a column-ordered batch of JSON-valued rows
//! - [`enrich_rows`]: parallel per-row API fan-out with retry and error policy
//! - [`ApiColumnNames`] and [`generate_unique`]: bookkeeping column naming

pub mod analyzer;
pub mod enrich;

use std::collections::HashMap;

pub use analyzer::{AnalyzerError, AnalyzerOperation, MedicalTextAnalyzer};
pub use enrich::{enrich_rows, EnrichmentError, EnrichmentOptions, RateLimit};

use crate::manifest::ParamValue;

/// A batch of rows with an explicit column order.
///
/// Cells are JSON values keyed by column name; a missing key reads as an empty
/// cell. The column order is what the output dataset is written with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, ParamValue>>,
}

impl RowBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: HashMap<String, ParamValue>) {
        self.rows.push(row);
    }

    /// Appends a column at the end of the order, if not already present.
    pub fn add_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.columns.contains(&name) {
            self.columns.push(name);
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&ParamValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The three bookkeeping columns added next to the enriched data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiColumnNames {
    pub response: String,
    pub error_message: String,
    pub error_type: String,
}

impl ApiColumnNames {
    /// Human-readable descriptions for the bookkeeping columns, in order.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        vec![
            (
                self.response.clone(),
                "Raw response from the API in JSON format".to_string(),
            ),
            (
                self.error_message.clone(),
                "Error message from the API".to_string(),
            ),
            (
                self.error_type.clone(),
                "Error type of the API failure".to_string(),
            ),
        ]
    }

    pub fn as_array(&self) -> [&str; 3] {
        [&self.response, &self.error_message, &self.error_type]
    }
}

/// Derives collision-free names for the bookkeeping columns.
pub fn build_unique_column_names(existing: &[String], prefix: &str) -> ApiColumnNames {
    ApiColumnNames {
        response: generate_unique("response", existing, prefix),
        error_message: generate_unique("error_message", existing, prefix),
        error_type: generate_unique("error_type", existing, prefix),
    }
}

/// Generates a column name that does not collide with `existing`.
///
/// The candidate is `<prefix>_<name>` (or just `name` with an empty prefix);
/// collisions are resolved by suffixing `_2`, `_3`, ...
pub fn generate_unique(name: &str, existing: &[String], prefix: &str) -> String {
    let base = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", prefix, name)
    };
    if !existing.iter().any(|c| c == &base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !existing.iter().any(|c| c == &candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

//! Shapes raw analyzer responses into human-readable output columns.
//!
//! After [`enrich_rows`](crate::runtime::enrich_rows) has filled the response
//! bookkeeping column, a formatter expands it: one column per entity type
//! holding the list of matched texts at or above the minimum score, with the
//! bookkeeping columns moved to the end of the output.

use std::collections::HashMap;

use thiserror::Error;

use crate::contract::{
    EntityRecognitionParams, ErrorHandling, MedicalEntityType, MedicalPhiType, PhiExtractionParams,
};
use crate::manifest::ParamValue;
use crate::runtime::{
    build_unique_column_names, generate_unique, AnalyzerOperation, ApiColumnNames, RowBatch,
};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while shaping analyzer responses.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A response cell does not hold valid JSON (FAIL policy only).
    #[error("Invalid response JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    /// The batch was not produced by the enrichment step.
    #[error("Response column '{0}' is missing from the batch")]
    MissingResponseColumn(String),
}

// ============================================================================
// Entity Recognition Formatter
// ============================================================================

/// Expands medical entity recognition responses into per-type text columns.
///
/// Column names are derived from the columns of the batch as it was BEFORE
/// enrichment, so they line up with the names the enrichment step picked.
#[derive(Debug, Clone)]
pub struct EntityRecognitionFormatter {
    minimum_score: f64,
    error_handling: ErrorHandling,
    api_columns: ApiColumnNames,
    type_columns: Vec<TypeColumn>,
}

impl EntityRecognitionFormatter {
    pub fn new(
        input_columns: &[String],
        entity_types: &[MedicalEntityType],
        minimum_score: f64,
        error_handling: ErrorHandling,
    ) -> Self {
        Self::with_column_prefix(
            input_columns,
            entity_types,
            minimum_score,
            error_handling,
            AnalyzerOperation::DetectEntities.default_column_prefix(),
        )
    }

    pub fn with_column_prefix(
        input_columns: &[String],
        entity_types: &[MedicalEntityType],
        minimum_score: f64,
        error_handling: ErrorHandling,
        column_prefix: &str,
    ) -> Self {
        let type_columns = entity_types
            .iter()
            .map(|t| {
                TypeColumn::new(
                    t.api_name(),
                    t.label(),
                    "medical entities",
                    input_columns,
                    column_prefix,
                )
            })
            .collect();
        Self {
            minimum_score,
            error_handling,
            api_columns: build_unique_column_names(input_columns, column_prefix),
            type_columns,
        }
    }

    /// Builds a formatter from decoded recipe parameters.
    pub fn from_params(input_columns: &[String], params: &EntityRecognitionParams) -> Self {
        Self::new(
            input_columns,
            &params.entity_types,
            params.minimum_score,
            params.error_handling,
        )
    }

    /// Shapes an enriched batch into the final output layout.
    pub fn format_batch(&self, batch: &RowBatch) -> Result<RowBatch, FormatError> {
        if !batch.has_column(&self.api_columns.response) {
            return Err(FormatError::MissingResponseColumn(
                self.api_columns.response.clone(),
            ));
        }
        log::info!("Formatting {} API response(s)", batch.len());
        let rows = shape_rows(
            batch,
            &self.api_columns,
            self.error_handling,
            "Category",
            self.minimum_score,
            &self.type_columns,
            is_known_entity_type,
        )?;
        let columns = arrange_columns(
            &batch.columns,
            &self.type_columns,
            &self.api_columns,
            self.error_handling,
        );
        log::info!("Formatting API responses: done");
        Ok(RowBatch { columns, rows })
    }

    /// Descriptions for every column this formatter writes, name first.
    pub fn column_descriptions(&self) -> Vec<(String, String)> {
        collect_descriptions(&self.api_columns, self.error_handling, &self.type_columns)
    }

    pub fn api_columns(&self) -> &ApiColumnNames {
        &self.api_columns
    }
}

// ============================================================================
// PHI Extraction Formatter
// ============================================================================

/// Expands protected health information responses into per-type text columns.
///
/// Unlike the entity formatter there is no type selection; all PHI types get
/// a column. Matching is on the response `Type` field.
#[derive(Debug, Clone)]
pub struct PhiExtractionFormatter {
    minimum_score: f64,
    error_handling: ErrorHandling,
    api_columns: ApiColumnNames,
    type_columns: Vec<TypeColumn>,
}

impl PhiExtractionFormatter {
    pub fn new(
        input_columns: &[String],
        minimum_score: f64,
        error_handling: ErrorHandling,
    ) -> Self {
        Self::with_column_prefix(
            input_columns,
            minimum_score,
            error_handling,
            AnalyzerOperation::DetectPhi.default_column_prefix(),
        )
    }

    pub fn with_column_prefix(
        input_columns: &[String],
        minimum_score: f64,
        error_handling: ErrorHandling,
        column_prefix: &str,
    ) -> Self {
        let type_columns = MedicalPhiType::ALL
            .iter()
            .map(|t| {
                TypeColumn::new(
                    t.api_name(),
                    t.label(),
                    "PHI entities",
                    input_columns,
                    column_prefix,
                )
            })
            .collect();
        Self {
            minimum_score,
            error_handling,
            api_columns: build_unique_column_names(input_columns, column_prefix),
            type_columns,
        }
    }

    pub fn from_params(input_columns: &[String], params: &PhiExtractionParams) -> Self {
        Self::new(input_columns, params.minimum_score, params.error_handling)
    }

    pub fn format_batch(&self, batch: &RowBatch) -> Result<RowBatch, FormatError> {
        if !batch.has_column(&self.api_columns.response) {
            return Err(FormatError::MissingResponseColumn(
                self.api_columns.response.clone(),
            ));
        }
        log::info!("Formatting {} API response(s)", batch.len());
        let rows = shape_rows(
            batch,
            &self.api_columns,
            self.error_handling,
            "Type",
            self.minimum_score,
            &self.type_columns,
            is_known_phi_type,
        )?;
        let columns = arrange_columns(
            &batch.columns,
            &self.type_columns,
            &self.api_columns,
            self.error_handling,
        );
        log::info!("Formatting API responses: done");
        Ok(RowBatch { columns, rows })
    }

    pub fn column_descriptions(&self) -> Vec<(String, String)> {
        collect_descriptions(&self.api_columns, self.error_handling, &self.type_columns)
    }

    pub fn api_columns(&self) -> &ApiColumnNames {
        &self.api_columns
    }
}

// ============================================================================
// Shared Shaping
// ============================================================================

/// One output column bound to an entity type.
#[derive(Debug, Clone)]
struct TypeColumn {
    /// Wire name matched against the response entities.
    api_name: &'static str,
    column: String,
    description: String,
}

impl TypeColumn {
    fn new(
        api_name: &'static str,
        label: &str,
        noun: &str,
        input_columns: &[String],
        column_prefix: &str,
    ) -> Self {
        let name = format!("entity_type_{}_text", label.to_lowercase());
        Self {
            api_name,
            column: generate_unique(&name, input_columns, column_prefix),
            description: format!("List of '{}' {} extracted by the API", label, noun),
        }
    }
}

fn is_known_entity_type(name: &str) -> bool {
    MedicalEntityType::ALL.iter().any(|t| t.api_name() == name)
}

fn is_known_phi_type(name: &str) -> bool {
    MedicalPhiType::ALL.iter().any(|t| t.api_name() == name)
}

/// Decodes one response cell. An empty cell means the row was never sent to
/// the analyzer (blank text, or a logged error) and reads as no entities.
fn parse_response(raw: &str, error_handling: ErrorHandling) -> Result<ParamValue, FormatError> {
    if raw.trim().is_empty() {
        return Ok(ParamValue::Null);
    }
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(err) if error_handling == ErrorHandling::Fail => {
            Err(FormatError::InvalidResponse(err))
        }
        Err(err) => {
            log::warn!("Ignoring invalid response JSON: {}", err);
            Ok(ParamValue::Null)
        }
    }
}

fn entity_score(entity: &ParamValue) -> f64 {
    entity
        .get("Score")
        .and_then(ParamValue::as_f64)
        .unwrap_or(0.0)
}

fn entity_field<'a>(entity: &'a ParamValue, field: &str) -> &'a str {
    entity.get(field).and_then(ParamValue::as_str).unwrap_or("")
}

fn shape_rows<F>(
    batch: &RowBatch,
    api_columns: &ApiColumnNames,
    error_handling: ErrorHandling,
    match_field: &str,
    minimum_score: f64,
    type_columns: &[TypeColumn],
    is_known_type: F,
) -> Result<Vec<HashMap<String, ParamValue>>, FormatError>
where
    F: Fn(&str) -> bool,
{
    let mut rows = Vec::with_capacity(batch.len());
    for row in &batch.rows {
        let raw = row
            .get(&api_columns.response)
            .and_then(ParamValue::as_str)
            .unwrap_or("");
        let response = parse_response(raw, error_handling)?;
        let entities = response
            .get("Entities")
            .and_then(ParamValue::as_array)
            .cloned()
            .unwrap_or_default();

        let discarded = entities
            .iter()
            .filter(|e| {
                entity_score(e) < minimum_score && is_known_type(entity_field(e, match_field))
            })
            .count();
        if discarded > 0 {
            log::info!(
                "Discarding {} entities below the minimum score threshold",
                discarded
            );
        }

        let mut shaped = row.clone();
        if error_handling == ErrorHandling::Fail {
            shaped.remove(&api_columns.error_message);
            shaped.remove(&api_columns.error_type);
        }
        for type_column in type_columns {
            let texts: Vec<ParamValue> = entities
                .iter()
                .filter(|e| {
                    entity_field(e, match_field) == type_column.api_name
                        && entity_score(e) >= minimum_score
                })
                .map(|e| ParamValue::String(entity_field(e, "Text").to_string()))
                .collect();
            let cell = if texts.is_empty() {
                ParamValue::String(String::new())
            } else {
                ParamValue::Array(texts)
            };
            shaped.insert(type_column.column.clone(), cell);
        }
        rows.push(shaped);
    }
    Ok(rows)
}

/// Final column order: input columns, then entity type columns, then the
/// bookkeeping columns. Under FAIL the error columns are dropped outright.
fn arrange_columns(
    batch_columns: &[String],
    type_columns: &[TypeColumn],
    api_columns: &ApiColumnNames,
    error_handling: ErrorHandling,
) -> Vec<String> {
    let kept_api: Vec<&String> = match error_handling {
        ErrorHandling::Fail => vec![&api_columns.response],
        ErrorHandling::Log => vec![
            &api_columns.response,
            &api_columns.error_message,
            &api_columns.error_type,
        ],
    };
    let mut columns: Vec<String> = batch_columns
        .iter()
        .filter(|c| !api_columns.as_array().contains(&c.as_str()))
        .cloned()
        .collect();
    columns.extend(type_columns.iter().map(|tc| tc.column.clone()));
    columns.extend(kept_api.into_iter().cloned());
    columns
}

fn collect_descriptions(
    api_columns: &ApiColumnNames,
    error_handling: ErrorHandling,
    type_columns: &[TypeColumn],
) -> Vec<(String, String)> {
    let mut descriptions: Vec<(String, String)> = type_columns
        .iter()
        .map(|tc| (tc.column.clone(), tc.description.clone()))
        .collect();
    let mut api = api_columns.descriptions();
    if error_handling == ErrorHandling::Fail {
        api.truncate(1);
    }
    descriptions.extend(api);
    descriptions
}

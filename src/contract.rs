//! Typed view of the effective parameters delivered to the execution side.
//!
//! The manifest module hands over a loose name → value mapping; this module
//! decodes it into the concrete configuration each recipe runs with, applying
//! the same runtime guards the recipes enforce (score range, known entity
//! types, text column present in the bound dataset).

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::manifest::{EffectiveParams, ParamValue, ValidationError};

/// Entity categories recognized by the medical entity recognition recipe.
///
/// The serialized names are the wire values used both in `selectChoices` and in
/// the API's response `Category` field; the labels are what the form displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicalEntityType {
    Anatomy,
    MedicalCondition,
    Medication,
    ProtectedHealthInformation,
    TestTreatmentProcedure,
    TimeExpression,
}

impl MedicalEntityType {
    pub const ALL: [MedicalEntityType; 6] = [
        MedicalEntityType::Anatomy,
        MedicalEntityType::MedicalCondition,
        MedicalEntityType::Medication,
        MedicalEntityType::ProtectedHealthInformation,
        MedicalEntityType::TestTreatmentProcedure,
        MedicalEntityType::TimeExpression,
    ];

    /// The wire name, as found in select choices and response categories.
    pub fn api_name(&self) -> &'static str {
        match self {
            MedicalEntityType::Anatomy => "ANATOMY",
            MedicalEntityType::MedicalCondition => "MEDICAL_CONDITION",
            MedicalEntityType::Medication => "MEDICATION",
            MedicalEntityType::ProtectedHealthInformation => "PROTECTED_HEALTH_INFORMATION",
            MedicalEntityType::TestTreatmentProcedure => "TEST_TREATMENT_PROCEDURE",
            MedicalEntityType::TimeExpression => "TIME_EXPRESSION",
        }
    }

    /// Human-readable label, used in forms and output column names.
    pub fn label(&self) -> &'static str {
        match self {
            MedicalEntityType::Anatomy => "Anatomy",
            MedicalEntityType::MedicalCondition => "Medical condition",
            MedicalEntityType::Medication => "Medication",
            MedicalEntityType::ProtectedHealthInformation => "Protected health information",
            MedicalEntityType::TestTreatmentProcedure => "Test treatment procedure",
            MedicalEntityType::TimeExpression => "Time expression",
        }
    }
}

impl FromStr for MedicalEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MedicalEntityType::ALL
            .into_iter()
            .find(|t| t.api_name() == s)
            .ok_or_else(|| format!("unknown medical entity type '{}'", s))
    }
}

impl std::fmt::Display for MedicalEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Protected health information categories extracted by the PHI recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicalPhiType {
    Address,
    Age,
    Date,
    Name,
    PhoneOrFax,
    Email,
    Id,
}

impl MedicalPhiType {
    pub const ALL: [MedicalPhiType; 7] = [
        MedicalPhiType::Address,
        MedicalPhiType::Age,
        MedicalPhiType::Date,
        MedicalPhiType::Name,
        MedicalPhiType::PhoneOrFax,
        MedicalPhiType::Email,
        MedicalPhiType::Id,
    ];

    /// The wire name, as found in the response `Type` field.
    pub fn api_name(&self) -> &'static str {
        match self {
            MedicalPhiType::Address => "ADDRESS",
            MedicalPhiType::Age => "AGE",
            MedicalPhiType::Date => "DATE",
            MedicalPhiType::Name => "NAME",
            MedicalPhiType::PhoneOrFax => "PHONE_OR_FAX",
            MedicalPhiType::Email => "EMAIL",
            MedicalPhiType::Id => "ID",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MedicalPhiType::Address => "Address",
            MedicalPhiType::Age => "Age",
            MedicalPhiType::Date => "Date",
            MedicalPhiType::Name => "Name",
            MedicalPhiType::PhoneOrFax => "Phone or fax",
            MedicalPhiType::Email => "Email",
            MedicalPhiType::Id => "ID",
        }
    }
}

impl std::fmt::Display for MedicalPhiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do when an API call fails on a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorHandling {
    /// Abort the whole run on the first API error.
    Fail,
    /// Record the error against the affected row and keep going.
    #[default]
    Log,
}

impl FromStr for ErrorHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FAIL" => Ok(ErrorHandling::Fail),
            "LOG" => Ok(ErrorHandling::Log),
            other => Err(format!("unknown error handling policy '{}'", other)),
        }
    }
}

/// The credential and throughput bundle referenced by `api_configuration_preset`.
///
/// The manifest treats the preset as an opaque reference; at invocation the host
/// resolves it into this object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfigurationPreset {
    #[serde(default)]
    pub aws_access_key: String,
    #[serde(default)]
    pub aws_secret_key: String,
    #[serde(default)]
    pub aws_region: String,
    /// Maximum API calls per quota period.
    #[serde(default = "default_api_quota_rate_limit")]
    pub api_quota_rate_limit: u32,
    /// Quota period in seconds, also used as the delay between retries.
    #[serde(default = "default_api_quota_period")]
    pub api_quota_period: u64,
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
}

fn default_api_quota_rate_limit() -> u32 {
    20
}

fn default_api_quota_period() -> u64 {
    1
}

fn default_parallel_workers() -> usize {
    4
}

impl Default for ApiConfigurationPreset {
    fn default() -> Self {
        Self {
            aws_access_key: String::new(),
            aws_secret_key: String::new(),
            aws_region: String::new(),
            api_quota_rate_limit: default_api_quota_rate_limit(),
            api_quota_period: default_api_quota_period(),
            parallel_workers: default_parallel_workers(),
        }
    }
}

impl ApiConfigurationPreset {
    /// Decodes a resolved preset object out of an effective parameter value.
    pub fn from_value(value: &ParamValue) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::TypeMismatch {
                field: "api_configuration_preset".to_string(),
                detail: "expected a resolved preset object".to_string(),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| ValidationError::TypeMismatch {
            field: "api_configuration_preset".to_string(),
            detail: e.to_string(),
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.api_quota_period)
    }
}

/// Decoded configuration of the medical entity recognition recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecognitionParams {
    pub text_column: String,
    pub language: String,
    pub api_configuration_preset: ParamValue,
    pub entity_types: Vec<MedicalEntityType>,
    pub expert: bool,
    pub minimum_score: f64,
    pub error_handling: ErrorHandling,
}

impl EntityRecognitionParams {
    pub fn from_effective(params: &EffectiveParams) -> Result<Self, ValidationError> {
        let text_column = required_str(params, "text_column")?;
        let language = decode_language(params)?;
        let api_configuration_preset = params
            .get("api_configuration_preset")
            .cloned()
            .ok_or_else(|| {
                ValidationError::MissingMandatory("api_configuration_preset".to_string())
            })?;

        let raw_types = params
            .get("entity_types")
            .ok_or_else(|| ValidationError::MissingMandatory("entity_types".to_string()))?;
        let entity_types = decode_entity_types(raw_types)?;
        if entity_types.is_empty() {
            log::warn!("no entity types selected, the output will contain no entity columns");
        }

        Ok(Self {
            text_column,
            language,
            api_configuration_preset,
            entity_types,
            expert: decode_expert(params)?,
            minimum_score: decode_minimum_score(params)?,
            error_handling: decode_error_handling(params)?,
        })
    }
}

/// Decoded configuration of the protected health information recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct PhiExtractionParams {
    pub text_column: String,
    pub language: String,
    pub api_configuration_preset: ParamValue,
    pub expert: bool,
    pub minimum_score: f64,
    pub error_handling: ErrorHandling,
}

impl PhiExtractionParams {
    pub fn from_effective(params: &EffectiveParams) -> Result<Self, ValidationError> {
        let text_column = required_str(params, "text_column")?;
        let language = decode_language(params)?;
        let api_configuration_preset = params
            .get("api_configuration_preset")
            .cloned()
            .ok_or_else(|| {
                ValidationError::MissingMandatory("api_configuration_preset".to_string())
            })?;

        Ok(Self {
            text_column,
            language,
            api_configuration_preset,
            expert: decode_expert(params)?,
            minimum_score: decode_minimum_score(params)?,
            error_handling: decode_error_handling(params)?,
        })
    }
}

// Absent scalars fall back to their defaults; present values of the wrong
// JSON type are configuration mistakes and must not be silently defaulted.

fn required_str(params: &EffectiveParams, name: &str) -> Result<String, ValidationError> {
    match params.get(name) {
        None => Err(ValidationError::MissingMandatory(name.to_string())),
        Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
            ValidationError::TypeMismatch {
                field: name.to_string(),
                detail: format!("expected a string, got {}", value),
            }
        }),
    }
}

fn decode_language(params: &EffectiveParams) -> Result<String, ValidationError> {
    match params.get("language") {
        None => Ok("en".to_string()),
        Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
            ValidationError::TypeMismatch {
                field: "language".to_string(),
                detail: format!("expected a language code string, got {}", value),
            }
        }),
    }
}

fn decode_expert(params: &EffectiveParams) -> Result<bool, ValidationError> {
    match params.get("expert") {
        None => Ok(false),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: "expert".to_string(),
                detail: format!("expected a boolean, got {}", value),
            }),
    }
}

fn decode_entity_types(raw: &ParamValue) -> Result<Vec<MedicalEntityType>, ValidationError> {
    let entries = raw.as_array().ok_or_else(|| ValidationError::TypeMismatch {
        field: "entity_types".to_string(),
        detail: "expected a list of entity type names".to_string(),
    })?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| format!("expected an entity type name, got {}", entry))
                .and_then(MedicalEntityType::from_str)
                .map_err(|detail| ValidationError::TypeMismatch {
                    field: "entity_types".to_string(),
                    detail,
                })
        })
        .collect()
}

/// Runtime guard mirrored from the recipe scripts: the score must lie in [0, 1]
/// even when the form was bypassed.
fn decode_minimum_score(params: &EffectiveParams) -> Result<f64, ValidationError> {
    let minimum_score = match params.get("minimum_score") {
        None => 0.0,
        Some(value) => {
            // host forms sometimes deliver the score as a numeric string
            let parsed = match value {
                ParamValue::Number(n) => n.as_f64(),
                ParamValue::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            parsed.ok_or_else(|| ValidationError::TypeMismatch {
                field: "minimum_score".to_string(),
                detail: format!("expected a number, got {}", value),
            })?
        }
    };
    if !(0.0..=1.0).contains(&minimum_score) {
        return Err(ValidationError::OutOfRange {
            param: "minimum_score".to_string(),
            detail: format!("{} is not between 0 and 1", minimum_score),
        });
    }
    Ok(minimum_score)
}

fn decode_error_handling(params: &EffectiveParams) -> Result<ErrorHandling, ValidationError> {
    match params.get("error_handling") {
        None => Ok(ErrorHandling::default()),
        Some(value) => value
            .as_str()
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: "error_handling".to_string(),
                detail: format!("expected \"FAIL\" or \"LOG\", got {}", value),
            })?
            .parse()
            .map_err(|detail| ValidationError::TypeMismatch {
                field: "error_handling".to_string(),
                detail,
            }),
    }
}

/// Checks the configured text column against the bound dataset's columns.
pub fn ensure_column_exists(column: &str, input_columns: &[String]) -> Result<(), ValidationError> {
    if column.is_empty() {
        return Err(ValidationError::MissingMandatory("text_column".to_string()));
    }
    if !input_columns.iter().any(|c| c == column) {
        return Err(ValidationError::MissingField(column.to_string()));
    }
    Ok(())
}

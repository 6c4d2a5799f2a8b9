//! Recipe descriptor schema.
//!
//! A recipe is described to the host platform by a declarative manifest document
//! with six top-level keys: `meta`, `kind`, `inputRoles`, `outputRoles`, `params`
//! and `resourceKeys`. The document format is dictated by the host and must be
//! reproduced bit-exact, so every field name, type tag and constraint key here
//! matches the wire format verbatim.
//!
//! Loading is two-phase. [`RecipeManifest::parse`] checks the required top-level
//! keys and deserializes each section, reporting [`ValidationError::MissingField`]
//! or [`ValidationError::TypeMismatch`] with the offending key. A parsed manifest
//! is then checked semantically with [`RecipeManifest::validate`], which enforces
//! parameter-name uniqueness, role references, select-choice membership and
//! default ranges. The host holds the result immutably for as long as the recipe
//! stays registered.

pub mod condition;
pub mod effective;
mod error;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Map;

pub use condition::VisibilityCondition;
pub use effective::{collect_effective_params, resolve_visibility, EffectiveParams};
pub use error::ValidationError;

/// A parameter or cell value, as it appears in the manifest document.
pub type ParamValue = serde_json::Value;

/// Top-level keys every manifest document must carry, in reporting order.
const REQUIRED_KEYS: [&str; 6] = [
    "meta",
    "kind",
    "inputRoles",
    "outputRoles",
    "params",
    "resourceKeys",
];

/// A validated, typed recipe descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeManifest {
    pub meta: RecipeMeta,
    /// Execution binding tag, carried opaquely (e.g. "PYTHON"). Nothing in this
    /// crate dispatches on it; execution goes through the analyzer capability.
    pub kind: String,
    pub input_roles: Vec<DatasetRole>,
    pub output_roles: Vec<DatasetRole>,
    pub params: Vec<ParamSpec>,
    pub resource_keys: Vec<String>,
}

/// Identity and form metadata for the recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMeta {
    pub label: String,
    pub description: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order_rank: Option<u32>,
}

/// A named dataset slot the recipe binds at invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRole {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub arity: RoleArity,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub accepts_dataset: bool,
}

fn default_true() -> bool {
    true
}

/// How many datasets a role binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleArity {
    /// Exactly one dataset bound at invocation.
    Unary,
    /// One or more datasets bound at invocation.
    Nary,
}

/// One entry of the recipe's ordered parameter list.
///
/// Only `name` and `type` are universal; the remaining keys apply per type and
/// stay absent from the document otherwise, which keeps serialization a faithful
/// round-trip of the original manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_choices: Option<Vec<SelectChoice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_d: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_d: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_condition: Option<VisibilityCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_column_types: Option<Vec<String>>,
    /// For COLUMN params: which input role's dataset provides the columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_role: Option<String>,
    /// For PRESET params: which parameter set the preset is drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_set_id: Option<String>,
}

impl ParamSpec {
    pub fn is_mandatory(&self) -> bool {
        self.mandatory.unwrap_or(false)
    }

    pub fn is_separator(&self) -> bool {
        self.param_type == ParamType::Separator
    }

    /// The choice values of a SELECT/MULTISELECT param, when declared.
    pub fn choice_values(&self) -> Vec<&str> {
        self.select_choices
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| c.value.as_str())
            .collect()
    }
}

/// The host's parameter type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamType {
    /// Visual section break in the form; never carries a value.
    Separator,
    /// A column picked from a bound dataset.
    Column,
    /// Single choice among `selectChoices`.
    Select,
    /// Multiple choices among `selectChoices`.
    Multiselect,
    Boolean,
    Double,
    /// Reference to a separately managed configuration bundle.
    Preset,
}

/// One selectable choice of a SELECT/MULTISELECT param.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectChoice {
    pub value: String,
    pub label: String,
}

impl RecipeManifest {
    /// Parses a manifest document from its JSON text.
    ///
    /// Fails with [`ValidationError::MissingField`] when one of the six required
    /// top-level keys is absent, and [`ValidationError::TypeMismatch`] when a
    /// section (or an entry of `params`) does not match its declared shape.
    pub fn parse(document: &str) -> Result<Self, ValidationError> {
        let value: ParamValue =
            serde_json::from_str(document).map_err(|e| ValidationError::TypeMismatch {
                field: "document".to_string(),
                detail: e.to_string(),
            })?;
        Self::from_value(&value)
    }

    /// Parses a manifest from an already-decoded JSON value.
    pub fn from_value(document: &ParamValue) -> Result<Self, ValidationError> {
        let object = document
            .as_object()
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: "document".to_string(),
                detail: "expected a JSON object".to_string(),
            })?;
        for key in REQUIRED_KEYS {
            if !object.contains_key(key) {
                return Err(ValidationError::MissingField(key.to_string()));
            }
        }

        let meta = section::<RecipeMeta>(object, "meta")?;
        let kind = section::<String>(object, "kind")?;
        let input_roles = section::<Vec<DatasetRole>>(object, "inputRoles")?;
        let output_roles = section::<Vec<DatasetRole>>(object, "outputRoles")?;
        let resource_keys = section::<Vec<String>>(object, "resourceKeys")?;

        // Params are decoded one by one so an error names the offending entry.
        let raw_params = section::<Vec<ParamValue>>(object, "params")?;
        let mut params = Vec::with_capacity(raw_params.len());
        for (index, raw) in raw_params.into_iter().enumerate() {
            let param: ParamSpec =
                serde_json::from_value(raw).map_err(|e| ValidationError::TypeMismatch {
                    field: format!("params[{}]", index),
                    detail: e.to_string(),
                })?;
            params.push(param);
        }

        Ok(RecipeManifest {
            meta,
            kind,
            input_roles,
            output_roles,
            params,
            resource_keys,
        })
    }

    /// Serializes the descriptor back into document form.
    ///
    /// For a manifest produced by [`RecipeManifest::parse`], the result is
    /// value-equal to the original document.
    pub fn to_json_string(&self) -> Result<String, ValidationError> {
        serde_json::to_string_pretty(self).map_err(|e| ValidationError::TypeMismatch {
            field: "document".to_string(),
            detail: e.to_string(),
        })
    }

    /// Runs the semantic checks over a parsed manifest.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.meta.label.trim().is_empty() {
            return Err(ValidationError::TypeMismatch {
                field: "meta.label".to_string(),
                detail: "must be a non-empty string".to_string(),
            });
        }
        if self.meta.description.trim().is_empty() {
            return Err(ValidationError::TypeMismatch {
                field: "meta.description".to_string(),
                detail: "must be a non-empty string".to_string(),
            });
        }
        validate_roles(&self.input_roles, "inputRoles")?;
        validate_roles(&self.output_roles, "outputRoles")?;
        validate_param_list(&self.params, &self.input_roles)
    }

    /// Convenience accessor for a parameter spec by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Names of the parameters visible under the given current values.
    pub fn visible_params(
        &self,
        current: &std::collections::HashMap<String, ParamValue>,
    ) -> std::collections::HashSet<String> {
        resolve_visibility(&self.params, current)
    }

    /// Resolves the effective parameter mapping for an invocation.
    pub fn effective_params(
        &self,
        user_input: &std::collections::HashMap<String, ParamValue>,
    ) -> Result<EffectiveParams, ValidationError> {
        collect_effective_params(self, user_input)
    }
}

fn section<T: DeserializeOwned>(
    object: &Map<String, ParamValue>,
    key: &str,
) -> Result<T, ValidationError> {
    let value = object
        .get(key)
        .ok_or_else(|| ValidationError::MissingField(key.to_string()))?;
    serde_json::from_value(value.clone()).map_err(|e| ValidationError::TypeMismatch {
        field: key.to_string(),
        detail: e.to_string(),
    })
}

fn validate_roles(roles: &[DatasetRole], section: &str) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for role in roles {
        if role.name.trim().is_empty() {
            return Err(ValidationError::TypeMismatch {
                field: section.to_string(),
                detail: "role names must be non-empty strings".to_string(),
            });
        }
        if !seen.insert(role.name.as_str()) {
            return Err(ValidationError::TypeMismatch {
                field: section.to_string(),
                detail: format!("duplicate role name '{}'", role.name),
            });
        }
    }
    Ok(())
}

/// Enforces the cross-parameter rules of a manifest's `params` section.
///
/// Checks, in order: `name` uniqueness across all entries, COLUMN `columnRole`
/// references against the declared input roles, SELECT/MULTISELECT defaults
/// against `selectChoices`, BOOLEAN/DOUBLE default typing, and DOUBLE defaults
/// against `[minD, maxD]`. References to unknown parameters inside visibility
/// conditions are logged rather than rejected, since the host tolerates them.
pub fn validate_param_list(
    params: &[ParamSpec],
    input_roles: &[DatasetRole],
) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(ValidationError::DuplicateParamName(param.name.clone()));
        }
    }

    for param in params {
        match param.param_type {
            ParamType::Column => validate_column_param(param, input_roles)?,
            ParamType::Select => validate_select_default(param)?,
            ParamType::Multiselect => validate_multiselect_default(param)?,
            ParamType::Boolean => validate_boolean_default(param)?,
            ParamType::Double => validate_double_default(param)?,
            ParamType::Separator | ParamType::Preset => {}
        }

        if let Some(cond) = &param.visibility_condition {
            for reference in cond.field_refs() {
                if !params.iter().any(|p| p.name == reference) {
                    log::warn!(
                        "parameter '{}' has a visibility condition referencing unknown parameter '{}'; it will evaluate as false",
                        param.name,
                        reference
                    );
                }
            }
        }
    }
    Ok(())
}

fn validate_column_param(
    param: &ParamSpec,
    input_roles: &[DatasetRole],
) -> Result<(), ValidationError> {
    if let Some(role) = &param.column_role {
        if !input_roles.iter().any(|r| &r.name == role) {
            return Err(ValidationError::UnknownRole {
                param: param.name.clone(),
                role: role.clone(),
            });
        }
    }
    Ok(())
}

fn validate_select_default(param: &ParamSpec) -> Result<(), ValidationError> {
    let Some(default) = &param.default_value else {
        return Ok(());
    };
    let Some(value) = default.as_str() else {
        return Err(ValidationError::InvalidDefault {
            param: param.name.clone(),
            detail: format!("expected a choice value string, got {}", default),
        });
    };
    if !param.choice_values().contains(&value) {
        return Err(ValidationError::InvalidDefault {
            param: param.name.clone(),
            detail: format!("'{}' is not one of the declared select choices", value),
        });
    }
    Ok(())
}

fn validate_multiselect_default(param: &ParamSpec) -> Result<(), ValidationError> {
    let Some(default) = &param.default_value else {
        return Ok(());
    };
    let Some(entries) = default.as_array() else {
        return Err(ValidationError::InvalidDefault {
            param: param.name.clone(),
            detail: format!("expected a list of choice values, got {}", default),
        });
    };
    let choices = param.choice_values();
    for entry in entries {
        let Some(value) = entry.as_str() else {
            return Err(ValidationError::InvalidDefault {
                param: param.name.clone(),
                detail: format!("expected a choice value string, got {}", entry),
            });
        };
        if !choices.contains(&value) {
            return Err(ValidationError::InvalidDefault {
                param: param.name.clone(),
                detail: format!("'{}' is not one of the declared select choices", value),
            });
        }
    }
    Ok(())
}

fn validate_boolean_default(param: &ParamSpec) -> Result<(), ValidationError> {
    if let Some(default) = &param.default_value {
        if !default.is_boolean() {
            return Err(ValidationError::InvalidDefault {
                param: param.name.clone(),
                detail: format!("expected a boolean, got {}", default),
            });
        }
    }
    Ok(())
}

fn validate_double_default(param: &ParamSpec) -> Result<(), ValidationError> {
    let Some(default) = &param.default_value else {
        return Ok(());
    };
    let Some(value) = default.as_f64() else {
        return Err(ValidationError::InvalidDefault {
            param: param.name.clone(),
            detail: format!("expected a number, got {}", default),
        });
    };
    if let Some(min) = param.min_d {
        if value < min {
            return Err(ValidationError::OutOfRange {
                param: param.name.clone(),
                detail: format!("default {} is below the minimum {}", value, min),
            });
        }
    }
    if let Some(max) = param.max_d {
        if value > max {
            return Err(ValidationError::OutOfRange {
                param: param.name.clone(),
                detail: format!("default {} is above the maximum {}", value, max),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_document() -> ParamValue {
        json!({
            "meta": {
                "label": "Test recipe",
                "description": "A recipe for tests",
                "icon": "icon-flask"
            },
            "kind": "PYTHON",
            "inputRoles": [{
                "name": "input_dataset",
                "label": "Input dataset",
                "arity": "UNARY",
                "required": true,
                "acceptsDataset": true
            }],
            "outputRoles": [{
                "name": "output_dataset",
                "label": "Output dataset",
                "arity": "UNARY",
                "required": true,
                "acceptsDataset": true
            }],
            "params": [
                {
                    "name": "text_column",
                    "type": "COLUMN",
                    "label": "Text column",
                    "mandatory": true,
                    "columnRole": "input_dataset"
                },
                {
                    "name": "threshold",
                    "type": "DOUBLE",
                    "defaultValue": 0.5,
                    "minD": 0.0,
                    "maxD": 1.0
                }
            ],
            "resourceKeys": []
        })
    }

    #[test]
    fn test_parse_minimal_document() {
        let manifest = RecipeManifest::from_value(&minimal_document()).unwrap();
        assert_eq!(manifest.kind, "PYTHON");
        assert_eq!(manifest.input_roles.len(), 1);
        assert_eq!(manifest.input_roles[0].arity, RoleArity::Unary);
        assert_eq!(manifest.params.len(), 2);
        assert!(manifest.param("text_column").unwrap().is_mandatory());
        manifest.validate().unwrap();
    }

    #[test]
    fn test_missing_top_level_key_is_reported_by_name() {
        for key in REQUIRED_KEYS {
            let mut document = minimal_document();
            document.as_object_mut().unwrap().remove(key);
            let err = RecipeManifest::from_value(&document).unwrap_err();
            assert_eq!(err, ValidationError::MissingField(key.to_string()));
        }
    }

    #[test]
    fn test_type_mismatch_names_the_section() {
        let mut document = minimal_document();
        document["params"] = json!(42);
        let err = RecipeManifest::from_value(&document).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { ref field, .. } if field == "params"
        ));
    }

    #[test]
    fn test_type_mismatch_names_the_param_entry() {
        let mut document = minimal_document();
        document["params"][1] = json!({"name": "broken", "type": "NO_SUCH_TYPE"});
        let err = RecipeManifest::from_value(&document).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { ref field, .. } if field == "params[1]"
        ));
    }

    #[test]
    fn test_malformed_visibility_condition_is_a_type_mismatch() {
        let mut document = minimal_document();
        document["params"][1]["visibilityCondition"] = json!("model.");
        let err = RecipeManifest::from_value(&document).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_param_name_rejected() {
        let mut document = minimal_document();
        document["params"][1]["name"] = json!("text_column");
        let manifest = RecipeManifest::from_value(&document).unwrap();
        assert_eq!(
            manifest.validate().unwrap_err(),
            ValidationError::DuplicateParamName("text_column".to_string())
        );
    }

    #[test]
    fn test_unknown_column_role_rejected() {
        let mut document = minimal_document();
        document["params"][0]["columnRole"] = json!("side_dataset");
        let manifest = RecipeManifest::from_value(&document).unwrap();
        assert_eq!(
            manifest.validate().unwrap_err(),
            ValidationError::UnknownRole {
                param: "text_column".to_string(),
                role: "side_dataset".to_string(),
            }
        );
    }

    #[test]
    fn test_double_default_out_of_range_rejected() {
        let mut document = minimal_document();
        document["params"][1]["defaultValue"] = json!(1.5);
        let manifest = RecipeManifest::from_value(&document).unwrap();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ValidationError::OutOfRange { ref param, .. } if param == "threshold"
        ));
    }

    #[test]
    fn test_empty_meta_label_rejected() {
        let mut document = minimal_document();
        document["meta"]["label"] = json!("  ");
        let manifest = RecipeManifest::from_value(&document).unwrap();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ValidationError::TypeMismatch { ref field, .. } if field == "meta.label"
        ));
    }

    #[test]
    fn test_role_sections_reject_blank_and_duplicate_names() {
        let mut document = minimal_document();
        document["inputRoles"][0]["name"] = json!("");
        let manifest = RecipeManifest::from_value(&document).unwrap();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ValidationError::TypeMismatch { ref field, .. } if field == "inputRoles"
        ));

        let mut manifest = RecipeManifest::from_value(&minimal_document()).unwrap();
        let copy = manifest.output_roles[0].clone();
        manifest.output_roles.push(copy);
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ValidationError::TypeMismatch { ref field, .. } if field == "outputRoles"
        ));
    }

    #[test]
    fn test_serialization_round_trips() {
        let document = minimal_document();
        let manifest = RecipeManifest::from_value(&document).unwrap();
        let serialized = serde_json::to_value(&manifest).unwrap();
        assert_eq!(serialized, document);
    }
}

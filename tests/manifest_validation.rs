//! Integration tests over the built-in recipe descriptors.
//!
//! These exercise the full descriptor lifecycle: loading the shipped
//! documents, value-equal serialization, semantic validation after tampering,
//! and the visibility and effective-parameter resolution an invocation
//! goes through.

use medcomprehend::prelude::*;
use medcomprehend::recipes;
use serde_json::json;
use std::collections::HashMap;

fn entity_recipe() -> RecipeManifest {
    RecipeManifest::parse(recipes::MEDICAL_ENTITY_RECOGNITION).unwrap()
}

fn phi_recipe() -> RecipeManifest {
    RecipeManifest::parse(recipes::MEDICAL_PHI_EXTRACTION).unwrap()
}

#[test]
fn test_builtin_documents_parse_and_validate() {
    for (id, document) in recipes::builtin_recipes() {
        let manifest = RecipeManifest::parse(document).unwrap();
        manifest.validate().unwrap();
        assert!(!manifest.meta.label.is_empty(), "{} has an empty label", id);
        assert_eq!(manifest.kind, "PYTHON");
        assert_eq!(manifest.input_roles.len(), 1);
        assert_eq!(manifest.output_roles.len(), 1);
        assert!(manifest.resource_keys.is_empty());
    }
}

#[test]
fn test_builtin_documents_serialize_value_equal() {
    for (id, document) in recipes::builtin_recipes() {
        let manifest = RecipeManifest::parse(document).unwrap();
        let serialized: ParamValue =
            serde_json::from_str(&manifest.to_json_string().unwrap()).unwrap();
        let original: ParamValue = serde_json::from_str(document).unwrap();
        assert_eq!(serialized, original, "{} does not round-trip", id);
    }
}

#[test]
fn test_registry_serves_the_builtin_recipes() {
    let registry = RecipeRegistry::with_builtin_recipes().unwrap();
    assert_eq!(
        registry.ids(),
        vec![
            recipes::MEDICAL_ENTITY_RECOGNITION_ID,
            recipes::MEDICAL_PHI_EXTRACTION_ID
        ]
    );
    let manifest = registry.get(recipes::MEDICAL_ENTITY_RECOGNITION_ID).unwrap();
    assert!(manifest.param("entity_types").is_some());
    assert!(registry.get("no-such-recipe").is_none());
}

#[test]
fn test_entity_recipe_declares_the_documented_form() {
    let manifest = entity_recipe();
    let names: Vec<&str> = manifest.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "separator_input",
            "text_column",
            "language",
            "separator_configuration",
            "api_configuration_preset",
            "entity_types",
            "expert",
            "minimum_score",
            "error_handling"
        ]
    );

    let text_column = manifest.param("text_column").unwrap();
    assert_eq!(text_column.param_type, ParamType::Column);
    assert!(text_column.is_mandatory());
    assert_eq!(
        text_column.allowed_column_types.as_deref(),
        Some(&["string".to_string()][..])
    );
    assert_eq!(text_column.column_role.as_deref(), Some("input_dataset"));

    let entity_types = manifest.param("entity_types").unwrap();
    assert_eq!(entity_types.param_type, ParamType::Multiselect);
    assert_eq!(entity_types.choice_values().len(), 6);
    // default selects everything except protected health information
    assert_eq!(
        entity_types.default_value,
        Some(json!([
            "ANATOMY",
            "MEDICAL_CONDITION",
            "MEDICATION",
            "TEST_TREATMENT_PROCEDURE",
            "TIME_EXPRESSION"
        ]))
    );

    let minimum_score = manifest.param("minimum_score").unwrap();
    assert_eq!(minimum_score.param_type, ParamType::Double);
    assert_eq!(minimum_score.min_d, Some(0.0));
    assert_eq!(minimum_score.max_d, Some(1.0));
    assert_eq!(
        minimum_score.visibility_condition,
        Some(VisibilityCondition::FieldRef("expert".to_string()))
    );

    let preset = manifest.param("api_configuration_preset").unwrap();
    assert_eq!(preset.param_type, ParamType::Preset);
    assert_eq!(preset.parameter_set_id.as_deref(), Some("api-configuration"));
}

#[test]
fn test_phi_recipe_has_no_type_selection() {
    let manifest = phi_recipe();
    assert!(manifest.param("entity_types").is_none());
    assert!(manifest.param("text_column").is_some());
    assert!(manifest.param("minimum_score").is_some());
    assert_eq!(
        manifest.param("error_handling").unwrap().default_value,
        Some(json!("LOG"))
    );
}

#[test]
fn test_visibility_follows_the_expert_toggle() {
    let manifest = entity_recipe();

    let hidden = manifest.visible_params(&HashMap::new());
    assert!(hidden.contains("text_column"));
    assert!(hidden.contains("entity_types"));
    assert!(!hidden.contains("minimum_score"));
    assert!(!hidden.contains("error_handling"));

    let mut form = HashMap::new();
    form.insert("expert".to_string(), json!(true));
    let shown = manifest.visible_params(&form);
    assert!(shown.contains("minimum_score"));
    assert!(shown.contains("error_handling"));
}

#[test]
fn test_effective_params_for_a_minimal_invocation() {
    let manifest = entity_recipe();
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert("api_configuration_preset".to_string(), json!("p1"));
    user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));

    let effective = manifest.effective_params(&user_input).unwrap();

    let expected: HashMap<String, ParamValue> = [
        ("text_column", json!("notes")),
        ("language", json!("en")),
        ("api_configuration_preset", json!("p1")),
        ("entity_types", json!(["MEDICATION"])),
        ("expert", json!(false)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    assert_eq!(effective.into_inner(), expected);
}

#[test]
fn test_expert_mode_pulls_in_the_hidden_defaults() {
    let manifest = entity_recipe();
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert("api_configuration_preset".to_string(), json!("p1"));
    user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));
    user_input.insert("expert".to_string(), json!(true));

    let effective = manifest.effective_params(&user_input).unwrap();
    assert_eq!(effective.get_f64("minimum_score"), Some(0.0));
    assert_eq!(effective.get_str("error_handling"), Some("LOG"));
}

#[test]
fn test_missing_mandatory_visible_param_is_reported() {
    let manifest = entity_recipe();
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));

    let err = manifest.effective_params(&user_input).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingMandatory("api_configuration_preset".to_string())
    );
}

#[test]
fn test_tampered_defaults_are_rejected() {
    // an unknown choice added to the MULTISELECT default
    let mut manifest = entity_recipe();
    if let Some(param) = manifest
        .params
        .iter_mut()
        .find(|p| p.name == "entity_types")
    {
        param.default_value = Some(json!(["MEDICATION", "UNICORN"]));
    }
    assert!(matches!(
        manifest.validate().unwrap_err(),
        ValidationError::InvalidDefault { ref param, .. } if param == "entity_types"
    ));

    // a DOUBLE default pushed outside [minD, maxD]
    let mut manifest = entity_recipe();
    if let Some(param) = manifest
        .params
        .iter_mut()
        .find(|p| p.name == "minimum_score")
    {
        param.default_value = Some(json!(1.5));
    }
    assert!(matches!(
        manifest.validate().unwrap_err(),
        ValidationError::OutOfRange { ref param, .. } if param == "minimum_score"
    ));

    // a duplicated parameter name
    let mut manifest = entity_recipe();
    let copy = manifest.param("expert").unwrap().clone();
    manifest.params.push(copy);
    assert_eq!(
        manifest.validate().unwrap_err(),
        ValidationError::DuplicateParamName("expert".to_string())
    );
}

#[test]
fn test_condition_referencing_unknown_param_hides_but_validates() {
    let mut manifest = entity_recipe();
    if let Some(param) = manifest
        .params
        .iter_mut()
        .find(|p| p.name == "minimum_score")
    {
        param.visibility_condition = Some("model.ghost".parse().unwrap());
    }
    // tolerated at validation time, resolves to hidden at runtime
    manifest.validate().unwrap();
    let mut form = HashMap::new();
    form.insert("expert".to_string(), json!(true));
    assert!(!manifest.visible_params(&form).contains("minimum_score"));
}

#[test]
fn test_decoding_rejects_mistyped_user_values() {
    let manifest = entity_recipe();
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert("api_configuration_preset".to_string(), json!({}));
    user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));
    user_input.insert("expert".to_string(), json!(true));

    // a numeric string still counts as a score
    user_input.insert("minimum_score".to_string(), json!("0.9"));
    let effective = manifest.effective_params(&user_input).unwrap();
    let params = EntityRecognitionParams::from_effective(&effective).unwrap();
    assert_eq!(params.minimum_score, 0.9);

    // anything else does not silently fall back to 0
    user_input.insert("minimum_score".to_string(), json!(true));
    let effective = manifest.effective_params(&user_input).unwrap();
    let err = EntityRecognitionParams::from_effective(&effective).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::TypeMismatch { ref field, .. } if field == "minimum_score"
    ));
}

#[test]
fn test_decoding_the_documented_end_to_end_scenario() {
    let manifest = entity_recipe();
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert(
        "api_configuration_preset".to_string(),
        json!({ "aws_region": "us-east-1" }),
    );
    user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));

    let effective = manifest.effective_params(&user_input).unwrap();
    let params = EntityRecognitionParams::from_effective(&effective).unwrap();
    assert_eq!(params.text_column, "notes");
    assert_eq!(params.language, "en");
    assert_eq!(params.entity_types, vec![MedicalEntityType::Medication]);
    assert!(!params.expert);
    assert_eq!(params.minimum_score, 0.0);
    assert_eq!(params.error_handling, ErrorHandling::Log);

    let preset = ApiConfigurationPreset::from_value(&params.api_configuration_preset).unwrap();
    assert_eq!(preset.aws_region, "us-east-1");
    assert_eq!(preset.parallel_workers, 4);
}

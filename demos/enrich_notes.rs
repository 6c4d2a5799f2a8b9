//! A complete walkthrough: load a recipe descriptor, resolve its parameters,
//! enrich a batch of clinical notes and shape the responses into columns.
//!
//! This example demonstrates:
//! - Loading the built-in recipe descriptors into a registry
//! - How parameter visibility reacts to the expert toggle
//! - Collecting the effective parameter mapping from user input
//! - Decoding the typed recipe configuration
//! - Running the parallel enrichment against an analyzer
//! - Expanding raw responses into per-entity-type columns

use async_trait::async_trait;
use medcomprehend::prelude::*;
use serde_json::json;
use std::collections::HashMap;

// ============================================================================
// Step 1: An Analyzer to Run Against
// ============================================================================

/// A canned analyzer so the example runs without AWS credentials. The real
/// client (`medcomprehend::ComprehendMedicalClient`, behind the `aws`
/// feature) implements the same trait.
struct DemoAnalyzer;

#[async_trait]
impl MedicalTextAnalyzer for DemoAnalyzer {
    async fn detect_entities(&self, text: &str) -> Result<ParamValue, AnalyzerError> {
        let haystack = text.to_lowercase();
        let mut entities = Vec::new();
        for (needle, category, score) in [
            ("aspirin", "MEDICATION", 0.99),
            ("metformin", "MEDICATION", 0.97),
            ("ibuprofen", "MEDICATION", 0.55),
            ("headache", "MEDICAL_CONDITION", 0.98),
            ("diabetes", "MEDICAL_CONDITION", 0.96),
        ] {
            if haystack.contains(needle) {
                entities.push(json!({
                    "Text": needle,
                    "Category": category,
                    "Type": "GENERIC_NAME",
                    "Score": score
                }));
            }
        }
        Ok(json!({ "Entities": entities, "ModelVersion": "demo" }))
    }

    async fn detect_phi(&self, _text: &str) -> Result<ParamValue, AnalyzerError> {
        Ok(json!({ "Entities": [] }))
    }
}

// ============================================================================
// Main: From Descriptor to Enriched Output
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Medical Entity Recognition Walkthrough ===\n");

    // --- Load the built-in recipes ---
    let registry = RecipeRegistry::with_builtin_recipes()?;
    println!("Available recipes: {:?}", registry.ids());
    let recipe = registry
        .get("medical-entity-recognition")
        .expect("built-in recipe");
    println!("Loaded '{}'\n", recipe.meta.label);

    // --- Visibility reacts to the expert toggle ---
    let mut form = HashMap::new();
    let mut basic: Vec<String> = recipe.visible_params(&form).into_iter().collect();
    basic.sort();
    println!("Visible without expert mode: {:?}", basic);

    form.insert("expert".to_string(), json!(true));
    let mut expert: Vec<String> = recipe.visible_params(&form).into_iter().collect();
    expert.sort();
    println!("Visible with expert mode:    {:?}\n", expert);

    // --- Resolve the effective parameters of an invocation ---
    let mut user_input = HashMap::new();
    user_input.insert("text_column".to_string(), json!("notes"));
    user_input.insert(
        "api_configuration_preset".to_string(),
        json!({ "aws_region": "us-east-1", "parallel_workers": 2 }),
    );
    user_input.insert(
        "entity_types".to_string(),
        json!(["MEDICATION", "MEDICAL_CONDITION"]),
    );
    user_input.insert("expert".to_string(), json!(true));
    user_input.insert("minimum_score".to_string(), json!(0.6));

    let effective = recipe.effective_params(&user_input)?;
    let params = EntityRecognitionParams::from_effective(&effective)?;
    println!(
        "Running over column '{}' with minimum score {}",
        params.text_column, params.minimum_score
    );

    // --- Build a batch of clinical notes ---
    let mut batch = RowBatch::new(vec!["patient_id".to_string(), "notes".to_string()]);
    let notes = [
        "Patient reports a headache, took aspirin 100mg with relief.",
        "Started metformin for type 2 diabetes, tolerating well.",
        "",
        "Ibuprofen 400mg for knee pain.",
    ];
    for (i, note) in notes.iter().enumerate() {
        let mut row = HashMap::new();
        row.insert("patient_id".to_string(), json!(i + 1));
        row.insert("notes".to_string(), json!(note));
        batch.push_row(row);
    }

    // --- Enrich and format ---
    let preset = ApiConfigurationPreset::from_value(&params.api_configuration_preset)?;
    let options = EnrichmentOptions::from_preset(
        AnalyzerOperation::DetectEntities,
        &preset,
        params.error_handling,
    );
    let enriched = enrich_rows(&DemoAnalyzer, &batch, &params.text_column, &options).await?;

    let formatter = EntityRecognitionFormatter::from_params(&batch.columns, &params);
    let output = formatter.format_batch(&enriched)?;

    println!("\nOutput columns:");
    for (name, description) in formatter.column_descriptions() {
        println!("  {}: {}", name, description);
    }

    println!("\nEnriched rows:");
    for (i, _) in output.rows.iter().enumerate() {
        let medications = output
            .cell(i, "medical_entity_api_entity_type_medication_text")
            .cloned()
            .unwrap_or_default();
        let conditions = output
            .cell(i, "medical_entity_api_entity_type_medical condition_text")
            .cloned()
            .unwrap_or_default();
        println!(
            "  patient {}: medications={} conditions={}",
            i + 1,
            medications,
            conditions
        );
    }

    // The ibuprofen mention scored below 0.6, so row 4 comes back empty.
    println!("\n=== Walkthrough completed successfully! ===");
    Ok(())
}

//! Recipe documents shipped with this crate.

/// Id of the medical entity recognition recipe.
pub const MEDICAL_ENTITY_RECOGNITION_ID: &str = "medical-entity-recognition";

/// Id of the protected health information extraction recipe.
pub const MEDICAL_PHI_EXTRACTION_ID: &str = "medical-phi-extraction";

/// Manifest document for the medical entity recognition recipe.
pub const MEDICAL_ENTITY_RECOGNITION: &str =
    include_str!("../recipes/medical-entity-recognition/recipe.json");

/// Manifest document for the protected health information extraction recipe.
pub const MEDICAL_PHI_EXTRACTION: &str =
    include_str!("../recipes/medical-phi-extraction/recipe.json");

/// The shipped recipes as (id, document) pairs, in registration order.
pub fn builtin_recipes() -> [(&'static str, &'static str); 2] {
    [
        (MEDICAL_ENTITY_RECOGNITION_ID, MEDICAL_ENTITY_RECOGNITION),
        (MEDICAL_PHI_EXTRACTION_ID, MEDICAL_PHI_EXTRACTION),
    ]
}

//! # medcomprehend
//!
//! Recipe descriptors, parameter validation, and parallel row enrichment for
//! medical entity recognition backed by Amazon Comprehend Medical.
//!
//! ## Features
//!
//! - **Bit-exact descriptors**: Parse and serialize recipe manifests without losing a key
//! - **Validated parameters**: Duplicates, defaults, ranges and role references checked up front
//! - **Typed visibility conditions**: `model.*` expressions parsed into an AST you can evaluate
//! - **Parallel enrichment**: Bounded-concurrency row fan-out under a client-side quota, with retry and a per-row error policy
//! - **Pluggable analyzer**: The service is a trait, so tests never touch the network; the real SigV4 client is feature-gated
//!
//! ## Quick Start
//!
//! ```rust
//! use medcomprehend::prelude::*;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), ValidationError> {
//! // Load the built-in recipe descriptors
//! let registry = RecipeRegistry::with_builtin_recipes()?;
//! let recipe = registry.get("medical-entity-recognition").unwrap();
//!
//! // Resolve what a user typed into the form
//! let mut user_input = HashMap::new();
//! user_input.insert("text_column".to_string(), json!("notes"));
//! user_input.insert("api_configuration_preset".to_string(), json!("p1"));
//! user_input.insert("entity_types".to_string(), json!(["MEDICATION"]));
//!
//! let effective = recipe.effective_params(&user_input)?;
//! assert_eq!(effective.get_str("language"), Some("en"));
//! assert_eq!(effective.get_bool("expert"), Some(false));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`manifest`]: Recipe descriptors, validation, visibility conditions, effective parameters
//! - [`recipes`]: The built-in recipe documents
//! - [`contract`]: Typed view of the effective parameters a recipe runs with
//! - [`runtime`]: Analyzer trait, row batches, parallel enrichment
//! - [`format`]: Shaping raw responses into output columns
//! - [`prelude`]: Commonly used types (import with `use medcomprehend::prelude::*`)

// ============================================================================
// Modules
// ============================================================================

pub mod contract;
pub mod format;
pub mod manifest;
pub mod recipes;
mod registry;
pub mod runtime;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Manifest wire format and validation
pub use manifest::{
    collect_effective_params, resolve_visibility, validate_param_list, DatasetRole,
    EffectiveParams, ParamSpec, ParamType, ParamValue, RecipeManifest, RecipeMeta, RoleArity,
    SelectChoice, ValidationError, VisibilityCondition,
};

// Registry of validated recipes
pub use registry::RecipeRegistry;

// Typed parameter contracts
pub use contract::{
    ensure_column_exists, ApiConfigurationPreset, EntityRecognitionParams, ErrorHandling,
    MedicalEntityType, MedicalPhiType, PhiExtractionParams,
};

// Row enrichment
pub use runtime::{
    enrich_rows, AnalyzerError, AnalyzerOperation, ApiColumnNames, EnrichmentError,
    EnrichmentOptions, MedicalTextAnalyzer, RateLimit, RowBatch,
};

// Response formatting
pub use format::{EntityRecognitionFormatter, FormatError, PhiExtractionFormatter};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything you need to load, validate and run recipes.
///
/// # Example
/// ```rust
/// use medcomprehend::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        collect_effective_params,
        enrich_rows,
        resolve_visibility,
        AnalyzerError,
        AnalyzerOperation,
        ApiConfigurationPreset,
        EffectiveParams,
        // Formatting
        EntityRecognitionFormatter,
        EntityRecognitionParams,
        EnrichmentError,
        EnrichmentOptions,
        ErrorHandling,
        MedicalEntityType,
        MedicalPhiType,
        // Runtime
        MedicalTextAnalyzer,
        ParamSpec,
        ParamType,
        ParamValue,
        PhiExtractionFormatter,
        PhiExtractionParams,
        RateLimit,
        // Manifest
        RecipeManifest,
        RecipeRegistry,
        RowBatch,
        ValidationError,
        VisibilityCondition,
    };
}

// ============================================================================
// AWS Feature
// ============================================================================

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "aws")]
pub use aws::ComprehendMedicalClient;

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::json;
pub use std::collections::HashMap;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");

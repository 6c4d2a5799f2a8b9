//! Visibility resolution and effective parameter collection.
//!
//! At submission time the host turns the user's raw form input into the
//! effective mapping handed to the execution side: user value if present,
//! declared default otherwise, restricted to the parameters visible under
//! the current values. Hidden mandatory parameters are exempt from the
//! mandatory check, separators never carry a value.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;

use crate::manifest::{ParamSpec, ParamValue, RecipeManifest, ValidationError};

/// The resolved name → value mapping delivered to the execution collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveParams {
    values: HashMap<String, ParamValue>,
}

impl EffectiveParams {
    pub fn new(values: HashMap<String, ParamValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(|v| v.as_bool())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(|v| v.as_f64())
    }

    pub fn into_inner(self) -> HashMap<String, ParamValue> {
        self.values
    }
}

impl Deref for EffectiveParams {
    type Target = HashMap<String, ParamValue>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

/// Returns the names of the parameters visible under `current` values.
///
/// A parameter without a visibility condition is always visible; one with a
/// condition is visible iff the condition evaluates true.
pub fn resolve_visibility(
    params: &[ParamSpec],
    current: &HashMap<String, ParamValue>,
) -> HashSet<String> {
    params
        .iter()
        .filter(|p| {
            p.visibility_condition
                .as_ref()
                .is_none_or(|cond| cond.evaluate(current))
        })
        .map(|p| p.name.clone())
        .collect()
}

/// Resolves the effective parameter mapping for one invocation.
///
/// Every non-separator parameter takes the user's value when provided, its
/// declared default otherwise. Visibility conditions are evaluated against that
/// raw mapping (so a hidden parameter's default still drives conditions that
/// reference it), then hidden parameters are dropped from the result. A visible
/// mandatory parameter with neither a value nor a default fails with
/// [`ValidationError::MissingMandatory`].
pub fn collect_effective_params(
    manifest: &RecipeManifest,
    user_input: &HashMap<String, ParamValue>,
) -> Result<EffectiveParams, ValidationError> {
    let mut raw = HashMap::new();
    for param in manifest.params.iter().filter(|p| !p.is_separator()) {
        if let Some(value) = user_input.get(&param.name) {
            raw.insert(param.name.clone(), value.clone());
        } else if let Some(default) = &param.default_value {
            raw.insert(param.name.clone(), default.clone());
        }
    }

    let visible = resolve_visibility(&manifest.params, &raw);

    let mut values = HashMap::new();
    for param in manifest.params.iter().filter(|p| !p.is_separator()) {
        if !visible.contains(&param.name) {
            continue;
        }
        match raw.get(&param.name) {
            Some(value) => {
                values.insert(param.name.clone(), value.clone());
            }
            None if param.is_mandatory() => {
                return Err(ValidationError::MissingMandatory(param.name.clone()));
            }
            None => {}
        }
    }
    Ok(EffectiveParams::new(values))
}

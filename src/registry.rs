//! Registry of recipe descriptors, keyed by recipe id.
//!
//! Descriptors go through the two-phase lifecycle here: a document is parsed
//! and validated on [`RecipeRegistry::register`], then held immutably behind an
//! `Arc` until it is unregistered. The host keeps one registry for the lifetime
//! of the plugin.

use std::collections::HashMap;
use std::sync::Arc;

use crate::manifest::{RecipeManifest, ValidationError};
use crate::recipes;

/// In-memory store of validated recipe descriptors.
#[derive(Default)]
pub struct RecipeRegistry {
    recipes: HashMap<String, Arc<RecipeManifest>>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// A registry pre-loaded with the recipes shipped in this crate.
    pub fn with_builtin_recipes() -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        for (id, document) in recipes::builtin_recipes() {
            registry.register(id, document)?;
        }
        Ok(registry)
    }

    /// Parses, validates and stores a manifest document under `id`.
    ///
    /// Re-registering an id replaces the previous descriptor; callers holding
    /// an `Arc` to the old one are unaffected.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        document: &str,
    ) -> Result<Arc<RecipeManifest>, ValidationError> {
        let id = id.into();
        let manifest = RecipeManifest::parse(document)?;
        manifest.validate()?;
        let manifest = Arc::new(manifest);
        if self
            .recipes
            .insert(id.clone(), Arc::clone(&manifest))
            .is_some()
        {
            log::warn!("recipe '{}' was already registered, replacing it", id);
        } else {
            log::info!("registered recipe '{}' ({})", id, manifest.meta.label);
        }
        Ok(manifest)
    }

    pub fn get(&self, id: &str) -> Option<Arc<RecipeManifest>> {
        self.recipes.get(id).map(Arc::clone)
    }

    /// Registered recipe ids, sorted for stable iteration.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.recipes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn unregister(&mut self, id: &str) -> Option<Arc<RecipeManifest>> {
        self.recipes.remove(id)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

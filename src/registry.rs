//! Generic plugin registry: case-insensitive name to factory
//!
//! Registries are fixed after engine construction; there is no plugin reload
//! at runtime.

use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::model::Params;

/// Factory producing a fresh plugin instance from its parameter object
pub type PluginFactory<T> = Box<dyn Fn(&Params) -> SimResult<Box<T>> + Send + Sync>;

/// String-keyed plugin registry for one plugin kind
pub struct PluginRegistry<T: ?Sized> {
    kind: &'static str,
    factories: HashMap<String, PluginFactory<T>>,
}

impl<T: ?Sized> PluginRegistry<T> {
    /// Empty registry for the given plugin kind (used in error messages)
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: HashMap::new(),
        }
    }

    /// Register a factory; names are case-insensitive and later wins
    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn(&Params) -> SimResult<Box<T>> + Send + Sync + 'static,
    ) {
        self.factories
            .insert(name.trim().to_ascii_lowercase(), Box::new(factory));
    }

    /// Instantiate a plugin; unknown names fail cleanly
    pub fn create(&self, name: &str, params: &Params) -> SimResult<Box<T>> {
        let key = name.trim().to_ascii_lowercase();
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| SimError::UnknownPlugin {
                kind: self.kind,
                name: name.to_string(),
            })?;
        factory(params)
    }

    /// True when a factory is registered under the name
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

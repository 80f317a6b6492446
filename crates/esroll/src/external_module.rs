//! Modules left to the runtime and referenced through a single binding

use log::trace;
use rustc_hash::FxHashMap;

use crate::types::ExternalId;

#[derive(Debug, Clone)]
pub struct ExternalModule {
    /// Specifier exactly as imported
    pub id: String,
    pub external_id: ExternalId,
    /// Some importer reads the default export
    pub needs_default: bool,
    /// Some importer reads a named export or the namespace
    pub needs_named: bool,
    pub suggested_names: FxHashMap<String, String>,
    /// Binding the generated code uses for this module
    pub name: Option<String>,
}

impl ExternalModule {
    pub fn new(id: String, external_id: ExternalId) -> Self {
        Self {
            id,
            external_id,
            needs_default: false,
            needs_named: false,
            suggested_names: FxHashMap::default(),
            name: None,
        }
    }

    /// Record a naming hint; the first one for each key wins
    pub fn suggest_name(&mut self, key: &str, suggestion: &str) {
        if !self.suggested_names.contains_key(key) {
            trace!("external {}: suggested name for {key} is {suggestion}", self.id);
            self.suggested_names
                .insert(key.to_owned(), suggestion.to_owned());
        }
    }

    /// Name the module is bound to; falls back to the specifier until
    /// deconfliction assigns one
    pub fn binding(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn rename(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    /// Expression that reads export `name` of this module
    pub fn canonical_name(&self, name: &str) -> String {
        let binding = self.binding();
        match name {
            "default" if self.needs_named => format!("{binding}__default"),
            "default" | "*" => binding.to_owned(),
            member => format!("{binding}.{member}"),
        }
    }
}

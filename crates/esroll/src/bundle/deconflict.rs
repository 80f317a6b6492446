//! Bundle-wide name assignment
//!
//! Every top-level name that survives into the bundle shares one scope. When
//! two modules define the same name, or a module shadows a global some other
//! module reads, all but one of them are renamed with `_` prefixes.

use log::{debug, trace};

use super::Bundle;
use crate::{
    identifier::make_legal_identifier,
    types::{ExternalId, FxIndexMap, FxIndexSet, ModuleId},
};

/// Who introduces a top-level name into the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Definer {
    Module(ModuleId),
    /// The synthesised `var ns = { ... }` of a module imported with `*`
    Namespace(ModuleId),
    External(ExternalId),
}

impl Bundle {
    pub(super) fn deconflict(&mut self) {
        let mut definers: FxIndexMap<String, Vec<Definer>> = FxIndexMap::default();
        let mut conflicts: FxIndexSet<String> = FxIndexSet::default();

        let mut define = |name: String, owner: Definer| {
            let owners = definers.entry(name.clone()).or_default();
            if owners.contains(&owner) {
                return;
            }
            if !owners.is_empty() {
                conflicts.insert(name);
            }
            owners.push(owner);
        };

        for module in self.internal_namespace_modules.clone() {
            let name = self.canonical_name(module, "*");
            define(name, Definer::Namespace(module));
        }

        for statement in self.statements.clone() {
            let module = statement.module;
            let current = &self.modules[module.index()];
            let mut names: Vec<String> = current.statements[statement.index]
                .defines
                .iter()
                .cloned()
                .collect();

            if current.statements[statement.index].is_export_default() {
                let proxied = current
                    .default_export()
                    .and_then(|default| default.identifier.clone());
                let name = self.canonical_name(module, "default");
                let is_proxy = proxied
                    .is_some_and(|identifier| self.canonical_name(module, &identifier) == name);
                if !is_proxy && !names.contains(&name) {
                    names.push(name);
                }
            }

            for name in names {
                define(name, Definer::Module(module));
            }
        }

        for external in &mut self.external_modules {
            let suggestion = external
                .suggested_names
                .get("*")
                .or_else(|| external.suggested_names.get("default"))
                .map_or(external.id.as_str(), String::as_str);
            let name = make_legal_identifier(suggestion);
            trace!("External '{}' is bound to {name}", external.id);
            external.rename(&name);
            define(name, Definer::External(external.external_id));
        }

        for name in &self.assumed_globals {
            if definers.contains_key(name) {
                conflicts.insert(name.clone());
            }
        }

        let mut taken = conflicts.clone();
        for name in &conflicts {
            let mut owners = definers.get(name).cloned().unwrap_or_default();
            // The definer closest to the entry keeps the name
            if !self.assumed_globals.contains(name) {
                owners.pop();
            }

            for owner in owners {
                let mut replacement = name.clone();
                while taken.contains(&replacement)
                    || definers.contains_key(&replacement)
                    || self.assumed_globals.contains(&replacement)
                {
                    replacement.insert(0, '_');
                }
                taken.insert(replacement.clone());

                match owner {
                    Definer::Module(module) => {
                        self.modules[module.index()].rename(name, &replacement);
                    }
                    Definer::Namespace(module) => {
                        self.modules[module.index()].rename_namespace(&replacement);
                    }
                    Definer::External(external) => {
                        debug!("Renaming external binding {name} to {replacement}");
                        self.external_modules[external.index()].rename(&replacement);
                    }
                }
            }
        }

        self.reset_canonical_names();
    }
}

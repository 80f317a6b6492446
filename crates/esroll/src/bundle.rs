//! The build of one entry point: module graph, inclusion, ordering and naming
//!
//! A [`Bundle`] owns every module it fetched. Modules refer to each other by
//! [`ModuleId`] / [`ExternalId`], so cross-module operations (canonical
//! names, marking, defining statements) are methods on the bundle.

mod deconflict;
mod generate;
mod marker;
mod sort;

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

pub use self::generate::{BundleOutput, GenerateOptions};
use crate::{
    error::{BundleError, Result},
    external_module::ExternalModule,
    identifier::{deconflict, make_legal_identifier},
    loader::{FsLoader, Loader},
    module::Module,
    resolver::{DefaultResolver, Resolver},
    scope::{Declaration, ScopeId},
    types::{ExternalId, FxIndexSet, ModuleId, ModuleRef, StatementRef},
};

/// Inputs of a build
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Entry specifier, resolved with no importer
    pub entry: String,
    /// Bare specifiers that are never bundled
    pub external: Vec<String>,
}

pub struct Bundle {
    options: BundleOptions,
    resolver: Box<dyn Resolver>,
    loader: Box<dyn Loader>,

    pub modules: Vec<Module>,
    pub external_modules: Vec<ExternalModule>,
    /// Resolved identity (or specifier, for externals) -> module
    module_cache: FxHashMap<String, ModuleRef>,
    /// Names read somewhere without a definition or import
    pub assumed_globals: FxIndexSet<String>,
    /// Internal modules imported with `import * as`
    pub internal_namespace_modules: Vec<ModuleId>,
    /// Included statements in output order, filled by [`Bundle::build`]
    pub statements: Vec<StatementRef>,
    entry: Option<ModuleId>,
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("entry", &self.options.entry)
            .field("modules", &self.modules.len())
            .field("external_modules", &self.external_modules.len())
            .field("statements", &self.statements.len())
            .finish_non_exhaustive()
    }
}

impl Bundle {
    pub fn new(
        options: BundleOptions,
        resolver: Box<dyn Resolver>,
        loader: Box<dyn Loader>,
    ) -> Self {
        Self {
            options,
            resolver,
            loader,
            modules: Vec::new(),
            external_modules: Vec::new(),
            module_cache: FxHashMap::default(),
            assumed_globals: FxIndexSet::default(),
            internal_namespace_modules: Vec::new(),
            statements: Vec::new(),
            entry: None,
        }
    }

    /// A bundle reading from the filesystem
    pub fn from_fs(options: BundleOptions) -> Self {
        let resolver = DefaultResolver::new(options.external.clone());
        Self::new(options, Box::new(resolver), Box::new(FsLoader))
    }

    pub fn entry_module(&self) -> Option<&Module> {
        self.entry.map(|id| &self.modules[id.index()])
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    /// Fetch the entry, include everything it needs, order and name it
    pub fn build(&mut self) -> Result<()> {
        let entry_specifier = self.options.entry.clone();
        info!("Bundling {entry_specifier}");

        let ModuleRef::Internal(entry) = self.fetch_module(&entry_specifier, None)? else {
            return Err(BundleError::ExternalEntry {
                specifier: entry_specifier,
            });
        };
        self.entry = Some(entry);
        self.suggest_entry_default_name(entry);

        self.mark_all_statements(entry, true)?;
        self.mark_all_modifier_statements()?;

        self.statements = self.sort();
        self.deconflict();

        debug!(
            "Built {} modules ({} external) into {} statements",
            self.modules.len(),
            self.external_modules.len(),
            self.statements.len()
        );
        Ok(())
    }

    fn suggest_entry_default_name(&mut self, entry: ModuleId) {
        let module = &mut self.modules[entry.index()];
        let Some(default) = module.default_export() else {
            return;
        };

        if let Some(declared_name) = default.declared_name.clone() {
            module.suggest_name("default", &declared_name);
            return;
        }

        let stem = std::path::Path::new(&module.id)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let top_level_names: FxHashSet<&str> = module
            .statements
            .iter()
            .flat_map(|statement| statement.defines.iter().map(String::as_str))
            .collect();
        let name = deconflict(&make_legal_identifier(&stem), |name| {
            top_level_names.contains(name)
        });
        module.suggest_name("default", &name);
    }

    /// Resolve `specifier` and return the module it names, loading and
    /// analysing it on first request
    pub fn fetch_module(&mut self, specifier: &str, importer: Option<&str>) -> Result<ModuleRef> {
        let resolved = self
            .resolver
            .resolve(specifier, importer)
            .map_err(|source| BundleError::Resolve {
                specifier: specifier.to_owned(),
                importer: importer.map(str::to_owned),
                source,
            })?;

        let Some(id) = resolved else {
            if importer.is_none() {
                return Err(BundleError::ExternalEntry {
                    specifier: specifier.to_owned(),
                });
            }
            if let Some(&cached) = self.module_cache.get(specifier) {
                return Ok(cached);
            }
            let external_id = ExternalId::new(self.external_modules.len() as u32);
            debug!("External module '{specifier}'");
            self.external_modules
                .push(ExternalModule::new(specifier.to_owned(), external_id));
            let module = ModuleRef::External(external_id);
            self.module_cache.insert(specifier.to_owned(), module);
            return Ok(module);
        };

        if let Some(&cached) = self.module_cache.get(&id) {
            return Ok(cached);
        }

        let source = self
            .loader
            .load(&id)
            .map_err(|source| BundleError::Load {
                id: id.clone(),
                source,
            })?;
        let module_id = ModuleId::new(self.modules.len() as u32);
        debug!("Fetched {id}");
        let (module, assumed_globals) = Module::new(id.clone(), source, module_id)?;
        self.assumed_globals.extend(assumed_globals);
        self.modules.push(module);

        let module = ModuleRef::Internal(module_id);
        self.module_cache.insert(id, module);
        Ok(module)
    }

    /// Fetch the module an import of `module` refers to and remember it
    fn fetch_import(&mut self, module: ModuleId, local_name: &str) -> Result<Option<ModuleRef>> {
        let importer = &self.modules[module.index()];
        let Some(import) = importer.imports.get(local_name) else {
            return Ok(None);
        };
        if let Some(target) = import.module {
            return Ok(Some(target));
        }

        let source = import.source.clone();
        let importer_id = importer.id.clone();
        let target = self.fetch_module(&source, Some(&importer_id))?;
        if let Some(import) = self.modules[module.index()].imports.get_mut(local_name) {
            import.module = Some(target);
        }
        Ok(Some(target))
    }

    /// The name `local` of `module` ends up with in the bundle
    ///
    /// Imports are followed to the exporting module, so every reference to
    /// one binding shares a single spelling.
    pub fn canonical_name(&mut self, module: ModuleId, local: &str) -> String {
        let current = &self.modules[module.index()];

        if local == "default"
            && let Some(default) = current.default_export()
        {
            if let Some(declared_name) = default.declared_name.clone() {
                return self.canonical_name(module, &declared_name);
            }
            if default.is_modified || !current.suggested_names.contains_key("default") {
                let entry_id = self
                    .entry_module()
                    .map_or_else(String::new, |entry| entry.id.clone());
                let current = &self.modules[module.index()];
                let derived = current.derived_default_name(&entry_id);
                return current.renamed(&derived).to_owned();
            }
        }

        if local == "*"
            && let Some(renamed) = &current.namespace_rename
        {
            return renamed.clone();
        }

        let local = current
            .suggested_names
            .get(local)
            .map_or(local, String::as_str)
            .to_owned();
        if let Some(renamed) = current.renames.get(&local) {
            return renamed.clone();
        }
        if let Some(memo) = current.canonical_names.get(&local) {
            return memo.clone();
        }

        let Some(import) = current.imports.get(&local).cloned() else {
            return local;
        };

        // Provisional entry, so cyclic re-exports terminate
        self.modules[module.index()]
            .canonical_names
            .insert(local.clone(), local.clone());

        let canonical = match import.module {
            Some(ModuleRef::Internal(target)) if import.name == "*" => {
                self.canonical_name(target, "*")
            }
            Some(ModuleRef::Internal(target)) => {
                let exporter_local = self.modules[target.index()]
                    .exports
                    .get(&import.name)
                    .map_or_else(|| import.name.clone(), |export| export.local_name.clone());
                self.canonical_name(target, &exporter_local)
            }
            Some(ModuleRef::External(target)) => {
                self.external_modules[target.index()].canonical_name(&import.name)
            }
            None => local.clone(),
        };

        self.modules[module.index()]
            .canonical_names
            .insert(local, canonical.clone());
        canonical
    }

    /// The declaration `local` refers to, following imports into other
    /// internal modules; the last statement declaring it wins
    pub fn find_declaration(&self, module: ModuleId, local: &str) -> Option<Declaration> {
        let mut module = module;
        let mut local = local.to_owned();
        let mut seen = FxHashSet::default();

        while seen.insert((module, local.clone())) {
            let current = &self.modules[module.index()];
            if let Some(import) = current.imports.get(&local) {
                let target = import.module?.internal()?;
                local = self.modules[target.index()]
                    .exports
                    .get(&import.name)?
                    .local_name
                    .clone();
                module = target;
                continue;
            }

            return current.statements.iter().rev().find_map(|statement| {
                statement
                    .scopes
                    .get_declaration(ScopeId::ROOT, &local)
                    .copied()
            });
        }
        None
    }

    /// The statement that defines `local`, following imports (and fetching
    /// them when needed)
    pub fn find_defining_statement(
        &mut self,
        module: ModuleId,
        local: &str,
    ) -> Result<Option<StatementRef>> {
        let mut module = module;
        let mut local = local.to_owned();
        let mut seen = FxHashSet::default();

        while seen.insert((module, local.clone())) {
            let current = &self.modules[module.index()];
            if let Some(&index) = current.definitions.get(&local) {
                return Ok(Some(StatementRef::new(module, index)));
            }
            let Some(import_name) = current.imports.get(&local).map(|i| i.name.clone()) else {
                return Ok(None);
            };
            if import_name == "*" {
                return Ok(None);
            }
            let Some(ModuleRef::Internal(target)) = self.fetch_import(module, &local)? else {
                return Ok(None);
            };
            let Some(export) = self.modules[target.index()].exports.get(&import_name) else {
                return Ok(None);
            };
            local = export.local_name.clone();
            module = target;
        }
        Ok(None)
    }

    /// Clear every module's canonical-name memo
    fn reset_canonical_names(&mut self) {
        for module in &mut self.modules {
            module.canonical_names.clear();
        }
    }
}

/// Build `options.entry` from the filesystem
pub fn rollup(options: BundleOptions) -> Result<Bundle> {
    let mut bundle = Bundle::from_fs(options);
    bundle.build()?;
    Ok(bundle)
}

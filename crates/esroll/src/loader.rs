//! Reading module sources

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::trace;

use crate::{
    resolver::{Resolver, normalize, with_js_extension},
    types::FxIndexMap,
};

/// Produces the source text of a resolved module identity
pub trait Loader {
    fn load(&self, id: &str) -> Result<String>;
}

/// Reads identities as filesystem paths
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
    fn load(&self, id: &str) -> Result<String> {
        trace!("Loading {id}");
        std::fs::read_to_string(id).with_context(|| format!("failed to read {id}"))
    }
}

/// An in-memory module graph keyed by path
///
/// Acts as both resolver and loader. Relative specifiers resolve against the
/// importer the same way the filesystem resolver does, and anything that is
/// neither relative nor registered is external.
#[derive(Debug, Clone, Default)]
pub struct MemoryModules {
    modules: FxIndexMap<String, String>,
}

impl MemoryModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; chainable
    #[must_use]
    pub fn with(mut self, id: &str, source: &str) -> Self {
        self.insert(id, source);
        self
    }

    pub fn insert(&mut self, id: &str, source: &str) {
        self.modules.insert(id.to_owned(), source.to_owned());
    }
}

impl Resolver for MemoryModules {
    fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<Option<String>> {
        if self.modules.contains_key(specifier) {
            return Ok(Some(specifier.to_owned()));
        }
        if !specifier.starts_with('.') && !specifier.starts_with('/') {
            return Ok(None);
        }

        let base = importer
            .and_then(|importer| Path::new(importer).parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let resolved = with_js_extension(normalize(&base.join(specifier)));
        Ok(Some(resolved.to_string_lossy().into_owned()))
    }
}

impl Loader for MemoryModules {
    fn load(&self, id: &str) -> Result<String> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no module registered as {id}"))
    }
}

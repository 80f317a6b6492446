//! Ids and ordered-collection aliases
//!
//! Internal modules, externals and statements are addressed by small copyable
//! ids into the tables owned by [`crate::Bundle`], so analysis can hold on to
//! them across mutable passes.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Insertion-ordered map using the Fx hasher
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Insertion-ordered set using the Fx hasher
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Unique identifier for an internal module of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for an external module of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(u32);

impl ExternalId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What an import specifier resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleRef {
    /// A module parsed into the bundle
    Internal(ModuleId),
    /// A specifier left to the runtime
    External(ExternalId),
}

impl ModuleRef {
    pub fn internal(self) -> Option<ModuleId> {
        match self {
            Self::Internal(id) => Some(id),
            Self::External(_) => None,
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// A statement inside a specific module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementRef {
    pub module: ModuleId,
    pub index: usize,
}

impl StatementRef {
    pub fn new(module: ModuleId, index: usize) -> Self {
        Self { module, index }
    }
}

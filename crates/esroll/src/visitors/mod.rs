//! AST visitors over a single top-level statement
//!
//! Three passes share one scope layout: [`ScopeBuilder`] creates scopes and
//! registers declarations, [`ReferenceCollector`] classifies reads and writes,
//! and [`IdentifierRewriter`] renames references for final emission. Scopes
//! are found again through a span-keyed side table instead of annotating the
//! AST, so the same node can be walked any number of times.

mod identifier_rewriter;
mod reference_collector;
mod scope_builder;
mod utils;

use rustc_hash::FxHashMap;
use swc_core::common::Span;

pub use identifier_rewriter::IdentifierRewriter;
pub use reference_collector::{ReferenceCollector, References, WriteRecord};
pub use scope_builder::ScopeBuilder;
pub use utils::{pattern_bindings, unwrap_parens};

use crate::scope::ScopeId;

/// Node kinds that open a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeNode {
    Function,
    Arrow,
    Getter,
    Setter,
    Constructor,
    Block,
    Catch,
    For,
    Class,
}

impl ScopeNode {
    /// Whether entering this node defers evaluation of its body
    pub const fn is_function(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Arrow | Self::Getter | Self::Setter | Self::Constructor
        )
    }

    /// Whether `this` inside refers to something other than the module's `this`
    pub const fn rebinds_this(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Getter | Self::Setter | Self::Constructor
        )
    }
}

/// Identity of a scope-opening node: its kind plus its span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub node: ScopeNode,
    pub lo: u32,
    pub hi: u32,
}

impl ScopeKey {
    pub fn new(node: ScopeNode, span: Span) -> Self {
        Self {
            node,
            lo: span.lo.0,
            hi: span.hi.0,
        }
    }
}

/// Scope-opening node -> scope created for it
pub type ScopeTable = FxHashMap<ScopeKey, ScopeId>;

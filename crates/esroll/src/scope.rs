//! Lexical scopes of a single statement
//!
//! Scopes live in an arena owned by their statement. Parent links are plain
//! indices, so a tree can be walked any number of times after it is built.

use crate::types::FxIndexMap;

/// Index of a scope inside its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The statement's own top-level scope
    pub const ROOT: Self = Self(0);

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a name was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    /// Function, arrow, setter or constructor parameter
    Param,
    CatchParam,
    /// The name of a named function or class expression, visible only inside it
    ExpressionName,
}

impl DeclarationKind {
    /// Kinds that bind in the scope where they are encountered instead of
    /// climbing to the nearest function scope
    pub const fn binds_in_place(self) -> bool {
        !matches!(self, Self::Var | Self::Function)
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, Self::Var | Self::Let | Self::Const)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Byte range of the declaring identifier
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub depth: usize,
    /// Lexical blocks (`{}`, catch, for heads) as opposed to function scopes
    pub is_block_scope: bool,
    pub declarations: FxIndexMap<String, Declaration>,
}

/// Arena of scopes rooted at a statement's top-level scope
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                depth: 0,
                is_block_scope: false,
                declarations: FxIndexMap::default(),
            }],
        }
    }

    /// Create a child scope of `parent`
    pub fn push_scope(&mut self, parent: ScopeId, is_block_scope: bool) -> ScopeId {
        let depth = self.scope(parent).depth + 1;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            depth,
            is_block_scope,
            declarations: FxIndexMap::default(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Register `name` following hoisting rules
    ///
    /// `var` and function declarations inside a block climb to the nearest
    /// non-block ancestor. Everything else binds in `scope` itself.
    pub fn add_declaration(&mut self, scope: ScopeId, name: &str, declaration: Declaration) {
        let mut target = scope;
        if !declaration.kind.binds_in_place() {
            while let Some(parent) = self.scope(target).parent
                && self.scope(target).is_block_scope
            {
                target = parent;
            }
        }
        self.scopes[target.index()]
            .declarations
            .entry(name.to_owned())
            .or_insert(declaration);
    }

    /// First scope from `scope` outward that declares `name`
    pub fn find_defining_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if scope.declarations.contains_key(name) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }

    pub fn contains(&self, scope: ScopeId, name: &str) -> bool {
        self.find_defining_scope(scope, name).is_some()
    }

    pub fn get_declaration(&self, scope: ScopeId, name: &str) -> Option<&Declaration> {
        self.find_defining_scope(scope, name)
            .and_then(|id| self.scope(id).declarations.get(name))
    }

    /// Whether `scope` itself (not an ancestor) declares `name`
    pub fn declares(&self, scope: ScopeId, name: &str) -> bool {
        self.scope(scope).declarations.contains_key(name)
    }

    /// Names bound in the top-level scope, in declaration order
    pub fn top_level_names(&self) -> impl Iterator<Item = &str> {
        self.scopes[0].declarations.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(kind: DeclarationKind) -> Declaration {
        Declaration {
            kind,
            start: 0,
            end: 0,
        }
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let mut tree = ScopeTree::new();
        let function = tree.push_scope(ScopeId::ROOT, false);
        let block = tree.push_scope(function, true);
        let inner = tree.push_scope(block, true);

        tree.add_declaration(inner, "hoisted", decl(DeclarationKind::Var));
        tree.add_declaration(inner, "local", decl(DeclarationKind::Let));

        assert!(tree.declares(function, "hoisted"));
        assert!(!tree.declares(inner, "hoisted"));
        assert!(tree.declares(inner, "local"));
        assert!(!tree.contains(function, "local"));
    }

    #[test]
    fn test_top_level_block_var_reaches_root() {
        let mut tree = ScopeTree::new();
        let block = tree.push_scope(ScopeId::ROOT, true);
        tree.add_declaration(block, "a", decl(DeclarationKind::Function));
        assert_eq!(tree.top_level_names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_find_defining_scope_walks_outward() {
        let mut tree = ScopeTree::new();
        tree.add_declaration(ScopeId::ROOT, "outer", decl(DeclarationKind::Const));
        let function = tree.push_scope(ScopeId::ROOT, false);
        tree.add_declaration(function, "param", decl(DeclarationKind::Param));
        let block = tree.push_scope(function, true);

        assert_eq!(tree.find_defining_scope(block, "param"), Some(function));
        assert_eq!(tree.find_defining_scope(block, "outer"), Some(ScopeId::ROOT));
        assert_eq!(tree.find_defining_scope(block, "missing"), None);
        assert_eq!(tree.scope(block).depth, 2);
        assert_eq!(
            tree.get_declaration(block, "outer").map(|d| d.kind),
            Some(DeclarationKind::Const)
        );
    }

    #[test]
    fn test_catch_param_binds_in_block() {
        let mut tree = ScopeTree::new();
        let catch = tree.push_scope(ScopeId::ROOT, true);
        tree.add_declaration(catch, "err", decl(DeclarationKind::CatchParam));
        assert!(tree.declares(catch, "err"));
        assert!(!tree.declares(ScopeId::ROOT, "err"));
    }
}

//! One top-level unit of inclusion inside a module

use rustc_hash::{FxHashMap, FxHashSet};
use swc_core::{
    common::Spanned,
    ecma::{
        ast::{Decl, ExportDecl, ModuleDecl, ModuleItem, Pat, Stmt, VarDecl, VarDeclKind},
        visit::VisitWith,
    },
};

use crate::{
    parser::{CommentRecord, span_range},
    scope::ScopeTree,
    source_patch::SourcePatch,
    types::FxIndexSet,
    visitors::{
        IdentifierRewriter, ReferenceCollector, ScopeBuilder, ScopeTable, WriteRecord,
        pattern_bindings,
    },
};

/// A comment attached before a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingComment {
    /// Original text between the previous leading comment and this one, or a
    /// single newline for the first
    pub separator: String,
    pub comment: CommentRecord,
}

/// Where a statement's emitted text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextRange {
    /// The statement's own span
    Node,
    /// One declarator of a split `var`/`let`/`const` list, re-wrapped as
    /// `<kind> <declarator>;`
    Declarator {
        kind: VarDeclKind,
        start: usize,
        end: usize,
    },
}

#[derive(Debug)]
pub struct Statement {
    pub node: ModuleItem,
    pub index: usize,
    /// Byte range of the top-level node; shared by all parts of a split
    /// declaration list
    pub start: usize,
    pub end: usize,
    text: TextRange,

    pub defines: FxIndexSet<String>,
    pub modifies: FxIndexSet<String>,
    pub depends_on: FxIndexSet<String>,
    pub strongly_depends_on: FxIndexSet<String>,
    pub writes: Vec<WriteRecord>,
    pub scopes: ScopeTree,
    pub scope_table: ScopeTable,

    pub leading_comments: Vec<LeadingComment>,
    pub trailing_comment: Option<CommentRecord>,
    /// Newline counts of the gaps before and after the statement
    pub margin: [usize; 2],

    pub is_included: bool,
}

impl Statement {
    fn with_text(node: ModuleItem, index: usize, text: TextRange) -> Self {
        let (start, end) = span_range(node.span());
        Self {
            node,
            index,
            start,
            end,
            text,
            defines: FxIndexSet::default(),
            modifies: FxIndexSet::default(),
            depends_on: FxIndexSet::default(),
            strongly_depends_on: FxIndexSet::default(),
            writes: Vec::new(),
            scopes: ScopeTree::new(),
            scope_table: ScopeTable::default(),
            leading_comments: Vec::new(),
            trailing_comment: None,
            margin: [0, 0],
            is_included: false,
        }
    }

    pub fn new(node: ModuleItem, index: usize) -> Self {
        Self::with_text(node, index, TextRange::Node)
    }

    /// One statement per declarator of a top-level declaration list
    pub fn split_declarations(var: &VarDecl, first_index: usize) -> Vec<Self> {
        var.decls
            .iter()
            .enumerate()
            .map(|(offset, declarator)| {
                let (start, end) = span_range(declarator.span);
                let mut single = var.clone();
                single.decls = vec![declarator.clone()];
                let node = ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(single))));
                Self::with_text(
                    node,
                    first_index + offset,
                    TextRange::Declarator {
                        kind: var.kind,
                        start,
                        end,
                    },
                )
            })
            .collect()
    }

    /// Build scopes, then classify reads and writes
    pub fn analyse(&mut self) {
        if self.is_import_declaration() {
            return;
        }

        self.node
            .visit_with(&mut ScopeBuilder::new(&mut self.scopes, &mut self.scope_table));

        let mut collector = ReferenceCollector::new(&self.scopes, &self.scope_table);
        self.node.visit_with(&mut collector);
        let references = collector.into_references();

        self.defines = self.scopes.top_level_names().map(str::to_owned).collect();
        self.depends_on = references
            .depends_on
            .into_iter()
            .filter(|name| !self.defines.contains(name))
            .collect();
        self.strongly_depends_on = references
            .strongly_depends_on
            .into_iter()
            .filter(|name| !self.defines.contains(name))
            .collect();
        self.modifies = references
            .writes
            .iter()
            .map(|write| write.name.clone())
            .collect();
        self.writes = references.writes;
    }

    /// Flag the statement as included
    ///
    /// Returns the names that now have to be requested from the owning
    /// module, or nothing when the statement was already included.
    pub fn mark(&mut self) -> Vec<String> {
        if self.is_included {
            return Vec::new();
        }
        self.is_included = true;
        self.depends_on.iter().cloned().collect()
    }

    pub fn module_decl(&self) -> Option<&ModuleDecl> {
        match &self.node {
            ModuleItem::ModuleDecl(decl) => Some(decl),
            ModuleItem::Stmt(_) => None,
        }
    }

    pub fn is_import_declaration(&self) -> bool {
        matches!(self.module_decl(), Some(ModuleDecl::Import(_)))
    }

    pub fn is_export_declaration(&self) -> bool {
        matches!(
            self.module_decl(),
            Some(
                ModuleDecl::ExportDecl(_)
                    | ModuleDecl::ExportNamed(_)
                    | ModuleDecl::ExportDefaultDecl(_)
                    | ModuleDecl::ExportDefaultExpr(_)
            )
        )
    }

    pub fn is_export_default(&self) -> bool {
        matches!(
            self.module_decl(),
            Some(ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_))
        )
    }

    /// `export { a, b }`, with or without `from`
    pub fn is_export_list(&self) -> bool {
        matches!(self.module_decl(), Some(ModuleDecl::ExportNamed(_)))
    }

    /// Source of an `import 'x'` with no specifiers
    pub fn bare_import_source(&self) -> Option<&str> {
        match self.module_decl() {
            Some(ModuleDecl::Import(import)) if import.specifiers.is_empty() => {
                Some(&*import.src.value)
            }
            _ => None,
        }
    }

    /// The variable declaration at the top of this statement, exported or not
    pub fn top_level_var(&self) -> Option<&VarDecl> {
        match &self.node {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var)))
            | ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                decl: Decl::Var(var),
                ..
            })) => Some(var),
            _ => None,
        }
    }

    /// Byte range of the text this statement emits
    pub fn text_range(&self) -> (usize, usize) {
        match self.text {
            TextRange::Node => (self.start, self.end),
            TextRange::Declarator { start, end, .. } => (start, end),
        }
    }

    /// Produce the statement's text with identifiers substituted
    ///
    /// `names` maps local names to their replacement; `bundle_exports` maps
    /// names of live bundle exports to the property they are written through
    /// (`count` -> `exports.count`).
    pub fn replace_identifiers<'a>(
        &self,
        source: &'a str,
        names: &FxHashMap<String, String>,
        bundle_exports: &FxHashMap<String, String>,
    ) -> SourcePatch<'a> {
        let (start, end) = self.text_range();
        let mut patch = SourcePatch::new(source, start, end);
        if let TextRange::Declarator { kind, .. } = self.text {
            patch.prepend(&format!("{} ", var_keyword(kind)));
            patch.append(";");
        }

        let mut names = names.clone();
        let mut skip = FxHashSet::default();

        if let Some(var) = self.top_level_var() {
            let single_export = match var.decls.as_slice() {
                [declarator] => match &declarator.name {
                    Pat::Ident(binding) => bundle_exports
                        .get(&*binding.id.sym)
                        .map(|target| (binding, target)),
                    _ => None,
                },
                _ => None,
            };

            if let Some((binding, target)) = single_export {
                let (id_start, id_end) = span_range(binding.id.span);
                if matches!(self.text, TextRange::Declarator { .. }) {
                    patch.clear_intro();
                    patch.overwrite(id_start, id_end, target.clone());
                } else {
                    let (var_start, _) = span_range(var.span);
                    patch.overwrite(var_start, id_end, target.clone());
                }
                skip.insert(id_start);
            } else {
                let mut declared = Vec::new();
                for declarator in &var.decls {
                    pattern_bindings(&declarator.name, &mut declared);
                }
                let mut initialisers = String::new();
                for ident in declared {
                    if let Some(target) = bundle_exports.get(&*ident.sym) {
                        initialisers.push_str(&format!("\n{target} = {};", ident.sym));
                        names.remove(&*ident.sym);
                    }
                }
                if !initialisers.is_empty() {
                    let (_, var_end) = span_range(var.span);
                    patch.insert(var_end, &initialisers);
                }
            }
        }

        self.node.visit_with(&mut IdentifierRewriter::new(
            &self.scopes,
            &self.scope_table,
            &mut patch,
            names,
            skip,
        ));
        patch
    }
}

fn var_keyword(kind: VarDeclKind) -> &'static str {
    match kind {
        VarDeclKind::Var => "var",
        VarDeclKind::Let => "let",
        VarDeclKind::Const => "const",
    }
}

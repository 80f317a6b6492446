//! Final pass over a statement: apply bundle-wide renames to its text

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use swc_core::ecma::{
    ast::{
        ArrowExpr, AssignPatProp, BlockStmt, BlockStmtOrExpr, BreakStmt, CatchClause, Class,
        ClassExpr, ClassProp, Constructor, ContinueStmt, ExportNamedSpecifier, FnExpr,
        ForInStmt, ForOfStmt, ForStmt, Function, GetterProp, Ident, ImportDecl, LabeledStmt,
        PrivateName, PrivateProp, Prop, SetterProp, StaticBlock, ThisExpr,
    },
    visit::{Visit, VisitWith},
};

use super::{ScopeKey, ScopeNode, ScopeTable};
use crate::{
    parser::span_range,
    scope::ScopeTree,
    source_patch::SourcePatch,
};

type Names = FxHashMap<String, String>;

/// Rewrites identifier references into a [`SourcePatch`]
///
/// The replacement map is narrowed on entering every scope: names the scope
/// declares itself are dropped, and declarations that would capture the root
/// of a replacement (`exports` in `exports.count`, or a renamed `_helper`) are
/// renamed to `<root>$$` inside that scope.
pub struct IdentifierRewriter<'r, 'a> {
    tree: &'r ScopeTree,
    table: &'r ScopeTable,
    patch: &'r mut SourcePatch<'a>,
    names: Vec<Names>,
    deshadow_roots: Vec<String>,
    this_depth: usize,
    skip: FxHashSet<usize>,
}

impl<'r, 'a> IdentifierRewriter<'r, 'a> {
    /// `skip` holds start offsets of identifiers the caller already rewrote
    pub fn new(
        tree: &'r ScopeTree,
        table: &'r ScopeTable,
        patch: &'r mut SourcePatch<'a>,
        names: Names,
        skip: FxHashSet<usize>,
    ) -> Self {
        let mut deshadow_roots: Vec<String> = Vec::new();
        for (name, replacement) in &names {
            if name == replacement {
                continue;
            }
            let root = replacement.split('.').next().unwrap_or(replacement);
            if !deshadow_roots.iter().any(|existing| existing == root) {
                deshadow_roots.push(root.to_owned());
            }
        }
        Self {
            tree,
            table,
            patch,
            names: vec![names],
            deshadow_roots,
            this_depth: 0,
            skip,
        }
    }

    fn current_names(&self) -> &Names {
        // The stack always holds the statement-level map at the bottom
        &self.names[self.names.len() - 1]
    }

    fn replacement(&self, ident: &Ident) -> Option<String> {
        let (start, _) = span_range(ident.span);
        if self.skip.contains(&start) {
            return None;
        }
        self.current_names()
            .get(&*ident.sym)
            .filter(|replacement| **replacement != *ident.sym)
            .cloned()
    }

    fn scoped(&mut self, key: ScopeKey, f: impl FnOnce(&mut Self)) {
        let rebinds_this = key.node.rebinds_this();
        let Some(&scope) = self.table.get(&key) else {
            self.this_depth += usize::from(rebinds_this);
            f(self);
            self.this_depth -= usize::from(rebinds_this);
            return;
        };

        let declarations = &self.tree.scope(scope).declarations;
        let mut next: Names = self
            .current_names()
            .iter()
            .filter(|(name, _)| !declarations.contains_key(name.as_str()))
            .map(|(name, replacement)| (name.clone(), replacement.clone()))
            .collect();
        for root in &self.deshadow_roots {
            if declarations.contains_key(root.as_str()) {
                next.insert(root.clone(), format!("{root}$$"));
            }
        }

        let this_depth = self.this_depth + usize::from(rebinds_this);
        if next.is_empty() && this_depth > 0 {
            return;
        }

        let parent_depth = mem::replace(&mut self.this_depth, this_depth);
        self.names.push(next);
        f(self);
        self.names.pop();
        self.this_depth = parent_depth;
    }

    /// `this` in field initialisers and static blocks is the instance or the
    /// class, never the module's
    fn bound_this(&mut self, f: impl FnOnce(&mut Self)) {
        self.this_depth += 1;
        f(self);
        self.this_depth -= 1;
    }

    fn function(&mut self, function: &Function, name: Option<&Ident>) {
        function.decorators.visit_with(self);
        self.scoped(ScopeKey::new(ScopeNode::Function, function.span), |this| {
            if let Some(name) = name {
                this.visit_ident(name);
            }
            function.params.visit_with(this);
            if let Some(body) = &function.body {
                body.stmts.visit_with(this);
            }
        });
    }
}

impl Visit for IdentifierRewriter<'_, '_> {
    fn visit_ident(&mut self, ident: &Ident) {
        if let Some(replacement) = self.replacement(ident) {
            let (start, end) = span_range(ident.span);
            self.patch.overwrite(start, end, replacement);
        }
    }

    fn visit_this_expr(&mut self, node: &ThisExpr) {
        if self.this_depth == 0 {
            let (start, end) = span_range(node.span);
            self.patch.overwrite(start, end, "undefined");
        }
    }

    fn visit_prop(&mut self, node: &Prop) {
        let Prop::Shorthand(ident) = node else {
            node.visit_children_with(self);
            return;
        };
        if let Some(replacement) = self.replacement(ident) {
            let (start, end) = span_range(ident.span);
            self.patch
                .overwrite(start, end, format!("{}: {replacement}", ident.sym));
        }
    }

    fn visit_assign_pat_prop(&mut self, node: &AssignPatProp) {
        if let Some(replacement) = self.replacement(&node.key.id) {
            let (start, end) = span_range(node.key.id.span);
            self.patch
                .overwrite(start, end, format!("{}: {replacement}", node.key.id.sym));
        }
        node.value.visit_with(self);
    }

    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_export_named_specifier(&mut self, _: &ExportNamedSpecifier) {}

    fn visit_private_name(&mut self, _: &PrivateName) {}

    fn visit_labeled_stmt(&mut self, node: &LabeledStmt) {
        node.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, _: &BreakStmt) {}

    fn visit_continue_stmt(&mut self, _: &ContinueStmt) {}

    fn visit_function(&mut self, node: &Function) {
        self.function(node, None);
    }

    fn visit_fn_expr(&mut self, node: &FnExpr) {
        self.function(&node.function, node.ident.as_ref());
    }

    // `extends` and computed keys run in the enclosing scope
    fn visit_class(&mut self, node: &Class) {
        node.decorators.visit_with(self);
        node.super_class.visit_with(self);
        node.body.visit_with(self);
    }

    fn visit_class_prop(&mut self, node: &ClassProp) {
        node.decorators.visit_with(self);
        node.key.visit_with(self);
        self.bound_this(|this| node.value.visit_with(this));
    }

    fn visit_private_prop(&mut self, node: &PrivateProp) {
        node.decorators.visit_with(self);
        self.bound_this(|this| node.value.visit_with(this));
    }

    fn visit_static_block(&mut self, node: &StaticBlock) {
        self.bound_this(|this| node.body.visit_with(this));
    }

    fn visit_class_expr(&mut self, node: &ClassExpr) {
        let Some(ident) = &node.ident else {
            node.class.visit_with(self);
            return;
        };
        self.scoped(ScopeKey::new(ScopeNode::Class, node.class.span), |this| {
            this.visit_ident(ident);
            node.class.visit_with(this);
        });
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        self.scoped(ScopeKey::new(ScopeNode::Arrow, node.span), |this| {
            node.params.visit_with(this);
            match &*node.body {
                BlockStmtOrExpr::BlockStmt(body) => body.stmts.visit_with(this),
                BlockStmtOrExpr::Expr(expr) => expr.visit_with(this),
            }
        });
    }

    fn visit_getter_prop(&mut self, node: &GetterProp) {
        node.key.visit_with(self);
        self.scoped(ScopeKey::new(ScopeNode::Getter, node.span), |this| {
            if let Some(body) = &node.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_setter_prop(&mut self, node: &SetterProp) {
        node.key.visit_with(self);
        self.scoped(ScopeKey::new(ScopeNode::Setter, node.span), |this| {
            node.param.visit_with(this);
            if let Some(body) = &node.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_constructor(&mut self, node: &Constructor) {
        node.key.visit_with(self);
        self.scoped(ScopeKey::new(ScopeNode::Constructor, node.span), |this| {
            node.params.visit_with(this);
            if let Some(body) = &node.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_block_stmt(&mut self, node: &BlockStmt) {
        self.scoped(ScopeKey::new(ScopeNode::Block, node.span), |this| {
            node.visit_children_with(this);
        });
    }

    fn visit_catch_clause(&mut self, node: &CatchClause) {
        self.scoped(ScopeKey::new(ScopeNode::Catch, node.span), |this| {
            node.visit_children_with(this);
        });
    }

    fn visit_for_stmt(&mut self, node: &ForStmt) {
        self.scoped(ScopeKey::new(ScopeNode::For, node.span), |this| {
            node.visit_children_with(this);
        });
    }

    fn visit_for_in_stmt(&mut self, node: &ForInStmt) {
        self.scoped(ScopeKey::new(ScopeNode::For, node.span), |this| {
            node.visit_children_with(this);
        });
    }

    fn visit_for_of_stmt(&mut self, node: &ForOfStmt) {
        self.scoped(ScopeKey::new(ScopeNode::For, node.span), |this| {
            node.visit_children_with(this);
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use swc_core::{common::Spanned, ecma::visit::VisitWith};

    use super::*;
    use crate::{
        parser::{parse_module, span_range},
        visitors::ScopeBuilder,
    };

    fn rewrite(source: &str, names: &[(&str, &str)]) -> String {
        let parsed = parse_module("t.js", source).expect("parse");
        let item = &parsed.ast.body[0];
        let mut tree = ScopeTree::new();
        let mut table = ScopeTable::default();
        item.visit_with(&mut ScopeBuilder::new(&mut tree, &mut table));

        let names = names
            .iter()
            .map(|(name, replacement)| ((*name).to_owned(), (*replacement).to_owned()))
            .collect();
        let (start, end) = span_range(parsed.ast.body[0].span());
        let mut patch = SourcePatch::new(source, start, end);
        item.visit_with(&mut IdentifierRewriter::new(
            &tree,
            &table,
            &mut patch,
            names,
            FxHashSet::default(),
        ));
        patch.to_string()
    }

    #[test]
    fn test_renames_free_references_only() {
        assert_eq!(
            rewrite(
                "function run(helper) { return helper() + other.helper; } ",
                &[("helper", "_helper")]
            ),
            "function run(helper) { return helper() + other.helper; }"
        );
        assert_eq!(
            rewrite("var x = helper(helper.name);", &[("helper", "_helper")]),
            "var x = _helper(_helper.name);"
        );
    }

    #[test]
    fn test_deshadows_inner_declarations() {
        assert_eq!(
            rewrite(
                "function run() { var _helper = 1; return helper(_helper); }",
                &[("helper", "_helper"), ("run", "run")]
            ),
            "function run() { var _helper$$ = 1; return _helper(_helper$$); }"
        );
    }

    #[test]
    fn test_expands_shorthand() {
        assert_eq!(
            rewrite("var o = { helper, x: 1 };", &[("helper", "_helper")]),
            "var o = { helper: _helper, x: 1 };"
        );
        assert_eq!(
            rewrite("var { helper } = lib;", &[("helper", "_helper")]),
            "var { helper: _helper } = lib;"
        );
    }

    #[test]
    fn test_top_level_this_becomes_undefined() {
        assert_eq!(
            rewrite(
                "var self = this || (() => this)() || function () { return this; };",
                &[]
            ),
            "var self = undefined || (() => undefined)() || function () { return this; };"
        );
    }

    #[test]
    fn test_this_in_class_heritage_and_keys_is_top_level() {
        assert_eq!(
            rewrite("class A extends (this || Object) {}", &[]),
            "class A extends (undefined || Object) {}"
        );
        assert_eq!(
            rewrite(
                "class A { [this.key] () { return this; } field = this; static { this.n = 1; } }",
                &[]
            ),
            "class A { [undefined.key] () { return this; } field = this; static { this.n = 1; } }"
        );
    }

    #[test]
    fn test_labels_are_untouched() {
        assert_eq!(
            rewrite("loop: for (;;) { break loop; }", &[("loop", "_loop")]),
            "loop: for (;;) { break loop; }"
        );
    }
}

//! Second pass over a statement: classify identifier reads and writes

use std::mem;

use rustc_hash::FxHashSet;
use swc_core::ecma::{
    ast::{
        ArrayPat, ArrowExpr, AssignExpr, AssignTarget, AssignTargetPat, BlockStmt,
        BlockStmtOrExpr, BreakStmt, CallExpr, Callee, CatchClause, ClassExpr, ClassProp,
        Constructor, ContinueStmt, Expr, ExportNamedSpecifier, FnExpr, ForInStmt, ForOfStmt,
        ForStmt, Function, GetterProp, Ident, ImportDecl, LabeledStmt, MemberExpr,
        ModuleExportName, ObjectPat, ObjectPatProp, Pat, PrivateName, PrivateProp, SetterProp,
        SimpleAssignTarget, UpdateExpr,
    },
    visit::{Visit, VisitWith},
};

use super::{ScopeKey, ScopeNode, ScopeTable, utils::unwrap_parens};
use crate::{
    parser::span_range,
    scope::{ScopeId, ScopeTree},
    types::FxIndexSet,
};

/// A write to a name that is free in the statement or bound at its top level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub name: String,
    /// Number of member accesses between the root identifier and the write;
    /// `a = 1` is 0, `a.b = 1` is 1
    pub member_depth: usize,
    /// Assignments and updates, as opposed to being passed to a call
    pub is_assignment: bool,
    /// Byte offset of the root identifier
    pub start: usize,
    /// Whether the write happens inside any scope below the statement's root
    pub nested: bool,
}

/// Everything pass two learns about a statement
#[derive(Debug, Default)]
pub struct References {
    pub depends_on: FxIndexSet<String>,
    pub strongly_depends_on: FxIndexSet<String>,
    pub writes: Vec<WriteRecord>,
}

/// Walks a statement whose scopes were already built by
/// [`ScopeBuilder`](super::ScopeBuilder)
///
/// A counter tracks how many function bodies that are not immediately invoked
/// enclose the current node. Reads seen while it is zero run when the module
/// is evaluated and count as strong dependencies.
pub struct ReferenceCollector<'a> {
    tree: &'a ScopeTree,
    table: &'a ScopeTable,
    current: ScopeId,
    deferred_depth: usize,
    iife_callees: FxHashSet<ScopeKey>,
    references: References,
}

impl<'a> ReferenceCollector<'a> {
    pub fn new(tree: &'a ScopeTree, table: &'a ScopeTable) -> Self {
        Self {
            tree,
            table,
            current: ScopeId::ROOT,
            deferred_depth: 0,
            iife_callees: FxHashSet::default(),
            references: References::default(),
        }
    }

    pub fn into_references(self) -> References {
        self.references
    }

    fn scoped(&mut self, key: ScopeKey, f: impl FnOnce(&mut Self)) {
        let Some(&scope) = self.table.get(&key) else {
            f(self);
            return;
        };
        let deferred = key.node.is_function() && !self.iife_callees.contains(&key);
        if deferred {
            self.deferred_depth += 1;
        }
        let parent = mem::replace(&mut self.current, scope);
        f(self);
        self.current = parent;
        if deferred {
            self.deferred_depth -= 1;
        }
    }

    fn deferred(&mut self, f: impl FnOnce(&mut Self)) {
        self.deferred_depth += 1;
        f(self);
        self.deferred_depth -= 1;
    }

    /// Free names and names bound at the statement's top level are what
    /// other statements can provide or observe
    fn is_visible_outside(&self, name: &str) -> bool {
        self.tree
            .find_defining_scope(self.current, name)
            .is_none_or(|scope| scope == ScopeId::ROOT)
    }

    fn write_expr(&mut self, expr: &Expr, is_assignment: bool) {
        match unwrap_parens(expr) {
            Expr::Ident(ident) => self.write_ident(ident, 0, is_assignment),
            Expr::Member(member) => self.write_member(member, is_assignment),
            _ => {}
        }
    }

    fn write_member(&mut self, member: &MemberExpr, is_assignment: bool) {
        let mut node = unwrap_parens(&member.obj);
        let mut member_depth = 1;
        while let Expr::Member(inner) = node {
            node = unwrap_parens(&inner.obj);
            member_depth += 1;
        }
        if let Expr::Ident(ident) = node {
            self.write_ident(ident, member_depth, is_assignment);
        }
    }

    fn write_ident(&mut self, ident: &Ident, member_depth: usize, is_assignment: bool) {
        if !self.is_visible_outside(&ident.sym) {
            return;
        }
        let (start, _) = span_range(ident.span);
        self.references.writes.push(WriteRecord {
            name: ident.sym.to_string(),
            member_depth,
            is_assignment,
            start,
            nested: self.current != ScopeId::ROOT,
        });
    }

    fn write_pattern(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(binding) => self.write_ident(&binding.id, 0, true),
            Pat::Array(array) => self.write_array_pattern(array),
            Pat::Object(object) => self.write_object_pattern(object),
            Pat::Rest(rest) => self.write_pattern(&rest.arg),
            Pat::Assign(assign) => self.write_pattern(&assign.left),
            Pat::Expr(expr) => self.write_expr(expr, true),
            Pat::Invalid(_) => {}
        }
    }

    fn write_array_pattern(&mut self, array: &ArrayPat) {
        for element in array.elems.iter().flatten() {
            self.write_pattern(element);
        }
    }

    fn write_object_pattern(&mut self, object: &ObjectPat) {
        for prop in &object.props {
            match prop {
                ObjectPatProp::KeyValue(key_value) => self.write_pattern(&key_value.value),
                ObjectPatProp::Assign(assign) => self.write_ident(&assign.key.id, 0, true),
                ObjectPatProp::Rest(rest) => self.write_pattern(&rest.arg),
            }
        }
    }
}

impl Visit for ReferenceCollector<'_> {
    fn visit_ident(&mut self, ident: &Ident) {
        let name = &*ident.sym;
        if !self.is_visible_outside(name) {
            return;
        }
        if self.deferred_depth == 0 {
            self.references
                .strongly_depends_on
                .insert(name.to_owned());
        }
        self.references.depends_on.insert(name.to_owned());
    }

    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_export_named_specifier(&mut self, node: &ExportNamedSpecifier) {
        if let ModuleExportName::Ident(ident) = &node.orig {
            self.visit_ident(ident);
        }
    }

    fn visit_private_name(&mut self, _: &PrivateName) {}

    fn visit_labeled_stmt(&mut self, node: &LabeledStmt) {
        node.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, _: &BreakStmt) {}

    fn visit_continue_stmt(&mut self, _: &ContinueStmt) {}

    fn visit_function(&mut self, node: &Function) {
        node.decorators.visit_with(self);
        self.scoped(ScopeKey::new(ScopeNode::Function, node.span), |this| {
            node.params.visit_with(this);
            if let Some(body) = &node.body {
                body.stmts.visit_with(this);
            }
        });
    }

    // The name of a function expression is bound inside it and never read
    // from outside
    fn visit_fn_expr(&mut self, node: &FnExpr) {
        node.function.visit_with(self);
    }

    fn visit_class_expr(&mut self, node: &ClassExpr) {
        if node.ident.is_none() {
            node.class.visit_with(self);
            return;
        }
        self.scoped(ScopeKey::new(ScopeNode::Class, node.class.span), |this| {
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

    // Instance field initialisers run at construction time
    fn visit_class_prop(&mut self, node: &ClassProp) {
        node.key.visit_with(self);
        if let Some(value) = &node.value {
            if node.is_static {
                value.visit_with(self);
            } else {
                self.deferred(|this| value.visit_with(this));
            }
        }
    }

    fn visit_private_prop(&mut self, node: &PrivateProp) {
        if let Some(value) = &node.value {
            if node.is_static {
                value.visit_with(self);
            } else {
                self.deferred(|this| value.visit_with(this));
            }
        }
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

    fn visit_assign_expr(&mut self, node: &AssignExpr) {
        match &node.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                self.write_ident(&binding.id, 0, true);
            }
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                self.write_member(member, true);
            }
            AssignTarget::Simple(SimpleAssignTarget::Paren(paren)) => {
                self.write_expr(&paren.expr, true);
            }
            AssignTarget::Simple(_) => {}
            AssignTarget::Pat(AssignTargetPat::Array(array)) => self.write_array_pattern(array),
            AssignTarget::Pat(AssignTargetPat::Object(object)) => {
                self.write_object_pattern(object);
            }
            AssignTarget::Pat(AssignTargetPat::Invalid(_)) => {}
        }
        node.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, node: &UpdateExpr) {
        self.write_expr(&node.arg, true);
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &CallExpr) {
        if let Callee::Expr(callee) = &node.callee {
            match unwrap_parens(callee) {
                Expr::Fn(fn_expr) => {
                    self.iife_callees
                        .insert(ScopeKey::new(ScopeNode::Function, fn_expr.function.span));
                }
                Expr::Arrow(arrow) => {
                    self.iife_callees
                        .insert(ScopeKey::new(ScopeNode::Arrow, arrow.span));
                }
                // `foo.bar()` is assumed to mutate `foo`
                Expr::Member(member) => self.write_member(member, false),
                _ => {}
            }
        }
        for arg in &node.args {
            if arg.spread.is_none() {
                self.write_expr(&arg.expr, false);
            }
        }
        node.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::visit::VisitWith;

    use super::*;
    use crate::{parser::parse_module, visitors::ScopeBuilder};

    fn collect(source: &str) -> References {
        let parsed = parse_module("t.js", source).expect("parse");
        let item = &parsed.ast.body[0];
        let mut tree = ScopeTree::new();
        let mut table = ScopeTable::default();
        item.visit_with(&mut ScopeBuilder::new(&mut tree, &mut table));
        let mut collector = ReferenceCollector::new(&tree, &table);
        item.visit_with(&mut collector);
        collector.into_references()
    }

    fn names(set: &FxIndexSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_reads_skip_members_keys_and_locals() {
        let refs = collect("var x = { key: value, [computed]: 1 }.prop + other.field;");
        assert_eq!(names(&refs.depends_on), vec!["x", "value", "computed", "other"]);
    }

    #[test]
    fn test_function_body_reads_are_weak() {
        let refs = collect("function run(a) { return helper(a, outer); }");
        assert_eq!(names(&refs.depends_on), vec!["run", "helper", "outer"]);
        assert_eq!(names(&refs.strongly_depends_on), vec!["run"]);
    }

    #[test]
    fn test_iife_body_reads_are_strong() {
        let refs = collect("(function () { setup(config); })();");
        assert!(refs.strongly_depends_on.contains("setup"));
        assert!(refs.strongly_depends_on.contains("config"));

        let refs = collect("(() => boot())();");
        assert!(refs.strongly_depends_on.contains("boot"));
    }

    #[test]
    fn test_labels_and_expression_names_are_not_reads() {
        let refs = collect("outer: for (;;) { var f = function named() { named(); }; break outer; }");
        assert_eq!(names(&refs.depends_on), vec!["f"]);
    }

    #[test]
    fn test_writes() {
        let refs = collect("function bump() { count++; ns.a.b = 1; local = 2; var local; }");
        let writes: Vec<(&str, usize, bool)> = refs
            .writes
            .iter()
            .map(|w| (w.name.as_str(), w.member_depth, w.nested))
            .collect();
        assert_eq!(writes, vec![("count", 0, true), ("ns", 2, true)]);

        let refs = collect("[first, { second }] = pair; mutate(target); obj.method();");
        let written: Vec<&str> = refs.writes.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(written, vec!["first", "second"]);
    }

    #[test]
    fn test_call_arguments_and_receivers_are_writes() {
        let refs = collect("mutate(target, 1); obj.method();");
        let writes: Vec<(&str, bool)> = refs
            .writes
            .iter()
            .map(|w| (w.name.as_str(), w.is_assignment))
            .collect();
        assert_eq!(writes, vec![("target", false)]);

        let refs = collect("obj.method(arg);");
        let written: Vec<&str> = refs.writes.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(written, vec!["obj", "arg"]);
    }
}

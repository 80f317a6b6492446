//! First pass over a statement: build scopes and register declarations

use std::mem;

use swc_core::{
    common::Span,
    ecma::{
        ast::{
            ArrowExpr, BlockStmt, BlockStmtOrExpr, CatchClause, ClassDecl, ClassExpr, Constructor,
            DefaultDecl, ExportDefaultDecl, FnDecl, FnExpr, ForInStmt, ForOfStmt, ForStmt,
            Function, GetterProp, Ident, ImportDecl, ParamOrTsParamProp, Pat, SetterProp, VarDecl,
            VarDeclKind,
        },
        visit::{Visit, VisitWith},
    },
};

use super::{ScopeKey, ScopeNode, ScopeTable, utils::pattern_bindings};
use crate::{
    parser::span_range,
    scope::{Declaration, DeclarationKind, ScopeId, ScopeTree},
};

/// Builds the scope tree of one statement
///
/// Functions (including arrows, methods, getters, setters and constructors)
/// open a function scope whose own body block is not given a separate scope.
/// Other blocks, catch clauses, `for` heads and named class expressions open
/// block scopes.
pub struct ScopeBuilder<'a> {
    tree: &'a mut ScopeTree,
    table: &'a mut ScopeTable,
    current: ScopeId,
}

impl<'a> ScopeBuilder<'a> {
    pub fn new(tree: &'a mut ScopeTree, table: &'a mut ScopeTable) -> Self {
        Self {
            tree,
            table,
            current: ScopeId::ROOT,
        }
    }

    fn open(&mut self, node: ScopeNode, span: Span, is_block_scope: bool) -> ScopeId {
        let scope = self.tree.push_scope(self.current, is_block_scope);
        self.table.insert(ScopeKey::new(node, span), scope);
        scope
    }

    fn within(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self)) {
        let parent = mem::replace(&mut self.current, scope);
        f(self);
        self.current = parent;
    }

    fn declare(&mut self, scope: ScopeId, ident: &Ident, kind: DeclarationKind) {
        let (start, end) = span_range(ident.span);
        self.tree
            .add_declaration(scope, &ident.sym, Declaration { kind, start, end });
    }

    fn declare_pattern(&mut self, scope: ScopeId, pat: &Pat, kind: DeclarationKind) {
        let mut bindings = Vec::new();
        pattern_bindings(pat, &mut bindings);
        for ident in bindings {
            self.declare(scope, ident, kind);
        }
    }

    fn function_scope(&mut self, function: &Function, name: Option<&Ident>) {
        let scope = self.open(ScopeNode::Function, function.span, false);
        if let Some(name) = name {
            self.declare(scope, name, DeclarationKind::ExpressionName);
        }
        for param in &function.params {
            self.declare_pattern(scope, &param.pat, DeclarationKind::Param);
        }
        self.within(scope, |this| {
            for param in &function.params {
                param.visit_with(this);
            }
            if let Some(body) = &function.body {
                for stmt in &body.stmts {
                    stmt.visit_with(this);
                }
            }
        });
    }

    fn body_scope(&mut self, node: ScopeNode, span: Span, body: Option<&BlockStmt>) -> ScopeId {
        let scope = self.open(node, span, false);
        if let Some(body) = body {
            self.within(scope, |this| {
                for stmt in &body.stmts {
                    stmt.visit_with(this);
                }
            });
        }
        scope
    }
}

impl Visit for ScopeBuilder<'_> {
    // Import bindings live in the module's import table
    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.declare(self.current, &node.ident, DeclarationKind::Function);
        self.function_scope(&node.function, None);
    }

    fn visit_fn_expr(&mut self, node: &FnExpr) {
        self.function_scope(&node.function, node.ident.as_ref());
    }

    fn visit_function(&mut self, node: &Function) {
        self.function_scope(node, None);
    }

    fn visit_export_default_decl(&mut self, node: &ExportDefaultDecl) {
        match &node.decl {
            DefaultDecl::Fn(fn_expr) => {
                if let Some(ident) = &fn_expr.ident {
                    self.declare(self.current, ident, DeclarationKind::Function);
                }
                self.function_scope(&fn_expr.function, None);
            }
            DefaultDecl::Class(class_expr) => {
                if let Some(ident) = &class_expr.ident {
                    self.declare(self.current, ident, DeclarationKind::Class);
                }
                class_expr.class.visit_with(self);
            }
            DefaultDecl::TsInterfaceDecl(_) => {}
        }
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        let scope = self.open(ScopeNode::Arrow, node.span, false);
        for param in &node.params {
            self.declare_pattern(scope, param, DeclarationKind::Param);
        }
        self.within(scope, |this| {
            for param in &node.params {
                param.visit_with(this);
            }
            match &*node.body {
                BlockStmtOrExpr::BlockStmt(body) => {
                    for stmt in &body.stmts {
                        stmt.visit_with(this);
                    }
                }
                BlockStmtOrExpr::Expr(expr) => expr.visit_with(this),
            }
        });
    }

    fn visit_getter_prop(&mut self, node: &GetterProp) {
        node.key.visit_with(self);
        self.body_scope(ScopeNode::Getter, node.span, node.body.as_ref());
    }

    fn visit_setter_prop(&mut self, node: &SetterProp) {
        node.key.visit_with(self);
        let scope = self.body_scope(ScopeNode::Setter, node.span, None);
        self.declare_pattern(scope, &node.param, DeclarationKind::Param);
        self.within(scope, |this| {
            node.param.visit_with(this);
            if let Some(body) = &node.body {
                for stmt in &body.stmts {
                    stmt.visit_with(this);
                }
            }
        });
    }

    fn visit_constructor(&mut self, node: &Constructor) {
        node.key.visit_with(self);
        let scope = self.body_scope(ScopeNode::Constructor, node.span, None);
        for param in &node.params {
            if let ParamOrTsParamProp::Param(param) = param {
                self.declare_pattern(scope, &param.pat, DeclarationKind::Param);
            }
        }
        self.within(scope, |this| {
            node.params.visit_with(this);
            if let Some(body) = &node.body {
                for stmt in &body.stmts {
                    stmt.visit_with(this);
                }
            }
        });
    }

    fn visit_block_stmt(&mut self, node: &BlockStmt) {
        let scope = self.open(ScopeNode::Block, node.span, true);
        self.within(scope, |this| node.visit_children_with(this));
    }

    fn visit_catch_clause(&mut self, node: &CatchClause) {
        let scope = self.open(ScopeNode::Catch, node.span, true);
        if let Some(param) = &node.param {
            self.declare_pattern(scope, param, DeclarationKind::CatchParam);
        }
        self.within(scope, |this| node.visit_children_with(this));
    }

    fn visit_for_stmt(&mut self, node: &ForStmt) {
        let scope = self.open(ScopeNode::For, node.span, true);
        self.within(scope, |this| node.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, node: &ForInStmt) {
        let scope = self.open(ScopeNode::For, node.span, true);
        self.within(scope, |this| node.visit_children_with(this));
    }

    fn visit_for_of_stmt(&mut self, node: &ForOfStmt) {
        let scope = self.open(ScopeNode::For, node.span, true);
        self.within(scope, |this| node.visit_children_with(this));
    }

    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.declare(self.current, &node.ident, DeclarationKind::Class);
        node.class.visit_with(self);
    }

    fn visit_class_expr(&mut self, node: &ClassExpr) {
        let Some(ident) = &node.ident else {
            node.class.visit_with(self);
            return;
        };
        let scope = self.open(ScopeNode::Class, node.class.span, true);
        self.declare(scope, ident, DeclarationKind::ExpressionName);
        self.within(scope, |this| node.class.visit_with(this));
    }

    fn visit_var_decl(&mut self, node: &VarDecl) {
        let kind = match node.kind {
            VarDeclKind::Var => DeclarationKind::Var,
            VarDeclKind::Let => DeclarationKind::Let,
            VarDeclKind::Const => DeclarationKind::Const,
        };
        for declarator in &node.decls {
            self.declare_pattern(self.current, &declarator.name, kind);
        }
        node.visit_children_with(self);
    }
}

//! Shared helpers for the statement visitors

use swc_core::ecma::ast::{Expr, Ident, ObjectPatProp, Pat};

/// Collect every identifier a binding pattern introduces, in source order
pub fn pattern_bindings<'a>(pat: &'a Pat, out: &mut Vec<&'a Ident>) {
    match pat {
        Pat::Ident(binding) => out.push(&binding.id),
        Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pattern_bindings(element, out);
            }
        }
        Pat::Rest(rest) => pattern_bindings(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(key_value) => pattern_bindings(&key_value.value, out),
                    ObjectPatProp::Assign(assign) => out.push(&assign.key.id),
                    ObjectPatProp::Rest(rest) => pattern_bindings(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => pattern_bindings(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

/// Strip any number of wrapping parentheses
pub fn unwrap_parens(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(paren) = expr {
        expr = &paren.expr;
    }
    expr
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::ast::{Decl, ModuleItem, Stmt};

    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn test_pattern_bindings_destructuring() {
        let parsed =
            parse_module("t.js", "var { a, b: [c, ...d], e = 1, ...f } = obj;").expect("parse");
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &parsed.ast.body[0] else {
            panic!("expected var declaration");
        };
        let mut names = Vec::new();
        pattern_bindings(&var.decls[0].name, &mut names);
        let names: Vec<&str> = names.iter().map(|ident| &*ident.sym).collect();
        assert_eq!(names, vec!["a", "c", "d", "e", "f"]);
    }
}

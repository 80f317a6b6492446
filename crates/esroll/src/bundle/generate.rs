//! Code generation: from included statements to a finalised bundle

use log::{debug, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use sourcemap::SourceMap;
use swc_core::{
    common::Spanned,
    ecma::ast::{DefaultDecl, Expr, Function, ModuleDecl, Pat},
};

use super::Bundle;
use crate::{
    error::{BundleError, Result},
    finalisers::{
        ExportBinding, ExternalBinding, FinaliseContext, export_mode, finaliser, guess_indent,
    },
    output::Output,
    parser::span_range,
    source_map::build_source_map,
    source_patch::SourcePatch,
    statement::Statement,
    types::{FxIndexMap, StatementRef},
};

/// Options of [`Bundle::generate`]
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// `es` (alias `es6`), `cjs` or `iife`
    pub format: String,
    /// `auto`, `default`, `named` or `none`; unset means `auto`
    pub exports: Option<String>,
    /// Global variable an `iife` bundle is assigned to
    pub module_name: Option<String>,
    /// External id -> global name, for `iife`
    pub globals: FxIndexMap<String, String>,
    /// Indentation of generated code; guessed from the bundle when unset
    pub indent: Option<String>,
    pub source_map: bool,
    /// `file` property of the source map
    pub source_map_file: Option<String>,
    pub use_strict: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format: "es".to_owned(),
            exports: None,
            module_name: None,
            globals: FxIndexMap::default(),
            indent: None,
            source_map: false,
            source_map_file: None,
            use_strict: true,
        }
    }
}

#[derive(Debug)]
pub struct BundleOutput {
    pub code: String,
    pub map: Option<SourceMap>,
}

impl BundleOutput {
    /// The source map serialised as JSON, if one was generated
    pub fn map_json(&self) -> Result<Option<String>> {
        let Some(map) = &self.map else {
            return Ok(None);
        };
        let mut json = Vec::new();
        map.to_writer(&mut json)
            .map_err(|err| BundleError::SourceMap(err.into()))?;
        String::from_utf8(json)
            .map(Some)
            .map_err(|err| BundleError::SourceMap(err.into()))
    }
}

/// Per-statement naming decided before the statement is rendered
struct Rendering {
    replacements: FxHashMap<String, String>,
    bundle_exports: FxHashMap<String, String>,
    default_name: Option<String>,
}

impl Bundle {
    /// Render the built bundle in `options.format`
    pub fn generate(&mut self, options: &GenerateOptions) -> Result<BundleOutput> {
        let finaliser = finaliser(&options.format)?;
        let Some(entry) = self.entry else {
            warn!("Generating a bundle that was never built");
            return Ok(BundleOutput {
                code: String::new(),
                map: None,
            });
        };
        debug!(
            "Generating {} bundle from {} statements",
            finaliser.name(),
            self.statements.len()
        );

        let entry_exports: Vec<(String, String)> = self.modules[entry.index()]
            .exports
            .iter()
            .map(|(key, export)| (key.clone(), export.local_name.clone()))
            .collect();

        // Variable exports of non-es bundles are written through the exports
        // object everywhere, so later assignments stay visible to importers
        let mut all_bundle_exports: FxHashMap<String, String> = FxHashMap::default();
        let mut var_exports: FxHashSet<String> = FxHashSet::default();
        if !finaliser.keeps_live_bindings() {
            for (key, local_name) in &entry_exports {
                let is_variable = self
                    .find_declaration(entry, local_name)
                    .is_some_and(|declaration| declaration.kind.is_variable());
                if is_variable {
                    let canonical = self.canonical_name(entry, local_name);
                    trace!("{canonical} is exported live as exports.{key}");
                    all_bundle_exports.insert(canonical, format!("exports.{key}"));
                    var_exports.insert(key.clone());
                }
            }
        }

        let mut exports = Vec::with_capacity(entry_exports.len());
        for (key, local_name) in &entry_exports {
            exports.push(ExportBinding {
                exported: key.clone(),
                canonical: self.canonical_name(entry, local_name),
            });
        }
        let to_export = exports
            .iter()
            .filter(|export| !var_exports.contains(&export.exported))
            .cloned()
            .collect();
        let keys: Vec<String> = entry_exports.into_iter().map(|(key, _)| key).collect();
        let export_mode = export_mode(&keys, options.exports.as_deref())?;

        let mut body = Output::new();
        let mut sources = 0usize;
        let mut previous_margin = 0;
        let mut previous: Option<StatementRef> = None;

        for statement_ref in self.statements.clone() {
            let Some(rendering) = self.prepare_statement(statement_ref, &all_bundle_exports) else {
                continue;
            };

            let module = &self.modules[statement_ref.module.index()];
            let statement = &module.statements[statement_ref.index];
            let mut patch = statement.replace_identifiers(
                &module.source,
                &rendering.replacements,
                &rendering.bundle_exports,
            );
            strip_export(
                statement,
                &module.source,
                rendering.default_name.as_deref(),
                &mut patch,
            );

            // At least one blank line between modules and around dropped statements
            let is_adjacent = previous.is_some_and(|previous| {
                previous.module == statement_ref.module
                    && previous.index + 1 == statement_ref.index
            });
            let min_separation = if is_adjacent { 2 } else { 3 };
            let margin = min_separation.max(statement.margin[0]).max(previous_margin);
            let mut new_lines = "\n".repeat(margin.saturating_sub(1));

            if !statement.leading_comments.is_empty() {
                let mut comment_block = new_lines;
                for leading in &statement.leading_comments {
                    comment_block.push_str(&leading.separator);
                    comment_block.push_str(&leading.comment.render());
                }
                body.append(&comment_block);
                sources += 1;
                new_lines = "\n".repeat(statement.margin[0].saturating_sub(1));
            }

            if sources > 0 {
                body.append(&new_lines);
            }
            body.append_patch(statement_ref.module, &patch);
            sources += 1;

            if let Some(comment) = &statement.trailing_comment {
                body.append(&format!(" {}", comment.render()));
            }

            previous_margin = statement.margin[1];
            previous = Some(statement_ref);
        }

        let indent = options
            .indent
            .clone()
            .unwrap_or_else(|| guess_indent(&body.to_string()));

        let namespace_block = self.namespace_block(&indent);
        body.prepend(&namespace_block);
        body.trim();

        let externals = self
            .external_modules
            .iter()
            .map(|external| ExternalBinding {
                id: external.id.clone(),
                name: external.binding().to_owned(),
                needs_default: external.needs_default,
                needs_named: external.needs_named,
            })
            .collect();
        let context = FinaliseContext {
            export_mode,
            indent,
            exports,
            to_export,
            externals,
        };
        debug!("Export mode is {}", context.export_mode);

        let output = finaliser.finalise(body, &context, options)?;
        let map = options.source_map.then(|| {
            build_source_map(&output, &self.modules, options.source_map_file.as_deref())
        });

        Ok(BundleOutput {
            code: output.to_string(),
            map,
        })
    }

    /// Decide how a statement is named, or `None` when it emits nothing
    fn prepare_statement(
        &mut self,
        statement_ref: StatementRef,
        all_bundle_exports: &FxHashMap<String, String>,
    ) -> Option<Rendering> {
        let StatementRef { module, index } = statement_ref;
        let statement = &self.modules[module.index()].statements[index];

        if statement.is_export_list() {
            return None;
        }

        // `var foo;` for a live export would leave a useless `exports.foo;`
        if let Some(name) = uninitialised_var(statement) {
            let canonical = self.canonical_name(module, &name);
            if all_bundle_exports.contains_key(&canonical) {
                trace!("Skipping empty declaration of exported {canonical}");
                return None;
            }
        }

        let statement = &self.modules[module.index()].statements[index];
        let is_export_default = statement.is_export_default();
        let proxied = match statement.module_decl() {
            Some(ModuleDecl::ExportDefaultExpr(export)) => match &*export.expr {
                Expr::Ident(ident) => Some(ident.sym.to_string()),
                _ => None,
            },
            _ => None,
        };
        let names: Vec<String> = statement
            .depends_on
            .iter()
            .chain(statement.defines.iter())
            .cloned()
            .collect();

        let default_name = if is_export_default {
            let default_name = self.canonical_name(module, "default");
            if let Some(proxied) = proxied
                && self.canonical_name(module, &proxied) == default_name
            {
                return None;
            }
            Some(default_name)
        } else {
            None
        };

        let mut replacements = FxHashMap::default();
        let mut bundle_exports = FxHashMap::default();
        for name in names {
            let canonical = self.canonical_name(module, &name);
            if let Some(target) = all_bundle_exports.get(&canonical) {
                replacements.insert(name.clone(), target.clone());
                bundle_exports.insert(name, target.clone());
            } else if name != canonical {
                replacements.insert(name, canonical);
            }
        }

        Some(Rendering {
            replacements,
            bundle_exports,
            default_name,
        })
    }

    /// `var ns = { get x () { return x; } };` for every module imported as a
    /// namespace
    fn namespace_block(&mut self, indent: &str) -> String {
        let mut block = String::new();
        for module in self.internal_namespace_modules.clone() {
            let name = self.canonical_name(module, "*");
            let exports: Vec<(String, String)> = self.modules[module.index()]
                .exports
                .iter()
                .map(|(key, export)| (key.clone(), export.local_name.clone()))
                .collect();
            let getters: Vec<String> = exports
                .into_iter()
                .map(|(key, local_name)| {
                    let canonical = self.canonical_name(module, &local_name);
                    format!("{indent}get {key} () {{ return {canonical}; }}")
                })
                .collect();
            block.push_str(&format!("var {name} = {{\n{}\n}};\n\n", getters.join(",\n")));
        }
        block
    }
}

/// Name declared by a top-level `var x;` without initialiser
fn uninitialised_var(statement: &Statement) -> Option<String> {
    let declarator = statement.top_level_var()?.decls.first()?;
    if declarator.init.is_some() {
        return None;
    }
    match &declarator.name {
        Pat::Ident(binding) => Some(binding.id.sym.to_string()),
        _ => None,
    }
}

/// Turn export syntax into a plain declaration
fn strip_export(
    statement: &Statement,
    source: &str,
    default_name: Option<&str>,
    patch: &mut SourcePatch<'_>,
) {
    let Some(decl) = statement.module_decl() else {
        return;
    };
    let (export_start, _) = span_range(decl.span());

    match decl {
        ModuleDecl::ExportDecl(export) => {
            let (decl_start, _) = span_range(export.decl.span());
            patch.remove(export_start, decl_start);
        }
        ModuleDecl::ExportDefaultDecl(export) => {
            let (decl_start, _) = span_range(export.decl.span());
            let name = default_name.unwrap_or("default");
            match &export.decl {
                DefaultDecl::Fn(fn_expr) if fn_expr.ident.is_none() => {
                    let head_end = function_head_end(source, decl_start, &fn_expr.function);
                    let async_ = if fn_expr.function.is_async { "async " } else { "" };
                    let star = if fn_expr.function.is_generator { "*" } else { "" };
                    patch.overwrite(
                        export_start,
                        head_end,
                        format!("{async_}function{star} {name}"),
                    );
                }
                DefaultDecl::Class(class_expr) if class_expr.ident.is_none() => {
                    patch.overwrite(export_start, decl_start, format!("var {name} = "));
                }
                _ => patch.remove(export_start, decl_start),
            }
        }
        ModuleDecl::ExportDefaultExpr(export) => {
            let (expr_start, _) = span_range(export.expr.span());
            let name = default_name.unwrap_or("default");
            patch.overwrite(export_start, expr_start, format!("var {name} = "));
        }
        _ => {}
    }
}

/// Offset just past `function` (and the generator `*`) of an anonymous
/// function starting at `start`
fn function_head_end(source: &str, start: usize, function: &Function) -> usize {
    let (_, end) = span_range(function.span);
    let text = source.get(start..end).unwrap_or_default();
    let Some(keyword) = text.find("function") else {
        return start;
    };
    let mut head_end = start + keyword + "function".len();
    if function.is_generator
        && let Some(star) = source[head_end..end].find('*')
    {
        head_end += star + 1;
    }
    head_end
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{bundle::BundleOptions, loader::MemoryModules};

    fn generate(modules: MemoryModules, options: &GenerateOptions) -> String {
        let mut bundle = Bundle::new(
            BundleOptions {
                entry: "/main.js".into(),
                external: Vec::new(),
            },
            Box::new(modules.clone()),
            Box::new(modules),
        );
        bundle.build().expect("build");
        bundle.generate(options).expect("generate").code
    }

    #[test]
    fn test_anonymous_default_function_becomes_declaration() {
        let modules = MemoryModules::new()
            .with("/main.js", "import go from './go';\ngo();")
            .with("/go.js", "export default async function () {\n\treturn 1;\n}");
        let code = generate(modules, &GenerateOptions::default());
        assert_eq!(code, "async function go () {\n\treturn 1;\n}\n\ngo();");
    }

    #[test]
    fn test_default_expression_becomes_var() {
        let modules = MemoryModules::new()
            .with("/main.js", "import answer from './answer';\nconsole.log(answer);")
            .with("/answer.js", "export default 6 * 7;");
        let code = generate(modules, &GenerateOptions::default());
        assert_eq!(code, "var answer = 6 * 7;\n\nconsole.log(answer);");
    }

    #[test]
    fn test_proxy_default_is_skipped() {
        let modules = MemoryModules::new()
            .with("/main.js", "import value from './value';\nconsole.log(value);")
            .with("/value.js", "var value = 1;\nexport default value;");
        let code = generate(modules, &GenerateOptions::default());
        assert_eq!(code, "var value = 1;\n\nconsole.log(value);");
    }

    #[test]
    fn test_comments_and_margins_survive() {
        let modules = MemoryModules::new().with(
            "/main.js",
            "// setup\nvar a = 1; // one\n\n\n/* use */\nconsole.log(a);",
        );
        let code = generate(modules, &GenerateOptions::default());
        assert_eq!(code, "// setup\nvar a = 1; // one\n\n/* use */\nconsole.log(a);");
    }

    #[test]
    fn test_namespace_objects_are_prepended() {
        let modules = MemoryModules::new()
            .with("/main.js", "import * as utils from './utils';\nconsole.log(utils.a);")
            .with("/utils.js", "export var a = 1;\nexport function b() {}");
        let options = GenerateOptions {
            indent: Some("  ".into()),
            ..GenerateOptions::default()
        };
        let code = generate(modules, &options);
        assert_eq!(
            code,
            "var utils = {\n  get a () { return a; },\n  get b () { return b; }\n};\n\n\
             var a = 1;\nfunction b() {}\n\nconsole.log(utils.a);"
        );
    }

    #[test]
    fn test_empty_live_export_declaration_is_skipped() {
        let modules = MemoryModules::new().with(
            "/main.js",
            "export var later;\nlater = 2;\nexport function get() { return later; }",
        );
        let options = GenerateOptions {
            format: "cjs".into(),
            ..GenerateOptions::default()
        };
        let code = generate(modules, &options);
        assert_eq!(
            code,
            "'use strict';\n\nexports.later = 2;\nfunction get() { return exports.later; }\n\n\
             exports.get = get;"
        );
    }

    #[test]
    fn test_source_map_json() {
        let modules = MemoryModules::new().with("/main.js", "console.log(1);");
        let mut bundle = Bundle::new(
            BundleOptions {
                entry: "/main.js".into(),
                external: Vec::new(),
            },
            Box::new(modules.clone()),
            Box::new(modules),
        );
        bundle.build().expect("build");
        let output = bundle
            .generate(&GenerateOptions {
                source_map: true,
                source_map_file: Some("bundle.js".into()),
                ..GenerateOptions::default()
            })
            .expect("generate");
        let json = output.map_json().expect("serialise").expect("map");
        assert!(json.contains("\"sources\":[\"/main.js\"]"));
        assert!(json.contains("\"file\":\"bundle.js\""));
    }
}

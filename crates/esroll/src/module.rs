//! A parsed internal module: statements, import/export tables and naming state
//!
//! Everything here is local to one module. Operations that follow bindings
//! into other modules (canonical names, marking, defining statements) live on
//! [`Bundle`](crate::bundle::Bundle), which owns every module of a build.

use std::path::Path;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use swc_core::{
    common::Spanned,
    ecma::ast::{
        Decl, DefaultDecl, Expr, ExportSpecifier, ImportSpecifier, ModuleDecl, ModuleExportName,
        ModuleItem, Stmt,
    },
};

use crate::{
    error::{BundleError, Location, Result},
    identifier::{deconflict, make_legal_identifier},
    parser::{CommentRecord, parse_module, span_range},
    statement::{LeadingComment, Statement},
    types::{FxIndexMap, FxIndexSet, ModuleId, ModuleRef},
    visitors::pattern_bindings,
};

/// One local binding introduced by an import
#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    /// Specifier as written
    pub source: String,
    /// Name in the exporting module: `default`, `*` or the imported name
    pub name: String,
    pub local_name: String,
    /// Filled in once the source has been fetched
    pub module: Option<ModuleRef>,
    /// Index of the declaring statement
    pub statement: usize,
}

/// Extra facts about `export default`
#[derive(Debug, Clone, Default)]
pub struct DefaultExport {
    /// `foo` in `export default function foo() {}`
    pub declared_name: Option<String>,
    /// `foo` in `export default foo`
    pub identifier: Option<String>,
    pub is_declaration: bool,
    /// `export default function () {}` or `export default class {}`
    pub is_anonymous: bool,
    /// The exported identifier is reassigned later, so the export has to
    /// capture its value instead of the live binding
    pub is_modified: bool,
}

#[derive(Debug, Clone)]
pub struct ExportDeclaration {
    pub local_name: String,
    /// Declaring statement; `None` for export lists
    pub statement: Option<usize>,
    pub is_used: bool,
    pub default: Option<DefaultExport>,
}

#[derive(Debug)]
pub struct Module {
    pub id: String,
    pub module_id: ModuleId,
    pub source: String,
    pub statements: Vec<Statement>,

    pub imports: FxIndexMap<String, ImportDeclaration>,
    pub exports: FxIndexMap<String, ExportDeclaration>,
    /// Top-level name -> defining statement
    pub definitions: FxIndexMap<String, usize>,
    /// Name -> statements writing to it
    pub modifications: FxIndexMap<String, Vec<usize>>,

    /// Canonical-name memo for the current naming round
    pub canonical_names: FxHashMap<String, String>,
    /// Renames assigned by deconfliction
    pub renames: FxHashMap<String, String>,
    /// Deconflicted name of the module's namespace object
    pub namespace_rename: Option<String>,
    /// Naming hints for `default` and `*`, first one wins
    pub suggested_names: FxHashMap<String, String>,
    /// Names already passed to mark
    pub requested_names: FxHashSet<String>,
    /// Targets of bare `import 'x'` statements, by statement index
    pub side_effect_imports: FxIndexMap<usize, ModuleRef>,
}

impl Module {
    /// Parse and analyse `source`
    ///
    /// Also returns the names the module reads without defining or
    /// importing them.
    pub fn new(id: String, source: String, module_id: ModuleId) -> Result<(Self, Vec<String>)> {
        let parsed = parse_module(&id, &source)?;

        let mut statements = Vec::with_capacity(parsed.ast.body.len());
        for item in parsed.ast.body {
            match &item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) if var.decls.len() > 1 => {
                    let split = Statement::split_declarations(var, statements.len());
                    statements.extend(split);
                }
                _ => {
                    let index = statements.len();
                    statements.push(Statement::new(item, index));
                }
            }
        }

        let mut module = Self {
            id,
            module_id,
            source,
            statements,
            imports: FxIndexMap::default(),
            exports: FxIndexMap::default(),
            definitions: FxIndexMap::default(),
            modifications: FxIndexMap::default(),
            canonical_names: FxHashMap::default(),
            renames: FxHashMap::default(),
            namespace_rename: None,
            suggested_names: FxHashMap::default(),
            requested_names: FxHashSet::default(),
            side_effect_imports: FxIndexMap::default(),
        };
        let assumed_globals = module.analyse(&parsed.comments)?;

        debug!(
            "Analysed {}: {} statements, {} imports, {} exports",
            module.id,
            module.statements.len(),
            module.imports.len(),
            module.exports.len()
        );
        Ok((module, assumed_globals))
    }

    fn location(&self, offset: usize) -> Location {
        Location::from_offset(&self.source, offset)
    }

    fn unsupported(&self, offset: usize, what: &str) -> BundleError {
        BundleError::UnsupportedSyntax {
            id: self.id.clone(),
            location: self.location(offset),
            what: what.to_owned(),
        }
    }

    fn analyse(&mut self, comments: &[CommentRecord]) -> Result<Vec<String>> {
        for index in 0..self.statements.len() {
            let Some(decl) = self.statements[index].module_decl() else {
                continue;
            };
            let decl = decl.clone();
            match decl {
                ModuleDecl::Import(_) => self.add_import(index, &decl)?,
                _ => self.add_export(index, &decl)?,
            }
        }

        self.attach_comments(comments);

        for index in 0..self.statements.len() {
            self.statements[index].analyse();
            self.check_writes(index)?;
        }

        for (index, statement) in self.statements.iter().enumerate() {
            for name in &statement.defines {
                self.definitions.insert(name.clone(), index);
            }
            for name in &statement.modifies {
                self.modifications
                    .entry(name.clone())
                    .or_default()
                    .push(index);
            }
        }

        let mut assumed_globals = FxIndexSet::default();
        for statement in &self.statements {
            for name in &statement.depends_on {
                if !self.definitions.contains_key(name) && !self.imports.contains_key(name) {
                    assumed_globals.insert(name.clone());
                }
            }
        }
        Ok(assumed_globals.into_iter().collect())
    }

    fn add_import(&mut self, index: usize, decl: &ModuleDecl) -> Result<()> {
        let ModuleDecl::Import(import) = decl else {
            return Ok(());
        };
        let source = import.src.value.to_string();

        for specifier in &import.specifiers {
            let (local, name) = match specifier {
                ImportSpecifier::Default(default) => (&default.local, "default".to_owned()),
                ImportSpecifier::Namespace(namespace) => (&namespace.local, "*".to_owned()),
                ImportSpecifier::Named(named) => {
                    let name = named
                        .imported
                        .as_ref()
                        .map_or_else(|| named.local.sym.to_string(), export_name);
                    (&named.local, name)
                }
            };
            let local_name = local.sym.to_string();

            if self.imports.contains_key(&local_name) {
                let (start, _) = span_range(specifier.span());
                return Err(BundleError::DuplicateImport {
                    id: self.id.clone(),
                    name: local_name,
                    location: self.location(start),
                });
            }

            trace!("{}: import {name} as {local_name} from '{source}'", self.id);
            self.imports.insert(
                local_name.clone(),
                ImportDeclaration {
                    source: source.clone(),
                    name,
                    local_name,
                    module: None,
                    statement: index,
                },
            );
        }
        Ok(())
    }

    fn add_export(&mut self, index: usize, decl: &ModuleDecl) -> Result<()> {
        let (start, _) = span_range(decl.span());
        match decl {
            ModuleDecl::ExportDefaultDecl(export) => {
                let (ident, is_class) = match &export.decl {
                    DefaultDecl::Fn(function) => (function.ident.as_ref(), false),
                    DefaultDecl::Class(class) => (class.ident.as_ref(), true),
                    DefaultDecl::TsInterfaceDecl(_) => {
                        return Err(self.unsupported(start, "TypeScript interface export"));
                    }
                };
                let declared_name = ident.map(|ident| ident.sym.to_string());
                trace!(
                    "{}: export default {} {}",
                    self.id,
                    if is_class { "class" } else { "function" },
                    declared_name.as_deref().unwrap_or("<anonymous>")
                );
                self.add_default_export(
                    index,
                    DefaultExport {
                        is_declaration: declared_name.is_some(),
                        is_anonymous: declared_name.is_none(),
                        declared_name,
                        ..DefaultExport::default()
                    },
                );
            }
            ModuleDecl::ExportDefaultExpr(export) => {
                let identifier = match &*export.expr {
                    Expr::Ident(ident) => Some(ident.sym.to_string()),
                    _ => None,
                };
                self.add_default_export(
                    index,
                    DefaultExport {
                        identifier,
                        ..DefaultExport::default()
                    },
                );
            }
            ModuleDecl::ExportNamed(export) => {
                let source = export.src.as_ref().map(|src| src.value.to_string());
                for specifier in &export.specifiers {
                    let ExportSpecifier::Named(named) = specifier else {
                        let (offset, _) = span_range(specifier.span());
                        return Err(self.unsupported(offset, "namespace or default re-export"));
                    };
                    let local_name = export_name(&named.orig);
                    let exported_name = named
                        .exported
                        .as_ref()
                        .map_or_else(|| local_name.clone(), export_name);

                    if let Some(source) = &source {
                        self.imports
                            .entry(local_name.clone())
                            .or_insert_with(|| ImportDeclaration {
                                source: source.clone(),
                                name: local_name.clone(),
                                local_name: local_name.clone(),
                                module: None,
                                statement: index,
                            });
                    }
                    self.exports.insert(
                        exported_name,
                        ExportDeclaration {
                            local_name,
                            statement: None,
                            is_used: false,
                            default: None,
                        },
                    );
                }
            }
            ModuleDecl::ExportDecl(export) => {
                let names: Vec<String> = match &export.decl {
                    Decl::Var(var) => {
                        let mut bindings = Vec::new();
                        for declarator in &var.decls {
                            pattern_bindings(&declarator.name, &mut bindings);
                        }
                        bindings.iter().map(|ident| ident.sym.to_string()).collect()
                    }
                    Decl::Fn(function) => vec![function.ident.sym.to_string()],
                    Decl::Class(class) => vec![class.ident.sym.to_string()],
                    _ => return Err(self.unsupported(start, "TypeScript declaration export")),
                };
                for name in names {
                    self.exports.insert(
                        name.clone(),
                        ExportDeclaration {
                            local_name: name,
                            statement: Some(index),
                            is_used: false,
                            default: None,
                        },
                    );
                }
            }
            ModuleDecl::ExportAll(_) => {
                return Err(self.unsupported(start, "`export * from` re-export"));
            }
            ModuleDecl::Import(_) => {}
            _ => return Err(self.unsupported(start, "TypeScript module syntax")),
        }
        Ok(())
    }

    fn add_default_export(&mut self, index: usize, default: DefaultExport) {
        self.exports.insert(
            "default".to_owned(),
            ExportDeclaration {
                local_name: default
                    .declared_name
                    .clone()
                    .unwrap_or_else(|| "default".to_owned()),
                statement: Some(index),
                is_used: false,
                default: Some(default),
            },
        );
    }

    /// Attach comments to statements and record blank-line margins
    ///
    /// A comment on the same line as the end of the previous statement trails
    /// it; every other comment before a statement leads that statement.
    fn attach_comments(&mut self, comments: &[CommentRecord]) {
        let mut comment_index = 0;

        for index in 0..self.statements.len() {
            let start = self.statements[index].start;
            let previous_end = index.checked_sub(1).map(|i| self.statements[i].end);

            if let Some(previous_end) = previous_end {
                while comments
                    .get(comment_index)
                    .is_some_and(|comment| comment.start < previous_end)
                {
                    comment_index += 1;
                }
            }

            let mut trailing = previous_end.is_some();
            let mut previous_comment: Option<&CommentRecord> = None;
            while let Some(comment) = comments.get(comment_index) {
                if comment.end > start {
                    break;
                }
                let same_line = previous_end
                    .is_some_and(|end| !slice(&self.source, end, comment.start).contains('\n'));

                if trailing && same_line {
                    self.statements[index - 1].trailing_comment = Some(comment.clone());
                } else {
                    let separator = previous_comment.map_or_else(
                        || "\n".to_owned(),
                        |previous| slice(&self.source, previous.end, comment.start).to_owned(),
                    );
                    self.statements[index].leading_comments.push(LeadingComment {
                        separator,
                        comment: comment.clone(),
                    });
                    previous_comment = Some(comment);
                }
                comment_index += 1;
                trailing = false;
            }

            let gap_start = match (previous_comment, index.checked_sub(1)) {
                (Some(comment), _) => comment.end,
                (None, Some(previous)) => {
                    let statement = &self.statements[previous];
                    statement
                        .trailing_comment
                        .as_ref()
                        .map_or(statement.end, |comment| comment.end)
                }
                (None, None) => 0,
            };
            let margin = slice(&self.source, gap_start, start).matches('\n').count() + 1;
            if index > 0 {
                self.statements[index - 1].margin[1] = margin;
            }
            self.statements[index].margin[0] = margin;
        }
    }

    /// Reject writes to imports and detect reassigned default exports
    fn check_writes(&mut self, index: usize) -> Result<()> {
        let default_start = self
            .exports
            .get("default")
            .and_then(|export| export.statement)
            .map(|statement| self.statements[statement].start);
        let mut default_modified = false;

        let statement = &self.statements[index];
        for write in statement.writes.iter().filter(|write| write.is_assignment) {
            if let Some(import) = self.imports.get(&write.name)
                && !statement.defines.contains(&write.name)
            {
                let min_depth = if import.name == "*" { 2 } else { 1 };
                if write.member_depth < min_depth {
                    return Err(BundleError::IllegalReassignment {
                        id: self.id.clone(),
                        name: write.name.clone(),
                        location: self.location(write.start),
                    });
                }
            }

            let is_default_identifier = self
                .default_export()
                .and_then(|default| default.identifier.as_deref())
                == Some(write.name.as_str());
            if is_default_identifier
                && write.member_depth == 0
                && (write.nested || default_start.is_some_and(|start| write.start > start))
            {
                default_modified = true;
            }
        }

        if default_modified
            && let Some(default) = self
                .exports
                .get_mut("default")
                .and_then(|export| export.default.as_mut())
        {
            trace!("{}: default export is reassigned", self.id);
            default.is_modified = true;
        }
        Ok(())
    }

    pub fn default_export(&self) -> Option<&DefaultExport> {
        self.exports
            .get("default")
            .and_then(|export| export.default.as_ref())
    }

    /// Record a naming hint for `default` or `*`; the first hint wins
    pub fn suggest_name(&mut self, key: &str, suggestion: &str) {
        if self.suggested_names.contains_key(key) {
            return;
        }
        let suggestion = if self.default_export().is_some_and(|d| d.is_anonymous) {
            deconflict(suggestion, |name| self.definitions.contains_key(name))
        } else {
            suggestion.to_owned()
        };
        trace!("{}: suggested name for {key} is {suggestion}", self.id);
        self.suggested_names
            .insert(key.to_owned(), make_legal_identifier(&suggestion));
    }

    pub fn rename(&mut self, name: &str, replacement: &str) {
        debug!("{}: renaming {name} to {replacement}", self.id);
        self.renames.insert(name.to_owned(), replacement.to_owned());
    }

    pub fn rename_namespace(&mut self, replacement: &str) {
        debug!("{}: renaming namespace object to {replacement}", self.id);
        self.namespace_rename = Some(replacement.to_owned());
    }

    /// Apply a deconfliction rename, if any, to a final spelling
    pub fn renamed<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map_or(name, String::as_str)
    }

    /// Name for an export with no usable binding, derived from the module's
    /// path relative to the entry directory
    pub fn derived_default_name(&self, entry_id: &str) -> String {
        let entry_dir = Path::new(entry_id)
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = if entry_dir.is_empty() {
            self.id.as_str()
        } else {
            self.id
                .strip_prefix(&format!("{entry_dir}/"))
                .unwrap_or(&self.id)
        };
        let relative = relative.strip_suffix(".js").unwrap_or(relative);
        let name = make_legal_identifier(relative);
        deconflict(&name, |candidate| self.definitions.contains_key(candidate))
    }

    /// Modules this one depends on, split into strong and weak edges
    ///
    /// Strong edges come from names read while the module is evaluated and
    /// from bare side-effect imports; weak edges from every read.
    pub fn consolidate_dependencies(&self) -> (FxIndexSet<ModuleId>, FxIndexSet<ModuleId>) {
        let mut strong = FxIndexSet::default();
        let mut weak = FxIndexSet::default();

        let internal_import = |name: &String| {
            self.imports
                .get(name)
                .and_then(|import| import.module)
                .and_then(ModuleRef::internal)
        };

        for (index, statement) in self.statements.iter().enumerate() {
            if let Some(target) = self
                .side_effect_imports
                .get(&index)
                .and_then(|target| target.internal())
            {
                strong.insert(target);
            }
            strong.extend(statement.strongly_depends_on.iter().filter_map(internal_import));
            weak.extend(statement.depends_on.iter().filter_map(internal_import));
        }
        (strong, weak)
    }

}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(string) => string.value.to_string(),
    }
}

/// `source[start..end]`, or empty when the range is inverted
fn slice(source: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    source.get(start..end).unwrap_or("")
}

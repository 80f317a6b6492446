//! Statement inclusion
//!
//! Marking follows names from statement to statement and module to module
//! with an explicit LIFO worklist. Each task checks its memo when popped, so
//! cyclic imports only ever mark a name or a statement once.

use log::{debug, trace};
use rustc_hash::FxHashSet;

use super::Bundle;
use crate::{
    error::{BundleError, Result},
    types::{ModuleId, ModuleRef, StatementRef},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkTask {
    /// Include a statement and request everything it reads
    Statement(StatementRef),
    /// Include whatever defines `name` in `module`
    Name { module: ModuleId, name: String },
    /// Include every statement of a module
    AllStatements {
        module: ModuleId,
        include_reexports: bool,
    },
    /// Follow `import './x'` into its target
    SideEffectImport { module: ModuleId, statement: usize },
}

#[derive(Debug, Default)]
struct Worklist {
    tasks: Vec<MarkTask>,
    /// Modules already expanded by [`MarkTask::AllStatements`]
    expanded: FxHashSet<(ModuleId, bool)>,
}

impl Worklist {
    fn push(&mut self, task: MarkTask) {
        self.tasks.push(task);
    }

    /// Push so that the first task is popped first
    fn extend_in_order(&mut self, tasks: Vec<MarkTask>) {
        self.tasks.extend(tasks.into_iter().rev());
    }
}

impl Bundle {
    /// Include every statement of `module`
    ///
    /// Export lists (`export { a, b }`) only count when `include_reexports`
    /// is set, which is the case for the entry module and for namespace
    /// targets. Bare imports pull in their target completely.
    pub fn mark_all_statements(&mut self, module: ModuleId, include_reexports: bool) -> Result<()> {
        self.run(MarkTask::AllStatements {
            module,
            include_reexports,
        })
    }

    /// Include whatever `name` refers to in `module`
    pub fn mark(&mut self, module: ModuleId, name: &str) -> Result<()> {
        self.run(MarkTask::Name {
            module,
            name: name.to_owned(),
        })
    }

    fn mark_statement(&mut self, statement: StatementRef) -> Result<()> {
        self.run(MarkTask::Statement(statement))
    }

    fn run(&mut self, task: MarkTask) -> Result<()> {
        let mut worklist = Worklist::default();
        worklist.push(task);

        while let Some(task) = worklist.tasks.pop() {
            match task {
                MarkTask::Statement(statement) => {
                    let module = &mut self.modules[statement.module.index()];
                    if module.statements[statement.index].is_included {
                        continue;
                    }
                    let names = module.statements[statement.index].mark();
                    trace!("Included statement {} of {}", statement.index, module.id);
                    worklist.extend_in_order(
                        names
                            .into_iter()
                            .map(|name| MarkTask::Name {
                                module: statement.module,
                                name,
                            })
                            .collect(),
                    );
                }
                MarkTask::Name { module, name } => {
                    self.mark_name(module, name, &mut worklist)?;
                }
                MarkTask::AllStatements {
                    module,
                    include_reexports,
                } => {
                    if !worklist.expanded.insert((module, include_reexports)) {
                        continue;
                    }
                    let tasks = self.all_statement_tasks(module, include_reexports);
                    worklist.extend_in_order(tasks);
                }
                MarkTask::SideEffectImport { module, statement } => {
                    let current = &self.modules[module.index()];
                    let Some(source) = current.statements[statement].bare_import_source() else {
                        continue;
                    };
                    let source = source.to_owned();
                    let importer = current.id.clone();
                    let target = self.fetch_module(&source, Some(&importer))?;
                    self.modules[module.index()]
                        .side_effect_imports
                        .insert(statement, target);
                    if let ModuleRef::Internal(target) = target {
                        worklist.push(MarkTask::AllStatements {
                            module: target,
                            include_reexports: false,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn all_statement_tasks(&self, module: ModuleId, include_reexports: bool) -> Vec<MarkTask> {
        let current = &self.modules[module.index()];
        let mut tasks = Vec::new();
        for statement in &current.statements {
            if statement.is_included {
                continue;
            }
            if statement.is_import_declaration() {
                if statement.bare_import_source().is_some() {
                    tasks.push(MarkTask::SideEffectImport {
                        module,
                        statement: statement.index,
                    });
                }
                continue;
            }
            if statement.is_export_list() && !include_reexports {
                continue;
            }
            tasks.push(MarkTask::Statement(StatementRef::new(module, statement.index)));
        }
        tasks
    }

    fn mark_name(&mut self, module: ModuleId, name: String, worklist: &mut Worklist) -> Result<()> {
        let current = &mut self.modules[module.index()];
        if !current.requested_names.insert(name.clone()) {
            return Ok(());
        }

        if let Some(import) = current.imports.get(&name).cloned() {
            let importer_id = current.id.clone();
            let suggestion = current
                .suggested_names
                .get(&import.local_name)
                .cloned()
                .unwrap_or_else(|| import.local_name.clone());

            let target = self.fetch_module(&import.source, Some(&importer_id))?;
            if let Some(import) = self.modules[module.index()].imports.get_mut(&name) {
                import.module = Some(target);
            }

            match target {
                ModuleRef::External(external) => {
                    let external = &mut self.external_modules[external.index()];
                    match import.name.as_str() {
                        "default" => {
                            external.suggest_name("default", &suggestion);
                            external.needs_default = true;
                        }
                        "*" => {
                            external.suggest_name("*", &suggestion);
                            external.suggest_name("default", &format!("{suggestion}__default"));
                            external.needs_named = true;
                        }
                        _ => external.needs_named = true,
                    }
                }
                ModuleRef::Internal(target) => {
                    let exporter = &mut self.modules[target.index()];
                    match import.name.as_str() {
                        "default" => {
                            let mut suggestion = suggestion;
                            while exporter.imports.contains_key(&suggestion) {
                                suggestion.insert(0, '_');
                            }
                            exporter.suggest_name("default", &suggestion);
                        }
                        "*" => {
                            exporter.suggest_name("*", &suggestion);
                            exporter.suggest_name("default", &format!("{suggestion}__default"));
                            if !self.internal_namespace_modules.contains(&target) {
                                debug!("Creating namespace object for {}", exporter.id);
                                self.internal_namespace_modules.push(target);
                            }
                            worklist.push(MarkTask::AllStatements {
                                module: target,
                                include_reexports: true,
                            });
                            return Ok(());
                        }
                        _ => {}
                    }

                    let Some(export) = exporter.exports.get_mut(&import.name) else {
                        return Err(BundleError::MissingExport {
                            exporter: exporter.id.clone(),
                            importer: importer_id,
                            name: import.name,
                        });
                    };
                    export.is_used = true;
                    worklist.push(MarkTask::Name {
                        module: target,
                        name: export.local_name.clone(),
                    });
                }
            }
            return Ok(());
        }

        let default = (name == "default")
            .then(|| current.exports.get("default"))
            .flatten();
        if let Some(export) = default
            && let Some(declared_name) = export
                .default
                .as_ref()
                .and_then(|default| default.declared_name.clone())
        {
            worklist.push(MarkTask::Name {
                module,
                name: declared_name,
            });
            return Ok(());
        }

        let statement = match default {
            Some(export) => export.statement,
            None => current.definitions.get(&name).copied(),
        };
        if let Some(index) = statement
            && !current.statements[index].is_included
        {
            worklist.push(MarkTask::Statement(StatementRef::new(module, index)));
        }
        Ok(())
    }

    /// Include statements that write to bindings the bundle keeps
    ///
    /// Runs until a full pass over every loaded module includes nothing new.
    pub fn mark_all_modifier_statements(&mut self) -> Result<()> {
        let mut pass = 0;
        loop {
            pass += 1;
            let mut settled = true;

            let mut module_index = 0;
            while module_index < self.modules.len() {
                let module = ModuleId::new(module_index as u32);
                for index in 0..self.modules[module_index].statements.len() {
                    if self.should_include_modifier(module, index)? {
                        settled = false;
                        self.mark_statement(StatementRef::new(module, index))?;
                    }
                }
                module_index += 1;
            }

            if settled {
                debug!("Modifier statements settled after {pass} passes");
                return Ok(());
            }
        }
    }

    fn should_include_modifier(&mut self, module: ModuleId, index: usize) -> Result<bool> {
        let current = &self.modules[module.index()];
        let statement = &current.statements[index];
        if statement.is_included {
            return Ok(false);
        }

        let modifies: Vec<String> = statement.modifies.iter().cloned().collect();
        for name in modifies {
            let current = &self.modules[module.index()];
            let defined_and_kept = current
                .definitions
                .get(&name)
                .is_some_and(|&defining| current.statements[defining].is_included);
            let exported_and_used = current.exports.get(&name).is_some_and(|e| e.is_used);
            if defined_and_kept || exported_and_used {
                trace!("{}: including write to {name}", current.id);
                return Ok(true);
            }

            if !current.imports.contains_key(&name) {
                continue;
            }
            if let Some(defining) = self.find_defining_statement(module, &name)?
                && self.modules[defining.module.index()].statements[defining.index].is_included
            {
                trace!(
                    "{}: including write to imported {name}",
                    self.modules[module.index()].id
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bundle::BundleOptions, loader::MemoryModules};

    fn build(modules: MemoryModules) -> Bundle {
        let mut bundle = Bundle::new(
            BundleOptions {
                entry: "/main.js".into(),
                external: Vec::new(),
            },
            Box::new(modules.clone()),
            Box::new(modules),
        );
        bundle.build().expect("build");
        bundle
    }

    fn included(bundle: &Bundle, module: usize) -> Vec<usize> {
        bundle.modules[module]
            .statements
            .iter()
            .filter(|statement| statement.is_included)
            .map(|statement| statement.index)
            .collect()
    }

    #[test]
    fn test_unused_statements_are_dropped() {
        let bundle = build(
            MemoryModules::new()
                .with("/main.js", "import { used } from './lib';\nused();")
                .with(
                    "/lib.js",
                    "export function used() { return helper(); }\nexport function unused() {}\nfunction helper() {}",
                ),
        );
        assert_eq!(included(&bundle, 1), vec![0, 2]);
    }

    #[test]
    fn test_cyclic_imports_mark_once() {
        let mut bundle = build(
            MemoryModules::new()
                .with("/main.js", "import { a } from './a';\na();")
                .with("/a.js", "import { b } from './b';\nexport function a() { return b(); }")
                .with("/b.js", "import { a } from './a';\nexport function b() { return a; }"),
        );
        let before: Vec<_> = (0..3).map(|m| included(&bundle, m)).collect();
        bundle.mark(ModuleId::new(1), "a").expect("mark");
        bundle.mark(ModuleId::new(2), "b").expect("mark");
        let after: Vec<_> = (0..3).map(|m| included(&bundle, m)).collect();
        assert_eq!(before, after);
        assert_eq!(after, vec![vec![1], vec![1], vec![1]]);
    }

    #[test]
    fn test_writes_to_kept_bindings_are_included() {
        let bundle = build(
            MemoryModules::new()
                .with("/main.js", "import { config } from './config';\nconsole.log(config);")
                .with(
                    "/config.js",
                    "export var config = {};\nconfig.debug = true;\nvar other = {};\nother.x = 1;",
                ),
        );
        assert_eq!(included(&bundle, 1), vec![0, 1]);
    }

    #[test]
    fn test_missing_export_is_error() {
        let modules = MemoryModules::new()
            .with("/main.js", "import { nope } from './lib';\nnope();")
            .with("/lib.js", "export var yes = 1;");
        let mut bundle = Bundle::new(
            BundleOptions {
                entry: "/main.js".into(),
                external: Vec::new(),
            },
            Box::new(modules.clone()),
            Box::new(modules),
        );
        match bundle.build() {
            Err(BundleError::MissingExport {
                exporter,
                importer,
                name,
            }) => {
                assert_eq!(exporter, "/lib.js");
                assert_eq!(importer, "/main.js");
                assert_eq!(name, "nope");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_side_effect_imports_include_everything() {
        let bundle = build(
            MemoryModules::new()
                .with("/main.js", "import './polyfill';\nconsole.log(1);")
                .with("/polyfill.js", "var a = 1;\nwindow.a = a;"),
        );
        assert_eq!(included(&bundle, 1), vec![0, 1]);
        assert!(bundle.modules[0].side_effect_imports.contains_key(&0));
    }
}

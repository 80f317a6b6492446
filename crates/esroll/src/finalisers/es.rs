use super::{FinaliseContext, Finaliser};
use crate::{bundle::GenerateOptions, error::Result, output::Output};

/// ES module output: externals stay `import`s, entry exports become
/// `export` statements over the renamed bindings
#[derive(Debug, Clone, Copy)]
pub(super) struct Es;

impl Finaliser for Es {
    fn name(&self) -> &'static str {
        "es"
    }

    fn keeps_live_bindings(&self) -> bool {
        true
    }

    fn finalise(
        &self,
        mut body: Output,
        context: &FinaliseContext,
        _options: &GenerateOptions,
    ) -> Result<Output> {
        let import_block = context
            .externals
            .iter()
            .map(|external| {
                let (id, name) = (&external.id, &external.name);
                match (external.needs_default, external.needs_named) {
                    (true, true) => format!("import {name}__default, * as {name} from '{id}';"),
                    (true, false) => format!("import {name} from '{id}';"),
                    (false, true) => format!("import * as {name} from '{id}';"),
                    (false, false) => format!("import '{id}';"),
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !import_block.is_empty() {
            body.prepend(&format!("{import_block}\n\n"));
        }

        let export_block = context
            .exports
            .iter()
            .map(|export| {
                let (exported, canonical) = (&export.exported, &export.canonical);
                if exported == "default" {
                    format!("export default {canonical};")
                } else if exported == canonical {
                    format!("export {{ {exported} }};")
                } else {
                    format!("export {{ {canonical} as {exported} }};")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !export_block.is_empty() {
            body.append(&format!("\n\n{export_block}"));
        }

        body.trim();
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::finalisers::{ExportBinding, ExportMode, ExternalBinding};

    #[test]
    fn test_es_imports_and_exports() {
        let mut body = Output::new();
        body.append("var _foo = path.join('a');\nvar main = _foo;");
        let context = FinaliseContext {
            export_mode: ExportMode::Named,
            indent: "\t".into(),
            exports: vec![
                ExportBinding {
                    exported: "default".into(),
                    canonical: "main".into(),
                },
                ExportBinding {
                    exported: "foo".into(),
                    canonical: "_foo".into(),
                },
            ],
            to_export: Vec::new(),
            externals: vec![ExternalBinding {
                id: "path".into(),
                name: "path".into(),
                needs_default: false,
                needs_named: true,
            }],
        };
        let output = Es
            .finalise(body, &context, &GenerateOptions::default())
            .expect("finalise");
        assert_eq!(
            output.to_string(),
            "import * as path from 'path';\n\nvar _foo = path.join('a');\nvar main = _foo;\n\n\
             export default main;\nexport { _foo as foo };"
        );
    }
}

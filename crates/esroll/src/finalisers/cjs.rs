use super::{FinaliseContext, Finaliser, export_block};
use crate::{bundle::GenerateOptions, error::Result, output::Output};

/// CommonJS output
#[derive(Debug, Clone, Copy)]
pub(super) struct Cjs;

impl Finaliser for Cjs {
    fn name(&self) -> &'static str {
        "cjs"
    }

    fn finalise(
        &self,
        mut body: Output,
        context: &FinaliseContext,
        options: &GenerateOptions,
    ) -> Result<Output> {
        let mut intro = if options.use_strict {
            "'use strict';\n\n".to_owned()
        } else {
            String::new()
        };

        let import_block = context
            .externals
            .iter()
            .map(|external| {
                let name = &external.name;
                let mut require = format!("var {name} = require('{}');", external.id);
                if external.needs_default {
                    let target = if external.needs_named {
                        format!("var {name}__default = ")
                    } else {
                        format!("{name} = ")
                    };
                    require.push('\n');
                    require.push_str(&target);
                    require.push_str(&format!("'default' in {name} ? {name}['default'] : {name};"));
                }
                require
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !import_block.is_empty() {
            intro.push_str(&import_block);
            intro.push_str("\n\n");
        }
        body.prepend(&intro);

        let exports = export_block(context, "module.exports =");
        if !exports.is_empty() {
            body.append(&format!("\n\n{exports}"));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::finalisers::{ExportBinding, ExportMode, ExternalBinding};

    fn context(export_mode: ExportMode, exports: Vec<ExportBinding>) -> FinaliseContext {
        FinaliseContext {
            export_mode,
            indent: "\t".into(),
            to_export: exports.clone(),
            exports,
            externals: vec![ExternalBinding {
                id: "lodash".into(),
                name: "_".into(),
                needs_default: true,
                needs_named: true,
            }],
        }
    }

    #[test]
    fn test_cjs_default_export() {
        let mut body = Output::new();
        body.append("var main = ___default(1);");
        let output = Cjs
            .finalise(
                body,
                &context(
                    ExportMode::Default,
                    vec![ExportBinding {
                        exported: "default".into(),
                        canonical: "main".into(),
                    }],
                ),
                &GenerateOptions::default(),
            )
            .expect("finalise");
        assert_eq!(
            output.to_string(),
            "'use strict';\n\nvar _ = require('lodash');\n\
             var ___default = 'default' in _ ? _['default'] : _;\n\n\
             var main = ___default(1);\n\nmodule.exports = main;"
        );
    }

    #[test]
    fn test_cjs_without_strict_mode() {
        let mut body = Output::new();
        body.append("function foo() {}");
        let options = GenerateOptions {
            use_strict: false,
            ..GenerateOptions::default()
        };
        let mut context = context(
            ExportMode::Named,
            vec![ExportBinding {
                exported: "foo".into(),
                canonical: "foo".into(),
            }],
        );
        context.externals.clear();
        let output = Cjs.finalise(body, &context, &options).expect("finalise");
        assert_eq!(output.to_string(), "function foo() {}\n\nexports.foo = foo;");
    }
}

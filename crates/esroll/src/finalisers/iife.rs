use super::{ExportMode, FinaliseContext, Finaliser, export_block};
use crate::{
    bundle::GenerateOptions,
    error::{BundleError, Result},
    output::Output,
};

/// A self-executing function taking externals as globals
#[derive(Debug, Clone, Copy)]
pub(super) struct Iife;

impl Finaliser for Iife {
    fn name(&self) -> &'static str {
        "iife"
    }

    fn finalise(
        &self,
        mut body: Output,
        context: &FinaliseContext,
        options: &GenerateOptions,
    ) -> Result<Output> {
        let mut dependencies: Vec<String> = context
            .externals
            .iter()
            .map(|external| {
                options
                    .globals
                    .get(&external.id)
                    .cloned()
                    .unwrap_or_else(|| external.name.clone())
            })
            .collect();
        let mut args: Vec<String> = context
            .externals
            .iter()
            .map(|external| external.name.clone())
            .collect();

        let module_name = match context.export_mode {
            ExportMode::None => options.module_name.as_deref().unwrap_or_default(),
            _ => options
                .module_name
                .as_deref()
                .ok_or_else(|| BundleError::MissingModuleName {
                    format: self.name().to_owned(),
                })?,
        };

        if context.export_mode == ExportMode::Named {
            dependencies.insert(0, format!("(this.{module_name} = {{}})"));
            args.insert(0, "exports".to_owned());
        }

        let use_strict = if options.use_strict {
            " 'use strict';"
        } else {
            ""
        };
        let mut intro = format!("(function ({}) {{{use_strict}\n\n", args.join(", "));
        let outro = format!("\n\n}})({});", dependencies.join(", "));
        if context.export_mode == ExportMode::Default {
            intro.insert_str(0, &format!("var {module_name} = "));
        }

        let exports = export_block(context, "return");
        if !exports.is_empty() {
            body.append(&format!("\n\n{exports}"));
        }

        body.indent(&context.indent);
        body.prepend(&intro);
        body.append(&outro);
        Ok(body)
    }
}

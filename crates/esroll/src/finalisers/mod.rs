//! Output formats
//!
//! A finaliser wraps the flattened bundle body in whatever the target module
//! system needs: import/export statements, `require` calls and `exports`
//! assignments, or an immediately invoked wrapper function.

mod cjs;
mod es;
mod iife;

use std::fmt;

use crate::{
    bundle::GenerateOptions,
    error::{BundleError, Result},
    output::Output,
};

/// How the entry module's exports are exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// The single default export is the module value
    Default,
    /// Exports become properties of an exports object
    Named,
    /// Nothing is exported
    None,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Named => "named",
            Self::None => "none",
        })
    }
}

/// One export of the entry module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBinding {
    pub exported: String,
    /// Bundle-wide name of the exported binding
    pub canonical: String,
}

/// An external module as the finalisers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBinding {
    pub id: String,
    pub name: String,
    pub needs_default: bool,
    pub needs_named: bool,
}

/// Everything about the bundle a finaliser needs
#[derive(Debug, Clone)]
pub struct FinaliseContext {
    pub export_mode: ExportMode,
    pub indent: String,
    /// Every export of the entry module
    pub exports: Vec<ExportBinding>,
    /// Exports that still need an assignment at the end; live `var` exports
    /// are already written through `exports.<name>`
    pub to_export: Vec<ExportBinding>,
    pub externals: Vec<ExternalBinding>,
}

impl FinaliseContext {
    fn default_export(&self) -> Option<&ExportBinding> {
        self.exports
            .iter()
            .find(|export| export.exported == "default")
    }
}

pub trait Finaliser: Sync {
    fn name(&self) -> &'static str;

    /// `es` output keeps `export let x` bindings live on its own; every other
    /// format rewrites them to `exports.x`
    fn keeps_live_bindings(&self) -> bool {
        false
    }

    fn finalise(
        &self,
        body: Output,
        context: &FinaliseContext,
        options: &GenerateOptions,
    ) -> Result<Output>;
}

static FINALISERS: [&dyn Finaliser; 3] = [&es::Es, &cjs::Cjs, &iife::Iife];

/// Finaliser for `format`; `es6` is accepted as an alias of `es`
pub fn finaliser(format: &str) -> Result<&'static dyn Finaliser> {
    let format = if format == "es6" { "es" } else { format };
    FINALISERS
        .iter()
        .copied()
        .find(|finaliser| finaliser.name() == format)
        .ok_or_else(|| BundleError::UnknownFormat {
            format: format.to_owned(),
            valid: FINALISERS
                .iter()
                .map(|finaliser| finaliser.name())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Pick the export mode from the `exports` option and the entry's exports
pub fn export_mode(exports: &[String], option: Option<&str>) -> Result<ExportMode> {
    let bad_exports = |mode: &str| BundleError::BadExports {
        mode: mode.to_owned(),
        exports: exports.join(", "),
    };

    match option {
        Some("default") => {
            if exports.len() != 1 || exports[0] != "default" {
                return Err(bad_exports("default"));
            }
            Ok(ExportMode::Default)
        }
        Some("none") => {
            if !exports.is_empty() {
                return Err(bad_exports("none"));
            }
            Ok(ExportMode::None)
        }
        Some("named") => Ok(ExportMode::Named),
        None | Some("auto") => Ok(match exports {
            [] => ExportMode::None,
            [only] if only == "default" => ExportMode::Default,
            _ => ExportMode::Named,
        }),
        Some(other) => Err(BundleError::InvalidExportMode {
            value: other.to_owned(),
        }),
    }
}

/// Indentation used by `code`, or a tab when it has none
///
/// Tab-indented lines win ties; otherwise the narrowest run of two or more
/// leading spaces is used.
pub fn guess_indent(code: &str) -> String {
    let mut tabbed = 0usize;
    let mut spaced = 0usize;
    let mut min_spaces = usize::MAX;

    for line in code.lines() {
        if line.starts_with('\t') {
            tabbed += 1;
            continue;
        }
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces >= 2 {
            spaced += 1;
            min_spaces = min_spaces.min(spaces);
        }
    }

    if spaced == 0 || tabbed >= spaced {
        "\t".to_owned()
    } else {
        " ".repeat(min_spaces)
    }
}

/// Statements assigning the bundle's exports through `mechanism`
/// (`module.exports =` or `return`) or to an `exports` object
fn export_block(context: &FinaliseContext, mechanism: &str) -> String {
    match context.export_mode {
        ExportMode::None => String::new(),
        ExportMode::Default => context
            .default_export()
            .map(|export| format!("{mechanism} {};", export.canonical))
            .unwrap_or_default(),
        ExportMode::Named => context
            .to_export
            .iter()
            .map(|export| {
                let property = if export.exported == "default" {
                    "['default']".to_owned()
                } else {
                    format!(".{}", export.exported)
                };
                format!("exports{property} = {};", export.canonical)
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn test_export_mode_auto() {
        assert_eq!(export_mode(&[], None).expect("mode"), ExportMode::None);
        assert_eq!(
            export_mode(&names(&["default"]), Some("auto")).expect("mode"),
            ExportMode::Default
        );
        assert_eq!(
            export_mode(&names(&["default", "foo"]), None).expect("mode"),
            ExportMode::Named
        );
    }

    #[test]
    fn test_export_mode_validation() {
        assert!(matches!(
            export_mode(&names(&["foo"]), Some("default")),
            Err(BundleError::BadExports { .. })
        ));
        assert!(matches!(
            export_mode(&names(&["foo"]), Some("none")),
            Err(BundleError::BadExports { .. })
        ));
        assert!(matches!(
            export_mode(&[], Some("everything")),
            Err(BundleError::InvalidExportMode { .. })
        ));
        assert_eq!(
            export_mode(&names(&["default"]), Some("named")).expect("mode"),
            ExportMode::Named
        );
    }

    #[test]
    fn test_unknown_format() {
        let err = finaliser("amd").err().expect("unknown format");
        assert_eq!(
            err.to_string(),
            "unknown output format 'amd' - valid options are es, cjs, iife"
        );
        assert_eq!(finaliser("es6").expect("alias").name(), "es");
    }

    #[test]
    fn test_guess_indent() {
        assert_eq!(guess_indent("a\n  b\n    c\n"), "  ");
        assert_eq!(guess_indent("a\n\tb\n  c\n"), "\t");
        assert_eq!(guess_indent("a;\nb;"), "\t");
    }

    #[test]
    fn test_named_export_block() {
        let binding = |exported: &str, canonical: &str| ExportBinding {
            exported: exported.to_owned(),
            canonical: canonical.to_owned(),
        };
        let context = FinaliseContext {
            export_mode: ExportMode::Named,
            indent: "\t".into(),
            exports: vec![binding("default", "main"), binding("foo", "_foo")],
            to_export: vec![binding("default", "main"), binding("foo", "_foo")],
            externals: Vec::new(),
        };
        assert_eq!(
            export_block(&context, "module.exports ="),
            "exports['default'] = main;\nexports.foo = _foo;"
        );
    }
}

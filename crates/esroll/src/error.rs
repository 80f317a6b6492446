//! Error taxonomy of a build
//!
//! Every variant is fatal: nothing is retried or recovered locally, and each
//! carries enough context (module identity, line/column) to report to a user.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BundleError>;

/// A position inside a module source, derived from a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// 1-based line
    pub line: usize,
    /// 0-based column, in characters
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,
}

impl Location {
    /// Compute the line/column of `offset` within `source`
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count();
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("could not resolve '{specifier}'{}", importer_suffix(importer.as_deref()))]
    Resolve {
        specifier: String,
        importer: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("entry module '{specifier}' cannot be external")]
    ExternalEntry { specifier: String },

    #[error("could not load '{id}'")]
    Load {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse {id} ({location}): {message}")]
    Parse {
        id: String,
        location: Location,
        message: String,
    },

    #[error("duplicated import '{name}' in {id} ({location})")]
    DuplicateImport {
        id: String,
        name: String,
        location: Location,
    },

    #[error("illegal reassignment to import '{name}' in {id} ({location})")]
    IllegalReassignment {
        id: String,
        name: String,
        location: Location,
    },

    #[error("module {exporter} does not export {name} (imported by {importer})")]
    MissingExport {
        exporter: String,
        importer: String,
        name: String,
    },

    #[error("unsupported syntax in {id} ({location}): {what}")]
    UnsupportedSyntax {
        id: String,
        location: Location,
        what: String,
    },

    #[error("unknown output format '{format}' - valid options are {valid}")]
    UnknownFormat { format: String, valid: String },

    #[error(
        "'{mode}' was specified for the exports option, but entry module has following exports: {exports}"
    )]
    BadExports { mode: String, exports: String },

    #[error(
        "invalid exports option '{value}' - must be 'default', 'named', 'none', 'auto', or left unspecified"
    )]
    InvalidExportMode { value: String },

    #[error("you must supply a module name for {format} bundles")]
    MissingModuleName { format: String },

    #[error("failed to generate source map")]
    SourceMap(#[source] anyhow::Error),
}

fn importer_suffix(importer: Option<&str>) -> String {
    importer.map_or_else(String::new, |importer| format!(" (imported by {importer})"))
}

//! Turning import specifiers into module identities
//!
//! Relative and absolute specifiers are resolved against the importing file;
//! bare specifiers are either listed as external, found through a
//! `node_modules` package's ES entry point, or left external with a warning.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, trace, warn};
use serde::Deserialize;

/// Maps a specifier seen in `importer` to a module identity
///
/// `Ok(None)` marks the specifier as external: it stays an import in the
/// generated code and its source is never loaded.
pub trait Resolver {
    fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<Option<String>>;
}

/// The fields of `package.json` that point at an ES module entry
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    module: Option<String>,
    #[serde(rename = "jsnext:main")]
    jsnext_main: Option<String>,
}

impl PackageManifest {
    fn es_entry(&self) -> Option<&str> {
        self.module.as_deref().or(self.jsnext_main.as_deref())
    }
}

/// Filesystem resolution with an explicit list of external packages
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    external: Vec<String>,
}

impl DefaultResolver {
    pub fn new(external: Vec<String>) -> Self {
        Self { external }
    }

    fn is_path(specifier: &str) -> bool {
        specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == ".."
            || Path::new(specifier).is_absolute()
    }

    /// Look for `node_modules/<specifier>/package.json` in `start` and every
    /// ancestor directory
    fn resolve_package(specifier: &str, start: &Path) -> Result<Option<String>> {
        for dir in start.ancestors() {
            let package_dir = dir.join("node_modules").join(specifier);
            let manifest_path = package_dir.join("package.json");
            if !manifest_path.is_file() {
                continue;
            }

            trace!("Reading {}", manifest_path.display());
            let manifest = std::fs::read_to_string(&manifest_path)
                .with_context(|| format!("failed to read {}", manifest_path.display()))?;
            let manifest: PackageManifest = serde_json::from_str(&manifest)
                .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

            let Some(entry) = manifest.es_entry() else {
                debug!("Package '{specifier}' has no ES module entry point");
                return Ok(None);
            };
            let resolved = with_js_extension(normalize(&package_dir.join(entry)));
            return Ok(Some(path_to_id(&resolved)));
        }
        Ok(None)
    }
}

impl Resolver for DefaultResolver {
    fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<Option<String>> {
        if Self::is_path(specifier) {
            let base = match importer {
                Some(importer) => Path::new(importer)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
                None => std::env::current_dir().context("failed to read current directory")?,
            };
            let resolved = with_js_extension(normalize(&base.join(specifier)));
            trace!("Resolved '{specifier}' to {}", resolved.display());
            return Ok(Some(path_to_id(&resolved)));
        }

        // An entry point given without a leading `./`
        let Some(importer) = importer else {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            let resolved = with_js_extension(normalize(&cwd.join(specifier)));
            return Ok(Some(path_to_id(&resolved)));
        };

        if self.external.iter().any(|external| external == specifier) {
            debug!("'{specifier}' is listed as external");
            return Ok(None);
        }

        let start = Path::new(importer).parent().unwrap_or_else(|| Path::new(""));
        if let Some(resolved) = Self::resolve_package(specifier, start)? {
            debug!("Resolved package '{specifier}' to {resolved}");
            return Ok(Some(resolved));
        }

        warn!("Treating '{specifier}' as external dependency");
        Ok(None)
    }
}

/// Append `.js` unless the path already names a `.js` file
pub fn with_js_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "js") {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".js");
        PathBuf::from(name)
    }
}

/// Collapse `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn path_to_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_specifiers() {
        let resolver = DefaultResolver::default();
        assert_eq!(
            resolver
                .resolve("./utils/format", Some("/project/src/main.js"))
                .expect("resolve"),
            Some("/project/src/utils/format.js".to_owned())
        );
        assert_eq!(
            resolver
                .resolve("../lib.js", Some("/project/src/main.js"))
                .expect("resolve"),
            Some("/project/lib.js".to_owned())
        );
    }

    #[test]
    fn test_listed_external() {
        let resolver = DefaultResolver::new(vec!["react".into()]);
        assert_eq!(
            resolver
                .resolve("react", Some("/project/src/main.js"))
                .expect("resolve"),
            None
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(
            with_js_extension(PathBuf::from("/a/b.min")),
            PathBuf::from("/a/b.min.js")
        );
    }
}

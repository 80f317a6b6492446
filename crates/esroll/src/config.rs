//! Layered configuration
//!
//! Values are read from, lowest precedence first:
//! 1. built-in defaults
//! 2. the user config, `<config dir>/esroll/esroll.toml`
//! 3. the project config, `./esroll.toml` or an explicit `--config` file
//!
//! Command-line flags are applied on top by the binary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use etcetera::BaseStrategy;
use log::debug;
use serde::Deserialize;

use crate::{
    bundle::{BundleOptions, GenerateOptions},
    types::FxIndexMap,
};

pub const CONFIG_FILE: &str = "esroll.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Output format: `es`, `cjs` or `iife`
    pub format: String,
    /// Export mode: `auto`, `default`, `named` or `none`
    pub exports: Option<String>,
    /// Bare specifiers kept out of the bundle
    pub external: Vec<String>,
    /// External id -> global variable, for `iife`
    pub globals: FxIndexMap<String, String>,
    pub module_name: Option<String>,
    pub indent: Option<String>,
    pub source_map: bool,
    pub use_strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: "es".to_owned(),
            exports: None,
            external: Vec::new(),
            globals: FxIndexMap::default(),
            module_name: None,
            indent: None,
            source_map: false,
            use_strict: true,
        }
    }
}

impl Config {
    /// Load the user config and the project config
    ///
    /// An explicit `config_path` replaces the project `esroll.toml` and must
    /// exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(user_config) = user_config_path()
            && user_config.is_file()
        {
            layers.push(read_layer(&user_config)?);
        }

        match config_path {
            Some(path) => layers.push(read_layer(path)?),
            None => {
                let project_config = PathBuf::from(CONFIG_FILE);
                if project_config.is_file() {
                    layers.push(read_layer(&project_config)?);
                }
            }
        }

        Self::from_layers(layers)
    }

    /// Merge TOML tables, later ones overriding earlier ones, over the
    /// defaults
    pub fn from_layers(layers: impl IntoIterator<Item = toml::Table>) -> Result<Self> {
        let mut merged = toml::Table::new();
        for layer in layers {
            merge_tables(&mut merged, layer);
        }
        toml::Value::Table(merged)
            .try_into()
            .context("invalid configuration")
    }

    pub fn bundle_options(&self, entry: &str) -> BundleOptions {
        BundleOptions {
            entry: entry.to_owned(),
            external: self.external.clone(),
        }
    }

    /// Generation options; `output_file` names the map's `file` property
    pub fn generate_options(&self, output_file: Option<&str>) -> GenerateOptions {
        GenerateOptions {
            format: self.format.clone(),
            exports: self.exports.clone(),
            module_name: self.module_name.clone(),
            globals: self.globals.clone(),
            indent: self.indent.clone(),
            source_map: self.source_map,
            source_map_file: output_file.map(str::to_owned),
            use_strict: self.use_strict,
        }
    }
}

/// `<config dir>/esroll/esroll.toml`, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("esroll").join(CONFIG_FILE))
}

fn read_layer(path: &Path) -> Result<toml::Table> {
    debug!("Reading configuration from {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Tables merge key by key; any other value is replaced
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(table)) => {
                merge_tables(existing, table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

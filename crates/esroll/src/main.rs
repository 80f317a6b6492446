use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use esroll::{Bundle, config::Config};
use log::{LevelFilter, debug, error, info};

/// Bundle an ES module graph into a single file
#[derive(Debug, Parser)]
#[command(name = "esroll", version, about)]
struct Cli {
    /// Entry module
    entry: String,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: es, cjs or iife
    #[arg(short, long)]
    format: Option<String>,

    /// Export mode: auto, default, named or none
    #[arg(long)]
    exports: Option<String>,

    /// Module id to leave external (repeatable)
    #[arg(short = 'e', long = "external")]
    external: Vec<String>,

    /// Global name of an iife bundle
    #[arg(short = 'n', long = "name")]
    module_name: Option<String>,

    /// Global variable of an external module, as ID=GLOBAL (repeatable)
    #[arg(short = 'g', long = "global", value_parser = parse_global)]
    globals: Vec<(String, String)>,

    /// Write a source map next to the output file
    #[arg(short = 'm', long)]
    source_map: bool,

    /// Omit the 'use strict' directive
    #[arg(long)]
    no_strict: bool,

    /// Configuration file used instead of ./esroll.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_global(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .filter(|(id, global)| !id.is_empty() && !global.is_empty())
        .map(|(id, global)| (id.to_owned(), global.to_owned()))
        .ok_or_else(|| format!("expected ID=GLOBAL, got '{value}'"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli(&mut config, &cli);
    debug!("Configuration: {config:?}");

    if config.source_map && cli.output.is_none() {
        return Err(anyhow!("--source-map requires an output file"));
    }

    let mut bundle = Bundle::from_fs(config.bundle_options(&cli.entry));
    bundle
        .build()
        .with_context(|| format!("failed to bundle {}", cli.entry))?;

    let output_file = cli.output.as_deref().and_then(file_name);
    let output = bundle
        .generate(&config.generate_options(output_file.as_deref()))
        .context("failed to generate bundle")?;

    let Some(path) = cli.output else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(output.code.as_bytes())?;
        stdout.write_all(b"\n")?;
        return Ok(());
    };

    let map = output.map_json()?;
    let mut code = output.code;
    if let Some(map) = map {
        let map_path = PathBuf::from(format!("{}.map", path.display()));
        fs::write(&map_path, map)
            .with_context(|| format!("failed to write {}", map_path.display()))?;
        if let Some(map_name) = file_name(&map_path) {
            code.push_str(&format!("\n//# sourceMappingURL={map_name}"));
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, code).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Command-line flags override every configuration file
fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(format) = &cli.format {
        config.format.clone_from(format);
    }
    if cli.exports.is_some() {
        config.exports.clone_from(&cli.exports);
    }
    if cli.module_name.is_some() {
        config.module_name.clone_from(&cli.module_name);
    }
    for external in &cli.external {
        if !config.external.contains(external) {
            config.external.push(external.clone());
        }
    }
    for (id, global) in &cli.globals {
        config.globals.insert(id.clone(), global.clone());
    }
    if cli.source_map {
        config.source_map = true;
    }
    if cli.no_strict {
        config.use_strict = false;
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

//! esroll bundles a graph of ECMAScript modules into a single file.
//!
//! Modules are parsed and analysed statement by statement; only statements
//! the entry module actually needs are kept, ordered so dependencies run
//! first, renamed into one shared scope and wrapped for the requested module
//! format.
//!
//! ```no_run
//! use esroll::{BundleOptions, GenerateOptions, rollup};
//!
//! let mut bundle = rollup(BundleOptions {
//!     entry: "src/main.js".into(),
//!     external: Vec::new(),
//! })?;
//! let output = bundle.generate(&GenerateOptions {
//!     format: "cjs".into(),
//!     ..GenerateOptions::default()
//! })?;
//! println!("{}", output.code);
//! # Ok::<(), esroll::error::BundleError>(())
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod external_module;
pub mod finalisers;
pub mod identifier;
pub mod loader;
pub mod module;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod scope;
pub mod source_map;
pub mod source_patch;
pub mod statement;
pub mod types;
pub mod visitors;

pub use bundle::{Bundle, BundleOptions, BundleOutput, GenerateOptions, rollup};

use std::{fs, path::Path};

use esroll::{BundleOptions, GenerateOptions, rollup};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    fs::write(path, contents).expect("write file");
}

#[test]
fn test_bundles_relative_and_package_imports() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();

    write(
        root,
        "src/main.js",
        "import { greet } from './lib/greet';\nimport { shout } from 'shout';\nconsole.log(shout(greet('world')));",
    );
    write(
        root,
        "src/lib/greet.js",
        "export function greet(name) { return 'hello ' + name; }",
    );
    write(
        root,
        "node_modules/shout/package.json",
        r#"{ "name": "shout", "main": "index.cjs", "module": "es/index" }"#,
    );
    write(
        root,
        "node_modules/shout/es/index.js",
        "export function shout(text) { return text.toUpperCase(); }",
    );

    let entry = root.join("src/main.js");
    let mut bundle = rollup(BundleOptions {
        entry: entry.to_string_lossy().into_owned(),
        external: Vec::new(),
    })
    .expect("build");

    let ids: Vec<&str> = bundle.modules.iter().map(|module| module.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().any(|id| id.ends_with("src/lib/greet.js")));
    assert!(ids.iter().any(|id| id.ends_with("node_modules/shout/es/index.js")));
    assert!(bundle.external_modules.is_empty());

    let code = bundle
        .generate(&GenerateOptions::default())
        .expect("generate")
        .code;
    assert_eq!(
        code,
        "function shout(text) { return text.toUpperCase(); }\n\n\
         function greet(name) { return 'hello ' + name; }\n\n\
         console.log(shout(greet('world')));"
    );
}

#[test]
fn test_listed_and_unknown_packages_stay_external() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();

    write(
        root,
        "main.js",
        "import _ from 'lodash';\nimport chalk from 'chalk';\nconsole.log(_, chalk);",
    );
    write(
        root,
        "node_modules/lodash/package.json",
        r#"{ "module": "lodash.js" }"#,
    );
    write(root, "node_modules/lodash/lodash.js", "export default {};");

    let mut bundle = rollup(BundleOptions {
        entry: root.join("main.js").to_string_lossy().into_owned(),
        external: vec!["lodash".into()],
    })
    .expect("build");

    let externals: Vec<&str> = bundle
        .external_modules
        .iter()
        .map(|external| external.id.as_str())
        .collect();
    assert_eq!(externals, vec!["lodash", "chalk"]);
    assert_eq!(bundle.modules.len(), 1);

    let code = bundle
        .generate(&GenerateOptions {
            format: "cjs".into(),
            ..GenerateOptions::default()
        })
        .expect("generate")
        .code;
    assert_eq!(
        code,
        "'use strict';\n\nvar _ = require('lodash');\n_ = 'default' in _ ? _['default'] : _;\n\
         var chalk = require('chalk');\nchalk = 'default' in chalk ? chalk['default'] : chalk;\n\n\
         console.log(_, chalk);"
    );
}

#[test]
fn test_missing_module_fails_to_load() {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();
    write(root, "main.js", "import { x } from './missing';\nconsole.log(x);");

    let err = rollup(BundleOptions {
        entry: root.join("main.js").to_string_lossy().into_owned(),
        external: Vec::new(),
    })
    .expect_err("missing module");
    let message = err.to_string();
    assert!(message.starts_with("could not load '"), "{message}");
    assert!(message.contains("missing.js"), "{message}");
}

use esroll::{
    Bundle, BundleOptions, GenerateOptions, error::BundleError, loader::MemoryModules,
};
use pretty_assertions::assert_eq;

fn build(modules: MemoryModules) -> Bundle {
    try_build(modules).expect("bundle should build")
}

fn try_build(modules: MemoryModules) -> Result<Bundle, BundleError> {
    let mut bundle = Bundle::new(
        BundleOptions {
            entry: "/main.js".into(),
            external: Vec::new(),
        },
        Box::new(modules.clone()),
        Box::new(modules),
    );
    bundle.build()?;
    Ok(bundle)
}

fn generate(modules: MemoryModules, options: &GenerateOptions) -> String {
    build(modules)
        .generate(options)
        .expect("bundle should generate")
        .code
}

fn format(format: &str) -> GenerateOptions {
    GenerateOptions {
        format: format.into(),
        ..GenerateOptions::default()
    }
}

#[test]
fn test_named_default_export_with_imported_helper() {
    let modules = MemoryModules::new()
        .with(
            "/main.js",
            "import { bar } from './bar';\nexport default function foo() { return bar(6, 7); }",
        )
        .with(
            "/bar.js",
            "export function bar(a, b) { return a * b; }\nexport var unused = 1;",
        );
    let options = GenerateOptions {
        exports: Some("named".into()),
        ..format("cjs")
    };

    let code = generate(modules, &options);
    assert_eq!(
        code,
        "'use strict';\n\nfunction bar(a, b) { return a * b; }\n\n\
         function foo() { return bar(6, 7); }\n\nexports['default'] = foo;"
    );
    assert!(!code.contains("unused"));
}

#[test]
fn test_live_variable_export_is_written_through_exports() {
    let modules = MemoryModules::new().with(
        "/main.js",
        "export let count = 0;\nexport function incr() { count++; }",
    );

    let code = generate(modules, &format("cjs"));
    assert_eq!(
        code,
        "'use strict';\n\nexports.count = 0;\nfunction incr() { exports.count++; }\n\n\
         exports.incr = incr;"
    );
}

#[test]
fn test_live_variable_export_stays_in_es_output() {
    let modules = MemoryModules::new().with(
        "/main.js",
        "export let count = 0;\nexport function incr() { count++; }",
    );

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(
        code,
        "let count = 0;\nfunction incr() { count++; }\n\nexport { count };\nexport { incr };"
    );
}

#[test]
fn test_conflicting_helpers_rename_the_farther_one() {
    let modules = MemoryModules::new()
        .with(
            "/main.js",
            "import { a } from './a';\nimport { b } from './b';\nconsole.log(a(), b());",
        )
        .with(
            "/a.js",
            "function helper() { return 1; }\nexport function a() { return helper(); }",
        )
        .with(
            "/b.js",
            "function helper() { return 2; }\nexport function b() { return helper(); }",
        );

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(
        code,
        "function _helper() { return 1; }\nfunction a() { return _helper(); }\n\n\
         function helper() { return 2; }\nfunction b() { return helper(); }\n\n\
         console.log(a(), b());"
    );
}

#[test]
fn test_single_module_round_trip() {
    let source = "var a = 1;\n\nfunction double(x) {\n\treturn x * 2;\n}\n\nconsole.log(double(a));";
    let modules = MemoryModules::new().with("/main.js", source);
    assert_eq!(generate(modules, &GenerateOptions::default()), source);
}

#[test]
fn test_unused_code_is_dropped() {
    let modules = MemoryModules::new()
        .with("/main.js", "import { used } from './lib';\nused();")
        .with(
            "/lib.js",
            "var counter = 0;\nexport function used() { return 1; }\n\
             export function unused() { return counter; }\ncounter += 1;",
        );

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(code, "function used() { return 1; }\n\nused();");
}

#[test]
fn test_local_shadowing_global_is_renamed() {
    let modules = MemoryModules::new()
        .with(
            "/main.js",
            "import { log } from './log';\nvar console = 'shadow';\nlog(console);",
        )
        .with("/log.js", "export function log(x) { console.log(x); }");

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(
        code,
        "function log(x) { console.log(x); }\n\nvar _console = 'shadow';\nlog(_console);"
    );
}

#[test]
fn test_iife_with_external_global() {
    let modules = MemoryModules::new().with(
        "/main.js",
        "import $ from 'jquery';\nexport default function init() { $('body'); }",
    );
    let mut options = GenerateOptions {
        module_name: Some("app".into()),
        ..format("iife")
    };
    options.globals.insert("jquery".into(), "jQuery".into());

    let code = generate(modules, &options);
    assert_eq!(
        code,
        "var app = (function ($) { 'use strict';\n\n\tfunction init() { $('body'); }\n\n\t\
         return init;\n\n})(jQuery);"
    );
}

#[test]
fn test_es_output_imports_externals() {
    let modules = MemoryModules::new().with(
        "/main.js",
        "import { join } from 'path';\nexport var file = join('a', 'b');",
    );

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(
        code,
        "import * as path from 'path';\n\nvar file = path.join('a', 'b');\n\nexport { file };"
    );
}

#[test]
fn test_cjs_interop_for_default_imports() {
    let modules = MemoryModules::new().with(
        "/main.js",
        "import fs from 'fs';\nexport default fs.readFileSync;",
    );

    let code = generate(modules, &format("cjs"));
    assert_eq!(
        code,
        "'use strict';\n\nvar fs = require('fs');\nfs = 'default' in fs ? fs['default'] : fs;\n\n\
         var main = fs.readFileSync;\n\nmodule.exports = main;"
    );
}

#[test]
fn test_namespace_object_does_not_share_a_name_with_its_module() {
    let modules = MemoryModules::new()
        .with(
            "/main.js",
            "import * as utils from './utils';\nconsole.log(utils.a);",
        )
        .with("/utils.js", "export var a = 1;\nexport var utils = 2;");

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(code.matches("var utils").count(), 1);
    assert_eq!(
        code,
        "var _utils = {\n\tget a () { return a; },\n\tget utils () { return utils; }\n};\n\n\
         var a = 1;\nvar utils = 2;\n\nconsole.log(_utils.a);"
    );
}

#[test]
fn test_namespace_object_clashing_with_another_module() {
    let modules = MemoryModules::new()
        .with(
            "/main.js",
            "import * as utils from './utils';\nimport { b } from './b';\nconsole.log(utils.a, b());",
        )
        .with("/utils.js", "export var a = 1;")
        .with("/b.js", "var utils = 3;\nexport function b() { return utils; }");

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(code.matches("var utils = ").count(), 1);
    assert!(code.starts_with("var _utils = {\n\tget a () { return a; }\n};"));
    assert!(code.contains("function b() { return utils; }"));
    assert!(code.ends_with("console.log(_utils.a, b());"));
}

#[test]
fn test_modified_default_export_is_snapshotted() {
    let modules = MemoryModules::new()
        .with("/main.js", "import v from './v';\nconsole.log(v);")
        .with("/v.js", "var foo = 1;\nexport default foo;\nfoo = 2;");

    let code = generate(modules, &GenerateOptions::default());
    assert_eq!(code, "var foo = 1;\nvar _v = foo;\nfoo = 2;\n\nconsole.log(_v);");
}

#[test]
fn test_default_export_modified_inside_function() {
    let modules = MemoryModules::new()
        .with("/main.js", "import v, { bump } from './v';\nbump();\nconsole.log(v);")
        .with(
            "/v.js",
            "var foo = 1;\nexport default foo;\nexport function bump() { foo += 1; }",
        );

    let code = generate(modules, &GenerateOptions::default());
    let snapshot = code.find("var _v = foo;").expect("default snapshot");
    let bump = code.find("function bump()").expect("bump");
    assert!(code.find("var foo = 1;").expect("declaration") < snapshot);
    assert!(snapshot < bump);
    assert!(code.ends_with("bump();\nconsole.log(_v);"));
}

#[test]
fn test_cyclic_imports_bundle_every_needed_function() {
    let modules = MemoryModules::new()
        .with("/main.js", "import { a } from './a';\nconsole.log(a());")
        .with("/a.js", "import { b } from './b';\nexport function a() { return b(); }")
        .with(
            "/b.js",
            "import { a } from './a';\nexport function b() { return 1; }\n\
             export function c() { return a(); }",
        );

    let code = generate(modules, &GenerateOptions::default());
    assert!(code.contains("function a() { return b(); }"));
    assert!(code.contains("function b() { return 1; }"));
    assert!(!code.contains("function c()"));
    assert!(code.ends_with("console.log(a());"));
}

#[test]
fn test_missing_export_fails_the_build() {
    let modules = MemoryModules::new()
        .with("/main.js", "import { nope } from './lib';\nnope();")
        .with("/lib.js", "export var yes = 1;");

    let err = try_build(modules).expect_err("missing export");
    assert!(matches!(err, BundleError::MissingExport { ref name, .. } if name == "nope"));
}

#[test]
fn test_export_mode_mismatch_is_reported() {
    let modules = MemoryModules::new().with("/main.js", "export var a = 1;");
    let options = GenerateOptions {
        exports: Some("default".into()),
        ..format("cjs")
    };

    let err = build(modules).generate(&options).expect_err("bad exports");
    assert!(matches!(err, BundleError::BadExports { .. }));
}

#[test]
fn test_source_map_lists_bundled_modules() {
    let modules = MemoryModules::new()
        .with("/main.js", "import { twice } from './math';\nconsole.log(twice(2));")
        .with("/math.js", "export function twice(x) {\n\treturn x * 2;\n}");
    let options = GenerateOptions {
        source_map: true,
        ..format("cjs")
    };

    let output = build(modules).generate(&options).expect("generate");
    let map = output.map.as_ref().expect("source map");
    assert_eq!(map.sources().collect::<Vec<_>>(), vec!["/math.js", "/main.js"]);

    // `'use strict';` and a blank line, then math.js without its `export `
    let token = map.lookup_token(2, 0).expect("token");
    assert_eq!(token.get_source(), Some("/math.js"));
    assert_eq!((token.get_src_line(), token.get_src_col()), (0, 7));

    let token = map.lookup_token(3, 1).expect("token");
    assert_eq!((token.get_src_line(), token.get_src_col()), (1, 0));
}

use std::{hint::black_box, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use esroll::{Bundle, BundleOptions, GenerateOptions, loader::MemoryModules};

/// A chain of `count` modules, each re-using the previous one and carrying a
/// clashing helper plus dead code for the tree shaker to drop
fn module_chain(count: usize) -> MemoryModules {
    let mut modules = MemoryModules::new();
    for index in 0..count {
        let import = if index + 1 < count {
            format!("import {{ step{} as next }} from './m{}';\n", index + 1, index + 1)
        } else {
            "var next = function (x) { return x; };\n".to_owned()
        };
        let source = format!(
            "{import}function helper(x) {{\n\treturn x + {index};\n}}\n\n\
             export function step{index}(x) {{\n\treturn next(helper(x));\n}}\n\n\
             export function unused{index}() {{\n\treturn helper({index});\n}}\n"
        );
        modules.insert(&format!("/m{index}.js"), &source);
    }
    modules.insert(
        "/main.js",
        "import { step0 } from './m0';\nexport default step0(1);\n",
    );
    modules
}

fn bundle(modules: &MemoryModules, format: &str) -> String {
    let mut bundle = Bundle::new(
        BundleOptions {
            entry: "/main.js".into(),
            external: Vec::new(),
        },
        Box::new(modules.clone()),
        Box::new(modules.clone()),
    );
    bundle.build().expect("build");
    bundle
        .generate(&GenerateOptions {
            format: format.into(),
            ..GenerateOptions::default()
        })
        .expect("generate")
        .code
}

fn benchmark_bundling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundling");
    group.measurement_time(Duration::from_secs(10));

    for count in [10, 50, 200] {
        let modules = module_chain(count);
        for format in ["es", "cjs"] {
            group.bench_with_input(
                BenchmarkId::new(format, count),
                &modules,
                |b, modules| b.iter(|| bundle(black_box(modules), format)),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_bundling);
criterion_main!(benches);

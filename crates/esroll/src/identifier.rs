//! Identifier legalisation and underscore-prefix deconfliction

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

/// Words that cannot be used as a binding name, plus globals we never shadow
static BLACKLISTED: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    let reserved = [
        "break", "case", "class", "catch", "const", "continue", "debugger", "default", "delete",
        "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
        "instanceof", "let", "new", "return", "super", "switch", "this", "throw", "try", "typeof",
        "var", "void", "while", "with", "yield", "enum", "await", "implements", "package",
        "protected", "static", "interface", "private", "public",
    ];
    let builtins = [
        "Infinity",
        "NaN",
        "undefined",
        "null",
        "true",
        "false",
        "eval",
        "uneval",
        "isFinite",
        "isNaN",
        "parseFloat",
        "parseInt",
        "decodeURI",
        "decodeURIComponent",
        "encodeURI",
        "encodeURIComponent",
        "escape",
        "unescape",
        "Object",
        "Function",
        "Boolean",
        "Symbol",
        "Error",
        "EvalError",
        "InternalError",
        "RangeError",
        "ReferenceError",
        "SyntaxError",
        "TypeError",
        "URIError",
        "Number",
        "Math",
        "Date",
        "String",
        "RegExp",
        "Array",
        "Int8Array",
        "Uint8Array",
        "Uint8ClampedArray",
        "Int16Array",
        "Uint16Array",
        "Int32Array",
        "Uint32Array",
        "Float32Array",
        "Float64Array",
        "Map",
        "Set",
        "WeakMap",
        "WeakSet",
        "SIMD",
        "ArrayBuffer",
        "DataView",
        "JSON",
        "Promise",
        "Generator",
        "GeneratorFunction",
        "Reflect",
        "Proxy",
        "Intl",
    ];
    reserved.into_iter().chain(builtins).collect()
});

static ILLEGAL_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^$_a-zA-Z0-9]").expect("constant pattern compiles"));

/// Turn an arbitrary string (usually a module path) into a valid identifier
///
/// Characters outside `[$_a-zA-Z0-9]` become `_`; a leading digit or a
/// blacklisted word gets a `_` prefix.
pub fn make_legal_identifier(name: &str) -> String {
    let mut legal = ILLEGAL_CHARACTERS.replace_all(name, "_").into_owned();

    let starts_with_digit = legal.chars().next().is_some_and(|c| c.is_ascii_digit());
    if legal.is_empty() || starts_with_digit || BLACKLISTED.contains(legal.as_str()) {
        legal.insert(0, '_');
    }

    legal
}

/// Prefix `name` with underscores until `taken` reports it free
pub fn deconflict(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = name.to_owned();
    while taken(&candidate) {
        candidate.insert(0, '_');
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_legal_identifier() {
        assert_eq!(make_legal_identifier("foo"), "foo");
        assert_eq!(make_legal_identifier("utils/string-helpers"), "utils_string_helpers");
        assert_eq!(make_legal_identifier("2d"), "_2d");
        assert_eq!(make_legal_identifier("default"), "_default");
        assert_eq!(make_legal_identifier("Math"), "_Math");
        assert_eq!(make_legal_identifier("$el"), "$el");
        assert_eq!(make_legal_identifier("café-ü"), "caf___");
    }

    #[test]
    fn test_deconflict_prefixes_until_free() {
        let taken = ["main", "_main"];
        assert_eq!(deconflict("main", |n| taken.contains(&n)), "__main");
        assert_eq!(deconflict("other", |n| taken.contains(&n)), "other");
    }
}

//! Code profile: imports and top-level definitions per language family.
//!
//! Pattern matching only: no grammar, no syntax tree. Coverage is the
//! shape of declarations a language family puts at the top level; anything
//! the patterns miss is simply absent from the graph. Unresolvable import
//! targets are recorded by their literal spelling.

use std::sync::LazyLock;

use regex::Regex;
use trellis_core::StructuralEntity;

use crate::StructuralOutput;

/// Language families the code profile understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageFamily {
    Python,
    Rust,
    JavaScript,
    Go,
}

impl LanguageFamily {
    /// Map a lowercase file extension to its family.
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" | "pyi" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            _ => None,
        }
    }
}

static PY_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+([\w.]+)").expect("py import regex"));
static PY_FROM_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").expect("py from regex"));
static PY_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+(\w+)").expect("py def regex"));
static PY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^class\s+(\w+)").expect("py class regex"));

static RS_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^use\s+((?:\w+::)*\w+)").expect("rs use regex"));
static RS_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)")
        .expect("rs fn regex")
});
static RS_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)").expect("rs type regex")
});

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\b[^'"]*['"]([^'"]+)['"]"#).expect("js import regex")
});
static JS_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("js require regex"));
static JS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)")
        .expect("js function regex")
});
static JS_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s+)?\(").expect("js arrow regex")
});
static JS_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:export\s+)?(?:default\s+)?class\s+(\w+)").expect("js class regex"));

static GO_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^import\s+(?:\w+\s+)?"([^"]+)""#).expect("go import regex"));
static GO_IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:\w+\s+)?"([^"]+)"\s*$"#).expect("go import line regex"));
static GO_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(\w+)").expect("go func regex"));
static GO_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^type\s+(\w+)\s+(?:struct|interface)\b").expect("go type regex")
});

/// Extract the code-profile structural bundle from decoded content.
///
/// Unknown extensions yield an empty bundle — the unit itself still indexes
/// for search; it just contributes no structural entities.
pub fn extract(extension: &str, content: &str) -> StructuralOutput {
    let mut output = StructuralOutput::default();
    let Some(family) = LanguageFamily::for_extension(extension) else {
        return output;
    };

    match family {
        LanguageFamily::Python => extract_python(content, &mut output),
        LanguageFamily::Rust => extract_rust(content, &mut output),
        LanguageFamily::JavaScript => extract_javascript(content, &mut output),
        LanguageFamily::Go => extract_go(content, &mut output),
    }
    output
}

fn extract_python(content: &str, output: &mut StructuralOutput) {
    for line in content.lines() {
        if let Some(cap) = PY_FROM_IMPORT.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = PY_IMPORT.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = PY_DEF.captures(line) {
            output.bundle.push(StructuralEntity::Function {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = PY_CLASS.captures(line) {
            output.bundle.push(StructuralEntity::Class {
                name: cap[1].to_string(),
            });
        }
    }
}

fn extract_rust(content: &str, output: &mut StructuralOutput) {
    for line in content.lines() {
        if let Some(cap) = RS_USE.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = RS_FN.captures(line) {
            output.bundle.push(StructuralEntity::Function {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = RS_TYPE.captures(line) {
            output.bundle.push(StructuralEntity::Class {
                name: cap[1].to_string(),
            });
        }
    }
}

fn extract_javascript(content: &str, output: &mut StructuralOutput) {
    for line in content.lines() {
        if let Some(cap) = JS_IMPORT.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        }
        if let Some(cap) = JS_REQUIRE.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        }
        if let Some(cap) = JS_FUNCTION.captures(line) {
            output.bundle.push(StructuralEntity::Function {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = JS_ARROW.captures(line) {
            output.bundle.push(StructuralEntity::Function {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = JS_CLASS.captures(line) {
            output.bundle.push(StructuralEntity::Class {
                name: cap[1].to_string(),
            });
        }
    }
}

fn extract_go(content: &str, output: &mut StructuralOutput) {
    let mut in_import_block = false;
    for line in content.lines() {
        if in_import_block {
            if line.trim_start().starts_with(')') {
                in_import_block = false;
            } else if let Some(cap) = GO_IMPORT_LINE.captures(line) {
                output.bundle.push(StructuralEntity::ImportedModule {
                    name: cap[1].to_string(),
                });
            }
            continue;
        }

        if line.trim_end() == "import (" || line.starts_with("import (") {
            in_import_block = true;
        } else if let Some(cap) = GO_IMPORT.captures(line) {
            output.bundle.push(StructuralEntity::ImportedModule {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = GO_FUNC.captures(line) {
            output.bundle.push(StructuralEntity::Function {
                name: cap[1].to_string(),
            });
        } else if let Some(cap) = GO_TYPE.captures(line) {
            output.bundle.push(StructuralEntity::Class {
                name: cap[1].to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::EdgeKind;

    fn names<'a>(output: &'a StructuralOutput, pick: fn(&'a StructuralEntity) -> Option<&'a str>) -> Vec<&'a str> {
        output.bundle.entities.iter().filter_map(pick).collect()
    }

    fn imports(output: &StructuralOutput) -> Vec<&str> {
        names(output, |e| match e {
            StructuralEntity::ImportedModule { name } => Some(name),
            _ => None,
        })
    }

    fn functions(output: &StructuralOutput) -> Vec<&str> {
        names(output, |e| match e {
            StructuralEntity::Function { name } => Some(name),
            _ => None,
        })
    }

    #[test]
    fn python_imports_and_definitions() {
        let src = "import pandas\nfrom os.path import join\n\ndef main():\n    pass\n\nclass Runner:\n    def helper(self):\n        pass\n";
        let output = extract("py", src);

        assert_eq!(imports(&output), vec!["pandas", "os.path"]);
        // Indented methods are not top-level definitions.
        assert_eq!(functions(&output), vec!["main"]);
        assert!(output
            .bundle
            .entities
            .iter()
            .any(|e| matches!(e, StructuralEntity::Class { name } if name == "Runner")));
    }

    #[test]
    fn repeated_import_collapses_to_one_entity() {
        let output = extract("py", "import pandas\nimport pandas\n");
        assert_eq!(imports(&output), vec!["pandas"]);
        assert_eq!(output.bundle.edges.len(), 1);
        assert_eq!(output.bundle.edges[0].kind, EdgeKind::Imports);
    }

    #[test]
    fn rust_use_fn_and_types() {
        let src = "use std::collections::HashMap;\nuse serde::Serialize;\n\npub async fn run() {}\nfn private_helper() {}\npub struct Widget;\nenum Mode {}\n";
        let output = extract("rs", src);

        assert_eq!(
            imports(&output),
            vec!["std::collections::HashMap", "serde::Serialize"]
        );
        assert_eq!(functions(&output), vec!["run", "private_helper"]);
    }

    #[test]
    fn javascript_imports_functions_and_classes() {
        let src = "import React from 'react';\nconst fs = require('fs');\n\nexport async function fetchAll() {}\nexport const handler = async (req) => {};\nexport default class Store {}\n";
        let output = extract("ts", src);

        assert_eq!(imports(&output), vec!["react", "fs"]);
        assert_eq!(functions(&output), vec!["fetchAll", "handler"]);
    }

    #[test]
    fn go_import_blocks_and_receiver_functions() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/sirupsen/logrus\"\n)\n\nfunc main() {}\nfunc (s *Server) Handle() {}\ntype Server struct {}\n";
        let output = extract("go", src);

        assert_eq!(imports(&output), vec!["fmt", "github.com/sirupsen/logrus"]);
        assert_eq!(functions(&output), vec!["main", "Handle"]);
    }

    #[test]
    fn unknown_extension_yields_empty_bundle() {
        let output = extract("toml", "[package]\nname = \"x\"\n");
        assert!(output.bundle.is_empty());
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn shared_import_keys_onto_one_node() {
        let a = extract("py", "import pandas\n\ndef main():\n    return 1\n");
        let b = extract("py", "import pandas\n");

        // Same import in both files keys onto the same node.
        let key_a = a.bundle.entities[0].key();
        let key_b = b.bundle.entities[0].key();
        assert_eq!(key_a, key_b);
        assert_eq!(functions(&a), vec!["main"]);
        assert!(functions(&b).is_empty());
    }
}

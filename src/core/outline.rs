// src/core/outline.rs
//! Source outlines: function signatures, imported modules and exported names.
//!
//! Two tiers produce the same [`SourceOutline`]. The structural tier parses with
//! tree-sitter and is used for every language it reports support for; the
//! heuristic tier matches regular expressions and accepts any language.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::error::{PatchwrightError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutline {
    /// Function name to its parameter-list text (without parentheses)
    pub functions: BTreeMap<String, String>,
    pub imports: BTreeSet<String>,
    pub exports: BTreeSet<String>,
}

impl SourceOutline {
    fn add_function(&mut self, name: &str, params: &str) {
        self.functions
            .entry(name.to_string())
            .or_insert_with(|| strip_parens(params).to_string());
    }
}

/// One way of outlining source text
pub trait OutlineExtractor {
    /// Whether this extractor can handle the given language tag
    fn supports(&self, language: &str) -> bool;

    /// Outline `source`; `None` means the extractor could not run
    fn outline(&self, source: &str, language: &str) -> Option<SourceOutline>;

    fn name(&self) -> &str;
}

/// Tree-sitter backed outlines for JavaScript
pub struct TreeSitterOutliner {
    language: Language,
}

impl TreeSitterOutliner {
    /// Fails when the grammar is incompatible with the linked tree-sitter runtime
    pub fn javascript() -> Result<Self> {
        let language = tree_sitter_javascript::language();
        Parser::new()
            .set_language(&language)
            .map_err(|e| PatchwrightError::Parser(format!("JavaScript grammar: {}", e)))?;
        Ok(Self { language })
    }

    fn visit(&self, root: Node, source: &[u8], outline: &mut SourceOutline) {
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => {
                    if let Some(module) = node.child_by_field_name("source") {
                        outline.imports.insert(string_literal(module, source));
                    }
                }
                "call_expression" => {
                    if let Some(module) = require_target(node, source) {
                        outline.imports.insert(module);
                    }
                }
                "export_statement" => self.collect_exports(node, source, outline),
                "function_declaration" | "generator_function_declaration" => {
                    if let (Some(name), Some(params)) = (
                        node.child_by_field_name("name"),
                        node.child_by_field_name("parameters"),
                    ) {
                        outline.add_function(text(name, source), text(params, source));
                    }
                }
                "variable_declarator" => {
                    let name = node.child_by_field_name("name").filter(|n| n.kind() == "identifier");
                    let value = node.child_by_field_name("value").filter(|v| {
                        matches!(
                            v.kind(),
                            "arrow_function" | "function_expression" | "function" | "generator_function"
                        )
                    });
                    if let (Some(name), Some(value)) = (name, value) {
                        let params = value
                            .child_by_field_name("parameters")
                            .or_else(|| value.child_by_field_name("parameter"))
                            .map(|p| text(p, source))
                            .unwrap_or_default();
                        outline.add_function(text(name, source), params);
                    }
                }
                _ => {}
            }

            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    fn collect_exports(&self, node: Node, source: &[u8], outline: &mut SourceOutline) {
        if let Some(declaration) = node.child_by_field_name("declaration") {
            match declaration.kind() {
                "lexical_declaration" | "variable_declaration" => {
                    let mut cursor = declaration.walk();
                    for declarator in declaration.named_children(&mut cursor) {
                        if let Some(name) = declarator
                            .child_by_field_name("name")
                            .filter(|n| n.kind() == "identifier")
                        {
                            outline.exports.insert(text(name, source).to_string());
                        }
                    }
                }
                _ => {
                    if let Some(name) = declaration.child_by_field_name("name") {
                        outline.exports.insert(text(name, source).to_string());
                    }
                }
            }
            return;
        }

        if node.child_by_field_name("value").is_some() {
            outline.exports.insert("default".to_string());
            return;
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for specifier in child.named_children(&mut clause_cursor) {
                let exported = specifier
                    .child_by_field_name("alias")
                    .or_else(|| specifier.child_by_field_name("name"));
                if let Some(exported) = exported {
                    outline.exports.insert(string_literal(exported, source));
                }
            }
        }
    }
}

impl OutlineExtractor for TreeSitterOutliner {
    fn supports(&self, language: &str) -> bool {
        language == "javascript"
    }

    fn outline(&self, source: &str, _language: &str) -> Option<SourceOutline> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&self.language) {
            debug!("tree-sitter grammar unavailable: {}", e);
            return None;
        }
        let tree = parser.parse(source, None)?;

        let mut outline = SourceOutline::default();
        self.visit(tree.root_node(), source.as_bytes(), &mut outline);
        Some(outline)
    }

    fn name(&self) -> &str {
        "tree-sitter"
    }
}

fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

fn string_literal(node: Node, source: &[u8]) -> String {
    text(node, source)
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
        .to_string()
}

fn require_target(node: Node, source: &[u8]) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    if function.kind() != "identifier" || text(function, source) != "require" {
        return None;
    }
    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next()?;
    (first.kind() == "string").then(|| string_literal(first, source))
}

fn strip_parens(params: &str) -> &str {
    let trimmed = params.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|p| p.strip_suffix(')'))
        .unwrap_or(trimmed)
        .trim()
}

/// Regular expressions for one family of languages
struct HeuristicRules {
    /// Group 1 is the name; the first other group that matched is the parameter text
    functions: Vec<Regex>,
    /// Group 1 is the module specifier
    imports: Vec<Regex>,
    /// Group 1 (or 2) is the exported name
    exports: Vec<Regex>,
    /// `export { a, b as c }` style lists
    export_lists: Option<Regex>,
    /// Anonymous default exports
    default_export: Option<Regex>,
}

impl HeuristicRules {
    fn script() -> Result<Self> {
        Ok(Self {
            functions: vec![
                Regex::new(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)")?,
                Regex::new(
                    r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\s*\*?\s*(?:[A-Za-z_$][\w$]*)?\s*\(([^)]*)\)|\(([^)]*)\)\s*(?::[^=]+)?=>|([A-Za-z_$][\w$]*)\s*=>)",
                )?,
            ],
            imports: vec![
                Regex::new(r#"\bimport\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s+)?['"]([^'"]+)['"]"#)?,
                Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#)?,
            ],
            exports: vec![Regex::new(
                r"\bexport\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
            )?],
            export_lists: Some(Regex::new(r"\bexport\s*(?:type\s*)?\{([^}]*)\}")?),
            default_export: Some(Regex::new(r"\bexport\s+default\b")?),
        })
    }

    fn python() -> Result<Self> {
        Ok(Self {
            functions: vec![Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)\)")?],
            imports: vec![
                Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\b")?,
                Regex::new(r"(?m)^\s*import\s+([\w.]+)")?,
            ],
            exports: vec![Regex::new(r"(?m)^(?:async\s+)?def\s+([A-Za-z]\w*)|^class\s+([A-Za-z]\w*)")?],
            export_lists: None,
            default_export: None,
        })
    }

    fn rust() -> Result<Self> {
        Ok(Self {
            functions: vec![Regex::new(r"\bfn\s+([A-Za-z_]\w*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)")?],
            imports: vec![Regex::new(r"(?m)^\s*(?:pub\s+)?use\s+([\w:]+)")?],
            exports: vec![Regex::new(
                r"\bpub\s+(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|const|static|type|mod)\s+([A-Za-z_]\w*)",
            )?],
            export_lists: None,
            default_export: None,
        })
    }

    fn outline(&self, source: &str) -> SourceOutline {
        let mut outline = SourceOutline::default();

        for regex in &self.functions {
            for caps in regex.captures_iter(source) {
                let Some(name) = caps.get(1) else { continue };
                let params = (2..caps.len())
                    .find_map(|i| caps.get(i))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                outline.add_function(name.as_str(), params);
            }
        }

        for regex in &self.imports {
            for caps in regex.captures_iter(source) {
                if let Some(module) = caps.get(1) {
                    outline
                        .imports
                        .insert(module.as_str().trim_end_matches(':').to_string());
                }
            }
        }

        let mut named_export_starts = HashSet::new();
        for regex in &self.exports {
            for caps in regex.captures_iter(source) {
                if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
                    outline.exports.insert(name.as_str().to_string());
                }
                if let Some(whole) = caps.get(0) {
                    named_export_starts.insert(whole.start());
                }
            }
        }

        if let Some(regex) = &self.export_lists {
            for caps in regex.captures_iter(source) {
                let Some(list) = caps.get(1) else { continue };
                for item in list.as_str().split(',') {
                    let item = item.trim().trim_start_matches("type ").trim();
                    let exported = item.rsplit(" as ").next().unwrap_or(item).trim();
                    if !exported.is_empty() {
                        outline.exports.insert(exported.to_string());
                    }
                }
            }
        }

        if let Some(regex) = &self.default_export {
            if regex
                .find_iter(source)
                .any(|m| !named_export_starts.contains(&m.start()))
            {
                outline.exports.insert("default".to_string());
            }
        }

        outline
    }
}

/// Regex outlines for any language
pub struct HeuristicOutliner {
    script: HeuristicRules,
    python: HeuristicRules,
    rust: HeuristicRules,
}

impl HeuristicOutliner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script: HeuristicRules::script()?,
            python: HeuristicRules::python()?,
            rust: HeuristicRules::rust()?,
        })
    }
}

impl OutlineExtractor for HeuristicOutliner {
    fn supports(&self, _language: &str) -> bool {
        true
    }

    fn outline(&self, source: &str, language: &str) -> Option<SourceOutline> {
        let rules = match language {
            "python" => &self.python,
            "rust" => &self.rust,
            _ => &self.script,
        };
        Some(rules.outline(source))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Picks the structural tier when it supports a language, the heuristic tier otherwise
pub struct OutlineStrategy {
    structural: Box<dyn OutlineExtractor>,
    heuristic: HeuristicOutliner,
}

impl OutlineStrategy {
    pub fn new() -> Result<Self> {
        Ok(Self {
            structural: Box::new(TreeSitterOutliner::javascript()?),
            heuristic: HeuristicOutliner::new()?,
        })
    }

    /// Name of the tier that would handle `language`
    pub fn tier_for(&self, language: &str) -> &str {
        if self.structural.supports(language) {
            self.structural.name()
        } else {
            self.heuristic.name()
        }
    }

    pub fn outline(&self, source: &str, language: &str) -> SourceOutline {
        if self.structural.supports(language) {
            if let Some(outline) = self.structural.outline(source, language) {
                return outline;
            }
            debug!("{} outline unavailable for {}, using heuristics", self.structural.name(), language);
        }
        self.heuristic.outline(source, language).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import React from 'react';
import { join } from "path";
const fs = require('fs');

export function render(props, state) {
  return null;
}

export const add = (a, b) => a + b;
const inc = x => x + 1;
export class Widget {}
function helper() {}
export { helper as util, inc };
"#;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_heuristic_script_outline() {
        let outline = HeuristicOutliner::new().unwrap().outline(SAMPLE, "typescript").unwrap();

        assert_eq!(names(&outline.imports), vec!["fs", "path", "react"]);
        assert_eq!(names(&outline.exports), vec!["Widget", "add", "inc", "render", "util"]);
        assert_eq!(outline.functions["render"], "props, state");
        assert_eq!(outline.functions["add"], "a, b");
        assert_eq!(outline.functions["inc"], "x");
        assert_eq!(outline.functions["helper"], "");
    }

    #[test]
    fn test_structural_outline_agrees_with_heuristic() {
        let structural = TreeSitterOutliner::javascript().unwrap().outline(SAMPLE, "javascript").unwrap();
        let heuristic = HeuristicOutliner::new().unwrap().outline(SAMPLE, "javascript").unwrap();

        assert_eq!(structural.imports, heuristic.imports);
        assert_eq!(structural.exports, heuristic.exports);
        assert_eq!(structural.functions, heuristic.functions);
    }

    #[test]
    fn test_anonymous_default_export() {
        let source = "export default function () {}\n";
        let heuristic = HeuristicOutliner::new().unwrap().outline(source, "javascript").unwrap();
        assert_eq!(names(&heuristic.exports), vec!["default"]);

        let structural = TreeSitterOutliner::javascript().unwrap().outline(source, "javascript").unwrap();
        assert_eq!(names(&structural.exports), vec!["default"]);
    }

    #[test]
    fn test_python_and_rust_rules() {
        let heuristic = HeuristicOutliner::new().unwrap();

        let py = heuristic
            .outline("import os\nfrom app.models import User\n\ndef load(user_id):\n    pass\n\ndef _private():\n    pass\n", "python")
            .unwrap();
        assert_eq!(names(&py.imports), vec!["app.models", "os"]);
        assert_eq!(names(&py.exports), vec!["load"]);
        assert_eq!(py.functions["load"], "user_id");

        let rs = heuristic
            .outline("use std::collections::HashMap;\npub fn run(x: u32) -> u32 { x }\nfn private() {}\n", "rust")
            .unwrap();
        assert_eq!(names(&rs.imports), vec!["std::collections::HashMap"]);
        assert_eq!(names(&rs.exports), vec!["run"]);
        assert_eq!(rs.functions["run"], "x: u32");
    }

    #[test]
    fn test_grammar_loads_into_parser() {
        let outliner = TreeSitterOutliner::javascript().unwrap();
        assert!(outliner.supports("javascript"));
        assert!(!outliner.supports("python"));

        let error = PatchwrightError::Parser("JavaScript grammar: version 99".to_string());
        assert_eq!(error.to_string(), "Parser error: JavaScript grammar: version 99");
    }

    #[test]
    fn test_strategy_selects_tier_by_capability() {
        let strategy = OutlineStrategy::new().unwrap();
        assert_eq!(strategy.tier_for("javascript"), "tree-sitter");
        assert_eq!(strategy.tier_for("typescript"), "heuristic");
        assert_eq!(strategy.tier_for("unknown"), "heuristic");
    }
}

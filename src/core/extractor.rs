use tree_sitter::{Node, Parser};

use crate::error::{DocsmithError, Result};

/// Kind of symbol surfaced by an extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Class,
}

/// One definition extracted from a source unit
#[derive(Debug, Clone)]
pub struct SymbolDefinition {
    /// Bare name of the definition
    pub name: String,

    /// Whether this is a function/method or a class
    pub kind: SymbolKind,

    /// Full source text of the definition
    pub body: String,

    /// Names of call expressions inside the definition body
    pub callee_names: Vec<String>,
}

/// Parses one source unit into definitions and their call expressions.
///
/// Extraction is applied to snapshots in isolation, so the same extractor
/// serves both graph construction (working tree) and change classification
/// (old/new revision contents).
pub trait SymbolExtractor: Send {
    fn extract_definitions(&mut self, source: &str) -> Result<Vec<SymbolDefinition>>;
}

/// Python symbol extractor using Tree-sitter
pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser
            .set_language(&python_language)
            .map_err(|e| DocsmithError::Parse(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }

    /// Recursively collect definitions from AST nodes
    fn extract_items(&self, node: Node, source: &str, definitions: &mut Vec<SymbolDefinition>) {
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match child.kind() {
                "function_definition" => {
                    if let Some(def) = self.parse_function(child, source) {
                        definitions.push(def);
                    }
                    // Nested defs get their own entries
                    self.extract_items(child, source, definitions);
                }
                "class_definition" => {
                    if let Some(def) = self.parse_class(child, source) {
                        definitions.push(def);
                    }
                    // Methods are surfaced as plain function definitions
                    self.extract_items(child, source, definitions);
                }
                _ => {
                    self.extract_items(child, source, definitions);
                }
            }
        }
    }

    fn parse_function(&self, node: Node, source: &str) -> Option<SymbolDefinition> {
        let name_node = node.child_by_field_name("name")?;
        let name = self.node_text(name_node, source);

        let mut callee_names = Vec::new();
        let mut seen = std::collections::HashSet::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, source, &mut callee_names, &mut seen);
        }

        Some(SymbolDefinition {
            name,
            kind: SymbolKind::Function,
            body: self.node_text(node, source),
            callee_names,
        })
    }

    fn parse_class(&self, node: Node, source: &str) -> Option<SymbolDefinition> {
        let name_node = node.child_by_field_name("name")?;

        Some(SymbolDefinition {
            name: self.node_text(name_node, source),
            kind: SymbolKind::Class,
            body: self.node_text(node, source),
            callee_names: Vec::new(),
        })
    }

    /// Collect call-expression names inside a definition body.
    ///
    /// Calls inside nested function definitions belong to the nested
    /// definition, not the enclosing one.
    fn collect_calls(
        &self,
        node: Node,
        source: &str,
        calls: &mut Vec<String>,
        seen: &mut std::collections::HashSet<String>,
    ) {
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            if child.kind() == "function_definition" {
                continue;
            }

            if child.kind() == "call" {
                if let Some(function_node) = child.child_by_field_name("function") {
                    let call_name = match function_node.kind() {
                        "identifier" => Some(self.node_text(function_node, source)),
                        // object.method(...) - keep the method name for
                        // bare-name resolution
                        "attribute" => function_node
                            .child_by_field_name("attribute")
                            .map(|n| self.node_text(n, source)),
                        _ => None,
                    };

                    if let Some(call_name) = call_name {
                        if seen.insert(call_name.clone()) {
                            calls.push(call_name);
                        }
                    }
                }
            }

            self.collect_calls(child, source, calls, seen);
        }
    }

    fn node_text(&self, node: Node, source: &str) -> String {
        source[node.byte_range()].to_string()
    }
}

impl SymbolExtractor for PythonExtractor {
    fn extract_definitions(&mut self, source: &str) -> Result<Vec<SymbolDefinition>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| DocsmithError::Parse("Failed to parse Python source".to_string()))?;

        let mut definitions = Vec::new();
        self.extract_items(tree.root_node(), source, &mut definitions);
        Ok(definitions)
    }
}

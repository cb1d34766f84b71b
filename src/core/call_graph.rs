use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DocsmithError, Result};
use super::extractor::{SymbolExtractor, SymbolKind};

/// Synthetic file grouping for call targets outside the project
pub const EXTERNAL_FILE: &str = "EXTERNAL";

/// Prefix for qualified names of unresolved call targets
pub const EXTERNAL_PREFIX: &str = "EXTERNAL::";

/// One function or method definition in the project, plus its outgoing calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    /// Unique name of the definition (bare name, or `EXTERNAL::<name>`)
    pub qualified_name: String,

    /// Root-relative source file, or `EXTERNAL` for unresolved targets
    pub file_name: String,

    /// Source text of the definition
    pub content: String,

    /// Qualified names this definition calls
    pub callees: BTreeSet<String>,

    /// True when the node stands in for a call that could not be resolved
    /// to a project definition
    pub is_external: bool,
}

/// Whole-project call graph, keyed by qualified name.
///
/// Built once per update pass and immutable while the pass runs; the next
/// pass rebuilds it wholesale, which is cheap next to artifact generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    nodes: BTreeMap<String, FunctionNode>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, qualified_name: &str) -> Option<&FunctionNode> {
        self.nodes.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.nodes.contains_key(qualified_name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FunctionNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, node: FunctionNode) {
        self.nodes.insert(node.qualified_name.clone(), node);
    }
}

/// Builds the call graph by walking all source files under a project root.
///
/// Call names are resolved against the set of all definitions project-wide
/// by bare name: an exact match wins, anything else degrades to an external
/// node. Bare-name resolution is a deliberate simplification - two
/// functions with the same name in different files collapse onto one node
/// rather than requiring full scope resolution.
pub struct GraphBuilder {
    extractor: Box<dyn SymbolExtractor>,
    exclude: Regex,
}

impl GraphBuilder {
    pub fn new(extractor: Box<dyn SymbolExtractor>, exclude_pattern: &str) -> Result<Self> {
        let exclude = Regex::new(exclude_pattern)
            .map_err(|e| DocsmithError::Config(format!("Invalid exclude pattern: {}", e)))?;

        Ok(Self { extractor, exclude })
    }

    /// Build the graph for every `.py` file under `project_root`.
    ///
    /// A file that fails to read or parse is skipped with a warning; it
    /// contributes no nodes but never aborts the build.
    pub fn build(&mut self, project_root: &Path) -> Result<CallGraph> {
        let files = self.collect_source_files(project_root);

        // Pass 1: extract definitions per file
        let mut extracted = Vec::new();
        for rel_path in &files {
            let abs_path = project_root.join(rel_path);
            let source = match std::fs::read_to_string(&abs_path) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", rel_path, e);
                    continue;
                }
            };

            match self.extractor.extract_definitions(&source) {
                Ok(definitions) => extracted.push((rel_path.clone(), definitions)),
                Err(e) => {
                    warn!("Skipping unparseable file {}: {}", rel_path, e);
                }
            }
        }

        let mut defined_names = BTreeSet::new();
        for (_, definitions) in &extracted {
            for def in definitions {
                if def.kind == SymbolKind::Function {
                    defined_names.insert(def.name.clone());
                }
            }
        }

        // Pass 2: create nodes and resolve call edges project-wide
        let mut graph = CallGraph::new();
        for (rel_path, definitions) in &extracted {
            for def in definitions {
                if def.kind != SymbolKind::Function {
                    continue;
                }

                if graph.contains(&def.name) {
                    // Bare-name collision: the first definition wins
                    warn!(
                        "Duplicate function name '{}' in {} collapses onto an existing node",
                        def.name, rel_path
                    );
                    continue;
                }

                let mut callees = BTreeSet::new();
                for call_name in &def.callee_names {
                    if defined_names.contains(call_name) {
                        callees.insert(call_name.clone());
                    } else {
                        let external_name = format!("{}{}", EXTERNAL_PREFIX, call_name);
                        if !graph.contains(&external_name) {
                            graph.insert(FunctionNode {
                                qualified_name: external_name.clone(),
                                file_name: EXTERNAL_FILE.to_string(),
                                content: String::new(),
                                callees: BTreeSet::new(),
                                is_external: true,
                            });
                        }
                        callees.insert(external_name);
                    }
                }

                graph.insert(FunctionNode {
                    qualified_name: def.name.clone(),
                    file_name: rel_path.clone(),
                    content: def.body.clone(),
                    callees,
                    is_external: false,
                });
            }
        }

        debug!("Call graph built: {} nodes from {} files", graph.len(), files.len());
        Ok(graph)
    }

    /// Walk the project tree, honoring gitignore and the exclude pattern.
    /// Paths come back root-relative with forward slashes, sorted so graph
    /// construction is deterministic.
    fn collect_source_files(&self, project_root: &Path) -> Vec<String> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(project_root)
            .hidden(false)
            .git_ignore(true)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }

            let rel_path = match path.strip_prefix(project_root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if self.exclude.is_match(&rel_path) {
                continue;
            }

            files.push(rel_path);
        }

        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::PythonExtractor;

    fn build_graph(files: &[(&str, &str)]) -> CallGraph {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }

        let extractor = Box::new(PythonExtractor::new().unwrap());
        let mut builder = GraphBuilder::new(extractor, r"(^|/)env(/|$)").unwrap();
        builder.build(dir.path()).unwrap()
    }

    #[test]
    fn resolves_cross_file_calls() {
        let graph = build_graph(&[
            ("a.py", "def helper():\n    return 1\n"),
            ("b.py", "def main():\n    return helper()\n"),
        ]);

        let main = graph.get("main").unwrap();
        assert_eq!(main.file_name, "b.py");
        assert!(main.callees.contains("helper"));
        assert!(!main.is_external);
    }

    #[test]
    fn unresolved_calls_become_external_nodes() {
        let graph = build_graph(&[("a.py", "def main():\n    print('hi')\n")]);

        let external = graph.get("EXTERNAL::print").unwrap();
        assert!(external.is_external);
        assert_eq!(external.file_name, EXTERNAL_FILE);

        let main = graph.get("main").unwrap();
        assert!(main.callees.contains("EXTERNAL::print"));
    }

    #[test]
    fn collision_collapses_onto_one_node() {
        // Deliberate bare-name approximation: same name in two files
        // yields a single node owned by the first file in sorted order.
        let graph = build_graph(&[
            ("a.py", "def shared():\n    return 'a'\n"),
            ("b.py", "def shared():\n    return 'b'\n"),
            ("c.py", "def caller():\n    return shared()\n"),
        ]);

        let shared = graph.get("shared").unwrap();
        assert_eq!(shared.file_name, "a.py");
        assert_eq!(
            graph.nodes().filter(|n| n.qualified_name == "shared").count(),
            1
        );
    }

    #[test]
    fn excluded_directories_contribute_no_nodes() {
        let graph = build_graph(&[
            ("a.py", "def kept():\n    pass\n"),
            ("env/skip.py", "def skipped():\n    pass\n"),
        ]);

        assert!(graph.contains("kept"));
        assert!(!graph.contains("skipped"));
    }

    #[test]
    fn unparseable_file_is_skipped_without_aborting() {
        // Empty source parses to zero definitions; binary-ish content
        // should not abort the build either.
        let graph = build_graph(&[
            ("ok.py", "def fine():\n    pass\n"),
            ("broken.py", "def broken(:\n"),
        ]);

        assert!(graph.contains("fine"));
    }
}

mod cache;
mod call_graph;
mod classifier;
mod engine;
mod extractor;
mod generator;
mod graph_queries;
mod orchestrator;
mod propagator;
mod vcs;

pub use cache::{fingerprint, CacheEntry, DocsCache};
pub use call_graph::{CallGraph, FunctionNode, GraphBuilder, EXTERNAL_FILE, EXTERNAL_PREFIX};
pub use classifier::{filter_changes, ChangeClassifier, ChangeKind, FunctionChange};
pub use extractor::{PythonExtractor, SymbolDefinition, SymbolExtractor, SymbolKind};
pub use generator::{ArtifactGenerator, GenerationContext, TemplateGenerator};
pub use graph_queries::{file_to_functions, parents_of, transitive_callees};
pub use orchestrator::{PassSettings, UpdateAction, UpdatePass, UpdateReport};
pub use propagator::propagate;
pub use vcs::{ChangeType, DiffSource, FileDiff, GitDiffSource};

// Export the main engine
pub use engine::Engine;

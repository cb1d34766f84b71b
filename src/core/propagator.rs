use std::collections::{BTreeMap, HashSet};

use super::call_graph::CallGraph;
use super::classifier::{filter_changes, FunctionChange};
use super::graph_queries::parents_of;

/// Map a file's classified changes to the other files whose artifacts
/// depend on them.
///
/// Only changes that actually require regeneration (see `filter_changes`)
/// are walked. The origin file is never part of the result; a change
/// nobody depends on yields an empty map.
pub fn propagate(
    graph: &CallGraph,
    changes: &[FunctionChange],
    origin_file: &str,
) -> BTreeMap<String, Vec<String>> {
    let changed_names: HashSet<String> = filter_changes(changes).into_iter().collect();

    if changed_names.is_empty() {
        return BTreeMap::new();
    }

    parents_of(graph, &changed_names, origin_file)
}

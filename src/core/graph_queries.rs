use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use super::call_graph::{CallGraph, EXTERNAL_FILE};

/// Group all nodes by their source file.
///
/// External nodes are grouped under `EXTERNAL` regardless of which call
/// site produced them.
pub fn file_to_functions(graph: &CallGraph) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for node in graph.nodes() {
        let key = if node.is_external {
            EXTERNAL_FILE.to_string()
        } else {
            node.file_name.clone()
        };
        map.entry(key).or_default().push(node.qualified_name.clone());
    }

    map
}

/// Breadth-first expansion of every node's callees up to `max_depth` hops.
///
/// A visited set per traversal makes mutually recursive functions safe;
/// `max_depth = 0` yields only direct callees with no further expansion.
pub fn transitive_callees(graph: &CallGraph, max_depth: usize) -> HashMap<String, BTreeSet<String>> {
    let mut result = HashMap::new();

    for node in graph.nodes() {
        let mut reached = BTreeSet::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(node.qualified_name.as_str());

        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        for callee in &node.callees {
            queue.push_back((callee.as_str(), 0));
        }

        while let Some((name, depth)) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            reached.insert(name.to_string());

            if depth >= max_depth {
                continue;
            }
            if let Some(next) = graph.get(name) {
                for callee in &next.callees {
                    queue.push_back((callee.as_str(), depth + 1));
                }
            }
        }

        result.insert(node.qualified_name.clone(), reached);
    }

    result
}

/// Reverse-edge lookup: every node in *another* file whose callees
/// intersect `changed_names`, grouped by that node's file.
///
/// This is the propagation primitive - the nodes returned are the parent
/// functions whose documentation depends on the changed ones.
pub fn parents_of(
    graph: &CallGraph,
    changed_names: &HashSet<String>,
    origin_file: &str,
) -> BTreeMap<String, Vec<String>> {
    let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for node in graph.nodes() {
        if node.is_external || node.file_name == origin_file {
            continue;
        }
        if node.callees.iter().any(|c| changed_names.contains(c)) {
            parents
                .entry(node.file_name.clone())
                .or_default()
                .push(node.qualified_name.clone());
        }
    }

    parents
}

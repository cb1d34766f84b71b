//! End-to-end update pass scenarios against an in-memory repository and a
//! recording artifact generator.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use docsmith::core::{
    ArtifactGenerator, ChangeClassifier, ChangeType, DiffSource, DocsCache, FileDiff,
    GenerationContext, GraphBuilder, PassSettings, PythonExtractor, UpdatePass, UpdateReport,
};
use docsmith::error::{DocsmithError, Result};

/// Branch -> revision and revision -> file tree, all in memory
struct InMemoryDiffSource {
    branches: HashMap<String, String>,
    snapshots: HashMap<String, BTreeMap<String, String>>,
}

impl InMemoryDiffSource {
    fn new() -> Self {
        Self {
            branches: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    fn commit(&mut self, branch: &str, rev: &str, files: &[(&str, &str)]) {
        self.branches.insert(branch.to_string(), rev.to_string());
        self.snapshots.insert(
            rev.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    fn snapshot(&self, rev: &str) -> Result<&BTreeMap<String, String>> {
        self.snapshots
            .get(rev)
            .ok_or_else(|| DocsmithError::VersionControl(format!("unknown revision {}", rev)))
    }
}

impl DiffSource for InMemoryDiffSource {
    fn latest_commit(&self, branch: &str) -> Result<String> {
        self.branches
            .get(branch)
            .cloned()
            .ok_or_else(|| DocsmithError::VersionControl(format!("unknown branch {}", branch)))
    }

    fn diff(&self, revision_a: &str, revision_b: &str) -> Result<Vec<FileDiff>> {
        let old = self.snapshot(revision_a)?;
        let new = self.snapshot(revision_b)?;

        let mut diffs = Vec::new();
        for (path, content) in new {
            match old.get(path) {
                None => diffs.push(FileDiff {
                    path: path.clone(),
                    change_type: ChangeType::Added,
                }),
                Some(old_content) if old_content != content => diffs.push(FileDiff {
                    path: path.clone(),
                    change_type: ChangeType::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in old.keys() {
            if !new.contains_key(path) {
                diffs.push(FileDiff {
                    path: path.clone(),
                    change_type: ChangeType::Deleted,
                });
            }
        }
        Ok(diffs)
    }

    fn file_content_at(&self, path: &str, revision: &str) -> Result<String> {
        Ok(self
            .snapshot(revision)?
            .get(path)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records every generation call; can be told to fail for chosen paths
#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<(String, GenerationContext)>>,
    fail_paths: Mutex<HashSet<String>>,
}

impl RecordingGenerator {
    fn fail_for(&self, path: &str) {
        self.fail_paths.lock().unwrap().insert(path.to_string());
    }

    fn succeed_for(&self, path: &str) {
        self.fail_paths.lock().unwrap().remove(path);
    }

    fn calls_for(&self, path: &str) -> Vec<GenerationContext> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, ctx)| ctx.clone())
            .collect()
    }
}

#[async_trait]
impl ArtifactGenerator for RecordingGenerator {
    async fn generate(
        &self,
        file_path: &str,
        content: &str,
        context: &GenerationContext,
    ) -> Result<String> {
        if self.fail_paths.lock().unwrap().contains(file_path) {
            return Err(DocsmithError::Generation(format!(
                "simulated failure for {}",
                file_path
            )));
        }
        self.calls
            .lock()
            .unwrap()
            .push((file_path.to_string(), context.clone()));
        Ok(format!("# docs for {}\n\n{} bytes\n", file_path, content.len()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Materialize one snapshot as the working tree the graph is built from
fn materialize(tree: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = tree.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

async fn run_pass(
    tree: &Path,
    docs: &Path,
    source: &InMemoryDiffSource,
    generator: &RecordingGenerator,
    cache: &mut DocsCache,
) -> Result<UpdateReport> {
    let mut builder =
        GraphBuilder::new(Box::new(PythonExtractor::new().unwrap()), r"(^|/)env(/|$)").unwrap();
    let mut classifier =
        ChangeClassifier::new(Box::new(PythonExtractor::new().unwrap()), 0.75);
    let settings = PassSettings {
        project_root: tree.to_path_buf(),
        docs_dir: docs.to_path_buf(),
        max_depth: 5,
    };
    let mut pass = UpdatePass::new(
        &mut builder,
        &mut classifier,
        cache,
        source,
        generator,
        settings,
    );
    pass.run("main", "feature", false).await
}

const HELPER_V1: &str = "def helper():\n    return 1\n";
const HELPER_V2: &str = "def helper():\n    return 2\n";
const MAIN_PY: &str = "def main():\n    return helper()\n";

#[tokio::test]
async fn modified_callee_cascades_into_its_caller() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[("a.py", HELPER_V1), ("b.py", MAIN_PY)]);
    source.commit("feature", "rev1", &[("a.py", HELPER_V2), ("b.py", MAIN_PY)]);
    materialize(&tree, &[("a.py", HELPER_V2), ("b.py", MAIN_PY)]);

    // Both files already documented at rev0
    let mut cache = DocsCache::new();
    cache.add("a.py", HELPER_V1, &docs.join("a.py.md"));
    cache.add("b.py", MAIN_PY, &docs.join("b.py.md"));

    let generator = RecordingGenerator::default();
    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["a.py"]);
    // b.py regenerates even though its own text never changed
    assert_eq!(report.cascaded, vec!["b.py"]);
    assert!(report.failed.is_empty());

    let cascade_calls = generator.calls_for("b.py");
    assert_eq!(cascade_calls.len(), 1);
    assert_eq!(cascade_calls[0].affected_functions, vec!["main"]);

    // Both artifacts landed under the docs dir
    assert!(docs.join("a.py.md").exists());
    assert!(docs.join("b.py.md").exists());

    // Fingerprints moved forward so the next pass can skip
    assert!(cache.is_fresh("a.py", HELPER_V2));
    assert!(cache.is_fresh("b.py", MAIN_PY));
}

#[tokio::test]
async fn second_pass_with_no_new_changes_is_all_skips() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[("a.py", HELPER_V1), ("b.py", MAIN_PY)]);
    source.commit("feature", "rev1", &[("a.py", HELPER_V2), ("b.py", MAIN_PY)]);
    materialize(&tree, &[("a.py", HELPER_V2), ("b.py", MAIN_PY)]);

    let mut cache = DocsCache::new();
    cache.add("a.py", HELPER_V1, &docs.join("a.py.md"));
    cache.add("b.py", MAIN_PY, &docs.join("b.py.md"));

    let generator = RecordingGenerator::default();
    run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();
    let second = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(second.skipped, vec!["a.py"]);
    assert!(second.is_noop());
    // No extra generation work happened on the second pass
    assert_eq!(generator.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn added_file_creates_an_artifact_and_cache_entry() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[]);
    source.commit("feature", "rev1", &[("a.py", HELPER_V1)]);
    materialize(&tree, &[("a.py", HELPER_V1)]);

    let mut cache = DocsCache::new();
    let generator = RecordingGenerator::default();
    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(report.created, vec!["a.py"]);
    assert!(cache.get("a.py").is_some());
    assert!(docs.join("a.py.md").exists());
}

#[tokio::test]
async fn deleted_file_drops_artifact_and_cache_entry() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[("a.py", HELPER_V1)]);
    source.commit("feature", "rev1", &[]);
    materialize(&tree, &[]);
    std::fs::create_dir_all(&tree).unwrap();

    let artifact = docs.join("a.py.md");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(&artifact, "# docs for a.py\n").unwrap();

    let mut cache = DocsCache::new();
    cache.add("a.py", HELPER_V1, &artifact);

    let generator = RecordingGenerator::default();
    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(report.deleted, vec!["a.py"]);
    assert!(cache.get("a.py").is_none());
    assert!(!artifact.exists());
}

#[tokio::test]
async fn generation_failure_leaves_that_file_stale_for_the_next_pass() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let a_v2 = "def alpha():\n    return 2\n";
    let c_v2 = "def gamma():\n    return 2\n";
    let mut source = InMemoryDiffSource::new();
    source.commit(
        "main",
        "rev0",
        &[("a.py", "def alpha():\n    return 1\n"), ("c.py", "def gamma():\n    return 1\n")],
    );
    source.commit("feature", "rev1", &[("a.py", a_v2), ("c.py", c_v2)]);
    materialize(&tree, &[("a.py", a_v2), ("c.py", c_v2)]);

    let mut cache = DocsCache::new();
    cache.add("a.py", "def alpha():\n    return 1\n", &docs.join("a.py.md"));
    cache.add("c.py", "def gamma():\n    return 1\n", &docs.join("c.py.md"));

    let generator = RecordingGenerator::default();
    generator.fail_for("c.py");

    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["a.py"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "c.py");

    // a.py's progress was persisted immediately; c.py stayed stale
    let persisted = DocsCache::load(&docs.join("cache.json")).unwrap();
    assert!(persisted.is_fresh("a.py", a_v2));
    assert!(!persisted.is_fresh("c.py", c_v2));

    // The retry pass skips a.py and picks c.py back up
    generator.succeed_for("c.py");
    let retry = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();
    assert_eq!(retry.skipped, vec!["a.py"]);
    assert_eq!(retry.updated, vec!["c.py"]);
    assert!(cache.is_fresh("c.py", c_v2));
}

#[tokio::test]
async fn empty_diff_is_a_successful_noop() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[("a.py", HELPER_V1)]);
    source.commit("feature", "rev1", &[("a.py", HELPER_V1)]);
    materialize(&tree, &[("a.py", HELPER_V1)]);

    let mut cache = DocsCache::new();
    let generator = RecordingGenerator::default();
    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert!(report.is_noop());
    assert!(generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sibling_changes_coalesce_the_shared_parent_cascade() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("repo");
    let docs = dir.path().join("docs");

    // main() calls both helpers; changing both must regenerate b.py once
    let a_v1 = "def helper_one():\n    return 1\n\ndef helper_two():\n    return 1\n";
    let a_v2 = "def helper_one():\n    return 2\n\ndef helper_two():\n    return 2\n";
    let b = "def main():\n    return helper_one() + helper_two()\n";

    let mut source = InMemoryDiffSource::new();
    source.commit("main", "rev0", &[("a.py", a_v1), ("b.py", b)]);
    source.commit("feature", "rev1", &[("a.py", a_v2), ("b.py", b)]);
    materialize(&tree, &[("a.py", a_v2), ("b.py", b)]);

    let mut cache = DocsCache::new();
    cache.add("a.py", a_v1, &docs.join("a.py.md"));
    cache.add("b.py", b, &docs.join("b.py.md"));

    let generator = RecordingGenerator::default();
    let report = run_pass(&tree, &docs, &source, &generator, &mut cache)
        .await
        .unwrap();

    assert_eq!(report.cascaded, vec!["b.py"]);
    assert_eq!(generator.calls_for("b.py").len(), 1);
}

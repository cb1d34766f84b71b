use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::Result;
use super::cache::DocsCache;
use super::call_graph::{CallGraph, GraphBuilder};
use super::classifier::{filter_changes, ChangeClassifier, FunctionChange};
use super::generator::{ArtifactGenerator, GenerationContext};
use super::graph_queries::{parents_of, transitive_callees};
use super::propagator::propagate;
use super::vcs::{ChangeType, DiffSource, FileDiff};

/// What the orchestrator decided to do with one changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Fingerprint matches the cached artifact, nothing to do
    Skip,
    /// No artifact yet, generate one from scratch
    Create,
    /// Source changed since the last artifact, regenerate
    Update,
    /// Source and artifact are gone
    Delete,
    /// File-level renames are deliberately left alone; the next content
    /// change regenerates from scratch as a cache miss
    Ignore,
}

/// Outcome of one update pass, for the end-of-pass summary
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub deleted: Vec<String>,
    pub cascaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl UpdateReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.cascaded.is_empty()
            && self.failed.is_empty()
    }

    pub fn log_summary(&self) {
        info!(
            "Pass complete: {} created, {} updated, {} cascaded, {} deleted, {} skipped",
            self.created.len(),
            self.updated.len(),
            self.cascaded.len(),
            self.deleted.len(),
            self.skipped.len()
        );
        for (path, reason) in &self.failed {
            warn!("Failed: {} ({})", path, reason);
        }
    }
}

/// Tunables for a single pass
#[derive(Debug, Clone)]
pub struct PassSettings {
    /// Working tree the call graph is built from
    pub project_root: PathBuf,

    /// Where artifacts and the cache file live
    pub docs_dir: PathBuf,

    /// Hop bound for transitive callee context
    pub max_depth: usize,
}

impl PassSettings {
    pub fn cache_path(&self) -> PathBuf {
        self.docs_dir.join("cache.json")
    }
}

/// A changed file with everything needed to process it
struct PendingFile {
    diff: FileDiff,
    new_content: String,
    changes: Vec<FunctionChange>,
    parent_count: usize,
}

/// Executes one incremental update pass.
///
/// The pass owns the cache mutably for its duration; the graph is built
/// once from the working tree and read-only afterwards. Per-file failures
/// are contained here and never escape the loop; only version-control
/// failures abort the pass, and they do so before any cache mutation.
pub struct UpdatePass<'a> {
    graph_builder: &'a mut GraphBuilder,
    classifier: &'a mut ChangeClassifier,
    cache: &'a mut DocsCache,
    diff_source: &'a dyn DiffSource,
    generator: &'a dyn ArtifactGenerator,
    settings: PassSettings,
}

impl<'a> UpdatePass<'a> {
    pub fn new(
        graph_builder: &'a mut GraphBuilder,
        classifier: &'a mut ChangeClassifier,
        cache: &'a mut DocsCache,
        diff_source: &'a dyn DiffSource,
        generator: &'a dyn ArtifactGenerator,
        settings: PassSettings,
    ) -> Self {
        Self {
            graph_builder,
            classifier,
            cache,
            diff_source,
            generator,
            settings,
        }
    }

    pub async fn run(
        &mut self,
        base_branch: &str,
        branch: &str,
        dry_run: bool,
    ) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();

        // Version-control access is fatal on failure, and happens before
        // any mutation
        let base_rev = self.diff_source.latest_commit(base_branch)?;
        let head_rev = self.diff_source.latest_commit(branch)?;
        let diffs = self.diff_source.diff(&base_rev, &head_rev)?;

        if diffs.is_empty() {
            info!(
                "No source changes found between {} and {}",
                base_branch, branch
            );
            return Ok(report);
        }
        info!(
            "Found {} changed files between {} and {}",
            diffs.len(),
            base_branch,
            branch
        );

        // Graph construction is deferred until we know there is work
        let graph = self.graph_builder.build(&self.settings.project_root)?;
        let callee_map = transitive_callees(&graph, self.settings.max_depth);
        if !dry_run {
            self.save_graph_snapshot(&graph)?;
        }

        // Classify every changed file up front so files can be ordered
        // leaves-first: fewer dependents processed earlier, so cascades
        // triggered by children finish before their parents regenerate
        let mut pending = Vec::new();
        for diff in diffs {
            let old_content = self.diff_source.file_content_at(&diff.path, &base_rev)?;
            let new_content = self.diff_source.file_content_at(&diff.path, &head_rev)?;

            let changes = match self.classifier.classify(&diff.path, &old_content, &new_content) {
                Ok(changes) => changes,
                Err(e) => {
                    warn!("Skipping {}: classification failed: {}", diff.path, e);
                    report.failed.push((diff.path.clone(), e.to_string()));
                    continue;
                }
            };

            let parent_count = propagate(&graph, &changes, &diff.path).len();
            pending.push(PendingFile {
                diff,
                new_content,
                changes,
                parent_count,
            });
        }
        pending.sort_by(|a, b| {
            a.parent_count
                .cmp(&b.parent_count)
                .then_with(|| a.diff.path.cmp(&b.diff.path))
        });

        let mut regenerated: HashSet<String> = HashSet::new();
        for file in &pending {
            let action = self.decide(&file.diff, &file.new_content);
            debug!("{}: {:?}", file.diff.path, action);

            if dry_run {
                self.record_plan(file, action, &graph, &mut report);
                continue;
            }

            match action {
                UpdateAction::Skip => {
                    info!(
                        "Skipping {}: not modified since last update",
                        file.diff.path
                    );
                    report.skipped.push(file.diff.path.clone());
                }
                UpdateAction::Ignore => {
                    warn!("{} was renamed; renames are left alone", file.diff.path);
                    report.skipped.push(file.diff.path.clone());
                }
                UpdateAction::Delete => {
                    self.delete_artifact(&file.diff.path)?;
                    report.deleted.push(file.diff.path.clone());
                }
                UpdateAction::Create => {
                    let context = self.build_context(&file.diff.path, &graph, &callee_map, file);
                    match self
                        .regenerate(&file.diff.path, &file.new_content, &context)
                        .await
                    {
                        Ok(()) => {
                            regenerated.insert(file.diff.path.clone());
                            report.created.push(file.diff.path.clone());
                        }
                        Err(e) => {
                            warn!("Generation failed for {}: {}", file.diff.path, e);
                            report.failed.push((file.diff.path.clone(), e.to_string()));
                        }
                    }
                }
                UpdateAction::Update => {
                    let context = self.build_context(&file.diff.path, &graph, &callee_map, file);
                    match self
                        .regenerate(&file.diff.path, &file.new_content, &context)
                        .await
                    {
                        Ok(()) => {
                            regenerated.insert(file.diff.path.clone());
                            report.updated.push(file.diff.path.clone());
                            self.cascade(
                                &file.diff.path,
                                &file.changes,
                                &graph,
                                &callee_map,
                                &head_rev,
                                &mut regenerated,
                                &mut report,
                            )
                            .await?;
                        }
                        Err(e) => {
                            warn!("Generation failed for {}: {}", file.diff.path, e);
                            report.failed.push((file.diff.path.clone(), e.to_string()));
                        }
                    }
                }
            }
        }

        if !dry_run {
            self.cache.save(&self.settings.cache_path())?;
        }
        Ok(report)
    }

    /// The decision table: version-control change type plus cache state
    fn decide(&self, diff: &FileDiff, new_content: &str) -> UpdateAction {
        match diff.change_type {
            ChangeType::Added => UpdateAction::Create,
            ChangeType::Deleted => UpdateAction::Delete,
            _ => match self.cache.get(&diff.path) {
                None => UpdateAction::Create,
                Some(_) if self.cache.is_fresh(&diff.path, new_content) => UpdateAction::Skip,
                Some(_) => match diff.change_type {
                    ChangeType::Modified => UpdateAction::Update,
                    ChangeType::Renamed => UpdateAction::Ignore,
                    _ => UpdateAction::Skip,
                },
            },
        }
    }

    /// Regenerate the artifact for one file and record it in the cache.
    /// The cache is persisted immediately so a crash mid-pass loses at
    /// most one file's progress.
    async fn regenerate(
        &mut self,
        path: &str,
        content: &str,
        context: &GenerationContext,
    ) -> Result<()> {
        let artifact = self.generator.generate(path, content, context).await?;
        let artifact_path = self.write_artifact(path, &artifact)?;

        if self.cache.get(path).is_some() {
            self.cache.update(path, content, &artifact_path)?;
        } else {
            self.cache.add(path, content, &artifact_path);
        }
        self.cache.save(&self.settings.cache_path())?;

        info!("Regenerated artifact for {}", path);
        Ok(())
    }

    /// Walk reverse dependencies of the changed functions and regenerate
    /// every dependent file, breadth-first. Each file regenerates at most
    /// once per pass, which both coalesces sibling cascades and breaks
    /// dependency cycles.
    async fn cascade(
        &mut self,
        origin: &str,
        changes: &[FunctionChange],
        graph: &CallGraph,
        callee_map: &std::collections::HashMap<String, BTreeSet<String>>,
        head_rev: &str,
        regenerated: &mut HashSet<String>,
        report: &mut UpdateReport,
    ) -> Result<()> {
        let mut queue: VecDeque<(String, HashSet<String>)> = VecDeque::new();
        queue.push_back((
            origin.to_string(),
            filter_changes(changes).into_iter().collect(),
        ));

        while let Some((file, changed_names)) = queue.pop_front() {
            if changed_names.is_empty() {
                continue;
            }

            for (parent_file, affected) in parents_of(graph, &changed_names, &file) {
                if regenerated.contains(&parent_file) {
                    continue;
                }
                regenerated.insert(parent_file.clone());

                let content = self.diff_source.file_content_at(&parent_file, head_rev)?;
                let mut context = self.related_context(&parent_file, graph, callee_map);
                context.affected_functions = affected.clone();
                context.previous_artifact = self.previous_artifact(&parent_file);

                match self.regenerate(&parent_file, &content, &context).await {
                    Ok(()) => {
                        info!(
                            "Cascaded regeneration into {} (affected: {})",
                            parent_file,
                            affected.join(", ")
                        );
                        report.cascaded.push(parent_file.clone());
                        queue.push_back((parent_file, affected.into_iter().collect()));
                    }
                    Err(e) => {
                        warn!("Cascade generation failed for {}: {}", parent_file, e);
                        report.failed.push((parent_file, e.to_string()));
                    }
                }
            }
        }

        Ok(())
    }

    /// Dry run: record what would happen without generating or mutating
    fn record_plan(
        &self,
        file: &PendingFile,
        action: UpdateAction,
        graph: &CallGraph,
        report: &mut UpdateReport,
    ) {
        let path = file.diff.path.clone();
        match action {
            UpdateAction::Create => {
                info!("Would create artifact for {}", path);
                report.created.push(path);
            }
            UpdateAction::Update => {
                info!("Would update artifact for {}", path);
                for parent_file in propagate(graph, &file.changes, &path).keys() {
                    info!("Would cascade into {}", parent_file);
                    report.cascaded.push(parent_file.clone());
                }
                report.updated.push(path);
            }
            UpdateAction::Delete => {
                info!("Would delete artifact for {}", path);
                report.deleted.push(path);
            }
            UpdateAction::Skip | UpdateAction::Ignore => {
                report.skipped.push(path);
            }
        }
    }

    /// Generation context for a directly-changed file
    fn build_context(
        &self,
        path: &str,
        graph: &CallGraph,
        callee_map: &std::collections::HashMap<String, BTreeSet<String>>,
        file: &PendingFile,
    ) -> GenerationContext {
        let mut context = self.related_context(path, graph, callee_map);
        context.changed_functions = filter_changes(&file.changes);
        context.previous_artifact = self.previous_artifact(path);
        context
    }

    /// Function -> transitive-callee map for every function in the file
    fn related_context(
        &self,
        path: &str,
        graph: &CallGraph,
        callee_map: &std::collections::HashMap<String, BTreeSet<String>>,
    ) -> GenerationContext {
        let mut context = GenerationContext::default();
        for node in graph.nodes() {
            if node.file_name == path {
                let callees = callee_map
                    .get(&node.qualified_name)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default();
                context
                    .related_functions
                    .insert(node.qualified_name.clone(), callees);
            }
        }
        context
    }

    fn previous_artifact(&self, path: &str) -> Option<String> {
        let entry = self.cache.get(path)?;
        std::fs::read_to_string(&entry.artifact_path).ok()
    }

    /// Artifacts mirror the source layout under the docs dir
    fn artifact_path(&self, source_path: &str) -> PathBuf {
        self.settings.docs_dir.join(format!("{}.md", source_path))
    }

    fn write_artifact(&self, source_path: &str, artifact: &str) -> Result<PathBuf> {
        let path = self.artifact_path(source_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, artifact)?;
        Ok(path)
    }

    fn delete_artifact(&mut self, source_path: &str) -> Result<()> {
        if let Some(entry) = self.cache.remove(source_path) {
            match std::fs::remove_file(&entry.artifact_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.cache.save(&self.settings.cache_path())?;
        info!("Deleted artifact for {}", source_path);
        Ok(())
    }

    /// Keep the latest graph next to the artifacts for inspection and
    /// visualization tooling
    fn save_graph_snapshot(&self, graph: &CallGraph) -> Result<()> {
        std::fs::create_dir_all(&self.settings.docs_dir)?;
        let path = self.settings.docs_dir.join("call_graph.json");
        let content = serde_json::to_string_pretty(graph)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

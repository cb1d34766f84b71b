use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use super::cache::DocsCache;
use super::call_graph::GraphBuilder;
use super::classifier::ChangeClassifier;
use super::extractor::PythonExtractor;
use super::generator::TemplateGenerator;
use super::orchestrator::{PassSettings, UpdatePass};
use super::vcs::GitDiffSource;

/// CLI-facing engine: wires configuration into the components and runs
/// update passes
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self { config })
    }

    fn pass_settings(&self) -> PassSettings {
        PassSettings {
            project_root: self.config.project.root.clone(),
            docs_dir: self.config.project.docs_dir.clone(),
            max_depth: self.config.graph.max_depth,
        }
    }

    /// Run one incremental documentation update pass
    pub async fn update(&mut self, branch: &str, base: Option<&str>, dry_run: bool) -> Result<()> {
        let base_branch = base.unwrap_or(&self.config.update.base_branch).to_string();
        info!(
            "Updating documentation for branch {} against {}",
            branch, base_branch
        );

        let settings = self.pass_settings();

        let diff_source = GitDiffSource::new(&self.config.project.root)?;
        let generator = TemplateGenerator::new()?;
        let mut graph_builder = GraphBuilder::new(
            Box::new(PythonExtractor::new()?),
            &self.config.project.exclude_pattern,
        )?;
        let mut classifier = ChangeClassifier::new(
            Box::new(PythonExtractor::new()?),
            self.config.classifier.rename_threshold,
        );
        let mut cache = DocsCache::load(&settings.cache_path())?;

        let mut pass = UpdatePass::new(
            &mut graph_builder,
            &mut classifier,
            &mut cache,
            &diff_source,
            &generator,
            settings,
        );
        let report = pass.run(&base_branch, branch, dry_run).await?;
        report.log_summary();

        Ok(())
    }

    /// Show what the artifact cache currently tracks
    pub fn status(&mut self) -> Result<()> {
        let cache = DocsCache::load(&self.pass_settings().cache_path())?;

        if cache.is_empty() {
            info!("Artifact cache is empty");
            return Ok(());
        }

        info!("Artifact cache tracks {} files:", cache.len());
        for entry in cache.entries() {
            info!(
                "  {} -> {} (last modified {})",
                entry.source_path,
                entry.artifact_path.display(),
                entry.last_modified.to_rfc3339()
            );
        }
        Ok(())
    }

    /// Drop all cached artifact records
    pub fn clear(&mut self) -> Result<()> {
        let cache_path = self.pass_settings().cache_path();
        let mut cache = DocsCache::load(&cache_path)?;
        let previous = cache.len();
        cache.clear();
        cache.save(&cache_path)?;

        info!("Cleared {} cache entries", previous);
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocsmithError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Call graph construction settings
    pub graph: GraphConfig,

    /// Change classification settings
    pub classifier: ClassifierConfig,

    /// Update pass settings
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Repository root to analyze
    pub root: PathBuf,

    /// Directory where generated artifacts and the cache live
    pub docs_dir: PathBuf,

    /// Regex for directories excluded from graph construction
    pub exclude_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Maximum hop count for transitive callee exploration
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum body similarity for two differently-named functions to
    /// count as a rename rather than a remove + add pair
    pub rename_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Branch that changed files are diffed against
    pub base_branch: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                root: PathBuf::from("."),
                docs_dir: PathBuf::from("docs_output"),
                exclude_pattern: r"(^|/)(\.git|\.venv|venv|env|__pycache__|node_modules)(/|$)"
                    .to_string(),
            },
            graph: GraphConfig { max_depth: 5 },
            classifier: ClassifierConfig {
                rename_threshold: 0.75,
            },
            update: UpdateConfig {
                base_branch: "main".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| DocsmithError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DocsmithError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Docsmith.toml", "docsmith.toml", ".docsmith.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

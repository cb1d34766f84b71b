use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{DocsmithError, Result};

/// Version-control change type for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Renamed,
    Deleted,
}

impl ChangeType {
    pub fn from_git_status(status: &str) -> Option<Self> {
        match status.chars().next()? {
            'A' => Some(ChangeType::Added),
            'M' => Some(ChangeType::Modified),
            'R' => Some(ChangeType::Renamed),
            'D' => Some(ChangeType::Deleted),
            '?' => Some(ChangeType::Added), // Untracked
            _ => Some(ChangeType::Modified),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Renamed => "renamed",
            ChangeType::Deleted => "deleted",
        }
    }
}

/// One changed file between two revisions
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Repository-relative path
    pub path: String,
    pub change_type: ChangeType,
}

/// The version-control collaborator consumed by the update orchestrator.
///
/// Failures here are fatal to a pass: the orchestrator aborts before any
/// cache mutation rather than updating documentation against a revision it
/// cannot trust.
pub trait DiffSource: Send + Sync {
    /// Resolve a branch to its latest commit id
    fn latest_commit(&self, branch: &str) -> Result<String>;

    /// Source-file changes between two revisions
    fn diff(&self, revision_a: &str, revision_b: &str) -> Result<Vec<FileDiff>>;

    /// Content of a file at a revision; empty string when the file does
    /// not exist there
    fn file_content_at(&self, path: &str, revision: &str) -> Result<String>;
}

/// Git-backed diff source that shells out to the git CLI
pub struct GitDiffSource {
    repo_path: PathBuf,
}

impl GitDiffSource {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo_path = repo_path.as_ref().to_path_buf();

        // Verify it's a git repository
        let output = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&repo_path)
            .output()
            .map_err(|e| DocsmithError::VersionControl(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(DocsmithError::VersionControl(
                "Not a git repository".to_string(),
            ));
        }

        Ok(Self { repo_path })
    }

    fn run_git(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| DocsmithError::VersionControl(format!("Failed to run git: {}", e)))
    }

    fn parse_diff_line(line: &str) -> Option<(ChangeType, String)> {
        let mut parts = line.split('\t');
        let status = parts.next()?;
        let change_type = ChangeType::from_git_status(status)?;

        // Renames come as "R<score>\told\tnew"; the new path is the one
        // that exists going forward
        let path = if change_type == ChangeType::Renamed {
            parts.next_back()?
        } else {
            parts.next()?
        };

        Some((change_type, path.to_string()))
    }
}

impl DiffSource for GitDiffSource {
    fn latest_commit(&self, branch: &str) -> Result<String> {
        let output = self.run_git(&["rev-parse", branch])?;

        if !output.status.success() {
            return Err(DocsmithError::VersionControl(format!(
                "Branch {} not found in the repository",
                branch
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn diff(&self, revision_a: &str, revision_b: &str) -> Result<Vec<FileDiff>> {
        let output = self.run_git(&["diff", "--name-status", revision_a, revision_b])?;

        if !output.status.success() {
            return Err(DocsmithError::VersionControl(format!(
                "git diff failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut diffs = Vec::new();
        for line in stdout.lines() {
            if let Some((change_type, path)) = Self::parse_diff_line(line) {
                if path.ends_with(".py") {
                    diffs.push(FileDiff { path, change_type });
                }
            }
        }

        Ok(diffs)
    }

    fn file_content_at(&self, path: &str, revision: &str) -> Result<String> {
        let spec = format!("{}:{}", revision, path);
        let output = self.run_git(&["show", &spec])?;

        if !output.status.success() {
            // Absent at this revision (added or deleted file)
            return Ok(String::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

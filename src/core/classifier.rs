use std::collections::BTreeMap;
use std::fmt;

use strsim::normalized_levenshtein;
use tracing::debug;

use crate::error::Result;
use super::extractor::{SymbolExtractor, SymbolKind};

/// What happened to one function between two snapshots of a file.
///
/// Similarity rides inside the variants that have one, so states like
/// "equal with similarity 0.4" cannot be expressed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Body is textually identical
    Equal,
    /// Same name, body changed
    Updated { similarity: f64 },
    /// Present only in the new snapshot
    Added,
    /// Present only in the old snapshot
    Removed,
    /// Matched across snapshots by body similarity under a new name
    Renamed { new_name: String, similarity: f64 },
}

/// A classified per-function change. For renames the old name is the
/// change's identity; the new name lives in the variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionChange {
    pub name: String,
    pub kind: ChangeKind,
}

impl fmt::Display for FunctionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChangeKind::Equal => write!(f, "Function {} has no changes.", self.name),
            ChangeKind::Updated { similarity } => write!(
                f,
                "Function {} has been updated with similarity of {:.1}%.",
                self.name,
                similarity * 100.0
            ),
            ChangeKind::Added => write!(f, "Function {} has been added.", self.name),
            ChangeKind::Removed => write!(f, "Function {} has been removed.", self.name),
            ChangeKind::Renamed { new_name, similarity } => write!(
                f,
                "Function {} has been renamed to {} with similarity of {:.1}%.",
                self.name,
                new_name,
                similarity * 100.0
            ),
        }
    }
}

/// Reduce a change list to the function names whose documentation must be
/// regenerated.
///
/// `Updated` contributes its name. `Renamed` is treated like `Updated` and
/// contributes the *new* name, since the graph is built from the current
/// tree and only knows the function by its new name. `Equal`, `Added` and
/// `Removed` never trigger regeneration on their own.
pub fn filter_changes(changes: &[FunctionChange]) -> Vec<String> {
    changes
        .iter()
        .filter_map(|change| match &change.kind {
            ChangeKind::Updated { .. } => Some(change.name.clone()),
            ChangeKind::Renamed { new_name, .. } => Some(new_name.clone()),
            _ => None,
        })
        .collect()
}

/// Classifies per-function changes between two textual snapshots of a file.
///
/// Rename detection is a similarity-matching problem: a renamed but
/// otherwise unchanged function must come back as one `Renamed` entry, not
/// a `Removed` + `Added` pair that would force full regeneration downstream.
pub struct ChangeClassifier {
    extractor: Box<dyn SymbolExtractor>,
    rename_threshold: f64,
}

impl ChangeClassifier {
    pub fn new(extractor: Box<dyn SymbolExtractor>, rename_threshold: f64) -> Self {
        Self {
            extractor,
            rename_threshold,
        }
    }

    pub fn classify(
        &mut self,
        file_path: &str,
        old_content: &str,
        new_content: &str,
    ) -> Result<Vec<FunctionChange>> {
        let old_functions = self.function_bodies(old_content)?;
        let new_functions = self.function_bodies(new_content)?;

        let mut changes = Vec::new();

        // Names present in both snapshots
        for (name, old_body) in &old_functions {
            if let Some(new_body) = new_functions.get(name) {
                let kind = if old_body == new_body {
                    ChangeKind::Equal
                } else {
                    ChangeKind::Updated {
                        similarity: similarity(old_body, new_body),
                    }
                };
                changes.push(FunctionChange {
                    name: name.clone(),
                    kind,
                });
            }
        }

        let mut old_only: Vec<&String> = old_functions
            .keys()
            .filter(|name| !new_functions.contains_key(*name))
            .collect();
        let mut new_only: Vec<&String> = new_functions
            .keys()
            .filter(|name| !old_functions.contains_key(*name))
            .collect();

        // Rename detection: match leftover old names against leftover new
        // names by body similarity
        let mut renamed_old = Vec::new();
        for old_name in &old_only {
            let old_body = &old_functions[*old_name];

            let mut best: Option<(usize, f64)> = None;
            for (idx, new_name) in new_only.iter().enumerate() {
                let ratio = similarity(old_body, &new_functions[*new_name]);
                if best.map_or(true, |(_, best_ratio)| ratio > best_ratio) {
                    best = Some((idx, ratio));
                }
            }

            if let Some((idx, ratio)) = best {
                if ratio >= self.rename_threshold {
                    let new_name = new_only.remove(idx);
                    changes.push(FunctionChange {
                        name: (*old_name).clone(),
                        kind: ChangeKind::Renamed {
                            new_name: new_name.clone(),
                            similarity: ratio,
                        },
                    });
                    renamed_old.push((*old_name).clone());
                }
            }
        }
        old_only.retain(|name| !renamed_old.contains(*name));

        for name in old_only {
            changes.push(FunctionChange {
                name: name.clone(),
                kind: ChangeKind::Removed,
            });
        }
        for name in new_only {
            changes.push(FunctionChange {
                name: name.clone(),
                kind: ChangeKind::Added,
            });
        }

        debug!("Classified {} function changes in {}", changes.len(), file_path);
        Ok(changes)
    }

    /// Extract `{name -> body}` for every function in one snapshot
    fn function_bodies(&mut self, content: &str) -> Result<BTreeMap<String, String>> {
        let definitions = self.extractor.extract_definitions(content)?;
        Ok(definitions
            .into_iter()
            .filter(|def| def.kind == SymbolKind::Function)
            .map(|def| (def.name, def.body))
            .collect())
    }
}

/// Normalized edit-distance similarity in [0, 1]
fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

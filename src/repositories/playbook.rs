//! # Playbook Repository
//!
//! Playbooks are declarative multi-step research strategies. They are loaded
//! once from a directory of YAML documents and are read-only afterwards; the
//! steps only suggest tools, nothing here executes them.

use super::{Repository, RepositoryError, RepositoryResult, RepositoryStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Kind of work a playbook step asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybookStepType {
    /// Query an API or database
    Query,
    /// Analyze results
    Analyze,
    /// Filter results based on criteria
    Filter,
    /// Generate mechanistic hypotheses
    Hypothesize,
    /// Validate against evidence
    Validate,
    /// Synthesize findings
    Synthesize,
}

impl PlaybookStepType {
    /// Every accepted value, in declaration order
    pub const ALL: [Self; 6] = [
        Self::Query,
        Self::Analyze,
        Self::Filter,
        Self::Hypothesize,
        Self::Validate,
        Self::Synthesize,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Analyze => "analyze",
            Self::Filter => "filter",
            Self::Hypothesize => "hypothesize",
            Self::Validate => "validate",
            Self::Synthesize => "synthesize",
        }
    }

    /// `[query, analyze, ...]` for error messages
    #[must_use]
    pub fn allowed_values() -> String {
        let values: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        format!("[{}]", values.join(", "))
    }
}

impl fmt::Display for PlaybookStepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybookStepType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

/// A single step in a playbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookStep {
    pub step_id: String,
    pub step_type: PlaybookStepType,
    pub description: String,
    /// Suggested tools to use
    #[serde(default)]
    pub tool_suggestions: Vec<String>,
    /// Filtering or evaluation criteria
    #[serde(default)]
    pub criteria: Option<serde_json::Value>,
    /// What this step produces
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A complete playbook definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub playbook_id: String,
    pub name: String,
    pub description: String,
    /// What you start with (drug, disease, target, pathway, ...)
    pub starting_point: String,
    /// Academic framework this follows
    #[serde(default)]
    pub first_principles_framework: Option<String>,
    pub steps: Vec<PlaybookStep>,
    #[serde(default)]
    pub expected_outputs: Vec<String>,
    /// When to consider this playbook successful
    #[serde(default)]
    pub convergence_criteria: Option<serde_json::Value>,
}

/// Reasons a playbook directory fails to load
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("Invalid step_type '{value}' in {}. Must be one of: {allowed}", .path.display())]
    InvalidStepType {
        value: String,
        path: PathBuf,
        allowed: String,
    },

    #[error("Missing playbook_id in {}", .path.display())]
    MissingPlaybookId { path: PathBuf },

    #[error("Duplicate playbook_id '{id}' in {} (already defined in {})", .path.display(), .first.display())]
    DuplicatePlaybookId {
        id: String,
        path: PathBuf,
        first: PathBuf,
    },

    #[error("Failed to read playbooks from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed playbook {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone)]
struct Loaded {
    playbook: Playbook,
    source: PathBuf,
}

/// In-memory registry of every playbook found at startup
#[derive(Debug, Clone, Default)]
pub struct PlaybookRepository {
    playbooks: BTreeMap<String, Loaded>,
}

impl PlaybookRepository {
    /// An empty repository
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, in file-name order.
    ///
    /// Any invalid document fails the whole load; there is no partially
    /// populated registry.
    pub fn load_dir(dir: &Path) -> Result<Self, PlaybookError> {
        let read_err = |source| PlaybookError::Read {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut repository = Self::empty();
        for path in files {
            let text = std::fs::read_to_string(&path).map_err(|source| PlaybookError::Read {
                path: path.clone(),
                source,
            })?;
            let playbook = parse_playbook(&text, &path)?;
            repository.insert(playbook, path)?;
        }

        info!(
            "Loaded {} playbooks from {}",
            repository.len(),
            dir.display()
        );
        Ok(repository)
    }

    fn insert(&mut self, playbook: Playbook, source: PathBuf) -> Result<(), PlaybookError> {
        if let Some(existing) = self.playbooks.get(&playbook.playbook_id) {
            return Err(PlaybookError::DuplicatePlaybookId {
                id: playbook.playbook_id,
                path: source,
                first: existing.source.clone(),
            });
        }
        debug!(
            "Registered playbook '{}' ({} steps)",
            playbook.playbook_id,
            playbook.steps.len()
        );
        self.playbooks.insert(
            playbook.playbook_id.clone(),
            Loaded { playbook, source },
        );
        Ok(())
    }

    /// Get a playbook by ID
    #[must_use]
    pub fn get(&self, playbook_id: &str) -> Option<&Playbook> {
        self.playbooks.get(playbook_id).map(|loaded| &loaded.playbook)
    }

    /// List all available playbook IDs, sorted
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.playbooks.keys().cloned().collect()
    }

    /// Get steps for a playbook
    #[must_use]
    pub fn steps(&self, playbook_id: &str) -> Option<&[PlaybookStep]> {
        self.get(playbook_id).map(|playbook| playbook.steps.as_slice())
    }

    /// Iterate over every playbook in ID order
    pub fn iter(&self) -> impl Iterator<Item = &Playbook> {
        self.playbooks.values().map(|loaded| &loaded.playbook)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}

impl Repository for PlaybookRepository {
    fn name(&self) -> &str {
        "playbooks"
    }

    fn clear(&self) -> RepositoryResult<()> {
        Err(RepositoryError::Storage {
            message: "playbooks are read-only once loaded".to_string(),
        })
    }

    fn stats(&self) -> RepositoryResult<RepositoryStats> {
        Ok(RepositoryStats {
            total_entities: self.playbooks.len() as u64,
            storage_size_bytes: None,
        })
    }
}

/// Parse one document, checking `playbook_id` and every `step_type` before
/// the typed decode so failures name the offending value.
fn parse_playbook(text: &str, path: &Path) -> Result<Playbook, PlaybookError> {
    let parse_err = |source| PlaybookError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let document: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_err)?;

    if let Some(steps) = document.get("steps").and_then(serde_yaml::Value::as_sequence) {
        for step in steps {
            let raw = step.get("step_type");
            let value = match raw {
                Some(serde_yaml::Value::String(s)) => s.clone(),
                Some(other) => serde_yaml::to_string(other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                None => String::new(),
            };
            if value.parse::<PlaybookStepType>().is_err() {
                return Err(PlaybookError::InvalidStepType {
                    value,
                    path: path.to_path_buf(),
                    allowed: PlaybookStepType::allowed_values(),
                });
            }
        }
    }

    let has_id = document
        .get("playbook_id")
        .and_then(serde_yaml::Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        return Err(PlaybookError::MissingPlaybookId {
            path: path.to_path_buf(),
        });
    }

    serde_yaml::from_value(document).map_err(parse_err)
}

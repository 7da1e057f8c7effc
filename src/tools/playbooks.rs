//! Read-only tools over the loaded [`PlaybookRepository`].

use super::{ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::client::{count_metadata, format_response, ApiResponse};
use crate::repositories::playbook::{Playbook, PlaybookRepository};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct PlaybookTools {
    repository: Arc<PlaybookRepository>,
}

impl PlaybookTools {
    #[must_use]
    pub const fn new(repository: Arc<PlaybookRepository>) -> Self {
        Self { repository }
    }

    #[must_use]
    pub fn repository(&self) -> &PlaybookRepository {
        &self.repository
    }

    fn lookup(&self, playbook_id: &str) -> Result<&Playbook> {
        let id = playbook_id.trim();
        self.repository.get(id).ok_or_else(|| {
            let available = self.repository.list_ids();
            let reason = if available.is_empty() {
                format!("no playbook '{id}' (no playbooks are loaded)")
            } else {
                format!("no playbook '{id}' (available: {})", available.join(", "))
            };
            Error::invalid_input("playbook_id", reason)
        })
    }

    /// Every playbook id with its name and starting point
    pub fn list(&self) -> Result<ApiResponse> {
        let summaries: Vec<Value> = self
            .repository
            .iter()
            .map(|playbook| {
                serde_json::json!({
                    "playbook_id": playbook.playbook_id,
                    "name": playbook.name,
                    "starting_point": playbook.starting_point,
                    "steps": playbook.steps.len(),
                })
            })
            .collect();
        let metadata = count_metadata("playbooks", summaries.len());
        Ok(format_response(Value::Array(summaries), Some(metadata)))
    }

    pub fn get(&self, playbook_id: &str) -> Result<ApiResponse> {
        let playbook = self.lookup(playbook_id)?;
        Ok(format_response(serde_json::to_value(playbook)?, None))
    }

    pub fn steps(&self, playbook_id: &str) -> Result<ApiResponse> {
        let steps = &self.lookup(playbook_id)?.steps;
        let metadata = count_metadata("steps", steps.len());
        Ok(format_response(serde_json::to_value(steps)?, Some(metadata)))
    }
}

#[async_trait]
impl ToolSet for PlaybookTools {
    fn name(&self) -> &str {
        "Playbooks"
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let id = "Playbook id, e.g. target_first";
        vec![
            ToolSpec::new(
                "playbook_list",
                "List the research playbooks available on this server.",
            ),
            ToolSpec::new("playbook_get", "Get a complete research playbook by id.")
                .required("playbook_id", ParamKind::String, id),
            ToolSpec::new(
                "playbook_get_steps",
                "Get the ordered steps of a research playbook, with suggested tools.",
            )
            .required("playbook_id", ParamKind::String, id),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "playbook_list" => self.list(),
            "playbook_get" => self.get(&args.str("playbook_id")?),
            "playbook_get_steps" => self.steps(&args.str("playbook_id")?),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const PLAYBOOK: &str = r"
playbook_id: disease_first
name: Disease-first discovery
description: Start from a disease and work towards targets
starting_point: disease
steps:
  - step_id: phenotype
    step_type: query
    description: Pull the clinical synopsis
    tool_suggestions: [omim_search_phenotypes]
  - step_id: rank
    step_type: synthesize
    description: Rank candidate targets
";

    fn tools() -> (TempDir, PlaybookTools) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("disease_first.yaml"), PLAYBOOK).unwrap();
        let repository = PlaybookRepository::load_dir(dir.path()).unwrap();
        (dir, PlaybookTools::new(Arc::new(repository)))
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let (_dir, mut tools) = tools();

        let listed = tools
            .call_tool("playbook_list", &ToolArgs::default())
            .await
            .unwrap()
            .into_value();
        assert_eq!(listed["metadata"]["playbooks"], 1);
        assert_eq!(listed["data"][0]["playbook_id"], "disease_first");
        assert_eq!(listed["data"][0]["steps"], 2);

        let args = ToolArgs::from_value(json!({"playbook_id": "disease_first"})).unwrap();
        let playbook = tools.call_tool("playbook_get", &args).await.unwrap().into_value();
        assert_eq!(playbook["starting_point"], "disease");

        let steps = tools
            .call_tool("playbook_get_steps", &args)
            .await
            .unwrap()
            .into_value();
        assert_eq!(steps["metadata"]["steps"], 2);
        assert_eq!(steps["data"][1]["step_type"], "synthesize");
    }

    #[tokio::test]
    async fn test_unknown_playbook_lists_available_ids() {
        let (_dir, mut tools) = tools();
        let args = ToolArgs::from_value(json!({"playbook_id": "nope"})).unwrap();
        let err = tools.call_tool("playbook_get", &args).await.unwrap_err();
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("available: disease_first"));
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let mut tools = PlaybookTools::new(Arc::new(PlaybookRepository::empty()));
        let listed = tools
            .call_tool("playbook_list", &ToolArgs::default())
            .await
            .unwrap()
            .into_value();
        assert_eq!(listed["data"], json!([]));
        assert_eq!(listed["metadata"]["playbooks"], 0);
    }
}

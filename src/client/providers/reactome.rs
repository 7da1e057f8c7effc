//! Reactome Content Service client (<https://reactome.org/ContentService>)

use super::segment;
use crate::client::{count_metadata, ApiClient, ApiResponse, BaseApiClient, ClientConfig, QueryParams};
use crate::tools::{ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const API_NAME: &str = "Reactome";
pub const BASE_URL: &str = "https://reactome.org/ContentService";

const DEFAULT_SPECIES: &str = "Homo sapiens";

#[derive(Debug)]
pub struct ReactomeClient {
    base: BaseApiClient,
}

impl ReactomeClient {
    #[must_use]
    pub fn default_config() -> ClientConfig {
        ClientConfig::new(BASE_URL, API_NAME)
    }

    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base: BaseApiClient::new(config),
        }
    }

    /// Full record of a pathway by stable id (e.g. `R-HSA-69278`)
    pub async fn get_pathway(&mut self, pathway_id: &str) -> Result<ApiResponse> {
        let data = self
            .base
            .get_json(&format!("/data/query/{}", segment(pathway_id)), None)
            .await?;
        Ok(self.base.format_response(data, None))
    }

    pub async fn query_pathways(&mut self, query: &str, species: &str) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("query", query)
            .push("species", species)
            .push("types", "Pathway")
            .push("cluster", "true");
        let data = self.base.get_json("/search/query", Some(&params)).await?;
        let metadata = search_hits(&data).map(|n| count_metadata("results", n));
        Ok(self.base.format_response(data, metadata))
    }

    /// Physical entities participating in a pathway
    pub async fn get_pathway_participants(&mut self, pathway_id: &str) -> Result<ApiResponse> {
        let data = self
            .base
            .get_json(&format!("/data/participants/{}", segment(pathway_id)), None)
            .await?;
        let metadata = data
            .as_array()
            .map(|items| count_metadata("participants", items.len()));
        Ok(self.base.format_response(data, metadata))
    }

    /// Human pathways matching a disease name
    pub async fn get_disease_pathways(&mut self, disease_name: &str) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("query", disease_name)
            .push("species", DEFAULT_SPECIES)
            .push("types", "Pathway")
            .push("cluster", "true");
        let data = self.base.get_json("/search/query", Some(&params)).await?;
        let metadata = search_hits(&data).map(|n| count_metadata("pathways", n));
        Ok(self.base.format_response(data, metadata))
    }
}

impl Default for ReactomeClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// Total entries across the result groups of a search answer
fn search_hits(data: &Value) -> Option<usize> {
    let groups = data.get("results")?.as_array()?;
    Some(
        groups
            .iter()
            .filter_map(|group| group.get("entries").and_then(Value::as_array))
            .map(Vec::len)
            .sum(),
    )
}

impl ApiClient for ReactomeClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for ReactomeClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("reactome_get_pathway", "Get a Reactome pathway by stable id.")
                .required("pathway_id", ParamKind::String, "Stable id, e.g. R-HSA-69278"),
            ToolSpec::new("reactome_query_pathways", "Search Reactome pathways.")
                .required("query", ParamKind::String, "Search terms")
                .optional("species", ParamKind::String, "Species name (default Homo sapiens)"),
            ToolSpec::new(
                "reactome_get_pathway_participants",
                "List the participants of a Reactome pathway.",
            )
            .required("pathway_id", ParamKind::String, "Stable id"),
            ToolSpec::new(
                "reactome_get_disease_pathways",
                "Find human Reactome pathways associated with a disease.",
            )
            .required("disease_name", ParamKind::String, "Disease name"),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "reactome_get_pathway" => self.get_pathway(&args.str("pathway_id")?).await,
            "reactome_query_pathways" => {
                let species = args.str_or("species", DEFAULT_SPECIES)?;
                self.query_pathways(&args.str("query")?, &species).await
            }
            "reactome_get_pathway_participants" => {
                self.get_pathway_participants(&args.str("pathway_id")?).await
            }
            "reactome_get_disease_pathways" => {
                self.get_disease_pathways(&args.str("disease_name")?).await
            }
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

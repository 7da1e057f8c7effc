//! ClinicalTrials.gov v2 client (<https://clinicaltrials.gov/data-api/api>)

use super::matches;
use crate::client::{ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata, QueryParams};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const API_NAME: &str = "ClinicalTrials.gov";
pub const BASE_URL: &str = "https://clinicaltrials.gov/api/v2";

const MAX_PAGE_SIZE: u64 = 1000;

static NCT_ID: OnceLock<Option<Regex>> = OnceLock::new();

/// Filters for a study search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyQuery {
    pub condition: Option<String>,
    pub intervention: Option<String>,
    /// One or more overall statuses, comma separated (e.g. `RECRUITING`)
    pub status: Option<String>,
    pub page_size: u64,
}

#[derive(Debug)]
pub struct ClinicalTrialsClient {
    base: BaseApiClient,
}

/// Normalize and check an `NCT` + 8 digits identifier
pub fn normalize_nct_id(value: &str) -> Result<String> {
    let id = value.trim().to_ascii_uppercase();
    if matches(&NCT_ID, r"^NCT\d{8}$", &id) {
        Ok(id)
    } else {
        Err(Error::invalid_input(
            "nct_id",
            format!("'{value}' is not an NCT id (expected NCT followed by 8 digits)"),
        ))
    }
}

/// `recruiting, not yet recruiting` -> `RECRUITING,NOT_YET_RECRUITING`
fn normalize_status(status: &str) -> String {
    status
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase().replace([' ', '-'], "_"))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

impl ClinicalTrialsClient {
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

    pub async fn search_studies(&mut self, query: &StudyQuery) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push_opt("query.cond", query.condition.as_deref())
            .push_opt("query.intr", query.intervention.as_deref())
            .push_opt("filter.overallStatus", query.status.as_deref().map(normalize_status))
            .push("pageSize", clamp_limit(query.page_size, MAX_PAGE_SIZE))
            .push("countTotal", "true")
            .push("format", "json");
        let data = self.base.get_json("/studies", Some(&params)).await?;
        let metadata = studies_metadata(&data);
        Ok(self.base.format_response(data, metadata))
    }

    pub async fn get_study(&mut self, nct_id: &str) -> Result<ApiResponse> {
        let id = normalize_nct_id(nct_id)?;
        let params = QueryParams::new().push("format", "json");
        let data = self
            .base
            .get_json(&format!("/studies/{id}"), Some(&params))
            .await?;
        Ok(self.base.format_response(data, None))
    }

    pub async fn search_by_condition(
        &mut self,
        condition_query: &str,
        status: Option<&str>,
        page_size: u64,
    ) -> Result<ApiResponse> {
        self.search_studies(&StudyQuery {
            condition: Some(condition_query.to_string()),
            intervention: None,
            status: status.map(str::to_string),
            page_size,
        })
        .await
    }

    pub async fn search_by_intervention(
        &mut self,
        intervention_query: &str,
        status: Option<&str>,
        page_size: u64,
    ) -> Result<ApiResponse> {
        self.search_studies(&StudyQuery {
            condition: None,
            intervention: Some(intervention_query.to_string()),
            status: status.map(str::to_string),
            page_size,
        })
        .await
    }

    /// Data model description of a study record
    pub async fn get_study_metadata(&mut self) -> Result<ApiResponse> {
        let data = self.base.get_json("/studies/metadata", None).await?;
        Ok(self.base.format_response(data, None))
    }
}

impl Default for ClinicalTrialsClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

fn studies_metadata(data: &Value) -> Option<Metadata> {
    let studies = data.get("studies")?.as_array()?;
    let mut metadata = Metadata::new();
    metadata.insert("results".to_string(), Value::from(studies.len()));
    if let Some(total) = data.get("totalCount") {
        metadata.insert("total".to_string(), total.clone());
    }
    if let Some(token) = data.get("nextPageToken") {
        metadata.insert("next_page_token".to_string(), token.clone());
    }
    Some(metadata)
}

impl ApiClient for ClinicalTrialsClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for ClinicalTrialsClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let status = "Overall status filter, e.g. RECRUITING or COMPLETED";
        let page_size = "Maximum studies (default 20)";
        vec![
            ToolSpec::new("ctg_search_studies", "Search clinical trials from ClinicalTrials.gov.")
                .optional("condition", ParamKind::String, "Condition or disease")
                .optional("intervention", ParamKind::String, "Intervention or treatment")
                .optional("status", ParamKind::String, status)
                .optional("page_size", ParamKind::Integer, page_size),
            ToolSpec::new("ctg_get_study", "Get single clinical trial study by NCT ID.")
                .required("nct_id", ParamKind::String, "NCT id, e.g. NCT04280705"),
            ToolSpec::new(
                "ctg_search_by_condition",
                "Search clinical trials by condition/disease.",
            )
            .required("condition_query", ParamKind::String, "Condition or disease")
            .optional("status", ParamKind::String, status)
            .optional("page_size", ParamKind::Integer, page_size),
            ToolSpec::new(
                "ctg_search_by_intervention",
                "Search clinical trials by intervention/treatment.",
            )
            .required("intervention_query", ParamKind::String, "Intervention or treatment")
            .optional("status", ParamKind::String, status)
            .optional("page_size", ParamKind::Integer, page_size),
            ToolSpec::new(
                "ctg_get_study_metadata",
                "Get ClinicalTrials.gov data model metadata (available fields).",
            ),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        let status = args.opt_str("status")?;
        let page_size = args.int_or("page_size", 20)?;
        match name {
            "ctg_search_studies" => {
                let query = StudyQuery {
                    condition: args.opt_str("condition")?,
                    intervention: args.opt_str("intervention")?,
                    status,
                    page_size,
                };
                self.search_studies(&query).await
            }
            "ctg_get_study" => self.get_study(&args.str("nct_id")?).await,
            "ctg_search_by_condition" => {
                self.search_by_condition(&args.str("condition_query")?, status.as_deref(), page_size)
                    .await
            }
            "ctg_search_by_intervention" => {
                self.search_by_intervention(
                    &args.str("intervention_query")?,
                    status.as_deref(),
                    page_size,
                )
                .await
            }
            "ctg_get_study_metadata" => self.get_study_metadata().await,
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nct_id_validation() {
        assert_eq!(normalize_nct_id(" nct04280705 ").unwrap(), "NCT04280705");
        assert!(normalize_nct_id("NCT123").is_err());
        assert!(normalize_nct_id("04280705").is_err());
        assert!(normalize_nct_id("NCT042807051").is_err());
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(
            normalize_status("recruiting, not yet recruiting"),
            "RECRUITING,NOT_YET_RECRUITING"
        );
        assert_eq!(normalize_status("ACTIVE_NOT_RECRUITING"), "ACTIVE_NOT_RECRUITING");
    }

    #[test]
    fn test_studies_metadata() {
        let data = json!({"studies": [{}, {}], "totalCount": 41, "nextPageToken": "abc"});
        let metadata = studies_metadata(&data).unwrap();
        assert_eq!(metadata["results"], 2);
        assert_eq!(metadata["total"], 41);
        assert_eq!(metadata["next_page_token"], "abc");
    }
}

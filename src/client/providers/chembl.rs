//! ChEMBL web services client (<https://www.ebi.ac.uk/chembl/api/data/docs>)

use super::{matches, segment};
use crate::client::{ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata, QueryParams};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const API_NAME: &str = "ChEMBL";
pub const BASE_URL: &str = "https://www.ebi.ac.uk/chembl/api/data";

/// ChEMBL caps pages at 1000 records
const MAX_LIMIT: u64 = 1000;

static CHEMBL_ID: OnceLock<Option<Regex>> = OnceLock::new();

#[derive(Debug)]
pub struct ChemblClient {
    base: BaseApiClient,
}

/// Upper-case and check a `CHEMBL<digits>` identifier
fn chembl_id(field: &str, value: &str) -> Result<String> {
    let id = value.trim().to_ascii_uppercase();
    if matches(&CHEMBL_ID, r"^CHEMBL\d+$", &id) {
        Ok(id)
    } else {
        Err(Error::invalid_input(
            field,
            format!("'{value}' is not a ChEMBL id (expected CHEMBL<digits>)"),
        ))
    }
}

impl ChemblClient {
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

    async fn record(&mut self, resource: &str, id: &str) -> Result<ApiResponse> {
        let data = self
            .base
            .get_json(&format!("/{resource}/{}.json", segment(id)), None)
            .await?;
        Ok(self.base.format_response(data, None))
    }

    async fn list(&mut self, resource: &str, params: QueryParams) -> Result<ApiResponse> {
        let data = self
            .base
            .get_json(&format!("/{resource}.json"), Some(&params))
            .await?;
        let metadata = page_metadata(&data);
        Ok(self.base.format_response(data, metadata))
    }

    pub async fn get_molecule(&mut self, molecule_chembl_id: &str) -> Result<ApiResponse> {
        let id = chembl_id("molecule_chembl_id", molecule_chembl_id)?;
        self.record("molecule", &id).await
    }

    /// Full-text search over names and synonyms
    pub async fn search_molecules(&mut self, query: &str, limit: u64) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("q", query)
            .push("limit", clamp_limit(limit, MAX_LIMIT));
        self.list("molecule/search", params).await
    }

    pub async fn get_target(&mut self, target_chembl_id: &str) -> Result<ApiResponse> {
        let id = chembl_id("target_chembl_id", target_chembl_id)?;
        self.record("target", &id).await
    }

    pub async fn search_targets(&mut self, query: &str, limit: u64) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("q", query)
            .push("limit", clamp_limit(limit, MAX_LIMIT));
        self.list("target/search", params).await
    }

    /// Bioactivities for a target, a molecule, or both
    pub async fn get_activities(
        &mut self,
        target_chembl_id: Option<&str>,
        molecule_chembl_id: Option<&str>,
        limit: u64,
    ) -> Result<ApiResponse> {
        if target_chembl_id.is_none() && molecule_chembl_id.is_none() {
            return Err(Error::invalid_input(
                "target_chembl_id",
                "provide target_chembl_id, molecule_chembl_id, or both",
            ));
        }
        let target = target_chembl_id
            .map(|id| chembl_id("target_chembl_id", id))
            .transpose()?;
        let molecule = molecule_chembl_id
            .map(|id| chembl_id("molecule_chembl_id", id))
            .transpose()?;

        let params = QueryParams::new()
            .push_opt("target_chembl_id", target)
            .push_opt("molecule_chembl_id", molecule)
            .push("limit", clamp_limit(limit, MAX_LIMIT));
        self.list("activity", params).await
    }

    pub async fn get_mechanism(&mut self, molecule_chembl_id: &str) -> Result<ApiResponse> {
        let id = chembl_id("molecule_chembl_id", molecule_chembl_id)?;
        let params = QueryParams::new().push("molecule_chembl_id", id);
        self.list("mechanism", params).await
    }

    /// Mechanisms of action that name the target, i.e. the drugs acting on it
    pub async fn find_drugs_by_target(&mut self, target_chembl_id: &str, limit: u64) -> Result<ApiResponse> {
        let id = chembl_id("target_chembl_id", target_chembl_id)?;
        let params = QueryParams::new()
            .push("target_chembl_id", id)
            .push("limit", clamp_limit(limit, MAX_LIMIT));
        self.list("mechanism", params).await
    }

    /// Drug indications whose EFO or MeSH term contains the query
    pub async fn find_drugs_by_indication(&mut self, disease_query: &str, limit: u64) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("efo_term__icontains", disease_query.trim())
            .push("limit", clamp_limit(limit, MAX_LIMIT));
        self.list("drug_indication", params).await
    }

    pub async fn get_drug_indications(&mut self, molecule_chembl_id: &str) -> Result<ApiResponse> {
        let id = chembl_id("molecule_chembl_id", molecule_chembl_id)?;
        let params = QueryParams::new().push("molecule_chembl_id", id);
        self.list("drug_indication", params).await
    }
}

impl Default for ChemblClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// `{results, total}` from a ChEMBL list answer
fn page_metadata(data: &Value) -> Option<Metadata> {
    let object = data.as_object()?;
    let count = object
        .iter()
        .filter(|(key, _)| key.as_str() != "page_meta")
        .find_map(|(_, value)| value.as_array())?
        .len();

    let mut metadata = Metadata::new();
    metadata.insert("results".to_string(), Value::from(count));
    if let Some(total) = data.pointer("/page_meta/total_count") {
        metadata.insert("total".to_string(), total.clone());
    }
    Some(metadata)
}

impl ApiClient for ChemblClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for ChemblClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let molecule = "Molecule ChEMBL id, e.g. CHEMBL25";
        let target = "Target ChEMBL id, e.g. CHEMBL203";
        vec![
            ToolSpec::new(
                "chembl_get_molecule",
                "Get molecule (drug/compound) information from ChEMBL by ChEMBL ID.",
            )
            .required("molecule_chembl_id", ParamKind::String, molecule),
            ToolSpec::new(
                "chembl_search_molecules",
                "Search molecules (drugs/compounds) in ChEMBL by name or synonym.",
            )
            .required("query", ParamKind::String, "Name or synonym")
            .optional("limit", ParamKind::Integer, "Maximum results (default 20)"),
            ToolSpec::new(
                "chembl_get_target",
                "Get target (protein) information from ChEMBL by ChEMBL ID.",
            )
            .required("target_chembl_id", ParamKind::String, target),
            ToolSpec::new(
                "chembl_search_targets",
                "Search targets (proteins) in ChEMBL by name or synonym.",
            )
            .required("query", ParamKind::String, "Name or synonym")
            .optional("limit", ParamKind::Integer, "Maximum results (default 20)"),
            ToolSpec::new("chembl_get_activities", "Get bioactivity data from ChEMBL.")
                .optional("target_chembl_id", ParamKind::String, target)
                .optional("molecule_chembl_id", ParamKind::String, molecule)
                .optional("limit", ParamKind::Integer, "Maximum results (default 50)"),
            ToolSpec::new(
                "chembl_get_mechanism",
                "Get mechanism of action for a molecule from ChEMBL.",
            )
            .required("molecule_chembl_id", ParamKind::String, molecule),
            ToolSpec::new(
                "chembl_find_drugs_by_target",
                "Find all drugs/compounds targeting a specific protein.",
            )
            .required("target_chembl_id", ParamKind::String, target)
            .optional("limit", ParamKind::Integer, "Maximum results (default 50)"),
            ToolSpec::new(
                "chembl_find_drugs_by_indication",
                "Find all drugs for a disease/indication.",
            )
            .required("disease_query", ParamKind::String, "Disease or indication text")
            .optional("limit", ParamKind::Integer, "Maximum results (default 50)"),
            ToolSpec::new(
                "chembl_get_drug_indications",
                "Get all indications (diseases) for a specific drug.",
            )
            .required("molecule_chembl_id", ParamKind::String, molecule),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "chembl_get_molecule" => self.get_molecule(&args.str("molecule_chembl_id")?).await,
            "chembl_search_molecules" => {
                self.search_molecules(&args.str("query")?, args.int_or("limit", 20)?)
                    .await
            }
            "chembl_get_target" => self.get_target(&args.str("target_chembl_id")?).await,
            "chembl_search_targets" => {
                self.search_targets(&args.str("query")?, args.int_or("limit", 20)?)
                    .await
            }
            "chembl_get_activities" => {
                let target = args.opt_str("target_chembl_id")?;
                let molecule = args.opt_str("molecule_chembl_id")?;
                self.get_activities(target.as_deref(), molecule.as_deref(), args.int_or("limit", 50)?)
                    .await
            }
            "chembl_get_mechanism" => self.get_mechanism(&args.str("molecule_chembl_id")?).await,
            "chembl_find_drugs_by_target" => {
                self.find_drugs_by_target(&args.str("target_chembl_id")?, args.int_or("limit", 50)?)
                    .await
            }
            "chembl_find_drugs_by_indication" => {
                self.find_drugs_by_indication(&args.str("disease_query")?, args.int_or("limit", 50)?)
                    .await
            }
            "chembl_get_drug_indications" => {
                self.get_drug_indications(&args.str("molecule_chembl_id")?)
                    .await
            }
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
    fn test_chembl_id_validation() {
        assert_eq!(chembl_id("id", " chembl25 ").unwrap(), "CHEMBL25");
        assert!(chembl_id("id", "aspirin").unwrap_err().is_caller_error());
        assert!(chembl_id("id", "CHEMBL").is_err());
    }

    #[test]
    fn test_page_metadata() {
        let data = json!({
            "molecules": [{"molecule_chembl_id": "CHEMBL25"}],
            "page_meta": {"limit": 20, "total_count": 7}
        });
        let metadata = page_metadata(&data).unwrap();
        assert_eq!(metadata["results"], 1);
        assert_eq!(metadata["total"], 7);

        assert!(page_metadata(&json!({"molecule_chembl_id": "CHEMBL25"})).is_none());
    }

    #[tokio::test]
    async fn test_activities_need_a_filter() {
        let mut client = ChemblClient::with_config(ChemblClient::default_config().without_cache());
        let err = client.get_activities(None, None, 10).await.unwrap_err();
        assert!(err.is_caller_error());
    }
}

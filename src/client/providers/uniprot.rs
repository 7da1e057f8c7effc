//! UniProt REST client (<https://www.uniprot.org/help/api>)

use super::{array_count, segment, truthy};
use crate::client::{
    count_metadata, ApiClient, ApiResponse, BaseApiClient, CacheMode, ClientConfig, PollConfig,
    Poller, PostBody, QueryParams,
};
use crate::tools::{ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

pub const API_NAME: &str = "UniProt";
pub const BASE_URL: &str = "https://rest.uniprot.org";

#[derive(Debug)]
pub struct UniProtClient {
    base: BaseApiClient,
    poll: PollConfig,
}

impl UniProtClient {
    #[must_use]
    pub fn default_config() -> ClientConfig {
        ClientConfig::new(BASE_URL, API_NAME)
    }

    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base: BaseApiClient::new(config),
            poll: PollConfig::default(),
        }
    }

    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Protein entry; `json` gives the structured record, any other format
    /// (fasta, xml, txt, ...) the raw text
    pub async fn get_protein(&mut self, accession: &str, format: &str) -> Result<ApiResponse> {
        if format == "json" {
            let data = self
                .base
                .get_json(&format!("/uniprotkb/{}", segment(accession)), None)
                .await?;
            return Ok(self.base.format_response(data, None));
        }

        let url = format!(
            "{}/uniprotkb/{}.{}",
            self.base.base_url(),
            segment(accession),
            segment(format)
        );
        let text = self
            .base
            .get_text_absolute(&url, None, CacheMode::Use)
            .await?;
        Ok(self.base.format_response(text, None))
    }

    pub async fn search_proteins(
        &mut self,
        query: &str,
        format: &str,
        limit: u64,
        offset: u64,
    ) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("query", query)
            .push("size", limit)
            .push("from", offset);

        if format == "json" {
            let data = self.base.get_json("/uniprotkb/search", Some(&params)).await?;
            let metadata = array_count(&data, "results", "results");
            return Ok(self.base.format_response(data, metadata));
        }

        let url = format!("{}/uniprotkb/search", self.base.base_url());
        let params = params.push("format", format);
        let text = self
            .base
            .get_text_absolute(&url, Some(&params), CacheMode::Use)
            .await?;
        Ok(self.base.format_response(text, None))
    }

    /// FASTA text
    pub async fn get_protein_sequence(&mut self, accession: &str) -> Result<ApiResponse> {
        let url = format!("{}/uniprotkb/{}.fasta", self.base.base_url(), segment(accession));
        let text = self
            .base
            .get_text_absolute(&url, None, CacheMode::Use)
            .await?;
        Ok(self.base.format_response(text, None))
    }

    /// `DISEASE` comments of an entry, as `{diseases, count}`
    pub async fn get_disease_associations(&mut self, accession: &str) -> Result<ApiResponse> {
        let data = self
            .base
            .get_json(&format!("/uniprotkb/{}", segment(accession)), None)
            .await?;

        let diseases: Vec<Value> = data
            .get("comments")
            .and_then(Value::as_array)
            .map(|comments| {
                comments
                    .iter()
                    .filter(|c| c.get("commentType").and_then(Value::as_str) == Some("DISEASE"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let count = diseases.len();
        let payload = serde_json::json!({"diseases": diseases, "count": count});
        Ok(self
            .base
            .format_response(payload, Some(count_metadata("diseases", count))))
    }

    /// Submit an ID mapping job, wait for it, and fetch the mapped results
    pub async fn map_ids(&mut self, from_db: &str, to_db: &str, ids: &[String]) -> Result<ApiResponse> {
        let joined = ids.join(",");
        let body = PostBody::form([("from", from_db), ("to", to_db), ("ids", joined.as_str())]);
        let submitted = self.base.post_json("/idmapping/run", body, None).await?;

        let job_id = match submitted.get("jobId") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(Error::Remote {
                    context: "UniProt ID mapping".to_string(),
                    message: first_message(&submitted),
                })
            }
        };
        info!("UniProt ID mapping job {} submitted ({} ids)", job_id, ids.len());

        let status_url = format!("{}/idmapping/status/{}", self.base.base_url(), segment(&job_id));
        let mut poller = Poller::new(API_NAME, self.poll);
        loop {
            let attempt = poller.next_attempt().await?;
            let status = self
                .base
                .get_json_absolute(&status_url, None, CacheMode::Bypass)
                .await?;
            if truthy(status.get("results")) || truthy(status.get("failedIds")) {
                debug!("UniProt ID mapping job {} ready after {} poll(s)", job_id, attempt);
                break;
            }
        }

        let stream_url = format!("{}/idmapping/stream/{}", self.base.base_url(), segment(&job_id));
        let text = self
            .base
            .get_text_absolute(&stream_url, None, CacheMode::Use)
            .await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(data) => {
                let metadata = data.as_object().map(|_| {
                    let n = data
                        .get("results")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    count_metadata("mappings", n)
                });
                Ok(self.base.format_response(data, metadata))
            }
            Err(_) => Ok(self.base.format_response(text, None)),
        }
    }
}

impl Default for UniProtClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// Text of the first entry in a `messages` array, or `Unknown error`
fn first_message(response: &Value) -> String {
    let first = response
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.first());
    match first {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(message)) => message
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        _ => "Unknown error".to_string(),
    }
}

impl ApiClient for UniProtClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for UniProtClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "uniprot_get_protein",
                "Get protein information from UniProt by accession.",
            )
            .required("accession", ParamKind::String, "UniProt accession, e.g. P00520")
            .optional("format", ParamKind::String, "json (default), fasta, xml, txt"),
            ToolSpec::new("uniprot_search_proteins", "Search proteins in UniProtKB.")
                .required(
                    "query",
                    ParamKind::String,
                    "UniProt query, e.g. 'gene:BRCA1 AND organism_id:9606'",
                )
                .optional("format", ParamKind::String, "json (default), tsv, fasta")
                .optional("limit", ParamKind::Integer, "Maximum results (default 25)")
                .optional("offset", ParamKind::Integer, "Pagination offset (default 0)"),
            ToolSpec::new(
                "uniprot_get_protein_sequence",
                "Get protein sequence in FASTA format.",
            )
            .required("accession", ParamKind::String, "UniProt accession"),
            ToolSpec::new(
                "uniprot_get_disease_associations",
                "Get disease associations for a protein.",
            )
            .required("accession", ParamKind::String, "UniProt accession"),
            ToolSpec::new(
                "uniprot_map_ids",
                "Map identifiers between databases using UniProt ID mapping.",
            )
            .required(
                "from_db",
                ParamKind::String,
                "Source database, e.g. UniProtKB_AC-ID, Gene_Name, P_ENTREZGENEID",
            )
            .required(
                "to_db",
                ParamKind::String,
                "Target database, e.g. UniProtKB, Ensembl, GeneID",
            )
            .required(
                "ids",
                ParamKind::StringList,
                "Identifiers to map (list or comma-separated string)",
            ),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "uniprot_get_protein" => {
                let format = args.str_or("format", "json")?;
                self.get_protein(&args.str("accession")?, &format).await
            }
            "uniprot_search_proteins" => {
                self.search_proteins(
                    &args.str("query")?,
                    &args.str_or("format", "json")?,
                    args.int_or("limit", 25)?,
                    args.int_or("offset", 0)?,
                )
                .await
            }
            "uniprot_get_protein_sequence" => {
                self.get_protein_sequence(&args.str("accession")?).await
            }
            "uniprot_get_disease_associations" => {
                self.get_disease_associations(&args.str("accession")?).await
            }
            "uniprot_map_ids" => {
                self.map_ids(&args.str("from_db")?, &args.str("to_db")?, &args.list("ids")?)
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
    fn test_first_message() {
        assert_eq!(
            first_message(&json!({"messages": [{"text": "Invalid from db"}]})),
            "Invalid from db"
        );
        assert_eq!(
            first_message(&json!({"messages": ["Too many ids"]})),
            "Too many ids"
        );
        assert_eq!(first_message(&json!({"messages": []})), "Unknown error");
        assert_eq!(first_message(&json!({})), "Unknown error");
    }

    #[test]
    fn test_tool_specs_are_prefixed() {
        let client = UniProtClient::with_config(UniProtClient::default_config().without_cache());
        let specs = client.tool_specs();
        assert_eq!(specs.len(), 5);
        assert!(specs.iter().all(|s| s.name.starts_with("uniprot_")));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mut client =
            UniProtClient::with_config(UniProtClient::default_config().without_cache());
        let err = client
            .call_tool("kegg_get_gene", &ToolArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_missing_argument_is_invalid_input() {
        let mut client =
            UniProtClient::with_config(UniProtClient::default_config().without_cache());
        let err = client
            .call_tool("uniprot_get_protein", &ToolArgs::default())
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
    }
}

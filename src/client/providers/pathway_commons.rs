//! Pathway Commons client (<https://www.pathwaycommons.org/pc2/>).
//!
//! Search and get use the classic GET endpoints; top pathways, graph and
//! traverse use the v2 POST API with JSON bodies.

use crate::client::{
    count_metadata, ApiClient, ApiResponse, BaseApiClient, ClientConfig, PostBody, QueryParams,
};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const API_NAME: &str = "Pathway Commons";
pub const BASE_URL: &str = "https://www.pathwaycommons.org/pc2";

/// Graph query kinds understood by `/v2/graph`
pub const GRAPH_KINDS: [&str; 5] = [
    "neighborhood",
    "pathsbetween",
    "pathsfromto",
    "commonstream",
    "commonupstream",
];

#[derive(Debug)]
pub struct PathwayCommonsClient {
    base: BaseApiClient,
}

/// Arguments of a graph query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQuery {
    pub source: Vec<String>,
    pub target: Vec<String>,
    pub kind: String,
    pub limit: u64,
    pub format: String,
}

impl PathwayCommonsClient {
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

    pub async fn search(
        &mut self,
        q: &str,
        entity_type: &str,
        format: &str,
        page: u64,
        datasource: Option<&str>,
    ) -> Result<ApiResponse> {
        let params = QueryParams::new()
            .push("q", q)
            .push("type", entity_type)
            .push("page", page)
            .push_opt("datasource", datasource);

        if format == "json" {
            let data = self.base.get_json("/search.json", Some(&params)).await?;
            let metadata = data
                .get("searchHit")
                .and_then(Value::as_array)
                .map(|hits| count_metadata("results", hits.len()));
            return Ok(self.base.format_response(data, metadata));
        }

        let text = self
            .base
            .get_text(&format!("/search.{}", super::segment(format)), Some(&params))
            .await?;
        Ok(self.base.format_response(text, None))
    }

    /// `json` maps to JSON-LD; other formats (BIOPAX, SIF, GSEA, SBGN) come back as text
    pub async fn get_pathway_by_uri(&mut self, uri: &str, format: &str) -> Result<ApiResponse> {
        if is_json(format) {
            let params = QueryParams::new().push("uri", uri).push("format", "JSONLD");
            let data = self.base.get_json("/get", Some(&params)).await?;
            return Ok(self.base.format_response(data, None));
        }

        let params = QueryParams::new()
            .push("uri", uri)
            .push("format", format.to_ascii_uppercase());
        let text = self.base.get_text("/get", Some(&params)).await?;
        Ok(self.base.format_response(text, None))
    }

    /// Top-level pathways, optionally narrowed to a gene, truncated to `limit`
    pub async fn top_pathways(
        &mut self,
        gene: Option<&str>,
        datasource: Option<&str>,
        limit: u64,
    ) -> Result<ApiResponse> {
        let mut body = Map::new();
        body.insert("q".to_string(), Value::from(gene.unwrap_or("*")));
        if let Some(source) = datasource {
            body.insert("datasource".to_string(), json!([source]));
        }

        let mut data = self
            .base
            .post_json("/v2/top_pathways", PostBody::Json(Value::Object(body)), None)
            .await?;

        let limit = usize::try_from(clamp_limit(limit, 1000)).unwrap_or(usize::MAX);
        let metadata = data
            .get_mut("searchHit")
            .and_then(Value::as_array_mut)
            .map(|hits| {
                hits.truncate(limit);
                count_metadata("pathways", hits.len())
            });
        Ok(self.base.format_response(data, metadata))
    }

    pub async fn graph(&mut self, query: &GraphQuery) -> Result<ApiResponse> {
        let kind = query.kind.to_ascii_lowercase();
        if !GRAPH_KINDS.contains(&kind.as_str()) {
            return Err(Error::invalid_input(
                "kind",
                format!("must be one of {GRAPH_KINDS:?}"),
            ));
        }

        let mut body = Map::new();
        body.insert("source".to_string(), json!(query.source));
        if !query.target.is_empty() {
            body.insert("target".to_string(), json!(query.target));
        }
        body.insert("kind".to_string(), Value::from(kind.to_ascii_uppercase()));
        body.insert("limit".to_string(), Value::from(query.limit));

        self.post_formatted("/v2/graph", body, &query.format).await
    }

    /// Follow a BioPAX property path from a URI; only JSON output exists
    pub async fn traverse(&mut self, uri: &str, path: &str, format: &str) -> Result<ApiResponse> {
        if !is_json(format) {
            return Err(Error::invalid_input("format", "traverse only supports json"));
        }
        let body = json!({"uri": [uri], "path": path});
        let data = self
            .base
            .post_json("/v2/traverse", PostBody::Json(body), None)
            .await?;
        Ok(self.base.format_response(data, None))
    }

    async fn post_formatted(
        &mut self,
        path: &str,
        mut body: Map<String, Value>,
        format: &str,
    ) -> Result<ApiResponse> {
        if is_json(format) {
            body.insert("format".to_string(), Value::from("JSONLD"));
            let data = self
                .base
                .post_json(path, PostBody::Json(Value::Object(body)), None)
                .await?;
            return Ok(self.base.format_response(data, None));
        }

        body.insert("format".to_string(), Value::from(format.to_ascii_uppercase()));
        let text = self
            .base
            .post_text(path, PostBody::Json(Value::Object(body)), None)
            .await?;
        Ok(self.base.format_response(text, None))
    }
}

fn is_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json") || format.eq_ignore_ascii_case("jsonld")
}

impl Default for PathwayCommonsClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

impl ApiClient for PathwayCommonsClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for PathwayCommonsClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "pathwaycommons_search",
                "Search Pathway Commons for pathways, proteins, or other biological entities.",
            )
            .required("q", ParamKind::String, "Query, e.g. TP53")
            .optional("type", ParamKind::String, "BioPAX type (default Pathway)")
            .optional("format", ParamKind::String, "json (default) or xml")
            .optional("page", ParamKind::Integer, "Page number (default 0)")
            .optional("datasource", ParamKind::String, "Data source filter, e.g. reactome"),
            ToolSpec::new(
                "pathwaycommons_get_pathway_by_uri",
                "Get pathway information from Pathway Commons by URI.",
            )
            .required("uri", ParamKind::String, "Pathway URI")
            .optional("format", ParamKind::String, "json (default), biopax, sif, gsea, sbgn"),
            ToolSpec::new(
                "pathwaycommons_top_pathways",
                "Get top-level pathways from Pathway Commons.",
            )
            .optional("gene", ParamKind::String, "Gene symbol to narrow the search")
            .optional("datasource", ParamKind::String, "Data source filter")
            .optional("limit", ParamKind::Integer, "Maximum pathways (default 10)"),
            ToolSpec::new(
                "pathwaycommons_graph",
                "Get a pathway graph/network from Pathway Commons.",
            )
            .required("source", ParamKind::StringList, "Source gene symbols or URIs")
            .optional("target", ParamKind::StringList, "Target gene symbols or URIs")
            .optional("kind", ParamKind::String, "neighborhood (default), pathsbetween, pathsfromto, commonstream, commonupstream")
            .optional("limit", ParamKind::Integer, "Search distance (default 1)")
            .optional("format", ParamKind::String, "json (default), biopax, sif"),
            ToolSpec::new(
                "pathwaycommons_traverse",
                "Traverse pathway data in Pathway Commons.",
            )
            .required("uri", ParamKind::String, "Start URI")
            .required("path", ParamKind::String, "BioPAX property path, e.g. Pathway/pathwayComponent")
            .optional("format", ParamKind::String, "json (default)"),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "pathwaycommons_search" => {
                let datasource = args.opt_str("datasource")?;
                self.search(
                    &args.str("q")?,
                    &args.str_or("type", "Pathway")?,
                    &args.str_or("format", "json")?,
                    args.int_or("page", 0)?,
                    datasource.as_deref(),
                )
                .await
            }
            "pathwaycommons_get_pathway_by_uri" => {
                let format = args.str_or("format", "json")?;
                self.get_pathway_by_uri(&args.str("uri")?, &format).await
            }
            "pathwaycommons_top_pathways" => {
                let gene = args.opt_str("gene")?;
                let datasource = args.opt_str("datasource")?;
                self.top_pathways(gene.as_deref(), datasource.as_deref(), args.int_or("limit", 10)?)
                    .await
            }
            "pathwaycommons_graph" => {
                let query = GraphQuery {
                    source: args.list("source")?,
                    target: args.opt_list("target")?.unwrap_or_default(),
                    kind: args.str_or("kind", "neighborhood")?,
                    limit: args.int_or("limit", 1)?,
                    format: args.str_or("format", "json")?,
                };
                self.graph(&query).await
            }
            "pathwaycommons_traverse" => {
                let format = args.str_or("format", "json")?;
                self.traverse(&args.str("uri")?, &args.str("path")?, &format)
                    .await
            }
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

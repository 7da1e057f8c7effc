//! OMIM API client (<https://omim.org/help/api>).
//!
//! Every request needs an API key, passed per call or set once under
//! `apis.omim.api_key`.

use crate::client::{count_metadata, ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata, QueryParams};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const API_NAME: &str = "OMIM";
pub const BASE_URL: &str = "https://api.omim.org/api";

/// OMIM caps search pages at 100 entries
const MAX_LIMIT: u64 = 100;

#[derive(Debug)]
pub struct OmimClient {
    base: BaseApiClient,
    default_api_key: Option<String>,
}

/// Paging and detail options shared by the search operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub include: String,
    pub limit: u64,
    pub start: u64,
}

impl OmimClient {
    #[must_use]
    pub fn default_config() -> ClientConfig {
        ClientConfig::new(BASE_URL, API_NAME)
    }

    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base: BaseApiClient::new(config),
            default_api_key: None,
        }
    }

    /// Key used when a call does not supply one
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.default_api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    fn key<'a>(&'a self, api_key: Option<&'a str>) -> Result<&'a str> {
        api_key
            .filter(|k| !k.trim().is_empty())
            .or(self.default_api_key.as_deref())
            .ok_or_else(|| {
                Error::invalid_input(
                    "api_key",
                    "OMIM requires an API key (argument or apis.omim.api_key)",
                )
            })
    }

    fn params(api_key: &str, include: &str) -> QueryParams {
        QueryParams::new()
            .push("format", "json")
            .push("include", include)
            .push("apiKey", api_key)
    }

    pub async fn get_entry(
        &mut self,
        mim_number: &str,
        api_key: Option<&str>,
        include: &str,
    ) -> Result<ApiResponse> {
        let params = Self::params(self.key(api_key)?, include).push("mimNumber", mim_number.trim());
        let data = self.base.get_json("/entry", Some(&params)).await?;
        Ok(self.base.format_response(data, None))
    }

    pub async fn search_entries(
        &mut self,
        search: &str,
        api_key: Option<&str>,
        options: &SearchOptions,
    ) -> Result<ApiResponse> {
        self.search("/entry/search", search, api_key, options, "entryList")
            .await
    }

    /// Entries whose approved gene symbol matches
    pub async fn get_gene(
        &mut self,
        gene_symbol: &str,
        api_key: Option<&str>,
        include: &str,
    ) -> Result<ApiResponse> {
        let params = Self::params(self.key(api_key)?, include)
            .push("search", format!("approved_gene_symbol:{}", gene_symbol.trim()));
        let data = self.base.get_json("/entry/search", Some(&params)).await?;
        let metadata = list_count(&data, "entryList", "results");
        Ok(self.base.format_response(data, metadata))
    }

    /// Search the gene map
    pub async fn search_genes(
        &mut self,
        search: &str,
        api_key: Option<&str>,
        options: &SearchOptions,
    ) -> Result<ApiResponse> {
        self.search("/geneMap/search", search, api_key, options, "geneMapList")
            .await
    }

    /// Phenotype entries are regular entries looked up by MIM number
    pub async fn get_phenotype(
        &mut self,
        mim_number: &str,
        api_key: Option<&str>,
        include: &str,
    ) -> Result<ApiResponse> {
        self.get_entry(mim_number, api_key, include).await
    }

    /// Search restricted to entries with a known molecular basis (`#` prefix)
    pub async fn search_phenotypes(
        &mut self,
        search: &str,
        api_key: Option<&str>,
        options: &SearchOptions,
    ) -> Result<ApiResponse> {
        let search = format!("{} AND prefix:#", search.trim());
        self.search("/entry/search", &search, api_key, options, "entryList")
            .await
    }

    async fn search(
        &mut self,
        path: &str,
        search: &str,
        api_key: Option<&str>,
        options: &SearchOptions,
        list_field: &str,
    ) -> Result<ApiResponse> {
        let params = Self::params(self.key(api_key)?, &options.include)
            .push("search", search)
            .push("limit", clamp_limit(options.limit, MAX_LIMIT))
            .push("start", options.start);
        let data = self.base.get_json(path, Some(&params)).await?;
        let metadata = list_count(&data, list_field, "results");
        Ok(self.base.format_response(data, metadata))
    }
}

impl Default for OmimClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// Count `omim.searchResponse.<field>`
fn list_count(data: &Value, field: &str, key: &str) -> Option<Metadata> {
    data.pointer(&format!("/omim/searchResponse/{field}"))
        .and_then(Value::as_array)
        .map(|items| count_metadata(key, items.len()))
}

fn search_options(args: &ToolArgs, include: &str) -> Result<SearchOptions> {
    Ok(SearchOptions {
        include: args.str_or("include", include)?,
        limit: args.int_or("limit", 20)?,
        start: args.int_or("start", 0)?,
    })
}

impl ApiClient for OmimClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

fn search_spec(name: &'static str, description: &'static str) -> ToolSpec {
    ToolSpec::new(name, description)
        .required("search", ParamKind::String, "OMIM search expression")
        .optional("api_key", ParamKind::String, "OMIM API key (falls back to configuration)")
        .optional("include", ParamKind::String, "Sections to include")
        .optional("limit", ParamKind::Integer, "Maximum results (default 20, max 100)")
        .optional("start", ParamKind::Integer, "Offset (default 0)")
}

#[async_trait]
impl ToolSet for OmimClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let api_key = "OMIM API key (falls back to configuration)";
        vec![
            ToolSpec::new("omim_get_entry", "Get entry information from OMIM by MIM number.")
                .required("mim_number", ParamKind::String, "MIM number, e.g. 191170")
                .optional("api_key", ParamKind::String, api_key)
                .optional("include", ParamKind::String, "Sections to include (default text)"),
            search_spec("omim_search_entries", "Search entries in OMIM."),
            ToolSpec::new("omim_get_gene", "Get gene information from OMIM by gene symbol.")
                .required("gene_symbol", ParamKind::String, "Approved gene symbol, e.g. TP53")
                .optional("api_key", ParamKind::String, api_key)
                .optional("include", ParamKind::String, "Sections to include (default geneMap)"),
            search_spec("omim_search_genes", "Search genes in OMIM."),
            ToolSpec::new(
                "omim_get_phenotype",
                "Get phenotype information from OMIM by MIM number.",
            )
            .required("mim_number", ParamKind::String, "MIM number")
            .optional("api_key", ParamKind::String, api_key)
            .optional("include", ParamKind::String, "Sections to include (default text)"),
            search_spec("omim_search_phenotypes", "Search phenotypes in OMIM."),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        let api_key = args.opt_str("api_key")?;
        let api_key = api_key.as_deref();
        match name {
            "omim_get_entry" => {
                let include = args.str_or("include", "text")?;
                self.get_entry(&args.str("mim_number")?, api_key, &include)
                    .await
            }
            "omim_search_entries" => {
                let options = search_options(args, "text")?;
                self.search_entries(&args.str("search")?, api_key, &options)
                    .await
            }
            "omim_get_gene" => {
                let include = args.str_or("include", "geneMap")?;
                self.get_gene(&args.str("gene_symbol")?, api_key, &include)
                    .await
            }
            "omim_search_genes" => {
                let options = search_options(args, "geneMap")?;
                self.search_genes(&args.str("search")?, api_key, &options)
                    .await
            }
            "omim_get_phenotype" => {
                let include = args.str_or("include", "text")?;
                self.get_phenotype(&args.str("mim_number")?, api_key, &include)
                    .await
            }
            "omim_search_phenotypes" => {
                let options = search_options(args, "text")?;
                self.search_phenotypes(&args.str("search")?, api_key, &options)
                    .await
            }
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

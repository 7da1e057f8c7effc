//! GWAS Catalog REST client (<https://www.ebi.ac.uk/gwas/rest/docs/api>).
//!
//! Collections come back as HAL documents (`_embedded`, `page`).

use super::segment;
use crate::client::{ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata, QueryParams};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const API_NAME: &str = "GWAS Catalog";
pub const BASE_URL: &str = "https://www.ebi.ac.uk/gwas/rest/api";

const MAX_PAGE_SIZE: u64 = 500;

/// Page window for collection endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: u64,
    pub page: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { size: 20, page: 0 }
    }
}

/// Filters for association searches; the most specific one present wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationFilter {
    pub query: Option<String>,
    pub variant_id: Option<String>,
    pub study_id: Option<String>,
    pub trait_name: Option<String>,
}

#[derive(Debug)]
pub struct GwasClient {
    base: BaseApiClient,
}

impl GwasClient {
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

    async fn record(&mut self, path: String) -> Result<ApiResponse> {
        let data = self.base.get_json(&path, None).await?;
        Ok(self.base.format_response(data, None))
    }

    async fn collection(&mut self, path: &str, params: QueryParams, page: Page) -> Result<ApiResponse> {
        let params = params
            .push("size", clamp_limit(page.size, MAX_PAGE_SIZE))
            .push("page", page.page);
        let data = self.base.get_json(path, Some(&params)).await?;
        let metadata = hal_metadata(&data);
        Ok(self.base.format_response(data, metadata))
    }

    pub async fn get_association(&mut self, association_id: &str) -> Result<ApiResponse> {
        self.record(format!("/associations/{}", segment(association_id)))
            .await
    }

    pub async fn search_associations(
        &mut self,
        filter: &AssociationFilter,
        page: Page,
    ) -> Result<ApiResponse> {
        if let Some(ref variant) = filter.variant_id {
            let path = format!("/singleNucleotidePolymorphisms/{}/associations", segment(variant));
            return self.collection(&path, QueryParams::new(), page).await;
        }
        if let Some(ref study) = filter.study_id {
            let path = format!("/studies/{}/associations", segment(study));
            return self.collection(&path, QueryParams::new(), page).await;
        }
        if let Some(efo_trait) = filter.trait_name.as_ref().or(filter.query.as_ref()) {
            let params = QueryParams::new().push("efoTrait", efo_trait);
            return self
                .collection("/associations/search/findByEfoTrait", params, page)
                .await;
        }
        self.collection("/associations", QueryParams::new(), page)
            .await
    }

    /// SNP by rsId
    pub async fn get_variant(&mut self, variant_id: &str) -> Result<ApiResponse> {
        self.record(format!("/singleNucleotidePolymorphisms/{}", segment(variant_id)))
            .await
    }

    pub async fn search_variants(&mut self, query: Option<&str>, page: Page) -> Result<ApiResponse> {
        match query {
            Some(rs_id) => {
                let params = QueryParams::new().push("rsId", rs_id);
                self.collection("/singleNucleotidePolymorphisms/search/findByRsId", params, page)
                    .await
            }
            None => {
                self.collection("/singleNucleotidePolymorphisms", QueryParams::new(), page)
                    .await
            }
        }
    }

    pub async fn get_study(&mut self, study_id: &str) -> Result<ApiResponse> {
        self.record(format!("/studies/{}", segment(study_id))).await
    }

    pub async fn search_studies(
        &mut self,
        query: Option<&str>,
        trait_name: Option<&str>,
        page: Page,
    ) -> Result<ApiResponse> {
        if let Some(efo_trait) = trait_name {
            let params = QueryParams::new().push("efoTrait", efo_trait);
            return self
                .collection("/studies/search/findByEfoTrait", params, page)
                .await;
        }
        if let Some(disease_trait) = query {
            let params = QueryParams::new().push("diseaseTrait", disease_trait);
            return self
                .collection("/studies/search/findByDiseaseTrait", params, page)
                .await;
        }
        self.collection("/studies", QueryParams::new(), page).await
    }

    /// EFO trait by short form id (e.g. `EFO_0000305`)
    pub async fn get_trait(&mut self, trait_id: &str) -> Result<ApiResponse> {
        self.record(format!("/efoTraits/{}", segment(trait_id))).await
    }

    pub async fn search_traits(&mut self, query: Option<&str>, page: Page) -> Result<ApiResponse> {
        match query {
            Some(name) => {
                let params = QueryParams::new().push("trait", name);
                self.collection("/efoTraits/search/findByEfoTrait", params, page)
                    .await
            }
            None => self.collection("/efoTraits", QueryParams::new(), page).await,
        }
    }
}

impl Default for GwasClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// `{results, total}` from a HAL collection
fn hal_metadata(data: &Value) -> Option<Metadata> {
    let embedded = data.get("_embedded")?.as_object()?;
    let count: usize = embedded
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .sum();

    let mut metadata = Metadata::new();
    metadata.insert("results".to_string(), Value::from(count));
    if let Some(total) = data.pointer("/page/totalElements") {
        metadata.insert("total".to_string(), total.clone());
    }
    Some(metadata)
}

fn page(args: &ToolArgs) -> Result<Page> {
    Ok(Page {
        size: args.int_or("size", 20)?,
        page: args.int_or("page", 0)?,
    })
}

fn paged(spec: ToolSpec) -> ToolSpec {
    spec.optional("size", ParamKind::Integer, "Page size (default 20)")
        .optional("page", ParamKind::Integer, "Page number (default 0)")
}

impl ApiClient for GwasClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for GwasClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "gwas_get_association",
                "Get association information from GWAS Catalog by ID.",
            )
            .required("association_id", ParamKind::String, "Association id"),
            paged(
                ToolSpec::new("gwas_search_associations", "Search for associations in GWAS Catalog.")
                    .optional("query", ParamKind::String, "Trait text")
                    .optional("variant_id", ParamKind::String, "rsId, e.g. rs7329174")
                    .optional("study_id", ParamKind::String, "Study accession, e.g. GCST000854")
                    .optional("trait", ParamKind::String, "EFO trait name"),
            ),
            ToolSpec::new(
                "gwas_get_variant",
                "Get single nucleotide polymorphism (SNP) information from GWAS Catalog by rsId.",
            )
            .required("variant_id", ParamKind::String, "rsId"),
            paged(
                ToolSpec::new("gwas_search_variants", "Search for SNPs/variants in GWAS Catalog by rsId.")
                    .optional("query", ParamKind::String, "rsId"),
            ),
            ToolSpec::new("gwas_get_study", "Get study information from GWAS Catalog by ID.")
                .required("study_id", ParamKind::String, "Study accession"),
            paged(
                ToolSpec::new("gwas_search_studies", "Search for studies in GWAS Catalog.")
                    .optional("query", ParamKind::String, "Reported disease trait")
                    .optional("trait", ParamKind::String, "EFO trait name"),
            ),
            ToolSpec::new("gwas_get_trait", "Get trait information from GWAS Catalog by ID.")
                .required("trait_id", ParamKind::String, "EFO id, e.g. EFO_0000305"),
            paged(
                ToolSpec::new("gwas_search_traits", "Search for traits in GWAS Catalog.")
                    .optional("query", ParamKind::String, "Trait name"),
            ),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "gwas_get_association" => self.get_association(&args.str("association_id")?).await,
            "gwas_search_associations" => {
                let filter = AssociationFilter {
                    query: args.opt_str("query")?,
                    variant_id: args.opt_str("variant_id")?,
                    study_id: args.opt_str("study_id")?,
                    trait_name: args.opt_str("trait")?,
                };
                self.search_associations(&filter, page(args)?).await
            }
            "gwas_get_variant" => self.get_variant(&args.str("variant_id")?).await,
            "gwas_search_variants" => {
                let query = args.opt_str("query")?;
                self.search_variants(query.as_deref(), page(args)?).await
            }
            "gwas_get_study" => self.get_study(&args.str("study_id")?).await,
            "gwas_search_studies" => {
                let query = args.opt_str("query")?;
                let trait_name = args.opt_str("trait")?;
                self.search_studies(query.as_deref(), trait_name.as_deref(), page(args)?)
                    .await
            }
            "gwas_get_trait" => self.get_trait(&args.str("trait_id")?).await,
            "gwas_search_traits" => {
                let query = args.opt_str("query")?;
                self.search_traits(query.as_deref(), page(args)?).await
            }
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

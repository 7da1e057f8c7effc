//! KEGG REST client (<https://www.kegg.jp/kegg/rest/keggapi.html>).
//!
//! Every operation answers KEGG flat-file or tab-separated text.

use crate::client::{ApiClient, ApiResponse, BaseApiClient, ClientConfig};
use crate::tools::{ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const API_NAME: &str = "KEGG";
pub const BASE_URL: &str = "https://rest.kegg.jp";

/// KEGG allows three requests per second
const MIN_REQUEST_GAP: Duration = Duration::from_millis(350);

#[derive(Debug)]
pub struct KeggClient {
    base: BaseApiClient,
}

impl KeggClient {
    #[must_use]
    pub fn default_config() -> ClientConfig {
        ClientConfig::new(BASE_URL, API_NAME).with_rate_limit(MIN_REQUEST_GAP)
    }

    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base: BaseApiClient::new(config),
        }
    }

    async fn text(&mut self, path: &str) -> Result<ApiResponse> {
        let text = self.base.get_text(path, None).await?;
        Ok(self.base.format_response(text, None))
    }

    pub async fn get_pathway_info(&mut self, pathway_id: &str) -> Result<ApiResponse> {
        self.text(&format!("/get/{}", entry(pathway_id))).await
    }

    /// All reference pathways, or those of one organism code (e.g. `hsa`)
    pub async fn list_pathways(&mut self, organism: Option<&str>) -> Result<ApiResponse> {
        match organism {
            Some(org) => self.text(&format!("/list/pathway/{}", entry(org))).await,
            None => self.text("/list/pathway").await,
        }
    }

    pub async fn find_pathways(&mut self, query: &str) -> Result<ApiResponse> {
        self.text(&format!("/find/pathway/{}", keywords(query))).await
    }

    pub async fn get_gene(&mut self, gene_id: &str) -> Result<ApiResponse> {
        self.text(&format!("/get/{}", entry(gene_id))).await
    }

    /// Search genes across all organisms, or within one
    pub async fn find_genes(&mut self, query: &str, organism: Option<&str>) -> Result<ApiResponse> {
        let database = organism.map_or_else(|| "genes".to_string(), entry);
        self.text(&format!("/find/{}/{}", database, keywords(query)))
            .await
    }

    pub async fn get_disease(&mut self, disease_id: &str) -> Result<ApiResponse> {
        self.text(&format!("/get/{}", entry(disease_id))).await
    }

    pub async fn find_diseases(&mut self, query: &str) -> Result<ApiResponse> {
        self.text(&format!("/find/disease/{}", keywords(query))).await
    }

    /// Genes linked to a pathway
    pub async fn link_pathway_genes(&mut self, pathway_id: &str) -> Result<ApiResponse> {
        let pathway = entry(pathway_id);
        let target = pathway
            .split_once(':')
            .map_or(pathway.as_str(), |(_, id)| id)
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect::<String>();
        let database = if target.is_empty() || target == "map" {
            "genes".to_string()
        } else {
            target
        };
        self.text(&format!("/link/{database}/{pathway}")).await
    }
}

impl Default for KeggClient {
    fn default() -> Self {
        Self::with_config(Self::default_config())
    }
}

/// KEGG identifiers keep their `db:id` colon and `+` separators
fn entry(id: &str) -> String {
    urlencoding::encode(id.trim())
        .replace("%3A", ":")
        .replace("%2B", "+")
}

/// Free text becomes `+`-joined KEGG keywords
fn keywords(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

impl ApiClient for KeggClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for KeggClient {
    fn name(&self) -> &str {
        API_NAME
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("kegg_get_pathway_info", "Get a KEGG pathway entry.")
                .required("pathway_id", ParamKind::String, "Pathway id, e.g. hsa04110"),
            ToolSpec::new("kegg_list_pathways", "List KEGG pathways.").optional(
                "organism",
                ParamKind::String,
                "Organism code, e.g. hsa; omit for reference pathways",
            ),
            ToolSpec::new("kegg_find_pathways", "Find KEGG pathways by keyword.")
                .required("query", ParamKind::String, "Keywords"),
            ToolSpec::new("kegg_get_gene", "Get a KEGG gene entry.")
                .required("gene_id", ParamKind::String, "Gene id, e.g. hsa:7157"),
            ToolSpec::new("kegg_find_genes", "Find KEGG genes by keyword.")
                .required("query", ParamKind::String, "Keywords")
                .optional("organism", ParamKind::String, "Organism code, e.g. hsa"),
            ToolSpec::new("kegg_get_disease", "Get a KEGG disease entry.")
                .required("disease_id", ParamKind::String, "Disease id, e.g. H00004"),
            ToolSpec::new("kegg_find_diseases", "Find KEGG diseases by keyword.")
                .required("query", ParamKind::String, "Keywords"),
            ToolSpec::new("kegg_link_pathway_genes", "List genes linked to a KEGG pathway.")
                .required("pathway_id", ParamKind::String, "Pathway id, e.g. hsa05130"),
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        match name {
            "kegg_get_pathway_info" => self.get_pathway_info(&args.str("pathway_id")?).await,
            "kegg_list_pathways" => {
                let organism = args.opt_str("organism")?;
                self.list_pathways(organism.as_deref()).await
            }
            "kegg_find_pathways" => self.find_pathways(&args.str("query")?).await,
            "kegg_get_gene" => self.get_gene(&args.str("gene_id")?).await,
            "kegg_find_genes" => {
                let organism = args.opt_str("organism")?;
                self.find_genes(&args.str("query")?, organism.as_deref())
                    .await
            }
            "kegg_get_disease" => self.get_disease(&args.str("disease_id")?).await,
            "kegg_find_diseases" => self.find_diseases(&args.str("query")?).await,
            "kegg_link_pathway_genes" => self.link_pathway_genes(&args.str("pathway_id")?).await,
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

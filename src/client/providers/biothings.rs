//! BioThings suite clients: MyGene.info, MyDisease.info and MyChem.info.
//!
//! The three services share one API shape (annotation endpoint plus `/query`),
//! so a single client type serves all of them, parameterized by
//! [`BioThingsKind`]. Identifiers go straight to the annotation endpoint; free
//! text names are resolved through `/query` first.

use super::{matches, segment};
use crate::client::{ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata, QueryParams};
use crate::tools::{clamp_limit, ParamKind, ToolArgs, ToolSet, ToolSpec};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

const MAX_SIZE: u64 = 1000;

static INCHIKEY: OnceLock<Option<Regex>> = OnceLock::new();
static DRUG_ID: OnceLock<Option<Regex>> = OnceLock::new();
static ENSEMBL_GENE: OnceLock<Option<Regex>> = OnceLock::new();

/// Which BioThings service a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BioThingsKind {
    Gene,
    Disease,
    Chem,
}

impl BioThingsKind {
    pub const ALL: [Self; 3] = [Self::Gene, Self::Disease, Self::Chem];

    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Gene => "MyGene",
            Self::Disease => "MyDisease",
            Self::Chem => "MyChem",
        }
    }

    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Gene => "https://mygene.info/v3",
            Self::Disease => "https://mydisease.info/v1",
            Self::Chem => "https://mychem.info/v1",
        }
    }

    /// Annotation endpoint segment
    const fn entity(self) -> &'static str {
        match self {
            Self::Gene => "gene",
            Self::Disease => "disease",
            Self::Chem => "chem",
        }
    }

    const fn get_tool(self) -> &'static str {
        match self {
            Self::Gene => "mygene_get_gene",
            Self::Disease => "mydisease_get_disease",
            Self::Chem => "mychem_get_drug",
        }
    }

    const fn query_tool(self) -> &'static str {
        match self {
            Self::Gene => "mygene_query_genes",
            Self::Disease => "mydisease_query_diseases",
            Self::Chem => "mychem_query_drugs",
        }
    }

    /// Argument name of the identifier in the get tool
    const fn id_param(self) -> &'static str {
        match self {
            Self::Gene => "gene_id",
            Self::Disease => "disease_id",
            Self::Chem => "drug_id",
        }
    }

    /// Whether `value` is an identifier the annotation endpoint accepts as is
    #[must_use]
    pub fn is_identifier(self, value: &str) -> bool {
        let value = value.trim();
        match self {
            Self::Gene => {
                (!value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
                    || matches(&ENSEMBL_GENE, r"^ENS[A-Z]*G\d{11}$", value)
            }
            Self::Disease => value.contains(':'),
            Self::Chem => {
                matches(&INCHIKEY, r"^[A-Z]{14}-[A-Z]{10}-[A-Z]$", value)
                    || matches(&DRUG_ID, r"^(CHEMBL\d+|DB\d{5})$", &value.to_ascii_uppercase())
            }
        }
    }

    /// Query string used to resolve a free-text name
    fn name_query(self, name: &str) -> String {
        match self {
            Self::Gene => format!("symbol:{}", name.trim()),
            Self::Disease | Self::Chem => name.trim().to_string(),
        }
    }
}

#[derive(Debug)]
pub struct BioThingsClient {
    kind: BioThingsKind,
    base: BaseApiClient,
}

impl BioThingsClient {
    #[must_use]
    pub fn default_config(kind: BioThingsKind) -> ClientConfig {
        ClientConfig::new(kind.base_url(), kind.api_name())
    }

    #[must_use]
    pub fn with_config(kind: BioThingsKind, config: ClientConfig) -> Self {
        Self {
            kind,
            base: BaseApiClient::new(config),
        }
    }

    #[must_use]
    pub fn new(kind: BioThingsKind) -> Self {
        Self::with_config(kind, Self::default_config(kind))
    }

    #[must_use]
    pub const fn kind(&self) -> BioThingsKind {
        self.kind
    }

    /// Annotation record for an identifier or a name
    pub async fn get(&mut self, id_or_name: &str, fields: Option<&str>) -> Result<ApiResponse> {
        let id = if self.kind.is_identifier(id_or_name) {
            id_or_name.trim().to_string()
        } else {
            self.resolve(id_or_name).await?
        };

        let params = QueryParams::new().push_opt("fields", fields);
        let path = format!("/{}/{}", self.kind.entity(), segment(&id));
        let data = self.base.get_json(&path, Some(&params)).await?;
        Ok(self.base.format_response(data, None))
    }

    /// Raw `/query` search
    pub async fn query(
        &mut self,
        q: &str,
        size: u64,
        fields: Option<&str>,
        species: Option<&str>,
    ) -> Result<ApiResponse> {
        let data = self.query_raw(q, size, fields, species).await?;
        let metadata = hits_metadata(&data);
        Ok(self.base.format_response(data, metadata))
    }

    async fn query_raw(
        &mut self,
        q: &str,
        size: u64,
        fields: Option<&str>,
        species: Option<&str>,
    ) -> Result<Value> {
        let params = QueryParams::new()
            .push("q", q)
            .push("size", clamp_limit(size, MAX_SIZE))
            .push_opt("fields", fields)
            .push_opt("species", species);
        self.base.get_json("/query", Some(&params)).await
    }

    /// `_id` of the best `/query` hit for a name
    async fn resolve(&mut self, name: &str) -> Result<String> {
        let species = (self.kind == BioThingsKind::Gene).then_some("human");
        let query = self.kind.name_query(name);
        let data = self.query_raw(&query, 1, Some("_id"), species).await?;

        let id = data
            .get("hits")
            .and_then(Value::as_array)
            .and_then(|hits| hits.first())
            .and_then(|hit| hit.get("_id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        match id {
            Some(id) => {
                debug!("{} resolved '{}' to {}", self.kind.api_name(), name, id);
                Ok(id)
            }
            None => Err(Error::Remote {
                context: self.kind.api_name().to_string(),
                message: format!("no {} found for '{}'", self.kind.entity(), name.trim()),
            }),
        }
    }
}

/// `{hits, total}` from a `/query` answer
fn hits_metadata(data: &Value) -> Option<Metadata> {
    let hits = data.get("hits")?.as_array()?;
    let mut metadata = Metadata::new();
    metadata.insert("hits".to_string(), Value::from(hits.len()));
    if let Some(total) = data.get("total") {
        metadata.insert("total".to_string(), total.clone());
    }
    Some(metadata)
}

impl ApiClient for BioThingsClient {
    fn base(&self) -> &BaseApiClient {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseApiClient {
        &mut self.base
    }
}

#[async_trait]
impl ToolSet for BioThingsClient {
    fn name(&self) -> &str {
        self.kind.api_name()
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        let (get_description, id_description, query_description) = match self.kind {
            BioThingsKind::Gene => (
                "Get gene annotation from MyGene.info by Entrez/Ensembl id or symbol.",
                "Entrez id (7157), Ensembl id, or symbol (TP53)",
                "Query genes in MyGene.info.",
            ),
            BioThingsKind::Disease => (
                "Get disease annotation from MyDisease.info by id or name.",
                "Disease id (MONDO:0005105) or name (melanoma)",
                "Query diseases in MyDisease.info.",
            ),
            BioThingsKind::Chem => (
                "Get drug/chemical annotation from MyChem.info by id or name.",
                "InChIKey, ChEMBL or DrugBank id, or name (imatinib)",
                "Query drugs and chemicals in MyChem.info.",
            ),
        };

        let mut query = ToolSpec::new(self.kind.query_tool(), query_description)
            .required("query", ParamKind::String, "BioThings query string")
            .optional("size", ParamKind::Integer, "Maximum hits (default 10)")
            .optional("fields", ParamKind::String, "Comma-separated fields to return");
        if self.kind == BioThingsKind::Gene {
            query = query.optional("species", ParamKind::String, "Species filter, e.g. human");
        }

        vec![
            ToolSpec::new(self.kind.get_tool(), get_description)
                .required(self.kind.id_param(), ParamKind::String, id_description)
                .optional("fields", ParamKind::String, "Comma-separated fields to return"),
            query,
        ]
    }

    async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
        let fields = args.opt_str("fields")?;
        if name == self.kind.get_tool() {
            let id = args.str(self.kind.id_param())?;
            return self.get(&id, fields.as_deref()).await;
        }
        if name == self.kind.query_tool() {
            let species = args.opt_str("species")?;
            return self
                .query(
                    &args.str("query")?,
                    args.int_or("size", 10)?,
                    fields.as_deref(),
                    species.as_deref(),
                )
                .await;
        }
        Err(Error::UnknownTool(name.to_string()))
    }

    fn close(&mut self) {
        ApiClient::close(self);
    }
}

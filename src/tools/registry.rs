//! # Client Registry
//!
//! Owns one instance of every API client plus the playbook tools for the
//! lifetime of the process, and routes tool calls to them by name.

use super::{PlaybookTools, ToolArgs, ToolSet, ToolSpec};
use crate::client::providers::{
    BioThingsClient, BioThingsKind, ChemblClient, ClinicalTrialsClient, GwasClient, KeggClient,
    OmimClient, PathwayCommonsClient, ReactomeClient, UniProtClient,
};
use crate::client::ApiResponse;
use crate::config::Config;
use crate::repositories::playbook::PlaybookRepository;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Every tool set, each behind its own lock so calls to different APIs run
/// concurrently while calls to the same API are serialized
pub struct ClientRegistry {
    sets: Vec<Mutex<Box<dyn ToolSet>>>,
    routes: HashMap<&'static str, usize>,
    specs: Vec<ToolSpec>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("sets", &self.sets.len())
            .field("tools", &self.specs.len())
            .finish()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            sets: Vec::new(),
            routes: HashMap::new(),
            specs: Vec::new(),
        }
    }

    /// Build every client from configuration and load the playbooks
    pub fn from_config(config: &Config) -> Result<Self> {
        let omim_key = config.api("omim").and_then(|s| s.api_key.clone());
        if omim_key.is_none() {
            debug!("No OMIM API key configured; OMIM tools need an api_key argument");
        }

        let mut registry = Self::new();
        registry.register(Box::new(
            UniProtClient::with_config(config.client_config(UniProtClient::default_config()))
                .with_poll_config(config.poll_config()),
        ))?;
        registry.register(Box::new(KeggClient::with_config(
            config.client_config(KeggClient::default_config()),
        )))?;
        registry.register(Box::new(ReactomeClient::with_config(
            config.client_config(ReactomeClient::default_config()),
        )))?;
        registry.register(Box::new(
            OmimClient::with_config(config.client_config(OmimClient::default_config()))
                .with_api_key(omim_key),
        ))?;
        registry.register(Box::new(GwasClient::with_config(
            config.client_config(GwasClient::default_config()),
        )))?;
        registry.register(Box::new(PathwayCommonsClient::with_config(
            config.client_config(PathwayCommonsClient::default_config()),
        )))?;
        registry.register(Box::new(ChemblClient::with_config(
            config.client_config(ChemblClient::default_config()),
        )))?;
        registry.register(Box::new(ClinicalTrialsClient::with_config(
            config.client_config(ClinicalTrialsClient::default_config()),
        )))?;
        for kind in BioThingsKind::ALL {
            registry.register(Box::new(BioThingsClient::with_config(
                kind,
                config.client_config(BioThingsClient::default_config(kind)),
            )))?;
        }

        let playbooks = load_playbooks(config)?;
        registry.register(Box::new(PlaybookTools::new(Arc::new(playbooks))))?;

        info!(
            "Registered {} tools across {} tool sets",
            registry.tool_count(),
            registry.sets.len()
        );
        Ok(registry)
    }

    /// Add a tool set; tool names must be unique across the registry
    pub fn register(&mut self, set: Box<dyn ToolSet>) -> Result<()> {
        let index = self.sets.len();
        let specs = set.tool_specs();

        for spec in &specs {
            if self.routes.contains_key(spec.name) {
                return Err(Error::Service(format!(
                    "tool '{}' from {} is already registered",
                    spec.name,
                    set.name()
                )));
            }
        }

        debug!("Registering {} ({} tools)", set.name(), specs.len());
        for spec in &specs {
            self.routes.insert(spec.name, index);
        }
        self.specs.extend(specs);
        self.sets.push(Mutex::new(set));
        Ok(())
    }

    /// Every registered tool, in registration order
    #[must_use]
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.specs.len()
    }

    /// Route a call to the tool set that owns `name`
    #[instrument(skip(self, arguments), fields(request_id = %uuid::Uuid::new_v4()))]
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ApiResponse> {
        let index = *self
            .routes
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        let args = ToolArgs::from_value(arguments)?;

        let mut set = self.sets[index].lock().await;
        let result = set.call_tool(name, &args).await;
        if let Err(ref e) = result {
            warn!("Tool {} failed: {}", name, e);
        }
        result
    }

    /// Release every client's transport and flush caches
    pub async fn shutdown(&self) {
        for set in &self.sets {
            let mut set = set.lock().await;
            debug!("Closing {}", set.name());
            set.close();
        }
        info!("All API clients closed");
    }
}

/// Load playbooks from the configured directory; a missing directory yields
/// an empty set, a malformed playbook fails the load
pub fn load_playbooks(config: &Config) -> Result<PlaybookRepository> {
    let dir = &config.playbooks.directory;
    if !dir.is_dir() {
        warn!("Playbook directory {} not found; no playbooks loaded", dir.display());
        return Ok(PlaybookRepository::empty());
    }
    Ok(PlaybookRepository::load_dir(dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParamKind;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct Echo {
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl ToolSet for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn tool_specs(&self) -> Vec<ToolSpec> {
            vec![ToolSpec::new("echo", "Echo a word").required("word", ParamKind::String, "Word")]
        }

        async fn call_tool(&mut self, name: &str, args: &ToolArgs) -> Result<ApiResponse> {
            match name {
                "echo" => Ok(ApiResponse::Text(args.str("word")?)),
                other => Err(Error::UnknownTool(other.to_string())),
            }
        }

        fn close(&mut self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn echo() -> (Box<Echo>, Arc<std::sync::atomic::AtomicBool>) {
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        (
            Box::new(Echo {
                closed: Arc::clone(&closed),
            }),
            closed,
        )
    }

    #[tokio::test]
    async fn test_routes_calls_and_closes() {
        let mut registry = ClientRegistry::new();
        let (set, closed) = echo();
        registry.register(set).unwrap();

        let result = registry.call("echo", json!({"word": "hello"})).await.unwrap();
        assert_eq!(result.as_text(), Some("hello"));

        let err = registry.call("echo", json!({})).await.unwrap_err();
        assert!(err.is_caller_error());

        let err = registry.call("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));

        registry.shutdown().await;
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let mut registry = ClientRegistry::new();
        registry.register(echo().0).unwrap();
        let err = registry.register(echo().0).unwrap_err();
        assert!(err.to_string().contains("'echo'"));
        assert_eq!(registry.tool_count(), 1);
    }

    #[test]
    fn test_from_config_registers_every_api() {
        let mut config = Config::default();
        config.cache.enabled = false;
        config.playbooks.directory = "/definitely/not/here".into();

        let registry = ClientRegistry::from_config(&config).unwrap();
        for tool in [
            "uniprot_map_ids",
            "kegg_get_pathway_info",
            "reactome_get_pathway",
            "omim_get_entry",
            "gwas_get_association",
            "pathwaycommons_graph",
            "chembl_get_molecule",
            "ctg_get_study",
            "mygene_get_gene",
            "mydisease_query_diseases",
            "mychem_get_drug",
            "playbook_list",
        ] {
            assert!(registry.spec(tool).is_some(), "missing {tool}");
        }
    }

    #[test]
    fn test_malformed_playbook_fails_startup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "name: no id\nsteps: []\n").unwrap();

        let mut config = Config::default();
        config.cache.enabled = false;
        config.playbooks.directory = dir.path().to_path_buf();

        let err = ClientRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Playbook(_)));
    }
}

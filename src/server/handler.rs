use crate::tools::{ClientRegistry, ToolSpec};
use crate::{Config, Error};
use rmcp::{
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData, ServerHandler,
};
use std::{future::Future, sync::Arc};
use tracing::{debug, info, instrument};

const INSTRUCTIONS: &str = "Biomedical research tools backed by public APIs: UniProt, KEGG, \
Reactome, OMIM, GWAS Catalog, Pathway Commons, ChEMBL, ClinicalTrials.gov, MyGene, MyDisease \
and MyChem. Research playbooks describe multi-step strategies that combine them.";

/// MCP handler exposing every tool in the [`ClientRegistry`]
#[derive(Debug, Clone)]
pub struct BiomedServerHandler {
    config: Arc<Config>,
    registry: Arc<ClientRegistry>,
}

impl BiomedServerHandler {
    #[must_use]
    pub fn new(config: Arc<Config>, registry: Arc<ClientRegistry>) -> Self {
        info!(
            "Initializing MCP server handler with {} tools",
            registry.tool_count()
        );
        Self { config, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// MCP tool descriptors for every registered tool
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.registry.specs().iter().map(to_tool).collect()
    }

    /// Run a tool and shape the outcome for MCP.
    ///
    /// Bad arguments and unknown tools are protocol errors; upstream and
    /// other failures become an `is_error` result carrying the message.
    #[instrument(skip(self, arguments))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = arguments.map_or(serde_json::Value::Null, serde_json::Value::Object);
        match self.registry.call(name, arguments).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::text(
                response.render(),
            )])),
            Err(e) if e.is_caller_error() => Err(ErrorData::invalid_params(e.to_string(), None)),
            Err(e) => Ok(tool_error(&e)),
        }
    }
}

fn to_tool(spec: &ToolSpec) -> Tool {
    Tool::new(spec.name, spec.description, Arc::new(spec.input_schema()))
}

fn tool_error(error: &Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(error.to_string())])
}

impl ServerHandler for BiomedServerHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.into()),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _request, _context))]
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<ListToolsResult, ErrorData>> + Send + '_ {
        debug!("Listing available tools");
        let tools = self.tools();
        async move {
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
            })
        }
    }

    #[instrument(skip(self, request, _context))]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<CallToolResult, ErrorData>> + Send + '_ {
        info!("Tool called: {}", request.name);
        async move { self.dispatch(&request.name, request.arguments).await }
    }
}

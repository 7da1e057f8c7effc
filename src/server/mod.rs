pub mod handler;
pub mod transport;

use crate::tools::ClientRegistry;
use crate::{Config, Error, Result};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use handler::BiomedServerHandler;

pub struct Server {
    config: Arc<Config>,
    registry: Arc<ClientRegistry>,
    cancellation_token: CancellationToken,
}

impl Server {
    /// Build every API client and load playbooks
    pub fn new(config: Config) -> Result<Self> {
        let registry = ClientRegistry::from_config(&config)?;
        Ok(Self::with_registry(Arc::new(config), Arc::new(registry)))
    }

    #[must_use]
    pub fn with_registry(config: Arc<Config>, registry: Arc<ClientRegistry>) -> Self {
        Self {
            config,
            registry,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting MCP server infrastructure");

        let handler = BiomedServerHandler::new(Arc::clone(&self.config), Arc::clone(&self.registry));
        let mode = transport::validate_stdio_transport();
        info!("MCP server handler initialized (stdin: {:?})", mode);

        self.spawn_signal_listener();

        info!("Starting MCP server on stdio transport");
        let server_result = tokio::select! {
            result = self.run_mcp_server(handler) => {
                result
            }
            () = self.cancellation_token.cancelled() => {
                info!("Shutdown signal received, stopping MCP server");
                Ok(())
            }
        };

        let shutdown_timeout =
            tokio::time::Duration::from_secs(self.config.server.graceful_shutdown_timeout_secs);
        if tokio::time::timeout(shutdown_timeout, self.graceful_shutdown())
            .await
            .is_err()
        {
            warn!("Graceful shutdown timeout exceeded, forcing shutdown");
        }

        info!("MCP server shutdown complete");
        server_result
    }

    fn spawn_signal_listener(&self) {
        let shutdown_token = self.cancellation_token.clone();
        tokio::spawn(async move {
            let handlers = signal::unix::signal(signal::unix::SignalKind::terminate()).and_then(
                |sigterm| {
                    signal::unix::signal(signal::unix::SignalKind::interrupt())
                        .map(|sigint| (sigterm, sigint))
                },
            );
            let (mut sigterm, mut sigint) = match handlers {
                Ok(handlers) => handlers,
                Err(e) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
            }

            shutdown_token.cancel();
        });
    }

    async fn run_mcp_server(&self, handler: BiomedServerHandler) -> Result<()> {
        info!("Connecting MCP server to stdio transport");

        let server = handler
            .serve(stdio())
            .await
            .map_err(|e| Error::Service(format!("Failed to start MCP server: {e}")))?;

        let quit_reason = server
            .waiting()
            .await
            .map_err(|e| Error::Service(format!("MCP server error: {e}")))?;

        info!("MCP server completed with reason: {:?}", quit_reason);
        Ok(())
    }

    /// Close every client so caches are flushed to disk
    async fn graceful_shutdown(&self) {
        info!("Performing graceful shutdown");
        self.registry.shutdown().await;
        info!("Graceful shutdown completed");
    }

    pub fn shutdown(&self) {
        warn!("Initiating server shutdown");
        self.cancellation_token.cancel();
    }

    /// Check if the server has been requested to shutdown
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }
}

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod repositories;
pub mod server;
pub mod tools;

pub use client::{format_response, ApiClient, ApiResponse, BaseApiClient, ClientConfig, Metadata};
pub use config::{Config, ConfigOverrides};
pub use error::{Error, Result};
pub use repositories::{PlaybookRepository, ResponseCache};
pub use server::Server;
pub use tools::{ClientRegistry, ToolSet};

use anyhow::{bail, Context, Result};
use biomed_hub_mcp::config::{ConfigOverrides, LOG_FORMATS};
use biomed_hub_mcp::logging::init_tracing;
use biomed_hub_mcp::repositories::{Repository, ResponseCache};
use biomed_hub_mcp::tools::registry::load_playbooks;
use biomed_hub_mcp::{ClientRegistry, Config, Server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "biomed-hub-mcp")]
#[command(about = "MCP server for biomedical database APIs and research playbooks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_parser = LOG_FORMATS)]
    log_format: Option<String>,

    /// Response cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Disable the response cache for every API
    #[arg(long, global = true)]
    no_cache: bool,

    /// Directory of playbook YAML files
    #[arg(long, global = true)]
    playbooks_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over stdio (default if no subcommand given)
    Serve,

    /// List every tool with its description
    Tools {
        /// Only show tools whose name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Call one tool and print its result
    Call {
        /// Tool name, e.g. uniprot_get_protein
        tool: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// List playbooks, or print one
    Playbooks {
        /// Playbook id to print
        id: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Inspect or clear the response cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Entry counts per API partition
    Stats,

    /// Remove cached responses
    Clear {
        /// Only clear this API's partition (e.g. uniprot)
        #[arg(long)]
        api: Option<String>,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            cache_dir: self.cache_dir.clone(),
            no_cache: self.no_cache,
            playbooks_dir: self.playbooks_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(&cli.overrides());
    config.validate().context("Invalid configuration")?;
    init_tracing(&config.logging)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting {} v{}", config.server.name, env!("CARGO_PKG_VERSION"));
            let server = Server::new(config).context("Failed to initialize server")?;
            server.run().await?;
        }
        Command::Tools { prefix } => list_tools(&config, prefix.as_deref())?,
        Command::Call { tool, args } => call_tool(&config, &tool, &args).await?,
        Command::Playbooks { id } => show_playbooks(&config, id.as_deref())?,
        Command::Config => print!("{}", config.to_toml()?),
        Command::Cache(command) => run_cache_command(&config, &command)?,
    }
    Ok(())
}

fn list_tools(config: &Config, prefix: Option<&str>) -> Result<()> {
    let registry = ClientRegistry::from_config(config)?;
    for spec in registry.specs() {
        if prefix.is_some_and(|p| !spec.name.starts_with(p)) {
            continue;
        }
        println!("{:<40} {}", spec.name, spec.description);
    }
    Ok(())
}

async fn call_tool(config: &Config, tool: &str, args: &str) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    let registry = ClientRegistry::from_config(config)?;

    let result = registry.call(tool, arguments).await;
    registry.shutdown().await;
    println!("{}", result?.render());
    Ok(())
}

fn show_playbooks(config: &Config, id: Option<&str>) -> Result<()> {
    let repository = load_playbooks(config)?;
    match id {
        Some(id) => {
            let Some(playbook) = repository.get(id) else {
                bail!(
                    "no playbook '{id}' (available: {})",
                    repository.list_ids().join(", ")
                );
            };
            print!("{}", serde_yaml::to_string(playbook)?);
        }
        None => {
            for playbook in repository.iter() {
                println!(
                    "{:<32} {} ({} steps, starts from {})",
                    playbook.playbook_id,
                    playbook.name,
                    playbook.steps.len(),
                    playbook.starting_point
                );
            }
        }
    }
    Ok(())
}

fn run_cache_command(config: &Config, command: &CacheCommand) -> Result<()> {
    let root = &config.cache.directory;
    let ttl = Duration::from_secs(config.cache.ttl_days * 86_400);
    if !root.exists() {
        println!("No response cache at {}", root.display());
        return Ok(());
    }

    match command {
        CacheCommand::Stats => {
            println!("Response cache at {}", root.display());
            for partition in ResponseCache::partitions(root)? {
                let cache = ResponseCache::open(root, &partition, ttl)?;
                let stats = cache.stats()?;
                println!("{:<24} {:>8} entries", partition, stats.total_entities);
            }
        }
        CacheCommand::Clear { api } => {
            let partitions = match api {
                Some(api) => vec![api.to_lowercase()],
                None => ResponseCache::partitions(root)?,
            };
            for partition in partitions {
                let cache = ResponseCache::open(root, &partition, ttl)?;
                let removed = cache.len();
                cache.clear()?;
                cache.flush()?;
                println!("Cleared {removed} entries from {partition}");
            }
        }
    }
    Ok(())
}

//! # Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `BIOMED_MCP__<SECTION>__<KEY>` environment variables, then command-line
//! overrides.

use crate::client::{ClientConfig, PollConfig};
use crate::repositories::cache::DEFAULT_TTL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BIOMED_MCP";

/// Valid log levels
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Valid log output formats
pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub polling: PollingConfig,
    pub playbooks: PlaybooksConfig,
    /// Per-API overrides keyed by API name, lower-cased with punctuation and
    /// spaces dropped (`gwascatalog`, `clinicaltrialsgov`, `mygene`)
    pub apis: HashMap<String, ApiSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name advertised to MCP clients
    pub name: String,
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub ttl_days: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybooksConfig {
    pub directory: PathBuf,
}

/// Settings for one API; unset fields fall back to the global defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub rate_limit_delay_ms: Option<u64>,
    pub cache_enabled: Option<bool>,
    /// Only used by APIs that require a key (OMIM)
    pub api_key: Option<String>,
}

/// Command-line overrides applied after every other source
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub playbooks_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "biomed-hub-mcp".to_string(),
            graceful_shutdown_timeout_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!(
                "{}/{} (Biomedical Research Tool)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_cache_dir(),
            ttl_days: DEFAULT_TTL.as_secs() / 86_400,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = PollConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            interval_ms: u64::try_from(defaults.interval.as_millis()).unwrap_or(1000),
        }
    }
}

impl Default for PlaybooksConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("playbooks"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            polling: PollingConfig::default(),
            playbooks: PlaybooksConfig::default(),
            apis: HashMap::new(),
        }
    }
}

/// `<user cache dir>/medical-mcps/api_cache`, or under the temp dir when the
/// platform has no cache dir
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("medical-mcps")
        .join("api_cache")
}

/// `"GWAS Catalog"` -> `"gwascatalog"`
fn api_key_name(api_name: &str) -> String {
    api_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Config {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only (no environment layer)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|e| Error::InvalidInput {
            field: "config".to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Service(format!("Failed to render config: {e}")))
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(ref level) = overrides.log_level {
            self.logging.level.clone_from(level);
        }
        if let Some(ref format) = overrides.log_format {
            self.logging.format.clone_from(format);
        }
        if let Some(ref dir) = overrides.cache_dir {
            self.cache.directory.clone_from(dir);
        }
        if overrides.no_cache {
            self.cache.enabled = false;
        }
        if let Some(ref dir) = overrides.playbooks_dir {
            self.playbooks.directory.clone_from(dir);
        }
        self
    }

    /// Check invariants that deserialization cannot express
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::invalid_input(
                "logging.level",
                format!("must be one of {LOG_LEVELS:?}"),
            ));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(Error::invalid_input(
                "logging.format",
                format!("must be one of {LOG_FORMATS:?}"),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_input(
                "http.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.cache.ttl_days == 0 {
            return Err(Error::invalid_input(
                "cache.ttl_days",
                "must be greater than zero",
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(Error::invalid_input(
                "polling.max_attempts",
                "must be greater than zero",
            ));
        }

        for (name, settings) in &self.apis {
            if let Some(ref base_url) = settings.base_url {
                url::Url::parse(base_url).map_err(|e| {
                    Error::invalid_input(&format!("apis.{name}.base_url"), e.to_string())
                })?;
            }
            if settings.timeout_secs == Some(0) {
                return Err(Error::invalid_input(
                    &format!("apis.{name}.timeout_secs"),
                    "must be greater than zero",
                ));
            }
        }

        Ok(())
    }

    /// Settings for one API, if any were configured
    #[must_use]
    pub fn api(&self, api_name: &str) -> Option<&ApiSettings> {
        let wanted = api_key_name(api_name);
        self.apis
            .iter()
            .find(|(name, _)| api_key_name(name) == wanted)
            .map(|(_, settings)| settings)
    }

    /// Build the client configuration for an API from its built-in defaults
    /// and whatever this config overrides
    #[must_use]
    pub fn client_config(&self, defaults: ClientConfig) -> ClientConfig {
        let mut client = defaults
            .with_timeout(Duration::from_secs(self.http.timeout_secs))
            .with_cache_dir(self.cache.directory.clone())
            .with_cache_ttl(Duration::from_secs(self.cache.ttl_days * 86_400))
            .with_user_agent(self.http.user_agent.clone());
        if !self.cache.enabled {
            client = client.without_cache();
        }

        let Some(settings) = self.api(&client.api_name) else {
            return client;
        };
        if let Some(ref base_url) = settings.base_url {
            client.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = settings.timeout_secs {
            client = client.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = settings.rate_limit_delay_ms {
            client = client.with_rate_limit(Duration::from_millis(ms));
        }
        if settings.cache_enabled == Some(false) {
            client = client.without_cache();
        }
        client
    }

    /// Polling parameters for long-running remote jobs
    #[must_use]
    pub const fn poll_config(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.polling.max_attempts,
            interval: Duration::from_millis(self.polling.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.polling.max_attempts, 30);
        assert_eq!(config.polling.interval_ms, 1000);
        assert!(config.cache.directory.ends_with("medical-mcps/api_cache"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));

        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));

        let mut config = Config::default();
        config.apis.insert(
            "uniprot".to_string(),
            ApiSettings {
                base_url: Some("not a url".to_string()),
                ..ApiSettings::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("apis.uniprot.base_url"));
    }

    #[test]
    fn test_overrides() {
        let overrides = ConfigOverrides {
            log_level: Some("debug".to_string()),
            log_format: None,
            cache_dir: Some(PathBuf::from("/tmp/biomed-cache")),
            no_cache: true,
            playbooks_dir: Some(PathBuf::from("/srv/playbooks")),
        };
        let config = Config::default().with_overrides(&overrides);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/biomed-cache"));
        assert!(!config.cache.enabled);
        assert_eq!(config.playbooks.directory, PathBuf::from("/srv/playbooks"));
    }

    #[test]
    fn test_client_config_layering() {
        let mut config = Config::default();
        config.apis.insert(
            "kegg".to_string(),
            ApiSettings {
                base_url: Some("http://localhost:9999/".to_string()),
                rate_limit_delay_ms: Some(350),
                cache_enabled: Some(false),
                ..ApiSettings::default()
            },
        );

        let client = config.client_config(ClientConfig::new("https://rest.kegg.jp", "KEGG"));
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.rate_limit_delay, Some(Duration::from_millis(350)));
        assert!(!client.cache_enabled);
        assert_eq!(client.timeout, Duration::from_secs(30));

        let untouched = config.client_config(ClientConfig::new("https://mygene.info/v3", "MyGene"));
        assert_eq!(untouched.base_url, "https://mygene.info/v3");
        assert!(untouched.cache_enabled);
        assert_eq!(untouched.rate_limit_delay, None);
    }

    #[test]
    fn test_api_lookup_ignores_case_and_punctuation() {
        let mut config = Config::default();
        config.apis.insert(
            "clinicaltrialsgov".to_string(),
            ApiSettings {
                rate_limit_delay_ms: Some(100),
                ..ApiSettings::default()
            },
        );
        assert!(config.api("ClinicalTrials.gov").is_some());
        assert!(config.api("GWAS Catalog").is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[logging]
level = "warn"

[polling]
max_attempts = 5
interval_ms = 250

[apis.omim]
api_key = "secret"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.poll_config().max_attempts, 5);
        assert_eq!(config.poll_config().interval, Duration::from_millis(250));
        assert_eq!(
            config.api("OMIM").and_then(|s| s.api_key.as_deref()),
            Some("secret")
        );
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_layered_load_with_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("biomed.toml");
        std::fs::write(&path, "[http]\ntimeout_secs = 12\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.http.timeout_secs, 12);
        assert_eq!(config.server.name, "biomed-hub-mcp");
    }

    #[test]
    fn test_toml_rendering() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[cache]"));
        assert!(rendered.contains("ttl_days = 30"));
    }
}

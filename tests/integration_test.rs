use biomed_hub_mcp::config::{ApiSettings, ConfigOverrides};
use biomed_hub_mcp::server::BiomedServerHandler;
use biomed_hub_mcp::{ClientRegistry, Config, Error};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.name, "biomed-hub-mcp");
    assert_eq!(config.server.graceful_shutdown_timeout_secs, 5);
    assert_eq!(config.http.timeout_secs, 30);
    assert_eq!(config.logging.format, "pretty");
    assert_eq!(config.cache.ttl_days, 30);
    assert!(config.apis.is_empty());
}

#[tokio::test]
async fn test_config_validation() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.cache.ttl_days = 0;
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.cache.ttl_days = 30;

    config.polling.max_attempts = 0;
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.polling.max_attempts = 30;

    config.logging.format = "xml".to_string();
    assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));
    config.logging.format = "json".to_string();

    config.apis.insert(
        "chembl".to_string(),
        ApiSettings {
            timeout_secs: Some(0),
            ..ApiSettings::default()
        },
    );
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("apis.chembl.timeout_secs"));
}

#[test]
fn test_per_api_settings_by_display_name() {
    let mut config = Config::default();
    config.apis.insert(
        "gwascatalog".to_string(),
        ApiSettings {
            rate_limit_delay_ms: Some(250),
            ..ApiSettings::default()
        },
    );

    let client = config.client_config(biomed_hub_mcp::ClientConfig::new(
        "https://www.ebi.ac.uk/gwas/rest/api",
        "GWAS Catalog",
    ));
    assert_eq!(client.rate_limit_delay, Some(Duration::from_millis(250)));
}

#[test]
fn test_no_cache_override_disables_every_client_cache() {
    let config = Config::default().with_overrides(&ConfigOverrides {
        no_cache: true,
        ..ConfigOverrides::default()
    });
    let client = config.client_config(biomed_hub_mcp::ClientConfig::new(
        "https://rest.uniprot.org",
        "UniProt",
    ));
    assert!(!client.cache_enabled);
}

#[test]
fn test_error_chain() {
    let err = Error::InvalidInput {
        field: "nct_id".to_string(),
        reason: "expected NCT followed by 8 digits".to_string(),
    };
    assert_eq!(
        format!("{err}"),
        "Invalid input: nct_id - expected NCT followed by 8 digits"
    );

    let err = Error::PollTimeout {
        api: "UniProt".to_string(),
        attempts: 30,
        interval: Duration::from_secs(1),
    };
    assert_eq!(
        err.to_string(),
        "UniProt polling timed out after 30 attempts (1s apart)"
    );
}

#[test]
fn test_handler_lists_every_registered_tool() {
    let mut config = Config::default();
    config.cache.enabled = false;
    config.playbooks.directory = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("playbooks");

    let registry = Arc::new(ClientRegistry::from_config(&config).unwrap());
    let handler = BiomedServerHandler::new(Arc::new(config), Arc::clone(&registry));
    let tools = handler.tools();
    assert_eq!(tools.len(), registry.tool_count());
    assert!(tools.iter().any(|tool| tool.name == "playbook_list"));
    assert!(tools.iter().all(|tool| tool.description.is_some()));
}

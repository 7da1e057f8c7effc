use biomed_hub_mcp::client::providers::{
    BioThingsClient, BioThingsKind, ClinicalTrialsClient, KeggClient, UniProtClient,
};
use biomed_hub_mcp::client::{ApiClient, ClientConfig, PollConfig};
use biomed_hub_mcp::Error;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, api: &str) -> ClientConfig {
    ClientConfig::new(server.uri(), api).without_cache()
}

fn fast_polling(max_attempts: u32) -> PollConfig {
    PollConfig {
        max_attempts,
        interval: Duration::from_millis(5),
    }
}

async fn mount_job_submission(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/idmapping/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": job_id})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_uniprot_id_mapping_polls_until_ready() {
    let server = MockServer::start().await;
    mount_job_submission(&server, "job-42").await;

    // First poll still running, then finished
    Mock::given(method("GET"))
        .and(path("/idmapping/status/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobStatus": "RUNNING"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idmapping/status/job-42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": [{"from": "TP53"}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idmapping/stream/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"from": "TP53", "to": "P04637"},
                {"from": "BRCA1", "to": "P38398"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client =
        UniProtClient::with_config(config(&server, "UniProt")).with_poll_config(fast_polling(5));
    let ids = vec!["TP53".to_string(), "BRCA1".to_string()];
    let response = client
        .map_ids("Gene_Name", "UniProtKB", &ids)
        .await
        .unwrap()
        .into_value();

    assert_eq!(response["metadata"]["mappings"], 2);
    assert_eq!(response["data"]["results"][0]["to"], "P04637");
}

#[tokio::test]
async fn test_uniprot_id_mapping_failed_ids_finish_the_job() {
    let server = MockServer::start().await;
    mount_job_submission(&server, "job-7").await;
    Mock::given(method("GET"))
        .and(path("/idmapping/status/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failedIds": ["NOPE1"]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idmapping/stream/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("From\tTo\n"))
        .mount(&server)
        .await;

    let mut client =
        UniProtClient::with_config(config(&server, "UniProt")).with_poll_config(fast_polling(3));
    let response = client
        .map_ids("Gene_Name", "UniProtKB", &["NOPE1".to_string()])
        .await
        .unwrap();
    assert_eq!(response.as_text(), Some("From\tTo\n"));
}

#[tokio::test]
async fn test_uniprot_id_mapping_without_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idmapping/run"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"messages": ["Invalid parameter 'from'"]})),
        )
        .mount(&server)
        .await;

    let mut client = UniProtClient::with_config(config(&server, "UniProt"));
    let err = client
        .map_ids("Bogus", "UniProtKB", &["TP53".to_string()])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "UniProt ID mapping error: Invalid parameter 'from'"
    );
}

#[tokio::test]
async fn test_uniprot_id_mapping_gives_up() {
    let server = MockServer::start().await;
    mount_job_submission(&server, "job-slow").await;
    Mock::given(method("GET"))
        .and(path("/idmapping/status/job-slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobStatus": "RUNNING"})))
        .expect(3)
        .mount(&server)
        .await;

    let mut client =
        UniProtClient::with_config(config(&server, "UniProt")).with_poll_config(fast_polling(3));
    let err = client
        .map_ids("Gene_Name", "UniProtKB", &["TP53".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollTimeout { attempts: 3, .. }));
}

#[tokio::test]
async fn test_kegg_returns_flat_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get/hsa:7157"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ENTRY       7157  CDS  T01001\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = KeggClient::with_config(config(&server, "KEGG"));
    let response = client.get_gene("hsa:7157").await.unwrap();
    assert!(response.as_text().unwrap().starts_with("ENTRY"));
    ApiClient::close(&mut client);
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_clinical_trials_search_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .and(query_param("query.cond", "melanoma"))
        .and(query_param("filter.overallStatus", "RECRUITING"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "studies": [{"protocolSection": {}}],
            "totalCount": 120,
            "nextPageToken": "NF0g5Jum"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ClinicalTrialsClient::with_config(config(&server, "ClinicalTrials.gov"));
    let response = client
        .search_by_condition("melanoma", Some("recruiting"), 10)
        .await
        .unwrap()
        .into_value();
    assert_eq!(response["metadata"]["results"], 1);
    assert_eq!(response["metadata"]["total"], 120);
}

#[tokio::test]
async fn test_clinical_trials_rejects_bad_nct_id_without_network() {
    let server = MockServer::start().await;
    let mut client = ClinicalTrialsClient::with_config(config(&server, "ClinicalTrials.gov"));
    let err = client.get_study("NCT12").await.unwrap_err();
    assert!(err.is_caller_error());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_mygene_resolves_symbols_through_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("q", "symbol:TP53"))
        .and(query_param("species", "human"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "hits": [{"_id": "7157", "_score": 90.1}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gene/7157"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "7157", "symbol": "TP53"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = BioThingsClient::with_config(BioThingsKind::Gene, config(&server, "MyGene"));
    let response = client.get("TP53", None).await.unwrap().into_value();
    assert_eq!(response["symbol"], "TP53");
}

#[tokio::test]
async fn test_mychem_unknown_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "hits": []})))
        .mount(&server)
        .await;

    let mut client = BioThingsClient::with_config(BioThingsKind::Chem, config(&server, "MyChem"));
    let err = client.get("notadrug", None).await.unwrap_err();
    assert_eq!(err.to_string(), "MyChem error: no chem found for 'notadrug'");
}

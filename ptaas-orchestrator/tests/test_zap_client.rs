//! ZAP control API client against a mocked scanner

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ptaas_orchestrator::domain::{ScanError, WebScannerApi};
use ptaas_orchestrator::infrastructure::ZapClient;

#[tokio::test]
async fn test_start_crawl_returns_scan_id_and_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/spider/action/scan/"))
        .and(query_param("url", "http://shop.local"))
        .and(query_param("apikey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scan": "3"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), Some("secret".to_string()));

    let scan_id = client.start_crawl("http://shop.local").await.unwrap();

    assert_eq!(scan_id, "3");
}

#[tokio::test]
async fn test_status_endpoints_parse_percentages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/spider/view/status/"))
        .and(query_param("scanId", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "45"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/JSON/ascan/view/status/"))
        .and(query_param("scanId", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "100"})))
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), None);

    assert_eq!(client.crawl_status("3").await.unwrap(), 45);
    assert_eq!(client.active_scan_status("9").await.unwrap(), 100);
}

#[tokio::test]
async fn test_json_report_is_returned_verbatim() {
    let server = MockServer::start().await;
    let report = r#"{"@version":"2.14.0","site":[]}"#;
    Mock::given(method("GET"))
        .and(path("/OTHER/core/other/jsonreport/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(report))
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), None);

    assert_eq!(client.json_report().await.unwrap(), report.as_bytes());
}

#[tokio::test]
async fn test_error_status_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/core/action/accessUrl/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad url"))
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), None);

    let err = client.access_url("not a url").await.unwrap_err();

    match err {
        ScanError::UpstreamApi {
            service,
            status,
            message,
        } => {
            assert_eq!(service, "zap");
            assert_eq!(status, Some(400));
            assert_eq!(message, "bad url");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_garbled_progress_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/spider/view/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "does_not_exist"})))
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), None);

    assert!(matches!(
        client.crawl_status("1").await,
        Err(ScanError::ToolExecution { ref tool, exit_code: None, .. }) if tool == "zap"
    ));
}

#[tokio::test]
async fn test_non_json_scan_start_is_tool_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/JSON/ascan/action/scan/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy login</html>"))
        .mount(&server)
        .await;

    let client = ZapClient::new(server.uri(), None);
    let err = client.start_active_scan("http://app").await.unwrap_err();

    assert!(matches!(err, ScanError::ToolExecution { ref tool, .. } if tool == "zap"));
    assert_eq!(err.code(), "TOOL_EXECUTION_FAILED");
}

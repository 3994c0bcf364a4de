//! End-to-end job lifecycle through the API and an attached worker pool

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{CannedRuntime, NMAP_XML, TestApp};

#[tokio::test]
async fn test_network_scan_completes_and_is_downloadable() {
    let app = TestApp::with_workers(CannedRuntime {
        exit_code: 0,
        stdout: NMAP_XML.to_string(),
    });

    let (status, body) = app
        .json("POST", "/api/v1/scans/network", Some(json!({"target": "10.0.0.5"})))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let terminal = app.wait_terminal(&job_id).await;
    assert_eq!(terminal["state"], "SUCCESS");
    assert_eq!(terminal["progress"], 100);
    assert_eq!(terminal["result"]["import"]["outcome"], "imported");
    assert_eq!(terminal["result"]["import"]["test_id"], 42);

    // Listing the active scans moves finished ones to the completed log
    let (_, active) = app.json("GET", "/api/v1/scans/active", None).await;
    assert_eq!(active[0]["state"], "SUCCESS");
    let (_, active) = app.json("GET", "/api/v1/scans/active", None).await;
    assert_eq!(active, json!([]));

    let (status, completed) = app.json("GET", "/api/v1/scans/completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed[0]["job_id"], job_id.as_str());
    assert_eq!(completed[0]["test_id"], 42);

    let (status, content) = app
        .request("GET", &format!("/api/v1/results/{}/download", job_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content, NMAP_XML.as_bytes());

    let imports = app.dojo.imports.lock().unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].scan_type, "Nmap Scan");
    assert_eq!(imports[0].engagement_name, "Nmap Scan - 10.0.0.5");
}

#[tokio::test]
async fn test_failed_tool_surfaces_as_failure_state() {
    let app = TestApp::with_workers(CannedRuntime {
        exit_code: 1,
        stdout: "Failed to resolve \"nowhere.invalid\".".to_string(),
    });

    let (_, body) = app
        .json(
            "POST",
            "/api/v1/scans/network",
            Some(json!({"target": "nowhere.invalid"})),
        )
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let terminal = app.wait_terminal(&job_id).await;

    assert_eq!(terminal["state"], "FAILURE");
    assert!(terminal["error"].as_str().unwrap().contains("nmap"));
    assert!(app.artifacts.objects.lock().unwrap().is_empty());

    app.json("GET", "/api/v1/scans/active", None).await;
    let (status, _) = app
        .request("GET", &format!("/api/v1/results/{}/download", job_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreachable_web_scanner_fails_the_job() {
    let app = TestApp::with_workers(CannedRuntime {
        exit_code: 0,
        stdout: String::new(),
    });

    let (_, body) = app
        .json(
            "POST",
            "/api/v1/scans/web",
            Some(json!({"target": "http://shop.local"})),
        )
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let terminal = app.wait_terminal(&job_id).await;

    assert_eq!(terminal["state"], "FAILURE");
    assert!(terminal["error"].as_str().unwrap().contains("zap"));
}

mod common;

use cdc_launcher::connect::{ConnectClient, ConnectorState};
use cdc_launcher::readiness::RetryPolicy;
use cdc_launcher::Error;
use common::*;
use std::time::Duration;

fn client(url: &str) -> ConnectClient {
    ConnectClient::new(url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_is_ready_only_on_success() {
    let ok = MockConnect::start(|_| (200, "[]".to_string())).await;
    assert!(client(&ok.url).is_ready().await);

    let starting = MockConnect::start(|_| (503, error_body(503, "Starting"))).await;
    assert!(!client(&starting.url).is_ready().await);

    let nothing = unused_url().await;
    assert!(!client(&nothing).is_ready().await);
}

#[tokio::test]
async fn test_wait_until_ready_counts_attempts() {
    let mock = MockConnect::start(|_| (200, "[]".to_string())).await;
    let policy = RetryPolicy::fixed(Duration::from_millis(10), 3);

    let attempts = client(&mock.url).wait_until_ready(&policy).await.unwrap();
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_list_connectors() {
    let mock = MockConnect::start(|_| (200, r#"["a","b"]"#.to_string())).await;
    let names = client(&mock.url).list_connectors().await.unwrap();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_status_report_keeps_raw_body() {
    let mock = MockConnect::start(healthy_connect).await;

    let report = client(&mock.url).connector_status(CONNECTOR).await.unwrap();

    assert_eq!(report.http_status, 200);
    assert_eq!(report.connector, CONNECTOR);
    assert_eq!(report.body, running_status_body(CONNECTOR));
    let status = report.status.unwrap();
    assert!(status.is_running());
    assert_eq!(status.tasks[0].state, ConnectorState::Running);
}

#[tokio::test]
async fn test_status_of_unknown_connector_is_reported_not_raised() {
    let mock = MockConnect::start(|_| (404, error_body(404, "No status found for connector ghost"))).await;

    let report = client(&mock.url).connector_status("ghost").await.unwrap();

    assert!(!report.is_success());
    assert!(report.status.is_none());
    assert!(report.body.contains("No status found"));
    assert_eq!(mock.routes(), vec!["GET /connectors/ghost/status".to_string()]);
}

#[tokio::test]
async fn test_delete_connector() {
    let mock = MockConnect::start(|request| match request.path.as_str() {
        "/connectors/present" => (204, String::new()),
        _ => (404, error_body(404, "Connector absent not found")),
    })
    .await;
    let client = client(&mock.url);

    assert!(client.delete_connector("present").await.unwrap());
    assert!(!client.delete_connector("absent").await.unwrap());
    assert!(mock.requests().iter().all(|r| r.method == "DELETE"));
}

#[tokio::test]
async fn test_restart_with_tasks() {
    let mock = MockConnect::start(|_| (204, String::new())).await;

    client(&mock.url).restart_connector(CONNECTOR, true).await.unwrap();

    assert_eq!(
        mock.routes(),
        vec![format!("POST /connectors/{}/restart?includeTasks=true", CONNECTOR)]
    );
}

#[tokio::test]
async fn test_restart_failure_surfaces_api_error() {
    let mock = MockConnect::start(|_| (409, error_body(409, "Cannot complete request because of a conflicting operation"))).await;

    let result = client(&mock.url).restart_connector(CONNECTOR, false).await;

    assert!(matches!(result, Err(Error::Api { status: 409, .. })));
}

#[tokio::test]
async fn test_connector_names_are_path_encoded() {
    let mock = MockConnect::start(|_| (404, error_body(404, "missing"))).await;

    client(&mock.url).connector_status("orders connector").await.unwrap();

    assert_eq!(
        mock.routes(),
        vec!["GET /connectors/orders%20connector/status".to_string()]
    );
}

#[tokio::test]
async fn test_base_url_with_path_prefix() {
    let mock = MockConnect::start(|_| (200, "[]".to_string())).await;
    let client = client(&format!("{}/kafka-connect/", mock.url));

    client.list_connectors().await.unwrap();

    assert_eq!(mock.routes(), vec!["GET /kafka-connect/connectors".to_string()]);
}

use cdc_launcher::compose::{ContainerRuntime, DockerCompose};
use cdc_launcher::connect::{ConnectClient, Registration};
use cdc_launcher::{Config, Pipeline};
use std::env;
use std::time::Duration;
use tempfile::TempDir;

/// Brings up the real stack. Needs docker, docker-compose and a running
/// `postgres` container with logical replication allowed.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_end_to_end_setup() {
    tracing_subscriber::fmt()
        .with_env_filter("cdc_launcher=debug")
        .try_init()
        .ok();

    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.compose.file = temp_dir.path().join("docker-compose.yml");
    config.compose.data_dir = temp_dir.path().join("data");
    config.compose.project_name = Some(format!("cdc_test_{}", std::process::id()));
    config.database.script = env::current_dir().unwrap().join("sql/enable_logical_replication.sql");
    config.apply_db_name(env::var("DB_NAME").ok());

    let runtime = DockerCompose::new(&config.compose).unwrap();
    let client = ConnectClient::from_config(&config).unwrap();
    let pipeline = Pipeline::new(config, runtime, client.clone());

    let summary = pipeline.up().await.unwrap();
    assert!(matches!(
        summary.registration,
        Registration::Created(_) | Registration::AlreadyExists
    ));

    // the connector needs a moment to start its task
    tokio::time::sleep(Duration::from_secs(5)).await;
    let report = client.connector_status(&summary.connector).await.unwrap();
    assert!(report.is_success(), "status body: {}", report.body);

    client.delete_connector(&summary.connector).await.unwrap();
    pipeline.runtime().down(true).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires docker on PATH
async fn test_docker_prerequisites_present() {
    let runtime = DockerCompose::new(&Config::default().compose).unwrap();
    runtime.check_prerequisites().await.unwrap();
}

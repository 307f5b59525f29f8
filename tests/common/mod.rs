#![allow(dead_code)]

use async_trait::async_trait;
use cdc_launcher::compose::{CommandOutput, ContainerRuntime};
use cdc_launcher::config::Config;
use cdc_launcher::{Error, Result};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const CONNECTOR: &str = "football-postgres-connector";

/// One request seen by [`MockConnect`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl Recorded {
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

type Router = Arc<dyn Fn(&Recorded) -> (u16, String) + Send + Sync>;

/// Minimal HTTP/1.1 responder standing in for the Kafka Connect REST API.
/// Every connection serves a single request and is then closed.
pub struct MockConnect {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl MockConnect {
    pub async fn start<F>(router: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let router: Router = Arc::new(router);

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let router = router.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, router, recorded).await;
                });
            }
        });

        Self {
            url: format!("http://{}", addr),
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.requests().iter().map(Recorded::route).collect()
    }
}

impl Drop for MockConnect {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    router: Router,
    recorded: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let request = Recorded { method, path, body };
    let (status, response_body) = router(&request);
    recorded.lock().unwrap().push(request);

    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        response_body.len(),
        response_body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// An address nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn created_body(name: &str) -> String {
    json!({
        "name": name,
        "config": {
            "connector.class": "io.debezium.connector.postgresql.PostgresConnector",
            "name": name
        },
        "tasks": [],
        "type": "source"
    })
    .to_string()
}

pub fn running_status_body(name: &str) -> String {
    json!({
        "name": name,
        "connector": {"state": "RUNNING", "worker_id": "172.18.0.4:8083"},
        "tasks": [{"id": 0, "state": "RUNNING", "worker_id": "172.18.0.4:8083"}],
        "type": "source"
    })
    .to_string()
}

pub fn error_body(code: u16, message: &str) -> String {
    json!({"error_code": code, "message": message}).to_string()
}

/// Routes of a healthy Kafka Connect that accepts the connector.
pub fn healthy_connect(request: &Recorded) -> (u16, String) {
    let status_path = format!("/connectors/{}/status", CONNECTOR);
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/connectors") => (200, "[]".to_string()),
        ("POST", "/connectors") => (201, created_body(CONNECTOR)),
        ("GET", path) if path == status_path => (200, running_status_body(CONNECTOR)),
        _ => (404, error_body(404, "Not found")),
    }
}

/// A [`ContainerRuntime`] that records calls instead of running docker.
#[derive(Clone, Default)]
pub struct RecordingRuntime {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub stdin: Arc<Mutex<Option<String>>>,
    pub missing_tool: Option<String>,
    pub exec_code: i32,
}

impl RecordingRuntime {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn check_prerequisites(&self) -> Result<()> {
        self.record("check".to_string());
        match &self.missing_tool {
            Some(tool) => Err(Error::MissingTool { tool: tool.clone() }),
            None => Ok(()),
        }
    }

    async fn up(&self) -> Result<()> {
        self.record("up".to_string());
        Ok(())
    }

    async fn down(&self, remove_volumes: bool) -> Result<()> {
        self.record(format!("down volumes={}", remove_volumes));
        Ok(())
    }

    async fn exec(&self, container: &str, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput> {
        self.record(format!("exec {} {}", container, args.join(" ")));
        *self.stdin.lock().unwrap() = stdin.map(|s| String::from_utf8_lossy(s).into_owned());

        let stderr = if self.exec_code == 0 {
            String::new()
        } else {
            "psql: error: FATAL:  database \"football_db\" does not exist".to_string()
        };
        Ok(CommandOutput {
            code: Some(self.exec_code),
            stdout: String::new(),
            stderr,
        })
    }
}

/// Configuration pointing every path into `dir` with a fast retry policy.
pub fn test_config(connect_url: &str, dir: &Path) -> Config {
    let script = dir.join("enable_logical_replication.sql");
    std::fs::write(&script, "ALTER SYSTEM SET wal_level = 'logical';\n").unwrap();

    let mut config = Config::default();
    config.connect.url = connect_url.to_string();
    config.connect.request_timeout_secs = 2;
    config.connect.readiness.poll_interval_ms = 10;
    config.connect.readiness.register_poll_interval_ms = 10;
    config.connect.readiness.max_interval_ms = 20;
    config.connect.readiness.max_attempts = 5;
    config.connect.readiness.deadline_secs = 10;
    config.compose.file = dir.join("docker-compose.yml");
    config.compose.data_dir = dir.join("data");
    config.database.script = script;
    config
}

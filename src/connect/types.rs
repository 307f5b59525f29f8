use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a connector or task as reported by Kafka Connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectorState {
    Unassigned,
    Running,
    Paused,
    Failed,
    Restarting,
    Other(String),
}

impl From<String> for ConnectorState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UNASSIGNED" => ConnectorState::Unassigned,
            "RUNNING" => ConnectorState::Running,
            "PAUSED" => ConnectorState::Paused,
            "FAILED" => ConnectorState::Failed,
            "RESTARTING" => ConnectorState::Restarting,
            _ => ConnectorState::Other(s),
        }
    }
}

impl From<ConnectorState> for String {
    fn from(state: ConnectorState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorState::Unassigned => write!(f, "UNASSIGNED"),
            ConnectorState::Running => write!(f, "RUNNING"),
            ConnectorState::Paused => write!(f, "PAUSED"),
            ConnectorState::Failed => write!(f, "FAILED"),
            ConnectorState::Restarting => write!(f, "RESTARTING"),
            ConnectorState::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub state: ConnectorState,
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub id: i32,
    pub state: ConnectorState,
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// Body of `GET /connectors/{name}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorStatus {
    pub name: String,
    pub connector: WorkerState,
    #[serde(default)]
    pub tasks: Vec<TaskState>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ConnectorStatus {
    /// The connector and every one of its tasks are running. A connector
    /// without tasks is not considered running.
    pub fn is_running(&self) -> bool {
        self.connector.state == ConnectorState::Running
            && !self.tasks.is_empty()
            && self.tasks.iter().all(|t| t.state == ConnectorState::Running)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskState> {
        self.tasks.iter().filter(|t| t.state == ConnectorState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId {
    pub connector: String,
    pub task: i32,
}

/// Body returned by `POST /connectors` and `PUT /connectors/{name}/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    pub name: String,
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Error body Kafka Connect sends with 4xx and 5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error_code: u16,
    pub message: String,
}

/// Result of submitting a connector definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(ConnectorInfo),
    /// A connector with the same name is already registered and was left
    /// as is.
    AlreadyExists,
    /// A connector with the same name existed and its config was replaced.
    Updated(ConnectorInfo),
}

/// One fetch of a connector's status, kept verbatim for display.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub connector: String,
    pub http_status: u16,
    pub body: String,
    pub status: Option<ConnectorStatus>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    /// The raw body, pretty-printed when it is JSON.
    pub fn pretty_body(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| self.body.clone())
    }
}

use chrono::Utc;
use reqwest::{Client, Response, StatusCode, Url};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::definition::ConnectorDefinition;
use super::types::{ApiErrorBody, ConnectorInfo, ConnectorStatus, Registration, StatusReport};
use crate::readiness::{self, RetryPolicy};
use crate::{Config, Error, Result};

/// Async client for the Kafka Connect REST API.
#[derive(Debug, Clone)]
pub struct ConnectClient {
    client: Client,
    base_url: Url,
}

/// How a `POST /connectors` response should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CreateOutcome {
    Created(ConnectorInfo),
    AlreadyExists,
}

impl ConnectClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid Kafka Connect URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("'{}' cannot be used as a base URL", base_url)));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.connect.url, config.request_timeout())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// A single liveness probe: `GET /connectors` answered with 2xx.
    pub async fn is_ready(&self) -> bool {
        match self.client.get(self.endpoint(&["connectors"])).send().await {
            Ok(resp) => {
                debug!(status = %resp.status(), "Kafka Connect answered");
                resp.status().is_success()
            }
            Err(e) => {
                debug!("Kafka Connect not reachable: {}", e);
                false
            }
        }
    }

    /// Blocks until Kafka Connect is ready or the policy gives up.
    pub async fn wait_until_ready(&self, policy: &RetryPolicy) -> Result<u32> {
        info!(url = %self.base_url, "Waiting for Kafka Connect");
        readiness::wait_until(policy, "Kafka Connect", |_| self.is_ready()).await
    }

    pub async fn list_connectors(&self) -> Result<Vec<String>> {
        let resp = self.client.get(self.endpoint(&["connectors"])).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Submits a connector definition and inspects the HTTP status.
    ///
    /// An existing connector with the same name yields
    /// [`Registration::AlreadyExists`], or has its config replaced when
    /// `update_existing` is set. Rejected configurations surface as
    /// [`Error::Validation`], everything else non-2xx as [`Error::Api`].
    #[instrument(skip(self, definition), fields(connector = %definition.name))]
    pub async fn create_connector(
        &self,
        definition: &ConnectorDefinition,
        update_existing: bool,
    ) -> Result<Registration> {
        definition.validate()?;
        info!("Registering connector");

        let resp = self
            .client
            .post(self.endpoint(&["connectors"]))
            .json(definition)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        match create_outcome(status, &body)? {
            CreateOutcome::Created(info) => {
                info!(tasks = info.tasks.len(), "Connector created");
                Ok(Registration::Created(info))
            }
            CreateOutcome::AlreadyExists if update_existing => {
                info!("Connector already exists, updating its config");
                let info = self
                    .update_connector_config(&definition.name, &definition.config)
                    .await?;
                Ok(Registration::Updated(info))
            }
            CreateOutcome::AlreadyExists => {
                warn!("Connector already exists, leaving it unchanged");
                Ok(Registration::AlreadyExists)
            }
        }
    }

    pub async fn update_connector_config(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<ConnectorInfo> {
        let resp = self
            .client
            .put(self.endpoint(&["connectors", name, "config"]))
            .json(config)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        Err(classify_error(status, &body))
    }

    /// Fetches the status of a connector. Non-2xx responses are reported,
    /// not raised, so the caller can show whatever the API said.
    pub async fn connector_status(&self, name: &str) -> Result<StatusReport> {
        let resp = self
            .client
            .get(self.endpoint(&["connectors", name, "status"]))
            .send()
            .await?;
        let http_status = resp.status().as_u16();
        let body = resp.text().await?;

        let status = if (200..300).contains(&http_status) {
            match serde_json::from_str::<ConnectorStatus>(&body) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("Unrecognized status body: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(StatusReport {
            connector: name.to_string(),
            http_status,
            body,
            status,
            fetched_at: Utc::now(),
        })
    }

    /// Deletes a connector. Returns `false` when it did not exist.
    pub async fn delete_connector(&self, name: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(self.endpoint(&["connectors", name]))
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {
                info!(connector = name, "Connector deleted");
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                warn!(connector = name, "Connector does not exist");
                Ok(false)
            }
            _ => Err(api_error(resp).await),
        }
    }

    pub async fn restart_connector(&self, name: &str, include_tasks: bool) -> Result<()> {
        let mut url = self.endpoint(&["connectors", name, "restart"]);
        if include_tasks {
            url.query_pairs_mut().append_pair("includeTasks", "true");
        }

        let resp = self.client.post(url).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        info!(connector = name, include_tasks, "Connector restart requested");
        Ok(())
    }
}

pub(crate) fn create_outcome(status: StatusCode, body: &str) -> Result<CreateOutcome> {
    if status.is_success() {
        let info: ConnectorInfo = serde_json::from_str(body)?;
        return Ok(CreateOutcome::Created(info));
    }

    let message = error_message(body);
    if status == StatusCode::CONFLICT && message.contains("already exists") {
        return Ok(CreateOutcome::AlreadyExists);
    }
    Err(classify_error(status, body))
}

pub(crate) fn classify_error(status: StatusCode, body: &str) -> Error {
    let message = error_message(body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation {
            status: status.as_u16(),
            message,
        },
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Prefers the `message` field of Kafka Connect's error body and falls
/// back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => err.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

async fn api_error(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    classify_error(status, &body)
}

use crate::{Error, Result};
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::ClientConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, instrument};

/// Which expected change topics the broker currently knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicReport {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

impl TopicReport {
    pub fn compare(expected: &[String], existing: &BTreeSet<String>) -> Self {
        let (present, missing) = expected
            .iter()
            .cloned()
            .partition(|topic| existing.contains(topic));
        Self { present, missing }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct TopicManager {
    admin_client: Arc<AdminClient<DefaultClientContext>>,
    metadata_timeout: Duration,
}

impl TopicManager {
    pub fn new(bootstrap_servers: &str, metadata_timeout: Duration) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client: Arc::new(admin_client),
            metadata_timeout,
        })
    }

    /// All topic names in the cluster, internal ones excluded.
    pub async fn list_topics(&self) -> Result<BTreeSet<String>> {
        let admin_client = Arc::clone(&self.admin_client);
        let timeout = self.metadata_timeout;

        // fetch_metadata blocks for up to `timeout`
        let topics = off_runtime(move || {
            let metadata = admin_client
                .inner()
                .fetch_metadata(None, timeout)
                .map_err(Error::Kafka)?;
            Ok(metadata
                .topics()
                .iter()
                .map(|topic| topic.name().to_string())
                .filter(|name| !name.starts_with("__"))
                .collect::<BTreeSet<String>>())
        })
        .await?;
        debug!(count = topics.len(), "Fetched topic metadata");
        Ok(topics)
    }

    /// Debezium creates change topics lazily, on the first event of each
    /// table, so a missing topic is not an error by itself.
    #[instrument(skip(self, expected), fields(expected = expected.len()))]
    pub async fn check_topics(&self, expected: &[String]) -> Result<TopicReport> {
        let existing = self.list_topics().await?;
        let report = TopicReport::compare(expected, &existing);
        info!(
            present = report.present.len(),
            missing = report.missing.len(),
            "Checked change topics"
        );
        Ok(report)
    }
}

async fn off_runtime<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await?
}

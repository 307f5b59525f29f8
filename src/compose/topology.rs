use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::bootstrap::DataLayout;
use crate::config::ComposeConfig;
use crate::{Error, Result};

pub const ZOOKEEPER: &str = "zookeeper";
pub const KAFKA: &str = "kafka";
pub const CONNECT: &str = "connect";
pub const UI: &str = "kafdrop";

/// The compose declaration this crate renders. Files found on disk are
/// never parsed into this model; see [`ServiceGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub services: BTreeMap<String, Service>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, ServiceNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceNetwork {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

impl ComposeFile {
    /// Builds the four-service CDC topology: coordination service, broker,
    /// Debezium connect runtime and the topic browser.
    pub fn cdc_stack(config: &ComposeConfig) -> Self {
        let layout = DataLayout::new(&config.data_dir);
        let network = config.network.as_str();
        let mut services = BTreeMap::new();

        services.insert(
            ZOOKEEPER.to_string(),
            Service::new(&config.images.zookeeper, ZOOKEEPER, network)
                .port(2181, 2181)
                .env("ZOOKEEPER_CLIENT_PORT", "2181")
                .env("ZOOKEEPER_TICK_TIME", "2000")
                .volume(&layout.zookeeper_data, "/var/lib/zookeeper/data")
                .volume(&layout.zookeeper_log, "/var/lib/zookeeper/log"),
        );

        services.insert(
            KAFKA.to_string(),
            Service::new(&config.images.kafka, KAFKA, network)
                .depends_on(ZOOKEEPER)
                .port(9092, 9092)
                .port(29092, 29092)
                .env("KAFKA_BROKER_ID", "1")
                .env("KAFKA_ZOOKEEPER_CONNECT", "zookeeper:2181")
                .env(
                    "KAFKA_LISTENER_SECURITY_PROTOCOL_MAP",
                    "PLAINTEXT:PLAINTEXT,PLAINTEXT_HOST:PLAINTEXT",
                )
                .env(
                    "KAFKA_ADVERTISED_LISTENERS",
                    "PLAINTEXT://kafka:9092,PLAINTEXT_HOST://localhost:29092",
                )
                .env("KAFKA_INTER_BROKER_LISTENER_NAME", "PLAINTEXT")
                .env("KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR", "1")
                .env("KAFKA_TRANSACTION_STATE_LOG_REPLICATION_FACTOR", "1")
                .env("KAFKA_TRANSACTION_STATE_LOG_MIN_ISR", "1")
                .volume(&layout.kafka_data, "/var/lib/kafka/data"),
        );

        services.insert(
            CONNECT.to_string(),
            Service::new(&config.images.connect, CONNECT, network)
                .depends_on(KAFKA)
                .port(8083, 8083)
                .env("BOOTSTRAP_SERVERS", "kafka:9092")
                .env("GROUP_ID", "1")
                .env("CONFIG_STORAGE_TOPIC", "connect_configs")
                .env("OFFSET_STORAGE_TOPIC", "connect_offsets")
                .env("STATUS_STORAGE_TOPIC", "connect_statuses")
                .env("CONFIG_STORAGE_REPLICATION_FACTOR", "1")
                .env("OFFSET_STORAGE_REPLICATION_FACTOR", "1")
                .env("STATUS_STORAGE_REPLICATION_FACTOR", "1")
                .env("KEY_CONVERTER", "org.apache.kafka.connect.json.JsonConverter")
                .env("VALUE_CONVERTER", "org.apache.kafka.connect.json.JsonConverter")
                .env("KEY_CONVERTER_SCHEMAS_ENABLE", "false")
                .env("VALUE_CONVERTER_SCHEMAS_ENABLE", "false"),
        );

        services.insert(
            UI.to_string(),
            Service::new(&config.images.ui, UI, network)
                .depends_on(KAFKA)
                .port(9000, 9000)
                .env("KAFKA_BROKERCONNECT", "kafka:9092")
                .env("JVM_OPTS", "-Xms32M -Xmx64M"),
        );

        let mut networks = BTreeMap::new();
        networks.insert(
            network.to_string(),
            Network {
                driver: Some("bridge".to_string()),
            },
        );

        Self {
            version: Some("3.7".to_string()),
            services,
            networks,
        }
    }

    pub fn service_graph(&self) -> ServiceGraph {
        ServiceGraph {
            dependencies: self
                .services
                .iter()
                .map(|(name, service)| (name.clone(), service.depends_on.clone()))
                .collect(),
        }
    }

    pub fn render(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the compose file through a temporary file and a rename so a
    /// crash never leaves a truncated file behind.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("yml.tmp");

        let yaml = self.render()?;
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(yaml.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await?;

        info!("Wrote compose file to {:?}", path);
        Ok(())
    }
}

/// Service names and their `depends_on` edges, read from any compose
/// file without interpreting the rest of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceGraph {
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl ServiceGraph {
    /// Extracts the graph from compose YAML. `depends_on` may be the short
    /// list form or the long form keyed by service name; every other key
    /// is left to compose itself.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(content)?;
        let mut dependencies = BTreeMap::new();

        let Some(services) = document.get("services").and_then(Value::as_mapping) else {
            warn!("Compose file declares no services");
            return Ok(Self { dependencies });
        };

        for (name, service) in services {
            let name = match name.as_str() {
                Some(name) => name.to_string(),
                None => return Err(Error::Config(format!("invalid compose service name {:?}", name))),
            };
            let depends_on = match service.get("depends_on") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Sequence(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                Some(Value::Mapping(items)) => items.keys().filter_map(Value::as_str).map(str::to_string).collect(),
                Some(other) => {
                    return Err(Error::Config(format!(
                        "service '{}' has an unsupported depends_on: {:?}",
                        name, other
                    )))
                }
            };
            dependencies.insert(name, depends_on);
        }

        Ok(Self { dependencies })
    }

    pub async fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&content)
    }

    /// Returns service names so that every service comes after the
    /// services it depends on. Ties are broken by name.
    pub fn startup_order(&self) -> Result<Vec<&str>> {
        let mut order = Vec::with_capacity(self.dependencies.len());
        let mut placed = BTreeSet::new();

        for (name, depends_on) in &self.dependencies {
            for dep in depends_on {
                if !self.dependencies.contains_key(dep) {
                    return Err(Error::Config(format!(
                        "service '{}' depends on unknown service '{}'",
                        name, dep
                    )));
                }
            }
        }

        while order.len() < self.dependencies.len() {
            let ready: Vec<&str> = self
                .dependencies
                .iter()
                .filter(|(name, _)| !placed.contains(name.as_str()))
                .filter(|(_, depends_on)| depends_on.iter().all(|d| placed.contains(d.as_str())))
                .map(|(name, _)| name.as_str())
                .collect();

            if ready.is_empty() {
                return Err(Error::Config("dependency cycle between compose services".to_string()));
            }
            for name in ready {
                placed.insert(name);
                order.push(name);
            }
        }

        Ok(order)
    }
}

impl Service {
    fn new(image: &str, name: &str, network: &str) -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            network.to_string(),
            ServiceNetwork {
                aliases: vec![name.to_string()],
            },
        );

        Self {
            image: image.to_string(),
            hostname: Some(name.to_string()),
            container_name: Some(name.to_string()),
            depends_on: Vec::new(),
            ports: Vec::new(),
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            networks,
        }
    }

    fn depends_on(mut self, service: &str) -> Self {
        self.depends_on.push(service.to_string());
        self
    }

    fn port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(format!("{}:{}", host, container));
        self
    }

    fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    fn volume(mut self, host: &Path, container: &str) -> Self {
        let source = bind_source(host);
        debug!("Bind mount {} -> {}", source, container);
        self.volumes.push(format!("{}:{}", source, container));
        self
    }
}

/// Compose reads a bare relative path as a named volume, so relative bind
/// mounts need an explicit `./`.
fn bind_source(path: &Path) -> String {
    let display = path.display().to_string();
    if path.is_relative() && !display.starts_with('.') {
        format!("./{}", display)
    } else {
        display
    }
}

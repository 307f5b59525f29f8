//! The connector document submitted to Kafka Connect.
//!
//! A definition is either read from a JSON file in Kafka Connect's own
//! `{"name": ..., "config": {...}}` shape, or derived from configuration
//! as a Debezium PostgreSQL source connector.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::config::{Config, ConnectorConfig, DatabaseConfig};
use crate::{Error, Result};

pub const DEBEZIUM_POSTGRES_CLASS: &str = "io.debezium.connector.postgresql.PostgresConnector";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    pub name: String,
    /// Kafka Connect stores every config value as a string; numbers and
    /// booleans in a definition file are converted on load.
    #[serde(deserialize_with = "config_values")]
    pub config: BTreeMap<String, String>,
}

impl ConnectorDefinition {
    /// Reads and checks a definition file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let definition: ConnectorDefinition = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidDefinition {
                message: format!("{}: {}", path.display(), e),
            }
        })?;
        definition.validate()?;

        info!(connector = %definition.name, "Loaded connector definition from {:?}", path);
        Ok(definition)
    }

    /// Builds a Debezium PostgreSQL source connector capturing the
    /// configured tables.
    pub fn debezium_postgres(database: &DatabaseConfig, connector: &ConnectorConfig) -> Self {
        let mut config = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            config.insert(key.to_string(), value);
        };

        set("connector.class", DEBEZIUM_POSTGRES_CLASS.to_string());
        set("tasks.max", "1".to_string());
        set("database.hostname", database.host.clone());
        set("database.port", database.port.to_string());
        set("database.user", database.user.clone());
        set("database.password", database.password.clone());
        set("database.dbname", database.name.clone());
        set("topic.prefix", connector.topic_prefix.clone());
        set("plugin.name", "pgoutput".to_string());
        set("slot.name", connector.slot_name.clone());
        set("publication.name", database.publication.clone());
        set("publication.autocreate.mode", "filtered".to_string());
        if !connector.tables.is_empty() {
            set("table.include.list", connector.tables.join(","));
        }

        let definition = Self {
            name: connector.name.clone(),
            config,
        };
        debug!(connector = %definition.name, tables = connector.tables.len(), "Built Debezium definition");
        definition
    }

    /// Loads `connector.definition` when set, otherwise derives the
    /// definition from the database and connector sections.
    pub async fn resolve(config: &Config) -> Result<Self> {
        match &config.connector.definition {
            Some(path) => Self::from_file(path).await,
            None => {
                let definition = Self::debezium_postgres(&config.database, &config.connector);
                definition.validate()?;
                Ok(definition)
            }
        }
    }

    /// Local checks only; the rest of the contract is Kafka Connect's to
    /// enforce.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDefinition {
                message: "connector name is empty".to_string(),
            });
        }
        match self.config.get("connector.class") {
            Some(class) if !class.trim().is_empty() => Ok(()),
            _ => Err(Error::InvalidDefinition {
                message: format!("connector '{}' has no connector.class", self.name),
            }),
        }
    }

    pub fn connector_class(&self) -> Option<&str> {
        self.config.get("connector.class").map(String::as_str)
    }

    /// Change topic names for the captured tables, using the
    /// definition's `topic.prefix` when it has one.
    pub fn change_topics(&self, default_prefix: &str) -> Vec<String> {
        let prefix = self
            .config
            .get("topic.prefix")
            .map(String::as_str)
            .unwrap_or(default_prefix);
        self.tables()
            .iter()
            .map(|table| format!("{}.{}", prefix, table))
            .collect()
    }

    pub fn tables(&self) -> Vec<&str> {
        self.config
            .get("table.include.list")
            .map(|list| list.split(',').map(str::trim).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }
}

fn config_values<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

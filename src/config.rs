use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::readiness::RetryPolicy;
use crate::{Error, Result};

/// Environment variable that overrides `database.name`.
pub const DB_NAME_ENV: &str = "DB_NAME";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub compose: ComposeConfig,
    pub connect: ConnectConfig,
    pub database: DatabaseConfig,
    pub connector: ConnectorConfig,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub file: PathBuf,
    pub command: String,
    pub project_name: Option<String>,
    pub data_dir: PathBuf,
    pub network: String,
    pub render_if_missing: bool,
    pub images: ImageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    pub zookeeper: String,
    pub kafka: String,
    pub connect: String,
    pub ui: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub url: String,
    pub request_timeout_secs: u64,
    pub readiness: ReadinessConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// First retry interval during `up`.
    pub poll_interval_ms: u64,
    /// First retry interval for standalone registration.
    pub register_poll_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub container: String,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Host name of PostgreSQL as seen from the connect container.
    pub host: String,
    pub port: u16,
    pub script: PathBuf,
    pub publication: String,
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub name: String,
    pub definition: Option<PathBuf>,
    pub update_existing: bool,
    pub topic_prefix: String,
    pub slot_name: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub metadata_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from an optional TOML file and `CDC_LAUNCHER_*`
    /// environment variables, then applies `DB_NAME`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("CDC_LAUNCHER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("connector.tables")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.apply_db_name(std::env::var(DB_NAME_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_db_name(&mut self, db_name: Option<String>) {
        if let Some(name) = db_name.filter(|n| !n.trim().is_empty()) {
            self.database.name = name;
        }
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.connect.url)
            .map_err(|e| Error::Config(format!("invalid connect.url '{}': {}", self.connect.url, e)))?;

        let readiness = &self.connect.readiness;
        if readiness.max_attempts == 0 {
            return Err(Error::Config("connect.readiness.max_attempts must be at least 1".to_string()));
        }
        if !readiness.multiplier.is_finite() || readiness.multiplier < 1.0 {
            return Err(Error::Config(
                "connect.readiness.multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        if self.connector.name.trim().is_empty() {
            return Err(Error::Config("connector.name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.connect.request_timeout_secs)
    }

    /// Retry policy used while the full stack is coming up.
    pub fn setup_policy(&self) -> RetryPolicy {
        self.connect.readiness.policy(self.connect.readiness.poll_interval_ms)
    }

    /// Retry policy used by the standalone `register` command.
    pub fn register_policy(&self) -> RetryPolicy {
        self.connect.readiness.policy(self.connect.readiness.register_poll_interval_ms)
    }
}

impl ReadinessConfig {
    fn policy(&self, initial_interval_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_interval: Duration::from_millis(initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms.max(initial_interval_ms)),
            multiplier: self.multiplier,
            deadline: Some(Duration::from_secs(self.deadline_secs)),
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("docker-compose.yml"),
            command: "docker-compose".to_string(),
            project_name: None,
            data_dir: PathBuf::from("data"),
            network: "cdc-network".to_string(),
            render_if_missing: true,
            images: ImageConfig::default(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            zookeeper: "confluentinc/cp-zookeeper:7.3.0".to_string(),
            kafka: "confluentinc/cp-kafka:7.3.0".to_string(),
            connect: "debezium/connect:2.1".to_string(),
            ui: "obsidiandynamics/kafdrop:3.31.0".to_string(),
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8083".to_string(),
            request_timeout_secs: 10,
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            register_poll_interval_ms: 1000,
            max_interval_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 60,
            deadline_secs: 600,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            container: "postgres".to_string(),
            name: "football_db".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            host: "postgres".to_string(),
            port: 5432,
            script: PathBuf::from("sql/enable_logical_replication.sql"),
            publication: "dbz_publication".to_string(),
            verify_url: None,
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            name: "football-postgres-connector".to_string(),
            definition: None,
            update_existing: false,
            topic_prefix: "football".to_string(),
            slot_name: "debezium_football".to_string(),
            tables: default_tables(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:29092".to_string(),
            metadata_timeout_secs: 10,
        }
    }
}

/// Tables captured when `connector.tables` is not configured: every table
/// the downstream consumers subscribe to, grouped by domain.
pub const DEFAULT_TABLES: &[&str] = &[
    // betting
    "bookmakers",
    "odds_history",
    "odds_types",
    "odds_values",
    "odds",
    // competitions
    "leagues",
    "seasons",
    "standings",
    "team_statistics",
    // reference data
    "countries",
    "media_assets",
    "venues",
    // matches
    "fixture_events",
    "fixture_statuses",
    "fixtures",
    "fixture_scores",
    "fixture_h2h",
    "fixture_lineups",
    "fixture_lineup_players",
    "fixture_coaches",
    "fixture_statistics",
    "player_statistics",
    // monitoring
    "app_metrics",
    "performance_logs",
    "update_logs",
    // people
    "coaches",
    "coach_careers",
    "players",
    "player_transfers",
    "player_teams",
    "player_injuries",
    "teams",
    "team_players",
    // users and access
    "roles",
    "permissions",
    "role_permissions",
    "user_sessions",
    "password_resets",
    "users",
    "user_profiles",
];

fn default_tables() -> Vec<String> {
    DEFAULT_TABLES
        .iter()
        .map(|table| format!("public.{}", table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_target_football_db() {
        let mut config = Config::default();
        config.apply_db_name(None);
        assert_eq!(config.database.name, "football_db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_db_name_override() {
        let mut config = Config::default();
        config.apply_db_name(Some("analytics".to_string()));
        assert_eq!(config.database.name, "analytics");

        // blank values are treated as unset
        config.apply_db_name(Some("  ".to_string()));
        assert_eq!(config.database.name, "analytics");
    }

    #[test]
    fn test_policies_keep_script_intervals() {
        let config = Config::default();
        assert_eq!(config.setup_policy().initial_interval, Duration::from_secs(2));
        assert_eq!(config.register_policy().initial_interval, Duration::from_secs(1));
        assert_eq!(config.setup_policy().max_attempts, 60);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.connect.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_finite_multiplier() {
        for multiplier in [f64::NAN, f64::INFINITY, 0.5] {
            let mut config = Config::default();
            config.connect.readiness.multiplier = multiplier;
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "multiplier {} should be rejected",
                multiplier
            );
        }

        let mut config = Config::default();
        config.connect.readiness.multiplier = 1e20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.connect.readiness.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[connect]
url = "http://connect.internal:8083"

[connector]
name = "orders-connector"
tables = ["public.orders"]
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.connect.url, "http://connect.internal:8083");
        assert_eq!(config.connector.name, "orders-connector");
        assert_eq!(config.connector.tables, vec!["public.orders".to_string()]);
        assert_eq!(config.compose.command, "docker-compose");
        assert_eq!(config.connect.readiness.poll_interval_ms, 2000);
    }

    #[test]
    fn test_default_tables() {
        let tables = Config::default().connector.tables;
        assert_eq!(tables.len(), 40);
        assert!(tables.iter().all(|t| t.starts_with("public.")));

        let unique: std::collections::BTreeSet<&String> = tables.iter().collect();
        assert_eq!(unique.len(), tables.len());

        for table in [
            "public.odds_history",
            "public.odds_types",
            "public.odds_values",
            "public.media_assets",
            "public.fixture_statuses",
            "public.fixture_scores",
            "public.fixture_h2h",
            "public.fixture_lineup_players",
            "public.fixture_coaches",
            "public.coach_careers",
            "public.player_teams",
            "public.team_players",
            "public.user_profiles",
        ] {
            assert!(tables.contains(&table.to_string()), "{} missing", table);
        }
    }
}

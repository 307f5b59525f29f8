use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::compose::ContainerRuntime;
use crate::config::DatabaseConfig;
use crate::{Error, Result};

/// Enables logical replication by piping a SQL script to `psql` inside the
/// running database container.
///
/// The script is opaque here; only the client's exit code decides success.
/// The publication name is passed as the `publication` psql variable.
#[derive(Debug, Clone)]
pub struct ReplicationInitializer {
    container: String,
    user: String,
    database: String,
    publication: String,
    script: PathBuf,
}

impl ReplicationInitializer {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            container: config.container.clone(),
            user: config.user.clone(),
            database: config.name.clone(),
            publication: config.publication.clone(),
            script: config.script.clone(),
        }
    }

    pub fn psql_args(&self) -> Vec<String> {
        let publication = format!("publication={}", self.publication);
        [
            "psql",
            "-v",
            "ON_ERROR_STOP=1",
            "-v",
            publication.as_str(),
            "-U",
            self.user.as_str(),
            "-d",
            self.database.as_str(),
            "-f",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[instrument(skip(self, runtime), fields(container = %self.container, database = %self.database))]
    pub async fn run<R: ContainerRuntime + ?Sized>(&self, runtime: &R) -> Result<()> {
        let sql = fs::read(&self.script).await.map_err(|e| {
            Error::Config(format!("cannot read SQL script {:?}: {}", self.script, e))
        })?;

        info!(script = %self.script.display(), "Configuring logical replication");

        let args = self.psql_args();
        let output = runtime.exec(&self.container, &args, Some(sql.as_slice())).await?;

        if !output.success() {
            error!(code = ?output.code, "Database configuration failed");
            return Err(Error::CommandFailed {
                command: format!("docker exec -i {} {}", self.container, args.join(" ")),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("Logical replication configured");
        Ok(())
    }
}

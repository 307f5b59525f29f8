use tokio_postgres::{NoTls, SimpleQueryMessage};
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

/// What the server reports about logical replication prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationState {
    pub wal_level: String,
    pub publication: String,
    pub publication_exists: bool,
}

impl ReplicationState {
    /// `wal_level` must be `logical` for the connector to stream changes.
    /// A missing publication only warns because Debezium can create it.
    pub fn check(&self) -> Result<()> {
        if !self.wal_level.eq_ignore_ascii_case("logical") {
            return Err(Error::Replication {
                message: format!(
                    "wal_level is '{}', expected 'logical' (restart PostgreSQL after ALTER SYSTEM)",
                    self.wal_level
                ),
            });
        }
        if !self.publication_exists {
            warn!("Publication '{}' does not exist yet", self.publication);
        }
        Ok(())
    }
}

/// Connects to PostgreSQL directly and reads the replication settings.
pub async fn verify_replication(url: &str, publication: &str) -> Result<ReplicationState> {
    info!("Verifying logical replication settings");

    let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
    let connection_task = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });

    let mut wal_level = None;
    for message in client.simple_query("SHOW wal_level").await? {
        if let SimpleQueryMessage::Row(row) = message {
            wal_level = row.get(0).map(str::to_string);
        }
    }

    let publication_exists = client
        .query_opt("SELECT 1 FROM pg_publication WHERE pubname = $1", &[&publication])
        .await?
        .is_some();

    connection_task.abort();

    let state = ReplicationState {
        wal_level: wal_level.ok_or_else(|| Error::Replication {
            message: "SHOW wal_level returned no rows".to_string(),
        })?,
        publication: publication.to_string(),
        publication_exists,
    };
    debug!("Replication state: {:?}", state);
    Ok(state)
}

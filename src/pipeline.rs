use tokio::fs;
use tracing::{info, warn};

use crate::bootstrap::DataLayout;
use crate::compose::{ComposeFile, ContainerRuntime, ServiceGraph};
use crate::connect::{ConnectClient, ConnectorDefinition, Registration, StatusReport};
use crate::postgres::{verify_replication, ReplicationInitializer};
use crate::{Config, Error, Result};

/// What a setup run did, for the caller to report.
#[derive(Debug, Clone)]
pub struct SetupSummary {
    pub connector: String,
    pub readiness_attempts: u32,
    pub registration: Registration,
    pub status: Option<StatusReport>,
}

/// The linear setup sequence: bootstrap, start containers, wait for
/// Kafka Connect, configure the database, register the connector and
/// fetch its status. The first failing step ends the run; containers
/// already started are left running.
pub struct Pipeline<R: ContainerRuntime> {
    config: Config,
    runtime: R,
    client: ConnectClient,
}

impl<R: ContainerRuntime> Pipeline<R> {
    pub fn new(config: Config, runtime: R, client: ConnectClient) -> Self {
        Self {
            config,
            runtime,
            client,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub async fn up(&self) -> Result<SetupSummary> {
        info!("Checking prerequisites");
        self.runtime.check_prerequisites().await?;

        let definition = ConnectorDefinition::resolve(&self.config).await?;

        DataLayout::new(&self.config.compose.data_dir).create().await?;
        self.ensure_compose_file().await?;
        self.runtime.up().await?;

        let attempts = self.client.wait_until_ready(&self.config.setup_policy()).await?;

        ReplicationInitializer::new(&self.config.database)
            .run(&self.runtime)
            .await?;
        if let Some(url) = &self.config.database.verify_url {
            verify_replication(url, &self.config.database.publication)
                .await?
                .check()?;
        }

        self.register_and_report(&definition, attempts).await
    }

    /// Registration against an already running stack: wait for Kafka
    /// Connect, register, report.
    pub async fn register(&self) -> Result<SetupSummary> {
        let definition = ConnectorDefinition::resolve(&self.config).await?;
        let attempts = self.client.wait_until_ready(&self.config.register_policy()).await?;
        self.register_and_report(&definition, attempts).await
    }

    pub async fn down(&self, remove_volumes: bool) -> Result<()> {
        self.runtime.check_prerequisites().await?;
        self.runtime.down(remove_volumes).await
    }

    async fn register_and_report(
        &self,
        definition: &ConnectorDefinition,
        readiness_attempts: u32,
    ) -> Result<SetupSummary> {
        let registration = self
            .client
            .create_connector(definition, self.config.connector.update_existing)
            .await?;

        let status = match self.client.connector_status(&definition.name).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(connector = %definition.name, "Could not fetch connector status: {}", e);
                None
            }
        };

        Ok(SetupSummary {
            connector: definition.name.clone(),
            readiness_attempts,
            registration,
            status,
        })
    }

    /// Uses the compose file on disk as is, writing the default topology
    /// first when it is missing and rendering is enabled. An existing file
    /// belongs to the user: its service graph is only logged, and compose
    /// has the final word on whether it is valid.
    async fn ensure_compose_file(&self) -> Result<()> {
        let path = &self.config.compose.file;

        if fs::try_exists(path).await? {
            let graph = ServiceGraph::read_from(path).await?;
            match graph.startup_order() {
                Ok(order) => info!(services = ?order, "Compose services"),
                Err(e) => warn!("Cannot order services of {:?}: {}", path, e),
            }
        } else if self.config.compose.render_if_missing {
            info!("No compose file at {:?}, writing the default topology", path);
            let compose = ComposeFile::cdc_stack(&self.config.compose);
            let graph = compose.service_graph();
            info!(services = ?graph.startup_order()?, "Compose services");
            compose.write_to(path).await?;
        } else {
            return Err(Error::Config(format!("compose file {:?} not found", path)));
        }

        Ok(())
    }
}

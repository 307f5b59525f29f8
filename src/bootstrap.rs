//! Host directories mounted into the coordination service and broker
//! containers.
//!
//! The containers run as non-root users and refuse to start when a bind
//! mount source is missing, so the directories are created before
//! `docker-compose up`.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::Result;

/// The persistent state directories under a data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub zookeeper_data: PathBuf,
    pub zookeeper_log: PathBuf,
    pub kafka_data: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            zookeeper_data: root.join("zookeeper").join("data"),
            zookeeper_log: root.join("zookeeper").join("log"),
            kafka_data: root.join("kafka").join("data"),
        }
    }

    pub fn directories(&self) -> [&Path; 3] {
        [
            self.zookeeper_data.as_path(),
            self.zookeeper_log.as_path(),
            self.kafka_data.as_path(),
        ]
    }

    /// Creates every directory in the layout. Existing directories are
    /// left untouched.
    pub async fn create(&self) -> Result<()> {
        for dir in self.directories() {
            if fs::try_exists(dir).await? {
                debug!("Directory {:?} already exists", dir);
                continue;
            }
            fs::create_dir_all(dir).await?;
            info!("Created directory {:?}", dir);
        }
        Ok(())
    }
}

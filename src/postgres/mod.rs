pub mod replication;
pub mod verify;

pub use replication::ReplicationInitializer;
pub use verify::{verify_replication, ReplicationState};

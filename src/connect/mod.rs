pub mod client;
pub mod definition;
pub mod types;


pub use client::ConnectClient;
pub use definition::ConnectorDefinition;
pub use types::{ConnectorInfo, ConnectorState, ConnectorStatus, Registration, StatusReport};

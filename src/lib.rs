pub mod bootstrap;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod readiness;

pub mod compose;
pub mod connect;
pub mod kafka;
pub mod postgres;

pub use crate::config::Config;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, SetupSummary};

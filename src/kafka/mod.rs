pub mod topic_manager;

pub use topic_manager::{TopicManager, TopicReport};

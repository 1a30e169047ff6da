pub mod config_service;
pub mod dto;
pub mod json_definition_source;
pub mod jsonl_history_store;
pub mod memory_history_store;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::json_definition_source::JsonDefinitionSource;
pub use crate::jsonl_history_store::JsonlHistoryStore;
pub use crate::memory_history_store::InMemoryHistoryStore;
pub use crate::paths::{PathError, WardenPaths};

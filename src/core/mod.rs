// src/core/mod.rs
//! Shared services: configuration, database, file storage and the LLM client

pub mod config_manager;
pub mod database;
pub mod fs_ops;
pub mod service_client;

pub use config_manager::ConfigManager;
pub use database::Database;
pub use fs_ops::FsOps;
pub use service_client::{LlmClient, LlmImage, LlmRequest, ServiceClient};

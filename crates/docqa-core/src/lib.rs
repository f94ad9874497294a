//! Core types, configuration, and error handling for docqa.
//!
//! This crate provides the shared foundation used by the other docqa crates:
//! - [`DocqaError`]: unified error type using `thiserror`
//! - [`DocqaConfig`]: configuration loaded from `.docqa.toml`
//! - Shared types: [`ChatHistory`], [`ChatTurn`], [`RetrievedChunk`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    resolve_api_key, DocqaConfig, EmbeddingConfig, IndexConfig, LlmConfig, RetrievalConfig,
    API_KEY_ENV_VARS,
};
pub use error::DocqaError;
pub use types::{ChatHistory, ChatTurn, OutputFormat, RetrievedChunk};

//! Model registry and provider catalog aggregation for mosaic.
//!
//! This crate provides:
//! - A registry of locally owned model definitions with row-level access control
//! - A registry of provider connections (OpenAI-compatible and Ollama)
//! - Provider adapters that verify endpoints and list their models
//! - A catalog aggregator that merges every connection's models into one list
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   CatalogService                     │
//! │  ┌────────────────────┐   ┌──────────────────────┐  │
//! │  │ ConnectionRegistry │   │       Adapters       │  │
//! │  │                    │   │  ┌────────┐┌──────┐  │  │
//! │  │                    │   │  │ OpenAI ││Ollama│  │  │
//! │  └────────────────────┘   │  └────────┘└──────┘  │  │
//! │                           └──────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!            │                                │
//!            ▼                                ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  ConnectionStore /   │      │  Provider endpoints  │
//! │  ModelStore          │      │  (HTTP, reqwest)     │
//! └──────────────────────┘      └──────────────────────┘
//!            ▲
//!            │
//! ┌──────────────────────┐
//! │    ModelRegistry     │
//! └──────────────────────┘
//! ```

mod error;
mod types;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod connections;
pub mod providers;
pub mod registry;
pub mod store;

pub use catalog::CatalogService;
pub use connections::ConnectionRegistry;
pub use error::{Error, ErrorKind, Result};
pub use registry::ModelRegistry;
pub use types::{
    AccessControl, AccessRule, Extensions, MAX_MODEL_ID_LEN, ModelForm, ModelImport, ModelMeta,
    ModelParams, ModelRecord, OllamaOptions, Tag,
};

/// Current time in Unix seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

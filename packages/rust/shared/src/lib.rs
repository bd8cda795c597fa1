//! Shared types, error model, and configuration for Doc2MD.
//!
//! This crate is the foundation depended on by all other Doc2MD crates.
//! It provides:
//! - [`Doc2MdError`], the unified error type
//! - Domain types ([`SourceType`], [`Tier`], [`ConversionResponse`], request bodies)
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, McpConfig, ServerConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{Doc2MdError, Result};
pub use types::{ConversionResponse, HtmlRequest, SourceType, Tier, UrlRequest};

//! Shared types, error model, configuration, and the stage contract for qexp.
//!
//! This crate is the foundation depended on by all other qexp crates.
//! It provides:
//! - [`QexpError`]: the unified error type
//! - Domain types ([`Item`], [`Payload`], [`Edge`])
//! - The [`Stage`] trait and [`StageKind`] tags
//! - Configuration ([`AppConfig`], config loading) and seed-file input

pub mod config;
pub mod error;
pub mod input;
pub mod stage;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DataConfig, DbpediaConfig, PrimingConfig, ProfilesConfig,
    WikipediaConfig, init_config, load_config_from,
};
pub use error::{QexpError, Result};
pub use input::{read_article_ids, read_column, read_parent_titles};
pub use stage::{Stage, StageKind};
pub use types::{
    CATEGORY_PREFIX, Edge, Item, Payload, RESOURCE_PREFIX, keys_to_items, to_resource_uri,
};

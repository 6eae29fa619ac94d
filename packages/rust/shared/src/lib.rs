//! Shared types, error model, and configuration for BudgetLens.
//!
//! This crate is the foundation depended on by all other BudgetLens crates.
//! It provides:
//! - [`BudgetLensError`], the unified error type
//! - Domain types ([`Item`], [`SourceFormat`]) and the failure sentinels
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, DefaultsConfig, FiltersConfig, OcrConfig, SessionConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, session_db_path,
    validate_api_key,
};
pub use error::{BudgetLensError, Result};
pub use types::{
    Item, SCORE_RANGE, SourceFormat, UNKNOWN_FUNDING_SOURCE, UNKNOWN_SCORE, parse_item_list,
};

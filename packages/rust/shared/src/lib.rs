//! Shared types, error model, configuration, and retry policy for reviewtopics.
//!
//! This crate is the foundation depended on by all other reviewtopics crates.
//! It provides:
//! - [`ReviewTopicsError`]: the unified error type
//! - Domain types ([`Review`], [`Game`], [`ReviewRow`], [`TopicRow`], [`Cursor`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)
//! - [`RetryPolicy`]: bounded retry with a fixed delay

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, DiscoveryConfig, FetchConfig, OutputConfig, ScheduleConfig,
    TopicsConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, ReviewTopicsError};
pub use retry::{RetryBudget, RetryPolicy};
pub use types::{
    Cursor, Game, NOISE_TOPIC, Review, ReviewRow, RunId, TopicId, TopicRow,
};

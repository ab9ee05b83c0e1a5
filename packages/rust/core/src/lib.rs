//! Pipeline orchestration for reviewtopics.
//!
//! Ties discovery, fetching, storage, and text normalization into the two
//! stages, and talks to the external topic-model process.

pub mod manifest;
pub mod pipeline;
pub mod summary;
pub mod topics;

pub use manifest::ModelManifest;
pub use pipeline::{
    ExtractConfig, ExtractResult, ModelConfig, ModelResult, ProgressReporter, SilentProgress,
    run_extract, run_model,
};
pub use summary::TopicSummary;
pub use topics::{BridgeConfig, BridgeTopicModel, TopicModel, TopicParams};

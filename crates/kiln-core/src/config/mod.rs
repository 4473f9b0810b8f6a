//! Configuration for the pipeline and its service wrappers
//!
//! YAML-backed configuration with serde defaults, following a layered
//! approach: a minimal file (or none at all, beyond credentials) yields a
//! working pipeline, and every knob can be overridden. Secrets are usually
//! pointed at environment variables rather than written into the file.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    ExecutionConfig, KilnConfig, LlmConfig, StorageConfig, WorkspaceConfig,
};

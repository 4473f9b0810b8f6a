//! Core library for the Kiln code-execution pipeline.
//!
//! Kiln takes a free-text user prompt, asks a language model for install
//! commands and runnable code, filters both against pattern denylists,
//! executes what survives in bounded subprocesses, and publishes every
//! produced artifact to remote object storage. One invocation returns one
//! structured report covering every stage.
//!
//! # Architecture Overview
//!
//! - **Pipeline coordination**: the linear stage machine from prompt to
//!   published artifacts, with per-item outcome reporting
//! - **Language model integration**: OpenAI-compatible client with
//!   round-robin credential rotation
//! - **Safety filtering**: best-effort denylists for shell commands and
//!   generated code (explicitly not a sandbox)
//! - **Process execution**: line-streamed subprocess runner with a hard
//!   wall-clock deadline for everything it spawns
//! - **Workspace management**: per-invocation input/output directories with
//!   randomized backups
//! - **Artifact publishing**: best-effort uploads to object storage with
//!   deterministic public URLs
//! - **Configuration**: YAML-backed config with environment-aware secrets

pub mod config;
pub mod core_types;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod llm;
pub mod packages;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod safety;
pub mod workspace;

pub use config::{ConfigLoader, KilnConfig};
pub use errors::{ExecError, PipelineError};
pub use llm::{ClientPool, OpenAIClient, LLM};
pub use pipeline::{Pipeline, PipelineReport};
pub use publish::{ArtifactStore, SupabaseStore};
pub use runner::{LogSink, ProcessRunner};
pub use safety::SafetyFilter;
pub use workspace::Workspace;

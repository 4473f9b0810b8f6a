//! Language model provider abstractions
//!
//! Defines the core LLM trait and the OpenAI-compatible HTTP client the
//! pipeline talks to, plus a rotating pool for cycling across multiple API
//! credentials. The pipeline consumes plain non-streaming completions only.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::PipelineError;
use async_trait::async_trait;

pub mod openai;
pub mod pool;

pub use openai::OpenAIClient;
pub use pool::ClientPool;

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(&self, messages: Vec<Message>) -> Result<LLMResponse, PipelineError>;
}

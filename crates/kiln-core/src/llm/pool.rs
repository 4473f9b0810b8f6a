//! Round-robin rotation across multiple LLM credentials
//!
//! Free-tier endpoints rate-limit per key, so deployments hold several keys
//! and spread requests across them. The pool owns its rotation cursor
//! explicitly instead of reading a process-wide index, and implements the
//! LLM trait itself so callers hold a single client regardless of how many
//! credentials sit behind it.

use crate::core_types::{LLMResponse, Message};
use crate::errors::PipelineError;
use crate::llm::LLM;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct ClientPool {
    clients: Vec<Arc<dyn LLM>>,
    cursor: AtomicUsize,
}

impl ClientPool {
    pub fn new(clients: Vec<Arc<dyn LLM>>) -> Result<Self, PipelineError> {
        if clients.is_empty() {
            return Err(PipelineError::ConfigError(
                "Client pool needs at least one client".to_string(),
            ));
        }
        Ok(Self {
            clients,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Hands out the next client in rotation.
    pub fn next_client(&self) -> Arc<dyn LLM> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        Arc::clone(&self.clients[index])
    }
}

#[async_trait]
impl LLM for ClientPool {
    async fn generate(&self, messages: Vec<Message>) -> Result<LLMResponse, PipelineError> {
        self.next_client().generate(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TaggedLLM {
        tag: &'static str,
    }

    #[async_trait]
    impl LLM for TaggedLLM {
        async fn generate(&self, _messages: Vec<Message>) -> Result<LLMResponse, PipelineError> {
            Ok(LLMResponse {
                content: self.tag.to_string(),
                finish_reason: None,
                usage: None,
            })
        }
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(ClientPool::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_rotation_order() {
        let pool = ClientPool::new(vec![
            Arc::new(TaggedLLM { tag: "a" }),
            Arc::new(TaggedLLM { tag: "b" }),
            Arc::new(TaggedLLM { tag: "c" }),
        ])
        .unwrap();

        let mut tags = Vec::new();
        for _ in 0..5 {
            let reply = pool.generate(vec![Message::user("hi")]).await.unwrap();
            tags.push(reply.content);
        }
        assert_eq!(tags, vec!["a", "b", "c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_single_client_pool() {
        let pool = ClientPool::new(vec![Arc::new(TaggedLLM { tag: "only" })]).unwrap();
        assert_eq!(pool.len(), 1);
        for _ in 0..3 {
            let reply = pool.generate(vec![Message::user("hi")]).await.unwrap();
            assert_eq!(reply.content, "only");
        }
    }
}

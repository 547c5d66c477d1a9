/// Completion service collaborator for AI-backed chats
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// External text-generation collaborator. Called exactly once per AI send
/// with the system role and the latest user text; every failure surfaces
/// uniformly as `ChatError::Service` (no retry, no partial content).
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Offline completion backend that rotates through canned replies.
/// Used by the demo CLI and as a test double; real backends implement
/// `CompletionService` outside the core.
pub struct ScriptedCompletion {
    replies: Vec<String>,
    next: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
        }
    }
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new(vec![
            "Happy to help! What would you like to know?".to_string(),
            "That's an interesting question. Tell me more.".to_string(),
            "Here's what I'd suggest: start with the simplest thing that works.".to_string(),
        ])
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        match self.replies.get(n % self.replies.len().max(1)) {
            Some(reply) => Ok(reply.clone()),
            None => Ok(format!("You said: {}", user_text)),
        }
    }
}

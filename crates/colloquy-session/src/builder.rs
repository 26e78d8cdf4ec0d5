use std::sync::Arc;
use anyhow::{Result, anyhow};

use colloquy_llm::ChatClient;
use colloquy_persist::PersistenceClient;
use colloquy_types::LLMConfig;

use crate::session::ChatSession;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Builder for a ChatSession bound to one signed-in user
pub struct ChatSessionBuilder {
    user_id: Option<String>,
    store: Option<Arc<dyn PersistenceClient>>,
    chat_client: Option<Arc<dyn ChatClient>>,
    llm_config: LLMConfig,
    event_capacity: usize,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self {
            user_id: None,
            store: None,
            chat_client: None,
            llm_config: LLMConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Identity every conversation is scoped to
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn store(mut self, store: Arc<dyn PersistenceClient>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn chat_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.chat_client = Some(client);
        self
    }

    /// Model settings sent with every reply request
    pub fn llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = config;
        self
    }

    /// Signals buffered per subscriber before the oldest are skipped
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        let user_id = self.user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow!("User id is required"))?;
        let store = self.store
            .ok_or_else(|| anyhow!("Store is required"))?;
        let chat_client = self.chat_client
            .ok_or_else(|| anyhow!("Chat client is required"))?;
        if self.event_capacity == 0 {
            return Err(anyhow!("Event capacity must be greater than zero"));
        }

        Ok(ChatSession::new(
            user_id,
            store,
            chat_client,
            self.llm_config,
            self.event_capacity,
        ))
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

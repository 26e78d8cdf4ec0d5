//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use colloquy::prelude::*;
//! ```

pub use crate::{
    ChatSession, ChatSessionBuilder, HistoryPanel, SessionError, SessionEvent,
    SubmitOutcome, LLMConfig,
    ChatClient, OpenAIClient, StreamEvent,
    PersistenceClient, MemoryPersistenceClient, Conversation, Message, MessageRole,
};

//! # Colloquy
//!
//! Chat sessions that keep a live, streaming assistant reply and the
//! persisted conversation history in agreement.
//!
//! A [`ChatSession`] owns the active conversation's message list. It
//! writes each user message before asking the model, shows the reply
//! while it streams, and stores the reply once it is complete. Switching
//! conversations mid-reply discards that reply instead of filing it under
//! the wrong conversation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colloquy::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = ChatSession::builder()
//!         .user_id("alice")
//!         .store(Arc::new(MemoryPersistenceClient::new()))
//!         .chat_client(Arc::new(OpenAIClient::new(std::env::var("OPENAI_API_KEY")?)?))
//!         .llm_config(LLMConfig::new("gpt-4o-mini"))
//!         .build()?;
//!
//!     let mut events = session.subscribe();
//!     if let SubmitOutcome::Completed { assistant_message, .. } = session.submit("Hello!").await? {
//!         println!("{}", assistant_message.content);
//!     }
//!
//!     for event in events.drain() {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`colloquy-llm`**: streaming chat completion client (OpenAI)
//! - **`colloquy-types`**: session signals and model settings
//! - **`colloquy-persist`**: conversation/message store, in-memory or MongoDB
//! - **`colloquy-session`**: the session reconciler and history panel
//!
//! ## License
//!
//! MIT

pub mod prelude;

pub use colloquy_session::{
    derive_title, preview, ChatSession, ChatSessionBuilder, ConversationEntry, HistoryPanel,
    SessionError, SessionSnapshot, SessionSubscription, SubmissionPhase, SubmitOutcome,
    ValidationFailure,
};

pub use colloquy_types::{LLMConfig, SessionEvent};

pub use colloquy_llm::{
    ChatClient, ChatOptions, ChatRequest, ChatStream, OpenAIClient, Role, StreamEvent,
    Message as ChatMessage,
};

pub use colloquy_persist::{
    Conversation, ConversationUpdate, MemoryPersistenceClient, Message, MessageRole,
    NewConversation, NewMessage, PersistError, PersistenceClient,
};

#[cfg(feature = "mongodb")]
pub use colloquy_persist::MongoPersistenceClient;

pub mod models;
pub mod error;
pub mod trait_client;
pub mod dbs;

pub use models::{
    Conversation, ConversationUpdate, Message, MessageRole, NewConversation, NewMessage,
    DEFAULT_CONVERSATION_TITLE,
};
pub use trait_client::PersistenceClient;
pub use error::{PersistError, Result};
pub use dbs::memory::MemoryPersistenceClient;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;

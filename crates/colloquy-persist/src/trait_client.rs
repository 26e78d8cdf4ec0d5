use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Conversation, ConversationUpdate, Message, NewConversation, NewMessage};

/// Keyed record store for conversations and their messages
///
/// Implementations assign ids and timestamps. There is no cascade:
/// callers delete a conversation's messages before the conversation.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Insert a conversation and return the stored record
    async fn create_conversation(&self, conversation: NewConversation) -> Result<Conversation>;

    /// Set preview text and ordering key; the title is never changed
    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: ConversationUpdate,
    ) -> Result<()>;

    /// Delete a conversation owned by `user_id`. Deleting a missing
    /// record is not an error.
    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    /// Conversations of a user, most recently updated first
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Insert a message and return the stored record
    async fn save_message(&self, message: NewMessage) -> Result<Message>;

    /// Messages of a conversation, oldest first
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Remove every message of a conversation, returning how many were removed
    async fn delete_messages(&self, conversation_id: &str) -> Result<u64>;
}

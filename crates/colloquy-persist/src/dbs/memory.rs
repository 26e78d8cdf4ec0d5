use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{Conversation, ConversationUpdate, Message, NewConversation, NewMessage};
use crate::trait_client::PersistenceClient;

/// Process-local store, used by default and in tests
#[derive(Default)]
pub struct MemoryPersistenceClient {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Timestamps never repeat, so ordering by them is total
    fn stamp(&mut self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        let stamp = match self.last_stamp {
            Some(last) if candidate <= last => last + Duration::microseconds(1),
            _ => candidate,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

impl MemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across conversations
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }

    pub async fn conversation_count(&self) -> usize {
        self.tables.read().await.conversations.len()
    }
}

#[async_trait]
impl PersistenceClient for MemoryPersistenceClient {
    async fn create_conversation(&self, conversation: NewConversation) -> Result<Conversation> {
        let mut tables = self.tables.write().await;
        let now = tables.stamp(Utc::now());
        let record = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: conversation.user_id,
            title: conversation.title,
            last_message: conversation.last_message,
            created_at: now,
            updated_at: now,
        };
        tables.conversations.push(record.clone());
        Ok(record)
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: ConversationUpdate,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stamp = tables.stamp(update.updated_at);
        let conversation = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;

        conversation.last_message = Some(update.last_message);
        conversation.updated_at = stamp;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .conversations
            .retain(|c| !(c.id == conversation_id && c.user_id == user_id));
        Ok(())
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn save_message(&self, message: NewMessage) -> Result<Message> {
        let mut tables = self.tables.write().await;
        let created_at = tables.stamp(Utc::now());
        let record = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            created_at,
        };
        tables.messages.push(record.clone());
        Ok(record)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn delete_messages(&self, conversation_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.messages.len();
        tables.messages.retain(|m| m.conversation_id != conversation_id);
        Ok((before - tables.messages.len()) as u64)
    }
}

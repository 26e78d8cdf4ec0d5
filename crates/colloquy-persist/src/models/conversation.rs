use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to conversations started from an explicit "new chat" action
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

/// Database-agnostic conversation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Full text of the most recent message
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub user_id: String,
    pub title: String,
    pub last_message: Option<String>,
}

impl NewConversation {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            last_message: None,
        }
    }

    /// Conversation created by the "new chat" action
    pub fn placeholder(user_id: impl Into<String>) -> Self {
        Self::new(user_id, DEFAULT_CONVERSATION_TITLE)
    }

    pub fn with_last_message(mut self, text: impl Into<String>) -> Self {
        self.last_message = Some(text.into());
        self
    }
}

/// Fields refreshed whenever a message is added to a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
}

impl ConversationUpdate {
    pub fn for_message(text: impl Into<String>) -> Self {
        Self {
            last_message: text.into(),
            updated_at: Utc::now(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Signals a chat session emits after each state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// In-memory message list (or the in-progress reply) changed.
    /// `None` means the session has no active conversation.
    MessagesChanged {
        conversation_id: Option<String>,
    },

    /// A conversation's preview or ordering key changed
    ConversationChanged {
        conversation_id: String,
    },

    /// A conversation was created or removed
    ConversationListChanged,
}

impl SessionEvent {
    /// Whether a conversation listing should be re-fetched
    pub fn affects_listing(&self) -> bool {
        matches!(self, Self::ConversationChanged { .. } | Self::ConversationListChanged)
    }
}

use chrono::{DateTime, Utc};
use colloquy_persist::{Conversation, DEFAULT_CONVERSATION_TITLE};
use colloquy_types::SessionEvent;

use crate::error::SessionError;
use crate::session::ChatSession;
use crate::subscription::SessionSubscription;
use crate::title::preview;

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub id: String,
    pub title: String,
    pub preview: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl ConversationEntry {
    fn from_conversation(conversation: Conversation, active_id: Option<&str>) -> Self {
        let title = if conversation.title.trim().is_empty() {
            DEFAULT_CONVERSATION_TITLE.to_string()
        } else {
            conversation.title
        };

        Self {
            active: active_id == Some(conversation.id.as_str()),
            preview: conversation.last_message.as_deref().map(preview),
            id: conversation.id,
            title,
            updated_at: conversation.updated_at,
        }
    }
}

/// Conversation list for one session
///
/// Holds nothing but the rows it displays. Creation, deletion and
/// selection go through the session.
pub struct HistoryPanel {
    session: ChatSession,
    entries: Vec<ConversationEntry>,
}

impl HistoryPanel {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    /// Entry at a display position
    pub fn get(&self, index: usize) -> Option<&ConversationEntry> {
        self.entries.get(index)
    }

    /// Re-fetch the list, most recently updated first
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let conversations = self.session.list_conversations().await?;
        let active = self.session.active_conversation_id().await;

        self.entries = conversations
            .into_iter()
            .map(|c| ConversationEntry::from_conversation(c, active.as_deref()))
            .collect();
        tracing::debug!(count = self.entries.len(), "history refreshed");
        Ok(())
    }

    /// React to one session signal. Returns whether the list was re-fetched.
    pub async fn apply(&mut self, event: &SessionEvent) -> Result<bool, SessionError> {
        if !event.affects_listing() {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Drain pending signals, re-fetching at most once
    pub async fn sync(&mut self, subscription: &mut SessionSubscription) -> Result<bool, SessionError> {
        let stale = subscription
            .drain()
            .iter()
            .any(SessionEvent::affects_listing);
        if stale {
            self.refresh().await?;
        }
        Ok(stale)
    }

    /// Start a fresh conversation and make it the active one
    pub async fn new_chat(&mut self) -> Result<String, SessionError> {
        let conversation_id = self.session.create_conversation().await?;
        self.session.select_conversation(Some(&conversation_id)).await?;
        self.refresh().await?;
        Ok(conversation_id)
    }

    pub async fn open(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        self.session.select_conversation(Some(conversation_id)).await?;
        self.mark_active(Some(conversation_id));
        Ok(())
    }

    pub async fn remove(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        let result = self.session.delete_conversation(conversation_id).await;
        // Even a partial delete changes what the list shows
        self.refresh().await?;
        result
    }

    fn mark_active(&mut self, active_id: Option<&str>) {
        for entry in &mut self.entries {
            entry.active = active_id == Some(entry.id.as_str());
        }
    }
}

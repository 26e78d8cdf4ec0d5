use std::sync::Arc;

use colloquy_llm::{ChatClient, ChatRequest, StreamEvent};
use colloquy_persist::{
    Conversation, ConversationUpdate, Message, NewConversation, NewMessage, PersistenceClient,
};
use colloquy_types::{LLMConfig, SessionEvent};
use futures::StreamExt;
use tokio::sync::{broadcast, Mutex, MutexGuard};

use crate::error::{SessionError, ValidationFailure};
use crate::state::{SessionState, SubmissionPhase};
use crate::subscription::SessionSubscription;
use crate::title::derive_title;

/// How a submission that was not rejected ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Both messages are persisted and shown
    Completed {
        conversation_id: String,
        user_message: Message,
        assistant_message: Message,
    },
    /// The user moved to another conversation before the reply was stored.
    /// Whatever was persisted before that point stays; nothing more is written.
    Abandoned,
}

/// Point-in-time view of a session for a presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub active_conversation_id: Option<String>,
    pub messages: Vec<Message>,
    /// Assistant text received so far while a reply streams
    pub pending_reply: Option<String>,
    pub phase: SubmissionPhase,
    pub last_error: Option<SessionError>,
}

struct Inner {
    user_id: String,
    store: Arc<dyn PersistenceClient>,
    chat_client: Arc<dyn ChatClient>,
    llm_config: LLMConfig,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

/// One signed-in user's chat session
///
/// Owns the active conversation's message list and is the only writer of
/// it. Persisted history and the live reply stream are merged here; each
/// message is written to the store exactly once. Cloning yields another
/// handle to the same session.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    pub(crate) fn new(
        user_id: String,
        store: Arc<dyn PersistenceClient>,
        chat_client: Arc<dyn ChatClient>,
        llm_config: LLMConfig,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        tracing::info!(user_id = %user_id, model = %llm_config.model, "chat session created");

        Self {
            inner: Arc::new(Inner {
                user_id,
                store,
                chat_client,
                llm_config,
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    pub fn builder() -> crate::builder::ChatSessionBuilder {
        crate::builder::ChatSessionBuilder::new()
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn llm_config(&self) -> &LLMConfig {
        &self.inner.llm_config
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.inner.events.subscribe())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().await;
        SessionSnapshot {
            active_conversation_id: state.active_conversation_id.clone(),
            messages: state.messages.clone(),
            pending_reply: state.pending_reply().map(str::to_string),
            phase: state.phase(),
            last_error: state.last_error.clone(),
        }
    }

    pub async fn active_conversation_id(&self) -> Option<String> {
        self.inner.state.lock().await.active_conversation_id.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().await.messages.clone()
    }

    pub async fn is_submitting(&self) -> bool {
        self.inner.state.lock().await.is_submitting()
    }

    pub async fn last_error(&self) -> Option<SessionError> {
        self.inner.state.lock().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.inner.state.lock().await.last_error = None;
    }

    /// Make `conversation_id` the active conversation and reload its
    /// messages from the store, replacing the in-memory list. `None`
    /// clears the view. Any in-flight submission is abandoned.
    pub async fn select_conversation(&self, conversation_id: Option<&str>) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if let Some((ticket, phase)) = state.abandon() {
            tracing::info!(submission = ticket, phase = phase.as_str(), "abandoning in-flight submission");
        }

        let Some(conversation_id) = conversation_id else {
            state.reset_view(None, Vec::new());
            drop(state);
            tracing::debug!("conversation view cleared");
            self.emit(SessionEvent::MessagesChanged { conversation_id: None });
            return Ok(());
        };

        state.reset_view(Some(conversation_id.to_string()), Vec::new());
        // Lock stays held so overlapping selections cannot interleave
        let result = match self.inner.store.get_messages(conversation_id).await {
            Ok(messages) => {
                tracing::debug!(conversation_id, count = messages.len(), "conversation loaded");
                state.messages = messages;
                Ok(())
            }
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "failed to load conversation");
                let err = SessionError::store_read("messages", e);
                state.last_error = Some(err.clone());
                Err(err)
            }
        };
        drop(state);

        self.emit(SessionEvent::MessagesChanged {
            conversation_id: Some(conversation_id.to_string()),
        });
        result
    }

    /// Send `text` to the active conversation (creating one if none is
    /// active) and stream the assistant reply into the session.
    ///
    /// Empty input and a submission already in flight are rejected with
    /// `SessionError::Validation` and leave no trace.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationFailure::EmptyInput.into());
        }

        // Everything up to the stream open runs under the lock, so a
        // switch or delete is ordered entirely before or after these writes
        let (ticket, conversation_id, created, user_message, seed) = {
            let mut state = self.inner.state.lock().await;
            let ticket = state.begin_submission()?;
            tracing::info!(submission = ticket, "submission started");

            let (conversation_id, created) = match state.active_conversation_id.clone() {
                Some(id) => (id, false),
                None => match self.start_conversation(ticket, text).await {
                    Ok(id) => {
                        state.reset_view(Some(id.clone()), Vec::new());
                        (id, true)
                    }
                    Err(err) => return Err(self.fail_locked(state, ticket, err)),
                },
            };

            let user_message = match self
                .inner
                .store
                .save_message(NewMessage::user(&conversation_id, text))
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    let err = SessionError::store_write("user message", e);
                    let err = self.fail_locked(state, ticket, err);
                    if created {
                        self.emit(SessionEvent::ConversationListChanged);
                    }
                    return Err(err);
                }
            };
            state.messages.push(user_message.clone());
            state.advance(ticket, SubmissionPhase::Streaming);
            let seed = self.seed_messages(&state.messages);
            (ticket, conversation_id, created, user_message, seed)
        };

        if created {
            self.emit(SessionEvent::ConversationListChanged);
        }
        self.emit_messages_changed(&conversation_id);
        self.refresh_preview(ticket, &conversation_id, text).await;

        if !self.inner.state.lock().await.owns(ticket) {
            tracing::info!(submission = ticket, "submission abandoned before reply started");
            return Ok(SubmitOutcome::Abandoned);
        }

        let request = ChatRequest::new(self.inner.llm_config.model.clone(), seed)
            .with_options(self.inner.llm_config.chat_options());
        let mut stream = match self.inner.chat_client.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(ticket, SessionError::StreamOpen(e.to_string())).await),
        };

        let (mut state, final_text) = loop {
            let item = stream.next().await;
            let mut state = self.inner.state.lock().await;
            if !state.owns(ticket) {
                // Dropping the stream releases the transport
                tracing::info!(submission = ticket, conversation_id = %conversation_id, "reply discarded after conversation switch");
                return Ok(SubmitOutcome::Abandoned);
            }

            match item {
                Some(Ok(StreamEvent::Delta { content })) => {
                    state.push_delta(ticket, &content);
                    drop(state);
                    self.emit_messages_changed(&conversation_id);
                }
                Some(Ok(StreamEvent::Final { content })) => break (state, content),
                Some(Ok(StreamEvent::Error { message })) => {
                    return Err(self.fail_locked(state, ticket, SessionError::StreamTransport(message)));
                }
                Some(Err(e)) => {
                    return Err(self.fail_locked(state, ticket, SessionError::StreamTransport(e.to_string())));
                }
                None => {
                    let err = SessionError::StreamTransport("stream ended before the reply completed".to_string());
                    return Err(self.fail_locked(state, ticket, err));
                }
            }
        };
        drop(stream);

        let Some(reply) = state.complete_reply(ticket, final_text) else {
            return Ok(SubmitOutcome::Abandoned);
        };

        // Written under the lock: a conversation switch either happened
        // before the ownership check above or waits for this write
        let assistant_message = match self
            .inner
            .store
            .save_message(NewMessage::assistant(&conversation_id, reply))
            .await
        {
            Ok(message) => message,
            Err(e) => {
                let err = SessionError::store_write("assistant message", e);
                return Err(self.fail_locked(state, ticket, err));
            }
        };
        state.messages.push(assistant_message.clone());
        state.reply_stored(ticket);
        drop(state);
        self.emit_messages_changed(&conversation_id);

        self.refresh_preview(ticket, &conversation_id, &assistant_message.content).await;

        self.inner.state.lock().await.finish(ticket);
        tracing::info!(submission = ticket, conversation_id = %conversation_id, "submission completed");

        Ok(SubmitOutcome::Completed {
            conversation_id,
            user_message,
            assistant_message,
        })
    }

    /// Create an empty conversation titled "New conversation". The active
    /// conversation does not change.
    pub async fn create_conversation(&self) -> Result<String, SessionError> {
        let conversation = self
            .inner
            .store
            .create_conversation(NewConversation::placeholder(self.inner.user_id.clone()))
            .await
            .map_err(|e| SessionError::store_write("conversation", e));

        match conversation {
            Ok(conversation) => {
                tracing::info!(conversation_id = %conversation.id, "conversation created");
                self.emit(SessionEvent::ConversationListChanged);
                Ok(conversation.id)
            }
            Err(err) => Err(self.record(err).await),
        }
    }

    /// Delete a conversation and, first, all of its messages
    ///
    /// The two deletes are not atomic. If the conversation record survives
    /// after its messages are gone, `SessionError::PartialDelete` is
    /// returned and calling this again finishes the job.
    ///
    /// Deleting the active conversation abandons any submission in flight.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), SessionError> {
        // Submissions only write while holding the lock, so none can add a
        // message between this delete and the abandonment below
        let cleared = {
            let mut state = self.inner.state.lock().await;
            let removed = match self.inner.store.delete_messages(conversation_id).await {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::error!(conversation_id, error = %e, "failed to delete messages");
                    let err = SessionError::store_write("message deletion", e);
                    state.last_error = Some(err.clone());
                    return Err(err);
                }
            };
            tracing::debug!(conversation_id, removed, "messages deleted");

            if state.active_conversation_id.as_deref() == Some(conversation_id) {
                if let Some((ticket, phase)) = state.abandon() {
                    tracing::info!(submission = ticket, phase = phase.as_str(), "abandoning in-flight submission");
                }
                state.reset_view(None, Vec::new());
                true
            } else {
                false
            }
        };
        if cleared {
            self.emit(SessionEvent::MessagesChanged { conversation_id: None });
        }

        let result = self
            .inner
            .store
            .delete_conversation(conversation_id, &self.inner.user_id)
            .await;
        self.emit(SessionEvent::ConversationListChanged);

        match result {
            Ok(()) => {
                tracing::info!(conversation_id, "conversation deleted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "conversation emptied but not deleted");
                let err = SessionError::PartialDelete {
                    conversation_id: conversation_id.to_string(),
                    message: e.to_string(),
                };
                Err(self.record(err).await)
            }
        }
    }

    /// The user's conversations, most recently updated first
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, SessionError> {
        match self.inner.store.list_conversations(&self.inner.user_id).await {
            Ok(conversations) => Ok(conversations),
            Err(e) => Err(self.record(SessionError::store_read("conversations", e)).await),
        }
    }

    /// Create the conversation for a first message. Called with the
    /// session lock held; the caller binds it as the active conversation.
    async fn start_conversation(&self, ticket: u64, text: &str) -> Result<String, SessionError> {
        let new_conversation = NewConversation::new(self.inner.user_id.clone(), derive_title(text))
            .with_last_message(text);

        let conversation = self
            .inner
            .store
            .create_conversation(new_conversation)
            .await
            .map_err(|e| SessionError::store_write("conversation", e))?;
        tracing::info!(submission = ticket, conversation_id = %conversation.id, title = %conversation.title, "conversation started");
        Ok(conversation.id)
    }

    /// Refresh a conversation's preview and ordering key after a message
    /// was stored. A failure here leaves the stored message in place; it
    /// is recorded as `last_error` but does not fail the submission.
    async fn refresh_preview(&self, ticket: u64, conversation_id: &str, text: &str) {
        match self
            .inner
            .store
            .update_conversation(conversation_id, ConversationUpdate::for_message(text))
            .await
        {
            Ok(()) => self.emit(SessionEvent::ConversationChanged {
                conversation_id: conversation_id.to_string(),
            }),
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "failed to update conversation preview");
                let mut state = self.inner.state.lock().await;
                if state.owns(ticket) {
                    state.last_error = Some(SessionError::store_write("conversation preview", e));
                }
            }
        }
    }

    fn seed_messages(&self, messages: &[Message]) -> Vec<colloquy_llm::Message> {
        self.inner
            .llm_config
            .system_prompt
            .iter()
            .map(|prompt| colloquy_llm::Message::system(prompt.clone()))
            .chain(messages.iter().map(colloquy_llm::Message::from))
            .collect()
    }

    async fn fail(&self, ticket: u64, error: SessionError) -> SessionError {
        let state = self.inner.state.lock().await;
        self.fail_locked(state, ticket, error)
    }

    fn fail_locked(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        ticket: u64,
        error: SessionError,
    ) -> SessionError {
        let failed = state.fail(ticket, &error);
        let conversation_id = state.active_conversation_id.clone();
        drop(state);

        match failed {
            Some(phase) => {
                tracing::error!(submission = ticket, phase = phase.as_str(), error = %error, "submission failed");
                if phase == SubmissionPhase::Streaming || phase == SubmissionPhase::PersistingAssistant {
                    // Placeholder discarded
                    self.emit(SessionEvent::MessagesChanged { conversation_id });
                }
            }
            None => {
                tracing::warn!(submission = ticket, error = %error, "abandoned submission failed");
            }
        }
        error
    }

    async fn record(&self, error: SessionError) -> SessionError {
        self.inner.state.lock().await.last_error = Some(error.clone());
        error
    }

    fn emit_messages_changed(&self, conversation_id: &str) {
        self.emit(SessionEvent::MessagesChanged {
            conversation_id: Some(conversation_id.to_string()),
        });
    }

    fn emit(&self, event: SessionEvent) {
        tracing::trace!(?event, "session event");
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

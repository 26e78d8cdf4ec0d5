use colloquy_persist::Message;

use crate::error::{SessionError, ValidationFailure};

/// Where the current submission is. Every non-idle phase can fail
/// straight back to `Idle`, carrying the error into `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    PersistingUser,
    Streaming,
    PersistingAssistant,
}

impl SubmissionPhase {
    fn can_advance_to(self, next: SubmissionPhase) -> bool {
        matches!(
            (self, next),
            (Self::PersistingUser, Self::Streaming) | (Self::Streaming, Self::PersistingAssistant)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PersistingUser => "persisting_user",
            Self::Streaming => "streaming",
            Self::PersistingAssistant => "persisting_assistant",
        }
    }
}

#[derive(Debug)]
struct ActiveSubmission {
    ticket: u64,
    phase: SubmissionPhase,
    /// Transient placeholder, never persisted mid-stream
    reply: String,
    /// The reply is in `messages`; only the preview refresh remains
    stored: bool,
}

/// Mutable session state, owned by one `ChatSession`
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub active_conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub last_error: Option<SessionError>,
    submission: Option<ActiveSubmission>,
    next_ticket: u64,
}

impl SessionState {
    pub fn phase(&self) -> SubmissionPhase {
        self.submission
            .as_ref()
            .map_or(SubmissionPhase::Idle, |s| s.phase)
    }

    pub fn is_submitting(&self) -> bool {
        self.submission.is_some()
    }

    /// Idle → PersistingUser. Returns the ticket that identifies this
    /// submission in every later transition.
    pub fn begin_submission(&mut self) -> Result<u64, ValidationFailure> {
        if self.submission.is_some() {
            return Err(ValidationFailure::SubmissionInFlight);
        }
        self.next_ticket += 1;
        self.submission = Some(ActiveSubmission {
            ticket: self.next_ticket,
            phase: SubmissionPhase::PersistingUser,
            reply: String::new(),
            stored: false,
        });
        self.last_error = None;
        Ok(self.next_ticket)
    }

    pub fn owns(&self, ticket: u64) -> bool {
        self.submission.as_ref().is_some_and(|s| s.ticket == ticket)
    }

    pub fn advance(&mut self, ticket: u64, next: SubmissionPhase) -> bool {
        match self.submission.as_mut() {
            Some(s) if s.ticket == ticket && s.phase.can_advance_to(next) => {
                tracing::debug!(submission = ticket, from = s.phase.as_str(), to = next.as_str(), "phase transition");
                s.phase = next;
                true
            }
            _ => false,
        }
    }

    pub fn push_delta(&mut self, ticket: u64, delta: &str) -> bool {
        match self.submission.as_mut() {
            Some(s) if s.ticket == ticket && s.phase == SubmissionPhase::Streaming => {
                s.reply.push_str(delta);
                true
            }
            _ => false,
        }
    }

    /// In-progress assistant text, if a reply is streaming
    pub fn pending_reply(&self) -> Option<&str> {
        self.submission
            .as_ref()
            .filter(|s| matches!(s.phase, SubmissionPhase::Streaming | SubmissionPhase::PersistingAssistant))
            .filter(|s| !s.stored)
            .map(|s| s.reply.as_str())
    }

    /// Streaming → PersistingAssistant, returning the text to store:
    /// the provider's final text when present, else what was accumulated
    pub fn complete_reply(&mut self, ticket: u64, final_text: String) -> Option<String> {
        if !self.advance(ticket, SubmissionPhase::PersistingAssistant) {
            return None;
        }
        let submission = self.submission.as_mut()?;
        if !final_text.is_empty() {
            submission.reply = final_text;
        }
        Some(submission.reply.clone())
    }

    /// The assistant message was stored and appended, so the placeholder
    /// goes away while the submission finishes up
    pub fn reply_stored(&mut self, ticket: u64) -> bool {
        match self.submission.as_mut() {
            Some(s) if s.ticket == ticket && s.phase == SubmissionPhase::PersistingAssistant => {
                s.reply.clear();
                s.stored = true;
                true
            }
            _ => false,
        }
    }

    /// Back to Idle after a successful round-trip
    pub fn finish(&mut self, ticket: u64) -> bool {
        if self.owns(ticket) {
            self.submission = None;
            true
        } else {
            false
        }
    }

    /// Failed(phase) → Idle. The placeholder is dropped; the error is only
    /// recorded if this submission still owns the session.
    pub fn fail(&mut self, ticket: u64, error: &SessionError) -> Option<SubmissionPhase> {
        if !self.owns(ticket) {
            return None;
        }
        let failed = self.submission.take().map(|s| s.phase);
        self.last_error = Some(error.clone());
        failed
    }

    /// Drop any in-flight submission without recording an error
    pub fn abandon(&mut self) -> Option<(u64, SubmissionPhase)> {
        self.submission.take().map(|s| (s.ticket, s.phase))
    }

    /// Consistency reset for a newly selected conversation
    pub fn reset_view(&mut self, conversation_id: Option<String>, messages: Vec<Message>) {
        self.active_conversation_id = conversation_id;
        self.messages = messages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_submission_at_a_time() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();

        assert_eq!(state.phase(), SubmissionPhase::PersistingUser);
        assert_eq!(state.begin_submission(), Err(ValidationFailure::SubmissionInFlight));
        assert!(state.owns(ticket));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();

        assert!(state.pending_reply().is_none());
        assert!(state.advance(ticket, SubmissionPhase::Streaming));
        assert!(state.push_delta(ticket, "Hel"));
        assert!(state.push_delta(ticket, "lo"));
        assert_eq!(state.pending_reply(), Some("Hello"));

        assert_eq!(state.complete_reply(ticket, String::new()), Some("Hello".to_string()));
        assert_eq!(state.phase(), SubmissionPhase::PersistingAssistant);
        assert!(state.finish(ticket));
        assert_eq!(state.phase(), SubmissionPhase::Idle);
    }

    #[test]
    fn test_stored_reply_drops_placeholder() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();
        state.advance(ticket, SubmissionPhase::Streaming);
        assert!(!state.reply_stored(ticket));

        state.push_delta(ticket, "answer");
        state.complete_reply(ticket, String::new());
        assert_eq!(state.pending_reply(), Some("answer"));

        assert!(!state.reply_stored(ticket + 1));
        assert!(state.reply_stored(ticket));
        assert!(state.pending_reply().is_none());
        assert_eq!(state.phase(), SubmissionPhase::PersistingAssistant);
        assert!(state.is_submitting());
    }

    #[test]
    fn test_final_text_overrides_accumulated() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();
        state.advance(ticket, SubmissionPhase::Streaming);
        state.push_delta(ticket, "partial");

        assert_eq!(state.complete_reply(ticket, "complete".to_string()), Some("complete".to_string()));
    }

    #[test]
    fn test_out_of_order_transitions_are_refused() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();

        assert!(!state.advance(ticket, SubmissionPhase::PersistingAssistant));
        assert!(!state.push_delta(ticket, "early"));
        assert!(!state.advance(ticket + 1, SubmissionPhase::Streaming));
        assert_eq!(state.phase(), SubmissionPhase::PersistingUser);
    }

    #[test]
    fn test_fail_records_error_and_returns_to_idle() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();
        state.advance(ticket, SubmissionPhase::Streaming);
        state.push_delta(ticket, "half");

        let error = SessionError::StreamTransport("reset".to_string());
        assert_eq!(state.fail(ticket, &error), Some(SubmissionPhase::Streaming));
        assert_eq!(state.phase(), SubmissionPhase::Idle);
        assert!(state.pending_reply().is_none());
        assert_eq!(state.last_error, Some(error));
    }

    #[test]
    fn test_abandoned_ticket_cannot_fail_or_finish() {
        let mut state = SessionState::default();
        let ticket = state.begin_submission().unwrap();
        assert_eq!(state.abandon(), Some((ticket, SubmissionPhase::PersistingUser)));

        let error = SessionError::StreamOpen("late".to_string());
        assert_eq!(state.fail(ticket, &error), None);
        assert!(!state.finish(ticket));
        assert!(state.last_error.is_none());

        let next = state.begin_submission().unwrap();
        assert_ne!(next, ticket);
    }

    #[test]
    fn test_new_submission_clears_previous_error() {
        let mut state = SessionState::default();
        state.last_error = Some(SessionError::StreamTransport("x".to_string()));

        state.begin_submission().unwrap();
        assert!(state.last_error.is_none());
    }
}

use std::io::Write;

use colloquy_session::{ChatSession, SessionEvent, SessionSnapshot, SubmissionPhase};
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Tracks how much of the streaming reply is already on screen
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    anchor: Option<(Option<String>, usize)>,
    printed: usize,
}

impl ReplyPrinter {
    /// Text not yet printed for the reply in `snapshot`
    pub fn advance(&mut self, snapshot: &SessionSnapshot) -> Option<String> {
        if snapshot.phase != SubmissionPhase::Streaming {
            return None;
        }
        let text = snapshot.pending_reply.as_deref()?;

        // A reply is identified by where it sits in its conversation
        let anchor = (snapshot.active_conversation_id.clone(), snapshot.messages.len());
        if self.anchor.as_ref() != Some(&anchor) {
            self.anchor = Some(anchor);
            self.printed = 0;
        }

        let fresh = text.get(self.printed..).filter(|s| !s.is_empty())?;
        self.printed = text.len();
        Some(fresh.to_string())
    }
}

/// Print reply deltas as they arrive
pub fn spawn_renderer(session: ChatSession) -> JoinHandle<()> {
    let events = session.subscribe().into_stream();
    tokio::spawn(async move {
        let mut events = Box::pin(events);
        let mut printer = ReplyPrinter::default();
        while let Some(event) = events.next().await {
            if !matches!(event, SessionEvent::MessagesChanged { .. }) {
                continue;
            }
            let snapshot = session.snapshot().await;
            if let Some(text) = printer.advance(&snapshot) {
                let mut stdout = std::io::stdout().lock();
                if write!(stdout, "{text}").and_then(|_| stdout.flush()).is_err() {
                    tracing::debug!("stdout closed, renderer stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming(conversation: &str, messages: usize, reply: &str) -> SessionSnapshot {
        let message = colloquy_session::Message {
            id: "m".to_string(),
            conversation_id: conversation.to_string(),
            role: colloquy_session::MessageRole::User,
            content: "q".to_string(),
            created_at: chrono::Utc::now(),
        };
        SessionSnapshot {
            active_conversation_id: Some(conversation.to_string()),
            messages: vec![message; messages],
            pending_reply: Some(reply.to_string()),
            phase: SubmissionPhase::Streaming,
            last_error: None,
        }
    }

    #[test]
    fn test_prints_only_new_text() {
        let mut printer = ReplyPrinter::default();

        assert_eq!(printer.advance(&streaming("a", 1, "")), None);
        assert_eq!(printer.advance(&streaming("a", 1, "Hel")), Some("Hel".to_string()));
        assert_eq!(printer.advance(&streaming("a", 1, "Hel")), None);
        assert_eq!(printer.advance(&streaming("a", 1, "Hello")), Some("lo".to_string()));
    }

    #[test]
    fn test_next_reply_starts_over() {
        let mut printer = ReplyPrinter::default();
        printer.advance(&streaming("a", 1, "first reply"));

        assert_eq!(printer.advance(&streaming("a", 3, "Se")), Some("Se".to_string()));
        assert_eq!(printer.advance(&streaming("b", 3, "Other")), Some("Other".to_string()));
    }

    #[test]
    fn test_ignores_other_phases() {
        let mut printer = ReplyPrinter::default();
        let mut snapshot = streaming("a", 1, "done");
        snapshot.phase = SubmissionPhase::PersistingAssistant;

        assert_eq!(printer.advance(&snapshot), None);
    }
}

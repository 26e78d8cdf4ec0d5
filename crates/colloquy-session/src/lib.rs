pub mod builder;
pub mod error;
pub mod history;
pub mod session;
pub mod state;
pub mod subscription;
pub mod title;

pub use builder::ChatSessionBuilder;
pub use error::{SessionError, ValidationFailure};
pub use history::{ConversationEntry, HistoryPanel};
pub use session::{ChatSession, SessionSnapshot, SubmitOutcome};
pub use state::SubmissionPhase;
pub use subscription::SessionSubscription;
pub use title::{derive_title, preview};

// Re-export key types from the collaborator crates
pub use colloquy_types::{LLMConfig, SessionEvent};
pub use colloquy_persist::{Conversation, Message, MessageRole};

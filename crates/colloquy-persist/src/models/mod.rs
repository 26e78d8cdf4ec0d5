mod conversation;
mod message;

pub use conversation::{Conversation, ConversationUpdate, NewConversation, DEFAULT_CONVERSATION_TITLE};
pub use message::{Message, MessageRole, NewMessage};

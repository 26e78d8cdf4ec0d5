pub mod conversation;
pub mod message;

pub use conversation::MongoConversationRepository;
pub use message::MongoMessageRepository;

pub mod types;
pub mod traits;
pub mod streaming;
pub mod openai;

pub use traits::{ChatClient, ChatRequest, ChatOptions, ChatStream};
pub use streaming::{StreamEvent, LineBuffer, parse_chat_sse_stream};
pub use openai::OpenAIClient;
pub use types::{Message, Role};

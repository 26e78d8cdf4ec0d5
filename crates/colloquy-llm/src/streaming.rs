use anyhow::Result;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::traits::ChatStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental piece of the assistant reply
    Delta {
        content: String,
    },

    /// Normal completion, carrying the full reply text
    Final {
        content: String,
    },

    /// Provider reported a failure mid-stream
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// Splits a byte stream into text lines, keeping partial lines
/// (and partial UTF-8 sequences) until their newline arrives
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line without its `\n` / `\r\n` terminator
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(String::from_utf8(line).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in stream: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Parse an OpenAI-style chat completion SSE body into stream events
///
/// Yields a `Delta` per non-empty content chunk and a `Final` with the
/// accumulated reply on `[DONE]`. A body that ends before `[DONE]` simply
/// ends; callers treat that as an incomplete reply.
pub fn parse_chat_sse_stream<S, B, E>(body: S) -> ChatStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut chunks = Box::pin(body);
        let mut buffer = LineBuffer::with_capacity(4096);
        let mut reply = String::new();

        'read: while let Some(chunk_result) = chunks.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    break 'read;
                }
            };
            buffer.extend(bytes.as_ref());

            while let Some(line_result) = buffer.next_line() {
                let line = match line_result {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        break 'read;
                    }
                };

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim_start();

                if data == "[DONE]" {
                    yield Ok(StreamEvent::Final { content: std::mem::take(&mut reply) });
                    break 'read;
                }

                match serde_json::from_str::<ChatStreamChunk>(data) {
                    Ok(chunk) => {
                        if let Some(error) = chunk.error {
                            yield Ok(StreamEvent::Error { message: error.message });
                            break 'read;
                        }
                        if let Some(content) = chunk.content() {
                            if !content.is_empty() {
                                reply.push_str(content);
                                yield Ok(StreamEvent::Delta { content: content.to_string() });
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::anyhow!("Failed to parse chat chunk: {}", e));
                        break 'read;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_basic() {
        let mut buffer = LineBuffer::with_capacity(64);
        buffer.extend(b"line1\nline2\r\n");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.len(), 7);

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "partial line");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut buffer = LineBuffer::with_capacity(64);
        let text = "olá\n".as_bytes();

        buffer.extend(&text[..3]);
        assert!(buffer.next_line().is_none());
        buffer.extend(&text[3..]);
        assert_eq!(buffer.next_line().unwrap().unwrap(), "olá");
    }
}

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use colloquy_llm::{ChatClient, ChatRequest, ChatStream, StreamEvent};
use colloquy_persist::{
    Conversation, ConversationUpdate, MemoryPersistenceClient, Message, NewConversation,
    NewMessage, PersistError, PersistenceClient,
};
use colloquy_session::{ChatSession, LLMConfig};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateConversation,
    UpdateConversation,
    DeleteConversation,
    ListConversations,
    SaveMessage,
    GetMessages,
    DeleteMessages,
}

struct HoldSlot {
    skip: usize,
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// A store call parked by `FlakyStore::hold`
pub struct Hold {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl Hold {
    /// Resolves once the held call has started
    pub async fn reached(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), &mut self.reached)
            .await
            .expect("held call never started")
            .expect("store dropped the hold");
    }

    /// Let the held call go through to the store
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// In-memory store whose operations can be made to fail or wait on demand
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryPersistenceClient,
    failing: Mutex<HashSet<Op>>,
    holds: Mutex<HashMap<Op, HoldSlot>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Park the call to `op` that comes after `skip` others until the
    /// returned hold is released
    pub fn hold(&self, op: Op, skip: usize) -> Hold {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.holds.lock().unwrap().insert(
            op,
            HoldSlot {
                skip,
                reached: reached_tx,
                release: release_rx,
            },
        );
        Hold {
            reached: reached_rx,
            release: release_tx,
        }
    }

    pub async fn stored_conversation(&self, conversation_id: &str) -> Conversation {
        self.inner
            .list_conversations(USER)
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.id == conversation_id)
            .expect("conversation not stored")
    }

    async fn gate(&self, op: Op) {
        let slot = {
            let mut holds = self.holds.lock().unwrap();
            let ready = match holds.get_mut(&op) {
                Some(slot) if slot.skip == 0 => true,
                Some(slot) => {
                    slot.skip -= 1;
                    false
                }
                None => false,
            };
            if ready {
                holds.remove(&op)
            } else {
                None
            }
        };

        if let Some(slot) = slot {
            let _ = slot.reached.send(());
            let _ = slot.release.await;
        }
    }

    fn check(&self, op: Op) -> colloquy_persist::Result<()> {
        if self.failing.lock().unwrap().contains(&op) {
            Err(PersistError::Connection(format!("{op:?} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceClient for FlakyStore {
    async fn create_conversation(&self, conversation: NewConversation) -> colloquy_persist::Result<Conversation> {
        self.gate(Op::CreateConversation).await;
        self.check(Op::CreateConversation)?;
        self.inner.create_conversation(conversation).await
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: ConversationUpdate,
    ) -> colloquy_persist::Result<()> {
        self.gate(Op::UpdateConversation).await;
        self.check(Op::UpdateConversation)?;
        self.inner.update_conversation(conversation_id, update).await
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> colloquy_persist::Result<()> {
        self.gate(Op::DeleteConversation).await;
        self.check(Op::DeleteConversation)?;
        self.inner.delete_conversation(conversation_id, user_id).await
    }

    async fn list_conversations(&self, user_id: &str) -> colloquy_persist::Result<Vec<Conversation>> {
        self.gate(Op::ListConversations).await;
        self.check(Op::ListConversations)?;
        self.inner.list_conversations(user_id).await
    }

    async fn save_message(&self, message: NewMessage) -> colloquy_persist::Result<Message> {
        self.gate(Op::SaveMessage).await;
        self.check(Op::SaveMessage)?;
        self.inner.save_message(message).await
    }

    async fn get_messages(&self, conversation_id: &str) -> colloquy_persist::Result<Vec<Message>> {
        self.gate(Op::GetMessages).await;
        self.check(Op::GetMessages)?;
        self.inner.get_messages(conversation_id).await
    }

    async fn delete_messages(&self, conversation_id: &str) -> colloquy_persist::Result<u64> {
        self.gate(Op::DeleteMessages).await;
        self.check(Op::DeleteMessages)?;
        self.inner.delete_messages(conversation_id).await
    }
}

enum Script {
    Stream(mpsc::UnboundedReceiver<Result<StreamEvent>>),
    OpenFailure(String),
}

/// Chat client that plays back queued replies, one per request
#[derive(Default)]
pub struct ScriptedChatClient {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply fed by hand through the returned sender. Dropping
    /// the sender ends the stream.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Result<StreamEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Stream(rx));
        tx
    }

    /// Queue a complete reply: one delta per chunk, then the final text
    pub fn push_reply(&self, chunks: &[&str]) {
        let tx = self.push_stream();
        for chunk in chunks {
            tx.send(Ok(StreamEvent::Delta { content: chunk.to_string() })).unwrap();
        }
        tx.send(Ok(StreamEvent::Final { content: chunks.concat() })).unwrap();
    }

    pub fn push_events(&self, events: Vec<Result<StreamEvent>>) {
        let tx = self.push_stream();
        for event in events {
            tx.send(event).unwrap();
        }
    }

    pub fn push_open_failure(&self, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::OpenFailure(message.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Resolves once `n` streams have been opened
    pub async fn wait_for_requests(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stream was never opened");
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        self.requests.lock().unwrap().push(request);
        match self.scripts.lock().unwrap().pop_front() {
            Some(Script::Stream(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(Script::OpenFailure(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted reply")),
        }
    }
}

pub const USER: &str = "user-1";

pub fn session_with(store: Arc<FlakyStore>, client: Arc<ScriptedChatClient>) -> ChatSession {
    session_with_config(store, client, LLMConfig::default())
}

pub fn session_with_config(
    store: Arc<FlakyStore>,
    client: Arc<ScriptedChatClient>,
    config: LLMConfig,
) -> ChatSession {
    ChatSession::builder()
        .user_id(USER)
        .store(store)
        .chat_client(client)
        .llm_config(config)
        .build()
        .unwrap()
}

use async_trait::async_trait;
use mongodb::{bson::oid::ObjectId, Client};

use crate::dbs::mongo::repositories::{MongoConversationRepository, MongoMessageRepository};
use crate::error::{PersistError, Result};
use crate::models::{Conversation, ConversationUpdate, Message, NewConversation, NewMessage};
use crate::trait_client::PersistenceClient;

pub struct MongoPersistenceClient {
    conversation_repo: MongoConversationRepository,
    message_repo: MongoMessageRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        tracing::info!(database, "connected to MongoDB");

        Ok(Self {
            conversation_repo: MongoConversationRepository::new(&client, database),
            message_repo: MongoMessageRepository::new(&client, database),
        })
    }
}

fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| PersistError::InvalidObjectId(e.to_string()))
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    async fn create_conversation(&self, conversation: NewConversation) -> Result<Conversation> {
        let record = self.conversation_repo.create_conversation(conversation).await?;
        Ok(record.into())
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: ConversationUpdate,
    ) -> Result<()> {
        self.conversation_repo
            .update_conversation(parse_id(conversation_id)?, update)
            .await
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.conversation_repo
            .delete_conversation(parse_id(conversation_id)?, user_id)
            .await
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let records = self.conversation_repo.list_conversations(user_id).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn save_message(&self, message: NewMessage) -> Result<Message> {
        let conversation_id = parse_id(&message.conversation_id)?;
        let record = self.message_repo.save_message(conversation_id, message).await?;
        Ok(record.into())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let records = self.message_repo.get_messages(parse_id(conversation_id)?).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn delete_messages(&self, conversation_id: &str) -> Result<u64> {
        self.message_repo.delete_messages(parse_id(conversation_id)?).await
    }
}

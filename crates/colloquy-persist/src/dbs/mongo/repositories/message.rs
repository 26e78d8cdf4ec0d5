use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, bson::oid::ObjectId, Client, Collection};

use crate::dbs::mongo::models::MongoMessage;
use crate::error::Result;
use crate::models::NewMessage;

#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MongoMessage>,
}

impl MongoMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    pub async fn save_message(&self, conversation_id: ObjectId, message: NewMessage) -> Result<MongoMessage> {
        let record = MongoMessage {
            id: ObjectId::new(),
            conversation_id,
            role: message.role,
            content: message.content,
            created_at: Utc::now(),
        };

        self.collection.insert_one(&record).await?;
        Ok(record)
    }

    /// Messages of a conversation in creation order; the id breaks
    /// millisecond ties since ObjectIds grow monotonically per process
    pub async fn get_messages(&self, conversation_id: ObjectId) -> Result<Vec<MongoMessage>> {
        let filter = doc! { "conversation_id": conversation_id };
        let messages = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    pub async fn delete_messages(&self, conversation_id: ObjectId) -> Result<u64> {
        let filter = doc! { "conversation_id": conversation_id };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}

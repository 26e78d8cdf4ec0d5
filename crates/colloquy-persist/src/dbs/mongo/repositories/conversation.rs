use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson, bson::doc, bson::oid::ObjectId, Client, Collection};

use crate::dbs::mongo::models::MongoConversation;
use crate::error::{PersistError, Result};
use crate::models::{ConversationUpdate, NewConversation};

#[derive(Clone)]
pub struct MongoConversationRepository {
    collection: Collection<MongoConversation>,
}

impl MongoConversationRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("conversations");
        Self { collection }
    }

    pub async fn create_conversation(&self, conversation: NewConversation) -> Result<MongoConversation> {
        let now = Utc::now();
        let record = MongoConversation {
            id: ObjectId::new(),
            user_id: conversation.user_id,
            title: conversation.title,
            last_message: conversation.last_message,
            created_at: now,
            updated_at: now,
        };

        self.collection.insert_one(&record).await?;
        Ok(record)
    }

    pub async fn update_conversation(
        &self,
        conversation_id: ObjectId,
        update: ConversationUpdate,
    ) -> Result<()> {
        let filter = doc! { "_id": conversation_id };
        let change = doc! {
            "$set": {
                "last_message": update.last_message,
                "updated_at": bson::DateTime::from_chrono(update.updated_at),
            }
        };

        let result = self.collection.update_one(filter, change).await?;
        if result.matched_count == 0 {
            return Err(PersistError::ConversationNotFound(conversation_id.to_hex()));
        }
        Ok(())
    }

    /// List conversations for a user, most recently updated first
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<MongoConversation>> {
        let filter = doc! { "user_id": user_id };
        let conversations = self
            .collection
            .find(filter)
            .sort(doc! { "updated_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(conversations)
    }

    pub async fn delete_conversation(&self, conversation_id: ObjectId, user_id: &str) -> Result<()> {
        let filter = doc! { "_id": conversation_id, "user_id": user_id };
        self.collection.delete_one(filter).await?;
        Ok(())
    }
}

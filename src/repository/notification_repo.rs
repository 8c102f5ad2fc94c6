use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::notification::Notification;
use crate::repository::counter::Counters;

const COLLECTION: &str = "notifications";

#[derive(Debug, Serialize, Deserialize)]
struct NotificationDocument {
    #[serde(rename = "_id")]
    id: i64,
    user_id: String,
    title: String,
    message: String,
    #[serde(default)]
    is_read: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<NotificationDocument> for Notification {
    fn from(d: NotificationDocument) -> Self {
        Notification {
            id: d.id,
            user_id: d.user_id,
            title: d.title,
            message: d.message,
            is_read: d.is_read,
            created_at: d.created_at,
        }
    }
}

#[derive(Clone)]
pub struct NotificationRepository {
    collection: Collection<NotificationDocument>,
    counters: Counters,
}

impl NotificationRepository {
    pub fn new(db: &Database) -> Self {
        NotificationRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    pub async fn create(&self, draft: Notification) -> AppResult<Notification> {
        let saved = Notification {
            id: self.counters.next(COLLECTION).await?,
            ..draft
        };
        let document = NotificationDocument {
            id: saved.id,
            user_id: saved.user_id.clone(),
            title: saved.title.clone(),
            message: saved.message.clone(),
            is_read: saved.is_read,
            created_at: saved.created_at,
        };
        self.collection.insert_one(document, None).await?;
        Ok(saved)
    }

    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1, "_id": -1 }).build();
        let mut cursor = self.collection.find(doc! { "user_id": user_id }, options).await?;

        let mut list = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            list.push(d.into());
        }
        Ok(list)
    }

    /// Returns false when no notification has this id.
    pub async fn mark_read(&self, id: i64) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "is_read": true } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

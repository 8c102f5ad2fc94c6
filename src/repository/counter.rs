use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection, Database,
};

use crate::error::{AppError, AppResult};

/// Numeric id allocator backed by a `counters` collection (`{ _id: <name>, seq: <last id> }`).
#[derive(Clone)]
pub struct Counters {
    collection: Collection<Document>,
}

impl Counters {
    pub fn new(db: &Database) -> Self {
        Counters {
            collection: db.collection("counters"),
        }
    }

    /// Reserves `n` consecutive ids for `name` and returns the first one.
    pub async fn reserve(&self, name: &str, n: i64) -> AppResult<i64> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": n } }, options)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Counter update failed".to_string(),
                detail: format!("no counter document returned for {}", name),
            })?;

        let last = updated.get_i64("seq").or_else(|_| updated.get_i32("seq").map(i64::from));
        match last {
            Ok(last) => Ok(last - n + 1),
            Err(e) => Err(AppError::Internal {
                message: "Counter update failed".to_string(),
                detail: e.to_string(),
            }),
        }
    }

    pub async fn next(&self, name: &str) -> AppResult<i64> {
        self.reserve(name, 1).await
    }
}

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::certification::{Certification, CertificationStatus};
use crate::repository::counter::Counters;

const COLLECTION: &str = "certifications";

#[derive(Debug, Serialize, Deserialize)]
struct CertificationDocument {
    #[serde(rename = "_id")]
    id: i64,
    user_id: String,
    name: String,
    description: String,
    credential_body: String,
    benefits: String,
    cost: f64,
    status: CertificationStatus,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    submission_date: DateTime<Utc>,
    supporting_documents: bson::Bson,
}

impl From<CertificationDocument> for Certification {
    fn from(d: CertificationDocument) -> Self {
        Certification {
            id: d.id,
            user_id: d.user_id,
            name: d.name,
            description: d.description,
            credential_body: d.credential_body,
            benefits: d.benefits,
            cost: d.cost,
            status: d.status,
            submission_date: d.submission_date,
            supporting_documents: d.supporting_documents.into_relaxed_extjson(),
        }
    }
}

#[derive(Clone)]
pub struct CertificationRepository {
    collection: Collection<CertificationDocument>,
    counters: Counters,
}

impl CertificationRepository {
    pub fn new(db: &Database) -> Self {
        CertificationRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    pub async fn create(&self, draft: Certification) -> AppResult<Certification> {
        let saved = Certification {
            id: self.counters.next(COLLECTION).await?,
            ..draft
        };
        let supporting_documents = bson::to_bson(&saved.supporting_documents).map_err(|e| {
            AppError::Internal {
                message: "Gagal mengajukan sertifikasi".to_string(),
                detail: e.to_string(),
            }
        })?;
        let document = CertificationDocument {
            id: saved.id,
            user_id: saved.user_id.clone(),
            name: saved.name.clone(),
            description: saved.description.clone(),
            credential_body: saved.credential_body.clone(),
            benefits: saved.benefits.clone(),
            cost: saved.cost,
            status: saved.status,
            submission_date: saved.submission_date,
            supporting_documents,
        };
        self.collection.insert_one(document, None).await?;
        Ok(saved)
    }

    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Certification>> {
        let options = FindOptions::builder()
            .sort(doc! { "submission_date": -1, "_id": -1 })
            .build();
        let mut cursor = self.collection.find(doc! { "user_id": user_id }, options).await?;

        let mut list = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            list.push(d.into());
        }
        Ok(list)
    }

    pub async fn find_for_user(&self, id: i64, user_id: &str) -> AppResult<Option<Certification>> {
        let filter = doc! { "_id": id, "user_id": user_id };
        Ok(self.collection.find_one(filter, None).await?.map(Into::into))
    }

    /// Returns false when no certification has this id.
    pub async fn update_status(&self, id: i64, status: CertificationStatus) -> AppResult<bool> {
        let status = bson::to_bson(&status).map_err(|e| AppError::Internal {
            message: "Gagal memperbarui status".to_string(),
            detail: e.to_string(),
        })?;
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "status": status } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }
}

use chrono::{DateTime, Utc};
use mongodb::{bson, Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::workshop::WorkshopRegistration;
use crate::repository::counter::Counters;

const COLLECTION: &str = "workshop_registrations";

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationDocument {
    #[serde(rename = "_id")]
    id: i64,
    workshop_id: i64,
    company_name: String,
    email: String,
    file_path: Option<String>,
    status: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WorkshopRepository {
    collection: Collection<RegistrationDocument>,
    counters: Counters,
}

impl WorkshopRepository {
    pub fn new(db: &Database) -> Self {
        WorkshopRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    pub async fn create(&self, draft: WorkshopRegistration) -> AppResult<WorkshopRegistration> {
        let saved = WorkshopRegistration {
            id: self.counters.next(COLLECTION).await?,
            ..draft
        };
        let document = RegistrationDocument {
            id: saved.id,
            workshop_id: saved.workshop_id,
            company_name: saved.company_name.clone(),
            email: saved.email.clone(),
            file_path: saved.file_path.clone(),
            status: saved.status.clone(),
            created_at: saved.created_at,
        };
        self.collection.insert_one(document, None).await?;
        Ok(saved)
    }
}

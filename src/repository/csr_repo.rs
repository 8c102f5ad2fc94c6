use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::csr::{CsrStatus, CsrSubmission};
use crate::repository::counter::Counters;

const COLLECTION: &str = "csr_submissions";

#[derive(Debug, Serialize, Deserialize)]
struct CsrDocument {
    #[serde(rename = "_id")]
    id: i64,
    user_id: String,
    program_name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    location: Option<String>,
    partner_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    budget: f64,
    proposal_url: Option<String>,
    legality_url: Option<String>,
    agreed: bool,
    #[serde(default)]
    status: CsrStatus,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&CsrSubmission> for CsrDocument {
    fn from(s: &CsrSubmission) -> Self {
        CsrDocument {
            id: s.id,
            user_id: s.user_id.clone(),
            program_name: s.program_name.clone(),
            category: s.category.clone(),
            description: s.description.clone(),
            location: s.location.clone(),
            partner_name: s.partner_name.clone(),
            start_date: s.start_date.clone(),
            end_date: s.end_date.clone(),
            budget: s.budget,
            proposal_url: s.proposal_url.clone(),
            legality_url: s.legality_url.clone(),
            agreed: s.agreed,
            status: s.status,
            created_at: s.created_at,
        }
    }
}

impl From<CsrDocument> for CsrSubmission {
    fn from(d: CsrDocument) -> Self {
        CsrSubmission {
            id: d.id,
            user_id: d.user_id,
            program_name: d.program_name,
            category: d.category,
            description: d.description,
            location: d.location,
            partner_name: d.partner_name,
            start_date: d.start_date,
            end_date: d.end_date,
            budget: d.budget,
            proposal_url: d.proposal_url,
            legality_url: d.legality_url,
            agreed: d.agreed,
            status: d.status,
            created_at: d.created_at,
        }
    }
}

#[derive(Clone)]
pub struct CsrRepository {
    collection: Collection<CsrDocument>,
    counters: Counters,
}

impl CsrRepository {
    pub fn new(db: &Database) -> Self {
        CsrRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    /// Stores `draft` under a freshly allocated id.
    pub async fn create(&self, draft: CsrSubmission) -> AppResult<CsrSubmission> {
        let saved = CsrSubmission {
            id: self.counters.next(COLLECTION).await?,
            ..draft
        };
        self.collection.insert_one(CsrDocument::from(&saved), None).await?;
        Ok(saved)
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<CsrSubmission>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?.map(Into::into))
    }

    /// Every submission, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<CsrSubmission>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1, "_id": -1 }).build();
        let mut cursor = self.collection.find(doc! {}, options).await?;

        let mut list = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            list.push(d.into());
        }
        Ok(list)
    }
}

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::company::Company;
use crate::repository::counter::Counters;

const COLLECTION: &str = "companies";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
struct CompanyDocument {
    #[serde(rename = "_id")]
    id: i64,
    company_name: String,
    email: String,
    password: String,
    phone_number: String,
    nib: String,
    address: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<CompanyDocument> for Company {
    fn from(d: CompanyDocument) -> Self {
        Company {
            id: d.id,
            company_name: d.company_name,
            email: d.email,
            password_hash: d.password,
            phone_number: d.phone_number,
            nib: d.nib,
            address: d.address,
            created_at: d.created_at,
        }
    }
}

#[derive(Clone)]
pub struct CompanyRepository {
    collection: Collection<CompanyDocument>,
    counters: Counters,
}

impl CompanyRepository {
    pub fn new(db: &Database) -> Self {
        CompanyRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    /// Unique indexes back the duplicate email / NIB checks against concurrent registrations.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        let indexes = vec![
            IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(),
            IndexModel::builder().keys(doc! { "nib": 1 }).options(unique()).build(),
        ];
        self.collection.create_indexes(indexes, None).await?;
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Company>> {
        Ok(self.collection.find_one(doc! { "email": email }, None).await?.map(Into::into))
    }

    pub async fn find_by_nib(&self, nib: &str) -> AppResult<Option<Company>> {
        Ok(self.collection.find_one(doc! { "nib": nib }, None).await?.map(Into::into))
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Company>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?.map(Into::into))
    }

    /// Stores `draft` under a freshly allocated id; `draft.id` is ignored.
    pub async fn create(&self, draft: Company) -> AppResult<Company> {
        let company = Company {
            id: self.counters.next(COLLECTION).await?,
            ..draft
        };
        let document = CompanyDocument {
            id: company.id,
            company_name: company.company_name.clone(),
            email: company.email.clone(),
            password: company.password_hash.clone(),
            phone_number: company.phone_number.clone(),
            nib: company.nib.clone(),
            address: company.address.clone(),
            created_at: company.created_at,
        };
        self.collection
            .insert_one(document, None)
            .await
            .map_err(duplicate_as_conflict)?;
        Ok(company)
    }

    pub async fn update_profile(
        &self,
        id: i64,
        company_name: &str,
        email: &str,
        phone_number: &str,
        address: &str,
    ) -> AppResult<bool> {
        let update = doc! {
            "$set": {
                "company_name": company_name,
                "email": email,
                "phone_number": phone_number,
                "address": address,
            }
        };
        let result = self
            .collection
            .update_one(doc! { "_id": id }, update, None)
            .await
            .map_err(duplicate_as_conflict)?;
        Ok(result.matched_count > 0)
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "password": password_hash } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }
}

fn duplicate_as_conflict(e: mongodb::error::Error) -> AppError {
    if let ErrorKind::Write(WriteFailure::WriteError(w)) = e.kind.as_ref() {
        if w.code == DUPLICATE_KEY {
            let field = if w.message.contains("nib") { "NIB" } else { "email" };
            return AppError::Conflict { field };
        }
    }
    e.into()
}

use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::carbon::{CarbonSubmission, RawSubmission, SubmissionFilter, SubmissionPatch};
use crate::repository::carbon_repo::CarbonStore;
use crate::services::aggregation::{PageRequest, Pagination};
use crate::services::ingest::{self, IngestSummary};
use crate::services::uploads::UploadStore;
use crate::services::validator::{DocumentDefaults, Normalizer};

pub const NOT_FOUND: &str = "Submission not found";
pub const COMPANY_REQUIRED: &str = "company_id is required";
pub const UPLOAD_CATEGORY: &str = "carbon";

/// Carbon submission use cases. Cheap to clone; every handler gets its own copy.
#[derive(Clone)]
pub struct CarbonService {
    pub(crate) store: Arc<dyn CarbonStore>,
    uploads: UploadStore,
    pub(crate) recent_limit: i64,
}

impl CarbonService {
    pub fn new(store: Arc<dyn CarbonStore>, uploads: UploadStore, recent_limit: i64) -> Self {
        CarbonService { store, uploads, recent_limit }
    }

    /// Stores the uploaded CSV and bulk-inserts every decodable row. The stored file is
    /// removed again when nothing gets saved.
    pub async fn ingest_csv(&self, file_name: &str, bytes: &[u8]) -> AppResult<IngestSummary> {
        let stored = self.uploads.save(UPLOAD_CATEGORY, "csvFile", file_name, bytes).await?;

        let result = self
            .ingest_stored(file_name, bytes, &stored.original_name, stored.path_string())
            .await;
        if result.is_err() {
            self.uploads.remove_if_inside(&stored.path_string()).await;
        }
        result
    }

    async fn ingest_stored(
        &self,
        file_name: &str,
        bytes: &[u8],
        document_name: &str,
        document_path: String,
    ) -> AppResult<IngestSummary> {
        let batch = ingest::parse_csv_blocking(
            bytes.to_vec(),
            Normalizer::now(),
            document_name.to_string(),
            document_path,
        )
        .await?;

        let saved = self.store.insert_many(batch.records.clone()).await?;
        tracing::info!(
            file = file_name,
            rows = saved.len(),
            skipped = batch.skipped,
            "CSV ingested"
        );
        Ok(IngestSummary::new(&batch, saved.len(), file_name))
    }

    /// `caller` supplies the company when the body has none.
    pub async fn create(&self, raw: RawSubmission, caller: Option<i64>) -> AppResult<CarbonSubmission> {
        let mut record = Normalizer::now().normalize(&raw, DocumentDefaults::default());
        if record.company_id.is_none() {
            record.company_id = caller.map(|id| id.to_string());
        }
        if record.company_id.is_none() {
            return Err(AppError::validation(COMPANY_REQUIRED));
        }
        let saved = self.store.insert(record).await?;
        tracing::info!(id = saved.id, company_id = ?saved.company_id, "submission created");
        Ok(saved)
    }

    pub async fn get(&self, id: i64) -> AppResult<CarbonSubmission> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    pub async fn list(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> AppResult<(Vec<CarbonSubmission>, Pagination)> {
        let (rows, total) = self.store.find_page(filter, page.skip(), page.limit).await?;
        Ok((rows, Pagination::new(page, total)))
    }

    pub async fn update(&self, id: i64, patch: &SubmissionPatch) -> AppResult<CarbonSubmission> {
        let mut record = self.get(id).await?;
        Normalizer::now().apply_patch(&mut record, patch);
        if !self.store.replace(&record).await? {
            // Deleted between the read and the write.
            return Err(AppError::not_found(NOT_FOUND));
        }
        tracing::info!(id, "submission updated");
        Ok(record)
    }

    /// Removes the record, then its uploaded file when that file lives under the upload root.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let record = self.get(id).await?;
        if !self.store.delete(id).await? {
            return Err(AppError::not_found(NOT_FOUND));
        }
        if let Some(path) = record.document_path.as_deref() {
            self.uploads.remove_if_inside(path).await;
        }
        tracing::info!(id, "submission deleted");
        Ok(())
    }
}

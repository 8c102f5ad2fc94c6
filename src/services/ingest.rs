use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::carbon::{NewCarbonSubmission, RawSubmission};
use crate::services::validator::{DocumentDefaults, Normalizer};

pub const NO_VALID_DATA: &str = "No valid data found in CSV file";

/// Rows that survived decoding, in file order.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<NewCarbonSubmission>,
    pub skipped: usize,
}

impl ParsedBatch {
    pub fn total_value(&self) -> f64 {
        self.records.iter().map(|r| r.carbon_value).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub total_records: usize,
    pub total_carbon_value: f64,
    pub average_carbon_value: f64,
    pub file_name: String,
    pub processed_at: DateTime<Utc>,
    pub skipped_rows: usize,
}

impl IngestSummary {
    pub fn new(batch: &ParsedBatch, persisted: usize, file_name: &str) -> Self {
        let total = batch.total_value();
        let average = if batch.records.is_empty() {
            0.0
        } else {
            total / batch.records.len() as f64
        };
        IngestSummary {
            total_records: persisted,
            total_carbon_value: total,
            average_carbon_value: average,
            file_name: file_name.to_string(),
            processed_at: Utc::now(),
            skipped_rows: batch.skipped,
        }
    }
}

/// Parses a headered CSV. Rows the reader cannot decode are counted and skipped; every
/// decodable row yields a record. An empty result is a validation error.
pub fn parse_csv(
    bytes: &[u8],
    normalizer: &Normalizer,
    defaults: DocumentDefaults<'_>,
) -> AppResult<ParsedBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    let mut batch = ParsedBatch::default();
    for (index, row) in rdr.records().enumerate() {
        match row {
            Ok(record) => {
                // Short rows simply lack the trailing columns.
                let columns: HashMap<String, String> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect();
                let raw = RawSubmission::from_columns(columns);
                batch.records.push(normalizer.normalize(&raw, defaults));
            }
            Err(e) => {
                batch.skipped += 1;
                tracing::warn!(row = index + 1, error = %e, "skipping undecodable CSV row");
            }
        }
    }

    if batch.records.is_empty() {
        return Err(AppError::validation(NO_VALID_DATA));
    }
    Ok(batch)
}

/// Runs [`parse_csv`] on the blocking pool.
pub async fn parse_csv_blocking(
    bytes: Vec<u8>,
    normalizer: Normalizer,
    document_name: String,
    document_path: String,
) -> AppResult<ParsedBatch> {
    tokio::task::spawn_blocking(move || {
        let defaults = DocumentDefaults {
            name: Some(&document_name),
            path: Some(&document_path),
        };
        parse_csv(&bytes, &normalizer, defaults)
    })
    .await?
}

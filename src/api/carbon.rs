use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::Caller;
use crate::api::uploads::read_form;
use crate::api::Envelope;
use crate::error::{AppError, AppResult};
use crate::models::carbon::{CarbonSubmission, RawSubmission, SubmissionFilter, SubmissionPatch};
use crate::services::aggregation::PageRequest;
use crate::services::dashboard::{Analytics, Dashboard, KpiReport};
use crate::services::ingest::IngestSummary;
use crate::services::submissions::CarbonService;
use crate::services::tokens::JwtKeys;
use crate::services::validator::{clean_text, parse_int, valid_year};

pub const CSV_FIELD: &str = "csvFile";

/// Routes mounted under `/carbon-submissions`.
pub fn router<S>(max_csv_bytes: usize) -> Router<S>
where
    CarbonService: FromRef<S>,
    JwtKeys: FromRef<S>,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/upload-csv",
            post(upload_csv).layer(DefaultBodyLimit::max(max_csv_bytes)),
        )
        .route("/submissions", post(create_submission).get(list_submissions))
        .route(
            "/submissions/:id",
            get(get_submission).put(update_submission).delete(delete_submission),
        )
        .route("/analytics", get(analytics))
        .route("/dashboard", get(dashboard))
        .route("/kpi/:kpi_type", get(kpi))
}

/// Query values arrive as text; numbers that do not parse are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub company_id: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> SubmissionFilter {
        SubmissionFilter {
            year: valid_year(self.year.as_deref()),
            month: parse_int(self.month.as_deref()),
            company_id: clean_text(self.company_id.as_deref()),
        }
    }

    fn page(&self) -> PageRequest {
        PageRequest::new(
            parse_int(self.page.as_deref()).map(i64::from),
            parse_int(self.limit.as_deref()).map(i64::from),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<String>,
    pub company_id: Option<String>,
}

impl YearQuery {
    fn year(&self) -> Option<i32> {
        valid_year(self.year.as_deref())
    }

    fn company(&self) -> Option<String> {
        clean_text(self.company_id.as_deref())
    }
}

fn is_csv(content_type: Option<&str>, ext: Option<&str>) -> bool {
    content_type == Some("text/csv") || ext == Some("csv")
}

pub async fn upload_csv(
    State(svc): State<CarbonService>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Envelope<IngestSummary>>)> {
    let mut form = read_form(multipart).await?;
    let file = form
        .take_file(CSV_FIELD)
        .ok_or_else(|| AppError::validation("No CSV file uploaded"))?;
    if !is_csv(file.content_type.as_deref(), file.extension().as_deref()) {
        return Err(AppError::validation("Only CSV files are allowed"));
    }

    let summary = svc
        .ingest_csv(&file.file_name, &file.bytes)
        .await
        .map_err(|e| e.during("Error processing CSV file"))?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("CSV file processed successfully", summary)),
    ))
}

pub async fn create_submission(
    State(svc): State<CarbonService>,
    Caller(caller): Caller,
    Json(raw): Json<RawSubmission>,
) -> AppResult<(StatusCode, Json<Envelope<CarbonSubmission>>)> {
    let saved = svc
        .create(raw, caller)
        .await
        .map_err(|e| e.during("Error creating submission"))?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("Submission created successfully", saved)),
    ))
}

pub async fn get_submission(
    State(svc): State<CarbonService>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<CarbonSubmission>>> {
    let record = svc.get(id).await.map_err(|e| e.during("Error fetching submission"))?;
    Ok(Json(Envelope::data(record)))
}

pub async fn list_submissions(
    State(svc): State<CarbonService>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Envelope<Vec<CarbonSubmission>>>> {
    let (rows, pagination) = svc
        .list(&query.filter(), query.page())
        .await
        .map_err(|e| e.during("Error fetching submissions"))?;
    Ok(Json(Envelope::data(rows).with_pagination(pagination)))
}

pub async fn update_submission(
    State(svc): State<CarbonService>,
    Path(id): Path<i64>,
    Json(patch): Json<SubmissionPatch>,
) -> AppResult<Json<Envelope<CarbonSubmission>>> {
    let record = svc
        .update(id, &patch)
        .await
        .map_err(|e| e.during("Error updating submission"))?;
    Ok(Json(Envelope::message("Submission updated successfully", record)))
}

pub async fn delete_submission(
    State(svc): State<CarbonService>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<()>>> {
    svc.delete(id).await.map_err(|e| e.during("Error deleting submission"))?;
    Ok(Json(Envelope::message("Submission deleted successfully", ())))
}

pub async fn analytics(
    State(svc): State<CarbonService>,
    Query(query): Query<YearQuery>,
) -> AppResult<Json<Envelope<Analytics>>> {
    let company = query.company();
    let view = svc
        .analytics(query.year(), company.as_deref())
        .await
        .map_err(|e| e.during("Error fetching analytics"))?;
    Ok(Json(Envelope::data(view)))
}

pub async fn dashboard(
    State(svc): State<CarbonService>,
    Query(query): Query<YearQuery>,
) -> AppResult<Json<Envelope<Dashboard>>> {
    let company = query.company();
    let view = svc
        .dashboard(query.year(), company.as_deref())
        .await
        .map_err(|e| e.during("Error fetching dashboard data"))?;
    Ok(Json(Envelope::data(view)))
}

pub async fn kpi(
    State(svc): State<CarbonService>,
    Path(kpi_type): Path<String>,
    Query(query): Query<YearQuery>,
) -> AppResult<Json<Envelope<KpiReport>>> {
    let company = query.company();
    let report = svc
        .kpi(&kpi_type, query.year(), company.as_deref())
        .await
        .map_err(|e| e.during("Error fetching KPI data"))?;
    Ok(Json(Envelope::data(report)))
}

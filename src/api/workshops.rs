use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::uploads::{read_form, FilePart, FormData};
use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::workshop::{WorkshopRegistration, STATUS_PENDING};
use crate::services::validator::parse_int;

const UPLOAD_CATEGORY: &str = "workshop";
const EMPLOYEE_LIST_FIELD: &str = "daftar_karyawan";
const EMPLOYEE_LIST_TYPES: [&str; 3] = ["xls", "xlsx", "csv"];

/// Validates the form and pulls out the optional employee list.
pub fn draft_from_form(form: &mut FormData) -> AppResult<(WorkshopRegistration, Option<FilePart>)> {
    let file = form.take_file(EMPLOYEE_LIST_FIELD);
    if let Some(f) = &file {
        let allowed = f
            .extension()
            .map_or(false, |ext| EMPLOYEE_LIST_TYPES.contains(&ext.as_str()));
        if !allowed {
            return Err(AppError::validation("Hanya file Excel atau CSV yang diperbolehkan"));
        }
    }

    let workshop_id = parse_int(form.text("workshop_id").as_deref());
    match (workshop_id, form.text("company_name"), form.text("email")) {
        (Some(workshop_id), Some(company_name), Some(email)) => Ok((
            WorkshopRegistration {
                id: 0,
                workshop_id: i64::from(workshop_id),
                company_name,
                email,
                file_path: None,
                status: STATUS_PENDING.to_string(),
                created_at: Utc::now(),
            },
            file,
        )),
        _ => Err(AppError::validation(
            "Data tidak lengkap. workshop_id, company_name, dan email diperlukan.",
        )),
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Envelope<WorkshopRegistration>>)> {
    let mut form = read_form(multipart).await?;
    let (mut draft, file) = draft_from_form(&mut form)?;

    if let Some(file) = file {
        let stored = state
            .uploads
            .save(UPLOAD_CATEGORY, EMPLOYEE_LIST_FIELD, &file.file_name, &file.bytes)
            .await?;
        draft.file_path = Some(stored.path_string());
    }

    let saved = state
        .workshop_repo
        .create(draft)
        .await
        .map_err(|e| e.during("Gagal menyimpan pendaftaran workshop"))?;
    tracing::info!(id = saved.id, workshop_id = saved.workshop_id, "workshop registration stored");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("Pendaftaran Workshop Berhasil", saved)),
    ))
}

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::auth::Caller;
use crate::api::uploads::{read_form, FormData};
use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::csr::{CsrStatus, CsrSubmission, CsrSummary};
use crate::services::csr_summary::summarize;
use crate::services::validator::{parse_decimal, round2};

const UPLOAD_CATEGORY: &str = "csr";

/// Builds an unsaved submission from the text fields. Attachments are filled in later.
pub fn draft_from_form(form: &FormData, caller: Option<i64>) -> AppResult<CsrSubmission> {
    let user_id = form
        .text("user_id")
        .or_else(|| caller.map(|id| id.to_string()))
        .ok_or_else(|| AppError::validation("Data tidak lengkap. user_id diperlukan."))?;

    Ok(CsrSubmission {
        id: 0,
        user_id,
        program_name: form.text("program_name"),
        category: form.text("category"),
        description: form.text("description"),
        location: form.text("location"),
        partner_name: form.text("partner_name"),
        start_date: form.text("start_date"),
        end_date: form.text("end_date"),
        budget: parse_decimal(form.text("budget").as_deref())
            .map(|b| round2(b.max(0.0)))
            .unwrap_or(0.0),
        proposal_url: None,
        legality_url: None,
        agreed: form.text("agreed").as_deref() == Some("true"),
        status: CsrStatus::Pending,
        created_at: Utc::now(),
    })
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Envelope<CsrSubmission>>)> {
    let mut form = read_form(multipart).await?;
    let mut draft = draft_from_form(&form, caller)?;

    if let Some(file) = form.take_file("proposal") {
        let stored = state
            .uploads
            .save(UPLOAD_CATEGORY, "proposal", &file.file_name, &file.bytes)
            .await?;
        draft.proposal_url = Some(stored.path_string());
    }
    if let Some(file) = form.take_file("legalitas") {
        let stored = state
            .uploads
            .save(UPLOAD_CATEGORY, "legalitas", &file.file_name, &file.bytes)
            .await?;
        draft.legality_url = Some(stored.path_string());
    }

    let saved = state
        .csr_repo
        .create(draft)
        .await
        .map_err(|e| e.during("Gagal membuat pengajuan CSR"))?;
    tracing::info!(id = saved.id, user_id = %saved.user_id, "CSR submission created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("Pengajuan CSR berhasil dibuat", saved)),
    ))
}

pub async fn history(State(state): State<Arc<AppState>>) -> AppResult<Json<Envelope<Vec<CsrSubmission>>>> {
    let list = state.csr_repo.find_all().await?;
    Ok(Json(Envelope::data(list)))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<CsrSubmission>>> {
    let csr = state
        .csr_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("CSR tidak ditemukan"))?;
    Ok(Json(Envelope::data(csr)))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> AppResult<Json<Envelope<CsrSummary>>> {
    let list = state
        .csr_repo
        .find_all()
        .await
        .map_err(|e| e.during("Gagal mengambil summary CSR"))?;
    Ok(Json(Envelope::data(summarize(&list))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_user_and_parses_leniently() {
        let form = FormData::with_fields(&[
            ("user_id", "12"),
            ("program_name", "Sekolah Hijau"),
            ("budget", "-100"),
            ("agreed", "TRUE"),
        ]);
        let draft = draft_from_form(&form, None).unwrap();
        assert_eq!(draft.user_id, "12");
        assert_eq!(draft.budget, 0.0);
        assert!(!draft.agreed);
        assert_eq!(draft.status, CsrStatus::Pending);

        let form = FormData::with_fields(&[("budget", "1500000.5"), ("agreed", "true")]);
        let draft = draft_from_form(&form, Some(5)).unwrap();
        assert_eq!(draft.user_id, "5");
        assert_eq!(draft.budget, 1_500_000.5);
        assert!(draft.agreed);

        let err = draft_from_form(&FormData::default(), None).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::certification::{
    ApplyCertificationRequest, Certification, CertificationStatus, UpdateStatusRequest,
};
use crate::services::validator::{clean_text, parse_decimal};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    fn require(&self) -> AppResult<String> {
        clean_text(self.user_id.as_deref())
            .ok_or_else(|| AppError::validation("user_id diperlukan sebagai query parameter"))
    }
}

/// Every field is mandatory; a zero or unparsable cost counts as missing.
pub fn draft_from_request(req: ApplyCertificationRequest) -> AppResult<Certification> {
    let cost = parse_decimal(req.cost.as_deref()).filter(|c| *c != 0.0);
    let documents = req
        .supporting_documents
        .filter(|d| !d.is_null() && d.as_str().map_or(true, |s| !s.is_empty()));

    match (
        clean_text(req.user_id.as_deref()),
        clean_text(req.name.as_deref()),
        clean_text(req.description.as_deref()),
        clean_text(req.credential_body.as_deref()),
        clean_text(req.benefits.as_deref()),
        cost,
        documents,
    ) {
        (
            Some(user_id),
            Some(name),
            Some(description),
            Some(credential_body),
            Some(benefits),
            Some(cost),
            Some(supporting_documents),
        ) => Ok(Certification {
            id: 0,
            user_id,
            name,
            description,
            credential_body,
            benefits,
            cost,
            status: CertificationStatus::Submitted,
            submission_date: Utc::now(),
            supporting_documents,
        }),
        _ => Err(AppError::validation("Semua field harus diisi termasuk user_id")),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Envelope<Vec<Certification>>>> {
    let user_id = query.require()?;
    let list = state
        .certification_repo
        .find_by_user(&user_id)
        .await
        .map_err(|e| e.during("Gagal mengambil data sertifikasi"))?;
    Ok(Json(Envelope::data(list)))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Envelope<Certification>>> {
    let user_id = query.require()?;
    let cert = state
        .certification_repo
        .find_for_user(id, &user_id)
        .await
        .map_err(|e| e.during("Gagal mengambil detail sertifikasi"))?
        .ok_or_else(|| AppError::not_found("Sertifikasi tidak ditemukan"))?;
    Ok(Json(Envelope::data(cert)))
}

pub async fn apply(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ApplyCertificationRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Certification>>)> {
    let draft = draft_from_request(payload)?;
    let saved = state
        .certification_repo
        .create(draft)
        .await
        .map_err(|e| e.during("Gagal mengajukan sertifikasi"))?;
    tracing::info!(id = saved.id, user_id = %saved.user_id, "certification requested");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("Pengajuan sertifikasi berhasil", saved)),
    ))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Envelope<()>>> {
    let status: CertificationStatus = payload
        .status
        .as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::validation("Status tidak valid"))?;

    let found = state
        .certification_repo
        .update_status(id, status)
        .await
        .map_err(|e| e.during("Gagal memperbarui status"))?;
    if !found {
        return Err(AppError::not_found("Sertifikasi tidak ditemukan"));
    }
    Ok(Json(Envelope::message("Status sertifikasi diperbarui", ())))
}

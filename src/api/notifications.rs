use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::notification::{CreateNotificationRequest, Notification};
use crate::services::validator::clean_text;

const NOT_FOUND: &str = "Notifikasi tidak ditemukan";

pub fn draft_from_request(req: CreateNotificationRequest) -> AppResult<Notification> {
    match (
        clean_text(req.user_id.as_deref()),
        clean_text(req.title.as_deref()),
        clean_text(req.message.as_deref()),
    ) {
        (Some(user_id), Some(title), Some(message)) => Ok(Notification {
            id: 0,
            user_id,
            title,
            message,
            is_read: false,
            created_at: Utc::now(),
        }),
        _ => Err(AppError::validation("user_id, title, dan message harus diisi")),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Envelope<Vec<Notification>>>> {
    let list = state
        .notification_repo
        .find_by_user(user_id.trim())
        .await
        .map_err(|e| e.during("Terjadi kesalahan saat mengambil notifikasi"))?;
    Ok(Json(Envelope::data(list)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateNotificationRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Notification>>)> {
    let saved = state
        .notification_repo
        .create(draft_from_request(payload)?)
        .await
        .map_err(|e| e.during("Terjadi kesalahan saat membuat notifikasi"))?;
    Ok((StatusCode::CREATED, Json(Envelope::data(saved))))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<()>>> {
    if !state.notification_repo.mark_read(id).await? {
        return Err(AppError::not_found(NOT_FOUND));
    }
    Ok(Json(Envelope::message("Notifikasi berhasil ditandai telah dibaca", ())))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<()>>> {
    if !state.notification_repo.delete(id).await? {
        return Err(AppError::not_found(NOT_FOUND));
    }
    Ok(Json(Envelope::message("Notifikasi berhasil dihapus", ())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_all_fields_and_starts_unread() {
        let req: CreateNotificationRequest =
            serde_json::from_str(r#"{"user_id": 3, "title": "Halo", "message": "Laporan diterima"}"#).unwrap();
        let n = draft_from_request(req).unwrap();
        assert_eq!(n.user_id, "3");
        assert!(!n.is_read);

        let req: CreateNotificationRequest = serde_json::from_str(r#"{"user_id": 3, "title": " "}"#).unwrap();
        assert!(matches!(draft_from_request(req), Err(AppError::Validation(_))));
    }
}

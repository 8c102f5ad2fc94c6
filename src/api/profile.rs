use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::auth::{hash_password, password_matches, AuthCompany};
use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::company::{ChangePasswordRequest, UpdateProfileRequest, MIN_PASSWORD_LEN};
use crate::services::validator::clean_text;

const PROFILE_NOT_FOUND: &str = "Profil pengguna tidak ditemukan";

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthCompany(id): AuthCompany,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<Envelope<()>>> {
    let (company_name, email, phone_number, address) = match (
        clean_text(payload.company_name.as_deref()),
        clean_text(payload.email.as_deref()),
        clean_text(payload.phone_number.as_deref()),
        clean_text(payload.address.as_deref()),
    ) {
        (Some(n), Some(e), Some(p), Some(a)) => (n, e, p, a),
        _ => return Err(AppError::validation("Semua field harus diisi")),
    };

    if let Some(other) = state.company_repo.find_by_email(&email).await? {
        if other.id != id {
            return Err(AppError::Conflict { field: "email" });
        }
    }

    let found = state
        .company_repo
        .update_profile(id, &company_name, &email, &phone_number, &address)
        .await
        .map_err(|e| e.during("Gagal memperbarui profil"))?;
    if !found {
        return Err(AppError::not_found(PROFILE_NOT_FOUND));
    }
    tracing::info!(company_id = id, "profile updated");
    Ok(Json(Envelope::message("Profil berhasil diperbarui", ())))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthCompany(id): AuthCompany,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<Envelope<()>>> {
    let (current, new) = match (payload.current_password, payload.new_password) {
        (Some(c), Some(n)) if !c.is_empty() && !n.is_empty() => (c, n),
        _ => return Err(AppError::validation("Password lama dan baru harus diisi")),
    };
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password baru minimal 8 karakter"));
    }

    let company = state
        .company_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Pengguna tidak ditemukan"))?;
    if !password_matches(current, company.password_hash).await? {
        return Err(AppError::Unauthorized("Password lama tidak sesuai".into()));
    }

    let password_hash = hash_password(new).await?;
    state
        .company_repo
        .update_password(id, &password_hash)
        .await
        .map_err(|e| e.during("Gagal memperbarui password"))?;
    tracing::info!(company_id = id, "password changed");
    Ok(Json(Envelope::message("Password berhasil diperbarui", ())))
}

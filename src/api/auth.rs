use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use crate::api::Envelope;
use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::models::company::{
    Company, CompanyProfile, LoginRequest, RegisterRequest, MAX_NIB_LEN, MIN_PASSWORD_LEN,
};
use crate::services::tokens::JwtKeys;
use crate::services::validator::clean_text;

pub const SESSION_COOKIE: &str = "session";
const BAD_CREDENTIALS: &str = "Invalid NIB or password";

/// Company id of a caller that presented a valid token. Rejects requests without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthCompany(pub i64);

/// Company id of the caller when a token was presented. A present but invalid token is
/// still rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Option<i64>);

/// Bearer header first, then the session cookie.
fn presented_token(parts: &Parts) -> AppResult<Option<String>> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::Forbidden("Invalid token format".into()))?;
        let mut pieces = value.split_whitespace();
        return match (pieces.next(), pieces.next(), pieces.next()) {
            (Some("Bearer"), Some(token), None) => Ok(Some(token.to_string())),
            _ => Err(AppError::Forbidden("Invalid token format".into())),
        };
    }
    Ok(parts
        .extensions
        .get::<Cookies>()
        .and_then(|cookies| cookies.get(SESSION_COOKIE))
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty()))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match presented_token(parts)? {
            Some(token) => Ok(Caller(Some(JwtKeys::from_ref(state).verify(&token)?.id))),
            None => Ok(Caller(None)),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthCompany
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Caller::from_request_parts(parts, state).await? {
            Caller(Some(id)) => Ok(AuthCompany(id)),
            Caller(None) => Err(AppError::Forbidden("Token Required".into())),
        }
    }
}

/// Checks a registration form and returns the account to create, minus the password hash.
pub fn validate_registration(req: RegisterRequest) -> AppResult<(Company, String)> {
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password must be at least 8 characters long"));
    }
    let nib = req.nib.map(|n| n.trim().to_string()).unwrap_or_default();
    if nib.is_empty() {
        return Err(AppError::validation("NIB cannot be empty"));
    }
    if nib.chars().count() > MAX_NIB_LEN {
        return Err(AppError::validation("NIB cannot exceed 13 characters"));
    }

    match (
        clean_text(req.company_name.as_deref()),
        clean_text(req.email.as_deref()),
        clean_text(req.phone_number.as_deref()),
        clean_text(req.address.as_deref()),
    ) {
        (Some(company_name), Some(email), Some(phone_number), Some(address)) => Ok((
            Company {
                id: 0,
                company_name,
                email,
                password_hash: String::new(),
                phone_number,
                nib,
                address,
                created_at: Utc::now(),
            },
            password,
        )),
        _ => Err(AppError::validation("Semua field harus diisi")),
    }
}

pub(crate) async fn hash_password(password: String) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST)).await??)
}

pub(crate) async fn password_matches(password: String, password_hash: String) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || verify(password, &password_hash).unwrap_or(false)).await?)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<CompanyProfile>>)> {
    let (draft, password) = validate_registration(payload)?;

    if state.company_repo.find_by_email(&draft.email).await?.is_some() {
        return Err(AppError::Conflict { field: "email" });
    }
    if state.company_repo.find_by_nib(&draft.nib).await?.is_some() {
        return Err(AppError::Conflict { field: "NIB" });
    }

    let password_hash = hash_password(password).await?;
    let company = state
        .company_repo
        .create(Company { password_hash, ..draft })
        .await
        .map_err(|e| e.during("Error registering user"))?;

    tracing::info!(company_id = company.id, "company registered");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::message("User registered successfully", company.into())),
    ))
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub token: String,
    pub company: CompanyProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<Envelope<LoginData>>> {
    let company = state
        .company_repo
        .find_by_nib(payload.nib.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized(BAD_CREDENTIALS.into()))?;

    if !password_matches(payload.password, company.password_hash.clone()).await? {
        tracing::warn!(company_id = company.id, "failed login");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let token = state.keys.issue(company.id)?;

    let mut cookie = Cookie::new(SESSION_COOKIE, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookies.add(cookie);

    Ok(Json(Envelope::message(
        "Login successful",
        LoginData { token, company: company.into() },
    )))
}

pub async fn logout(cookies: Cookies) -> Json<Envelope<()>> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookies.remove(cookie);
    Json(Envelope::message("Logged out", ()))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthCompany(id): AuthCompany,
) -> AppResult<Json<Envelope<CompanyProfile>>> {
    let company = state
        .company_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Profil pengguna tidak ditemukan"))?;
    Ok(Json(Envelope::data(company.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn form() -> RegisterRequest {
        RegisterRequest {
            company_name: Some("PT Hijau".into()),
            email: Some("csr@hijau.id".into()),
            password: Some("rahasia123".into()),
            phone_number: Some("0812".into()),
            nib: Some(" 1234567890123 ".into()),
            address: Some("Jakarta".into()),
        }
    }

    #[test]
    fn registration_rules() {
        let (company, password) = validate_registration(form()).unwrap();
        assert_eq!(company.nib, "1234567890123");
        assert_eq!(password, "rahasia123");

        let short = RegisterRequest { password: Some("pendek".into()), ..form() };
        assert!(matches!(validate_registration(short), Err(AppError::Validation(m)) if m.contains("8 characters")));

        let long_nib = RegisterRequest { nib: Some("12345678901234".into()), ..form() };
        assert!(matches!(validate_registration(long_nib), Err(AppError::Validation(m)) if m.contains("13")));

        let blank_nib = RegisterRequest { nib: Some("  ".into()), ..form() };
        assert!(matches!(validate_registration(blank_nib), Err(AppError::Validation(m)) if m.contains("empty")));

        let missing = RegisterRequest { address: None, ..form() };
        assert!(validate_registration(missing).is_err());
    }

    #[tokio::test]
    async fn passwords_hash_and_verify_off_the_executor() {
        let hashed = hash_password("rahasia123".into()).await.unwrap();
        assert!(password_matches("rahasia123".into(), hashed.clone()).await.unwrap());
        assert!(!password_matches("salah".into(), hashed).await.unwrap());
        assert!(!password_matches("x".into(), "not-a-hash".into()).await.unwrap());
    }

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = auth {
            builder = builder.header(AUTHORIZATION, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extractors_map_token_problems_to_status() {
        let keys = JwtKeys::new("rahasia", 60);
        let token = keys.issue(9).unwrap();

        let mut p = parts(Some(&format!("Bearer {}", token)));
        assert_eq!(AuthCompany::from_request_parts(&mut p, &keys).await.unwrap(), AuthCompany(9));

        let mut p = parts(None);
        let err = AuthCompany::from_request_parts(&mut p, &keys).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(Caller::from_request_parts(&mut p, &keys).await.unwrap(), Caller(None));

        let mut p = parts(Some(&token));
        let err = Caller::from_request_parts(&mut p, &keys).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(m) if m == "Invalid token format"));

        let mut p = parts(Some("Bearer garbage"));
        let err = Caller::from_request_parts(&mut p, &keys).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}

use std::{env, path::PathBuf};
use thiserror::Error;

const DEFAULT_MAX_CSV_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} tidak ditemukan di .env")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    /// Root directory for every uploaded file, also served under `/public`.
    pub upload_dir: PathBuf,
    pub cors_origin: String,
    pub max_csv_bytes: usize,
    pub recent_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parsed("PORT", 8000)?,
            mongodb_uri: required("MONGODB_URI")?,
            database_name: env::var("MONGODB_DB").unwrap_or_else(|_| "csr_reporting".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            token_ttl_secs: parsed("TOKEN_TTL_SECS", 3600)?,
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "media".to_string())),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            max_csv_bytes: parsed("MAX_CSV_BYTES", DEFAULT_MAX_CSV_BYTES)?,
            recent_limit: parsed("RECENT_SUBMISSIONS_LIMIT", 100)?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

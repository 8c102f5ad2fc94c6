use chrono::{DateTime, Utc};
use serde::Serialize;

pub const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkshopRegistration {
    pub id: i64,
    pub workshop_id: i64,
    pub company_name: String,
    pub email: String,
    /// Uploaded employee list (`daftar_karyawan`), when one was attached.
    pub file_path: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

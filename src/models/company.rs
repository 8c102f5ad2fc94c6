use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NIB_LEN: usize = 13;

/// A registered company account. Never serialized directly: use [`CompanyProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: i64,
    pub company_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: String,
    /// Nomor Induk Berusaha, the business registration number used to log in.
    pub nib: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CompanyProfile {
    pub id: i64,
    pub company_name: String,
    pub email: String,
    pub phone_number: String,
    pub nib: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<Company> for CompanyProfile {
    fn from(c: Company) -> Self {
        CompanyProfile {
            id: c.id,
            company_name: c.company_name,
            email: c.email,
            phone_number: c.phone_number,
            nib: c.nib,
            address: c.address,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    #[serde(rename = "NIB")]
    pub nib: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "NIB")]
    pub nib: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationStatus {
    #[default]
    Submitted,
    InReview,
    Approved,
    Rejected,
}

impl FromStr for CertificationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(CertificationStatus::Submitted),
            "in_review" => Ok(CertificationStatus::InReview),
            "approved" => Ok(CertificationStatus::Approved),
            "rejected" => Ok(CertificationStatus::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certification {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub credential_body: String,
    pub benefits: String,
    pub cost: f64,
    pub status: CertificationStatus,
    pub submission_date: DateTime<Utc>,
    pub supporting_documents: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyCertificationRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub credential_body: Option<String>,
    pub benefits: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cost: Option<String>,
    pub supporting_documents: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrStatus {
    #[default]
    Pending,
    Progress,
    Selesai,
}

/// A CSR program proposal submitted by a company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsrSubmission {
    pub id: i64,
    pub user_id: String,
    pub program_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub partner_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: f64,
    pub proposal_url: Option<String>,
    pub legality_url: Option<String>,
    pub agreed: bool,
    pub status: CsrStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-category slice of the CSR budget summary.
#[derive(Debug, Serialize, PartialEq)]
pub struct CategorySummary {
    pub jumlah: usize,
    pub total: String,
    pub persentase: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusSummary {
    pub selesai: String,
    pub progress: String,
    pub mendatang: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsrSummary {
    pub total_dana: String,
    pub kategori: std::collections::BTreeMap<String, CategorySummary>,
    pub status: StatusSummary,
}

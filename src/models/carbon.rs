use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use super::lenient;

/// Closed set of document categories a carbon submission can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    DataEmisi,
    DataEnergi,
    DataAir,
    DataPohon,
    DataSampah,
    DataManfaat,
    LaporanCsr,
    SertifikasiCsr,
    DokumenPendukungLain,
}

impl DocumentType {
    pub const ALL: [DocumentType; 9] = [
        DocumentType::DataEmisi,
        DocumentType::DataEnergi,
        DocumentType::DataAir,
        DocumentType::DataPohon,
        DocumentType::DataSampah,
        DocumentType::DataManfaat,
        DocumentType::LaporanCsr,
        DocumentType::SertifikasiCsr,
        DocumentType::DokumenPendukungLain,
    ];

    /// The six measurement categories broken down on the dashboard.
    pub const KPI: [DocumentType; 6] = [
        DocumentType::DataEmisi,
        DocumentType::DataEnergi,
        DocumentType::DataAir,
        DocumentType::DataPohon,
        DocumentType::DataSampah,
        DocumentType::DataManfaat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::DataEmisi => "data_emisi",
            DocumentType::DataEnergi => "data_energi",
            DocumentType::DataAir => "data_air",
            DocumentType::DataPohon => "data_pohon",
            DocumentType::DataSampah => "data_sampah",
            DocumentType::DataManfaat => "data_manfaat",
            DocumentType::LaporanCsr => "laporan_csr",
            DocumentType::SertifikasiCsr => "sertifikasi_csr",
            DocumentType::DokumenPendukungLain => "dokumen_pendukung_lain",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }

    /// Unknown or missing values map to `data_emisi`.
    pub fn or_default(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSubmission {
    pub id: i64,
    pub company_id: Option<String>,
    pub year: i32,
    pub month: i32,
    pub carbon_value: f64,
    pub document_type: DocumentType,
    pub document_name: Option<String>,
    pub document_path: Option<String>,
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A normalized record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCarbonSubmission {
    pub company_id: Option<String>,
    pub year: i32,
    pub month: i32,
    pub carbon_value: f64,
    pub document_type: DocumentType,
    pub document_name: Option<String>,
    pub document_path: Option<String>,
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewCarbonSubmission {
    pub fn with_id(self, id: i64) -> CarbonSubmission {
        CarbonSubmission {
            id,
            company_id: self.company_id,
            year: self.year,
            month: self.month,
            carbon_value: self.carbon_value,
            document_type: self.document_type,
            document_name: self.document_name,
            document_path: self.document_path,
            analysis: self.analysis,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

/// Raw field bag from a JSON body or a CSV row. Nothing here is trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    #[serde(default, alias = "id_perusahaan", deserialize_with = "lenient::text")]
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub carbon_value: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub document_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub document_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub document_path: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub analysis: Option<String>,
}

impl RawSubmission {
    /// Builds the field bag from one CSV row keyed by header name.
    pub fn from_columns(mut row: HashMap<String, String>) -> Self {
        let mut take = |key: &str| row.remove(key);
        RawSubmission {
            company_id: take("company_id").or_else(|| take("id_perusahaan")),
            year: take("year"),
            month: take("month"),
            carbon_value: take("carbon_value"),
            document_type: take("document_type"),
            document_name: take("document_name"),
            document_path: take("document_path"),
            analysis: take("analysis"),
        }
    }
}

/// Partial update body. Outer `None` means "not sent", `Some(None)` means explicit null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionPatch {
    #[serde(default, deserialize_with = "lenient::patch")]
    pub company_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub year: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub month: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub carbon_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub document_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub document_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub document_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::patch")]
    pub analysis: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionFilter {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub company_id: Option<String>,
}

/// One `GROUP BY month` row as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthBucket {
    pub month: i32,
    pub total: f64,
    pub count: i64,
    pub average: f64,
}

/// One `GROUP BY year` row as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearBucket {
    pub year: i32,
    pub total: f64,
    pub count: i64,
}

/// Single-row aggregate over a filtered set. All zero when nothing matched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodStats {
    pub total: f64,
    pub average: f64,
    pub count: i64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiType {
    CarbonFootprint,
}

impl KpiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiType::CarbonFootprint => "carbon_footprint",
        }
    }
}

impl FromStr for KpiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carbon_footprint" => Ok(KpiType::CarbonFootprint),
            other => Err(format!(
                "Unsupported KPI type: {}. Currently only 'carbon_footprint' is supported.",
                other
            )),
        }
    }
}

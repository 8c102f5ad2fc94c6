use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::carbon::{CarbonSubmission, DocumentType, KpiType};
use crate::services::aggregation::{fill_months, fill_years, pick_year, year_window};
use crate::services::submissions::CarbonService;
use crate::services::validator::Normalizer;

pub const KPI_TITLE: &str = "CSR Reporting Dashboard";
pub const KPI_UNIT: &str = "General Value";

#[derive(Debug, Serialize)]
pub struct MonthlyPoint {
    pub month: i32,
    pub carbon_value: f64,
    pub submission_count: i64,
    pub average_carbon: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
    pub total_carbon: f64,
    pub avg_carbon: f64,
    pub total_submissions: i64,
    pub min_carbon: f64,
    pub max_carbon: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub year: i32,
    pub monthly_data: Vec<MonthlyPoint>,
    pub total_stats: TotalStats,
}

#[derive(Debug, Serialize)]
pub struct ChartPoint {
    pub month: i32,
    pub carbon_value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    pub total_carbon: f64,
    pub total_submissions: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub year: i32,
    pub monthly_data: Vec<ChartPoint>,
    pub total_stats: DashboardTotals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub current_year_total: f64,
    pub submission_count: i64,
    pub last_updated: DateTime<Utc>,
}

/// Per document type totals over the recent submissions.
#[derive(Debug, Serialize, PartialEq)]
pub struct KpiSlice {
    pub total_value: f64,
    pub submission_count: usize,
    pub latest_submission: Option<CarbonSubmission>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub analytics: DashboardAnalytics,
    #[serde(rename = "recentSubmissions")]
    pub recent_submissions: Vec<CarbonSubmission>,
    pub summary: DashboardSummary,
    pub kpi_breakdown: BTreeMap<&'static str, KpiSlice>,
}

#[derive(Debug, Serialize)]
pub struct KpiMonth {
    pub month: i32,
    pub value: f64,
    pub submission_count: i64,
}

#[derive(Debug, Serialize)]
pub struct KpiYear {
    pub year: i32,
    pub total_value: f64,
    pub submission_count: i64,
}

#[derive(Debug, Serialize)]
pub struct KpiStatistics {
    pub average_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub total_value: f64,
}

#[derive(Debug, Serialize)]
pub struct KpiReport {
    pub kpi_type: &'static str,
    pub title: &'static str,
    pub unit: &'static str,
    pub yearly_data: Vec<KpiMonth>,
    pub multi_year_data: Vec<KpiYear>,
    pub statistics: KpiStatistics,
    pub analysis: String,
}

/// Groups `recent` (newest first) by the six measurement types.
pub fn kpi_breakdown(recent: &[CarbonSubmission]) -> BTreeMap<&'static str, KpiSlice> {
    DocumentType::KPI
        .iter()
        .map(|kind| {
            let matching: Vec<&CarbonSubmission> =
                recent.iter().filter(|r| r.document_type == *kind).collect();
            let slice = KpiSlice {
                total_value: matching.iter().map(|r| r.carbon_value).sum(),
                submission_count: matching.len(),
                latest_submission: matching.first().map(|r| (*r).clone()),
            };
            (kind.as_str(), slice)
        })
        .collect()
}

pub fn kpi_analysis(year: i32, total: f64, average: f64, submissions: i64) -> String {
    format!(
        "Analisis CSR reporting untuk tahun {}. Total nilai: {:.1} dengan rata-rata {:.1} per submission. \
         Total {} submission tercatat untuk berbagai KPI (emisi, energi, air, pohon, sampah, manfaat).",
        year, total, average, submissions
    )
}

impl CarbonService {
    async fn resolve_year(&self, requested: Option<i32>, company_id: Option<&str>) -> AppResult<i32> {
        if let Some(year) = requested.filter(|y| *y > 0) {
            return Ok(year);
        }
        let available = self.store.available_years(company_id).await?;
        let year = pick_year(None, &available, Normalizer::now().current_year());
        tracing::debug!(?available, year, "year auto-detected");
        Ok(year)
    }

    /// Monthly series and totals for `year` (current year when omitted or below 1).
    pub async fn analytics(&self, year: Option<i32>, company_id: Option<&str>) -> AppResult<Analytics> {
        let year = year
            .filter(|y| *y > 0)
            .unwrap_or_else(|| Normalizer::now().current_year());
        let months = self.store.monthly_totals(year, company_id).await?;
        let stats = self.store.period_stats(year, company_id).await?;

        Ok(Analytics {
            year,
            monthly_data: fill_months(&months)
                .into_iter()
                .map(|b| MonthlyPoint {
                    month: b.month,
                    carbon_value: b.total,
                    submission_count: b.count,
                    average_carbon: b.average,
                })
                .collect(),
            total_stats: TotalStats {
                total_carbon: stats.total,
                avg_carbon: stats.average,
                total_submissions: stats.count,
                min_carbon: stats.min,
                max_carbon: stats.max,
            },
        })
    }

    pub async fn dashboard(&self, year: Option<i32>, company_id: Option<&str>) -> AppResult<Dashboard> {
        let year = self.resolve_year(year, company_id).await?;
        let months = self.store.monthly_totals(year, company_id).await?;
        let stats = self.store.period_stats(year, company_id).await?;
        let recent = self.store.recent(company_id, self.recent_limit).await?;

        Ok(Dashboard {
            analytics: DashboardAnalytics {
                year,
                monthly_data: fill_months(&months)
                    .into_iter()
                    .map(|b| ChartPoint { month: b.month, carbon_value: b.total })
                    .collect(),
                total_stats: DashboardTotals {
                    total_carbon: stats.total,
                    total_submissions: stats.count,
                },
            },
            kpi_breakdown: kpi_breakdown(&recent),
            recent_submissions: recent,
            summary: DashboardSummary {
                current_year_total: stats.total,
                submission_count: stats.count,
                last_updated: Utc::now(),
            },
        })
    }

    /// Unknown KPI types are reported as not found.
    pub async fn kpi(
        &self,
        kpi_type: &str,
        year: Option<i32>,
        company_id: Option<&str>,
    ) -> AppResult<KpiReport> {
        let kind: KpiType = kpi_type.parse().map_err(AppError::NotFound)?;
        let year = self.resolve_year(year, company_id).await?;

        let months = fill_months(&self.store.monthly_totals(year, company_id).await?);
        let (from, to) = year_window(year);
        let years = fill_years(year, &self.store.yearly_totals(from, to, company_id).await?);
        let stats = self.store.period_stats(year, company_id).await?;

        let submissions: i64 = months.iter().map(|m| m.count).sum();
        Ok(KpiReport {
            kpi_type: kind.as_str(),
            title: KPI_TITLE,
            unit: KPI_UNIT,
            yearly_data: months
                .iter()
                .map(|m| KpiMonth { month: m.month, value: m.total, submission_count: m.count })
                .collect(),
            multi_year_data: years
                .iter()
                .map(|y| KpiYear { year: y.year, total_value: y.total, submission_count: y.count })
                .collect(),
            statistics: KpiStatistics {
                average_value: stats.average,
                min_value: stats.min,
                max_value: stats.max,
                total_value: stats.total,
            },
            analysis: kpi_analysis(year, stats.total, stats.average, submissions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::carbon::RawSubmission;
    use crate::repository::memory::MemoryCarbonStore;
    use crate::services::uploads::UploadStore;
    use std::sync::Arc;

    fn service() -> CarbonService {
        CarbonService::new(Arc::new(MemoryCarbonStore::default()), UploadStore::new("unused"), 100)
    }

    async fn seed(svc: &CarbonService, company: &str, year: i32, month: i32, value: f64, kind: &str) {
        let raw = RawSubmission {
            company_id: Some(company.into()),
            year: Some(year.to_string()),
            month: Some(month.to_string()),
            carbon_value: Some(value.to_string()),
            document_type: Some(kind.into()),
            ..Default::default()
        };
        svc.create(raw, None).await.unwrap();
    }

    #[tokio::test]
    async fn dashboard_defaults_to_latest_year_with_data() {
        let svc = service();
        seed(&svc, "PT-A", 2022, 1, 1.0, "data_air").await;
        seed(&svc, "PT-A", 2024, 3, 2.0, "data_air").await;
        seed(&svc, "PT-A", 2023, 2, 4.0, "data_energi").await;

        let dash = svc.dashboard(None, Some("PT-A")).await.unwrap();
        assert_eq!(dash.analytics.year, 2024);
        assert_eq!(dash.analytics.monthly_data.len(), 12);
        assert_eq!(dash.analytics.monthly_data[2].carbon_value, 2.0);
        assert_eq!(dash.summary.current_year_total, 2.0);
        assert_eq!(dash.summary.submission_count, 1);
        assert_eq!(dash.recent_submissions.len(), 3);

        let air = &dash.kpi_breakdown["data_air"];
        assert_eq!(air.submission_count, 2);
        assert_eq!(air.total_value, 3.0);
        assert_eq!(air.latest_submission.as_ref().map(|r| r.year), Some(2024));
        assert_eq!(dash.kpi_breakdown.len(), 6);
        assert_eq!(dash.kpi_breakdown["data_sampah"].latest_submission, None);
    }

    #[tokio::test]
    async fn available_years_are_company_scoped() {
        let svc = service();
        seed(&svc, "PT-A", 2021, 1, 1.0, "data_air").await;
        seed(&svc, "PT-B", 2025, 1, 1.0, "data_air").await;
        let dash = svc.dashboard(None, Some("PT-A")).await.unwrap();
        assert_eq!(dash.analytics.year, 2021);
    }

    #[tokio::test]
    async fn analytics_is_zero_filled_when_empty() {
        let svc = service();
        let a = svc.analytics(Some(2020), None).await.unwrap();
        assert_eq!(a.monthly_data.len(), 12);
        assert!(a.monthly_data.iter().all(|m| m.carbon_value == 0.0 && m.submission_count == 0));
        assert_eq!(a.total_stats.total_submissions, 0);
        assert_eq!(a.total_stats.max_carbon, 0.0);
    }

    #[tokio::test]
    async fn kpi_with_out_of_range_year_falls_back_to_data() {
        let svc = service();
        seed(&svc, "PT-A", 2023, 4, 7.0, "data_emisi").await;

        for year in [i32::MIN, -1, 0] {
            let report = svc.kpi("carbon_footprint", Some(year), None).await.unwrap();
            let years: Vec<i32> = report.multi_year_data.iter().map(|y| y.year).collect();
            assert_eq!(years, vec![2019, 2020, 2021, 2022, 2023]);
            assert_eq!(report.statistics.total_value, 7.0);
        }
        let a = svc.analytics(Some(i32::MIN), None).await.unwrap();
        assert_eq!(a.year, Normalizer::now().current_year());
    }

    #[tokio::test]
    async fn kpi_report_covers_months_and_five_years() {
        let svc = service();
        seed(&svc, "PT-A", 2024, 1, 10.0, "data_emisi").await;
        seed(&svc, "PT-A", 2024, 1, 20.0, "data_emisi").await;
        seed(&svc, "PT-A", 2021, 6, 5.0, "data_emisi").await;

        let report = svc.kpi("carbon_footprint", Some(2024), None).await.unwrap();
        assert_eq!(report.kpi_type, "carbon_footprint");
        assert_eq!(report.yearly_data.len(), 12);
        assert_eq!(report.yearly_data[0].value, 30.0);
        assert_eq!(report.yearly_data[0].submission_count, 2);
        let years: Vec<i32> = report.multi_year_data.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022, 2023, 2024]);
        assert_eq!(report.multi_year_data[1].total_value, 5.0);
        assert_eq!(report.statistics.average_value, 15.0);
        assert_eq!(report.statistics.min_value, 10.0);
        assert!(report.analysis.contains("tahun 2024"));
        assert!(report.analysis.contains("Total nilai: 30.0 dengan rata-rata 15.0"));
        assert!(report.analysis.contains("Total 2 submission"));
    }

    #[tokio::test]
    async fn unknown_kpi_type_is_not_found() {
        let err = service().kpi("co2", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("co2")));
    }
}

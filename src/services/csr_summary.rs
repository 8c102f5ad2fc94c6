use num_format::{Locale, ToFormattedString};
use std::collections::BTreeMap;

use crate::models::csr::{CategorySummary, CsrStatus, CsrSubmission, CsrSummary, StatusSummary};

/// Bucket for submissions that were filed without a category.
pub const UNCATEGORIZED: &str = "lainnya";

/// Whole-rupiah amount with Indonesian grouping, e.g. `Rp 1.500.000`.
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.round() as i64;
    format!("Rp {}", rounded.to_formatted_string(&Locale::id))
}

fn percentage(part: f64, whole: f64) -> String {
    if whole > 0.0 {
        format!("{:.1}%", part / whole * 100.0)
    } else {
        "0.0%".to_string()
    }
}

pub fn summarize(submissions: &[CsrSubmission]) -> CsrSummary {
    let mut total = 0.0;
    let mut categories: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    let (mut selesai, mut progress, mut mendatang) = (0.0, 0.0, 0.0);

    for s in submissions {
        total += s.budget;

        let key = s
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED);
        let entry = categories.entry(key.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += s.budget;

        match s.status {
            CsrStatus::Selesai => selesai += s.budget,
            CsrStatus::Progress => progress += s.budget,
            CsrStatus::Pending => mendatang += s.budget,
        }
    }

    CsrSummary {
        total_dana: format_rupiah(total),
        kategori: categories
            .into_iter()
            .map(|(name, (count, sum))| {
                let slice = CategorySummary {
                    jumlah: count,
                    total: format_rupiah(sum),
                    persentase: percentage(sum, total),
                };
                (name, slice)
            })
            .collect(),
        status: StatusSummary {
            selesai: format_rupiah(selesai),
            progress: format_rupiah(progress),
            mendatang: format_rupiah(mendatang),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn submission(category: Option<&str>, budget: f64, status: CsrStatus) -> CsrSubmission {
        CsrSubmission {
            id: 1,
            user_id: "7".into(),
            program_name: None,
            category: category.map(str::to_string),
            description: None,
            location: None,
            partner_name: None,
            start_date: None,
            end_date: None,
            budget,
            proposal_url: None,
            legality_url: None,
            agreed: true,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rupiah_uses_dot_grouping() {
        assert_eq!(format_rupiah(1_500_000.0), "Rp 1.500.000");
        assert_eq!(format_rupiah(0.0), "Rp 0");
        assert_eq!(format_rupiah(999.6), "Rp 1.000");
    }

    #[test]
    fn summary_splits_by_category_and_status() {
        let subs = vec![
            submission(Some("pendidikan"), 1_000_000.0, CsrStatus::Selesai),
            submission(Some("pendidikan"), 500_000.0, CsrStatus::Progress),
            submission(Some("lingkungan"), 500_000.0, CsrStatus::Pending),
            submission(None, 0.0, CsrStatus::Pending),
        ];
        let summary = summarize(&subs);

        assert_eq!(summary.total_dana, "Rp 2.000.000");
        let edu = &summary.kategori["pendidikan"];
        assert_eq!(edu.jumlah, 2);
        assert_eq!(edu.total, "Rp 1.500.000");
        assert_eq!(edu.persentase, "75.0%");
        assert_eq!(summary.kategori["lingkungan"].persentase, "25.0%");
        assert_eq!(summary.kategori[UNCATEGORIZED].jumlah, 1);
        assert_eq!(summary.status.selesai, "Rp 1.000.000");
        assert_eq!(summary.status.progress, "Rp 500.000");
        assert_eq!(summary.status.mendatang, "Rp 500.000");
    }

    #[test]
    fn empty_summary_has_zero_percentages() {
        let summary = summarize(&[submission(Some("x"), 0.0, CsrStatus::Pending)]);
        assert_eq!(summary.kategori["x"].persentase, "0.0%");
        assert_eq!(summary.total_dana, "Rp 0");
    }
}

use chrono::{DateTime, Datelike, Local, Utc};

use crate::models::carbon::{
    CarbonSubmission, DocumentType, NewCarbonSubmission, RawSubmission, SubmissionPatch,
};

/// Fallbacks for the document fields, e.g. the uploaded file a CSV row came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentDefaults<'a> {
    pub name: Option<&'a str>,
    pub path: Option<&'a str>,
}

/// Captures "now" once so every row of a batch sees the same calendar defaults.
/// Never rejects input: malformed fields fall back to a default, or on update to the
/// stored value.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    year: i32,
    month: i32,
    now: DateTime<Utc>,
}

impl Normalizer {
    pub fn now() -> Self {
        let local = Local::now();
        Self::at(local.year(), local.month() as i32, Utc::now())
    }

    pub fn at(year: i32, month: i32, now: DateTime<Utc>) -> Self {
        Normalizer { year, month, now }
    }

    pub fn current_year(&self) -> i32 {
        self.year
    }

    pub fn normalize(&self, raw: &RawSubmission, defaults: DocumentDefaults<'_>) -> NewCarbonSubmission {
        NewCarbonSubmission {
            company_id: clean_text(raw.company_id.as_deref()),
            year: valid_year(raw.year.as_deref()).unwrap_or(self.year),
            month: valid_month(raw.month.as_deref()).unwrap_or(self.month),
            carbon_value: valid_carbon(raw.carbon_value.as_deref()).unwrap_or(0.0),
            document_type: DocumentType::or_default(raw.document_type.as_deref()),
            document_name: clean_text(raw.document_name.as_deref())
                .or_else(|| defaults.name.map(str::to_string)),
            document_path: clean_text(raw.document_path.as_deref())
                .or_else(|| defaults.path.map(str::to_string)),
            analysis: clean_text(raw.analysis.as_deref()),
            created_at: self.now,
        }
    }

    /// Applies only the fields present in `patch`. Invalid numbers and unknown document
    /// types keep the stored value.
    pub fn apply_patch(&self, record: &mut CarbonSubmission, patch: &SubmissionPatch) {
        if let Some(v) = &patch.company_id {
            record.company_id = clean_text(v.as_deref());
        }
        if let Some(v) = &patch.year {
            record.year = valid_year(v.as_deref()).unwrap_or(record.year);
        }
        if let Some(v) = &patch.month {
            record.month = valid_month(v.as_deref()).unwrap_or(record.month);
        }
        if let Some(v) = &patch.carbon_value {
            record.carbon_value = valid_carbon(v.as_deref()).unwrap_or(record.carbon_value);
        }
        if let Some(v) = &patch.document_type {
            record.document_type = v
                .as_deref()
                .and_then(DocumentType::parse)
                .unwrap_or(record.document_type);
        }
        if let Some(v) = &patch.document_name {
            record.document_name = clean_text(v.as_deref());
        }
        if let Some(v) = &patch.document_path {
            record.document_path = clean_text(v.as_deref());
        }
        if let Some(v) = &patch.analysis {
            record.analysis = clean_text(v.as_deref());
        }
        record.updated_at = Some(self.now);
    }
}

/// Trimmed text, `None` when missing or blank.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Leading integer of the text (`"3.7"` is 3, `"12abc"` is 12). `None` without digits
/// up front or outside the `i32` range.
pub fn parse_int(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    let digits = s.bytes().skip(sign_len(s)).take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    s[..sign_len(s) + digits].parse().ok()
}

/// Leading decimal of the text (`"12.5kg"` is 12.5). Exponents count only when they
/// carry digits.
pub fn parse_decimal(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    let b = s.as_bytes();
    let mut end = sign_len(s);
    let int_digits = digit_run(b, end);
    end += int_digits;
    let mut frac_digits = 0;
    if b.get(end) == Some(&b'.') {
        frac_digits = digit_run(b, end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(b.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_digits = digit_run(b, exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn sign_len(s: &str) -> usize {
    usize::from(s.starts_with('+') || s.starts_with('-'))
}

fn digit_run(b: &[u8], from: usize) -> usize {
    b.get(from..).map_or(0, |rest| rest.iter().take_while(|c| c.is_ascii_digit()).count())
}

/// Two-decimal precision, as stored.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Years before 1 are treated as absent.
pub fn valid_year(s: Option<&str>) -> Option<i32> {
    parse_int(s).filter(|y| *y > 0)
}

fn valid_month(s: Option<&str>) -> Option<i32> {
    parse_int(s).filter(|m| (1..=12).contains(m))
}

fn valid_carbon(s: Option<&str>) -> Option<f64> {
    parse_decimal(s).map(|v| round2(v.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn normalizer() -> Normalizer {
        Normalizer::at(2025, 6, Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap())
    }

    fn raw(pairs: &[(&str, &str)]) -> RawSubmission {
        let mut r = RawSubmission::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "company_id" => r.company_id = v,
                "year" => r.year = v,
                "month" => r.month = v,
                "carbon_value" => r.carbon_value = v,
                "document_type" => r.document_type = v,
                "document_name" => r.document_name = v,
                "document_path" => r.document_path = v,
                "analysis" => r.analysis = v,
                _ => unreachable!(),
            }
        }
        r
    }

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let n = normalizer();
        let rec = n.normalize(
            &raw(&[
                ("company_id", "  PT-01 "),
                ("year", "abc"),
                ("month", "13"),
                ("carbon_value", "-5"),
                ("document_type", "bogus"),
                ("analysis", "   "),
            ]),
            DocumentDefaults::default(),
        );
        assert_eq!(rec.company_id.as_deref(), Some("PT-01"));
        assert_eq!(rec.year, 2025);
        assert_eq!(rec.month, 6);
        assert_eq!(rec.carbon_value, 0.0);
        assert_eq!(rec.document_type, DocumentType::DataEmisi);
        assert_eq!(rec.analysis, None);
    }

    #[test]
    fn non_numeric_and_zero_month_use_current_month() {
        let n = normalizer();
        for bad in ["0", "-1", "x", ""] {
            let rec = n.normalize(&raw(&[("month", bad)]), DocumentDefaults::default());
            assert_eq!(rec.month, 6, "month {:?}", bad);
        }
        let rec = n.normalize(&raw(&[("month", "3.9")]), DocumentDefaults::default());
        assert_eq!(rec.month, 3);
    }

    #[test]
    fn numbers_are_read_from_the_leading_part() {
        assert_eq!(parse_int(Some("12abc")), Some(12));
        assert_eq!(parse_int(Some(" -3 ton")), Some(-3));
        assert_eq!(parse_int(Some("2024.9")), Some(2024));
        assert_eq!(parse_int(Some("1e3")), Some(1));
        assert_eq!(parse_int(Some("abc12")), None);
        assert_eq!(parse_int(Some("-")), None);
        assert_eq!(parse_int(Some("99999999999")), None);

        assert_eq!(parse_decimal(Some("12.5kg")), Some(12.5));
        assert_eq!(parse_decimal(Some(".5")), Some(0.5));
        assert_eq!(parse_decimal(Some("7.")), Some(7.0));
        assert_eq!(parse_decimal(Some("1.5e2x")), Some(150.0));
        assert_eq!(parse_decimal(Some("3e")), Some(3.0));
        assert_eq!(parse_decimal(Some("-0.25 ")), Some(-0.25));
        assert_eq!(parse_decimal(Some(".")), None);
        assert_eq!(parse_decimal(Some("inf")), None);
        assert_eq!(parse_decimal(Some("kg12")), None);
        assert_eq!(parse_decimal(Some("")), None);
    }

    #[test]
    fn suffixed_values_keep_their_number() {
        let rec = normalizer().normalize(
            &raw(&[("year", "2023 (audit)"), ("month", "4th"), ("carbon_value", "12.5kg")]),
            DocumentDefaults::default(),
        );
        assert_eq!(rec.year, 2023);
        assert_eq!(rec.month, 4);
        assert_eq!(rec.carbon_value, 12.5);
    }

    #[test]
    fn carbon_value_is_rounded_and_never_negative() {
        let n = normalizer();
        let rec = n.normalize(&raw(&[("carbon_value", "12.345")]), DocumentDefaults::default());
        assert_eq!(rec.carbon_value, 12.35);
        let rec = n.normalize(&raw(&[("carbon_value", "NaN")]), DocumentDefaults::default());
        assert_eq!(rec.carbon_value, 0.0);
        let rec = n.normalize(&raw(&[("carbon_value", "-0.001")]), DocumentDefaults::default());
        assert_eq!(rec.carbon_value, 0.0);
    }

    #[test]
    fn document_fields_fall_back_to_upload() {
        let n = normalizer();
        let defaults = DocumentDefaults { name: Some("data.csv"), path: Some("media/carbon/1_data.csv") };
        let rec = n.normalize(&raw(&[("document_name", " ")]), defaults);
        assert_eq!(rec.document_name.as_deref(), Some("data.csv"));
        assert_eq!(rec.document_path.as_deref(), Some("media/carbon/1_data.csv"));

        let rec = n.normalize(&raw(&[("document_name", "laporan.pdf")]), defaults);
        assert_eq!(rec.document_name.as_deref(), Some("laporan.pdf"));
    }

    #[test]
    fn patch_keeps_existing_values_for_invalid_input() {
        let n = normalizer();
        let mut rec = n
            .normalize(
                &raw(&[("year", "2023"), ("month", "4"), ("carbon_value", "10"), ("document_type", "data_air")]),
                DocumentDefaults::default(),
            )
            .with_id(1);

        let patch = SubmissionPatch {
            year: Some(Some("soon".into())),
            month: Some(Some("14".into())),
            carbon_value: Some(Some("ten".into())),
            document_type: Some(Some("unknown".into())),
            analysis: Some(Some(" ok ".into())),
            ..Default::default()
        };
        n.apply_patch(&mut rec, &patch);
        assert_eq!(rec.year, 2023);
        assert_eq!(rec.month, 4);
        assert_eq!(rec.carbon_value, 10.0);
        assert_eq!(rec.document_type, DocumentType::DataAir);
        assert_eq!(rec.analysis.as_deref(), Some("ok"));
        assert!(rec.updated_at.is_some());

        let clamp = SubmissionPatch { carbon_value: Some(Some("-3".into())), analysis: Some(None), ..Default::default() };
        n.apply_patch(&mut rec, &clamp);
        assert_eq!(rec.carbon_value, 0.0);
        assert_eq!(rec.analysis, None);
    }

    #[test]
    fn repeating_a_patch_is_idempotent() {
        let n = normalizer();
        let mut rec = n.normalize(&raw(&[("month", "2")]), DocumentDefaults::default()).with_id(7);
        let patch = SubmissionPatch { month: Some(Some("5".into())), ..Default::default() };
        n.apply_patch(&mut rec, &patch);
        let first = rec.clone();
        n.apply_patch(&mut rec, &patch);
        assert_eq!(first, rec);
    }
}

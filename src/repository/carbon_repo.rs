use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    options::{FindOptions, InsertManyOptions},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::carbon::{
    CarbonSubmission, DocumentType, MonthBucket, NewCarbonSubmission, PeriodStats,
    SubmissionFilter, YearBucket,
};
use crate::repository::counter::Counters;

const COLLECTION: &str = "carbon_submissions";

/// Persistence seam for carbon submissions. Aggregations are pushed down to the store;
/// callers only render what comes back.
#[async_trait]
pub trait CarbonStore: Send + Sync {
    async fn insert(&self, record: NewCarbonSubmission) -> AppResult<CarbonSubmission>;

    /// Inserts every record or none of them.
    async fn insert_many(&self, records: Vec<NewCarbonSubmission>) -> AppResult<Vec<CarbonSubmission>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<CarbonSubmission>>;

    /// One page ordered newest first, plus the total number of matches.
    async fn find_page(
        &self,
        filter: &SubmissionFilter,
        skip: u64,
        limit: i64,
    ) -> AppResult<(Vec<CarbonSubmission>, u64)>;

    async fn recent(&self, company_id: Option<&str>, limit: i64) -> AppResult<Vec<CarbonSubmission>>;

    /// Returns false when no record has this id.
    async fn replace(&self, record: &CarbonSubmission) -> AppResult<bool>;

    async fn delete(&self, id: i64) -> AppResult<bool>;

    /// Months that have data only, ascending.
    async fn monthly_totals(&self, year: i32, company_id: Option<&str>) -> AppResult<Vec<MonthBucket>>;

    async fn period_stats(&self, year: i32, company_id: Option<&str>) -> AppResult<PeriodStats>;

    /// Years in `[from, to]` that have data only, ascending.
    async fn yearly_totals(
        &self,
        from: i32,
        to: i32,
        company_id: Option<&str>,
    ) -> AppResult<Vec<YearBucket>>;

    /// Distinct years with data, newest first.
    async fn available_years(&self, company_id: Option<&str>) -> AppResult<Vec<i32>>;
}

// Stored shape: `_id` key and BSON dates.
#[derive(Debug, Serialize, Deserialize)]
struct CarbonDocument {
    #[serde(rename = "_id")]
    id: i64,
    company_id: Option<String>,
    year: i32,
    month: i32,
    carbon_value: f64,
    document_type: DocumentType,
    document_name: Option<String>,
    document_path: Option<String>,
    analysis: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<bson::DateTime>,
}

impl From<&CarbonSubmission> for CarbonDocument {
    fn from(r: &CarbonSubmission) -> Self {
        CarbonDocument {
            id: r.id,
            company_id: r.company_id.clone(),
            year: r.year,
            month: r.month,
            carbon_value: r.carbon_value,
            document_type: r.document_type,
            document_name: r.document_name.clone(),
            document_path: r.document_path.clone(),
            analysis: r.analysis.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at.map(bson::DateTime::from_chrono),
        }
    }
}

impl From<CarbonDocument> for CarbonSubmission {
    fn from(d: CarbonDocument) -> Self {
        CarbonSubmission {
            id: d.id,
            company_id: d.company_id,
            year: d.year,
            month: d.month,
            carbon_value: d.carbon_value,
            document_type: d.document_type,
            document_name: d.document_name,
            document_path: d.document_path,
            analysis: d.analysis,
            created_at: d.created_at,
            updated_at: d.updated_at.map(|t| t.to_chrono()),
        }
    }
}

#[derive(Clone)]
pub struct CarbonRepository {
    collection: Collection<CarbonDocument>,
    counters: Counters,
}

impl CarbonRepository {
    pub fn new(db: &Database) -> Self {
        CarbonRepository {
            collection: db.collection(COLLECTION),
            counters: Counters::new(db),
        }
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> AppResult<Vec<Document>> {
        let cursor = self.collection.aggregate(pipeline, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn collect(&self, filter: Document, options: FindOptions) -> AppResult<Vec<CarbonSubmission>> {
        let mut cursor = self.collection.find(filter, options).await?;
        let mut rows = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            rows.push(d.into());
        }
        Ok(rows)
    }
}

fn by_company(mut filter: Document, company_id: Option<&str>) -> Document {
    if let Some(c) = company_id {
        filter.insert("company_id", c);
    }
    filter
}

fn newest_first() -> Document {
    doc! { "created_at": -1, "_id": -1 }
}

/// Reads a numeric aggregate field whatever BSON width the server chose.
fn number(d: &Document, key: &str) -> f64 {
    match d.get(key) {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => *v as f64,
        Some(Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}

fn integer(b: &Bson) -> Option<i32> {
    match b {
        Bson::Int32(v) => Some(*v),
        Bson::Int64(v) => i32::try_from(*v).ok(),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i32),
        _ => None,
    }
}

fn monthly_pipeline(year: i32, company_id: Option<&str>) -> Vec<Document> {
    vec![
        doc! { "$match": by_company(doc! { "year": year }, company_id) },
        doc! {
            "$group": {
                "_id": "$month",
                "total": { "$sum": "$carbon_value" },
                "count": { "$sum": 1 },
                "average": { "$avg": "$carbon_value" }
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

fn stats_pipeline(year: i32, company_id: Option<&str>) -> Vec<Document> {
    vec![
        doc! { "$match": by_company(doc! { "year": year }, company_id) },
        doc! {
            "$group": {
                "_id": Bson::Null,
                "total": { "$sum": "$carbon_value" },
                "average": { "$avg": "$carbon_value" },
                "count": { "$sum": 1 },
                "min": { "$min": "$carbon_value" },
                "max": { "$max": "$carbon_value" }
            }
        },
    ]
}

fn yearly_pipeline(from: i32, to: i32, company_id: Option<&str>) -> Vec<Document> {
    vec![
        doc! { "$match": by_company(doc! { "year": { "$gte": from, "$lte": to } }, company_id) },
        doc! {
            "$group": {
                "_id": "$year",
                "total": { "$sum": "$carbon_value" },
                "count": { "$sum": 1 }
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

fn month_bucket(d: &Document) -> Option<MonthBucket> {
    Some(MonthBucket {
        month: integer(d.get("_id")?)?,
        total: number(d, "total"),
        count: number(d, "count") as i64,
        average: number(d, "average"),
    })
}

fn year_bucket(d: &Document) -> Option<YearBucket> {
    Some(YearBucket {
        year: integer(d.get("_id")?)?,
        total: number(d, "total"),
        count: number(d, "count") as i64,
    })
}

fn period_stats(d: &Document) -> PeriodStats {
    PeriodStats {
        total: number(d, "total"),
        average: number(d, "average"),
        count: number(d, "count") as i64,
        min: number(d, "min"),
        max: number(d, "max"),
    }
}

/// Distinct year values, newest first. Non-integral values are dropped.
fn years_descending(values: &[Bson]) -> Vec<i32> {
    let mut years: Vec<i32> = values.iter().filter_map(integer).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

#[async_trait]
impl CarbonStore for CarbonRepository {
    async fn insert(&self, record: NewCarbonSubmission) -> AppResult<CarbonSubmission> {
        let id = self.counters.next(COLLECTION).await?;
        let saved = record.with_id(id);
        self.collection.insert_one(CarbonDocument::from(&saved), None).await?;
        Ok(saved)
    }

    async fn insert_many(&self, records: Vec<NewCarbonSubmission>) -> AppResult<Vec<CarbonSubmission>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let first = self.counters.reserve(COLLECTION, records.len() as i64).await?;
        let saved: Vec<CarbonSubmission> = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.with_id(first + i as i64))
            .collect();
        let docs: Vec<CarbonDocument> = saved.iter().map(CarbonDocument::from).collect();

        let options = InsertManyOptions::builder().ordered(true).build();
        if let Err(e) = self.collection.insert_many(docs, options).await {
            // Ordered inserts can stop halfway; take back whatever landed.
            let last = first + saved.len() as i64 - 1;
            let cleanup = self
                .collection
                .delete_many(doc! { "_id": { "$gte": first, "$lte": last } }, None)
                .await;
            if let Err(ce) = cleanup {
                tracing::error!(error = %ce, first, last, "rollback of partial bulk insert failed");
            }
            return Err(e.into());
        }
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<CarbonSubmission>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?.map(Into::into))
    }

    async fn find_page(
        &self,
        filter: &SubmissionFilter,
        skip: u64,
        limit: i64,
    ) -> AppResult<(Vec<CarbonSubmission>, u64)> {
        let mut query = doc! {};
        if let Some(y) = filter.year {
            query.insert("year", y);
        }
        if let Some(m) = filter.month {
            query.insert("month", m);
        }
        let query = by_company(query, filter.company_id.as_deref());

        let total = self.collection.count_documents(query.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(newest_first())
            .skip(skip)
            .limit(limit)
            .build();
        let rows = self.collect(query, options).await?;
        Ok((rows, total))
    }

    async fn recent(&self, company_id: Option<&str>, limit: i64) -> AppResult<Vec<CarbonSubmission>> {
        let options = FindOptions::builder().sort(newest_first()).limit(limit).build();
        self.collect(by_company(doc! {}, company_id), options).await
    }

    async fn replace(&self, record: &CarbonSubmission) -> AppResult<bool> {
        let result = self
            .collection
            .replace_one(doc! { "_id": record.id }, CarbonDocument::from(record), None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn monthly_totals(&self, year: i32, company_id: Option<&str>) -> AppResult<Vec<MonthBucket>> {
        let rows = self.aggregate(monthly_pipeline(year, company_id)).await?;
        Ok(rows.iter().filter_map(month_bucket).collect())
    }

    async fn period_stats(&self, year: i32, company_id: Option<&str>) -> AppResult<PeriodStats> {
        let rows = self.aggregate(stats_pipeline(year, company_id)).await?;
        Ok(rows.first().map(period_stats).unwrap_or_default())
    }

    async fn yearly_totals(
        &self,
        from: i32,
        to: i32,
        company_id: Option<&str>,
    ) -> AppResult<Vec<YearBucket>> {
        let rows = self.aggregate(yearly_pipeline(from, to, company_id)).await?;
        Ok(rows.iter().filter_map(year_bucket).collect())
    }

    async fn available_years(&self, company_id: Option<&str>) -> AppResult<Vec<i32>> {
        let values = self
            .collection
            .distinct("year", by_company(doc! {}, company_id), None)
            .await?;
        Ok(years_descending(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_numbers_decode_from_any_width() {
        let d = doc! { "a": 2.5, "b": 7_i32, "c": 9_i64, "d": Bson::Null };
        assert_eq!(number(&d, "a"), 2.5);
        assert_eq!(number(&d, "b"), 7.0);
        assert_eq!(number(&d, "c"), 9.0);
        assert_eq!(number(&d, "d"), 0.0);
        assert_eq!(number(&d, "missing"), 0.0);
    }

    #[test]
    fn group_keys_must_be_whole_numbers() {
        assert_eq!(integer(&Bson::Int32(3)), Some(3));
        assert_eq!(integer(&Bson::Int64(2024)), Some(2024));
        assert_eq!(integer(&Bson::Double(2023.0)), Some(2023));
        assert_eq!(integer(&Bson::Double(2023.5)), None);
        assert_eq!(integer(&Bson::Int64(i64::MAX)), None);
        assert_eq!(integer(&Bson::Null), None);
        assert_eq!(integer(&Bson::String("2024".into())), None);
    }

    #[test]
    fn monthly_pipeline_groups_by_month_within_year() {
        let p = monthly_pipeline(2024, Some("PT-A"));
        assert_eq!(p.len(), 3);
        assert_eq!(p[0], doc! { "$match": { "year": 2024, "company_id": "PT-A" } });
        assert_eq!(
            p[1],
            doc! {
                "$group": {
                    "_id": "$month",
                    "total": { "$sum": "$carbon_value" },
                    "count": { "$sum": 1 },
                    "average": { "$avg": "$carbon_value" }
                }
            }
        );
        assert_eq!(p[2], doc! { "$sort": { "_id": 1 } });

        let all = monthly_pipeline(2024, None);
        assert_eq!(all[0], doc! { "$match": { "year": 2024 } });
    }

    #[test]
    fn stats_pipeline_collapses_to_one_group() {
        let p = stats_pipeline(2023, None);
        assert_eq!(p.len(), 2);
        assert_eq!(p[0], doc! { "$match": { "year": 2023 } });
        let group = p[1].get_document("$group").unwrap();
        assert_eq!(group.get("_id"), Some(&Bson::Null));
        for (key, op) in [("total", "$sum"), ("average", "$avg"), ("min", "$min"), ("max", "$max")] {
            let mut expected = Document::new();
            expected.insert(op, "$carbon_value");
            assert_eq!(group.get_document(key).unwrap(), &expected);
        }
        assert_eq!(group.get_document("count").unwrap(), &doc! { "$sum": 1 });
    }

    #[test]
    fn yearly_pipeline_matches_inclusive_window() {
        let p = yearly_pipeline(2020, 2024, Some("PT-A"));
        assert_eq!(
            p[0],
            doc! { "$match": { "year": { "$gte": 2020, "$lte": 2024 }, "company_id": "PT-A" } }
        );
        assert_eq!(p[1].get_document("$group").unwrap().get_str("_id").unwrap(), "$year");
        assert_eq!(p[2], doc! { "$sort": { "_id": 1 } });
    }

    #[test]
    fn group_rows_decode_into_buckets() {
        let month = doc! { "_id": 3_i32, "total": 12.5, "count": 2_i32, "average": 6.25 };
        assert_eq!(
            month_bucket(&month),
            Some(MonthBucket { month: 3, total: 12.5, count: 2, average: 6.25 })
        );
        assert_eq!(month_bucket(&doc! { "_id": Bson::Null, "total": 1.0 }), None);

        let year = doc! { "_id": 2022_i64, "total": 4_i64, "count": 1_i32 };
        assert_eq!(year_bucket(&year), Some(YearBucket { year: 2022, total: 4.0, count: 1 }));

        let stats = doc! {
            "_id": Bson::Null, "total": 30.0, "average": 15.0, "count": 2_i32, "min": 10.0, "max": 20_i32
        };
        assert_eq!(
            period_stats(&stats),
            PeriodStats { total: 30.0, average: 15.0, count: 2, min: 10.0, max: 20.0 }
        );
    }

    #[test]
    fn distinct_years_sort_newest_first() {
        let values = vec![
            Bson::Int32(2022),
            Bson::Int64(2024),
            Bson::Double(2023.0),
            Bson::Int32(2024),
            Bson::Double(2021.5),
            Bson::Null,
        ];
        assert_eq!(years_descending(&values), vec![2024, 2023, 2022]);
    }
}

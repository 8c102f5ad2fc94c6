use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::carbon::{
    CarbonSubmission, MonthBucket, NewCarbonSubmission, PeriodStats, SubmissionFilter, YearBucket,
};
use crate::repository::carbon_repo::CarbonStore;

#[derive(Default)]
pub struct MemoryCarbonStore {
    inner: Mutex<Inner>,
    fail_bulk: AtomicBool,
}

#[derive(Default)]
struct Inner {
    seq: i64,
    rows: BTreeMap<i64, CarbonSubmission>,
}

impl MemoryCarbonStore {
    /// Makes every following `insert_many` fail without storing anything.
    pub fn fail_bulk_inserts(&self) {
        self.fail_bulk.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<CarbonSubmission> {
        self.inner.lock().unwrap().rows.values().cloned().collect()
    }

    fn matching(&self, year: Option<i32>, company_id: Option<&str>) -> Vec<CarbonSubmission> {
        self.all()
            .into_iter()
            .filter(|r| year.map_or(true, |y| r.year == y))
            .filter(|r| company_id.map_or(true, |c| r.company_id.as_deref() == Some(c)))
            .collect()
    }
}

fn newest_first(rows: &mut [CarbonSubmission]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl CarbonStore for MemoryCarbonStore {
    async fn insert(&self, record: NewCarbonSubmission) -> AppResult<CarbonSubmission> {
        let mut inner = self.inner.lock().unwrap();
        inner.seq += 1;
        let saved = record.with_id(inner.seq);
        inner.rows.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn insert_many(&self, records: Vec<NewCarbonSubmission>) -> AppResult<Vec<CarbonSubmission>> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(AppError::Internal {
                message: "Bulk insert failed".to_string(),
                detail: "insert_many disabled".to_string(),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let mut saved = Vec::with_capacity(records.len());
        for r in records {
            inner.seq += 1;
            let row = r.with_id(inner.seq);
            inner.rows.insert(row.id, row.clone());
            saved.push(row);
        }
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<CarbonSubmission>> {
        Ok(self.inner.lock().unwrap().rows.get(&id).cloned())
    }

    async fn find_page(
        &self,
        filter: &SubmissionFilter,
        skip: u64,
        limit: i64,
    ) -> AppResult<(Vec<CarbonSubmission>, u64)> {
        let mut rows: Vec<_> = self
            .matching(filter.year, filter.company_id.as_deref())
            .into_iter()
            .filter(|r| filter.month.map_or(true, |m| r.month == m))
            .collect();
        newest_first(&mut rows);
        let total = rows.len() as u64;
        let page = rows.into_iter().skip(skip as usize).take(limit as usize).collect();
        Ok((page, total))
    }

    async fn recent(&self, company_id: Option<&str>, limit: i64) -> AppResult<Vec<CarbonSubmission>> {
        let mut rows = self.matching(None, company_id);
        newest_first(&mut rows);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn replace(&self, record: &CarbonSubmission) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rows.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.inner.lock().unwrap().rows.remove(&id).is_some())
    }

    async fn monthly_totals(&self, year: i32, company_id: Option<&str>) -> AppResult<Vec<MonthBucket>> {
        let mut groups: BTreeMap<i32, (f64, i64)> = BTreeMap::new();
        for r in self.matching(Some(year), company_id) {
            let e = groups.entry(r.month).or_insert((0.0, 0));
            e.0 += r.carbon_value;
            e.1 += 1;
        }
        Ok(groups
            .into_iter()
            .map(|(month, (total, count))| MonthBucket {
                month,
                total,
                count,
                average: total / count as f64,
            })
            .collect())
    }

    async fn period_stats(&self, year: i32, company_id: Option<&str>) -> AppResult<PeriodStats> {
        let values: Vec<f64> = self
            .matching(Some(year), company_id)
            .iter()
            .map(|r| r.carbon_value)
            .collect();
        if values.is_empty() {
            return Ok(PeriodStats::default());
        }
        let total: f64 = values.iter().sum();
        Ok(PeriodStats {
            total,
            average: total / values.len() as f64,
            count: values.len() as i64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    async fn yearly_totals(
        &self,
        from: i32,
        to: i32,
        company_id: Option<&str>,
    ) -> AppResult<Vec<YearBucket>> {
        let mut groups: BTreeMap<i32, (f64, i64)> = BTreeMap::new();
        for r in self.matching(None, company_id) {
            if (from..=to).contains(&r.year) {
                let e = groups.entry(r.year).or_insert((0.0, 0));
                e.0 += r.carbon_value;
                e.1 += 1;
            }
        }
        Ok(groups
            .into_iter()
            .map(|(year, (total, count))| YearBucket { year, total, count })
            .collect())
    }

    async fn available_years(&self, company_id: Option<&str>) -> AppResult<Vec<i32>> {
        let mut years: Vec<i32> = self.matching(None, company_id).iter().map(|r| r.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }
}

//! Persistence of the reporting periods.
//!
//! The scores are not stored: a period keeps the normalized member rows and
//! their training counts, and is scored again when it is read.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashSet;

use crate::aggregate::ScoredPeriod;
use crate::config::*;
use crate::score_member;

/// The upload a period was produced from.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct UploadBatch {
    pub id: u64,
    pub source: String,
    pub training_source: Option<String>,
    /// The dates found in the training report, when they were readable.
    pub training_period: Option<ReportingPeriod>,
}

/// One member of a period, as it is persisted.
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodRow {
    pub record: MemberRecord,
    pub training_count: Option<u32>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct StoredPeriod {
    pub period: ReportingPeriod,
    pub batch: UploadBatch,
    pub rows: Vec<PeriodRow>,
}

impl StoredPeriod {
    pub fn score(&self) -> ScoredPeriod {
        let weeks = self.period.total_weeks();
        let results = self
            .rows
            .iter()
            .map(|r| score_member(&r.record, weeks, r.training_count))
            .collect();
        ScoredPeriod {
            period: self.period,
            results,
        }
    }
}

/// A row that could not be saved, with the reason.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RowFailure {
    /// Position of the row in the batch (0-based).
    pub row: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SaveReport {
    pub batch_id: u64,
    pub saved: usize,
    /// Whether a previous upload of the same period was replaced.
    pub replaced: bool,
    pub failures: Vec<RowFailure>,
}

/// Storage for the reporting periods.
pub trait PeriodRepository {
    /// Replaces all the rows stored for `period` by `rows`.
    ///
    /// Rows that fail validation are reported in the returned [SaveReport] and
    /// skipped; the other rows are written together. If no row is valid, nothing
    /// is written and the previous content of the period is left untouched.
    fn replace_period(
        &mut self,
        period: ReportingPeriod,
        batch: UploadBatch,
        rows: Vec<PeriodRow>,
    ) -> Result<SaveReport, ScoringErrors>;

    /// All the stored periods, in chronological order.
    fn periods(&self) -> Vec<StoredPeriod>;

    /// Returns true if the period existed.
    fn remove_period(&mut self, period: &ReportingPeriod) -> bool;

    /// Removes all the periods and the members they reference.
    fn clear(&mut self);

    /// Removes every period lying entirely between `from` and `to`, and
    /// returns how many were removed.
    fn remove_within(&mut self, from: NaiveDate, to: NaiveDate) -> usize {
        let doomed: Vec<ReportingPeriod> = self
            .periods()
            .iter()
            .map(|p| p.period)
            .filter(|p| p.within(Some(from), Some(to)))
            .collect();
        let removed = doomed.iter().filter(|p| self.remove_period(p)).count();
        info!(
            "remove_within: {} periods removed between {} and {}",
            removed, from, to
        );
        removed
    }
}

/// Splits the rows of a batch between the rows that can be saved and the failures.
pub fn validate_rows(rows: Vec<PeriodRow>) -> (Vec<PeriodRow>, Vec<RowFailure>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut valid: Vec<PeriodRow> = Vec::new();
    let mut failures: Vec<RowFailure> = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        let name = row.record.full_name();
        let key = row.record.name_key();
        let reason = if key.is_empty() {
            Some("missing member name".to_string())
        } else if let Some((col, _)) = row
            .record
            .numeric_fields()
            .iter()
            .find(|(_, v)| !v.is_finite())
        {
            Some(format!("non-finite value in column {}", col))
        } else if seen.contains(&key) {
            Some("duplicate member in batch".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!("validate_rows: row {}: {:?}: {}", idx, name, reason);
                failures.push(RowFailure {
                    row: idx,
                    name,
                    reason,
                });
            }
            None => {
                seen.insert(key);
                valid.push(row);
            }
        }
    }
    (valid, failures)
}

/// Keeps everything in memory. Also the base of the file-backed stores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    periods: Vec<StoredPeriod>,
    /// Display names by member key, in order of first appearance.
    members: Vec<(String, String)>,
    next_batch_id: u64,
}

impl InMemoryRepository {
    pub fn new() -> InMemoryRepository {
        InMemoryRepository::default()
    }

    /// Rebuilds a repository from periods that were stored before.
    pub fn from_periods(periods: Vec<StoredPeriod>) -> InMemoryRepository {
        let mut repo = InMemoryRepository::new();
        for p in periods {
            repo.next_batch_id = repo.next_batch_id.max(p.batch.id);
            repo.register_members(&p.rows);
            repo.periods.retain(|x| x.period != p.period);
            repo.periods.push(p);
        }
        repo.sort();
        repo
    }

    /// The known members as (key, display name) pairs.
    pub fn members(&self) -> &[(String, String)] {
        &self.members
    }

    fn register_members(&mut self, rows: &[PeriodRow]) {
        for r in rows.iter() {
            let key = r.record.name_key();
            if !self.members.iter().any(|(k, _)| *k == key) {
                self.members.push((key, r.record.full_name()));
            }
        }
    }

    fn sort(&mut self) {
        self.periods
            .sort_by_key(|p| (p.period.end(), p.period.start()));
    }
}

impl PeriodRepository for InMemoryRepository {
    fn replace_period(
        &mut self,
        period: ReportingPeriod,
        batch: UploadBatch,
        rows: Vec<PeriodRow>,
    ) -> Result<SaveReport, ScoringErrors> {
        let (valid, failures) = validate_rows(rows);
        if valid.is_empty() {
            warn!(
                "replace_period: no valid rows for {:?}, {} failures",
                period,
                failures.len()
            );
            return Err(ScoringErrors::EmptyBatch);
        }

        let before = self.periods.len();
        self.periods.retain(|p| p.period != period);
        let replaced = self.periods.len() < before;
        if replaced {
            info!("replace_period: replacing the stored rows of {:?}", period);
        }

        self.next_batch_id += 1;
        let batch = UploadBatch {
            id: self.next_batch_id,
            ..batch
        };
        self.register_members(&valid);
        let saved = valid.len();
        debug!(
            "replace_period: batch {:?} saved {} rows, {} failures",
            batch,
            saved,
            failures.len()
        );
        let batch_id = batch.id;
        self.periods.push(StoredPeriod {
            period,
            batch,
            rows: valid,
        });
        self.sort();

        Ok(SaveReport {
            batch_id,
            saved,
            replaced,
            failures,
        })
    }

    fn periods(&self) -> Vec<StoredPeriod> {
        self.periods.clone()
    }

    fn remove_period(&mut self, period: &ReportingPeriod) -> bool {
        let before = self.periods.len();
        self.periods.retain(|p| p.period != *period);
        self.periods.len() < before
    }

    fn clear(&mut self) {
        self.periods.clear();
        self.members.clear();
    }
}

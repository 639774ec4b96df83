pub use crate::config::*;

use std::collections::HashMap;

use crate::aggregate::ScoredPeriod;
use crate::store::PeriodRow;

/// A builder for assembling and scoring one reporting period.
///
/// ```
/// pub use member_scoring::builder::Builder;
/// # use member_scoring::{ReportingPeriod, MemberRecord, ScoringErrors};
/// # use chrono::NaiveDate;
///
/// let period = ReportingPeriod::new(
///     NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
/// )?;
/// let mut builder = Builder::new(period)?.training_counts(&[("Jane Doe".to_string(), 2)])?;
///
/// builder.add_member("Jane", "Doe")?;
///
/// let scored = builder.scored()?;
/// assert_eq!(scored.results[0].rates.training_input, 2);
/// # Ok::<(), ScoringErrors>(())
/// ```
pub struct Builder {
    pub(crate) _period: ReportingPeriod,
    pub(crate) _training: HashMap<String, u32>,
    pub(crate) _records: Vec<MemberRecord>,
}

impl Builder {
    pub fn new(period: ReportingPeriod) -> Result<Builder, ScoringErrors> {
        Ok(Builder {
            _period: period,
            _training: HashMap::new(),
            _records: Vec::new(),
        })
    }

    /// Sets the training counts, as (member name, count) pairs. Names are
    /// normalized; counts for the same member are added.
    pub fn training_counts(self, counts: &[(String, u32)]) -> Result<Builder, ScoringErrors> {
        let mut training: HashMap<String, u32> = HashMap::new();
        for (name, count) in counts {
            *training.entry(normalize_name_key(name)).or_insert(0) += count;
        }
        Ok(Builder {
            _period: self._period,
            _training: training,
            _records: self._records,
        })
    }

    /// Adds a member with all the counters at zero.
    ///
    /// It is the simplest use case, mostly useful for tests.
    pub fn add_member(&mut self, first_name: &str, last_name: &str) -> Result<(), ScoringErrors> {
        self.add_record(&MemberRecord::new(first_name, last_name))
    }

    pub fn add_record(&mut self, record: &MemberRecord) -> Result<(), ScoringErrors> {
        self._records.push(record.clone());
        Ok(())
    }

    pub fn period(&self) -> ReportingPeriod {
        self._period
    }

    /// The rows to persist: each record with the training count reconciled for it.
    pub fn rows(&self) -> Result<Vec<PeriodRow>, ScoringErrors> {
        if self._records.is_empty() {
            return Err(ScoringErrors::EmptyBatch);
        }
        Ok(self
            ._records
            .iter()
            .map(|r| PeriodRow {
                record: r.clone(),
                training_count: self._training.get(&r.name_key()).cloned(),
            })
            .collect())
    }

    /// Scores all the members added so far, best score first.
    pub fn scored(&self) -> Result<ScoredPeriod, ScoringErrors> {
        if self._records.is_empty() {
            return Err(ScoringErrors::EmptyBatch);
        }
        let results = crate::score_records(
            &self._records,
            self._period.total_weeks(),
            Some(&self._training),
        );
        Ok(ScoredPeriod {
            period: self._period,
            results,
        })
    }
}

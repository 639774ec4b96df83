//! Cross-period aggregation: the member x period score matrix, the rankings
//! and the history of a member.
//!
//! Everything here is a pure function of the periods passed in.

use log::debug;
use std::collections::HashMap;

use crate::config::*;

/// The scored members of one reporting period.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoredPeriod {
    pub period: ReportingPeriod,
    pub results: Vec<ScoreResult>,
}

/// Rows that spreadsheets embed as data but that are not members.
pub const DEFAULT_IGNORED_NAMES: [&str; 3] = ["total", "bni", "visitors"];

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregateOptions {
    /// Matched case-insensitively against the full member name.
    pub ignored_names: Vec<String>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            ignored_names: DEFAULT_IGNORED_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AggregateOptions {
    pub fn is_ignored(&self, name: &str) -> bool {
        let key = normalize_name_key(name);
        self.ignored_names
            .iter()
            .any(|n| normalize_name_key(n) == key)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct PeriodColumn {
    pub period: ReportingPeriod,
    pub label: String,
    /// Mean total score of the members present in this period.
    pub average: Option<f64>,
    pub color: Option<Color>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct MatrixRow {
    pub name: String,
    /// One cell per column. None when the member has no data for the period.
    pub cells: Vec<Option<ScoreResult>>,
    /// Sum of the total scores over all the periods, used for the ranking.
    pub sum_score: u32,
}

impl MatrixRow {
    pub fn periods_scored(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Marker for a member that has no row in a period.
pub const NO_DATA: &str = "-";

/// Renders the total score of a cell, or the no-data marker.
pub fn render_cell(cell: &Option<ScoreResult>) -> String {
    match cell {
        Some(res) => res.total_score.to_string(),
        None => NO_DATA.to_string(),
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScoreMatrix {
    pub columns: Vec<PeriodColumn>,
    /// Ranked by decreasing sum of scores.
    pub rows: Vec<MatrixRow>,
}

impl ScoreMatrix {
    pub fn row(&self, name: &str) -> Option<&MatrixRow> {
        let key = normalize_name_key(name);
        self.rows.iter().find(|r| normalize_name_key(&r.name) == key)
    }

    pub fn cell(&self, name: &str, label: &str) -> Option<&ScoreResult> {
        let col = self.columns.iter().position(|c| c.label == label)?;
        self.row(name)?.cells.get(col)?.as_ref()
    }
}

fn chronological(periods: &[ScoredPeriod]) -> Vec<&ScoredPeriod> {
    let mut sorted: Vec<&ScoredPeriod> = periods.iter().collect();
    sorted.sort_by_key(|p| (p.period.end(), p.period.start()));
    sorted
}

/// Builds the member x period matrix.
///
/// Members are identified by their normalized name; the display name is the
/// first one encountered. Members are ranked by the sum of their scores over all
/// the periods, ties keep the order in which the members were first seen.
pub fn aggregate(periods: &[ScoredPeriod], options: &AggregateOptions) -> ScoreMatrix {
    let sorted = chronological(periods);

    let columns: Vec<PeriodColumn> = sorted
        .iter()
        .map(|sp| {
            let scores: Vec<u32> = sp
                .results
                .iter()
                .filter(|r| !options.is_ignored(&r.name))
                .map(|r| r.total_score)
                .collect();
            let average = if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<u32>() as f64 / scores.len() as f64)
            };
            PeriodColumn {
                period: sp.period,
                label: sp.period.label(),
                average,
                color: average.map(Color::from_percent),
            }
        })
        .collect();

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<MatrixRow> = Vec::new();
    for (col, sp) in sorted.iter().enumerate() {
        for res in sp.results.iter() {
            if options.is_ignored(&res.name) {
                debug!("aggregate: skipping ignored row {:?}", res.name);
                continue;
            }
            let key = res.name_key();
            let idx = *index.entry(key).or_insert_with(|| {
                rows.push(MatrixRow {
                    name: res.name.clone(),
                    cells: vec![None; sorted.len()],
                    sum_score: 0,
                });
                rows.len() - 1
            });
            let row = &mut rows[idx];
            // A member listed twice in the same period keeps the first row.
            if row.cells[col].is_none() {
                row.sum_score += res.total_score;
                row.cells[col] = Some(res.clone());
            }
        }
    }

    // Stable: ties stay in first-seen order.
    rows.sort_by(|a, b| b.sum_score.cmp(&a.sum_score));
    debug!(
        "aggregate: {} periods, {} members",
        columns.len(),
        rows.len()
    );
    ScoreMatrix { columns, rows }
}

#[derive(PartialEq, Debug, Clone)]
pub struct RankEntry {
    pub rank: usize,
    pub name: String,
    pub total_score: u32,
    pub color: Color,
}

/// The members of one period ranked by total score, then name.
pub fn period_rankings(period: &ScoredPeriod, options: &AggregateOptions) -> Vec<RankEntry> {
    let mut results: Vec<&ScoreResult> = period
        .results
        .iter()
        .filter(|r| !options.is_ignored(&r.name))
        .collect();
    results.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
        .iter()
        .enumerate()
        .map(|(idx, r)| RankEntry {
            rank: idx + 1,
            name: r.name.clone(),
            total_score: r.total_score,
            color: r.color,
        })
        .collect()
}

#[derive(PartialEq, Debug, Clone)]
pub struct HistoryEntry {
    pub period: ReportingPeriod,
    pub label: String,
    pub result: ScoreResult,
}

/// The scores of one member over time, oldest first. Periods without data for
/// this member are skipped.
pub fn member_history(
    periods: &[ScoredPeriod],
    name: &str,
    options: &AggregateOptions,
) -> Vec<HistoryEntry> {
    if options.is_ignored(name) {
        return Vec::new();
    }
    let key = normalize_name_key(name);
    chronological(periods)
        .iter()
        .filter_map(|sp| {
            sp.results
                .iter()
                .find(|r| r.name_key() == key)
                .map(|r| HistoryEntry {
                    period: sp.period,
                    label: sp.period.label(),
                    result: r.clone(),
                })
        })
        .collect()
}

/// The most recent score of a member, if any.
pub fn latest_snapshot(
    periods: &[ScoredPeriod],
    name: &str,
    options: &AggregateOptions,
) -> Option<HistoryEntry> {
    member_history(periods, name, options).pop()
}

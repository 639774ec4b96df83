// ********* Input data structures ***********

use chrono::NaiveDate;
use std::error::Error;
use std::fmt::Display;

/// Normalizes a member name into the key used for matching across reports.
///
/// The key is trimmed, inner runs of whitespace are collapsed and the result is
/// lower-cased. This is the full extent of the matching logic: "John  Smith" and
/// "john smith" share a key, "Jon Smith" does not.
pub fn normalize_name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

/// One member row of a main report, after normalization.
///
/// All the counters are kept as floating point values since the exports are not
/// consistent about integer cells (TYFCB in particular is a currency value).
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MemberRecord {
    pub first_name: String,
    pub last_name: String,
    /// Present
    pub p: f64,
    /// Absent
    pub a: f64,
    /// Late
    pub l: f64,
    /// Medical
    pub m: f64,
    /// Substitute
    pub s: f64,
    /// Referrals given inside the chapter
    pub rgi: f64,
    /// Referrals given outside the chapter
    pub rgo: f64,
    /// Referrals received inside the chapter
    pub rri: f64,
    /// Referrals received outside the chapter
    pub rro: f64,
    /// Visitors
    pub v: f64,
    pub one_to_one: f64,
    pub tyfcb: f64,
    pub ceu: f64,
    /// Testimonials
    pub t: f64,
}

impl MemberRecord {
    pub fn new(first_name: &str, last_name: &str) -> MemberRecord {
        MemberRecord {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            ..Default::default()
        }
    }

    /// The display name: first and last name joined, case preserved.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn name_key(&self) -> String {
        normalize_name_key(&self.full_name())
    }

    /// The numeric columns, with their canonical header names.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 14] {
        [
            ("P", self.p),
            ("A", self.a),
            ("L", self.l),
            ("M", self.m),
            ("S", self.s),
            ("RGI", self.rgi),
            ("RGO", self.rgo),
            ("RRI", self.rri),
            ("RRO", self.rro),
            ("V", self.v),
            ("1-2-1", self.one_to_one),
            ("TYFCB", self.tyfcb),
            ("CEU", self.ceu),
            ("T", self.t),
        ]
    }
}

/// The window of time covered by one upload.
///
/// Invariant: the end date is never before the start date.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct ReportingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

/// Average number of days in a month, used to express a period in months.
pub const DAYS_PER_MONTH: f64 = 30.44;

impl ReportingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<ReportingPeriod, ScoringErrors> {
        if end < start {
            return Err(ScoringErrors::InvalidPeriod { start, end });
        }
        Ok(ReportingPeriod { start, end })
    }

    /// A period covering a single day.
    pub fn single_day(day: NaiveDate) -> ReportingPeriod {
        ReportingPeriod {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn total_weeks(&self) -> f64 {
        compute_total_weeks(Some(self.start), Some(self.end))
    }

    pub fn total_months(&self) -> f64 {
        compute_total_months(Some(self.start), Some(self.end))
    }

    /// Short human label derived from the end date, for instance "Apr 2025".
    pub fn label(&self) -> String {
        self.end.format("%b %Y").to_string()
    }

    /// True if the period lies entirely between the bounds. A missing bound
    /// does not restrict.
    pub fn within(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
        from.map_or(true, |f| self.start >= f) && to.map_or(true, |t| self.end <= t)
    }
}

/// Number of weeks between two dates, never below 1.
///
/// Missing dates count as a single week.
pub fn compute_total_weeks(from: Option<NaiveDate>, to: Option<NaiveDate>) -> f64 {
    match (from, to) {
        (Some(f), Some(t)) => ((t - f).num_days() as f64 / 7.0).max(1.0),
        _ => 1.0,
    }
}

/// Number of months between two dates, never below 1.
pub fn compute_total_months(from: Option<NaiveDate>, to: Option<NaiveDate>) -> f64 {
    match (from, to) {
        (Some(f), Some(t)) => ((t - f).num_days() as f64 / DAYS_PER_MONTH).max(1.0),
        _ => 1.0,
    }
}

// ******** Output data structures *********

/// Four-level classification shared by the total score and the individual metrics.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Color {
    Green,
    Amber,
    Red,
    Grey,
}

impl Color {
    /// Bands applied to a score out of 100.
    pub fn from_percent(percent: f64) -> Color {
        if percent >= 70.0 {
            Color::Green
        } else if percent >= 50.0 {
            Color::Amber
        } else if percent >= 30.0 {
            Color::Red
        } else {
            Color::Grey
        }
    }

    pub fn from_total(total_score: u32) -> Color {
        Color::from_percent(total_score as f64)
    }

    /// Color of a sub-score relative to the maximum of its metric.
    pub fn from_ratio(score: u32, max_score: u32) -> Color {
        if max_score == 0 {
            return Color::Grey;
        }
        Color::from_percent((score as f64 / max_score as f64) * 100.0)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Amber => "amber",
            Color::Red => "red",
            Color::Grey => "grey",
        }
    }

    /// The color used by the heatmap views.
    pub fn hex(&self) -> &'static str {
        match self {
            Color::Green => "#6cc070",
            Color::Amber => "#f5c542",
            Color::Red => "#e84c3d",
            Color::Grey => "#d3d3d3",
        }
    }
}

/// The seven scored metrics, in presentation order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Metric {
    Referrals,
    Visitors,
    Absenteeism,
    Training,
    Testimonials,
    Tyfcb,
    Punctuality,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Referrals,
        Metric::Visitors,
        Metric::Absenteeism,
        Metric::Training,
        Metric::Testimonials,
        Metric::Tyfcb,
        Metric::Punctuality,
    ];

    pub fn max_score(&self) -> u32 {
        match self {
            Metric::Referrals => 20,
            Metric::Visitors => 20,
            Metric::Absenteeism => 15,
            Metric::Training => 15,
            Metric::Testimonials => 10,
            Metric::Tyfcb => 15,
            Metric::Punctuality => 5,
        }
    }

    /// Stable identifier, used as a key in serialized outputs.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Referrals => "referrals_week",
            Metric::Visitors => "visitors_week",
            Metric::Absenteeism => "absenteeism",
            Metric::Training => "training",
            Metric::Testimonials => "testimonials_week",
            Metric::Tyfcb => "tyfcb",
            Metric::Punctuality => "arrival",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Referrals => "Referrals",
            Metric::Visitors => "Visitors",
            Metric::Absenteeism => "Attendance",
            Metric::Training => "Training",
            Metric::Testimonials => "Testimonials",
            Metric::Tyfcb => "TYFCB",
            Metric::Punctuality => "On Time",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct MetricScore {
    pub metric: Metric,
    pub score: u32,
    pub color: Color,
}

/// The raw values a score was computed from.
#[derive(PartialEq, Debug, Clone)]
pub struct MemberRates {
    pub weeks: f64,
    /// RGI + RGO
    pub referrals: f64,
    pub visitors: f64,
    pub testimonials: f64,
    pub absences: f64,
    pub late: f64,
    pub tyfcb: f64,
    /// CEU from the main report plus the reconciled training count.
    pub training_input: i64,
}

impl MemberRates {
    pub fn referrals_per_week(&self) -> f64 {
        self.referrals / self.weeks
    }

    pub fn visitors_per_week(&self) -> f64 {
        self.visitors / self.weeks
    }

    pub fn testimonials_per_week(&self) -> f64 {
        self.testimonials / self.weeks
    }
}

/// The score of one member for one period.
///
/// This is derived data: it can always be computed again from the member record
/// and the training count.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreResult {
    pub name: String,
    pub metrics: [MetricScore; 7],
    pub total_score: u32,
    pub color: Color,
    pub rates: MemberRates,
}

impl ScoreResult {
    pub fn metric(&self, metric: Metric) -> &MetricScore {
        // The array follows the order of Metric::ALL.
        &self.metrics[metric as usize]
    }

    pub fn name_key(&self) -> String {
        normalize_name_key(&self.name)
    }
}

/// Errors that prevent the scoring or the persistence of a period.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringErrors {
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    EmptyBatch,
}

impl Error for ScoringErrors {}

impl Display for ScoringErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringErrors::InvalidPeriod { start, end } => write!(
                f,
                "invalid reporting period: end date {} is before start date {}",
                end, start
            ),
            ScoringErrors::EmptyBatch => write!(f, "no valid member rows to save"),
        }
    }
}

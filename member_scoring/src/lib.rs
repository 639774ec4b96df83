mod config;
use log::{debug, info};

use std::collections::HashMap;

pub use crate::config::*;

pub mod aggregate;
pub mod builder;
pub mod manual;
pub mod store;
pub mod suggestions;

// ********* Bands **********

/// A step function over a rate or a count.
///
/// The thresholds are lower bounds in increasing order: a value strictly below
/// `thresholds[0]` earns `points[0]`, a value at or above `thresholds[i]` (and
/// below the next one) earns `points[i + 1]`. A value exactly on a threshold
/// always lands in the upper band.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Bands {
    pub thresholds: &'static [f64],
    pub points: &'static [u32],
}

impl Bands {
    pub fn score(&self, value: f64) -> u32 {
        // NaN compares false everywhere and ends up in the lowest band.
        let idx = self.thresholds.iter().take_while(|t| value >= **t).count();
        self.points[idx]
    }

    /// The lower bound of the band just above the one `value` falls in, and the
    /// points it awards. None when the value is already in the top band.
    pub fn next_band(&self, value: f64) -> Option<(f64, u32)> {
        let idx = self.thresholds.iter().take_while(|t| value >= **t).count();
        self.thresholds
            .get(idx)
            .map(|threshold| (*threshold, self.points[idx + 1]))
    }
}

pub const REFERRAL_BANDS: Bands = Bands {
    thresholds: &[0.5, 0.75, 1.0, 1.2],
    points: &[0, 5, 10, 15, 20],
};

pub const VISITOR_BANDS: Bands = Bands {
    thresholds: &[0.1, 0.25, 0.5, 0.75],
    points: &[0, 5, 10, 15, 20],
};

/// Training counts are integers: 0 or less, 1, 2, 3 and more.
pub const TRAINING_BANDS: Bands = Bands {
    thresholds: &[1.0, 2.0, 3.0],
    points: &[0, 5, 10, 15],
};

pub const TYFCB_BANDS: Bands = Bands {
    thresholds: &[500_000.0, 1_000_000.0, 2_000_000.0],
    points: &[0, 5, 10, 15],
};

/// Above zero, testimonials per week below this rate earn the middle band.
pub const TESTIMONIAL_TOP_RATE: f64 = 0.075;

pub fn referral_score(referrals_per_week: f64) -> u32 {
    REFERRAL_BANDS.score(referrals_per_week)
}

pub fn visitor_score(visitors_per_week: f64) -> u32 {
    VISITOR_BANDS.score(visitors_per_week)
}

pub fn absenteeism_score(absences: f64) -> u32 {
    if absences > 2.0 {
        0
    } else if absences == 2.0 {
        5
    } else if absences == 1.0 {
        10
    } else {
        15
    }
}

pub fn training_score(training_input: i64) -> u32 {
    TRAINING_BANDS.score(training_input as f64)
}

pub fn testimonial_score(testimonials_per_week: f64) -> u32 {
    if testimonials_per_week.is_nan() || testimonials_per_week <= 0.0 {
        0
    } else if testimonials_per_week < TESTIMONIAL_TOP_RATE {
        5
    } else {
        10
    }
}

pub fn tyfcb_score(tyfcb: f64) -> u32 {
    TYFCB_BANDS.score(tyfcb)
}

pub fn punctuality_score(late: f64) -> u32 {
    if late == 0.0 {
        5
    } else {
        0
    }
}

// ********* Scoring **********

/// The training input of a member: the CEU column of the main report (whole
/// units only) plus the number of events found in the training report.
pub fn training_input(record: &MemberRecord, training_count: Option<u32>) -> i64 {
    let ceu = if record.ceu.is_finite() {
        record.ceu.trunc() as i64
    } else {
        0
    };
    ceu.saturating_add(training_count.unwrap_or(0) as i64)
}

/// Scores one member for a period of `weeks` weeks.
///
/// Arguments:
/// * `record` the normalized member row
/// * `weeks` the length of the period. Values below 1 (including zero and
/// negative values) are treated as 1.
/// * `training_count` the number of training events reconciled for this member,
/// if any. It is added to the CEU of the main report.
pub fn score_member(record: &MemberRecord, weeks: f64, training_count: Option<u32>) -> ScoreResult {
    let weeks = if weeks.is_finite() && weeks >= 1.0 {
        weeks
    } else {
        1.0
    };

    let rates = MemberRates {
        weeks,
        referrals: record.rgi + record.rgo,
        visitors: record.v,
        testimonials: record.t,
        absences: record.a,
        late: record.l,
        tyfcb: record.tyfcb,
        training_input: training_input(record, training_count),
    };

    let scores: [u32; 7] = [
        referral_score(rates.referrals_per_week()),
        visitor_score(rates.visitors_per_week()),
        absenteeism_score(rates.absences),
        training_score(rates.training_input),
        testimonial_score(rates.testimonials_per_week()),
        tyfcb_score(rates.tyfcb),
        punctuality_score(rates.late),
    ];

    let mut metrics = [MetricScore {
        metric: Metric::Referrals,
        score: 0,
        color: Color::Grey,
    }; 7];
    for (idx, metric) in Metric::ALL.iter().enumerate() {
        metrics[idx] = MetricScore {
            metric: *metric,
            score: scores[idx],
            color: Color::from_ratio(scores[idx], metric.max_score()),
        };
    }

    let total_score: u32 = scores.iter().sum();
    let name = record.full_name();
    debug!(
        "score_member: {:?} weeks: {:.2} scores: {:?} total: {}",
        name, weeks, scores, total_score
    );

    ScoreResult {
        name: if name.is_empty() {
            "Unknown".to_string()
        } else {
            name
        },
        metrics,
        total_score,
        color: Color::from_total(total_score),
        rates,
    }
}

/// Scores all the members of a period.
///
/// The training counts are looked up by normalized name key (see
/// [normalize_name_key]). Members without a match are scored on their CEU alone.
/// The results are sorted by decreasing total score, then by name.
pub fn score_records(
    records: &[MemberRecord],
    weeks: f64,
    training_counts: Option<&HashMap<String, u32>>,
) -> Vec<ScoreResult> {
    info!(
        "Scoring {:?} members over {:.2} weeks, training counts: {:?}",
        records.len(),
        weeks,
        training_counts.map(|tc| tc.len())
    );
    let mut results: Vec<ScoreResult> = records
        .iter()
        .map(|r| {
            let tc = training_counts.and_then(|tc| tc.get(&r.name_key()).cloned());
            score_member(r, weeks, tc)
        })
        .collect();
    results.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn member(first: &str, last: &str) -> MemberRecord {
        MemberRecord::new(first, last)
    }

    #[test]
    fn boundaries_land_in_upper_band() {
        assert_eq!(referral_score(0.49), 0);
        assert_eq!(referral_score(0.5), 5);
        assert_eq!(referral_score(0.74), 5);
        assert_eq!(referral_score(0.75), 10);
        assert_eq!(referral_score(1.0), 15);
        assert_eq!(referral_score(1.19), 15);
        assert_eq!(referral_score(1.2), 20);

        assert_eq!(visitor_score(0.09), 0);
        assert_eq!(visitor_score(0.1), 5);
        assert_eq!(visitor_score(0.25), 10);
        assert_eq!(visitor_score(0.5), 15);
        assert_eq!(visitor_score(0.75), 20);

        assert_eq!(testimonial_score(0.0), 0);
        assert_eq!(testimonial_score(0.01), 5);
        assert_eq!(testimonial_score(0.075), 10);

        assert_eq!(tyfcb_score(499_999.0), 0);
        assert_eq!(tyfcb_score(500_000.0), 5);
        assert_eq!(tyfcb_score(1_000_000.0), 10);
        assert_eq!(tyfcb_score(2_000_000.0), 15);
    }

    #[test]
    fn count_based_bands() {
        assert_eq!(absenteeism_score(0.0), 15);
        assert_eq!(absenteeism_score(1.0), 10);
        assert_eq!(absenteeism_score(2.0), 5);
        assert_eq!(absenteeism_score(3.0), 0);

        assert_eq!(training_score(-1), 0);
        assert_eq!(training_score(0), 0);
        assert_eq!(training_score(1), 5);
        assert_eq!(training_score(2), 10);
        assert_eq!(training_score(3), 15);
        assert_eq!(training_score(12), 15);

        assert_eq!(punctuality_score(0.0), 5);
        assert_eq!(punctuality_score(1.0), 0);
    }

    #[test]
    fn absurd_values_do_not_panic() {
        let mut r = member("Odd", "Values");
        r.rgi = f64::NAN;
        r.v = -4.0;
        r.tyfcb = f64::INFINITY;
        r.ceu = f64::NAN;
        r.a = -1.0;
        let res = score_member(&r, 0.0, None);
        assert_eq!(res.metric(Metric::Referrals).score, 0);
        assert_eq!(res.metric(Metric::Visitors).score, 0);
        assert_eq!(res.metric(Metric::Tyfcb).score, 15);
        assert_eq!(res.metric(Metric::Training).score, 0);
        assert_eq!(res.metric(Metric::Absenteeism).score, 15);
        assert_eq!(res.rates.weeks, 1.0);
    }

    #[test]
    fn april_scenario() {
        let period = ReportingPeriod::new(
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
        )
        .unwrap();
        let mut r = member("Ravi", "Kumar");
        r.rgi = 3.0;
        r.rgo = 2.0;
        r.v = 1.0;
        r.t = 1.0;
        r.tyfcb = 600_000.0;
        r.ceu = 2.0;

        let res = score_member(&r, period.total_weeks(), None);
        assert!((res.rates.weeks - 4.142857).abs() < 1e-3);
        assert_eq!(res.metric(Metric::Referrals).score, 20);
        assert_eq!(res.metric(Metric::Visitors).score, 5);
        assert_eq!(res.metric(Metric::Absenteeism).score, 15);
        assert_eq!(res.metric(Metric::Training).score, 10);
        assert_eq!(res.metric(Metric::Testimonials).score, 10);
        assert_eq!(res.metric(Metric::Tyfcb).score, 5);
        assert_eq!(res.metric(Metric::Punctuality).score, 5);
        assert_eq!(res.total_score, 70);
        assert_eq!(res.color, Color::Green);
        assert_eq!(res.color.label(), "green");
    }

    #[test]
    fn total_is_sum_of_metrics() {
        let mut r = member("Max", "Points");
        r.rgi = 100.0;
        r.v = 100.0;
        r.t = 100.0;
        r.tyfcb = 5_000_000.0;
        r.ceu = 5.0;
        let res = score_member(&r, 4.0, None);
        let sum: u32 = res.metrics.iter().map(|m| m.score).sum();
        assert_eq!(res.total_score, sum);
        assert_eq!(res.total_score, 100);
        assert!(res.metrics.iter().all(|m| m.color == Color::Green));

        let mut low = member("Min", "Points");
        low.a = 5.0;
        low.l = 2.0;
        let res = score_member(&low, 4.0, None);
        assert_eq!(res.total_score, 0);
        assert_eq!(res.color, Color::Grey);
    }

    #[test]
    fn training_counts_add_to_ceu() {
        let mut r = member("Jane", "Doe");
        r.ceu = 1.0;
        let res = score_member(&r, 4.0, Some(2));
        assert_eq!(res.rates.training_input, 3);
        assert_eq!(res.metric(Metric::Training).score, 15);
    }

    #[test]
    fn training_lookup_is_case_insensitive_not_fuzzy() {
        let mut counts: HashMap<String, u32> = HashMap::new();
        counts.insert("jane doe".to_string(), 2);
        counts.insert("jon smith".to_string(), 3);

        let records = vec![member("JANE", "Doe "), member("John", "Smith")];
        let res = score_records(&records, 4.0, Some(&counts));
        let jane = res.iter().find(|r| r.name == "JANE Doe").unwrap();
        assert_eq!(jane.rates.training_input, 2);
        assert_eq!(jane.metric(Metric::Training).score, 10);
        let john = res.iter().find(|r| r.name == "John Smith").unwrap();
        assert_eq!(john.rates.training_input, 0);
    }

    #[test]
    fn results_sorted_by_score_then_name() {
        let mut top = member("Zed", "Top");
        top.rgi = 10.0;
        let records = vec![member("Bob", "B"), top, member("Alice", "A")];
        let res = score_records(&records, 4.0, None);
        let names: Vec<&str> = res.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zed Top", "Alice A", "Bob B"]);
    }

    #[test]
    fn next_band_follows_the_table() {
        assert_eq!(REFERRAL_BANDS.next_band(0.0), Some((0.5, 5)));
        assert_eq!(REFERRAL_BANDS.next_band(0.75), Some((1.0, 15)));
        assert_eq!(REFERRAL_BANDS.next_band(1.2), None);
        assert_eq!(TYFCB_BANDS.next_band(600_000.0), Some((1_000_000.0, 10)));
        assert_eq!(TRAINING_BANDS.next_band(2.0), Some((3.0, 15)));
    }
}

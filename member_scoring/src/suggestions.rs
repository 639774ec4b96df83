//! Coaching suggestions: what a member needs to do to move each metric up
//! by one band.

use crate::config::*;
use crate::{
    REFERRAL_BANDS, TESTIMONIAL_TOP_RATE, TRAINING_BANDS, TYFCB_BANDS, VISITOR_BANDS,
};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Suggestion {
    /// None for the overall message.
    pub metric: Option<Metric>,
    pub category: &'static str,
    pub message: String,
    pub priority: Priority,
}

fn noun(n: u64, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Formats a whole amount with thousands separators: 1400000 -> "1,400,000".
fn group_thousands(amount: f64) -> String {
    let digits = format!("{:.0}", amount.max(0.0).ceil());
    let mut out = String::new();
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Number of additional events needed so that `(count + n) / weeks` reaches
/// `threshold`. At least 1.
///
/// For counts beyond the precision of f64 the estimate is returned as is.
fn additional_needed(count: f64, weeks: f64, threshold: f64) -> u64 {
    let mut n = (threshold * weeks - count).ceil().max(1.0);
    // One step corrects the rounding of the product above.
    if n.is_finite() && count + n != count && (count + n) / weeks < threshold {
        n += 1.0;
    }
    (n as u64).max(1)
}

fn band_priority(score: u32) -> Priority {
    if score < 10 {
        Priority::High
    } else if score < 15 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Generates the suggestions for one scored member.
///
/// One suggestion is produced for every metric below its maximum, stating the
/// exact amount needed to reach the next band. Metrics at their maximum produce
/// nothing. When the total is below 100, an overall message comes first.
pub fn generate_suggestions(result: &ScoreResult) -> Vec<Suggestion> {
    let rates = &result.rates;
    let weeks = rates.weeks;
    let mut res: Vec<Suggestion> = Vec::new();

    let gap = 100u32.saturating_sub(result.total_score);
    if gap > 0 {
        res.push(Suggestion {
            metric: None,
            category: "Overall",
            message: format!(
                "You're at {}/100. Improve the areas below to close the {}-point gap.",
                result.total_score, gap
            ),
            priority: if gap > 30 {
                Priority::High
            } else if gap > 15 {
                Priority::Medium
            } else {
                Priority::Low
            },
        });
    }

    for ms in result.metrics.iter() {
        let max = ms.metric.max_score();
        if ms.score >= max {
            continue;
        }
        let suggestion = match ms.metric {
            Metric::Referrals => REFERRAL_BANDS
                .next_band(rates.referrals_per_week())
                .map(|(threshold, points)| {
                    let n = additional_needed(rates.referrals, weeks, threshold);
                    (
                        format!(
                            "Referrals: give {} more {} this period to reach {}/{}.",
                            n,
                            noun(n, "referral"),
                            points,
                            max
                        ),
                        band_priority(ms.score),
                    )
                }),
            Metric::Visitors => VISITOR_BANDS
                .next_band(rates.visitors_per_week())
                .map(|(threshold, points)| {
                    let n = additional_needed(rates.visitors, weeks, threshold);
                    (
                        format!(
                            "Visitors: invite {} more {} this period to reach {}/{}.",
                            n,
                            noun(n, "visitor"),
                            points,
                            max
                        ),
                        band_priority(ms.score),
                    )
                }),
            Metric::Testimonials => {
                let (n, points) = if ms.score == 0 {
                    // Any testimonial at all moves to the middle band.
                    ((-rates.testimonials).max(0.0).floor() as u64 + 1, 5)
                } else {
                    (
                        additional_needed(rates.testimonials, weeks, TESTIMONIAL_TOP_RATE),
                        max,
                    )
                };
                Some((
                    format!(
                        "Testimonials: give {} more {} this period to reach {}/{}.",
                        n,
                        noun(n, "testimonial"),
                        points,
                        max
                    ),
                    if ms.score < 5 {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                ))
            }
            Metric::Training => TRAINING_BANDS
                .next_band(rates.training_input as f64)
                .map(|(threshold, points)| {
                    let n = (threshold as i64).saturating_sub(rates.training_input).max(1) as u64;
                    (
                        format!(
                            "Training: complete {} more {} to reach {}/{}.",
                            n,
                            noun(n, "training session"),
                            points,
                            max
                        ),
                        if rates.training_input <= 0 {
                            Priority::High
                        } else if rates.training_input < 2 {
                            Priority::Medium
                        } else {
                            Priority::Low
                        },
                    )
                }),
            Metric::Tyfcb => TYFCB_BANDS
                .next_band(rates.tyfcb)
                .map(|(threshold, points)| {
                    (
                        format!(
                            "TYFCB: generate an additional {} in closed business to reach {}/{}.",
                            group_thousands(threshold - rates.tyfcb),
                            points,
                            max
                        ),
                        if rates.tyfcb < 500_000.0 {
                            Priority::High
                        } else if rates.tyfcb < 1_000_000.0 {
                            Priority::Medium
                        } else {
                            Priority::Low
                        },
                    )
                }),
            Metric::Absenteeism => {
                let absences = rates.absences.max(0.0).round() as u64;
                Some((
                    format!(
                        "Attendance: you missed {} {} this period. Attend every meeting of the next period to reach {}/{}.",
                        absences,
                        noun(absences, "meeting"),
                        max,
                        max
                    ),
                    if rates.absences > 2.0 {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                ))
            }
            Metric::Punctuality => Some((
                format!(
                    "On Time: arrive on time at every meeting to secure {}/{}.",
                    max, max
                ),
                Priority::Medium,
            )),
        };
        if let Some((message, priority)) = suggestion {
            res.push(Suggestion {
                metric: Some(ms.metric),
                category: ms.metric.label(),
                message,
                priority,
            });
        }
    }
    res
}

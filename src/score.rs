use serde::{Deserialize, Serialize};

use crate::metrics::MergeRequestMetrics;

/// Weights controlling how much age, size, and discussion move the score.
/// All three must be strictly positive. Omitted weights default to 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub days_threshold: f64,
    pub lines_changed_threshold: f64,
    pub comment_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            days_threshold: 1.0,
            lines_changed_threshold: 1.0,
            comment_threshold: 1.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("days_threshold", self.days_threshold),
            ("lines_changed_threshold", self.lines_changed_threshold),
            ("comment_threshold", self.comment_threshold),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("thresholds.{name} must be a positive number, got {value}"));
            }
        }
        Ok(())
    }
}

/// The two scoring formulas. `Ratio` is the default and is bounded in (0, 1).
///
/// `Legacy` reproduces the dashboard's original percentage score, including
/// its denominator factor that is 1.05 when exactly one line changed and 0
/// otherwise. That factor makes `Legacy` non-monotonic in lines changed
/// around 1 and unbounded above; it is kept for comparison with old runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFormula {
    #[default]
    Ratio,
    Legacy,
}

impl ScoreFormula {
    /// Score a merge request. Age is floored at one day for both formulas.
    pub fn score(&self, metrics: &MergeRequestMetrics, thresholds: &Thresholds) -> f64 {
        let days = metrics.age_days.max(1) as f64;
        let lines = metrics.lines_changed as f64;
        let comments = metrics.comments as f64;

        match self {
            ScoreFormula::Ratio => ratio_score(days, lines, comments, thresholds),
            ScoreFormula::Legacy => legacy_score(days, metrics.lines_changed, comments, thresholds),
        }
    }
}

fn ratio_score(days: f64, lines: f64, comments: f64, th: &Thresholds) -> f64 {
    let numerator = days * th.days_threshold + lines * th.lines_changed_threshold;
    let denominator = numerator + (comments / th.comment_threshold) * 0.1 + 1.0;
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    round_to(numerator / denominator, 4)
}

fn legacy_score(days: f64, lines_changed: u64, comments: f64, th: &Thresholds) -> f64 {
    let factor = if lines_changed == 1 { 1.05 } else { 0.0 };
    let numerator = days * th.days_threshold + lines_changed as f64 * th.lines_changed_threshold;
    let denominator = days * th.days_threshold * factor + comments * th.comment_threshold + 1.0;
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (numerator / denominator * 100.0).floor()
}

/// Round half away from zero on the scaled binary value. At exact decimal
/// ties this can differ in the last place from a half-to-even rounding of
/// the exact decimal value.
fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

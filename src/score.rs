//! Weighted scoring and letter grades.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::rubric::RubricWeights;
use crate::scorecard::Scorecard;

/// Top of the raw rating scale for every criterion.
pub const RATING_SCALE: f64 = 5.0;

/// Reads a rating as a number. Numbers, numeric strings and booleans count;
/// anything else (including NaN and infinities) does not.
pub fn rating_value(value: &Value) -> Option<f64> {
    let rating = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    rating.filter(|r| r.is_finite())
}

/// Composite 0–100 score, rounded to two decimals.
///
/// Missing and non-numeric ratings contribute nothing. Ratings outside
/// `0..=5` are taken as given.
pub fn compute_score(scorecard: &Scorecard, weights: &RubricWeights) -> f64 {
    let total: f64 = weights
        .iter()
        .map(|(criterion, weight)| {
            match scorecard.get(criterion).and_then(rating_value) {
                Some(rating) => rating / RATING_SCALE * f64::from(weight),
                None => 0.0,
            }
        })
        .sum();
    round2(total)
}

fn round2(value: f64) -> f64 {
    unsigned_zero((value * 100.0).round() / 100.0)
}

// -0.0 == 0.0, so this maps both zeros to +0.0
fn unsigned_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn grade_letter(score: f64) -> Grade {
    if score >= 85.0 {
        Grade::A
    } else if score >= 75.0 {
        Grade::BPlus
    } else if score >= 65.0 {
        Grade::B
    } else if score >= 50.0 {
        Grade::C
    } else {
        Grade::F
    }
}

/// Score as shown to people: shortest decimal form, at least one fraction
/// digit (`78.0`, `78.25`).
pub fn format_score(score: f64) -> String {
    let score = unsigned_zero(score);
    if score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        score.to_string()
    }
}

/// The persisted grade text, e.g. `B+, 78.0%`.
pub fn grade_label(grade: Grade, score: f64) -> String {
    format!("{}, {}%", grade, format_score(score))
}

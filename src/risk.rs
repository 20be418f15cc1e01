use serde::Serialize;

use crate::error::{AttendanceError, Result};
use crate::models::StudentSummary;

/// Attendance percentage below which a student is at risk of detention.
pub const DETENTION_THRESHOLD: f64 = 75.0;

/// Below this percentage the risk is shown as critical.
pub const CRITICAL_THRESHOLD: f64 = 60.0;

pub fn is_detained(percent: f64) -> bool {
    percent < DETENTION_THRESHOLD
}

/// Additional consecutive classes, all attended, needed to lift `percent`
/// of `total_classes` up to the detention threshold.
///
/// Solves `(attended + n) / (total + n) = 0.75` with
/// `attended = percent / 100 * total`, which reduces to
/// `n = total * (75 - percent) / 25`. Returns 0 when the student is already
/// at or above the threshold or when the total is unknown.
pub fn needed_classes(percent: f64, total_classes: Option<f64>) -> u64 {
    let Some(total) = total_classes else {
        return 0;
    };
    if !is_detained(percent) || !total.is_finite() || total <= 0.0 {
        return 0;
    }

    let needed = total * (DETENTION_THRESHOLD - percent) / (100.0 - DETENTION_THRESHOLD);
    needed.max(0.0).ceil() as u64
}

/// Needed classes for a computed summary; an unknown class total is an error
/// here rather than a silent zero.
pub fn needed_classes_for(summary: &StudentSummary) -> Result<u64> {
    let total = summary.total_classes.ok_or_else(|| {
        AttendanceError::UndefinedMetric(format!(
            "total classes unknown for roll number '{}'",
            summary.roll_no
        ))
    })?;
    Ok(needed_classes(summary.percent, Some(f64::from(total))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Critical,
    AtRisk,
    Safe,
}

impl RiskBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent < CRITICAL_THRESHOLD {
            RiskBand::Critical
        } else if percent < DETENTION_THRESHOLD {
            RiskBand::AtRisk
        } else {
            RiskBand::Safe
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Critical => "critical",
            RiskBand::AtRisk => "at risk",
            RiskBand::Safe => "safe",
        }
    }
}

/// Fraction of the way to the threshold, capped at 1.0.
pub fn progress_to_goal(percent: f64) -> f64 {
    (percent / DETENTION_THRESHOLD).clamp(0.0, 1.0)
}

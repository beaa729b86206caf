use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{PlanId, PlanItemId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A percentage argument fell outside `[0, 100]`.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("percentage {value} is outside [0, 100]")]
pub struct InvalidRangeError {
    pub value: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    #[error("progress cannot go back from {previous}% to {current}%")]
    NegativeIncrement { previous: f64, current: f64 },

    #[error("item counts ({sum}) do not add up to total items ({total})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("completed items ({completed}) exceed total items ({total})")]
    CompletedExceedsTotal { total: u32, completed: u32 },
}

//
// ─── PERCENT ───────────────────────────────────────────────────────────────────
//

/// A completion percentage in `[0, 100]`.
///
/// The backend sends progress as decimal strings (`"40.00"`) on some
/// endpoints and as numbers on others; both deserialize.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
    pub const ZERO: Percent = Percent(0.0);
    pub const FULL: Percent = Percent(100.0);

    /// # Errors
    ///
    /// Returns `InvalidRangeError` for values outside `[0, 100]` or non-finite input.
    pub fn new(value: f64) -> Result<Self, InvalidRangeError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidRangeError { value })
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 >= 100.0
    }

    #[must_use]
    pub fn tier(self) -> ProgressTier {
        ProgressTier::of(self)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.0}%", self.0)
        } else {
            write!(f, "{:.1}%", self.0)
        }
    }
}

impl TryFrom<f64> for Percent {
    type Error = InvalidRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid percentage: {s}")))?,
        };
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

//
// ─── CALCULATOR ────────────────────────────────────────────────────────────────
//

/// Display tier of a percentage.
///
/// Lower bounds are inclusive, upper bounds exclusive; `100` is its own tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTier {
    Low,
    Mid,
    High,
    Complete,
}

impl ProgressTier {
    /// Bucket a raw percentage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRangeError` when `value` is outside `[0, 100]`.
    pub fn from_percentage(value: f64) -> Result<Self, InvalidRangeError> {
        Percent::new(value).map(Self::of)
    }

    #[must_use]
    pub fn of(percent: Percent) -> Self {
        let value = percent.value();
        if value < 30.0 {
            Self::Low
        } else if value < 70.0 {
            Self::Mid
        } else if value < 100.0 {
            Self::High
        } else {
            Self::Complete
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
            Self::Complete => "complete",
        }
    }
}

/// `completed / total * 100`, or `0` for a plan without items.
///
/// # Errors
///
/// Returns `ProgressError::CompletedExceedsTotal` when `completed > total`.
pub fn overall_percentage(total: u32, completed: u32) -> Result<Percent, ProgressError> {
    if completed > total {
        return Err(ProgressError::CompletedExceedsTotal { total, completed });
    }
    if total == 0 {
        return Ok(Percent::ZERO);
    }
    let value = f64::from(completed) / f64::from(total) * 100.0;
    Ok(Percent::new(value)?)
}

/// Progress gained by one session.
///
/// # Errors
///
/// Returns `ProgressError::InvalidRange` for out-of-range arguments and
/// `ProgressError::NegativeIncrement` when `current < previous`.
pub fn increment(previous: f64, current: f64) -> Result<f64, ProgressError> {
    let previous = Percent::new(previous)?;
    let current = Percent::new(current)?;
    if current < previous {
        return Err(ProgressError::NegativeIncrement {
            previous: previous.value(),
            current: current.value(),
        });
    }
    Ok(current.value() - previous.value())
}

/// Pre-filled current progress for the next session on an item.
#[must_use]
pub fn suggest_next(previous: Percent) -> Percent {
    Percent((previous.value() + 25.0).min(100.0))
}

//
// ─── PLAN SNAPSHOT ─────────────────────────────────────────────────────────────
//

/// Lifecycle state of a plan item as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

/// Aggregate progress over the items of one treatment plan.
///
/// Never stored; always derived from counts so `completed + active + pending == total`
/// and `is_completed() == (overall == 100)` hold by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanProgress {
    plan_id: PlanId,
    total_items: u32,
    completed: u32,
    active: u32,
    pending: u32,
    overall: Percent,
}

impl PlanProgress {
    /// Build a snapshot from item counts.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CountMismatch` if the buckets do not add up to `total_items`.
    pub fn derive(
        plan_id: PlanId,
        total_items: u32,
        completed: u32,
        active: u32,
        pending: u32,
    ) -> Result<Self, ProgressError> {
        let sum = completed
            .saturating_add(active)
            .saturating_add(pending);
        if sum != total_items {
            return Err(ProgressError::CountMismatch {
                total: total_items,
                sum,
            });
        }
        let overall = overall_percentage(total_items, completed)?;
        Ok(Self {
            plan_id,
            total_items,
            completed,
            active,
            pending,
            overall,
        })
    }

    /// Recompute a snapshot from the statuses of a plan's items.
    ///
    /// Cancelled items are not part of the plan's workload and are skipped.
    #[must_use]
    pub fn from_statuses(plan_id: PlanId, statuses: &[ItemStatus]) -> Self {
        let mut completed = 0_u32;
        let mut active = 0_u32;
        let mut pending = 0_u32;
        for status in statuses {
            match status {
                ItemStatus::Completed => completed = completed.saturating_add(1),
                ItemStatus::Active => active = active.saturating_add(1),
                ItemStatus::Pending => pending = pending.saturating_add(1),
                ItemStatus::Cancelled => {}
            }
        }
        let total_items = completed + active + pending;
        let overall = if total_items == 0 {
            Percent::ZERO
        } else {
            Percent(f64::from(completed) / f64::from(total_items) * 100.0)
        };
        Self {
            plan_id,
            total_items,
            completed,
            active,
            pending,
            overall,
        }
    }

    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn active(&self) -> u32 {
        self.active
    }

    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    #[must_use]
    pub fn overall(&self) -> Percent {
        self.overall
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.overall.is_full()
    }

    #[must_use]
    pub fn tier(&self) -> ProgressTier {
        self.overall.tier()
    }
}

/// Progress of a single plan item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProgress {
    pub item_id: PlanItemId,
    /// Progress before the most recent session.
    pub previous: Percent,
    pub current: Percent,
    pub total_sessions: u32,
    pub last_session_date: Option<NaiveDate>,
    pub status: ItemStatus,
    /// Whether the backend allows invoicing the item.
    pub billable: bool,
}

impl ItemProgress {
    #[must_use]
    pub fn increment(&self) -> f64 {
        (self.current.value() - self.previous.value()).max(0.0)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.current.is_full() || self.status == ItemStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_from_counts_matches_scenario() {
        let snapshot = PlanProgress::derive(PlanId::new(1), 10, 6, 2, 2).unwrap();
        assert!((snapshot.overall().value() - 60.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.tier(), ProgressTier::Mid);
        assert!(!snapshot.is_completed());
    }

    #[test]
    fn empty_plan_is_zero_and_not_completed() {
        let snapshot = PlanProgress::derive(PlanId::new(2), 0, 0, 0, 0).unwrap();
        assert_eq!(snapshot.overall(), Percent::ZERO);
        assert!(!snapshot.is_completed());
    }

    #[test]
    fn completion_flag_tracks_full_overall() {
        for total in 1..=12_u32 {
            for completed in 0..=total {
                let snapshot =
                    PlanProgress::derive(PlanId::new(3), total, completed, total - completed, 0)
                        .unwrap();
                let expected = 100.0 * f64::from(completed) / f64::from(total);
                assert!((snapshot.overall().value() - expected).abs() < 1e-9);
                assert_eq!(snapshot.is_completed(), completed == total);
            }
        }
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let err = PlanProgress::derive(PlanId::new(1), 10, 6, 2, 1).unwrap_err();
        assert_eq!(err, ProgressError::CountMismatch { total: 10, sum: 9 });
    }

    #[test]
    fn statuses_skip_cancelled_items() {
        let snapshot = PlanProgress::from_statuses(
            PlanId::new(4),
            &[
                ItemStatus::Completed,
                ItemStatus::Cancelled,
                ItemStatus::Active,
                ItemStatus::Completed,
            ],
        );
        assert_eq!(snapshot.total_items(), 3);
        assert_eq!(snapshot.completed(), 2);
        assert_eq!(
            snapshot.completed() + snapshot.active() + snapshot.pending(),
            snapshot.total_items()
        );
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(ProgressTier::from_percentage(0.0).unwrap(), ProgressTier::Low);
        assert_eq!(ProgressTier::from_percentage(29.99).unwrap(), ProgressTier::Low);
        assert_eq!(ProgressTier::from_percentage(30.0).unwrap(), ProgressTier::Mid);
        assert_eq!(ProgressTier::from_percentage(69.9).unwrap(), ProgressTier::Mid);
        assert_eq!(ProgressTier::from_percentage(70.0).unwrap(), ProgressTier::High);
        assert_eq!(ProgressTier::from_percentage(99.99).unwrap(), ProgressTier::High);
        assert_eq!(
            ProgressTier::from_percentage(100.0).unwrap(),
            ProgressTier::Complete
        );
    }

    #[test]
    fn out_of_range_percentages_fail() {
        assert!(ProgressTier::from_percentage(-0.5).is_err());
        assert!(ProgressTier::from_percentage(100.5).is_err());
        assert!(ProgressTier::from_percentage(f64::NAN).is_err());
        assert!(matches!(
            increment(10.0, 120.0),
            Err(ProgressError::InvalidRange(_))
        ));
    }

    #[test]
    fn increment_is_non_negative() {
        assert!((increment(40.0, 65.0).unwrap() - 25.0).abs() < f64::EPSILON);
        assert!(matches!(
            increment(40.0, 30.0),
            Err(ProgressError::NegativeIncrement { .. })
        ));
    }

    #[test]
    fn suggestion_caps_at_full() {
        assert_eq!(suggest_next(Percent::new(50.0).unwrap()).value(), 75.0);
        assert_eq!(suggest_next(Percent::new(90.0).unwrap()), Percent::FULL);
    }

    #[test]
    fn percent_accepts_decimal_strings() {
        let p: Percent = serde_json::from_str("\"40.00\"").unwrap();
        assert_eq!(p.value(), 40.0);
        let p: Percent = serde_json::from_str("72.5").unwrap();
        assert_eq!(p.to_string(), "72.5%");
        assert!(serde_json::from_str::<Percent>("\"140\"").is_err());
    }
}

//! SLA urgency classification.
//!
//! Pure function of (due time, now). The engine recomputes it on a
//! ticking cadence so a record crosses from due-soon to overdue purely
//! as time passes, with no new data.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window below which a pending escalation counts as urgent.
pub const URGENT_WINDOW: Duration = Duration::hours(2);

/// Window below which a pending escalation counts as due-soon.
pub const DUE_SOON_WINDOW: Duration = Duration::hours(24);

/// Urgency bucket derived from the gap between now and the due time.
///
/// Ordered from most to least urgent so it can be sorted on directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SlaState {
    Overdue,
    Urgent,
    DueSoon,
    OnTrack,
}

impl fmt::Display for SlaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overdue => write!(f, "overdue"),
            Self::Urgent => write!(f, "urgent"),
            Self::DueSoon => write!(f, "due-soon"),
            Self::OnTrack => write!(f, "on-track"),
        }
    }
}

/// Classify an escalation's urgency at a given instant.
#[must_use]
pub fn classify(due_at: DateTime<Utc>, now: DateTime<Utc>) -> SlaState {
    if now >= due_at {
        return SlaState::Overdue;
    }
    let remaining = due_at - now;
    if remaining < URGENT_WINDOW {
        SlaState::Urgent
    } else if remaining < DUE_SOON_WINDOW {
        SlaState::DueSoon
    } else {
        SlaState::OnTrack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn due_in_one_hour_is_urgent() {
        assert_eq!(classify(now() + Duration::hours(1), now()), SlaState::Urgent);
    }

    #[test]
    fn past_due_is_overdue() {
        assert_eq!(
            classify(now() - Duration::minutes(1), now()),
            SlaState::Overdue
        );
    }

    #[test]
    fn exactly_due_is_overdue() {
        assert_eq!(classify(now(), now()), SlaState::Overdue);
    }

    #[test]
    fn window_boundaries() {
        // Exactly 2h out is due-soon, not urgent (strict inequality).
        assert_eq!(classify(now() + Duration::hours(2), now()), SlaState::DueSoon);
        assert_eq!(
            classify(now() + Duration::hours(2) - Duration::seconds(1), now()),
            SlaState::Urgent
        );
        // Exactly 24h out is on-track.
        assert_eq!(classify(now() + Duration::hours(24), now()), SlaState::OnTrack);
        assert_eq!(
            classify(now() + Duration::hours(24) - Duration::seconds(1), now()),
            SlaState::DueSoon
        );
    }

    #[test]
    fn same_inputs_same_output() {
        let due = now() + Duration::hours(5);
        assert_eq!(classify(due, now()), classify(due, now()));
    }

    #[test]
    fn urgency_crosses_buckets_as_time_passes() {
        let due = now() + Duration::hours(3);
        assert_eq!(classify(due, now()), SlaState::DueSoon);
        assert_eq!(classify(due, now() + Duration::hours(2)), SlaState::Urgent);
        assert_eq!(classify(due, now() + Duration::hours(4)), SlaState::Overdue);
    }

    #[test]
    fn sla_state_orders_most_urgent_first() {
        assert!(SlaState::Overdue < SlaState::Urgent);
        assert!(SlaState::Urgent < SlaState::DueSoon);
        assert!(SlaState::DueSoon < SlaState::OnTrack);
    }
}

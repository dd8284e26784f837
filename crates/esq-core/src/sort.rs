//! Queue ordering.
//!
//! Derives a total order over escalation records for presentation.
//! Ties on the primary key are always broken by id ascending,
//! regardless of direction, so re-renders never flicker.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::EscalationRecord;

/// Field the queue is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    Priority,
    Status,
    #[default]
    SlaDueAt,
    Team,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatedAt => write!(f, "created_at"),
            Self::Priority => write!(f, "priority"),
            Self::Status => write!(f, "status"),
            Self::SlaDueAt => write!(f, "sla_due_at"),
            Self::Team => write!(f, "team"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// A user-chosen sort: field plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

fn compare_primary(a: &EscalationRecord, b: &EscalationRecord, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::Status => a.status.rank().cmp(&b.status.rank()),
        SortField::SlaDueAt => a.sla_due_at.cmp(&b.sla_due_at),
        SortField::Team => {
            let team_a = a.team.as_ref().map(|t| t.name.as_str());
            let team_b = b.team.as_ref().map(|t| t.name.as_str());
            team_a.cmp(&team_b)
        }
    }
}

/// Order records in place by the given spec.
///
/// The id tie-break is applied after direction, so equal primary keys
/// always come out id-ascending.
pub fn sort_queue(records: &mut [EscalationRecord], spec: SortSpec) {
    records.sort_by(|a, b| {
        spec.direction
            .apply(compare_primary(a, b, spec.field))
            .then_with(|| a.id.cmp(&b.id))
    });
}

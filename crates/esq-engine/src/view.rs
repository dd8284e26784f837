//! Read-only queue views.
//!
//! A view is an immutable projection of the store: every record
//! annotated with its SLA state, sorted per the active ordering. Views
//! are rebuilt whole on any input and published over a watch channel,
//! so consumers never observe a half-merged queue.

use chrono::{DateTime, Utc};
use serde::Serialize;

use esq_core::{EscalationRecord, SlaState, SortSpec, classify, sort_queue};

/// One queue row: the record plus its derived SLA state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub record: EscalationRecord,
    pub sla: SlaState,
}

/// An immutable, sorted, SLA-annotated projection of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueView {
    pub items: Vec<QueueItem>,
    pub sort: SortSpec,
    pub generated_at: DateTime<Utc>,
}

impl QueueView {
    /// An empty view, used before the first snapshot lands.
    #[must_use]
    pub fn empty(sort: SortSpec, now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            sort,
            generated_at: now,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rows at or past their SLA deadline.
    #[must_use]
    pub fn overdue_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.sla == SlaState::Overdue)
            .count()
    }
}

/// Sort the records and classify each against `now`.
#[must_use]
pub fn build_view(
    mut records: Vec<EscalationRecord>,
    sort: SortSpec,
    now: DateTime<Utc>,
) -> QueueView {
    sort_queue(&mut records, sort);
    let items = records
        .into_iter()
        .map(|record| {
            let sla = classify(record.sla_due_at, now);
            QueueItem { record, sla }
        })
        .collect();
    QueueView {
        items,
        sort,
        generated_at: now,
    }
}

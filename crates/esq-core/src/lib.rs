//! Domain model and pure logic for the escalation sync engine.
//!
//! Everything in this crate is synchronous and deterministic: record
//! types, revision comparison, SLA classification, and queue ordering.
//! Time enters only through the [`Clock`] trait so every consumer can
//! be tested against a manual clock.

pub mod clock;
pub mod record;
pub mod sla;
pub mod sort;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{
    ConnectionState, EscalationDelta, EscalationId, EscalationRecord, EscalationStatus, EventKind,
    Priority, QueueEvent, Revision, Snapshot, TeamRef,
};
pub use sla::{SlaState, classify};
pub use sort::{SortDirection, SortField, SortSpec, sort_queue};

//! Reconciliation store: the single source of truth for the
//! escalation queue.
//!
//! Two independent feeds converge here: periodic full snapshots and
//! discrete push-channel events. Each record is kept as a baseline
//! (from the latest snapshot or a stand-alone event) plus an overlay
//! of newer event deltas, folded in revision order. Because the fold
//! is ordered by revision marker and never by arrival, any
//! interleaving or replay of the same inputs converges to the same
//! final state. Partial events for ids with no baseline yet are held
//! aside and folded in when the baseline arrives.
//!
//! The store is exclusively owned by whoever drives it (one engine
//! task); readers only ever see cloned, immutable views.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use esq_core::{
    EscalationDelta, EscalationId, EscalationRecord, EscalationStatus, EventKind, QueueEvent,
    Revision, Snapshot,
};

/// Store policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Consecutive snapshot misses a non-terminal record survives
    /// before removal. The default (2) removes on the second miss.
    pub snapshot_miss_allowance: u32,
    /// How long a terminal record stays visible. `None` retains it for
    /// the rest of the session.
    pub terminal_grace: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_miss_allowance: 2,
            terminal_grace: None,
        }
    }
}

/// One mutation input: everything upstream funnels through here.
#[derive(Debug, Clone)]
pub enum StoreInput {
    /// Full baseline from the snapshot fetcher (or a post-reconnect
    /// resync, which is treated identically).
    Snapshot(Snapshot),
    /// Discrete create/update/resolve event from the push channel.
    Event(QueueEvent),
}

/// What a single event application did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// New record inserted.
    Inserted,
    /// Existing record overwritten or patched.
    Updated,
    /// Record marked terminal.
    Resolved,
    /// Revision at or below the baseline, or already seen; dropped.
    /// Expected under concurrent channels, not an error.
    StaleRejected,
    /// A non-create event tried to reopen a terminal record; it is
    /// retained for ordering but has no effect on the record.
    ResurrectionRejected,
    /// Partial payload for an id with no baseline yet; held and
    /// folded in once a create or snapshot supplies the base fields.
    Deferred,
}

/// What a snapshot application did, per merge rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub inserted: usize,
    pub overwritten: usize,
    pub kept_newer: usize,
    pub flagged_missing: usize,
    pub removed_missing: usize,
    pub removed_terminal: usize,
}

/// Result of one `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Snapshot(SnapshotSummary),
    Event(EventOutcome),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    /// Full record from the latest adopted snapshot or the stand-alone
    /// event that introduced the id.
    base: EscalationRecord,
    /// Accepted event deltas strictly newer than the baseline.
    overlays: BTreeMap<Revision, (EventKind, EscalationDelta)>,
    /// Baseline plus overlays, folded in revision order.
    record: EscalationRecord,
    /// Consecutive snapshots this record was absent from.
    missed_snapshots: u32,
    /// When the record first went terminal, for grace eviction.
    terminal_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn new(base: EscalationRecord, now: DateTime<Utc>) -> Self {
        let terminal_at = base.status.is_terminal().then_some(now);
        Self {
            record: base.clone(),
            base,
            overlays: BTreeMap::new(),
            missed_snapshots: 0,
            terminal_at,
        }
    }

    /// Adopt a new baseline; overlays it already accounts for are
    /// dropped, the rest stay on top.
    fn rebase(&mut self, base: EscalationRecord, now: DateTime<Utc>) {
        self.overlays
            .retain(|revision, _| revision.is_newer_than(base.revision));
        self.base = base;
        self.refold(now, None);
    }

    /// Recompute the materialized record by folding the overlays onto
    /// the baseline in revision order. Returns whether `target` had
    /// any effect (an update trying to reopen a terminal record does
    /// not).
    fn refold(&mut self, now: DateTime<Utc>, target: Option<Revision>) -> bool {
        let mut record = self.base.clone();
        let mut target_applied = target.is_none();

        for (&revision, (kind, delta)) in &self.overlays {
            let applied = match kind {
                EventKind::Create => {
                    // A fresh create may legitimately reopen a closed
                    // id; an incomplete one degrades to a patch.
                    match delta.clone().into_record(record.id.clone(), revision) {
                        Some(full) => record = full,
                        None => record.apply_delta(delta, revision),
                    }
                    true
                }
                EventKind::Update => {
                    let reopens = record.status.is_terminal()
                        && delta.status.is_some_and(|status| !status.is_terminal());
                    if reopens {
                        false
                    } else {
                        record.apply_delta(delta, revision);
                        true
                    }
                }
                EventKind::Resolve => {
                    record.apply_delta(delta, revision);
                    if !record.status.is_terminal() {
                        record.status = EscalationStatus::Resolved;
                    }
                    true
                }
            };
            if target == Some(revision) {
                target_applied = applied;
            }
        }

        self.record = record;
        self.note_status(now);
        target_applied
    }

    fn note_status(&mut self, now: DateTime<Utc>) {
        if self.record.status.is_terminal() {
            if self.terminal_at.is_none() {
                self.terminal_at = Some(now);
            }
        } else {
            self.terminal_at = None;
        }
    }
}

/// Events held for an id that has no baseline yet.
#[derive(Debug, Default)]
struct PendingEvents {
    events: BTreeMap<Revision, (EventKind, EscalationDelta)>,
    missed_snapshots: u32,
}

/// De-duplicated collection of escalation records keyed by id.
#[derive(Debug, Default)]
pub struct ReconcileStore {
    config: StoreConfig,
    entries: BTreeMap<EscalationId, StoredEntry>,
    pending: BTreeMap<EscalationId, PendingEvents>,
    stale_rejected: u64,
    dropped_incomplete: u64,
}

impl ReconcileStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            pending: BTreeMap::new(),
            stale_rejected: 0,
            dropped_incomplete: 0,
        }
    }

    /// Apply one input from either feed. `now` comes from the caller's
    /// clock; the store never reads wall time itself.
    pub fn apply(&mut self, input: StoreInput, now: DateTime<Utc>) -> Applied {
        match input {
            StoreInput::Snapshot(snapshot) => Applied::Snapshot(self.apply_snapshot(snapshot, now)),
            StoreInput::Event(event) => Applied::Event(self.apply_event(event, now)),
        }
    }

    /// Merge a full snapshot as the baseline.
    fn apply_snapshot(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> SnapshotSummary {
        let mut summary = SnapshotSummary::default();
        let mut seen: BTreeSet<EscalationId> = BTreeSet::new();

        for incoming in snapshot.records {
            seen.insert(incoming.id.clone());
            if let Some(entry) = self.entries.get_mut(&incoming.id) {
                entry.missed_snapshots = 0;
                if entry.record.revision.is_newer_than(incoming.revision) {
                    summary.kept_newer += 1;
                    // Newer events stay on top, but the baseline still
                    // advances so later folds agree on what it is.
                    if !entry.base.revision.is_newer_than(incoming.revision) {
                        entry.rebase(incoming, now);
                    }
                } else {
                    // Equal revisions defer to the snapshot: it is the
                    // correctness baseline.
                    entry.rebase(incoming, now);
                    summary.overwritten += 1;
                }
            } else {
                self.insert_base(incoming, now);
                summary.inserted += 1;
            }
        }

        // Records the snapshot did not mention: terminal ones go now,
        // non-terminal ones survive a bounded number of misses so an
        // eventually-consistent snapshot window cannot drop live work.
        let allowance = self.config.snapshot_miss_allowance;
        self.entries.retain(|id, entry| {
            if seen.contains(id) {
                return true;
            }
            if entry.record.status.is_terminal() {
                summary.removed_terminal += 1;
                return false;
            }
            entry.missed_snapshots += 1;
            if entry.missed_snapshots >= allowance {
                debug!(id = %id, misses = entry.missed_snapshots, "removing after repeated snapshot misses");
                summary.removed_missing += 1;
                false
            } else {
                summary.flagged_missing += 1;
                true
            }
        });

        // Held partial events get the same bounded patience: if no
        // snapshot ever supplies their baseline, they are noise.
        let mut discarded = 0u64;
        self.pending.retain(|id, held| {
            held.missed_snapshots += 1;
            if held.missed_snapshots >= allowance {
                debug!(id = %id, "discarding held events after repeated snapshot misses");
                discarded += held.events.len() as u64;
                false
            } else {
                true
            }
        });
        self.dropped_incomplete += discarded;

        self.evict_expired_terminal(now);
        summary
    }

    /// Apply one push-channel event.
    fn apply_event(&mut self, event: QueueEvent, now: DateTime<Utc>) -> EventOutcome {
        let outcome = self.fold_in(event, now);
        if matches!(
            outcome,
            EventOutcome::StaleRejected | EventOutcome::ResurrectionRejected
        ) {
            self.stale_rejected += 1;
        }
        self.evict_expired_terminal(now);
        outcome
    }

    fn fold_in(&mut self, event: QueueEvent, now: DateTime<Utc>) -> EventOutcome {
        let QueueEvent {
            kind,
            id,
            payload,
            revision,
        } = event;

        if let Some(entry) = self.entries.get_mut(&id) {
            if !revision.is_newer_than(entry.base.revision)
                || entry.overlays.contains_key(&revision)
            {
                return EventOutcome::StaleRejected;
            }
            entry.overlays.insert(revision, (kind, payload));
            entry.missed_snapshots = 0;
            let applied = entry.refold(now, Some(revision));
            if !applied {
                warn!(id = %id, revision = %revision, "update may not reopen a terminal record");
                return EventOutcome::ResurrectionRejected;
            }
            return match kind {
                EventKind::Resolve => EventOutcome::Resolved,
                EventKind::Create | EventKind::Update => EventOutcome::Updated,
            };
        }

        // No baseline yet. A payload complete enough to stand alone
        // becomes one; anything partial is held until the create or a
        // snapshot arrives, so arrival order cannot lose it.
        match kind {
            EventKind::Create | EventKind::Update => {
                match payload.clone().into_record(id.clone(), revision) {
                    Some(record) => {
                        self.insert_base(record, now);
                        EventOutcome::Inserted
                    }
                    None => self.defer(QueueEvent {
                        kind,
                        id,
                        payload,
                        revision,
                    }),
                }
            }
            EventKind::Resolve => {
                let mut base = payload.clone();
                if !base.status.is_some_and(EscalationStatus::is_terminal) {
                    base.status = Some(EscalationStatus::Resolved);
                }
                match base.into_record(id.clone(), revision) {
                    Some(record) => {
                        self.insert_base(record, now);
                        EventOutcome::Resolved
                    }
                    None => self.defer(QueueEvent {
                        kind,
                        id,
                        payload,
                        revision,
                    }),
                }
            }
        }
    }

    /// Install a baseline record, folding in any events held for its
    /// id.
    fn insert_base(&mut self, record: EscalationRecord, now: DateTime<Utc>) {
        let id = record.id.clone();
        let mut entry = StoredEntry::new(record, now);
        if let Some(held) = self.pending.remove(&id) {
            for (revision, (kind, delta)) in held.events {
                if revision.is_newer_than(entry.base.revision) {
                    entry.overlays.insert(revision, (kind, delta));
                } else {
                    self.stale_rejected += 1;
                }
            }
            entry.refold(now, None);
        }
        self.entries.insert(id, entry);
    }

    fn defer(&mut self, event: QueueEvent) -> EventOutcome {
        debug!(id = %event.id, revision = %event.revision, "holding partial event until a baseline arrives");
        self.pending
            .entry(event.id)
            .or_default()
            .events
            .insert(event.revision, (event.kind, event.payload));
        EventOutcome::Deferred
    }

    /// Drop terminal records older than the configured grace window.
    fn evict_expired_terminal(&mut self, now: DateTime<Utc>) {
        let Some(grace) = self.config.terminal_grace else {
            return;
        };
        self.entries.retain(|_, entry| {
            entry
                .terminal_at
                .is_none_or(|terminal_at| now - terminal_at < grace)
        });
    }

    /// Run time-based eviction without new data (called on ticks).
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.evict_expired_terminal(now);
    }

    /// Read-only clone of the current record set, id-ordered.
    #[must_use]
    pub fn records(&self) -> Vec<EscalationRecord> {
        self.entries.values().map(|e| e.record.clone()).collect()
    }

    /// Look up one record.
    #[must_use]
    pub fn get(&self, id: &EscalationId) -> Option<&EscalationRecord> {
        self.entries.get(id).map(|e| &e.record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes rejected for sitting at or below the baseline, or for
    /// being exact replays.
    #[must_use]
    pub const fn stale_rejected(&self) -> u64 {
        self.stale_rejected
    }

    /// Held partial events discarded because their baseline never
    /// arrived.
    #[must_use]
    pub const fn dropped_incomplete(&self) -> u64 {
        self.dropped_incomplete
    }
}

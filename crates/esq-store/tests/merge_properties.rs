//! Order-independence of the reconciliation merge.
//!
//! Both feed channels deliver views of the same per-record history;
//! the store must converge to the same final state no matter how
//! deliveries interleave or replay, relying only on revision
//! comparison.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use esq_core::{
    EscalationDelta, EscalationRecord, EscalationStatus, EventKind, Priority, QueueEvent, Revision,
    Snapshot,
};
use esq_store::{ReconcileStore, StoreConfig, StoreInput};

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Per-id event history: one create, a few updates, optionally a
/// resolve carrying the highest revision (resolution is the last
/// thing that happens to a record upstream).
fn history(id: &str, base: u64, updates: usize, resolved: bool) -> Vec<QueueEvent> {
    let mut events = vec![QueueEvent {
        kind: EventKind::Create,
        id: id.into(),
        payload: EscalationDelta {
            created_at: Some(t0()),
            sla_due_at: Some(t0() + Duration::hours(6)),
            priority: Some(Priority::Medium),
            status: Some(EscalationStatus::Open),
            subject: Some(format!("case {id}")),
            ..Default::default()
        },
        revision: Revision(base),
    }];

    for step in 0..updates {
        let priority = match step % 3 {
            0 => Priority::High,
            1 => Priority::Critical,
            _ => Priority::Low,
        };
        events.push(QueueEvent {
            kind: EventKind::Update,
            id: id.into(),
            payload: EscalationDelta {
                priority: Some(priority),
                status: Some(EscalationStatus::InProgress),
                ..Default::default()
            },
            revision: Revision(base + step as u64 + 1),
        });
    }

    if resolved {
        events.push(QueueEvent {
            kind: EventKind::Resolve,
            id: id.into(),
            payload: EscalationDelta::default(),
            revision: Revision(base + updates as u64 + 1),
        });
    }

    events
}

/// The record each id's history converges to, derived by in-order
/// replay.
fn expected_records(histories: &[Vec<QueueEvent>]) -> Vec<EscalationRecord> {
    let mut store = ReconcileStore::new(StoreConfig::default());
    for events in histories {
        for event in events {
            store.apply(StoreInput::Event(event.clone()), t0());
        }
    }
    store.records()
}

fn apply_all(inputs: &[StoreInput]) -> Vec<EscalationRecord> {
    let mut store = ReconcileStore::new(StoreConfig::default());
    for input in inputs {
        store.apply(input.clone(), t0());
    }
    store.records()
}

proptest! {
    #[test]
    fn shuffled_event_delivery_converges(
        updates_a in 0usize..4,
        updates_b in 0usize..4,
        updates_c in 0usize..4,
        resolved_a in any::<bool>(),
        resolved_b in any::<bool>(),
        swaps in prop::collection::vec(any::<usize>(), 0..48),
    ) {
        // Distinct revision ranges per id keep markers globally unique.
        let histories = vec![
            history("esc-a", 100, updates_a, resolved_a),
            history("esc-b", 200, updates_b, resolved_b),
            history("esc-c", 300, updates_c, false),
        ];
        let expected = expected_records(&histories);

        let mut inputs: Vec<StoreInput> = histories
            .iter()
            .flatten()
            .cloned()
            .map(StoreInput::Event)
            .collect();
        // Replay half the events a second time: duplicates must be
        // harmless.
        let replays: Vec<StoreInput> = inputs.iter().step_by(2).cloned().collect();
        inputs.extend(replays);

        // Deterministic shuffle driven by the generated swap indices.
        let len = inputs.len();
        for (i, swap) in swaps.iter().enumerate() {
            inputs.swap(i % len, swap % len);
        }

        let got = apply_all(&inputs);
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn snapshot_and_events_converge_regardless_of_position(
        snapshot_position in 0usize..8,
        updates_a in 0usize..3,
        resolved_a in any::<bool>(),
    ) {
        let histories = vec![
            history("esc-a", 100, updates_a, resolved_a),
            history("esc-b", 200, 1, false),
        ];
        let expected = expected_records(&histories);

        // Snapshot reflecting every record at its final revision.
        let snapshot = Snapshot::new(expected.clone(), t0());

        let mut inputs: Vec<StoreInput> = histories
            .iter()
            .flatten()
            .cloned()
            .map(StoreInput::Event)
            .collect();
        let position = snapshot_position.min(inputs.len());
        inputs.insert(position, StoreInput::Snapshot(snapshot));

        let got = apply_all(&inputs);
        prop_assert_eq!(got, expected);
    }
}

#[test]
fn two_instances_fed_identical_sequences_agree() {
    let histories = vec![
        history("esc-a", 10, 2, true),
        history("esc-b", 50, 0, false),
    ];
    let inputs: Vec<StoreInput> = histories
        .iter()
        .flatten()
        .cloned()
        .map(StoreInput::Event)
        .collect();

    let first = apply_all(&inputs);
    let second = apply_all(&inputs);
    assert_eq!(first, second);
}

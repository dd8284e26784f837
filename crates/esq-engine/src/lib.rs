//! Live synchronization engine for the escalation queue.
//!
//! One spawned task owns the reconciliation store and funnels every
//! input through a single `select!` loop: periodic snapshot fetches,
//! push-channel signals, SLA reclassification ticks, and consumer
//! commands. The loop never blocks on I/O while holding the store in
//! an intermediate state; each input is applied whole and a fresh
//! [`QueueView`] is published before the next is taken.

pub mod config;
pub mod view;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use esq_api::{EscalationActions, SnapshotSource};
use esq_core::{Clock, ConnectionState, EscalationId, SortSpec};
use esq_store::{Applied, ReconcileStore, StoreInput};
use esq_stream::{ChannelHandle, ChannelSignal};

pub use config::{ConfigError, EngineConfig};
pub use view::{QueueItem, QueueView, build_view};

/// Consumer requests, funneled into the engine loop.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Fetch a snapshot now, outside the periodic cadence.
    Refresh,
    /// Change the queue ordering and republish.
    SetSort(SortSpec),
    /// Approve an escalation, then refresh.
    Approve(EscalationId),
    /// Reject an escalation, then refresh.
    Reject(EscalationId),
}

/// Consumer-side handle to a running engine.
pub struct EngineHandle {
    /// Latest published view; changes on every applied input.
    pub queue: watch::Receiver<QueueView>,
    /// Push-channel connectivity, for the status badge.
    pub connection: watch::Receiver<ConnectionState>,
    commands: mpsc::Sender<EngineCommand>,
    shutdown: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl EngineHandle {
    /// Send a command to the engine loop.
    ///
    /// # Errors
    /// Fails if the engine task has already stopped.
    pub async fn send(
        &self,
        command: EngineCommand,
    ) -> Result<(), mpsc::error::SendError<EngineCommand>> {
        self.commands.send(command).await
    }

    /// Latest view without waiting for a change.
    #[must_use]
    pub fn current_view(&self) -> QueueView {
        self.queue.borrow().clone()
    }

    /// Stop the engine: cancels pending timers and in-flight waits,
    /// then joins the task. The push channel is shut down first so no
    /// signal can race the teardown.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Builder for the engine task.
pub struct SyncEngine<B> {
    config: EngineConfig,
    backend: Arc<B>,
    channel: ChannelHandle,
    clock: Arc<dyn Clock>,
}

impl<B> SyncEngine<B>
where
    B: SnapshotSource + EscalationActions + 'static,
{
    #[must_use]
    pub fn new(
        config: EngineConfig,
        backend: Arc<B>,
        channel: ChannelHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            backend,
            channel,
            clock,
        }
    }

    /// Spawn the engine loop and return its handle.
    #[must_use]
    pub fn spawn(self) -> EngineHandle {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection = self.channel.state.clone();

        let initial = QueueView::empty(self.config.sort, self.clock.now());
        let (view_tx, view_rx) = watch::channel(initial);

        let join = tokio::spawn(run_engine(self, view_tx, command_rx, shutdown_rx));

        EngineHandle {
            queue: view_rx,
            connection,
            commands: command_tx,
            shutdown: shutdown_tx,
            join,
        }
    }
}

async fn run_engine<B>(
    engine: SyncEngine<B>,
    view_tx: watch::Sender<QueueView>,
    mut command_rx: mpsc::Receiver<EngineCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    B: SnapshotSource + EscalationActions + 'static,
{
    let SyncEngine {
        config,
        backend,
        mut channel,
        clock,
    } = engine;

    let mut store = ReconcileStore::new(config.store());
    let mut sort = config.sort;
    let mut signals_closed = false;

    // First tick fires immediately, so the initial fetch happens on
    // entry rather than one poll interval in.
    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sla_tick = tokio::time::interval(config.tick_interval());
    sla_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    sla_tick.reset(); // skip the immediate first tick; nothing to reclassify yet

    info!(
        poll_secs = config.poll_interval_secs,
        tick_secs = config.tick_interval_secs,
        "sync engine started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the handle is gone; stop too.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = poll.tick() => {
                fetch_and_apply(&*backend, &mut store, &*clock, &view_tx, sort).await;
            }
            _ = sla_tick.tick() => {
                let now = clock.now();
                store.sweep(now);
                publish(&view_tx, &store, sort, now);
            }
            signal = channel.signals.recv(), if !signals_closed => {
                match signal {
                    Some(ChannelSignal::Event(event)) => {
                        let now = clock.now();
                        let applied = store.apply(StoreInput::Event(event), now);
                        debug!(?applied, "event applied");
                        publish(&view_tx, &store, sort, now);
                    }
                    Some(ChannelSignal::Resync) => {
                        // Events were lost while degraded; re-baseline.
                        info!("resync requested, fetching fresh snapshot");
                        fetch_and_apply(&*backend, &mut store, &*clock, &view_tx, sort).await;
                    }
                    None => {
                        warn!("push channel signals ended, polling only");
                        signals_closed = true;
                    }
                }
            }
            command = command_rx.recv() => {
                let Some(command) = command else {
                    info!("all engine handles dropped, stopping");
                    break;
                };
                match command {
                    EngineCommand::Refresh => {
                        fetch_and_apply(&*backend, &mut store, &*clock, &view_tx, sort).await;
                    }
                    EngineCommand::SetSort(spec) => {
                        sort = spec;
                        publish(&view_tx, &store, sort, clock.now());
                    }
                    EngineCommand::Approve(id) => {
                        act_and_refresh(&*backend, &mut store, &*clock, &view_tx, sort, &id, true)
                            .await;
                    }
                    EngineCommand::Reject(id) => {
                        act_and_refresh(&*backend, &mut store, &*clock, &view_tx, sort, &id, false)
                            .await;
                    }
                }
            }
        }
    }

    channel.shutdown().await;
    info!("sync engine stopped");
}

/// Fetch a snapshot and merge it. A failed fetch is logged and leaves
/// the last-known-good queue untouched.
async fn fetch_and_apply<B: SnapshotSource + ?Sized>(
    backend: &B,
    store: &mut ReconcileStore,
    clock: &dyn Clock,
    view_tx: &watch::Sender<QueueView>,
    sort: SortSpec,
) {
    match backend.fetch_active().await {
        Ok(snapshot) => {
            let now = clock.now();
            if let Applied::Snapshot(summary) = store.apply(StoreInput::Snapshot(snapshot), now) {
                debug!(?summary, "snapshot merged");
            }
            publish(view_tx, store, sort, now);
        }
        Err(e) => {
            warn!(error = %e, transient = e.is_transient(), "snapshot fetch failed, keeping last known state");
        }
    }
}

/// Run an approve/reject against the backend, then refresh. The local
/// copy is never mutated optimistically; the refreshed snapshot is the
/// only source of the post-action state.
async fn act_and_refresh<B: SnapshotSource + EscalationActions + ?Sized>(
    backend: &B,
    store: &mut ReconcileStore,
    clock: &dyn Clock,
    view_tx: &watch::Sender<QueueView>,
    sort: SortSpec,
    id: &EscalationId,
    approve: bool,
) {
    let verb = if approve { "approve" } else { "reject" };
    let result = if approve {
        backend.approve(id).await
    } else {
        backend.reject(id).await
    };
    match result {
        Ok(()) => {
            info!(id = %id, verb, "action accepted");
            fetch_and_apply(backend, store, clock, view_tx, sort).await;
        }
        Err(e) => {
            warn!(id = %id, verb, error = %e, "action failed");
        }
    }
}

fn publish(
    view_tx: &watch::Sender<QueueView>,
    store: &ReconcileStore,
    sort: SortSpec,
    now: chrono::DateTime<chrono::Utc>,
) {
    let view = build_view(store.records(), sort, now);
    let _ = view_tx.send(view);
}

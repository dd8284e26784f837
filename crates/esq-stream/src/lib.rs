//! Push-channel client for the escalation sync engine.
//!
//! Owns the WebSocket transport and its whole lifecycle: the
//! `connecting → open → (degraded → open | closed)` state machine,
//! exponential backoff with jitter on reconnect, the subscribe
//! handshake, and resync requests after a gap. Events are forwarded
//! to the reconciliation funnel untouched; this crate never merges.

pub mod backoff;
pub mod channel;
pub mod error;
pub mod wire;

pub use backoff::ReconnectPolicy;
pub use channel::{ChannelConfig, ChannelHandle, ChannelSignal, ChannelStats, EventChannel};
pub use error::{ChannelError, ChannelResult};
pub use wire::{parse_frame, subscribe_message};

//! Escalation records and the wire shapes that feed them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque escalation identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscalationId(String);

impl EscalationId {
    /// Create a new id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EscalationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for EscalationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for EscalationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EscalationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Escalation priority, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank used for ordering (higher is more severe).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Escalation lifecycle status.
///
/// `Resolved` and `Closed` are terminal: a record never moves back to
/// `Open` or `InProgress` without a fresh create event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl EscalationStatus {
    /// Whether this status ends the record's active life.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Numeric rank used for ordering (lifecycle position).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::Resolved => 2,
            Self::Closed => 3,
        }
    }
}

impl fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Revision marker used for conflict resolution between feed channels.
///
/// The backend supplies either a sequence number or an epoch-millis
/// timestamp; both compare correctly as `u64`. This is metadata, not
/// domain data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    /// Whether a write carrying `self` supersedes one carrying `other`.
    #[must_use]
    pub const fn is_newer_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Weak reference to the team an escalation is assigned to.
///
/// Team lifecycle is owned elsewhere; this is relation plus display
/// lookup only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
}

/// A single escalation as held by the store.
///
/// `created_at` and `sla_due_at` are immutable once set by the
/// backend; status and priority change in place via update events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: EscalationId,
    pub created_at: DateTime<Utc>,
    pub sla_due_at: DateTime<Utc>,
    pub priority: Priority,
    pub status: EscalationStatus,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamRef>,
    pub revision: Revision,
}

impl EscalationRecord {
    /// Apply a partial update in place, leaving immutable fields alone.
    pub fn apply_delta(&mut self, delta: &EscalationDelta, revision: Revision) {
        if let Some(priority) = delta.priority {
            self.priority = priority;
        }
        if let Some(status) = delta.status {
            self.status = status;
        }
        if let Some(ref subject) = delta.subject {
            self.subject.clone_from(subject);
        }
        if let Some(ref sender) = delta.sender {
            self.sender.clone_from(sender);
        }
        if let Some(ref reason) = delta.reason {
            self.reason.clone_from(reason);
        }
        if let Some(ref team) = delta.team {
            self.team = team.clone();
        }
        self.revision = revision;
    }
}

/// Partial record payload carried by update events.
///
/// Create events must carry at least `created_at` and `sla_due_at`;
/// [`EscalationDelta::into_record`] returns `None` otherwise and the
/// caller drops the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EscalationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `Some(None)` clears the assignment, `Some(Some(..))` reassigns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Option<TeamRef>>,
}

impl EscalationDelta {
    /// Build a full record from a create payload.
    ///
    /// Returns `None` when the payload is missing the immutable fields
    /// a new record requires.
    #[must_use]
    pub fn into_record(self, id: EscalationId, revision: Revision) -> Option<EscalationRecord> {
        let created_at = self.created_at?;
        let sla_due_at = self.sla_due_at?;
        Some(EscalationRecord {
            id,
            created_at,
            sla_due_at,
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            sender: self.sender.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
            team: self.team.unwrap_or_default(),
            revision,
        })
    }
}

/// Kind of a push-channel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Resolve,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

/// A discrete create/update/resolve event for one escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub kind: EventKind,
    pub id: EscalationId,
    #[serde(default)]
    pub payload: EscalationDelta,
    pub revision: Revision,
}

/// Point-in-time enumeration of all active escalations.
///
/// Transient input artifact: fully superseded by the next snapshot or
/// by individual events, never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<EscalationRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    #[must_use]
    pub fn new(records: Vec<EscalationRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            records,
            fetched_at,
        }
    }
}

/// Connectivity of the push channel, read-only outside the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Degraded,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Degraded => write!(f, "degraded"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

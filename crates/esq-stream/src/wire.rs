//! Wire frames for the push channel.

use esq_core::QueueEvent;
use serde::Serialize;

/// Outbound subscribe message sent once per (re)connect.
#[derive(Debug, Serialize)]
struct Subscribe<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    channel: &'a str,
}

/// Render the subscribe handshake for a channel name.
#[must_use]
pub fn subscribe_message(channel: &str) -> String {
    serde_json::to_string(&Subscribe {
        kind: "subscribe",
        channel,
    })
    .unwrap_or_else(|_| String::from(r#"{"type":"subscribe"}"#))
}

/// Parse one inbound text frame into a queue event.
///
/// # Errors
/// Returns the JSON error when the frame does not match
/// `{kind, id, payload, revision}`; callers drop the frame and count
/// it, they never tear the channel down over it.
pub fn parse_frame(text: &str) -> Result<QueueEvent, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esq_core::{EscalationStatus, EventKind, Priority, Revision};

    #[test]
    fn subscribe_message_shape() {
        assert_eq!(
            subscribe_message("escalations"),
            r#"{"type":"subscribe","channel":"escalations"}"#
        );
    }

    #[test]
    fn parses_full_event_frame() {
        let event = parse_frame(
            r#"{
                "kind": "create",
                "id": "esc-9",
                "payload": {
                    "created_at": "2026-08-20T10:00:00Z",
                    "sla_due_at": "2026-08-20T18:00:00Z",
                    "priority": "high",
                    "status": "open",
                    "subject": "chargeback storm",
                    "sender": "alerts@mailer"
                },
                "revision": 41
            }"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::Create);
        assert_eq!(event.id.as_str(), "esc-9");
        assert_eq!(event.payload.priority, Some(Priority::High));
        assert_eq!(event.payload.status, Some(EscalationStatus::Open));
        assert_eq!(event.revision, Revision(41));
    }

    #[test]
    fn parses_partial_update_frame() {
        let event = parse_frame(
            r#"{"kind":"update","id":"esc-9","payload":{"status":"in_progress"},"revision":42}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(event.payload.status, Some(EscalationStatus::InProgress));
        assert!(event.payload.priority.is_none());
    }

    #[test]
    fn resolve_frame_without_payload() {
        let event =
            parse_frame(r#"{"kind":"resolve","id":"esc-9","revision":43}"#).unwrap();
        assert_eq!(event.kind, EventKind::Resolve);
        assert_eq!(event.payload, Default::default());
    }

    #[test]
    fn malformed_frames_are_errors_not_panics() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"kind":"evaporate","id":"x","revision":1}"#).is_err());
        assert!(parse_frame(r#"{"id":"x","revision":1}"#).is_err());
    }
}

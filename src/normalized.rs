//! Normalized UI events published to the chat page.
//!
//! Every state change of the widget (transcript, loading flag, streaming
//! toggle, sidebar, toasts, connectivity) is expressed as a [`UiEvent`] and
//! fanned out through an [`EventBus`]. The page subscribes over SSE and applies
//! each event to the DOM.
//!
//! # Example
//!
//! ```rust
//! use koc_support_chat::normalized::UiEvent;
//!
//! let event = UiEvent::LoadingChanged { loading: true };
//! assert_eq!(event.name(), "loading.changed");
//! assert_eq!(event.payload(), r#"{"type":"loading.changed","data":{"loading":true}}"#);
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::connectivity::ConnectivityStatus;
use crate::notify::Toast;
use crate::stats::StatsView;

/// Default capacity of the event fan-out channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the chat controller and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum UiEvent {
    // ─────────────────────────────────────────────────────────────────────
    // Transcript
    // ─────────────────────────────────────────────────────────────────────
    /// A message bubble or typing indicator was appended.
    #[serde(rename = "entry.added")]
    EntryAdded {
        /// Entry identifier (DOM id suffix).
        id: String,
        /// Complete element markup.
        html: String,
    },

    /// The text of an existing message was re-rendered.
    #[serde(rename = "entry.updated")]
    EntryUpdated {
        id: String,
        /// Inner markup of the message text.
        html: String,
    },

    /// The time label of a message changed (elapsed reply time).
    #[serde(rename = "entry.timed")]
    EntryTimed { id: String, label: String },

    /// An entry (typing indicator) was removed.
    #[serde(rename = "entry.removed")]
    EntryRemoved { id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Controls
    // ─────────────────────────────────────────────────────────────────────
    /// The input is disabled while a reply is pending.
    #[serde(rename = "loading.changed")]
    LoadingChanged { loading: bool },

    /// The streaming toggle changed.
    #[serde(rename = "streaming.changed")]
    StreamingChanged { enabled: bool },

    // ─────────────────────────────────────────────────────────────────────
    // Sidebar, status and notifications
    // ─────────────────────────────────────────────────────────────────────
    /// New sidebar statistics.
    #[serde(rename = "stats.updated")]
    StatsUpdated(StatsView),

    /// Connectivity indicator transition.
    #[serde(rename = "connectivity.changed")]
    ConnectivityChanged { status: ConnectivityStatus },

    /// A toast notification appeared.
    #[serde(rename = "toast.shown")]
    ToastShown(Toast),

    /// A toast notification expired.
    #[serde(rename = "toast.dismissed")]
    ToastDismissed { id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Recovery
    // ─────────────────────────────────────────────────────────────────────
    /// Full widget state for a subscriber that missed events.
    #[serde(rename = "resync")]
    Resync(PageSnapshot),
}

/// Everything the page needs to rebuild itself from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSnapshot {
    /// Markup of every transcript entry, oldest first.
    pub transcript_html: String,
    pub loading: bool,
    pub streaming: bool,
    pub stats: StatsView,
    pub status: ConnectivityStatus,
}

impl UiEvent {
    /// SSE event name, also used by the page to route the payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntryAdded { .. } => "entry.added",
            Self::EntryUpdated { .. } => "entry.updated",
            Self::EntryTimed { .. } => "entry.timed",
            Self::EntryRemoved { .. } => "entry.removed",
            Self::LoadingChanged { .. } => "loading.changed",
            Self::StreamingChanged { .. } => "streaming.changed",
            Self::StatsUpdated(_) => "stats.updated",
            Self::ConnectivityChanged { .. } => "connectivity.changed",
            Self::ToastShown(_) => "toast.shown",
            Self::ToastDismissed { .. } => "toast.dismissed",
            Self::Resync(_) => "resync",
        }
    }

    /// JSON payload carried in the SSE `data:` field.
    pub fn payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
        })
    }
}

/// Broadcast fan-out of [`UiEvent`]s to every connected page.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: UiEvent) {
        tracing::trace!(event = event.name(), "UI event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let event = UiEvent::EntryUpdated {
            id: "m1".to_string(),
            html: "<strong>Hi</strong>".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("entry.updated"));
        assert!(json.contains("\"id\":\"m1\""));
    }

    #[test]
    fn test_payload_is_single_line() {
        let event = UiEvent::EntryAdded {
            id: "m1".to_string(),
            html: "line one<br>\nline two".to_string(),
        };
        let payload = event.payload();
        assert!(!payload.contains('\n'));
        assert_eq!(serde_json::from_str::<UiEvent>(&payload).unwrap(), event);
    }

    #[test]
    fn test_connectivity_payload() {
        let event = UiEvent::ConnectivityChanged {
            status: ConnectivityStatus::Offline,
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["data"]["status"], "offline");
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::default();
        bus.emit(UiEvent::LoadingChanged { loading: true });

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.emit(UiEvent::LoadingChanged { loading: false });

        assert_eq!(
            rx.recv().await.unwrap(),
            UiEvent::LoadingChanged { loading: false }
        );
    }
}

//! Connectivity status indicator.
//!
//! Transitions come from two places: the browser forwarding its
//! `online`/`offline` events, and a periodic `GET /health` probe against the
//! completion service. Only real transitions are surfaced; repeated reports of
//! the same status are ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::api::CompletionClient;
use crate::normalized::{EventBus, UiEvent};
use crate::notify::Notifier;

/// Whether the service is currently reachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    #[default]
    Online,
    Offline,
}

impl ConnectivityStatus {
    #[must_use]
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }

    /// Text shown next to the status dot.
    pub fn label(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }

    /// CSS class of the status dot.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Tracks connectivity and announces transitions.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
    events: EventBus,
    notifier: Notifier,
}

impl Connectivity {
    /// Start in the online state.
    #[must_use]
    pub fn new(events: EventBus, notifier: Notifier) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
            events,
            notifier,
        }
    }

    pub fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus::from_online(self.online.load(Ordering::SeqCst))
    }

    /// Record a status report. Returns `true` if it was a transition.
    pub fn report(&self, status: ConnectivityStatus) -> bool {
        let online = status == ConnectivityStatus::Online;
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        tracing::info!(name: "connectivity.changed", status = status.label(), "Connectivity changed");
        self.events.emit(UiEvent::ConnectivityChanged { status });
        match status {
            ConnectivityStatus::Online => self.notifier.success("🌐 Connected"),
            ConnectivityStatus::Offline => self.notifier.error("📶 Connection lost"),
        };
        true
    }

    /// Probe `GET /health` once and report the outcome.
    pub async fn probe(&self, client: &CompletionClient) -> ConnectivityStatus {
        let status = match client.health().await {
            Ok(_) => ConnectivityStatus::Online,
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                ConnectivityStatus::Offline
            }
        };
        self.report(status);
        status
    }

    /// Probe on a fixed interval until the task is aborted.
    pub fn spawn_probe(&self, client: CompletionClient, every: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.probe(&client).await;
            }
        })
    }
}

//! Stats sidebar.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::api::{CompletionClient, StatsResponse};
use crate::error::Result;
use crate::normalized::{EventBus, UiEvent};

const DEFAULT_RESPONSE_TIME: &str = "< 1s";
const DEFAULT_ACCURACY: &str = "95%";

/// Display values for the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsView {
    pub total_documents: String,
    pub supported_topics: String,
    pub response_time: String,
    pub accuracy: String,
}

impl Default for StatsView {
    fn default() -> Self {
        Self {
            total_documents: "0".to_string(),
            supported_topics: "0".to_string(),
            response_time: DEFAULT_RESPONSE_TIME.to_string(),
            accuracy: DEFAULT_ACCURACY.to_string(),
        }
    }
}

impl From<StatsResponse> for StatsView {
    fn from(resp: StatsResponse) -> Self {
        let non_empty = |s: Option<String>, fallback: &str| {
            s.filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            total_documents: resp.total_documents.unwrap_or(0).to_string(),
            supported_topics: resp.supported_topics.unwrap_or(0).to_string(),
            response_time: non_empty(resp.response_time, DEFAULT_RESPONSE_TIME),
            accuracy: non_empty(resp.accuracy, DEFAULT_ACCURACY),
        }
    }
}

/// Current sidebar values plus the refresh logic.
#[derive(Debug, Clone)]
pub struct StatsPanel {
    current: Arc<RwLock<StatsView>>,
    events: EventBus,
}

impl StatsPanel {
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            current: Arc::new(RwLock::new(StatsView::default())),
            events,
        }
    }

    pub fn current(&self) -> StatsView {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the sidebar values with a fresh reply.
    pub fn apply(&self, resp: StatsResponse) -> StatsView {
        let view = StatsView::from(resp);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = view.clone();
        self.events.emit(UiEvent::StatsUpdated(view.clone()));
        view
    }

    /// Fetch `GET /stats` and apply it. On failure the sidebar is left as is.
    pub async fn refresh(&self, client: &CompletionClient) -> Result<StatsView> {
        match client.stats().await {
            Ok(resp) => Ok(self.apply(resp)),
            Err(e) => {
                tracing::error!(error = %e, "Error loading stats");
                Err(e)
            }
        }
    }

    /// Refresh now, then every `every` if given.
    pub fn spawn_refresh(&self, client: CompletionClient, every: Option<Duration>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let Some(every) = every else {
                let _ = this.refresh(&client).await;
                return;
            };

            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = this.refresh(&client).await;
            }
        })
    }
}

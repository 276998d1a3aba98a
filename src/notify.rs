//! Transient toast notifications.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalized::{EventBus, UiEvent};

/// Default time a toast stays on screen.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_millis(3000);

/// Visual flavour of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl ToastKind {
    /// Background colour used by the page stylesheet.
    pub fn color(self) -> &'static str {
        match self {
            Self::Success => "#4CAF50",
            Self::Error => "#f44336",
            Self::Info => "#2196F3",
        }
    }
}

/// A single toast notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    pub kind: ToastKind,
    pub message: String,
}

/// Shows toasts and dismisses them after a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct Notifier {
    events: EventBus,
    ttl: Duration,
    active: Arc<RwLock<Vec<Toast>>>,
}

impl Notifier {
    #[must_use]
    pub fn new(events: EventBus, ttl: Duration) -> Self {
        Self {
            events,
            ttl,
            active: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Show a toast and schedule its dismissal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn show(&self, kind: ToastKind, message: impl Into<String>) -> Toast {
        let toast = Toast {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
        };

        tracing::debug!(kind = ?toast.kind, message = %toast.message, "Toast shown");
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(toast.clone());
        self.events.emit(UiEvent::ToastShown(toast.clone()));

        let this = self.clone();
        let id = toast.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.ttl).await;
            this.dismiss(&id);
        });

        toast
    }

    pub fn success(&self, message: impl Into<String>) -> Toast {
        self.show(ToastKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Toast {
        self.show(ToastKind::Error, message)
    }

    /// Remove a toast early. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: &str) -> bool {
        let removed = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let before = active.len();
            active.retain(|t| t.id != id);
            active.len() != before
        };
        if removed {
            self.events.emit(UiEvent::ToastDismissed { id: id.to_string() });
        }
        removed
    }

    /// Toasts currently on screen, oldest first.
    pub fn active(&self) -> Vec<Toast> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_ttl() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let notifier = Notifier::new(bus, DEFAULT_TOAST_TTL);

        let toast = notifier.success("Saved");
        assert_eq!(notifier.active().len(), 1);
        assert_eq!(rx.recv().await.unwrap(), UiEvent::ToastShown(toast.clone()));

        tokio::time::sleep(DEFAULT_TOAST_TTL + Duration::from_millis(10)).await;

        assert!(notifier.active().is_empty());
        assert_eq!(
            rx.recv().await.unwrap(),
            UiEvent::ToastDismissed { id: toast.id }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_dismiss_is_idempotent() {
        let notifier = Notifier::new(EventBus::default(), DEFAULT_TOAST_TTL);
        let toast = notifier.error("Oops");

        assert!(notifier.dismiss(&toast.id));
        assert!(!notifier.dismiss(&toast.id));

        tokio::time::sleep(DEFAULT_TOAST_TTL * 2).await;
        assert!(notifier.active().is_empty());
    }

    #[test]
    fn test_kind_colors() {
        assert_eq!(ToastKind::Success.color(), "#4CAF50");
        assert_eq!(ToastKind::Error.color(), "#f44336");
        assert_eq!(ToastKind::Info.color(), "#2196F3");
    }
}

//! The chat controller.
//!
//! Owns the widget state and drives one exchange at a time against the
//! completion service. Every visible change is published as a
//! [`UiEvent`] on the shared [`EventBus`].
//!
//! # Example
//!
//! ```rust,no_run
//! use koc_support_chat::api::CompletionClient;
//! use koc_support_chat::controller::{ChatController, ControllerOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CompletionClient::new("http://localhost:8000", "koc-assistant")?;
//! let controller = ChatController::new(client, ControllerOptions::default());
//!
//! controller.send("How do I register?").await?;
//! println!("{:?}", controller.session().last_message());
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::api::CompletionClient;
use crate::connectivity::Connectivity;
use crate::error::{ClientError, SubmitError};
use crate::normalized::{EventBus, PageSnapshot, UiEvent};
use crate::notify::{DEFAULT_TOAST_TTL, Notifier};
use crate::session::{ChatEntry, ChatSession, DEFAULT_MAX_ENTRIES, Sender};
use crate::stats::StatsPanel;
use crate::ui::entry_html;
use crate::ui::fragments::transcript_html;

/// Message appended when an exchange fails.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "❌ Connection error. Please try again!";

/// Tunables for [`ChatController`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Initial state of the streaming toggle.
    pub streaming: bool,
    pub toast_ttl: Duration,
    pub fallback_message: String,
    /// Transcript entries kept before the oldest are dropped.
    pub max_entries: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            toast_ttl: DEFAULT_TOAST_TTL,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Controller for the single chat widget.
///
/// Cloning is cheap; clones share state.
#[derive(Debug, Clone)]
pub struct ChatController {
    client: CompletionClient,
    session: ChatSession,
    events: EventBus,
    notifier: Notifier,
    stats: StatsPanel,
    connectivity: Connectivity,
    fallback_message: String,
}

/// A submission that passed validation and holds the loading flag.
///
/// Dropping it (or finishing [`ChatController::run`]) clears the flag.
#[derive(Debug)]
pub struct PendingExchange {
    prompt: String,
    streaming: bool,
    loading: LoadingGuard,
}

impl PendingExchange {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }
}

#[derive(Debug)]
struct LoadingGuard {
    session: ChatSession,
    events: EventBus,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.session.finish_loading();
        self.events.emit(UiEvent::LoadingChanged { loading: false });
    }
}

impl ChatController {
    #[must_use]
    pub fn new(client: CompletionClient, options: ControllerOptions) -> Self {
        let events = EventBus::default();
        let notifier = Notifier::new(events.clone(), options.toast_ttl);
        Self {
            client,
            session: ChatSession::with_max_entries(options.streaming, options.max_entries),
            stats: StatsPanel::new(events.clone()),
            connectivity: Connectivity::new(events.clone(), notifier.clone()),
            notifier,
            events,
            fallback_message: options.fallback_message,
        }
    }

    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn stats(&self) -> &StatsPanel {
        &self.stats
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Current widget state as a single event.
    pub fn snapshot(&self) -> UiEvent {
        UiEvent::Resync(PageSnapshot {
            transcript_html: transcript_html(&self.session.entries()),
            loading: self.session.is_loading(),
            streaming: self.session.is_streaming(),
            stats: self.stats.current(),
            status: self.connectivity.status(),
        })
    }

    /// Live UI events for one page.
    ///
    /// A subscriber that falls behind receives a [`UiEvent::Resync`] in place
    /// of the events it missed.
    pub fn ui_feed(&self) -> impl Stream<Item = UiEvent> + Send + 'static + use<> {
        let controller = self.clone();
        BroadcastStream::new(self.events.subscribe()).map(move |res| match res {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "UI event subscriber lagged, resyncing");
                controller.snapshot()
            }
        })
    }

    /// Flip the streaming toggle.
    pub fn set_streaming(&self, enabled: bool) {
        let previous = self.session.set_streaming(enabled);
        if previous != enabled {
            tracing::info!(enabled, "Streaming mode changed");
        }
        self.events.emit(UiEvent::StreamingChanged { enabled });
    }

    /// Validate a submission and record the user message.
    pub fn begin(&self, raw: &str) -> Result<PendingExchange, SubmitError> {
        let prompt = raw.trim();
        if prompt.is_empty() {
            return Err(SubmitError::Empty);
        }
        if !self.session.try_begin_loading() {
            tracing::debug!("Submission rejected while a reply is pending");
            return Err(SubmitError::Busy);
        }

        let loading = LoadingGuard {
            session: self.session.clone(),
            events: self.events.clone(),
        };
        self.events.emit(UiEvent::LoadingChanged { loading: true });
        self.add_entry(ChatEntry::message(Sender::User, prompt));

        Ok(PendingExchange {
            prompt: prompt.to_string(),
            streaming: self.session.is_streaming(),
            loading,
        })
    }

    /// Perform the exchange for an accepted submission.
    ///
    /// Never fails: errors become the fallback message.
    pub async fn run(&self, pending: PendingExchange) {
        let PendingExchange {
            prompt,
            streaming,
            loading: _loading,
        } = pending;

        let started = Instant::now();
        let typing_id = self.add_entry(ChatEntry::typing());

        let result = if streaming {
            self.stream_reply(&prompt, &typing_id, started).await
        } else {
            self.buffered_reply(&prompt, &typing_id, started).await
        };

        match result {
            Ok(reply_len) => {
                tracing::info!(
                    name: "chat.exchange.completed",
                    streaming,
                    reply_len,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Chat exchange completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    name: "chat.exchange.failed",
                    streaming,
                    error = %e,
                    "Error sending message"
                );
                self.remove_entry(&typing_id);
                self.add_entry(ChatEntry::message(Sender::Bot, self.fallback_message.as_str()));
            }
        }
    }

    /// [`begin`](Self::begin) followed by [`run`](Self::run).
    pub async fn send(&self, raw: &str) -> Result<(), SubmitError> {
        let pending = self.begin(raw)?;
        self.run(pending).await;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Exchange modes
    // ─────────────────────────────────────────────────────────────────────────

    async fn stream_reply(
        &self,
        prompt: &str,
        typing_id: &str,
        started: Instant,
    ) -> Result<usize, ClientError> {
        let mut fragments = self.client.stream(prompt).await?;

        self.remove_entry(typing_id);
        let reply_id = self.add_entry(ChatEntry::message(Sender::Bot, ""));

        let mut reply_len = 0;
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            reply_len += fragment.len();
            if let Some(html) = self.session.append_text(&reply_id, &fragment) {
                self.events.emit(UiEvent::EntryUpdated {
                    id: reply_id.clone(),
                    html,
                });
            }
        }

        self.stamp_elapsed(&reply_id, started);
        Ok(reply_len)
    }

    async fn buffered_reply(
        &self,
        prompt: &str,
        typing_id: &str,
        started: Instant,
    ) -> Result<usize, ClientError> {
        let reply = self.client.complete(prompt).await?;
        let reply_len = reply.len();

        self.remove_entry(typing_id);
        let reply_id = self.add_entry(ChatEntry::message(Sender::Bot, reply));
        self.stamp_elapsed(&reply_id, started);
        Ok(reply_len)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transcript helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn add_entry(&self, entry: ChatEntry) -> String {
        let id = entry.id.clone();
        let html = entry_html(&entry);
        let evicted = self.session.push(entry);
        for old in evicted {
            self.events.emit(UiEvent::EntryRemoved { id: old });
        }
        self.events.emit(UiEvent::EntryAdded {
            id: id.clone(),
            html,
        });
        id
    }

    fn remove_entry(&self, id: &str) {
        if self.session.remove(id) {
            self.events.emit(UiEvent::EntryRemoved { id: id.to_string() });
        }
    }

    fn stamp_elapsed(&self, id: &str, started: Instant) {
        let label = elapsed_label(started.elapsed());
        if self.session.set_time_label(id, label.clone()) {
            self.events.emit(UiEvent::EntryTimed {
                id: id.to_string(),
                label,
            });
        }
    }
}

/// `1.2s`-style label for a reply duration.
pub fn elapsed_label(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

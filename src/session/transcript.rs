//! Chat transcript and widget flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::markdown::format_message;

/// Who authored an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

/// What an entry renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A message bubble.
    Message,
    /// The "bot is replying" placeholder.
    Typing,
}

/// One element of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    pub sender: Sender,
    pub kind: EntryKind,
    /// Raw text as typed or received.
    pub text: String,
    /// `format_message(text)`, kept in sync on every change.
    pub html: String,
    /// Wall-clock `HH:MM` at creation, replaced by the elapsed reply time.
    pub time_label: String,
}

impl ChatEntry {
    /// A new message bubble stamped with the local time.
    #[must_use]
    pub fn message(sender: Sender, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            kind: EntryKind::Message,
            html: format_message(&text),
            text,
            time_label: Local::now().format("%H:%M").to_string(),
        }
    }

    /// A new typing indicator.
    #[must_use]
    pub fn typing() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: Sender::Bot,
            kind: EntryKind::Typing,
            text: String::new(),
            html: String::new(),
            time_label: String::new(),
        }
    }

    pub fn is_typing(&self) -> bool {
        self.kind == EntryKind::Typing
    }
}

/// Entries retained when no other limit is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// The single chat session held for the lifetime of the process.
///
/// Cloning is cheap; clones share state.
#[derive(Debug, Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    entries: RwLock<Vec<ChatEntry>>,
    loading: AtomicBool,
    streaming: AtomicBool,
    max_entries: usize,
}

impl ChatSession {
    #[must_use]
    pub fn new(streaming: bool) -> Self {
        Self::with_max_entries(streaming, DEFAULT_MAX_ENTRIES)
    }

    /// A session that keeps only the newest `max_entries` entries (at least one).
    #[must_use]
    pub fn with_max_entries(streaming: bool, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                entries: RwLock::new(Vec::new()),
                loading: AtomicBool::new(false),
                streaming: AtomicBool::new(streaming),
                max_entries: max_entries.max(1),
            }),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.inner.max_entries
    }

    // ─────────────────────────────────────────────────────────────────────
    // Flags
    // ─────────────────────────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    /// Claim the loading flag. Returns `false` if it was already set.
    pub fn try_begin_loading(&self) -> bool {
        self.inner
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish_loading(&self) {
        self.inner.loading.store(false, Ordering::SeqCst);
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::SeqCst)
    }

    /// Set the streaming toggle, returning the previous value.
    pub fn set_streaming(&self, enabled: bool) -> bool {
        self.inner.streaming.swap(enabled, Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transcript
    // ─────────────────────────────────────────────────────────────────────

    /// Append an entry, evicting the oldest past the limit.
    ///
    /// Returns the ids of the evicted entries.
    pub fn push(&self, entry: ChatEntry) -> Vec<String> {
        let mut entries = self.write();
        entries.push(entry);
        let excess = entries.len().saturating_sub(self.inner.max_entries);
        entries.drain(..excess).map(|e| e.id).collect()
    }

    /// Append a fragment to a message and return its re-rendered markup.
    pub fn append_text(&self, id: &str, fragment: &str) -> Option<String> {
        let mut entries = self.write();
        let entry = entries.iter_mut().find(|e| e.id == id)?;
        entry.text.push_str(fragment);
        entry.html = format_message(&entry.text);
        Some(entry.html.clone())
    }

    pub fn set_time_label(&self, id: &str, label: impl Into<String>) -> bool {
        let mut entries = self.write();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.time_label = label.into();
                true
            }
            None => false,
        }
    }

    /// Remove an entry. Returns `false` if it did not exist.
    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn get(&self, id: &str) -> Option<ChatEntry> {
        self.read().iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<ChatEntry> {
        self.read().clone()
    }

    /// Number of message bubbles (typing indicators excluded).
    pub fn message_count(&self) -> usize {
        self.read().iter().filter(|e| !e.is_typing()).count()
    }

    pub fn last_message(&self) -> Option<ChatEntry> {
        self.read().iter().rev().find(|e| !e.is_typing()).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ChatEntry>> {
        self.inner.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ChatEntry>> {
        self.inner.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_flag_is_exclusive() {
        let session = ChatSession::new(true);
        assert!(session.try_begin_loading());
        assert!(!session.try_begin_loading());
        session.finish_loading();
        assert!(session.try_begin_loading());
    }

    #[test]
    fn test_append_rerenders() {
        let session = ChatSession::new(true);
        let entry = ChatEntry::message(Sender::Bot, "");
        let id = entry.id.clone();
        session.push(entry);

        session.append_text(&id, "**Hel");
        let html = session.append_text(&id, "lo**").unwrap();

        assert_eq!(html, "<strong>Hello</strong>");
        assert_eq!(session.get(&id).unwrap().text, "**Hello**");
        assert!(session.append_text("missing", "x").is_none());
    }

    #[test]
    fn test_typing_excluded_from_counts() {
        let session = ChatSession::new(false);
        session.push(ChatEntry::message(Sender::User, "hi"));
        let typing = ChatEntry::typing();
        let typing_id = typing.id.clone();
        session.push(typing);

        assert_eq!(session.entries().len(), 2);
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.last_message().unwrap().text, "hi");

        assert!(session.remove(&typing_id));
        assert!(!session.remove(&typing_id));
    }

    #[test]
    fn test_push_evicts_oldest_past_limit() {
        let session = ChatSession::with_max_entries(true, 2);
        let first = ChatEntry::message(Sender::User, "one");
        let first_id = first.id.clone();

        assert!(session.push(first).is_empty());
        assert!(session.push(ChatEntry::message(Sender::Bot, "two")).is_empty());
        assert_eq!(
            session.push(ChatEntry::message(Sender::User, "three")),
            vec![first_id.clone()]
        );

        let texts: Vec<String> = session.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, ["two", "three"]);
        assert!(session.get(&first_id).is_none());
    }

    #[test]
    fn test_zero_limit_keeps_newest_entry() {
        let session = ChatSession::with_max_entries(true, 0);
        assert_eq!(session.max_entries(), 1);
        session.push(ChatEntry::message(Sender::User, "a"));
        session.push(ChatEntry::message(Sender::User, "b"));
        assert_eq!(session.last_message().unwrap().text, "b");
        assert_eq!(session.entries().len(), 1);
    }

    #[test]
    fn test_streaming_toggle() {
        let session = ChatSession::new(true);
        assert!(session.set_streaming(false));
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_message_time_label_format() {
        let entry = ChatEntry::message(Sender::User, "x");
        assert_eq!(entry.time_label.len(), 5);
        assert_eq!(&entry.time_label[2..3], ":");
    }
}

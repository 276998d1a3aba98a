//! In-memory chat session.
//!
//! The widget holds exactly one conversation for the lifetime of the process.
//! It is the transcript plus the loading and streaming flags.
//!
//! # Example
//!
//! ```rust
//! use koc_support_chat::session::{ChatEntry, ChatSession, Sender};
//!
//! let session = ChatSession::new(true);
//! session.push(ChatEntry::message(Sender::User, "Hello!"));
//!
//! assert_eq!(session.message_count(), 1);
//! ```

mod transcript;

pub use transcript::{ChatEntry, ChatSession, DEFAULT_MAX_ENTRIES, EntryKind, Sender};

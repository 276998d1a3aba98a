//! KOC Support Chat
//!
//! A chat widget for a remote completion service, served as a single web page.
//! Replies can be buffered or streamed fragment by fragment, and are rendered
//! with a small markdown subset.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server that renders the page and feeds it UI events over SSE
//! - **Controller**: Owns the transcript and flags, drives one exchange at a time
//! - **Client**: `reqwest`-based client for the completion service
//!
//! # Modules
//!
//! - [`api`]: Completion service wire types, client and stream framing
//! - [`controller`]: Submission, buffered and streamed exchanges
//! - [`normalized`]: UI event model and fan-out
//! - [`session`]: Transcript and widget flags
//! - [`markdown`]: Markdown-lite rendering
//! - [`notify`], [`connectivity`], [`stats`], [`diagnostics`]: widget affordances
//! - [`ui`]: Page and fragment markup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod markdown;
pub mod normalized;
pub mod notify;
pub mod server;
pub mod session;
pub mod stats;
pub mod ui;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::controller::ChatController;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The chat widget controller.
    pub controller: Arc<ChatController>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

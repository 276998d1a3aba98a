//! Widget markup.
//!
//! - [`page`]: the full page, rendered from the current controller state
//! - [`fragments`]: entry, sidebar and status markup reused by live UI events

pub mod fragments;
pub mod page;

pub use fragments::entry_html;
pub use page::{ChatPage, render_chat_page};

//! HTML fragments shared by the page render and live UI events.

use std::fmt::Write as _;

use crate::connectivity::ConnectivityStatus;
use crate::markdown::escape_html;
use crate::session::{ChatEntry, EntryKind, Sender};
use crate::stats::StatsView;

/// Text shown inside the typing indicator.
pub const TYPING_TEXT: &str = "AI is replying";

/// Markup of a transcript entry, as appended to `#chatMessages`.
pub fn entry_html(entry: &ChatEntry) -> String {
    let avatar = match entry.sender {
        Sender::Bot => "🤖",
        Sender::User => "👤",
    };

    let content = match entry.kind {
        EntryKind::Typing => format!(
            r#"<div class="typing-indicator">{TYPING_TEXT}<div class="typing-dots"><div class="typing-dot"></div><div class="typing-dot"></div><div class="typing-dot"></div></div></div>"#
        ),
        EntryKind::Message => format!(
            r#"<div class="message-text">{}</div><div class="message-time">{}</div>"#,
            entry.html,
            escape_html(&entry.time_label)
        ),
    };

    format!(
        r#"<div class="message {sender}-message" id="entry-{id}"><div class="message-avatar">{avatar}</div><div class="message-content">{content}</div></div>"#,
        sender = entry.sender.as_str(),
        id = entry.id,
    )
}

/// All transcript entries, concatenated.
pub fn transcript_html(entries: &[ChatEntry]) -> String {
    entries.iter().map(entry_html).collect()
}

/// Sidebar statistics block.
pub fn stats_html(stats: &StatsView) -> String {
    let rows = [
        ("totalDocs", "Documents", &stats.total_documents),
        ("totalTopics", "Topics", &stats.supported_topics),
        ("responseTime", "Response time", &stats.response_time),
        ("accuracy", "Accuracy", &stats.accuracy),
    ];

    let mut out = String::from(r#"<div class="stats">"#);
    for (id, label, value) in rows {
        let _ = write!(
            out,
            r#"<div class="stat"><span class="stat-value" id="{id}">{}</span><span class="stat-label">{label}</span></div>"#,
            escape_html(value)
        );
    }
    out.push_str("</div>");
    out
}

/// Status dot plus label.
pub fn status_html(status: ConnectivityStatus) -> String {
    format!(
        r#"<div class="status"><div class="status-indicator {}"></div><span>{}</span></div>"#,
        status.css_class(),
        status.label()
    )
}

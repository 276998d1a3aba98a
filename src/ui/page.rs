//! Server-rendered widget page.
//!
//! The page is rendered once with the current state. After that, the inline
//! script only applies [`UiEvent`](crate::normalized::UiEvent)s received from
//! `/api/events` and posts user actions back to the API.

use std::fmt::Write as _;

use crate::connectivity::ConnectivityStatus;
use crate::markdown::escape_html;
use crate::notify::ToastKind;
use crate::session::ChatEntry;
use crate::stats::StatsView;

use super::fragments::{stats_html, status_html, transcript_html};

/// State needed to render the page.
#[derive(Debug)]
pub struct ChatPage<'a> {
    pub title: &'a str,
    pub entries: &'a [ChatEntry],
    pub stats: &'a StatsView,
    pub status: ConnectivityStatus,
    pub streaming: bool,
    pub loading: bool,
    pub quick_questions: &'a [String],
}

/// Generate the HTML shell for the application.
fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="KOC support chat">
    <title>{title}</title>
    <style>{STYLE}{toast_style}</style>
</head>
<body>
    {content}
    <div id="toasts" class="toasts"></div>
    <script>{SCRIPT}</script>
</body>
</html>"#,
        title = escape_html(title),
        toast_style = toast_style(),
    )
}

/// Render the complete chat page.
pub fn render_chat_page(page: &ChatPage<'_>) -> String {
    let mut quick = String::new();
    for question in page.quick_questions {
        let q = escape_html(question);
        let _ = write!(
            quick,
            r#"<button type="button" class="quick-btn" data-question="{q}">{q}</button>"#
        );
    }

    let disabled = if page.loading { " disabled" } else { "" };
    let checked = if page.streaming { " checked" } else { "" };
    let send_label = if page.loading { "⏳" } else { "➤" };

    let content = format!(
        r#"<div class="app">
        <aside class="sidebar">
            <h1>{title}</h1>
            {status}
            {stats}
            <div class="quick">
                <h2>Quick questions</h2>
                {quick}
            </div>
            <div class="diagnostics">
                <h2>API tests</h2>
                <button type="button" data-diagnostic="health">Health</button>
                <button type="button" data-diagnostic="models">Models</button>
                <button type="button" data-diagnostic="stats">Stats</button>
            </div>
        </aside>
        <main class="chat">
            <div id="chatMessages" class="messages" aria-live="polite">{transcript}</div>
            <div class="composer">
                <label class="toggle"><input type="checkbox" id="streamingToggle"{checked}> Streaming</label>
                <textarea id="messageInput" rows="1" placeholder="Type your message..."{disabled}></textarea>
                <button type="button" id="sendButton"{disabled}>{send_label}</button>
            </div>
            <p class="hint">Press Enter to send, Shift+Enter for new line</p>
        </main>
    </div>"#,
        title = escape_html(page.title),
        status = status_html(page.status),
        stats = stats_html(page.stats),
        transcript = transcript_html(page.entries),
    );

    html_shell(page.title, &content)
}

fn toast_style() -> String {
    [ToastKind::Success, ToastKind::Error, ToastKind::Info]
        .into_iter()
        .map(|kind| {
            let name = serde_json::to_value(kind)
                .ok()
                .and_then(|v| v.as_str().map(ToString::to_string))
                .unwrap_or_default();
            format!(".notification.{name}{{background:{}}}", kind.color())
        })
        .collect()
}

const STYLE: &str = r"
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#f4f6fb;color:#1f2937;height:100vh}
.app{display:flex;height:100vh}
.sidebar{width:280px;padding:20px;background:#1f2a44;color:#e5e7eb;display:flex;flex-direction:column;gap:18px;overflow-y:auto}
.sidebar h1{font-size:18px}
.sidebar h2{font-size:13px;text-transform:uppercase;letter-spacing:.05em;color:#9ca3af;margin-bottom:8px}
.status{display:flex;align-items:center;gap:8px;font-size:13px}
.status-indicator{width:10px;height:10px;border-radius:50%;background:#4CAF50}
.status-indicator.offline{background:#f44336}
.stats{display:grid;grid-template-columns:1fr 1fr;gap:10px}
.stat{background:rgba(255,255,255,.06);border-radius:8px;padding:10px;display:flex;flex-direction:column}
.stat-value{font-size:18px;font-weight:600}
.stat-label{font-size:11px;color:#9ca3af}
.quick-btn,.diagnostics button{display:block;width:100%;text-align:left;margin-bottom:6px;padding:8px 10px;border:0;border-radius:8px;background:rgba(255,255,255,.08);color:inherit;cursor:pointer}
.chat{flex:1;display:flex;flex-direction:column}
.messages{flex:1;overflow-y:auto;padding:20px;display:flex;flex-direction:column;gap:14px}
.message{display:flex;gap:10px;max-width:760px}
.user-message{align-self:flex-end;flex-direction:row-reverse}
.message-avatar{font-size:22px}
.message-content{background:#fff;border-radius:12px;padding:10px 14px;box-shadow:0 1px 3px rgba(0,0,0,.08)}
.user-message .message-content{background:#3b82f6;color:#fff}
.message-text ul{margin:4px 0 4px 18px}
.message-time{font-size:11px;opacity:.6;margin-top:4px}
.typing-indicator{display:flex;align-items:center;gap:8px;font-size:13px;color:#6b7280}
.typing-dots{display:flex;gap:3px}
.typing-dot{width:6px;height:6px;border-radius:50%;background:#9ca3af;animation:blink 1.4s infinite both}
.typing-dot:nth-child(2){animation-delay:.2s}
.typing-dot:nth-child(3){animation-delay:.4s}
@keyframes blink{0%,80%,100%{opacity:.2}40%{opacity:1}}
.composer{display:flex;gap:8px;align-items:flex-end;padding:12px 20px;background:#fff;border-top:1px solid #e5e7eb}
.composer textarea{flex:1;resize:none;max-height:120px;padding:10px 12px;border:1px solid #d1d5db;border-radius:10px;font:inherit}
.composer button{width:44px;height:44px;border:0;border-radius:10px;background:#3b82f6;color:#fff;font-size:18px;cursor:pointer}
.composer button:disabled,.composer textarea:disabled{opacity:.5;cursor:not-allowed}
.toggle{font-size:12px;color:#6b7280;white-space:nowrap}
.hint{font-size:11px;color:#9ca3af;text-align:center;padding:0 0 8px}
.toasts{position:fixed;top:20px;right:20px;display:flex;flex-direction:column;gap:8px;z-index:10000}
.notification{color:#fff;padding:15px 20px;border-radius:8px;box-shadow:0 4px 15px rgba(0,0,0,.2);font-size:14px;animation:slideInRight .3s ease-out}
.notification.leaving{animation:slideInRight .3s ease-out reverse}
@keyframes slideInRight{from{transform:translateX(100%);opacity:0}to{transform:translateX(0);opacity:1}}
";

const SCRIPT: &str = r"
(() => {
  const $ = (id) => document.getElementById(id);
  const messages = $('chatMessages');
  const input = $('messageInput');
  const send = $('sendButton');
  const toggle = $('streamingToggle');

  const scroll = () => { messages.scrollTop = messages.scrollHeight; };
  const resize = () => {
    input.style.height = 'auto';
    input.style.height = Math.min(input.scrollHeight, 120) + 'px';
  };
  const post = (url, body) => fetch(url, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(body || {}),
  });
  const submit = () => {
    const message = input.value.trim();
    if (!message || input.disabled) return;
    post('/api/chat', { message }).then((r) => {
      if (r.ok) { input.value = ''; resize(); }
    });
  };

  send.addEventListener('click', submit);
  input.addEventListener('keydown', (e) => {
    if (e.key === 'Enter' && !e.shiftKey) { e.preventDefault(); submit(); }
  });
  input.addEventListener('input', resize);
  toggle.addEventListener('change', () => post('/api/streaming', { enabled: toggle.checked }));
  document.querySelectorAll('.quick-btn').forEach((b) => b.addEventListener('click', () => {
    input.value = b.dataset.question;
    submit();
  }));
  document.querySelectorAll('[data-diagnostic]').forEach((b) => b.addEventListener('click', () => {
    post('/api/diagnostics/' + b.dataset.diagnostic);
  }));
  window.addEventListener('online', () => post('/api/connectivity', { online: true }));
  window.addEventListener('offline', () => post('/api/connectivity', { online: false }));

  const setLoading = (loading) => {
    input.disabled = loading;
    send.disabled = loading;
    send.textContent = loading ? '⏳' : '➤';
  };
  const setStats = (d) => {
    $('totalDocs').textContent = d.total_documents;
    $('totalTopics').textContent = d.supported_topics;
    $('responseTime').textContent = d.response_time;
    $('accuracy').textContent = d.accuracy;
  };
  const setStatus = (status) => {
    document.querySelector('.status-indicator').className = 'status-indicator ' + status;
    document.querySelector('.status span').textContent = status === 'online' ? 'Online' : 'Offline';
  };

  const within = (id, sel) => document.querySelector('#entry-' + id + ' ' + sel);
  const handlers = {
    'entry.added': (d) => { messages.insertAdjacentHTML('beforeend', d.html); scroll(); },
    'entry.updated': (d) => { const el = within(d.id, '.message-text'); if (el) { el.innerHTML = d.html; scroll(); } },
    'entry.timed': (d) => { const el = within(d.id, '.message-time'); if (el) el.textContent = d.label; },
    'entry.removed': (d) => { const el = $('entry-' + d.id); if (el) el.remove(); },
    'loading.changed': (d) => setLoading(d.loading),
    'streaming.changed': (d) => { toggle.checked = d.enabled; },
    'stats.updated': setStats,
    'connectivity.changed': (d) => setStatus(d.status),
    'toast.shown': (d) => {
      const el = document.createElement('div');
      el.id = 'toast-' + d.id;
      el.className = 'notification ' + d.kind;
      el.textContent = d.message;
      $('toasts').appendChild(el);
    },
    'toast.dismissed': (d) => {
      const el = $('toast-' + d.id);
      if (el) { el.classList.add('leaving'); setTimeout(() => el.remove(), 300); }
    },
    'resync': (d) => {
      messages.innerHTML = d.transcript_html;
      setLoading(d.loading);
      toggle.checked = d.streaming;
      setStats(d.stats);
      setStatus(d.status);
      scroll();
    },
  };

  const events = new EventSource('/api/events');
  Object.entries(handlers).forEach(([name, apply]) => {
    events.addEventListener(name, (e) => apply(JSON.parse(e.data).data));
  });
  scroll();
})();
";

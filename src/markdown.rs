//! Markdown-lite rendering for chat replies.
//!
//! Only the handful of constructs the support bot actually emits are
//! recognised: `**bold**`, `## ` / `### ` header lines, `• ` bullet lines and
//! line breaks. Everything else is passed through as escaped text.

use std::sync::LazyLock;

use regex::Regex;

static BOLD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

const BULLET: &str = "• ";

/// One rendered line, before line breaks are inserted.
enum Line {
    Text(String),
    Bullet(String),
}

/// Convert reply text into the HTML shown inside a message bubble.
///
/// # Example
///
/// ```rust
/// use koc_support_chat::markdown::format_message;
///
/// assert_eq!(
///     format_message("## Steps\n• **Sign up**\n• Verify"),
///     "<h3>Steps</h3><br><ul><li><strong>Sign up</strong></li><li>Verify</li></ul>"
/// );
/// ```
pub fn format_message(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let escaped = escape_html(content);
    let lines: Vec<Line> = escaped.split('\n').map(render_line).collect();

    let mut out = String::with_capacity(escaped.len() + 32);
    let mut in_list = false;
    for (idx, line) in lines.iter().enumerate() {
        match line {
            Line::Bullet(item) => {
                if !in_list {
                    if idx > 0 {
                        out.push_str("<br>");
                    }
                    out.push_str("<ul>");
                    in_list = true;
                }
                out.push_str("<li>");
                out.push_str(item);
                out.push_str("</li>");
            }
            Line::Text(text) => {
                if in_list {
                    out.push_str("</ul>");
                    in_list = false;
                }
                if idx > 0 {
                    out.push_str("<br>");
                }
                out.push_str(text);
            }
        }
    }
    if in_list {
        out.push_str("</ul>");
    }
    out
}

fn render_line(line: &str) -> Line {
    let line = BOLD_REGEX.replace_all(line, "<strong>$1</strong>");

    if let Some(title) = line.strip_prefix("### ") {
        return Line::Text(format!("<h4>{title}</h4>"));
    }
    if let Some(title) = line.strip_prefix("## ") {
        return Line::Text(format!("<h3>{title}</h3>"));
    }

    match line.find(BULLET) {
        Some(0) => Line::Bullet(line[BULLET.len()..].to_string()),
        // Text before the bullet stays on the line; only the rest becomes an item.
        Some(pos) => Line::Text(format!(
            "{}<ul><li>{}</li></ul>",
            &line[..pos],
            &line[pos + BULLET.len()..]
        )),
        None => Line::Text(line.into_owned()),
    }
}

/// Escape text for safe inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

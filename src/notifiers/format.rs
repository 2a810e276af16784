//! Message rendering shared by the text-based notifiers.

use std::collections::BTreeSet;

use super::NotificationEvent;

pub const TELEGRAM_MESSAGE_CHAR_LIMIT: usize = 4096;
pub const MESSAGE_TRUNCATION_SUFFIX: &str = "... (message truncated)";

const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Plain,
    MarkdownV2,
}

impl MessageStyle {
    fn text(self, s: &str) -> String {
        match self {
            MessageStyle::Plain => s.to_string(),
            MessageStyle::MarkdownV2 => escape_markdown_v2(s),
        }
    }

    fn bold(self, s: &str) -> String {
        match self {
            MessageStyle::Plain => s.to_string(),
            MessageStyle::MarkdownV2 => format!("*{}*", escape_markdown_v2(s)),
        }
    }

    fn italic(self, s: &str) -> String {
        match self {
            MessageStyle::Plain => s.to_string(),
            MessageStyle::MarkdownV2 => format!("_{}_", escape_markdown_v2(s)),
        }
    }
}

/// Escape every character Telegram's MarkdownV2 treats as markup.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render a new-event or updated-event message.
pub fn render(event: &NotificationEvent, style: MessageStyle) -> String {
    let item = &event.item;
    let mut lines: Vec<String> = Vec::new();

    if event.is_update() {
        lines.push(format!("🔔 {}", style.bold(&format!("Updated {} Event", item.category))));
        lines.push(String::new());
        lines.push(format!("🎬 {}", style.bold(&item.subject_name)));
    } else {
        lines.push(format!("🎬 {}", style.bold(&format!("New {} Event!", item.category))));
        lines.push(String::new());
        lines.push(style.bold(&item.subject_name));
    }

    lines.push(format!("📍 {}", style.text(&item.source_name)));
    lines.push(format!("📅 {}", style.text(&item.date.format("%a %b %-d, %Y").to_string())));

    let details = details_line(item.runtime_minutes, item.rating.as_deref());
    if !details.is_empty() {
        lines.push(format!("⏳ {}", style.italic(&details)));
    }

    if event.is_update() {
        push_section(&mut lines, style, "✅", "New showtimes:", &event.diff.added);
        push_section(&mut lines, style, "❌", "Removed showtimes:", &event.diff.removed);
        push_section(&mut lines, style, "📌", "Still available:", &event.diff.retained);
    } else {
        let showtimes: Vec<&str> = item.attributes.iter().map(String::as_str).collect();
        lines.push(format!("⏰ {}", style.text(&showtimes.join(", "))));
    }

    lines.join("\n").trim().to_string()
}

fn details_line(runtime: Option<u32>, rating: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(minutes) = runtime {
        parts.push(format!("{}min", minutes));
    }
    if let Some(rating) = rating {
        parts.push(format!("[{}]", rating));
    }
    parts.join(" ")
}

fn push_section(lines: &mut Vec<String>, style: MessageStyle, icon: &str, title: &str, times: &BTreeSet<String>) {
    if times.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{} {}", icon, style.bold(title)));
    for time in times {
        lines.push(format!("  ⏰ {}", style.text(time)));
    }
}

/// Cap `message` at `limit` characters, appending the truncation suffix.
pub fn truncate(message: &str, limit: usize, style: MessageStyle) -> String {
    if message.chars().count() <= limit {
        return message.to_string();
    }

    let suffix = style.text(MESSAGE_TRUNCATION_SUFFIX);
    let keep = limit.saturating_sub(suffix.chars().count() + 1);
    let mut head: String = message.chars().take(keep).collect();

    // Never leave a dangling escape character.
    if style == MessageStyle::MarkdownV2 {
        let trailing = head.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            head.pop();
        }
    }

    format!("{}\n{}", head, suffix)
}

use crate::types::{ChatMessage, ChatRole, StorageInfo, StoredChat, StoredSummary};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Format the age of an entry relative to `now` (both epoch milliseconds)
pub fn format_age(timestamp: i64, now: i64) -> String {
    let age = (now - timestamp).max(0);
    if age < MINUTE_MS {
        "just now".to_string()
    } else if age < HOUR_MS {
        format!("{}m ago", age / MINUTE_MS)
    } else if age < DAY_MS {
        format!("{}h ago", age / HOUR_MS)
    } else {
        format!("{}d ago", age / DAY_MS)
    }
}

pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn format_summary_readable(video_id: &str, title: &str, summary: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", title));
    output.push_str(&format!("**Video ID:** {}\n\n", video_id));
    output.push_str(summary.trim_end());
    output.push('\n');
    output
}

/// Render a conversation as Markdown, one block per turn
pub fn format_chat(messages: &[ChatMessage]) -> String {
    let mut output = String::new();
    for message in messages {
        let speaker = match message.role {
            ChatRole::User => "You",
            ChatRole::Model => "Gemini",
        };
        output.push_str(&format!("**{}:** {}\n\n", speaker, message.content.trim()));
    }
    output
}

pub fn format_summary_history(entries: &[StoredSummary], now: i64) -> String {
    if entries.is_empty() {
        return "No saved summaries.\n".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        output.push_str(&format!(
            "{}  {}  ({})\n",
            entry.video_id,
            entry.video_title,
            format_age(entry.timestamp, now)
        ));
    }
    output
}

pub fn format_chat_history(entries: &[StoredChat], now: i64) -> String {
    if entries.is_empty() {
        return "No saved chats.\n".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        output.push_str(&format!(
            "{}  {}  ({} messages, {})\n",
            entry.video_id,
            entry.video_title,
            entry.messages.len(),
            format_age(entry.timestamp, now)
        ));
    }
    output
}

pub fn format_storage_info(info: &StorageInfo) -> String {
    let mut output = String::new();
    output.push_str(&format!("Summaries: {}\n", info.summary_count));
    output.push_str(&format!("Chats:     {}\n", info.chat_count));
    output.push_str(&format!("Size:      {}\n", format_size(info.total_size)));
    output
}

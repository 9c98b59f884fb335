use std::{
    collections::BTreeMap,
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Transcript data scraped from a video page.
///
/// Crosses context boundaries as a plain string; a string starting with
/// `http` is a caption-track URL rather than caption text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Transcript {
    /// Joined transcript segments or live caption text
    Text(String),
    /// Base URL of a timed-caption resource embedded in the page data
    CaptionTrack(String),
}

impl Transcript {
    pub fn as_str(&self) -> &str {
        match self {
            Transcript::Text(text) | Transcript::CaptionTrack(text) => text,
        }
    }

    /// Caption text, if this is not a caption-track reference
    pub fn text(&self) -> Option<&str> {
        match self {
            Transcript::Text(text) => Some(text),
            Transcript::CaptionTrack(_) => None,
        }
    }

    pub fn is_caption_track(&self) -> bool {
        matches!(self, Transcript::CaptionTrack(_))
    }
}

impl From<String> for Transcript {
    fn from(raw: String) -> Self {
        if raw.starts_with("http") {
            Transcript::CaptionTrack(raw)
        } else {
            Transcript::Text(raw)
        }
    }
}

impl From<Transcript> for String {
    fn from(transcript: Transcript) -> Self {
        match transcript {
            Transcript::Text(text) | Transcript::CaptionTrack(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub video_id: String,
    pub video_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ChatRole {
    User,
    Model,
}

impl From<String> for ChatRole {
    fn from(role: String) -> Self {
        // Anything that is not the user speaks for the model
        if role == "user" {
            ChatRole::User
        } else {
            ChatRole::Model
        }
    }
}

impl From<ChatRole> for &'static str {
    fn from(role: ChatRole) -> Self {
        role.as_str()
    }
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSummary {
    pub video_id: String,
    pub video_title: String,
    pub summary: String,
    /// Epoch milliseconds of the last write
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChat {
    pub video_id: String,
    pub video_title: String,
    pub messages: Vec<ChatMessage>,
    /// Epoch milliseconds of the last write
    pub timestamp: i64,
}

/// The whole persisted state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageData {
    pub summaries: BTreeMap<String, StoredSummary>,
    pub chats: BTreeMap<String, StoredChat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub summary_count: usize,
    pub chat_count: usize,
    /// Length of the compact JSON serialization of [`StorageData`]
    pub total_size: usize,
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

use serde::{Deserialize, Serialize};

use crate::types::{Transcript, VideoDescriptor};

/// Requests the background context forwards to the content context of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentRequest {
    /// Title plus transcript, opening the transcript panel if needed
    GetVideoDetails,
    /// One-shot scrape without touching the page
    GetTranscript,
    /// Fire-and-forget attempt to reveal the transcript panel
    OpenTranscript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContentResponse {
    VideoDetails(VideoDetails),
    Transcript { transcript: Option<Transcript> },
    Ack {},
}

/// Requests the presentation layer sends to the background context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundRequest {
    GetVideoData,
    /// Forwarded as [`ContentRequest::GetTranscript`] to the active watch tab
    GetTranscript,
    /// Forwarded as [`ContentRequest::OpenTranscript`] to the active watch tab
    OpenTranscript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BackgroundResponse {
    VideoData(VideoData),
    Transcript { transcript: Option<Transcript> },
    /// `delivered` is false when no content context took the request
    Ack { delivered: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub video_id: Option<String>,
    pub video_title: String,
    pub transcript: Option<Transcript>,
}

impl VideoData {
    /// Reply used for every failure on the way to the page
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn descriptor(&self) -> Option<VideoDescriptor> {
        self.video_id.as_ref().map(|video_id| VideoDescriptor {
            video_id: video_id.clone(),
            video_title: self.video_title.clone(),
        })
    }
}

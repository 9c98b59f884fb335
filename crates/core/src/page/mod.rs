//! Access to a loaded YouTube watch page.
//!
//! Everything that touches page structure goes through the [`Page`]
//! capability, so the scraping heuristics can run against a live fetch, a
//! saved snapshot, or a scripted fake in tests.

pub mod opener;
pub mod scrape;
pub mod source;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::{fs, sync::OnceCell};

pub use opener::{OpenError, OpenOutcome, RetryPolicy, open_transcript, transcript_with_retry};
pub use scrape::{
    canonical_url, has_transcript_panel, is_watch_url, normalize_watch_url, scrape_transcript,
    video_id, video_title,
};
pub use source::{PageTranscriptSource, TranscriptSource};

pub const TRANSCRIPT_PANEL: &str = "ytd-transcript-segment-list-renderer";
pub const TRANSCRIPT_SEGMENT: &str = "ytd-transcript-segment-renderer";
pub const SEGMENT_TEXT: &str = ".segment-text";
pub const LIVE_CAPTION: &str = ".ytp-caption-segment";
pub const SHOW_TRANSCRIPT_BUTTON: &str = r#"button[aria-label="Show transcript"]"#;
pub const MENU_BUTTON: &str = "#button-shape > button.yt-spec-button-shape-next";
pub const LAST_MENU_ITEM: &str = "yt-menu-service-item-renderer:last-child";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to load {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("Failed to read page snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A loaded page as seen from inside the tab.
#[async_trait]
pub trait Page: Send + Sync {
    fn url(&self) -> &str;

    /// Serialized HTML of the current document.
    async fn html(&self) -> Result<String, PageError>;

    /// Click the first element matching `selector`.
    ///
    /// Returns `false` when no such element can be clicked.
    async fn click(&self, selector: &str) -> Result<bool, PageError>;
}

/// A saved copy of a watch page, e.g. stored from a browser with the
/// transcript panel open. Snapshots are frozen, so nothing can be clicked.
pub struct SnapshotPage {
    url: String,
    html: String,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Load a snapshot from disk. Without an explicit URL the page's
    /// canonical link is used.
    pub async fn open(path: &Path, url: Option<String>) -> Result<Self, PageError> {
        let html = fs::read_to_string(path)
            .await
            .map_err(|source| PageError::Snapshot {
                path: path.to_path_buf(),
                source,
            })?;
        let url = url
            .or_else(|| canonical_url(&html))
            .unwrap_or_default();

        Ok(Self { url, html })
    }
}

#[async_trait]
impl Page for SnapshotPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn html(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }

    async fn click(&self, _selector: &str) -> Result<bool, PageError> {
        Ok(false)
    }
}

/// A watch page fetched over HTTP. The document is downloaded on first
/// access and reused afterwards; server-rendered pages carry no interactive
/// controls, so clicks never land.
pub struct HttpPage {
    client: Client,
    url: String,
    document: OnceCell<String>,
}

impl HttpPage {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            document: OnceCell::new(),
        }
    }

    /// Client with the timeout and headers watch pages expect
    pub fn default_client() -> Result<Client, PageError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0")
            .build()?)
    }

    async fn fetch(&self) -> Result<String, PageError> {
        tracing::debug!(url = %self.url, "Fetching watch page");
        let response = self
            .client
            .get(&self.url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::LoadFailed {
                url: self.url.clone(),
                reason: format!("HTTP {}", status),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Page for HttpPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn html(&self) -> Result<String, PageError> {
        self.document
            .get_or_try_init(|| self.fetch())
            .await
            .cloned()
    }

    async fn click(&self, _selector: &str) -> Result<bool, PageError> {
        Ok(false)
    }
}

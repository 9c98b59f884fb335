use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::{sync::broadcast, time::sleep};

use crate::{
    page::{is_watch_url, video_id},
    relay::{
        Context, ContextHandle, RelayConfig, RelayError,
        content::ContentHandle,
        messages::{BackgroundRequest, BackgroundResponse, ContentRequest, ContentResponse, VideoData},
        spawn_context,
    },
    types::Transcript,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: u32,
    pub url: String,
}

/// The browser as seen from the background context.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn active_tab(&self) -> Option<Tab>;

    /// Start a content context bound to `tab`'s page.
    async fn inject_content_script(
        &self,
        tab: &Tab,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<ContentHandle, RelayError>;
}

pub type BackgroundHandle = ContextHandle<BackgroundRequest, BackgroundResponse>;

fn unexpected(context: &'static str) -> RelayError {
    RelayError::UnexpectedResponse { context }
}

impl BackgroundHandle {
    /// Video data of the active tab. Relay failures come back as
    /// [`VideoData::empty`].
    pub async fn video_data(&self) -> VideoData {
        match self.request(BackgroundRequest::GetVideoData).await {
            Ok(BackgroundResponse::VideoData(data)) => data,
            Ok(_) => {
                tracing::warn!(error = %unexpected(Background::CONTEXT_ID), "Message error");
                VideoData::empty()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Background context unavailable");
                VideoData::empty()
            }
        }
    }

    /// One scrape of the active tab, without touching the page.
    pub async fn transcript(&self) -> Option<Transcript> {
        match self.request(BackgroundRequest::GetTranscript).await {
            Ok(BackgroundResponse::Transcript { transcript }) => transcript,
            Ok(_) => {
                tracing::warn!(error = %unexpected(Background::CONTEXT_ID), "Message error");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Background context unavailable");
                None
            }
        }
    }

    /// Ask the active tab to reveal its transcript panel. Returns once the
    /// content context has acknowledged, before the panel is open.
    pub async fn open_transcript(&self) -> bool {
        match self.request(BackgroundRequest::OpenTranscript).await {
            Ok(BackgroundResponse::Ack { delivered }) => delivered,
            Ok(_) => {
                tracing::warn!(error = %unexpected(Background::CONTEXT_ID), "Message error");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Background context unavailable");
                false
            }
        }
    }
}

pub struct Background {
    host: Arc<dyn TabHost>,
    config: RelayConfig,
    scripts: HashMap<u32, ContentHandle>,
    shutdown: broadcast::Sender<()>,
}

impl Background {
    pub fn new(host: Arc<dyn TabHost>, config: RelayConfig, shutdown: broadcast::Sender<()>) -> Self {
        Self {
            host,
            config,
            scripts: HashMap::new(),
            shutdown,
        }
    }

    /// Start the background context and return its handle.
    pub fn spawn(
        host: Arc<dyn TabHost>,
        config: RelayConfig,
        shutdown: &broadcast::Sender<()>,
    ) -> BackgroundHandle {
        let capacity = config.inbox_capacity;
        let background = Self::new(host, config, shutdown.clone());
        spawn_context(background, capacity, shutdown.subscribe())
    }

    async fn ensure_content_script(&mut self, tab: &Tab) -> Result<ContentHandle, RelayError> {
        if let Some(handle) = self.scripts.get(&tab.id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let handle = self
            .host
            .inject_content_script(tab, self.shutdown.subscribe())
            .await?;
        self.scripts.insert(tab.id, handle.clone());
        Ok(handle)
    }

    /// Deliver `request` to the content context of the active watch tab,
    /// injecting it first if needed. `None` on any failure on the way.
    async fn to_content(&mut self, request: ContentRequest) -> Option<(Tab, ContentResponse)> {
        let Some(tab) = self.host.active_tab().await.filter(|tab| is_watch_url(&tab.url)) else {
            tracing::info!("Active tab is not a YouTube watch page");
            return None;
        };

        let script = match self.ensure_content_script(&tab).await {
            Ok(script) => script,
            Err(e) => {
                tracing::warn!(tab = tab.id, error = %e, "Script injection failed");
                return None;
            }
        };

        sleep(self.config.settle_delay).await;

        match script.request(request).await {
            Ok(response) => Some((tab, response)),
            Err(e) => {
                tracing::warn!(tab = tab.id, error = %e, "Message error");
                self.scripts.remove(&tab.id);
                None
            }
        }
    }

    async fn video_data(&mut self) -> VideoData {
        match self.to_content(ContentRequest::GetVideoDetails).await {
            Some((tab, ContentResponse::VideoDetails(details))) => VideoData {
                video_id: video_id(&tab.url),
                video_title: details.title,
                transcript: details.transcript,
            },
            Some(_) => {
                tracing::warn!(error = %unexpected("content"), "Message error");
                VideoData::empty()
            }
            None => VideoData::empty(),
        }
    }

    async fn transcript(&mut self) -> Option<Transcript> {
        match self.to_content(ContentRequest::GetTranscript).await? {
            (_, ContentResponse::Transcript { transcript }) => transcript,
            _ => {
                tracing::warn!(error = %unexpected("content"), "Message error");
                None
            }
        }
    }

    async fn open_transcript(&mut self) -> bool {
        matches!(
            self.to_content(ContentRequest::OpenTranscript).await,
            Some((_, ContentResponse::Ack {}))
        )
    }
}

impl Context for Background {
    const CONTEXT_ID: &'static str = "background";
    type Request = BackgroundRequest;
    type Response = BackgroundResponse;

    async fn handle(&mut self, request: BackgroundRequest) -> BackgroundResponse {
        match request {
            BackgroundRequest::GetVideoData => BackgroundResponse::VideoData(self.video_data().await),
            BackgroundRequest::GetTranscript => BackgroundResponse::Transcript {
                transcript: self.transcript().await,
            },
            BackgroundRequest::OpenTranscript => BackgroundResponse::Ack {
                delivered: self.open_transcript().await,
            },
        }
    }
}

use std::sync::Arc;

use crate::{
    page::TranscriptSource,
    relay::{
        Context, ContextHandle,
        messages::{ContentRequest, ContentResponse, VideoDetails},
    },
};

pub type ContentHandle = ContextHandle<ContentRequest, ContentResponse>;

/// The context living inside a tab, next to the page.
pub struct ContentScript {
    source: Arc<dyn TranscriptSource>,
}

impl ContentScript {
    pub fn new(source: Arc<dyn TranscriptSource>) -> Self {
        Self { source }
    }
}

impl Context for ContentScript {
    const CONTEXT_ID: &'static str = "content";
    type Request = ContentRequest;
    type Response = ContentResponse;

    async fn handle(&mut self, request: ContentRequest) -> ContentResponse {
        match request {
            ContentRequest::GetVideoDetails => {
                let title = self.source.title().await;
                let transcript = self.source.transcript_with_retry().await;
                ContentResponse::VideoDetails(VideoDetails { title, transcript })
            }
            ContentRequest::GetTranscript => ContentResponse::Transcript {
                transcript: self.source.transcript().await,
            },
            ContentRequest::OpenTranscript => {
                let source = Arc::clone(&self.source);
                tokio::spawn(async move {
                    if let Err(e) = source.open_transcript().await {
                        tracing::warn!(error = %e, "Failed to open transcript");
                    }
                });
                ContentResponse::Ack {}
            }
        }
    }
}

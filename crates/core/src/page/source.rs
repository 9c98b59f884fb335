use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    page::{
        OpenError, OpenOutcome, Page, RetryPolicy, open_transcript, scrape::video_title,
        scrape_transcript, transcript_with_retry,
    },
    types::Transcript,
};

/// Where the content context gets its transcript from.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Video title as shown by the page, empty when unknown
    async fn title(&self) -> String;

    /// Single scrape without interacting with the page
    async fn transcript(&self) -> Option<Transcript>;

    /// Scrape, opening the transcript panel between attempts
    async fn transcript_with_retry(&self) -> Option<Transcript>;

    async fn open_transcript(&self) -> Result<OpenOutcome, OpenError>;
}

pub struct PageTranscriptSource {
    page: Arc<dyn Page>,
    policy: RetryPolicy,
}

impl PageTranscriptSource {
    pub fn new(page: Arc<dyn Page>, policy: RetryPolicy) -> Self {
        Self { page, policy }
    }
}

#[async_trait]
impl TranscriptSource for PageTranscriptSource {
    async fn title(&self) -> String {
        match self.page.html().await {
            Ok(html) => video_title(&html),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read page title");
                String::new()
            }
        }
    }

    async fn transcript(&self) -> Option<Transcript> {
        match self.page.html().await {
            Ok(html) => scrape_transcript(&html),
            Err(e) => {
                tracing::warn!(error = %e, "Transcript error");
                None
            }
        }
    }

    async fn transcript_with_retry(&self) -> Option<Transcript> {
        transcript_with_retry(self.page.as_ref(), &self.policy).await
    }

    async fn open_transcript(&self) -> Result<OpenOutcome, OpenError> {
        open_transcript(self.page.as_ref(), self.policy.menu_delay).await
    }
}

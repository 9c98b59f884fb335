use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    page::{Page, PageTranscriptSource, RetryPolicy},
    relay::{
        RelayError,
        background::{Tab, TabHost},
        content::{ContentHandle, ContentScript},
        spawn_context,
    },
};

const CONTENT_INBOX_CAPACITY: usize = 8;

/// A single-tab browser: the page the user pointed the CLI at.
pub struct BrowserSession {
    tab: Option<(Tab, Arc<dyn Page>)>,
    policy: RetryPolicy,
}

impl BrowserSession {
    pub fn new(page: Arc<dyn Page>, policy: RetryPolicy) -> Self {
        let tab = Tab {
            id: 1,
            url: page.url().to_string(),
        };
        Self {
            tab: Some((tab, page)),
            policy,
        }
    }

    /// A session without any open tab
    pub fn empty() -> Self {
        Self {
            tab: None,
            policy: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl TabHost for BrowserSession {
    async fn active_tab(&self) -> Option<Tab> {
        self.tab.as_ref().map(|(tab, _)| tab.clone())
    }

    async fn inject_content_script(
        &self,
        tab: &Tab,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<ContentHandle, RelayError> {
        let page = match &self.tab {
            Some((open, page)) if open.id == tab.id => Arc::clone(page),
            _ => {
                return Err(RelayError::InjectionFailed {
                    reason: format!("No tab with id {}", tab.id),
                });
            }
        };

        // The page has to be reachable before anything can run inside it
        page.html()
            .await
            .map_err(|e| RelayError::InjectionFailed {
                reason: e.to_string(),
            })?;

        let source = PageTranscriptSource::new(page, self.policy.clone());
        tracing::debug!(tab = tab.id, url = %tab.url, "Injected content script");
        Ok(spawn_context(
            ContentScript::new(Arc::new(source)),
            CONTENT_INBOX_CAPACITY,
            shutdown,
        ))
    }
}

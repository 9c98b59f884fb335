use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::{
    page::{
        LAST_MENU_ITEM, MENU_BUTTON, Page, PageError, SHOW_TRANSCRIPT_BUTTON,
        scrape::{has_transcript_panel, scrape_transcript},
    },
    types::Transcript,
};

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Transcript option not found in menu")]
    MenuItemNotFound,

    #[error("No transcript controls found")]
    NoControls,

    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    AlreadyOpen,
    ClickedButton,
    ClickedMenuItem,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    /// Added to the wait once per previous attempt
    pub step: Duration,
    /// Wait between opening the overflow menu and picking its item
    pub menu_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
            step: Duration::from_millis(500),
            menu_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }
}

/// Try to reveal the transcript panel by clicking through the page UI.
///
/// Best effort: depends on undocumented page structure. The overflow menu
/// path assumes its last item is the transcript option.
pub async fn open_transcript(
    page: &dyn Page,
    menu_delay: Duration,
) -> Result<OpenOutcome, OpenError> {
    let html = page.html().await?;
    if has_transcript_panel(&html) {
        tracing::debug!("Transcript panel already open");
        return Ok(OpenOutcome::AlreadyOpen);
    }

    if page.click(SHOW_TRANSCRIPT_BUTTON).await? {
        tracing::debug!("Clicked transcript button");
        return Ok(OpenOutcome::ClickedButton);
    }

    if !page.click(MENU_BUTTON).await? {
        return Err(OpenError::NoControls);
    }

    tracing::debug!("Opened menu to find transcript");
    sleep(menu_delay).await;

    if page.click(LAST_MENU_ITEM).await? {
        tracing::debug!("Clicked transcript option from menu");
        Ok(OpenOutcome::ClickedMenuItem)
    } else {
        Err(OpenError::MenuItemNotFound)
    }
}

async fn scrape_current(page: &dyn Page) -> Option<Transcript> {
    match page.html().await {
        Ok(html) => scrape_transcript(&html),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read page");
            None
        }
    }
}

/// Scrape the transcript, opening the transcript panel and re-scraping
/// with growing waits when nothing is visible yet.
pub async fn transcript_with_retry(page: &dyn Page, policy: &RetryPolicy) -> Option<Transcript> {
    if let Some(transcript) = scrape_current(page).await {
        tracing::info!("Transcript found immediately");
        return Some(transcript);
    }

    tracing::info!("No transcript found, attempting to open transcript panel");

    for attempt in 0..policy.attempts {
        if let Err(e) = open_transcript(page, policy.menu_delay).await {
            tracing::warn!(attempt = attempt + 1, error = %e, "Transcript attempt failed");
            continue;
        }

        sleep(policy.delay_for(attempt)).await;

        if let Some(transcript) = scrape_current(page).await {
            tracing::info!(attempt = attempt + 1, "Transcript found after opening panel");
            return Some(transcript);
        }
    }

    tracing::info!("Failed to get transcript after all attempts");
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    pub const EMPTY_PAGE: &str = "<html><head><title>Talk - YouTube</title></head><body></body></html>";
    pub const OPEN_PANEL: &str = r#"<html><head><title>Talk - YouTube</title></head><body>
        <ytd-transcript-segment-list-renderer>
          <ytd-transcript-segment-renderer><div class="segment-text">first</div></ytd-transcript-segment-renderer>
          <ytd-transcript-segment-renderer><div class="segment-text">second</div></ytd-transcript-segment-renderer>
        </ytd-transcript-segment-list-renderer>
        </body></html>"#;

    /// Page whose clicks can reveal the transcript panel.
    pub struct ScriptedPage {
        pub state: Mutex<String>,
        /// Selectors that are clickable; clicking the last one opens the panel
        pub controls: Vec<&'static str>,
        pub clicks: Mutex<Vec<String>>,
        pub reveals_panel: bool,
    }

    impl ScriptedPage {
        pub fn new(controls: Vec<&'static str>) -> Self {
            Self {
                state: Mutex::new(EMPTY_PAGE.to_string()),
                controls,
                clicks: Mutex::new(Vec::new()),
                reveals_panel: true,
            }
        }

        pub fn clicks(&self) -> Vec<String> {
            self.clicks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Page for ScriptedPage {
        fn url(&self) -> &str {
            "https://www.youtube.com/watch?v=abc123"
        }

        async fn html(&self) -> Result<String, PageError> {
            Ok(self.state.lock().unwrap().clone())
        }

        async fn click(&self, selector: &str) -> Result<bool, PageError> {
            if !self.controls.iter().any(|c| *c == selector) {
                return Ok(false);
            }
            self.clicks.lock().unwrap().push(selector.to_string());
            if self.reveals_panel && self.controls.last().is_some_and(|c| *c == selector) {
                *self.state.lock().unwrap() = OPEN_PANEL.to_string();
            }
            Ok(true)
        }
    }

    #[tokio::test]
    async fn already_open_panel_is_a_no_op() {
        let page = ScriptedPage::new(vec![SHOW_TRANSCRIPT_BUTTON]);
        *page.state.lock().unwrap() = OPEN_PANEL.to_string();

        let outcome = open_transcript(&page, Duration::ZERO).await.unwrap();
        assert_eq!(outcome, OpenOutcome::AlreadyOpen);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn clicks_show_transcript_button() {
        let page = ScriptedPage::new(vec![SHOW_TRANSCRIPT_BUTTON]);
        let outcome = open_transcript(&page, Duration::ZERO).await.unwrap();
        assert_eq!(outcome, OpenOutcome::ClickedButton);
        assert_eq!(page.clicks(), vec![SHOW_TRANSCRIPT_BUTTON]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_overflow_menu() {
        let page = ScriptedPage::new(vec![MENU_BUTTON, LAST_MENU_ITEM]);
        let started = Instant::now();

        let outcome = open_transcript(&page, Duration::from_millis(300)).await.unwrap();
        assert_eq!(outcome, OpenOutcome::ClickedMenuItem);
        assert_eq!(page.clicks(), vec![MENU_BUTTON, LAST_MENU_ITEM]);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn menu_without_items_fails() {
        let page = ScriptedPage::new(vec![MENU_BUTTON]);
        let err = open_transcript(&page, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, OpenError::MenuItemNotFound));
    }

    #[tokio::test]
    async fn no_controls_fails() {
        let page = ScriptedPage::new(vec![]);
        let err = open_transcript(&page, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, OpenError::NoControls));
    }

    #[tokio::test]
    async fn visible_transcript_needs_no_interaction() {
        let page = ScriptedPage::new(vec![SHOW_TRANSCRIPT_BUTTON]);
        *page.state.lock().unwrap() = OPEN_PANEL.to_string();

        let transcript = transcript_with_retry(&page, &RetryPolicy::default()).await;
        assert_eq!(transcript, Some(Transcript::Text("first second".into())));
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn opens_panel_then_rescrapes_after_first_delay() {
        let page = ScriptedPage::new(vec![SHOW_TRANSCRIPT_BUTTON]);
        let started = Instant::now();

        let transcript = transcript_with_retry(&page, &RetryPolicy::default()).await;
        assert_eq!(transcript, Some(Transcript::Text("first second".into())));
        assert_eq!(page.clicks().len(), 1);

        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_growing_waits() {
        let mut page = ScriptedPage::new(vec![SHOW_TRANSCRIPT_BUTTON]);
        page.reveals_panel = false;
        let started = Instant::now();

        let transcript = transcript_with_retry(&page, &RetryPolicy::default()).await;
        assert_eq!(transcript, None);
        assert_eq!(page.clicks().len(), 3);
        // 1000 + 1500 + 2000
        assert!(started.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_openings_do_not_wait() {
        let page = ScriptedPage::new(vec![]);
        let started = Instant::now();

        let transcript = transcript_with_retry(&page, &RetryPolicy::default()).await;
        assert_eq!(transcript, None);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn delays_grow_by_step() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }
}

use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use clap::Args;
use tokio::{sync::broadcast, time::sleep};

use konspekt_core::{
    Background, BackgroundHandle, BrowserSession, HttpPage, Page, RelayConfig, RetryPolicy,
    SnapshotPage, Transcript, VideoData, page::normalize_watch_url, types::VideoDescriptor,
};

use crate::ui::{create_spinner, ok, warn};

/// Where to read the video page from
#[derive(Debug, Args)]
pub struct Target {
    /// Video URL, short link or id
    #[arg(required_unless_present = "page")]
    pub url: Option<String>,

    /// Saved HTML of a watch page (e.g. with the transcript panel open)
    #[arg(long, value_name = "FILE")]
    pub page: Option<PathBuf>,
}

async fn open_page(target: &Target) -> Result<Arc<dyn Page>> {
    let url = target.url.as_deref().map(normalize_watch_url);
    let page: Arc<dyn Page> = match (&target.page, url) {
        (Some(path), url) => Arc::new(SnapshotPage::open(path, url).await?),
        (None, Some(url)) => Arc::new(HttpPage::new(HttpPage::default_client()?, url)),
        (None, None) => bail!("Pass a video URL or --page <FILE>"),
    };
    Ok(page)
}

/// Background context over the target's page. Dropping it stops every
/// context it started.
pub struct Relay {
    background: BackgroundHandle,
    shutdown: broadcast::Sender<()>,
}

impl Relay {
    pub async fn connect(target: &Target) -> Result<Self> {
        let page = open_page(target).await?;
        let (shutdown, _) = broadcast::channel(1);
        let session = BrowserSession::new(page, RetryPolicy::default());
        let background = Background::spawn(Arc::new(session), RelayConfig::default(), &shutdown);
        Ok(Self {
            background,
            shutdown,
        })
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        // Contexts may already be gone; nothing to stop then
        let _ = self.shutdown.send(());
    }
}

/// Ask the background context for the page's video data.
pub async fn load_video(target: &Target) -> Result<(VideoDescriptor, VideoData)> {
    let relay = Relay::connect(target).await?;
    let spinner = create_spinner("Reading video page...");
    let data = relay.background().video_data().await;
    drop(relay);

    let Some(descriptor) = data.descriptor() else {
        spinner.finish_and_clear();
        bail!("Please navigate to a YouTube video page");
    };

    match &data.transcript {
        Some(t) if t.is_caption_track() => {
            spinner.finish_with_message(warn("Only a caption track reference was found"))
        }
        Some(t) => spinner.finish_with_message(ok(format!(
            "Transcript found: {} characters",
            t.as_str().chars().count()
        ))),
        None => spinner.finish_with_message(warn("No transcript, working from the title")),
    }

    Ok((descriptor, data))
}

/// Scrape the page's transcript once, optionally asking the page to open
/// its transcript panel first.
pub async fn load_transcript(target: &Target, open: bool) -> Result<Transcript> {
    let relay = Relay::connect(target).await?;

    if open {
        let spinner = create_spinner("Opening transcript panel...");
        if relay.background().open_transcript().await {
            // The page opens the panel on its own time; give it one retry wait
            sleep(RetryPolicy::default().delay_for(0)).await;
            spinner.finish_with_message(ok("Asked the page to open its transcript"));
        } else {
            spinner.finish_with_message(warn("Could not reach a YouTube watch page"));
        }
    }

    let spinner = create_spinner("Reading transcript...");
    match relay.background().transcript().await {
        Some(transcript) => {
            spinner.finish_and_clear();
            Ok(transcript)
        }
        None => {
            spinner.finish_and_clear();
            bail!("No transcript found on this page")
        }
    }
}

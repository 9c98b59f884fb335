use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::{
    page::{LIVE_CAPTION, SEGMENT_TEXT, TRANSCRIPT_PANEL, TRANSCRIPT_SEGMENT},
    types::Transcript,
};

static CAPTION_TRACKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""captionTracks":(\[.*?\])"#).unwrap());

#[derive(Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(css, error = %e, "Invalid selector");
            None
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Extract transcript data from a page document in a single pass.
///
/// Tries the open transcript panel, then the live caption overlay, then the
/// caption tracks embedded in the player data. Returns `None` when nothing
/// is found.
pub fn scrape_transcript(html: &str) -> Option<Transcript> {
    let document = Html::parse_document(html);

    if let Some(text) = from_transcript_panel(&document) {
        return Some(Transcript::Text(text));
    }

    if let Some(text) = from_live_caption(&document) {
        tracing::info!("Found live caption text");
        return Some(Transcript::Text(text));
    }

    if let Some(url) = from_caption_tracks(&document) {
        tracing::info!("Found caption track URL in page data");
        return Some(Transcript::CaptionTrack(url));
    }

    tracing::debug!("No transcript found using any method");
    None
}

pub fn has_transcript_panel(html: &str) -> bool {
    let document = Html::parse_document(html);
    selector(TRANSCRIPT_PANEL).is_some_and(|panel| document.select(&panel).next().is_some())
}

fn from_transcript_panel(document: &Html) -> Option<String> {
    let panel = document.select(&selector(TRANSCRIPT_PANEL)?).next()?;
    let segment = selector(TRANSCRIPT_SEGMENT)?;
    let segment_text = selector(SEGMENT_TEXT)?;

    let lines: Vec<String> = panel
        .select(&segment)
        .filter_map(|seg| seg.select(&segment_text).next())
        .map(|el| text_of(el).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return None;
    }

    tracing::info!(segments = lines.len(), "Found transcript panel");
    Some(lines.join(" "))
}

fn from_live_caption(document: &Html) -> Option<String> {
    let caption = document.select(&selector(LIVE_CAPTION)?).next()?;
    let text = text_of(caption);
    (!text.is_empty()).then_some(text)
}

fn from_caption_tracks(document: &Html) -> Option<String> {
    let script = selector("script")?;

    document.select(&script).find_map(|el| {
        let content = text_of(el);
        if !content.contains("captionTracks") {
            return None;
        }

        let raw = CAPTION_TRACKS.captures(&content)?.get(1)?.as_str();
        match serde_json::from_str::<Vec<CaptionTrack>>(raw) {
            Ok(tracks) => tracks.into_iter().next()?.base_url,
            Err(e) => {
                tracing::debug!(error = %e, "Error parsing caption tracks");
                None
            }
        }
    })
}

/// Document title without the site suffix
pub fn video_title(html: &str) -> String {
    let document = Html::parse_document(html);
    selector("title")
        .and_then(|title| document.select(&title).next())
        .map(|el| text_of(el).trim().replacen(" - YouTube", "", 1))
        .unwrap_or_default()
}

pub fn canonical_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let link = document
        .select(&selector(r#"link[rel="canonical"]"#)?)
        .next()?;
    link.value().attr("href").map(str::to_string)
}

pub fn is_watch_url(url: &str) -> bool {
    url.contains("youtube.com/watch")
}

/// The `v` query parameter of a watch URL
pub fn video_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Rewrite short links and bare ids into a canonical watch URL.
pub fn normalize_watch_url(input: &str) -> String {
    let input = input.trim();
    if is_watch_url(input) {
        return input.to_string();
    }

    if let Ok(url) = Url::parse(input) {
        let short_id = match url.host_str() {
            Some("youtu.be") => url.path_segments().and_then(|mut s| s.next()),
            Some(host) if host.ends_with("youtube.com") => url
                .path()
                .strip_prefix("/shorts/")
                .or_else(|| url.path().strip_prefix("/live/"))
                .and_then(|rest| rest.split('/').next()),
            _ => None,
        };
        return match short_id {
            Some(id) if !id.is_empty() => format!("https://www.youtube.com/watch?v={}", id),
            _ => input.to_string(),
        };
    }

    let looks_like_id = input.len() == 11
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if looks_like_id {
        format!("https://www.youtube.com/watch?v={}", input)
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(segments: &[&str]) -> String {
        let rows: String = segments
            .iter()
            .map(|text| {
                format!(
                    r#"<ytd-transcript-segment-renderer>
                         <div class="segment-timestamp">0:01</div>
                         <yt-formatted-string class="segment-text">{}</yt-formatted-string>
                       </ytd-transcript-segment-renderer>"#,
                    text
                )
            })
            .collect();
        format!(
            "<html><body><ytd-transcript-segment-list-renderer>{}</ytd-transcript-segment-list-renderer></body></html>",
            rows
        )
    }

    #[test]
    fn joins_trimmed_segments_in_document_order() {
        let html = panel(&["  Hello ", "\n world\n", "again"]);
        assert_eq!(
            scrape_transcript(&html),
            Some(Transcript::Text("Hello world again".into()))
        );
    }

    #[test]
    fn single_segment_is_returned_alone() {
        let html = panel(&["only one"]);
        assert_eq!(
            scrape_transcript(&html),
            Some(Transcript::Text("only one".into()))
        );
    }

    #[test]
    fn panel_wins_over_live_caption() {
        let html = panel(&["from panel"]).replace(
            "</body>",
            r#"<span class="ytp-caption-segment">from caption</span></body>"#,
        );
        assert_eq!(
            scrape_transcript(&html),
            Some(Transcript::Text("from panel".into()))
        );
    }

    #[test]
    fn empty_panel_falls_through_to_live_caption() {
        let html = r#"<html><body>
            <ytd-transcript-segment-list-renderer></ytd-transcript-segment-list-renderer>
            <span class="ytp-caption-segment"> spoken words </span>
        </body></html>"#;
        assert_eq!(
            scrape_transcript(html),
            Some(Transcript::Text(" spoken words ".into()))
        );
    }

    #[test]
    fn caption_track_url_from_player_data() {
        let html = r#"<html><body>
            <script>var other = 1;</script>
            <script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://x"}]}}};</script>
        </body></html>"#;
        assert_eq!(
            scrape_transcript(html),
            Some(Transcript::CaptionTrack("https://x".into()))
        );
    }

    #[test]
    fn caption_track_url_is_json_unescaped() {
        let html = r#"<script>{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc\u0026lang=en","name":{"simpleText":"English"}}]}</script>"#;
        assert_eq!(
            scrape_transcript(html),
            Some(Transcript::CaptionTrack(
                "https://www.youtube.com/api/timedtext?v=abc&lang=en".into()
            ))
        );
    }

    #[test]
    fn malformed_caption_tracks_try_the_next_script() {
        let html = r#"<html><body>
            <script>{"captionTracks":[{"baseUrl":</script>
            <script>{"captionTracks":[{"baseUrl":"https://second"}]}</script>
        </body></html>"#;
        assert_eq!(
            scrape_transcript(html),
            Some(Transcript::CaptionTrack("https://second".into()))
        );
    }

    #[test]
    fn caption_tracks_without_base_url_are_ignored() {
        let html = r#"<script>{"captionTracks":[{"languageCode":"en"}]}</script>"#;
        assert_eq!(scrape_transcript(html), None);

        let html = r#"<script>{"captionTracks":[]}</script>"#;
        assert_eq!(scrape_transcript(html), None);
    }

    #[test]
    fn nothing_found_returns_none() {
        assert_eq!(scrape_transcript(""), None);
        assert_eq!(scrape_transcript("<html><body><p>no captions</p></body></html>"), None);
        assert_eq!(scrape_transcript("<<<not really html"), None);
    }

    #[test]
    fn detects_open_panel() {
        assert!(has_transcript_panel(&panel(&[])));
        assert!(!has_transcript_panel("<html></html>"));
    }

    #[test]
    fn strips_site_suffix_from_title() {
        let html = "<html><head><title>Rust in 100 Seconds - YouTube</title></head></html>";
        assert_eq!(video_title(html), "Rust in 100 Seconds");
        assert_eq!(video_title("<html></html>"), "");
    }

    #[test]
    fn extracts_video_id_from_query() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=abc123&t=42s"),
            Some("abc123".into())
        );
        assert_eq!(video_id("https://www.youtube.com/watch?list=x"), None);
        assert_eq!(video_id("not a url"), None);
    }

    #[test]
    fn watch_url_pattern() {
        assert!(is_watch_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_watch_url("https://www.youtube.com/feed/subscriptions"));
        assert!(!is_watch_url("https://example.com/watch?v=abc"));
    }

    #[test]
    fn normalizes_short_links_and_ids() {
        let expected = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(normalize_watch_url("https://youtu.be/dQw4w9WgXcQ"), expected);
        assert_eq!(
            normalize_watch_url("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(normalize_watch_url("dQw4w9WgXcQ"), expected);
        assert_eq!(normalize_watch_url(expected), expected);
        assert_eq!(normalize_watch_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn short_link_paths_keep_only_the_id() {
        let expected = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(
            normalize_watch_url("https://www.youtube.com/shorts/dQw4w9WgXcQ/"),
            expected
        );
        assert_eq!(
            normalize_watch_url("https://www.youtube.com/live/dQw4w9WgXcQ/chat"),
            expected
        );
        assert_eq!(
            normalize_watch_url("https://www.youtube.com/shorts/"),
            "https://www.youtube.com/shorts/"
        );
    }
}

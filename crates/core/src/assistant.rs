//! Summaries and video Q&A on top of a [`GenerativeModel`] and the cache.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    gemini::{GeminiClient, GeminiConfig, GenerationOptions, GenerativeModel, ModelError, user_turn},
    settings::Settings,
    store::StoreHandle,
    types::{ChatMessage, ChatRole, Transcript},
};

/// Characters of transcript text sent with a summary request
pub const SUMMARY_TRANSCRIPT_CHARS: usize = 30_000;
/// Characters of transcript text sent as chat context
pub const CHAT_TRANSCRIPT_CHARS: usize = 10_000;
pub const CHAT_MAX_OUTPUT_TOKENS: u32 = 1000;

pub const KEY_TEST_PROMPT: &str = "Say \"API key is working\" if you can read this.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Summary,
    Chat,
    KeyTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    MissingApiKey,
    InvalidApiKey,
    PermissionDenied,
    QuotaExceeded,
    Other,
}

impl Failure {
    /// Classify a model error by the codes appearing in its text.
    pub fn classify(error_text: &str) -> Self {
        if error_text.contains("API_KEY_INVALID") {
            Failure::InvalidApiKey
        } else if error_text.contains("PERMISSION_DENIED") {
            Failure::PermissionDenied
        } else if error_text.contains("QUOTA_EXCEEDED") || error_text.contains("RESOURCE_EXHAUSTED")
        {
            Failure::QuotaExceeded
        } else {
            Failure::Other
        }
    }

    /// Message shown to the user; `detail` only feeds the key test fallback.
    pub fn message(self, operation: Operation, detail: &str) -> String {
        match (self, operation) {
            (Failure::MissingApiKey, _) => {
                "Please set your Gemini API key with `konspekt settings set-key`".to_string()
            }
            (Failure::InvalidApiKey, _) => {
                "Invalid API key. Please check your key and try again.".to_string()
            }
            (Failure::PermissionDenied, _) => {
                "API key lacks required permissions. Please check your Google AI Studio settings."
                    .to_string()
            }
            (Failure::QuotaExceeded, _) => {
                "API quota exceeded. Please check your usage limits.".to_string()
            }
            (Failure::Other, Operation::Summary) => {
                "Failed to generate summary. Transcript might be unavailable.".to_string()
            }
            (Failure::Other, Operation::Chat) => {
                "I'm having trouble answering that. Please try again.".to_string()
            }
            (Failure::Other, Operation::KeyTest) => format!("API key test failed: {}", detail),
        }
    }
}

/// A failed assistant call, displayed as its user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AssistantError {
    pub failure: Failure,
    pub message: String,
    #[source]
    pub source: Option<ModelError>,
}

impl AssistantError {
    fn new(failure: Failure, operation: Operation) -> Self {
        Self {
            failure,
            message: failure.message(operation, "Unknown error"),
            source: None,
        }
    }

    fn from_model(error: ModelError, operation: Operation) -> Self {
        let text = error.to_string();
        let failure = Failure::classify(&text);
        Self {
            failure,
            message: failure.message(operation, &text),
            source: Some(error),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn summary_prompt(video_id: &str, title: &str, transcript: Option<&Transcript>) -> String {
    match transcript {
        None => format!(
            "Generate a summary for the YouTube video titled \"{}\" (ID: {}) based on its title.",
            title, video_id
        ),
        Some(Transcript::CaptionTrack(_)) => format!(
            "Generate a summary for the YouTube video \"{}\" (ID: {}) using its transcript.",
            title, video_id
        ),
        Some(Transcript::Text(text)) => {
            let mut prompt =
                String::from("Generate a comprehensive summary of this YouTube video transcript:\n\n");
            prompt.push_str(&format!("Video Title: {}\n", title));
            prompt.push_str(&format!("Video ID: {}\n\n", video_id));
            prompt.push_str("Transcript:\n");
            prompt.push_str(truncate_chars(text, SUMMARY_TRANSCRIPT_CHARS));
            prompt
        }
    }
}

pub fn chat_context(video_id: &str, title: &str, transcript: Option<&Transcript>) -> String {
    let mut context = format!(
        "You're answering questions about a YouTube video.\nTitle: {}\nID: {}",
        title, video_id
    );
    if let Some(text) = transcript.and_then(Transcript::text) {
        context.push_str("\nTranscript Excerpt: ");
        context.push_str(truncate_chars(text, CHAT_TRANSCRIPT_CHARS));
    }
    context
}

pub struct Assistant {
    model: Arc<dyn GenerativeModel>,
    store: StoreHandle,
    api_key: Option<String>,
}

impl Assistant {
    pub fn new(model: Arc<dyn GenerativeModel>, store: StoreHandle, api_key: Option<String>) -> Self {
        Self {
            model,
            store,
            api_key,
        }
    }

    /// Gemini-backed assistant using the key and model from `settings`.
    pub fn from_settings(settings: &Settings, store: StoreHandle) -> crate::Result<Self> {
        let mut config = GeminiConfig::default();
        if let Some(model) = &settings.model {
            config.model = model.clone();
        }
        let client = GeminiClient::new(config)?;
        Ok(Self::new(Arc::new(client), store, settings.api_key()))
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    fn require_key(&self, operation: Operation) -> Result<&str, AssistantError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AssistantError::new(Failure::MissingApiKey, operation))
    }

    /// Summary for a video, served from the cache when fresh.
    pub async fn try_video_summary(
        &self,
        video_id: &str,
        title: &str,
        transcript: Option<&Transcript>,
    ) -> Result<String, AssistantError> {
        match self.store.get_summary(video_id).await {
            Ok(Some(summary)) => {
                tracing::info!(video_id, "Summary served from cache");
                return Ok(summary);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(video_id, error = %e, "Summary cache unavailable"),
        }

        let api_key = self.require_key(Operation::Summary)?;
        let prompt = summary_prompt(video_id, title, transcript);
        tracing::debug!(video_id, prompt_chars = prompt.len(), "Requesting summary");

        let summary = self
            .model
            .generate(api_key, &user_turn(&prompt), GenerationOptions::default())
            .await
            .map_err(|e| {
                tracing::error!(video_id, error = %e, "Summary request failed");
                AssistantError::from_model(e, Operation::Summary)
            })?;

        if let Err(e) = self.store.put_summary(video_id, title, &summary).await {
            tracing::warn!(video_id, error = %e, "Failed to cache summary");
        }
        Ok(summary)
    }

    /// Like [`Assistant::try_video_summary`], with failures turned into
    /// their user-facing message.
    pub async fn video_summary(
        &self,
        video_id: &str,
        title: &str,
        transcript: Option<&Transcript>,
    ) -> String {
        self.try_video_summary(video_id, title, transcript)
            .await
            .unwrap_or_else(|e| e.message)
    }

    /// Answer the last user message of `history` and persist the exchange.
    pub async fn try_chat_with_video(
        &self,
        video_id: &str,
        title: &str,
        transcript: Option<&Transcript>,
        history: &[ChatMessage],
    ) -> Result<String, AssistantError> {
        let api_key = self.require_key(Operation::Chat)?;

        let Some((last, earlier)) = history
            .split_last()
            .filter(|(last, _)| last.role == ChatRole::User)
        else {
            tracing::warn!(video_id, "Chat history does not end with a user message");
            return Err(AssistantError::new(Failure::Other, Operation::Chat));
        };

        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.push(ChatMessage::user(chat_context(video_id, title, transcript)));
        contents.extend(earlier.iter().cloned());
        contents.push(last.clone());

        let options = GenerationOptions {
            max_output_tokens: Some(CHAT_MAX_OUTPUT_TOKENS),
        };
        let reply = self
            .model
            .generate(api_key, &contents, options)
            .await
            .map_err(|e| {
                tracing::error!(video_id, error = %e, "Chat request failed");
                AssistantError::from_model(e, Operation::Chat)
            })?;

        let mut messages = history.to_vec();
        messages.push(ChatMessage::model(reply.clone()));
        if let Err(e) = self.store.put_chat(video_id, title, messages).await {
            tracing::warn!(video_id, error = %e, "Failed to persist chat");
        }
        Ok(reply)
    }

    pub async fn chat_with_video(
        &self,
        video_id: &str,
        title: &str,
        transcript: Option<&Transcript>,
        history: &[ChatMessage],
    ) -> String {
        self.try_chat_with_video(video_id, title, transcript, history)
            .await
            .unwrap_or_else(|e| e.message)
    }

    /// Send a trivial prompt to check that the configured key works.
    pub async fn test_api_key(&self) -> Result<String, AssistantError> {
        let api_key = self.require_key(Operation::KeyTest)?;
        self.model
            .generate(api_key, &user_turn(KEY_TEST_PROMPT), GenerationOptions::default())
            .await
            .map_err(|e| AssistantError::from_model(e, Operation::KeyTest))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::MemoryBackend;

    #[derive(Default)]
    struct FakeModel {
        calls: Mutex<Vec<(Vec<ChatMessage>, GenerationOptions)>>,
        failure: Option<String>,
    }

    impl FakeModel {
        fn failing(status: &str) -> Self {
            Self {
                calls: Mutex::default(),
                failure: Some(status.to_string()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_prompt(&self) -> String {
            let calls = self.calls.lock().unwrap();
            let (contents, _) = calls.last().expect("model was not called");
            contents.last().unwrap().content.clone()
        }
    }

    #[async_trait]
    impl GenerativeModel for FakeModel {
        async fn generate(
            &self,
            _api_key: &str,
            contents: &[ChatMessage],
            options: GenerationOptions,
        ) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push((contents.to_vec(), options));
            match &self.failure {
                Some(status) => Err(ModelError::Api {
                    code: 429,
                    status: status.clone(),
                    message: "failed".into(),
                    body: String::new(),
                }),
                None => Ok(format!("reply #{}", self.call_count())),
            }
        }
    }

    fn assistant(model: Arc<FakeModel>) -> Assistant {
        Assistant::new(model, StoreHandle::spawn(MemoryBackend::new()), Some("key".into()))
    }

    #[tokio::test]
    async fn title_only_prompt_without_transcript() {
        let model = Arc::new(FakeModel::default());
        let assistant = assistant(Arc::clone(&model));

        let summary = assistant.video_summary("abc123", "Talk", None).await;
        assert_eq!(summary, "reply #1");

        let prompt = model.last_prompt();
        assert!(prompt.contains("based on its title"));
        assert!(prompt.contains("\"Talk\" (ID: abc123)"));
        assert!(!prompt.contains("Transcript:"));
    }

    #[test]
    fn text_transcript_is_truncated_by_characters() {
        let text = "é".repeat(SUMMARY_TRANSCRIPT_CHARS + 50);
        let prompt = summary_prompt("abc123", "Talk", Some(&Transcript::Text(text)));
        assert!(prompt.contains("Video Title: Talk"));
        assert_eq!(prompt.matches('é').count(), SUMMARY_TRANSCRIPT_CHARS);
    }

    #[test]
    fn caption_track_prompt_mentions_transcript_only() {
        let track = Transcript::CaptionTrack("https://x".into());
        let prompt = summary_prompt("abc123", "Talk", Some(&track));
        assert!(prompt.ends_with("using its transcript."));
        assert!(!prompt.contains("https://x"));

        let context = chat_context("abc123", "Talk", Some(&track));
        assert!(!context.contains("Transcript Excerpt"));
    }

    #[tokio::test]
    async fn cached_summary_skips_the_model() {
        let model = Arc::new(FakeModel::default());
        let assistant = assistant(Arc::clone(&model));
        assistant
            .store()
            .put_summary("abc123", "Talk", "cached text")
            .await
            .unwrap();

        let summary = assistant.video_summary("abc123", "Talk", None).await;
        assert_eq!(summary, "cached text");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn cached_summary_needs_no_key() {
        let model = Arc::new(FakeModel::default());
        let store = StoreHandle::spawn(MemoryBackend::new());
        store.put_summary("abc123", "Talk", "cached text").await.unwrap();
        let assistant = Assistant::new(model, store, None);

        assert_eq!(assistant.video_summary("abc123", "Talk", None).await, "cached text");
        assert_eq!(
            assistant.video_summary("other", "Talk", None).await,
            "Please set your Gemini API key with `konspekt settings set-key`"
        );
    }

    #[tokio::test]
    async fn generated_summary_is_cached() {
        let model = Arc::new(FakeModel::default());
        let assistant = assistant(Arc::clone(&model));

        assistant.video_summary("abc123", "Talk", None).await;
        assistant.video_summary("abc123", "Talk", None).await;
        assert_eq!(model.call_count(), 1);
        assert_eq!(
            assistant.store().get_summary("abc123").await.unwrap().as_deref(),
            Some("reply #1")
        );
    }

    #[tokio::test]
    async fn quota_error_maps_to_quota_message() {
        let assistant = assistant(Arc::new(FakeModel::failing("QUOTA_EXCEEDED")));
        let err = assistant
            .try_video_summary("abc123", "Talk", None)
            .await
            .unwrap_err();
        assert_eq!(err.failure, Failure::QuotaExceeded);
        assert_eq!(err.to_string(), "API quota exceeded. Please check your usage limits.");
        assert_eq!(assistant.store().get_summary("abc123").await.unwrap(), None);
    }

    #[test]
    fn classification_by_error_text() {
        assert_eq!(Failure::classify("... API_KEY_INVALID ..."), Failure::InvalidApiKey);
        assert_eq!(Failure::classify("403 PERMISSION_DENIED"), Failure::PermissionDenied);
        assert_eq!(Failure::classify("429 RESOURCE_EXHAUSTED"), Failure::QuotaExceeded);
        assert_eq!(Failure::classify("connection reset"), Failure::Other);
        assert_eq!(
            Failure::Other.message(Operation::Summary, "x"),
            "Failed to generate summary. Transcript might be unavailable."
        );
        assert_eq!(
            Failure::Other.message(Operation::KeyTest, "boom"),
            "API key test failed: boom"
        );
    }

    #[tokio::test]
    async fn chat_appends_exactly_one_model_entry() {
        let model = Arc::new(FakeModel::default());
        let assistant = assistant(Arc::clone(&model));
        let transcript = Transcript::Text("the words".into());
        let history = vec![
            ChatMessage::user("first?"),
            ChatMessage::model("first answer"),
            ChatMessage::user("second?"),
        ];

        let reply = assistant
            .chat_with_video("abc123", "Talk", Some(&transcript), &history)
            .await;
        assert_eq!(reply, "reply #1");

        let stored = assistant.store().get_chat("abc123").await.unwrap().unwrap();
        let mut expected = history.clone();
        expected.push(ChatMessage::model("reply #1"));
        assert_eq!(stored, expected);

        let calls = model.calls.lock().unwrap();
        let (contents, options) = &calls[0];
        assert_eq!(options.max_output_tokens, Some(CHAT_MAX_OUTPUT_TOKENS));
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role, ChatRole::User);
        assert!(contents[0].content.ends_with("Transcript Excerpt: the words"));
        assert_eq!(&contents[1..], &history[..]);
    }

    #[tokio::test]
    async fn failed_chat_persists_nothing() {
        let assistant = assistant(Arc::new(FakeModel::failing("INTERNAL")));
        let history = vec![ChatMessage::user("hello?")];

        let reply = assistant
            .chat_with_video("abc123", "Talk", None, &history)
            .await;
        assert_eq!(reply, "I'm having trouble answering that. Please try again.");
        assert_eq!(assistant.store().get_chat("abc123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn chat_requires_a_trailing_user_message() {
        let model = Arc::new(FakeModel::default());
        let assistant = assistant(Arc::clone(&model));

        for history in [vec![], vec![ChatMessage::model("hi")]] {
            let err = assistant
                .try_chat_with_video("abc123", "Talk", None, &history)
                .await
                .unwrap_err();
            assert_eq!(err.failure, Failure::Other);
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn key_test_reports_invalid_key() {
        let assistant = assistant(Arc::new(FakeModel::failing("API_KEY_INVALID")));
        let err = assistant.test_api_key().await.unwrap_err();
        assert_eq!(
            err.message,
            "Invalid API key. Please check your key and try again."
        );
    }

    #[tokio::test]
    async fn key_test_failure_does_not_reveal_the_key() {
        let client = GeminiClient::with_base_url("http://127.0.0.1:1/v1beta").unwrap();
        let assistant = Assistant::new(
            Arc::new(client),
            StoreHandle::spawn(MemoryBackend::new()),
            Some("SECRET-KEY-123".into()),
        );

        let err = assistant.test_api_key().await.unwrap_err();
        assert!(err.message.starts_with("API key test failed: "));

        let mut chain = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        assert!(!chain.contains("SECRET-KEY-123"), "key leaked: {chain}");
    }
}

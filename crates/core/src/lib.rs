pub mod assistant;
pub mod error;
pub mod format;
pub mod gemini;
pub mod page;
pub mod paths;
pub mod relay;
pub mod settings;
pub mod store;
pub mod types;

pub use assistant::{Assistant, AssistantError, Failure, Operation};
pub use error::{KonspektError, Result};
pub use format::{
    format_age, format_chat, format_chat_history, format_size, format_storage_info,
    format_summary_history, format_summary_readable,
};
pub use gemini::{GeminiClient, GeminiConfig, GenerativeModel, ModelError};
pub use page::{HttpPage, Page, PageError, RetryPolicy, SnapshotPage};
pub use relay::{Background, BackgroundHandle, BrowserSession, RelayConfig, VideoData};
pub use settings::{Settings, SettingsError};
pub use store::{StoreError, StoreHandle};
pub use types::{ChatMessage, ChatRole, StorageInfo, StoredChat, StoredSummary, Transcript};

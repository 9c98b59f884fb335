//! Persistent cache of summaries and chat histories keyed by video id.
//!
//! A single actor task owns the backend and runs every operation to
//! completion before taking the next one, so each read-modify-write of the
//! summary or chat map is atomic for all [`StoreHandle`] clones. Entries
//! older than [`CACHE_DURATION_MS`] are dropped lazily when read.

pub mod backend;

use std::collections::BTreeMap;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

use crate::{
    paths::get_root_data_dir,
    types::{
        ChatMessage, StorageData, StorageInfo, StoredChat, StoredSummary, now_millis,
    },
};

pub const SUMMARIES_KEY: &str = "youtube_summaries";
pub const CHATS_KEY: &str = "youtube_chats";

/// 7 days
pub const CACHE_DURATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store is closed")]
    Closed,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    ReadAll(Reply<StorageData>),
    GetSummary {
        video_id: String,
        reply: Reply<Option<String>>,
    },
    PutSummary {
        summary: StoredSummary,
        reply: Reply<()>,
    },
    RemoveSummary {
        video_id: String,
        reply: Reply<()>,
    },
    ListSummaries(Reply<Vec<StoredSummary>>),
    GetChat {
        video_id: String,
        reply: Reply<Option<Vec<ChatMessage>>>,
    },
    PutChat {
        chat: StoredChat,
        reply: Reply<()>,
    },
    RemoveChat {
        video_id: String,
        reply: Reply<()>,
    },
    ListChats(Reply<Vec<StoredChat>>),
    ClearAll(Reply<()>),
    Info(Reply<StorageInfo>),
}

fn is_expired(timestamp: i64, now: i64) -> bool {
    now - timestamp > CACHE_DURATION_MS
}

trait Timestamped {
    fn timestamp(&self) -> i64;
}

impl Timestamped for StoredSummary {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for StoredChat {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

struct StoreActor {
    backend: Box<dyn StorageBackend>,
}

impl StoreActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.dispatch(command).await;
        }
        tracing::debug!("Store closed");
    }

    async fn dispatch(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::ReadAll(reply) => {
                let _ = reply.send(self.read_all().await);
            }
            Command::GetSummary { video_id, reply } => {
                let result = self
                    .get_fresh::<StoredSummary>(SUMMARIES_KEY, &video_id)
                    .await
                    .map(|entry| entry.map(|s| s.summary));
                let _ = reply.send(result);
            }
            Command::PutSummary { summary, reply } => {
                let result = self
                    .update::<StoredSummary>(SUMMARIES_KEY, |map| {
                        map.insert(summary.video_id.clone(), summary);
                    })
                    .await;
                let _ = reply.send(result);
            }
            Command::RemoveSummary { video_id, reply } => {
                let result = self
                    .update::<StoredSummary>(SUMMARIES_KEY, |map| {
                        map.remove(&video_id);
                    })
                    .await;
                let _ = reply.send(result);
            }
            Command::ListSummaries(reply) => {
                let _ = reply.send(self.list_fresh::<StoredSummary>(SUMMARIES_KEY).await);
            }
            Command::GetChat { video_id, reply } => {
                let result = self
                    .get_fresh::<StoredChat>(CHATS_KEY, &video_id)
                    .await
                    .map(|entry| entry.map(|c| c.messages));
                let _ = reply.send(result);
            }
            Command::PutChat { chat, reply } => {
                let result = self
                    .update::<StoredChat>(CHATS_KEY, |map| {
                        map.insert(chat.video_id.clone(), chat);
                    })
                    .await;
                let _ = reply.send(result);
            }
            Command::RemoveChat { video_id, reply } => {
                let result = self
                    .update::<StoredChat>(CHATS_KEY, |map| {
                        map.remove(&video_id);
                    })
                    .await;
                let _ = reply.send(result);
            }
            Command::ListChats(reply) => {
                let _ = reply.send(self.list_fresh::<StoredChat>(CHATS_KEY).await);
            }
            Command::ClearAll(reply) => {
                let _ = reply.send(self.clear_all().await);
            }
            Command::Info(reply) => {
                let _ = reply.send(self.info().await);
            }
        }
    }

    async fn load_map<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, T>, StoreError> {
        match self.backend.load(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save_map<T: Serialize>(
        &mut self,
        key: &str,
        map: &BTreeMap<String, T>,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(map)?;
        self.backend.save(key, &value).await
    }

    async fn update<T>(
        &mut self,
        key: &str,
        mutate: impl FnOnce(&mut BTreeMap<String, T>),
    ) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut map = self.load_map::<T>(key).await?;
        mutate(&mut map);
        self.save_map(key, &map).await
    }

    async fn get_fresh<T>(&mut self, key: &str, video_id: &str) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned + Timestamped,
    {
        let mut map = self.load_map::<T>(key).await?;
        let Some(entry) = map.remove(video_id) else {
            return Ok(None);
        };

        if is_expired(entry.timestamp(), now_millis()) {
            tracing::debug!(key, video_id, "Cached entry expired");
            self.save_map(key, &map).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// All unexpired entries, newest first. Expired ones are pruned.
    async fn list_fresh<T>(&mut self, key: &str) -> Result<Vec<T>, StoreError>
    where
        T: Serialize + DeserializeOwned + Timestamped,
    {
        let now = now_millis();
        let mut map = self.load_map::<T>(key).await?;
        let before = map.len();
        map.retain(|_, entry| !is_expired(entry.timestamp(), now));

        if map.len() != before {
            tracing::debug!(key, pruned = before - map.len(), "Pruned expired entries");
            self.save_map(key, &map).await?;
        }

        let mut entries: Vec<T> = map.into_values().collect();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.timestamp()));
        Ok(entries)
    }

    async fn read_all(&self) -> Result<StorageData, StoreError> {
        Ok(StorageData {
            summaries: self.load_map(SUMMARIES_KEY).await?,
            chats: self.load_map(CHATS_KEY).await?,
        })
    }

    async fn clear_all(&mut self) -> Result<(), StoreError> {
        self.backend.remove(SUMMARIES_KEY).await?;
        self.backend.remove(CHATS_KEY).await
    }

    async fn info(&self) -> Result<StorageInfo, StoreError> {
        let data = self.read_all().await?;
        Ok(StorageInfo {
            summary_count: data.summaries.len(),
            chat_count: data.chats.len(),
            total_size: serde_json::to_string(&data)?.len(),
        })
    }
}

/// Cloneable access to the store actor.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Command>,
}

impl StoreHandle {
    /// Start the actor on `backend`. Must be called inside a tokio runtime.
    pub fn spawn(backend: impl StorageBackend + 'static) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = StoreActor {
            backend: Box::new(backend),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Store backed by JSON files in the user data directory
    pub fn open_default() -> Self {
        Self::spawn(FileBackend::new(get_root_data_dir()))
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, StoreError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)?
    }

    pub async fn read_all(&self) -> Result<StorageData, StoreError> {
        self.call(Command::ReadAll).await
    }

    /// Cached summary text, `None` when absent or expired
    pub async fn get_summary(&self, video_id: &str) -> Result<Option<String>, StoreError> {
        let video_id = video_id.to_string();
        self.call(|reply| Command::GetSummary { video_id, reply })
            .await
    }

    pub async fn put_summary(
        &self,
        video_id: &str,
        video_title: &str,
        summary: &str,
    ) -> Result<(), StoreError> {
        let summary = StoredSummary {
            video_id: video_id.to_string(),
            video_title: video_title.to_string(),
            summary: summary.to_string(),
            timestamp: now_millis(),
        };
        self.call(|reply| Command::PutSummary { summary, reply })
            .await
    }

    pub async fn remove_summary(&self, video_id: &str) -> Result<(), StoreError> {
        let video_id = video_id.to_string();
        self.call(|reply| Command::RemoveSummary { video_id, reply })
            .await
    }

    pub async fn list_summaries(&self) -> Result<Vec<StoredSummary>, StoreError> {
        self.call(Command::ListSummaries).await
    }

    /// Cached conversation, `None` when absent or expired
    pub async fn get_chat(&self, video_id: &str) -> Result<Option<Vec<ChatMessage>>, StoreError> {
        let video_id = video_id.to_string();
        self.call(|reply| Command::GetChat { video_id, reply })
            .await
    }

    pub async fn put_chat(
        &self,
        video_id: &str,
        video_title: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<(), StoreError> {
        let chat = StoredChat {
            video_id: video_id.to_string(),
            video_title: video_title.to_string(),
            messages,
            timestamp: now_millis(),
        };
        self.call(|reply| Command::PutChat { chat, reply }).await
    }

    pub async fn remove_chat(&self, video_id: &str) -> Result<(), StoreError> {
        let video_id = video_id.to_string();
        self.call(|reply| Command::RemoveChat { video_id, reply })
            .await
    }

    pub async fn list_chats(&self) -> Result<Vec<StoredChat>, StoreError> {
        self.call(Command::ListChats).await
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.call(Command::ClearAll).await
    }

    pub async fn info(&self) -> Result<StorageInfo, StoreError> {
        self.call(Command::Info).await
    }
}

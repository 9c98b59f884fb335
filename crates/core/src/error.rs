use thiserror::Error;

use crate::{
    gemini::ModelError,
    page::{OpenError, PageError},
    relay::RelayError,
    settings::SettingsError,
    store::StoreError,
};

#[derive(Error, Debug)]
pub enum KonspektError {
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Could not open transcript: {0}")]
    Open(#[from] OpenError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KonspektError>;

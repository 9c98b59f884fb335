use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::paths::get_settings_path;

/// Environment variable that takes precedence over the stored key
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Please enter an API key")]
    EmptyApiKey,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// User settings kept apart from the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    /// Overrides the default model id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Settings {
    /// Load from the default settings path, or defaults if none saved yet.
    pub async fn load() -> Result<Self, SettingsError> {
        Self::load_from(&get_settings_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&get_settings_path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }

    /// Replace the stored key. Surrounding whitespace is dropped.
    pub fn set_api_key(&mut self, key: &str) -> Result<(), SettingsError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SettingsError::EmptyApiKey);
        }
        self.gemini_api_key = Some(key.to_string());
        Ok(())
    }

    /// Effective key: the environment first, then the stored one.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(
            std::env::var(API_KEY_ENV_VAR).ok(),
            self.gemini_api_key.as_deref(),
        )
    }
}

pub fn resolve_api_key(env: Option<String>, stored: Option<&str>) -> Option<String> {
    env.map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .or_else(|| {
            stored
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        })
}

/// Mask all but the last four characters of a key for display
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let mut settings = Settings::default();
        let err = settings.set_api_key("   ").unwrap_err();
        assert_eq!(err.to_string(), "Please enter an API key");
        assert_eq!(settings.gemini_api_key, None);

        settings.set_api_key("  AIza123  ").unwrap();
        assert_eq!(settings.gemini_api_key.as_deref(), Some("AIza123"));
    }

    #[test]
    fn environment_wins_over_stored_key() {
        assert_eq!(
            resolve_api_key(Some("from-env".into()), Some("stored")).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            resolve_api_key(Some("".into()), Some("stored")).as_deref(),
            Some("stored")
        );
        assert_eq!(resolve_api_key(None, Some(" ")), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn masking_keeps_the_tail() {
        assert_eq!(mask_api_key("AIzaSyABCD"), "******ABCD");
        assert_eq!(mask_api_key("abc"), "***");
    }

    #[tokio::test]
    async fn settings_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("konspekt-settings-{}", uuid::Uuid::new_v4()));
        let path = dir.join("settings.json");

        assert_eq!(Settings::load_from(&path).await.unwrap(), Settings::default());

        let mut settings = Settings::default();
        settings.set_api_key("AIza123").unwrap();
        settings.save_to(&path).await.unwrap();

        let raw = fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\"geminiApiKey\""));
        assert_eq!(Settings::load_from(&path).await.unwrap(), settings);

        fs::remove_dir_all(&dir).await.unwrap();
    }
}

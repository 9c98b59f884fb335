use std::path::PathBuf;

const APP_DIR: &str = "konspekt";

/// Root directory for persisted summaries and chats
pub fn get_root_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
}

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
}

/// Get the path of the settings file holding the API credential
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

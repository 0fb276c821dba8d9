//! Application settings storage
//!
//! Stores configuration like API keys and model names in a JSON file in the
//! data directory. Environment variables take precedence over stored values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Chat model used to draft mind maps
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_embedding_model_name")]
    pub embedding_model_name: String,
    /// Separate key for the embeddings endpoint (None = reuse openai_api_key)
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    /// Separate base URL for the embeddings endpoint (None = reuse openai_base_url)
    #[serde(default)]
    pub embedding_base_url: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_model_name() -> String {
    "DeepSeek-R1".to_string()
}

fn default_embedding_model_name() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            model_name: default_model_name(),
            embedding_model_name: default_embedding_model_name(),
            embedding_api_key: None,
            embedding_base_url: None,
            db_path: None,
            bind_addr: default_bind_addr(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring malformed settings file {}: {}", path.display(), e);
                    Settings::default()
                }),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }
}

/// Default data directory for the settings file and database
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("mindgraph"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Initialize settings from an explicit config file path
pub fn init_from_file(config_path: PathBuf) {
    let settings = Settings::load(&config_path);
    tracing::debug!("Settings loaded from {}", config_path.display());

    *SETTINGS.write().unwrap_or_else(|e| e.into_inner()) = Some(settings);
}

/// Snapshot of the stored settings (defaults if not initialized)
fn current() -> Settings {
    SETTINGS
        .read()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_default()
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Environment value wins over the stored one; empty strings count as unset
fn resolve(env_value: Option<String>, stored: Option<String>) -> Option<String> {
    env_value
        .filter(|v| !v.is_empty())
        .or_else(|| stored.filter(|v| !v.is_empty()))
}

pub fn get_openai_api_key() -> Option<String> {
    resolve(env_var("OPENAI_API_KEY"), current().openai_api_key)
}

pub fn get_openai_base_url() -> String {
    resolve(env_var("OPENAI_BASE_URL"), Some(current().openai_base_url))
        .unwrap_or_else(default_openai_base_url)
}

pub fn get_model_name() -> String {
    resolve(env_var("MODEL_NAME"), Some(current().model_name))
        .unwrap_or_else(default_model_name)
}

pub fn get_embedding_model_name() -> String {
    resolve(env_var("EMBEDDING_MODEL_NAME"), Some(current().embedding_model_name))
        .unwrap_or_else(default_embedding_model_name)
}

/// Embedding key, falling back to the chat key
pub fn get_embedding_api_key() -> Option<String> {
    resolve(env_var("EMBEDDING_API_KEY"), current().embedding_api_key)
        .or_else(get_openai_api_key)
}

/// Embedding base URL, falling back to the chat base URL
pub fn get_embedding_base_url() -> String {
    resolve(env_var("API_BASE"), current().embedding_base_url)
        .unwrap_or_else(get_openai_base_url)
}

pub fn get_db_path() -> PathBuf {
    resolve(env_var("MINDGRAPH_DB"), current().db_path)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_data_dir().join("mindgraph.db"))
}

pub fn get_bind_addr() -> String {
    resolve(env_var("MINDGRAPH_BIND"), Some(current().bind_addr))
        .unwrap_or_else(default_bind_addr)
}

pub fn get_cors_origins() -> Vec<String> {
    match env_var("MINDGRAPH_CORS_ORIGINS") {
        Some(list) => parse_origin_list(&list),
        None => current().cors_origins,
    }
}

fn parse_origin_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Get masked API key for display (shows first/last 4 chars)
pub fn get_masked_openai_api_key() -> Option<String> {
    get_openai_api_key().map(|key| mask_key(&key))
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

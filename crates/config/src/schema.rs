use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the banter client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BanterConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
}

/// Where the chat backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the backend, without the `/api` suffix.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
        }
    }
}

/// Message feed polling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Fixed polling period in milliseconds.
    pub poll_interval_ms: u64,

    /// Page size requested per pull (the server clamps to 1–1000).
    pub page_limit: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            page_limit: 100,
        }
    }
}

/// Durable local state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted session. Defaults to `~/.banter/`.
    pub state_dir: Option<PathBuf>,
}

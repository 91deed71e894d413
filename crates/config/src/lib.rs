//! Configuration schema and discovery for the banter client.
//!
//! Config is read from `./banter.{toml,json}` or `~/.config/banter/`,
//! with defaults for anything unspecified.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, load_config, set_config_dir, state_dir,
    },
    schema::{BanterConfig, FeedConfig, ServerConfig, StorageConfig},
};

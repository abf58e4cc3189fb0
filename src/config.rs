//! Configuration for the handful of knobs this crate's callers actually
//! need to set: this node's `server_id` (folded into the node tag used to
//! advance vector clocks, see [`crate::vclock`]) and the event broadcast
//! channel's buffer capacity.
//!
//! Loading searches for `config.yaml`, starting next to the running
//! executable and walking up a few parent directories, falling back to
//! [`Config::default`] if nothing is found or the file fails to parse. A
//! missing or malformed file is never fatal, since the manager has sane
//! defaults for both knobs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error};

const CONFIG_SEARCH_DEPTH: usize = 3;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_server_id() -> String {
    "node-1".to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node: NodeConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            server_id: default_server_id(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Searches from the running executable's directory upward for
/// `config.yaml`, parses it if found, and falls back to [`Config::default`]
/// on any miss or error. Never panics: a broken or absent config file
/// degrades to defaults rather than failing startup.
pub fn load_config() -> Config {
    let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    let exe_dir = exe_path.parent().unwrap_or_else(|| Path::new("."));

    let mut search_dir = PathBuf::from(exe_dir);
    let mut found = search_dir.join("config.yaml").exists();
    if !found {
        for _ in 0..CONFIG_SEARCH_DEPTH {
            search_dir = match search_dir.parent() {
                Some(parent) => parent.to_path_buf(),
                None => break,
            };
            if search_dir.join("config.yaml").exists() {
                found = true;
                break;
            }
        }
    }

    if found {
        let config_file = search_dir.join("config.yaml");
        match fs::read_to_string(&config_file) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = ?config_file, "loaded configuration");
                    return config;
                }
                Err(err) => error!(path = ?config_file, %err, "failed to parse config.yaml"),
            },
            Err(err) => error!(path = ?config_file, %err, "failed to read config.yaml"),
        }
    }

    debug!("using default configuration");
    Config::default()
}

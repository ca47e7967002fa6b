//! JSON configuration file for the logger daemon.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bluetooth address of the ELM327 adapter.
    #[serde(default = "default_adapter_mac")]
    pub adapter_mac: String,
    /// host:port of the SPP bridge carrying the adapter's serial channel.
    #[serde(default = "default_bridge_addr")]
    pub bridge_addr: String,
    /// Time between RPM polls; zero or negative selects the default 1000 ms.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: i64,
    /// Destination file for decoded samples, one JSON object per line.
    #[serde(default = "default_sample_log")]
    pub sample_log: String,
    /// Budget for opening the bridge connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_adapter_mac() -> String {
    "00:1D:A5:68:98:8B".to_string()
}

fn default_bridge_addr() -> String {
    "127.0.0.1:35000".to_string()
}

const fn default_poll_interval_ms() -> i64 {
    1000
}

fn default_sample_log() -> String {
    "logs/rpm-log.jsonl".to_string()
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter_mac: default_adapter_mac(),
            bridge_addr: default_bridge_addr(),
            poll_interval_ms: default_poll_interval_ms(),
            sample_log: default_sample_log(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or malformed. Never fails; the daemon must come up regardless.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!("loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "invalid configuration in {}: {e}, using defaults",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    "could not read configuration {}: {e}, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"adapter_mac":"AA:BB:CC:DD:EE:FF"}"#).unwrap();
        assert_eq!(config.adapter_mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.bridge_addr, "127.0.0.1:35000");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.sample_log, "logs/rpm-log.jsonl");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load_or_default(Path::new("/nonexistent/obdlog.json"));
        assert_eq!(config.adapter_mac, default_adapter_mac());
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bridge_addr, config.bridge_addr);
        assert_eq!(back.poll_interval_ms, config.poll_interval_ms);
    }
}

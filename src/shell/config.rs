// Process configuration read from the environment.
//
// Keys
// - EVENTSTORE_ADDR: listen address, default 0.0.0.0:8080
// - EVENTSTORE_BACKEND: memory | file, default memory
// - EVENTSTORE_DATA_DIR: root directory of the file backend, default ./data
// - EVENTSTORE_REQUEST_TIMEOUT_MS: deadline for every request, default 5000

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ADDR: &str = "EVENTSTORE_ADDR";
pub const BACKEND: &str = "EVENTSTORE_BACKEND";
pub const DATA_DIR: &str = "EVENTSTORE_DATA_DIR";
pub const REQUEST_TIMEOUT_MS: &str = "EVENTSTORE_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = match lookup(ADDR) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: ADDR, value })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let backend = match lookup(BACKEND).as_deref() {
            None | Some("memory") => Backend::Memory,
            Some("file") => Backend::File,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: BACKEND,
                    value: other.to_string(),
                });
            }
        };

        let data_dir = lookup(DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let request_timeout = match lookup(REQUEST_TIMEOUT_MS) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: REQUEST_TIMEOUT_MS,
                        value,
                    });
                }
            },
            None => Duration::from_millis(5000),
        };

        Ok(Self {
            addr,
            backend,
            data_dir,
            request_timeout,
        })
    }
}

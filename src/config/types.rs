use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::app_handler::DEFAULT_ECHO_SUFFIX;
use crate::connection_worker::DEFAULT_RECORD_BUFFER_SIZE;
use crate::util::Timeouts;

fn default_timeout_secs() -> u64 {
    Timeouts::DEFAULT_SECS
}

fn default_record_buffer_size() -> usize {
    DEFAULT_RECORD_BUFFER_SIZE
}

fn default_echo_suffix() -> String {
    DEFAULT_ECHO_SUFFIX.to_string()
}

/// What travels on the wire after accept.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Certificate handshake, then encrypted Records.
    #[default]
    Secure,
    /// No handshake; messages are exchanged as plaintext.
    Plain,
}

/// How many Record exchanges a connection serves.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    /// One request, one response, then close.
    #[default]
    Single,
    /// Keep exchanging until the peer disconnects or a deadline fires.
    Continuous,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum HandlerConfig {
    Echo {
        #[serde(default = "default_echo_suffix")]
        suffix: String,
    },
    WordCount,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig::Echo {
            suffix: default_echo_suffix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    #[serde(default)]
    pub transport: Transport,
    /// Path to a PEM file, or the PEM text itself. Required for the secure
    /// transport.
    #[serde(default)]
    pub root_cert: Option<String>,
    #[serde(default)]
    pub leaf_cert: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub exchange: ExchangeMode,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_record_buffer_size")]
    pub record_buffer_size: usize,
}

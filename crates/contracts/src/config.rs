//! ServiceConfig - Config Loader output
//!
//! Tunable constants of the connection manager, event decoder, stream
//! listener and observability setup. Every field defaults to the built-in
//! constant, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    GET_HDI_SERVICE_COUNT, MAX_PACKET_BUF_SIZE, MAX_RECV_LIMIT, REPORT_CHANNEL, SENSOR_DATA_LENGTH,
    WAIT_MS,
};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Driver connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Event decoding settings
    #[serde(default)]
    pub event: EventConfig,

    /// Stream listener settings
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Logging / metrics settings
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Driver connection retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Acquisition attempts before giving up
    pub retry_count: u32,

    /// Delay between attempts (ms)
    pub retry_interval_ms: u64,

    /// Delivery channel used for callback registration
    pub report_channel: i32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_count: GET_HDI_SERVICE_COUNT,
            retry_interval_ms: WAIT_MS,
            report_channel: REPORT_CHANNEL,
        }
    }
}

impl ConnectionConfig {
    /// Delay between attempts
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Worst-case time a connect call blocks
    pub fn max_connect_wait(&self) -> Duration {
        self.retry_interval() * self.retry_count
    }
}

/// Event decoding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Fixed capacity of the forwarded payload buffer (bytes)
    pub max_data_len: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            max_data_len: SENSOR_DATA_LENGTH,
        }
    }
}

/// Stream listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Receive buffer size (bytes)
    pub max_packet_buf_size: usize,

    /// Maximum receive calls per readable notification
    pub max_recv_limit: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_packet_buf_size: MAX_PACKET_BUF_SIZE,
            max_recv_limit: MAX_RECV_LIMIT,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging / metrics settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log format
    pub log_format: LogFormat,

    /// Default level when RUST_LOG is unset
    pub default_log_level: String,

    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            default_log_level: "info".to_string(),
            metrics_port: None,
        }
    }
}

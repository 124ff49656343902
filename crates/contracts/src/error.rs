//! Layered error definitions
//!
//! Categorized by source: connection / input / driver / copy / config

use thiserror::Error;

use crate::SensorId;

/// Legacy numeric code for "not initialized".
pub const ERR_NO_INIT: i32 = 3;

/// Legacy numeric code for "invalid value".
pub const ERR_INVALID_VALUE: i32 = 22;

/// Legacy numeric code for a failed payload copy.
pub const COPY_ERR: i32 = 33_554_451;

/// Unified error type
#[derive(Debug, Error)]
pub enum SensorError {
    // ===== Connection Errors =====
    /// Operation attempted before a successful connect, or after the driver died
    #[error("driver interface not initialized")]
    NotInitialized,

    // ===== Input Errors =====
    /// Null or zero-length input
    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    // ===== Driver Errors =====
    /// Driver returned a negative status; `code` is forwarded verbatim
    #[error("driver operation '{op}' failed{}: code {code}", sensor_suffix(.sensor_id))]
    Driver {
        op: &'static str,
        sensor_id: Option<SensorId>,
        code: i32,
    },

    /// Payload did not fit in the fixed-capacity event buffer
    #[error("copy of {len} payload bytes into {capacity}-byte buffer failed")]
    CopyFailure { len: usize, capacity: usize },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn sensor_suffix(sensor_id: &Option<SensorId>) -> String {
    match sensor_id {
        Some(id) => format!(" for sensor {id}"),
        None => String::new(),
    }
}

impl SensorError {
    /// Create invalid value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create driver error for a sensor-scoped operation
    pub fn driver(op: &'static str, sensor_id: SensorId, code: i32) -> Self {
        Self::Driver {
            op,
            sensor_id: Some(sensor_id),
            code,
        }
    }

    /// Create driver error for a connection-scoped operation
    pub fn driver_global(op: &'static str, code: i32) -> Self {
        Self::Driver {
            op,
            sensor_id: None,
            code,
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Numeric status as reported to the sensor service.
    ///
    /// Driver failures keep the driver's own (negative) code.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotInitialized => ERR_NO_INIT,
            Self::InvalidValue { .. } => ERR_INVALID_VALUE,
            Self::Driver { code, .. } => *code,
            Self::CopyFailure { .. } => COPY_ERR,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } | Self::Io(_) => -1,
        }
    }

    /// True for [`SensorError::NotInitialized`]
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SensorError>;

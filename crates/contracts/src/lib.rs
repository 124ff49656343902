//! # Contracts
//!
//! Frozen interface contracts shared by the sensor HDI connection layer.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Boundaries
//! - [`SensorDriver`] / [`DriverProvider`]: the hardware driver interface (HDI) proxy
//! - [`ReportSink`]: application-level consumer of decoded sensor events
//! - [`SensorDataChannel`]: client-facing transport drained by the stream listener
//!
//! Driver status codes follow the HDI convention: `0` is success, negative is failure.

mod channel;
mod config;
mod driver;
mod error;
mod sensor;
mod sensor_id;
mod sink;

pub use channel::{DisconnectFn, ReceiveMessageFn, SensorDataChannel};
pub use config::*;
pub use driver::{DeathRecipient, DriverCallback, DriverProvider, SensorDriver};
pub use error::*;
pub use sensor::*;
pub use sensor_id::SensorId;
pub use sink::{ReportDataFn, ReportSink};

/// Receive buffer size of the stream listener, in bytes.
pub const MAX_PACKET_BUF_SIZE: usize = 256;

/// Maximum `recv` calls per readable notification.
pub const MAX_RECV_LIMIT: usize = 32;

/// Fixed capacity of every forwarded event payload buffer.
pub const SENSOR_DATA_LENGTH: usize = 64;

/// Attempts made to acquire the driver interface before giving up.
pub const GET_HDI_SERVICE_COUNT: u32 = 30;

/// Delay between driver acquisition attempts, in milliseconds.
pub const WAIT_MS: u64 = 200;

/// Delivery channel index used when registering the event callback.
pub const REPORT_CHANNEL: i32 = 0;

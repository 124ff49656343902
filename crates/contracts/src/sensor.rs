//! Sensor records crossing the driver boundary
//!
//! Raw driver records (`Hdf*`) and the service-side records they map into.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::SensorId;

/// Last-applied batch configuration of one sensor
///
/// Cached so it can be replayed after a driver restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBasicInfo {
    /// Sampling period (ns)
    pub sampling_period_ns: i64,

    /// Maximum report delay (ns)
    pub max_report_delay_ns: i64,

    /// Whether the sensor was enabled after its batch was set
    pub enabled: bool,
}

impl SensorBasicInfo {
    /// Create a disabled entry with the given batch intervals
    pub fn new(sampling_period_ns: i64, max_report_delay_ns: i64) -> Self {
        Self {
            sampling_period_ns,
            max_report_delay_ns,
            enabled: false,
        }
    }
}

/// Raw sensor inventory record as returned by the driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HdfSensorInformation {
    pub sensor_id: i32,
    pub sensor_name: String,
    pub vendor_name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub sensor_type_id: i32,
    pub max_range: f32,
    pub accuracy: f32,
    pub power: f32,
}

/// Service-side sensor descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub sensor_id: SensorId,
    pub sensor_type_id: i32,
    pub sensor_name: String,
    pub vendor_name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub max_range: f32,
    pub resolution: f32,
    pub power: f32,
}

impl From<&HdfSensorInformation> for SensorDescriptor {
    /// The driver reports the type in `sensor_id`; `accuracy` becomes resolution.
    fn from(info: &HdfSensorInformation) -> Self {
        Self {
            sensor_id: SensorId::new(info.sensor_id),
            sensor_type_id: info.sensor_id,
            sensor_name: info.sensor_name.clone(),
            vendor_name: info.vendor_name.clone(),
            firmware_version: info.firmware_version.clone(),
            hardware_version: info.hardware_version.clone(),
            max_range: info.max_range,
            resolution: info.accuracy,
            power: info.power,
        }
    }
}

/// Raw event record delivered by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdfSensorEvent {
    pub sensor_id: i32,
    pub version: i32,
    pub timestamp: i64,
    pub option: u32,
    pub mode: i32,
    pub data: Vec<u8>,
    pub data_len: u32,
}

impl HdfSensorEvent {
    /// Build an event whose `data_len` matches the payload
    pub fn with_payload(sensor_id: i32, timestamp: i64, data: Vec<u8>) -> Self {
        Self {
            sensor_id,
            timestamp,
            data_len: data.len() as u32,
            data,
            ..Default::default()
        }
    }
}

/// Decoded event handed to the application report sink
///
/// `data` always has the fixed event capacity; only the first `data_len`
/// bytes are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEvent {
    pub sensor_type_id: i32,
    pub version: i32,
    pub timestamp: i64,
    pub option: u32,
    pub mode: i32,
    pub data_len: u32,
    pub data: Bytes,
}

impl SensorEvent {
    /// Valid payload bytes, bounded by the buffer capacity
    pub fn payload(&self) -> &[u8] {
        let len = (self.data_len as usize).min(self.data.len());
        &self.data[..len]
    }
}

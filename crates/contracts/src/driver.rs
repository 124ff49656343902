//! Hardware driver interface boundary
//!
//! Abstracts the HDI proxy so the connection manager can run against the real
//! driver service or an in-process mock.

use std::sync::Arc;

use crate::{HdfSensorEvent, HdfSensorInformation, Result};

/// Event callback registered with the driver
///
/// The driver invokes it once per raw event record.
pub trait DriverCallback: Send + Sync {
    /// Decode and forward one raw event
    fn on_data_event(&self, event: &HdfSensorEvent) -> Result<()>;
}

/// Observer notified when the driver process terminates
pub trait DeathRecipient: Send + Sync {
    /// Called with the handle whose remote peer died
    fn on_remote_died(&self, driver: &Arc<dyn SensorDriver>);
}

/// Live handle to the hardware driver interface
///
/// All operations return the driver's status: `0` on success, negative on failure.
pub trait SensorDriver: Send + Sync {
    /// Query the full sensor inventory
    fn get_all_sensor_info(&self, infos: &mut Vec<HdfSensorInformation>) -> i32;

    /// Enable a sensor
    fn enable(&self, sensor_id: i32) -> i32;

    /// Disable a sensor
    fn disable(&self, sensor_id: i32) -> i32;

    /// Set sampling period and maximum report delay
    fn set_batch(&self, sensor_id: i32, sampling_interval_ns: i64, report_interval_ns: i64) -> i32;

    /// Set data reporting mode
    fn set_mode(&self, sensor_id: i32, mode: i32) -> i32;

    /// Set a driver-specific option
    fn set_option(&self, sensor_id: i32, option: u32) -> i32;

    /// Register the event callback on a delivery channel
    fn register(&self, channel: i32, callback: Arc<dyn DriverCallback>) -> i32;

    /// Unregister the event callback from a delivery channel
    fn unregister(&self, channel: i32, callback: Arc<dyn DriverCallback>) -> i32;

    /// Observe termination of the driver process
    ///
    /// Returns false if the peer is already dead.
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool;

    /// Stop observing termination of the driver process
    fn remove_death_recipient(&self, recipient: &Arc<dyn DeathRecipient>) -> bool;
}

/// Source of driver handles
///
/// Mirrors the service-manager lookup: `None` while the driver service is unavailable.
pub trait DriverProvider: Send + Sync {
    /// Try once to acquire a handle
    fn get(&self) -> Option<Arc<dyn SensorDriver>>;
}

impl<F> DriverProvider for F
where
    F: Fn() -> Option<Arc<dyn SensorDriver>> + Send + Sync,
{
    fn get(&self) -> Option<Arc<dyn SensorDriver>> {
        self()
    }
}

//! Per-sensor configuration cache
//!
//! Source of truth for what must be restored after a driver restart.
//! Entries outlive the driver connection.

use std::collections::BTreeMap;
use std::sync::Mutex;

use contracts::{SensorBasicInfo, SensorId};

use crate::lock;

/// SensorId -> last-applied batch configuration and enabled flag
///
/// The mutex is held only for the map access itself, never across a driver call.
#[derive(Debug, Default)]
pub struct SensorConfigCache {
    entries: Mutex<BTreeMap<SensorId, SensorBasicInfo>>,
}

impl SensorConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the batch intervals, keeping the enabled flag of an existing entry
    pub fn update_batch(&self, sensor_id: SensorId, sampling_period_ns: i64, max_report_delay_ns: i64) {
        let mut entries = lock(&self.entries);
        let entry = entries
            .entry(sensor_id)
            .or_insert_with(|| SensorBasicInfo::new(sampling_period_ns, max_report_delay_ns));
        entry.sampling_period_ns = sampling_period_ns;
        entry.max_report_delay_ns = max_report_delay_ns;
    }

    /// Set the enabled flag of an existing entry
    ///
    /// Returns false (and changes nothing) if the sensor has no batch configuration yet.
    pub fn set_enabled(&self, sensor_id: SensorId, enabled: bool) -> bool {
        match lock(&self.entries).get_mut(&sensor_id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Drop the entry entirely
    pub fn remove(&self, sensor_id: SensorId) -> Option<SensorBasicInfo> {
        lock(&self.entries).remove(&sensor_id)
    }

    pub fn get(&self, sensor_id: SensorId) -> Option<SensorBasicInfo> {
        lock(&self.entries).get(&sensor_id).copied()
    }

    /// Copy of every entry, ordered by sensor id
    pub fn snapshot(&self) -> Vec<(SensorId, SensorBasicInfo)> {
        lock(&self.entries)
            .iter()
            .map(|(id, info)| (*id, *info))
            .collect()
    }

    /// Every cached id, ordered
    pub fn ids(&self) -> Vec<SensorId> {
        lock(&self.entries).keys().copied().collect()
    }

    /// Ids whose enabled flag is set
    pub fn enabled_ids(&self) -> Vec<SensorId> {
        lock(&self.entries)
            .iter()
            .filter(|(_, info)| info.enabled)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

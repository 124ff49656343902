//! Decode/forward callback registered with the driver
//!
//! Turns raw driver records into fixed-capacity [`SensorEvent`]s and hands
//! them to the application report sink.

use std::sync::{Arc, RwLock, Weak};

use bytes::BytesMut;
use contracts::{DriverCallback, HdfSensorEvent, ReportSink, Result, SensorError, SensorEvent};
use observability::metrics::{record_event_forwarded, record_event_rejected};
use tracing::{debug, error, trace};

use crate::condition::DataCondition;
use crate::{read, write};

/// Application-facing side of the connection: sink, wake-up condition, buffer capacity
///
/// Shared by the manager and (weakly) by every callback it hands to the driver.
#[derive(Debug)]
pub struct ReportSlot {
    sink: RwLock<Option<ReportSink>>,
    condition: Arc<DataCondition>,
    capacity: usize,
}

impl ReportSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            sink: RwLock::new(None),
            condition: Arc::new(DataCondition::new()),
            capacity,
        }
    }

    /// Replace the registered sink
    pub fn set(&self, sink: ReportSink) {
        *write(&self.sink) = Some(sink);
    }

    /// Drop the registered sink
    pub fn clear(&self) -> Option<ReportSink> {
        write(&self.sink).take()
    }

    pub fn sink(&self) -> Option<ReportSink> {
        read(&self.sink).clone()
    }

    pub fn condition(&self) -> &Arc<DataCondition> {
        &self.condition
    }

    /// Fixed payload buffer capacity (bytes)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validate, copy and forward one raw record
    pub fn dispatch(&self, event: &HdfSensorEvent) -> Result<()> {
        if event.data.is_empty() || event.data_len == 0 {
            debug!(sensor_id = event.sensor_id, "data is empty");
            record_event_rejected("empty");
            return Err(SensorError::invalid_value("event data is empty"));
        }

        let Some(sink) = self.sink() else {
            error!(sensor_id = event.sensor_id, "report sink cannot be null");
            record_event_rejected("no_sink");
            return Err(SensorError::NotInitialized);
        };

        let data = copy_payload(&event.data, self.capacity).inspect_err(|e| {
            error!(sensor_id = event.sensor_id, error = %e, "copy data failed");
            record_event_rejected("copy");
        })?;

        let sensor_event = SensorEvent {
            sensor_type_id: event.sensor_id,
            version: event.version,
            timestamp: event.timestamp,
            option: event.option,
            mode: event.mode,
            data_len: event.data_len,
            data,
        };

        sink.report(&sensor_event);
        self.condition.notify_one();
        record_event_forwarded(event.sensor_id);

        trace!(
            sensor_id = event.sensor_id,
            timestamp = event.timestamp,
            data_len = event.data_len,
            "event forwarded"
        );
        Ok(())
    }
}

/// Copy `payload` into a zero-filled buffer of exactly `capacity` bytes
fn copy_payload(payload: &[u8], capacity: usize) -> Result<bytes::Bytes> {
    if payload.len() > capacity {
        return Err(SensorError::CopyFailure {
            len: payload.len(),
            capacity,
        });
    }
    let mut buf = BytesMut::zeroed(capacity);
    buf[..payload.len()].copy_from_slice(payload);
    Ok(buf.freeze())
}

/// Callback object handed to the driver
///
/// Holds the report slot weakly, so a driver that outlives the manager never
/// calls into freed state.
#[derive(Debug, Clone)]
pub struct SensorEventCallback {
    slot: Weak<ReportSlot>,
}

impl SensorEventCallback {
    pub fn new(slot: &Arc<ReportSlot>) -> Self {
        Self {
            slot: Arc::downgrade(slot),
        }
    }
}

impl DriverCallback for SensorEventCallback {
    fn on_data_event(&self, event: &HdfSensorEvent) -> Result<()> {
        let slot = self.slot.upgrade().ok_or(SensorError::NotInitialized)?;
        slot.dispatch(event)
    }
}

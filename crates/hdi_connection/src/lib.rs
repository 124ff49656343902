//! # HDI Connection
//!
//! Sensor hardware driver interface connection manager.
//!
//! Responsibilities:
//! - Acquire the driver with bounded retry
//! - Forward driver events to the registered report sink
//! - Cache per-sensor batch/enable state
//! - Reconnect and replay the cache when the driver process dies
//! - Provide an in-process mock driver for tests and simulation

mod cache;
mod callback;
mod condition;
mod connection;
mod death;
pub mod mock_driver;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use cache::SensorConfigCache;
pub use callback::{ReportSlot, SensorEventCallback};
pub use condition::DataCondition;
pub use connection::{ConnectionState, HdiConnection, RecoveryOutcome, RecoveryStep};
pub use mock_driver::{DriverCall, MockDriverProvider, MockFailures, MockSensorDriver};

// 锁中毒时继续使用内部数据：所有临界区都只做单步 map/Option 更新
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

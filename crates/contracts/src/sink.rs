//! ReportSink - application-level event consumer
//!
//! A callable bundled with its captured context, registered once and invoked
//! through a stable interface.

use std::fmt;
use std::sync::Arc;

use crate::SensorEvent;

/// Sink function type
///
/// Uses `Arc` so the connection manager can invoke it without holding locks.
pub type ReportDataFn = Arc<dyn Fn(&SensorEvent) + Send + Sync>;

/// Registered report sink
#[derive(Clone)]
pub struct ReportSink {
    name: Arc<str>,
    callback: ReportDataFn,
}

impl ReportSink {
    /// Create a named sink from a closure
    pub fn new<F>(name: impl Into<Arc<str>>, callback: F) -> Self
    where
        F: Fn(&SensorEvent) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }

    /// Sink name (used for logging)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver one event
    pub fn report(&self, event: &SensorEvent) {
        (self.callback)(event)
    }

    /// True when both handles refer to the same callback
    pub fn same_as(&self, other: &ReportSink) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink").field("name", &self.name).finish()
    }
}

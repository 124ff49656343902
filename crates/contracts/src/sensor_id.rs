//! SensorId - Driver-assigned sensor identifier
//!
//! Plain `i32` newtype, `Copy` and usable as an ordered map key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor identifier assigned by the hardware driver.
///
/// Opaque to this layer; stable for the lifetime of a driver connection.
///
/// # Examples
/// ```
/// use contracts::SensorId;
///
/// let id: SensorId = 1.into();
/// assert_eq!(id.as_raw(), 1);
/// assert_eq!(id.to_string(), "1");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(i32);

impl SensorId {
    /// Create a new SensorId from the raw driver value.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw driver value.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl From<i32> for SensorId {
    #[inline]
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl From<SensorId> for i32 {
    #[inline]
    fn from(id: SensorId) -> Self {
        id.0
    }
}

impl PartialEq<i32> for SensorId {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorId({})", self.0)
    }
}

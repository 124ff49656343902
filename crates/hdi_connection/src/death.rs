//! Driver death observer

use std::sync::{Arc, Weak};

use contracts::{DeathRecipient, SensorDriver};
use tracing::warn;

use crate::connection::ConnectionInner;

/// Registered on every connected driver handle; triggers recovery on death
pub(crate) struct HdiDeathObserver {
    connection: Weak<ConnectionInner>,
}

impl HdiDeathObserver {
    pub(crate) fn new(connection: Weak<ConnectionInner>) -> Self {
        Self { connection }
    }
}

impl DeathRecipient for HdiDeathObserver {
    fn on_remote_died(&self, driver: &Arc<dyn SensorDriver>) {
        match self.connection.upgrade() {
            Some(connection) => connection.process_death_observer(driver),
            None => warn!("driver died after connection manager was dropped"),
        }
    }
}

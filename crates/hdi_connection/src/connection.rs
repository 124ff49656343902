//! Driver Connection Manager
//!
//! Owns the driver handle, the per-sensor configuration cache and the report
//! sink. Connects with bounded retry, and when the driver process dies it
//! reconnects and replays the cached batch/enable state.

use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use contracts::{
    ConnectionConfig, DeathRecipient, DriverCallback, DriverProvider, EventConfig, ReportSink,
    Result, SensorBasicInfo, SensorDescriptor, SensorDriver, SensorError, SensorId,
    ServiceConfig,
};
use observability::metrics::{
    record_connect_attempt, record_connection_destroyed, record_driver_death,
    record_driver_failure, record_recovery,
};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::SensorConfigCache;
use crate::callback::{ReportSlot, SensorEventCallback};
use crate::condition::DataCondition;
use crate::death::HdiDeathObserver;
use crate::{lock, read, write};

/// Connection state as seen by callers
///
/// Connect blocks its caller, so no intermediate state is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Recovery step at which a reconnect gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    /// Driver could not be re-acquired
    Connect,
    /// Event callback registration was refused
    RegisterCallback,
    /// Inventory query failed (driver unresponsive)
    SensorList,
}

/// Result of one death-triggered recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Sequence stopped at `step`; `code` is the failing status
    Aborted { step: RecoveryStep, code: i32 },
    /// Replay ran over every cached entry
    Completed {
        /// Sensors re-enabled
        restored: Vec<SensorId>,
        /// Sensors whose batch or enable replay failed
        failed: Vec<SensorId>,
    },
}

/// What replay did for one cached sensor
enum Replay {
    Restored,
    BatchOnly,
    /// Entry removed by a concurrent disable
    Dropped,
}

/// Live driver handle plus what was registered against it
#[derive(Default)]
struct DriverLink {
    driver: Option<Arc<dyn SensorDriver>>,
    event_callback: Option<Arc<SensorEventCallback>>,
    death_observer: Option<Arc<dyn DeathRecipient>>,
}

pub(crate) struct ConnectionInner {
    provider: Arc<dyn DriverProvider>,
    config: ConnectionConfig,
    /// Serializes connect, destroy, register and death recovery
    transition: Mutex<()>,
    link: RwLock<DriverLink>,
    report: Arc<ReportSlot>,
    cache: SensorConfigCache,
    last_recovery: Mutex<Option<RecoveryOutcome>>,
}

impl ConnectionInner {
    fn state(&self) -> ConnectionState {
        if read(&self.link).driver.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Clone the current handle; the link lock is released before any driver call
    fn driver(&self) -> Result<Arc<dyn SensorDriver>> {
        read(&self.link)
            .driver
            .clone()
            .ok_or(SensorError::NotInitialized)
    }

    fn connected_callback(&self) -> Result<(Arc<dyn SensorDriver>, Arc<dyn DriverCallback>)> {
        let link = read(&self.link);
        match (&link.driver, &link.event_callback) {
            (Some(driver), Some(callback)) => {
                let callback: Arc<dyn DriverCallback> = callback.clone();
                Ok((driver.clone(), callback))
            }
            _ => Err(SensorError::NotInitialized),
        }
    }

    fn connect_locked(self: &Arc<Self>) -> Result<()> {
        if self.state() == ConnectionState::Connected {
            debug!("sensor hdi already connected");
            return Ok(());
        }

        let retry_count = self.config.retry_count;
        for attempt in 1..=retry_count {
            if let Some(driver) = self.provider.get() {
                let observer: Arc<dyn DeathRecipient> =
                    Arc::new(HdiDeathObserver::new(Arc::downgrade(self)));
                // peer already dead: treat as a miss
                if driver.add_death_recipient(observer.clone()) {
                    info!(attempt, "connect sensor hdi success");
                    record_connect_attempt(true);

                    let mut link = write(&self.link);
                    link.driver = Some(driver);
                    link.event_callback = Some(Arc::new(SensorEventCallback::new(&self.report)));
                    link.death_observer = Some(observer);
                    return Ok(());
                }
                warn!(attempt, "hdi peer already dead, death recipient not added");
            }

            record_connect_attempt(false);
            warn!(attempt, retry_count, "connect hdi service failed, retry");
            if attempt < retry_count {
                thread::sleep(self.config.retry_interval());
            }
        }

        error!(retry_count, "connect sensor hdi failed");
        Err(SensorError::NotInitialized)
    }

    fn get_sensor_list(&self) -> Result<Vec<SensorDescriptor>> {
        let driver = self.driver()?;
        let mut infos = Vec::new();
        let ret = driver.get_all_sensor_info(&mut infos);
        if ret != 0 {
            error!(code = ret, "get sensor list failed");
            record_driver_failure("get_all_sensor_info");
            return Err(SensorError::driver_global("get_all_sensor_info", ret));
        }
        Ok(infos.iter().map(SensorDescriptor::from).collect())
    }

    fn enable_sensor(&self, sensor_id: SensorId) -> Result<()> {
        let driver = self.driver()?;
        let ret = driver.enable(sensor_id.as_raw());
        if ret < 0 {
            error!(%sensor_id, code = ret, "enable sensor failed");
            record_driver_failure("enable");
            return Err(SensorError::driver("enable", sensor_id, ret));
        }
        if !self.cache.set_enabled(sensor_id, true) {
            warn!(%sensor_id, "should set batch first");
        }
        Ok(())
    }

    fn disable_sensor(&self, sensor_id: SensorId) -> Result<()> {
        let driver = self.driver()?;
        let ret = driver.disable(sensor_id.as_raw());
        if ret < 0 {
            error!(%sensor_id, code = ret, "disable sensor failed");
            record_driver_failure("disable");
            return Err(SensorError::driver("disable", sensor_id, ret));
        }
        self.cache.remove(sensor_id);
        Ok(())
    }

    fn set_batch(&self, sensor_id: SensorId, sampling_interval_ns: i64, report_interval_ns: i64) -> Result<()> {
        let driver = self.driver()?;
        let ret = driver.set_batch(sensor_id.as_raw(), sampling_interval_ns, report_interval_ns);
        if ret < 0 {
            error!(%sensor_id, code = ret, "set batch failed");
            record_driver_failure("set_batch");
            return Err(SensorError::driver("set_batch", sensor_id, ret));
        }
        self.cache
            .update_batch(sensor_id, sampling_interval_ns, report_interval_ns);
        Ok(())
    }

    /// Handle termination of the driver process behind `dead`
    pub(crate) fn process_death_observer(self: &Arc<Self>, dead: &Arc<dyn SensorDriver>) {
        let _transition = lock(&self.transition);

        let observer = {
            let mut link = write(&self.link);
            let is_current = link
                .driver
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, dead));
            if !is_current {
                warn!("ignoring death notification from stale driver handle");
                return;
            }
            link.driver = None;
            link.event_callback = None;
            link.death_observer.take()
        };
        if let Some(observer) = observer {
            dead.remove_death_recipient(&observer);
        }

        warn!("sensor hdi died, reconnecting");
        record_driver_death();

        let outcome = self.reconnect_locked();
        *lock(&self.last_recovery) = Some(outcome);
    }

    #[instrument(name = "hdi_reconnect", skip(self))]
    fn reconnect_locked(self: &Arc<Self>) -> RecoveryOutcome {
        if let Err(e) = self.connect_locked() {
            error!(error = %e, "failed to get an instance of hdi service");
            return Self::abort(RecoveryStep::Connect, e.code());
        }

        let (driver, callback) = match self.connected_callback() {
            Ok(pair) => pair,
            Err(e) => return Self::abort(RecoveryStep::Connect, e.code()),
        };
        let ret = driver.register(self.config.report_channel, callback);
        if ret < 0 {
            error!(code = ret, "register callback fail");
            return Self::abort(RecoveryStep::RegisterCallback, ret);
        }

        if let Err(e) = self.get_sensor_list() {
            error!(error = %e, "get sensor list fail");
            return Self::abort(RecoveryStep::SensorList, e.code());
        }

        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for sensor_id in self.cache.ids() {
            match self.replay_entry(&driver, sensor_id) {
                Ok(Replay::Restored) => restored.push(sensor_id),
                Ok(Replay::BatchOnly) => {
                    debug!(%sensor_id, "sensor not enabled, batch restored only");
                }
                Ok(Replay::Dropped) => {
                    debug!(%sensor_id, "sensor disabled during recovery, skipped");
                }
                Err(e) => {
                    error!(%sensor_id, error = %e, "sensor replay fail during recovery");
                    failed.push(sensor_id);
                }
            }
        }

        info!(
            restored = restored.len(),
            failed = failed.len(),
            "sensor hdi recovery finished"
        );
        record_recovery("completed");
        RecoveryOutcome::Completed { restored, failed }
    }

    /// Restore one cached sensor on the new handle
    ///
    /// The entry is re-read around every driver call so that a disable racing
    /// with recovery wins. The cache itself is never written here.
    fn replay_entry(&self, driver: &Arc<dyn SensorDriver>, sensor_id: SensorId) -> Result<Replay> {
        let Some(info) = self.cache.get(sensor_id) else {
            return Ok(Replay::Dropped);
        };
        let ret = driver.set_batch(
            sensor_id.as_raw(),
            info.sampling_period_ns,
            info.max_report_delay_ns,
        );
        if ret < 0 {
            record_driver_failure("set_batch");
            return Err(SensorError::driver("set_batch", sensor_id, ret));
        }

        match self.cache.get(sensor_id) {
            None => return Ok(Replay::Dropped),
            Some(current) if !current.enabled => return Ok(Replay::BatchOnly),
            Some(_) => {}
        }
        let ret = driver.enable(sensor_id.as_raw());
        if ret < 0 {
            record_driver_failure("enable");
            return Err(SensorError::driver("enable", sensor_id, ret));
        }

        if self.cache.get(sensor_id).is_some_and(|current| current.enabled) {
            return Ok(Replay::Restored);
        }
        // disabled between the check and the enable
        let ret = driver.disable(sensor_id.as_raw());
        if ret < 0 {
            record_driver_failure("disable");
            return Err(SensorError::driver("disable", sensor_id, ret));
        }
        Ok(Replay::Dropped)
    }

    fn abort(step: RecoveryStep, code: i32) -> RecoveryOutcome {
        let label = match step {
            RecoveryStep::Connect => "aborted_connect",
            RecoveryStep::RegisterCallback => "aborted_register",
            RecoveryStep::SensorList => "aborted_sensor_list",
        };
        record_recovery(label);
        RecoveryOutcome::Aborted { step, code }
    }
}

/// Connection manager for the sensor hardware driver interface
///
/// Constructed once by the hosting service and shared by handle; clones refer
/// to the same connection.
///
/// # Example
///
/// ```ignore
/// let connection = HdiConnection::new(provider);
/// connection.connect_hdi()?;
/// connection.set_batch(SensorId::new(1), 10_000_000, 0)?;
/// connection.enable_sensor(SensorId::new(1))?;
/// connection.register_data_report(Some(ReportSink::new("service", |event| {
///     println!("sensor {} len {}", event.sensor_type_id, event.data_len);
/// })))?;
/// ```
#[derive(Clone)]
pub struct HdiConnection {
    inner: Arc<ConnectionInner>,
}

impl HdiConnection {
    /// Create a disconnected manager with default retry policy and event capacity
    pub fn new(provider: Arc<dyn DriverProvider>) -> Self {
        Self::with_config(provider, ConnectionConfig::default(), EventConfig::default())
    }

    /// Create a disconnected manager with explicit settings
    pub fn with_config(
        provider: Arc<dyn DriverProvider>,
        config: ConnectionConfig,
        event: EventConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                provider,
                config,
                transition: Mutex::new(()),
                link: RwLock::new(DriverLink::default()),
                report: Arc::new(ReportSlot::new(event.max_data_len)),
                cache: SensorConfigCache::new(),
                last_recovery: Mutex::new(None),
            }),
        }
    }

    /// Create a disconnected manager from a loaded service configuration
    pub fn from_service_config(provider: Arc<dyn DriverProvider>, config: &ServiceConfig) -> Self {
        Self::with_config(provider, config.connection.clone(), config.event.clone())
    }

    /// Acquire the driver interface, retrying with a fixed delay
    ///
    /// Blocks the calling thread for up to `retry_count * retry_interval`.
    ///
    /// # Errors
    /// [`SensorError::NotInitialized`] once all attempts are exhausted.
    #[instrument(name = "hdi_connect", skip(self))]
    pub fn connect_hdi(&self) -> Result<()> {
        let _transition = lock(&self.inner.transition);
        self.inner.connect_locked()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Query and map the driver's sensor inventory
    #[instrument(name = "hdi_get_sensor_list", skip(self))]
    pub fn get_sensor_list(&self) -> Result<Vec<SensorDescriptor>> {
        self.inner.get_sensor_list()
    }

    /// Enable a sensor and mark its cache entry enabled
    ///
    /// With no prior batch configuration the driver is still called, but no
    /// cache entry is created.
    pub fn enable_sensor(&self, sensor_id: SensorId) -> Result<()> {
        self.inner.enable_sensor(sensor_id)
    }

    /// Disable a sensor and drop its cache entry
    pub fn disable_sensor(&self, sensor_id: SensorId) -> Result<()> {
        self.inner.disable_sensor(sensor_id)
    }

    /// Set batch intervals and record them for replay
    pub fn set_batch(
        &self,
        sensor_id: SensorId,
        sampling_interval_ns: i64,
        report_interval_ns: i64,
    ) -> Result<()> {
        self.inner
            .set_batch(sensor_id, sampling_interval_ns, report_interval_ns)
    }

    pub fn set_mode(&self, sensor_id: SensorId, mode: i32) -> Result<()> {
        let driver = self.inner.driver()?;
        let ret = driver.set_mode(sensor_id.as_raw(), mode);
        if ret < 0 {
            error!(%sensor_id, mode, code = ret, "set mode failed");
            record_driver_failure("set_mode");
            return Err(SensorError::driver("set_mode", sensor_id, ret));
        }
        Ok(())
    }

    pub fn set_option(&self, sensor_id: SensorId, option: u32) -> Result<()> {
        let driver = self.inner.driver()?;
        let ret = driver.set_option(sensor_id.as_raw(), option);
        if ret < 0 {
            error!(%sensor_id, option, code = ret, "set option failed");
            record_driver_failure("set_option");
            return Err(SensorError::driver("set_option", sensor_id, ret));
        }
        Ok(())
    }

    /// Reserved for driver-specific extension commands
    pub fn run_command(&self, sensor_id: SensorId, cmd: i32, params: i32) -> Result<()> {
        debug!(%sensor_id, cmd, params, "run command");
        Ok(())
    }

    /// Register the application report sink
    ///
    /// # Errors
    /// - [`SensorError::InvalidValue`] for `None` (the previous sink stays)
    /// - [`SensorError::NotInitialized`] when disconnected or when the driver
    ///   refuses the callback registration
    #[instrument(name = "hdi_register_data_report", skip(self, sink))]
    pub fn register_data_report(&self, sink: Option<ReportSink>) -> Result<()> {
        let Some(sink) = sink else {
            error!("report sink cannot be null");
            return Err(SensorError::invalid_value("report sink cannot be null"));
        };

        let _transition = lock(&self.inner.transition);
        let (driver, callback) = self.inner.connected_callback()?;
        let ret = driver.register(self.inner.config.report_channel, callback);
        if ret < 0 {
            error!(code = ret, "register callback failed");
            record_driver_failure("register");
            return Err(SensorError::NotInitialized);
        }

        info!(sink = sink.name(), "report sink registered");
        self.inner.report.set(sink);
        Ok(())
    }

    /// Tear down the driver connection
    ///
    /// Unregisters the callback, drops the sink, removes the death observer.
    #[instrument(name = "hdi_destroy", skip(self))]
    pub fn destroy_hdi_connection(&self) -> Result<()> {
        let _transition = lock(&self.inner.transition);
        let (driver, callback) = self.inner.connected_callback()?;

        let ret = driver.unregister(self.inner.config.report_channel, callback);
        if ret < 0 {
            error!(code = ret, "unregister callback failed");
            record_driver_failure("unregister");
            return Err(SensorError::driver_global("unregister", ret));
        }

        self.inner.report.clear();
        let observer = {
            let mut link = write(&self.inner.link);
            link.event_callback = None;
            link.driver = None;
            link.death_observer.take()
        };
        if let Some(observer) = observer {
            driver.remove_death_recipient(&observer);
        }

        record_connection_destroyed();
        info!("sensor hdi connection destroyed");
        Ok(())
    }

    /// Cached configuration of one sensor
    pub fn sensor_info(&self, sensor_id: SensorId) -> Option<SensorBasicInfo> {
        self.inner.cache.get(sensor_id)
    }

    pub fn cache(&self) -> &SensorConfigCache {
        &self.inner.cache
    }

    /// Currently registered report sink
    pub fn report_sink(&self) -> Option<ReportSink> {
        self.inner.report.sink()
    }

    /// Callback currently bound to the driver, for in-process delivery paths
    pub fn event_callback(&self) -> Option<Arc<dyn DriverCallback>> {
        read(&self.inner.link)
            .event_callback
            .clone()
            .map(|callback| callback as Arc<dyn DriverCallback>)
    }

    pub fn data_condition(&self) -> Arc<DataCondition> {
        self.inner.report.condition().clone()
    }

    /// Block until the next event is forwarded or `timeout` elapses
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        self.inner.report.condition().wait_for_event(timeout)
    }

    /// Outcome of the most recent death-triggered recovery
    pub fn last_recovery(&self) -> Option<RecoveryOutcome> {
        lock(&self.inner.last_recovery).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_driver::{
        demo_sensors, DriverCall, MockDriverProvider, MockFailures, MockSensorDriver, MOCK_FAILURE,
    };
    use contracts::{HdfSensorEvent, HdfSensorInformation, SensorEvent, REPORT_CHANNEL};

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            retry_count: 3,
            retry_interval_ms: 1,
            report_channel: REPORT_CHANNEL,
        }
    }

    fn setup(sensors: usize) -> (Arc<MockDriverProvider>, HdiConnection) {
        let provider = Arc::new(MockDriverProvider::with_demo_sensors(sensors));
        let connection =
            HdiConnection::with_config(provider.clone(), fast_config(), EventConfig::default());
        (provider, connection)
    }

    fn collecting_sink() -> (ReportSink, Arc<Mutex<Vec<SensorEvent>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let sink = ReportSink::new("collect", move |event: &SensorEvent| {
            received_clone.lock().unwrap().push(event.clone());
        });
        (sink, received)
    }

    fn id(raw: i32) -> SensorId {
        SensorId::new(raw)
    }

    /// Provider handing out a fixed sequence of handles, then nothing
    fn scripted_provider(handles: Vec<Arc<dyn SensorDriver>>) -> Arc<dyn DriverProvider> {
        let queue = Mutex::new(handles.into_iter().rev().collect::<Vec<_>>());
        Arc::new(move || queue.lock().unwrap().pop())
    }

    /// Driver that lets the user disable one sensor while its batch is replayed
    struct DisableOnReplay {
        inner: Arc<MockSensorDriver>,
        target: i32,
        connection: Mutex<Option<HdiConnection>>,
    }

    impl SensorDriver for DisableOnReplay {
        fn get_all_sensor_info(&self, infos: &mut Vec<HdfSensorInformation>) -> i32 {
            self.inner.get_all_sensor_info(infos)
        }

        fn enable(&self, sensor_id: i32) -> i32 {
            self.inner.enable(sensor_id)
        }

        fn disable(&self, sensor_id: i32) -> i32 {
            self.inner.disable(sensor_id)
        }

        fn set_batch(&self, sensor_id: i32, sampling_ns: i64, report_ns: i64) -> i32 {
            let ret = self
                .inner
                .set_batch(sensor_id, sampling_ns, report_ns);
            if sensor_id == self.target {
                let connection = self.connection.lock().unwrap().take();
                if let Some(connection) = connection {
                    connection.disable_sensor(id(sensor_id)).unwrap();
                }
            }
            ret
        }

        fn set_mode(&self, sensor_id: i32, mode: i32) -> i32 {
            self.inner.set_mode(sensor_id, mode)
        }

        fn set_option(&self, sensor_id: i32, option: u32) -> i32 {
            self.inner.set_option(sensor_id, option)
        }

        fn register(&self, channel: i32, callback: Arc<dyn DriverCallback>) -> i32 {
            self.inner.register(channel, callback)
        }

        fn unregister(&self, channel: i32, callback: Arc<dyn DriverCallback>) -> i32 {
            self.inner.unregister(channel, callback)
        }

        fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
            self.inner.add_death_recipient(recipient)
        }

        fn remove_death_recipient(&self, recipient: &Arc<dyn DeathRecipient>) -> bool {
            self.inner.remove_death_recipient(recipient)
        }
    }

    #[test]
    fn test_connect_retries_until_driver_available() {
        let (provider, connection) = setup(2);
        provider.miss_next(2);

        connection.connect_hdi().unwrap();
        assert!(connection.is_connected());
        assert_eq!(provider.get_calls(), 3);

        // already connected: no new lookup
        connection.connect_hdi().unwrap();
        assert_eq!(provider.get_calls(), 3);
    }

    #[test]
    fn test_connect_gives_up_after_retry_count() {
        let (provider, connection) = setup(2);
        provider.set_available(false);

        let err = connection.connect_hdi().unwrap_err();
        assert!(err.is_not_initialized());
        assert_eq!(provider.get_calls(), 3);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_skips_handle_with_dead_peer() {
        let dead = Arc::new(MockSensorDriver::new(1, demo_sensors(1), MockFailures::default()));
        dead.kill();
        let live = Arc::new(MockSensorDriver::new(2, demo_sensors(1), MockFailures::default()));
        let handles: Vec<Arc<dyn SensorDriver>> = vec![dead.clone(), live.clone()];
        let provider = scripted_provider(handles);
        let connection = HdiConnection::with_config(provider, fast_config(), EventConfig::default());

        connection.connect_hdi().unwrap();
        assert_eq!(dead.death_recipient_count(), 0);
        assert_eq!(live.death_recipient_count(), 1);

        connection.enable_sensor(id(1)).unwrap();
        assert_eq!(live.enabled_sensors(), vec![1]);
    }

    #[test]
    fn test_connect_fails_when_every_handle_is_dead() {
        let handles: Vec<Arc<dyn SensorDriver>> = (1..=3)
            .map(|generation| {
                let driver =
                    Arc::new(MockSensorDriver::new(generation, Vec::new(), MockFailures::default()));
                driver.kill();
                driver as Arc<dyn SensorDriver>
            })
            .collect();
        let connection = HdiConnection::with_config(
            scripted_provider(handles),
            fast_config(),
            EventConfig::default(),
        );

        assert!(connection.connect_hdi().unwrap_err().is_not_initialized());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_operations_require_connection() {
        let (_provider, connection) = setup(1);
        assert!(connection.enable_sensor(id(1)).unwrap_err().is_not_initialized());
        assert!(connection.set_batch(id(1), 1, 0).unwrap_err().is_not_initialized());
        assert!(connection.get_sensor_list().unwrap_err().is_not_initialized());
        let (sink, _) = collecting_sink();
        assert!(connection
            .register_data_report(Some(sink))
            .unwrap_err()
            .is_not_initialized());
        assert!(connection.cache().is_empty());
    }

    #[test]
    fn test_sensor_list_maps_inventory() {
        let (provider, connection) = setup(3);
        connection.connect_hdi().unwrap();

        let list = connection.get_sensor_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].sensor_type_id, 1);
        assert_eq!(list[0].sensor_name, "accelerometer");

        provider.current().unwrap().set_failures(MockFailures {
            fail_sensor_info: true,
            ..Default::default()
        });
        let err = connection.get_sensor_list().unwrap_err();
        assert_eq!(err.code(), MOCK_FAILURE);
        assert!(connection.is_connected());
    }

    #[test]
    fn test_mode_option_and_command_pass_through() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();

        connection.set_mode(id(1), 2).unwrap();
        connection.set_option(id(1), 7).unwrap();
        connection.run_command(id(1), 1, 0).unwrap();

        let calls = provider.current().unwrap().calls();
        assert_eq!(
            calls,
            vec![DriverCall::SetMode(1, 2), DriverCall::SetOption(1, 7)]
        );
        assert!(connection.cache().is_empty());
    }

    #[test]
    fn test_batch_last_write_wins() {
        let (_provider, connection) = setup(1);
        connection.connect_hdi().unwrap();

        connection.set_batch(id(1), 10_000_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();
        connection.set_batch(id(1), 20_000_000, 5).unwrap();

        let info = connection.sensor_info(id(1)).unwrap();
        assert_eq!(info.sampling_period_ns, 20_000_000);
        assert_eq!(info.max_report_delay_ns, 5);
        assert!(info.enabled);
    }

    #[test]
    fn test_enable_without_batch_is_not_cached() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();

        connection.enable_sensor(id(1)).unwrap();
        assert_eq!(provider.current().unwrap().enabled_sensors(), vec![1]);
        assert!(connection.sensor_info(id(1)).is_none());
    }

    #[test]
    fn test_failed_driver_call_leaves_cache_untouched() {
        let (provider, connection) = setup(2);
        connection.connect_hdi().unwrap();
        provider.current().unwrap().set_failures(MockFailures {
            fail_set_batch: [2].into_iter().collect(),
            ..Default::default()
        });

        let err = connection.set_batch(id(2), 1, 0).unwrap_err();
        assert_eq!(err.code(), MOCK_FAILURE);
        assert!(connection.sensor_info(id(2)).is_none());
    }

    #[test]
    fn test_disable_drops_cache_entry() {
        let (_provider, connection) = setup(1);
        connection.connect_hdi().unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();

        connection.disable_sensor(id(1)).unwrap();
        assert!(connection.sensor_info(id(1)).is_none());
    }

    #[test]
    fn test_register_none_keeps_previous_sink() {
        let (_provider, connection) = setup(1);
        connection.connect_hdi().unwrap();
        let (sink, _) = collecting_sink();
        connection.register_data_report(Some(sink.clone())).unwrap();

        let err = connection.register_data_report(None).unwrap_err();
        assert!(matches!(err, SensorError::InvalidValue { .. }));
        assert!(connection.report_sink().unwrap().same_as(&sink));
    }

    #[test]
    fn test_register_refused_by_driver() {
        let (provider, connection) = setup(1);
        provider.set_next_failures(MockFailures {
            fail_register: true,
            ..Default::default()
        });
        connection.connect_hdi().unwrap();

        let (sink, _) = collecting_sink();
        let err = connection.register_data_report(Some(sink)).unwrap_err();
        assert!(err.is_not_initialized());
        assert!(connection.report_sink().is_none());
    }

    #[test]
    fn test_driver_event_reaches_sink() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();
        let (sink, received) = collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();

        let event = HdfSensorEvent::with_payload(1, 42, vec![7, 8]);
        let result = provider.current().unwrap().emit(REPORT_CHANNEL, &event);
        assert!(matches!(result, Some(Ok(()))));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].timestamp, 42);
        assert_eq!(received[0].payload(), &[7, 8]);
        assert_eq!(connection.data_condition().sequence(), 1);
    }

    #[test]
    fn test_recovery_restores_enabled_sensors() {
        let (provider, connection) = setup(3);
        connection.connect_hdi().unwrap();
        let (sink, received) = collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();
        for raw in 1..=3 {
            connection.set_batch(id(raw), raw as i64 * 1_000, 0).unwrap();
        }
        connection.enable_sensor(id(1)).unwrap();
        connection.enable_sensor(id(3)).unwrap();

        let dead = provider.kill_driver().unwrap();
        assert_eq!(dead.death_recipient_count(), 0);

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Completed {
                restored: vec![id(1), id(3)],
                failed: vec![],
            })
        );
        assert!(connection.is_connected());

        let driver = provider.current().unwrap();
        assert_eq!(driver.generation(), 2);
        assert_eq!(driver.enabled_sensors(), vec![1, 3]);
        assert_eq!(driver.batch_of(2), Some((2_000, 0)));
        assert!(driver.has_callback(REPORT_CHANNEL));
        assert_eq!(driver.death_recipient_count(), 1);

        // sink survives recovery
        let event = HdfSensorEvent::with_payload(3, 1, vec![1]);
        driver.emit(REPORT_CHANNEL, &event);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_recovery_reports_per_sensor_failures() {
        let (provider, connection) = setup(2);
        connection.connect_hdi().unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();
        connection.set_batch(id(2), 1_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();
        connection.enable_sensor(id(2)).unwrap();

        provider.set_next_failures(MockFailures {
            fail_enable: [1].into_iter().collect(),
            ..Default::default()
        });
        provider.kill_driver();

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Completed {
                restored: vec![id(2)],
                failed: vec![id(1)],
            })
        );
        assert!(connection.sensor_info(id(1)).unwrap().enabled);
    }

    #[test]
    fn test_recovery_aborts_when_driver_missing() {
        let (provider, connection) = setup(2);
        connection.connect_hdi().unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();

        provider.set_available(false);
        provider.kill_driver();

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Aborted {
                step: RecoveryStep::Connect,
                code: SensorError::NotInitialized.code(),
            })
        );
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.cache().enabled_ids(), vec![id(1)]);

        // a later explicit connect picks up again
        provider.set_available(true);
        connection.connect_hdi().unwrap();
        assert!(connection.is_connected());
    }

    #[test]
    fn test_recovery_aborts_on_register_failure() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();

        provider.set_next_failures(MockFailures {
            fail_register: true,
            ..Default::default()
        });
        provider.kill_driver();

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Aborted {
                step: RecoveryStep::RegisterCallback,
                code: MOCK_FAILURE,
            })
        );
        assert!(provider.current().unwrap().enabled_sensors().is_empty());
    }

    #[test]
    fn test_recovery_aborts_on_sensor_list_failure() {
        let (provider, connection) = setup(2);
        connection.connect_hdi().unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();
        connection.set_batch(id(2), 2_000, 0).unwrap();
        connection.enable_sensor(id(1)).unwrap();
        let before = connection.cache().snapshot();

        provider.set_next_failures(MockFailures {
            fail_sensor_info: true,
            ..Default::default()
        });
        provider.kill_driver();

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Aborted {
                step: RecoveryStep::SensorList,
                code: MOCK_FAILURE,
            })
        );
        assert!(connection.is_connected());
        let driver = provider.current().unwrap();
        assert!(driver.enabled_sensors().is_empty());
        assert_eq!(driver.batch_of(1), None);
        assert_eq!(connection.cache().snapshot(), before);
    }

    #[test]
    fn test_disable_during_recovery_is_not_undone() {
        let first = Arc::new(MockSensorDriver::new(1, demo_sensors(2), MockFailures::default()));
        let second = Arc::new(MockSensorDriver::new(2, demo_sensors(2), MockFailures::default()));
        let wrapper = Arc::new(DisableOnReplay {
            inner: second.clone(),
            target: 1,
            connection: Mutex::new(None),
        });
        let handles: Vec<Arc<dyn SensorDriver>> = vec![first.clone(), wrapper.clone()];
        let connection = HdiConnection::with_config(
            scripted_provider(handles),
            fast_config(),
            EventConfig::default(),
        );

        connection.connect_hdi().unwrap();
        for raw in 1..=2 {
            connection.set_batch(id(raw), 1_000, 0).unwrap();
            connection.enable_sensor(id(raw)).unwrap();
        }
        *wrapper.connection.lock().unwrap() = Some(connection.clone());

        first.kill();

        assert_eq!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Completed {
                restored: vec![id(2)],
                failed: vec![],
            })
        );
        assert!(connection.sensor_info(id(1)).is_none());
        assert!(connection.sensor_info(id(2)).unwrap().enabled);
        assert_eq!(second.enabled_sensors(), vec![2]);
    }

    #[test]
    fn test_stale_death_notification_ignored() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();

        let stale: Arc<dyn SensorDriver> =
            Arc::new(MockSensorDriver::new(99, Vec::new(), MockFailures::default()));
        connection.inner.process_death_observer(&stale);

        assert!(connection.is_connected());
        assert!(connection.last_recovery().is_none());
        assert_eq!(provider.generations(), 1);
    }

    #[test]
    fn test_destroy_tears_down_link() {
        let (provider, connection) = setup(1);
        connection.connect_hdi().unwrap();
        let (sink, _) = collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();
        connection.set_batch(id(1), 1_000, 0).unwrap();

        connection.destroy_hdi_connection().unwrap();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(connection.report_sink().is_none());
        assert!(connection.event_callback().is_none());
        // cache outlives the connection
        assert!(connection.sensor_info(id(1)).is_some());

        let driver = provider.current().unwrap();
        assert!(!driver.has_callback(REPORT_CHANNEL));
        assert_eq!(driver.death_recipient_count(), 0);

        // death after destroy does not trigger recovery
        provider.kill_driver();
        assert!(connection.last_recovery().is_none());
        assert!(connection
            .destroy_hdi_connection()
            .unwrap_err()
            .is_not_initialized());
    }
}

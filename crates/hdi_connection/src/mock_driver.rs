//! Mock 传感器驱动
//!
//! 用于单元测试和 CLI 模拟的进程内驱动实现，支持注入失败场景与驱动进程死亡。

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{
    DeathRecipient, DriverCallback, DriverProvider, HdfSensorEvent, HdfSensorInformation, Result,
    SensorDriver,
};
use tracing::{debug, instrument, warn};

use crate::lock;

/// 驱动进程已死亡时返回的状态码
pub const DEAD_OBJECT: i32 = -32;

/// 注入失败时返回的状态码
pub const MOCK_FAILURE: i32 = -1;

/// Mock 驱动失败注入配置
#[derive(Debug, Default, Clone)]
pub struct MockFailures {
    /// get_all_sensor_info 失败
    pub fail_sensor_info: bool,
    /// register 失败
    pub fail_register: bool,
    /// unregister 失败
    pub fail_unregister: bool,
    /// enable 应该失败的 sensor IDs
    pub fail_enable: HashSet<i32>,
    /// disable 应该失败的 sensor IDs
    pub fail_disable: HashSet<i32>,
    /// set_batch 应该失败的 sensor IDs
    pub fail_set_batch: HashSet<i32>,
}

/// 驱动调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    GetAllSensorInfo,
    Enable(i32),
    Disable(i32),
    SetBatch(i32, i64, i64),
    SetMode(i32, i32),
    SetOption(i32, u32),
    Register(i32),
    Unregister(i32),
}

/// Mock 传感器驱动（一个驱动进程实例）
pub struct MockSensorDriver {
    /// 第几次启动的驱动进程
    generation: u32,
    /// 传感器清单
    sensors: Vec<HdfSensorInformation>,
    /// 失败注入
    failures: Mutex<MockFailures>,
    /// 已使能的传感器
    enabled: Mutex<BTreeSet<i32>>,
    /// 批处理参数 (sensor_id -> (采样周期, 上报延迟))
    batches: Mutex<BTreeMap<i32, (i64, i64)>>,
    /// 已注册的回调 (channel -> callback)
    callbacks: Mutex<HashMap<i32, Arc<dyn DriverCallback>>>,
    /// 死亡观察者
    recipients: Mutex<Vec<Arc<dyn DeathRecipient>>>,
    /// 调用记录
    calls: Mutex<Vec<DriverCall>>,
    /// 进程是否已死亡
    dead: AtomicBool,
}

impl MockSensorDriver {
    /// 创建新的驱动实例
    pub fn new(generation: u32, sensors: Vec<HdfSensorInformation>, failures: MockFailures) -> Self {
        Self {
            generation,
            sensors,
            failures: Mutex::new(failures),
            enabled: Mutex::new(BTreeSet::new()),
            batches: Mutex::new(BTreeMap::new()),
            callbacks: Mutex::new(HashMap::new()),
            recipients: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            dead: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// 修改失败注入配置
    pub fn set_failures(&self, failures: MockFailures) {
        *lock(&self.failures) = failures;
    }

    /// 当前已使能的传感器
    pub fn enabled_sensors(&self) -> Vec<i32> {
        lock(&self.enabled).iter().copied().collect()
    }

    /// 某传感器当前的批处理参数
    pub fn batch_of(&self, sensor_id: i32) -> Option<(i64, i64)> {
        lock(&self.batches).get(&sensor_id).copied()
    }

    /// 是否在 channel 上注册了回调
    pub fn has_callback(&self, channel: i32) -> bool {
        lock(&self.callbacks).contains_key(&channel)
    }

    /// 当前死亡观察者数量
    pub fn death_recipient_count(&self) -> usize {
        lock(&self.recipients).len()
    }

    /// 调用记录快照
    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.calls).clone()
    }

    /// 通过 channel 上注册的回调投递一个事件
    ///
    /// 没有注册回调时返回 None。
    pub fn emit(&self, channel: i32, event: &HdfSensorEvent) -> Option<Result<()>> {
        let callback = lock(&self.callbacks).get(&channel).cloned()?;
        Some(callback.on_data_event(event))
    }

    /// 模拟驱动进程死亡，同步通知所有死亡观察者
    #[instrument(name = "mock_driver_kill", skip(self), fields(generation = self.generation))]
    pub fn kill(self: &Arc<Self>) {
        if self.dead.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.callbacks).clear();

        // 回调中会调用 remove_death_recipient，先释放锁
        let recipients: Vec<_> = lock(&self.recipients).clone();
        let handle: Arc<dyn SensorDriver> = self.clone();
        debug!(recipients = recipients.len(), "mock driver died");
        for recipient in recipients {
            recipient.on_remote_died(&handle);
        }
    }

    fn record(&self, call: DriverCall) {
        lock(&self.calls).push(call);
    }

    fn check_alive(&self) -> std::result::Result<(), i32> {
        if self.is_dead() {
            Err(DEAD_OBJECT)
        } else {
            Ok(())
        }
    }
}

impl SensorDriver for MockSensorDriver {
    fn get_all_sensor_info(&self, infos: &mut Vec<HdfSensorInformation>) -> i32 {
        self.record(DriverCall::GetAllSensorInfo);
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_sensor_info {
            return MOCK_FAILURE;
        }
        infos.extend(self.sensors.iter().cloned());
        0
    }

    fn enable(&self, sensor_id: i32) -> i32 {
        self.record(DriverCall::Enable(sensor_id));
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_enable.contains(&sensor_id) {
            return MOCK_FAILURE;
        }
        lock(&self.enabled).insert(sensor_id);
        0
    }

    fn disable(&self, sensor_id: i32) -> i32 {
        self.record(DriverCall::Disable(sensor_id));
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_disable.contains(&sensor_id) {
            return MOCK_FAILURE;
        }
        lock(&self.enabled).remove(&sensor_id);
        0
    }

    fn set_batch(&self, sensor_id: i32, sampling_interval_ns: i64, report_interval_ns: i64) -> i32 {
        self.record(DriverCall::SetBatch(
            sensor_id,
            sampling_interval_ns,
            report_interval_ns,
        ));
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_set_batch.contains(&sensor_id) {
            return MOCK_FAILURE;
        }
        lock(&self.batches).insert(sensor_id, (sampling_interval_ns, report_interval_ns));
        0
    }

    fn set_mode(&self, sensor_id: i32, mode: i32) -> i32 {
        self.record(DriverCall::SetMode(sensor_id, mode));
        self.check_alive().err().unwrap_or(0)
    }

    fn set_option(&self, sensor_id: i32, option: u32) -> i32 {
        self.record(DriverCall::SetOption(sensor_id, option));
        self.check_alive().err().unwrap_or(0)
    }

    fn register(&self, channel: i32, callback: Arc<dyn DriverCallback>) -> i32 {
        self.record(DriverCall::Register(channel));
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_register {
            return MOCK_FAILURE;
        }
        lock(&self.callbacks).insert(channel, callback);
        0
    }

    fn unregister(&self, channel: i32, _callback: Arc<dyn DriverCallback>) -> i32 {
        self.record(DriverCall::Unregister(channel));
        if let Err(code) = self.check_alive() {
            return code;
        }
        if lock(&self.failures).fail_unregister {
            return MOCK_FAILURE;
        }
        lock(&self.callbacks).remove(&channel);
        0
    }

    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        if self.is_dead() {
            return false;
        }
        lock(&self.recipients).push(recipient);
        true
    }

    fn remove_death_recipient(&self, recipient: &Arc<dyn DeathRecipient>) -> bool {
        let mut recipients = lock(&self.recipients);
        let before = recipients.len();
        recipients.retain(|r| !Arc::ptr_eq(r, recipient));
        recipients.len() != before
    }
}

/// Mock 驱动服务（模拟服务管理器查询）
///
/// 驱动被 kill 后，下一次 `get()` 会启动新的驱动实例（模拟驱动进程重启）。
pub struct MockDriverProvider {
    /// 传感器清单（每个驱动实例共享）
    sensors: Vec<HdfSensorInformation>,
    /// 新驱动实例使用的失败注入配置
    next_failures: Mutex<MockFailures>,
    /// 当前驱动实例
    current: Mutex<Option<Arc<MockSensorDriver>>>,
    /// 服务是否可用
    available: AtomicBool,
    /// 接下来 N 次 get() 返回 None
    pending_misses: AtomicU32,
    /// 已启动的驱动实例数
    generations: AtomicU32,
    /// get() 调用次数
    get_calls: AtomicU32,
}

impl MockDriverProvider {
    /// 创建 mock 驱动服务
    pub fn new(sensors: Vec<HdfSensorInformation>) -> Self {
        Self {
            sensors,
            next_failures: Mutex::new(MockFailures::default()),
            current: Mutex::new(None),
            available: AtomicBool::new(true),
            pending_misses: AtomicU32::new(0),
            generations: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
        }
    }

    /// 生成 N 个演示用传感器 (id 从 1 开始)
    pub fn with_demo_sensors(count: usize) -> Self {
        Self::new(demo_sensors(count))
    }

    /// 当前驱动实例（若已启动）
    pub fn current(&self) -> Option<Arc<MockSensorDriver>> {
        lock(&self.current).clone()
    }

    /// 设置服务可用性
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 接下来 `count` 次查询失败
    pub fn miss_next(&self, count: u32) {
        self.pending_misses.store(count, Ordering::SeqCst);
    }

    /// 设置下一次启动的驱动实例的失败注入
    pub fn set_next_failures(&self, failures: MockFailures) {
        *lock(&self.next_failures) = failures;
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> u32 {
        self.generations.load(Ordering::SeqCst)
    }

    /// 杀死当前驱动实例
    ///
    /// 返回被杀死的实例。
    pub fn kill_driver(&self) -> Option<Arc<MockSensorDriver>> {
        let driver = lock(&self.current).take();
        match &driver {
            Some(driver) => driver.kill(),
            None => warn!("no mock driver running"),
        }
        driver
    }

    fn spawn_driver(&self) -> Arc<MockSensorDriver> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let failures = lock(&self.next_failures).clone();
        debug!(generation, "mock driver started");
        Arc::new(MockSensorDriver::new(
            generation,
            self.sensors.clone(),
            failures,
        ))
    }
}

impl DriverProvider for MockDriverProvider {
    fn get(&self) -> Option<Arc<dyn SensorDriver>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let missed = self
            .pending_misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if missed || !self.available.load(Ordering::SeqCst) {
            return None;
        }

        let mut current = lock(&self.current);
        let driver = current.get_or_insert_with(|| self.spawn_driver()).clone();
        Some(driver)
    }
}

/// 演示用传感器清单
pub fn demo_sensors(count: usize) -> Vec<HdfSensorInformation> {
    const NAMES: [&str; 4] = ["accelerometer", "gyroscope", "magnetometer", "barometer"];
    (0..count)
        .map(|i| {
            let id = i as i32 + 1;
            HdfSensorInformation {
                sensor_id: id,
                sensor_name: NAMES[i % NAMES.len()].to_string(),
                vendor_name: "mock".to_string(),
                firmware_version: "1.0.0".to_string(),
                hardware_version: "1.0".to_string(),
                sensor_type_id: id,
                max_range: 8.0,
                accuracy: 0.01,
                power: 0.1,
            }
        })
        .collect()
}

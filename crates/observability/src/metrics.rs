//! Sensor HDI 指标收集模块
//!
//! 驱动连接、死亡恢复、事件转发与 socket 读取的运行指标。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录一次驱动连接尝试
pub fn record_connect_attempt(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("sensor_hdi_connect_attempts_total", "status" => status).increment(1);
    if success {
        gauge!("sensor_hdi_connected").set(1.0);
    }
}

/// 记录主动销毁连接
pub fn record_connection_destroyed() {
    counter!("sensor_hdi_destroyed_total").increment(1);
    gauge!("sensor_hdi_connected").set(0.0);
}

/// 记录驱动进程死亡
pub fn record_driver_death() {
    counter!("sensor_hdi_driver_deaths_total").increment(1);
    gauge!("sensor_hdi_connected").set(0.0);
}

/// 记录驱动调用失败
pub fn record_driver_failure(op: &'static str) {
    counter!("sensor_hdi_driver_failures_total", "op" => op).increment(1);
}

/// 记录恢复结果 (completed / aborted_*)
pub fn record_recovery(outcome: &str) {
    counter!(
        "sensor_hdi_recoveries_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录转发到 report sink 的事件
pub fn record_event_forwarded(sensor_id: i32) {
    counter!(
        "sensor_hdi_events_forwarded_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
}

/// 记录被丢弃的事件 (empty / no_sink / copy)
pub fn record_event_rejected(reason: &str) {
    counter!(
        "sensor_hdi_events_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录一次可读回调中读出的消息数
pub fn record_listener_read(messages: usize) {
    counter!("sensor_listener_messages_total").increment(messages as u64);
    histogram!("sensor_listener_messages_per_read").record(messages as f64);
}

/// 记录读取循环的结束原因
pub fn record_listener_stop(reason: &str) {
    counter!(
        "sensor_listener_stops_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录对端断开 (shutdown / exception)
pub fn record_disconnect(cause: &str) {
    counter!(
        "sensor_listener_disconnects_total",
        "cause" => cause.to_string()
    )
    .increment(1);
}

/// 内存中的指标聚合器
///
/// 用于 CLI 模拟结束后输出摘要，不依赖 Prometheus。
#[derive(Debug, Clone, Default)]
pub struct HdiMetricsAggregator {
    /// 转发的事件数 (按传感器)
    pub forwarded: BTreeMap<i32, u64>,
    /// 丢弃的事件数
    pub rejected: u64,
    /// 驱动死亡次数
    pub deaths: u64,
    /// 完成的恢复次数
    pub recoveries_completed: u64,
    /// 中止的恢复次数
    pub recoveries_aborted: u64,
    /// 恢复后重新使能的传感器数
    pub sensors_restored: u64,
    /// socket 读出的消息数
    pub listener_messages: u64,
    /// 对端断开次数
    pub disconnects: u64,
}

impl HdiMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_forwarded(&mut self, sensor_id: i32) {
        *self.forwarded.entry(sensor_id).or_insert(0) += 1;
    }

    pub fn on_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn on_death(&mut self) {
        self.deaths += 1;
    }

    /// `restored` 为 None 表示恢复中止
    pub fn on_recovery(&mut self, restored: Option<usize>) {
        match restored {
            Some(count) => {
                self.recoveries_completed += 1;
                self.sensors_restored += count as u64;
            }
            None => self.recoveries_aborted += 1,
        }
    }

    pub fn on_listener_read(&mut self, messages: usize) {
        self.listener_messages += messages as u64;
    }

    pub fn on_disconnect(&mut self) {
        self.disconnects += 1;
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.values().sum()
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for HdiMetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sensor HDI Summary ===")?;
        writeln!(f, "Events forwarded: {}", self.total_forwarded())?;
        for (sensor_id, count) in &self.forwarded {
            writeln!(f, "  sensor {}: {}", sensor_id, count)?;
        }
        writeln!(f, "Events rejected: {}", self.rejected)?;
        writeln!(f, "Driver deaths: {}", self.deaths)?;
        writeln!(
            f,
            "Recoveries: {} completed, {} aborted ({} sensors restored)",
            self.recoveries_completed, self.recoveries_aborted, self.sensors_restored
        )?;
        writeln!(f, "Listener messages: {}", self.listener_messages)?;
        writeln!(f, "Disconnects: {}", self.disconnects)?;
        Ok(())
    }
}

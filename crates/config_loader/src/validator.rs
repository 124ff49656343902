//! 配置校验模块
//!
//! 校验规则：
//! - retry_count > 0
//! - report_channel >= 0
//! - max_data_len > 0
//! - max_packet_buf_size > 0, max_recv_limit > 0
//! - default_log_level 非空

use contracts::{SensorError, ServiceConfig};

/// 校验 ServiceConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ServiceConfig) -> Result<(), SensorError> {
    validate_connection(config)?;
    validate_event(config)?;
    validate_listener(config)?;
    validate_observability(config)?;
    Ok(())
}

/// 校验驱动连接重试策略
fn validate_connection(config: &ServiceConfig) -> Result<(), SensorError> {
    let connection = &config.connection;
    if connection.retry_count == 0 {
        return Err(SensorError::config_validation(
            "connection.retry_count",
            "retry_count must be > 0",
        ));
    }
    if connection.report_channel < 0 {
        return Err(SensorError::config_validation(
            "connection.report_channel",
            format!(
                "report_channel must be >= 0, got {}",
                connection.report_channel
            ),
        ));
    }
    Ok(())
}

/// 校验事件缓冲区容量
fn validate_event(config: &ServiceConfig) -> Result<(), SensorError> {
    if config.event.max_data_len == 0 {
        return Err(SensorError::config_validation(
            "event.max_data_len",
            "max_data_len must be > 0",
        ));
    }
    Ok(())
}

/// 校验 listener 配置
fn validate_listener(config: &ServiceConfig) -> Result<(), SensorError> {
    let listener = &config.listener;
    if listener.max_packet_buf_size == 0 {
        return Err(SensorError::config_validation(
            "listener.max_packet_buf_size",
            "max_packet_buf_size must be > 0",
        ));
    }
    if listener.max_recv_limit == 0 {
        return Err(SensorError::config_validation(
            "listener.max_recv_limit",
            "max_recv_limit must be > 0",
        ));
    }
    Ok(())
}

/// 校验日志配置
fn validate_observability(config: &ServiceConfig) -> Result<(), SensorError> {
    if config.observability.default_log_level.trim().is_empty() {
        return Err(SensorError::config_validation(
            "observability.default_log_level",
            "default_log_level cannot be empty",
        ));
    }
    Ok(())
}

//! 传感器服务配置解析
//!
//! 把 `[connection]` / `[event]` / `[listener]` / `[observability]` 四个段落
//! 反序列化为 [`ServiceConfig`]。缺失的段落和字段取默认值，
//! 即空文档等价于默认配置。语法或类型错误统一映射为 `SensorError::ConfigParse`。

use contracts::{SensorError, ServiceConfig};

/// 服务配置文件的编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`，部署时使用
    Toml,
    /// `.json`，便于由其他服务生成
    Json,
}

impl ConfigFormat {
    /// 按扩展名选择编码，大小写不敏感；未知扩展名返回 None
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 服务配置 (重试策略、事件容量、socket 读取上限、日志)
pub fn parse_toml(content: &str) -> Result<ServiceConfig, SensorError> {
    toml::from_str(content).map_err(|e| SensorError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 服务配置，字段与 TOML 一致
pub fn parse_json(content: &str) -> Result<ServiceConfig, SensorError> {
    serde_json::from_str(content).map_err(|e| SensorError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 按编码分派；不做取值校验，校验见 `validator`
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServiceConfig, SensorError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LogFormat;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[connection]
retry_count = 5
retry_interval_ms = 50
report_channel = 0

[event]
max_data_len = 128

[listener]
max_packet_buf_size = 512
max_recv_limit = 8

[observability]
log_format = "json"
default_log_level = "debug"
metrics_port = 9100
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.connection.retry_count, 5);
        assert_eq!(config.connection.retry_interval_ms, 50);
        assert_eq!(config.event.max_data_len, 128);
        assert_eq!(config.listener.max_packet_buf_size, 512);
        assert_eq!(config.listener.max_recv_limit, 8);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.metrics_port, Some(9100));
    }

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "connection": { "retry_count": 2, "retry_interval_ms": 10 },
            "listener": { "max_recv_limit": 4 }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.connection.retry_count, 2);
        assert_eq!(config.listener.max_recv_limit, 4);
        assert_eq!(config.listener.max_packet_buf_size, 256);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, SensorError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}

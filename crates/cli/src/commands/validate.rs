//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    retry_count: u32,
    retry_interval_ms: u64,
    max_connect_wait_ms: u128,
    max_data_len: usize,
    max_packet_buf_size: usize,
    max_recv_limit: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    retry_count: config.connection.retry_count,
                    retry_interval_ms: config.connection.retry_interval_ms,
                    max_connect_wait_ms: config.connection.max_connect_wait().as_millis(),
                    max_data_len: config.event.max_data_len,
                    max_packet_buf_size: config.listener.max_packet_buf_size,
                    max_recv_limit: config.listener.max_recv_limit,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.connection.retry_interval_ms == 0 {
        warnings.push("connection.retry_interval_ms is 0 - reconnect attempts will spin".to_string());
    }

    if config.connection.max_connect_wait().as_secs() > 30 {
        warnings.push(format!(
            "connect may block callers for up to {}s",
            config.connection.max_connect_wait().as_secs()
        ));
    }

    if config.listener.max_packet_buf_size < config.event.max_data_len {
        warnings.push(
            "listener.max_packet_buf_size is smaller than event.max_data_len".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Connect: {} attempts x {} ms (max {} ms)",
                summary.retry_count, summary.retry_interval_ms, summary.max_connect_wait_ms
            );
            println!("  Event payload capacity: {} bytes", summary.max_data_len);
            println!(
                "  Listener: {} byte buffer, {} reads per wakeup",
                summary.max_packet_buf_size, summary.max_recv_limit
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

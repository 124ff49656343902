//! # Sensor HDI CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 配置信息展示
//! - 基于 mock 驱动的会话模拟（含驱动死亡恢复）

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use contracts::ObservabilitySettings;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_simulate, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    observability::init_with_config(&logging_settings(&cli))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Sensor HDI CLI starting"
    );

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Simulate(args) => run_simulate(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Tracing settings from CLI flags; the Prometheus exporter is set up by `simulate`
fn logging_settings(cli: &Cli) -> ObservabilitySettings {
    ObservabilitySettings {
        log_format: cli.log_format.into(),
        default_log_level: cli.log_level().to_string(),
        metrics_port: None,
    }
}

//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&config)
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn print_config_info(config: &ServiceConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Sensor HDI Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let connection = &config.connection;
    println!("🔌 Driver Connection");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Retry count: {}", connection.retry_count);
    println!("   ├─ Retry interval: {} ms", connection.retry_interval_ms);
    println!(
        "   ├─ Max connect wait: {} ms",
        connection.max_connect_wait().as_millis()
    );
    println!("   └─ Report channel: {}", connection.report_channel);

    println!("\n📦 Events");
    println!("   └─ Payload capacity: {} bytes", config.event.max_data_len);

    println!("\n📡 Stream Listener");
    println!(
        "   ├─ Packet buffer: {} bytes",
        config.listener.max_packet_buf_size
    );
    println!("   └─ Reads per wakeup: {}", config.listener.max_recv_limit);

    let observability = &config.observability;
    println!("\n⚙️  Observability");
    println!("   ├─ Log format: {:?}", observability.log_format);
    println!("   ├─ Log level: {}", observability.default_log_level);
    match observability.metrics_port {
        Some(port) => println!("   └─ Metrics port: {}", port),
        None => println!("   └─ Metrics: disabled"),
    }

    println!();
}

//! `simulate` command implementation.
//!
//! Runs a full session against the in-process mock driver, then pushes a
//! byte stream through the stream listener over a Unix socket pair.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{HdfSensorEvent, ReportSink, SensorDataChannel, SensorEvent, SensorId, ServiceConfig};
use fd_listener::{FdEventLoop, FdListener, LoopExit, RecordingChannel};
use hdi_connection::{HdiConnection, MockDriverProvider, RecoveryOutcome};
use observability::HdiMetricsAggregator;
use tracing::{info, warn};

use crate::cli::SimulateArgs;
use crate::error::CliError;

const STREAM_TIMEOUT: Duration = Duration::from_secs(5);

type SharedStats = Arc<Mutex<HdiMetricsAggregator>>;

fn stats(shared: &SharedStats) -> std::sync::MutexGuard<'_, HdiMetricsAggregator> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Execute the `simulate` command
pub async fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let config = config_loader::ConfigLoader::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    let metrics_port = args
        .metrics_port
        .or(config.observability.metrics_port)
        .filter(|port| *port != 0);
    if let Some(port) = metrics_port {
        observability::init_metrics_only(port)?;
    }

    info!(
        sensors = args.sensors,
        kill_driver = args.kill_driver,
        "Starting simulated driver session"
    );

    let shared: SharedStats = Arc::new(Mutex::new(HdiMetricsAggregator::new()));

    let session_args = args.clone();
    let session_config = config.clone();
    let session_stats = shared.clone();
    tokio::task::spawn_blocking(move || {
        run_driver_session(&session_args, &session_config, &session_stats)
    })
    .await
    .context("Driver session task panicked")??;

    run_stream_session(args, &config, &shared).await?;

    println!("\n{}", stats(&shared));
    Ok(())
}

/// Connect, configure, stream events, optionally kill the driver, tear down
fn run_driver_session(
    args: &SimulateArgs,
    config: &ServiceConfig,
    shared: &SharedStats,
) -> std::result::Result<(), CliError> {
    let provider = Arc::new(MockDriverProvider::with_demo_sensors(args.sensors));
    let connection = HdiConnection::from_service_config(provider.clone(), config);

    connection.connect_hdi().map_err(CliError::Connect)?;

    let sensors = connection
        .get_sensor_list()
        .map_err(|e| CliError::simulation("get_sensor_list", e))?;
    println!("📡 Sensors ({})", sensors.len());
    for sensor in &sensors {
        println!(
            "   ├─ {} {} ({}, fw {})",
            sensor.sensor_type_id, sensor.sensor_name, sensor.vendor_name, sensor.firmware_version
        );
    }

    let sink_stats = shared.clone();
    let sink = ReportSink::new("simulate", move |event: &SensorEvent| {
        stats(&sink_stats).on_forwarded(event.sensor_type_id);
    });
    connection
        .register_data_report(Some(sink))
        .map_err(|e| CliError::simulation("register_data_report", e))?;

    let ids: Vec<SensorId> = sensors
        .iter()
        .map(|sensor| SensorId::new(sensor.sensor_type_id))
        .collect();
    for (i, id) in ids.iter().enumerate() {
        let period_ns = 10_000_000 * (i as i64 + 1);
        connection
            .set_batch(*id, period_ns, 0)
            .map_err(|e| CliError::simulation("set_batch", e))?;
        connection
            .enable_sensor(*id)
            .map_err(|e| CliError::simulation("enable_sensor", e))?;
    }

    pump_events(&provider, config, &ids, args.events, shared);

    if args.kill_driver {
        warn!("Killing mock driver");
        provider.kill_driver();
        stats(shared).on_death();

        match connection.last_recovery() {
            Some(RecoveryOutcome::Completed { restored, failed }) => {
                println!(
                    "\n♻️  Recovery completed: {} restored, {} failed",
                    restored.len(),
                    failed.len()
                );
                stats(shared).on_recovery(Some(restored.len()));
            }
            Some(RecoveryOutcome::Aborted { step, code }) => {
                println!("\n♻️  Recovery aborted at {:?} (code {})", step, code);
                stats(shared).on_recovery(None);
            }
            None => warn!("driver death did not trigger recovery"),
        }

        pump_events(&provider, config, &ids, args.events, shared);
    }

    // one malformed record to show rejection
    if let Some(driver) = provider.current() {
        let sensor_id = ids.first().map_or(0, |id| id.as_raw());
        let empty = HdfSensorEvent::with_payload(sensor_id, 0, Vec::new());
        if let Some(Err(e)) = driver.emit(config.connection.report_channel, &empty) {
            info!(error = %e, "malformed record rejected");
            stats(shared).on_rejected();
        }
    }

    connection
        .destroy_hdi_connection()
        .map_err(|e| CliError::simulation("destroy_hdi_connection", e))?;
    Ok(())
}

fn pump_events(
    provider: &MockDriverProvider,
    config: &ServiceConfig,
    ids: &[SensorId],
    events: usize,
    shared: &SharedStats,
) {
    let Some(driver) = provider.current() else {
        warn!("no live driver, skipping event pump");
        return;
    };

    for round in 0..events {
        for id in ids {
            let payload: Vec<u8> = (0..12).map(|b| (b + round) as u8).collect();
            let event = HdfSensorEvent::with_payload(id.as_raw(), round as i64 * 1_000_000, payload);
            if let Some(Err(_)) = driver.emit(config.connection.report_channel, &event) {
                stats(shared).on_rejected();
            }
        }
    }
}

/// Drive an FdListener over a socket pair until the writer hangs up
async fn run_stream_session(
    args: &SimulateArgs,
    config: &ServiceConfig,
    shared: &SharedStats,
) -> Result<()> {
    let (mut writer, reader) = UnixStream::pair().map_err(CliError::from)?;
    reader.set_nonblocking(true).map_err(CliError::from)?;

    let channel = Arc::new(RecordingChannel::new());
    let listener = Arc::new(FdListener::with_config(config.listener.clone()));
    let dyn_channel: Arc<dyn SensorDataChannel> = channel.clone();
    listener.set_channel(&dyn_channel);

    let (task, _shutdown) = FdEventLoop::new(reader, listener)
        .map_err(|e| CliError::listener(e.to_string()))?
        .spawn();

    let total = args.stream_bytes;
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let data: Vec<u8> = (0..total).map(|i| i as u8).collect();
        writer.write_all(&data)?;
        // dropping the writer closes the stream
        Ok(())
    })
    .await
    .context("Stream writer task panicked")?
    .map_err(CliError::from)?;

    let exit = tokio::time::timeout(STREAM_TIMEOUT, task)
        .await
        .map_err(|_| CliError::listener("timed out waiting for peer shutdown"))?
        .context("Event loop task panicked")?;

    if exit != LoopExit::PeerShutdown {
        warn!(?exit, "event loop ended unexpectedly");
    }

    {
        let mut summary = stats(shared);
        summary.on_listener_read(channel.messages().len());
        for _ in 0..channel.disconnects() {
            summary.on_disconnect();
        }
    }

    println!(
        "\n🔁 Stream listener: {} bytes in {} messages, exit {:?}",
        channel.total_bytes(),
        channel.messages().len(),
        exit
    );
    Ok(())
}

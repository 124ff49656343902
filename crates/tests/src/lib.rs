//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置文件 -> 连接管理器
//! - mock 驱动端到端测试（事件转发、驱动死亡恢复）
//! - socket -> stream listener 端到端测试

#[cfg(test)]
mod contract_tests {
    use contracts::{SensorError, GET_HDI_SERVICE_COUNT, MAX_PACKET_BUF_SIZE, MAX_RECV_LIMIT, WAIT_MS};

    #[test]
    fn test_constants_snapshot() {
        assert_eq!(MAX_PACKET_BUF_SIZE, 256);
        assert_eq!(MAX_RECV_LIMIT, 32);
        assert_eq!(GET_HDI_SERVICE_COUNT, 30);
        assert_eq!(WAIT_MS, 200);
    }

    #[test]
    fn test_error_codes_snapshot() {
        assert_eq!(SensorError::NotInitialized.code(), 3);
        assert_eq!(SensorError::invalid_value("x").code(), 22);
        assert_eq!(
            SensorError::CopyFailure {
                len: 65,
                capacity: 64
            }
            .code(),
            33_554_451
        );
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::sync::Arc;

    use config_loader::ConfigLoader;
    use hdi_connection::{HdiConnection, MockDriverProvider};
    use tempfile::NamedTempFile;

    /// 配置文件中的重试策略应作用于连接管理器
    #[test]
    fn test_config_file_drives_retry_policy() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[connection]\nretry_count = 4\nretry_interval_ms = 1\n\n[event]\nmax_data_len = 8"
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        let provider = Arc::new(MockDriverProvider::with_demo_sensors(1));
        provider.set_available(false);

        let connection = HdiConnection::from_service_config(provider.clone(), &config);
        assert!(connection.connect_hdi().unwrap_err().is_not_initialized());
        assert_eq!(provider.get_calls(), 4);
    }

    #[test]
    fn test_event_capacity_from_config() {
        let config = ConfigLoader::load_from_str(
            r#"{"event": {"max_data_len": 8}, "connection": {"retry_interval_ms": 1}}"#,
            config_loader::ConfigFormat::Json,
        )
        .unwrap();
        let provider = Arc::new(MockDriverProvider::with_demo_sensors(1));
        let connection = HdiConnection::from_service_config(provider.clone(), &config);
        connection.connect_hdi().unwrap();

        let (sink, received) = super::e2e_tests::collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();

        let driver = provider.current().unwrap();
        let ok = contracts::HdfSensorEvent::with_payload(1, 0, vec![1; 8]);
        let too_big = contracts::HdfSensorEvent::with_payload(1, 0, vec![1; 9]);
        assert!(matches!(driver.emit(0, &ok), Some(Ok(()))));
        assert!(matches!(
            driver.emit(0, &too_big),
            Some(Err(contracts::SensorError::CopyFailure { len: 9, capacity: 8 }))
        ));
        assert_eq!(received.lock().unwrap()[0].data.len(), 8);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use contracts::{
        ConnectionConfig, EventConfig, HdfSensorEvent, ReportSink, SensorEvent, SensorId,
        REPORT_CHANNEL,
    };
    use hdi_connection::{HdiConnection, MockDriverProvider, RecoveryOutcome};

    pub(crate) fn collecting_sink() -> (ReportSink, Arc<Mutex<Vec<SensorEvent>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let sink = ReportSink::new("collect", move |event: &SensorEvent| {
            received_clone.lock().unwrap().push(event.clone());
        });
        (sink, received)
    }

    fn connected(sensors: usize) -> (Arc<MockDriverProvider>, HdiConnection) {
        let provider = Arc::new(MockDriverProvider::with_demo_sensors(sensors));
        let config = ConnectionConfig {
            retry_interval_ms: 1,
            ..Default::default()
        };
        let connection =
            HdiConnection::with_config(provider.clone(), config, EventConfig::default());
        connection.connect_hdi().unwrap();
        (provider, connection)
    }

    /// End-to-end: connect -> configure -> driver death -> recovery -> events keep flowing
    #[test]
    fn test_session_survives_repeated_driver_deaths() {
        let (provider, connection) = connected(4);
        let (sink, received) = collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();

        for sensor in connection.get_sensor_list().unwrap() {
            let id = SensorId::new(sensor.sensor_type_id);
            connection.set_batch(id, 5_000_000, 0).unwrap();
        }
        connection.enable_sensor(SensorId::new(2)).unwrap();
        connection.enable_sensor(SensorId::new(4)).unwrap();
        connection.disable_sensor(SensorId::new(3)).unwrap();

        for generation in 2..=4 {
            provider.kill_driver();
            assert_eq!(
                connection.last_recovery(),
                Some(RecoveryOutcome::Completed {
                    restored: vec![SensorId::new(2), SensorId::new(4)],
                    failed: vec![],
                })
            );

            let driver = provider.current().unwrap();
            assert_eq!(driver.generation(), generation);
            assert_eq!(driver.enabled_sensors(), vec![2, 4]);
            assert_eq!(driver.batch_of(1), Some((5_000_000, 0)));
            assert_eq!(driver.batch_of(3), None);

            let event = HdfSensorEvent::with_payload(2, generation as i64, vec![generation as u8]);
            driver.emit(REPORT_CHANNEL, &event);
        }

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 3);
        assert_eq!(received[2].payload(), &[4]);
    }

    #[test]
    fn test_waiter_is_woken_by_event() {
        let (provider, connection) = connected(1);
        let (sink, _received) = collecting_sink();
        connection.register_data_report(Some(sink)).unwrap();

        let condition = connection.data_condition();
        let seen = condition.sequence();
        let waiter = thread::spawn(move || condition.wait_after(seen, Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        let event = HdfSensorEvent::with_payload(1, 0, vec![1, 2]);
        provider.current().unwrap().emit(REPORT_CHANNEL, &event);

        assert_eq!(waiter.join().unwrap(), Some(seen + 1));
    }

    /// 驱动死亡与 API 调用并发时不应死锁
    #[test]
    fn test_concurrent_calls_during_recovery() {
        let (provider, connection) = connected(8);
        for raw in 1..=8 {
            connection.set_batch(SensorId::new(raw), 1_000, 0).unwrap();
        }

        let workers: Vec<_> = (0..4)
            .map(|w| {
                let connection = connection.clone();
                thread::spawn(move || {
                    for round in 0..50 {
                        let id = SensorId::new((w * 2 + round % 2) + 1);
                        let _ = connection.set_batch(id, 1_000 + round as i64, 0);
                        let _ = connection.enable_sensor(id);
                    }
                })
            })
            .collect();

        for _ in 0..3 {
            provider.kill_driver();
            thread::sleep(Duration::from_millis(2));
        }

        for worker in workers {
            worker.join().unwrap();
        }
        assert!(connection.is_connected());
        assert!(matches!(
            connection.last_recovery(),
            Some(RecoveryOutcome::Completed { .. })
        ));
    }
}

#[cfg(test)]
mod listener_tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{ListenerConfig, SensorDataChannel};
    use fd_listener::{FdEventLoop, FdListener, LoopExit, RecordingChannel};

    /// socket -> FdEventLoop -> FdListener -> channel, 小缓冲区下按块切分
    #[tokio::test]
    async fn test_stream_is_chunked_by_buffer_size() {
        let (mut writer, reader) = UnixStream::pair().unwrap();
        reader.set_nonblocking(true).unwrap();

        let channel = Arc::new(RecordingChannel::new());
        let listener = Arc::new(FdListener::with_config(ListenerConfig {
            max_packet_buf_size: 16,
            max_recv_limit: 4,
        }));
        let dyn_channel: Arc<dyn SensorDataChannel> = channel.clone();
        listener.set_channel(&dyn_channel);

        let (task, _shutdown) = FdEventLoop::new(reader, listener).unwrap().spawn();

        let data: Vec<u8> = (0..200u8).collect();
        writer.write_all(&data).unwrap();
        drop(writer);

        let exit = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, LoopExit::PeerShutdown);
        assert_eq!(channel.disconnects(), 1);

        let messages = channel.messages();
        assert!(messages.iter().all(|m| m.len() <= 16));
        assert_eq!(messages.concat(), data);
    }
}

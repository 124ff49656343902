//! Mock 数据通道
//!
//! 记录收到的消息与断开次数，用于测试和 CLI 模拟。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{DisconnectFn, ReceiveMessageFn, SensorDataChannel};

/// 记录型数据通道
#[derive(Debug, Default)]
pub struct RecordingChannel {
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
    disconnects: Arc<AtomicUsize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到的消息（按顺序）
    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 已收到的字节总数
    pub fn total_bytes(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .sum()
    }

    /// 断开回调被调用的次数
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl SensorDataChannel for RecordingChannel {
    fn receive_message_fn(&self) -> ReceiveMessageFn {
        let messages = self.messages.clone();
        Arc::new(move |data: &[u8]| {
            messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(data.to_vec());
        })
    }

    fn disconnect_fn(&self) -> DisconnectFn {
        let disconnects = self.disconnects.clone();
        Arc::new(move || {
            disconnects.fetch_add(1, Ordering::SeqCst);
        })
    }
}

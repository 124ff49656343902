//! SensorDataChannel trait - client transport seen by the stream listener

use std::sync::Arc;

/// Receives one chunk of bytes read from the socket
pub type ReceiveMessageFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Signals that the peer went away
pub type DisconnectFn = Arc<dyn Fn() + Send + Sync>;

/// Bidirectional data channel between the sensor service and a client
///
/// The listener never owns the channel; it only calls into these hooks.
pub trait SensorDataChannel: Send + Sync {
    /// Hook invoked with every received chunk
    fn receive_message_fn(&self) -> ReceiveMessageFn;

    /// Hook invoked on shutdown or exception
    fn disconnect_fn(&self) -> DisconnectFn;
}

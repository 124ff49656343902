//! FdListener - drains a readable socket into the channel's receive hook

use std::os::fd::RawFd;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use contracts::{ListenerConfig, SensorDataChannel};
use nix::errno::Errno;
use observability::metrics::{record_disconnect, record_listener_read, record_listener_stop};
use tracing::{debug, error, trace, warn};

use crate::receiver::{is_transient, is_would_block, NixReceiver, SocketReceiver};

/// Why a read pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Short read: nothing more queued
    Drained,
    /// `recv` returned 0
    PeerClosed,
    /// Non-transient receive error
    RecvError(Errno),
    /// Iteration cap hit; more data may be pending
    LimitReached,
    /// No channel registered, or it was dropped
    NoChannel,
    /// Negative descriptor
    InvalidFd,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Drained => "drained",
            StopReason::PeerClosed => "peer_closed",
            StopReason::RecvError(_) => "recv_error",
            StopReason::LimitReached => "limit_reached",
            StopReason::NoChannel => "no_channel",
            StopReason::InvalidFd => "invalid_fd",
        }
    }
}

/// Summary of one `on_readable` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Chunks forwarded to the receive hook
    pub messages: usize,
    pub stop: StopReason,
    /// The last receive attempt reported would-block
    pub would_block: bool,
}

impl ReadOutcome {
    fn stopped(stop: StopReason) -> Self {
        Self {
            messages: 0,
            stop,
            would_block: false,
        }
    }

    /// True when the socket has no pending data left to read right now
    pub fn socket_drained(&self) -> bool {
        match self.stop {
            StopReason::LimitReached => self.would_block,
            _ => true,
        }
    }
}

/// Stream listener for one client socket
///
/// References the data channel weakly; the channel owns the listener's
/// lifetime, not the other way round.
pub struct FdListener {
    channel: RwLock<Option<Weak<dyn SensorDataChannel>>>,
    receiver: Box<dyn SocketReceiver>,
    config: ListenerConfig,
}

impl Default for FdListener {
    fn default() -> Self {
        Self::new()
    }
}

impl FdListener {
    /// Listener reading through `recv(2)` with default buffer settings
    pub fn new() -> Self {
        Self::with_receiver(NixReceiver, ListenerConfig::default())
    }

    pub fn with_config(config: ListenerConfig) -> Self {
        Self::with_receiver(NixReceiver, config)
    }

    pub fn with_receiver(receiver: impl SocketReceiver + 'static, config: ListenerConfig) -> Self {
        Self {
            channel: RwLock::new(None),
            receiver: Box::new(receiver),
            config,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Attach the channel whose hooks receive data and disconnects
    pub fn set_channel(&self, channel: &Arc<dyn SensorDataChannel>) {
        *self
            .channel
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(channel));
    }

    pub fn clear_channel(&self) {
        *self
            .channel
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn channel(&self) -> Option<Arc<dyn SensorDataChannel>> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Read what is queued on `fd`, forwarding each chunk as one message
    ///
    /// Never blocks and never loops more than `max_recv_limit` times. A full
    /// buffer means more may follow; a short read ends the pass.
    pub fn on_readable(&self, fd: RawFd) -> ReadOutcome {
        if fd < 0 {
            error!(fd, "fd is invalid");
            record_listener_stop(StopReason::InvalidFd.as_str());
            return ReadOutcome::stopped(StopReason::InvalidFd);
        }
        let Some(channel) = self.channel() else {
            error!(fd, "channel is null");
            record_listener_stop(StopReason::NoChannel.as_str());
            return ReadOutcome::stopped(StopReason::NoChannel);
        };
        let receive = channel.receive_message_fn();

        let capacity = self.config.max_packet_buf_size;
        let mut buf = vec![0u8; capacity];
        let mut outcome = ReadOutcome::stopped(StopReason::LimitReached);

        for _ in 0..self.config.max_recv_limit {
            match self.receiver.recv(fd, &mut buf) {
                Ok(0) => {
                    debug!(fd, "peer closed");
                    outcome.stop = StopReason::PeerClosed;
                    break;
                }
                Ok(n) => {
                    outcome.would_block = false;
                    outcome.messages += 1;
                    trace!(fd, len = n, "received message");
                    receive(&buf[..n]);
                    if n < capacity {
                        outcome.stop = StopReason::Drained;
                        break;
                    }
                }
                Err(errno) if is_transient(errno) => {
                    outcome.would_block = is_would_block(errno);
                }
                Err(errno) => {
                    error!(fd, errno = %errno, "failed to recv data");
                    outcome.stop = StopReason::RecvError(errno);
                    break;
                }
            }
        }

        record_listener_read(outcome.messages);
        record_listener_stop(outcome.stop.as_str());
        outcome
    }

    /// Peer shut the connection down
    pub fn on_shutdown(&self, fd: RawFd) {
        self.disconnect(fd, "shutdown");
    }

    /// Error condition reported on the socket
    pub fn on_exception(&self, fd: RawFd) {
        self.disconnect(fd, "exception");
    }

    fn disconnect(&self, fd: RawFd, cause: &'static str) {
        if fd < 0 {
            error!(fd, cause, "invalid fd");
        }
        let Some(channel) = self.channel() else {
            warn!(fd, cause, "channel is null");
            return;
        };
        debug!(fd, cause, "disconnecting channel");
        record_disconnect(cause);
        (channel.disconnect_fn())();
    }
}

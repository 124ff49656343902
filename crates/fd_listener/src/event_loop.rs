//! FdEventLoop - tokio readiness loop driving an [`FdListener`]
//!
//! Registers the socket with the reactor through `AsyncFd` and maps
//! readiness onto the listener callbacks:
//! - readable → `on_readable`
//! - read side closed (after draining) → `on_shutdown`, loop exits
//! - error → `on_exception`, loop exits

use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use tokio::io::unix::AsyncFd;
use tokio::io::{Interest, Ready};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ListenerError, Result};
use crate::listener::{FdListener, StopReason};

/// Why the event loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Peer closed the connection
    PeerShutdown,
    /// Socket reported an error
    Exception,
    /// Stopped through a [`ShutdownHandle`]
    Cancelled,
}

/// Cancels a running [`FdEventLoop`]
///
/// A shutdown requested before the loop first polls is not lost.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// Readiness loop for one client socket
pub struct FdEventLoop<T: AsRawFd> {
    fd: AsyncFd<T>,
    listener: Arc<FdListener>,
    shutdown: Arc<Notify>,
}

impl<T> FdEventLoop<T>
where
    T: AsRawFd + Send + Sync + 'static,
{
    /// Register `source` with the reactor
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: T, listener: Arc<FdListener>) -> Result<Self> {
        let raw = source.as_raw_fd();
        if raw < 0 {
            return Err(ListenerError::InvalidFd { fd: raw });
        }
        let fd = AsyncFd::with_interest(source, Interest::READABLE | Interest::ERROR)
            .map_err(|source| ListenerError::Register { fd: raw, source })?;

        Ok(Self {
            fd,
            listener,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: self.shutdown.clone(),
        }
    }

    /// Spawn the loop onto the current runtime
    pub fn spawn(self) -> (JoinHandle<LoopExit>, ShutdownHandle) {
        let handle = self.shutdown_handle();
        (tokio::spawn(self.run()), handle)
    }

    /// Run until the peer goes away, an error is reported, or shutdown is requested
    #[instrument(name = "fd_event_loop", skip_all)]
    pub async fn run(self) -> LoopExit {
        let fd = self.raw_fd();
        info!(fd, "fd event loop started");

        loop {
            let mut guard = tokio::select! {
                _ = self.shutdown.notified() => {
                    debug!(fd, "fd event loop cancelled");
                    return LoopExit::Cancelled;
                }
                ready = self.fd.ready(Interest::READABLE | Interest::ERROR) => match ready {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!(fd, error = %e, "readiness poll failed");
                        self.listener.on_exception(fd);
                        return LoopExit::Exception;
                    }
                },
            };

            let ready = guard.ready();
            if ready.is_error() {
                warn!(fd, "socket reported an error");
                self.listener.on_exception(fd);
                return LoopExit::Exception;
            }

            if ready.is_readable() || ready.is_read_closed() {
                let outcome = self.listener.on_readable(fd);
                let drained = outcome.socket_drained();
                if outcome.stop == StopReason::PeerClosed || (ready.is_read_closed() && drained) {
                    info!(fd, "peer shut down");
                    self.listener.on_shutdown(fd);
                    return LoopExit::PeerShutdown;
                }
                if matches!(outcome.stop, StopReason::NoChannel | StopReason::InvalidFd) {
                    warn!(fd, reason = outcome.stop.as_str(), "listener cannot read, stopping");
                    return LoopExit::Cancelled;
                }
                // LimitReached with data still queued: poll again without waiting
                if drained {
                    guard.clear_ready_matching(Ready::READABLE);
                }
            }
        }
    }
}

//! Socket receive abstraction
//!
//! The listener only needs "read up to `buf.len()` bytes from `fd` without
//! blocking"; the default goes straight to `recv(2)` through nix.

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use nix::errno::Errno;
use nix::sys::socket::{self, MsgFlags};

/// Non-blocking receive from a socket descriptor
pub trait SocketReceiver: Send + Sync {
    /// Read into `buf`; `Ok(0)` means the peer closed its write side
    fn recv(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize>;
}

/// `recv(fd, buf, MSG_DONTWAIT | MSG_NOSIGNAL)`
#[derive(Debug, Default, Clone, Copy)]
pub struct NixReceiver;

impl SocketReceiver for NixReceiver {
    fn recv(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize> {
        socket::recv(fd, buf, MsgFlags::MSG_DONTWAIT | MsgFlags::MSG_NOSIGNAL)
    }
}

/// Errors after which the read loop keeps going
pub fn is_transient(errno: Errno) -> bool {
    matches!(errno, Errno::EAGAIN | Errno::EINTR) || errno == Errno::EWOULDBLOCK
}

/// Would-block style errors: the socket has nothing more to give right now
pub fn is_would_block(errno: Errno) -> bool {
    errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK
}

/// Receiver replaying a fixed script of results
///
/// `Ok(n)` fills the first `n` bytes with the 1-based call number. Once the
/// script runs out every call returns `EAGAIN`.
#[derive(Debug, Default)]
pub struct ScriptedReceiver {
    script: Mutex<VecDeque<nix::Result<usize>>>,
    calls: AtomicUsize,
}

impl ScriptedReceiver {
    pub fn new(script: impl IntoIterator<Item = nix::Result<usize>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of recv calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Script entries not consumed yet
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl SocketReceiver for ScriptedReceiver {
    fn recv(&self, _fd: RawFd, buf: &mut [u8]) -> nix::Result<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(n)) => {
                let n = n.min(buf.len());
                buf[..n].fill(call as u8);
                Ok(n)
            }
            Some(Err(errno)) => Err(errno),
            None => Err(Errno::EAGAIN),
        }
    }
}

//! # FD Listener
//!
//! Stream listener for client data sockets.
//!
//! Responsibilities:
//! - Drain a readable socket in a bounded, non-blocking loop
//! - Forward each received chunk to the channel's receive hook
//! - Signal peer shutdown and socket errors through the disconnect hook
//! - Drive all of the above from tokio readiness events
//!
//! ## Usage Example
//!
//! ```ignore
//! use fd_listener::{FdEventLoop, FdListener};
//!
//! let listener = Arc::new(FdListener::new());
//! listener.set_channel(&channel);
//!
//! let (task, shutdown) = FdEventLoop::new(stream, listener)?.spawn();
//! // ...
//! shutdown.shutdown();
//! task.await?;
//! ```

mod error;
mod event_loop;
mod listener;
mod mock;
mod receiver;

// Re-exports
pub use error::{ListenerError, Result};
pub use event_loop::{FdEventLoop, LoopExit, ShutdownHandle};
pub use listener::{FdListener, ReadOutcome, StopReason};
pub use mock::RecordingChannel;
pub use receiver::{is_transient, is_would_block, NixReceiver, ScriptedReceiver, SocketReceiver};

//! Stream listener 错误类型

use std::os::fd::RawFd;

use thiserror::Error;

/// Stream listener 错误
#[derive(Debug, Error)]
pub enum ListenerError {
    /// 文件描述符无效
    #[error("invalid fd {fd}")]
    InvalidFd {
        /// 文件描述符
        fd: RawFd,
    },

    /// 注册到 tokio reactor 失败
    #[error("failed to register fd {fd} with the reactor: {source}")]
    Register {
        /// 文件描述符
        fd: RawFd,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },
}

/// Stream listener Result 类型别名
pub type Result<T> = std::result::Result<T, ListenerError>;

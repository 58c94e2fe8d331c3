//! # MRCL Transport Layer
//!
//! 字节传输抽象层，提供统一的传输接口与 CRLF 分行。
//!
//! - `Transport`: 完整的双向传输（打开后、拆分前使用）
//! - `RxTransport` / `TxTransport`: 拆分后的读 / 写半部
//! - `LineReader`: 把字节流切分为去掉结束符的文本行
//!
//! 后端：
//! - `serial`（默认 feature）：基于 `serialport` 的串口
//! - `tcp`：标准库 `TcpStream`（串口服务器 / 网口转串口）
//! - `mock`（feature）：可脚本化的模拟设备

use std::time::Duration;
use thiserror::Error;

pub mod framing;
pub mod tcp;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use framing::{LineReader, frame_line};
pub use tcp::{TcpRxTransport, TcpTransport, TcpTxTransport};

#[cfg(feature = "serial")]
pub use serial::{SerialRxTransport, SerialTransport, SerialTxTransport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDevice, MockTransport};

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] DeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
}

impl TransportError {
    /// 超时是读循环的正常空闲情况，其余错误都视为致命
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    Disconnected,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<String> for DeviceError {
    fn from(message: String) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for DeviceError {
    fn from(message: &str) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

/// 双向字节传输
///
/// `receive` 在 `timeout` 内没有任何数据时返回 [`TransportError::Timeout`]，
/// 成功时至少读到 1 个字节。
pub trait Transport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
    /// 丢弃输入缓冲区中尚未读取的数据
    fn flush_read_buffer(&mut self) -> Result<(), TransportError>;
}

pub trait RxTransport {
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

pub trait TxTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

impl<T: TxTransport + ?Sized> TxTransport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }
}

/// 可拆分为独立读 / 写半部的传输（读半部交给后台分发线程独占）
pub trait SplittableTransport: Transport {
    type Rx: RxTransport + Send + 'static;
    type Tx: TxTransport + Send + 'static;
    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

/// 把可能表示“无数据”的 IO 错误归一为 [`TransportError::Timeout`]
pub(crate) fn map_read_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => TransportError::Timeout,
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Io(err),
    }
}

//! 驱动层错误类型定义

use mrcl_protocol::{AxisId, ProtocolError};
use mrcl_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（写命令失败，或分发线程退出的原因）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误（应答无法解析）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 目标位置超出轴行程
    #[error("Target {target} for axis {axis} is outside limits [{min}, {max}]")]
    OutOfLimits {
        axis: AxisId,
        target: f64,
        min: f64,
        max: f64,
    },

    /// 无效输入（速度、亮度、LED 编号越界等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 等待应答超时
    #[error("Operation timeout")]
    Timeout,

    /// 分发线程因致命传输错误退出
    #[error("Dispatch loop stopped: {0}")]
    DispatchStopped(String),

    /// 分发线程启动 / 退出错误
    #[error("Dispatch thread error: {0}")]
    IoThread(String),

    /// 配置文件错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DriverError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DriverError::InvalidInput(message.into())
    }
}

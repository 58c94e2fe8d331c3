//! MRCL SDK - Microqubic MRCL700 电动显微镜 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): ASCII 命令编码、上行消息分类与应答解析
//! - **传输层** (`transport`): 串口 / TCP 后端与 CRLF 分行
//! - **驱动层** (`driver`): 分发线程、更新信号、轴与照明控制
//!
//! # 快速开始
//!
//! ```no_run
//! use mrcl_sdk::prelude::*;
//!
//! mrcl_sdk::init_logger();
//! let microscope = MicroscopeBuilder::new().serial("/dev/ttyUSB0").build()?;
//! microscope.axis(AxisId::X).move_absolute(50.0, 12.5)?;
//! # Ok::<(), DriverError>(())
//! ```

pub use mrcl_driver as driver;
pub use mrcl_protocol as protocol;
pub use mrcl_transport as transport;

pub mod prelude;

pub use driver::{
    DispatchConfig, DriverError, Microscope, MicroscopeBuilder, MicroscopeConfig, MoveRequest,
};
pub use protocol::{AxisId, ProtocolError};
pub use transport::TransportError;

use tracing_subscriber::EnvFilter;

/// 安装全局日志订阅者
///
/// 默认级别 `info`，可通过 `RUST_LOG` 覆盖；`log` crate 的记录经 `tracing-log` 转发。
/// 已安装过订阅者时什么也不做，返回 `false`。
pub fn init_logger() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    init_logger_with_filter(filter)
}

/// 使用指定过滤器安装全局日志订阅者（例如 `"mrcl_driver=trace"`）
pub fn init_logger_with_filter(filter: impl Into<EnvFilter>) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter.into())
        .with_thread_names(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // 其它库可能已经设置了 log 的全局 logger
    let _ = tracing_log::LogTracer::init();
    true
}

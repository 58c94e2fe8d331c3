//! 驱动层模块
//!
//! 本模块提供 MRCL700 显微镜的设备驱动功能，包括：
//! - 分发线程管理（读半部独占、运行标志停止）
//! - 位置 / 速度缓存（ArcSwap 无锁读取）与更新信号表
//! - 未匹配消息队列与请求 / 应答
//! - 轴执行器、照明附件与多轴同步运动
//!
//! # 使用场景
//!
//! 大多数用户只需要 [`MicroscopeBuilder`] 和 [`Microscope`]；
//! `pipeline` / `link` / `state` 供需要自定义分发或测试的场景使用。

pub mod actuator;
mod builder;
pub mod config;
mod error;
pub mod heartbeat;
pub mod illumination;
pub mod inbox;
pub mod link;
pub mod metrics;
mod microscope;
pub mod pipeline;
pub mod signals;
pub mod state;

pub use actuator::{Actuator, AxisDrive, AxisStatus, LinearActuator, Positioner, RotaryActuator};
pub use builder::MicroscopeBuilder;
pub use config::{ConnectionConfig, ConnectionKind, DispatchSection, MicroscopeConfig};
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use illumination::{MatrixIllumination, RingIllumination, SpotIllumination};
pub use inbox::UnmatchedQueue;
pub use link::{CommandLink, Exchange};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use microscope::{Microscope, MoveRequest, PlannedMove, plan_move};
pub use pipeline::{DispatchConfig, Routing, dispatch_line, dispatch_loop};
pub use signals::{UpdateSignal, UpdateSignals};
pub use state::{AxisState, DriverContext, MotionCache};

//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use mrcl_sdk::prelude::*;
//! ```

pub use crate::driver::{
    Actuator, AxisStatus, DispatchConfig, Microscope, MicroscopeBuilder, MicroscopeConfig,
    MoveRequest, PlannedMove, Positioner,
};
pub use crate::protocol::{AxisId, AxisKind, LedColor};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
pub use crate::transport::TransportError;

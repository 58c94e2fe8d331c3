//! 照明附件
//!
//! 环形、矩阵、点光源三种附件。开关 / 亮度 / 单元设置只写命令，
//! 状态查询走请求 / 应答（回显之后的第一行即状态应答）。

use crate::error::DriverError;
use crate::link::CommandLink;
use mrcl_protocol::{
    Accessory, AccessoryCommand, AccessoryOp, LedColor, MATRIX_COLUMN_COUNT, MatrixStatus,
    PERCENTAGE_MAX, RING_LED_COUNT, RingStatus, SpotStatus,
};
use std::sync::Arc;

pub(crate) fn check_percentage(percentage: u8) -> Result<u8, DriverError> {
    if percentage <= PERCENTAGE_MAX {
        Ok(percentage)
    } else {
        Err(DriverError::invalid(format!(
            "percentage {percentage} outside [0, {PERCENTAGE_MAX}]"
        )))
    }
}

fn check_elements(what: &str, indices: &[u8], count: u8) -> Result<(), DriverError> {
    match indices.iter().find(|&&i| i == 0 || i > count) {
        Some(bad) => Err(DriverError::invalid(format!(
            "{what} {bad} outside [1, {count}]"
        ))),
        None => Ok(()),
    }
}

/// 三种附件共用的命令
struct AccessoryChannel {
    accessory: Accessory,
    link: Arc<CommandLink>,
}

impl AccessoryChannel {
    fn send(&self, op: AccessoryOp) -> Result<(), DriverError> {
        self.link.send(&AccessoryCommand::new(self.accessory, op))
    }

    fn adjust_intensity(&self, percentage: u8) -> Result<(), DriverError> {
        self.send(AccessoryOp::Intensity(check_percentage(percentage)?))
    }

    /// 先整体校验再逐个写，避免只设置了一部分
    fn set_elements(
        &self,
        what: &str,
        indices: &[u8],
        count: u8,
        on: bool,
    ) -> Result<(), DriverError> {
        check_elements(what, indices, count)?;
        for &index in indices {
            self.send(AccessoryOp::SetElement { index, on })?;
        }
        Ok(())
    }

    fn status<T>(
        &self,
        parse: impl FnOnce(&str) -> Result<T, mrcl_protocol::ProtocolError>,
    ) -> Result<T, DriverError> {
        self.link
            .query(&AccessoryCommand::new(self.accessory, AccessoryOp::Status), parse)
    }
}

/// 环形照明（8 个 LED，RGBW 四色）
pub struct RingIllumination {
    channel: AccessoryChannel,
}

impl RingIllumination {
    pub(crate) fn new(link: Arc<CommandLink>) -> Self {
        Self {
            channel: AccessoryChannel {
                accessory: Accessory::Ring,
                link,
            },
        }
    }

    pub fn on(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::On)
    }

    pub fn off(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::Off)
    }

    /// 亮度百分比（0..=100）
    pub fn adjust_intensity(&self, percentage: u8) -> Result<(), DriverError> {
        self.channel.adjust_intensity(percentage)
    }

    pub fn enable_all_colors(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::EnableAllColors)
    }

    pub fn disable_all_colors(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::DisableAllColors)
    }

    /// 逐个设置四个颜色通道
    pub fn set_colors(
        &self,
        red: bool,
        green: bool,
        blue: bool,
        white: bool,
    ) -> Result<(), DriverError> {
        for (color, on) in LedColor::ALL.into_iter().zip([red, green, blue, white]) {
            self.channel.send(AccessoryOp::SetColor { color, on })?;
        }
        Ok(())
    }

    pub fn enable_all_leds(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::EnableAllElements)
    }

    pub fn disable_all_leds(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::DisableAllElements)
    }

    /// 设置指定 LED（编号 1..=8）的开关
    pub fn set_individual_leds(&self, leds: &[u8], on: bool) -> Result<(), DriverError> {
        self.channel.set_elements("LED", leds, RING_LED_COUNT, on)
    }

    pub fn status(&self) -> Result<RingStatus, DriverError> {
        self.channel.status(RingStatus::parse)
    }
}

/// 矩阵照明（10 列）
pub struct MatrixIllumination {
    channel: AccessoryChannel,
}

impl MatrixIllumination {
    pub(crate) fn new(link: Arc<CommandLink>) -> Self {
        Self {
            channel: AccessoryChannel {
                accessory: Accessory::Matrix,
                link,
            },
        }
    }

    pub fn on(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::On)
    }

    pub fn off(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::Off)
    }

    pub fn adjust_intensity(&self, percentage: u8) -> Result<(), DriverError> {
        self.channel.adjust_intensity(percentage)
    }

    /// 设置指定列（编号 1..=10）的开关
    pub fn set_individual_columns(&self, columns: &[u8], on: bool) -> Result<(), DriverError> {
        self.channel.set_elements("column", columns, MATRIX_COLUMN_COUNT, on)
    }

    pub fn enable_all_columns(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::EnableAllElements)
    }

    pub fn disable_all_columns(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::DisableAllElements)
    }

    pub fn status(&self) -> Result<MatrixStatus, DriverError> {
        self.channel.status(MatrixStatus::parse)
    }
}

/// 点光源
pub struct SpotIllumination {
    channel: AccessoryChannel,
}

impl SpotIllumination {
    pub(crate) fn new(link: Arc<CommandLink>) -> Self {
        Self {
            channel: AccessoryChannel {
                accessory: Accessory::Spot,
                link,
            },
        }
    }

    pub fn on(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::On)
    }

    pub fn off(&self) -> Result<(), DriverError> {
        self.channel.send(AccessoryOp::Off)
    }

    pub fn adjust_intensity(&self, percentage: u8) -> Result<(), DriverError> {
        self.channel.adjust_intensity(percentage)
    }

    pub fn status(&self) -> Result<SpotStatus, DriverError> {
        self.channel.status(SpotStatus::parse)
    }
}

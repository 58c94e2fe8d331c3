//! 下行命令编码
//!
//! 所有命令都实现 `Display`，输出不含行结束符的命令文本。
//! 数值格式是线协议的一部分：速度百分比 0 位小数，位置 / 距离 3 位小数。

use crate::axis::AxisId;
use crate::constants::{COMMAND_SIGIL, POSITION_DECIMALS, SYSTEM_SIGIL};
use std::fmt;

/// 单轴操作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisOp {
    /// 立即停止（操作码 0）
    Stop,
    /// 以给定速度百分比持续运动（操作码 1，-100..=100）
    FreeMove { speed: f64 },
    /// 相对运动（操作码 2）
    MoveRelative { speed: f64, distance: f64 },
    /// 绝对运动（操作码 3）
    MoveAbsolute { speed: f64, target: f64 },
    /// 相对步数运动，仅用于调试（操作码 4）
    MoveRelativeSteps { speed: f64, steps: i64 },
    /// 自动回零（操作码 5）
    AutoHome,
    /// 状态查询（操作码 6）
    Status,
}

impl AxisOp {
    /// 操作码
    pub fn opcode(&self) -> u8 {
        match self {
            AxisOp::Stop => 0,
            AxisOp::FreeMove { .. } => 1,
            AxisOp::MoveRelative { .. } => 2,
            AxisOp::MoveAbsolute { .. } => 3,
            AxisOp::MoveRelativeSteps { .. } => 4,
            AxisOp::AutoHome => 5,
            AxisOp::Status => 6,
        }
    }
}

/// 单轴命令：`$<轴字母><操作码>[,<参数>...]`
///
/// # Example
///
/// ```
/// use mrcl_protocol::{AxisCommand, AxisId, AxisOp};
///
/// let cmd = AxisCommand::new(AxisId::C, AxisOp::MoveAbsolute { speed: 37.0, target: 45.125 });
/// assert_eq!(cmd.to_string(), "$C3,37,45.125");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCommand {
    pub axis: AxisId,
    pub op: AxisOp,
}

impl AxisCommand {
    pub fn new(axis: AxisId, op: AxisOp) -> Self {
        Self { axis, op }
    }
}

impl fmt::Display for AxisCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", COMMAND_SIGIL, self.axis.letter(), self.op.opcode())?;
        match self.op {
            AxisOp::Stop | AxisOp::AutoHome | AxisOp::Status => Ok(()),
            AxisOp::FreeMove { speed } => write!(f, ",{:.0}", speed),
            AxisOp::MoveRelative { speed, distance } => {
                write!(f, ",{:.0},{:.*}", speed, POSITION_DECIMALS, distance)
            },
            AxisOp::MoveAbsolute { speed, target } => {
                write!(f, ",{:.0},{:.*}", speed, POSITION_DECIMALS, target)
            },
            AxisOp::MoveRelativeSteps { speed, steps } => write!(f, ",{:.0},{}", speed, steps),
        }
    }
}

/// 照明附件（每种附件使用不同的小写字母作为地址）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessory {
    /// 环形照明 `$c`
    Ring,
    /// 矩阵照明 `$a`
    Matrix,
    /// 点光源 `$b`
    Spot,
}

impl Accessory {
    pub fn letter(self) -> char {
        match self {
            Accessory::Ring => 'c',
            Accessory::Matrix => 'a',
            Accessory::Spot => 'b',
        }
    }
}

/// 环形照明颜色通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    White,
}

impl LedColor {
    pub const ALL: [LedColor; 4] = [
        LedColor::Red,
        LedColor::Green,
        LedColor::Blue,
        LedColor::White,
    ];

    pub fn letter(self) -> char {
        match self {
            LedColor::Red => 'R',
            LedColor::Green => 'G',
            LedColor::Blue => 'B',
            LedColor::White => 'W',
        }
    }

    /// 在状态应答颜色掩码中的位
    pub fn mask(self) -> u32 {
        match self {
            LedColor::Red => 0b0001,
            LedColor::Green => 0b0010,
            LedColor::Blue => 0b0100,
            LedColor::White => 0b1000,
        }
    }
}

/// 照明附件操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessoryOp {
    Off,
    On,
    Intensity(u8),
    /// 单个 LED（环形）或单列（矩阵）开关
    SetElement { index: u8, on: bool },
    EnableAllElements,
    DisableAllElements,
    Status,
    DisableAllColors,
    EnableAllColors,
    /// 单个颜色通道开关：`$c<0|1>,<颜色字母>`
    SetColor { color: LedColor, on: bool },
}

/// 照明附件命令
///
/// ```
/// use mrcl_protocol::{Accessory, AccessoryCommand, AccessoryOp, LedColor};
///
/// let op = AccessoryOp::SetElement { index: 3, on: true };
/// let cmd = AccessoryCommand::new(Accessory::Ring, op);
/// assert_eq!(cmd.to_string(), "$c3,3,1");
/// let op = AccessoryOp::SetColor { color: LedColor::Blue, on: false };
/// let cmd = AccessoryCommand::new(Accessory::Ring, op);
/// assert_eq!(cmd.to_string(), "$c0,B");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessoryCommand {
    pub accessory: Accessory,
    pub op: AccessoryOp,
}

impl AccessoryCommand {
    pub fn new(accessory: Accessory, op: AccessoryOp) -> Self {
        Self { accessory, op }
    }
}

impl fmt::Display for AccessoryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COMMAND_SIGIL, self.accessory.letter())?;
        match self.op {
            AccessoryOp::Off => write!(f, "0"),
            AccessoryOp::On => write!(f, "1"),
            AccessoryOp::Intensity(pct) => write!(f, "2,{}", pct),
            AccessoryOp::SetElement { index, on } => write!(f, "3,{},{}", index, u8::from(on)),
            AccessoryOp::EnableAllElements => write!(f, "4"),
            AccessoryOp::DisableAllElements => write!(f, "5"),
            AccessoryOp::Status => write!(f, "6"),
            AccessoryOp::DisableAllColors => write!(f, "7"),
            AccessoryOp::EnableAllColors => write!(f, "8"),
            AccessoryOp::SetColor { color, on } => write!(f, "{},{}", u8::from(on), color.letter()),
        }
    }
}

/// 系统级命令（`$*`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    /// 急停 `$*0`
    EmergencyStop,
    /// 所有轴回零 `$*5`
    AutoHomeAll,
    /// 状态灯亮度 `$*8[,<百分比>]`，不带参数时只回显（用于设备探测）
    StatusLed(Option<u8>),
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COMMAND_SIGIL, SYSTEM_SIGIL)?;
        match self {
            SystemCommand::EmergencyStop => write!(f, "0"),
            SystemCommand::AutoHomeAll => write!(f, "5"),
            SystemCommand::StatusLed(None) => write!(f, "8"),
            SystemCommand::StatusLed(Some(pct)) => write!(f, "8,{}", pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(axis: AxisId, op: AxisOp) -> String {
        AxisCommand::new(axis, op).to_string()
    }

    #[test]
    fn test_move_absolute_wire_format() {
        assert_eq!(
            axis(AxisId::C, AxisOp::MoveAbsolute { speed: 37.0, target: 45.125 }),
            "$C3,37,45.125"
        );
        assert_eq!(
            axis(AxisId::X, AxisOp::MoveAbsolute { speed: 50.0, target: 12.5 }),
            "$X3,50,12.500"
        );
    }

    #[test]
    fn test_speed_is_rounded_to_integer() {
        assert_eq!(
            axis(AxisId::A, AxisOp::MoveRelative { speed: 12.7, distance: -3.25 }),
            "$A2,13,-3.250"
        );
        assert_eq!(axis(AxisId::Y, AxisOp::FreeMove { speed: -40.2 }), "$Y1,-40");
    }

    #[test]
    fn test_position_uses_three_decimals() {
        assert_eq!(
            axis(AxisId::Z, AxisOp::MoveAbsolute { speed: 1.0, target: 0.0004 }),
            "$Z3,1,0.000"
        );
        assert_eq!(
            axis(AxisId::R, AxisOp::MoveAbsolute { speed: 100.0, target: -89.9996 }),
            "$R3,100,-90.000"
        );
    }

    #[test]
    fn test_simple_axis_ops() {
        assert_eq!(axis(AxisId::B, AxisOp::Stop), "$B0");
        assert_eq!(axis(AxisId::B, AxisOp::AutoHome), "$B5");
        assert_eq!(axis(AxisId::B, AxisOp::Status), "$B6");
        assert_eq!(
            axis(AxisId::X, AxisOp::MoveRelativeSteps { speed: 20.0, steps: -150 }),
            "$X4,20,-150"
        );
    }

    #[test]
    fn test_accessory_commands() {
        let ring = |op| AccessoryCommand::new(Accessory::Ring, op).to_string();
        assert_eq!(ring(AccessoryOp::On), "$c1");
        assert_eq!(ring(AccessoryOp::Off), "$c0");
        assert_eq!(ring(AccessoryOp::Intensity(75)), "$c2,75");
        assert_eq!(ring(AccessoryOp::EnableAllElements), "$c4");
        assert_eq!(ring(AccessoryOp::DisableAllElements), "$c5");
        assert_eq!(ring(AccessoryOp::Status), "$c6");
        assert_eq!(ring(AccessoryOp::DisableAllColors), "$c7");
        assert_eq!(ring(AccessoryOp::EnableAllColors), "$c8");
        assert_eq!(
            ring(AccessoryOp::SetColor { color: LedColor::Red, on: true }),
            "$c1,R"
        );

        let matrix = AccessoryCommand::new(
            Accessory::Matrix,
            AccessoryOp::SetElement { index: 10, on: false },
        );
        assert_eq!(matrix.to_string(), "$a3,10,0");

        let spot = AccessoryCommand::new(Accessory::Spot, AccessoryOp::Intensity(0));
        assert_eq!(spot.to_string(), "$b2,0");
    }

    #[test]
    fn test_system_commands() {
        assert_eq!(SystemCommand::EmergencyStop.to_string(), "$*0");
        assert_eq!(SystemCommand::AutoHomeAll.to_string(), "$*5");
        assert_eq!(SystemCommand::StatusLed(None).to_string(), "$*8");
        assert_eq!(SystemCommand::StatusLed(Some(40)).to_string(), "$*8,40");
    }

    #[test]
    fn test_color_masks_are_distinct() {
        let combined = LedColor::ALL.iter().fold(0, |acc, c| acc | c.mask());
        assert_eq!(combined, 0b1111);
    }
}

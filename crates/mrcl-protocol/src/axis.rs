//! 轴定义
//!
//! MRCL700 共 7 个运动轴，每个轴由一个大写字母标识。轴的类型、行程限位和
//! 最大速度在出厂时确定，运行期间不会改变。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// 轴标识（判别值即 ASCII 字母）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AxisId {
    /// 相机俯仰，主轴
    A = 0x41,
    /// 相机俯仰，副轴
    B = 0x42,
    /// 对焦
    C = 0x43,
    /// 样品旋转
    R = 0x52,
    /// X 轴
    X = 0x58,
    /// Y 轴
    Y = 0x59,
    /// 变焦
    Z = 0x5A,
}

impl AxisId {
    /// 轴的数量
    pub const COUNT: usize = 7;

    /// 全部轴（按轴参数表顺序）
    pub const ALL: [AxisId; Self::COUNT] = [
        AxisId::A,
        AxisId::B,
        AxisId::C,
        AxisId::R,
        AxisId::X,
        AxisId::Y,
        AxisId::Z,
    ];

    /// 轴字母
    pub fn letter(self) -> char {
        char::from(u8::from(self))
    }

    /// 从轴字母解析（区分大小写，小写字母属于照明附件）
    pub fn from_letter(letter: char) -> Option<Self> {
        if !letter.is_ascii() {
            return None;
        }
        Self::try_from(letter as u8).ok()
    }

    /// 在 [`AxisId::ALL`] / [`AXES`] 中的下标
    pub fn index(self) -> usize {
        match self {
            AxisId::A => 0,
            AxisId::B => 1,
            AxisId::C => 2,
            AxisId::R => 3,
            AxisId::X => 4,
            AxisId::Y => 5,
            AxisId::Z => 6,
        }
    }

    /// 该轴的静态参数
    pub fn spec(self) -> &'static AxisSpec {
        &AXES[self.index()]
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for AxisId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_letter(c).ok_or(ProtocolError::UnknownAxis(c)),
            (Some(c), Some(_)) => Err(ProtocolError::UnknownAxis(c)),
            (None, _) => Err(ProtocolError::field("axis", s)),
        }
    }
}

/// 轴类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisKind {
    /// 直线轴，单位毫米
    Linear,
    /// 旋转轴，单位度
    Rotary,
}

impl AxisKind {
    /// 位置单位
    pub fn unit(self) -> &'static str {
        match self {
            AxisKind::Linear => "mm",
            AxisKind::Rotary => "deg",
        }
    }
}

/// 轴静态参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSpec {
    pub id: AxisId,
    pub kind: AxisKind,
    /// 行程下限（mm 或 deg）
    pub min: f64,
    /// 行程上限（mm 或 deg）
    pub max: f64,
    /// 100% 速度下的移动速度（单位/秒）
    pub max_speed: f64,
    pub description: &'static str,
}

impl AxisSpec {
    /// 目标位置是否在限位内（闭区间）
    pub fn contains(&self, target: f64) -> bool {
        self.min <= target && target <= self.max
    }

    /// `(min, max)`
    pub fn limits(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// 以 100% 速度从 `from` 移动到 `to` 所需时间（秒）
    pub fn travel_time(&self, from: f64, to: f64) -> f64 {
        (to - from).abs() / self.max_speed
    }
}

/// 轴参数表（顺序与 [`AxisId::index`] 一致）
pub static AXES: [AxisSpec; AxisId::COUNT] = [
    AxisSpec {
        id: AxisId::A,
        kind: AxisKind::Rotary,
        min: -90.0,
        max: 90.0,
        max_speed: 180.0 / 37.0,
        description: "Camera tilt, primary axis",
    },
    AxisSpec {
        id: AxisId::B,
        kind: AxisKind::Rotary,
        min: -90.0,
        max: 90.0,
        max_speed: 180.0 / 35.5,
        description: "Camera tilt, secondary axis",
    },
    AxisSpec {
        id: AxisId::C,
        kind: AxisKind::Linear,
        min: 0.0,
        max: 120.0,
        max_speed: 120.0 / 7.5,
        description: "Focus",
    },
    AxisSpec {
        id: AxisId::R,
        kind: AxisKind::Rotary,
        min: -90.0,
        max: 90.0,
        max_speed: 180.0 / 1.0,
        description: "Sample rotation",
    },
    AxisSpec {
        id: AxisId::X,
        kind: AxisKind::Linear,
        min: 0.0,
        max: 70.0,
        max_speed: 70.0 / 4.5,
        description: "X axis",
    },
    AxisSpec {
        id: AxisId::Y,
        kind: AxisKind::Linear,
        min: 0.0,
        max: 70.0,
        max_speed: 70.0 / 4.5,
        description: "Y axis",
    },
    AxisSpec {
        id: AxisId::Z,
        kind: AxisKind::Linear,
        min: 0.0,
        max: 120.0,
        max_speed: 120.0 / 7.5,
        description: "Zoom",
    },
];

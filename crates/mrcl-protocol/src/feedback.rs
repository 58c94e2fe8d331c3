//! 上行消息分类与应答解析
//!
//! 设备随时可能主动上报数据，因此每一行都要先经过 [`classify`]：
//!
//! 1. **状态行** `<轴字母>:<ID>,<位置>[,<步数>,<是否回零>]`（优先匹配）
//! 2. **速度行** `$<轴字母>1,<速度>`
//! 3. 两者都不匹配：返回 `Ok(None)`，由调用方放入未匹配消息队列
//!
//! 状态行字段更多，先检查状态行可以避免速度语法误匹配状态行的数字前缀。
//!
//! 结构匹配但数值字段非法时返回错误，而不是把该行归到错误的轴上。

use crate::ProtocolError;
use crate::axis::AxisId;
use crate::control::LedColor;
use regex::Regex;
use std::sync::LazyLock;

// 字段用宽松的 `[^,]*` 捕获：结构匹配后再解析数值，非法数值报错而不是静默落入队列
static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]):(\w+),([^,]*)(?:,([^,]*),([^,]*))?$").expect("valid status regex")
});

static SPEED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$([A-Za-z])1,([^,]*)$").expect("valid speed regex"));

static RING_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^c:(\w+),([01]),([0-9]+),([0-9]+),([0-9]+)$").expect("valid ring regex")
});

static MATRIX_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^a:(\w+),([01]),([0-9]+),([0-9]+)$").expect("valid matrix regex")
});

static SPOT_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^b:(\w+),([01]),([0-9]+)$").expect("valid spot regex"));

/// 状态行（位置反馈）
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub axis: AxisId,
    /// 设备 ID 字段，含义未公开，仅保留
    pub id: String,
    /// 位置（mm 或 deg）
    pub position: f64,
    /// 步数（旋转轴的简短应答不带此字段）
    pub steps: Option<i64>,
    /// 是否已回零（旋转轴的简短应答不带此字段）
    pub homed: Option<bool>,
}

impl StatusLine {
    /// 解析一行状态消息
    ///
    /// - `Ok(None)`: 结构不匹配，或轴字母不属于任何已知轴
    /// - `Err(_)`: 结构匹配但字段非法
    pub fn parse(line: &str) -> Result<Option<Self>, ProtocolError> {
        let Some(caps) = STATUS_LINE.captures(line) else {
            return Ok(None);
        };
        let letter = first_char(&caps[1]);
        let Some(axis) = AxisId::from_letter(letter) else {
            return Ok(None);
        };

        let position = parse_float("position", &caps[3])?;
        let steps = caps
            .get(4)
            .map(|m| {
                m.as_str()
                    .parse::<i64>()
                    .map_err(|_| ProtocolError::field("steps", m.as_str()))
            })
            .transpose()?;
        let homed = caps.get(5).map(|m| parse_flag("homed", m.as_str())).transpose()?;

        Ok(Some(Self {
            axis,
            id: caps[2].to_string(),
            position,
            steps,
            homed,
        }))
    }
}

/// 速度行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLine {
    pub axis: AxisId,
    pub speed: f64,
}

impl SpeedLine {
    /// 解析一行速度消息，返回值语义同 [`StatusLine::parse`]
    pub fn parse(line: &str) -> Result<Option<Self>, ProtocolError> {
        let Some(caps) = SPEED_LINE.captures(line) else {
            return Ok(None);
        };
        let Some(axis) = AxisId::from_letter(first_char(&caps[1])) else {
            return Ok(None);
        };
        let speed = parse_float("speed", &caps[2])?;
        Ok(Some(Self { axis, speed }))
    }
}

/// 更新类别（每个轴每个类别对应一个更新信号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCategory {
    Position,
    Speed,
}

impl UpdateCategory {
    pub const COUNT: usize = 2;

    pub const ALL: [UpdateCategory; Self::COUNT] =
        [UpdateCategory::Position, UpdateCategory::Speed];

    pub fn index(self) -> usize {
        match self {
            UpdateCategory::Position => 0,
            UpdateCategory::Speed => 1,
        }
    }
}

/// 可归属到某个轴的上行消息
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    Status(StatusLine),
    Speed(SpeedLine),
}

impl Feedback {
    pub fn axis(&self) -> AxisId {
        match self {
            Feedback::Status(s) => s.axis,
            Feedback::Speed(s) => s.axis,
        }
    }

    pub fn category(&self) -> UpdateCategory {
        match self {
            Feedback::Status(_) => UpdateCategory::Position,
            Feedback::Speed(_) => UpdateCategory::Speed,
        }
    }
}

/// 对一行上行消息分类
///
/// # Example
///
/// ```
/// use mrcl_protocol::{classify, AxisId, Feedback, UpdateCategory};
///
/// let fb = classify("X:ID1,12.500,340,1").unwrap().unwrap();
/// assert_eq!(fb.axis(), AxisId::X);
/// assert_eq!(fb.category(), UpdateCategory::Position);
///
/// assert!(classify("garbage line").unwrap().is_none());
/// ```
pub fn classify(line: &str) -> Result<Option<Feedback>, ProtocolError> {
    if let Some(status) = StatusLine::parse(line)? {
        return Ok(Some(Feedback::Status(status)));
    }
    if let Some(speed) = SpeedLine::parse(line)? {
        return Ok(Some(Feedback::Speed(speed)));
    }
    Ok(None)
}

/// 按结构判断一行属于哪个 (轴, 类别)，不解析数值字段
///
/// 用于字段非法的行：[`classify`] 报错后，仍能知道是哪个轴的应答出了问题。
///
/// ```
/// use mrcl_protocol::{addressed_axis, AxisId, UpdateCategory};
///
/// assert_eq!(
///     addressed_axis("X:ID1,12.x,340,1"),
///     Some((AxisId::X, UpdateCategory::Position))
/// );
/// assert_eq!(addressed_axis("b:I1,1,50"), None);
/// ```
pub fn addressed_axis(line: &str) -> Option<(AxisId, UpdateCategory)> {
    if let Some(caps) = STATUS_LINE.captures(line) {
        return AxisId::from_letter(first_char(&caps[1])).map(|a| (a, UpdateCategory::Position));
    }
    let caps = SPEED_LINE.captures(line)?;
    AxisId::from_letter(first_char(&caps[1])).map(|a| (a, UpdateCategory::Speed))
}

/// 环形照明颜色状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorState {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub white: bool,
}

impl ColorState {
    pub fn from_mask(mask: u32) -> Self {
        Self {
            red: mask & LedColor::Red.mask() != 0,
            green: mask & LedColor::Green.mask() != 0,
            blue: mask & LedColor::Blue.mask() != 0,
            white: mask & LedColor::White.mask() != 0,
        }
    }
}

/// 环形照明状态应答 `c:<ID>,<开关>,<亮度>,<LED 掩码>,<颜色掩码>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingStatus {
    pub on: bool,
    pub intensity: u8,
    /// 亮起的 LED 编号（1..=8）
    pub active_leds: Vec<u8>,
    pub colors: ColorState,
}

impl RingStatus {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let caps = RING_STATUS
            .captures(line)
            .ok_or_else(|| ProtocolError::parse("ring illumination status", line))?;
        Ok(Self {
            on: parse_flag("on", &caps[2])?,
            intensity: parse_u8("intensity", &caps[3])?,
            active_leds: mask_to_indices(parse_u32("leds", &caps[4])?, crate::RING_LED_COUNT),
            colors: ColorState::from_mask(parse_u32("colors", &caps[5])?),
        })
    }
}

/// 矩阵照明状态应答 `a:<ID>,<开关>,<亮度>,<列掩码>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixStatus {
    pub on: bool,
    pub intensity: u8,
    /// 亮起的列编号（1..=10）
    pub active_columns: Vec<u8>,
}

impl MatrixStatus {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let caps = MATRIX_STATUS
            .captures(line)
            .ok_or_else(|| ProtocolError::parse("matrix illumination status", line))?;
        Ok(Self {
            on: parse_flag("on", &caps[2])?,
            intensity: parse_u8("intensity", &caps[3])?,
            active_columns: mask_to_indices(
                parse_u32("columns", &caps[4])?,
                crate::MATRIX_COLUMN_COUNT,
            ),
        })
    }
}

/// 点光源状态应答 `b:<ID>,<开关>,<亮度>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotStatus {
    pub on: bool,
    pub intensity: u8,
}

impl SpotStatus {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let caps = SPOT_STATUS
            .captures(line)
            .ok_or_else(|| ProtocolError::parse("spot illumination status", line))?;
        Ok(Self {
            on: parse_flag("on", &caps[2])?,
            intensity: parse_u8("intensity", &caps[3])?,
        })
    }
}

/// 位掩码转 1 起始的编号列表（bit 0 -> 1）
fn mask_to_indices(mask: u32, count: u8) -> Vec<u8> {
    (0..count).filter(|bit| (mask >> bit) & 1 == 1).map(|bit| bit + 1).collect()
}

fn first_char(s: &str) -> char {
    s.chars().next().unwrap_or_default()
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, ProtocolError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::field(field, value))
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ProtocolError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ProtocolError::field(field, value)),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ProtocolError> {
    value.parse::<u8>().map_err(|_| ProtocolError::field(field, value))
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, ProtocolError> {
    value.parse::<u32>().map_err(|_| ProtocolError::field(field, value))
}

//! 轴执行器
//!
//! 直线轴与旋转轴共用同一套运动命令（[`AxisDrive`]），只在状态应答的形式上不同：
//! 直线轴返回 (位置, 步数, 是否回零)，旋转轴只返回角度。
//! 两者通过 [`Positioner`] 提供各自的状态查询，[`Actuator`] 是对外的带标签变体。

use crate::error::DriverError;
use crate::link::{CommandLink, POLL_SLICE};
use crate::state::AxisState;
use mrcl_protocol::{
    AxisCommand, AxisId, AxisKind, AxisOp, AxisSpec, FREE_SPEED_MAX, FREE_SPEED_MIN,
    MOVE_SPEED_MAX, MOVE_SPEED_MIN, ProtocolError, UpdateCategory,
};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 状态查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisStatus {
    Linear {
        position: f64,
        steps: i64,
        homed: bool,
    },
    Rotary {
        angle: f64,
    },
}

impl AxisStatus {
    /// 位置（mm）或角度（deg）
    pub fn position(&self) -> f64 {
        match *self {
            AxisStatus::Linear { position, .. } => position,
            AxisStatus::Rotary { angle } => angle,
        }
    }
}

pub(crate) fn check_range(
    what: &str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, DriverError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(DriverError::invalid(format!(
            "{what} {value} outside [{min}, {max}]"
        )))
    }
}

pub(crate) fn check_move_speed(speed: f64) -> Result<f64, DriverError> {
    check_range("speed", speed, MOVE_SPEED_MIN, MOVE_SPEED_MAX)
}

/// 单个轴的运动命令
pub struct AxisDrive {
    spec: &'static AxisSpec,
    link: Arc<CommandLink>,
}

impl AxisDrive {
    pub fn new(spec: &'static AxisSpec, link: Arc<CommandLink>) -> Self {
        Self { spec, link }
    }

    pub fn id(&self) -> AxisId {
        self.spec.id
    }

    pub fn spec(&self) -> &'static AxisSpec {
        self.spec
    }

    fn send(&self, op: AxisOp) -> Result<(), DriverError> {
        self.link.send(&AxisCommand::new(self.spec.id, op))
    }

    /// 立即停止
    pub fn stop(&self) -> Result<(), DriverError> {
        self.send(AxisOp::Stop)
    }

    /// 以速度百分比持续运动（-100..=100，负值反向）
    pub fn free_move_at_speed(&self, speed: f64) -> Result<(), DriverError> {
        let speed = check_range("speed", speed, FREE_SPEED_MIN, FREE_SPEED_MAX)?;
        self.send(AxisOp::FreeMove { speed })
    }

    /// 相对运动 `distance`（mm 或 deg）
    pub fn move_relative(&self, speed: f64, distance: f64) -> Result<(), DriverError> {
        let speed = check_move_speed(speed)?;
        let distance = check_range("distance", distance, f64::MIN, f64::MAX)?;
        self.send(AxisOp::MoveRelative { speed, distance })
    }

    /// 绝对运动
    ///
    /// 不检查行程限位，由调用方（[`Microscope::move_absolute`](crate::Microscope::move_absolute)）负责。
    pub fn move_absolute(&self, speed: f64, target: f64) -> Result<(), DriverError> {
        let speed = check_move_speed(speed)?;
        let target = check_range("target", target, f64::MIN, f64::MAX)?;
        self.send(AxisOp::MoveAbsolute { speed, target })
    }

    /// 按步数相对运动（调试用）
    pub fn move_relative_steps(&self, speed: f64, steps: i64) -> Result<(), DriverError> {
        let speed = check_move_speed(speed)?;
        self.send(AxisOp::MoveRelativeSteps { speed, steps })
    }

    /// 回零（不等待完成，完成情况通过位置更新观察）
    pub fn auto_home(&self) -> Result<(), DriverError> {
        self.send(AxisOp::AutoHome)
    }

    /// 缓存中的最近状态
    pub fn cached_state(&self) -> AxisState {
        self.link.context().cache.load(self.spec.id)
    }

    /// 缓存中的最近位置（不发命令）
    pub fn cached_position(&self) -> Option<f64> {
        self.cached_state().position
    }

    /// 缓存中的最近速度（不发命令）
    pub fn cached_speed(&self) -> Option<f64> {
        self.cached_state().speed
    }

    /// 等待下一条位置更新，返回是否在超时前到达
    pub fn wait_for_position_update(&self, timeout: Duration) -> bool {
        self.wait_for_update(UpdateCategory::Position, timeout)
    }

    /// 等待下一条速度更新，返回是否在超时前到达
    pub fn wait_for_speed_update(&self, timeout: Duration) -> bool {
        self.wait_for_update(UpdateCategory::Speed, timeout)
    }

    fn wait_for_update(&self, category: UpdateCategory, timeout: Duration) -> bool {
        let signals = &self.link.context().signals;
        signals.clear(self.spec.id, category);
        signals.wait(self.spec.id, category, timeout)
    }

    /// 查询状态：发 `$<L>6`，等待该轴的位置信号
    ///
    /// 状态应答会被分发线程归属到本轴并写入缓存，所以这里等的是信号而不是应答文本。
    /// 等待期间若未匹配队列里出现了非回显的行，说明设备给出了无法识别的应答；
    /// 若本轴的状态行字段非法被分发线程丢弃，返回对应的解析错误。
    fn query_status(&self) -> Result<AxisState, DriverError> {
        let axis = self.spec.id;
        let ctx = self.link.context();
        let mut exchange = self.link.exchange();

        ctx.signals.clear(axis, UpdateCategory::Position);
        ctx.take_rejected_status(axis);
        exchange.send(&AxisCommand::new(axis, AxisOp::Status))?;

        loop {
            if ctx.signals.wait(axis, UpdateCategory::Position, POLL_SLICE) {
                let state = ctx.cache.load(axis);
                debug!("Axis {} status: {:?}", axis, state.position);
                return Ok(state);
            }
            if let Some(error) = ctx.take_rejected_status(axis) {
                return Err(error.into());
            }
            if let Some(line) = exchange.poll_reply(Duration::ZERO)? {
                return Err(ProtocolError::Parse {
                    expected: "axis status",
                    line,
                }
                .into());
            }
            if exchange.is_expired() {
                return Err(DriverError::Timeout);
            }
        }
    }
}

fn missing_field(field: &'static str) -> DriverError {
    ProtocolError::InvalidField {
        field,
        value: String::new(),
    }
    .into()
}

/// 状态查询能力（每种轴类型各自实现）
pub trait Positioner {
    fn drive(&self) -> &AxisDrive;

    fn status(&self) -> Result<AxisStatus, DriverError>;

    /// 当前位置（发状态查询）
    fn get_position(&self) -> Result<f64, DriverError> {
        Ok(self.status()?.position())
    }
}

/// 直线轴（mm）
pub struct LinearActuator {
    drive: AxisDrive,
}

impl Positioner for LinearActuator {
    fn drive(&self) -> &AxisDrive {
        &self.drive
    }

    fn status(&self) -> Result<AxisStatus, DriverError> {
        let state = self.drive.query_status()?;
        Ok(AxisStatus::Linear {
            position: state.position.ok_or_else(|| missing_field("position"))?,
            steps: state.steps.ok_or_else(|| missing_field("steps"))?,
            homed: state.homed.ok_or_else(|| missing_field("homed"))?,
        })
    }
}

/// 旋转轴（deg）
pub struct RotaryActuator {
    drive: AxisDrive,
}

impl Positioner for RotaryActuator {
    fn drive(&self) -> &AxisDrive {
        &self.drive
    }

    fn status(&self) -> Result<AxisStatus, DriverError> {
        let state = self.drive.query_status()?;
        Ok(AxisStatus::Rotary {
            angle: state.position.ok_or_else(|| missing_field("angle"))?,
        })
    }
}

/// 轴执行器（按轴类型区分的变体）
///
/// 运动命令通过 `Deref` 直接调用 [`AxisDrive`] 上的方法。
pub enum Actuator {
    Linear(LinearActuator),
    Rotary(RotaryActuator),
}

impl Actuator {
    pub fn new(spec: &'static AxisSpec, link: Arc<CommandLink>) -> Self {
        let drive = AxisDrive::new(spec, link);
        match spec.kind {
            AxisKind::Linear => Actuator::Linear(LinearActuator { drive }),
            AxisKind::Rotary => Actuator::Rotary(RotaryActuator { drive }),
        }
    }

    pub fn kind(&self) -> AxisKind {
        match self {
            Actuator::Linear(_) => AxisKind::Linear,
            Actuator::Rotary(_) => AxisKind::Rotary,
        }
    }

    fn positioner(&self) -> &dyn Positioner {
        match self {
            Actuator::Linear(a) => a,
            Actuator::Rotary(a) => a,
        }
    }

    /// 查询状态（直线轴带步数与回零标志）
    pub fn status(&self) -> Result<AxisStatus, DriverError> {
        self.positioner().status()
    }

    /// 查询当前位置
    pub fn get_position(&self) -> Result<f64, DriverError> {
        self.positioner().get_position()
    }
}

impl Deref for Actuator {
    type Target = AxisDrive;

    fn deref(&self) -> &AxisDrive {
        self.positioner().drive()
    }
}

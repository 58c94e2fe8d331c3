//! 共享状态
//!
//! 位置 / 速度缓存只由分发线程写入，前台任意线程无锁读取（ArcSwap）。
//! 单个轴的快照是一致的；不同轴之间不保证同一时刻。

use crate::heartbeat::ConnectionMonitor;
use crate::inbox::UnmatchedQueue;
use crate::signals::UpdateSignals;
use arc_swap::ArcSwap;
use mrcl_protocol::{AxisId, ProtocolError, SpeedLine, StatusLine};
use mrcl_transport::TransportError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// 单个轴最近一次上报的数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisState {
    /// 位置（mm 或 deg），尚未收到状态行时为 `None`
    pub position: Option<f64>,
    /// 步数（来自最近一条状态行，简短格式不带此字段）
    pub steps: Option<i64>,
    /// 是否已回零（来自最近一条状态行）
    pub homed: Option<bool>,
    /// 速度百分比
    pub speed: Option<f64>,
    pub position_updated_at: Option<Instant>,
    pub speed_updated_at: Option<Instant>,
}

/// 全部轴的位置 / 速度缓存
#[derive(Debug)]
pub struct MotionCache {
    axes: [ArcSwap<AxisState>; AxisId::COUNT],
}

impl Default for MotionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionCache {
    pub fn new() -> Self {
        Self {
            axes: std::array::from_fn(|_| ArcSwap::from_pointee(AxisState::default())),
        }
    }

    pub fn load(&self, axis: AxisId) -> AxisState {
        self.axes[axis.index()].load().as_ref().clone()
    }

    /// 写入一条状态行（步数 / 回零标志整体以最近一条为准）
    pub fn apply_status(&self, status: &StatusLine) {
        self.axes[status.axis.index()].rcu(|current| AxisState {
            position: Some(status.position),
            steps: status.steps,
            homed: status.homed,
            position_updated_at: Some(Instant::now()),
            ..AxisState::clone(current)
        });
    }

    pub fn apply_speed(&self, speed: &SpeedLine) {
        self.axes[speed.axis.index()].rcu(|current| AxisState {
            speed: Some(speed.speed),
            speed_updated_at: Some(Instant::now()),
            ..AxisState::clone(current)
        });
    }
}

/// 分发线程与前台共享的上下文
pub struct DriverContext {
    pub cache: MotionCache,
    pub signals: UpdateSignals,
    pub inbox: UnmatchedQueue,
    pub connection: ConnectionMonitor,
    /// 每个轴最近一条字段非法、被丢弃的状态行
    rejected_status: [Mutex<Option<ProtocolError>>; AxisId::COUNT],
    /// 分发线程退出的原因
    fatal: Mutex<Option<TransportError>>,
    fatal_message: Mutex<Option<String>>,
}

impl DriverContext {
    pub fn new(connection_timeout: Duration) -> Self {
        Self {
            cache: MotionCache::new(),
            signals: UpdateSignals::new(),
            inbox: UnmatchedQueue::new(),
            connection: ConnectionMonitor::new(connection_timeout),
            rejected_status: std::array::from_fn(|_| Mutex::new(None)),
            fatal: Mutex::new(None),
            fatal_message: Mutex::new(None),
        }
    }

    /// 分发线程丢弃了一条属于 `axis` 的非法状态行
    pub(crate) fn reject_status(&self, axis: AxisId, error: ProtocolError) {
        *self.rejected_status[axis.index()].lock() = Some(error);
    }

    pub(crate) fn take_rejected_status(&self, axis: AxisId) -> Option<ProtocolError> {
        self.rejected_status[axis.index()].lock().take()
    }

    pub(crate) fn record_fatal(&self, error: TransportError) {
        *self.fatal_message.lock() = Some(error.to_string());
        *self.fatal.lock() = Some(error);
    }

    /// 分发线程退出的原因（文本形式，可重复读取）
    pub fn fatal_message(&self) -> Option<String> {
        self.fatal_message.lock().clone()
    }

    pub(crate) fn take_fatal(&self) -> Option<TransportError> {
        self.fatal.lock().take()
    }
}

impl Default for DriverContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

//! 分发链路指标
//!
//! 原子计数器，分发线程和命令链路写入，任意线程读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 分发链路实时指标
///
/// ```
/// use mrcl_driver::DispatchMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DispatchMetrics::new();
/// metrics.lines_total.fetch_add(4, Ordering::Relaxed);
/// metrics.unmatched_lines.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.unmatched_lines, 1);
/// assert!(!snapshot.is_consistent());
/// ```
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// 收到的总行数
    pub lines_total: AtomicU64,
    /// 归属到某个轴的状态行数
    pub status_updates: AtomicU64,
    /// 归属到某个轴的速度行数
    pub speed_updates: AtomicU64,
    /// 放入未匹配队列的行数
    pub unmatched_lines: AtomicU64,
    /// 结构匹配但字段非法、被丢弃的行数
    pub parse_errors: AtomicU64,
    /// 空白行数
    pub blank_lines: AtomicU64,
    /// 读超时次数（空闲时的正常现象）
    pub read_timeouts: AtomicU64,
    /// 写出的命令数
    pub commands_written: AtomicU64,
    /// 不等待应答的命令写失败次数
    pub write_errors: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_total: self.lines_total.load(Ordering::Relaxed),
            status_updates: self.status_updates.load(Ordering::Relaxed),
            speed_updates: self.speed_updates.load(Ordering::Relaxed),
            unmatched_lines: self.unmatched_lines.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            blank_lines: self.blank_lines.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            commands_written: self.commands_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub lines_total: u64,
    pub status_updates: u64,
    pub speed_updates: u64,
    pub unmatched_lines: u64,
    pub parse_errors: u64,
    pub blank_lines: u64,
    pub read_timeouts: u64,
    pub commands_written: u64,
    pub write_errors: u64,
}

impl MetricsSnapshot {
    /// 每一行都恰好被路由、排队、丢弃或忽略
    pub fn is_consistent(&self) -> bool {
        self.status_updates
            + self.speed_updates
            + self.unmatched_lines
            + self.parse_errors
            + self.blank_lines
            == self.lines_total
    }
}

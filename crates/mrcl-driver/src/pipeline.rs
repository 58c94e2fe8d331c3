//! 后台分发循环
//!
//! 分发线程是传输读半部的唯一读者：逐行读取，分类后写入缓存并置位更新信号，
//! 无法归属的行放入未匹配消息队列。

use crate::metrics::DispatchMetrics;
use crate::state::DriverContext;
use mrcl_protocol::{AxisId, Feedback, UpdateCategory, addressed_axis, classify};
use mrcl_transport::{LineReader, RxTransport, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 分发配置
///
/// # Example
///
/// ```
/// use mrcl_driver::DispatchConfig;
///
/// let config = DispatchConfig {
///     reply_timeout_ms: 500,
///     ..DispatchConfig::default()
/// };
/// assert_eq!(config.receive_timeout_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// 单次读行超时（毫秒），也是分发线程观察停止标志的最大延迟
    pub receive_timeout_ms: u64,
    /// 前台等待应答的超时（毫秒）
    pub reply_timeout_ms: u64,
    /// 超过此时间没有收到任何行即视为断开（毫秒）
    pub connection_timeout_ms: u64,
    /// 关闭时等待分发线程退出的最长时间（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 1000,
            reply_timeout_ms: 2000,
            connection_timeout_ms: 5000,
            join_timeout_ms: 2000,
        }
    }
}

impl DispatchConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 一行消息的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// 写入缓存并置位 (轴, 类别) 信号
    Signalled(AxisId, UpdateCategory),
    /// 放入未匹配消息队列
    Queued,
    /// 字段非法，已丢弃
    Discarded,
    /// 空白行，忽略
    Blank,
}

/// 分类并路由一行消息
pub fn dispatch_line(line: &str, ctx: &DriverContext, metrics: &DispatchMetrics) -> Routing {
    metrics.lines_total.fetch_add(1, Ordering::Relaxed);
    ctx.connection.register_line();

    if line.trim().is_empty() {
        metrics.blank_lines.fetch_add(1, Ordering::Relaxed);
        trace!("RX blank line ignored");
        return Routing::Blank;
    }

    match classify(line) {
        Ok(Some(feedback)) => {
            let axis = feedback.axis();
            let category = feedback.category();
            // 先写缓存再置位，被唤醒的等待者一定能读到新值
            match &feedback {
                Feedback::Status(status) => {
                    ctx.cache.apply_status(status);
                    metrics.status_updates.fetch_add(1, Ordering::Relaxed);
                },
                Feedback::Speed(speed) => {
                    ctx.cache.apply_speed(speed);
                    metrics.speed_updates.fetch_add(1, Ordering::Relaxed);
                },
            }
            ctx.signals.set(axis, category);
            trace!("RX {:?} -> {} {:?}", line, axis, category);
            Routing::Signalled(axis, category)
        },
        Ok(None) => {
            ctx.inbox.push(line.to_string());
            metrics.unmatched_lines.fetch_add(1, Ordering::Relaxed);
            trace!("RX {:?} -> unmatched queue", line);
            Routing::Queued
        },
        Err(e) => {
            metrics.parse_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Discarding malformed line {:?}: {}", line, e);
            // 正在查询该轴状态的前台调用据此报错，而不是等到超时
            if let Some((axis, UpdateCategory::Position)) = addressed_axis(line) {
                ctx.reject_status(axis, e);
            }
            Routing::Discarded
        },
    }
}

/// 分发线程循环
///
/// # 参数
/// - `reader`: 读半部上的分行器（线程独占）
/// - `ctx`: 共享上下文
/// - `config`: 分发配置
/// - `is_running`: 运行标志，每轮开始时检查
/// - `metrics`: 指标
///
/// 读超时是空闲时的正常情况；其它传输错误是致命的，记录到 `ctx` 后退出。
pub fn dispatch_loop<R: RxTransport>(
    mut reader: LineReader<R>,
    ctx: Arc<DriverContext>,
    config: DispatchConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DispatchMetrics>,
) {
    let receive_timeout = config.receive_timeout();
    info!("Dispatch loop started");

    loop {
        // Acquire: 看到 false 时，停止方之前的写入都可见
        if !is_running.load(Ordering::Acquire) {
            trace!("Dispatch loop: is_running flag is false, exiting");
            break;
        }

        match reader.read_line(receive_timeout) {
            Ok(line) => {
                dispatch_line(&line, &ctx, &metrics);
            },
            Err(TransportError::Timeout) => {
                metrics.read_timeouts.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                error!("Dispatch loop: fatal transport error: {}", e);
                ctx.record_fatal(e);
                break;
            },
        }
    }

    if reader.pending_len() > 0 {
        debug!("Dropping {} bytes of an incomplete line", reader.pending_len());
    }
    info!("Dispatch loop exited");
}

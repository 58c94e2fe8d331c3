//! 命令链路
//!
//! 所有前台写操作经由 `CommandLink`：
//! - 写半部由互斥锁保护，命令不会交错
//! - 需要读取应答的调用通过 [`Exchange`] 独占“清空队列 → 写命令 → 等待应答”整个过程
//! - 分发线程已因致命错误退出时，写操作立即返回 `DispatchStopped`

use crate::error::DriverError;
use crate::metrics::DispatchMetrics;
use crate::state::DriverContext;
use mrcl_protocol::{COMMAND_SIGIL, ProtocolError};
use mrcl_transport::{TxTransport, frame_line};
use parking_lot::{Mutex, MutexGuard};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 前台轮询应答的时间片
pub(crate) const POLL_SLICE: Duration = Duration::from_millis(10);

type BoxedTx = Box<dyn TxTransport + Send>;

pub struct CommandLink {
    tx: Mutex<BoxedTx>,
    exchange: Mutex<()>,
    ctx: Arc<DriverContext>,
    metrics: Arc<DispatchMetrics>,
    reply_timeout: Duration,
}

impl CommandLink {
    pub fn new(
        tx: BoxedTx,
        ctx: Arc<DriverContext>,
        metrics: Arc<DispatchMetrics>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            tx: Mutex::new(tx),
            exchange: Mutex::new(()),
            ctx,
            metrics,
            reply_timeout,
        }
    }

    pub fn context(&self) -> &Arc<DriverContext> {
        &self.ctx
    }

    /// 写一条命令，不等待应答
    ///
    /// 写失败只记录日志：连接断开会由分发线程发现，之后的调用返回 `DispatchStopped`。
    pub fn send(&self, command: &impl Display) -> Result<(), DriverError> {
        let text = command.to_string();
        match self.write(&text) {
            Err(DriverError::Transport(e)) => {
                self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Write of {} failed: {}", text, e);
                Ok(())
            },
            result => result,
        }
    }

    fn write(&self, text: &str) -> Result<(), DriverError> {
        self.ensure_running()?;
        self.tx.lock().send(&frame_line(text))?;
        self.metrics.commands_written.fetch_add(1, Ordering::Relaxed);
        debug!("TX {}", text);
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), DriverError> {
        match self.ctx.fatal_message() {
            Some(reason) => Err(DriverError::DispatchStopped(reason)),
            None => Ok(()),
        }
    }

    /// 开始一次请求 / 应答：获取交换锁并清空未匹配队列
    pub fn exchange(&self) -> Exchange<'_> {
        let guard = self.exchange.lock();
        let discarded = self.ctx.inbox.clear();
        if discarded > 0 {
            trace!("Discarded {} stale unmatched lines", discarded);
        }
        Exchange {
            link: self,
            _guard: guard,
            deadline: Instant::now() + self.reply_timeout,
        }
    }

    /// 写命令并把第一条非回显应答交给 `parse`
    pub fn query<T>(
        &self,
        command: &impl Display,
        parse: impl FnOnce(&str) -> Result<T, ProtocolError>,
    ) -> Result<T, DriverError> {
        let mut exchange = self.exchange();
        exchange.send(command)?;
        let reply = exchange.next_reply()?;
        Ok(parse(&reply)?)
    }
}

/// 一次进行中的请求 / 应答
///
/// 持有期间其它请求 / 应答调用会阻塞；普通写命令不受影响。
pub struct Exchange<'a> {
    link: &'a CommandLink,
    _guard: MutexGuard<'a, ()>,
    deadline: Instant,
}

impl Exchange<'_> {
    /// 写命令，应答截止时间从此刻开始计算（写失败直接返回，不再等待应答）
    pub fn send(&mut self, command: &impl Display) -> Result<(), DriverError> {
        self.link.write(&command.to_string())?;
        self.deadline = Instant::now() + self.link.reply_timeout;
        Ok(())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// 在 `slice` 内取一条应答，跳过命令回显（以 `$` 开头的行）
    pub fn poll_reply(&mut self, slice: Duration) -> Result<Option<String>, DriverError> {
        let wait_until = (Instant::now() + slice).min(self.deadline);
        loop {
            self.link.ensure_running()?;
            let remaining = wait_until.saturating_duration_since(Instant::now());
            match self.link.ctx.inbox.pop(remaining) {
                Some(line) if line.starts_with(COMMAND_SIGIL) => {
                    trace!("Skipping echo {:?}", line);
                },
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }

    /// 等待第一条非回显应答，超时返回 [`DriverError::Timeout`]
    pub fn next_reply(&mut self) -> Result<String, DriverError> {
        loop {
            if let Some(line) = self.poll_reply(POLL_SLICE)? {
                return Ok(line);
            }
            if self.is_expired() {
                return Err(DriverError::Timeout);
            }
        }
    }

    /// 等待下一条任意行（包括回显）
    pub fn next_line(&mut self) -> Result<String, DriverError> {
        loop {
            self.link.ensure_running()?;
            if let Some(line) = self.link.ctx.inbox.pop(POLL_SLICE) {
                return Ok(line);
            }
            if self.is_expired() {
                return Err(DriverError::Timeout);
            }
        }
    }
}

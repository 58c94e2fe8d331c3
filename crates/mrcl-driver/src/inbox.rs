//! 未匹配消息队列
//!
//! 分类器无法归属到任何轴的行（命令回显、照明状态应答、设备探测应答等）
//! 按到达顺序进入此队列，由前台的请求 / 应答调用消费。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// 无界 FIFO（分发线程写入，前台读取）
#[derive(Debug)]
pub struct UnmatchedQueue {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl Default for UnmatchedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UnmatchedQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, line: String) {
        // 发送端和接收端都由 self 持有，通道不会断开
        let _ = self.tx.send(line);
    }

    /// 丢弃所有积压的行，返回丢弃的数量
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// 等待下一行，超时返回 `None`
    pub fn pop(&self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = UnmatchedQueue::new();
        queue.push("first".into());
        queue.push("second".into());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().as_deref(), Some("first"));
        assert_eq!(queue.pop(Duration::ZERO).as_deref(), Some("second"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_discards_backlog() {
        let queue = UnmatchedQueue::new();
        for i in 0..3 {
            queue.push(format!("stale {i}"));
        }
        assert_eq!(queue.clear(), 3);
        assert_eq!(queue.clear(), 0);
        assert_eq!(queue.pop(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_pop_waits_for_producer() {
        let queue = std::sync::Arc::new(UnmatchedQueue::new());
        let producer = std::sync::Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push("b:I1,1,75".into());
        });
        assert_eq!(
            queue.pop(Duration::from_secs(2)).as_deref(),
            Some("b:I1,1,75")
        );
        handle.join().unwrap();
    }
}

//! CRLF 分行
//!
//! 设备的每条消息占一行。`LineReader` 在读半部之上缓存不完整的行，
//! 每次 `read_line` 返回一条去掉行结束符的消息。

use crate::{RxTransport, TransportError};
use std::time::{Duration, Instant};
use tracing::warn;

/// 单行最大长度，超过则丢弃缓冲区（设备不会发送这么长的行）
pub const MAX_LINE_LEN: usize = 4096;

const READ_CHUNK: usize = 256;

/// 给命令文本加上行结束符
pub fn frame_line(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 2);
    bytes.extend_from_slice(command.as_bytes());
    bytes.extend_from_slice(b"\r\n");
    bytes
}

/// 按行读取
pub struct LineReader<R> {
    rx: R,
    buffer: Vec<u8>,
}

impl<R: RxTransport> LineReader<R> {
    pub fn new(rx: R) -> Self {
        Self {
            rx,
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// 读取下一行（只去掉结尾的 LF 和 CR，其余内容原样保留，包括空行）
    ///
    /// `timeout` 是整行的截止时间，而不是单次底层读取的超时。
    /// 超时后已收到的半行保留在缓冲区，下次调用继续拼接。
    pub fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }

            let n = self.rx.receive(&mut chunk, remaining)?;
            self.buffer.extend_from_slice(&chunk[..n]);

            if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&b'\n') {
                warn!(
                    "Discarding {} bytes without line terminator",
                    self.buffer.len()
                );
                self.buffer.clear();
            }
        }
    }

    /// 缓冲区中尚未组成完整行的字节数
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut raw: Vec<u8> = self.buffer.drain(..=end).collect();
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}

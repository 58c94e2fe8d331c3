//! Mock 后端
//!
//! 模拟 MRCL700 的串口行为：
//! - 回显每条收到的命令（可关闭）
//! - 对指定命令回复预设的行
//! - 随时注入主动上报的行
//! - 按需模拟设备断开

use crate::{
    DeviceError, DeviceErrorKind, RxTransport, SplittableTransport, Transport, TransportError,
    TxTransport,
};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct DeviceState {
    echo: bool,
    inbound: VecDeque<u8>,
    partial_command: Vec<u8>,
    written: Vec<String>,
    responses: HashMap<String, Vec<String>>,
    failure: Option<DeviceErrorKind>,
}

impl DeviceState {
    fn push_line(&mut self, line: &str) {
        self.inbound.extend(line.as_bytes());
        self.inbound.extend(b"\r\n");
    }

    fn failure(&self) -> Option<TransportError> {
        self.failure
            .map(|kind| TransportError::Device(DeviceError::new(kind, "mock device failure")))
    }
}

struct Shared {
    state: Mutex<DeviceState>,
    data_ready: Condvar,
}

/// 模拟设备句柄（测试代码持有，用于编排设备行为和检查写入的命令）
#[derive(Clone)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// 创建开启回显的模拟设备
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DeviceState {
                    echo: true,
                    ..DeviceState::default()
                }),
                data_ready: Condvar::new(),
            }),
        }
    }

    pub fn set_echo(&self, echo: bool) {
        self.shared.state.lock().echo = echo;
    }

    /// 之后每次收到 `command` 时，在回显之后回复 `lines`
    pub fn respond<I, S>(&self, command: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.shared
            .state
            .lock()
            .responses
            .insert(command.to_string(), lines);
    }

    /// 注入一行主动上报数据
    pub fn inject(&self, line: &str) {
        self.shared.state.lock().push_line(line);
        self.shared.data_ready.notify_all();
    }

    /// 模拟设备故障：之后所有读写都返回该错误
    pub fn fail_with(&self, kind: DeviceErrorKind) {
        self.shared.state.lock().failure = Some(kind);
        self.shared.data_ready.notify_all();
    }

    /// 已写入的命令（不含行结束符）
    pub fn written(&self) -> Vec<String> {
        self.shared.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.shared.state.lock().written.clear();
    }

    /// 等待直到写入的命令数达到 `count`
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.written.len() < count {
            if self
                .shared
                .data_ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.written.len() >= count;
            }
        }
        true
    }

    /// 连接到本设备的传输对象
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// 连接到 [`MockDevice`] 的传输
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock();
        if let Some(err) = state.failure() {
            return Err(err);
        }

        state.partial_command.extend_from_slice(data);
        while let Some(end) = state.partial_command.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = state.partial_command.drain(..=end).collect();
            let command = String::from_utf8_lossy(&raw).trim().to_string();
            if command.is_empty() {
                continue;
            }
            if state.echo {
                state.push_line(&command);
            }
            if let Some(lines) = state.responses.get(&command).cloned() {
                for line in &lines {
                    state.push_line(line);
                }
            }
            state.written.push(command);
        }
        drop(state);
        self.shared.data_ready.notify_all();
        Ok(())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(err) = state.failure() {
                return Err(err);
            }
            if !state.inbound.is_empty() {
                let n = buf.len().min(state.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if self
                .shared
                .data_ready
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.inbound.is_empty()
                && state.failure.is_none()
            {
                return Err(TransportError::Timeout);
            }
        }
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.write(data)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.read(buf, timeout)
    }

    fn flush_read_buffer(&mut self) -> Result<(), TransportError> {
        self.shared.state.lock().inbound.clear();
        Ok(())
    }
}

impl RxTransport for MockTransport {
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.read(buf, timeout)
    }
}

impl TxTransport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.write(data)
    }
}

impl SplittableTransport for MockTransport {
    type Rx = MockTransport;
    type Tx = MockTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        Ok((self.clone(), self))
    }
}

//! TCP 后端（串口服务器 / 网口转串口模块）

use crate::{
    RxTransport, SplittableTransport, Transport, TransportError, TxTransport, map_read_error,
};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

// std 不接受零超时
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// TCP 传输
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            debug!("Connected to {}", peer);
        }
        Ok(Self { stream })
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

fn read_with_timeout(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize, TransportError> {
    stream.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
    match stream.read(buf) {
        Ok(0) => Err(TransportError::Closed),
        Ok(n) => {
            trace!("TCP RX {} bytes", n);
            Ok(n)
        },
        Err(e) => Err(map_read_error(e)),
    }
}

fn write_all(stream: &mut TcpStream, data: &[u8]) -> Result<(), TransportError> {
    stream.write_all(data).map_err(map_read_error)?;
    stream.flush()?;
    Ok(())
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.stream, data)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        read_with_timeout(&mut self.stream, buf, timeout)
    }

    fn flush_read_buffer(&mut self) -> Result<(), TransportError> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 256];
        let result = loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => break Err(TransportError::Closed),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(TransportError::Io(e)),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}

impl SplittableTransport for TcpTransport {
    type Rx = TcpRxTransport;
    type Tx = TcpTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        let tx = self.stream.try_clone()?;
        Ok((
            TcpRxTransport {
                stream: self.stream,
            },
            TcpTxTransport { stream: tx },
        ))
    }
}

pub struct TcpRxTransport {
    stream: TcpStream,
}

impl RxTransport for TcpRxTransport {
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        read_with_timeout(&mut self.stream, buf, timeout)
    }
}

pub struct TcpTxTransport {
    stream: TcpStream,
}

impl TxTransport for TcpTxTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.stream, data)
    }
}

//! 串口后端
//!
//! 基于 `serialport` crate。拆分时通过 `try_clone` 获得独立的读 / 写句柄。

use crate::{
    DeviceError, DeviceErrorKind, RxTransport, SplittableTransport, Transport, TransportError,
    TxTransport, map_read_error,
};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

const OPEN_TIMEOUT: Duration = Duration::from_millis(100);

impl From<serialport::Error> for DeviceError {
    fn from(err: serialport::Error) -> Self {
        let kind = match err.kind() {
            serialport::ErrorKind::NoDevice => DeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => DeviceErrorKind::UnsupportedConfig,
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => DeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                DeviceErrorKind::AccessDenied
            },
            serialport::ErrorKind::Io(_) => DeviceErrorKind::Backend,
            _ => DeviceErrorKind::Unknown,
        };
        DeviceError::new(kind, err.description)
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Device(err.into())
    }
}

/// 串口传输
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// 以 8N1、无流控打开串口
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(OPEN_TIMEOUT)
            .open()?;
        debug!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

fn read_with_timeout(
    port: &mut Box<dyn SerialPort>,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize, TransportError> {
    port.set_timeout(timeout)?;
    match port.read(buf) {
        Ok(0) => Err(TransportError::Timeout),
        Ok(n) => {
            trace!("Serial RX {} bytes", n);
            Ok(n)
        },
        Err(e) => Err(map_read_error(e)),
    }
}

fn write_all(port: &mut Box<dyn SerialPort>, data: &[u8]) -> Result<(), TransportError> {
    port.write_all(data)?;
    port.flush()?;
    Ok(())
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.port, data)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        read_with_timeout(&mut self.port, buf, timeout)
    }

    fn flush_read_buffer(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl SplittableTransport for SerialTransport {
    type Rx = SerialRxTransport;
    type Tx = SerialTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        let tx_port = self.port.try_clone()?;
        Ok((
            SerialRxTransport { port: self.port },
            SerialTxTransport { port: tx_port },
        ))
    }
}

/// 串口读半部
pub struct SerialRxTransport {
    port: Box<dyn SerialPort>,
}

impl RxTransport for SerialRxTransport {
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        read_with_timeout(&mut self.port, buf, timeout)
    }
}

/// 串口写半部
pub struct SerialTxTransport {
    port: Box<dyn SerialPort>,
}

impl TxTransport for SerialTxTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.port, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialport_error_mapping() {
        let err: DeviceError =
            serialport::Error::new(serialport::ErrorKind::NoDevice, "gone").into();
        assert_eq!(err.kind, DeviceErrorKind::NoDevice);

        let err: DeviceError = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        )
        .into();
        assert_eq!(err.kind, DeviceErrorKind::AccessDenied);
        assert_eq!(err.message, "denied");
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::open("/dev/mrcl-does-not-exist", crate::DEFAULT_BAUD_RATE);
        assert!(result.is_err());
    }
}

//! Builder 模式实现
//!
//! 提供链式构造 `Microscope` 实例的便捷方式。

use crate::config::{ConnectionKind, MicroscopeConfig};
use crate::error::DriverError;
use crate::microscope::Microscope;
use crate::pipeline::DispatchConfig;
use mrcl_transport::{SplittableTransport, TcpTransport};
use std::path::Path;
use tracing::info;

/// Microscope Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use mrcl_driver::{DispatchConfig, MicroscopeBuilder};
///
/// let microscope = MicroscopeBuilder::new()
///     .serial("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .dispatch_config(DispatchConfig {
///         reply_timeout_ms: 1000,
///         ..DispatchConfig::default()
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MicroscopeBuilder {
    /// 串口设备路径
    port: Option<String>,
    /// 串口波特率（默认 115200）
    baud_rate: Option<u32>,
    /// TCP 串口服务器地址（设置后优先于串口）
    tcp_address: Option<String>,
    dispatch_config: Option<DispatchConfig>,
}

impl MicroscopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn tcp(mut self, address: impl Into<String>) -> Self {
        self.tcp_address = Some(address.into());
        self
    }

    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch_config = Some(config);
        self
    }

    /// 从配置文件内容初始化（之后的链式调用可覆盖）
    pub fn from_config(config: &MicroscopeConfig) -> Self {
        let connection = &config.connection;
        let builder = Self::new().dispatch_config(config.dispatch_config());
        let builder = match connection.kind {
            ConnectionKind::Serial => Self {
                port: connection.port.clone(),
                ..builder
            },
            ConnectionKind::Tcp => Self {
                tcp_address: connection.address.clone(),
                ..builder
            },
        };
        Self {
            baud_rate: connection.baud_rate,
            ..builder
        }
    }

    /// 从 TOML 配置文件初始化
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        Ok(Self::from_config(&MicroscopeConfig::load(path)?))
    }

    /// 打开连接并启动控制器
    pub fn build(self) -> Result<Microscope, DriverError> {
        let config = self.dispatch_config.clone().unwrap_or_default();

        if let Some(address) = &self.tcp_address {
            info!("Connecting to MRCL700 at {}", address);
            let transport = TcpTransport::connect(address.as_str())?;
            return Microscope::new(transport, config);
        }

        match &self.port {
            Some(port) => self.open_serial(port, config),
            None => Err(DriverError::invalid(
                "no connection configured: call serial() or tcp()",
            )),
        }
    }

    #[cfg(feature = "serial")]
    fn open_serial(&self, port: &str, config: DispatchConfig) -> Result<Microscope, DriverError> {
        let baud_rate = self.baud_rate.unwrap_or(mrcl_transport::DEFAULT_BAUD_RATE);
        info!("Opening MRCL700 on {} at {} baud", port, baud_rate);
        let transport = mrcl_transport::SerialTransport::open(port, baud_rate)?;
        Microscope::new(transport, config)
    }

    #[cfg(not(feature = "serial"))]
    fn open_serial(&self, port: &str, _config: DispatchConfig) -> Result<Microscope, DriverError> {
        Err(DriverError::invalid(format!(
            "cannot open {port}: built without the `serial` feature"
        )))
    }

    /// 使用已打开的传输启动控制器（连接参数被忽略）
    pub fn build_with<T: SplittableTransport>(
        self,
        transport: T,
    ) -> Result<Microscope, DriverError> {
        Microscope::new(transport, self.dispatch_config.unwrap_or_default())
    }
}

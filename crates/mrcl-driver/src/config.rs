//! TOML 配置文件
//!
//! ```toml
//! [connection]
//! kind = "serial"
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [dispatch]
//! reply_timeout_ms = 1500
//! ```
//!
//! `[dispatch]` 中未出现的字段使用 [`DispatchConfig::default`]。

use crate::error::DriverError;
use crate::pipeline::DispatchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 连接方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// 串口（USB 转串口）
    #[default]
    Serial,
    /// TCP 串口服务器
    Tcp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub kind: ConnectionKind,
    /// 串口设备路径
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    /// TCP 地址（`host:port`）
    pub address: Option<String>,
}

/// `[dispatch]` 段，全部字段可选
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    pub receive_timeout_ms: Option<u64>,
    pub reply_timeout_ms: Option<u64>,
    pub connection_timeout_ms: Option<u64>,
    pub join_timeout_ms: Option<u64>,
}

impl DispatchSection {
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        let defaults = DispatchConfig::default();
        DispatchConfig {
            receive_timeout_ms: self.receive_timeout_ms.unwrap_or(defaults.receive_timeout_ms),
            reply_timeout_ms: self.reply_timeout_ms.unwrap_or(defaults.reply_timeout_ms),
            connection_timeout_ms: self
                .connection_timeout_ms
                .unwrap_or(defaults.connection_timeout_ms),
            join_timeout_ms: self.join_timeout_ms.unwrap_or(defaults.join_timeout_ms),
        }
    }
}

/// 显微镜连接配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicroscopeConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub dispatch: DispatchSection,
}

impl MicroscopeConfig {
    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 写回文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DriverError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| {
            DriverError::Config(format!("failed to write {}: {}", path.display(), e))
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        self.dispatch.to_dispatch_config()
    }

    fn validate(&self) -> Result<(), DriverError> {
        let connection = &self.connection;
        match connection.kind {
            ConnectionKind::Serial if connection.port.is_none() => Err(DriverError::Config(
                "serial connection requires `port`".into(),
            )),
            ConnectionKind::Tcp if connection.address.is_none() => Err(DriverError::Config(
                "tcp connection requires `address`".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_serial_config_with_partial_dispatch() {
        let config = MicroscopeConfig::from_toml_str(
            r#"
            [connection]
            kind = "serial"
            port = "/dev/ttyUSB0"
            baud_rate = 9600

            [dispatch]
            reply_timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.kind, ConnectionKind::Serial);
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.connection.baud_rate, Some(9600));

        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.reply_timeout_ms, 1500);
        assert_eq!(dispatch.receive_timeout_ms, 1000);
        assert_eq!(dispatch.join_timeout_ms, 2000);
    }

    #[test]
    fn test_tcp_config_requires_address() {
        let config = MicroscopeConfig::from_toml_str(
            "[connection]\nkind = \"tcp\"\naddress = \"10.0.0.5:4001\"\n",
        )
        .unwrap();
        assert_eq!(config.connection.kind, ConnectionKind::Tcp);
        assert_eq!(config.dispatch_config(), DispatchConfig::default());

        let err = MicroscopeConfig::from_toml_str("[connection]\nkind = \"tcp\"\n").unwrap_err();
        assert!(matches!(err, DriverError::Config(ref m) if m.contains("address")));
    }

    #[test]
    fn test_rejects_unknown_fields_and_kinds() {
        assert!(matches!(
            MicroscopeConfig::from_toml_str("[connection]\nkind = \"usb\"\nport = \"x\"\n"),
            Err(DriverError::Config(_))
        ));
        assert!(matches!(
            MicroscopeConfig::from_toml_str("[dispatch]\nrecv_ms = 5\n"),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_load_and_save_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nport = \"COM3\"").unwrap();
        writeln!(file, "[dispatch]\njoin_timeout_ms = 500").unwrap();

        let config = MicroscopeConfig::load(file.path()).unwrap();
        assert_eq!(config.connection.kind, ConnectionKind::Serial);
        assert_eq!(config.dispatch_config().join_timeout_ms, 500);

        let dir = tempfile::tempdir().unwrap();
        let copy = dir.path().join("microscope.toml");
        config.save(&copy).unwrap();
        assert_eq!(MicroscopeConfig::load(&copy).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MicroscopeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, DriverError::Config(ref m) if m.contains("absent.toml")));
    }
}

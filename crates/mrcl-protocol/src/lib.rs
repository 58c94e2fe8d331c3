//! # MRCL Protocol
//!
//! Microqubic MRCL700 显微镜 ASCII 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `axis`: 轴标识、轴类型与轴参数表
//! - `constants`: 协议常量定义
//! - `control`: 下行命令编码
//! - `feedback`: 上行消息分类与应答解析
//!
//! ## 帧格式
//!
//! 协议以行为单位，每行以 CRLF 结尾。本 crate 只处理去掉结束符后的文本，
//! 分帧由传输层负责。
//!
//! ```text
//! 下行：$<轴字母><操作码>[,<参数>...]      例：$X3,50,12.500
//! 上行状态：<轴字母>:<ID>,<位置>[,<步数>,<是否回零 0|1>]
//! 上行速度：$<轴字母>1,<速度>
//! ```

pub mod axis;
pub mod constants;
pub mod control;
pub mod feedback;

// 重新导出常用类型
pub use axis::*;
pub use constants::*;
pub use control::*;
pub use feedback::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 整行与期望的语法不匹配
    #[error("Failed to parse {expected} from line {line:?}")]
    Parse { expected: &'static str, line: String },

    /// 语法匹配，但某个字段无法解析
    #[error("Invalid value for field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// 未知的轴字母
    #[error("Unknown axis letter: {0:?}")]
    UnknownAxis(char),
}

impl ProtocolError {
    pub(crate) fn parse(expected: &'static str, line: &str) -> Self {
        Self::Parse {
            expected,
            line: line.to_string(),
        }
    }

    pub(crate) fn field(field: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            value: value.to_string(),
        }
    }
}

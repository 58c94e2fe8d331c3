//! 协议常量定义

/// 行结束符（下行命令与上行消息均使用 CRLF）
pub const LINE_TERMINATOR: &str = "\r\n";

/// 所有命令的前缀
pub const COMMAND_SIGIL: char = '$';

/// 系统级命令使用的“轴字母”（`$*0` 急停、`$*5` 全部回零、`$*8` 状态灯）
pub const SYSTEM_SIGIL: char = '*';

/// 定位运动速度百分比下限（`move_relative` / `move_absolute` / 步进）
pub const MOVE_SPEED_MIN: f64 = 1.0;
/// 定位运动速度百分比上限
pub const MOVE_SPEED_MAX: f64 = 100.0;

/// 自由运动速度百分比范围（可为负，表示反向）
pub const FREE_SPEED_MIN: f64 = -100.0;
pub const FREE_SPEED_MAX: f64 = 100.0;

/// 亮度 / 状态灯百分比上限
pub const PERCENTAGE_MAX: u8 = 100;

/// 环形照明 LED 数量（编号 1..=8）
pub const RING_LED_COUNT: u8 = 8;

/// 矩阵照明列数（编号 1..=10）
pub const MATRIX_COLUMN_COUNT: u8 = 10;

/// 位置 / 距离字段的小数位数（线协议的一部分）
pub const POSITION_DECIMALS: usize = 3;

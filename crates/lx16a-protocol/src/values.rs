//! 数值编码
//!
//! 所有钳位函数都是全函数：超出范围的输入被饱和到最近的合法值，
//! 永不报错。设备侧以无符号字节表示的有符号量（角度偏差、电机转速、
//! 位置读数）在这里完成偏置编码与还原。

use crate::{ProtocolError, SERVO_ID_BROADCAST, SERVO_ID_MAX};

// ============================================================================
// 舵机标识
// ============================================================================

/// 舵机 ID
///
/// 有效取值 [0, 253]；254 为保留的广播地址，仅用于写入指令和
/// 单设备发现（广播查询不按 ID 匹配应答）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoId(u8);

impl ServoId {
    /// 广播地址（0xFE）
    pub const BROADCAST: ServoId = ServoId(SERVO_ID_BROADCAST);

    /// 构造舵机 ID
    ///
    /// # 错误
    /// - `ProtocolError::InvalidServoId`: ID 超出 [0, 253]
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id > SERVO_ID_MAX {
            return Err(ProtocolError::InvalidServoId { id });
        }
        Ok(ServoId(id))
    }

    /// 线上字节表示
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// 是否为广播地址
    pub const fn is_broadcast(self) -> bool {
        self.0 == SERVO_ID_BROADCAST
    }
}

impl TryFrom<u8> for ServoId {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        ServoId::new(id)
    }
}

impl std::fmt::Display for ServoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_broadcast() {
            write!(f, "broadcast")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ============================================================================
// 工作模式
// ============================================================================

/// 舵机工作模式
///
/// 两种模式互斥：位置模式下转速无意义，电机模式下位置无意义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServoMode {
    /// 位置伺服模式（模式字节 0）
    Position,
    /// 连续旋转电机模式（模式字节 1）
    Motor,
}

impl ServoMode {
    /// 由应答帧的模式字节还原
    ///
    /// 固件只定义 0/1 两个取值；任何非 1 的字节按位置模式处理，
    /// 与转速读取的 `!= 1` 判断保持一致。
    pub const fn from_mode_byte(byte: u8) -> Self {
        if byte == 1 {
            ServoMode::Motor
        } else {
            ServoMode::Position
        }
    }

    /// 写入模式指令时的模式标志字节
    pub const fn mode_byte(self) -> u8 {
        match self {
            ServoMode::Position => 0,
            ServoMode::Motor => 1,
        }
    }
}

// ============================================================================
// LED 报警标志
// ============================================================================

/// LED 报警标志位掩码
///
/// 三个独立标志位，组合值钳位到 [0, 7]。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedErrors(u8);

impl LedErrors {
    /// 无报警
    pub const NONE: LedErrors = LedErrors(0);
    /// 过温报警
    pub const OVER_TEMPERATURE: LedErrors = LedErrors(1);
    /// 过压报警
    pub const OVER_VOLTAGE: LedErrors = LedErrors(2);
    /// 堵转报警
    pub const LOCKED_ROTOR: LedErrors = LedErrors(4);

    /// 由原始掩码构造，超出 7 的输入饱和为 7
    pub const fn from_bits(bits: u8) -> Self {
        if bits > 7 { LedErrors(7) } else { LedErrors(bits) }
    }

    /// 线上字节表示
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// 标志位成员测试（按位与）
    pub const fn contains(self, other: LedErrors) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for LedErrors {
    type Output = LedErrors;

    fn bitor(self, rhs: LedErrors) -> LedErrors {
        LedErrors(self.0 | rhs.0)
    }
}

// ============================================================================
// 钳位与偏置编码
// ============================================================================

/// 单舵机位置，钳位到 [0, 1000]
pub fn clamp_position(value: i32) -> u16 {
    value.clamp(0, 1000) as u16
}

/// 总线协议位置，钳位到 [0, 10000]
pub fn clamp_bus_position(value: i32) -> u16 {
    value.clamp(0, 10000) as u16
}

/// 动作时间（毫秒），钳位到 [0, 30000]
pub fn clamp_time_ms(value: i32) -> u16 {
    value.clamp(0, 30000) as u16
}

/// 输入电压限制（毫伏），钳位到 [4500, 12000]
pub fn clamp_voltage_mv(value: i32) -> u16 {
    value.clamp(4500, 12000) as u16
}

/// 最高温度限制（摄氏度），钳位到 [50, 100]
pub fn clamp_temperature(value: i32) -> u8 {
    value.clamp(50, 100) as u8
}

/// 角度偏差编码：钳位到 [-125, 125]，负值加 256 偏置为单字节
pub fn encode_offset(value: i32) -> u8 {
    let clamped = value.clamp(-125, 125);
    if clamped < 0 {
        (clamped + 256) as u8
    } else {
        clamped as u8
    }
}

/// 角度偏差还原：大于 127 的字节减 256 还原为负值
pub const fn decode_offset(byte: u8) -> i16 {
    if byte > 127 {
        byte as i16 - 256
    } else {
        byte as i16
    }
}

/// 电机转速编码：钳位到 [-1000, 1000]，负值加 65536 偏置为 16 位无符号
pub fn encode_speed(value: i32) -> u16 {
    let clamped = value.clamp(-1000, 1000);
    if clamped < 0 {
        (clamped + 65536) as u16
    } else {
        clamped as u16
    }
}

/// 电机转速还原：大于 32767 的字减 65536 还原为负值
pub const fn decode_speed(raw: u16) -> i16 {
    if raw > 32767 {
        (raw as i32 - 65536) as i16
    } else {
        raw as i16
    }
}

/// 位置读数还原
///
/// 设备以无符号 16 位上报位置，越过机械零点时为负。
pub const fn decode_signed_position(raw: u16) -> i16 {
    if raw > 32767 {
        (raw as i32 - 65536) as i16
    } else {
        raw as i16
    }
}

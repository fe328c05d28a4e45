//! 协议常量定义
//!
//! 指令码取值来自舵机固件文档，两套协议各自独立编号：
//! 单舵机协议按 ID 寻址、带校验和；总线控制器协议面向整条总线，
//! 无校验和、无帧头 ID 字段。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 帧头同步字节（连续出现两次）
pub const FRAME_HEADER: u8 = 0x55;

/// 可分配的最大舵机 ID
pub const SERVO_ID_MAX: u8 = 253;

/// 广播 ID，寻址总线上所有设备（仅用于写入与发现）
pub const SERVO_ID_BROADCAST: u8 = 0xFE;

/// 单舵机协议的最大参数字节数
///
/// 应答帧的 length 字节不得超过 `3 + MAX_PARAMS = 7`。
pub const MAX_PARAMS: usize = 4;

/// 单舵机协议指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ServoCommand {
    MoveTimeWrite = 1,
    MoveTimeRead = 2,
    MoveTimeWaitWrite = 7,
    MoveTimeWaitRead = 8,
    MoveStart = 11,
    MoveStop = 12,
    IdWrite = 13,
    IdRead = 14,
    AngleOffsetAdjust = 17,
    AngleOffsetWrite = 18,
    AngleOffsetRead = 19,
    AngleLimitWrite = 20,
    AngleLimitRead = 21,
    VinLimitWrite = 22,
    VinLimitRead = 23,
    TempMaxLimitWrite = 24,
    TempMaxLimitRead = 25,
    TempRead = 26,
    VinRead = 27,
    PosRead = 28,
    ModeWrite = 29,
    ModeRead = 30,
    LoadUnloadWrite = 31,
    LoadUnloadRead = 32,
    LedCtrlWrite = 33,
    LedCtrlRead = 34,
    LedErrorWrite = 35,
    LedErrorRead = 36,
    // 总线上挂载的触觉传感器与舵机共用帧格式
    SensorPressureRead = 37,
    SensorIdRead = 38,
    SensorIdWrite = 39,
    SensorLedRgbWrite = 40,
    SensorLedModeWrite = 41,
}

/// 总线控制器协议指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BusCommand {
    ServoMove = 3,
    ActionGroupRun = 6,
    ActionStop = 7,
    ActionSpeed = 11,
    GetBatteryVoltage = 15,
    MultServoUnload = 20,
    MultServoPosRead = 21,
}

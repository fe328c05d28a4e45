//! 单舵机协议控制器
//!
//! 每条指令按舵机 ID 寻址、带校验和。查询在同一临界区内完成
//! "发送指令 → 等待匹配应答"，两个并发调用方的帧不会在线路上
//! 交错；写入型指令发出即返回，不等待应答（设备不回复写指令）。
//!
//! 控制器不缓存任何设备状态：每次查询都重新读线。

use crate::error::DriverError;
use lx16a_protocol::{
    DiscardReason, LedErrors, ResponseDecoder, ServoCommand, ServoFrame, ServoId, ServoMode, Step,
    clamp_position, clamp_temperature, clamp_time_ms, clamp_voltage_mv, codec, decode_offset,
    decode_signed_position, decode_speed, encode_offset, encode_speed, higher_byte, lower_byte,
};
use lx16a_serial::{Deadline, DeadlineReader, SerialAdapter, SerialError};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{error, trace, warn};

/// 查询的默认超时预算
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// 重同步过程中的丢弃诊断
///
/// 丢弃不在控制流关键路径上产生任何影响，只按严重程度分级记录：
/// 结构性损坏（长度、校验和）记 error，无关流量（回波、别的设备）
/// 记 warn，杂散字节记 trace。
pub(crate) fn log_discard(reason: DiscardReason) {
    match reason {
        DiscardReason::SyncByte { byte } => {
            trace!("Discarding stray byte 0x{:02x} while scanning for sync", byte);
        },
        DiscardReason::BadLength { length } => {
            error!("Discarding frame with invalid length {}", length);
        },
        DiscardReason::BadChecksum { expected, actual } => {
            error!(
                "Discarding frame with invalid checksum (expected 0x{:02x}, got 0x{:02x})",
                expected, actual
            );
        },
        DiscardReason::ParamCountMismatch { expected, actual } => {
            warn!(
                "Discarding frame with unexpected param count (expected {}, got {})",
                expected, actual
            );
        },
        DiscardReason::CommandMismatch { expected, actual } => {
            warn!(
                "Discarding response for unexpected command {} (waiting for {})",
                actual, expected
            );
        },
        DiscardReason::IdMismatch { expected, actual } => {
            warn!(
                "Discarding response from unexpected servo {} (waiting for {})",
                actual, expected
            );
        },
    }
}

/// 单舵机协议控制器
///
/// 独占一条串口连接；内部以互斥锁串行化全部总线访问，可安全地
/// 从多个线程调用（例如后台轮询 + 用户触发的指令）。调用按锁的
/// 获取顺序排队，除此之外没有更多的调度策略。
pub struct ServoController<A: SerialAdapter> {
    port: Mutex<A>,
    timeout: Duration,
}

impl<A: SerialAdapter> ServoController<A> {
    /// 以默认查询超时（1 秒）接管一条连接
    pub fn new(adapter: A) -> Self {
        Self::with_timeout(adapter, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(adapter: A, timeout: Duration) -> Self {
        Self {
            port: Mutex::new(adapter),
            timeout,
        }
    }

    /// 绑定某个 ID 的舵机句柄
    pub fn servo(&self, id: ServoId) -> crate::Servo<'_, A> {
        crate::Servo::new(self, id)
    }

    /// 发送写入型指令，不等待应答
    fn command(
        &self,
        id: ServoId,
        command: ServoCommand,
        params: &[u8],
    ) -> Result<(), DriverError> {
        let frame = codec::encode(id, command, params);
        trace!("Sending servo frame: {:02x?}", &frame[..]);
        let mut port = self.port.lock();
        port.write(&frame)?;
        Ok(())
    }

    /// 发送查询并等待匹配应答
    ///
    /// 发送与等待处于同一临界区。截止时间在发送前计算一次，之后
    /// 重同步循环里的所有部分读取共享这份预算。
    fn query(
        &self,
        id: ServoId,
        command: ServoCommand,
        response_params: usize,
        timeout: Option<Duration>,
    ) -> Result<ServoFrame, DriverError> {
        let frame = codec::encode(id, command, &[]);
        let deadline = Deadline::after(timeout.unwrap_or(self.timeout));

        let mut port = self.port.lock();
        trace!("Sending servo query: {:02x?}", &frame[..]);
        port.write(&frame)?;

        let mut decoder = ResponseDecoder::with_expected_params(command, id, response_params);
        let mut reader = DeadlineReader::new(&mut *port, deadline);
        loop {
            let mut byte = [0u8; 1];
            match reader.read_exact(&mut byte) {
                Ok(()) => {},
                Err(SerialError::Timeout) => return Err(DriverError::Timeout),
                Err(e) => return Err(e.into()),
            }
            match decoder.feed(byte[0]) {
                Step::Pending => {},
                Step::Discard(reason) => log_discard(reason),
                Step::Frame(response) => {
                    trace!(
                        "Received servo response: id={} command={} params={:02x?}",
                        response.id,
                        response.command,
                        &response.params[..]
                    );
                    return Ok(response);
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // ID 管理
    // ------------------------------------------------------------------

    /// 读取舵机 ID
    ///
    /// 以 [`ServoId::BROADCAST`] 查询可发现总线上唯一一台未知 ID 的
    /// 设备（多台同时应答时线上会冲突，发现仅限单设备场景）。
    pub fn get_id(&self, id: ServoId, timeout: Option<Duration>) -> Result<u8, DriverError> {
        let response = self.query(id, ServoCommand::IdRead, 1, timeout)?;
        Ok(response.param(0))
    }

    /// 改写舵机 ID（持久化在设备内部存储）
    pub fn set_id(&self, id: ServoId, new_id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::IdWrite, &[new_id.raw()])
    }

    // ------------------------------------------------------------------
    // 运动
    // ------------------------------------------------------------------

    /// 在 `time_ms` 毫秒内转到 `position`
    ///
    /// 位置钳位到 [0, 1000]，时间钳位到 [0, 30000]。
    pub fn move_to(&self, id: ServoId, position: i32, time_ms: i32) -> Result<(), DriverError> {
        let position = clamp_position(position);
        let time = clamp_time_ms(time_ms);
        self.command(
            id,
            ServoCommand::MoveTimeWrite,
            &[
                lower_byte(position),
                higher_byte(position),
                lower_byte(time),
                higher_byte(time),
            ],
        )
    }

    /// 预置一次运动，等待 [`start_move`](Self::start_move) 统一触发
    ///
    /// 先逐台预置、再广播触发，可让多台舵机在同一时刻起步。
    pub fn prepare_move(&self, id: ServoId, position: i32, time_ms: i32) -> Result<(), DriverError> {
        let position = clamp_position(position);
        let time = clamp_time_ms(time_ms);
        self.command(
            id,
            ServoCommand::MoveTimeWaitWrite,
            &[
                lower_byte(position),
                higher_byte(position),
                lower_byte(time),
                higher_byte(time),
            ],
        )
    }

    /// 读取已预置的 (位置, 时间)
    pub fn get_prepared_move(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<(u16, u16), DriverError> {
        let response = self.query(id, ServoCommand::MoveTimeWaitRead, 4, timeout)?;
        Ok((response.word_at(0), response.word_at(2)))
    }

    /// 触发已预置的运动
    pub fn start_move(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::MoveStart, &[])
    }

    /// 立即停止运动
    pub fn stop_move(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::MoveStop, &[])
    }

    // ------------------------------------------------------------------
    // 角度偏差
    // ------------------------------------------------------------------

    /// 读取角度偏差，范围 [-125, 125]
    pub fn get_position_offset(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<i16, DriverError> {
        let response = self.query(id, ServoCommand::AngleOffsetRead, 1, timeout)?;
        Ok(decode_offset(response.param(0)))
    }

    /// 调整角度偏差（易失，断电即丢）
    ///
    /// 持久化需另行调用 [`save_position_offset`](Self::save_position_offset)。
    pub fn set_position_offset(&self, id: ServoId, offset: i32) -> Result<(), DriverError> {
        self.command(id, ServoCommand::AngleOffsetAdjust, &[encode_offset(offset)])
    }

    /// 把当前角度偏差写入设备存储
    pub fn save_position_offset(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::AngleOffsetWrite, &[])
    }

    // ------------------------------------------------------------------
    // 限制参数
    // ------------------------------------------------------------------

    /// 读取行程限制 (min, max)
    pub fn get_position_limits(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<(u16, u16), DriverError> {
        let response = self.query(id, ServoCommand::AngleLimitRead, 4, timeout)?;
        Ok((response.word_at(0), response.word_at(2)))
    }

    /// 设置行程限制，两端各自钳位到 [0, 1000]
    pub fn set_position_limits(
        &self,
        id: ServoId,
        min_position: i32,
        max_position: i32,
    ) -> Result<(), DriverError> {
        let min = clamp_position(min_position);
        let max = clamp_position(max_position);
        self.command(
            id,
            ServoCommand::AngleLimitWrite,
            &[lower_byte(min), higher_byte(min), lower_byte(max), higher_byte(max)],
        )
    }

    /// 读取输入电压限制 (min, max)，单位毫伏
    pub fn get_voltage_limits(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<(u16, u16), DriverError> {
        let response = self.query(id, ServoCommand::VinLimitRead, 4, timeout)?;
        Ok((response.word_at(0), response.word_at(2)))
    }

    /// 设置输入电压限制，两端各自钳位到 [4500, 12000] 毫伏
    pub fn set_voltage_limits(
        &self,
        id: ServoId,
        min_voltage_mv: i32,
        max_voltage_mv: i32,
    ) -> Result<(), DriverError> {
        let min = clamp_voltage_mv(min_voltage_mv);
        let max = clamp_voltage_mv(max_voltage_mv);
        self.command(
            id,
            ServoCommand::VinLimitWrite,
            &[lower_byte(min), higher_byte(min), lower_byte(max), higher_byte(max)],
        )
    }

    /// 读取最高温度限制（摄氏度）
    pub fn get_max_temperature_limit(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<u8, DriverError> {
        let response = self.query(id, ServoCommand::TempMaxLimitRead, 1, timeout)?;
        Ok(response.param(0))
    }

    /// 设置最高温度限制，钳位到 [50, 100] 摄氏度
    pub fn set_max_temperature_limit(
        &self,
        id: ServoId,
        max_temperature: i32,
    ) -> Result<(), DriverError> {
        self.command(
            id,
            ServoCommand::TempMaxLimitWrite,
            &[clamp_temperature(max_temperature)],
        )
    }

    // ------------------------------------------------------------------
    // 遥测
    // ------------------------------------------------------------------

    /// 读取当前温度（摄氏度）
    pub fn get_temperature(&self, id: ServoId, timeout: Option<Duration>) -> Result<u8, DriverError> {
        let response = self.query(id, ServoCommand::TempRead, 1, timeout)?;
        Ok(response.param(0))
    }

    /// 读取当前输入电压（毫伏）
    pub fn get_voltage(&self, id: ServoId, timeout: Option<Duration>) -> Result<u16, DriverError> {
        let response = self.query(id, ServoCommand::VinRead, 2, timeout)?;
        Ok(response.word_at(0))
    }

    /// 读取当前位置
    ///
    /// 设备以无符号 16 位上报，越过机械零点为负，按有符号还原。
    pub fn get_position(&self, id: ServoId, timeout: Option<Duration>) -> Result<i16, DriverError> {
        let response = self.query(id, ServoCommand::PosRead, 2, timeout)?;
        Ok(decode_signed_position(response.word_at(0)))
    }

    /// 读取当前工作模式
    pub fn get_mode(&self, id: ServoId, timeout: Option<Duration>) -> Result<ServoMode, DriverError> {
        let response = self.query(id, ServoCommand::ModeRead, 4, timeout)?;
        Ok(ServoMode::from_mode_byte(response.param(0)))
    }

    /// 读取电机模式转速
    ///
    /// 模式字节不为电机模式时固定返回 0：调用方不能把 0 解读成
    /// "设备报告零转速"——它同样可能意味着设备根本不在电机模式。
    /// 需要区分时先调用 [`get_mode`](Self::get_mode)。
    pub fn get_motor_speed(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<i16, DriverError> {
        let response = self.query(id, ServoCommand::ModeRead, 4, timeout)?;
        if response.param(0) != 1 {
            return Ok(0);
        }
        Ok(decode_speed(response.word_at(2)))
    }

    // ------------------------------------------------------------------
    // 工作模式
    // ------------------------------------------------------------------

    /// 切换到位置伺服模式
    ///
    /// 与 [`set_motor_mode`](Self::set_motor_mode) 是同一条写模式指令
    /// 的两种编码，由模式标志字节区分。
    pub fn set_servo_mode(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::ModeWrite, &[0, 0, 0, 0])
    }

    /// 切换到连续旋转电机模式并给定转速
    ///
    /// 转速钳位到 [-1000, 1000]，负值反转。
    pub fn set_motor_mode(&self, id: ServoId, speed: i32) -> Result<(), DriverError> {
        let speed = encode_speed(speed);
        self.command(
            id,
            ServoCommand::ModeWrite,
            &[1, 0, lower_byte(speed), higher_byte(speed)],
        )
    }

    // ------------------------------------------------------------------
    // 电机开关与 LED
    // ------------------------------------------------------------------

    /// 电机是否上力
    pub fn is_motor_on(&self, id: ServoId, timeout: Option<Duration>) -> Result<bool, DriverError> {
        let response = self.query(id, ServoCommand::LoadUnloadRead, 1, timeout)?;
        Ok(response.param(0) == 1)
    }

    pub fn motor_on(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::LoadUnloadWrite, &[1])
    }

    pub fn motor_off(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::LoadUnloadWrite, &[0])
    }

    /// LED 是否点亮（线上编码相反：0 为亮，1 为灭）
    pub fn is_led_on(&self, id: ServoId, timeout: Option<Duration>) -> Result<bool, DriverError> {
        let response = self.query(id, ServoCommand::LedCtrlRead, 1, timeout)?;
        Ok(response.param(0) == 0)
    }

    pub fn led_on(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::LedCtrlWrite, &[0])
    }

    pub fn led_off(&self, id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::LedCtrlWrite, &[1])
    }

    /// 读取 LED 报警掩码
    pub fn get_led_errors(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<LedErrors, DriverError> {
        let response = self.query(id, ServoCommand::LedErrorRead, 1, timeout)?;
        Ok(LedErrors::from_bits(response.param(0)))
    }

    /// 设置哪些故障会触发 LED 报警
    pub fn set_led_errors(&self, id: ServoId, errors: LedErrors) -> Result<(), DriverError> {
        self.command(id, ServoCommand::LedErrorWrite, &[errors.bits()])
    }

    // ------------------------------------------------------------------
    // 总线触觉传感器（与舵机共用帧格式）
    // ------------------------------------------------------------------

    /// 读取压力传感器数值
    pub fn get_sensor_pressure(
        &self,
        id: ServoId,
        timeout: Option<Duration>,
    ) -> Result<u16, DriverError> {
        let response = self.query(id, ServoCommand::SensorPressureRead, 2, timeout)?;
        Ok(response.word_at(0))
    }

    /// 读取传感器 ID（同样支持广播发现）
    pub fn get_sensor_id(&self, id: ServoId, timeout: Option<Duration>) -> Result<u8, DriverError> {
        let response = self.query(id, ServoCommand::SensorIdRead, 1, timeout)?;
        Ok(response.param(0))
    }

    /// 改写传感器 ID
    pub fn set_sensor_id(&self, id: ServoId, new_id: ServoId) -> Result<(), DriverError> {
        self.command(id, ServoCommand::SensorIdWrite, &[new_id.raw()])
    }

    /// 设置传感器 RGB 灯颜色
    pub fn set_sensor_led_rgb(
        &self,
        id: ServoId,
        red: u8,
        green: u8,
        blue: u8,
    ) -> Result<(), DriverError> {
        self.command(id, ServoCommand::SensorLedRgbWrite, &[red, green, blue])
    }

    /// 设置传感器灯效模式
    pub fn set_sensor_led_mode(&self, id: ServoId, led_mode: u8) -> Result<(), DriverError> {
        self.command(id, ServoCommand::SensorLedModeWrite, &[led_mode])
    }
}

//! 总线控制器协议
//!
//! 与单舵机协议不同的成帧与指令集：无校验和、帧头不带舵机 ID，
//! 成组指令把目标 ID 嵌在参数里，一帧同时指挥多台舵机。无校验和
//! 是固件协议固有的完整性缺口，为保持与真实硬件的线上兼容原样
//! 保留。
//!
//! 每次发送前先丢弃接收缓冲里的陈旧字节，避免上一轮的残留数据
//! 污染本轮应答扫描。

use crate::controller::{DEFAULT_TIMEOUT, log_discard};
use crate::error::DriverError;
use lx16a_protocol::{
    BusCommand, BusFrame, BusResponseDecoder, ServoId, Step, clamp_bus_position, clamp_time_ms,
    codec, higher_byte, lower_byte,
};
use lx16a_serial::{Deadline, DeadlineReader, SerialAdapter, SerialError};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{trace, warn};

/// 总线（多舵机）控制器
///
/// 独占一条到总线控制板的连接；全部访问经由内部互斥锁串行化。
pub struct BusController<A: SerialAdapter> {
    port: Mutex<A>,
    timeout: Duration,
}

impl<A: SerialAdapter> BusController<A> {
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

    fn command(&self, command: BusCommand, params: &[u8]) -> Result<(), DriverError> {
        let frame = codec::encode_bus(command, params);
        let mut port = self.port.lock();
        port.clear_input()?;
        trace!("Sending bus frame: {:02x?}", &frame[..]);
        port.write(&frame)?;
        Ok(())
    }

    fn query(
        &self,
        command: BusCommand,
        params: &[u8],
        timeout: Option<Duration>,
    ) -> Result<BusFrame, DriverError> {
        let frame = codec::encode_bus(command, params);
        let deadline = Deadline::after(timeout.unwrap_or(self.timeout));

        let mut port = self.port.lock();
        port.clear_input()?;
        trace!("Sending bus query: {:02x?}", &frame[..]);
        port.write(&frame)?;

        let mut decoder = BusResponseDecoder::new(command);
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
                        "Received bus response: command={} params={:02x?}",
                        response.command,
                        &response.params[..]
                    );
                    return Ok(response);
                },
            }
        }
    }

    /// 指挥一组舵机在同一时间窗内各自转到目标位置
    ///
    /// 一帧完成整组动作。位置钳位到 [0, 10000]，时间钳位到
    /// [0, 30000] 毫秒。
    pub fn move_servos(
        &self,
        positions: &[(ServoId, i32)],
        time_ms: i32,
    ) -> Result<(), DriverError> {
        let time = clamp_time_ms(time_ms);
        let mut params = Vec::with_capacity(3 + positions.len() * 3);
        params.push(positions.len() as u8);
        params.push(lower_byte(time));
        params.push(higher_byte(time));
        for &(id, position) in positions {
            let position = clamp_bus_position(position);
            params.push(id.raw());
            params.push(lower_byte(position));
            params.push(higher_byte(position));
        }
        self.command(BusCommand::ServoMove, &params)
    }

    /// 一次查询读取一组舵机的当前位置
    ///
    /// 应答为计数前缀的 (id, position) 列表，按计数解析。应答里
    /// 偶发的非法 ID 字节按畸形数据跳过，不构成错误。
    pub fn get_positions(
        &self,
        ids: &[ServoId],
        timeout: Option<Duration>,
    ) -> Result<Vec<(ServoId, u16)>, DriverError> {
        let mut params = Vec::with_capacity(1 + ids.len());
        params.push(ids.len() as u8);
        params.extend(ids.iter().map(|id| id.raw()));

        let response = self.query(BusCommand::MultServoPosRead, &params, timeout)?;
        let count = response.param(0) as usize;
        let mut positions = Vec::with_capacity(count);
        for i in 0..count {
            let id_byte = response.param(1 + 3 * i);
            match ServoId::new(id_byte) {
                Ok(id) => positions.push((id, response.word_at(2 + 3 * i))),
                Err(_) => {
                    warn!("Skipping position entry with invalid servo id {}", id_byte);
                },
            }
        }
        Ok(positions)
    }

    /// 关闭一组舵机的电机（掉力）
    pub fn unload(&self, ids: &[ServoId]) -> Result<(), DriverError> {
        let mut params = Vec::with_capacity(1 + ids.len());
        params.push(ids.len() as u8);
        params.extend(ids.iter().map(|id| id.raw()));
        self.command(BusCommand::MultServoUnload, &params)
    }

    /// 读取控制板供电电压（毫伏）
    pub fn get_battery_voltage(&self, timeout: Option<Duration>) -> Result<u16, DriverError> {
        let response = self.query(BusCommand::GetBatteryVoltage, &[], timeout)?;
        Ok(response.word_at(0))
    }

    // ------------------------------------------------------------------
    // 控制板内置动作组
    // ------------------------------------------------------------------

    /// 运行控制板上预存的动作组，`repetitions` 为 0 表示循环运行
    pub fn run_action_group(&self, group: u8, repetitions: u16) -> Result<(), DriverError> {
        self.command(
            BusCommand::ActionGroupRun,
            &[group, lower_byte(repetitions), higher_byte(repetitions)],
        )
    }

    /// 停止当前运行的动作组
    pub fn stop_action_group(&self) -> Result<(), DriverError> {
        self.command(BusCommand::ActionStop, &[])
    }

    /// 调整动作组运行速度（百分比）
    pub fn set_action_group_speed(&self, group: u8, percent: u16) -> Result<(), DriverError> {
        self.command(
            BusCommand::ActionSpeed,
            &[group, lower_byte(percent), higher_byte(percent)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx16a_protocol::codec::encode_bus;
    use lx16a_serial::MockSerialAdapter;

    const TEST_TIMEOUT: Duration = Duration::from_millis(200);

    fn servo_id(id: u8) -> ServoId {
        ServoId::new(id).unwrap()
    }

    fn bus_with(adapter: &MockSerialAdapter) -> BusController<MockSerialAdapter> {
        BusController::with_timeout(adapter.clone(), TEST_TIMEOUT)
    }

    #[test]
    fn test_group_move_payload_layout() {
        let adapter = MockSerialAdapter::new();
        let bus = bus_with(&adapter);

        bus.move_servos(&[(servo_id(1), 1000), (servo_id(3), 20000)], 500)
            .unwrap();
        let frame = adapter.last_write().unwrap();
        // 0x55 0x55 len cmd count time_lo time_hi (id lo hi)*
        assert_eq!(frame[3], u8::from(BusCommand::ServoMove));
        assert_eq!(
            &frame[4..],
            &[2, 0xF4, 0x01, 1, 0xE8, 0x03, 3, 0x10, 0x27] // 20000 → 10000 (0x2710)
        );
    }

    #[test]
    fn test_get_positions_parses_count_prefixed_triples() {
        let mut adapter = MockSerialAdapter::new();
        // 查询前控制器会清接收缓冲：应答走脚本通道而不是即时缓冲
        adapter.push_read_after(
            Duration::ZERO,
            &encode_bus(BusCommand::MultServoPosRead, &[2, 1, 0xE8, 0x03, 3, 0x2C, 0x01]),
        );
        let bus = bus_with(&adapter);

        let positions = bus.get_positions(&[servo_id(1), servo_id(3)], None).unwrap();
        assert_eq!(positions, vec![(servo_id(1), 1000), (servo_id(3), 300)]);
        // 查询参数为计数 + ID 列表
        let query = adapter.writes()[0].clone();
        assert_eq!(&query[4..], &[2, 1, 3]);
    }

    /// 电池电压应答 `[0x2C, 0x01]` → 300 毫伏
    #[test]
    fn test_battery_voltage() {
        let mut adapter = MockSerialAdapter::new();
        adapter.push_read_after(
            Duration::ZERO,
            &encode_bus(BusCommand::GetBatteryVoltage, &[0x2C, 0x01]),
        );
        let bus = bus_with(&adapter);

        assert_eq!(bus.get_battery_voltage(None).unwrap(), 300);
    }

    #[test]
    fn test_unload_is_fire_and_forget() {
        let adapter = MockSerialAdapter::new();
        let bus = bus_with(&adapter);

        bus.unload(&[servo_id(1), servo_id(2), servo_id(6)]).unwrap();
        let frame = adapter.last_write().unwrap();
        assert_eq!(frame[3], u8::from(BusCommand::MultServoUnload));
        assert_eq!(&frame[4..], &[3, 1, 2, 6]);
    }

    /// 发送前丢弃接收缓冲里的陈旧字节
    #[test]
    fn test_stale_input_cleared_before_send() {
        let mut adapter = MockSerialAdapter::new();
        // 残留的陈旧垃圾；随后才是本轮应答
        adapter.push_read(&[0x55, 0x55, 0x03, 0x0F, 0xAA]);
        let bus = bus_with(&adapter);

        // clear_input 把陈旧字节清掉之后，超时是唯一可能的结局
        assert!(matches!(
            bus.get_battery_voltage(None),
            Err(DriverError::Timeout)
        ));
    }

    #[test]
    fn test_action_group_commands() {
        let adapter = MockSerialAdapter::new();
        let bus = bus_with(&adapter);

        bus.run_action_group(2, 3).unwrap();
        assert_eq!(&adapter.last_write().unwrap()[3..], &[6, 2, 3, 0]);
        bus.set_action_group_speed(2, 200).unwrap();
        assert_eq!(&adapter.last_write().unwrap()[3..], &[11, 2, 200, 0]);
        bus.stop_action_group().unwrap();
        assert_eq!(&adapter.last_write().unwrap()[3..], &[7]);
    }

    #[test]
    fn test_timeout_when_bus_is_silent() {
        let adapter = MockSerialAdapter::new();
        let bus = BusController::with_timeout(adapter, Duration::from_millis(40));
        assert!(matches!(
            bus.get_battery_voltage(None),
            Err(DriverError::Timeout)
        ));
    }
}

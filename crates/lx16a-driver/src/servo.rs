//! 绑定身份的舵机句柄
//!
//! 持有一个舵机 ID 和控制器引用，把单舵机操作逐一显式转发，调用方
//! 不必每次重复 ID。句柄自身无状态、不缓存，也不额外加锁：它只
//! 经由控制器的公开入口重新进入同一把锁。

use crate::controller::ServoController;
use crate::error::DriverError;
use lx16a_protocol::{LedErrors, ServoId, ServoMode};
use lx16a_serial::SerialAdapter;
use std::time::Duration;

/// 单台舵机的操作句柄
///
/// 由 [`ServoController::servo`] 构造。操作集合与控制器一一对应，
/// 身份参数由句柄代填。
pub struct Servo<'a, A: SerialAdapter> {
    controller: &'a ServoController<A>,
    id: ServoId,
}

// 手写 Clone/Copy：句柄只持有引用，无需 A 本身可复制
impl<A: SerialAdapter> Clone for Servo<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: SerialAdapter> Copy for Servo<'_, A> {}

impl<'a, A: SerialAdapter> Servo<'a, A> {
    pub(crate) fn new(controller: &'a ServoController<A>, id: ServoId) -> Self {
        Self { controller, id }
    }

    /// 句柄绑定的舵机 ID
    pub fn id(&self) -> ServoId {
        self.id
    }

    pub fn get_id(&self, timeout: Option<Duration>) -> Result<u8, DriverError> {
        self.controller.get_id(self.id, timeout)
    }

    pub fn set_id(&self, new_id: ServoId) -> Result<(), DriverError> {
        self.controller.set_id(self.id, new_id)
    }

    pub fn move_to(&self, position: i32, time_ms: i32) -> Result<(), DriverError> {
        self.controller.move_to(self.id, position, time_ms)
    }

    pub fn prepare_move(&self, position: i32, time_ms: i32) -> Result<(), DriverError> {
        self.controller.prepare_move(self.id, position, time_ms)
    }

    pub fn get_prepared_move(&self, timeout: Option<Duration>) -> Result<(u16, u16), DriverError> {
        self.controller.get_prepared_move(self.id, timeout)
    }

    pub fn start_move(&self) -> Result<(), DriverError> {
        self.controller.start_move(self.id)
    }

    pub fn stop_move(&self) -> Result<(), DriverError> {
        self.controller.stop_move(self.id)
    }

    pub fn get_position_offset(&self, timeout: Option<Duration>) -> Result<i16, DriverError> {
        self.controller.get_position_offset(self.id, timeout)
    }

    pub fn set_position_offset(&self, offset: i32) -> Result<(), DriverError> {
        self.controller.set_position_offset(self.id, offset)
    }

    pub fn save_position_offset(&self) -> Result<(), DriverError> {
        self.controller.save_position_offset(self.id)
    }

    pub fn get_position_limits(&self, timeout: Option<Duration>) -> Result<(u16, u16), DriverError> {
        self.controller.get_position_limits(self.id, timeout)
    }

    pub fn set_position_limits(&self, min: i32, max: i32) -> Result<(), DriverError> {
        self.controller.set_position_limits(self.id, min, max)
    }

    pub fn get_voltage_limits(&self, timeout: Option<Duration>) -> Result<(u16, u16), DriverError> {
        self.controller.get_voltage_limits(self.id, timeout)
    }

    pub fn set_voltage_limits(&self, min_mv: i32, max_mv: i32) -> Result<(), DriverError> {
        self.controller.set_voltage_limits(self.id, min_mv, max_mv)
    }

    pub fn get_max_temperature_limit(&self, timeout: Option<Duration>) -> Result<u8, DriverError> {
        self.controller.get_max_temperature_limit(self.id, timeout)
    }

    pub fn set_max_temperature_limit(&self, max_temperature: i32) -> Result<(), DriverError> {
        self.controller.set_max_temperature_limit(self.id, max_temperature)
    }

    pub fn get_temperature(&self, timeout: Option<Duration>) -> Result<u8, DriverError> {
        self.controller.get_temperature(self.id, timeout)
    }

    pub fn get_voltage(&self, timeout: Option<Duration>) -> Result<u16, DriverError> {
        self.controller.get_voltage(self.id, timeout)
    }

    pub fn get_position(&self, timeout: Option<Duration>) -> Result<i16, DriverError> {
        self.controller.get_position(self.id, timeout)
    }

    pub fn get_mode(&self, timeout: Option<Duration>) -> Result<ServoMode, DriverError> {
        self.controller.get_mode(self.id, timeout)
    }

    pub fn get_motor_speed(&self, timeout: Option<Duration>) -> Result<i16, DriverError> {
        self.controller.get_motor_speed(self.id, timeout)
    }

    pub fn set_servo_mode(&self) -> Result<(), DriverError> {
        self.controller.set_servo_mode(self.id)
    }

    pub fn set_motor_mode(&self, speed: i32) -> Result<(), DriverError> {
        self.controller.set_motor_mode(self.id, speed)
    }

    pub fn is_motor_on(&self, timeout: Option<Duration>) -> Result<bool, DriverError> {
        self.controller.is_motor_on(self.id, timeout)
    }

    pub fn motor_on(&self) -> Result<(), DriverError> {
        self.controller.motor_on(self.id)
    }

    pub fn motor_off(&self) -> Result<(), DriverError> {
        self.controller.motor_off(self.id)
    }

    pub fn is_led_on(&self, timeout: Option<Duration>) -> Result<bool, DriverError> {
        self.controller.is_led_on(self.id, timeout)
    }

    pub fn led_on(&self) -> Result<(), DriverError> {
        self.controller.led_on(self.id)
    }

    pub fn led_off(&self) -> Result<(), DriverError> {
        self.controller.led_off(self.id)
    }

    pub fn get_led_errors(&self, timeout: Option<Duration>) -> Result<LedErrors, DriverError> {
        self.controller.get_led_errors(self.id, timeout)
    }

    pub fn set_led_errors(&self, errors: LedErrors) -> Result<(), DriverError> {
        self.controller.set_led_errors(self.id, errors)
    }

    pub fn get_sensor_pressure(&self, timeout: Option<Duration>) -> Result<u16, DriverError> {
        self.controller.get_sensor_pressure(self.id, timeout)
    }

    pub fn get_sensor_id(&self, timeout: Option<Duration>) -> Result<u8, DriverError> {
        self.controller.get_sensor_id(self.id, timeout)
    }

    pub fn set_sensor_id(&self, new_id: ServoId) -> Result<(), DriverError> {
        self.controller.set_sensor_id(self.id, new_id)
    }

    pub fn set_sensor_led_rgb(&self, red: u8, green: u8, blue: u8) -> Result<(), DriverError> {
        self.controller.set_sensor_led_rgb(self.id, red, green, blue)
    }

    pub fn set_sensor_led_mode(&self, led_mode: u8) -> Result<(), DriverError> {
        self.controller.set_sensor_led_mode(self.id, led_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lx16a_protocol::{ServoCommand, codec::encode};
    use lx16a_serial::MockSerialAdapter;

    fn servo_id(id: u8) -> ServoId {
        ServoId::new(id).unwrap()
    }

    /// 句柄转发时代填身份参数
    #[test]
    fn test_handle_fills_in_identity() {
        let mut adapter = MockSerialAdapter::new();
        adapter.push_read(&encode(servo_id(6), ServoCommand::TempRead, &[42]));
        let controller =
            ServoController::with_timeout(adapter.clone(), Duration::from_millis(200));
        let servo = controller.servo(servo_id(6));

        assert_eq!(servo.id().raw(), 6);
        assert_eq!(servo.get_temperature(None).unwrap(), 42);

        servo.move_to(500, 1000).unwrap();
        let frame = adapter.last_write().unwrap();
        assert_eq!(frame[2], 6, "handle must address its bound servo");
    }

    /// 同一控制器可同时存在多个句柄
    #[test]
    fn test_multiple_handles_share_one_controller() {
        let adapter = MockSerialAdapter::new();
        let controller =
            ServoController::with_timeout(adapter.clone(), Duration::from_millis(200));
        let left = controller.servo(servo_id(1));
        let right = controller.servo(servo_id(2));

        left.led_on().unwrap();
        assert_eq!(adapter.last_write().unwrap()[2], 1);
        right.led_off().unwrap();
        assert_eq!(adapter.last_write().unwrap()[2], 2);
    }
}

//! 单舵机巡检示例
//!
//! 用法：`cargo run --example servo_demo -- /dev/ttyUSB0 1`
//!
//! 点亮 LED、读取一圈遥测，然后往返摆动一次。

use lx16a_sdk::prelude::*;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    lx16a_sdk::init_logging();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let id: u8 = args.next().unwrap_or_else(|| "1".to_string()).parse()?;

    let adapter = SerialPortAdapter::open(&path)?;
    let controller = ServoController::new(adapter);
    let servo = controller.servo(ServoId::new(id)?);

    servo.led_on()?;

    println!("servo {}", servo.id());
    println!("  position:    {}", servo.get_position(None)?);
    println!("  temperature: {}°C", servo.get_temperature(None)?);
    println!("  voltage:     {} mV", servo.get_voltage(None)?);
    println!("  mode:        {:?}", servo.get_mode(None)?);
    println!("  limits:      {:?}", servo.get_position_limits(None)?);
    println!("  offset:      {}", servo.get_position_offset(None)?);

    servo.move_to(300, 800)?;
    std::thread::sleep(Duration::from_millis(900));
    servo.move_to(700, 800)?;
    std::thread::sleep(Duration::from_millis(900));
    servo.move_to(500, 500)?;

    Ok(())
}

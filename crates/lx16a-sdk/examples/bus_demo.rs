//! 总线控制器示例
//!
//! 用法：`cargo run --example bus_demo -- /dev/ttyUSB0`
//!
//! 读取电池电压与三台舵机的位置，然后成组回中。

use lx16a_sdk::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    lx16a_sdk::init_logging();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let adapter = SerialPortAdapter::open(&path)?;
    let bus = BusController::new(adapter);

    println!("battery: {} mV", bus.get_battery_voltage(None)?);

    let ids = [ServoId::new(1)?, ServoId::new(2)?, ServoId::new(3)?];
    for (id, position) in bus.get_positions(&ids, None)? {
        println!("servo {}: {}", id, position);
    }

    // 一帧之内让整组舵机同时回中
    bus.move_servos(&[(ids[0], 500), (ids[1], 500), (ids[2], 500)], 1000)?;

    Ok(())
}

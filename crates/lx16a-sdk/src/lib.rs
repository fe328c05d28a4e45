//! # LX-16A SDK
//!
//! LewanSoul LX-16A 总线舵机的统一入口 crate，按层重新导出：
//!
//! - [`protocol`]: 帧编码/解码与数值编码（无硬件依赖）
//! - [`serial`]: 串口适配层与截止时间读取
//! - [`driver`]: 单舵机/总线控制器与舵机句柄
//!
//! ## 快速上手
//!
//! ```no_run
//! use lx16a_sdk::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! lx16a_sdk::init_logging();
//!
//! let adapter = SerialPortAdapter::open("/dev/ttyUSB0")?;
//! let controller = ServoController::new(adapter);
//! let servo = controller.servo(ServoId::new(1)?);
//!
//! servo.led_on()?;
//! servo.move_to(500, 1000)?;
//! # Ok(())
//! # }
//! ```

pub use lx16a_driver as driver;
pub use lx16a_protocol as protocol;
pub use lx16a_serial as serial;

/// 常用类型一揽子导入
pub mod prelude {
    pub use lx16a_driver::{BusController, DriverError, Servo, ServoController};
    pub use lx16a_protocol::{LedErrors, ServoId, ServoMode};
    pub use lx16a_serial::{SerialAdapter, SerialError};

    #[cfg(feature = "serialport-backend")]
    pub use lx16a_serial::SerialPortAdapter;
}

/// 初始化诊断日志
///
/// 把 `log` 生态的记录桥接进 `tracing`，并挂上按 `RUST_LOG`
/// 过滤的订阅器（缺省 `info`）。重复调用是无害的空操作，因此
/// 示例与测试里可以无条件调用。
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

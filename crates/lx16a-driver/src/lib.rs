//! # LX-16A Driver
//!
//! LewanSoul LX-16A 总线舵机的同步请求/应答驱动。
//!
//! 三个对外类型：
//!
//! - [`ServoController`]: 单舵机协议（按 ID 寻址、带校验和），完整
//!   指令集：运动、限制参数、工作模式、LED、报警
//! - [`BusController`]: 总线控制器协议（无校验和、成组寻址）
//! - [`Servo`]: 绑定单个 ID 的操作句柄
//!
//! ## 调度模型
//!
//! 同步阻塞 IO。每个控制器实例独占一条连接，内部互斥锁把
//! "发送指令 → 等待匹配应答"整体串行化，可从多线程安全调用。
//! 查询唯一的提前终止方式是截止时间到期（[`DriverError::Timeout`]），
//! 不支持中途取消。超时后是否重试由调用方决定，驱动不内置重试。
//!
//! ## 示例
//!
//! ```no_run
//! use lx16a_driver::ServoController;
//! use lx16a_protocol::ServoId;
//! use lx16a_serial::SerialPortAdapter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = SerialPortAdapter::open("/dev/ttyUSB0")?;
//! let controller = ServoController::new(adapter);
//!
//! let servo = controller.servo(ServoId::new(1)?);
//! servo.move_to(500, 1000)?;
//! println!("temperature: {}°C", servo.get_temperature(None)?);
//! # Ok(())
//! # }
//! ```

mod bus;
mod controller;
mod error;
mod servo;

pub use bus::BusController;
pub use controller::{DEFAULT_TIMEOUT, ServoController};
pub use error::DriverError;
pub use servo::Servo;

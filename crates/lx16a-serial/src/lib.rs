//! # LX-16A Serial Adapter Layer
//!
//! 串口硬件抽象层，提供统一的字节流传输接口。
//!
//! 传输端只需满足三个能力：整帧写入、允许短读的读取（超时内无数据
//! 返回 0 字节）、可按次设置的读超时。[`DeadlineReader`] 在此之上
//! 实现整个查询共享的截止时间预算。
//!
//! 端口设备的发现与管理不在本层职责内：调用方给出已知的设备路径。

use std::time::Duration;
use thiserror::Error;

mod deadline;
pub use deadline::{Deadline, DeadlineReader};

#[cfg(feature = "serialport-backend")]
mod port;
#[cfg(feature = "serialport-backend")]
pub use port::SerialPortAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockSerialAdapter;

/// LX-16A 总线的固定波特率
pub const BAUD_RATE: u32 = 115_200;

/// 传输层统一错误类型
///
/// 连接级故障（断开、IO 失败）原样向上传播；[`SerialError::Timeout`]
/// 表示截止时间内未凑齐请求的字节数。
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
}

/// 串口适配器统一接口
///
/// 实现方约定：
/// - `read` 允许短读；当前读超时内没有任何数据时返回 `Ok(0)`，
///   而不是错误
/// - `set_read_timeout` 只影响后续的 `read` 调用
/// - `write` 在整帧写完（含内部缓冲刷出）后才返回
pub trait SerialAdapter: Send {
    /// 写入完整字节序列
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 读取至多 `buf.len()` 字节，返回实际读取数
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// 设置后续 `read` 调用的超时
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError>;

    /// 丢弃接收缓冲中尚未读取的字节
    fn clear_input(&mut self) -> Result<(), SerialError>;
}

//! serialport crate 后端
//!
//! 打开一个已知路径的串口设备并以 [`SerialAdapter`](crate::SerialAdapter)
//! 暴露。端口枚举、权限配置等由系统与调用方负责，本层只消费路径。

use crate::{BAUD_RATE, SerialAdapter, SerialError};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::trace;

/// serialport 后端适配器
///
/// 固定 8N1、115200 波特率（LX-16A 总线的固件约定）。底层读超时
/// 由 [`DeadlineReader`](crate::DeadlineReader) 在每次部分读取前重设。
///
/// # 示例
///
/// ```no_run
/// use lx16a_serial::SerialPortAdapter;
///
/// let adapter = SerialPortAdapter::open("/dev/ttyUSB0").unwrap();
/// ```
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
}

impl SerialPortAdapter {
    /// 以总线默认波特率打开串口
    pub fn open(path: &str) -> Result<Self, SerialError> {
        Self::open_with_baud_rate(path, BAUD_RATE)
    }

    /// 以指定波特率打开串口
    ///
    /// # 错误
    /// - `SerialError::Io`: 设备不存在、权限不足或占用中
    pub fn open_with_baud_rate(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| SerialError::Io(e.into()))?;
        trace!("Opened serial port '{}' at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // 底层超时统一表现为 0 字节短读，截止时间判定在上层
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            },
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| SerialError::Io(e.into()))?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| SerialError::Io(e.into()))?;
        Ok(())
    }
}

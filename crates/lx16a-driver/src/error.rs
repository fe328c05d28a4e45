//! 驱动层错误类型定义

use lx16a_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 核心自身只产生 [`DriverError::Timeout`]：截止时间内没有等到
/// 合法且匹配的应答帧。线路上的畸形字节不是错误（重同步静默丢弃），
/// 传输层的连接故障原样向上传播。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 截止时间内未收到匹配应答
    #[error("No matching response before deadline")]
    Timeout,

    /// 传输层错误（连接断开、IO 故障）
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),
}

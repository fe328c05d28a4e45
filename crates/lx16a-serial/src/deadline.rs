//! 截止时间预算
//!
//! 一次查询在发出指令时计算一个绝对截止时刻，之后重同步循环里的
//! 每一次部分读取都消耗同一份预算：干扰字节不会获得新的超时。
//! 足够嘈杂的总线会在单次读取都成功的情况下耗尽整个预算。

use crate::{SerialAdapter, SerialError};
use std::time::{Duration, Instant};

/// 绝对截止时刻
///
/// 每次查询开始时由超时预算计算一次，之后只会缩水。
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    /// 从现在起 `budget` 之后到期
    pub fn after(budget: Duration) -> Self {
        Deadline(Instant::now() + budget)
    }

    /// 剩余预算，到期后为零
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// 是否已到期
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// 共享截止时间的精确读取器
///
/// 包装一个串口适配器；每次部分读取前都把适配器的读超时重设为
/// 剩余预算，预算耗尽即失败。
pub struct DeadlineReader<'a, A: SerialAdapter> {
    adapter: &'a mut A,
    deadline: Deadline,
}

impl<'a, A: SerialAdapter> DeadlineReader<'a, A> {
    pub fn new(adapter: &'a mut A, deadline: Deadline) -> Self {
        Self { adapter, deadline }
    }

    /// 在截止时间内读满 `buf`
    ///
    /// # 错误
    /// - `SerialError::Timeout`: 预算耗尽前未凑齐 `buf.len()` 字节
    /// - 其余传输层错误原样传播
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = self.deadline.remaining();
            if remaining.is_zero() {
                return Err(SerialError::Timeout);
            }
            self.adapter.set_read_timeout(remaining)?;
            // 短读（包括 0 字节）不是错误：回到循环头重新计算预算
            filled += self.adapter.read(&mut buf[filled..])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSerialAdapter;

    #[test]
    fn test_deadline_shrinks() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let first = deadline.remaining();
        std::thread::sleep(Duration::from_millis(10));
        let second = deadline.remaining();
        assert!(second < first);
        assert!(!deadline.expired());
        std::thread::sleep(Duration::from_millis(45));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    /// 分多次到达的字节共享同一份预算
    #[test]
    fn test_read_exact_across_partial_reads() {
        let mut adapter = MockSerialAdapter::new();
        adapter.push_read_after(Duration::from_millis(5), &[1, 2, 3]);
        adapter.push_read_after(Duration::from_millis(5), &[4, 5, 6]);

        let mut buf = [0u8; 6];
        let mut reader =
            DeadlineReader::new(&mut adapter, Deadline::after(Duration::from_millis(200)));
        reader.read_exact(&mut buf).expect("both chunks in budget");
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    /// 第二块数据迟于截止时间：单次读取成功也救不回预算
    #[test]
    fn test_read_exact_budget_is_shared() {
        let mut adapter = MockSerialAdapter::new();
        adapter.push_read_after(Duration::from_millis(10), &[1, 2, 3]);
        adapter.push_read_after(Duration::from_millis(60), &[4, 5, 6]);

        let mut buf = [0u8; 6];
        let mut reader =
            DeadlineReader::new(&mut adapter, Deadline::after(Duration::from_millis(40)));
        match reader.read_exact(&mut buf) {
            Err(SerialError::Timeout) => {},
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// 超时绝不提前：空闲线路上 100ms 的预算至少等满 100ms
    #[test]
    fn test_timeout_never_fires_early() {
        let mut adapter = MockSerialAdapter::new();
        let start = Instant::now();
        let mut buf = [0u8; 1];
        let mut reader =
            DeadlineReader::new(&mut adapter, Deadline::after(Duration::from_millis(100)));
        match reader.read_exact(&mut buf) {
            Err(SerialError::Timeout) => {},
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}

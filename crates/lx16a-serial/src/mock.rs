//! Mock 串口适配器
//!
//! 无硬件依赖的脚本化适配器：预先排入应答字节流（可带到达延迟），
//! 记录全部写出的帧。克隆句柄共享同一份内部状态，测试侧保留一个
//! 克隆即可在控制器消费适配器之后继续检查写出内容。

use crate::{SerialAdapter, SerialError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

struct ScriptedRead {
    /// 数据"到达"前需要等待的时间
    delay: Duration,
    bytes: Vec<u8>,
}

struct MockState {
    /// 立即可读的字节
    pending: VecDeque<u8>,
    /// 尚未到达的脚本条目
    script: VecDeque<ScriptedRead>,
    /// 记录的全部写入
    writes: Vec<Vec<u8>>,
    read_timeout: Duration,
}

/// 脚本化串口适配器
#[derive(Clone)]
pub struct MockSerialAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                pending: VecDeque::new(),
                script: VecDeque::new(),
                writes: Vec::new(),
                read_timeout: Duration::from_secs(1),
            })),
        }
    }

    /// 排入立即可读的字节
    pub fn push_read(&mut self, bytes: &[u8]) {
        self.state.lock().pending.extend(bytes.iter().copied());
    }

    /// 排入 `delay` 之后才到达的字节
    pub fn push_read_after(&mut self, delay: Duration, bytes: &[u8]) {
        self.state.lock().script.push_back(ScriptedRead {
            delay,
            bytes: bytes.to_vec(),
        });
    }

    /// 到目前为止写出的帧（按 `write` 调用分组）
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// 最后一次写出的帧
    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.state.lock().writes.last().cloned()
    }
}

impl Default for MockSerialAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.state.lock().writes.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if buf.is_empty() {
            return Ok(0);
        }

        // 先消费立即可读的字节
        {
            let mut state = self.state.lock();
            if !state.pending.is_empty() {
                let mut n = 0;
                while n < buf.len() {
                    match state.pending.pop_front() {
                        Some(b) => {
                            buf[n] = b;
                            n += 1;
                        },
                        None => break,
                    }
                }
                return Ok(n);
            }
        }

        // 模拟等待下一个脚本条目到达；延迟超过读超时则照真实串口
        // 一样等满超时并返回 0 字节
        let wait = {
            let mut state = self.state.lock();
            let timeout = state.read_timeout;
            match state.script.front_mut() {
                Some(entry) if entry.delay > timeout => {
                    entry.delay -= timeout;
                    Wait::Timeout(timeout)
                },
                Some(entry) => {
                    let delay = entry.delay;
                    entry.delay = Duration::ZERO;
                    Wait::Arrives(delay)
                },
                None => Wait::Timeout(timeout),
            }
        };

        match wait {
            Wait::Timeout(timeout) => {
                std::thread::sleep(timeout);
                Ok(0)
            },
            Wait::Arrives(delay) => {
                std::thread::sleep(delay);
                let mut state = self.state.lock();
                if let Some(entry) = state.script.pop_front() {
                    state.pending.extend(entry.bytes);
                }
                drop(state);
                self.read(buf)
            },
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        self.state.lock().read_timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.state.lock().pending.clear();
        Ok(())
    }
}

enum Wait {
    /// 等满读超时，无数据
    Timeout(Duration),
    /// 等待到达延迟后供给数据
    Arrives(Duration),
}

//! 帧编码/解码
//!
//! 解码器是逐字节推进的状态机：半双工共享总线上可能出现主机自身
//! 发送的回波、残缺帧、无关设备的应答或纯粹的干扰字节，因此任何
//! 校验失败都不是错误，而是丢弃当前候选帧并从下一个未消费字节
//! 继续扫描（重同步）。只有外层的截止时间能终止扫描。
//!
//! 编码为纯函数；参数取值的钳位由调用方在编码前完成。

use crate::{BusCommand, FRAME_HEADER, MAX_PARAMS, ServoCommand, ServoId, word};
use smallvec::SmallVec;

/// 单舵机协议完整帧缓冲（最长 10 字节，栈上分配）
pub type FrameBytes = SmallVec<[u8; 10]>;

/// 总线协议帧缓冲（多舵机指令可能溢出到堆上）
pub type BusFrameBytes = SmallVec<[u8; 16]>;

/// 单舵机协议校验和
///
/// `255 - ((id + length + command + Σparams) mod 256)`
pub fn checksum(id: u8, length: u8, command: u8, params: &[u8]) -> u8 {
    let sum = params
        .iter()
        .fold(id as u32 + length as u32 + command as u32, |acc, &b| {
            acc + b as u32
        });
    255 - (sum % 256) as u8
}

/// 编码单舵机指令帧
///
/// `0x55 0x55 <id> <3+K> <command> <params...> <checksum>`
pub fn encode(id: ServoId, command: ServoCommand, params: &[u8]) -> FrameBytes {
    debug_assert!(params.len() <= MAX_PARAMS, "servo frame carries at most 4 params");
    let length = 3 + params.len() as u8;
    let command = u8::from(command);
    let mut frame = FrameBytes::new();
    frame.push(FRAME_HEADER);
    frame.push(FRAME_HEADER);
    frame.push(id.raw());
    frame.push(length);
    frame.push(command);
    frame.extend_from_slice(params);
    frame.push(checksum(id.raw(), length, command, params));
    frame
}

/// 编码总线控制器指令帧
///
/// `0x55 0x55 <2+K> <command> <params...>`，无校验和、无 ID 字段。
/// 无校验和是固件协议本身的缺口，为保持线上兼容原样保留。
pub fn encode_bus(command: BusCommand, params: &[u8]) -> BusFrameBytes {
    let length = 2 + params.len() as u8;
    let mut frame = BusFrameBytes::new();
    frame.push(FRAME_HEADER);
    frame.push(FRAME_HEADER);
    frame.push(length);
    frame.push(u8::from(command));
    frame.extend_from_slice(params);
    frame
}

// ============================================================================
// 应答帧
// ============================================================================

/// 单舵机协议应答帧（已通过校验与匹配）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoFrame {
    pub id: u8,
    pub command: u8,
    pub params: SmallVec<[u8; 4]>,
}

impl ServoFrame {
    /// 第 `index` 个参数字节，缺失按 0 读取
    pub fn param(&self, index: usize) -> u8 {
        self.params.get(index).copied().unwrap_or(0)
    }

    /// 从 `index` 起的小端 16 位参数
    pub fn word_at(&self, index: usize) -> u16 {
        word(self.param(index), self.param(index + 1))
    }
}

/// 总线控制器协议应答帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFrame {
    pub command: u8,
    pub params: SmallVec<[u8; 32]>,
}

impl BusFrame {
    pub fn param(&self, index: usize) -> u8 {
        self.params.get(index).copied().unwrap_or(0)
    }

    pub fn word_at(&self, index: usize) -> u16 {
        word(self.param(index), self.param(index + 1))
    }
}

// ============================================================================
// 解码状态机
// ============================================================================

/// 候选帧被丢弃的原因（仅用于诊断日志，不构成错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// 同步序列之外的杂散字节
    SyncByte { byte: u8 },
    /// length 字节超出合法范围
    BadLength { length: u8 },
    /// 帧结构合法，但参数个数与所查询指令的应答布局不符
    /// （典型来源：半双工线路回读了主机自己的查询帧）
    ParamCountMismatch { expected: u8, actual: u8 },
    /// 校验和不匹配
    BadChecksum { expected: u8, actual: u8 },
    /// 应答指令码与查询不一致
    CommandMismatch { expected: u8, actual: u8 },
    /// 应答来自未寻址的舵机
    IdMismatch { expected: u8, actual: u8 },
}

/// 解码器单步推进结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<F> {
    /// 帧未完整，继续喂入字节
    Pending,
    /// 候选帧被丢弃，扫描已重置
    Discard(DiscardReason),
    /// 得到一个通过全部校验的匹配帧
    Frame(F),
}

enum State {
    Sync0,
    Sync1,
    Id,
    Length {
        id: u8,
    },
    Command {
        id: u8,
        length: u8,
    },
    Params {
        id: u8,
        length: u8,
        command: u8,
        params: SmallVec<[u8; 4]>,
    },
    Checksum {
        id: u8,
        length: u8,
        command: u8,
        params: SmallVec<[u8; 4]>,
    },
}

/// 单舵机协议应答解码器
///
/// 每次查询构造一个新实例；`feed` 逐字节推进。候选帧在完整读取后
/// 依次做校验和、指令码、舵机 ID 三项检查（与固件的应答顺序约定
/// 一致），任何一项失败都整帧丢弃并从下一字节重新扫描。广播查询
/// 不做 ID 匹配。
pub struct ResponseDecoder {
    expected_command: u8,
    expected_id: Option<u8>,
    expected_params: Option<u8>,
    state: State,
}

impl ResponseDecoder {
    pub fn new(command: ServoCommand, id: ServoId) -> Self {
        Self {
            expected_command: command.into(),
            expected_id: if id.is_broadcast() { None } else { Some(id.raw()) },
            expected_params: None,
            state: State::Sync0,
        }
    }

    /// 附加参数个数匹配
    ///
    /// 查询方知道每条指令的应答布局；与布局不符的帧（最典型的是
    /// 主机自己查询帧的回波，它的指令码、ID、校验和全部"正确"）
    /// 在 length 字节处即被丢弃，扫描继续。
    pub fn with_expected_params(command: ServoCommand, id: ServoId, count: usize) -> Self {
        let mut decoder = Self::new(command, id);
        decoder.expected_params = Some(count as u8);
        decoder
    }

    /// 喂入一个字节
    pub fn feed(&mut self, byte: u8) -> Step<ServoFrame> {
        use State::*;

        let (next, step) = match std::mem::replace(&mut self.state, Sync0) {
            Sync0 => {
                if byte == FRAME_HEADER {
                    (Sync1, Step::Pending)
                } else {
                    (Sync0, Step::Discard(DiscardReason::SyncByte { byte }))
                }
            },
            Sync1 => {
                if byte == FRAME_HEADER {
                    (Id, Step::Pending)
                } else {
                    (Sync0, Step::Discard(DiscardReason::SyncByte { byte }))
                }
            },
            Id => (Length { id: byte }, Step::Pending),
            Length { id } => {
                // length = 3 + 参数个数，参数最多 4 个
                if byte < 3 || byte > 3 + MAX_PARAMS as u8 {
                    (Sync0, Step::Discard(DiscardReason::BadLength { length: byte }))
                } else if let Some(expected) = self.expected_params.filter(|&n| n != byte - 3) {
                    (
                        Sync0,
                        Step::Discard(DiscardReason::ParamCountMismatch {
                            expected,
                            actual: byte - 3,
                        }),
                    )
                } else {
                    (Command { id, length: byte }, Step::Pending)
                }
            },
            Command { id, length } => {
                let command = byte;
                let params = SmallVec::new();
                if length == 3 {
                    (Checksum { id, length, command, params }, Step::Pending)
                } else {
                    (Params { id, length, command, params }, Step::Pending)
                }
            },
            Params {
                id,
                length,
                command,
                mut params,
            } => {
                params.push(byte);
                if params.len() == (length - 3) as usize {
                    (Checksum { id, length, command, params }, Step::Pending)
                } else {
                    (Params { id, length, command, params }, Step::Pending)
                }
            },
            Checksum {
                id,
                length,
                command,
                params,
            } => {
                let expected = checksum(id, length, command, &params);
                if byte != expected {
                    (
                        Sync0,
                        Step::Discard(DiscardReason::BadChecksum {
                            expected,
                            actual: byte,
                        }),
                    )
                } else if command != self.expected_command {
                    (
                        Sync0,
                        Step::Discard(DiscardReason::CommandMismatch {
                            expected: self.expected_command,
                            actual: command,
                        }),
                    )
                } else {
                    match self.expected_id {
                        Some(expected) if expected != id => (
                            Sync0,
                            Step::Discard(DiscardReason::IdMismatch {
                                expected,
                                actual: id,
                            }),
                        ),
                        _ => (Sync0, Step::Frame(ServoFrame { id, command, params })),
                    }
                }
            },
        };

        self.state = next;
        step
    }
}

enum BusState {
    Sync0,
    Sync1,
    Length,
    Command {
        length: u8,
    },
    Params {
        length: u8,
        command: u8,
        params: SmallVec<[u8; 32]>,
    },
}

/// 总线控制器协议应答解码器
///
/// 与单舵机解码器的区别：无校验和、无 ID 字段，`length = 2 + K`，
/// 参数长度不设上限（多舵机位置读取的应答按舵机数量增长）。
/// 指令码仍须与查询一致，否则整帧丢弃。
pub struct BusResponseDecoder {
    expected_command: u8,
    state: BusState,
}

impl BusResponseDecoder {
    pub fn new(command: BusCommand) -> Self {
        Self {
            expected_command: command.into(),
            state: BusState::Sync0,
        }
    }

    /// 喂入一个字节
    pub fn feed(&mut self, byte: u8) -> Step<BusFrame> {
        use BusState::*;

        let (next, step) = match std::mem::replace(&mut self.state, Sync0) {
            Sync0 => {
                if byte == FRAME_HEADER {
                    (Sync1, Step::Pending)
                } else {
                    (Sync0, Step::Discard(DiscardReason::SyncByte { byte }))
                }
            },
            Sync1 => {
                if byte == FRAME_HEADER {
                    (Length, Step::Pending)
                } else {
                    (Sync0, Step::Discard(DiscardReason::SyncByte { byte }))
                }
            },
            Length => {
                // length = 2 + 参数个数
                if byte < 2 {
                    (Sync0, Step::Discard(DiscardReason::BadLength { length: byte }))
                } else {
                    (Command { length: byte }, Step::Pending)
                }
            },
            Command { length } => {
                let command = byte;
                if length == 2 {
                    (Sync0, self.complete(command, SmallVec::new()))
                } else {
                    (
                        Params {
                            length,
                            command,
                            params: SmallVec::new(),
                        },
                        Step::Pending,
                    )
                }
            },
            Params {
                length,
                command,
                mut params,
            } => {
                params.push(byte);
                if params.len() == (length - 2) as usize {
                    (Sync0, self.complete(command, params))
                } else {
                    (Params { length, command, params }, Step::Pending)
                }
            },
        };

        self.state = next;
        step
    }

    fn complete(&self, command: u8, params: SmallVec<[u8; 32]>) -> Step<BusFrame> {
        if command != self.expected_command {
            Step::Discard(DiscardReason::CommandMismatch {
                expected: self.expected_command,
                actual: command,
            })
        } else {
            Step::Frame(BusFrame { command, params })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn servo_id(id: u8) -> ServoId {
        ServoId::new(id).unwrap()
    }

    /// 把一段字节流喂给解码器，返回得到的帧（若有）
    fn scan(decoder: &mut ResponseDecoder, bytes: &[u8]) -> Option<ServoFrame> {
        for &b in bytes {
            if let Step::Frame(frame) = decoder.feed(b) {
                return Some(frame);
            }
        }
        None
    }

    fn scan_bus(decoder: &mut BusResponseDecoder, bytes: &[u8]) -> Option<BusFrame> {
        for &b in bytes {
            if let Step::Frame(frame) = decoder.feed(b) {
                return Some(frame);
            }
        }
        None
    }

    /// LED 控制帧逐字节核对
    #[test]
    fn test_encode_led_on_frame() {
        let frame = encode(servo_id(1), ServoCommand::LedCtrlWrite, &[0]);
        assert_eq!(&frame[..], &[0x55, 0x55, 0x01, 0x04, 0x21, 0x00, 0xD9]);
        let frame = encode(servo_id(1), ServoCommand::LedCtrlRead, &[]);
        assert_eq!(&frame[..], &[0x55, 0x55, 0x01, 0x03, 0x22, 0xD9]);
    }

    /// 无参数、command=33、id=1 的帧：校验和 255 - (1+3+33) = 0xDA
    #[test]
    fn test_checksum_worked_example() {
        assert_eq!(checksum(1, 3, 33, &[]), 218);
        let mut frame = FrameBytes::new();
        frame.extend_from_slice(&[0x55, 0x55, 0x01, 0x03, 0x21, 0xDA]);
        let mut decoder = ResponseDecoder::new(ServoCommand::LedCtrlWrite, servo_id(1));
        let got = scan(&mut decoder, &frame).expect("frame should decode");
        assert_eq!(got.id, 1);
        assert_eq!(got.command, 33);
        assert!(got.params.is_empty());
    }

    #[test]
    fn test_encode_bus_battery_query() {
        let frame = encode_bus(BusCommand::GetBatteryVoltage, &[]);
        assert_eq!(&frame[..], &[0x55, 0x55, 0x02, 0x0F]);
    }

    #[test]
    fn test_decode_round_trip() {
        let params = [0x2C, 0x01, 0x88, 0x13];
        let bytes = encode(servo_id(7), ServoCommand::MoveTimeRead, &params);
        let mut decoder = ResponseDecoder::new(ServoCommand::MoveTimeRead, servo_id(7));
        let frame = scan(&mut decoder, &bytes).expect("frame should decode");
        assert_eq!(frame.id, 7);
        assert_eq!(frame.command, u8::from(ServoCommand::MoveTimeRead));
        assert_eq!(&frame.params[..], &params);
        assert_eq!(frame.word_at(0), 300);
        assert_eq!(frame.word_at(2), 5000);
    }

    /// 重同步：干扰字节与残缺同步头之后的合法帧仍被解出
    #[test]
    fn test_resync_through_garbage() {
        let mut stream = vec![0x01, 0xFF, 0x55, 0x33, 0x20];
        stream.extend_from_slice(&encode(servo_id(2), ServoCommand::PosRead, &[0xF4, 0x01]));
        let mut decoder = ResponseDecoder::new(ServoCommand::PosRead, servo_id(2));
        let frame = scan(&mut decoder, &stream).expect("frame should survive garbage");
        assert_eq!(frame.word_at(0), 500);
    }

    /// 半双工回波：主机自己的查询帧先被读回，随后才是舵机应答。
    /// 查询帧与应答帧指令码相同，靠 ID 匹配丢弃无关设备的应答。
    #[test]
    fn test_resync_skips_foreign_servo_response() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(servo_id(9), ServoCommand::TempRead, &[55]));
        stream.extend_from_slice(&encode(servo_id(3), ServoCommand::TempRead, &[48]));
        let mut decoder = ResponseDecoder::new(ServoCommand::TempRead, servo_id(3));
        let frame = scan(&mut decoder, &stream).expect("matching frame expected");
        assert_eq!(frame.id, 3);
        assert_eq!(frame.param(0), 48);
    }

    /// 查询帧回波与真实应答指令码、ID、校验和全部一致，靠参数个数区分
    #[test]
    fn test_param_count_match_skips_query_echo() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(servo_id(5), ServoCommand::PosRead, &[]));
        stream.extend_from_slice(&encode(servo_id(5), ServoCommand::PosRead, &[0xF4, 0x01]));
        let mut decoder =
            ResponseDecoder::with_expected_params(ServoCommand::PosRead, servo_id(5), 2);
        let mut saw_echo_discard = false;
        let mut got = None;
        for &b in &stream {
            match decoder.feed(b) {
                Step::Discard(DiscardReason::ParamCountMismatch { expected: 2, actual: 0 }) => {
                    saw_echo_discard = true;
                },
                Step::Frame(frame) => {
                    got = Some(frame);
                    break;
                },
                _ => {},
            }
        }
        assert!(saw_echo_discard, "echo should be rejected on length");
        assert_eq!(got.expect("real response decodes").word_at(0), 500);
    }

    /// 指令码不一致的完整帧被整帧丢弃
    #[test]
    fn test_command_mismatch_discards_whole_frame() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(servo_id(3), ServoCommand::VinRead, &[0x10, 0x27]));
        stream.extend_from_slice(&encode(servo_id(3), ServoCommand::TempRead, &[50]));
        let mut decoder = ResponseDecoder::new(ServoCommand::TempRead, servo_id(3));
        let mut discards = Vec::new();
        let mut got = None;
        for &b in &stream {
            match decoder.feed(b) {
                Step::Discard(reason) => discards.push(reason),
                Step::Frame(frame) => {
                    got = Some(frame);
                    break;
                },
                Step::Pending => {},
            }
        }
        assert_eq!(
            discards,
            vec![DiscardReason::CommandMismatch {
                expected: 26,
                actual: 27
            }]
        );
        assert_eq!(got.expect("second frame matches").param(0), 50);
    }

    /// 广播查询不做 ID 匹配（单设备发现路径）
    #[test]
    fn test_broadcast_query_accepts_any_id() {
        let bytes = encode(servo_id(11), ServoCommand::IdRead, &[11]);
        let mut decoder = ResponseDecoder::new(ServoCommand::IdRead, ServoId::BROADCAST);
        let frame = scan(&mut decoder, &bytes).expect("broadcast accepts any responder");
        assert_eq!(frame.id, 11);
        assert_eq!(frame.param(0), 11);
    }

    /// length 超过 7（参数多于 4 个）的候选帧被丢弃后仍能重同步
    #[test]
    fn test_bad_length_resync() {
        let mut stream = vec![0x55, 0x55, 0x01, 0x08, 0x1C];
        stream.extend_from_slice(&encode(servo_id(1), ServoCommand::PosRead, &[0x00, 0x00]));
        let mut decoder = ResponseDecoder::new(ServoCommand::PosRead, servo_id(1));
        let frame = scan(&mut decoder, &stream).expect("resync after bad length");
        assert_eq!(frame.id, 1);
    }

    /// 总线应答：电池电压 `[0x2C, 0x01]` → 300 mV
    #[test]
    fn test_bus_decode_battery_voltage() {
        let stream = [0x55, 0x55, 0x04, 0x0F, 0x2C, 0x01];
        let mut decoder = BusResponseDecoder::new(BusCommand::GetBatteryVoltage);
        let frame = scan_bus(&mut decoder, &stream).expect("battery frame decodes");
        assert_eq!(frame.word_at(0), 300);
    }

    /// 总线应答参数长度不设 4 字节上限
    #[test]
    fn test_bus_decode_long_position_read() {
        // 3 个舵机：count + 3 组 (id, low, high)
        let params = [3, 1, 0xE8, 0x03, 2, 0x00, 0x00, 3, 0x2C, 0x01];
        let stream = encode_bus(BusCommand::MultServoPosRead, &params);
        let mut decoder = BusResponseDecoder::new(BusCommand::MultServoPosRead);
        let frame = scan_bus(&mut decoder, &stream).expect("long frame decodes");
        assert_eq!(frame.param(0), 3);
        assert_eq!(frame.word_at(2), 1000);
        assert_eq!(frame.word_at(8), 300);
    }

    #[test]
    fn test_bus_decoder_skips_mismatched_command() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_bus(BusCommand::ServoMove, &[1, 0, 0, 1, 0xE8, 0x03]));
        stream.extend_from_slice(&encode_bus(BusCommand::GetBatteryVoltage, &[0x2C, 0x01]));
        let mut decoder = BusResponseDecoder::new(BusCommand::GetBatteryVoltage);
        let frame = scan_bus(&mut decoder, &stream).expect("second frame matches");
        assert_eq!(frame.word_at(0), 300);
    }

    const ALL_COMMANDS: [ServoCommand; 8] = [
        ServoCommand::MoveTimeRead,
        ServoCommand::IdRead,
        ServoCommand::AngleOffsetRead,
        ServoCommand::AngleLimitRead,
        ServoCommand::TempRead,
        ServoCommand::PosRead,
        ServoCommand::ModeRead,
        ServoCommand::LedErrorRead,
    ];

    proptest! {
        /// 任意合法 (id, command, params) 的编码都能被解码还原
        #[test]
        fn prop_encode_decode_round_trip(
            id in 0u8..=253,
            command in prop::sample::select(&ALL_COMMANDS[..]),
            params in prop::collection::vec(any::<u8>(), 0..=4),
        ) {
            let bytes = encode(servo_id(id), command, &params);
            let mut decoder = ResponseDecoder::new(command, servo_id(id));
            let frame = scan(&mut decoder, &bytes).expect("round trip");
            prop_assert_eq!(frame.id, id);
            prop_assert_eq!(frame.command, u8::from(command));
            prop_assert_eq!(&frame.params[..], &params[..]);
        }

        /// 单字节翻转后解码器绝不还原出原始帧
        #[test]
        fn prop_single_byte_corruption_is_discarded(
            id in 0u8..=253,
            command in prop::sample::select(&ALL_COMMANDS[..]),
            params in prop::collection::vec(any::<u8>(), 0..=4),
            pos in 0usize..10,
            mask in 1u8..=255,
        ) {
            let original = encode(servo_id(id), command, &params);
            let mut corrupted = original.clone();
            let pos = pos % corrupted.len();
            corrupted[pos] ^= mask;

            let mut decoder = ResponseDecoder::new(command, servo_id(id));
            if let Some(frame) = scan(&mut decoder, &corrupted) {
                // 偶然拼出其他合法帧是允许的，但绝不能等于原始帧
                let forged = frame.id == id
                    && frame.command == u8::from(command)
                    && frame.params[..] == params[..];
                prop_assert!(!forged, "corrupted frame decoded as the original");
            }
        }
    }
}

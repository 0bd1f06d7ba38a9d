use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Command header: opcode (4) + p1 (4) + p2 (4) + p3 (4) = 16 bytes.
pub const COMMAND_HEADER_SIZE: usize = 16;

/// Response: 12 echoed bytes + result (4) = 16 bytes.
pub const RESPONSE_SIZE: usize = 16;

/// Notification record: sequence (2) + flags (2) + tick (4) + level (4) = 12 bytes.
pub const NOTIFICATION_SIZE: usize = 12;

/// Default maximum size of a length-announced response payload: 64 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Notification flag: user event (not dispatched by this client).
pub const NTFY_FLAGS_EVENT: u16 = 1 << 7;
/// Notification flag: keepalive, no payload.
pub const NTFY_FLAGS_ALIVE: u16 = 1 << 6;
/// Notification flag: watchdog timeout on the line in the low bits.
pub const NTFY_FLAGS_WDOG: u16 = 1 << 5;
/// Mask of the line number carried in watchdog flags.
pub const NTFY_FLAGS_LINE: u16 = 31;

/// A command ready to be sent on the control connection.
///
/// `p3` is not stored: it is always the extension length, so a command can
/// never announce more or fewer trailing bytes than it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command opcode.
    pub opcode: u32,
    /// First parameter.
    pub p1: u32,
    /// Second parameter.
    pub p2: u32,
    extension: Bytes,
}

impl Command {
    /// Create a plain two-parameter command.
    pub fn new(opcode: u32, p1: u32, p2: u32) -> Self {
        Self {
            opcode,
            p1,
            p2,
            extension: Bytes::new(),
        }
    }

    /// Create an extended command carrying trailing bytes.
    pub fn extended(opcode: u32, p1: u32, p2: u32, extension: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            p1,
            p2,
            extension: extension.into(),
        }
    }

    /// Byte length of the extension, as declared in the header.
    pub fn p3(&self) -> u32 {
        u32::try_from(self.extension.len()).unwrap_or(u32::MAX)
    }

    /// Trailing extension bytes.
    pub fn extension(&self) -> &Bytes {
        &self.extension
    }

    /// The header this command encodes to.
    pub fn header(&self) -> CommandHeader {
        CommandHeader {
            opcode: self.opcode,
            p1: self.p1,
            p2: self.p2,
            p3: self.p3(),
        }
    }

    /// The total wire size of this command (header + extension).
    pub fn wire_size(&self) -> usize {
        COMMAND_HEADER_SIZE + self.extension.len()
    }
}

/// Builder for extension payloads.
#[derive(Debug, Clone, Default)]
pub struct Extension {
    buf: BytesMut,
}

impl Extension {
    /// Start an empty extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text, one byte per character (Latin-1).
    pub fn text(mut self, text: &str) -> Result<Self> {
        self.buf.reserve(text.len());
        for ch in text.chars() {
            let byte = u8::try_from(u32::from(ch)).map_err(|_| FrameError::InvalidText(ch))?;
            self.buf.put_u8(byte);
        }
        Ok(self)
    }

    /// Append raw bytes verbatim.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.put_slice(data);
        self
    }

    /// Append one 32-bit parameter word.
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish building.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl From<Extension> for Bytes {
    fn from(ext: Extension) -> Self {
        ext.freeze()
    }
}

/// Decoded command header (as seen by the daemon).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub opcode: u32,
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Leading 12 bytes, echoed by the daemon.
    pub echo: [u8; 12],
    /// Signed result: negative is a daemon error code.
    pub result: i32,
    /// Follow-up payload, for commands that announce one.
    pub payload: Bytes,
}

impl Response {
    /// Whether the daemon reported an error.
    pub fn is_error(&self) -> bool {
        self.result < 0
    }

    /// The raw unsigned result word, for commands that return bit masks.
    pub fn result_bits(&self) -> u32 {
        self.result as u32
    }
}

/// A decoded notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationRecord {
    pub sequence: u16,
    pub flags: u16,
    /// Microsecond tick, wraps at 2^32.
    pub tick: u32,
    /// Levels of lines 0-31.
    pub level: u32,
}

/// What a notification record asks the client to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// `flags == 0`: `level` carries the current line levels.
    LevelChange,
    /// Watchdog expired on `line`.
    Watchdog { line: u8 },
    /// Keepalive; nothing to dispatch.
    Keepalive,
    /// Flag combination this client does not handle.
    Unknown,
}

impl NotificationRecord {
    /// Classify this record by its flags.
    pub fn kind(&self) -> NotificationKind {
        if self.flags == 0 {
            NotificationKind::LevelChange
        } else if self.flags & NTFY_FLAGS_WDOG != 0 {
            NotificationKind::Watchdog {
                line: (self.flags & NTFY_FLAGS_LINE) as u8,
            }
        } else if self.flags & NTFY_FLAGS_ALIVE != 0 {
            NotificationKind::Keepalive
        } else {
            NotificationKind::Unknown
        }
    }
}

/// Reinterpret an unsigned 32-bit result as two's-complement signed.
///
/// Values at or above 2^31 become `value - 2^32`; smaller values are unchanged.
pub fn u2i(value: u32) -> i32 {
    value as i32
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────┬────────────────────┐
/// │ opcode   │ p1       │ p2       │ p3       │ extension          │
/// │ (4B LE)  │ (4B LE)  │ (4B LE)  │ (4B LE)  │ (p3 bytes)         │
/// └──────────┴──────────┴──────────┴──────────┴────────────────────┘
/// ```
pub fn encode_command(cmd: &Command, dst: &mut BytesMut) -> Result<()> {
    if cmd.extension.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: cmd.extension.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(cmd.wire_size());
    dst.put_u32_le(cmd.opcode);
    dst.put_u32_le(cmd.p1);
    dst.put_u32_le(cmd.p2);
    dst.put_u32_le(cmd.p3());
    dst.put_slice(&cmd.extension);
    Ok(())
}

/// Decode a 16-byte command header.
pub fn decode_command_header(src: &[u8]) -> Result<CommandHeader> {
    expect_len("command header", src, COMMAND_HEADER_SIZE)?;
    let mut buf = src;
    Ok(CommandHeader {
        opcode: buf.get_u32_le(),
        p1: buf.get_u32_le(),
        p2: buf.get_u32_le(),
        p3: buf.get_u32_le(),
    })
}

/// Decode a 16-byte response.
pub fn decode_response(src: &[u8]) -> Result<Response> {
    expect_len("response", src, RESPONSE_SIZE)?;
    let mut echo = [0u8; 12];
    echo.copy_from_slice(&src[..12]);
    let mut tail = &src[12..];
    Ok(Response {
        echo,
        result: u2i(tail.get_u32_le()),
        payload: Bytes::new(),
    })
}

/// Encode a response the way the daemon does: the command's opcode, p1 and
/// p2 echoed, then the result.
pub fn encode_response(header: &CommandHeader, result: i32, dst: &mut BytesMut) {
    dst.reserve(RESPONSE_SIZE);
    dst.put_u32_le(header.opcode);
    dst.put_u32_le(header.p1);
    dst.put_u32_le(header.p2);
    dst.put_i32_le(result);
}

/// Decode a 12-byte notification record.
pub fn decode_notification(src: &[u8]) -> Result<NotificationRecord> {
    expect_len("notification", src, NOTIFICATION_SIZE)?;
    let mut buf = src;
    Ok(NotificationRecord {
        sequence: buf.get_u16_le(),
        flags: buf.get_u16_le(),
        tick: buf.get_u32_le(),
        level: buf.get_u32_le(),
    })
}

/// Encode a notification record.
pub fn encode_notification(record: &NotificationRecord, dst: &mut BytesMut) {
    dst.reserve(NOTIFICATION_SIZE);
    dst.put_u16_le(record.sequence);
    dst.put_u16_le(record.flags);
    dst.put_u32_le(record.tick);
    dst.put_u32_le(record.level);
}

fn expect_len(what: &'static str, src: &[u8], expected: usize) -> Result<()> {
    if src.len() != expected {
        return Err(FrameError::InvalidLength {
            what,
            expected,
            actual: src.len(),
        });
    }
    Ok(())
}

/// Configuration for the wire reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum announced payload size in bytes. Default: 64 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

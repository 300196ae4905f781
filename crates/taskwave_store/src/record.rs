//! Record framing for the operation log.
//!
//! The log is a sequence of self-delimiting frames:
//!
//! ```text
//! MAGIC(4) | type(1) | len(4 LE) | payload | crc32(4 LE)
//! ```
//!
//! The checksum covers type, length and payload. A frame that fails the
//! magic, length, or checksum test marks the end of the readable log;
//! everything from that offset on is discarded during recovery. This is
//! what makes a mid-append crash invisible to readers.

use crate::error::{StoreError, StoreResult};
use taskwave_model::{CommandId, SyncCommand};

/// Magic bytes identifying an operation log frame.
pub const RECORD_MAGIC: [u8; 4] = *b"TWOP";

/// Size of the fixed frame header (magic + type + length).
pub const FRAME_HEADER_LEN: usize = 9;

/// Type of an operation log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A new command entered the store.
    Append = 1,
    /// A command's retry count advanced after a failed attempt.
    Retry = 2,
    /// A command was confirmed and leaves the store.
    Completed = 3,
    /// A command exhausted its retries.
    Failed = 4,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Append),
            2 => Some(Self::Retry),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single record in the operation log.
///
/// The current command set is the left-to-right fold of all records.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRecord {
    /// Insert a command. The payload is the full CBOR command, so a
    /// compacted log can restore failed commands with their state.
    Append {
        /// The command as of this write.
        command: SyncCommand,
    },

    /// Advance a command's retry count, keeping it pending.
    Retry {
        /// Command being retried.
        id: CommandId,
        /// New retry count.
        retry_count: u32,
        /// Attempt time in unix milliseconds.
        last_attempt: u64,
    },

    /// Remove a confirmed command.
    Completed {
        /// Command that completed.
        id: CommandId,
    },

    /// Mark a command as terminally failed.
    Failed {
        /// Command that failed.
        id: CommandId,
        /// Retry count at exhaustion.
        retry_count: u32,
        /// Final attempt time in unix milliseconds.
        last_attempt: u64,
        /// Human-readable failure reason.
        message: String,
    },
}

impl StoreRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Append { .. } => RecordType::Append,
            Self::Retry { .. } => RecordType::Retry,
            Self::Completed { .. } => RecordType::Completed,
            Self::Failed { .. } => RecordType::Failed,
        }
    }

    /// Serializes the record payload (without the frame envelope).
    pub fn encode_payload(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Append { command } => {
                buf = command.encode()?;
            }

            Self::Retry {
                id,
                retry_count,
                last_attempt,
            } => {
                buf.extend_from_slice(&id.into_bytes());
                buf.extend_from_slice(&retry_count.to_le_bytes());
                buf.extend_from_slice(&last_attempt.to_le_bytes());
            }

            Self::Completed { id } => {
                buf.extend_from_slice(&id.into_bytes());
            }

            Self::Failed {
                id,
                retry_count,
                last_attempt,
                message,
            } => {
                buf.extend_from_slice(&id.into_bytes());
                buf.extend_from_slice(&retry_count.to_le_bytes());
                buf.extend_from_slice(&last_attempt.to_le_bytes());
                let msg = message.as_bytes();
                buf.extend_from_slice(&(msg.len() as u32).to_le_bytes());
                buf.extend_from_slice(msg);
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> StoreResult<Self> {
        let mut cursor = 0;

        let read_id = |cursor: &mut usize| -> StoreResult<CommandId> {
            if *cursor + 16 > payload.len() {
                return Err(StoreError::Corrupted("unexpected end of command id".into()));
            }
            let bytes: [u8; 16] = payload[*cursor..*cursor + 16]
                .try_into()
                .map_err(|_| StoreError::Corrupted("invalid command id".into()))?;
            *cursor += 16;
            Ok(CommandId::from_bytes(bytes))
        };

        let read_u32 = |cursor: &mut usize| -> StoreResult<u32> {
            if *cursor + 4 > payload.len() {
                return Err(StoreError::Corrupted("unexpected end of payload".into()));
            }
            let bytes: [u8; 4] = payload[*cursor..*cursor + 4]
                .try_into()
                .map_err(|_| StoreError::Corrupted("invalid u32".into()))?;
            *cursor += 4;
            Ok(u32::from_le_bytes(bytes))
        };

        let read_u64 = |cursor: &mut usize| -> StoreResult<u64> {
            if *cursor + 8 > payload.len() {
                return Err(StoreError::Corrupted("unexpected end of payload".into()));
            }
            let bytes: [u8; 8] = payload[*cursor..*cursor + 8]
                .try_into()
                .map_err(|_| StoreError::Corrupted("invalid u64".into()))?;
            *cursor += 8;
            Ok(u64::from_le_bytes(bytes))
        };

        let check_consumed = |cursor: usize| -> StoreResult<()> {
            if cursor != payload.len() {
                return Err(StoreError::Corrupted(format!(
                    "trailing bytes in record: expected {} bytes, got {}",
                    cursor,
                    payload.len()
                )));
            }
            Ok(())
        };

        match record_type {
            RecordType::Append => {
                let command = SyncCommand::decode(payload)?;
                Ok(Self::Append { command })
            }

            RecordType::Retry => {
                let id = read_id(&mut cursor)?;
                let retry_count = read_u32(&mut cursor)?;
                let last_attempt = read_u64(&mut cursor)?;
                check_consumed(cursor)?;
                Ok(Self::Retry {
                    id,
                    retry_count,
                    last_attempt,
                })
            }

            RecordType::Completed => {
                let id = read_id(&mut cursor)?;
                check_consumed(cursor)?;
                Ok(Self::Completed { id })
            }

            RecordType::Failed => {
                let id = read_id(&mut cursor)?;
                let retry_count = read_u32(&mut cursor)?;
                let last_attempt = read_u64(&mut cursor)?;
                let msg_len = read_u32(&mut cursor)? as usize;
                if cursor + msg_len > payload.len() {
                    return Err(StoreError::Corrupted("unexpected end of message".into()));
                }
                let message = String::from_utf8(payload[cursor..cursor + msg_len].to_vec())
                    .map_err(|_| StoreError::Corrupted("message is not valid UTF-8".into()))?;
                cursor += msg_len;
                check_consumed(cursor)?;
                Ok(Self::Failed {
                    id,
                    retry_count,
                    last_attempt,
                    message,
                })
            }
        }
    }

    /// Encodes the record as a complete frame ready to append.
    pub fn encode_frame(&self) -> StoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len() + 4);
        frame.extend_from_slice(&RECORD_MAGIC);
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = compute_crc32(&frame[4..]);
        frame.extend_from_slice(&crc.to_le_bytes());

        Ok(frame)
    }
}

/// Result of reading one frame from a byte slice.
#[derive(Debug)]
pub enum FrameRead {
    /// A complete, valid frame and the number of bytes it consumed.
    Frame(StoreRecord, usize),
    /// The log ends cleanly at this offset.
    End,
    /// Invalid or incomplete data at this offset.
    Invalid(String),
}

/// Reads a single frame from the start of `data`.
///
/// Returns [`FrameRead::Invalid`] for any framing violation: a torn
/// header, wrong magic, unknown type, truncated payload, or checksum
/// mismatch. The caller treats that offset as the end of the readable
/// log.
pub fn read_frame(data: &[u8]) -> FrameRead {
    if data.is_empty() {
        return FrameRead::End;
    }

    if data.len() < FRAME_HEADER_LEN {
        return FrameRead::Invalid("truncated frame header".into());
    }

    if data[0..4] != RECORD_MAGIC {
        return FrameRead::Invalid("bad frame magic".into());
    }

    let Some(record_type) = RecordType::from_byte(data[4]) else {
        return FrameRead::Invalid(format!("unknown record type {}", data[4]));
    };

    let len_bytes: [u8; 4] = match data[5..9].try_into() {
        Ok(bytes) => bytes,
        Err(_) => return FrameRead::Invalid("truncated frame length".into()),
    };
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    let frame_len = FRAME_HEADER_LEN + payload_len + 4;
    if data.len() < frame_len {
        return FrameRead::Invalid("truncated frame payload".into());
    }

    let stored_crc_bytes: [u8; 4] = match data[frame_len - 4..frame_len].try_into() {
        Ok(bytes) => bytes,
        Err(_) => return FrameRead::Invalid("truncated frame checksum".into()),
    };
    let stored_crc = u32::from_le_bytes(stored_crc_bytes);
    let computed_crc = compute_crc32(&data[4..frame_len - 4]);

    if stored_crc != computed_crc {
        return FrameRead::Invalid(format!(
            "checksum mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
        ));
    }

    let payload = &data[FRAME_HEADER_LEN..FRAME_HEADER_LEN + payload_len];
    match StoreRecord::decode_payload(record_type, payload) {
        Ok(record) => FrameRead::Frame(record, frame_len),
        Err(e) => FrameRead::Invalid(e.to_string()),
    }
}

/// Computes a CRC32 checksum (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

//! Log record types and serialization.
//!
//! Every record is framed the same way:
//!
//! ```text
//! | magic (4) | version (2) | type (1) | payload len (4) | header crc32 (4) | payload | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The header checksum covers the eleven bytes
//! before it, so a damaged length is caught before it is trusted. The
//! trailing checksum covers the header and payload.

use crate::error::{KvError, KvResult};
use crate::types::{CollectionHandle, SequenceNumber};
use bytes::Bytes;

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"KVLG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4) + header crc (4)
pub(crate) const HEADER_SIZE: usize = 15;

/// Offset of the header checksum; it covers every header byte before it.
pub(crate) const HEADER_CRC_OFFSET: usize = 11;

/// Trailing checksum size.
pub(crate) const CRC_SIZE: usize = 4;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A collection was registered.
    CreateCollection = 1,
    /// A staged put belonging to a batch.
    Put = 2,
    /// A batch became visible.
    Commit = 3,
}

impl RecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::CreateCollection),
            2 => Some(Self::Put),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A record in the store log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A collection was registered under `handle`.
    CreateCollection {
        /// Handle issued to the collection.
        handle: CollectionHandle,
        /// Collection name.
        name: String,
    },

    /// One put staged by batch `batch`.
    Put {
        /// Batch the put belongs to.
        batch: u64,
        /// Target collection.
        collection: CollectionHandle,
        /// Record key.
        key: Bytes,
        /// Record value.
        value: Bytes,
    },

    /// Batch `batch` committed with `count` puts.
    Commit {
        /// Batch being committed.
        batch: u64,
        /// Sequence number assigned to the commit.
        sequence: SequenceNumber,
        /// Number of puts the batch logged.
        count: u32,
    },
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::CreateCollection { .. } => RecordType::CreateCollection,
            Self::Put { .. } => RecordType::Put,
            Self::Commit { .. } => RecordType::Commit,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Fails if a variable-length field does not fit its 4-byte length.
    pub fn encode_payload(&self) -> KvResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::CreateCollection { handle, name } => {
                buf.extend_from_slice(&handle.as_u32().to_le_bytes());
                put_field(&mut buf, name.as_bytes())?;
            }

            Self::Put {
                batch,
                collection,
                key,
                value,
            } => {
                buf.reserve(20 + key.len() + value.len());
                buf.extend_from_slice(&batch.to_le_bytes());
                buf.extend_from_slice(&collection.as_u32().to_le_bytes());
                put_field(&mut buf, key)?;
                put_field(&mut buf, value)?;
            }

            Self::Commit {
                batch,
                sequence,
                count,
            } => {
                buf.extend_from_slice(&batch.to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
                buf.extend_from_slice(&count.to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Fails with [`KvError::LogCorruption`] if the payload is short, has
    /// trailing bytes, or holds a name that is not UTF-8.
    pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> KvResult<Self> {
        let mut reader = PayloadReader::new(payload);

        let record = match record_type {
            RecordType::CreateCollection => {
                let handle = CollectionHandle::new(reader.u32()?);
                let name = String::from_utf8(reader.field()?.to_vec())
                    .map_err(|_| KvError::log_corruption("collection name is not UTF-8"))?;
                Self::CreateCollection { handle, name }
            }

            RecordType::Put => Self::Put {
                batch: reader.u64()?,
                collection: CollectionHandle::new(reader.u32()?),
                key: Bytes::copy_from_slice(reader.field()?),
                value: Bytes::copy_from_slice(reader.field()?),
            },

            RecordType::Commit => Self::Commit {
                batch: reader.u64()?,
                sequence: SequenceNumber::new(reader.u64()?),
                count: reader.u32()?,
            },
        };

        reader.finish(record_type)?;
        Ok(record)
    }

    /// Serializes the full framed record.
    ///
    /// # Errors
    ///
    /// Same as [`LogRecord::encode_payload`].
    pub fn encode(&self) -> KvResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = field_len(&payload)?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        buf.extend_from_slice(&LOG_MAGIC);
        buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
        buf.push(self.record_type().as_byte());
        buf.extend_from_slice(&len.to_le_bytes());
        let header_crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&header_crc.to_le_bytes());
        buf.extend_from_slice(&payload);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }
}

fn field_len(bytes: &[u8]) -> KvResult<u32> {
    u32::try_from(bytes.len()).map_err(|_| {
        KvError::invalid_argument(format!(
            "field of {} bytes does not fit in a log record",
            bytes.len()
        ))
    })
}

fn put_field(buf: &mut Vec<u8>, bytes: &[u8]) -> KvResult<()> {
    buf.extend_from_slice(&field_len(bytes)?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Cursor over a record payload.
struct PayloadReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn take(&mut self, len: usize) -> KvResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| KvError::log_corruption("unexpected end of payload"))?;
        let bytes = &self.payload[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> KvResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> KvResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> KvResult<u64> {
        self.array().map(u64::from_le_bytes)
    }

    fn field(&mut self) -> KvResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn finish(&self, record_type: RecordType) -> KvResult<()> {
        if self.pos != self.payload.len() {
            return Err(KvError::log_corruption(format!(
                "trailing bytes in {record_type:?} record: expected {} bytes, got {}",
                self.pos,
                self.payload.len()
            )));
        }
        Ok(())
    }
}

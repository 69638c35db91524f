//! Streaming iteration over framed log records.

use super::record::{
    LogRecord, RecordType, CRC_SIZE, HEADER_CRC_OFFSET, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use crate::error::{KvError, KvResult};
use kvseam_storage::ByteLog;

/// Reads records one at a time from a [`ByteLog`].
///
/// Yields `(offset, record)` pairs. A record cut short by the end of the
/// log (a torn tail) ends iteration cleanly; [`RecordIterator::position`]
/// then points at the first byte of the torn record. Only a partial header,
/// or an intact header whose body runs past the end, counts as torn. A bad
/// magic or header checksum, an unknown type or version, or a checksum
/// mismatch is an error and also ends iteration.
pub struct RecordIterator<'a> {
    log: &'a dyn ByteLog,
    size: u64,
    offset: u64,
    finished: bool,
    torn: bool,
}

impl<'a> RecordIterator<'a> {
    /// Starts reading at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the log size cannot be read.
    pub fn new(log: &'a dyn ByteLog, offset: u64) -> KvResult<Self> {
        let size = log.size()?;
        Ok(Self {
            log,
            size,
            offset,
            finished: false,
            torn: false,
        })
    }

    /// Offset just past the last record yielded.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Whether iteration stopped at an incomplete record rather than at the
    /// end of the log or at an error.
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.torn
    }

    fn remaining(&self) -> u64 {
        self.size - self.offset
    }

    fn read_next(&mut self) -> KvResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        if self.remaining() < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.log.read_at(start, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(KvError::log_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let header_crc = u32::from_le_bytes([header[11], header[12], header[13], header[14]]);
        if crc32fast::hash(&header[..HEADER_CRC_OFFSET]) != header_crc {
            return Err(KvError::log_corruption(format!(
                "header checksum mismatch at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version == 0 || version > LOG_VERSION {
            return Err(KvError::log_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
            KvError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        let body_len = u64::from(payload_len) + CRC_SIZE as u64;
        if self.remaining() - (HEADER_SIZE as u64) < body_len {
            return Ok(None);
        }

        let body = self
            .log
            .read_at(start + HEADER_SIZE as u64, payload_len as usize + CRC_SIZE)?;
        let (payload, crc) = body.split_at(payload_len as usize);
        let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(KvError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let record = LogRecord::decode_payload(record_type, payload)?;
        self.offset = start + HEADER_SIZE as u64 + body_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = KvResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                self.torn = self.offset < self.size;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionHandle, SequenceNumber};
    use bytes::Bytes;
    use kvseam_storage::MemoryLog;

    fn log_with(records: &[LogRecord]) -> MemoryLog {
        let mut log = MemoryLog::new();
        for record in records {
            log.append(&record.encode().unwrap()).unwrap();
        }
        log
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            LogRecord::CreateCollection {
                handle: CollectionHandle::new(0),
                name: "users".to_string(),
            },
            LogRecord::Put {
                batch: 1,
                collection: CollectionHandle::new(0),
                key: Bytes::from_static(b"alice"),
                value: Bytes::from_static(b"1"),
            },
            LogRecord::Commit {
                batch: 1,
                sequence: SequenceNumber::new(1),
                count: 1,
            },
        ]
    }

    #[test]
    fn empty_log_yields_nothing() {
        let log = MemoryLog::new();
        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(iter.next().is_none());
        assert!(!iter.has_torn_tail());
    }

    #[test]
    fn yields_records_with_offsets() {
        let records = sample();
        let log = log_with(&records);
        let mut iter = RecordIterator::new(&log, 0).unwrap();

        let read: Vec<_> = iter.by_ref().collect::<KvResult<_>>().unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].0, 0);
        assert!(read[1].0 > read[0].0);
        let decoded: Vec<_> = read.into_iter().map(|(_, r)| r).collect();
        assert_eq!(decoded, records);
        assert_eq!(iter.position(), log.size().unwrap());
    }

    #[test]
    fn torn_tail_ends_iteration() {
        let records = sample();
        let log = log_with(&records);
        let full = log.snapshot();
        let torn = MemoryLog::with_bytes(full[..full.len() - 3].to_vec());

        let mut iter = RecordIterator::new(&torn, 0).unwrap();
        let read: Vec<_> = iter.by_ref().collect::<KvResult<_>>().unwrap();
        assert_eq!(read.len(), 2);
        assert!(iter.has_torn_tail());
        assert!(iter.position() < torn.size().unwrap());
    }

    #[test]
    fn partial_header_ends_iteration() {
        let log = log_with(&sample()[..1]);
        let mut bytes = log.snapshot();
        bytes.extend_from_slice(&LOG_MAGIC);
        let log = MemoryLog::with_bytes(bytes);

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert_eq!(iter.by_ref().count(), 1);
        assert!(iter.has_torn_tail());
    }

    #[test]
    fn checksum_mismatch_is_error() {
        let log = log_with(&sample());
        // Flip a byte inside the first record's payload.
        assert!(log.corrupt_byte(HEADER_SIZE as u64 + 1, 0xEE));

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(KvError::ChecksumMismatch { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn bad_magic_is_error() {
        let log = log_with(&sample());
        assert!(log.corrupt_byte(0, b'X'));

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(matches!(iter.next(), Some(Err(KvError::LogCorruption { .. }))));
    }

    /// Frames `payload` with intact checksums under an arbitrary type byte.
    fn frame(type_byte: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&LOG_MAGIC);
        buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
        buf.push(type_byte);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        let header_crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&header_crc.to_le_bytes());
        buf.extend_from_slice(payload);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    #[test]
    fn unknown_record_type_is_error() {
        let log = MemoryLog::with_bytes(frame(0x7F, &[0; 8]));

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(matches!(iter.next(), Some(Err(KvError::LogCorruption { .. }))));
    }

    #[test]
    fn damaged_type_byte_fails_header_checksum() {
        let log = log_with(&sample());
        assert!(log.corrupt_byte(6, 0x7F));

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(matches!(iter.next(), Some(Err(KvError::LogCorruption { .. }))));
    }

    #[test]
    fn damaged_length_is_corruption_not_torn_tail() {
        let log = log_with(&sample());
        let second = log_with(&sample()[..1]).size().unwrap();
        // High byte of the second record's payload length: it now claims to
        // run far past the end of the log.
        assert!(log.corrupt_byte(second + 10, 0x7F));

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(matches!(iter.next(), Some(Ok((0, _)))));
        assert!(matches!(iter.next(), Some(Err(KvError::LogCorruption { .. }))));
        assert!(!iter.has_torn_tail());
    }

    #[test]
    fn intact_header_with_short_body_is_torn() {
        let framed = sample()[1].encode().unwrap();
        let log = MemoryLog::with_bytes(framed[..HEADER_SIZE + 2].to_vec());

        let mut iter = RecordIterator::new(&log, 0).unwrap();
        assert!(iter.next().is_none());
        assert!(iter.has_torn_tail());
        assert_eq!(iter.position(), 0);
    }
}

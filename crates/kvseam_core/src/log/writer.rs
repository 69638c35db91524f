//! Appending records to the store log.

use super::iterator::RecordIterator;
use super::record::LogRecord;
use crate::error::{KvError, KvResult};
use kvseam_storage::ByteLog;
use tracing::{error, warn};

/// Owns the byte log and appends groups of records to it.
///
/// A group is written with one `append` call. If the append or the
/// following sync fails, the log is truncated back to where the group
/// started, so a failed commit leaves no bytes behind. If that truncate
/// also fails the writer is poisoned and refuses further writes.
pub(crate) struct LogWriter {
    log: Box<dyn ByteLog>,
    sync_on_commit: bool,
    poisoned: bool,
}

impl LogWriter {
    pub(crate) fn new(log: Box<dyn ByteLog>, sync_on_commit: bool) -> Self {
        Self {
            log,
            sync_on_commit,
            poisoned: false,
        }
    }

    pub(crate) fn log(&self) -> &dyn ByteLog {
        self.log.as_ref()
    }

    pub(crate) fn records(&self) -> KvResult<RecordIterator<'_>> {
        RecordIterator::new(self.log(), 0)
    }

    pub(crate) fn size(&self) -> KvResult<u64> {
        Ok(self.log.size()?)
    }

    /// Drops everything after `offset`.
    pub(crate) fn truncate(&mut self, offset: u64) -> KvResult<()> {
        self.log.truncate(offset)?;
        Ok(())
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn ensure_writable(&self) -> KvResult<()> {
        if self.poisoned {
            return Err(KvError::engine(
                "log writer is poisoned after a failed rollback",
            ));
        }
        Ok(())
    }

    /// Appends `records` as one write, syncing if configured.
    ///
    /// Returns the offset the group starts at.
    pub(crate) fn append_records(&mut self, records: &[LogRecord]) -> KvResult<u64> {
        self.ensure_writable()?;

        let mut buf = Vec::new();
        for record in records {
            buf.extend_from_slice(&record.encode()?);
        }

        let start = self.log.size()?;
        let written = self.log.append(&buf).and_then(|offset| {
            if self.sync_on_commit {
                self.log.sync()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => Ok(offset),
            Err(cause) => {
                self.rollback(start);
                Err(cause.into())
            }
        }
    }

    fn rollback(&mut self, start: u64) {
        warn!(offset = start, "log write failed, rolling back");
        if let Err(e) = self.log.truncate(start) {
            error!(offset = start, error = %e, "rollback failed, poisoning log writer");
            self.poisoned = true;
        }
    }

    pub(crate) fn sync(&mut self) -> KvResult<()> {
        self.ensure_writable()?;
        self.log.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionHandle, SequenceNumber};
    use bytes::Bytes;
    use kvseam_storage::{MemoryLog, StorageError, StorageResult};

    /// Log that fails the next append after writing part of it.
    struct TearingLog {
        inner: MemoryLog,
        fail_append: bool,
        fail_truncate: bool,
    }

    impl ByteLog for TearingLog {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.fail_append {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(StorageError::Injected("torn append".into()));
            }
            self.inner.append(data)
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            if self.fail_truncate {
                return Err(StorageError::Injected("truncate refused".into()));
            }
            self.inner.truncate(new_size)
        }
    }

    fn group() -> Vec<LogRecord> {
        vec![
            LogRecord::Put {
                batch: 1,
                collection: CollectionHandle::new(0),
                key: Bytes::from_static(b"k"),
                value: Bytes::from_static(b"v"),
            },
            LogRecord::Commit {
                batch: 1,
                sequence: SequenceNumber::new(1),
                count: 1,
            },
        ]
    }

    #[test]
    fn group_is_readable_back() {
        let mut writer = LogWriter::new(Box::new(MemoryLog::new()), true);
        assert_eq!(writer.append_records(&group()).unwrap(), 0);

        let read: Vec<_> = writer
            .records()
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, group());
    }

    #[test]
    fn failed_append_rolls_back() {
        let inner = MemoryLog::new();
        let mut writer = LogWriter::new(
            Box::new(TearingLog {
                inner: inner.clone(),
                fail_append: true,
                fail_truncate: false,
            }),
            false,
        );

        assert!(writer.append_records(&group()).is_err());
        assert_eq!(inner.size().unwrap(), 0);
        assert!(!writer.is_poisoned());
    }

    #[test]
    fn failed_rollback_poisons() {
        let mut writer = LogWriter::new(
            Box::new(TearingLog {
                inner: MemoryLog::new(),
                fail_append: true,
                fail_truncate: true,
            }),
            false,
        );

        assert!(writer.append_records(&group()).is_err());
        assert!(writer.is_poisoned());

        let err = writer.append_records(&group()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Engine);
        assert!(writer.sync().is_err());
    }
}

//! Rebuilding committed state from the log.

use super::record::LogRecord;
use crate::error::{KvError, KvResult};
use crate::types::{CollectionHandle, SequenceNumber};
use crate::version::Table;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::warn;

type StagedPut = (CollectionHandle, Bytes, Bytes);

/// Puts of a batch whose `Commit` has not been seen yet.
#[derive(Debug)]
struct PendingBatch {
    /// Offset of the batch's first put.
    first: u64,
    puts: Vec<StagedPut>,
}

/// Replays log records into collection tables.
///
/// Puts are buffered per batch and applied only when their `Commit` record
/// arrives. A crash can leave at most one uncommitted batch, at the end of
/// the log; [`Recovery::finish`] drops it and rejects anything else.
#[derive(Debug, Default)]
pub(crate) struct Recovery {
    names: Vec<String>,
    tables: Vec<Table>,
    pending: HashMap<u64, PendingBatch>,
    sequence: SequenceNumber,
    max_batch: u64,
    /// Offset just past the last record that changed committed state.
    durable_end: u64,
    records: u64,
}

/// Committed state recovered from a log.
#[derive(Debug)]
pub(crate) struct Recovered {
    pub(crate) names: Vec<String>,
    pub(crate) tables: Vec<Table>,
    pub(crate) sequence: SequenceNumber,
    /// Next unused batch id.
    pub(crate) next_batch: u64,
    /// Where the log should end; anything after it is discarded.
    pub(crate) durable_end: u64,
    pub(crate) records: u64,
}

impl Recovery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies the record found at `offset` whose encoding ends at `end`.
    pub(crate) fn apply(&mut self, offset: u64, end: u64, record: LogRecord) -> KvResult<()> {
        self.records += 1;
        match record {
            LogRecord::CreateCollection { handle, name } => {
                if handle.index() != self.names.len() {
                    return Err(KvError::log_corruption(format!(
                        "collection {name:?} at offset {offset} has handle {handle}, expected col:{}",
                        self.names.len()
                    )));
                }
                if self.names.contains(&name) {
                    return Err(KvError::log_corruption(format!(
                        "collection {name:?} created twice (offset {offset})"
                    )));
                }
                self.names.push(name);
                self.tables.push(Table::new());
                self.durable_end = end;
            }

            LogRecord::Put {
                batch,
                collection,
                key,
                value,
            } => {
                self.max_batch = self.max_batch.max(batch);
                self.pending
                    .entry(batch)
                    .or_insert_with(|| PendingBatch {
                        first: offset,
                        puts: Vec::new(),
                    })
                    .puts
                    .push((collection, key, value));
            }

            LogRecord::Commit {
                batch,
                sequence,
                count,
            } => {
                self.max_batch = self.max_batch.max(batch);
                let puts = self
                    .pending
                    .remove(&batch)
                    .map(|pending| pending.puts)
                    .unwrap_or_default();
                if puts.len() != count as usize {
                    return Err(KvError::log_corruption(format!(
                        "batch {batch} commits {count} puts but logged {} (offset {offset})",
                        puts.len()
                    )));
                }
                if sequence != self.sequence.next() {
                    return Err(KvError::log_corruption(format!(
                        "batch {batch} has {sequence}, expected {} (offset {offset})",
                        self.sequence.next()
                    )));
                }

                for (collection, key, value) in puts {
                    let table = self.tables.get_mut(collection.index()).ok_or_else(|| {
                        KvError::log_corruption(format!(
                            "batch {batch} writes to unknown {collection}"
                        ))
                    })?;
                    table.insert(key, value);
                }
                self.sequence = sequence;
                self.durable_end = end;
            }
        }
        Ok(())
    }

    /// Ends replay.
    ///
    /// # Errors
    ///
    /// Fails with [`KvError::LogCorruption`] if more than one batch is
    /// uncommitted, or if an uncommitted batch is followed by committed
    /// records. Truncating the log in either case would drop committed data.
    pub(crate) fn finish(self) -> KvResult<Recovered> {
        if self.pending.len() > 1 {
            let mut batches: Vec<u64> = self.pending.keys().copied().collect();
            batches.sort_unstable();
            return Err(KvError::log_corruption(format!(
                "batches {batches:?} are all uncommitted; a crash leaves at most one"
            )));
        }
        if let Some((batch, pending)) = self.pending.iter().next() {
            if pending.first < self.durable_end {
                return Err(KvError::log_corruption(format!(
                    "uncommitted batch {batch} at offset {} precedes committed records",
                    pending.first
                )));
            }
            warn!(
                batch = *batch,
                puts = pending.puts.len(),
                "discarding uncommitted batch from log"
            );
        }

        Ok(Recovered {
            names: self.names,
            tables: self.tables,
            sequence: self.sequence,
            next_batch: self.max_batch + 1,
            durable_end: self.durable_end,
            records: self.records,
        })
    }
}

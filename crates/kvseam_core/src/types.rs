//! Identifiers and capability flags.

use std::fmt;

/// Opaque handle to a collection inside one store.
///
/// Handles are issued by `create_collection` and `collection`, stay valid
/// for the store's lifetime, and are only meaningful to the store that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionHandle(u32);

impl CollectionHandle {
    /// Creates a handle from its raw index.
    ///
    /// Engines mint handles; callers should obtain them from a store.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.0)
    }
}

/// Position of a committed batch in the store's total commit order.
///
/// Sequence 0 is the empty store. Each non-empty commit advances it by one;
/// empty commits and collection creation leave it unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Guarantees an engine advertises.
///
/// The contract lets weaker engines exist; conformance checks consult these
/// flags instead of assuming the strongest behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A committed batch becomes visible all at once or not at all.
    pub atomic_batches: bool,
    /// A snapshot never observes writes committed after it was taken.
    pub snapshot_isolation: bool,
    /// Flushed writes survive process restart.
    pub durable: bool,
}

impl Capabilities {
    /// Every guarantee the contract names.
    pub const FULL: Self = Self {
        atomic_batches: true,
        snapshot_isolation: true,
        durable: true,
    };

    /// Atomic and isolated, but lost on drop.
    pub const VOLATILE: Self = Self {
        atomic_batches: true,
        snapshot_isolation: true,
        durable: false,
    };
}

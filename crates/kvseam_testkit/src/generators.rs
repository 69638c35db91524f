//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so that generated batches overwrite
//! and interleave with each other often.

use proptest::prelude::*;

/// One operation in a generated workload.
#[derive(Debug, Clone)]
pub enum Op {
    /// Commit these puts as one batch, in order.
    Batch(Vec<(Vec<u8>, Vec<u8>)>),
    /// Take a snapshot and compare it against the model.
    Check,
    /// Iterate from this start key and compare against the model.
    Scan(Vec<u8>),
}

/// Strategy for keys: short, with frequent collisions and prefixes.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![0u8, b'a', b'b', b'c', 0xff]), 0..4)
}

/// Strategy for values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_.]{0,31}").expect("invalid regex")
}

/// Strategy for the puts of one batch.
pub fn batch_strategy() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..8)
}

/// Strategy for a single workload operation.
pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => batch_strategy().prop_map(Op::Batch),
        1 => Just(Op::Check),
        1 => key_strategy().prop_map(Op::Scan),
    ]
}

/// Strategy for a workload of up to `max_ops` operations.
pub fn workload_strategy(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..=max_ops)
}

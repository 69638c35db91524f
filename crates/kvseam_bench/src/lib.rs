//! Shared helpers for the kvseam benchmarks.

#![deny(unsafe_code)]

use rand::Rng;

/// Random bytes of the given size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// `count` distinct random keys of `size` bytes each, sorted.
///
/// Each key ends with its index so keys never collide.
pub fn random_keys(count: usize, size: usize) -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|i| {
            let mut key = random_data(size);
            key.extend_from_slice(&(i as u64).to_be_bytes());
            key
        })
        .collect();
    keys.sort();
    keys
}

/// Random `(key, value)` pairs.
pub fn random_records(count: usize, key_size: usize, value_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    random_keys(count, key_size)
        .into_iter()
        .map(|key| (key, random_data(value_size)))
        .collect()
}

//! # kvseam testkit
//!
//! Test utilities for kvseam stores.
//!
//! This crate provides:
//! - Fixtures: temporary directory-backed stores and populated scenarios
//! - A conformance suite any [`kvseam_core::Store`] can be run against
//! - Property-based generators using proptest
//! - A fault-injecting byte log for commit-failure and torn-write tests
//! - Concurrent stress runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvseam_testkit::prelude::*;
//!
//! #[test]
//! fn my_engine_conforms() {
//!     let store = MyEngine::new();
//!     conformance::run_all(&store);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fault;
pub mod fixtures;
pub mod generators;
pub mod stress;

mod logging;

pub use logging::init_test_logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance;
    pub use crate::fault::{FaultControl, FaultyLog};
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_test_logging;
    pub use crate::stress::*;
    pub use kvseam_core::{
        ByteView, CollectionHandle, Config, ErrorKind, KvError, KvIterator, KvResult, LogStore,
        MemoryStore, Reader, Store, WriteBatch,
    };
}

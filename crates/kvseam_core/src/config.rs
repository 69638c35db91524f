//! Store configuration.

/// Configuration shared by the bundled engines.
///
/// Size limits apply to every engine. The directory options
/// (`create_if_missing`, `error_if_exists`) and `sync_on_commit` only
/// matter to the log store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Create the store directory if it does not exist.
    pub create_if_missing: bool,

    /// Refuse to open a directory that already holds a log.
    pub error_if_exists: bool,

    /// Sync the log before a commit returns.
    pub sync_on_commit: bool,

    /// Largest key a batch accepts, in bytes.
    pub max_key_size: usize,

    /// Largest value a batch accepts, in bytes.
    pub max_value_size: usize,

    /// Longest collection name accepted, in bytes.
    pub max_collection_name_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_key_size: 64 * 1024,          // 64 KiB
            max_value_size: 64 * 1024 * 1024, // 64 MiB
            max_collection_name_len: 255,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail when a log already exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether each commit syncs the log.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the maximum key size.
    #[must_use]
    pub const fn max_key_size(mut self, size: usize) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets the maximum value size.
    #[must_use]
    pub const fn max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Sets the maximum collection name length.
    #[must_use]
    pub const fn max_collection_name_len(mut self, len: usize) -> Self {
        self.max_collection_name_len = len;
        self
    }
}

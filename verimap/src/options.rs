/// Options when creating a [`crate::Ledger`] instance.
pub struct Options {
    /// The maximum number of resident pages across all store shards.
    pub(crate) page_capacity: usize,
    /// The number of page store shards.
    pub(crate) store_shards: usize,
    /// The maximum number of digest -> original key entries retained for
    /// scans.
    pub(crate) key_capacity: usize,
}

impl Options {
    /// Create a new `Options` instance with the default values.
    pub fn new() -> Self {
        Self {
            page_capacity: 1 << 16,
            store_shards: 8,
            key_capacity: 1 << 16,
        }
    }

    /// Set the maximum number of resident pages.
    ///
    /// May not be zero. Versions whose pages are evicted become unreadable;
    /// size this to cover the retention window.
    pub fn page_capacity(&mut self, page_capacity: usize) {
        assert!(page_capacity > 0);
        self.page_capacity = page_capacity;
    }

    /// Set the number of page store shards.
    ///
    /// May not be zero.
    pub fn store_shards(&mut self, store_shards: usize) {
        assert!(store_shards > 0);
        self.store_shards = store_shards;
    }

    /// Set the capacity of the original-key index consulted by scans.
    ///
    /// May not be zero. Scans report digests whose originals were evicted.
    pub fn key_capacity(&mut self, key_capacity: usize) {
        assert!(key_capacity > 0);
        self.key_capacity = key_capacity;
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

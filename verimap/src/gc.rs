//! Automatic erasure of unobserved versions.

use parking_lot::Mutex;

use crate::{Contents, Ledger, LedgerError, Murmur3Hasher, Options, Stats};
use verimap_core::hasher::LedgerHasher;

/// A [`Ledger`] wrapper that erases any version whose root hash was never
/// observed.
///
/// Callers that derive identifiers from the ledger typically sample
/// [`GcLedger::root_hash`] after a burst of mutations. A version whose hash
/// was never sampled cannot be referenced later, so retaining it only leaks
/// memory; this wrapper erases it as soon as the next mutation supersedes
/// it.
pub struct GcLedger<H: LedgerHasher = Murmur3Hasher> {
    inner: Ledger<H>,
    current_hash_used: Mutex<bool>,
}

impl GcLedger<Murmur3Hasher> {
    /// Create a garbage-collected ledger with the default options and
    /// hasher.
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }
}

impl Default for GcLedger<Murmur3Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: LedgerHasher> GcLedger<H> {
    /// Create a garbage-collected ledger with the given options.
    pub fn with_options(options: Options) -> Self {
        GcLedger {
            inner: Ledger::with_options(options),
            current_hash_used: Mutex::new(false),
        }
    }

    /// As [`Ledger::put`], erasing the superseded version when its hash was
    /// never observed.
    pub fn put(&self, key: &str, value: &str) -> Result<String, LedgerError> {
        let mut used = self.current_hash_used.lock();
        let prior = self.inner.root_hash();
        let result = self.inner.put(key, value)?;
        self.sweep(&mut used, prior, &result)?;
        Ok(result)
    }

    /// As [`Ledger::delete`], erasing the superseded version when its hash
    /// was never observed.
    pub fn delete(&self, key: &str) -> Result<String, LedgerError> {
        let mut used = self.current_hash_used.lock();
        let prior = self.inner.root_hash();
        let result = self.inner.delete(key)?;
        self.sweep(&mut used, prior, &result)?;
        Ok(result)
    }

    /// The current root hash. Versions observed through this method are
    /// retained when superseded.
    pub fn root_hash(&self) -> String {
        let mut used = self.current_hash_used.lock();
        *used = true;
        self.inner.root_hash()
    }

    /// See [`Ledger::get`].
    pub fn get(&self, key: &str) -> Result<String, LedgerError> {
        self.inner.get(key)
    }

    /// See [`Ledger::get_previous`].
    pub fn get_previous(&self, root: &str, key: &str) -> Result<String, LedgerError> {
        self.inner.get_previous(root, key)
    }

    /// See [`Ledger::erase_root_hash`].
    pub fn erase_root_hash(&self, root: &str) -> Result<(), LedgerError> {
        self.inner.erase_root_hash(root)
    }

    /// See [`Ledger::get_all`].
    pub fn get_all(&self) -> Result<Contents, LedgerError> {
        self.inner.get_all()
    }

    /// See [`Ledger::get_all_previous`].
    pub fn get_all_previous(&self, root: &str) -> Result<Contents, LedgerError> {
        self.inner.get_all_previous(root)
    }

    /// See [`Ledger::stats`].
    pub fn stats(&self) -> Stats {
        self.inner.stats()
    }

    fn sweep(&self, used: &mut bool, prior: String, result: &str) -> Result<(), LedgerError> {
        // a mutation that reproduces the prior state must not erase it
        if !prior.is_empty() && !*used && prior != result {
            self.inner.erase_root_hash(&prior)?;
        }
        *used = false;
        Ok(())
    }
}

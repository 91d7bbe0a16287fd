use verimap_core::trie::Digest;

/// Errors surfaced by the ledger. There is no retry or fallback; errors go
/// straight to the caller and leave the ledger unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A traversal referenced a page that is no longer in the page store,
    /// either because the store evicted it or because the version holding it
    /// was erased.
    #[error("page {} is not present in the page store", hex::encode(.0))]
    PageMissing(Digest),

    /// [`crate::Ledger::erase_root_hash`] was asked to erase a hash that no
    /// retained version carries.
    #[error("rootHash {0} is not present in ledger history")]
    RootHashNotPresent(String),

    /// An externally supplied root hash string was not valid base64.
    #[error("malformed root hash: {0}")]
    KeyEncoding(#[from] base64::DecodeError),
}

//! ChainFS ledger gateway — backend abstraction for inode records
//!
//! The bridge daemon only depends on the [`LedgerGateway`] trait; the
//! backend behind it (a distributed ledger client, or the in-memory store
//! in this crate) is interchangeable.

pub mod config;
pub mod error;
pub mod memory;

// Re-export key types for convenience
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use memory::MemoryLedger;

use chainfs_proto::{AttrMask, InodeAttrs};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Backend contract for inode metadata records, keyed by `ino`.
///
/// Implementations decide persistence and replication; callers collapse the
/// error taxonomy to a wire status before anything crosses back to the
/// kernel.
pub trait LedgerGateway {
    /// Create a new record. Fails if a record with the same `ino` exists.
    fn create_inode(&mut self, attrs: &InodeAttrs, present: AttrMask) -> Result<()>;

    /// Partial update of an existing record: exactly the fields named by
    /// `present` are applied, `ino` itself is never mutated.
    fn update_attrs(&mut self, attrs: &InodeAttrs, present: AttrMask) -> Result<()>;

    /// Read the full record for `ino`.
    fn read_attrs(&mut self, ino: u64) -> Result<InodeAttrs>;
}

//! Storage for the beacon node: a bytes-in/bytes-out key-value seam with
//! bucketed keys, plus the hot/archive block store built on top of it.
//!
//! The production backend (LevelDB) is an external collaborator; the
//! in-memory store provides the same ordered-iteration contract for tests
//! and ephemeral nodes.

mod hot_cold_store;
mod impls;
mod memory_store;
pub mod metrics;

pub use hot_cold_store::HotColdDB;
pub use memory_store::MemoryStore;

use ssz::DecodeError;
use std::fmt;

/// Buckets for the key space. The bucket byte prefixes every key so that
/// each bucket occupies a contiguous, byte-ordered key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DBColumn {
    /// Non-finalized blocks, keyed by block root.
    BeaconBlock,
    /// Blob sidecars for non-finalized blocks, keyed by block root.
    BlobSidecar,
    /// Data-column sidecars for non-finalized blocks, keyed by block root.
    DataColumnSidecar,
    /// Finalized blocks, keyed by slot (big-endian).
    ArchiveBlock,
    /// Finalized states, keyed by slot (big-endian).
    ArchiveState,
    /// The persisted fork choice singleton.
    ForkChoice,
}

impl DBColumn {
    pub fn as_byte(&self) -> u8 {
        match self {
            DBColumn::BeaconBlock => 0,
            DBColumn::BlobSidecar => 1,
            DBColumn::DataColumnSidecar => 2,
            DBColumn::ArchiveBlock => 3,
            DBColumn::ArchiveState => 4,
            DBColumn::ForkChoice => 5,
        }
    }
}

impl fmt::Display for DBColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Prefix `key` with the bucket byte of `column`.
pub fn get_key_for_col(column: DBColumn, key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(1 + key.len());
    result.push(column.as_byte());
    result.extend_from_slice(key);
    result
}

/// Big-endian slot key, so that byte-lexicographic order matches numeric
/// slot order within a bucket.
pub fn slot_key(slot: types::Slot) -> [u8; 8] {
    slot.as_u64().to_be_bytes()
}

#[derive(Debug)]
pub enum Error {
    SszDecodeError(DecodeError),
    DBError { message: String },
    BlockNotFound(types::Hash256),
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Error {
        Error::SszDecodeError(e)
    }
}

/// A single operation within an atomic batch.
#[derive(Debug, Clone)]
pub enum KeyValueStoreOp {
    PutKeyValue(Vec<u8>, Vec<u8>),
    DeleteKey(Vec<u8>),
}

/// Bytes-in/bytes-out key-value storage.
///
/// The only ordering guarantee is byte-lexicographic ordering of keys
/// within each bucket, which the key encoding aligns with numeric
/// ordering.
pub trait KeyValueStore: Sync + Send + Sized + 'static {
    /// Retrieve some bytes in `column` with `key`.
    fn get_bytes(&self, column: DBColumn, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Store some `value` in `column`, indexed with `key`.
    fn put_bytes(&self, column: DBColumn, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Return `true` if `key` exists in `column`.
    fn key_exists(&self, column: DBColumn, key: &[u8]) -> Result<bool, Error>;

    /// Removes `key` from `column`.
    fn key_delete(&self, column: DBColumn, key: &[u8]) -> Result<(), Error>;

    /// Execute either all of the operations in `batch` or none at all.
    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error>;

    /// Return all `(key, value)` pairs in `column` with
    /// `gte <= key < lt`, in ascending key order. The returned keys carry
    /// no bucket prefix.
    fn iter_range(
        &self,
        column: DBColumn,
        gte: &[u8],
        lt: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error>;
}

/// An item that may be stored in the database.
pub trait StoreItem: Sized {
    /// Identifies which column this item should be placed in.
    fn db_column() -> DBColumn;

    /// Serialize `self` as bytes.
    fn as_store_bytes(&self) -> Vec<u8>;

    /// De-serialize `self` from bytes.
    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error>;
}

//! The engine boundary
//!
//! A [`StoreSession`] is an opened object store. Every method opens its own
//! transaction; nothing here caches transactions or cursors between calls.
//! Futures are resolved by the engine's completion events and are `!Send`
//! on single-threaded engines, so the traits use plain `async fn`.

use serde_json::Value;

use crate::error::StoreResult;
use crate::key::Key;
use crate::key_range::KeyRange;

/// Transaction mode requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Cursor direction.
///
/// The unique variants visit each distinct index key once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    NextUnique,
    Prev,
    PrevUnique,
}

impl Direction {
    pub fn is_reverse(self) -> bool {
        matches!(self, Direction::Prev | Direction::PrevUnique)
    }

    pub fn is_unique(self) -> bool {
        matches!(self, Direction::NextUnique | Direction::PrevUnique)
    }

    /// Engine token for the direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::NextUnique => "nextunique",
            Direction::Prev => "prev",
            Direction::PrevUnique => "prevunique",
        }
    }
}

/// What a cursor or count probe runs over.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarget {
    /// `None` scans the object store by primary key
    pub index: Option<String>,
    pub range: Option<KeyRange>,
    pub direction: Direction,
}

impl ScanTarget {
    pub fn store() -> Self {
        Self {
            index: None,
            range: None,
            direction: Direction::Next,
        }
    }
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// `key` is required for out-of-line stores without auto-increment
    Put { key: Option<Key>, value: Value },
    Remove { key: Key },
}

/// An opened object store.
#[allow(async_fn_in_trait)]
pub trait StoreSession {
    type Cursor: CursorHandle;

    /// Database name, for diagnostics.
    fn name(&self) -> &str;

    /// Names of the indexes on the store.
    fn index_names(&self) -> Vec<String>;

    /// Open a cursor in its own transaction. `None` when nothing matches.
    async fn open_cursor(
        &self,
        target: &ScanTarget,
        mode: TransactionMode,
    ) -> StoreResult<Option<Self::Cursor>>;

    /// Count matching records.
    ///
    /// Resolves once the transaction completes. `Ok(None)` means the
    /// transaction completed without ever delivering a count.
    async fn count(&self, index: Option<&str>, range: Option<&KeyRange>) -> StoreResult<Option<u64>>;

    /// Insert or replace a record, returning its key.
    async fn put(&self, key: Option<Key>, value: Value) -> StoreResult<Key>;

    async fn get(&self, key: &Key) -> StoreResult<Option<Value>>;

    /// Every record in primary key order.
    async fn get_all(&self) -> StoreResult<Vec<Value>>;

    /// Delete a record. Deleting a missing key is not an error.
    async fn remove(&self, key: &Key) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;

    /// Apply every operation in one read-write transaction. Any failure
    /// aborts the whole batch. Returns the key of each put, `None` for removes.
    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<Vec<Option<Key>>>;

    /// Look up several keys in one read-only transaction.
    async fn get_batch(&self, keys: &[Key]) -> StoreResult<Vec<Option<Value>>>;
}

/// A positioned cursor inside an open transaction.
#[allow(async_fn_in_trait)]
pub trait CursorHandle {
    /// Key at the current position (index key when iterating an index).
    fn key(&self) -> &Key;

    fn primary_key(&self) -> &Key;

    /// Record at the current position, as read when the cursor arrived.
    fn value(&self) -> &Value;

    /// Replace the record at the current position.
    fn update(&mut self, value: Value) -> StoreResult<()>;

    /// Delete the record at the current position.
    fn delete(&mut self) -> StoreResult<()>;

    /// Move `count` positions forward in the cursor's direction.
    /// Returns `false` once the cursor runs past the last match.
    async fn advance(&mut self, count: u32) -> StoreResult<bool>;
}

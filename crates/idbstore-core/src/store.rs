//! The store facade
//!
//! [`Store`] wraps an opened [`StoreSession`] and exposes the whole API:
//! pass-through CRUD, batches, iteration, queries and counts.

use serde_json::Value;
use tracing::error;

use crate::error::StoreResult;
use crate::iterate::{self, CursorRecord, IterationOptions, IterationSummary, Step};
use crate::key::Key;
use crate::query::{self, CountOptions};
use crate::session::{BatchOp, StoreSession};

/// How [`Store::get_batch`] reports keys with no record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GetBatchMode {
    /// Keep a `None` hole at the missing key's position
    #[default]
    Sparse,
    /// Drop missing records, so positions no longer line up with keys
    Skip,
}

/// An opened object store.
pub struct Store<S> {
    session: S,
}

impl<S: StoreSession> Store<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn name(&self) -> &str {
        self.session.name()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.session.index_names()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.session.index_names().iter().any(|n| n == name)
    }

    // ========================================================================
    // Single-record operations
    // ========================================================================

    /// Insert or replace a record, returning its key.
    pub async fn put(&self, value: Value) -> StoreResult<Key> {
        self.report(self.session.put(None, value).await)
    }

    /// Insert or replace a record under an explicit key (out-of-line stores).
    pub async fn put_with_key(&self, key: impl Into<Key>, value: Value) -> StoreResult<Key> {
        self.report(self.session.put(Some(key.into()), value).await)
    }

    pub async fn get(&self, key: impl Into<Key>) -> StoreResult<Option<Value>> {
        self.report(self.session.get(&key.into()).await)
    }

    pub async fn get_all(&self) -> StoreResult<Vec<Value>> {
        self.report(self.session.get_all().await)
    }

    pub async fn remove(&self, key: impl Into<Key>) -> StoreResult<()> {
        self.report(self.session.remove(&key.into()).await)
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.report(self.session.clear().await)
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Apply puts and removes atomically.
    pub async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<Vec<Option<Key>>> {
        self.report(self.session.batch(ops).await)
    }

    /// Put every value in one transaction.
    pub async fn put_batch(&self, values: Vec<Value>) -> StoreResult<()> {
        self.upsert_batch(values).await.map(|_| ())
    }

    /// Put every value in one transaction, returning the keys in order.
    pub async fn upsert_batch(&self, values: Vec<Value>) -> StoreResult<Vec<Key>> {
        let ops = values
            .into_iter()
            .map(|value| BatchOp::Put { key: None, value })
            .collect();
        let keys = self.batch(ops).await?;
        Ok(keys.into_iter().flatten().collect())
    }

    pub async fn remove_batch(&self, keys: Vec<Key>) -> StoreResult<()> {
        let ops = keys.into_iter().map(|key| BatchOp::Remove { key }).collect();
        self.batch(ops).await.map(|_| ())
    }

    pub async fn get_batch(&self, keys: &[Key], mode: GetBatchMode) -> StoreResult<Vec<Option<Value>>> {
        let values = self.report(self.session.get_batch(keys).await)?;
        Ok(match mode {
            GetBatchMode::Sparse => values,
            GetBatchMode::Skip => values.into_iter().filter(Option::is_some).collect(),
        })
    }

    // ========================================================================
    // Iteration and queries
    // ========================================================================

    /// See [`iterate::iterate`].
    pub async fn iterate<F>(&self, options: &IterationOptions, on_record: F) -> StoreResult<IterationSummary>
    where
        F: FnMut(&mut CursorRecord<'_, S::Cursor>) -> StoreResult<()>,
    {
        self.report(iterate::iterate(&self.session, options, on_record).await)
    }

    /// See [`iterate::for_each_step`].
    pub async fn for_each_step<F>(&self, options: &IterationOptions, on_step: F) -> StoreResult<IterationSummary>
    where
        F: FnMut(Step<'_, S::Cursor>) -> StoreResult<()>,
    {
        self.report(iterate::for_each_step(&self.session, options, on_step).await)
    }

    /// Open a lazy sequence to drive by hand.
    pub async fn matches(&self, options: &IterationOptions) -> StoreResult<iterate::MatchSequence<S::Cursor>> {
        self.report(iterate::MatchSequence::open(&self.session, options).await)
    }

    pub async fn query(&self, options: &IterationOptions) -> StoreResult<Vec<Value>> {
        self.report(query::query(&self.session, options).await)
    }

    pub async fn query_filtered<F>(&self, options: &IterationOptions, filter: F) -> StoreResult<Vec<Value>>
    where
        F: FnMut(&Value) -> bool,
    {
        self.report(query::query_filtered(&self.session, options, filter).await)
    }

    /// Count matching records. Failures are logged by [`query::count`].
    pub async fn count(&self, options: &CountOptions) -> StoreResult<u64> {
        query::count(&self.session, options).await
    }

    fn report<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        result.inspect_err(|e| error!(store = self.session.name(), "{e}"))
    }
}

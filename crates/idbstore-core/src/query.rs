//! Terminal queries built on the cursor iterator

use serde_json::Value;
use tracing::{debug, error};

use crate::error::{StoreError, StoreResult};
use crate::iterate::{iterate, IterationOptions};
use crate::key_range::KeyRange;
use crate::session::StoreSession;

/// Collect every match of a pass, in cursor order.
///
/// An empty range resolves to an empty vector.
pub async fn query<S: StoreSession>(
    session: &S,
    options: &IterationOptions,
) -> StoreResult<Vec<Value>> {
    query_filtered(session, options, |_| true).await
}

/// Collect the matches of a pass for which `filter` returns true.
///
/// `offset` and `limit` apply to the cursor, before the filter.
pub async fn query_filtered<S, F>(
    session: &S,
    options: &IterationOptions,
    mut filter: F,
) -> StoreResult<Vec<Value>>
where
    S: StoreSession,
    F: FnMut(&Value) -> bool,
{
    let mut matches = Vec::new();
    iterate(session, options, |record| {
        if filter(record.value()) {
            matches.push(record.value().clone());
        }
        Ok(())
    })
    .await?;
    debug!(store = session.name(), matched = matches.len(), "query complete");
    Ok(matches)
}

/// Selection for a count probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountOptions {
    pub index: Option<String>,
    pub key_range: Option<KeyRange>,
}

impl CountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn key_range(mut self, range: KeyRange) -> Self {
        self.key_range = Some(range);
        self
    }
}

/// Count matching records without iterating them.
///
/// # Errors
///
/// `StoreError::Transaction` when the count transaction aborts, errors, or
/// completes without a result. A failed count never resolves to zero.
pub async fn count<S: StoreSession>(session: &S, options: &CountOptions) -> StoreResult<u64> {
    let result = session
        .count(options.index.as_deref(), options.key_range.as_ref())
        .await
        .inspect_err(|e| error!(store = session.name(), "count failed: {e}"))?;

    result.ok_or_else(|| {
        let err = StoreError::Transaction("count transaction completed without a result".into());
        error!(store = session.name(), "{err}");
        err
    })
}

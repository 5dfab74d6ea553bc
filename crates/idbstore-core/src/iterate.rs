//! Cursor-driven iteration
//!
//! [`MatchSequence`] turns the engine's forward-only cursor into a lazy,
//! single-pass sequence of [`Step`]s. [`iterate`] and [`for_each_step`] drive
//! a sequence to completion and resolve exactly once.
//!
//! A pass cannot be cancelled from outside. It stops at exhaustion, at
//! `limit`, or when a callback returns an error; dropping the future
//! abandons the cursor and lets the engine's transaction finish.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::key::Key;
use crate::key_range::KeyRange;
use crate::session::{CursorHandle, Direction, ScanTarget, StoreSession, TransactionMode};

/// Sort order of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Order {
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

/// Options for one pass. Built per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationOptions {
    /// Iterate this index instead of the object store
    pub index: Option<String>,
    pub order: Order,
    /// Yield one record per distinct index key
    pub filter_duplicates: bool,
    pub key_range: Option<KeyRange>,
    /// Open the transaction read-write so records can be updated in place
    pub write_access: bool,
    /// Leading matches to skip
    pub offset: u32,
    /// Stop after this many records
    pub limit: Option<usize>,
}

impl IterationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn descending(self) -> Self {
        self.order(Order::Desc)
    }

    pub fn filter_duplicates(mut self) -> Self {
        self.filter_duplicates = true;
        self
    }

    pub fn key_range(mut self, range: KeyRange) -> Self {
        self.key_range = Some(range);
        self
    }

    pub fn write_access(mut self) -> Self {
        self.write_access = true;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn direction(&self) -> Direction {
        match (self.order, self.filter_duplicates) {
            (Order::Asc, false) => Direction::Next,
            (Order::Asc, true) => Direction::NextUnique,
            (Order::Desc, false) => Direction::Prev,
            (Order::Desc, true) => Direction::PrevUnique,
        }
    }

    pub fn mode(&self) -> TransactionMode {
        if self.write_access {
            TransactionMode::ReadWrite
        } else {
            TransactionMode::ReadOnly
        }
    }

    pub fn target(&self) -> ScanTarget {
        ScanTarget {
            index: self.index.clone(),
            range: self.key_range.clone(),
            direction: self.direction(),
        }
    }
}

/// One element of a pass: a record, or the end of the sequence.
pub enum Step<'a, C> {
    Record(CursorRecord<'a, C>),
    End,
}

impl<C> Step<'_, C> {
    pub fn is_end(&self) -> bool {
        matches!(self, Step::End)
    }
}

/// The record under the cursor, with the operations allowed on it.
///
/// Updates and deletes apply through the pass's own transaction, so they
/// need `write_access`.
pub struct CursorRecord<'a, C> {
    cursor: &'a mut C,
    advance_by: &'a mut u32,
}

impl<C: CursorHandle> CursorRecord<'_, C> {
    pub fn value(&self) -> &Value {
        self.cursor.value()
    }

    pub fn key(&self) -> &Key {
        self.cursor.key()
    }

    pub fn primary_key(&self) -> &Key {
        self.cursor.primary_key()
    }

    pub fn update(&mut self, value: Value) -> StoreResult<()> {
        self.cursor.update(value)
    }

    pub fn delete(&mut self) -> StoreResult<()> {
        self.cursor.delete()
    }

    /// Move `count` positions (at least one) instead of one on the next step.
    pub fn advance(&mut self, count: u32) {
        *self.advance_by = count.max(1);
    }
}

/// A lazy, single-use sequence of matches over one cursor.
///
/// Once it has yielded [`Step::End`] or an error it is terminated and keeps
/// yielding `End`; start a new pass for fresh results.
pub struct MatchSequence<C> {
    cursor: Option<C>,
    started: bool,
    advance_by: u32,
    remaining: Option<usize>,
    delivered: usize,
}

impl<C: CursorHandle> MatchSequence<C> {
    /// Open the cursor described by `options`, applying `offset`.
    pub async fn open<S>(session: &S, options: &IterationOptions) -> StoreResult<Self>
    where
        S: StoreSession<Cursor = C>,
    {
        let target = options.target();
        debug!(
            store = session.name(),
            index = ?target.index,
            direction = target.direction.as_str(),
            "opening cursor"
        );
        let mut cursor = session
            .open_cursor(&target, options.mode())
            .await
            .inspect_err(|e| warn!(store = session.name(), "failed to open cursor: {e}"))?;

        if options.offset > 0 {
            if let Some(open) = cursor.as_mut() {
                let more = open
                    .advance(options.offset)
                    .await
                    .inspect_err(|e| warn!(store = session.name(), "failed to apply offset: {e}"))?;
                if !more {
                    cursor = None;
                }
            }
        }

        Ok(Self {
            cursor,
            started: false,
            advance_by: 1,
            remaining: options.limit,
            delivered: 0,
        })
    }

    /// Records delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn is_terminated(&self) -> bool {
        self.cursor.is_none()
    }

    /// Advance to the next match.
    ///
    /// The returned record borrows the sequence; the cursor moves only when
    /// `next` is called again.
    pub async fn next(&mut self) -> StoreResult<Step<'_, C>> {
        if !self.position().await? {
            return Ok(Step::End);
        }
        match self.cursor.as_mut() {
            Some(cursor) => Ok(Step::Record(CursorRecord {
                cursor,
                advance_by: &mut self.advance_by,
            })),
            None => Ok(Step::End),
        }
    }

    /// Move the cursor onto the next record to deliver. Terminates the
    /// sequence on exhaustion, limit, or error.
    async fn position(&mut self) -> StoreResult<bool> {
        if self.remaining == Some(0) {
            self.cursor = None;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };

        if self.started {
            match cursor.advance(self.advance_by).await {
                Ok(true) => {}
                Ok(false) => {
                    self.cursor = None;
                    return Ok(false);
                }
                Err(e) => {
                    self.cursor = None;
                    warn!("cursor failed to advance: {e}");
                    return Err(e);
                }
            }
        }

        self.started = true;
        self.advance_by = 1;
        self.delivered += 1;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(true)
    }
}

/// Outcome of a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationSummary {
    pub delivered: usize,
}

/// Run one pass, calling `on_record` for every match in cursor order.
///
/// Resolves `Ok` at the end of the sequence. An error from the engine or
/// from `on_record` ends the pass and is returned; no record is delivered
/// after it.
pub async fn iterate<S, F>(
    session: &S,
    options: &IterationOptions,
    mut on_record: F,
) -> StoreResult<IterationSummary>
where
    S: StoreSession,
    F: FnMut(&mut CursorRecord<'_, S::Cursor>) -> StoreResult<()>,
{
    let mut sequence = MatchSequence::open(session, options).await?;
    loop {
        match sequence.next().await? {
            Step::Record(mut record) => on_record(&mut record)?,
            Step::End => break,
        }
    }
    debug!(store = session.name(), delivered = sequence.delivered(), "pass complete");
    Ok(IterationSummary {
        delivered: sequence.delivered(),
    })
}

/// Run one pass, handing every step to `on_step`, including exactly one
/// final [`Step::End`].
///
/// For callers that treat the end of the sequence as one more step rather
/// than as the resolution of the call.
pub async fn for_each_step<S, F>(
    session: &S,
    options: &IterationOptions,
    mut on_step: F,
) -> StoreResult<IterationSummary>
where
    S: StoreSession,
    F: FnMut(Step<'_, S::Cursor>) -> StoreResult<()>,
{
    let mut sequence = MatchSequence::open(session, options).await?;
    loop {
        let step = sequence.next().await?;
        let end = step.is_end();
        on_step(step)?;
        if end {
            break;
        }
    }
    Ok(IterationSummary {
        delivered: sequence.delivered(),
    })
}

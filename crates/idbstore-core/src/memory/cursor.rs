//! Cursors over the in-memory engine
//!
//! A cursor remembers only its position (key, primary key). Every step
//! re-seeks from that position, so updates and deletes made through the
//! cursor, or anywhere else in the transaction, are seen by later steps.

use std::cell::RefCell;
use std::ops::Bound;
use std::rc::Rc;

use serde_json::Value;

use super::object_store::{MemoryIndex, ObjectStoreData};
use super::{Fault, MemoryDatabase};
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::session::{CursorHandle, Direction, ScanTarget, TransactionMode};

type Entry<'a> = (&'a Key, &'a Key);

pub struct MemoryCursor {
    db: Rc<RefCell<MemoryDatabase>>,
    store_name: String,
    target: ScanTarget,
    mode: TransactionMode,
    faults: Rc<RefCell<Vec<Fault>>>,
    key: Key,
    primary_key: Key,
    value: Value,
}

impl MemoryCursor {
    /// Position a new cursor on the first match, `None` if there is none.
    pub(crate) fn open(
        db: Rc<RefCell<MemoryDatabase>>,
        store_name: String,
        target: ScanTarget,
        mode: TransactionMode,
        faults: Rc<RefCell<Vec<Fault>>>,
    ) -> StoreResult<Option<Self>> {
        let first = {
            let db = db.borrow();
            let store = db.store(&store_name)?;
            seek(store, &target, None)?
        };
        let Some((key, primary_key)) = first else {
            return Ok(None);
        };

        let mut cursor = Self {
            db,
            store_name,
            target,
            mode,
            faults,
            key,
            primary_key,
            value: Value::Null,
        };
        cursor.load_value()?;
        Ok(Some(cursor))
    }

    fn load_value(&mut self) -> StoreResult<()> {
        let db = self.db.borrow();
        let store = db.store(&self.store_name)?;
        self.value = store
            .records
            .get(&self.primary_key)
            .cloned()
            .ok_or_else(|| StoreError::Cursor(format!("record {} vanished", self.primary_key)))?;
        Ok(())
    }

    fn writable(&self, op: &str) -> StoreResult<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(StoreError::ReadOnly(format!(
                "cannot {op} through a cursor opened without write access"
            ))),
        }
    }
}

impl CursorHandle for MemoryCursor {
    fn key(&self) -> &Key {
        &self.key
    }

    fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn update(&mut self, value: Value) -> StoreResult<()> {
        self.writable("update")?;
        let mut db = self.db.borrow_mut();
        db.store_mut(&self.store_name)?
            .replace(&self.primary_key, value)
    }

    fn delete(&mut self) -> StoreResult<()> {
        self.writable("delete")?;
        let mut db = self.db.borrow_mut();
        db.store_mut(&self.store_name)?.remove(&self.primary_key);
        Ok(())
    }

    async fn advance(&mut self, count: u32) -> StoreResult<bool> {
        if super::take_fault(&self.faults, Fault::FailAdvance) {
            return Err(StoreError::Cursor("cursor failed to advance".into()));
        }

        for _ in 0..count.max(1) {
            let next = {
                let db = self.db.borrow();
                let store = db.store(&self.store_name)?;
                seek(store, &self.target, Some((&self.key, &self.primary_key)))?
            };
            match next {
                Some((key, primary_key)) => {
                    self.key = key;
                    self.primary_key = primary_key;
                }
                None => return Ok(false),
            }
        }
        self.load_value()?;
        Ok(true)
    }
}

/// Find the next position after `from` (or the first position) for the
/// target's direction and range.
pub(crate) fn seek(
    store: &ObjectStoreData,
    target: &ScanTarget,
    from: Option<Entry<'_>>,
) -> StoreResult<Option<(Key, Key)>> {
    let index = match &target.index {
        Some(name) => Some(
            store
                .indexes
                .get(name)
                .ok_or_else(|| StoreError::Cursor(format!("index \"{name}\" does not exist")))?,
        ),
        None => None,
    };

    let reverse = target.direction.is_reverse();
    let range = target.range.as_ref();
    let before_start = |k: &Key| range.is_some_and(|r| if reverse { r.is_above(k) } else { r.is_below(k) });
    let past_end = |k: &Key| range.is_some_and(|r| if reverse { r.is_below(k) } else { r.is_above(k) });
    let start = match from {
        Some((k, pk)) => Bound::Excluded((k.clone(), pk.clone())),
        None => Bound::Unbounded,
    };

    let mut candidates = entries(store, index, start, reverse)
        .filter(|&(k, _)| match (from, target.direction.is_unique()) {
            (Some((current, _)), true) => k != current,
            _ => true,
        })
        .skip_while(|&(k, _)| before_start(k))
        .take_while(|&(k, _)| !past_end(k));

    let Some((key, mut primary_key)) = candidates.next() else {
        return Ok(None);
    };
    // prevunique lands on the lowest primary key of the key it reaches
    if target.direction == Direction::PrevUnique {
        for (k, pk) in candidates {
            if k != key {
                break;
            }
            primary_key = pk;
        }
    }
    Ok(Some((key.clone(), primary_key.clone())))
}

/// Entries of an index, or of the store by primary key, walked from `start`
/// in the requested direction.
fn entries<'a>(
    store: &'a ObjectStoreData,
    index: Option<&'a MemoryIndex>,
    start: Bound<(Key, Key)>,
    reverse: bool,
) -> Box<dyn Iterator<Item = Entry<'a>> + 'a> {
    match (index, reverse) {
        (Some(index), false) => Box::new(
            index
                .entries
                .range((start, Bound::Unbounded))
                .map(|(k, pk)| (k, pk)),
        ),
        (Some(index), true) => Box::new(
            index
                .entries
                .range((Bound::Unbounded, start))
                .rev()
                .map(|(k, pk)| (k, pk)),
        ),
        (None, false) => Box::new(
            store
                .records
                .range((primary_bound(start), Bound::Unbounded))
                .map(|(k, _)| (k, k)),
        ),
        (None, true) => Box::new(
            store
                .records
                .range((Bound::Unbounded, primary_bound(start)))
                .rev()
                .map(|(k, _)| (k, k)),
        ),
    }
}

fn primary_bound(bound: Bound<(Key, Key)>) -> Bound<Key> {
    match bound {
        Bound::Included((_, pk)) => Bound::Included(pk),
        Bound::Excluded((_, pk)) => Bound::Excluded(pk),
        Bound::Unbounded => Bound::Unbounded,
    }
}

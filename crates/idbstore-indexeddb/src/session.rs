//! IndexedDB session implementing the engine contract
//!
//! Every operation runs in its own transaction on the configured object
//! store. A cursor pass keeps its transaction for as long as the pass runs.

use idbstore_core::schema::{IndexCatalog, ReconcileReport};
use idbstore_core::{
    BatchOp, Direction, Key, KeyRange, ScanTarget, StoreConfig, StoreError, StoreResult, StoreSession,
    TransactionMode,
};
use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{IdbCursorDirection, IdbDatabase, IdbObjectStore, IdbRequest, IdbTransaction, IdbTransactionMode};

use crate::convert::{js_to_key, js_to_value, key_to_js, optional_range, value_to_js};
use crate::cursor::IndexedDbCursor;
use crate::error::{describe, IndexedDbError};
use crate::idb;
use crate::schema::IdbSchema;

/// An opened IndexedDB object store.
///
/// All methods are async because IndexedDB is callback-based.
pub struct IndexedDbSession {
    db: IdbDatabase,
    name: String,
    store_name: String,
    upgrade: Option<ReconcileReport>,
}

impl IndexedDbSession {
    /// Open the configured store, upgrading the database when
    /// `config.db_version` is newer than the existing one.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let opened = idb::open_database(config).await?;
        Ok(Self {
            db: opened.db,
            name: config.db_name(),
            store_name: config.store_name.clone(),
            upgrade: opened.upgrade,
        })
    }

    /// What the upgrade did, `None` when the store opened at its current version.
    pub fn upgrade_report(&self) -> Option<&ReconcileReport> {
        self.upgrade.as_ref()
    }

    /// Close the database connection.
    pub fn close(&self) {
        self.db.close();
    }

    /// Delete a database by its full name (prefix included).
    pub async fn delete_database(db_name: &str) -> StoreResult<()> {
        idb::delete_database(db_name).await.map_err(StoreError::from)
    }

    fn begin(&self, mode: TransactionMode) -> StoreResult<(IdbTransaction, IdbObjectStore)> {
        let mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        Ok(idb::begin_transaction(&self.db, &self.store_name, mode)?)
    }

    /// Run one request in its own transaction and wait for both.
    async fn single(
        &self,
        mode: TransactionMode,
        make: impl FnOnce(&IdbObjectStore) -> Result<IdbRequest, JsValue>,
    ) -> StoreResult<JsValue> {
        let (tx, store) = self.begin(mode)?;
        let req = make(&store).map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(result)
    }
}

fn cursor_direction(direction: Direction) -> IdbCursorDirection {
    match direction {
        Direction::Next => IdbCursorDirection::Next,
        Direction::NextUnique => IdbCursorDirection::Nextunique,
        Direction::Prev => IdbCursorDirection::Prev,
        Direction::PrevUnique => IdbCursorDirection::Prevunique,
    }
}

fn values_from_array(result: &JsValue) -> StoreResult<Vec<Value>> {
    js_sys::Array::from(result)
        .iter()
        .map(|v| js_to_value(&v).map_err(StoreError::from))
        .collect()
}

impl StoreSession for IndexedDbSession {
    type Cursor = IndexedDbCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn index_names(&self) -> Vec<String> {
        match self.begin(TransactionMode::ReadOnly) {
            Ok((_tx, store)) => IdbSchema::new(store).index_names(),
            Err(e) => {
                warn!(store = %self.store_name, "cannot list indexes: {e}");
                Vec::new()
            }
        }
    }

    async fn open_cursor(
        &self,
        target: &ScanTarget,
        mode: TransactionMode,
    ) -> StoreResult<Option<IndexedDbCursor>> {
        let (tx, store) = self.begin(mode)?;
        let range = optional_range(target.range.as_ref())?;
        let direction = cursor_direction(target.direction);

        let request = match &target.index {
            Some(name) => store
                .index(name)
                .map_err(|e| StoreError::Cursor(format!("index \"{name}\": {}", describe(&e))))?
                .open_cursor_with_range_and_direction(&range, direction),
            None => store.open_cursor_with_range_and_direction(&range, direction),
        }
        .map_err(|e| StoreError::Cursor(describe(&e)))?;

        IndexedDbCursor::open(request, tx, mode).await
    }

    async fn count(&self, index: Option<&str>, range: Option<&KeyRange>) -> StoreResult<Option<u64>> {
        let (tx, store) = self.begin(TransactionMode::ReadOnly)?;
        let range = optional_range(range)?;

        let request = match index {
            Some(name) => store
                .index(name)
                .map_err(|e| StoreError::Transaction(format!("index \"{name}\": {}", describe(&e))))?
                .count_with_key(&range),
            None => store.count_with_key(&range),
        }
        .map_err(|e| StoreError::Transaction(describe(&e)))?;

        let counted = idb::await_request(&request)
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        idb::await_transaction(&tx).await?;
        Ok(counted.as_f64().map(|n| n as u64))
    }

    async fn put(&self, key: Option<Key>, value: Value) -> StoreResult<Key> {
        let js = value_to_js(&value)?;
        let result = self
            .single(TransactionMode::ReadWrite, |store| match &key {
                Some(key) => store.put_with_key(&js, &key_to_js(key)),
                None => store.put(&js),
            })
            .await?;
        Ok(js_to_key(&result)?)
    }

    async fn get(&self, key: &Key) -> StoreResult<Option<Value>> {
        let result = self
            .single(TransactionMode::ReadOnly, |store| store.get(&key_to_js(key)))
            .await?;
        if result.is_undefined() {
            return Ok(None);
        }
        Ok(Some(js_to_value(&result)?))
    }

    async fn get_all(&self) -> StoreResult<Vec<Value>> {
        let result = self
            .single(TransactionMode::ReadOnly, |store| store.get_all())
            .await?;
        values_from_array(&result)
    }

    async fn remove(&self, key: &Key) -> StoreResult<()> {
        self.single(TransactionMode::ReadWrite, |store| store.delete(&key_to_js(key)))
            .await?;
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.single(TransactionMode::ReadWrite, |store| store.clear())
            .await?;
        Ok(())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<Vec<Option<Key>>> {
        let (tx, store) = self.begin(TransactionMode::ReadWrite)?;
        let total = ops.len();
        let mut keys = Vec::with_capacity(total);

        for op in ops {
            let applied = apply(&store, op).await;
            match applied {
                Ok(key) => keys.push(key),
                Err(e) => {
                    // a failed request aborts on its own; abort covers conversion errors
                    let _ = tx.abort();
                    warn!(store = %self.store_name, done = keys.len(), total, "batch aborted: {e}");
                    return Err(e);
                }
            }
        }

        idb::await_transaction(&tx).await?;
        debug!(store = %self.store_name, total, "batch committed");
        Ok(keys)
    }

    async fn get_batch(&self, keys: &[Key]) -> StoreResult<Vec<Option<Value>>> {
        let (tx, store) = self.begin(TransactionMode::ReadOnly)?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let req = store.get(&key_to_js(key)).map_err(IndexedDbError::from)?;
            let result = idb::await_request(&req).await?;
            values.push(if result.is_undefined() {
                None
            } else {
                Some(js_to_value(&result)?)
            });
        }
        idb::await_transaction(&tx).await?;
        Ok(values)
    }
}

async fn apply(store: &IdbObjectStore, op: BatchOp) -> StoreResult<Option<Key>> {
    match op {
        BatchOp::Put { key, value } => {
            let js = value_to_js(&value)?;
            let req = match &key {
                Some(key) => store.put_with_key(&js, &key_to_js(key)),
                None => store.put(&js),
            }
            .map_err(IndexedDbError::from)?;
            let result = idb::await_request(&req).await?;
            Ok(Some(js_to_key(&result)?))
        }
        BatchOp::Remove { key } => {
            let req = store.delete(&key_to_js(&key)).map_err(IndexedDbError::from)?;
            idb::await_request(&req).await?;
            Ok(None)
        }
    }
}

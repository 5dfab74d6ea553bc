//! `IDBCursorWithValue` behind the cursor capability

use idbstore_core::{CursorHandle, Key, StoreError, StoreResult, TransactionMode};
use serde_json::Value;
use wasm_bindgen::JsCast;
use web_sys::{IdbCursorWithValue, IdbRequest, IdbTransaction};

use crate::convert::{js_to_key, js_to_value, value_to_js};
use crate::error::IndexedDbError;
use crate::idb;

/// A positioned cursor. The request it came from fires again after every
/// `advance`, so each step awaits that same request.
pub struct IndexedDbCursor {
    request: IdbRequest,
    cursor: IdbCursorWithValue,
    // keeps the transaction reachable for the life of the pass
    _tx: IdbTransaction,
    mode: TransactionMode,
    key: Key,
    primary_key: Key,
    value: Value,
}

impl IndexedDbCursor {
    /// Await the first result of a cursor request, `None` when nothing matches.
    pub(crate) async fn open(
        request: IdbRequest,
        tx: IdbTransaction,
        mode: TransactionMode,
    ) -> StoreResult<Option<Self>> {
        let result = idb::await_request(&request).await.map_err(cursor_error)?;
        let Some(cursor) = as_cursor(result) else {
            return Ok(None);
        };
        let mut opened = Self {
            request,
            cursor,
            _tx: tx,
            mode,
            key: Key::Number(0.0),
            primary_key: Key::Number(0.0),
            value: Value::Null,
        };
        opened.load()?;
        Ok(Some(opened))
    }

    fn load(&mut self) -> StoreResult<()> {
        self.key = js_to_key(&self.cursor.key().map_err(IndexedDbError::from)?)?;
        self.primary_key = js_to_key(&self.cursor.primary_key().map_err(IndexedDbError::from)?)?;
        self.value = js_to_value(&self.cursor.value().map_err(IndexedDbError::from)?)?;
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

fn as_cursor(result: wasm_bindgen::JsValue) -> Option<IdbCursorWithValue> {
    if result.is_null() || result.is_undefined() {
        return None;
    }
    result.dyn_into::<IdbCursorWithValue>().ok()
}

fn cursor_error(err: IndexedDbError) -> StoreError {
    match StoreError::from(err) {
        StoreError::Backend(msg) => StoreError::Cursor(msg),
        other => other,
    }
}

impl CursorHandle for IndexedDbCursor {
    fn key(&self) -> &Key {
        &self.key
    }

    fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    fn value(&self) -> &Value {
        &self.value
    }

    /// Queues the update in the pass's transaction. A request that fails
    /// later aborts the transaction, which the next `advance` reports.
    fn update(&mut self, value: Value) -> StoreResult<()> {
        self.writable("update")?;
        let js = value_to_js(&value)?;
        self.cursor.update(&js).map_err(IndexedDbError::from)?;
        self.value = value;
        Ok(())
    }

    fn delete(&mut self) -> StoreResult<()> {
        self.writable("delete")?;
        self.cursor.delete().map_err(IndexedDbError::from)?;
        Ok(())
    }

    async fn advance(&mut self, count: u32) -> StoreResult<bool> {
        self.cursor
            .advance(count.max(1))
            .map_err(|e| cursor_error(IndexedDbError::from(e)))?;
        let result = idb::await_request(&self.request).await.map_err(cursor_error)?;
        match as_cursor(result) {
            Some(cursor) => {
                self.cursor = cursor;
                self.load()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

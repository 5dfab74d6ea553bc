//! Browser bindings using wasm-bindgen and IndexedDB storage
//!
//! `IdbStore` is an opened object store exposed to JavaScript. Records, keys
//! and options cross the boundary as JSON strings; every method returns a
//! Promise.
//!
//! ```js
//! const store = await IdbStore.open('{"storeName": "people", "indexes": [{"name": "age"}]}');
//! await store.put('{"name": "Ada", "age": 36}');
//! const adults = JSON.parse(await store.query('{"index": "age", "keyRange": {"lower": 18}}'));
//! ```

use std::rc::Rc;

use idbstore_core::{Key, StoreConfig, StoreError};
use idbstore_indexeddb::{open_store, IndexedDbSession, IndexedDbStore};
use js_sys::Promise;
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::request::{CountRequest, QueryRequest};

fn to_js(err: StoreError) -> JsValue {
    JsValue::from_str(&format!("Store error: {}", err))
}

fn parse_json(json: &str) -> Result<Value, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

fn parse_key(json: &str) -> Result<Key, JsValue> {
    Key::try_from(parse_json(json)?).map_err(to_js)
}

fn to_json_string<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_json::to_string(value)
        .map(|s| JsValue::from_str(&s))
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// An opened IndexedDB object store.
#[wasm_bindgen]
pub struct IdbStore {
    inner: Rc<IndexedDbStore>,
}

#[wasm_bindgen]
impl IdbStore {
    /// Open (and if needed upgrade) the store described by a JSON config.
    /// An empty string opens the default store.
    pub async fn open(config_json: &str) -> Result<IdbStore, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let config = if config_json.trim().is_empty() {
            StoreConfig::default()
        } else {
            StoreConfig::from_json(config_json).map_err(to_js)?
        };
        let store = open_store(&config).await.map_err(to_js)?;
        Ok(IdbStore {
            inner: Rc::new(store),
        })
    }

    /// Full database name (prefix included).
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Insert or replace a record. Resolves to the record's key as JSON.
    pub fn put(&self, record_json: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let record = parse_json(&record_json)?;
            let key = store.put(record).await.map_err(to_js)?;
            to_json_string(&key)
        })
    }

    /// Resolves to the record as JSON, or `null` when the key is absent.
    pub fn get(&self, key_json: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let key = parse_key(&key_json)?;
            match store.get(key).await.map_err(to_js)? {
                Some(record) => to_json_string(&record),
                None => Ok(JsValue::NULL),
            }
        })
    }

    /// Resolves to a JSON array of every record in key order.
    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let records = store.get_all().await.map_err(to_js)?;
            to_json_string(&records)
        })
    }

    pub fn remove(&self, key_json: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let key = parse_key(&key_json)?;
            store.remove(key).await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn clear(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            store.clear().await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Run a query. See `QueryRequest` for the options; resolves to a JSON
    /// array of matching records.
    pub fn query(&self, options_json: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let options = QueryRequest::from_json(&options_json)
                .and_then(QueryRequest::into_options)
                .map_err(to_js)?;
            let records = store.query(&options).await.map_err(to_js)?;
            to_json_string(&records)
        })
    }

    /// Count matching records. Rejects when the count transaction fails.
    pub fn count(&self, options_json: String) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let options = CountRequest::from_json(&options_json)
                .and_then(CountRequest::into_options)
                .map_err(to_js)?;
            let count = store.count(&options).await.map_err(to_js)?;
            Ok(JsValue::from_f64(count as f64))
        })
    }

    /// JSON array of the store's index names.
    #[wasm_bindgen(js_name = indexNames)]
    pub fn index_names(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.index_names())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Close this store and delete its database.
    #[wasm_bindgen(js_name = deleteDatabase)]
    pub fn delete_database(&self) -> Promise {
        let store = self.inner.clone();
        future_to_promise(async move {
            let name = store.name().to_string();
            store.session().close();
            IndexedDbSession::delete_database(&name).await.map_err(|e| {
                warn!(db = %name, "failed to delete database: {e}");
                to_js(e)
            })?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

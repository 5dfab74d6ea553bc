//! Index catalog over a live `IDBObjectStore`

use idbstore_core::key::KeyPath;
use idbstore_core::schema::{ActualIndex, IndexCatalog, NormalizedIndex, SchemaStore};
use idbstore_core::{StoreError, StoreResult};
use wasm_bindgen::prelude::*;
use web_sys::{IdbIndexParameters, IdbObjectStore};

use crate::convert::{js_to_key_path, key_path_to_js};
use crate::error::IndexedDbError;

/// An object store seen through the schema traits.
///
/// Creating and deleting indexes only works inside a versionchange
/// transaction; reads work in any transaction on the store.
pub struct IdbSchema {
    store: IdbObjectStore,
}

impl IdbSchema {
    pub fn new(store: IdbObjectStore) -> Self {
        Self { store }
    }
}

impl IndexCatalog for IdbSchema {
    fn index_names(&self) -> Vec<String> {
        let names = self.store.index_names();
        (0..names.length()).filter_map(|i| names.get(i)).collect()
    }

    fn index(&self, name: &str) -> StoreResult<Option<ActualIndex>> {
        if !self.store.index_names().contains(name) {
            return Ok(None);
        }
        let index = self.store.index(name).map_err(IndexedDbError::from)?;
        let key_path = index.key_path().map_err(IndexedDbError::from)?;

        // read the attribute directly: engines that predate multiEntry leave it undefined
        let multi_entry = js_sys::Reflect::get(&index, &"multiEntry".into())
            .ok()
            .and_then(|v| v.as_bool());

        Ok(Some(ActualIndex {
            name: index.name(),
            key_path: js_to_key_path(&key_path)?,
            unique: index.unique(),
            multi_entry,
        }))
    }
}

impl SchemaStore for IdbSchema {
    fn create_index(&mut self, index: &NormalizedIndex) -> StoreResult<()> {
        let params = IdbIndexParameters::new();
        js_sys::Reflect::set(&params, &"unique".into(), &JsValue::from_bool(index.unique))
            .map_err(IndexedDbError::from)?;
        js_sys::Reflect::set(
            &params,
            &"multiEntry".into(),
            &JsValue::from_bool(index.multi_entry),
        )
        .map_err(IndexedDbError::from)?;

        let created = match &index.key_path {
            KeyPath::Single(path) => self
                .store
                .create_index_with_str_and_optional_parameters(&index.name, path, &params),
            compound @ KeyPath::Compound(_) => self.store.create_index_with_str_sequence_and_optional_parameters(
                &index.name,
                &key_path_to_js(compound),
                &params,
            ),
        };
        created.map(|_| ()).map_err(|e| StoreError::from(IndexedDbError::from(e)))
    }

    fn delete_index(&mut self, name: &str) -> StoreResult<()> {
        self.store
            .delete_index(name)
            .map_err(|e| StoreError::from(IndexedDbError::from(e)))
    }
}

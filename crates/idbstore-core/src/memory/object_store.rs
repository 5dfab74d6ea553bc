//! Object store and index data for the in-memory engine

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::key::{Key, KeyPath};
use crate::key_range::KeyRange;
use crate::schema::{ActualIndex, IndexCatalog, NormalizedIndex, SchemaStore};

/// Largest key the generator may hand out (2^53).
const MAX_GENERATED_KEY: f64 = 9_007_199_254_740_992.0;

/// Sorts before every other key.
pub(crate) fn min_key() -> Key {
    Key::Number(f64::NEG_INFINITY)
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryIndex {
    pub(crate) meta: ActualIndex,
    /// (index key, primary key)
    pub(crate) entries: BTreeSet<(Key, Key)>,
}

impl MemoryIndex {
    /// Index keys a record contributes. A multiEntry index contributes each
    /// distinct valid element of an array value.
    fn keys_for(&self, record: &Value) -> Vec<Key> {
        if !self.meta.multi_entry.unwrap_or(false) {
            return self.meta.key_path.extract(record).into_iter().collect();
        }
        match self.meta.key_path.resolve(record) {
            Some(Value::Array(items)) => {
                let mut keys: Vec<Key> = items.iter().filter_map(Key::from_value).collect();
                keys.sort();
                keys.dedup();
                keys
            }
            Some(other) => Key::from_value(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// True when another record already holds `index_key`.
    fn is_taken(&self, index_key: &Key, primary_key: &Key) -> bool {
        self.entries
            .range((Bound::Included((index_key.clone(), min_key())), Bound::Unbounded))
            .take_while(|(k, _)| k == index_key)
            .any(|(_, pk)| pk != primary_key)
    }

    pub(crate) fn count(&self, range: Option<&KeyRange>) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| range.map_or(true, |r| r.contains(k)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectStoreData {
    pub(crate) key_path: Option<KeyPath>,
    auto_increment: bool,
    next_key: f64,
    pub(crate) records: BTreeMap<Key, Value>,
    pub(crate) indexes: BTreeMap<String, MemoryIndex>,
}

impl ObjectStoreData {
    pub(crate) fn new(key_path: Option<KeyPath>, auto_increment: bool) -> Self {
        Self {
            key_path,
            auto_increment,
            next_key: 1.0,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Insert or replace, deriving or generating the key as the store's key
    /// options require.
    pub(crate) fn put(&mut self, key: Option<Key>, mut value: Value) -> StoreResult<Key> {
        let key = match (self.key_path.clone(), key) {
            (Some(_), Some(_)) => {
                return Err(StoreError::InvalidKey(
                    "store uses in-line keys, an explicit key cannot be supplied".into(),
                ))
            }
            (Some(path), None) => match path.extract(&value) {
                Some(key) => key,
                None if self.auto_increment => {
                    let key = self.generate()?;
                    path.inject(&mut value, &key)?;
                    key
                }
                None => {
                    return Err(StoreError::InvalidKey(format!(
                        "record has no valid key at \"{path}\""
                    )))
                }
            },
            (None, Some(key)) => key,
            (None, None) if self.auto_increment => self.generate()?,
            (None, None) => {
                return Err(StoreError::InvalidKey(
                    "store uses out-of-line keys without auto-increment, a key is required".into(),
                ))
            }
        };
        self.insert(key.clone(), value)?;
        Ok(key)
    }

    /// Replace the record at an existing position, as a cursor update does.
    pub(crate) fn replace(&mut self, primary_key: &Key, value: Value) -> StoreResult<()> {
        if let Some(path) = &self.key_path {
            if path.extract(&value).as_ref() != Some(primary_key) {
                return Err(StoreError::InvalidKey(format!(
                    "updated record must keep its key {primary_key} at \"{path}\""
                )));
            }
        }
        self.insert(primary_key.clone(), value)
    }

    /// Write a record under `key`, maintaining every index. Unique
    /// constraints are checked before anything changes.
    fn insert(&mut self, key: Key, value: Value) -> StoreResult<()> {
        for index in self.indexes.values().filter(|i| i.meta.unique) {
            if let Some(taken) = index.keys_for(&value).iter().find(|ik| index.is_taken(ik, &key)) {
                return Err(StoreError::Constraint(format!(
                    "unique index \"{}\" already holds {taken}",
                    index.meta.name
                )));
            }
        }

        self.unindex(&key);
        for index in self.indexes.values_mut() {
            for index_key in index.keys_for(&value) {
                index.entries.insert((index_key, key.clone()));
            }
        }
        if self.auto_increment {
            if let Some(n) = key.as_number() {
                if n >= self.next_key {
                    self.next_key = (n.floor() + 1.0).min(MAX_GENERATED_KEY + 1.0);
                }
            }
        }
        self.records.insert(key, value);
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &Key) {
        self.unindex(key);
        self.records.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
    }

    pub(crate) fn count(&self, range: Option<&KeyRange>) -> usize {
        self.records
            .keys()
            .filter(|k| range.map_or(true, |r| r.contains(k)))
            .count()
    }

    fn unindex(&mut self, key: &Key) {
        let Some(old) = self.records.get(key) else {
            return;
        };
        for index in self.indexes.values_mut() {
            for index_key in index.keys_for(old) {
                index.entries.remove(&(index_key, key.clone()));
            }
        }
    }

    fn generate(&mut self) -> StoreResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(StoreError::Constraint("key generator is exhausted".into()));
        }
        let key = Key::Number(self.next_key);
        self.next_key += 1.0;
        Ok(key)
    }
}

impl IndexCatalog for ObjectStoreData {
    fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    fn index(&self, name: &str) -> StoreResult<Option<ActualIndex>> {
        Ok(self.indexes.get(name).map(|i| i.meta.clone()))
    }
}

impl SchemaStore for ObjectStoreData {
    fn create_index(&mut self, index: &NormalizedIndex) -> StoreResult<()> {
        if self.indexes.contains_key(&index.name) {
            return Err(StoreError::Constraint(format!(
                "index \"{}\" already exists",
                index.name
            )));
        }

        let mut built = MemoryIndex {
            meta: ActualIndex::from(index),
            entries: BTreeSet::new(),
        };
        for (primary_key, record) in &self.records {
            for index_key in built.keys_for(record) {
                if built.meta.unique && built.is_taken(&index_key, primary_key) {
                    return Err(StoreError::Constraint(format!(
                        "cannot build unique index \"{}\": {index_key} appears more than once",
                        index.name
                    )));
                }
                built.entries.insert((index_key, primary_key.clone()));
            }
        }
        self.indexes.insert(index.name.clone(), built);
        Ok(())
    }

    fn delete_index(&mut self, name: &str) -> StoreResult<()> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::Schema(format!("index \"{name}\" does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexDescriptor;
    use serde_json::json;

    fn store_with(indexes: &[IndexDescriptor]) -> ObjectStoreData {
        let mut store = ObjectStoreData::new(Some(KeyPath::from("id")), true);
        for descriptor in indexes {
            store.create_index(&descriptor.normalize().unwrap()).unwrap();
        }
        store
    }

    #[test]
    fn test_generated_keys_are_injected() {
        let mut store = store_with(&[]);
        let key = store.put(None, json!({"name": "a"})).unwrap();
        assert_eq!(key, Key::from(1));
        assert_eq!(store.records[&key], json!({"name": "a", "id": 1}));
    }

    #[test]
    fn test_explicit_numeric_key_bumps_generator() {
        let mut store = store_with(&[]);
        store.put(None, json!({"id": 10})).unwrap();
        assert_eq!(store.put(None, json!({})).unwrap(), Key::from(11));
    }

    #[test]
    fn test_unique_violation_leaves_store_untouched() {
        let mut store = store_with(&[IndexDescriptor::new("email").unique()]);
        store.put(None, json!({"id": 1, "email": "a@x"})).unwrap();

        let err = store.put(None, json!({"id": 2, "email": "a@x"})).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.records.len(), 1);
        assert_eq!(store.indexes["email"].entries.len(), 1);

        // replacing the holder itself is fine
        store.put(None, json!({"id": 1, "email": "a@x", "v": 2})).unwrap();
    }

    #[test]
    fn test_multi_entry_dedups_elements() {
        let mut store = store_with(&[IndexDescriptor::new("tags").multi_entry()]);
        store
            .put(None, json!({"id": 1, "tags": ["b", "a", "b", {"bad": true}]}))
            .unwrap();
        let entries: Vec<_> = store.indexes["tags"].entries.iter().cloned().collect();
        assert_eq!(
            entries,
            vec![
                (Key::from("a"), Key::from(1)),
                (Key::from("b"), Key::from(1)),
            ]
        );
    }

    #[test]
    fn test_replace_reindexes() {
        let mut store = store_with(&[IndexDescriptor::new("city")]);
        store.put(None, json!({"id": 1, "city": "oslo"})).unwrap();
        store.replace(&Key::from(1), json!({"id": 1, "city": "rome"})).unwrap();

        let entries: Vec<_> = store.indexes["city"].entries.iter().cloned().collect();
        assert_eq!(entries, vec![(Key::from("rome"), Key::from(1))]);
        assert!(store.replace(&Key::from(1), json!({"id": 2})).is_err());
    }

    #[test]
    fn test_create_unique_index_over_duplicates_fails() {
        let mut store = store_with(&[]);
        store.put(None, json!({"id": 1, "email": "same"})).unwrap();
        store.put(None, json!({"id": 2, "email": "same"})).unwrap();

        let index = IndexDescriptor::new("email").unique().normalize().unwrap();
        assert!(matches!(
            store.create_index(&index),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_out_of_line_requires_key() {
        let mut store = ObjectStoreData::new(None, false);
        assert!(store.put(None, json!("value")).is_err());
        assert_eq!(
            store.put(Some(Key::from("k")), json!("value")).unwrap(),
            Key::from("k")
        );
    }
}

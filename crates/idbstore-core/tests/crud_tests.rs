//! CRUD and batch tests against the in-memory engine

use futures::executor::block_on;
use idbstore_core::memory::{Fault, MemorySession};
use idbstore_core::{BatchOp, GetBatchMode, Key, Store, StoreConfig, StoreError};
use pretty_assertions::assert_eq;
use serde_json::json;

fn people() -> Store<MemorySession> {
    Store::in_memory(&StoreConfig::new("people")).unwrap()
}

#[test]
fn test_put_and_get() {
    let store = people();

    let key = block_on(store.put(json!({"name": "Ada"}))).unwrap();
    assert_eq!(key, Key::from(1));

    let retrieved = block_on(store.get(1)).unwrap();
    assert_eq!(retrieved, Some(json!({"id": 1, "name": "Ada"})));
}

#[test]
fn test_put_replaces_existing_key() {
    let store = people();
    block_on(store.put(json!({"id": 7, "name": "Ada"}))).unwrap();
    block_on(store.put(json!({"id": 7, "name": "Grace"}))).unwrap();

    let all = block_on(store.get_all()).unwrap();
    assert_eq!(all, vec![json!({"id": 7, "name": "Grace"})]);

    // generator continues past the explicit key
    assert_eq!(block_on(store.put(json!({}))).unwrap(), Key::from(8));
}

#[test]
fn test_get_nonexistent() {
    let store = people();
    assert!(block_on(store.get("missing")).unwrap().is_none());
}

#[test]
fn test_remove_and_clear() {
    let store = people();
    block_on(store.put_batch(vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})])).unwrap();

    block_on(store.remove(2)).unwrap();
    let remaining: Vec<_> = block_on(store.get_all())
        .unwrap()
        .into_iter()
        .map(|v| v["n"].clone())
        .collect();
    assert_eq!(remaining, vec![json!(1), json!(3)]);

    // removing a missing key is not an error
    block_on(store.remove(42)).unwrap();

    block_on(store.clear()).unwrap();
    assert!(block_on(store.get_all()).unwrap().is_empty());
}

#[test]
fn test_out_of_line_keys() {
    let config = StoreConfig::new("settings").key_path(None).auto_increment(false);
    let store = Store::in_memory(&config).unwrap();

    block_on(store.put_with_key("theme", json!("dark"))).unwrap();
    assert_eq!(block_on(store.get("theme")).unwrap(), Some(json!("dark")));

    let result = block_on(store.put(json!("no key")));
    assert!(matches!(result, Err(StoreError::InvalidKey(_))));
}

#[test]
fn test_upsert_batch_returns_keys_in_order() {
    let store = people();
    let keys = block_on(store.upsert_batch(vec![
        json!({"name": "a"}),
        json!({"id": 10, "name": "b"}),
        json!({"name": "c"}),
    ]))
    .unwrap();
    assert_eq!(keys, vec![Key::from(1), Key::from(10), Key::from(11)]);
}

#[test]
fn test_batch_is_atomic() {
    let config = StoreConfig::new("people").index(idbstore_core::IndexDescriptor::new("email").unique());
    let store = Store::in_memory(&config).unwrap();
    block_on(store.put(json!({"email": "a@x"}))).unwrap();

    let result = block_on(store.batch(vec![
        BatchOp::Put {
            key: None,
            value: json!({"email": "b@x"}),
        },
        BatchOp::Remove { key: Key::from(1) },
        BatchOp::Put {
            key: None,
            value: json!({"email": "b@x"}),
        },
    ]));
    assert!(matches!(result, Err(StoreError::Constraint(_))));

    // nothing from the failed batch was applied
    let all = block_on(store.get_all()).unwrap();
    assert_eq!(all, vec![json!({"id": 1, "email": "a@x"})]);
}

#[test]
fn test_remove_batch() {
    let store = people();
    block_on(store.put_batch(vec![json!({}), json!({}), json!({})])).unwrap();
    block_on(store.remove_batch(vec![Key::from(1), Key::from(3)])).unwrap();

    let all = block_on(store.get_all()).unwrap();
    assert_eq!(all, vec![json!({"id": 2})]);
}

#[test]
fn test_get_batch_modes() {
    let store = people();
    block_on(store.put_batch(vec![json!({"n": "a"}), json!({"n": "b"})])).unwrap();
    let keys = [Key::from(2), Key::from(5), Key::from(1)];

    let sparse = block_on(store.get_batch(&keys, GetBatchMode::Sparse)).unwrap();
    assert_eq!(
        sparse,
        vec![
            Some(json!({"id": 2, "n": "b"})),
            None,
            Some(json!({"id": 1, "n": "a"})),
        ]
    );

    let skip = block_on(store.get_batch(&keys, GetBatchMode::Skip)).unwrap();
    assert_eq!(skip.len(), 2);
    assert!(skip.iter().all(Option::is_some));
}

#[test]
fn test_aborted_write_is_reported() {
    let store = people();
    store.session().inject(Fault::AbortWrite);

    let result = block_on(store.put_batch(vec![json!({}), json!({})]));
    assert!(matches!(result, Err(StoreError::Transaction(_))));
    assert!(block_on(store.get_all()).unwrap().is_empty());

    // the fault fires once
    block_on(store.put(json!({}))).unwrap();
}

#[test]
fn test_has_index() {
    let config = StoreConfig::new("people").index(idbstore_core::IndexDescriptor::new("age"));
    let store = Store::in_memory(&config).unwrap();

    assert!(store.has_index("age"));
    assert!(!store.has_index("name"));
    assert_eq!(store.name(), "IDBWrapper-people");
}

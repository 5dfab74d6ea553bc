//! Browser tests for the IndexedDB engine
//!
//! Run with `wasm-pack test --headless --firefox crates/idbstore-indexeddb`.

#![cfg(target_arch = "wasm32")]

use idbstore_core::{
    CountOptions, IndexDescriptor, IterationOptions, Key, KeyRange, Order, StoreConfig, StoreError,
};
use idbstore_indexeddb::{open_store, IndexedDbSession};
use serde_json::json;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Fresh config on a database no other test uses.
async fn fresh(name: &str) -> StoreConfig {
    let config = StoreConfig::new(name);
    IndexedDbSession::delete_database(&config.db_name())
        .await
        .unwrap();
    config
}

#[wasm_bindgen_test]
async fn test_put_get_remove() {
    let config = fresh("crud").await;
    let store = open_store(&config).await.unwrap();

    let key = store.put(json!({"name": "Ada"})).await.unwrap();
    assert_eq!(key, Key::from(1));
    assert_eq!(
        store.get(1).await.unwrap(),
        Some(json!({"id": 1, "name": "Ada"}))
    );

    store.remove(1).await.unwrap();
    assert!(store.get(1).await.unwrap().is_none());
    store.session().close();
}

#[wasm_bindgen_test]
async fn test_query_order_and_ranges() {
    let config = fresh("query").await;
    let store = open_store(&config).await.unwrap();
    store
        .put_batch(vec![json!({"id": 3}), json!({"id": 1}), json!({"id": 2})])
        .await
        .unwrap();

    let asc = store.query(&IterationOptions::new()).await.unwrap();
    assert_eq!(asc, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);

    let desc = store
        .query(&IterationOptions::new().order(Order::Desc))
        .await
        .unwrap();
    assert_eq!(desc[0], json!({"id": 3}));

    let empty = store
        .query(&IterationOptions::new().key_range(KeyRange::lower_bound(Key::from(10), false)))
        .await
        .unwrap();
    assert!(empty.is_empty());

    let range = KeyRange::bound(Key::from(2), Key::from(3), false, false).unwrap();
    let count = store
        .count(&CountOptions::new().key_range(range))
        .await
        .unwrap();
    assert_eq!(count, 2);
    store.session().close();
}

#[wasm_bindgen_test]
async fn test_write_pass_updates_in_place() {
    let config = fresh("write-pass").await;
    let store = open_store(&config).await.unwrap();
    store
        .put_batch(vec![json!({"n": 1}), json!({"n": 2})])
        .await
        .unwrap();

    store
        .iterate(&IterationOptions::new().write_access(), |record| {
            let mut value = record.value().clone();
            value["n"] = json!(0);
            record.update(value)
        })
        .await
        .unwrap();

    let all = store.get_all().await.unwrap();
    assert!(all.iter().all(|v| v["n"] == json!(0)));

    let read_only = store
        .iterate(&IterationOptions::new(), |record| record.delete())
        .await;
    assert!(matches!(read_only, Err(StoreError::ReadOnly(_))));
    store.session().close();
}

#[wasm_bindgen_test]
async fn test_upgrade_reconciles_indexes() {
    let config = fresh("upgrade").await;
    let v1 = open_store(&config.clone().index(IndexDescriptor::new("email")))
        .await
        .unwrap();
    v1.put(json!({"email": "a@x"})).await.unwrap();
    v1.session().close();

    // same version, different declaration
    let drifted = open_store(&config.clone().index(IndexDescriptor::new("email").unique())).await;
    assert!(matches!(
        drifted.err(),
        Some(StoreError::VersionBumpRequired { version: 2, .. })
    ));

    let v2 = open_store(
        &config
            .clone()
            .version(2)
            .index(IndexDescriptor::new("email").unique())
            .index(IndexDescriptor::new("tags").multi_entry()),
    )
    .await
    .unwrap();
    let report = v2.session().upgrade_report().unwrap();
    assert_eq!(report.recreated, vec!["email"]);
    assert_eq!(report.created, vec!["tags"]);

    let duplicate = v2.put(json!({"email": "a@x"})).await;
    assert!(matches!(duplicate, Err(StoreError::Constraint(_))));
    v2.session().close();

    let downgrade = open_store(&config.version(1)).await;
    assert!(matches!(
        downgrade.err(),
        Some(StoreError::VersionDowngrade {
            requested: 1,
            existing: 2
        })
    ));
}

#[wasm_bindgen_test]
async fn test_filter_duplicates_on_index() {
    let config = fresh("unique-pass")
        .await
        .index(IndexDescriptor::new("city"));
    let store = open_store(&config).await.unwrap();
    store
        .put_batch(vec![
            json!({"id": 1, "city": "rome"}),
            json!({"id": 2, "city": "oslo"}),
            json!({"id": 3, "city": "rome"}),
        ])
        .await
        .unwrap();

    let cities = store
        .query(&IterationOptions::new().index("city").filter_duplicates().descending())
        .await
        .unwrap();
    assert_eq!(
        cities,
        vec![json!({"id": 1, "city": "rome"}), json!({"id": 2, "city": "oslo"})]
    );
    store.session().close();
}

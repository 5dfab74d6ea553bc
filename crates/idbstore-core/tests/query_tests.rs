//! Query and count tests against the in-memory engine

use futures::executor::block_on;
use idbstore_core::memory::{Fault, MemorySession};
use idbstore_core::{
    make_range, CountOptions, IndexDescriptor, IterationOptions, Key, KeyRange, KeyRangeSpec, Order, Step,
    Store, StoreConfig, StoreError,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn numbers(values: &[i64]) -> Store<MemorySession> {
    let store = Store::in_memory(&StoreConfig::new("numbers")).unwrap();
    let records = values.iter().map(|n| json!({"id": n})).collect();
    block_on(store.put_batch(records)).unwrap();
    store
}

fn ids(records: &[Value]) -> Vec<i64> {
    records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

fn people() -> Store<MemorySession> {
    let config = StoreConfig::new("people")
        .version(1)
        .index(IndexDescriptor::new("city"))
        .index(IndexDescriptor::new("tags").multi_entry());
    let store = Store::in_memory(&config).unwrap();
    block_on(store.put_batch(vec![
        json!({"id": 1, "city": "rome", "tags": ["a", "b"]}),
        json!({"id": 2, "city": "oslo", "tags": ["b"]}),
        json!({"id": 3, "city": "rome", "tags": []}),
        json!({"id": 4, "city": "lima"}),
    ]))
    .unwrap();
    store
}

#[test]
fn test_query_ascending() {
    let store = numbers(&[3, 1, 2]);
    let result = block_on(store.query(&IterationOptions::new())).unwrap();
    assert_eq!(ids(&result), vec![1, 2, 3]);
}

#[test]
fn test_query_descending() {
    let store = numbers(&[3, 1, 2]);
    let result = block_on(store.query(&IterationOptions::new().order(Order::Desc))).unwrap();
    assert_eq!(ids(&result), vec![3, 2, 1]);
}

#[test]
fn test_query_empty_range_resolves_empty() {
    let store = numbers(&[1, 2, 3]);
    let range = KeyRange::lower_bound(Key::from(10), false);
    let result = block_on(store.query(&IterationOptions::new().key_range(range))).unwrap();
    assert!(result.is_empty());

    let empty = numbers(&[]);
    assert!(block_on(empty.query(&IterationOptions::new())).unwrap().is_empty());
}

#[test]
fn test_query_bounded_range() {
    let store = numbers(&[1, 2, 3, 4, 5]);
    let range = make_range(&KeyRangeSpec::new().lower(2).upper(4).exclude_upper()).unwrap();
    let result = block_on(store.query(&IterationOptions::new().key_range(range))).unwrap();
    assert_eq!(ids(&result), vec![2, 3]);

    let only = make_range(&KeyRangeSpec::new().only(5)).unwrap();
    let result = block_on(store.query(&IterationOptions::new().key_range(only))).unwrap();
    assert_eq!(ids(&result), vec![5]);
}

#[test]
fn test_query_by_index() {
    let store = people();
    let result = block_on(store.query(&IterationOptions::new().index("city"))).unwrap();
    // index order, ties broken by primary key
    assert_eq!(ids(&result), vec![4, 2, 1, 3]);

    let rome = KeyRange::only(Key::from("rome"));
    let result = block_on(store.query(&IterationOptions::new().index("city").key_range(rome))).unwrap();
    assert_eq!(ids(&result), vec![1, 3]);
}

#[test]
fn test_filter_duplicates() {
    let store = people();

    let options = IterationOptions::new().index("city").filter_duplicates();
    let result = block_on(store.query(&options)).unwrap();
    assert_eq!(ids(&result), vec![4, 2, 1]);

    // descending still yields the lowest primary key of each city
    let result = block_on(store.query(&options.descending())).unwrap();
    assert_eq!(ids(&result), vec![1, 2, 4]);
}

#[test]
fn test_multi_entry_index() {
    let store = people();
    let b = KeyRange::only(Key::from("b"));
    let result = block_on(store.query(&IterationOptions::new().index("tags").key_range(b))).unwrap();
    assert_eq!(ids(&result), vec![1, 2]);

    let count = block_on(store.count(&CountOptions::new().index("tags"))).unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_offset_and_limit() {
    let store = numbers(&[1, 2, 3, 4, 5]);
    let result = block_on(store.query(&IterationOptions::new().offset(1).limit(2))).unwrap();
    assert_eq!(ids(&result), vec![2, 3]);

    let result = block_on(store.query(&IterationOptions::new().offset(10))).unwrap();
    assert!(result.is_empty());

    let result = block_on(store.query(&IterationOptions::new().limit(0))).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_query_filtered() {
    let store = numbers(&[1, 2, 3, 4, 5, 6]);
    let result = block_on(store.query_filtered(&IterationOptions::new(), |v| {
        v["id"].as_i64().is_some_and(|n| n % 2 == 0)
    }))
    .unwrap();
    assert_eq!(ids(&result), vec![2, 4, 6]);
}

#[test]
fn test_unknown_index_fails() {
    let store = numbers(&[1]);
    let result = block_on(store.query(&IterationOptions::new().index("nope")));
    assert!(matches!(result, Err(StoreError::Cursor(_))));

    let result = block_on(store.count(&CountOptions::new().index("nope")));
    assert!(matches!(result, Err(StoreError::Transaction(_))));
}

#[test]
fn test_count_range() {
    let store = numbers(&[1, 2, 3, 4]);
    let range = KeyRange::bound(Key::from(2), Key::from(3), false, false).unwrap();
    let count = block_on(store.count(&CountOptions::new().key_range(range))).unwrap();
    assert_eq!(count, 2);

    assert_eq!(block_on(store.count(&CountOptions::new())).unwrap(), 4);
}

#[test]
fn test_aborted_count_is_an_error() {
    let store = numbers(&[1, 2]);
    store.session().inject(Fault::AbortCount);

    let result = block_on(store.count(&CountOptions::new()));
    assert!(matches!(result, Err(StoreError::Transaction(_))));
}

#[test]
fn test_count_without_result_is_an_error() {
    let store = numbers(&[1, 2]);
    store.session().inject(Fault::DropCountResult);

    let result = block_on(store.count(&CountOptions::new()));
    assert!(matches!(result, Err(StoreError::Transaction(_))));
    assert_eq!(block_on(store.count(&CountOptions::new())).unwrap(), 2);
}

#[test]
fn test_for_each_step_ends_once() {
    let store = numbers(&[1, 2, 3]);
    let mut seen = Vec::new();
    let mut ends = 0;

    let summary = block_on(store.for_each_step(&IterationOptions::new(), |step| {
        match step {
            Step::Record(record) => seen.push(record.primary_key().clone()),
            Step::End => ends += 1,
        }
        Ok(())
    }))
    .unwrap();

    assert_eq!(seen, vec![Key::from(1), Key::from(2), Key::from(3)]);
    assert_eq!(ends, 1);
    assert_eq!(summary.delivered, 3);
}

#[test]
fn test_for_each_step_on_empty_store() {
    let store = numbers(&[]);
    let mut steps = Vec::new();
    block_on(store.for_each_step(&IterationOptions::new(), |step| {
        steps.push(step.is_end());
        Ok(())
    }))
    .unwrap();
    assert_eq!(steps, vec![true]);
}

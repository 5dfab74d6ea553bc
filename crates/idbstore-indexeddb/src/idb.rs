//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`. Promise
//! callbacks run as microtasks, so awaiting a request inside a transaction
//! does not let the transaction auto-commit.

use std::cell::RefCell;
use std::rc::Rc;

use idbstore_core::schema::{self, ReconcileReport};
use idbstore_core::{StoreConfig, StoreError, StoreResult};
use js_sys::Promise;
use tracing::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    DomException, IdbDatabase, IdbFactory, IdbObjectStore, IdbObjectStoreParameters, IdbOpenDbRequest,
    IdbRequest, IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::convert::key_path_to_js;
use crate::error::{describe, IndexedDbError, Result};
use crate::schema::IdbSchema;

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(IdbVersionChangeEvent)>>>>;

/// Outcome of the upgrade handler, read once the open request settles
type UpgradeOutcome = Rc<RefCell<Option<StoreResult<ReconcileReport>>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's
/// result and rejects with the request's DOMException.
///
/// Can be called again on the same request (a cursor request fires once per
/// step); each call replaces the previous handlers.
pub(crate) fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ClosurePair = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = req_e
                .error()
                .ok()
                .flatten()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("unknown IDB error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise. Rejects on
/// error and on abort.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx_handlers = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        type ClosureTriple = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosureTriple>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let failure = |fallback: &'static str| {
            let tx_f = tx_handlers.clone();
            let reject = reject.clone();
            let closures = closures.clone();
            Closure::wrap(Box::new(move |_event: web_sys::Event| {
                let msg = tx_f
                    .error()
                    .map(|e| format!("{}: {}", e.name(), e.message()))
                    .unwrap_or_else(|| fallback.to_string());
                let _ = reject.call1(&JsValue::UNDEFINED, &JsValue::from_str(&msg));
                *closures.borrow_mut() = None;
            }) as Box<dyn FnMut(web_sys::Event)>)
        };
        let on_error = failure("transaction error");
        let on_abort = failure("transaction aborted");

        tx_handlers.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_handlers.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_handlers.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error, on_abort));
    })
}

/// An opened database and what its upgrade did, if one ran.
pub struct OpenedDatabase {
    pub db: IdbDatabase,
    pub upgrade: Option<ReconcileReport>,
}

/// Open (or create) the configured database.
///
/// When the requested version is newer, the upgrade creates the object store
/// if needed and reconciles every declared index inside the versionchange
/// transaction; any failure aborts that transaction so the old schema stays.
/// At the current version the declared indexes are only checked.
pub async fn open_database(config: &StoreConfig) -> StoreResult<OpenedDatabase> {
    config.validate()?;
    let name = config.db_name();
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(&name, config.db_version)
        .map_err(|e| IndexedDbError::Open(describe(&e)))?;

    // Store upgrade closure to manage its lifetime without leaking
    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let outcome: UpgradeOutcome = Rc::new(RefCell::new(None));

    let outcome_for_upgrade = outcome.clone();
    let upgrade_config = config.clone();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        let req: Option<IdbOpenDbRequest> = event.target().map(|t| t.unchecked_into());
        let result = match &req {
            Some(req) => upgrade(req, &upgrade_config),
            None => Err(StoreError::Backend("upgrade event has no target".into())),
        };
        if let Err(e) = &result {
            error!(store = %upgrade_config.store_name, "schema upgrade failed, aborting: {e}");
            if let Some(tx) = req.as_ref().and_then(|r| r.transaction()) {
                let _ = tx.abort();
            }
        }
        *outcome_for_upgrade.borrow_mut() = Some(result);
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    let opened = JsFuture::from(request_to_promise(open_req.unchecked_ref())).await;

    // Clean up upgrade closure now that open is complete
    *upgrade_closure.borrow_mut() = None;
    let upgraded = outcome.borrow_mut().take();

    let (db, upgrade) = match (opened, upgraded) {
        (_, Some(Err(e))) => return Err(e),
        (Err(e), _) if is_dom_error(&e, "VersionError") => {
            let existing = current_version(&name).await?;
            return Err(StoreError::VersionDowngrade {
                requested: config.db_version,
                existing,
            });
        }
        (Err(e), _) => return Err(IndexedDbError::Open(describe(&e)).into()),
        (Ok(result), upgraded) => {
            let db = result
                .dyn_into::<IdbDatabase>()
                .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))?;
            (db, upgraded.transpose()?)
        }
    };

    if upgrade.is_none() {
        if let Err(e) = verify_schema(&db, config) {
            db.close();
            return Err(e);
        }
    }

    info!(db = %name, store = %config.store_name, version = config.db_version, "store ready");
    Ok(OpenedDatabase { db, upgrade })
}

/// Body of `onupgradeneeded`.
fn upgrade(req: &IdbOpenDbRequest, config: &StoreConfig) -> StoreResult<ReconcileReport> {
    let db: IdbDatabase = req
        .result()
        .map_err(IndexedDbError::from)?
        .unchecked_into();
    let tx = req
        .transaction()
        .ok_or_else(|| StoreError::Backend("upgrade has no versionchange transaction".into()))?;

    info!(db = %db.name(), to = config.db_version, "upgrading schema");
    let store = if db.object_store_names().contains(&config.store_name) {
        tx.object_store(&config.store_name)
            .map_err(IndexedDbError::from)?
    } else {
        debug!(store = %config.store_name, "creating object store");
        create_object_store(&db, config)?
    };

    schema::reconcile(&mut IdbSchema::new(store), &config.indexes)
}

fn create_object_store(db: &IdbDatabase, config: &StoreConfig) -> Result<IdbObjectStore> {
    let params = IdbObjectStoreParameters::new();
    if let Some(path) = &config.key_path {
        js_sys::Reflect::set(&params, &"keyPath".into(), &key_path_to_js(path))?;
    }
    js_sys::Reflect::set(
        &params,
        &"autoIncrement".into(),
        &JsValue::from_bool(config.auto_increment),
    )?;
    Ok(db.create_object_store_with_optional_parameters(&config.store_name, &params)?)
}

/// Check, without an upgrade transaction, that the store and its indexes
/// are what the config declares.
fn verify_schema(db: &IdbDatabase, config: &StoreConfig) -> StoreResult<()> {
    let version = db.version() as u32;
    if !db.object_store_names().contains(&config.store_name) {
        let err = StoreError::Schema(format!(
            "object store \"{}\" does not exist in \"{}\", bump the version to {}",
            config.store_name,
            db.name(),
            schema::next_version(version)?
        ));
        warn!("{err}");
        return Err(err);
    }
    if config.indexes.is_empty() {
        return Ok(());
    }
    let (_tx, store) = begin_transaction(db, &config.store_name, IdbTransactionMode::Readonly)?;
    schema::check_compliance(&IdbSchema::new(store), &config.indexes, version)
}

/// Version of an existing database, opening it without requesting one.
async fn current_version(name: &str) -> Result<u32> {
    let req = idb_factory()?
        .open(name)
        .map_err(|e| IndexedDbError::Open(describe(&e)))?;
    let db: IdbDatabase = JsFuture::from(request_to_promise(req.unchecked_ref()))
        .await
        .map_err(|e| IndexedDbError::Open(describe(&e)))?
        .unchecked_into();
    let version = db.version() as u32;
    db.close();
    Ok(version)
}

fn is_dom_error(val: &JsValue, name: &str) -> bool {
    val.dyn_ref::<DomException>().is_some_and(|e| e.name() == name)
}

/// Start a transaction on one object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    let store = tx.object_store(store_name)?;
    Ok((tx, store))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    Ok(JsFuture::from(promise).await?)
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    let promise = request_to_promise(req.unchecked_ref());
    JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    Ok(())
}

//! In-memory storage engine
//!
//! Implements the session and schema traits with the engine's semantics:
//! primary-key ordering, key paths and generators, unique and multiEntry
//! indexes, versioned schema upgrades. Not persistent; databases live as long
//! as their [`MemoryFactory`].
//!
//! Tests use [`MemorySession::inject`] to make the next matching operation
//! fail the way a real engine can (aborted count, lost result, cursor error).

mod cursor;
mod object_store;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{error, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::key_range::KeyRange;
use crate::schema::{self, IndexCatalog, ReconcileReport};
use crate::session::{BatchOp, ScanTarget, StoreSession, TransactionMode};
use crate::store::Store;

pub use cursor::MemoryCursor;
use object_store::ObjectStoreData;

/// Failures the in-memory engine can be told to produce once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Abort the next count transaction
    AbortCount,
    /// Complete the next count transaction without delivering a result
    DropCountResult,
    FailCursorOpen,
    FailAdvance,
    /// Abort the next read-write transaction of a put/remove/clear/batch
    AbortWrite,
}

pub(crate) fn take_fault(faults: &RefCell<Vec<Fault>>, fault: Fault) -> bool {
    let mut faults = faults.borrow_mut();
    match faults.iter().position(|f| *f == fault) {
        Some(at) => {
            faults.remove(at);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryDatabase {
    version: u32,
    stores: BTreeMap<String, ObjectStoreData>,
}

impl MemoryDatabase {
    pub(crate) fn store(&self, name: &str) -> StoreResult<&ObjectStoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| StoreError::Backend(format!("object store \"{name}\" does not exist")))
    }

    pub(crate) fn store_mut(&mut self, name: &str) -> StoreResult<&mut ObjectStoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| StoreError::Backend(format!("object store \"{name}\" does not exist")))
    }
}

/// Owns the in-memory databases, the way the browser owns IndexedDB databases.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    databases: Rc<RefCell<BTreeMap<String, Rc<RefCell<MemoryDatabase>>>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the configured store, upgrading its database when the requested
    /// version is newer.
    ///
    /// An upgrade creates the object store if needed and reconciles the
    /// declared indexes; it is applied atomically, so a failed upgrade leaves
    /// the database as it was. Opening at the current version only checks
    /// that the declared indexes are in place.
    pub fn open(&self, config: &StoreConfig) -> StoreResult<MemorySession> {
        config.validate()?;
        let name = config.db_name();
        let db = Rc::clone(
            self.databases
                .borrow_mut()
                .entry(name.clone())
                .or_default(),
        );

        let upgrade = {
            let mut database = db.borrow_mut();
            open_database(&mut database, config, &name)
                .inspect_err(|e| error!(db = %name, "failed to open store: {e}"))?
        };

        info!(db = %name, store = %config.store_name, version = config.db_version, "store ready");
        Ok(MemorySession {
            name,
            store_name: config.store_name.clone(),
            db,
            faults: Rc::new(RefCell::new(Vec::new())),
            upgrade,
        })
    }

    /// Drop a database. Returns whether it existed.
    pub fn delete_database(&self, name: &str) -> bool {
        self.databases.borrow_mut().remove(name).is_some()
    }

    /// Current version of a database, `None` if it does not exist.
    pub fn version(&self, name: &str) -> Option<u32> {
        self.databases
            .borrow()
            .get(name)
            .map(|db| db.borrow().version)
            .filter(|v| *v > 0)
    }
}

fn open_database(
    database: &mut MemoryDatabase,
    config: &StoreConfig,
    name: &str,
) -> StoreResult<Option<ReconcileReport>> {
    let requested = config.db_version;
    if requested < database.version {
        return Err(StoreError::VersionDowngrade {
            requested,
            existing: database.version,
        });
    }

    if requested == database.version {
        let Ok(store) = database.store(&config.store_name) else {
            return Err(StoreError::Schema(format!(
                "object store \"{}\" does not exist in \"{name}\", bump the version to {}",
                config.store_name,
                schema::next_version(requested)?
            )));
        };
        schema::check_compliance(store, &config.indexes, requested)?;
        return Ok(None);
    }

    info!(db = %name, from = database.version, to = requested, "upgrading schema");
    let mut staged = database.stores.clone();
    let store = staged
        .entry(config.store_name.clone())
        .or_insert_with(|| ObjectStoreData::new(config.key_path.clone(), config.auto_increment));
    let report = schema::reconcile(store, &config.indexes)?;

    database.stores = staged;
    database.version = requested;
    Ok(Some(report))
}

/// An opened in-memory object store.
#[derive(Debug)]
pub struct MemorySession {
    name: String,
    store_name: String,
    db: Rc<RefCell<MemoryDatabase>>,
    faults: Rc<RefCell<Vec<Fault>>>,
    upgrade: Option<ReconcileReport>,
}

impl MemorySession {
    /// Open a store in a fresh, private factory.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        MemoryFactory::new().open(config)
    }

    /// What the upgrade did, `None` when the store opened at its current version.
    pub fn upgrade_report(&self) -> Option<&ReconcileReport> {
        self.upgrade.as_ref()
    }

    /// Make the next operation of the matching kind fail.
    pub fn inject(&self, fault: Fault) {
        self.faults.borrow_mut().push(fault);
    }

    fn read<T>(&self, f: impl FnOnce(&ObjectStoreData) -> StoreResult<T>) -> StoreResult<T> {
        let db = self.db.borrow();
        f(db.store(&self.store_name)?)
    }

    /// Run `f` as one read-write transaction: all of it applies or none does.
    fn write<T>(&self, f: impl FnOnce(&mut ObjectStoreData) -> StoreResult<T>) -> StoreResult<T> {
        if take_fault(&self.faults, Fault::AbortWrite) {
            return Err(StoreError::Transaction("write transaction aborted".into()));
        }
        let mut db = self.db.borrow_mut();
        let store = db.store_mut(&self.store_name)?;
        let mut staged = store.clone();
        let out = f(&mut staged)?;
        *store = staged;
        Ok(out)
    }
}

impl StoreSession for MemorySession {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn index_names(&self) -> Vec<String> {
        self.read(|store| Ok(store.index_names())).unwrap_or_default()
    }

    async fn open_cursor(
        &self,
        target: &ScanTarget,
        mode: TransactionMode,
    ) -> StoreResult<Option<MemoryCursor>> {
        if take_fault(&self.faults, Fault::FailCursorOpen) {
            return Err(StoreError::Cursor("failed to open cursor".into()));
        }
        MemoryCursor::open(
            Rc::clone(&self.db),
            self.store_name.clone(),
            target.clone(),
            mode,
            Rc::clone(&self.faults),
        )
    }

    async fn count(&self, index: Option<&str>, range: Option<&KeyRange>) -> StoreResult<Option<u64>> {
        let counted = self.read(|store| match index {
            Some(name) => store
                .indexes
                .get(name)
                .map(|i| i.count(range))
                .ok_or_else(|| StoreError::Transaction(format!("index \"{name}\" does not exist"))),
            None => Ok(store.count(range)),
        })?;

        if take_fault(&self.faults, Fault::AbortCount) {
            return Err(StoreError::Transaction("count transaction aborted".into()));
        }
        if take_fault(&self.faults, Fault::DropCountResult) {
            return Ok(None);
        }
        Ok(Some(counted as u64))
    }

    async fn put(&self, key: Option<Key>, value: Value) -> StoreResult<Key> {
        self.write(|store| store.put(key, value))
    }

    async fn get(&self, key: &Key) -> StoreResult<Option<Value>> {
        self.read(|store| Ok(store.records.get(key).cloned()))
    }

    async fn get_all(&self) -> StoreResult<Vec<Value>> {
        self.read(|store| Ok(store.records.values().cloned().collect()))
    }

    async fn remove(&self, key: &Key) -> StoreResult<()> {
        self.write(|store| {
            store.remove(key);
            Ok(())
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        self.write(|store| {
            store.clear();
            Ok(())
        })
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<Vec<Option<Key>>> {
        self.write(|store| {
            ops.into_iter()
                .map(|op| match op {
                    BatchOp::Put { key, value } => store.put(key, value).map(Some),
                    BatchOp::Remove { key } => {
                        store.remove(&key);
                        Ok(None)
                    }
                })
                .collect()
        })
    }

    async fn get_batch(&self, keys: &[Key]) -> StoreResult<Vec<Option<Value>>> {
        self.read(|store| Ok(keys.iter().map(|k| store.records.get(k).cloned()).collect()))
    }
}

impl Store<MemorySession> {
    /// Open a store backed by a fresh in-memory engine.
    pub fn in_memory(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Store::new(MemorySession::open(config)?))
    }
}

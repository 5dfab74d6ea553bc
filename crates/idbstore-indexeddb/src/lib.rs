//! IndexedDB engine for idbstore (browser WASM)
//!
//! Implements the `idbstore-core` session contract on top of the browser's
//! IndexedDB: one configured object store per database, schema upgrades in
//! the versionchange transaction, cursor passes over `IDBCursorWithValue`.
//!
//! Because IndexedDB is inherently asynchronous, every operation is async and
//! runs in its own transaction. Futures are not `Send`; they run on the
//! browser's single thread through `wasm-bindgen-futures`.
//!
//! # Example
//!
//! ```rust,ignore
//! use idbstore_core::{IndexDescriptor, IterationOptions, StoreConfig};
//! use idbstore_indexeddb::open_store;
//!
//! let config = StoreConfig::new("customers")
//!     .version(2)
//!     .index(IndexDescriptor::new("email").unique());
//! let store = open_store(&config).await?;
//!
//! store.put(serde_json::json!({"email": "ada@example.com"})).await?;
//! let everyone = store.query(&IterationOptions::new().index("email")).await?;
//! ```

pub mod convert;
pub mod cursor;
pub mod error;
pub mod idb;
pub mod schema;
pub mod session;

pub use cursor::IndexedDbCursor;
pub use error::{IndexedDbError, Result};
pub use session::IndexedDbSession;

use idbstore_core::{Store, StoreConfig, StoreResult};

/// A [`Store`] backed by IndexedDB.
pub type IndexedDbStore = Store<IndexedDbSession>;

/// Open the configured store.
pub async fn open_store(config: &StoreConfig) -> StoreResult<IndexedDbStore> {
    Ok(Store::new(IndexedDbSession::open(config).await?))
}

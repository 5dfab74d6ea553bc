//! idbstore core: a typed layer over IndexedDB-shaped object stores
//!
//! This crate holds everything that does not depend on a browser:
//!
//! - [`StoreConfig`]: which database and object store to open, with which
//!   key options and declared indexes
//! - [`schema`]: reconciling declared indexes against the ones that exist
//!   during a version upgrade
//! - [`iterate`]: cursor passes as lazy, single-use sequences of [`Step`]s
//! - [`query`]: collecting matches and counting them
//! - [`Store`]: the facade over an opened [`StoreSession`]
//!
//! Engines implement [`StoreSession`] (and [`schema::SchemaStore`] for
//! upgrades). The IndexedDB engine lives in `idbstore-indexeddb`; the
//! [`memory`] engine here backs native use and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use idbstore_core::{IndexDescriptor, IterationOptions, Store, StoreConfig};
//! use serde_json::json;
//!
//! let config = StoreConfig::new("people").index(IndexDescriptor::new("age"));
//! let store = Store::in_memory(&config)?;
//!
//! store.put(json!({"name": "Ada", "age": 36})).await?;
//! let adults = store.query(&IterationOptions::new().index("age")).await?;
//! ```

pub mod config;
pub mod error;
pub mod iterate;
pub mod key;
pub mod key_range;
pub mod memory;
pub mod query;
pub mod schema;
pub mod session;
pub mod store;

pub use config::StoreConfig;
pub use error::{KeyRangeError, StoreError, StoreResult};
pub use iterate::{CursorRecord, IterationOptions, IterationSummary, MatchSequence, Order, Step};
pub use key::{Key, KeyPath};
pub use key_range::{make_range, KeyRange, KeyRangeSpec};
pub use query::CountOptions;
pub use schema::{IndexDescriptor, ReconcileReport};
pub use session::{BatchOp, CursorHandle, Direction, ScanTarget, StoreSession, TransactionMode};
pub use store::{GetBatchMode, Store};

//! Index schema: descriptors, the engine-facing catalog traits, and reconciliation
//!
//! The engine exposes its live indexes through [`IndexCatalog`]. Inside a
//! schema-upgrade transaction it additionally implements [`SchemaStore`], which
//! lets [`reconcile`] create and drop indexes until the store matches the
//! declaration. Outside an upgrade only [`check_compliance`] can run.

mod index;
mod reconcile;

pub use index::{ActualIndex, IndexDescriptor, NormalizedIndex};
pub use reconcile::{check_compliance, next_version, normalize_all, reconcile, ReconcileReport};

use crate::error::StoreResult;

/// Read access to an object store's live indexes.
pub trait IndexCatalog {
    /// Names of every index currently on the store.
    fn index_names(&self) -> Vec<String>;

    /// Live metadata for one index, `None` if it does not exist.
    fn index(&self, name: &str) -> StoreResult<Option<ActualIndex>>;
}

/// Index mutation, only available inside a schema-upgrade transaction.
pub trait SchemaStore: IndexCatalog {
    /// Create an index and build its entries from the existing records.
    fn create_index(&mut self, index: &NormalizedIndex) -> StoreResult<()>;

    /// Drop an index. Records are untouched.
    fn delete_index(&mut self, name: &str) -> StoreResult<()>;
}

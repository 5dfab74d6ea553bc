//! Converging a store's live indexes onto the declared schema

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::schema::{IndexCatalog, IndexDescriptor, NormalizedIndex, SchemaStore};

/// What a reconciliation pass did, index by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub recreated: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    /// True when the store already matched the declaration.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.recreated.is_empty()
    }
}

/// Normalize every descriptor, rejecting unnamed and duplicate indexes.
///
/// Runs before any mutation so a bad declaration never leaves the store
/// half reconciled.
pub fn normalize_all(declared: &[IndexDescriptor]) -> StoreResult<Vec<NormalizedIndex>> {
    let mut seen = HashSet::new();
    declared
        .iter()
        .map(|descriptor| {
            let index = descriptor.normalize()?;
            if !seen.insert(index.name.clone()) {
                return Err(StoreError::Schema(format!(
                    "index \"{}\" is declared more than once",
                    index.name
                )));
            }
            Ok(index)
        })
        .collect()
}

/// The version a caller must request to get an upgrade transaction.
///
/// `StoreError::Schema` when `version` is already the highest one.
pub fn next_version(version: u32) -> StoreResult<u32> {
    version.checked_add(1).ok_or_else(|| {
        StoreError::Schema(format!(
            "schema differs at version {version}, which cannot be bumped any further"
        ))
    })
}

/// Bring the store's indexes in line with `declared`.
///
/// Missing indexes are created; indexes whose keyPath, unique or multiEntry
/// differ are dropped and recreated. Indexes the declaration does not
/// mention are left alone. Must run inside the schema-upgrade transaction.
///
/// # Errors
///
/// `StoreError::Schema` for invalid descriptors, or whatever the engine
/// reports for a failed create/drop. The caller aborts the upgrade.
pub fn reconcile<S>(store: &mut S, declared: &[IndexDescriptor]) -> StoreResult<ReconcileReport>
where
    S: SchemaStore + ?Sized,
{
    let normalized = normalize_all(declared).inspect_err(|e| warn!("index schema rejected: {e}"))?;
    let existing: HashSet<String> = store.index_names().into_iter().collect();
    let mut report = ReconcileReport::default();

    for index in &normalized {
        if !existing.contains(&index.name) {
            debug!(index = %index.name, key_path = %index.key_path, "creating index");
            store.create_index(index)?;
            report.created.push(index.name.clone());
            continue;
        }

        let actual = store.index(&index.name)?.ok_or_else(|| {
            StoreError::Schema(format!("index \"{}\" vanished during upgrade", index.name))
        })?;
        let drift = index.drift(&actual);
        if drift.is_empty() {
            report.unchanged.push(index.name.clone());
            continue;
        }

        debug!(index = %index.name, ?drift, "recreating index");
        store.delete_index(&index.name)?;
        store.create_index(index)?;
        report.recreated.push(index.name.clone());
    }

    info!(
        created = report.created.len(),
        recreated = report.recreated.len(),
        unchanged = report.unchanged.len(),
        "index schema reconciled"
    );
    Ok(report)
}

/// Verify, without mutating, that the store matches `declared`.
///
/// Used when the store opens at its current version and no upgrade
/// transaction exists to repair drift.
///
/// # Errors
///
/// `StoreError::VersionBumpRequired` naming the first missing or drifted
/// index and the version the caller must move to.
pub fn check_compliance<C>(catalog: &C, declared: &[IndexDescriptor], version: u32) -> StoreResult<()>
where
    C: IndexCatalog + ?Sized,
{
    let existing: HashSet<String> = catalog.index_names().into_iter().collect();
    for index in normalize_all(declared)? {
        let compliant = existing.contains(&index.name)
            && catalog
                .index(&index.name)?
                .is_some_and(|actual| index.complies(&actual));
        if !compliant {
            let err = StoreError::VersionBumpRequired {
                index: index.name,
                version: next_version(version)?,
            };
            warn!("{err}");
            return Err(err);
        }
    }
    Ok(())
}

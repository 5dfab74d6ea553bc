//! Declared and actual index descriptors

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::key::KeyPath;

/// An index as declared in the store configuration.
///
/// Only `name` is required; `key_path` defaults to the name and both flags
/// default to `false`. Call [`IndexDescriptor::normalize`] before comparing
/// or creating.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub name: String,
    pub key_path: Option<KeyPath>,
    pub unique: bool,
    pub multi_entry: bool,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn key_path(mut self, key_path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn multi_entry(mut self) -> Self {
        self.multi_entry = true;
        self
    }

    /// Fill omitted fields and validate.
    ///
    /// # Errors
    ///
    /// `StoreError::Schema` for a missing name, or for a compound key path
    /// combined with `multiEntry` (the engine rejects that pairing).
    pub fn normalize(&self) -> StoreResult<NormalizedIndex> {
        if self.name.is_empty() {
            return Err(StoreError::Schema(
                "index descriptor is missing a name".into(),
            ));
        }
        let key_path = self
            .key_path
            .clone()
            .unwrap_or_else(|| KeyPath::Single(self.name.clone()));
        if key_path.is_compound() && self.multi_entry {
            return Err(StoreError::Schema(format!(
                "index \"{}\" cannot be multiEntry with a compound key path",
                self.name
            )));
        }
        Ok(NormalizedIndex {
            name: self.name.clone(),
            key_path,
            unique: self.unique,
            multi_entry: self.multi_entry,
        })
    }
}

/// A declared index with every field filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIndex {
    pub name: String,
    pub key_path: KeyPath,
    pub unique: bool,
    pub multi_entry: bool,
}

impl NormalizedIndex {
    /// Fields in which the live index differs from this declaration.
    ///
    /// An actual `multiEntry` the engine reports as undefined counts as `false`.
    pub fn drift(&self, actual: &ActualIndex) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.key_path != actual.key_path {
            fields.push("keyPath");
        }
        if self.unique != actual.unique {
            fields.push("unique");
        }
        if self.multi_entry != actual.multi_entry.unwrap_or(false) {
            fields.push("multiEntry");
        }
        fields
    }

    pub fn complies(&self, actual: &ActualIndex) -> bool {
        self.drift(actual).is_empty()
    }
}

/// Index metadata as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualIndex {
    pub name: String,
    pub key_path: KeyPath,
    pub unique: bool,
    /// `None` when the engine leaves the attribute undefined
    pub multi_entry: Option<bool>,
}

impl From<&NormalizedIndex> for ActualIndex {
    fn from(index: &NormalizedIndex) -> Self {
        Self {
            name: index.name.clone(),
            key_path: index.key_path.clone(),
            unique: index.unique,
            multi_entry: Some(index.multi_entry),
        }
    }
}

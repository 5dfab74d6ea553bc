//! Store configuration

use serde::Deserialize;

use crate::error::{StoreError, StoreResult};
use crate::key::KeyPath;
use crate::schema::{normalize_all, IndexDescriptor};

/// Default object store name.
pub const DEFAULT_STORE_NAME: &str = "Store";

/// Prefix prepended to the store name to form the database name.
pub const DEFAULT_STORE_PREFIX: &str = "IDBWrapper-";

/// Default in-line key path.
pub const DEFAULT_KEY_PATH: &str = "id";

/// Configuration for one object store living in its own database.
///
/// Every field has a default. Deserializes from camelCase JSON, e.g.
/// `{"storeName": "customers", "dbVersion": 2, "indexes": [{"name": "email", "unique": true}]}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub store_name: String,
    pub store_prefix: String,
    pub db_version: u32,
    /// `None` stores keys out of line
    pub key_path: Option<KeyPath>,
    pub auto_increment: bool,
    pub indexes: Vec<IndexDescriptor>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            store_prefix: DEFAULT_STORE_PREFIX.to_string(),
            db_version: 1,
            key_path: Some(KeyPath::from(DEFAULT_KEY_PATH)),
            auto_increment: true,
            indexes: Vec::new(),
        }
    }
}

impl StoreConfig {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration document. Omitted fields take their defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn store_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store_prefix = prefix.into();
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.db_version = version;
        self
    }

    pub fn key_path(mut self, key_path: Option<KeyPath>) -> Self {
        self.key_path = key_path;
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Name of the database holding the store.
    pub fn db_name(&self) -> String {
        format!("{}{}", self.store_prefix, self.store_name)
    }

    /// Validate once, before the engine is touched.
    ///
    /// # Errors
    ///
    /// `StoreError::Config` for an empty store name, version 0, or a compound
    /// key path with auto-increment. Unnamed, duplicate or malformed index
    /// declarations are `StoreError::Schema`.
    pub fn validate(&self) -> StoreResult<()> {
        if self.store_name.is_empty() {
            return Err(StoreError::Config("store name must not be empty".into()));
        }
        if self.db_version == 0 {
            return Err(StoreError::Config("version must be at least 1".into()));
        }
        if self.auto_increment {
            match &self.key_path {
                Some(KeyPath::Compound(_)) => {
                    return Err(StoreError::Config(
                        "auto-increment cannot be used with a compound key path".into(),
                    ))
                }
                Some(KeyPath::Single(path)) if path.is_empty() => {
                    return Err(StoreError::Config(
                        "auto-increment cannot be used with the empty key path".into(),
                    ))
                }
                _ => {}
            }
        }

        normalize_all(&self.indexes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.db_name(), "IDBWrapper-Store");
        assert_eq!(config.key_path, Some(KeyPath::from("id")));
        assert!(config.auto_increment);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = StoreConfig::from_json(
            r#"{"storeName": "customers", "dbVersion": 3, "indexes": [{"name": "email", "unique": true}]}"#,
        )
        .unwrap();
        assert_eq!(config.db_name(), "IDBWrapper-customers");
        assert_eq!(config.db_version, 3);
        assert_eq!(config.indexes, vec![IndexDescriptor::new("email").unique()]);
        assert!(config.auto_increment);
    }

    #[test]
    fn test_out_of_line_keys_from_json() {
        let config = StoreConfig::from_json(r#"{"keyPath": null, "autoIncrement": false}"#).unwrap();
        assert_eq!(config.key_path, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        assert!(StoreConfig::new("").validate().is_err());
        assert!(StoreConfig::new("s").version(0).validate().is_err());
        assert!(StoreConfig::new("s")
            .key_path(Some(KeyPath::from(vec!["a", "b"])))
            .validate()
            .is_err());
        assert!(StoreConfig::new("s")
            .index(IndexDescriptor::default())
            .validate()
            .is_err());
        assert!(StoreConfig::new("s")
            .index(IndexDescriptor::new("a"))
            .index(IndexDescriptor::new("a"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_index_errors_are_schema_errors() {
        let unnamed = StoreConfig::new("s").index(IndexDescriptor::default());
        assert!(matches!(unnamed.validate(), Err(StoreError::Schema(_))));

        let twice = StoreConfig::new("s")
            .index(IndexDescriptor::new("a"))
            .index(IndexDescriptor::new("a").unique());
        assert!(matches!(twice.validate(), Err(StoreError::Schema(_))));

        assert!(matches!(
            StoreConfig::new("").index(IndexDescriptor::default()).validate(),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            StoreConfig::from_json(r#"{"dbVersion": "two"}"#),
            Err(StoreError::Config(_))
        ));
    }
}

//! Error types for the IndexedDB engine

use idbstore_core::StoreError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur talking to IndexedDB
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Transaction aborted or failed
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// A DOMException raised by the engine, e.g. `ConstraintError`
    #[error("{name}: {message}")]
    Dom { name: String, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

/// Human-readable form of a rejected JS value.
pub fn describe(val: &JsValue) -> String {
    if let Some(e) = val.dyn_ref::<DomException>() {
        return format!("{}: {}", e.name(), e.message());
    }
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        if let Some(e) = val.dyn_ref::<DomException>() {
            return IndexedDbError::Dom {
                name: e.name(),
                message: e.message(),
            };
        }
        IndexedDbError::Request(describe(&val))
    }
}

/// Convert IndexedDbError to StoreError, keeping the engine's error class
impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::Dom { name, message } => match name.as_str() {
                "ConstraintError" => StoreError::Constraint(message),
                "DataError" => StoreError::InvalidKey(message),
                "ReadOnlyError" => StoreError::ReadOnly(message),
                "AbortError" | "TransactionInactiveError" | "InvalidStateError" => {
                    StoreError::Transaction(format!("{name}: {message}"))
                }
                _ => StoreError::Backend(format!("{name}: {message}")),
            },
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::Transaction(msg) => StoreError::Transaction(msg),
            IndexedDbError::NotAvailable(msg) => {
                StoreError::Backend(format!("IndexedDB not available: {}", msg))
            }
            IndexedDbError::Open(msg) => StoreError::Backend(format!("IndexedDB open: {}", msg)),
            IndexedDbError::Request(msg) => {
                StoreError::Backend(format!("IndexedDB request: {}", msg))
            }
            IndexedDbError::JsValue(msg) => StoreError::Backend(format!("IndexedDB JS: {}", msg)),
        }
    }
}

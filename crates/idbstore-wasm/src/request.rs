//! JSON request shapes accepted by the browser bindings

use idbstore_core::{make_range, CountOptions, IterationOptions, KeyRangeSpec, Order, StoreResult};
use serde::Deserialize;

/// Options for `IdbStore.query`, e.g.
/// `{"index": "age", "order": "DESC", "keyRange": {"lower": 18}, "limit": 10}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryRequest {
    pub index: Option<String>,
    pub order: Order,
    pub filter_duplicates: bool,
    pub key_range: Option<KeyRangeSpec>,
    pub offset: u32,
    pub limit: Option<usize>,
}

impl QueryRequest {
    /// Parse a request; an empty string means "everything, ascending".
    pub fn from_json(json: &str) -> StoreResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_options(self) -> StoreResult<IterationOptions> {
        let mut options = IterationOptions::new().order(self.order).offset(self.offset);
        if let Some(index) = self.index {
            options = options.index(index);
        }
        if self.filter_duplicates {
            options = options.filter_duplicates();
        }
        if let Some(spec) = &self.key_range {
            options = options.key_range(make_range(spec)?);
        }
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        Ok(options)
    }
}

/// Options for `IdbStore.count`, e.g. `{"index": "age", "keyRange": {"only": 30}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CountRequest {
    pub index: Option<String>,
    pub key_range: Option<KeyRangeSpec>,
}

impl CountRequest {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_options(self) -> StoreResult<CountOptions> {
        let mut options = CountOptions::new();
        if let Some(index) = self.index {
            options = options.index(index);
        }
        if let Some(spec) = &self.key_range {
            options = options.key_range(make_range(spec)?);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idbstore_core::{Direction, Key, KeyRangeError, StoreError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_request_defaults() {
        let options = QueryRequest::from_json("").unwrap().into_options().unwrap();
        assert_eq!(options, IterationOptions::new());
    }

    #[test]
    fn test_query_request_full() {
        let request = QueryRequest::from_json(
            r#"{"index": "age", "order": "DESC", "filterDuplicates": true,
                "keyRange": {"lower": 18, "excludeLower": true}, "offset": 2, "limit": 5}"#,
        )
        .unwrap();
        let options = request.into_options().unwrap();

        assert_eq!(options.index.as_deref(), Some("age"));
        assert_eq!(options.direction(), Direction::PrevUnique);
        assert_eq!(options.offset, 2);
        assert_eq!(options.limit, Some(5));

        let range = options.key_range.unwrap();
        assert_eq!(range.lower(), Some(&Key::from(18)));
        assert!(range.exclude_lower());
        assert_eq!(range.upper(), None);
    }

    #[test]
    fn test_range_without_bounds_is_rejected() {
        let request = CountRequest::from_json(r#"{"keyRange": {}}"#).unwrap();
        assert_eq!(
            request.into_options().unwrap_err(),
            StoreError::InvalidKeyRange(KeyRangeError::NoBounds)
        );
    }

    #[test]
    fn test_bad_order_is_a_serialization_error() {
        let err = QueryRequest::from_json(r#"{"order": "sideways"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}

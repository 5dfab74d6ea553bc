//! IndexedDB keys and key paths
//!
//! Keys follow the engine's ordering: every number sorts before every date,
//! dates before strings, strings before binary keys and binary keys before
//! arrays. Arrays compare element by element, then by length.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{StoreError, StoreResult};

/// A valid IndexedDB key.
///
/// `Number` and `Date` must never hold NaN; use [`Key::number`] or
/// [`Key::from_value`] to build keys from untrusted input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Key {
    Number(f64),
    /// Milliseconds since the Unix epoch
    Date(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Key>),
}

impl Key {
    /// Build a number key, rejecting NaN.
    pub fn number(n: f64) -> StoreResult<Self> {
        if n.is_nan() {
            return Err(StoreError::InvalidKey("NaN is not a valid key".into()));
        }
        Ok(Key::Number(n))
    }

    /// Convert a JSON value into a key.
    ///
    /// Numbers, strings and arrays whose every element is a valid key convert;
    /// `null`, booleans and objects do not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().filter(|f| !f.is_nan()).map(Key::Number),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// JSON form of the key as written into records. Dates become their
    /// millisecond value and binary keys an array of bytes, so the key type
    /// does not survive [`Key::from_value`]. Use [`Key::to_wire`] when the key
    /// has to come back unchanged.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) | Key::Date(n) => number_value(*n),
            Key::String(s) => Value::String(s.clone()),
            Key::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    /// Tagged JSON form: `{"date": ms}` for dates, `{"binary": [bytes]}` for
    /// binary keys, plain JSON for the rest. This is the serde representation.
    pub fn to_wire(&self) -> Value {
        match self {
            Key::Date(ms) => json!({ DATE_TAG: number_value(*ms) }),
            Key::Binary(bytes) => json!({ BINARY_TAG: bytes }),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_wire).collect()),
            other => other.to_value(),
        }
    }

    /// Parse the tagged form written by [`Key::to_wire`]. Untagged values
    /// convert as in [`Key::from_value`].
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.len() == 1 => {
                if let Some(ms) = map.get(DATE_TAG) {
                    return ms.as_f64().filter(|f| !f.is_nan()).map(Key::Date);
                }
                let bytes = map.get(BINARY_TAG)?.as_array()?;
                bytes
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<_>>>()
                    .map(Key::Binary)
            }
            Value::Array(items) => items
                .iter()
                .map(Key::from_wire)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            other => Key::from_value(other),
        }
    }

    /// Numeric value for number keys.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::String(_) => 2,
            Key::Binary(_) => 3,
            Key::Array(_) => 4,
        }
    }
}

const DATE_TAG: &str = "date";
const BINARY_TAG: &str = "binary";

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) | (Key::Date(a), Key::Date(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Key::String(a), Key::String(b)) => a.cmp(b),
            (Key::Binary(a), Key::Binary(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl TryFrom<Value> for Key {
    type Error = StoreError;

    fn try_from(value: Value) -> StoreResult<Self> {
        Key::from_wire(&value)
            .ok_or_else(|| StoreError::InvalidKey(format!("{value} is not a valid key")))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_wire()
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

/// Where a key lives inside a record: a dotted path, or several for compound keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    Single(String),
    Compound(Vec<String>),
}

impl KeyPath {
    pub fn is_compound(&self) -> bool {
        matches!(self, KeyPath::Compound(_))
    }

    /// Evaluate the path against a record.
    ///
    /// Returns `None` when any segment is missing or the value found is not a
    /// valid key.
    pub fn extract(&self, record: &Value) -> Option<Key> {
        match self {
            KeyPath::Single(path) => resolve(record, path).and_then(Key::from_value),
            KeyPath::Compound(paths) => paths
                .iter()
                .map(|path| resolve(record, path).and_then(Key::from_value))
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
        }
    }

    /// Raw value at a single path, without key conversion. Used for
    /// multiEntry indexes, which explode arrays element by element.
    pub fn resolve<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        match self {
            KeyPath::Single(path) => resolve(record, path),
            KeyPath::Compound(_) => None,
        }
    }

    /// Write a generated key into a record at a single path, creating
    /// intermediate objects as needed.
    pub fn inject(&self, record: &mut Value, key: &Key) -> StoreResult<()> {
        let KeyPath::Single(path) = self else {
            return Err(StoreError::InvalidKey(
                "cannot inject a key at a compound key path".into(),
            ));
        };
        if path.is_empty() {
            return Err(StoreError::InvalidKey(
                "cannot inject a key at the empty key path".into(),
            ));
        }

        let segments: Vec<&str> = path.split('.').collect();
        inject_at(record, &segments, key, path)
    }
}

fn inject_at(record: &mut Value, segments: &[&str], key: &Key, path: &str) -> StoreResult<()> {
    let Value::Object(map) = record else {
        return Err(StoreError::InvalidKey(format!(
            "cannot inject key at \"{path}\": parent is not an object"
        )));
    };
    match segments {
        [] => Ok(()),
        [last] => {
            map.insert((*last).to_string(), key.to_value());
            Ok(())
        }
        [first, rest @ ..] => {
            let child = map
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            inject_at(child, rest, key, path)
        }
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::Single(path.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        KeyPath::Single(path)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(paths: Vec<&str>) -> Self {
        KeyPath::Compound(paths.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Single(path) => write!(f, "{path}"),
            KeyPath::Compound(paths) => write!(f, "[{}]", paths.join(", ")),
        }
    }
}

/// Empty path is the record itself.
fn resolve<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_ordering() {
        let mut keys = vec![
            Key::Array(vec![]),
            Key::Binary(vec![0]),
            Key::String("a".into()),
            Key::Date(0.0),
            Key::Number(100.0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::Number(100.0),
                Key::Date(0.0),
                Key::String("a".into()),
                Key::Binary(vec![0]),
                Key::Array(vec![]),
            ]
        );
    }

    #[test]
    fn test_array_ordering() {
        let short = Key::from(vec![Key::from(1), Key::from(2)]);
        let long = Key::from(vec![Key::from(1), Key::from(2), Key::from(0)]);
        let bigger = Key::from(vec![Key::from(2)]);
        assert!(short < long);
        assert!(long < bigger);
    }

    #[test]
    fn test_nan_rejected() {
        assert!(Key::number(f64::NAN).is_err());
        assert!(Key::try_from(json!(null)).is_err());
        assert!(Key::try_from(json!({"a": 1})).is_err());
        assert!(Key::try_from(json!([1, true])).is_err());
    }

    #[test]
    fn test_json_keeps_date_and_binary_keys() {
        let key = Key::Array(vec![Key::Date(1_700_000_000_000.0), Key::Binary(vec![0, 255])]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"[{"date":1700000000000},{"binary":[0,255]}]"#);

        let back: Key = serde_json::from_str(&json).unwrap();
        assert!(matches!(&back, Key::Array(items) if matches!(items[..], [Key::Date(_), Key::Binary(_)])));
        assert_eq!(back, key);

        assert_eq!(Key::Date(5.0).to_value(), json!(5));
        assert!(Key::try_from(json!({"binary": [256]})).is_err());
        assert!(Key::try_from(json!({"date": 1, "extra": 2})).is_err());
    }

    #[test]
    fn test_extract_dotted_path() {
        let record = json!({"id": 7, "owner": {"name": "ada"}});
        assert_eq!(KeyPath::from("id").extract(&record), Some(Key::from(7)));
        assert_eq!(
            KeyPath::from("owner.name").extract(&record),
            Some(Key::from("ada"))
        );
        assert_eq!(KeyPath::from("owner.age").extract(&record), None);
    }

    #[test]
    fn test_extract_compound_path() {
        let record = json!({"last": "lovelace", "first": "ada"});
        let path = KeyPath::from(vec!["last", "first"]);
        assert_eq!(
            path.extract(&record),
            Some(Key::from(vec![Key::from("lovelace"), Key::from("ada")]))
        );
        assert_eq!(KeyPath::from(vec!["last", "middle"]).extract(&record), None);
    }

    #[test]
    fn test_inject_creates_objects() {
        let mut record = json!({"name": "x"});
        KeyPath::from("meta.id")
            .inject(&mut record, &Key::from(3))
            .unwrap();
        assert_eq!(record, json!({"name": "x", "meta": {"id": 3}}));
    }

    #[test]
    fn test_key_path_deserializes_untagged() {
        let single: KeyPath = serde_json::from_value(json!("id")).unwrap();
        let compound: KeyPath = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(single, KeyPath::from("id"));
        assert_eq!(compound, KeyPath::from(vec!["a", "b"]));
    }
}

//! Conversions between idbstore types and JS values
//!
//! Records cross the boundary as JSON: `JSON.parse` on the way in,
//! `JSON.stringify` on the way out. Keys are converted structurally so
//! dates and binary keys keep their key type.

use idbstore_core::{Key, KeyPath, KeyRange};
use js_sys::{Array, ArrayBuffer, Date, Uint8Array};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::IdbKeyRange;

use crate::error::{describe, IndexedDbError, Result};

/// Convert a JSON record into a JS object for storage.
pub fn value_to_js(value: &Value) -> Result<JsValue> {
    let json = serde_json::to_string(value)?;
    js_sys::JSON::parse(&json).map_err(|e| IndexedDbError::JsValue(describe(&e)))
}

/// Convert a stored JS value back into JSON. `undefined` becomes `null`.
pub fn js_to_value(val: &JsValue) -> Result<Value> {
    if val.is_undefined() || val.is_null() {
        return Ok(Value::Null);
    }
    let json: String = js_sys::JSON::stringify(val)
        .map_err(|e| IndexedDbError::JsValue(describe(&e)))?
        .into();
    Ok(serde_json::from_str(&json)?)
}

pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n),
        Key::Date(ms) => Date::new(&JsValue::from_f64(*ms)).into(),
        Key::String(s) => JsValue::from_str(s),
        Key::Binary(bytes) => Uint8Array::from(bytes.as_slice()).buffer().into(),
        Key::Array(items) => items.iter().map(key_to_js).collect::<Array>().into(),
    }
}

/// Convert a key reported by the engine.
pub fn js_to_key(val: &JsValue) -> Result<Key> {
    if let Some(n) = val.as_f64() {
        return Ok(Key::Number(n));
    }
    if let Some(s) = val.as_string() {
        return Ok(Key::String(s));
    }
    if let Some(date) = val.dyn_ref::<Date>() {
        return Ok(Key::Date(date.get_time()));
    }
    if val.is_instance_of::<ArrayBuffer>() {
        return Ok(Key::Binary(Uint8Array::new(val).to_vec()));
    }
    if let Some(view) = val.dyn_ref::<Uint8Array>() {
        return Ok(Key::Binary(view.to_vec()));
    }
    if Array::is_array(val) {
        let items = Array::from(val)
            .iter()
            .map(|item| js_to_key(&item))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Key::Array(items));
    }
    Err(IndexedDbError::JsValue(format!(
        "{} is not a valid key",
        describe(val)
    )))
}

pub fn key_path_to_js(path: &KeyPath) -> JsValue {
    match path {
        KeyPath::Single(path) => JsValue::from_str(path),
        KeyPath::Compound(paths) => paths
            .iter()
            .map(|p| JsValue::from_str(p))
            .collect::<Array>()
            .into(),
    }
}

pub fn js_to_key_path(val: &JsValue) -> Result<KeyPath> {
    if let Some(path) = val.as_string() {
        return Ok(KeyPath::Single(path));
    }
    // DOMStringList and arrays both expose length/index access through Array.from
    let paths = Array::from(val)
        .iter()
        .map(|p| {
            p.as_string()
                .ok_or_else(|| IndexedDbError::JsValue(format!("bad key path segment {}", describe(&p))))
        })
        .collect::<Result<Vec<_>>>()?;
    if paths.is_empty() {
        return Err(IndexedDbError::JsValue(format!(
            "{} is not a key path",
            describe(val)
        )));
    }
    Ok(KeyPath::Compound(paths))
}

pub fn range_to_js(range: &KeyRange) -> Result<IdbKeyRange> {
    let built = match (range.lower(), range.upper()) {
        (Some(lower), Some(upper)) => IdbKeyRange::bound_with_lower_open_and_upper_open(
            &key_to_js(lower),
            &key_to_js(upper),
            range.exclude_lower(),
            range.exclude_upper(),
        ),
        (Some(lower), None) => IdbKeyRange::lower_bound_with_open(&key_to_js(lower), range.exclude_lower()),
        (None, Some(upper)) => IdbKeyRange::upper_bound_with_open(&key_to_js(upper), range.exclude_upper()),
        (None, None) => {
            return Err(IndexedDbError::JsValue("key range has no bounds".into()));
        }
    };
    built.map_err(IndexedDbError::from)
}

/// The range argument for cursor and count requests; `null` selects everything.
pub fn optional_range(range: Option<&KeyRange>) -> Result<JsValue> {
    match range {
        Some(range) => Ok(range_to_js(range)?.into()),
        None => Ok(JsValue::NULL),
    }
}

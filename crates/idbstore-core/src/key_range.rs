//! Key range construction
//!
//! A [`KeyRange`] always carries at least one bound. Callers describe the
//! range they want with a [`KeyRangeSpec`] and turn it into a range with
//! [`make_range`], which fails synchronously on contract violations.

use serde::Deserialize;

use crate::error::KeyRangeError;
use crate::key::Key;

/// A range of keys with optional, independently exclusive bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
    exclude_lower: bool,
    exclude_upper: bool,
}

impl KeyRange {
    /// Range bounded on both sides.
    pub fn bound(
        lower: Key,
        upper: Key,
        exclude_lower: bool,
        exclude_upper: bool,
    ) -> Result<Self, KeyRangeError> {
        if lower > upper {
            return Err(KeyRangeError::LowerAboveUpper);
        }
        if lower == upper && (exclude_lower || exclude_upper) {
            return Err(KeyRangeError::Empty);
        }
        Ok(Self {
            lower: Some(lower),
            upper: Some(upper),
            exclude_lower,
            exclude_upper,
        })
    }

    /// Every key above `lower`.
    pub fn lower_bound(lower: Key, exclude: bool) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
            exclude_lower: exclude,
            exclude_upper: false,
        }
    }

    /// Every key below `upper`.
    pub fn upper_bound(upper: Key, exclude: bool) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
            exclude_lower: false,
            exclude_upper: exclude,
        }
    }

    /// Exactly one key.
    pub fn only(key: Key) -> Self {
        Self {
            lower: Some(key.clone()),
            upper: Some(key),
            exclude_lower: false,
            exclude_upper: false,
        }
    }

    pub fn lower(&self) -> Option<&Key> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Key> {
        self.upper.as_ref()
    }

    pub fn exclude_lower(&self) -> bool {
        self.exclude_lower
    }

    pub fn exclude_upper(&self) -> bool {
        self.exclude_upper
    }

    /// True when `key` falls inside the range.
    pub fn contains(&self, key: &Key) -> bool {
        !self.is_below(key) && !self.is_above(key)
    }

    /// True when `key` sorts before the lower bound.
    pub fn is_below(&self, key: &Key) -> bool {
        match &self.lower {
            Some(lower) if self.exclude_lower => key <= lower,
            Some(lower) => key < lower,
            None => false,
        }
    }

    /// True when `key` sorts after the upper bound.
    pub fn is_above(&self, key: &Key) -> bool {
        match &self.upper {
            Some(upper) if self.exclude_upper => key >= upper,
            Some(upper) => key > upper,
            None => false,
        }
    }
}

/// Caller description of a key range.
///
/// Deserializes from `{"lower": 1, "excludeLower": true, "upper": 9}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyRangeSpec {
    pub lower: Option<Key>,
    pub upper: Option<Key>,
    pub exclude_lower: bool,
    pub exclude_upper: bool,
    pub only: Option<Key>,
}

impl KeyRangeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lower(mut self, key: impl Into<Key>) -> Self {
        self.lower = Some(key.into());
        self
    }

    pub fn upper(mut self, key: impl Into<Key>) -> Self {
        self.upper = Some(key.into());
        self
    }

    pub fn exclude_lower(mut self) -> Self {
        self.exclude_lower = true;
        self
    }

    pub fn exclude_upper(mut self) -> Self {
        self.exclude_upper = true;
        self
    }

    pub fn only(mut self, key: impl Into<Key>) -> Self {
        self.only = Some(key.into());
        self
    }
}

/// Build a [`KeyRange`] from a spec.
///
/// # Errors
///
/// [`KeyRangeError::NoBounds`] when neither bound nor `only` is given.
pub fn make_range(spec: &KeyRangeSpec) -> Result<KeyRange, KeyRangeError> {
    if let Some(only) = &spec.only {
        if spec.lower.is_some() || spec.upper.is_some() {
            return Err(KeyRangeError::OnlyWithBounds);
        }
        return Ok(KeyRange::only(only.clone()));
    }

    match (&spec.lower, &spec.upper) {
        (Some(lower), Some(upper)) => KeyRange::bound(
            lower.clone(),
            upper.clone(),
            spec.exclude_lower,
            spec.exclude_upper,
        ),
        (Some(lower), None) => Ok(KeyRange::lower_bound(lower.clone(), spec.exclude_lower)),
        (None, Some(upper)) => Ok(KeyRange::upper_bound(upper.clone(), spec.exclude_upper)),
        (None, None) => Err(KeyRangeError::NoBounds),
    }
}

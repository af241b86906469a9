//! Backend attribute values.
//!
//! A small closed tagged union mirroring the storage backend's wire types.
//! Domain models never see it directly: entities convert to and from an
//! [`Item`] using the helper accessors in this module.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

/// A single attribute value as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    /// UTF-8 string.
    S(String),
    /// Number, kept in its decimal text form.
    N(String),
    /// Raw bytes.
    B(Vec<u8>),
    Null,
}

/// A stored item: attribute name to value.
pub type Item = HashMap<String, AttrValue>;

impl AttrValue {
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    pub fn n(value: impl ToString) -> Self {
        Self::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text form used when the value participates in a composite key.
    ///
    /// Only strings and numbers can be embedded in a composite.
    pub fn key_text(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// True for `Null`, the empty string, empty bytes and numeric zero.
    ///
    /// These are the values a required partition key may never take.
    pub fn is_unset(&self) -> bool {
        match self {
            Self::S(s) => s.is_empty(),
            Self::N(n) => n.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(n.is_empty()),
            Self::B(b) => b.is_empty(),
            Self::Null => true,
        }
    }

    /// Orders two values of the same type the way the backend sorts keys.
    ///
    /// Strings compare lexicographically, numbers numerically and binary
    /// bytewise. Values of different types are not comparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Some(a.cmp(b)),
            (Self::B(a), Self::B(b)) => Some(a.cmp(b)),
            (Self::N(a), Self::N(b)) => {
                let a = a.trim().parse::<f64>().ok()?;
                let b = b.trim().parse::<f64>().ok()?;
                a.partial_cmp(&b)
            }
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::N(value.to_string())
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::N(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::N(value.to_string())
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(value: Vec<u8>) -> Self {
        Self::B(value)
    }
}

// ============================================================================
// Item accessors
// ============================================================================

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String, StoreError> {
    item.get(key)
        .and_then(AttrValue::as_s)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Decode(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute.
pub fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(AttrValue::as_s).map(str::to_string)
}

/// Get a required numeric attribute parsed into `T`.
pub fn get_number<T: FromStr>(item: &Item, key: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    let raw = item
        .get(key)
        .and_then(AttrValue::as_n)
        .ok_or_else(|| StoreError::Decode(format!("Missing or invalid field: {}", key)))?;
    raw.trim()
        .parse()
        .map_err(|e| StoreError::Decode(format!("Invalid number {}: {}", key, e)))
}

/// Get a required binary attribute.
pub fn get_binary(item: &Item, key: &str) -> Result<Vec<u8>, StoreError> {
    item.get(key)
        .and_then(AttrValue::as_b)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| StoreError::Decode(format!("Missing or invalid field: {}", key)))
}

/// Get a required date attribute (YYYY-MM-DD format).
pub fn get_date(item: &Item, key: &str) -> Result<NaiveDate, StoreError> {
    let s = get_string(item, key)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| StoreError::Decode(format!("Invalid date {}: {}", key, e)))
}

/// Get a required datetime attribute (RFC 3339 format).
pub fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, StoreError> {
    let s = get_string(item, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("Invalid datetime {}: {}", key, e)))
}

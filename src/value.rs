//! Dynamically-typed field values and the record shape passed between the
//! filter compilers and the storage adapters.
//!
//! A record is an ordered name → value mapping rather than a fixed struct:
//! the field set varies per entity and is only known from runtime metadata.

use std::cmp::Ordering;

use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::ser::{Serialize, Serializer};

use crate::metadata::{FieldDataType, FieldMetadata};

/// One decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    /// Numeric field with `scale == 0`.
    Integer(i64),
    /// Numeric field with `scale > 0`.
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Bool(bool),
    Bytes(Vec<u8>),
}

/// Ordered field-name → value mapping for one row.
pub type Record = IndexMap<String, FieldValue>;

/// Case-insensitive record lookup; record keys follow the backend's casing
/// while filter fields follow the client's.
#[must_use]
pub fn record_value<'a>(record: &'a Record, field: &str) -> Option<&'a FieldValue> {
    record
        .get(field)
        .or_else(|| record.iter().find(|(k, _)| k.eq_ignore_ascii_case(field)).map(|(_, v)| v))
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String content, with null read as the empty string. String operators
    /// substitute the zero value before substring tests.
    #[must_use]
    pub fn as_str_or_empty(&self) -> &str {
        match self {
            Self::String(s) => s.as_str(),
            _ => "",
        }
    }

    /// Coerce a JSON value into the declared type of `field`. Returns `None`
    /// when the value cannot be represented, which callers treat as "drop the
    /// field", not as an error.
    #[must_use]
    pub fn coerce(value: &serde_json::Value, field: &FieldMetadata) -> Option<Self> {
        if value.is_null() {
            return Some(Self::Null);
        }
        match field.field_type {
            FieldDataType::String => value.as_str().map(|s| Self::String(s.to_owned())),
            FieldDataType::Numeric => coerce_numeric(value, field.scale),
            FieldDataType::Date => text_of(value).and_then(|s| parse_date(&s)).map(Self::Date),
            FieldDataType::Time => text_of(value).and_then(|s| parse_time(&s)).map(Self::Time),
            FieldDataType::DateTime => text_of(value)
                .and_then(|s| parse_date_time(&s))
                .map(Self::DateTime),
            FieldDataType::ByteArray => value
                .as_str()
                .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
                .map(Self::Bytes),
        }
    }

    /// Best-effort mapping for values whose field is absent from the entity
    /// metadata. Unknown fields bypass type coercion.
    #[must_use]
    pub fn from_json_untyped(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || {
                    n.as_f64()
                        .and_then(|f| Decimal::try_from(f).ok())
                        .map_or(Self::Null, Self::Decimal)
                },
                Self::Integer,
            ),
            serde_json::Value::String(s) => Self::String(s.clone()),
            _ => Self::Null,
        }
    }

    /// Ordering used by both the predicate evaluator and the record sorter.
    /// Values of incomparable kinds (and nulls) yield `None`; callers decide
    /// what a null means for their operator.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Self::Decimal(a), Self::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::DateTime(b)) => {
                Some(a.and_time(NaiveTime::default()).cmp(b))
            }
            (Self::DateTime(a), Self::Date(b)) => {
                Some(a.cmp(&b.and_time(NaiveTime::default())))
            }
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality with null-aware semantics: null equals only null.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

fn coerce_numeric(value: &serde_json::Value, scale: u32) -> Option<FieldValue> {
    let dec = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))?,
        serde_json::Value::String(s) => s.trim().parse::<Decimal>().ok()?,
        _ => return None,
    };
    if scale > 0 {
        Some(FieldValue::Decimal(dec))
    } else {
        dec.to_i64().map(FieldValue::Integer)
    }
}

fn text_of(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a date-time from the formats accepted on the wire. A bare date
/// parses as midnight.
#[must_use]
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::default()))
}

#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(text).map(|dt| dt.date()))
}

#[must_use]
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(text, "%H:%M").ok())
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::String(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            // JSON has no decimal type; emit a number when the value fits,
            // else fall back to its exact string form.
            Self::Decimal(d) => match d.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&d.to_string()),
            },
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => serializer.serialize_str(&t.format("%H:%M:%S").to_string()),
            Self::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Bytes(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

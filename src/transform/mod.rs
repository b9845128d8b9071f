//! Record transformation into fixed-schema rows
//!
//! A [`Schema`] is a descriptor: an ordered list of [`ColumnSpec`]s, each naming
//! the target column, where its value comes from and how it is coerced. One
//! pure function, [`transform`], turns any raw API record into a [`Row`] aligned
//! to that column order.
//!
//! - `flatten`: nested objects → `_`-joined keys, arrays → JSON text
//! - `coerce`: total, never-failing conversions with per-kind defaults
//! - `schemas`: the user and track table descriptors

mod coerce;
mod flatten;
mod schemas;

pub use coerce::{epoch, parse_datetime};
pub use flatten::flatten;
pub use schemas::{TRACK_SCHEMA, USER_SCHEMA};

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

/// Format used for `DateTime` columns on the wire
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed scalar in a row
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    UInt(u64),
    Int(i64),
    Bool(bool),
    Str(String),
    DateTime(NaiveDateTime),
    StrArray(Vec<String>),
}

impl ColumnValue {
    /// Renders the value the way the analytical store expects it in JSON input
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::UInt(v) => Value::from(*v),
            Self::Int(v) => Value::from(*v),
            Self::Bool(v) => Value::Bool(*v),
            Self::Str(v) => Value::String(v.clone()),
            Self::DateTime(v) => Value::String(v.format(DATETIME_FORMAT).to_string()),
            Self::StrArray(v) => Value::Array(v.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// How a column's value is coerced, and what it defaults to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `UInt64`, default 0
    UInt64,
    /// `UInt32`, default 0, clamped
    UInt32,
    /// `Int32`, default 0, clamped
    Int32,
    /// `UInt8` holding 0/1
    Flag,
    /// `Bool`, default false
    Bool,
    /// `String`, default ""
    String,
    /// `DateTime`, default epoch sentinel
    DateTime,
    NullableString,
    NullableInt64,
    /// `Nullable(Int32)` that is 0 when the key is absent; only an explicit null stays NULL
    NullableInt32OrZero,
    NullableBool,
    NullableDateTime,
    /// `Nullable(DateTime)` that also nulls anything before 1970
    NullableDatePost1970,
    /// Original subtree as JSON text; `default` when the field is missing
    Json { default: &'static str },
    /// Original subtree as JSON text, NULL when missing or null
    NullableJson,
    /// `Array(String)` holding the subtree's JSON text as its single element
    JsonArray { default: &'static str },
    /// Side channel: every top-level key of the original record
    RawKeys,
    /// Side channel: every top-level value of the original record, JSON-encoded
    RawValues,
}

impl ColumnKind {
    /// Whether the value has the shape this column is declared with
    pub fn accepts(&self, value: &ColumnValue) -> bool {
        match (self, value) {
            (Self::UInt64, ColumnValue::UInt(_)) => true,
            (Self::UInt32, ColumnValue::UInt(v)) => *v <= u64::from(u32::MAX),
            (Self::Flag, ColumnValue::UInt(v)) => *v <= 1,
            (Self::Int32, ColumnValue::Int(v)) => i32::try_from(*v).is_ok(),
            (Self::Bool, ColumnValue::Bool(_)) => true,
            (Self::String | Self::Json { .. }, ColumnValue::Str(_)) => true,
            (Self::DateTime, ColumnValue::DateTime(_)) => true,
            (Self::JsonArray { .. } | Self::RawKeys | Self::RawValues, ColumnValue::StrArray(_)) => {
                true
            }
            (
                Self::NullableString
                | Self::NullableInt64
                | Self::NullableInt32OrZero
                | Self::NullableBool
                | Self::NullableDateTime
                | Self::NullableDatePost1970
                | Self::NullableJson,
                ColumnValue::Null,
            ) => true,
            (Self::NullableString | Self::NullableJson, ColumnValue::Str(_)) => true,
            (Self::NullableInt64, ColumnValue::Int(_)) => true,
            (Self::NullableInt32OrZero, ColumnValue::Int(v)) => i32::try_from(*v).is_ok(),
            (Self::NullableBool, ColumnValue::Bool(_)) => true,
            (Self::NullableDateTime | Self::NullableDatePost1970, ColumnValue::DateTime(_)) => {
                true
            }
            _ => false,
        }
    }
}

/// Where a column reads its input from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A key of the flattened record
    Flat(&'static str),
    /// A top-level key of the original, unflattened record
    Raw(&'static str),
    /// The whole original record (side channel)
    Record,
}

/// One column of a target table
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub lookup: Lookup,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    /// Column read from the flattened record under its own name
    pub const fn flat(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            lookup: Lookup::Flat(name),
            kind,
        }
    }

    /// Column read from the original record under its own name
    pub const fn raw(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            lookup: Lookup::Raw(name),
            kind,
        }
    }

    /// Side-channel key array
    pub const fn side_keys(name: &'static str) -> Self {
        Self {
            name,
            lookup: Lookup::Record,
            kind: ColumnKind::RawKeys,
        }
    }

    /// Side-channel value array
    pub const fn side_values(name: &'static str) -> Self {
        Self {
            name,
            lookup: Lookup::Record,
            kind: ColumnKind::RawValues,
        }
    }

    fn extract(&self, record: Option<&Map<String, Value>>, flat: &Map<String, Value>) -> ColumnValue {
        let input = match self.lookup {
            Lookup::Flat(key) => flat.get(key),
            Lookup::Raw(key) => record.and_then(|r| r.get(key)),
            Lookup::Record => None,
        };
        coerce_column(self.kind, input, record)
    }
}

fn coerce_column(
    kind: ColumnKind,
    input: Option<&Value>,
    record: Option<&Map<String, Value>>,
) -> ColumnValue {
    match kind {
        ColumnKind::UInt64 => ColumnValue::UInt(coerce::to_u64(input)),
        ColumnKind::UInt32 => ColumnValue::UInt(coerce::clamp_u32(coerce::to_u64(input))),
        ColumnKind::Int32 => ColumnValue::Int(coerce::clamp_i32(coerce::to_i64(input))),
        ColumnKind::Flag => ColumnValue::UInt(u64::from(coerce::to_bool(input))),
        ColumnKind::Bool => ColumnValue::Bool(coerce::to_bool(input)),
        ColumnKind::String => ColumnValue::Str(coerce::to_text(input)),
        ColumnKind::DateTime => ColumnValue::DateTime(coerce::to_datetime(input)),
        ColumnKind::NullableString => nullable(coerce::to_text_opt(input), ColumnValue::Str),
        ColumnKind::NullableInt64 => nullable(coerce::to_i64_opt(input), ColumnValue::Int),
        ColumnKind::NullableInt32OrZero => match input {
            None => ColumnValue::Int(0),
            Some(_) => nullable(
                coerce::to_i64_opt(input).map(coerce::clamp_i32),
                ColumnValue::Int,
            ),
        },
        ColumnKind::NullableBool => nullable(coerce::to_bool_opt(input), ColumnValue::Bool),
        ColumnKind::NullableDateTime => {
            nullable(coerce::to_datetime_opt(input), ColumnValue::DateTime)
        }
        ColumnKind::NullableDatePost1970 => nullable(
            coerce::to_datetime_opt(input).filter(|dt| *dt >= epoch()),
            ColumnValue::DateTime,
        ),
        ColumnKind::Json { default } => ColumnValue::Str(
            input
                .map(coerce::json_text)
                .unwrap_or_else(|| default.to_string()),
        ),
        ColumnKind::NullableJson => match input {
            None | Some(Value::Null) => ColumnValue::Null,
            Some(Value::String(s)) => ColumnValue::Str(s.clone()),
            Some(other) => ColumnValue::Str(coerce::json_text(other)),
        },
        ColumnKind::JsonArray { default } => ColumnValue::StrArray(vec![input
            .map(coerce::json_text)
            .unwrap_or_else(|| default.to_string())]),
        ColumnKind::RawKeys => ColumnValue::StrArray(
            record
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default(),
        ),
        ColumnKind::RawValues => ColumnValue::StrArray(
            record
                .map(|r| r.values().map(coerce::json_text).collect())
                .unwrap_or_default(),
        ),
    }
}

fn nullable<T>(value: Option<T>, wrap: impl FnOnce(T) -> ColumnValue) -> ColumnValue {
    value.map(wrap).unwrap_or(ColumnValue::Null)
}

/// Fixed column layout of one target table
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl Schema {
    /// Column names in insertion order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A transformed record, values aligned to its schema's column order
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<ColumnValue>);

impl Row {
    pub fn values(&self) -> &[ColumnValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks a value up by column name
    pub fn get(&self, schema: &Schema, column: &str) -> Option<&ColumnValue> {
        schema
            .columns
            .iter()
            .position(|c| c.name == column)
            .and_then(|i| self.0.get(i))
    }

    /// Builds a JSON object keyed by column name, in column order
    pub fn to_json_object(&self, schema: &Schema) -> Map<String, Value> {
        schema
            .columns
            .iter()
            .zip(&self.0)
            .map(|(column, value)| (column.name.to_string(), value.to_json()))
            .collect()
    }
}

/// Transforms one raw API record into a row of the given schema
///
/// Pure and total: the same record always yields the same row, and missing or
/// malformed fields fall back to their column's default. A record that is not
/// a JSON object yields a row of defaults.
pub fn transform(record: &Value, schema: &Schema) -> Row {
    let flat = flatten(record);
    let original = record.as_object();
    Row(schema
        .columns
        .iter()
        .map(|column| column.extract(original, &flat))
        .collect())
}

//! Value Coercion
//!
//! Converts an untyped document attribute into a fixed scalar target on
//! demand:
//!
//! - null gives the target's zero (`0`, `0.0`, `false`) or `None` for
//!   reference targets (strings, bytes, decimals, dates)
//! - numbers narrow and widen with `as` semantics, no overflow checks
//! - text is parsed with the target's conventional representation, and a
//!   malformed string is a [`DriverError::FormatError`]
//! - every other pairing (an object asked for as a number, say) yields the
//!   default instead of failing; callers tell nulls apart through `was_null`

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::core::{DriverError, Result, Value};

/// Types a document value can be coerced into.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn parse_text<T: FromStr>(text: &str, target: &str) -> Result<T> {
    text.parse::<T>().map_err(|_| {
        DriverError::FormatError(format!("cannot convert '{}' to {}", text, target))
    })
}

macro_rules! numeric_from_value {
    ($($ty:ty => $target:literal),* $(,)?) => {$(
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Integer(i) => Ok(*i as $ty),
                    Value::Double(d) => Ok(*d as $ty),
                    Value::String(s) => parse_text(s, $target),
                    _ => Ok(0 as $ty),
                }
            }
        }
    )*};
}

numeric_from_value! {
    i8 => "TINYINT",
    i16 => "SMALLINT",
    i32 => "INTEGER",
    i64 => "BIGINT",
    f32 => "REAL",
    f64 => "DOUBLE",
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            Value::String(s) => Err(DriverError::FormatError(format!(
                "cannot convert '{}' to BOOLEAN",
                s
            ))),
            _ => Ok(false),
        }
    }
}

impl FromValue for Option<String> {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }
}

impl FromValue for Option<Vec<u8>> {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Bytes(bytes) => Some(bytes.clone()),
            Value::String(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        })
    }
}

/// Integers convert exactly, doubles through their binary value. Text is
/// parsed as plain or scientific notation.
impl FromValue for Option<Decimal> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(Some(Decimal::from(*i))),
            Value::Double(d) => Decimal::try_from(*d).map(Some).map_err(|_| {
                DriverError::FormatError(format!("cannot convert {} to DECIMAL", d))
            }),
            Value::String(s) => Decimal::from_str(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .map(Some)
                .map_err(|_| {
                    DriverError::FormatError(format!("cannot convert '{}' to DECIMAL", s))
                }),
            _ => Ok(None),
        }
    }
}

impl FromValue for Option<NaiveDate> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(Some(ts.date_naive())),
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
                .map(Some)
                .ok_or_else(|| DriverError::FormatError(format!("cannot convert '{}' to DATE", s))),
            _ => Ok(None),
        }
    }
}

impl FromValue for Option<NaiveTime> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(Some(ts.time())),
            Value::String(s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.time()))
                .map(Some)
                .ok_or_else(|| DriverError::FormatError(format!("cannot convert '{}' to TIME", s))),
            _ => Ok(None),
        }
    }
}

impl FromValue for Option<NaiveDateTime> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(Some(ts.naive_utc())),
            Value::String(s) => parse_timestamp(s).map(Some).ok_or_else(|| {
                DriverError::FormatError(format!("cannot convert '{}' to TIMESTAMP", s))
            }),
            _ => Ok(None),
        }
    }
}

impl FromValue for Option<Value> {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => None,
            other => Some(other.clone()),
        })
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

/// `yyyy-mm-dd hh:mm:ss[.f]`, the same with a `T` separator, or RFC 3339
/// with an offset (normalized to UTC).
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

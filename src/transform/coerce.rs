//! Total coercions from loosely typed JSON values to column scalars
//!
//! None of these functions fail: every malformed or missing input maps to the
//! column's default.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Serializes a JSON value to compact text, keeping non-ASCII characters as-is
pub fn json_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Coerces to an unsigned integer; negatives and garbage become 0
pub fn to_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else if let Some(v) = n.as_f64() {
                if v.is_finite() && v > 0.0 {
                    v.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => parse_number_text(s)
            .filter(|v| *v > 0.0)
            .map(|v| v as u64)
            .unwrap_or(0),
        Some(Value::Bool(b)) => u64::from(*b),
        _ => 0,
    }
}

/// Coerces to a signed integer, or `None` when the value carries no number
pub fn to_i64_opt(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
        }),
        Some(Value::String(s)) => parse_number_text(s).map(|v| v as i64),
        Some(Value::Bool(b)) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Coerces to a signed integer; garbage becomes 0
pub fn to_i64(value: Option<&Value>) -> i64 {
    to_i64_opt(value).unwrap_or(0)
}

/// Clamps into the `Int32` range
pub fn clamp_i32(value: i64) -> i64 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX))
}

/// Clamps into the `UInt32` range
pub fn clamp_u32(value: u64) -> u64 {
    value.min(u64::from(u32::MAX))
}

fn parse_number_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v as f64);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerces to a boolean: `"1"`, `"true"`, `"yes"` and non-zero numbers are true
pub fn to_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            s == "1" || s == "true" || s == "yes"
        }
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Coerces to a boolean, or `None` when absent or null
pub fn to_bool_opt(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => None,
        other => Some(to_bool(other)),
    }
}

/// Coerces to text; null and missing become the empty string
pub fn to_text(value: Option<&Value>) -> String {
    to_text_opt(value).unwrap_or_default()
}

/// Coerces to text, or `None` when absent or null
///
/// Nested values are rendered as JSON text.
pub fn to_text_opt(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(nested) => Some(json_text(nested)),
    }
}

/// Fixed sentinel used for missing or unparseable non-nullable timestamps
pub fn epoch() -> NaiveDateTime {
    // 1970-01-01 00:00:00
    NaiveDateTime::default()
}

/// Parses the timestamp shapes the API is known to emit
///
/// Accepted: RFC 3339 (`2020-01-02T03:04:05Z`), naive ISO with `T` or space,
/// the legacy `2009/09/24 12:21:08 +0000` form, bare dates, and as a last
/// resort a digit run interpreted as epoch milliseconds.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y/%m/%d %H:%M:%S %z") {
        return Some(dt.naive_utc());
    }

    let without_zone = s.trim_end_matches('Z');
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 10 && digits.len() == s.len() {
        let millis: i64 = digits.parse().ok()?;
        return DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }

    None
}

/// Parses a timestamp value, or `None` for anything that is not a parseable string
pub fn to_datetime_opt(value: Option<&Value>) -> Option<NaiveDateTime> {
    match value {
        Some(Value::String(s)) => parse_datetime(s),
        _ => None,
    }
}

/// Parses a timestamp, falling back to the epoch sentinel
pub fn to_datetime(value: Option<&Value>) -> NaiveDateTime {
    to_datetime_opt(value).unwrap_or_else(epoch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_to_u64() {
        assert_eq!(to_u64(Some(&json!(42))), 42);
        assert_eq!(to_u64(Some(&json!("17"))), 17);
        assert_eq!(to_u64(Some(&json!(3.9))), 3);
        assert_eq!(to_u64(Some(&json!(-5))), 0);
        assert_eq!(to_u64(Some(&json!("not a number"))), 0);
        assert_eq!(to_u64(Some(&json!(true))), 1);
        assert_eq!(to_u64(Some(&Value::Null)), 0);
        assert_eq!(to_u64(None), 0);
    }

    #[test]
    fn test_to_i64() {
        assert_eq!(to_i64(Some(&json!(-5))), -5);
        assert_eq!(to_i64(Some(&json!(" 12 "))), 12);
        assert_eq!(to_i64(Some(&json!({"a": 1}))), 0);
        assert_eq!(to_i64_opt(Some(&Value::Null)), None);
        assert_eq!(clamp_i32(i64::MAX), i64::from(i32::MAX));
        assert_eq!(clamp_u32(u64::MAX), u64::from(u32::MAX));
    }

    #[test]
    fn test_to_bool() {
        assert!(to_bool(Some(&json!(true))));
        assert!(to_bool(Some(&json!("Yes"))));
        assert!(to_bool(Some(&json!("1"))));
        assert!(to_bool(Some(&json!(2))));
        assert!(!to_bool(Some(&json!("no"))));
        assert!(!to_bool(Some(&json!(0))));
        assert!(!to_bool(None));
        assert_eq!(to_bool_opt(Some(&Value::Null)), None);
        assert_eq!(to_bool_opt(Some(&json!(false))), Some(false));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(Some(&json!("abc"))), "abc");
        assert_eq!(to_text(Some(&json!(12))), "12");
        assert_eq!(to_text(Some(&Value::Null)), "");
        assert_eq!(to_text(None), "");
        assert_eq!(to_text_opt(Some(&json!({"k": "v"}))).as_deref(), Some(r#"{"k":"v"}"#));
    }

    #[test]
    fn test_json_text_keeps_unicode() {
        assert_eq!(json_text(&json!(["Zürich", "東京"])), r#"["Zürich","東京"]"#);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2021-06-01T12:30:45Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 6, 1));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (12, 30, 45));

        assert_eq!(parse_datetime("2021-06-01 12:30:45"), Some(dt));
        assert_eq!(parse_datetime("2021-06-01T12:30:45"), Some(dt));
        assert_eq!(parse_datetime("2021/06/01 12:30:45 +0000"), Some(dt));

        let shifted = parse_datetime("2021-06-01T14:30:45+02:00").unwrap();
        assert_eq!(shifted, dt);

        let date_only = parse_datetime("2021-06-01").unwrap();
        assert_eq!(date_only.hour(), 0);

        let millis = parse_datetime("1622550645000").unwrap();
        assert_eq!(millis, dt);
    }

    #[test]
    fn test_parse_datetime_garbage() {
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("yesterday"), None);
        assert_eq!(parse_datetime("12"), None);
        assert_eq!(to_datetime(Some(&json!("nope"))), epoch());
        assert_eq!(to_datetime(Some(&json!(12345))), epoch());
        assert_eq!(to_datetime(None), epoch());
    }
}

//! The `Value` tagged union and its coercion accessors.

use crate::numeric::{normalize_big_decimal, to_serial_double};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display as StrumDisplay, EnumString};
use thiserror::Error;

/// Which temporal shape a `Value::Date`/`Time`/`DateTime` variant holds.
/// Kept as a separate enum (rather than folding the three variants into
/// one) so accessors can report "is this a pure date/time/both" without
/// re-deriving it from the stored instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString, serde::Serialize, serde::Deserialize)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

/// Discriminant tag for a `Value`, independent of its payload. Used by the
/// tokenizer to stamp a literal token's `value_type` and by `VarType`/
/// `TypeName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, serde::Serialize, serde::Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Long,
    Double,
    BigDec,
    String,
    Date,
    Time,
    DateTime,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    #[error("cannot convert {from} to {to}")]
    Coercion { from: &'static str, to: &'static str },
    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: &'static str },
    #[error("'{text}' is not a valid number")]
    NotANumber { text: String },
    #[error("'{text}' is not a valid date")]
    NotADate { text: String },
}

/// A runtime value of the expression engine. Closed variant set; every
/// operator and function in the engine produces and consumes only these
/// nine kinds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i32),
    Double(f64),
    BigDec(BigDecimal),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn big_decimal(v: BigDecimal) -> Self {
        Value::BigDec(normalize_big_decimal(&v))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Value::Date(_) | Value::Time(_) | Value::DateTime(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_) | Value::BigDec(_) | Value::Bool(_))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::BigDec(_) => ValueKind::BigDec,
            Value::String(_) => ValueKind::String,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::DateTime(_) => ValueKind::DateTime,
        }
    }

    pub fn temporal_kind(&self) -> Option<TemporalKind> {
        match self {
            Value::Date(_) => Some(TemporalKind::Date),
            Value::Time(_) => Some(TemporalKind::Time),
            Value::DateTime(_) => Some(TemporalKind::DateTime),
            _ => None,
        }
    }

    /// VB-style type code: 1=Null, 3=Long, 5=Double, 7=Date, 8=String,
    /// 11=Bool, 14=Decimal. `Date`/`Time` both report the Date code since
    /// VBA has no distinct time type code.
    pub fn var_type_code(&self) -> i32 {
        match self {
            Value::Null => 1,
            Value::Bool(_) => 11,
            Value::Long(_) => 3,
            Value::Double(_) => 5,
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => 7,
            Value::String(_) => 8,
            Value::BigDec(_) => 14,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => "Date",
            Value::String(_) => "String",
            Value::BigDec(_) => "Decimal",
        }
    }

    /// `True` is represented as -1, `False` as 0, matching `spec.md`'s
    /// boolean-numeric-identity invariant.
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Long(n) => Ok(*n != 0),
            Value::Double(n) => Ok(*n != 0.0),
            Value::BigDec(n) => Ok(!bigdecimal::Zero::is_zero(n)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => self
                    .as_double()
                    .map(|d| d != 0.0)
                    .map_err(|_| ValueError::Coercion { from: "String", to: "Boolean" }),
            },
            _ => Err(ValueError::Coercion { from: self.type_name(), to: "Boolean" }),
        }
    }

    pub fn as_long(&self) -> Result<i32, ValueError> {
        match self {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(if *b { -1 } else { 0 }),
            Value::Long(n) => Ok(*n),
            Value::Double(n) => {
                if n.is_finite() && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 {
                    Ok(n.round() as i32)
                } else {
                    Err(ValueError::OutOfRange { value: n.to_string(), to: "Long" })
                }
            }
            Value::BigDec(n) => n
                .to_i32()
                .ok_or_else(|| ValueError::OutOfRange { value: n.to_string(), to: "Long" }),
            Value::String(s) => {
                let d = parse_numeric_string(s).ok_or_else(|| ValueError::NotANumber { text: s.clone() })?;
                Value::Double(d).as_long()
            }
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                Value::Double(self.as_double()?).as_long()
            }
        }
    }

    pub fn as_double(&self) -> Result<f64, ValueError> {
        match self {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { -1.0 } else { 0.0 }),
            Value::Long(n) => Ok(*n as f64),
            Value::Double(n) => Ok(*n),
            Value::BigDec(n) => n
                .to_f64()
                .ok_or_else(|| ValueError::OutOfRange { value: n.to_string(), to: "Double" }),
            Value::String(s) => parse_numeric_string(s).ok_or_else(|| ValueError::NotANumber { text: s.clone() }),
            Value::Date(d) => Ok(to_serial_double(NaiveDateTime::new(
                *d,
                NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            ))),
            Value::Time(t) => Ok(to_serial_double(NaiveDateTime::new(
                NaiveDate::from_ymd_opt(1899, 12, 30).unwrap(),
                *t,
            ))),
            Value::DateTime(dt) => Ok(to_serial_double(*dt)),
        }
    }

    pub fn as_big_decimal(&self) -> Result<BigDecimal, ValueError> {
        match self {
            Value::BigDec(n) => Ok(n.clone()),
            Value::Long(n) => Ok(BigDecimal::from(*n)),
            Value::Bool(b) => Ok(BigDecimal::from(if *b { -1 } else { 0 })),
            Value::Null => Ok(BigDecimal::from(0)),
            Value::Double(n) => BigDecimal::try_from(*n)
                .map_err(|_| ValueError::Coercion { from: "Double", to: "Decimal" }),
            Value::String(s) => BigDecimal::from_str(s.trim())
                .map_err(|_| ValueError::NotANumber { text: s.clone() }),
            _ => BigDecimal::try_from(self.as_double()?)
                .map_err(|_| ValueError::Coercion { from: self.type_name(), to: "Decimal" }),
        }
    }

    /// String rendering used by `&` concatenation, `CStr`, and arithmetic
    /// promotion to string. Booleans render as `-1`/`0` as the data-model
    /// invariant requires; temporal values use a fixed ISO-ish rendering
    /// here (locale-aware rendering for `Str`/`Format` lives in the format
    /// engine, which calls into a `LocaleContext`).
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "-1" } else { "0" }.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Double(n) => format_plain_f64(*n),
            Value::BigDec(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%m/%d/%Y").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::DateTime(dt) => dt.format("%m/%d/%Y %H:%M:%S").to_string(),
        }
    }

    /// The underlying naive date-time for a temporal value (serial-zero
    /// time-of-day for pure dates, Access-epoch date for pure times).
    pub fn as_date_time(&self) -> Result<NaiveDateTime, ValueError> {
        match self {
            Value::Date(d) => Ok(NaiveDateTime::new(*d, NaiveTime::from_hms_opt(0, 0, 0).unwrap())),
            Value::Time(t) => Ok(NaiveDateTime::new(
                NaiveDate::from_ymd_opt(1899, 12, 30).unwrap(),
                *t,
            )),
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => parse_date_literal(s).and_then(|v| v.as_date_time()),
            Value::Double(_) | Value::Long(_) | Value::BigDec(_) => {
                Ok(crate::numeric::from_serial_double(self.as_double()?))
            }
            _ => Err(ValueError::Coercion { from: self.type_name(), to: "Date" }),
        }
    }

    /// Coerce to a temporal `Value` (as opposed to a bare `NaiveDateTime`),
    /// preserving the requested temporal shape.
    pub fn as_date_time_value(&self, kind: TemporalKind) -> Result<Value, ValueError> {
        let dt = self.as_date_time()?;
        Ok(match kind {
            TemporalKind::Date => Value::Date(dt.date()),
            TemporalKind::Time => Value::Time(dt.time()),
            TemporalKind::DateTime => Value::DateTime(dt),
        })
    }
}

fn format_plain_f64(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{}", n);
        s
    }
}

/// Shared numeric-literal leniency used by both the tokenizer's bare-word
/// number detection and `Value::as_long`/`as_double` string coercion:
/// leading sign, digits, at most one `.`, optional exponent.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn parse_date_literal(s: &str) -> Result<Value, ValueError> {
    // Minimal fallback used only by `as_date_time` on bare strings; the
    // tokenizer's `#...#` literal path does locale-aware parsing and is
    // the primary way dates enter the tree.
    for fmt in ["%m/%d/%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s.trim(), fmt) {
            return Ok(Value::Date(d));
        }
    }
    Err(ValueError::NotADate { text: s.to_string() })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_numeric_identity() {
        assert_eq!(Value::Bool(true).as_long().unwrap(), -1);
        assert_eq!(Value::Bool(false).as_long().unwrap(), 0);
        assert_eq!(Value::Bool(true).as_string(), "-1");
        assert_eq!(Value::Bool(false).as_string(), "0");
    }

    #[test]
    fn null_is_null_only_on_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Long(0).is_null());
    }

    #[test]
    fn var_type_codes_match_vb() {
        assert_eq!(Value::Null.var_type_code(), 1);
        assert_eq!(Value::Long(1).var_type_code(), 3);
        assert_eq!(Value::Double(1.0).var_type_code(), 5);
        assert_eq!(Value::String("x".into()).var_type_code(), 8);
        assert_eq!(Value::big_decimal(BigDecimal::from(1)).var_type_code(), 14);
    }

    #[test]
    fn string_to_number_coercion() {
        assert_eq!(Value::String("42".into()).as_double().unwrap(), 42.0);
        assert!(Value::String("abc".into()).as_double().is_err());
    }
}

//! The operator kernel: arithmetic, comparison, logical, string and
//! predicate operators over `Value`, with null propagation and numeric
//! promotion rules applied uniformly regardless of which AST node or
//! builtin function invoked them.

use crate::error::EvalError;
use access_core::numeric::round_half_even;
use access_core::{from_serial_double, TemporalKind, Value};
use bigdecimal::{BigDecimal, ToPrimitive};

/// Which numeric domain a binary arithmetic op should compute in, chosen
/// from its operands' kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Long,
    Double,
    BigDec,
}

fn domain_of(a: &Value, b: &Value) -> Domain {
    if matches!(a, Value::BigDec(_)) || matches!(b, Value::BigDec(_)) {
        Domain::BigDec
    } else if matches!(a, Value::Double(_)) || matches!(b, Value::Double(_)) {
        Domain::Double
    } else {
        Domain::Long
    }
}

fn op_name(name: &'static str) -> &'static str {
    name
}

macro_rules! propagate_null {
    ($a:expr, $b:expr) => {
        if $a.is_null() || $b.is_null() {
            return Ok(Value::Null);
        }
    };
}

/// Rebuilds a temporal `Value` of the same kind from a serial-double
/// arithmetic result. Returns `None` when neither operand is temporal, so
/// the caller falls through to plain numeric promotion.
fn temporal_arithmetic(a: &Value, b: &Value, combine: impl Fn(f64, f64) -> f64) -> Result<Option<Value>, EvalError> {
    let Some(kind) = a.temporal_kind().or_else(|| b.temporal_kind()) else {
        return Ok(None);
    };
    let result = combine(to_double(a)?, to_double(b)?);
    let dt = from_serial_double(result);
    Ok(Some(match kind {
        TemporalKind::Date => Value::Date(dt.date()),
        TemporalKind::Time => Value::Time(dt.time()),
        TemporalKind::DateTime => Value::DateTime(dt),
    }))
}

/// `True` when both operands are strings; `+` concatenates non-numeric
/// strings rather than forcing a numeric coercion that would raise a
/// `TypeMismatch` on the first non-numeric character.
fn string_concat_promotion(a: &Value, b: &Value) -> Option<Value> {
    let (Value::String(sa), Value::String(sb)) = (a, b) else {
        return None;
    };
    match (access_core::value::parse_numeric_string(sa), access_core::value::parse_numeric_string(sb)) {
        (Some(x), Some(y)) => Some(Value::Double(x + y)),
        _ => Some(Value::String(format!("{sa}{sb}"))),
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    if let Some(result) = temporal_arithmetic(a, b, |x, y| x + y)? {
        return Ok(result);
    }
    if let Some(result) = string_concat_promotion(a, b) {
        return Ok(result);
    }
    match domain_of(a, b) {
        Domain::Long => {
            let (x, y) = (to_long(a)?, to_long(b)?);
            match x.checked_add(y) {
                Some(n) => Ok(Value::Long(n)),
                None => Ok(Value::Double(x as f64 + y as f64)),
            }
        }
        Domain::Double => Ok(Value::Double(to_double(a)? + to_double(b)?)),
        Domain::BigDec => Ok(Value::big_decimal(to_bigdec(a)? + to_bigdec(b)?)),
    }
}

pub fn subtract(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    if let Some(result) = temporal_arithmetic(a, b, |x, y| x - y)? {
        return Ok(result);
    }
    match domain_of(a, b) {
        Domain::Long => {
            let (x, y) = (to_long(a)?, to_long(b)?);
            match x.checked_sub(y) {
                Some(n) => Ok(Value::Long(n)),
                None => Ok(Value::Double(x as f64 - y as f64)),
            }
        }
        Domain::Double => Ok(Value::Double(to_double(a)? - to_double(b)?)),
        Domain::BigDec => Ok(Value::big_decimal(to_bigdec(a)? - to_bigdec(b)?)),
    }
}

pub fn multiply(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    match domain_of(a, b) {
        Domain::Long => {
            let (x, y) = (to_long(a)?, to_long(b)?);
            match x.checked_mul(y) {
                Some(n) => Ok(Value::Long(n)),
                None => Ok(Value::Double(x as f64 * y as f64)),
            }
        }
        Domain::Double => Ok(Value::Double(to_double(a)? * to_double(b)?)),
        Domain::BigDec => Ok(Value::big_decimal(to_bigdec(a)? * to_bigdec(b)?)),
    }
}

pub fn divide(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    match domain_of(a, b) {
        Domain::BigDec => {
            let (x, y) = (to_bigdec(a)?, to_bigdec(b)?);
            if bigdecimal::Zero::is_zero(&y) {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::big_decimal(round_half_even(&(x / y), 28)))
        }
        Domain::Long => {
            let (x, y) = (to_long(a)?, to_long(b)?);
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            if x % y == 0 {
                Ok(Value::Long(x / y))
            } else {
                Ok(Value::Double(x as f64 / y as f64))
            }
        }
        Domain::Double => {
            let (x, y) = (to_double(a)?, to_double(b)?);
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Double(x / y))
        }
    }
}

pub fn int_divide(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    let (x, y) = (to_long(a)?, to_long(b)?);
    if y == 0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Long(x.wrapping_div(y)))
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    let (x, y) = (to_long(a)?, to_long(b)?);
    if y == 0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Long(x.wrapping_rem(y)))
}

/// Non-negative integer exponents in the `BigDec` domain are computed by
/// repeated exact multiplication rather than going through `f64`, so a
/// decimal base keeps its precision. Any other combination (negative or
/// fractional exponent, or a `Long`/`Double` domain) falls back to
/// `f64::powf`, casting the result back to `Long` when it lands on an
/// exact integer.
pub fn exponent(a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    if domain_of(a, b) == Domain::BigDec {
        let (x, y) = (to_bigdec(a)?, to_bigdec(b)?);
        if let Some(yi) = y.to_i64().filter(|n| *n >= 0 && y == BigDecimal::from(*n)) {
            let mut result = BigDecimal::from(1);
            for _ in 0..yi {
                result = &result * &x;
            }
            return Ok(Value::big_decimal(result));
        }
    }
    let (x, y) = (to_double(a)?, to_double(b)?);
    let result = x.powf(y);
    if result.is_finite() && result == result.trunc() && result.abs() <= i32::MAX as f64 {
        Ok(Value::Long(result as i32))
    } else {
        Ok(Value::Double(result))
    }
}

pub fn negate(a: &Value) -> Result<Value, EvalError> {
    if a.is_null() {
        return Ok(Value::Null);
    }
    if let Some(kind) = a.temporal_kind() {
        let dt = from_serial_double(-to_double(a)?);
        return Ok(match kind {
            TemporalKind::Date => Value::Date(dt.date()),
            TemporalKind::Time => Value::Time(dt.time()),
            TemporalKind::DateTime => Value::DateTime(dt),
        });
    }
    match a {
        Value::Long(n) => n
            .checked_neg()
            .map(Value::Long)
            .ok_or(EvalError::OutOfRange { value: n.to_string(), target: "Long" }),
        Value::BigDec(n) => Ok(Value::big_decimal(-n.clone())),
        Value::String(_) => Ok(Value::big_decimal(-to_bigdec(a)?)),
        _ => Ok(Value::Double(-to_double(a)?)),
    }
}

/// `&` concatenation: unlike every other binary operator, `Null` does not
/// propagate — it coerces to an empty string instead.
pub fn concat(a: &Value, b: &Value) -> Value {
    let mut s = if a.is_null() { String::new() } else { a.as_string() };
    s.push_str(&if b.is_null() { String::new() } else { b.as_string() });
    Value::String(s)
}

/// Three-valued logical Not. `Null` stays `Null`.
pub fn not_(a: &Value) -> Result<Value, EvalError> {
    if a.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(!a.as_bool()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Comparison is string-lexical when both sides are strings, numeric
/// otherwise (numeric operands are promoted per [`domain_of`], temporal
/// operands compare via their serial-double representation).
pub fn compare(op: CompOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    propagate_null!(a, b);
    use std::cmp::Ordering;

    let ordering = if matches!(a, Value::String(_)) && matches!(b, Value::String(_)) {
        a.as_string().cmp(&b.as_string())
    } else if matches!(a, Value::BigDec(_)) || matches!(b, Value::BigDec(_)) {
        to_bigdec(a)?.cmp(&to_bigdec(b)?)
    } else {
        to_double(a)?
            .partial_cmp(&to_double(b)?)
            .unwrap_or(Ordering::Equal)
    };

    let result = match op {
        CompOp::Eq => ordering == Ordering::Equal,
        CompOp::Ne => ordering != Ordering::Equal,
        CompOp::Lt => ordering == Ordering::Less,
        CompOp::Le => ordering != Ordering::Greater,
        CompOp::Gt => ordering == Ordering::Greater,
        CompOp::Ge => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    Eqv,
    Imp,
}

/// True three-valued semantics for a fully-evaluated pair. Short-circuit
/// evaluation (not evaluating the right operand at all) is the caller's
/// responsibility via [`short_circuit_and`]/[`short_circuit_or`]; this
/// function is what runs once both sides are known.
pub fn logical(op: LogicalOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let av = tri_bool(a)?;
    let bv = tri_bool(b)?;
    let result = match op {
        LogicalOp::And => tri_and(av, bv),
        LogicalOp::Or => tri_or(av, bv),
        LogicalOp::Xor => match (av, bv) {
            (Some(x), Some(y)) => Some(x != y),
            _ => None,
        },
        LogicalOp::Eqv => match (av, bv) {
            (Some(x), Some(y)) => Some(x == y),
            _ => None,
        },
        LogicalOp::Imp => match (av, bv) {
            (Some(false), _) => Some(true),
            (_, Some(true)) => Some(true),
            (Some(true), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map(Value::Bool).unwrap_or(Value::Null))
}

/// `False And <anything>` is `False` without evaluating the right side.
pub fn short_circuit_and(left: &Value) -> Option<Value> {
    matches!(tri_bool(left), Ok(Some(false))).then_some(Value::Bool(false))
}

/// `True Or <anything>` is `True` without evaluating the right side.
pub fn short_circuit_or(left: &Value) -> Option<Value> {
    matches!(tri_bool(left), Ok(Some(true))).then_some(Value::Bool(true))
}

fn tri_bool(v: &Value) -> Result<Option<bool>, EvalError> {
    if v.is_null() {
        Ok(None)
    } else {
        Ok(Some(v.as_bool()?))
    }
}

fn tri_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn tri_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

pub fn is_null(v: &Value) -> Value {
    Value::Bool(v.is_null())
}

/// `Between low And high`, inclusive. `Null` anywhere propagates to `Null`.
/// The bounds may be given in either order: this computes
/// `x >= min(low, high) And x <= max(low, high)`.
pub fn between(v: &Value, low: &Value, high: &Value) -> Result<Value, EvalError> {
    if v.is_null() || low.is_null() || high.is_null() {
        return Ok(Value::Null);
    }
    let low_le_high = compare(CompOp::Le, low, high)?.as_bool()?;
    let (min, max) = if low_le_high { (low, high) } else { (high, low) };
    let ge_min = compare(CompOp::Ge, v, min)?.as_bool()?;
    let le_max = compare(CompOp::Le, v, max)?.as_bool()?;
    Ok(Value::Bool(ge_min && le_max))
}

/// `In (a, b, c, ...)`. `Null` on the left propagates; a `Null` member
/// never matches but does not itself propagate (mirrors SQL `IN`
/// three-valued semantics only for the probe, not the list).
pub fn in_list(v: &Value, list: &[Value]) -> Result<Value, EvalError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    for item in list {
        if item.is_null() {
            continue;
        }
        if compare(CompOp::Eq, v, item)?.as_bool()? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn to_long(v: &Value) -> Result<i32, EvalError> {
    v.as_long().map_err(|_| EvalError::TypeMismatch {
        op: op_name("arithmetic"),
        left: v.type_name(),
        right: "Long",
    })
}

fn to_double(v: &Value) -> Result<f64, EvalError> {
    v.as_double().map_err(|_| EvalError::TypeMismatch {
        op: op_name("arithmetic"),
        left: v.type_name(),
        right: "Double",
    })
}

fn to_bigdec(v: &Value) -> Result<BigDecimal, EvalError> {
    v.as_big_decimal().map_err(|_| EvalError::TypeMismatch {
        op: op_name("arithmetic"),
        left: v.type_name(),
        right: "Decimal",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_promotes_on_overflow() {
        let a = Value::Long(i32::MAX);
        let b = Value::Long(1);
        assert_eq!(add(&a, &b).unwrap(), Value::Double(i32::MAX as f64 + 1.0));
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        assert_eq!(add(&Value::Null, &Value::Long(1)).unwrap(), Value::Null);
    }

    #[test]
    fn concat_does_not_propagate_null() {
        assert_eq!(
            concat(&Value::Null, &Value::String("x".into())),
            Value::String("x".into())
        );
    }

    #[test]
    fn short_circuit_and_false() {
        assert_eq!(short_circuit_and(&Value::Bool(false)), Some(Value::Bool(false)));
        assert_eq!(short_circuit_and(&Value::Bool(true)), None);
    }

    #[test]
    fn between_inclusive() {
        assert_eq!(
            between(&Value::Long(10), &Value::Long(10), &Value::Long(20)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            between(&Value::Long(21), &Value::Long(10), &Value::Long(20)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            between(&Value::Null, &Value::Long(10), &Value::Long(20)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn division_by_zero_errors() {
        assert!(matches!(
            divide(&Value::Long(1), &Value::Long(0)),
            Err(EvalError::DivisionByZero)
        ));
    }

    #[test]
    fn exact_long_division_stays_long() {
        assert_eq!(divide(&Value::Long(10), &Value::Long(2)).unwrap(), Value::Long(5));
        assert_eq!(divide(&Value::Long(10), &Value::Long(3)).unwrap(), Value::Double(10.0 / 3.0));
    }

    #[test]
    fn between_accepts_reversed_bounds() {
        assert_eq!(
            between(&Value::Long(15), &Value::Long(20), &Value::Long(10)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn add_concatenates_non_numeric_strings() {
        assert_eq!(
            add(&Value::String("foo".into()), &Value::String("bar".into())).unwrap(),
            Value::String("foobar".into())
        );
        assert_eq!(add(&Value::String("2".into()), &Value::String("3".into())).unwrap(), Value::Double(5.0));
    }

    #[test]
    fn negate_numeric_string_yields_decimal() {
        assert_eq!(
            negate(&Value::String("5".into())).unwrap(),
            Value::big_decimal(BigDecimal::from(-5))
        );
    }

    #[test]
    fn negate_rebuilds_same_temporal_kind() {
        use access_core::{to_serial_double, TemporalKind};
        use chrono::NaiveDate;
        let d = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        let negated = negate(&d).unwrap();
        assert_eq!(negated.temporal_kind(), Some(TemporalKind::Date));
        assert_eq!(negated.as_double().unwrap(), -to_serial_double(d.as_date_time().unwrap()));
    }
}

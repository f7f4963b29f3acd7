//! Cross-cutting invariants the engine must uphold regardless of which
//! module produces a value: null propagation, decimal normal form, the
//! serial-date bijection, the boolean/numeric identity, short-circuit
//! evaluation, and totality of `Like` pattern compilation.

use access_core::numeric::{from_serial_double, to_serial_double};
use access_core::Value;
use access_expr::context::MapEvalContext;
use access_expr::like::compile;
use access_expr::token::{tokenize, ExprType};
use access_expr::Expression;
use bigdecimal::BigDecimal;
use std::str::FromStr;

fn eval(src: &str) -> Value {
    let ctx = MapEvalContext::new();
    Expression::parse(src, ExprType::Expression, &ctx)
        .unwrap()
        .eval(&ctx)
        .unwrap()
}

#[test]
fn arithmetic_and_comparison_propagate_null_but_concat_does_not() {
    assert_eq!(eval("1 + Null"), Value::Null);
    assert_eq!(eval("1 = Null"), Value::Null);
    assert_eq!(eval("1 < Null"), Value::Null);
    assert_eq!(eval(r#"1 & Null"#), Value::String("1".to_string()));
}

#[test]
fn big_decimal_literals_normalize_trailing_zeros_and_zero_scale() {
    let ctx = MapEvalContext::new();
    let v = Expression::parse("1.230000000000000000000000000001", ExprType::Expression, &ctx)
        .unwrap()
        .eval(&ctx)
        .unwrap();
    match v {
        Value::BigDec(n) => assert_eq!(n, BigDecimal::from_str("1.230000000000000000000000000001").unwrap()),
        other => panic!("expected BigDec, got {other:?}"),
    }
    assert_eq!(eval("0.000000000000000000000000001 * 0"), Value::Long(0));
}

#[test]
fn serial_double_bijection_round_trips_through_the_access_epoch() {
    for serial in [0.0, 1.0, 45000.5, -1.25, 100_000.75] {
        let dt = from_serial_double(serial);
        let back = to_serial_double(dt);
        assert!((back - serial).abs() < 1e-9, "serial {serial} round-tripped to {back}");
    }
}

#[test]
fn boolean_numeric_identity_matches_true_is_minus_one() {
    assert_eq!(eval("True * 1"), Value::Long(-1));
    assert_eq!(eval("False * 1"), Value::Long(0));
    assert_eq!(eval(r#"CStr(True)"#), Value::String("-1".to_string()));
}

#[test]
fn and_or_short_circuit_without_erroring_on_the_unevaluated_side() {
    // Division by zero on the side that's never evaluated must not surface.
    assert_eq!(eval("False And (1/0 = 1)"), Value::Bool(false));
    assert_eq!(eval("True Or (1/0 = 1)"), Value::Bool(true));
}

#[test]
fn like_compilation_is_total_even_for_malformed_patterns() {
    // An unbalanced '[' must compile to something that matches nothing,
    // not fail to compile at all.
    let compiled = compile("[abc", false);
    assert!(!compiled.is_match("a"));
    assert!(!compiled.is_match("[abc"));
    assert!(!compiled.is_match(""));
}

#[test]
fn tokenizer_round_trips_a_representative_expression() {
    let tokens = tokenize(r#"[Qty] * 1.5 & " units""#, ExprType::Expression)
        .unwrap()
        .unwrap();
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Qty", "*", "1.5", "&", " units"]);
}

#[test]
fn precedence_examples_match_conventional_math_and_logic_rules() {
    assert_eq!(eval("2 + 3 * 4"), Value::Long(14));
    assert_eq!(eval("(2 + 3) * 4"), Value::Long(20));
    assert_eq!(eval("10 - 2 - 3"), Value::Long(5));
    assert_eq!(eval("2 ^ 3 ^ 2"), Value::Double(64.0)); // left-associative: (2 ^ 3) ^ 2
    assert_eq!(eval("True Or False And False"), Value::Bool(true));
}

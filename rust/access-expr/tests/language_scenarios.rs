//! End-to-end scenarios exercising the parser and evaluator together, the
//! way a host embedding the engine actually calls it: parse an expression
//! string under a grammar, evaluate it against a context, check the value.

use access_expr::context::MapEvalContext;
use access_expr::token::ExprType;
use access_expr::Expression;
use access_core::Value;

fn eval(src: &str) -> Value {
    let ctx = MapEvalContext::new();
    Expression::parse(src, ExprType::Expression, &ctx)
        .unwrap_or_else(|e| panic!("parse failed for '{src}': {e}"))
        .eval(&ctx)
        .unwrap_or_else(|e| panic!("eval failed for '{src}': {e}"))
}

fn eval_with(ctx: &MapEvalContext, src: &str) -> Value {
    Expression::parse(src, ExprType::Expression, ctx)
        .unwrap_or_else(|e| panic!("parse failed for '{src}': {e}"))
        .eval(ctx)
        .unwrap_or_else(|e| panic!("eval failed for '{src}': {e}"))
}

fn eval_field_validator(this_value: Value, src: &str) -> Value {
    let ctx = MapEvalContext::new().with_this_column(this_value);
    Expression::parse(src, ExprType::FieldValidator, &ctx)
        .unwrap_or_else(|e| panic!("parse failed for '{src}': {e}"))
        .eval(&ctx)
        .unwrap_or_else(|e| panic!("eval failed for '{src}': {e}"))
}

#[test]
fn string_concat_coerces_null_to_empty_string() {
    assert_eq!(eval(r#"Null & "x""#), Value::String("x".to_string()));
}

#[test]
fn is_null_short_circuits_around_a_null_operand() {
    assert_eq!(eval("IsNull(Null)"), Value::Bool(true));
    assert_eq!(eval(r#"IsNull("a")"#), Value::Bool(false));
}

#[test]
fn iif_never_evaluates_the_untaken_branch() {
    // Division by zero in the untaken branch would error if it were
    // evaluated; IIf must never touch it.
    assert_eq!(eval("IIf(True, 1, 1/0)"), Value::Long(1));
    assert_eq!(eval("IIf(False, 1/0, 2)"), Value::Long(2));
}

#[test]
fn date_literal_parses_to_access_epoch() {
    let v = eval("#12/30/1899#");
    assert_eq!(v, Value::Date(chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap()));
    assert_eq!(v.as_double().unwrap(), 0.0);
}

#[test]
fn format_number_with_grouping_and_fixed_fraction() {
    assert_eq!(eval(r#"Format(1234.5, "#,##0.00")"#), Value::String("1,234.50".to_string()));
}

#[test]
fn left_takes_a_string_prefix() {
    assert_eq!(eval(r#"Left("Hello", 3)"#), Value::String("Hel".to_string()));
}

#[test]
fn field_validator_between_true_false_and_null() {
    assert_eq!(eval_field_validator(Value::Long(15), "Between 10 And 20"), Value::Bool(true));
    assert_eq!(eval_field_validator(Value::Long(25), "Between 10 And 20"), Value::Bool(false));
    assert_eq!(eval_field_validator(Value::Null, "Between 10 And 20"), Value::Null);
}

#[test]
fn field_validator_bare_number_means_equals_this_column() {
    assert_eq!(eval_field_validator(Value::Long(5), "5"), Value::Bool(true));
    assert_eq!(eval_field_validator(Value::Long(6), "5"), Value::Bool(false));
}

#[test]
fn identifier_resolves_from_host_context() {
    let ctx = MapEvalContext::new().with_value("Quantity", Value::Long(4));
    assert_eq!(eval_with(&ctx, "[Quantity] * 2"), Value::Long(8));
}

#[test]
fn like_pattern_with_wildcard_and_char_class() {
    assert_eq!(eval(r#""Smith" Like "Sm*""#), Value::Bool(true));
    assert_eq!(eval(r#""A1" Like "[A-Z]#""#), Value::Bool(true));
    assert_eq!(eval(r#""11" Like "[A-Z]#""#), Value::Bool(false));
}

#[test]
fn in_list_with_mixed_constants() {
    assert_eq!(eval("3 In (1, 2, 3)"), Value::Bool(true));
    assert_eq!(eval("Not 3 In (1, 2)"), Value::Bool(true));
}

#[test]
fn switch_returns_first_matching_branch() {
    assert_eq!(eval("Switch(False, 1, True, 2, True, 3)"), Value::Long(2));
}

#[test]
fn nested_function_calls_and_arithmetic_precedence() {
    assert_eq!(eval("Abs(-5) + Sqr(16)"), Value::Double(9.0));
}

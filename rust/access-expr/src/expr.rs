//! `Expression` — the public entry point. Owns the parsed tree, the raw
//! source it was parsed from, and a memoized render of its "clean" form so
//! repeated `to_clean_string` calls don't re-walk the tree.

use crate::ast::{BinaryOperator, CompOperator, Expr, LogicalOperator, UnaryOperator};
use crate::context::{EvalContext, ParseContext};
use crate::error::{EvalError, Error, ParseError};
use crate::identifier::Identifier;
use crate::token::ExprType;
use access_core::{Value, ValueKind};
use once_cell::unsync::OnceCell;
use std::fmt::Write as _;

pub struct Expression {
    root: Expr,
    raw: String,
    expr_type: ExprType,
    declared_type: Option<ValueKind>,
    clean_cache: OnceCell<String>,
    /// Whether `root` is a closed, pure tree — decided once at parse time
    /// (it depends on the host's function registry to know which callees
    /// are pure) and never recomputed.
    is_constant: bool,
    /// Lazily-filled memoised result for constant trees; never populated
    /// otherwise, since a non-constant tree's value depends on the
    /// `EvalContext` passed to `eval`.
    eval_cache: OnceCell<Value>,
}

impl Expression {
    pub fn parse(src: &str, expr_type: ExprType, ctx: &dyn ParseContext) -> Result<Self, ParseError> {
        let tokens = crate::token::tokenize(src, expr_type)?.ok_or(ParseError::Empty)?;
        let root = crate::parser::parse(&tokens, ctx, expr_type)?;
        let is_constant = root.is_constant(&|name| ctx.lookup_function(name).is_some_and(|f| f.pure));
        Ok(Expression {
            root,
            raw: src.to_string(),
            expr_type,
            declared_type: None,
            clean_cache: OnceCell::new(),
            is_constant,
            eval_cache: OnceCell::new(),
        })
    }

    pub fn with_declared_type(mut self, kind: ValueKind) -> Self {
        self.declared_type = Some(kind);
        self
    }

    pub fn declared_type(&self) -> Option<ValueKind> {
        self.declared_type
    }

    pub fn expr_type(&self) -> ExprType {
        self.expr_type
    }

    pub fn eval(&self, ctx: &dyn EvalContext) -> Result<Value, Error> {
        if self.is_constant {
            if let Some(v) = self.eval_cache.get() {
                return Ok(v.clone());
            }
            let v = eval_node(&self.root, ctx).map_err(Error::from)?;
            let _ = self.eval_cache.set(v.clone());
            return Ok(v);
        }
        eval_node(&self.root, ctx).map_err(Error::from)
    }

    pub fn to_raw_string(&self) -> &str {
        &self.raw
    }

    /// A normalized single-line rendering of the tree (consistent spacing,
    /// canonical operator casing) rather than the original source text.
    pub fn to_clean_string(&self) -> &str {
        self.clean_cache.get_or_init(|| render(&self.root))
    }

    pub fn to_debug_string(&self) -> String {
        format!("{:#?}", self.root)
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    pub fn collect_identifiers(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        collect_identifiers(&self.root, &mut out);
        out
    }
}

fn collect_identifiers(expr: &Expr, out: &mut Vec<Identifier>) {
    match expr {
        Expr::ObjRef { id, .. } => out.push(id.clone()),
        Expr::Constant { .. } | Expr::ThisColumnRef { .. } => {}
        Expr::Paren { inner, .. } | Expr::Unary { operand: inner, .. } => collect_identifiers(inner, out),
        Expr::Binary { left, right, .. } | Expr::Comp { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_identifiers(left, out);
            collect_identifiers(right, out);
        }
        Expr::FuncCall { args, .. } => args.iter().for_each(|a| collect_identifiers(a, out)),
        Expr::NullCheck { operand, .. } => collect_identifiers(operand, out),
        Expr::Like { operand, pattern, .. } => {
            collect_identifiers(operand, out);
            collect_identifiers(pattern, out);
        }
        Expr::In { operand, list, .. } => {
            collect_identifiers(operand, out);
            list.iter().for_each(|a| collect_identifiers(a, out));
        }
        Expr::Between { operand, low, high, .. } => {
            collect_identifiers(operand, out);
            collect_identifiers(low, out);
            collect_identifiers(high, out);
        }
        Expr::ImplicitEqToThis { right, .. } => collect_identifiers(right, out),
    }
}

fn eval_node(expr: &Expr, ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Constant { value, .. } => Ok(value.clone()),
        Expr::ThisColumnRef { .. } => ctx.current_column_value(),
        Expr::ObjRef { id, .. } => ctx.resolve_identifier(id),
        Expr::Paren { inner, .. } => eval_node(inner, ctx),
        Expr::ImplicitEqToThis { right, .. } => {
            let left = ctx.current_column_value()?;
            let right = eval_node(right, ctx)?;
            crate::ops::compare(crate::ops::CompOp::Eq, &left, &right)
        }
        Expr::Unary { op, operand, .. } => {
            let v = eval_node(operand, ctx)?;
            match op {
                UnaryOperator::Neg => crate::ops::negate(&v),
                UnaryOperator::Not => crate::ops::not_(&v),
            }
        }
        Expr::Binary { op, left, right, .. } => {
            let l = eval_node(left, ctx)?;
            let r = eval_node(right, ctx)?;
            match op {
                BinaryOperator::Add => crate::ops::add(&l, &r),
                BinaryOperator::Sub => crate::ops::subtract(&l, &r),
                BinaryOperator::Mul => crate::ops::multiply(&l, &r),
                BinaryOperator::Div => crate::ops::divide(&l, &r),
                BinaryOperator::IntDiv => crate::ops::int_divide(&l, &r),
                BinaryOperator::Mod => crate::ops::modulo(&l, &r),
                BinaryOperator::Pow => crate::ops::exponent(&l, &r),
                BinaryOperator::Concat => Ok(crate::ops::concat(&l, &r)),
            }
        }
        Expr::Comp { op, left, right, .. } => {
            let l = eval_node(left, ctx)?;
            let r = eval_node(right, ctx)?;
            let op = match op {
                CompOperator::Eq => crate::ops::CompOp::Eq,
                CompOperator::Ne => crate::ops::CompOp::Ne,
                CompOperator::Lt => crate::ops::CompOp::Lt,
                CompOperator::Le => crate::ops::CompOp::Le,
                CompOperator::Gt => crate::ops::CompOp::Gt,
                CompOperator::Ge => crate::ops::CompOp::Ge,
            };
            crate::ops::compare(op, &l, &r)
        }
        Expr::Logical { op, left, right, .. } => {
            let l = eval_node(left, ctx)?;
            let short = match op {
                LogicalOperator::And => crate::ops::short_circuit_and(&l),
                LogicalOperator::Or => crate::ops::short_circuit_or(&l),
                _ => None,
            };
            if let Some(v) = short {
                return Ok(v);
            }
            let r = eval_node(right, ctx)?;
            let op = match op {
                LogicalOperator::And => crate::ops::LogicalOp::And,
                LogicalOperator::Or => crate::ops::LogicalOp::Or,
                LogicalOperator::Xor => crate::ops::LogicalOp::Xor,
                LogicalOperator::Eqv => crate::ops::LogicalOp::Eqv,
                LogicalOperator::Imp => crate::ops::LogicalOp::Imp,
            };
            crate::ops::logical(op, &l, &r)
        }
        Expr::NullCheck { operand, negated, .. } => {
            let v = eval_node(operand, ctx)?;
            let is_null = crate::ops::is_null(&v).as_bool()?;
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::Like { operand, pattern, negated, compiled, .. } => {
            let v = eval_node(operand, ctx)?;
            let p = eval_node(pattern, ctx)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let matched = compiled.get_or_compile(&p.as_string(), false).is_match(&v.as_string());
            Ok(Value::Bool(matched != *negated))
        }
        Expr::In { operand, list, negated, .. } => {
            let v = eval_node(operand, ctx)?;
            let mut values = Vec::with_capacity(list.len());
            for item in list {
                values.push(eval_node(item, ctx)?);
            }
            let result = crate::ops::in_list(&v, &values)?;
            Ok(match result {
                Value::Null => Value::Null,
                Value::Bool(b) => Value::Bool(b != *negated),
                other => other,
            })
        }
        Expr::Between { operand, low, high, negated, .. } => {
            let v = eval_node(operand, ctx)?;
            let l = eval_node(low, ctx)?;
            let h = eval_node(high, ctx)?;
            let result = crate::ops::between(&v, &l, &h)?;
            Ok(match result {
                Value::Null => Value::Null,
                Value::Bool(b) => Value::Bool(b != *negated),
                other => other,
            })
        }
        Expr::FuncCall { name, args, .. } => eval_call(name, args, ctx),
    }
}

/// `IIf` is the only builtin that needs lazy argument evaluation — it must
/// never touch the branch it doesn't take — so it is dispatched here
/// directly on the AST rather than through [`crate::functions::registry`],
/// which only ever sees already-evaluated [`Value`]s.
fn eval_call(name: &str, args: &[Expr], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    if name.eq_ignore_ascii_case("IIf") {
        if args.len() != 3 {
            return Err(EvalError::Call {
                function: "IIf".to_string(),
                args: args.len().to_string(),
                cause: "IIf takes exactly 3 arguments".to_string(),
            });
        }
        let cond = eval_node(&args[0], ctx)?;
        return if cond.as_bool().unwrap_or(false) {
            eval_node(&args[1], ctx)
        } else {
            eval_node(&args[2], ctx)
        };
    }

    let Some(function) = ctx.lookup_function(name) else {
        return Err(EvalError::UnresolvedIdentifier { name: name.to_string() });
    };
    if !function.check_arity(args.len()) {
        return Err(EvalError::Call {
            function: name.to_string(),
            args: args.len().to_string(),
            cause: "wrong number of arguments".to_string(),
        });
    }
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_node(arg, ctx)?);
    }
    (function.call)(&values, ctx)
}

fn render(expr: &Expr) -> String {
    let mut out = String::new();
    render_into(expr, &mut out);
    out
}

fn render_into(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Constant { value, .. } => {
            let _ = write!(out, "{}", value.as_string());
        }
        Expr::ThisColumnRef { .. } => out.push_str("<this>"),
        Expr::ObjRef { id, .. } => {
            let _ = write!(out, "{}", id);
        }
        Expr::Paren { inner, .. } => {
            out.push('(');
            render_into(inner, out);
            out.push(')');
        }
        Expr::FuncCall { name, args, .. } => {
            let _ = write!(out, "{}(", name);
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_into(a, out);
            }
            out.push(')');
        }
        Expr::Unary { op, operand, .. } => {
            match op {
                UnaryOperator::Neg => out.push('-'),
                UnaryOperator::Not => out.push_str("Not "),
            }
            render_into(operand, out);
        }
        Expr::Binary { op, left, right, .. } => {
            render_into(left, out);
            let _ = write!(out, " {} ", binary_symbol(*op));
            render_into(right, out);
        }
        Expr::Comp { op, left, right, .. } => {
            render_into(left, out);
            let _ = write!(out, " {} ", comp_symbol(*op));
            render_into(right, out);
        }
        Expr::Logical { op, left, right, .. } => {
            render_into(left, out);
            let _ = write!(out, " {} ", op);
            render_into(right, out);
        }
        Expr::NullCheck { operand, negated, .. } => {
            render_into(operand, out);
            out.push_str(if *negated { " Is Not Null" } else { " Is Null" });
        }
        Expr::Like { operand, pattern, negated, .. } => {
            render_into(operand, out);
            out.push_str(if *negated { " Not Like " } else { " Like " });
            render_into(pattern, out);
        }
        Expr::In { operand, list, negated, .. } => {
            render_into(operand, out);
            out.push_str(if *negated { " Not In (" } else { " In (" });
            for (i, a) in list.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_into(a, out);
            }
            out.push(')');
        }
        Expr::Between { operand, low, high, negated, .. } => {
            render_into(operand, out);
            out.push_str(if *negated { " Not Between " } else { " Between " });
            render_into(low, out);
            out.push_str(" And ");
            render_into(high, out);
        }
        Expr::ImplicitEqToThis { right, .. } => {
            out.push_str("<this> = ");
            render_into(right, out);
        }
    }
}

fn binary_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::IntDiv => "\\",
        BinaryOperator::Mod => "Mod",
        BinaryOperator::Pow => "^",
        BinaryOperator::Concat => "&",
    }
}

fn comp_symbol(op: CompOperator) -> &'static str {
    match op {
        CompOperator::Eq => "=",
        CompOperator::Ne => "<>",
        CompOperator::Lt => "<",
        CompOperator::Le => "<=",
        CompOperator::Gt => ">",
        CompOperator::Ge => ">=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapEvalContext;

    fn ctx() -> MapEvalContext {
        MapEvalContext::new()
    }

    fn eval(src: &str) -> Value {
        let ctx = ctx();
        Expression::parse(src, ExprType::Expression, &ctx)
            .unwrap()
            .eval(&ctx)
            .unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Long(14));
    }

    #[test]
    fn exponent_chain() {
        // `^` is left-associative and lands back on `Long` for results
        // that happen to be exact integers: `(2 ^ 3) ^ 2` = `8 ^ 2` = `64`.
        assert_eq!(eval("2 ^ 3 ^ 2"), Value::Long(64));
    }

    #[test]
    fn string_concat_and_is_null_short_circuit() {
        assert_eq!(eval(r#""a" & "b""#), Value::String("ab".into()));
    }

    #[test]
    fn iif_never_evaluates_untaken_branch() {
        // The untaken branch calls an unknown function; if it were
        // evaluated this would error instead of returning 1.
        assert_eq!(eval("IIf(True, 1, NoSuchFunction())"), Value::Long(1));
        assert_eq!(eval("IIf(False, NoSuchFunction(), 2)"), Value::Long(2));
    }

    #[test]
    fn between_field_validator_shortcut() {
        let ctx = MapEvalContext::new().with_this_column(Value::Long(15));
        let expr = Expression::parse("Between 10 And 20", ExprType::FieldValidator, &ctx).unwrap();
        assert_eq!(expr.eval(&ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn format_function_roundtrip() {
        assert_eq!(eval(r#"Format(1234.5, "#,##0.00")"#), Value::String("1,234.50".into()));
    }

    #[test]
    fn left_function() {
        assert_eq!(eval(r#"Left("Hello", 3)"#), Value::String("Hel".into()));
    }

    #[test]
    fn to_clean_string_is_memoized_and_stable() {
        let ctx = ctx();
        let expr = Expression::parse("1+2", ExprType::Expression, &ctx).unwrap();
        assert_eq!(expr.to_clean_string(), "1 + 2");
        assert_eq!(expr.to_clean_string(), "1 + 2");
    }

    #[test]
    fn is_constant_detects_pure_literal_trees() {
        let ctx = ctx();
        let expr = Expression::parse("1 + 2", ExprType::Expression, &ctx).unwrap();
        assert!(expr.is_constant());
        let expr = Expression::parse("1 + Foo", ExprType::Expression, &ctx).unwrap();
        assert!(!expr.is_constant());
    }
}

//! The parser: turns a token sequence into an [`Expr`] tree.
//!
//! Binary operators are resolved with an explicit-precedence reduce loop
//! rather than recursive binding-power descent: each operator/operand pair
//! is appended to the expression under construction and then rotated
//! (reduced) into a subtree as soon as the next operator no longer binds
//! more tightly than the one just appended. The resulting tree is
//! identical to what a binding-power Pratt parser produces for the same
//! grammar; this shape was chosen because it keeps the precedence table a
//! flat, inspectable list instead of spreading it across recursive call
//! sites.

use crate::ast::{BinaryOperator, CompOperator, Expr, LogicalOperator, UnaryOperator};
use crate::context::ParseContext;
use crate::error::ParseError;
use crate::identifier::Identifier;
use crate::token::{ExprType, Span, Token, TokenKind};
use access_core::Value;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    #[allow(dead_code)]
    ctx: &'a dyn ParseContext,
}

pub fn parse(tokens: &[Token], ctx: &dyn ParseContext, expr_type: ExprType) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0, ctx };
    let expr = if expr_type == ExprType::FieldValidator && starts_with_bare_predicate(tokens) {
        let left = Expr::ThisColumnRef { span: tokens[0].span };
        parser.parse_expr_with_left(0, left)?
    } else {
        parser.parse_expr(0)?
    };
    if parser.pos != parser.tokens.len() {
        let tok = &parser.tokens[parser.pos];
        return Err(ParseError::DuplicateExpression { span: tok.span });
    }
    Ok(apply_field_validator_shortcut(expr, expr_type))
}

/// Whether a field-validator expression opens directly with a predicate
/// keyword/operator (`Between`, `Like`, `In`, `Is`, or a bare comparison),
/// meaning its left operand — the field being validated — was left
/// implicit and must be filled in as [`Expr::ThisColumnRef`].
fn starts_with_bare_predicate(tokens: &[Token]) -> bool {
    let Some(first) = tokens.first() else { return false };
    if first.kind == TokenKind::Op && matches!(first.text.as_str(), "=" | "<>" | "<" | ">" | "<=" | ">=") {
        return true;
    }
    if first.is_word("Between") || first.is_word("Like") || first.is_word("In") || first.is_word("Is") {
        return true;
    }
    if first.is_word("Not") {
        if let Some(second) = tokens.get(1) {
            return second.is_word("Between") || second.is_word("Like") || second.is_word("In");
        }
    }
    false
}

fn apply_field_validator_shortcut(expr: Expr, expr_type: ExprType) -> Expr {
    if expr_type != ExprType::FieldValidator {
        return expr;
    }
    let is_predicate = matches!(
        expr,
        Expr::Comp { .. }
            | Expr::Logical { .. }
            | Expr::Between { .. }
            | Expr::In { .. }
            | Expr::Like { .. }
            | Expr::NullCheck { .. }
    );
    if is_predicate {
        expr
    } else {
        let span = expr.span();
        Expr::ImplicitEqToThis { right: Box::new(expr), span }
    }
}

/// Precedence level (higher binds tighter) and whether the operator is
/// right-associative, for every binary operator token this grammar
/// recognizes. `None` means "not a binary operator" — the reduce loop
/// stops there.
fn binary_precedence(tok: &Token) -> Option<(u8, bool)> {
    if tok.kind == TokenKind::Op {
        return match tok.text.as_str() {
            "^" => Some((90, false)),
            "*" | "/" => Some((80, false)),
            "\\" => Some((75, false)),
            "+" | "-" => Some((65, false)),
            "&" => Some((60, false)),
            "=" | "<>" | "<" | ">" | "<=" | ">=" => Some((50, false)),
            _ => None,
        };
    }
    if tok.kind == TokenKind::Word {
        return match tok.text.to_ascii_lowercase().as_str() {
            "mod" => Some((70, false)),
            "and" => Some((40, false)),
            "or" => Some((35, false)),
            "xor" => Some((30, false)),
            "eqv" => Some((25, false)),
            "imp" => Some((20, false)),
            _ => None,
        };
    }
    None
}

/// `Is`, `Like`, `Between`, `In` parse as comparison-precedence postfix
/// constructs rather than ordinary binary operators, since each consumes
/// more than a single right-hand operand.
const PREDICATE_PRECEDENCE: u8 = 50;

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_word(&mut self, word: &str) -> Result<Span, ParseError> {
        match self.advance() {
            Some(tok) if tok.is_word(word) => Ok(tok.span),
            Some(tok) => Err(ParseError::Unexpected {
                found: tok.text.clone(),
                expected: word.to_string(),
                span: tok.span,
            }),
            None => Err(ParseError::UnexpectedEof { expected: word.to_string() }),
        }
    }

    fn expect_delim(&mut self, delim: &str) -> Result<Span, ParseError> {
        match self.advance() {
            Some(tok) if tok.kind == TokenKind::Delim && tok.text == delim => Ok(tok.span),
            Some(tok) => Err(ParseError::Unexpected {
                found: tok.text.clone(),
                expected: delim.to_string(),
                span: tok.span,
            }),
            None => Err(ParseError::UnexpectedEof { expected: delim.to_string() }),
        }
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let left = self.parse_unary()?;
        self.parse_expr_with_left(min_prec, left)
    }

    fn parse_expr_with_left(&mut self, min_prec: u8, mut left: Expr) -> Result<Expr, ParseError> {
        loop {
            let Some(tok) = self.peek() else { break };

            if let Some(negated_in) = self.peek_in_keyword() {
                if PREDICATE_PRECEDENCE < min_prec {
                    break;
                }
                left = self.parse_in(left, negated_in)?;
                continue;
            }
            if tok.is_word("Between") || (tok.is_word("Not") && self.peek_ahead_is("Between")) {
                if PREDICATE_PRECEDENCE < min_prec {
                    break;
                }
                left = self.parse_between(left)?;
                continue;
            }
            if tok.is_word("Like") || (tok.is_word("Not") && self.peek_ahead_is("Like")) {
                if PREDICATE_PRECEDENCE < min_prec {
                    break;
                }
                left = self.parse_like(left)?;
                continue;
            }
            if tok.is_word("Is") {
                if PREDICATE_PRECEDENCE < min_prec {
                    break;
                }
                left = self.parse_is_null(left)?;
                continue;
            }

            let Some((prec, right_assoc)) = binary_precedence(tok) else { break };
            if prec < min_prec {
                break;
            }
            let op_tok = self.advance().unwrap().clone();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_expr(next_min)?;
            left = self.build_binary(&op_tok, left, right)?;
        }

        Ok(left)
    }

    fn peek_ahead_is(&self, word: &str) -> bool {
        self.tokens.get(self.pos + 1).is_some_and(|t| t.is_word(word))
    }

    /// Returns `Some(negated)` if the next token(s) start an `In`/`Not In`
    /// clause.
    fn peek_in_keyword(&self) -> Option<bool> {
        let tok = self.peek()?;
        if tok.is_word("In") {
            Some(false)
        } else if tok.is_word("Not") && self.peek_ahead_is("In") {
            Some(true)
        } else {
            None
        }
    }

    fn build_binary(&self, op_tok: &Token, left: Expr, right: Expr) -> Result<Expr, ParseError> {
        let span = left.span().merge(right.span());
        if op_tok.kind == TokenKind::Op {
            let op = match op_tok.text.as_str() {
                "^" => return Ok(Expr::Binary { op: BinaryOperator::Pow, left: Box::new(left), right: Box::new(right), span }),
                "*" => BinaryOperator::Mul,
                "/" => BinaryOperator::Div,
                "\\" => BinaryOperator::IntDiv,
                "+" => BinaryOperator::Add,
                "-" => BinaryOperator::Sub,
                "&" => return Ok(Expr::Binary { op: BinaryOperator::Concat, left: Box::new(left), right: Box::new(right), span }),
                "=" => return Ok(Expr::Comp { op: CompOperator::Eq, left: Box::new(left), right: Box::new(right), span }),
                "<>" => return Ok(Expr::Comp { op: CompOperator::Ne, left: Box::new(left), right: Box::new(right), span }),
                "<" => return Ok(Expr::Comp { op: CompOperator::Lt, left: Box::new(left), right: Box::new(right), span }),
                ">" => return Ok(Expr::Comp { op: CompOperator::Gt, left: Box::new(left), right: Box::new(right), span }),
                "<=" => return Ok(Expr::Comp { op: CompOperator::Le, left: Box::new(left), right: Box::new(right), span }),
                ">=" => return Ok(Expr::Comp { op: CompOperator::Ge, left: Box::new(left), right: Box::new(right), span }),
                other => {
                    return Err(ParseError::Unexpected {
                        found: other.to_string(),
                        expected: "a binary operator".to_string(),
                        span: op_tok.span,
                    })
                }
            };
            return Ok(Expr::Binary { op, left: Box::new(left), right: Box::new(right), span });
        }

        let op = match op_tok.text.to_ascii_lowercase().as_str() {
            "mod" => return Ok(Expr::Binary { op: BinaryOperator::Mod, left: Box::new(left), right: Box::new(right), span }),
            "and" => LogicalOperator::And,
            "or" => LogicalOperator::Or,
            "xor" => LogicalOperator::Xor,
            "eqv" => LogicalOperator::Eqv,
            "imp" => LogicalOperator::Imp,
            other => {
                return Err(ParseError::Unexpected {
                    found: other.to_string(),
                    expected: "a logical operator".to_string(),
                    span: op_tok.span,
                })
            }
        };
        Ok(Expr::Logical { op, left: Box::new(left), right: Box::new(right), span })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(tok) = self.peek() {
            // `-`/`+` immediately attached to a numeric literal (`-2^2`,
            // `+3`) folds into a signed literal before the binary reduce
            // loop runs at all, binding tighter than every operator
            // including `^` — this is what makes `-2 ^ 2` evaluate to `4`
            // rather than `-4`. A `-`/`+` before anything else (a
            // parenthesized expression, an identifier, a function call)
            // falls through to the general unary-operator precedence below.
            if tok.kind == TokenKind::Op && (tok.text == "-" || tok.text == "+") {
                if matches!(
                    self.tokens.get(self.pos + 1),
                    Some(t) if t.kind == TokenKind::Literal && t.value.as_ref().is_some_and(Value::is_numeric)
                ) {
                    let op_tok = self.advance().unwrap().clone();
                    let lit_tok = self.advance().unwrap().clone();
                    let span = op_tok.span.merge(lit_tok.span);
                    let value = lit_tok.value.unwrap_or(Value::Null);
                    let folded = if op_tok.text == "-" {
                        crate::ops::negate(&value).unwrap_or(value)
                    } else {
                        value
                    };
                    return Ok(Expr::Constant { value: folded, span });
                }
            }
            if tok.kind == TokenKind::Op && tok.text == "-" {
                let start = self.advance().unwrap().span;
                let operand = self.parse_expr(85)?;
                let span = start.merge(operand.span());
                return Ok(Expr::Unary { op: UnaryOperator::Neg, operand: Box::new(operand), span });
            }
            if tok.kind == TokenKind::Op && tok.text == "+" {
                self.advance();
                return self.parse_expr(85);
            }
            if tok.is_word("Not") && !self.peek_ahead_is("Like") && !self.peek_ahead_is("Between") && !self.peek_ahead_is("In") {
                let start = self.advance().unwrap().span;
                let operand = self.parse_expr(45)?;
                let span = start.merge(operand.span());
                return Ok(Expr::Unary { op: UnaryOperator::Not, operand: Box::new(operand), span });
            }
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.advance().cloned().ok_or(ParseError::UnexpectedEof {
            expected: "an expression".to_string(),
        })?;

        match tok.kind {
            TokenKind::Literal => Ok(Expr::Constant { value: tok.value.unwrap_or(Value::Null), span: tok.span }),
            TokenKind::Delim if tok.text == "(" => {
                let inner = self.parse_expr(0)?;
                let end = self.expect_delim(")")?;
                let span = tok.span.merge(end);
                Ok(Expr::Paren { inner: Box::new(inner), span })
            }
            TokenKind::ObjName => self.parse_identifier_chain(tok),
            TokenKind::Word => self.parse_word_primary(tok),
            _ => Err(ParseError::Unexpected {
                found: tok.text.clone(),
                expected: "an expression".to_string(),
                span: tok.span,
            }),
        }
    }

    fn parse_word_primary(&mut self, tok: Token) -> Result<Expr, ParseError> {
        match tok.text.to_ascii_lowercase().as_str() {
            "true" => return Ok(Expr::Constant { value: Value::Bool(true), span: tok.span }),
            "false" => return Ok(Expr::Constant { value: Value::Bool(false), span: tok.span }),
            "null" => return Ok(Expr::Constant { value: Value::Null, span: tok.span }),
            _ => {}
        }

        if matches!(self.peek(), Some(t) if t.kind == TokenKind::Delim && t.text == "(") {
            self.advance();
            let mut args = Vec::new();
            if !matches!(self.peek(), Some(t) if t.kind == TokenKind::Delim && t.text == ")") {
                loop {
                    args.push(self.parse_expr(0)?);
                    match self.peek() {
                        Some(t) if t.kind == TokenKind::Delim && t.text == "," => {
                            self.advance();
                        }
                        _ => break,
                    }
                }
            }
            let end = self.expect_delim(")")?;
            let span = tok.span.merge(end);
            return Ok(Expr::FuncCall { name: tok.text, args, span });
        }

        self.parse_identifier_chain(tok)
    }

    fn parse_identifier_chain(&mut self, first: Token) -> Result<Expr, ParseError> {
        let mut segments = vec![first.text.clone()];
        let mut span = first.span;

        loop {
            match self.peek() {
                Some(t) if t.kind == TokenKind::Delim && (t.text == "!" || t.text == ".") => {
                    self.advance();
                    let seg_tok = self.advance().cloned().ok_or(ParseError::UnexpectedEof {
                        expected: "an identifier segment".to_string(),
                    })?;
                    if seg_tok.kind != TokenKind::ObjName && seg_tok.kind != TokenKind::Word {
                        return Err(ParseError::Unexpected {
                            found: seg_tok.text.clone(),
                            expected: "an identifier segment".to_string(),
                            span: seg_tok.span,
                        });
                    }
                    span = span.merge(seg_tok.span);
                    segments.push(seg_tok.text);
                    if segments.len() > 3 {
                        return Err(ParseError::Malformed {
                            construct: "identifier".to_string(),
                            reason: "more than three dotted/banged segments".to_string(),
                            span,
                        });
                    }
                }
                _ => break,
            }
        }

        let id = Identifier::from_segments(segments).ok_or(ParseError::Malformed {
            construct: "identifier".to_string(),
            reason: "empty identifier".to_string(),
            span,
        })?;
        Ok(Expr::ObjRef { id, span })
    }

    fn parse_is_null(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let is_span = self.expect_word("Is")?;
        let negated = matches!(self.peek(), Some(t) if t.is_word("Not"));
        if negated {
            self.advance();
        }
        let null_span = self.expect_word("Null")?;
        let span = left.span().merge(is_span).merge(null_span);
        Ok(Expr::NullCheck { operand: Box::new(left), negated, span })
    }

    fn parse_like(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let negated = matches!(self.peek(), Some(t) if t.is_word("Not"));
        if negated {
            self.advance();
        }
        self.expect_word("Like")?;
        let pattern = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
        let span = left.span().merge(pattern.span());
        Ok(Expr::Like {
            operand: Box::new(left),
            pattern: Box::new(pattern),
            negated,
            span,
            compiled: crate::like::LikeCache::new(),
        })
    }

    fn parse_between(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let negated = matches!(self.peek(), Some(t) if t.is_word("Not"));
        if negated {
            self.advance();
        }
        self.expect_word("Between")?;
        let low = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
        self.expect_word("And")?;
        let high = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
        let span = left.span().merge(high.span());
        Ok(Expr::Between { operand: Box::new(left), low: Box::new(low), high: Box::new(high), negated, span })
    }

    fn parse_in(&mut self, left: Expr, negated: bool) -> Result<Expr, ParseError> {
        if negated {
            self.advance(); // Not
        }
        self.expect_word("In")?;
        let open = self.expect_delim("(")?;
        let mut list = Vec::new();
        if !matches!(self.peek(), Some(t) if t.kind == TokenKind::Delim && t.text == ")") {
            loop {
                list.push(self.parse_expr(0)?);
                match self.peek() {
                    Some(t) if t.kind == TokenKind::Delim && t.text == "," => {
                        self.advance();
                    }
                    _ => break,
                }
            }
        }
        let close = self.expect_delim(")")?;
        let span = left.span().merge(open).merge(close);
        Ok(Expr::In { operand: Box::new(left), list, negated, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BuiltinFunctionLookup, DefaultLocaleContext};
    use crate::token::tokenize;

    struct TestCtx;
    impl crate::context::LocaleContext for TestCtx {}
    impl crate::context::FunctionLookup for TestCtx {
        fn lookup_function(&self, name: &str) -> Option<&crate::functions::Function> {
            BuiltinFunctionLookup.lookup_function(name)
        }
    }

    fn parse_str(src: &str, expr_type: ExprType) -> Expr {
        let tokens = tokenize(src, expr_type).unwrap().unwrap();
        parse(&tokens, &TestCtx, expr_type).unwrap()
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let expr = parse_str("2 + 3 * 4", ExprType::Expression);
        match expr {
            Expr::Binary { op: BinaryOperator::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOperator::Mul, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn exponent_is_left_associative() {
        // VBA's `^` groups left-to-right: `2 ^ 3 ^ 2` is `(2 ^ 3) ^ 2`, not
        // `2 ^ (3 ^ 2)`.
        let expr = parse_str("2 ^ 3 ^ 2", ExprType::Expression);
        match expr {
            Expr::Binary { op: BinaryOperator::Pow, left, right, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOperator::Pow, .. }));
                assert!(matches!(*right, Expr::Constant { .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn logical_chain_precedence() {
        // And binds tighter than Or, which binds tighter than Xor.
        let expr = parse_str("A Or B And C", ExprType::Expression);
        match expr {
            Expr::Logical { op: LogicalOperator::Or, right, .. } => {
                assert!(matches!(*right, Expr::Logical { op: LogicalOperator::And, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn between_and_clause() {
        let expr = parse_str("X Between 10 And 20", ExprType::Expression);
        assert!(matches!(expr, Expr::Between { negated: false, .. }));
    }

    #[test]
    fn field_validator_bare_value_becomes_implicit_eq() {
        let expr = parse_str("5", ExprType::FieldValidator);
        assert!(matches!(expr, Expr::ImplicitEqToThis { .. }));
    }

    #[test]
    fn field_validator_between_is_not_wrapped() {
        let expr = parse_str("Between 0 And 100", ExprType::FieldValidator);
        assert!(matches!(expr, Expr::Between { .. }));
    }

    #[test]
    fn function_call_parses_args() {
        let expr = parse_str(r#"Left("Hello", 3)"#, ExprType::Expression);
        match expr {
            Expr::FuncCall { name, args, .. } => {
                assert_eq!(name, "Left");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn dotted_identifier_chain() {
        let expr = parse_str("Forms!MyForm.MyControl", ExprType::Expression);
        match expr {
            Expr::ObjRef { id, .. } => {
                assert_eq!(id.collection.as_deref(), Some("Forms"));
                assert_eq!(id.object.as_deref(), Some("MyForm"));
                assert_eq!(id.property.as_deref(), Some("MyControl"));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn paren_wraps_inner_expression() {
        let expr = parse_str("(1 + 2) * 3", ExprType::Expression);
        match expr {
            Expr::Binary { op: BinaryOperator::Mul, left, .. } => {
                assert!(matches!(*left, Expr::Paren { .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn unused_default_locale_context_compiles() {
        let _ = DefaultLocaleContext;
    }
}

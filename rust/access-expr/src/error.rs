//! `ParseError` and `EvalError` — the engine's two error channels.
//!
//! Structured like the teacher's `LexError`/`ParseError`/`TypeError`: one
//! `thiserror` variant per failure kind, each carrying a `Span` where the
//! failure is positional. `ArithmeticError` is folded into `EvalError`
//! rather than kept as a third top-level enum (`spec.md`'s own "a single
//! `Error` enum wrapping both is acceptable" note, exercised one level in).

use crate::token::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated string literal at {span:?}")]
    UnterminatedString { span: Span },
    #[error("unbalanced '[' at {span:?}")]
    UnbalancedBracket { span: Span },
    #[error("invalid date literal '{text}' at {span:?}")]
    InvalidDateLiteral { text: String, span: Span },
    #[error("invalid number literal '{text}' at {span:?}")]
    InvalidNumberLiteral { text: String, span: Span },
    #[error("unknown function '{name}' at {span:?}")]
    UnknownFunction { name: String, span: Span },
    #[error("unexpected token '{found}' at {span:?}, expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        span: Span,
    },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("malformed '{construct}' at {span:?}: {reason}")]
    Malformed {
        construct: String,
        reason: String,
        span: Span,
    },
    #[error("duplicate expression at {span:?}: a complete expression was already parsed")]
    DuplicateExpression { span: Span },
    #[error("empty expression")]
    Empty,
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnterminatedString { span }
            | ParseError::UnbalancedBracket { span }
            | ParseError::InvalidDateLiteral { span, .. }
            | ParseError::InvalidNumberLiteral { span, .. }
            | ParseError::UnknownFunction { span, .. }
            | ParseError::Unexpected { span, .. }
            | ParseError::Malformed { span, .. }
            | ParseError::DuplicateExpression { span } => Some(*span),
            ParseError::UnexpectedEof { .. } | ParseError::Empty => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot coerce {from} to {to}: {detail}")]
    Coercion {
        from: &'static str,
        to: &'static str,
        detail: String,
    },
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("type mismatch: {op} does not accept {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("Sqr of negative number {value}")]
    NegativeSqrt { value: f64 },
    #[error("Switch requires an even number of arguments, got {count}")]
    SwitchOddArgs { count: usize },
    #[error("error calling {function}({args}): {cause}")]
    Call {
        function: String,
        args: String,
        cause: String,
    },
    #[error("identifier '{name}' could not be resolved")]
    UnresolvedIdentifier { name: String },
    #[error("decimal overflow computing {op}")]
    DecimalOverflow { op: &'static str },
}

impl From<access_core::ValueError> for EvalError {
    fn from(err: access_core::ValueError) -> Self {
        match err {
            access_core::ValueError::Coercion { from, to } => EvalError::Coercion {
                from,
                to,
                detail: "incompatible value".to_string(),
            },
            access_core::ValueError::OutOfRange { value, to } => {
                EvalError::OutOfRange { value, target: to }
            }
            access_core::ValueError::NotANumber { text } => EvalError::Coercion {
                from: "String",
                to: "Number",
                detail: text,
            },
            access_core::ValueError::NotADate { text } => EvalError::Coercion {
                from: "String",
                to: "Date",
                detail: text,
            },
        }
    }
}

/// Top-level error a host sees out of `parse`/`eval`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

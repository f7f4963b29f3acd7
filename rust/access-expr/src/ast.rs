//! The expression tree. One `Expr` variant per grammar production; every
//! variant carries the `Span` it was parsed from so evaluation errors can
//! point back at source text.

use crate::identifier::Identifier;
use crate::token::Span;
use access_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum UnaryOperator {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CompOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LogicalOperator {
    And,
    Or,
    Xor,
    Eqv,
    Imp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value produced directly by the tokenizer (number, string,
    /// date/time).
    Constant { value: Value, span: Span },
    /// A dotted/banged reference to a host-resolved identifier.
    ObjRef { id: Identifier, span: Span },
    /// The implicit "this column" reference a bare field-validator or
    /// default-value expression can use without naming its own field.
    ThisColumnRef { span: Span },
    Paren { inner: Box<Expr>, span: Span },
    FuncCall {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Comp {
        op: CompOperator,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Logical {
        op: LogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// `<expr> Is [Not] Null`.
    NullCheck {
        operand: Box<Expr>,
        negated: bool,
        span: Span,
    },
    /// `<expr> [Not] Like <pattern>`. `compiled` is a one-time initializer:
    /// the pattern is translated into a regex on the node's first
    /// evaluation and reused on every evaluation after that.
    Like {
        operand: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        span: Span,
        compiled: crate::like::LikeCache,
    },
    /// `<expr> [Not] In (<list...>)`.
    In {
        operand: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
        span: Span,
    },
    /// `<expr> [Not] Between <low> And <high>`.
    Between {
        operand: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
        span: Span,
    },
    /// A bare field-validator expression with no leading comparison
    /// operator: `5` means "this column equals 5".
    ImplicitEqToThis { right: Box<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Constant { span, .. }
            | Expr::ObjRef { span, .. }
            | Expr::ThisColumnRef { span }
            | Expr::Paren { span, .. }
            | Expr::FuncCall { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Comp { span, .. }
            | Expr::Logical { span, .. }
            | Expr::NullCheck { span, .. }
            | Expr::Like { span, .. }
            | Expr::In { span, .. }
            | Expr::Between { span, .. }
            | Expr::ImplicitEqToThis { span, .. } => *span,
        }
    }

    /// True if this node and all its children are literal constants — used
    /// by `Expression::is_constant` to let a host skip evaluation context
    /// entirely for expressions like default values that are just `5`. A
    /// `FuncCall` only counts as constant when its callee is itself pure
    /// (`Rnd`, `Now`, and friends never are), in addition to every argument
    /// being constant. `is_pure` answers "is the named function pure" —
    /// callers pass a closure over their `FunctionLookup` rather than a
    /// `&dyn FunctionLookup` directly so this module doesn't need to depend
    /// on the context trait.
    pub fn is_constant(&self, is_pure: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Expr::Constant { .. } => true,
            Expr::ObjRef { .. } | Expr::ThisColumnRef { .. } => false,
            Expr::Paren { inner, .. } | Expr::Unary { operand: inner, .. } => inner.is_constant(is_pure),
            Expr::Binary { left, right, .. }
            | Expr::Comp { left, right, .. }
            | Expr::Logical { left, right, .. } => left.is_constant(is_pure) && right.is_constant(is_pure),
            Expr::FuncCall { name, args, .. } => {
                is_pure(name) && args.iter().all(|a| a.is_constant(is_pure))
            }
            Expr::NullCheck { operand, .. } => operand.is_constant(is_pure),
            Expr::Like { operand, pattern, .. } => operand.is_constant(is_pure) && pattern.is_constant(is_pure),
            Expr::In { operand, list, .. } => {
                operand.is_constant(is_pure) && list.iter().all(|a| a.is_constant(is_pure))
            }
            Expr::Between { operand, low, high, .. } => {
                operand.is_constant(is_pure) && low.is_constant(is_pure) && high.is_constant(is_pure)
            }
            Expr::ImplicitEqToThis { .. } => false,
        }
    }
}

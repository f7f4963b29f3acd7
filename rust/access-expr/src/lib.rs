//! access-expr
//!
//! Tokenizes, parses, and evaluates Access/VBA-style expressions: the
//! language used in query criteria, field validation rules, default values,
//! and control sources throughout the host application.

pub mod ast;
pub mod context;
pub mod error;
pub mod expr;
pub mod format;
pub mod functions;
pub mod identifier;
pub mod like;
pub mod literal;
pub mod ops;
pub mod parser;
pub mod rand_state;
pub mod token;

pub use context::{EvalContext, FunctionLookup, LocaleContext, MapEvalContext, ParseContext};
pub use error::{Error, EvalError, ParseError};
pub use expr::Expression;
pub use functions::Function;
pub use identifier::Identifier;
pub use token::ExprType;

//! Shared value model and numeric/temporal helpers for the access-expr
//! engine.
//!
//! This crate owns the vocabulary other crates build on: the `Value`
//! tagged union and the numeric helpers it needs (decimal normalization,
//! half-even rounding, and the serial-date bijection used by Access-style
//! temporal literals). No parsing or evaluation logic lives here.

pub mod numeric;
pub mod value;

pub use numeric::{from_serial_double, to_serial_double, SERIAL_MAX, SERIAL_MIN};
pub use value::{TemporalKind, Value, ValueError, ValueKind};

//! Host contract traits: `LocaleContext`, `EvalContext`, `FunctionLookup`,
//! `ParseContext`, plus concrete defaults a host can start from instead of
//! implementing every method itself.

use crate::functions::Function;
use crate::identifier::Identifier;
use access_core::Value;
use chrono::Weekday;
use std::collections::HashMap;

/// Which rule decides what "week 1" of a year is for `DatePart`'s `ww`
/// interval and `WeekdayName`-adjacent calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstWeekType {
    /// The week containing January 1st.
    Jan1,
    /// The first week with at least four days in the new year.
    FirstFourDays,
    /// The first full seven-day week of the new year.
    FirstFullWeek,
}

/// Locale- and calendar-dependent facts the tokenizer, operator kernel and
/// format engine all need: separators, first-day-of-week, and the named
/// pattern tables `Format` resolves before falling back to its own builtin
/// pattern language.
pub trait LocaleContext {
    fn decimal_separator(&self) -> char {
        '.'
    }
    fn grouping_separator(&self) -> char {
        ','
    }
    fn date_separator(&self) -> char {
        '/'
    }
    fn time_separator(&self) -> char {
        ':'
    }
    fn am_string(&self) -> &str {
        "AM"
    }
    fn pm_string(&self) -> &str {
        "PM"
    }
    fn first_day_of_week(&self) -> Weekday {
        Weekday::Sun
    }
    fn first_week_type(&self) -> FirstWeekType {
        FirstWeekType::Jan1
    }

    /// A host-defined named number-format pattern (`FormatNumber`'s
    /// registry plus anything the host layers on top), looked up before the
    /// engine's own predefined names.
    fn named_number_format(&self, _name: &str) -> Option<String> {
        None
    }

    /// A host-defined named date/time pattern.
    fn named_date_format(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Looks up a function definition by (case-insensitive) name. Implemented
/// by the engine's builtin registry; a host may wrap it to add its own
/// functions before falling back to the builtin lookup.
pub trait FunctionLookup {
    fn lookup_function(&self, name: &str) -> Option<&Function>;
}

/// Combined context a parser needs: locale facts plus function name
/// resolution, so `FuncCall` nodes and `Format`'s predefined-pattern lookup
/// both have what they need at parse time.
pub trait ParseContext: LocaleContext + FunctionLookup {}
impl<T: LocaleContext + FunctionLookup + ?Sized> ParseContext for T {}

/// Context supplied at evaluation time: locale facts, function lookup, plus
/// identifier resolution and the "current column" shortcut `ThisColumnRef`
/// depends on.
pub trait EvalContext: LocaleContext + FunctionLookup {
    /// Resolve a dotted/banged identifier to a value. Returning `Ok(Null)`
    /// for an identifier a host simply has no data for is valid; returning
    /// `Err` is for identifiers a host considers genuinely invalid.
    fn resolve_identifier(&self, id: &Identifier) -> Result<Value, crate::error::EvalError>;

    /// The value of "this" field/column, used by bare field-validator and
    /// default-value expressions that reference their own column
    /// implicitly.
    fn current_column_value(&self) -> Result<Value, crate::error::EvalError> {
        Ok(Value::Null)
    }

    /// Draw the next `Rnd` value. `seed` mirrors VBA's `Rnd(n)` argument
    /// semantics (omitted/positive advances the sequence, zero repeats the
    /// last value, negative reseeds deterministically from `n`).
    fn next_random(&self, seed: Option<f64>) -> f64;
}

/// Minimal `LocaleContext` using US/English conventions — decimal point,
/// comma grouping, `/` date separator, Sunday week start.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocaleContext;

impl LocaleContext for DefaultLocaleContext {}

/// A `FunctionLookup` backed by the engine's own builtin registry
/// (`crate::functions::registry`), with no host-defined additions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFunctionLookup;

impl FunctionLookup for BuiltinFunctionLookup {
    fn lookup_function(&self, name: &str) -> Option<&Function> {
        crate::functions::registry().get(&name.to_ascii_uppercase())
    }
}

/// A simple `EvalContext` backed by a name -> `Value` map, a fixed "this
/// column" value, and the engine's seeded `Random` holder. Good enough for
/// tests and for hosts that just want column values plugged in by name.
pub struct MapEvalContext {
    pub locale: DefaultLocaleContext,
    pub values: HashMap<String, Value>,
    pub this_column: Value,
    pub random: std::cell::RefCell<crate::rand_state::Random>,
}

impl MapEvalContext {
    pub fn new() -> Self {
        MapEvalContext {
            locale: DefaultLocaleContext,
            values: HashMap::new(),
            this_column: Value::Null,
            random: std::cell::RefCell::new(crate::rand_state::Random::new()),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_this_column(mut self, value: Value) -> Self {
        self.this_column = value;
        self
    }
}

impl Default for MapEvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LocaleContext for MapEvalContext {}

impl FunctionLookup for MapEvalContext {
    fn lookup_function(&self, name: &str) -> Option<&Function> {
        crate::functions::registry().get(&name.to_ascii_uppercase())
    }
}

impl EvalContext for MapEvalContext {
    fn resolve_identifier(&self, id: &Identifier) -> Result<Value, crate::error::EvalError> {
        let key = id.innermost();
        Ok(self.values.get(key).cloned().unwrap_or(Value::Null))
    }

    fn current_column_value(&self) -> Result<Value, crate::error::EvalError> {
        Ok(self.this_column.clone())
    }

    fn next_random(&self, seed: Option<f64>) -> f64 {
        self.random.borrow_mut().next(seed)
    }
}

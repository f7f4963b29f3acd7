//! The builtin function registry: a fixed, case-insensitive name ->
//! [`Function`] map built once via `once_cell`.
//!
//! `IIf` is conspicuously absent — it is evaluated directly by the
//! expression evaluator so its untaken branch is never touched, rather
//! than through this table, which only ever sees already-evaluated
//! [`Value`] arguments.

use crate::context::EvalContext;
use crate::error::EvalError;
use access_core::numeric::round_half_even;
use access_core::{TemporalKind, Value};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub type FunctionImpl = fn(&[Value], &dyn EvalContext) -> Result<Value, EvalError>;

#[derive(Clone, Copy)]
pub struct Function {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    /// Whether this function is deterministic given its arguments (`Rnd`,
    /// `Now`, `Date`, `Time` and `Randomize` are not).
    pub pure: bool,
    pub call: FunctionImpl,
}

impl Function {
    pub fn check_arity(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map(|max| count <= max).unwrap_or(true)
    }
}

macro_rules! args_err {
    ($name:expr, $args:expr, $msg:expr) => {
        EvalError::Call {
            function: $name.to_string(),
            args: $args.iter().map(Value::as_string).collect::<Vec<_>>().join(", "),
            cause: $msg.to_string(),
        }
    };
}

fn long_arg(args: &[Value], i: usize, name: &'static str) -> Result<i32, EvalError> {
    args[i]
        .as_long()
        .map_err(|e| args_err!(name, args, e.to_string()))
}

fn double_arg(args: &[Value], i: usize, name: &'static str) -> Result<f64, EvalError> {
    args[i]
        .as_double()
        .map_err(|e| args_err!(name, args, e.to_string()))
}

fn string_arg(args: &[Value], i: usize) -> String {
    args[i].as_string()
}

fn datetime_arg(args: &[Value], i: usize, name: &'static str) -> Result<NaiveDateTime, EvalError> {
    args[i]
        .as_date_time()
        .map_err(|e| args_err!(name, args, e.to_string()))
}

static REGISTRY: Lazy<HashMap<String, Function>> = Lazy::new(build_registry);

pub fn registry() -> &'static HashMap<String, Function> {
    &REGISTRY
}

fn build_registry() -> HashMap<String, Function> {
    let mut map = HashMap::new();
    let mut add = |f: Function| {
        map.insert(f.name.to_ascii_uppercase(), f);
    };
    let mut alias = |existing: &str, new_name: &'static str| {
        let f = *map.get(&existing.to_ascii_uppercase()).expect("existing function");
        add(Function { name: new_name, ..f });
    };

    add(Function { name: "Choose", min_args: 2, max_args: None, pure: true, call: fn_choose });
    add(Function { name: "Switch", min_args: 2, max_args: None, pure: true, call: fn_switch });

    add(Function { name: "IsNull", min_args: 1, max_args: Some(1), pure: true, call: fn_is_null });
    add(Function { name: "IsNumeric", min_args: 1, max_args: Some(1), pure: true, call: fn_is_numeric });
    add(Function { name: "IsDate", min_args: 1, max_args: Some(1), pure: true, call: fn_is_date });
    add(Function { name: "IsEmpty", min_args: 1, max_args: Some(1), pure: true, call: fn_is_empty });
    add(Function { name: "TypeName", min_args: 1, max_args: Some(1), pure: true, call: fn_type_name });
    add(Function { name: "VarType", min_args: 1, max_args: Some(1), pure: true, call: fn_var_type });

    add(Function { name: "CStr", min_args: 1, max_args: Some(1), pure: true, call: fn_cstr });
    add(Function { name: "CLng", min_args: 1, max_args: Some(1), pure: true, call: fn_clng });
    add(Function { name: "CDbl", min_args: 1, max_args: Some(1), pure: true, call: fn_cdbl });
    add(Function { name: "CBool", min_args: 1, max_args: Some(1), pure: true, call: fn_cbool });
    add(Function { name: "CDec", min_args: 1, max_args: Some(1), pure: true, call: fn_cdec });
    add(Function { name: "CDate", min_args: 1, max_args: Some(1), pure: true, call: fn_cdate });
    add(Function { name: "CByte", min_args: 1, max_args: Some(1), pure: true, call: fn_cbyte });
    add(Function { name: "CCur", min_args: 1, max_args: Some(1), pure: true, call: fn_ccur });
    add(Function { name: "CInt", min_args: 1, max_args: Some(1), pure: true, call: fn_cint });
    add(Function { name: "CSng", min_args: 1, max_args: Some(1), pure: true, call: fn_csng });
    add(Function { name: "CVar", min_args: 1, max_args: Some(1), pure: true, call: fn_cvar });

    add(Function { name: "Abs", min_args: 1, max_args: Some(1), pure: true, call: fn_abs });
    add(Function { name: "Sgn", min_args: 1, max_args: Some(1), pure: true, call: fn_sgn });
    add(Function { name: "Sqr", min_args: 1, max_args: Some(1), pure: true, call: fn_sqr });
    add(Function { name: "Atn", min_args: 1, max_args: Some(1), pure: true, call: fn_atn });
    add(Function { name: "Cos", min_args: 1, max_args: Some(1), pure: true, call: fn_cos });
    add(Function { name: "Exp", min_args: 1, max_args: Some(1), pure: true, call: fn_exp });
    add(Function { name: "Log", min_args: 1, max_args: Some(1), pure: true, call: fn_log });
    add(Function { name: "Sin", min_args: 1, max_args: Some(1), pure: true, call: fn_sin });
    add(Function { name: "Tan", min_args: 1, max_args: Some(1), pure: true, call: fn_tan });
    add(Function { name: "Int", min_args: 1, max_args: Some(1), pure: true, call: fn_int });
    add(Function { name: "Fix", min_args: 1, max_args: Some(1), pure: true, call: fn_fix });
    add(Function { name: "Round", min_args: 1, max_args: Some(2), pure: true, call: fn_round });
    add(Function { name: "Rnd", min_args: 0, max_args: Some(1), pure: false, call: fn_rnd });
    add(Function { name: "Randomize", min_args: 0, max_args: Some(1), pure: false, call: fn_randomize });

    add(Function { name: "Left", min_args: 2, max_args: Some(2), pure: true, call: fn_left });
    add(Function { name: "Right", min_args: 2, max_args: Some(2), pure: true, call: fn_right });
    add(Function { name: "Mid", min_args: 2, max_args: Some(3), pure: true, call: fn_mid });
    add(Function { name: "Len", min_args: 1, max_args: Some(1), pure: true, call: fn_len });
    add(Function { name: "Trim", min_args: 1, max_args: Some(1), pure: true, call: fn_trim });
    add(Function { name: "LTrim", min_args: 1, max_args: Some(1), pure: true, call: fn_ltrim });
    add(Function { name: "RTrim", min_args: 1, max_args: Some(1), pure: true, call: fn_rtrim });
    add(Function { name: "UCase", min_args: 1, max_args: Some(1), pure: true, call: fn_ucase });
    add(Function { name: "LCase", min_args: 1, max_args: Some(1), pure: true, call: fn_lcase });
    add(Function { name: "InStr", min_args: 2, max_args: Some(3), pure: true, call: fn_instr });
    add(Function { name: "InStrRev", min_args: 2, max_args: Some(3), pure: true, call: fn_instrrev });
    add(Function { name: "Replace", min_args: 3, max_args: Some(3), pure: true, call: fn_replace });
    add(Function { name: "StrComp", min_args: 2, max_args: Some(3), pure: true, call: fn_strcomp });
    add(Function { name: "Space", min_args: 1, max_args: Some(1), pure: true, call: fn_space });
    add(Function { name: "String", min_args: 2, max_args: Some(2), pure: true, call: fn_string_repeat });
    add(Function { name: "StrReverse", min_args: 1, max_args: Some(1), pure: true, call: fn_strreverse });
    add(Function { name: "Asc", min_args: 1, max_args: Some(1), pure: true, call: fn_asc });
    add(Function { name: "AscW", min_args: 1, max_args: Some(1), pure: true, call: fn_ascw });
    add(Function { name: "Chr", min_args: 1, max_args: Some(1), pure: true, call: fn_chr });
    add(Function { name: "ChrW", min_args: 1, max_args: Some(1), pure: true, call: fn_chrw });
    add(Function { name: "Str", min_args: 1, max_args: Some(1), pure: true, call: fn_str });
    add(Function { name: "StrConv", min_args: 2, max_args: Some(3), pure: true, call: fn_strconv });

    add(Function { name: "Hex", min_args: 1, max_args: Some(1), pure: true, call: fn_hex });
    add(Function { name: "Oct", min_args: 1, max_args: Some(1), pure: true, call: fn_oct });

    add(Function { name: "Now", min_args: 0, max_args: Some(0), pure: false, call: fn_now });
    add(Function { name: "Date", min_args: 0, max_args: Some(0), pure: false, call: fn_date });
    add(Function { name: "Time", min_args: 0, max_args: Some(0), pure: false, call: fn_time });
    add(Function { name: "Timer", min_args: 0, max_args: Some(0), pure: false, call: fn_timer });
    add(Function { name: "DateValue", min_args: 1, max_args: Some(1), pure: true, call: fn_date_value });
    add(Function { name: "TimeValue", min_args: 1, max_args: Some(1), pure: true, call: fn_time_value });
    add(Function { name: "DateSerial", min_args: 3, max_args: Some(3), pure: true, call: fn_date_serial });
    add(Function { name: "TimeSerial", min_args: 3, max_args: Some(3), pure: true, call: fn_time_serial });
    add(Function { name: "DateAdd", min_args: 3, max_args: Some(3), pure: true, call: fn_date_add });
    add(Function { name: "DateDiff", min_args: 3, max_args: Some(3), pure: true, call: fn_date_diff });
    add(Function { name: "DatePart", min_args: 2, max_args: Some(2), pure: true, call: fn_date_part });
    add(Function { name: "Year", min_args: 1, max_args: Some(1), pure: true, call: fn_year });
    add(Function { name: "Month", min_args: 1, max_args: Some(1), pure: true, call: fn_month });
    add(Function { name: "Day", min_args: 1, max_args: Some(1), pure: true, call: fn_day });
    add(Function { name: "Hour", min_args: 1, max_args: Some(1), pure: true, call: fn_hour });
    add(Function { name: "Minute", min_args: 1, max_args: Some(1), pure: true, call: fn_minute });
    add(Function { name: "Second", min_args: 1, max_args: Some(1), pure: true, call: fn_second });
    add(Function { name: "Weekday", min_args: 1, max_args: Some(2), pure: true, call: fn_weekday });
    add(Function { name: "MonthName", min_args: 1, max_args: Some(2), pure: true, call: fn_month_name });
    add(Function { name: "WeekdayName", min_args: 1, max_args: Some(3), pure: true, call: fn_weekday_name });

    add(Function { name: "PV", min_args: 3, max_args: Some(3), pure: true, call: fn_pv });
    add(Function { name: "FV", min_args: 3, max_args: Some(3), pure: true, call: fn_fv });
    add(Function { name: "Pmt", min_args: 3, max_args: Some(3), pure: true, call: fn_pmt });
    add(Function { name: "NPer", min_args: 3, max_args: Some(3), pure: true, call: fn_nper });
    add(Function { name: "IPmt", min_args: 4, max_args: Some(4), pure: true, call: fn_ipmt });
    add(Function { name: "PPmt", min_args: 4, max_args: Some(4), pure: true, call: fn_ppmt });
    add(Function { name: "DDB", min_args: 4, max_args: Some(5), pure: true, call: fn_ddb });
    add(Function { name: "SLN", min_args: 3, max_args: Some(3), pure: true, call: fn_sln });
    add(Function { name: "SYD", min_args: 4, max_args: Some(4), pure: true, call: fn_syd });
    add(Function { name: "Rate", min_args: 3, max_args: Some(6), pure: true, call: fn_rate });

    add(Function { name: "Nz", min_args: 1, max_args: Some(2), pure: true, call: fn_nz });
    add(Function {
        name: "Format",
        min_args: 1,
        max_args: Some(2),
        pure: true,
        call: fn_format,
    });

    // VBA's legacy `$`-suffixed string-returning aliases.
    alias("Left", "Left$");
    alias("Right", "Right$");
    alias("Mid", "Mid$");
    alias("Trim", "Trim$");
    alias("LTrim", "LTrim$");
    alias("RTrim", "RTrim$");
    alias("UCase", "UCase$");
    alias("LCase", "LCase$");
    alias("Space", "Space$");
    alias("String", "String$");
    alias("Hex", "Hex$");
    alias("Oct", "Oct$");

    map
}

fn fn_choose(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let idx = long_arg(args, 0, "Choose")?;
    let options = &args[1..];
    if idx < 1 || (idx as usize) > options.len() {
        return Ok(Value::Null);
    }
    Ok(options[idx as usize - 1].clone())
}

fn fn_switch(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    if args.len() % 2 != 0 {
        return Err(EvalError::SwitchOddArgs { count: args.len() });
    }
    for pair in args.chunks(2) {
        if pair[0].as_bool().unwrap_or(false) {
            return Ok(pair[1].clone());
        }
    }
    Ok(Value::Null)
}

fn fn_is_null(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Bool(args[0].is_null()))
}

fn fn_is_numeric(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let ok = match &args[0] {
        Value::Long(_) | Value::Double(_) | Value::BigDec(_) | Value::Bool(_) => true,
        Value::String(s) => access_core::value::parse_numeric_string(s).is_some(),
        _ => false,
    };
    Ok(Value::Bool(ok))
}

fn fn_is_date(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Bool(args[0].is_temporal() || (matches!(&args[0], Value::String(_)) && args[0].as_date_time().is_ok())))
}

fn fn_is_empty(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(&args[0], Value::Null) || matches!(&args[0], Value::String(s) if s.is_empty())))
}

fn fn_type_name(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(args[0].type_name().to_string()))
}

fn fn_var_type(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(args[0].var_type_code()))
}

fn fn_cstr(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(args[0].as_string()))
}

fn fn_clng(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(long_arg(args, 0, "CLng")?))
}

fn fn_cdbl(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "CDbl")?))
}

fn fn_cbool(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Bool(
        args[0].as_bool().map_err(|e| args_err!("CBool", args, e.to_string()))?,
    ))
}

fn fn_cdec(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::big_decimal(
        args[0].as_big_decimal().map_err(|e| args_err!("CDec", args, e.to_string()))?,
    ))
}

fn fn_cdate(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let dt = datetime_arg(args, 0, "CDate")?;
    Ok(Value::DateTime(dt))
}

fn fn_cbyte(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let d = double_arg(args, 0, "CByte")?.round();
    if !(0.0..=255.0).contains(&d) {
        return Err(EvalError::OutOfRange { value: d.to_string(), target: "Byte" });
    }
    Ok(Value::Long(d as i32))
}

fn fn_ccur(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = args[0].as_big_decimal().map_err(|e| args_err!("CCur", args, e.to_string()))?;
    Ok(Value::big_decimal(n.with_scale(4)))
}

fn fn_cint(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let d = double_arg(args, 0, "CInt")?.round();
    if !(-32768.0..=32767.0).contains(&d) {
        return Err(EvalError::OutOfRange { value: d.to_string(), target: "Integer" });
    }
    Ok(Value::Long(d as i32))
}

fn fn_csng(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let d = double_arg(args, 0, "CSng")?;
    if d.is_finite() && d.abs() > f32::MAX as f64 {
        return Err(EvalError::OutOfRange { value: d.to_string(), target: "Single" });
    }
    Ok(Value::Double(d as f32 as f64))
}

fn fn_cvar(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(args[0].clone())
}

fn fn_abs(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Long(n) => Ok(Value::Long(n.wrapping_abs())),
        Value::BigDec(n) => Ok(Value::big_decimal(n.abs())),
        _ => Ok(Value::Double(double_arg(args, 0, "Abs")?.abs())),
    }
}

fn fn_sgn(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = double_arg(args, 0, "Sgn")?;
    Ok(Value::Long(if n > 0.0 {
        1
    } else if n < 0.0 {
        -1
    } else {
        0
    }))
}

fn fn_sqr(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = double_arg(args, 0, "Sqr")?;
    if n < 0.0 {
        return Err(EvalError::NegativeSqrt { value: n });
    }
    Ok(Value::Double(n.sqrt()))
}

fn fn_atn(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "Atn")?.atan()))
}

fn fn_cos(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "Cos")?.cos()))
}

fn fn_exp(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "Exp")?.exp()))
}

fn fn_log(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = double_arg(args, 0, "Log")?;
    if n <= 0.0 {
        return Err(args_err!("Log", args, "argument must be positive"));
    }
    Ok(Value::Double(n.ln()))
}

fn fn_sin(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "Sin")?.sin()))
}

fn fn_tan(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Double(double_arg(args, 0, "Tan")?.tan()))
}

fn fn_int(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(double_arg(args, 0, "Int")?.floor() as i32))
}

fn fn_fix(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(double_arg(args, 0, "Fix")?.trunc() as i32))
}

fn fn_round(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let digits = if args.len() > 1 { long_arg(args, 1, "Round")? } else { 0 };
    match &args[0] {
        Value::BigDec(n) => Ok(Value::big_decimal(round_half_even(n, digits as i64))),
        _ => Ok(Value::Double(access_core::numeric::round_f64_half_even(
            double_arg(args, 0, "Round")?,
            digits,
        ))),
    }
}

fn fn_rnd(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let seed = if args.is_empty() { None } else { Some(double_arg(args, 0, "Rnd")?) };
    Ok(Value::Double(ctx.next_random(seed)))
}

fn fn_randomize(_args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Null)
}

fn fn_left(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let n = long_arg(args, 1, "Left")?.max(0) as usize;
    Ok(Value::String(s.chars().take(n).collect()))
}

fn fn_right(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let n = long_arg(args, 1, "Right")?.max(0) as usize;
    let len = s.chars().count();
    let skip = len.saturating_sub(n);
    Ok(Value::String(s.chars().skip(skip).collect()))
}

fn fn_mid(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let start = long_arg(args, 1, "Mid")?.max(1) as usize - 1;
    let chars: Vec<char> = s.chars().collect();
    if start >= chars.len() {
        return Ok(Value::String(String::new()));
    }
    let take = if args.len() > 2 {
        long_arg(args, 2, "Mid")?.max(0) as usize
    } else {
        chars.len() - start
    };
    Ok(Value::String(chars[start..].iter().take(take).collect()))
}

fn fn_len(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(string_arg(args, 0).chars().count() as i32))
}

fn fn_trim(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).trim().to_string()))
}

fn fn_ltrim(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).trim_start().to_string()))
}

fn fn_rtrim(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).trim_end().to_string()))
}

fn fn_ucase(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).to_uppercase()))
}

fn fn_lcase(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).to_lowercase()))
}

fn fn_instr(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let (start, hay, needle) = if args.len() == 3 {
        (long_arg(args, 0, "InStr")?.max(1) as usize - 1, string_arg(args, 1), string_arg(args, 2))
    } else {
        (0, string_arg(args, 0), string_arg(args, 1))
    };
    let hay_chars: Vec<char> = hay.chars().collect();
    if start > hay_chars.len() {
        return Ok(Value::Long(0));
    }
    let rest: String = hay_chars[start..].iter().collect();
    match rest.find(&needle) {
        Some(byte_pos) => {
            let char_pos = rest[..byte_pos].chars().count();
            Ok(Value::Long((start + char_pos + 1) as i32))
        }
        None => Ok(Value::Long(0)),
    }
}

fn fn_instrrev(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let hay = string_arg(args, 0);
    let needle = string_arg(args, 1);
    match hay.rfind(&needle) {
        Some(byte_pos) => Ok(Value::Long((hay[..byte_pos].chars().count() + 1) as i32)),
        None => Ok(Value::Long(0)),
    }
}

fn fn_replace(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let find = string_arg(args, 1);
    let replacement = string_arg(args, 2);
    if find.is_empty() {
        return Ok(Value::String(s));
    }
    Ok(Value::String(s.replace(&find, &replacement)))
}

fn fn_strcomp(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let a = string_arg(args, 0);
    let b = string_arg(args, 1);
    let case_insensitive = args.len() > 2 && long_arg(args, 2, "StrComp")? == 1;
    let (a, b) = if case_insensitive {
        (a.to_lowercase(), b.to_lowercase())
    } else {
        (a, b)
    };
    Ok(Value::Long(match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }))
}

fn fn_space(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = long_arg(args, 0, "Space")?.max(0) as usize;
    Ok(Value::String(" ".repeat(n)))
}

fn fn_string_repeat(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = long_arg(args, 0, "String")?.max(0) as usize;
    let c = string_arg(args, 1).chars().next().unwrap_or(' ');
    Ok(Value::String(std::iter::repeat(c).take(n).collect()))
}

fn fn_strreverse(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(string_arg(args, 0).chars().rev().collect()))
}

fn fn_asc(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let c = s.chars().next().ok_or_else(|| args_err!("Asc", args, "empty string"))?;
    let code = c as u32;
    if code > 255 {
        return Err(EvalError::OutOfRange { value: code.to_string(), target: "Asc" });
    }
    Ok(Value::Long(code as i32))
}

fn fn_ascw(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let c = s.chars().next().ok_or_else(|| args_err!("AscW", args, "empty string"))?;
    Ok(Value::Long(c as u32 as i32))
}

fn fn_chr(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = long_arg(args, 0, "Chr")?;
    if !(0..=255).contains(&n) {
        return Err(EvalError::OutOfRange { value: n.to_string(), target: "Chr" });
    }
    Ok(Value::String((n as u8 as char).to_string()))
}

fn fn_chrw(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = long_arg(args, 0, "ChrW")?;
    let c = char::from_u32(n as u32).ok_or_else(|| args_err!("ChrW", args, "invalid character code"))?;
    Ok(Value::String(c.to_string()))
}

fn fn_str(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let s = args[0].as_string();
    // VBA's `Str` reserves a leading character for the sign, left blank for
    // non-negative numbers.
    if args[0].is_numeric() && !s.starts_with('-') {
        Ok(Value::String(format!(" {s}")))
    } else {
        Ok(Value::String(s))
    }
}

fn fn_strconv(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let s = string_arg(args, 0);
    let mode = long_arg(args, 1, "StrConv")?;
    let out = match mode {
        1 => s.to_uppercase(),
        2 => s.to_lowercase(),
        3 => proper_case(&s),
        64 => s,
        _ => return Err(args_err!("StrConv", args, "unsupported conversion code")),
    };
    Ok(Value::String(out))
}

fn proper_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn fn_hex(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(format!("{:X}", long_arg(args, 0, "Hex")?)))
}

fn fn_oct(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::String(format!("{:o}", long_arg(args, 0, "Oct")?)))
}

fn fn_now(_args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Err(EvalError::Call {
        function: "Now".to_string(),
        args: String::new(),
        cause: "wall-clock time must be supplied by the host EvalContext".to_string(),
    })
}

fn fn_date(_args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    fn_now(_args, _ctx)
}

fn fn_time(_args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    fn_now(_args, _ctx)
}

fn fn_timer(_args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Err(EvalError::Call {
        function: "Timer".to_string(),
        args: String::new(),
        cause: "wall-clock time must be supplied by the host EvalContext".to_string(),
    })
}

fn fn_date_value(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Date(datetime_arg(args, 0, "DateValue")?.date()))
}

fn fn_time_value(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Time(datetime_arg(args, 0, "TimeValue")?.time()))
}

fn fn_date_serial(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let (y, m, d) = (long_arg(args, 0, "DateSerial")?, long_arg(args, 1, "DateSerial")?, long_arg(args, 2, "DateSerial")?);
    // Normalize month overflow/underflow into the year the way VBA's
    // DateSerial does (month 13 rolls into January of the next year, etc.)
    // before applying the day offset.
    let total_months = y * 12 + (m - 1);
    let year = total_months.div_euclid(12);
    let month0 = total_months.rem_euclid(12);
    let date = NaiveDate::from_ymd_opt(year, (month0 + 1) as u32, 1)
        .ok_or_else(|| args_err!("DateSerial", args, "date out of range"))?;
    let date = date + Duration::days((d - 1) as i64);
    Ok(Value::Date(date))
}

fn fn_time_serial(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let (h, m, s) = (long_arg(args, 0, "TimeSerial")?, long_arg(args, 1, "TimeSerial")?, long_arg(args, 2, "TimeSerial")?);
    let total_secs = h as i64 * 3600 + m as i64 * 60 + s as i64;
    let normalized = total_secs.rem_euclid(86_400) as u32;
    Ok(Value::Time(
        NaiveTime::from_num_seconds_from_midnight_opt(normalized, 0)
            .ok_or_else(|| args_err!("TimeSerial", args, "time out of range"))?,
    ))
}

fn interval_code(args: &[Value], i: usize, name: &'static str) -> Result<String, EvalError> {
    Ok(string_arg(args, i).to_ascii_lowercase())
        .and_then(|s| if s.is_empty() { Err(args_err!(name, args, "empty interval code")) } else { Ok(s) })
}

fn fn_date_add(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let interval = interval_code(args, 0, "DateAdd")?;
    let amount = long_arg(args, 1, "DateAdd")?;
    let dt = datetime_arg(args, 2, "DateAdd")?;
    let result = match interval.as_str() {
        "yyyy" => dt.with_year(dt.year() + amount),
        "m" => {
            if amount >= 0 {
                dt.checked_add_months(chrono::Months::new(amount as u32))
            } else {
                dt.checked_sub_months(chrono::Months::new((-amount) as u32))
            }
        }
        "d" | "y" => Some(dt + Duration::days(amount as i64)),
        "w" => Some(dt + Duration::days(amount as i64)),
        "ww" => Some(dt + Duration::weeks(amount as i64)),
        "h" => Some(dt + Duration::hours(amount as i64)),
        "n" => Some(dt + Duration::minutes(amount as i64)),
        "s" => Some(dt + Duration::seconds(amount as i64)),
        "q" => {
            if amount >= 0 {
                dt.checked_add_months(chrono::Months::new((amount * 3) as u32))
            } else {
                dt.checked_sub_months(chrono::Months::new((-amount * 3) as u32))
            }
        }
        _ => None,
    };
    let result = result.ok_or_else(|| args_err!("DateAdd", args, "resulting date out of range"))?;
    Ok(Value::DateTime(result))
}

fn fn_date_diff(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let interval = interval_code(args, 0, "DateDiff")?;
    let a = datetime_arg(args, 1, "DateDiff")?;
    let b = datetime_arg(args, 2, "DateDiff")?;
    let delta = b - a;
    let value = match interval.as_str() {
        "yyyy" => (b.year() - a.year()) as i64,
        "q" => (b.year() - a.year()) as i64 * 4 + (b.month() as i64 / 3 - a.month() as i64 / 3),
        "m" => (b.year() - a.year()) as i64 * 12 + b.month() as i64 - a.month() as i64,
        "d" | "y" => delta.num_days(),
        "w" => delta.num_days() / 7,
        "ww" => delta.num_weeks(),
        "h" => delta.num_hours(),
        "n" => delta.num_minutes(),
        "s" => delta.num_seconds(),
        _ => return Err(args_err!("DateDiff", args, "unknown interval code")),
    };
    Ok(Value::Long(value as i32))
}

fn fn_date_part(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let interval = interval_code(args, 0, "DatePart")?;
    let dt = datetime_arg(args, 1, "DatePart")?;
    let value = match interval.as_str() {
        "yyyy" => dt.year(),
        "q" => dt.month0() as i32 / 3 + 1,
        "m" => dt.month() as i32,
        "d" | "y" => dt.day() as i32,
        "w" => weekday_number(dt.weekday(), ctx.first_day_of_week()),
        "ww" => dt.iso_week().week() as i32,
        "h" => dt.hour() as i32,
        "n" => dt.minute() as i32,
        "s" => dt.second() as i32,
        _ => return Err(args_err!("DatePart", args, "unknown interval code")),
    };
    Ok(Value::Long(value))
}

fn weekday_number(day: chrono::Weekday, first: chrono::Weekday) -> i32 {
    let offset = (day.num_days_from_monday() as i32 - first.num_days_from_monday() as i32).rem_euclid(7);
    offset + 1
}

fn fn_year(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Year")?.year()))
}

fn fn_month(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Month")?.month() as i32))
}

fn fn_day(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Day")?.day() as i32))
}

fn fn_hour(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Hour")?.hour() as i32))
}

fn fn_minute(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Minute")?.minute() as i32))
}

fn fn_second(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    Ok(Value::Long(datetime_arg(args, 0, "Second")?.second() as i32))
}

fn fn_weekday(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let dt = datetime_arg(args, 0, "Weekday")?;
    let first = if args.len() > 1 {
        day_from_code(long_arg(args, 1, "Weekday")?).unwrap_or_else(|| ctx.first_day_of_week())
    } else {
        ctx.first_day_of_week()
    };
    Ok(Value::Long(weekday_number(dt.weekday(), first)))
}

fn day_from_code(code: i32) -> Option<chrono::Weekday> {
    use chrono::Weekday::*;
    Some(match code {
        1 => Sun,
        2 => Mon,
        3 => Tue,
        4 => Wed,
        5 => Thu,
        6 => Fri,
        7 => Sat,
        _ => return None,
    })
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October", "November",
    "December",
];

fn fn_month_name(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let m = long_arg(args, 0, "MonthName")?;
    let abbreviate = args.len() > 1 && args[1].as_bool().unwrap_or(false);
    let idx = ((m - 1).rem_euclid(12)) as usize;
    let name = MONTH_NAMES[idx];
    Ok(Value::String(if abbreviate { name[..3].to_string() } else { name.to_string() }))
}

const DAY_NAMES: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

fn fn_weekday_name(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let n = long_arg(args, 0, "WeekdayName")?;
    let abbreviate = args.len() > 1 && args[1].as_bool().unwrap_or(false);
    let first = if args.len() > 2 {
        day_from_code(long_arg(args, 2, "WeekdayName")?).unwrap_or_else(|| ctx.first_day_of_week())
    } else {
        ctx.first_day_of_week()
    };
    let idx = (first.num_days_from_sunday() as i32 + (n - 1)).rem_euclid(7) as usize;
    let name = DAY_NAMES[idx];
    Ok(Value::String(if abbreviate { name[..3].to_string() } else { name.to_string() }))
}

fn fn_pv(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "PV")?;
    let nper = double_arg(args, 1, "PV")?;
    let pmt = double_arg(args, 2, "PV")?;
    let pv = if rate == 0.0 {
        -pmt * nper
    } else {
        -pmt * (1.0 - (1.0 + rate).powf(-nper)) / rate
    };
    Ok(Value::Double(pv))
}

fn fn_fv(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "FV")?;
    let nper = double_arg(args, 1, "FV")?;
    let pmt = double_arg(args, 2, "FV")?;
    let fv = if rate == 0.0 {
        -pmt * nper
    } else {
        -pmt * ((1.0 + rate).powf(nper) - 1.0) / rate
    };
    Ok(Value::Double(fv))
}

fn fn_pmt(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "Pmt")?;
    let nper = double_arg(args, 1, "Pmt")?;
    let pv = double_arg(args, 2, "Pmt")?;
    let pmt = if rate == 0.0 {
        -pv / nper
    } else {
        -pv * rate / (1.0 - (1.0 + rate).powf(-nper))
    };
    Ok(Value::Double(pmt))
}

fn pmt_total(rate: f64, nper: f64, pv: f64) -> f64 {
    if rate == 0.0 {
        -pv / nper
    } else {
        -pv * rate / (1.0 - (1.0 + rate).powf(-nper))
    }
}

fn fn_nper(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "NPer")?;
    let pmt = double_arg(args, 1, "NPer")?;
    let pv = double_arg(args, 2, "NPer")?;
    let nper = if rate == 0.0 {
        -pv / pmt
    } else {
        (pmt / (pmt + pv * rate)).ln() / (1.0 + rate).ln()
    };
    Ok(Value::Double(nper))
}

fn fn_ipmt(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "IPmt")?;
    let per = double_arg(args, 1, "IPmt")?;
    let nper = double_arg(args, 2, "IPmt")?;
    let pv = double_arg(args, 3, "IPmt")?;
    let pmt = pmt_total(rate, nper, pv);
    let balance_before = if rate == 0.0 {
        pv + pmt * (per - 1.0)
    } else {
        pv * (1.0 + rate).powf(per - 1.0) + pmt * (((1.0 + rate).powf(per - 1.0) - 1.0) / rate)
    };
    Ok(Value::Double(-balance_before * rate))
}

fn fn_ppmt(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let rate = double_arg(args, 0, "PPmt")?;
    let nper = double_arg(args, 2, "PPmt")?;
    let pv = double_arg(args, 3, "PPmt")?;
    let pmt = pmt_total(rate, nper, pv);
    let Value::Double(ipmt) = fn_ipmt(args, ctx)? else { unreachable!() };
    Ok(Value::Double(pmt - ipmt))
}

fn fn_ddb(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let cost = double_arg(args, 0, "DDB")?;
    let salvage = double_arg(args, 1, "DDB")?;
    let life = double_arg(args, 2, "DDB")?;
    let period = double_arg(args, 3, "DDB")?;
    let factor = if args.len() > 4 { double_arg(args, 4, "DDB")? } else { 2.0 };
    let rate = factor / life;
    let mut book = cost;
    let mut depreciation = 0.0;
    let mut p = 1.0;
    while p <= period {
        depreciation = (book * rate).min(book - salvage).max(0.0);
        book -= depreciation;
        p += 1.0;
    }
    Ok(Value::Double(depreciation))
}

fn fn_sln(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let cost = double_arg(args, 0, "SLN")?;
    let salvage = double_arg(args, 1, "SLN")?;
    let life = double_arg(args, 2, "SLN")?;
    Ok(Value::Double((cost - salvage) / life))
}

fn fn_syd(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let cost = double_arg(args, 0, "SYD")?;
    let salvage = double_arg(args, 1, "SYD")?;
    let life = double_arg(args, 2, "SYD")?;
    let period = double_arg(args, 3, "SYD")?;
    let sum_of_years = life * (life + 1.0) / 2.0;
    Ok(Value::Double((cost - salvage) * (life - period + 1.0) / sum_of_years))
}

/// `nper`, `pmt`, `pv` are required; `fv`, `type`, `guess` default to
/// `0.0`, `0.0`, `0.1`. Iterated via the secant method, bounded at 20
/// iterations, convergence `1e-7`.
fn fn_rate(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let nper = double_arg(args, 0, "Rate")?;
    let pmt = double_arg(args, 1, "Rate")?;
    let pv = double_arg(args, 2, "Rate")?;
    let fv = if args.len() > 3 { double_arg(args, 3, "Rate")? } else { 0.0 };
    let typ = if args.len() > 4 { double_arg(args, 4, "Rate")? } else { 0.0 };
    let guess = if args.len() > 5 { double_arg(args, 5, "Rate")? } else { 0.1 };

    let f = |rate: f64| -> f64 {
        if rate.abs() < 1e-12 {
            pv + pmt * nper + fv
        } else {
            let factor = (1.0 + rate).powf(nper);
            pv * factor + pmt * (1.0 + rate * typ) * (factor - 1.0) / rate + fv
        }
    };

    let mut x0 = guess;
    let mut x1 = guess + 1e-4;
    let mut f0 = f(x0);
    for _ in 0..20 {
        let f1 = f(x1);
        let denom = f1 - f0;
        if denom.abs() < 1e-12 {
            break;
        }
        let x2 = x1 - f1 * (x1 - x0) / denom;
        if (x2 - x1).abs() < 1e-7 {
            x1 = x2;
            break;
        }
        x0 = x1;
        f0 = f1;
        x1 = x2;
    }
    Ok(Value::Double(x1))
}

fn fn_nz(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    if args[0].is_null() {
        Ok(args.get(1).cloned().unwrap_or(Value::String(String::new())))
    } else {
        Ok(args[0].clone())
    }
}

fn fn_format(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    let pattern = if args.len() > 1 { Some(string_arg(args, 1)) } else { None };
    Ok(Value::String(crate::format::format_value(&args[0], pattern.as_deref(), ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapEvalContext;

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let ctx = MapEvalContext::new();
        (registry().get(&name.to_ascii_uppercase()).unwrap().call)(args, &ctx)
    }

    #[test]
    fn left_and_right() {
        assert_eq!(call("Left", &[Value::String("Hello".into()), Value::Long(3)]).unwrap(), Value::String("Hel".into()));
        assert_eq!(call("Right", &[Value::String("Hello".into()), Value::Long(3)]).unwrap(), Value::String("llo".into()));
    }

    #[test]
    fn mid_without_length_takes_rest() {
        assert_eq!(
            call("Mid", &[Value::String("Hello".into()), Value::Long(2)]).unwrap(),
            Value::String("ello".into())
        );
    }

    #[test]
    fn switch_requires_even_args() {
        let err = call("Switch", &[Value::Bool(true)]).unwrap_err();
        assert!(matches!(err, EvalError::SwitchOddArgs { count: 1 }));
    }

    #[test]
    fn choose_out_of_range_is_null() {
        assert_eq!(call("Choose", &[Value::Long(5), Value::Long(1), Value::Long(2)]).unwrap(), Value::Null);
    }

    #[test]
    fn dollar_alias_matches_base() {
        assert_eq!(
            call("Left$", &[Value::String("Hello".into()), Value::Long(1)]).unwrap(),
            Value::String("H".into())
        );
    }

    #[test]
    fn sqr_of_negative_errors() {
        assert!(matches!(call("Sqr", &[Value::Long(-1)]), Err(EvalError::NegativeSqrt { .. })));
    }

    #[test]
    fn nz_substitutes_default() {
        assert_eq!(call("Nz", &[Value::Null, Value::Long(7)]).unwrap(), Value::Long(7));
        assert_eq!(call("Nz", &[Value::Long(3), Value::Long(7)]).unwrap(), Value::Long(3));
    }
}

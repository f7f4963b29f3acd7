//! The `Format` engine: predefined pattern names plus a custom pattern
//! language for numbers, dates, and text.
//!
//! `Format` never raises: a pattern this module cannot make sense of falls
//! back to the value's plain (`CStr`-equivalent) rendering rather than
//! propagating an `EvalError`, mirroring the host's own "never blow up a
//! report because of a bad format string" behaviour.

use crate::context::LocaleContext;
use access_core::numeric::round_half_even;
use access_core::Value;
use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDateTime, Timelike};

pub fn format_value(value: &Value, pattern: Option<&str>, ctx: &dyn LocaleContext) -> String {
    let Some(pattern) = pattern else {
        return value.as_string();
    };
    let trimmed = pattern.trim();

    if let Some(rendered) = predefined(value, trimmed, ctx) {
        return rendered;
    }

    if value.is_temporal() || (matches!(value, Value::String(_)) && looks_like_date_pattern(trimmed)) {
        if let Ok(dt) = value.as_date_time() {
            return format_date(dt, trimmed, ctx);
        }
    }

    if matches!(value, Value::String(_)) {
        return format_text(&value.as_string(), trimmed);
    }

    format_number(value, trimmed)
}

fn looks_like_date_pattern(pattern: &str) -> bool {
    pattern.chars().any(|c| matches!(c, 'y' | 'm' | 'd' | 'h' | 'n' | 's'))
        && !pattern.chars().any(|c| matches!(c, '0' | '#' | '@' | '&'))
}

fn predefined(value: &Value, name: &str, ctx: &dyn LocaleContext) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "general number" => Some(value.as_double().ok()?.to_string()),
        "fixed" => Some(format_number(value, "0.00")),
        "standard" => Some(format_number(value, "#,##0.00")),
        "percent" => Some(format_number(value, "0.00%")),
        "currency" => Some(format_number(value, "$#,##0.00")),
        "euro" => Some(format_number(value, "\u{20ac}#,##0.00")),
        "scientific" => Some(format_scientific(value.as_double().ok()?)),
        "yes/no" => Some(if value.as_bool().ok()? { "Yes" } else { "No" }.to_string()),
        "true/false" => Some(if value.as_bool().ok()? { "True" } else { "False" }.to_string()),
        "on/off" => Some(if value.as_bool().ok()? { "On" } else { "Off" }.to_string()),
        "general date" => Some(format_date(value.as_date_time().ok()?, "m/d/yyyy h:nn:ss AM/PM", ctx)),
        "long date" => Some(format_date(value.as_date_time().ok()?, "dddd, mmmm d, yyyy", ctx)),
        "medium date" => Some(format_date(value.as_date_time().ok()?, "d-mmm-yy", ctx)),
        "short date" => Some(format_date(value.as_date_time().ok()?, "m/d/yyyy", ctx)),
        "long time" => Some(format_date(value.as_date_time().ok()?, "h:nn:ss AM/PM", ctx)),
        "medium time" => Some(format_date(value.as_date_time().ok()?, "h:nn AM/PM", ctx)),
        "short time" => Some(format_date(value.as_date_time().ok()?, "hh:nn", ctx)),
        _ => None,
    }
}

fn format_scientific(n: f64) -> String {
    format!("{:E}", n).replace('E', "E+").replace("E+-", "E-")
}

// ---------------------------------------------------------------------
// Numeric custom patterns
// ---------------------------------------------------------------------

/// Splits a numeric format into its up-to-four sections
/// (positive;negative;zero;null) and applies the one that matches `value`.
fn format_number(value: &Value, pattern: &str) -> String {
    let sections: Vec<&str> = pattern.split(';').collect();

    if value.is_null() {
        if let Some(s) = sections.get(3) {
            return render_literal_section(s);
        }
        return String::new();
    }

    let Ok(big) = value.as_big_decimal() else {
        return value.as_string();
    };

    let is_negative = big < BigDecimal::from(0);
    let uses_negative_section = is_negative && sections.len() > 1;
    let section = if num_traits::Zero::is_zero(&big) && sections.len() > 2 {
        sections[2]
    } else if uses_negative_section {
        sections[1]
    } else {
        sections[0]
    };

    render_numeric_section(&big, section, uses_negative_section)
}

fn render_literal_section(section: &str) -> String {
    section.chars().filter(|c| !matches!(c, '0' | '#' | ',' | '.')).collect()
}

/// `suppress_sign` is set when a dedicated negative section (the pattern's
/// second, semicolon-separated section) was already selected — that
/// section is responsible for signalling negativity itself (parentheses,
/// a trailing `CR`, …), so the automatic leading `-` this function would
/// otherwise add is skipped.
fn render_numeric_section(value: &BigDecimal, pattern: &str, suppress_sign: bool) -> String {
    let percent = pattern.contains('%');
    let scaled = if percent {
        value * BigDecimal::from(100)
    } else {
        value.clone()
    };

    let (int_pat, frac_pat) = match pattern.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (pattern, None),
    };
    let frac_len = frac_pat.map(|f| f.chars().filter(|c| matches!(c, '0' | '#')).count()).unwrap_or(0);

    let rounded = round_half_even(&scaled, frac_len as i64);
    let negative = rounded < BigDecimal::from(0);
    let abs = rounded.abs();
    let text = abs.to_string();
    let (int_digits, frac_digits) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (text, String::new()),
    };
    let frac_digits = format!("{:0<width$}", frac_digits, width = frac_len);

    let grouped = render_integer_part(&int_digits, int_pat);
    let frac_rendered = render_fraction_part(&frac_digits, frac_pat.unwrap_or(""));

    let mut out = String::new();
    if negative && !suppress_sign {
        out.push('-');
    }
    out.push_str(&grouped);
    // Literal characters trailing the last digit/grouping placeholder in
    // `int_pat` (e.g. the `)` in `0)`) belong right after the integer part,
    // distinct from whatever comes after the decimal point.
    let int_suffix: String = int_pat
        .chars()
        .rev()
        .take_while(|c| !matches!(c, '0' | '#' | ','))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    out.push_str(&int_suffix);
    if !frac_rendered.is_empty() {
        out.push('.');
        out.push_str(&frac_rendered);
    }
    if percent {
        out.push('%');
    }
    // Any other literal characters in the pattern (currency symbols, etc.)
    // that are not digit/grouping/decimal/percent markers are prefixed
    // verbatim — the common case is a single leading symbol like `$`.
    let prefix: String = int_pat
        .chars()
        .take_while(|c| !matches!(c, '0' | '#' | ','))
        .collect();
    let suffix: String = frac_pat
        .unwrap_or("")
        .chars()
        .skip_while(|c| matches!(c, '0' | '#'))
        .filter(|c| *c != '%')
        .collect();
    format!("{}{}{}", prefix, out, suffix)
}

fn render_integer_part(digits: &str, pattern: &str) -> String {
    let pattern_chars: Vec<char> = pattern.chars().filter(|c| matches!(c, '0' | '#' | ',')).collect();
    let digit_chars: Vec<char> = digits.chars().collect();

    let mut result: Vec<char> = Vec::new();
    let mut pi = pattern_chars.len();
    let mut di = digit_chars.len();

    while pi > 0 || di > 0 {
        if pi > 0 {
            pi -= 1;
            match pattern_chars[pi] {
                ',' => {
                    if di > 0 {
                        result.push(',');
                    }
                    continue;
                }
                '0' => {
                    if di > 0 {
                        di -= 1;
                        result.push(digit_chars[di]);
                    } else {
                        result.push('0');
                    }
                }
                '#' => {
                    if di > 0 {
                        di -= 1;
                        result.push(digit_chars[di]);
                    }
                }
                _ => {}
            }
        } else {
            di -= 1;
            result.push(digit_chars[di]);
        }
    }

    if result.is_empty() {
        result.push('0');
    }
    result.iter().rev().collect()
}

fn render_fraction_part(digits: &str, pattern: &str) -> String {
    let pattern_chars: Vec<char> = pattern.chars().filter(|c| matches!(c, '0' | '#')).collect();
    let digit_chars: Vec<char> = digits.chars().collect();
    let mut out = String::new();
    for (i, p) in pattern_chars.iter().enumerate() {
        let d = digit_chars.get(i).copied().unwrap_or('0');
        match p {
            '0' => out.push(d),
            '#' => {
                if d != '0' || digit_chars[i..].iter().any(|c| *c != '0') {
                    out.push(d);
                }
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------
// Date/time custom patterns
// ---------------------------------------------------------------------

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October", "November",
    "December",
];
const DAY_NAMES: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

/// Longest-prefix-first date token dictionary so `mmmm` is tried before
/// `mmm` before `mm` before `m` (and likewise for every other token family
/// sharing a prefix, e.g. `dddddd`/`ddddd`/`dddd`/`ddd`/`dd`/`d`).
const DATE_TOKENS: &[&str] = &[
    "dddddd", "ddddd", "dddd", "ddd", "dd", "d", "yyyy", "yy", "y", "mmmm", "mmm", "mm", "m", "ttttt", "hh", "h",
    "nn", "n", "ss", "s", "ww", "w", "q", "AM/PM", "am/pm", "AMPM", "A/P", "a/p",
];

fn format_date(dt: NaiveDateTime, pattern: &str, ctx: &dyn LocaleContext) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    let is_pm = dt.hour() >= 12;
    let hour12 = match dt.hour() % 12 {
        0 => 12,
        h => h,
    };

    while i < chars.len() {
        let rest: String = chars[i..].iter().collect();
        if let Some(tok) = DATE_TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str(&render_date_token(tok, dt, hour12, is_pm, ctx));
            i += tok.chars().count();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn render_date_token(token: &str, dt: NaiveDateTime, hour12: u32, is_pm: bool, ctx: &dyn LocaleContext) -> String {
    match token {
        "dddddd" => format_date(dt, "dddd, mmmm d, yyyy", ctx),
        "ddddd" => format_date(dt, "m/d/yyyy", ctx),
        "yyyy" => dt.year().to_string(),
        "yy" => format!("{:02}", dt.year() % 100),
        "y" => dt.ordinal().to_string(),
        "mmmm" => MONTH_NAMES[dt.month0() as usize].to_string(),
        "mmm" => MONTH_NAMES[dt.month0() as usize][..3].to_string(),
        "mm" => format!("{:02}", dt.month()),
        "m" => dt.month().to_string(),
        "dddd" => DAY_NAMES[dt.weekday().num_days_from_sunday() as usize].to_string(),
        "ddd" => DAY_NAMES[dt.weekday().num_days_from_sunday() as usize][..3].to_string(),
        "dd" => format!("{:02}", dt.day()),
        "d" => dt.day().to_string(),
        "ttttt" => format_date(dt, "h:nn:ss AM/PM", ctx),
        "hh" => format!("{:02}", hour12),
        "h" => hour12.to_string(),
        "nn" => format!("{:02}", dt.minute()),
        "n" => dt.minute().to_string(),
        "ss" => format!("{:02}", dt.second()),
        "s" => dt.second().to_string(),
        "ww" => dt.iso_week().week().to_string(),
        "w" => weekday_number_from(dt.weekday(), ctx.first_day_of_week()).to_string(),
        "q" => (dt.month0() / 3 + 1).to_string(),
        "AM/PM" | "am/pm" | "AMPM" => if is_pm { ctx.pm_string() } else { ctx.am_string() }.to_string(),
        "A/P" => if is_pm { "P" } else { "A" }.to_string(),
        "a/p" => if is_pm { "p" } else { "a" }.to_string(),
        _ => String::new(),
    }
}

fn weekday_number_from(day: chrono::Weekday, first: chrono::Weekday) -> i32 {
    (day.num_days_from_monday() as i32 - first.num_days_from_monday() as i32).rem_euclid(7) + 1
}

// ---------------------------------------------------------------------
// Text custom patterns
// ---------------------------------------------------------------------

/// Two-section (non-null;null) text format using `@` (required char or
/// space) and `&` (required char or nothing) placeholders, `<`/`>` for
/// forced case.
fn format_text(text: &str, pattern: &str) -> String {
    let sections: Vec<&str> = pattern.splitn(2, ';').collect();
    let section = if text.is_empty() {
        sections.get(1).copied().unwrap_or(sections[0])
    } else {
        sections[0]
    };

    if !section.contains('@') && !section.contains('&') {
        return apply_case(text, section);
    }

    let placeholders: Vec<char> = section.chars().filter(|c| matches!(c, '@' | '&')).collect();
    let chars: Vec<char> = text.chars().collect();
    let mut ci = if chars.len() > placeholders.len() { 0 } else { placeholders.len() - chars.len() };
    // Right-align: pad on the left if the placeholder count exceeds text
    // length.
    let pad = placeholders.len().saturating_sub(chars.len());
    let mut di = 0;
    let mut out = String::new();
    for c in section.chars() {
        match c {
            '@' => {
                if ci >= pad && di < chars.len() {
                    out.push(chars[di]);
                    di += 1;
                } else if ci < pad {
                    out.push(' ');
                }
                ci += 1;
            }
            '&' => {
                if di < chars.len() {
                    out.push(chars[di]);
                    di += 1;
                }
                ci += 1;
            }
            '<' => {}
            '>' => {}
            other => out.push(other),
        }
    }
    apply_case(&out, section)
}

fn apply_case(text: &str, section: &str) -> String {
    if section.contains('<') {
        text.to_lowercase()
    } else if section.contains('>') {
        text.to_uppercase()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DefaultLocaleContext;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn ctx() -> DefaultLocaleContext {
        DefaultLocaleContext
    }

    #[test]
    fn grouped_thousands_with_fraction() {
        let v = Value::big_decimal(BigDecimal::from_str("1234.5").unwrap());
        assert_eq!(format_value(&v, Some("#,##0.00"), &ctx()), "1,234.50");
    }

    #[test]
    fn percent_pattern_scales_value() {
        let v = Value::Double(0.25);
        assert_eq!(format_value(&v, Some("0%"), &ctx()), "25%");
    }

    #[test]
    fn leading_zeros_pad_pattern() {
        let v = Value::Long(7);
        assert_eq!(format_value(&v, Some("0000"), &ctx()), "0007");
    }

    #[test]
    fn negative_uses_second_section() {
        let v = Value::Long(-5);
        assert_eq!(format_value(&v, Some("0;(0)"), &ctx()), "(5)");
    }

    #[test]
    fn date_pattern_tokens() {
        let dt = Value::Date(chrono::NaiveDate::from_ymd_opt(2020, 3, 4).unwrap());
        assert_eq!(format_value(&dt, Some("mm/dd/yyyy"), &ctx()), "03/04/2020");
    }

    #[test]
    fn predefined_yes_no() {
        assert_eq!(format_value(&Value::Bool(true), Some("Yes/No"), &ctx()), "Yes");
    }

    #[test]
    fn text_forced_uppercase() {
        assert_eq!(format_value(&Value::String("abc".into()), Some(">"), &ctx()), "ABC");
    }

    #[test]
    fn no_pattern_falls_back_to_plain_rendering() {
        assert_eq!(format_value(&Value::Long(42), None, &ctx()), "42");
    }

    #[test]
    fn trailing_literal_suffix_is_kept() {
        let v = Value::Long(5);
        assert_eq!(format_value(&v, Some("0.00 USD"), &ctx()), "5.00 USD");
    }

    #[test]
    fn predefined_euro() {
        let v = Value::big_decimal(BigDecimal::from_str("1234.5").unwrap());
        assert_eq!(format_value(&v, Some("Euro"), &ctx()), "\u{20ac}1,234.50");
    }
}

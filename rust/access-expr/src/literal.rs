//! Parses the text between a `#...#` pair into a `Date`/`Time`/`DateTime`
//! value. Tried as a fixed list of common Access literal shapes rather than
//! a single locale-parameterized format, since `#...#` literals are meant
//! to be readable independent of the evaluating locale.

use access_core::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d", "%m-%d-%Y"];
const TIME_FORMATS: &[&str] = &["%I:%M:%S %p", "%I:%M %p", "%H:%M:%S", "%H:%M"];

pub fn parse_date_time_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Date + time, separated by whitespace.
    if let Some(space) = text.find(' ') {
        let (date_part, time_part) = text.split_at(space);
        let time_part = time_part.trim();
        if !time_part.is_empty() {
            if let (Some(date), Some(time)) = (parse_date(date_part), parse_time(time_part)) {
                return Some(Value::DateTime(NaiveDateTime::new(date, time)));
            }
        }
    }

    if let Some(date) = parse_date(text) {
        return Some(Value::Date(date));
    }
    if let Some(time) = parse_time(text) {
        return Some(Value::Time(time));
    }
    None
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_date() {
        assert_eq!(
            parse_date_time_literal("12/30/1899"),
            Some(Value::Date(NaiveDate::from_ymd_opt(1899, 12, 30).unwrap()))
        );
    }

    #[test]
    fn parses_plain_time() {
        assert_eq!(
            parse_date_time_literal("3:30 PM"),
            Some(Value::Time(NaiveTime::from_hms_opt(15, 30, 0).unwrap()))
        );
    }

    #[test]
    fn parses_date_and_time() {
        let v = parse_date_time_literal("1/1/2020 12:00:00 AM").unwrap();
        assert_eq!(
            v,
            Value::DateTime(NaiveDateTime::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            ))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date_time_literal("not a date"), None);
    }
}

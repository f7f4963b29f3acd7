//! Tokenizer: turns raw expression text into a finite, non-restartable
//! sequence of `Token`s the parser consumes by index.
//!
//! Character classification is driven by a 128-entry ASCII bit-flag table
//! (`char_flags`), the same shape the teacher's lexer used for its own
//! character-class dispatch, rebuilt here for this language's punctuation
//! set instead of the teacher's.

use crate::error::ParseError;
use access_core::{Value, ValueKind};
use bitflags::bitflags;
use once_cell::sync::Lazy;
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CharFlags: u8 {
        const OP    = 0b0000_0001;
        const COMP  = 0b0000_0010;
        const DELIM = 0b0000_0100;
        const SPACE = 0b0000_1000;
        const QUOTE = 0b0001_0000;
    }
}

static CHAR_TABLE: Lazy<[CharFlags; 128]> = Lazy::new(|| {
    let mut table = [CharFlags::empty(); 128];
    for c in [b'+', b'-', b'*', b'/', b'\\', b'^', b'&'] {
        table[c as usize] = CharFlags::OP;
    }
    for c in [b'=', b'<', b'>'] {
        table[c as usize] = CharFlags::COMP;
    }
    for c in [b'(', b')', b',', b'.', b'!', b'#', b'[', b']'] {
        table[c as usize] = CharFlags::DELIM;
    }
    for c in [b' ', b'\t', b'\r', b'\n'] {
        table[c as usize] = CharFlags::SPACE;
    }
    table[b'"' as usize] = CharFlags::QUOTE;
    table
});

fn char_flags(c: char) -> CharFlags {
    if (c as u32) < 128 {
        CHAR_TABLE[c as usize]
    } else {
        CharFlags::empty()
    }
}

fn breaks_bare_word(c: char, field_validator: bool) -> bool {
    let flags = char_flags(c);
    if flags.intersects(CharFlags::OP | CharFlags::DELIM | CharFlags::SPACE | CharFlags::QUOTE) {
        return true;
    }
    // A bare field-validator expression (no leading operator) still needs
    // comparison characters to break a word, so `Between 10 And 20` and
    // `>5` both tokenize even though `>` isn't in DELIM/OP.
    field_validator && flags.contains(CharFlags::COMP)
}

/// Which grammar a string is being tokenized/parsed as. Affects a small
/// number of lexical shortcuts: a `DefaultValue` expression starting with
/// `=` drops that leading character (Access stores default values with an
/// optional verbatim leading `=` the UI adds), and a bare `FieldValidator`
/// expression may omit its implicit `<thisfield> ` prefix, which changes
/// where bare words stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Expression,
    DefaultValue,
    FieldValidator,
    RecordValidator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Span { start, end, line, col }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line,
            col: self.col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TokenKind {
    /// A bracketed or bare identifier segment (`[Order Date]`, `Forms`).
    ObjName,
    /// A literal that already carries a parsed `Value`.
    Literal,
    /// An operator or comparison character run (`+`, `<=`, `&`).
    Op,
    /// Structural punctuation: `(` `)` `,` `.` `!`.
    Delim,
    /// A bare word that is neither a recognized literal nor an operator —
    /// a keyword (`And`, `Between`), a function name, or an identifier.
    Word,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub value: Option<Value>,
    pub value_type: Option<ValueKind>,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, text: String, span: Span) -> Self {
        Token {
            kind,
            text,
            value: None,
            value_type: None,
            span,
        }
    }

    fn literal(value: Value, text: String, span: Span) -> Self {
        let value_type = Some(value.kind());
        Token {
            kind: TokenKind::Literal,
            text,
            value: Some(value),
            value_type,
            span,
        }
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    field_validator: bool,
}

impl Scanner {
    fn new(src: &str, field_validator: bool) -> Self {
        Scanner {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            field_validator,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn span_from(&self, start_pos: usize, start_line: usize, start_col: usize) -> Span {
        Span::new(start_pos, self.pos, start_line, start_col)
    }
}

/// Tokenize `src` under the grammar implied by `expr_type`. Returns `None`
/// only for an empty (all-whitespace) input; lexical failures are reported
/// as `ParseError`s so the caller gets a span instead of a silent `None`.
pub fn tokenize(src: &str, expr_type: ExprType) -> Result<Option<Vec<Token>>, ParseError> {
    let field_validator = expr_type == ExprType::FieldValidator;
    let body = if expr_type == ExprType::DefaultValue {
        src.strip_prefix('=').unwrap_or(src)
    } else {
        src
    };

    let mut scanner = Scanner::new(body, field_validator);
    let mut tokens = Vec::new();

    while let Some(c) = scanner.peek() {
        let start_pos = scanner.pos;
        let start_line = scanner.line;
        let start_col = scanner.col;

        if char_flags(c).contains(CharFlags::SPACE) {
            scanner.advance();
            continue;
        }

        if char_flags(c).contains(CharFlags::QUOTE) {
            tokens.push(scan_string(&mut scanner)?);
            continue;
        }

        if c == '#' {
            tokens.push(scan_date_literal(&mut scanner)?);
            continue;
        }

        if c == '[' {
            tokens.push(scan_bracketed_name(&mut scanner)?);
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && scanner.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
            tokens.push(scan_number(&mut scanner)?);
            continue;
        }

        if matches!(c, '(' | ')' | ',' | '.' | '!') {
            scanner.advance();
            let span = scanner.span_from(start_pos, start_line, start_col);
            tokens.push(Token::new(TokenKind::Delim, c.to_string(), span));
            continue;
        }

        let flags = char_flags(c);
        if flags.contains(CharFlags::OP) || flags.contains(CharFlags::COMP) {
            tokens.push(scan_operator(&mut scanner));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            tokens.push(scan_word(&mut scanner));
            continue;
        }

        return Err(ParseError::Unexpected {
            found: c.to_string(),
            expected: "an operator, literal, or identifier".to_string(),
            span: Span::new(start_pos, start_pos + 1, start_line, start_col),
        });
    }

    if tokens.is_empty() {
        Ok(None)
    } else {
        Ok(Some(tokens))
    }
}

fn scan_string(scanner: &mut Scanner) -> Result<Token, ParseError> {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    scanner.advance(); // opening quote

    let mut text = String::new();
    loop {
        match scanner.advance() {
            None => {
                return Err(ParseError::UnterminatedString {
                    span: scanner.span_from(start_pos, start_line, start_col),
                })
            }
            Some('"') => {
                // Doubled quote is an escaped literal quote.
                if scanner.peek() == Some('"') {
                    scanner.advance();
                    text.push('"');
                    continue;
                }
                break;
            }
            Some(c) => text.push(c),
        }
    }

    let span = scanner.span_from(start_pos, start_line, start_col);
    let raw = format!("\"{}\"", text.replace('"', "\"\""));
    Ok(Token::literal(Value::String(text), raw, span))
}

fn scan_date_literal(scanner: &mut Scanner) -> Result<Token, ParseError> {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    scanner.advance(); // opening '#'

    let mut text = String::new();
    loop {
        match scanner.advance() {
            None => {
                return Err(ParseError::InvalidDateLiteral {
                    text,
                    span: scanner.span_from(start_pos, start_line, start_col),
                })
            }
            Some('#') => break,
            Some(c) => text.push(c),
        }
    }

    let span = scanner.span_from(start_pos, start_line, start_col);
    let value = crate::literal::parse_date_time_literal(&text).ok_or_else(|| ParseError::InvalidDateLiteral {
        text: text.clone(),
        span,
    })?;
    Ok(Token::literal(value, format!("#{}#", text), span))
}

fn scan_bracketed_name(scanner: &mut Scanner) -> Result<Token, ParseError> {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    scanner.advance(); // opening '['

    let mut text = String::new();
    loop {
        match scanner.advance() {
            None => {
                return Err(ParseError::UnbalancedBracket {
                    span: scanner.span_from(start_pos, start_line, start_col),
                })
            }
            Some(']') => break,
            Some(c) => text.push(c),
        }
    }

    let span = scanner.span_from(start_pos, start_line, start_col);
    Ok(Token::new(TokenKind::ObjName, text, span))
}

fn scan_number(scanner: &mut Scanner) -> Result<Token, ParseError> {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    let mut text = String::new();
    let mut saw_dot = false;
    let mut saw_exp = false;

    while let Some(c) = scanner.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            scanner.advance();
        } else if c == '.' && !saw_dot && !saw_exp {
            saw_dot = true;
            text.push(c);
            scanner.advance();
        } else if (c == 'e' || c == 'E') && !saw_exp {
            let next = scanner.peek_at(1);
            let after_sign = scanner.peek_at(2);
            let looks_like_exp = next.is_some_and(|n| n.is_ascii_digit())
                || (matches!(next, Some('+') | Some('-')) && after_sign.is_some_and(|n| n.is_ascii_digit()));
            if !looks_like_exp {
                break;
            }
            saw_exp = true;
            text.push(c);
            scanner.advance();
            if let Some(sign) = scanner.peek() {
                if sign == '+' || sign == '-' {
                    text.push(sign);
                    scanner.advance();
                }
            }
        } else {
            break;
        }
    }

    let span = scanner.span_from(start_pos, start_line, start_col);
    let value = if !saw_dot && !saw_exp {
        match text.parse::<i32>() {
            Ok(n) => Value::Long(n),
            Err(_) => parse_big_decimal_literal(&text, span)?,
        }
    } else {
        parse_big_decimal_literal(&text, span)?
    };
    Ok(Token::literal(value, text, span))
}

fn parse_big_decimal_literal(text: &str, span: Span) -> Result<Value, ParseError> {
    use std::str::FromStr;
    bigdecimal::BigDecimal::from_str(text)
        .map(Value::big_decimal)
        .map_err(|_| ParseError::InvalidNumberLiteral {
            text: text.to_string(),
            span,
        })
}

fn scan_operator(scanner: &mut Scanner) -> Token {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    let first = scanner.advance().expect("caller checked peek");

    // Two-character comparison operators: <= >= <>
    let text = if matches!(first, '<' | '>') {
        match scanner.peek() {
            Some('=') if first == '<' => {
                scanner.advance();
                "<=".to_string()
            }
            Some('=') if first == '>' => {
                scanner.advance();
                ">=".to_string()
            }
            Some('>') if first == '<' => {
                scanner.advance();
                "<>".to_string()
            }
            _ => first.to_string(),
        }
    } else {
        first.to_string()
    };

    let span = scanner.span_from(start_pos, start_line, start_col);
    Token::new(TokenKind::Op, text, span)
}

fn scan_word(scanner: &mut Scanner) -> Token {
    let start_pos = scanner.pos;
    let start_line = scanner.line;
    let start_col = scanner.col;
    let mut text = String::new();

    while let Some(c) = scanner.peek() {
        if breaks_bare_word(c, scanner.field_validator) {
            break;
        }
        text.push(c);
        scanner.advance();
    }

    let span = scanner.span_from(start_pos, start_line, start_col);
    Token::new(TokenKind::Word, text, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src, ExprType::Expression)
            .unwrap()
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_input_is_none() {
        assert!(tokenize("   ", ExprType::Expression).unwrap().is_none());
    }

    #[test]
    fn simple_arithmetic_round_trips() {
        let tokens = tokenize("2 + 3 * 4", ExprType::Expression).unwrap().unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1].text, "+");
        assert_eq!(tokens[3].text, "*");
    }

    #[test]
    fn comparison_operators_are_two_char_aware() {
        let tokens = tokenize("1 <> 2 AND 3 <= 4", ExprType::Expression).unwrap().unwrap();
        assert_eq!(tokens[1].text, "<>");
        assert_eq!(tokens[5].text, "<=");
    }

    #[test]
    fn default_value_drops_leading_equals() {
        let tokens = tokenize("=5", ExprType::DefaultValue).unwrap().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, Some(Value::Long(5)));
    }

    #[test]
    fn field_validator_comparison_breaks_bare_word() {
        let tokens = tokenize(">=10", ExprType::FieldValidator).unwrap().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Op);
        assert_eq!(tokens[0].text, ">=");
    }

    #[test]
    fn string_literal_handles_escaped_quote() {
        let tokens = tokenize(r#""say ""hi""""#, ExprType::Expression).unwrap().unwrap();
        assert_eq!(tokens[0].value, Some(Value::String("say \"hi\"".to_string())));
    }

    #[test]
    fn bracketed_object_name() {
        let tokens = tokenize("[Order Date]", ExprType::Expression).unwrap().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::ObjName);
        assert_eq!(tokens[0].text, "Order Date");
    }

    #[test]
    fn number_literal_kinds() {
        assert_eq!(kinds("42"), vec![TokenKind::Literal]);
        assert_eq!(kinds("4.5"), vec![TokenKind::Literal]);
    }

    #[test]
    fn big_number_is_bigdec_not_long() {
        let tokens = tokenize("99999999999999999999", ExprType::Expression)
            .unwrap()
            .unwrap();
        assert_eq!(tokens[0].value_type, Some(ValueKind::BigDec));
    }
}

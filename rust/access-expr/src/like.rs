//! Compiles a `Like` pattern (`*` any run, `?` any char, `#` any digit,
//! `[list]`/`[!list]` char class) into a `regex::Regex`.
//!
//! Compilation is total: a malformed pattern (most commonly an unbalanced
//! `[`) compiles to [`CompiledLike::Never`], which matches nothing, rather
//! than failing — `Like` never raises a parse-time or eval-time error over
//! pattern shape.

use regex::{Regex, RegexBuilder};

pub enum CompiledLike {
    Regex(Regex),
    /// A malformed pattern: matches no input.
    Never,
}

impl CompiledLike {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            CompiledLike::Regex(re) => re.is_match(text),
            CompiledLike::Never => false,
        }
    }
}

/// A one-time initializer for a `Like` node's compiled pattern. Compiles on
/// the first call to [`LikeCache::get_or_compile`] and reuses the result on
/// every call after that, regardless of how many times the node is
/// evaluated.
#[derive(Default)]
pub struct LikeCache(once_cell::unsync::OnceCell<CompiledLike>);

impl LikeCache {
    pub fn new() -> Self {
        LikeCache(once_cell::unsync::OnceCell::new())
    }

    pub fn get_or_compile(&self, pattern: &str, case_insensitive: bool) -> &CompiledLike {
        self.0.get_or_init(|| compile(pattern, case_insensitive))
    }
}

impl std::fmt::Debug for LikeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LikeCache")
    }
}

/// The AST node is structurally cloned/compared by its un-evaluated shape
/// (operand, pattern, negation), not by whatever happens to be memoised, so
/// a clone starts with an empty cache and every `LikeCache` compares equal.
impl Clone for LikeCache {
    fn clone(&self) -> Self {
        LikeCache::new()
    }
}

impl PartialEq for LikeCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

pub fn compile(pattern: &str, case_insensitive: bool) -> CompiledLike {
    let Some(body) = translate(pattern) else {
        return CompiledLike::Never;
    };
    let anchored = format!("^{}$", body);
    match RegexBuilder::new(&anchored).case_insensitive(case_insensitive).build() {
        Ok(re) => CompiledLike::Regex(re),
        Err(_) => CompiledLike::Never,
    }
}

fn translate(pattern: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '#' => out.push_str("[0-9]"),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    push_class_char(&mut class, inner);
                }
                if !closed {
                    return None;
                }
                class.push(']');
                out.push_str(&class);
            }
            ']' => return None, // stray close bracket: malformed
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    Some(out)
}

fn push_class_char(class: &mut String, c: char) {
    if matches!(c, '\\' | '^' | ']') {
        class.push('\\');
    }
    class.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        let c = compile("a*b", false);
        assert!(c.is_match("aXYZb"));
        assert!(!c.is_match("aXYZc"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let c = compile("a?c", false);
        assert!(c.is_match("abc"));
        assert!(!c.is_match("abbc"));
    }

    #[test]
    fn hash_matches_one_digit() {
        let c = compile("a#c", false);
        assert!(c.is_match("a5c"));
        assert!(!c.is_match("aXc"));
    }

    #[test]
    fn char_class_and_negation() {
        let c = compile("[abc]", false);
        assert!(c.is_match("b"));
        assert!(!c.is_match("d"));
        let neg = compile("[!abc]", false);
        assert!(neg.is_match("d"));
        assert!(!neg.is_match("a"));
    }

    #[test]
    fn unbalanced_bracket_is_unmatchable() {
        let c = compile("[abc", false);
        assert!(!c.is_match("a"));
        assert!(!c.is_match(""));
        assert!(!c.is_match("[abc"));
    }

    #[test]
    fn case_insensitive_flag() {
        let c = compile("ABC", true);
        assert!(c.is_match("abc"));
    }
}

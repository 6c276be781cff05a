//! Reusable patterns built on the kernel.
//!
//! These are the building blocks language definitions are written with:
//! ASCII character classes, number shapes, line-oriented helpers and the
//! size-tuned keyword matcher [`word_match`].

use ahash::AHashSet;

use crate::matcher::Value;
use crate::pattern::{
    capture, empty, guard, grammar, lit, ranges, rule, set, take, ByteSet, Grammar, Pattern,
};

/// Any single character.
pub fn any() -> Pattern {
    take(1)
}

/// An ASCII letter.
pub fn alpha() -> Pattern {
    ranges(&[(b'A', b'Z'), (b'a', b'z')])
}

/// A decimal digit.
pub fn digit() -> Pattern {
    ranges(&[(b'0', b'9')])
}

/// An ASCII letter or digit.
pub fn alnum() -> Pattern {
    ranges(&[(b'0', b'9'), (b'A', b'Z'), (b'a', b'z')])
}

/// A lowercase ASCII letter.
pub fn lower() -> Pattern {
    ranges(&[(b'a', b'z')])
}

/// An uppercase ASCII letter.
pub fn upper() -> Pattern {
    ranges(&[(b'A', b'Z')])
}

/// A hexadecimal digit.
pub fn xdigit() -> Pattern {
    ranges(&[(b'0', b'9'), (b'A', b'F'), (b'a', b'f')])
}

/// A graphical character (printable, not space).
pub fn graph() -> Pattern {
    ranges(&[(b'!', b'~')])
}

/// A punctuation character.
pub fn punct() -> Pattern {
    ranges(&[(b'!', b'/'), (b':', b'@'), (b'[', b'`'), (b'{', b'~')])
}

/// An ASCII whitespace character (tab, VT, FF, LF, CR or space).
pub fn space() -> Pattern {
    set(" \t\x0b\x0c\n\r")
}

/// An end of line: optional CR followed by LF.
pub fn newline() -> Pattern {
    (lit("\r") ^ -1) * lit("\n")
}

/// Any single character that is not part of an end of line.
pub fn nonnewline() -> Pattern {
    take(1) - set("\r\n")
}

/// A decimal number.
pub fn dec_num() -> Pattern {
    digit() ^ 1
}

/// A hexadecimal number (`0x...`).
pub fn hex_num() -> Pattern {
    lit("0") * set("xX") * (xdigit() ^ 1)
}

/// An octal number (`0[0-7]+`).
pub fn oct_num() -> Pattern {
    lit("0") * (ranges(&[(b'0', b'7')]) ^ 1)
}

/// An optionally signed integer in any base. Hexadecimal is tried first so
/// the `0` prefix does not shadow it, then octal, then decimal.
pub fn integer() -> Pattern {
    (set("+-") ^ -1) * (hex_num() + oct_num() + dec_num())
}

/// An optionally signed floating-point number: at least one digit plus a
/// decimal point or an exponent. `1.` is accepted, but not when followed by
/// another `.` so that interval syntax like `1..2` survives.
pub fn float() -> Pattern {
    let exponent = || set("eE") * (set("+-") ^ -1) * (digit() ^ 1);
    let with_point = (digit() ^ 0) * lit(".") * (digit() ^ 1)
        + (digit() ^ 1) * lit(".") * (digit() ^ 0) * -lit(".");
    (set("+-") ^ -1) * (with_point * (exponent() ^ -1) + (digit() ^ 1) * exponent())
}

/// A float or an integer.
pub fn number() -> Pattern {
    float() + integer()
}

/// An identifier-shaped word: a letter or underscore followed by any number
/// of alphanumerics or underscores.
pub fn word() -> Pattern {
    (alpha() + lit("_")) * ((alnum() + lit("_")) ^ 0)
}

/// Matches `prefix` and then everything up to the end of the line. With
/// `escape`, a backslash keeps the match going, so a `\` before the line
/// break continues onto the next line.
pub fn to_eol(prefix: impl Into<Pattern>, escape: bool) -> Pattern {
    let rest = if escape {
        (nonnewline() - lit("\\")) + lit("\\") * any()
    } else {
        nonnewline()
    };
    prefix.into() * (rest ^ 0)
}

/// Matches a span delimited by `s` and `e` (pass the same string for
/// symmetric delimiters). The end delimiter is consumed when present but the
/// match does not fail without it.
///
/// `single_line` stops the span at a line break. `escapes` lets a backslash
/// protect the next character; when `None`, it defaults to enabled exactly
/// for single-character symmetric delimiters. `balanced` (for distinct
/// delimiters) consumes properly nested `s ... e` pairs.
pub fn range(
    s: &str,
    e: &str,
    single_line: bool,
    escapes: impl Into<Option<bool>>,
    balanced: bool,
) -> Pattern {
    let escapes = escapes
        .into()
        .unwrap_or(s.len() == 1 && e.len() == 1 && s == e);
    let mut body = any() - lit(e);
    if single_line {
        body = body - lit("\n");
    }
    if escapes {
        body = (body - lit("\\")) + lit("\\") * any();
    }
    if balanced && s != e {
        let mut g = Grammar::new("span");
        g.define(
            "span",
            lit(s) * (((body - lit(s)) + rule("span")) ^ 0) * (lit(e) ^ -1),
        );
        grammar(g)
    } else {
        lit(s) * (body ^ 0) * (lit(e) ^ -1)
    }
}

/// Restricts `patt` to match only at the start of a line (or of the input).
/// With `allow_indent`, leading tabs and spaces are permitted before it.
pub fn starts_line(patt: Pattern, allow_indent: bool) -> Pattern {
    guard(empty(), move |text, pos, _| {
        let bytes = text.as_bytes();
        let mut at = pos;
        if allow_indent {
            while at > 0 && matches!(bytes[at - 1], b' ' | b'\t') {
                at -= 1;
            }
        }
        (at == 0 || matches!(bytes[at - 1], b'\n' | b'\r')).then_some(pos)
    }) * patt
}

/// A zero-width predicate on the last non-whitespace character before the
/// current position: succeeds when it is one of `chars`, or at the very
/// start of the input.
pub fn last_char_includes(chars: &str) -> Pattern {
    let wanted = ByteSet::from_chars(chars);
    guard(empty(), move |text, pos, _| {
        if pos == 0 {
            return Some(pos);
        }
        let bytes = text.as_bytes();
        let mut at = pos;
        while at > 0 && matches!(bytes[at - 1], b' ' | b'\t' | b'\r' | b'\n' | b'\x0b' | b'\x0c') {
            at -= 1;
        }
        (at > 0 && wanted.contains(bytes[at - 1])).then_some(pos)
    })
}

/// A set of words accepted by [`word_match`]. Converts from a
/// whitespace-separated string or from any list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordList(pub Vec<String>);

impl From<&str> for WordList {
    fn from(s: &str) -> Self {
        WordList(s.split_whitespace().map(str::to_string).collect())
    }
}

impl From<&[&str]> for WordList {
    fn from(words: &[&str]) -> Self {
        WordList(words.iter().map(|w| (*w).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for WordList {
    fn from(words: [&str; N]) -> Self {
        WordList(words.iter().map(|w| (*w).to_string()).collect())
    }
}

impl From<Vec<String>> for WordList {
    fn from(words: Vec<String>) -> Self {
        WordList(words)
    }
}

/// A whole-word membership test for a set of keywords.
///
/// The characters allowed to continue a word are the alphanumerics, `_`, and
/// every other non-whitespace character appearing in any of the words, so
/// hyphenated keywords like `no-c-format` stay whole. Small case-sensitive
/// sets compile to an ordered choice with a trailing-character lookahead;
/// anything larger consumes a maximal word and checks membership with a
/// match-time guard.
pub fn word_match(words: impl Into<WordList>, case_insensitive: bool) -> Pattern {
    let WordList(words) = words.into();
    if words.is_empty() {
        return crate::pattern::fail();
    }

    let mut word_chars = ByteSet::from_ranges(&[(b'0', b'9'), (b'A', b'Z'), (b'a', b'z')]);
    word_chars.insert(b'_');
    for word in &words {
        for &b in word.as_bytes() {
            if !b.is_ascii_alphanumeric() && !b.is_ascii_whitespace() {
                word_chars.insert(b);
            }
        }
    }

    const MAX_INLINE_WORDS: usize = 6;
    if words.len() <= MAX_INLINE_WORDS && !case_insensitive {
        // Longest first, so a short keyword cannot commit the choice and then
        // trip over the trailing lookahead inside a longer one.
        let mut ordered = words;
        ordered.sort_by(|a, b| b.len().cmp(&a.len()));
        let mut alternatives = ordered.into_iter().map(lit);
        let first = alternatives.next().expect("at least one word");
        let choice = alternatives.fold(first, |acc, alt| acc + alt);
        return choice * -Pattern::Set(word_chars);
    }

    let known: AHashSet<String> = words
        .into_iter()
        .map(|w| {
            if case_insensitive {
                w.to_ascii_lowercase()
            } else {
                w
            }
        })
        .collect();
    guard(
        capture(Pattern::Set(word_chars) ^ 1),
        move |_, end, caps| {
            let Some(candidate) = caps.first().and_then(Value::as_str) else {
                return None;
            };
            let hit = if case_insensitive {
                known.contains(&candidate.to_ascii_lowercase())
            } else {
                known.contains(candidate)
            };
            hit.then_some(end)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_of(patt: &Pattern, text: &str) -> Option<usize> {
        patt.matches(text).map(|m| m.end)
    }

    #[test]
    fn numbers() {
        assert_eq!(end_of(&number(), "42 "), Some(2));
        assert_eq!(end_of(&number(), "0xFF;"), Some(4));
        assert_eq!(end_of(&number(), "0755 "), Some(4));
        assert_eq!(end_of(&number(), "-3.25e-2;"), Some(8));
        assert_eq!(end_of(&number(), "1..2"), Some(1));
        assert_eq!(end_of(&number(), ".5"), Some(2));
        assert_eq!(end_of(&number(), "x"), None);
    }

    #[test]
    fn newline_shapes() {
        assert_eq!(end_of(&newline(), "\n"), Some(1));
        assert_eq!(end_of(&newline(), "\r\n"), Some(2));
        assert_eq!(end_of(&newline(), "\r"), None);
        assert_eq!(end_of(&nonnewline(), "a"), Some(1));
        assert_eq!(end_of(&nonnewline(), "\r"), None);
    }

    #[test]
    fn words() {
        assert_eq!(end_of(&word(), "_private9 "), Some(9));
        assert_eq!(end_of(&word(), "9lives"), None);
    }

    #[test]
    fn to_eol_stops_at_newline() {
        let comment = to_eol(lit("#"), false);
        assert_eq!(end_of(&comment, "# hi\nabc"), Some(4));
    }

    #[test]
    fn to_eol_escape_continues_lines() {
        let comment = to_eol(lit("#"), true);
        assert_eq!(end_of(&comment, "# a\\\nb\nc"), Some(6));
    }
}

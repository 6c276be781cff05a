//! The pattern tree and its combinator constructors.
//!
//! A [`Pattern`] is an immutable description of a parsing expression. Trees
//! are built with the constructor functions below and combined with operators
//! mirroring the PEG algebra:
//!
//! - `a * b` - concatenation (match `a`, then `b`)
//! - `a + b` - ordered choice (try `a`, then `b`; the first match commits)
//! - `a - b` - difference (match `a` only where `b` does not match)
//! - `-a` - negative lookahead (succeed without consuming iff `a` fails)
//! - `a ^ n` - at least `n` repetitions; `a ^ -n` - at most `n`
//!
//! Note that unlike the usual PEG notation, Rust's `^` binds *more loosely*
//! than `*` and `+`, so repetitions must be parenthesized:
//! `lit("0") * (digit() ^ 1)`.
//!
//! # Example
//!
//! ```
//! use lexweave_peg::pattern::{lit, set};
//!
//! let hex = lit("0") * set("xX") * (set("0123456789abcdefABCDEF") ^ 1);
//! assert_eq!(hex.matches("0xFF;").map(|m| m.end), Some(4));
//! assert_eq!(hex.matches("0x"), None);
//! ```

use std::fmt;
use std::ops::{Add, BitXor, Mul, Neg, Sub};
use std::sync::Arc;

use thiserror::Error;

use crate::matcher::Value;
use crate::IndexMap;

/// A set of byte values, the representation of single-character classes.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    pub const EMPTY: Self = ByteSet([0; 4]);

    #[must_use]
    pub fn from_chars(chars: &str) -> Self {
        let mut this = Self::EMPTY;
        for &b in chars.as_bytes() {
            this.insert(b);
        }
        this
    }

    #[must_use]
    pub fn from_ranges(ranges: &[(u8, u8)]) -> Self {
        let mut this = Self::EMPTY;
        for &(lo, hi) in ranges {
            for b in lo..=hi {
                this.insert(b);
            }
        }
        this
    }

    pub fn insert(&mut self, b: u8) {
        self.0[(b >> 6) as usize] |= 1 << (b & 63);
    }

    #[must_use]
    pub fn contains(self, b: u8) -> bool {
        self.0[(b >> 6) as usize] & (1 << (b & 63)) != 0
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let mut out = self;
        for (slot, word) in out.0.iter_mut().zip(other.0) {
            *slot |= word;
        }
        out
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSet(")?;
        for b in 0..=255u8 {
            if self.contains(b) {
                if b.is_ascii_graphic() {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\x{b:02x}")?;
                }
            }
        }
        write!(f, ")")
    }
}

/// The callback type for match-time guards.
///
/// Receives the whole subject, the candidate end position (0-based, the
/// position right after the guarded pattern's match) and the captures the
/// guarded pattern produced. Returning `Some(end)` accepts the match, ending
/// it at `end`; returning `None` rejects it as a local choice failure.
pub type GuardFn = dyn Fn(&str, usize, &[Value]) -> Option<usize> + Send + Sync;

/// A shareable match-time guard, see [`guard`].
#[derive(Clone)]
pub struct Guard(pub(crate) Arc<GuardFn>);

impl Guard {
    pub fn new(f: impl Fn(&str, usize, &[Value]) -> Option<usize> + Send + Sync + 'static) -> Self {
        Guard(Arc::new(f))
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

/// An immutable parsing-expression tree.
///
/// Build these with the constructor functions in this module; execute them
/// with [`Pattern::matches`] or through a [`Grammar`].
#[derive(Clone, Debug)]
pub enum Pattern {
    /// A literal byte string; the empty string matches everywhere.
    Literal(Arc<str>),
    /// Exactly `n` bytes of input, whatever they are.
    Take(usize),
    /// One byte contained in the set.
    Set(ByteSet),
    /// Never matches.
    Fail,
    /// Concatenation.
    Seq(Vec<Pattern>),
    /// Ordered choice; the first matching alternative commits.
    Choice(Vec<Pattern>),
    /// `a - b`: matches `a` only where `b` does not match.
    Diff(Box<Pattern>, Box<Pattern>),
    /// Greedy repetition with a lower and optional upper bound.
    Repeat {
        patt: Box<Pattern>,
        min: u32,
        max: Option<u32>,
    },
    /// Non-consuming lookahead.
    Peek(Box<Pattern>),
    /// Negative lookahead.
    Not(Box<Pattern>),
    /// Captures a constant string value.
    Emit(Arc<str>),
    /// Captures the current position as a byte offset.
    Mark,
    /// Captures the text matched by the inner pattern.
    Capture(Box<Pattern>),
    /// Collects the inner pattern's captures into a single list value.
    Collect(Box<Pattern>),
    /// Runs a guard over the inner pattern's match; the guard's verdict
    /// replaces the match, and the inner captures are dropped.
    Guarded { patt: Box<Pattern>, guard: Guard },
    /// A reference to a named grammar rule, resolved at match time.
    Rule(Arc<str>),
    /// A nested grammar used as a pattern (for local recursion).
    Grammar(Arc<Grammar>),
}

/// A literal string pattern.
pub fn lit(s: impl AsRef<str>) -> Pattern {
    Pattern::Literal(Arc::from(s.as_ref()))
}

/// Matches exactly `n` bytes; `take(1)` is the any-character pattern.
pub fn take(n: usize) -> Pattern {
    Pattern::Take(n)
}

/// Matches one byte out of `chars`.
pub fn set(chars: &str) -> Pattern {
    Pattern::Set(ByteSet::from_chars(chars))
}

/// Matches one byte inside any of the inclusive `ranges`.
pub fn ranges(ranges: &[(u8, u8)]) -> Pattern {
    Pattern::Set(ByteSet::from_ranges(ranges))
}

/// The empty pattern; matches everywhere, consuming nothing.
pub fn empty() -> Pattern {
    Pattern::Literal(Arc::from(""))
}

/// A pattern that never matches.
pub fn fail() -> Pattern {
    Pattern::Fail
}

/// Non-consuming lookahead: succeeds iff `patt` matches here.
pub fn peek(patt: Pattern) -> Pattern {
    Pattern::Peek(Box::new(patt))
}

/// Captures the constant string `value` without consuming input.
pub fn emit(value: impl AsRef<str>) -> Pattern {
    Pattern::Emit(Arc::from(value.as_ref()))
}

/// Captures the current position (byte offset) without consuming input.
pub fn mark() -> Pattern {
    Pattern::Mark
}

/// Captures the text matched by `patt`.
pub fn capture(patt: Pattern) -> Pattern {
    Pattern::Capture(Box::new(patt))
}

/// Collects all captures made inside `patt` into one [`Value::List`].
pub fn collect(patt: Pattern) -> Pattern {
    Pattern::Collect(Box::new(patt))
}

/// A match-time guard over `patt`, see [`GuardFn`].
pub fn guard(
    patt: Pattern,
    f: impl Fn(&str, usize, &[Value]) -> Option<usize> + Send + Sync + 'static,
) -> Pattern {
    Pattern::Guarded {
        patt: Box::new(patt),
        guard: Guard::new(f),
    }
}

/// A by-name reference to a grammar rule.
pub fn rule(name: impl AsRef<str>) -> Pattern {
    Pattern::Rule(Arc::from(name.as_ref()))
}

/// Wraps a grammar so it can be used as a pattern.
pub fn grammar(g: Grammar) -> Pattern {
    Pattern::Grammar(Arc::new(g))
}

impl Pattern {
    /// `self` repeated at least `min` and at most `max` times (greedy).
    pub fn repeat(self, min: u32, max: Option<u32>) -> Pattern {
        Pattern::Repeat {
            patt: Box::new(self),
            min,
            max,
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        lit(s)
    }
}

impl Mul for Pattern {
    type Output = Pattern;

    fn mul(self, rhs: Pattern) -> Pattern {
        match (self, rhs) {
            (Pattern::Seq(mut a), Pattern::Seq(b)) => {
                a.extend(b);
                Pattern::Seq(a)
            }
            (Pattern::Seq(mut a), b) => {
                a.push(b);
                Pattern::Seq(a)
            }
            (a, Pattern::Seq(mut b)) => {
                b.insert(0, a);
                Pattern::Seq(b)
            }
            (a, b) => Pattern::Seq(vec![a, b]),
        }
    }
}

impl Add for Pattern {
    type Output = Pattern;

    fn add(self, rhs: Pattern) -> Pattern {
        match (self, rhs) {
            (Pattern::Choice(mut a), Pattern::Choice(b)) => {
                a.extend(b);
                Pattern::Choice(a)
            }
            (Pattern::Choice(mut a), b) => {
                a.push(b);
                Pattern::Choice(a)
            }
            (a, Pattern::Choice(mut b)) => {
                b.insert(0, a);
                Pattern::Choice(b)
            }
            (a, b) => Pattern::Choice(vec![a, b]),
        }
    }
}

impl Sub for Pattern {
    type Output = Pattern;

    fn sub(self, rhs: Pattern) -> Pattern {
        Pattern::Diff(Box::new(self), Box::new(rhs))
    }
}

impl Neg for Pattern {
    type Output = Pattern;

    fn neg(self) -> Pattern {
        Pattern::Not(Box::new(self))
    }
}

impl BitXor<i32> for Pattern {
    type Output = Pattern;

    /// `p ^ n` matches at least `n` repetitions of `p`; `p ^ -n` at most `n`.
    fn bitxor(self, n: i32) -> Pattern {
        if n < 0 {
            self.repeat(0, Some(n.unsigned_abs()))
        } else {
            self.repeat(n as u32, None)
        }
    }
}

macro_rules! str_operand {
    ($trait:ident, $method:ident) => {
        impl $trait<&str> for Pattern {
            type Output = Pattern;

            fn $method(self, rhs: &str) -> Pattern {
                self.$method(lit(rhs))
            }
        }

        impl $trait<Pattern> for &str {
            type Output = Pattern;

            fn $method(self, rhs: Pattern) -> Pattern {
                lit(self).$method(rhs)
            }
        }
    };
}

str_operand!(Mul, mul);
str_operand!(Add, add);
str_operand!(Sub, sub);

/// A set of named rules with a designated start rule.
///
/// Rule references ([`rule`]) are resolved against the innermost enclosing
/// grammar first, then outward, at match time. [`Grammar::validate`] checks
/// that every reference resolves before a grammar is put to work.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    rules: IndexMap<String, Pattern>,
    start: String,
}

/// A structural problem detected by [`Grammar::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{referenced}` is referenced from `{from}` but never defined")]
    UnknownRule { referenced: String, from: String },

    #[error("start rule `{0}` is not defined")]
    UnknownStart(String),
}

impl Grammar {
    #[must_use]
    pub fn new(start: impl Into<String>) -> Self {
        Grammar {
            rules: IndexMap::default(),
            start: start.into(),
        }
    }

    /// Defines (or redefines) a named rule.
    pub fn define(&mut self, name: impl Into<String>, patt: Pattern) {
        self.rules.insert(name.into(), patt);
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Pattern> {
        self.rules.get(name)
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn set_start(&mut self, start: impl Into<String>) {
        self.start = start.into();
    }

    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.keys().map(String::as_str)
    }

    /// Checks that the start rule exists and that every rule reference in the
    /// grammar (including nested grammars) resolves.
    pub fn validate(&self) -> Result<(), GrammarError> {
        if !self.rules.contains_key(&self.start) {
            return Err(GrammarError::UnknownStart(self.start.clone()));
        }
        let scope = vec![self];
        for (name, patt) in &self.rules {
            validate_pattern(patt, name, &scope)?;
        }
        Ok(())
    }
}

fn validate_pattern<'g>(
    patt: &'g Pattern,
    from: &str,
    scope: &[&'g Grammar],
) -> Result<(), GrammarError> {
    match patt {
        Pattern::Rule(name) => {
            if scope.iter().rev().any(|g| g.has_rule(name)) {
                Ok(())
            } else {
                Err(GrammarError::UnknownRule {
                    referenced: name.to_string(),
                    from: from.to_string(),
                })
            }
        }
        Pattern::Grammar(g) => {
            let mut inner = scope.to_vec();
            inner.push(g);
            if !g.rules.contains_key(&g.start) {
                return Err(GrammarError::UnknownStart(g.start.clone()));
            }
            for (name, patt) in &g.rules {
                validate_pattern(patt, name, &inner)?;
            }
            Ok(())
        }
        Pattern::Seq(items) | Pattern::Choice(items) => {
            for item in items {
                validate_pattern(item, from, scope)?;
            }
            Ok(())
        }
        Pattern::Diff(a, b) => {
            validate_pattern(a, from, scope)?;
            validate_pattern(b, from, scope)
        }
        Pattern::Repeat { patt, .. }
        | Pattern::Peek(patt)
        | Pattern::Not(patt)
        | Pattern::Capture(patt)
        | Pattern::Collect(patt)
        | Pattern::Guarded { patt, .. } => validate_pattern(patt, from, scope),
        Pattern::Literal(_)
        | Pattern::Take(_)
        | Pattern::Set(_)
        | Pattern::Fail
        | Pattern::Emit(_)
        | Pattern::Mark => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_flatten() {
        let p = lit("a") * lit("b") * lit("c");
        assert!(matches!(p, Pattern::Seq(ref items) if items.len() == 3));
        let p = lit("a") + lit("b") + lit("c");
        assert!(matches!(p, Pattern::Choice(ref items) if items.len() == 3));
    }

    #[test]
    fn byte_set_ranges() {
        let s = ByteSet::from_ranges(&[(b'a', b'z'), (b'0', b'9')]);
        assert!(s.contains(b'q'));
        assert!(s.contains(b'5'));
        assert!(!s.contains(b'A'));
        assert!(!s.contains(b'_'));
    }

    #[test]
    fn validate_catches_unknown_rule() {
        let mut g = Grammar::new("top");
        g.define("top", rule("missing"));
        assert_eq!(
            g.validate(),
            Err(GrammarError::UnknownRule {
                referenced: "missing".into(),
                from: "top".into()
            })
        );
    }

    #[test]
    fn validate_catches_unknown_start() {
        let g = Grammar::new("top");
        assert_eq!(g.validate(), Err(GrammarError::UnknownStart("top".into())));
    }

    #[test]
    fn validate_sees_nested_grammar_scopes() {
        let mut inner = Grammar::new("item");
        inner.define("item", lit("x") * (rule("item") ^ -1));
        let mut g = Grammar::new("top");
        g.define("top", grammar(inner));
        assert_eq!(g.validate(), Ok(()));
    }
}

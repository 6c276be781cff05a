//! Pattern execution.
//!
//! Matching follows ordered-choice PEG semantics: a choice commits to its
//! first matching alternative, repetitions are greedy and never give back
//! input, and there is no backtracking across committed alternatives.
//! Strings compare byte-wise; all positions are byte offsets.

use std::sync::Arc;

use crate::pattern::{Grammar, Pattern};

/// A single captured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A constant or substring capture.
    Str(Arc<str>),
    /// A position capture (byte offset).
    Pos(usize),
    /// The captures collected by [`crate::pattern::collect`].
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pos(&self) -> Option<usize> {
        match self {
            Value::Pos(p) => Some(*p),
            _ => None,
        }
    }
}

/// The outcome of a successful match: the end offset (exclusive) and the
/// captures, in the order they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub end: usize,
    pub captures: Vec<Value>,
}

impl Pattern {
    /// Matches this pattern at the start of `text`.
    ///
    /// Rule references cannot be resolved outside a grammar and fail.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<Match> {
        self.match_at(text, 0)
    }

    /// Matches this pattern at byte offset `at` of `text`.
    #[must_use]
    pub fn match_at(&self, text: &str, at: usize) -> Option<Match> {
        let mut captures = Vec::new();
        let mut scopes = Vec::new();
        let end = match_pattern(text, self, at, &mut captures, &mut scopes)?;
        Some(Match { end, captures })
    }
}

impl Grammar {
    /// Matches the grammar's start rule at the beginning of `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<Match> {
        self.matches_from(text, self.start())
    }

    /// Matches the named rule at the beginning of `text`.
    ///
    /// Returns `None` for unknown rule names; [`Grammar::validate`] reports
    /// those ahead of time.
    #[must_use]
    pub fn matches_from(&self, text: &str, start: &str) -> Option<Match> {
        let patt = self.rule(start)?;
        let mut captures = Vec::new();
        let mut scopes = vec![self];
        let end = match_pattern(text, patt, 0, &mut captures, &mut scopes)?;
        Some(Match { end, captures })
    }

    /// Matches the named rule wrapped in a table capture, so the result is a
    /// single [`Value::List`] holding the rule's captures in order.
    #[must_use]
    pub fn matches_table(&self, text: &str, start: &str) -> Option<Vec<Value>> {
        if !self.has_rule(start) {
            return None;
        }
        let wrapped = crate::pattern::collect(crate::pattern::rule(start));
        let mut captures = Vec::new();
        let mut scopes = vec![self];
        match_pattern(text, &wrapped, 0, &mut captures, &mut scopes)?;
        match captures.pop() {
            Some(Value::List(items)) => Some(items),
            _ => Some(Vec::new()),
        }
    }
}

fn match_pattern<'a>(
    text: &str,
    patt: &'a Pattern,
    pos: usize,
    caps: &mut Vec<Value>,
    scopes: &mut Vec<&'a Grammar>,
) -> Option<usize> {
    let bytes = text.as_bytes();
    match patt {
        Pattern::Literal(s) => bytes[pos..]
            .starts_with(s.as_bytes())
            .then(|| pos + s.len()),
        Pattern::Take(n) => (pos + n <= bytes.len()).then(|| pos + n),
        Pattern::Set(set) => (pos < bytes.len() && set.contains(bytes[pos])).then(|| pos + 1),
        Pattern::Fail => None,
        Pattern::Seq(items) => {
            let mut at = pos;
            for item in items {
                at = match_pattern(text, item, at, caps, scopes)?;
            }
            Some(at)
        }
        Pattern::Choice(items) => {
            for item in items {
                let snap = caps.len();
                if let Some(end) = match_pattern(text, item, pos, caps, scopes) {
                    return Some(end);
                }
                caps.truncate(snap);
            }
            None
        }
        Pattern::Diff(a, b) => {
            let snap = caps.len();
            if match_pattern(text, b, pos, caps, scopes).is_some() {
                caps.truncate(snap);
                return None;
            }
            caps.truncate(snap);
            match_pattern(text, a, pos, caps, scopes)
        }
        Pattern::Repeat { patt, min, max } => {
            let mut at = pos;
            let mut count: u32 = 0;
            loop {
                if let Some(limit) = max {
                    if count >= *limit {
                        break;
                    }
                }
                let snap = caps.len();
                match match_pattern(text, patt, at, caps, scopes) {
                    Some(next) if next > at => {
                        at = next;
                        count += 1;
                    }
                    Some(_) => {
                        // A zero-width iteration would loop forever; treat it
                        // as satisfying any remaining required repetitions.
                        count = count.max(*min);
                        break;
                    }
                    None => {
                        caps.truncate(snap);
                        break;
                    }
                }
            }
            (count >= *min).then_some(at)
        }
        Pattern::Peek(patt) => {
            let snap = caps.len();
            let matched = match_pattern(text, patt, pos, caps, scopes).is_some();
            caps.truncate(snap);
            matched.then_some(pos)
        }
        Pattern::Not(patt) => {
            let snap = caps.len();
            let matched = match_pattern(text, patt, pos, caps, scopes).is_some();
            caps.truncate(snap);
            (!matched).then_some(pos)
        }
        Pattern::Emit(value) => {
            caps.push(Value::Str(Arc::clone(value)));
            Some(pos)
        }
        Pattern::Mark => {
            caps.push(Value::Pos(pos));
            Some(pos)
        }
        Pattern::Capture(patt) => {
            let snap = caps.len();
            let end = match_pattern(text, patt, pos, caps, scopes)?;
            let matched = String::from_utf8_lossy(&bytes[pos..end]).into_owned();
            caps.insert(snap, Value::Str(Arc::from(matched.as_str())));
            Some(end)
        }
        Pattern::Collect(patt) => {
            let snap = caps.len();
            let end = match_pattern(text, patt, pos, caps, scopes)?;
            let items = caps.split_off(snap);
            caps.push(Value::List(items));
            Some(end)
        }
        Pattern::Guarded { patt, guard } => {
            let snap = caps.len();
            let end = match_pattern(text, patt, pos, caps, scopes)?;
            let verdict = (guard.0)(text, end, &caps[snap..]);
            caps.truncate(snap);
            verdict.filter(|&e| e <= bytes.len())
        }
        Pattern::Rule(name) => {
            let resolved = scopes.iter().rev().find_map(|g| g.rule(name));
            match resolved {
                Some(patt) => match_pattern(text, patt, pos, caps, scopes),
                None => {
                    // Validation catches this for grammars; a bare pattern
                    // with a dangling reference just fails to match.
                    tracing::error!(rule = %name, "unresolved rule reference");
                    None
                }
            }
        }
        Pattern::Grammar(g) => {
            scopes.push(g);
            let result = g
                .rule(g.start())
                .and_then(|patt| match_pattern(text, patt, pos, caps, scopes));
            scopes.pop();
            result
        }
    }
}

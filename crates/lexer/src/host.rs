//! The host interface.
//!
//! During a [`crate::Registry::fold`] call the framework consults read-only
//! views the host owns: the per-position style map filled in from earlier
//! `lex` results, previously computed fold levels, indentation amounts and
//! string configuration properties. All positions and line numbers on this
//! boundary are one-based, matching the tagger's output positions.

use crate::tags;
use crate::{HashMap, TagName};

/// Read-only views and configuration supplied by the host.
pub trait Host {
    /// The tag name at the given one-based byte position.
    fn style_at(&self, pos: usize) -> &str;

    /// The previously computed, encoded fold level of a one-based line, if
    /// the host has one.
    fn fold_level(&self, line: usize) -> Option<i32>;

    /// The indentation column count of a one-based line, if the host has
    /// one.
    fn indent_amount(&self, line: usize) -> Option<usize>;

    /// Arbitrary per-line integer state, reserved for lexers that need to
    /// carry state across lines through match-time guards.
    fn line_state(&self, _line: usize) -> i64 {
        0
    }

    /// A configuration property; unset properties read as empty.
    fn property(&self, name: &str) -> &str;

    /// A configuration property as an integer, defaulting to 0.
    fn property_int(&self, name: &str) -> i64 {
        self.property(name).trim().parse().unwrap_or(0)
    }
}

/// A map-backed [`Host`] for tests and simple embeddings.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    styles: Vec<TagName>,
    fold_levels: HashMap<usize, i32>,
    indents: HashMap<usize, usize>,
    line_states: HashMap<usize, i64>,
    properties: HashMap<String, String>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property assignment.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn set_fold_level(&mut self, line: usize, level: i32) {
        self.fold_levels.insert(line, level);
    }

    pub fn set_indent(&mut self, line: usize, columns: usize) {
        self.indents.insert(line, columns);
    }

    pub fn set_line_state(&mut self, line: usize, state: i64) {
        self.line_states.insert(line, state);
    }

    /// Fills the style map from tagger output: each `(tag, end)` span
    /// styles the positions up to (excluding) its one-based end.
    pub fn style_text(&mut self, spans: &[(TagName, usize)]) {
        self.styles.clear();
        let mut pos = 1;
        for (tag, end) in spans {
            while pos < *end {
                self.styles.push(TagName::clone(tag));
                pos += 1;
            }
        }
    }
}

impl Host for MemoryHost {
    fn style_at(&self, pos: usize) -> &str {
        pos.checked_sub(1)
            .and_then(|index| self.styles.get(index))
            .map_or(tags::DEFAULT, |tag| tag.as_ref())
    }

    fn fold_level(&self, line: usize) -> Option<i32> {
        self.fold_levels.get(&line).copied()
    }

    fn indent_amount(&self, line: usize) -> Option<usize> {
        self.indents.get(&line).copied()
    }

    fn line_state(&self, line: usize) -> i64 {
        self.line_states.get(&line).copied().unwrap_or(0)
    }

    fn property(&self, name: &str) -> &str {
        self.properties.get(name).map_or("", String::as_str)
    }
}

//! Per-line fold-level computation.
//!
//! The folder consumes the same text chunk the tagger saw plus the host's
//! per-position style map and produces one encoded level per line:
//! `FOLD_BASE + depth`, OR-combined with [`FOLD_HEADER`] on lines that open
//! a fold and [`FOLD_BLANK`] on blank lines.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::host::Host;
use crate::lexer::{Lexer, Registry};

/// The base of every encoded fold level.
pub const FOLD_BASE: i32 = 0x400;
/// Flag marking a blank line.
pub const FOLD_BLANK: i32 = 0x1000;
/// Flag marking a line that opens a fold.
pub const FOLD_HEADER: i32 = 0x2000;

const LEVEL_MASK: i32 = 0xFFF;

fn strip_flags(level: i32) -> i32 {
    level & LEVEL_MASK
}

/// Everything a fold predicate gets to look at when deciding the level
/// delta contributed by a symbol occurrence.
///
/// `line_pos` is the 0-based byte offset of the line within `text`, `col`
/// the 0-based byte column of the symbol within `line` (which carries no
/// line terminator). The host is included so predicates can read
/// configuration without global state.
pub struct FoldInput<'a> {
    pub text: &'a str,
    pub line_pos: usize,
    pub line: &'a str,
    pub col: usize,
    pub symbol: &'a str,
    pub host: &'a dyn Host,
}

/// A dynamic fold point: returns `+1`, `-1` or `0` per symbol occurrence.
pub type FoldPredicate = Arc<dyn Fn(&FoldInput<'_>) -> i32 + Send + Sync>;

/// What a fold-point symbol does, as stored in a lexer's fold-point table.
#[derive(Clone)]
pub(crate) enum FoldAction {
    Delta(i32),
    Dynamic(FoldPredicate),
}

impl std::fmt::Debug for FoldAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FoldAction::Delta(d) => f.debug_tuple("Delta").field(d).finish(),
            FoldAction::Dynamic(_) => f.debug_struct("Dynamic").finish_non_exhaustive(),
        }
    }
}

/// The second argument to [`Registry::add_fold_point`]: either the closing
/// symbol paired with the opening one, or a predicate attached to the
/// opening symbol alone.
pub enum FoldSpec {
    Symbol(String),
    Predicate(FoldPredicate),
}

impl FoldSpec {
    /// Wraps a closure as a dynamic fold point.
    pub fn predicate(f: impl Fn(&FoldInput<'_>) -> i32 + Send + Sync + 'static) -> Self {
        FoldSpec::Predicate(Arc::new(f))
    }
}

impl From<&str> for FoldSpec {
    fn from(symbol: &str) -> Self {
        FoldSpec::Symbol(symbol.to_string())
    }
}

/// A predicate for folding runs of consecutive lines that share a leading
/// `prefix` (line comments, typically): `+1` on the first line of a run,
/// `-1` on the last, `0` elsewhere. Gated by the
/// `fold.lexweave.line.groups` property.
pub fn fold_consecutive_lines(prefix: impl Into<String>) -> FoldSpec {
    let prefix = prefix.into();
    FoldSpec::Predicate(Arc::new(move |input: &FoldInput<'_>| {
        if input.host.property_int("fold.lexweave.line.groups") == 0 {
            return 0;
        }
        // Only the first non-blank content of a line can group it.
        if input.line[..input.col]
            .bytes()
            .any(|b| b != b' ' && b != b'\t')
        {
            return 0;
        }
        let starts = |l: &str| l.trim_start_matches([' ', '\t']).starts_with(prefix.as_str());
        let prev = previous_line(input.text, input.line_pos).map_or(false, starts);
        let next = following_line(input.text, input.line_pos, input.line.len()).map_or(false, starts);
        match (prev, next) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        }
    }))
}

fn previous_line(text: &str, line_pos: usize) -> Option<&str> {
    if line_pos == 0 {
        return None;
    }
    // line_pos is right after the previous line's `\n`.
    let mut end = line_pos - 1;
    if end > 0 && text.as_bytes()[end - 1] == b'\r' {
        end -= 1;
    }
    let start = text[..end].rfind('\n').map_or(0, |i| i + 1);
    Some(&text[start..end])
}

fn following_line(text: &str, line_pos: usize, line_len: usize) -> Option<&str> {
    let mut at = line_pos + line_len;
    let bytes = text.as_bytes();
    if at < bytes.len() && bytes[at] == b'\r' {
        at += 1;
    }
    if at < bytes.len() && bytes[at] == b'\n' {
        at += 1;
    } else {
        return None;
    }
    let end = text[at..].find(['\r', '\n']).map_or(text.len(), |i| at + i);
    Some(&text[at..end])
}

/// Splits `text` into `(start offset, content)` lines; contents carry no
/// line terminators, and a trailing newline produces a final empty line.
pub(crate) fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            let mut end = i;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            out.push((start, &text[start..end]));
            start = i + 1;
        }
    }
    out.push((start, &text[start..]));
    out
}

fn find_sub(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from + needle.len() > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Registry {
    /// Computes fold levels for `text`, which starts at one-based byte
    /// position `start_pos` and one-based line `start_line`, with
    /// `start_level` the encoded level carried in from the preceding line.
    ///
    /// Returns a map from line number to encoded level. With folding
    /// disabled (the `fold` property), every line reports `start_level`.
    #[tracing::instrument(skip(self, host, text), level = "trace", fields(len = text.len()))]
    pub fn fold(
        &self,
        lexer: Lexer,
        host: &dyn Host,
        text: &str,
        start_pos: usize,
        start_line: usize,
        start_level: i32,
    ) -> Result<BTreeMap<usize, i32>> {
        let root = self.effective_root(lexer)?;
        let data = self.data(root)?;
        let mut folds = BTreeMap::new();
        if text.is_empty() {
            return Ok(folds);
        }
        let lines = lines_with_offsets(text);
        let start_level = strip_flags(start_level);
        let fold_on = host.property_int("fold") != 0;
        let by_indentation = data.fold_by_indentation
            || host.property_int("fold.lexweave.by.indentation") != 0;

        if fold_on && by_indentation {
            self.fold_by_indentation(host, &lines, start_line, start_level, &mut folds);
        } else if fold_on && !data.fold_points.is_empty() {
            self.fold_by_symbols(
                root, host, text, &lines, start_pos, start_line, start_level, &mut folds,
            );
        } else {
            for idx in 0..lines.len() {
                folds.insert(start_line + idx, start_level);
            }
        }
        Ok(folds)
    }

    #[allow(clippy::too_many_arguments)]
    fn fold_by_symbols(
        &self,
        root: Lexer,
        host: &dyn Host,
        text: &str,
        lines: &[(usize, &str)],
        start_pos: usize,
        start_line: usize,
        start_level: i32,
        folds: &mut BTreeMap<usize, i32>,
    ) {
        let data = &self.lexers[root];
        let compact = host.property_int("fold.lexweave.compact") != 0;
        let zero_sum = host.property_int("fold.lexweave.on.zero.sum.lines") != 0;
        let case_insensitive = data.case_insensitive_fold_points;

        let mut prev_level = start_level;
        let mut current_level = prev_level;
        for (idx, &(line_pos, line)) in lines.iter().enumerate() {
            let line_num = start_line + idx;
            if line.is_empty() {
                folds.insert(line_num, prev_level + if compact { FOLD_BLANK } else { 0 });
                continue;
            }

            let search: Cow<'_, str> = if case_insensitive {
                Cow::Owned(line.to_ascii_lowercase())
            } else {
                Cow::Borrowed(line)
            };
            let mut consumed: Vec<(usize, usize)> = Vec::new();
            let mut hits: Vec<(usize, i32)> = Vec::new();
            for symbol in &data.fold_symbols {
                let needle = symbol.as_bytes();
                let is_word = needle.iter().all(|&b| is_word_byte(b));
                let mut from = 0;
                while let Some(col) = find_sub(search.as_bytes(), needle, from) {
                    let end = col + needle.len();
                    from = col + 1;
                    if consumed.iter().any(|&(s, e)| col < e && s < end) {
                        continue;
                    }
                    consumed.push((col, end));
                    if is_word {
                        let bytes = line.as_bytes();
                        let bounded = (col == 0 || !is_word_byte(bytes[col - 1]))
                            && (end >= bytes.len() || !is_word_byte(bytes[end]));
                        if !bounded {
                            continue;
                        }
                    }
                    let tag = host.style_at(start_pos + line_pos + col);
                    let Some(action) = data
                        .fold_points
                        .get(tag)
                        .and_then(|symbols| symbols.get(symbol.as_str()))
                    else {
                        continue;
                    };
                    let delta = match action {
                        FoldAction::Delta(delta) => *delta,
                        FoldAction::Dynamic(predicate) => predicate(&FoldInput {
                            text,
                            line_pos,
                            line,
                            col,
                            symbol,
                            host,
                        }),
                    };
                    if delta != 0 {
                        hits.push((col, delta));
                    }
                }
            }
            // Symbols were gathered per fold point; the level walks the line
            // in column order so a close-before-open line registers its dip.
            hits.sort_unstable_by_key(|&(col, _)| col);
            let mut level_decreased = false;
            for &(_, delta) in &hits {
                current_level += delta;
                if current_level < prev_level {
                    level_decreased = true;
                }
            }

            folds.insert(line_num, prev_level);
            if current_level > prev_level {
                folds.insert(line_num, prev_level | FOLD_HEADER);
            } else if level_decreased && current_level == prev_level && zero_sum {
                // A line like `} else {`: closes the previous block and opens
                // a new one at the same depth, so it is itself a header one
                // level up.
                let base = if idx > 0 {
                    prev_level
                } else {
                    host.fold_level(line_num.saturating_sub(1))
                        .map_or(start_level, strip_flags)
                };
                folds.insert(line_num, (base - 1).max(FOLD_BASE) | FOLD_HEADER);
            }
            if current_level < FOLD_BASE {
                current_level = FOLD_BASE;
            }
            prev_level = current_level;
        }
    }

    fn fold_by_indentation(
        &self,
        host: &dyn Host,
        lines: &[(usize, &str)],
        start_line: usize,
        start_level: i32,
        folds: &mut BTreeMap<usize, i32>,
    ) {
        let indents: Vec<Option<usize>> = lines
            .iter()
            .map(|&(_, line)| {
                let content = line.trim_start_matches([' ', '\t']);
                if content.is_empty() {
                    None
                } else {
                    Some(line.len() - content.len())
                }
            })
            .collect();

        let mut current_level = start_level;
        // Reconcile with the nearest non-blank line before the chunk: if the
        // incoming indentation is deeper, that line becomes a header.
        if let Some(first_indent) = indents.first().copied().flatten() {
            for line in (1..start_line).rev() {
                let Some(stored) = host.fold_level(line) else {
                    break;
                };
                if stored & FOLD_BLANK != 0 {
                    continue;
                }
                let level = strip_flags(stored);
                let indent = host
                    .indent_amount(line)
                    .unwrap_or_else(|| (level - FOLD_BASE).max(0) as usize);
                if first_indent > indent {
                    folds.insert(line, (FOLD_BASE + indent as i32) | FOLD_HEADER);
                    current_level = FOLD_BASE + first_indent as i32;
                } else {
                    current_level = level;
                }
                break;
            }
        }

        for (idx, indent) in indents.iter().enumerate() {
            let line_num = start_line + idx;
            match indent {
                Some(indent) => {
                    current_level = FOLD_BASE + *indent as i32;
                    let next = indents[idx + 1..].iter().copied().flatten().next();
                    let level = match next {
                        Some(next) if FOLD_BASE + next as i32 > current_level => {
                            current_level | FOLD_HEADER
                        }
                        _ => current_level,
                    };
                    folds.insert(line_num, level);
                }
                None => {
                    folds.insert(line_num, current_level + FOLD_BLANK);
                }
            }
        }
    }
}

//! Running compiled grammars over text: the tagging entry point.

use lexweave_peg::{Grammar, Value};

use crate::error::Result;
use crate::lexer::{Lexer, Registry};
use crate::tags;
use crate::TagName;

impl Registry {
    /// Tags `text`, returning `(tag, end)` spans in order.
    ///
    /// Ends are one-based and exclusive: a span's end is the position of the
    /// character right after it, and the last span ends at `text.len() + 1`.
    /// Every byte is covered; bytes no rule matches are consumed one at a
    /// time by the `default` fallback. `init_style` is the style number in
    /// effect where the chunk starts: when it maps to a `whitespace.<lang>`
    /// tag of an embedded language, lexing resumes inside that language.
    #[tracing::instrument(skip(self, text), level = "trace", fields(len = text.len()))]
    pub fn lex(
        &mut self,
        lexer: Lexer,
        text: &str,
        init_style: usize,
    ) -> Result<Vec<(TagName, usize)>> {
        let root = self.effective_root(lexer)?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        {
            let data = self.data(root)?;
            if data.rules.is_empty() && data.children.is_empty() {
                return Ok(vec![(TagName::from(tags::DEFAULT), text.len() + 1)]);
            }
        }
        let grammar = self.ensure_compiled(root)?;
        let start = self.initial_rule(lexer, root, &grammar, init_style);
        let spans = if self.lexers[root].lex_by_line {
            lex_lines(&grammar, &start, text)
        } else {
            lex_chunk(&grammar, &start, text)
        };
        Ok(spans)
    }

    /// Picks the grammar rule lexing starts from.
    ///
    /// The default is the lexer's own name, or its parent's when it proxies
    /// for (or embedded itself into) another language. When the grammar has
    /// embedded languages and `init_style` is one of their `whitespace.*`
    /// styles, lexing resumes in that language instead.
    fn initial_rule(
        &self,
        lexer: Lexer,
        root: Lexer,
        grammar: &Grammar,
        init_style: usize,
    ) -> String {
        let called = &self.lexers[lexer];
        let root_data = &self.lexers[root];
        if !root_data.children.is_empty() {
            let tag = root_data
                .tags
                .iter()
                .find_map(|(tag, &style)| (style == init_style).then_some(tag));
            if let Some(lang) = tag.and_then(|t| t.strip_prefix("whitespace.")) {
                if grammar.has_rule(lang) {
                    return lang.to_string();
                }
                // The style belongs to a proxy's old identity; its parent is
                // the lexer that effectively runs.
                if lang == called.name {
                    return root_data.name.clone();
                }
            }
        }
        called
            .parent_name
            .clone()
            .unwrap_or_else(|| called.name.clone())
    }
}

fn lex_chunk(grammar: &Grammar, start: &str, text: &str) -> Vec<(TagName, usize)> {
    let mut spans = Vec::new();
    if let Some(captures) = grammar.matches_table(text, start) {
        append_spans(&mut spans, captures, 0);
    }
    close_over(&mut spans, text.len() + 1);
    spans
}

/// Line mode: reapply the grammar to every line and stitch the results,
/// offsetting positions by the bytes of preceding lines.
fn lex_lines(grammar: &Grammar, start: &str, text: &str) -> Vec<(TagName, usize)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(captures) = grammar.matches_table(line, start) {
            append_spans(&mut spans, captures, offset);
        }
        offset += line.len();
        close_over(&mut spans, offset + 1);
    }
    spans
}

/// Converts kernel captures (alternating tag and 0-based end offset) into
/// host spans, dropping anything out of order.
fn append_spans(spans: &mut Vec<(TagName, usize)>, captures: Vec<Value>, offset: usize) {
    let mut tag: Option<TagName> = None;
    for value in captures {
        match value {
            Value::Str(name) => tag = Some(name),
            Value::Pos(end) => {
                if let Some(tag) = tag.take() {
                    let end = offset + end + 1;
                    if spans.last().map_or(true, |&(_, last)| end > last) {
                        spans.push((tag, end));
                    }
                }
            }
            Value::List(_) => {}
        }
    }
}

/// Guarantees coverage up to `end` with a synthetic default span.
fn close_over(spans: &mut Vec<(TagName, usize)>, end: usize) {
    if spans.last().map_or(true, |&(_, last)| last < end) {
        spans.push((TagName::from(tags::DEFAULT), end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_spans_drops_non_monotonic_positions() {
        let mut spans = Vec::new();
        append_spans(
            &mut spans,
            vec![
                Value::Str("a".into()),
                Value::Pos(2),
                Value::Str("b".into()),
                Value::Pos(2),
                Value::Str("c".into()),
                Value::Pos(5),
            ],
            0,
        );
        let tags: Vec<&str> = spans.iter().map(|(t, _)| t.as_ref()).collect();
        assert_eq!(tags, ["a", "c"]);
    }

    #[test]
    fn close_over_appends_only_when_short() {
        let mut spans = vec![(TagName::from("x"), 4)];
        close_over(&mut spans, 4);
        assert_eq!(spans.len(), 1);
        close_over(&mut spans, 6);
        assert_eq!(spans.last().unwrap(), &(TagName::from("default"), 6));
    }
}

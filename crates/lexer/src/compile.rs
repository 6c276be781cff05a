//! Lowering a lexer (and its embedded children, recursively) into a single
//! runnable grammar.
//!
//! Every participating lexer contributes, under nonterminals prefixed with
//! its name: one nonterminal per named rule, a one-character default
//! fallback, an ordered-choice rule combining them, a repetition driving the
//! lexer, and one nonterminal per word-list slot. Embeddings splice
//! transition rules between the participants: the parent's choice gains a
//! prepended `start * child` alternative, and the child's choice is rewritten
//! so the end pattern hands control back to the parent.

use std::sync::Arc;

use lexweave_peg::library::{word_match, WordList};
use lexweave_peg::pattern::{emit, fail, mark, rule, take, Pattern};
use lexweave_peg::Grammar;

use crate::error::Result;
use crate::lexer::{Lexer, Registry};
use crate::tags;
use crate::HashSet;

impl Registry {
    /// Returns the cached grammar for `root`, compiling it when a mutation
    /// invalidated the cache (or nothing was compiled yet).
    pub(crate) fn ensure_compiled(&mut self, root: Lexer) -> Result<Arc<Grammar>> {
        if let Some(grammar) = &self.lexers[root].compiled {
            return Ok(Arc::clone(grammar));
        }
        let grammar = self.build_grammar(root)?;
        tracing::debug!(
            lexer = %self.lexers[root].name,
            rules = grammar.rule_names().count(),
            "compiled grammar"
        );
        let grammar = Arc::new(grammar);
        self.lexers[root].compiled = Some(Arc::clone(&grammar));
        Ok(grammar)
    }

    /// The lexers taking part in `root`'s grammar: the root itself plus all
    /// embedded children, depth first.
    fn participants(&self, root: Lexer) -> Vec<Lexer> {
        let mut out = Vec::new();
        let mut seen = HashSet::default();
        let mut stack = vec![root];
        while let Some(lexer) = stack.pop() {
            if !seen.insert(lexer) {
                continue;
            }
            out.push(lexer);
            if let Some(data) = self.lexers.get(lexer) {
                for embedding in data.children.iter().rev() {
                    stack.push(embedding.child);
                }
            }
        }
        out
    }

    fn build_grammar(&self, root: Lexer) -> Result<Grammar> {
        let participants = self.participants(root);
        let mut grammar = Grammar::new(self.lexers[root].name.clone());

        for &lexer in &participants {
            let data = &self.lexers[lexer];
            let mut alternatives = Vec::with_capacity(data.rules.len() + 1);
            for (id, patt) in &data.rules {
                let name = format!("{}.{id}", data.name);
                alternatives.push(rule(&name));
                grammar.define(name, patt.clone());
            }
            let fallback = format!("{}_fallback", data.name);
            grammar.define(&fallback, emit(tags::DEFAULT) * take(1) * mark());
            alternatives.push(rule(&fallback));
            grammar.define(format!("{}_rule", data.name), Pattern::Choice(alternatives));
            grammar.define(data.name.clone(), rule(format!("{}_rule", data.name)) ^ 0);

            for (index, slot) in data.word_lists.iter().enumerate() {
                let patt = if slot.populated && !slot.words.is_empty() {
                    word_match(WordList(slot.words.clone()), slot.case_insensitive)
                } else {
                    fail()
                };
                grammar.define(format!("{}_wordlist{}", data.name, index + 1), patt);
            }
        }

        for &lexer in &participants {
            let parent = &self.lexers[lexer];
            for embedding in &parent.children {
                let child = &self.lexers[embedding.child];

                let to_child = format!("{}_to_{}", parent.name, child.name);
                grammar.define(&to_child, embedding.start.clone() * rule(&child.name));
                let parent_rule = format!("{}_rule", parent.name);
                let existing = grammar
                    .rule(&parent_rule)
                    .cloned()
                    .expect("participants are defined before transitions");
                let updated = match existing {
                    Pattern::Choice(mut items) => {
                        items.insert(0, rule(&to_child));
                        Pattern::Choice(items)
                    }
                    other => rule(&to_child) + other,
                };
                grammar.define(parent_rule, updated);

                let to_parent = format!("{}_to_{}", child.name, parent.name);
                grammar.define(&to_parent, embedding.end.clone());
                let child_rule = format!("{}_rule", child.name);
                let original = grammar
                    .rule(&child_rule)
                    .cloned()
                    .expect("participants are defined before transitions");
                let rewritten =
                    (original - rule(&to_parent)) + rule(&to_parent) * rule(&parent.name);
                grammar.define(child_rule, rewritten);
            }
        }

        grammar.validate().map_err(crate::error::ErrorKind::from)
            .map_err(|kind| crate::error::Error::for_lexer(&self.lexers[root].name, kind))?;
        Ok(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Options;
    use lexweave_peg::library::{space, word};

    #[test]
    fn grammar_contains_per_lexer_nonterminals() {
        let mut registry = Registry::new();
        let lex = registry.new_lexer("lang", Options::default());
        let ws = registry.tag(lex, "whitespace", space() ^ 1).unwrap();
        registry.add_rule(lex, "whitespace", ws).unwrap();
        let id = registry.tag(lex, "identifier", word()).unwrap();
        registry.add_rule(lex, "identifier", id).unwrap();
        let grammar = registry.ensure_compiled(lex).unwrap();
        for name in [
            "lang",
            "lang_rule",
            "lang_fallback",
            "lang.whitespace",
            "lang.identifier",
            "lang_wordlist1",
            "lang_wordlist4",
        ] {
            assert!(grammar.has_rule(name), "missing nonterminal `{name}`");
        }
        assert_eq!(grammar.start(), "lang");
    }

    #[test]
    fn compilation_is_cached_until_mutation() {
        let mut registry = Registry::new();
        let lex = registry.new_lexer("lang", Options::default());
        let id = registry.tag(lex, "identifier", word()).unwrap();
        registry.add_rule(lex, "identifier", id).unwrap();
        let first = registry.ensure_compiled(lex).unwrap();
        let second = registry.ensure_compiled(lex).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let ws = registry.tag(lex, "whitespace", space() ^ 1).unwrap();
        registry.add_rule(lex, "whitespace", ws).unwrap();
        let third = registry.ensure_compiled(lex).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn embedding_rewrites_both_rule_chains() {
        let mut registry = Registry::new();
        let parent = registry.new_lexer("outer", Options::default());
        let child = registry.new_lexer("inner", Options::default());
        let pw = registry.tag(parent, "identifier", word()).unwrap();
        registry.add_rule(parent, "identifier", pw).unwrap();
        let cw = registry.tag(child, "identifier", word()).unwrap();
        registry.add_rule(child, "identifier", cw).unwrap();
        registry
            .embed(parent, child, lexweave_peg::pattern::lit("<"), lexweave_peg::pattern::lit(">"))
            .unwrap();
        let grammar = registry.ensure_compiled(parent).unwrap();
        assert!(grammar.has_rule("outer_to_inner"));
        assert!(grammar.has_rule("inner_to_outer"));
        // The transition into the child comes before the parent's own rules.
        let Some(Pattern::Choice(items)) = grammar.rule("outer_rule") else {
            panic!("outer_rule should be a choice");
        };
        assert!(matches!(&items[0], Pattern::Rule(name) if &**name == "outer_to_inner"));
    }
}

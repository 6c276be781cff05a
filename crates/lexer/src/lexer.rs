//! Lexer objects and the registry that owns them.
//!
//! Lexers live in a slotmap owned by the [`Registry`]; the [`Lexer`] key is
//! the handle language definitions and hosts pass around. Parent/child
//! links between embedded lexers are keys too, which keeps the reference
//! graph cycle-safe. All operations a language definition may call are
//! methods here; grammar compilation, tagging and folding live in the
//! sibling modules and are implemented on the same type.

use std::sync::Arc;

use lexweave_peg::library::WordList;
use lexweave_peg::pattern::{self, Pattern};
use lexweave_peg::Grammar;
use slotmap::SlotMap;

use crate::error::{Error, ErrorKind, Result};
use crate::fold::{FoldAction, FoldSpec};
use crate::load::Definition;
use crate::tags;
use crate::{HashMap, IndexMap, IndexSet, TagName};

slotmap::new_key_type! {
    /// A handle to a lexer owned by a [`Registry`].
    pub struct Lexer;
}

/// Construction options for [`Registry::new_lexer`].
pub struct Options {
    /// Reapply the grammar to each line instead of the whole chunk.
    pub lex_by_line: bool,
    /// Compute fold levels from indentation instead of fold points.
    pub fold_by_indentation: bool,
    /// Match fold-point symbols case-insensitively.
    pub case_insensitive_fold_points: bool,
    /// Make this lexer a proxy for an existing one: rule, tag, fold-point
    /// and word-list mutations are forwarded to it, and the inherited lexer
    /// is the one that effectively runs.
    pub inherit: Option<Lexer>,
    /// Do not reserve host-settable word-list slots.
    pub no_user_word_lists: bool,
    /// How many host-settable word-list slots to reserve.
    pub num_user_word_lists: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            lex_by_line: false,
            fold_by_indentation: false,
            case_insensitive_fold_points: false,
            inherit: None,
            no_user_word_lists: false,
            num_user_word_lists: 4,
        }
    }
}

/// Names or numbers a word-list slot; host-settable slots are addressed by
/// their one-based index.
pub enum WordListKey {
    Name(String),
    Index(usize),
}

impl From<&str> for WordListKey {
    fn from(name: &str) -> Self {
        WordListKey::Name(name.to_string())
    }
}

impl From<usize> for WordListKey {
    fn from(index: usize) -> Self {
        WordListKey::Index(index)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WordSlot {
    pub words: Vec<String>,
    pub case_insensitive: bool,
    pub populated: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Embedding {
    pub child: Lexer,
    pub start: Pattern,
    pub end: Pattern,
}

#[derive(Debug)]
pub(crate) struct LexerData {
    pub name: String,
    /// Ordered rules; earlier rules shadow later ones at the same position.
    pub rules: IndexMap<String, Pattern>,
    /// Tag name to style number.
    pub tags: IndexMap<TagName, usize>,
    next_style: usize,
    /// Tags registered beyond the predefined seed; mirrored into a parent
    /// when this lexer is embedded.
    pub extra_tags: IndexSet<TagName>,
    /// Tag name to symbol to fold action.
    pub fold_points: IndexMap<TagName, IndexMap<String, FoldAction>>,
    /// The scan alphabet for the folder, in insertion order.
    pub fold_symbols: Vec<String>,
    pub word_lists: Vec<WordSlot>,
    pub word_list_names: IndexMap<String, usize>,
    /// Namespaced views of embedded children's word lists.
    pub word_list_aliases: IndexMap<String, (Lexer, usize)>,
    pub children: Vec<Embedding>,
    pub parent: Option<Lexer>,
    /// Set for proxies and self-embedding children: the name of the lexer
    /// that effectively runs, and the default initial grammar rule.
    pub parent_name: Option<String>,
    pub proxy: bool,
    pub lex_by_line: bool,
    pub fold_by_indentation: bool,
    pub case_insensitive_fold_points: bool,
    pub compiled: Option<Arc<Grammar>>,
}

impl LexerData {
    fn new(name: &str, options: &Options) -> Self {
        let mut data = LexerData {
            name: name.to_string(),
            rules: IndexMap::default(),
            tags: IndexMap::default(),
            next_style: 1,
            extra_tags: IndexSet::default(),
            fold_points: IndexMap::default(),
            fold_symbols: Vec::new(),
            word_lists: Vec::new(),
            word_list_names: IndexMap::default(),
            word_list_aliases: IndexMap::default(),
            children: Vec::new(),
            parent: None,
            parent_name: None,
            proxy: options.inherit.is_some(),
            lex_by_line: options.lex_by_line,
            fold_by_indentation: options.fold_by_indentation,
            case_insensitive_fold_points: options.case_insensitive_fold_points,
            compiled: None,
        };
        for name in tags::PREDEFINED {
            data.assign_style(name)
                .expect("the predefined seed fits the style budget");
        }
        if !options.no_user_word_lists {
            data.word_lists
                .resize_with(options.num_user_word_lists, WordSlot::default);
        }
        data
    }

    /// Returns the style number for `name`, assigning the next free one
    /// (outside the reserved band) on first use.
    fn assign_style(&mut self, name: &str) -> Result<usize> {
        if let Some(&style) = self.tags.get(name) {
            return Ok(style);
        }
        if self.tags.len() >= tags::MAX_STYLES {
            return Err(Error::for_lexer(&self.name, ErrorKind::TooManyStyles));
        }
        let mut style = self.next_style;
        while tags::STYLE_RESERVED.contains(&style) {
            style += 1;
        }
        self.tags.insert(TagName::from(name), style);
        self.next_style = style + 1;
        Ok(style)
    }
}

/// Owns every lexer, the registered language definitions and the load
/// cache. All framework operations are methods on this type.
///
/// Lexing is synchronous and runs to completion; a compiled lexer is not
/// re-entrant, which `lex` taking `&mut self` enforces. Hosts that lex on
/// several threads keep one registry per thread.
#[derive(Default)]
pub struct Registry {
    pub(crate) lexers: SlotMap<Lexer, LexerData>,
    pub(crate) definitions: IndexMap<String, Definition>,
    pub(crate) loaded: HashMap<String, Lexer>,
}

static_assertions::assert_impl_all!(Registry: Send, Sync);

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh lexer. Language definitions call this with the name
    /// they were invoked under.
    pub fn new_lexer(&mut self, name: &str, options: Options) -> Lexer {
        let mut data = LexerData::new(name, &options);
        if let Some(parent) = options.inherit {
            data.parent = Some(parent);
            data.parent_name = self.lexers.get(parent).map(|p| p.name.clone());
        }
        tracing::debug!(name, proxy = data.proxy, "new lexer");
        self.lexers.insert(data)
    }

    pub(crate) fn data(&self, lexer: Lexer) -> Result<&LexerData> {
        self.lexers
            .get(lexer)
            .ok_or_else(|| Error::new(ErrorKind::StaleLexer))
    }

    fn data_mut(&mut self, lexer: Lexer) -> Result<&mut LexerData> {
        self.lexers
            .get_mut(lexer)
            .ok_or_else(|| Error::new(ErrorKind::StaleLexer))
    }

    /// The lexer's immutable identity.
    pub fn name(&self, lexer: Lexer) -> Result<&str> {
        Ok(&self.data(lexer)?.name)
    }

    /// Follows proxy links to the lexer that actually receives mutations.
    fn mutation_target(&self, lexer: Lexer) -> Lexer {
        let mut current = lexer;
        for _ in 0..self.lexers.len() {
            match self.lexers.get(current) {
                Some(data) if data.proxy => match data.parent {
                    Some(parent) => current = parent,
                    None => break,
                },
                _ => break,
            }
        }
        current
    }

    /// Follows parent links of proxies and self-embedding children to the
    /// lexer whose grammar effectively runs.
    pub(crate) fn effective_root(&self, lexer: Lexer) -> Result<Lexer> {
        let mut current = lexer;
        for _ in 0..self.lexers.len() {
            let data = self.data(current)?;
            match (data.parent_name.as_ref(), data.parent) {
                (Some(_), Some(parent)) => current = parent,
                _ => break,
            }
        }
        Ok(current)
    }

    /// Drops the cached grammar of `lexer` and of every ancestor.
    fn invalidate(&mut self, lexer: Lexer) {
        let mut current = Some(lexer);
        for _ in 0..self.lexers.len() {
            let Some(key) = current else { break };
            let Some(data) = self.lexers.get_mut(key) else {
                break;
            };
            data.compiled = None;
            current = data.parent;
        }
    }

    /// Builds a pattern that captures `(name, end)` when `patt` matches and
    /// registers the tag, assigning a style number on first use.
    ///
    /// Inside a lexer named `x`, the bare name `whitespace` registers as
    /// `whitespace.x`; the initial-rule selection in [`Registry::lex`]
    /// relies on this to resume lexing inside embedded languages.
    pub fn tag(&mut self, lexer: Lexer, name: &str, patt: Pattern) -> Result<Pattern> {
        let own_name = &self.data(lexer)?.name;
        let full = if name == tags::WHITESPACE {
            format!("{}.{}", tags::WHITESPACE, own_name)
        } else {
            name.to_string()
        };
        let data = self.data_mut(lexer)?;
        data.assign_style(&full)?;
        if !tags::is_predefined(&full) {
            data.extra_tags.insert(TagName::from(full.as_str()));
        }
        if data.proxy {
            let target = self.mutation_target(lexer);
            if target != lexer {
                let parent = self.data_mut(target)?;
                parent.assign_style(&full)?;
                if !tags::is_predefined(&full) {
                    parent.extra_tags.insert(TagName::from(full.as_str()));
                }
            }
        }
        Ok(pattern::emit(&full) * patt * pattern::mark())
    }

    /// Appends a named rule. Re-adding an existing id replaces its pattern
    /// without moving it in the order; older definitions refresh their
    /// `whitespace` rule this way.
    pub fn add_rule(&mut self, lexer: Lexer, id: &str, patt: Pattern) -> Result<()> {
        let target = self.mutation_target(lexer);
        let data = self.data_mut(target)?;
        data.rules.insert(id.to_string(), patt);
        self.invalidate(target);
        Ok(())
    }

    /// Replaces an existing rule; the rule keeps its position in the order.
    pub fn modify_rule(&mut self, lexer: Lexer, id: &str, patt: Pattern) -> Result<()> {
        let target = self.mutation_target(lexer);
        let data = self.data_mut(target)?;
        if !data.rules.contains_key(id) {
            return Err(Error::for_lexer(
                &data.name,
                ErrorKind::RuleNotFound(id.to_string()),
            ));
        }
        data.rules.insert(id.to_string(), patt);
        self.invalidate(target);
        Ok(())
    }

    /// A by-name reference to a rule in the eventual grammar.
    pub fn get_rule(&self, lexer: Lexer, id: &str) -> Result<Pattern> {
        let target = self.mutation_target(lexer);
        let data = self.data(target)?;
        if !data.rules.contains_key(id) {
            return Err(Error::for_lexer(
                &data.name,
                ErrorKind::RuleNotFound(id.to_string()),
            ));
        }
        Ok(pattern::rule(format!("{}.{}", data.name, id)))
    }

    /// Reserves the named word-list slot (if new) and returns a by-name
    /// reference to it. Safe to call before the list is populated: an empty
    /// slot matches nothing.
    pub fn get_word_list(
        &mut self,
        lexer: Lexer,
        name: &str,
        case_insensitive: bool,
    ) -> Result<Pattern> {
        let target = self.mutation_target(lexer);
        let data = self.data_mut(target)?;
        if let Some(&(child, index)) = data.word_list_aliases.get(name) {
            let child_name = self.data(child)?.name.clone();
            return Ok(pattern::rule(format!("{child_name}_wordlist{}", index + 1)));
        }
        let index = match data.word_list_names.get(name) {
            Some(&index) => index,
            None => {
                data.word_lists.push(WordSlot {
                    case_insensitive,
                    ..WordSlot::default()
                });
                let index = data.word_lists.len() - 1;
                data.word_list_names.insert(name.to_string(), index);
                index
            }
        };
        let owner = &self.lexers[target].name;
        Ok(pattern::rule(format!("{owner}_wordlist{}", index + 1)))
    }

    /// Populates (or, with `append`, extends) a word-list slot and
    /// invalidates the cached grammar. Passing the single word `lexweave`
    /// is a no-op: it marks a list the host hands over at runtime.
    pub fn set_word_list(
        &mut self,
        lexer: Lexer,
        key: impl Into<WordListKey>,
        words: impl Into<WordList>,
        append: bool,
    ) -> Result<()> {
        let WordList(words) = words.into();
        if words.len() == 1 && words[0] == "lexweave" {
            return Ok(());
        }
        let target = self.mutation_target(lexer);
        let (owner, index) = match key.into() {
            WordListKey::Name(name) => {
                let data = self.data(target)?;
                if let Some(&(child, index)) = data.word_list_aliases.get(name.as_str()) {
                    (child, index)
                } else if let Some(&index) = data.word_list_names.get(name.as_str()) {
                    (target, index)
                } else {
                    let data = self.data_mut(target)?;
                    data.word_lists.push(WordSlot::default());
                    let index = data.word_lists.len() - 1;
                    data.word_list_names.insert(name, index);
                    (target, index)
                }
            }
            WordListKey::Index(index) => {
                let data = self.data(target)?;
                if index == 0 || index > data.word_lists.len() {
                    return Err(Error::for_lexer(
                        &data.name,
                        ErrorKind::WordListNotFound(index.to_string()),
                    ));
                }
                (target, index - 1)
            }
        };
        let slot = &mut self.data_mut(owner)?.word_lists[index];
        if append {
            slot.words.extend(words);
        } else {
            slot.words = words;
        }
        slot.populated = true;
        self.invalidate(owner);
        Ok(())
    }

    /// Embeds `child` into `parent`: lexing switches to the child where
    /// `start` matches and back to the parent where `end` matches. The
    /// child's extra tags, fold points and word lists are mirrored into the
    /// parent so one compiled grammar serves both.
    pub fn embed(
        &mut self,
        parent: Lexer,
        child: Lexer,
        start: Pattern,
        end: Pattern,
    ) -> Result<()> {
        let parent = self.mutation_target(parent);
        let child_data = self.data(child)?;
        if child_data.rules.is_empty() {
            return Err(Error::for_lexer(
                &child_data.name,
                ErrorKind::EmbedWithoutRules,
            ));
        }
        let child_name = child_data.name.clone();
        let extra_tags: Vec<TagName> = child_data.extra_tags.iter().cloned().collect();
        let fold_points = child_data.fold_points.clone();
        let fold_symbols = child_data.fold_symbols.clone();
        let word_list_names: Vec<(String, usize)> = child_data
            .word_list_names
            .iter()
            .map(|(name, &index)| (name.clone(), index))
            .collect();

        let parent_data = self.data_mut(parent)?;
        parent_data.children.push(Embedding { child, start, end });
        for tag in extra_tags {
            parent_data.assign_style(&tag)?;
            parent_data.extra_tags.insert(tag);
        }
        for (tag, symbols) in fold_points {
            let merged = parent_data.fold_points.entry(tag).or_default();
            for (symbol, action) in symbols {
                merged.entry(symbol).or_insert(action);
            }
        }
        for symbol in fold_symbols {
            if !parent_data.fold_symbols.contains(&symbol) {
                parent_data.fold_symbols.push(symbol);
            }
        }
        for (name, index) in word_list_names {
            parent_data
                .word_list_aliases
                .insert(format!("{child_name}.{name}"), (child, index));
        }
        tracing::debug!(parent = %parent_data.name, child = %child_name, "embedded lexer");

        self.data_mut(child)?.parent = Some(parent);
        self.invalidate(parent);
        Ok(())
    }

    /// Registers a fold point for a tag: either a `(start, end)` symbol
    /// pair counting `+1`/`-1`, or a predicate deciding per occurrence.
    pub fn add_fold_point(
        &mut self,
        lexer: Lexer,
        tag_name: &str,
        start: &str,
        end: impl Into<FoldSpec>,
    ) -> Result<()> {
        let target = self.mutation_target(lexer);
        let data = self.data_mut(target)?;
        let fold_case = data.case_insensitive_fold_points;
        let canon = |symbol: &str| {
            if fold_case {
                symbol.to_ascii_lowercase()
            } else {
                symbol.to_string()
            }
        };
        let start = canon(start);
        let by_tag = data.fold_points.entry(TagName::from(tag_name)).or_default();
        let mut new_symbols = Vec::new();
        match end.into() {
            FoldSpec::Symbol(end) => {
                let end = canon(&end);
                by_tag.insert(start.clone(), FoldAction::Delta(1));
                by_tag.insert(end.clone(), FoldAction::Delta(-1));
                new_symbols.push(start);
                new_symbols.push(end);
            }
            FoldSpec::Predicate(predicate) => {
                by_tag.insert(start.clone(), FoldAction::Dynamic(predicate));
                new_symbols.push(start);
            }
        }
        for symbol in new_symbols {
            if !data.fold_symbols.contains(&symbol) {
                data.fold_symbols.push(symbol);
            }
        }
        Ok(())
    }

    /// Iterates over the tag names and style numbers of the lexer that
    /// effectively runs for this handle. Hosts use this to map tag names to
    /// their style definitions.
    pub fn tags(&self, lexer: Lexer) -> Result<impl Iterator<Item = (&str, usize)> + '_> {
        let root = self.effective_root(lexer)?;
        Ok(self
            .data(root)?
            .tags
            .iter()
            .map(|(name, &style)| (name.as_ref(), style)))
    }

    /// The style number assigned to `tag_name`, if registered.
    pub fn style_of(&self, lexer: Lexer, tag_name: &str) -> Result<Option<usize>> {
        let root = self.effective_root(lexer)?;
        Ok(self.data(root)?.tags.get(tag_name).copied())
    }

    /// Whether the lexer reapplies its grammar per line.
    pub fn lex_by_line(&self, lexer: Lexer) -> Result<bool> {
        Ok(self.data(self.effective_root(lexer)?)?.lex_by_line)
    }
}

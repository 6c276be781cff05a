#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::single_match_else,
    clippy::too_many_lines
)]

//! The lexweave lexing framework: composable syntax-tagging lexers built on
//! Parsing Expression Grammars, plus per-line fold-level computation.
//!
//! A host (an editor component) owns a [`Registry`], registers language
//! definitions with [`Registry::register`], obtains lexers with
//! [`Registry::load`] and then calls [`Registry::lex`] for `(tag, end)`
//! spans and [`Registry::fold`] for fold levels. Language definitions build
//! their rules from the [`lexweave_peg`] pattern library and the operations
//! on [`Registry`].
//!
//! # Example
//!
//! ```
//! use lexweave_lexer::Registry;
//! use lexweave_peg::library::{space, word, word_match};
//!
//! let mut registry = Registry::new();
//! registry.register("calc", |reg, name| {
//!     let lex = reg.new_lexer(name, Default::default());
//!     let ws = reg.tag(lex, "whitespace", space() ^ 1)?;
//!     reg.add_rule(lex, "whitespace", ws)?;
//!     let kw = reg.tag(lex, "keyword", word_match(["sin", "cos"], false))?;
//!     reg.add_rule(lex, "keyword", kw)?;
//!     let id = reg.tag(lex, "identifier", word())?;
//!     reg.add_rule(lex, "identifier", id)?;
//!     Ok(lex)
//! });
//!
//! let calc = registry.load("calc", None).unwrap();
//! let spans = registry.lex(calc, "sin x", 0).unwrap();
//! let tags: Vec<&str> = spans.iter().map(|(tag, _)| tag.as_ref()).collect();
//! assert_eq!(tags, ["keyword", "whitespace.calc", "identifier"]);
//! ```

pub mod compile;
pub mod error;
pub mod fold;
pub mod host;
pub mod lex;
pub mod lexer;
pub mod load;
pub mod tags;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
pub type IndexSet<V> = indexmap::IndexSet<V, ahash::RandomState>;
pub type HashMap<K, V> = ahash::AHashMap<K, V>;
pub type HashSet<V> = ahash::AHashSet<V>;

/// Tag names are shared, immutable strings.
pub type TagName = std::sync::Arc<str>;

pub use error::{Error, ErrorKind};
pub use fold::{
    fold_consecutive_lines, FoldInput, FoldPredicate, FoldSpec, FOLD_BASE, FOLD_BLANK, FOLD_HEADER,
};
pub use host::{Host, MemoryHost};
pub use lexer::{Lexer, Options, Registry, WordListKey};

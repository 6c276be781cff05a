#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::enum_glob_use,
    clippy::return_self_not_must_use
)]

//! Parsing Expression Grammar kernel and pattern library for the lexweave
//! syntax-tagging framework.
//!
//! The [`pattern`] module provides the primitive combinators (literals,
//! character sets, repetition, ordered choice, lookahead, captures and
//! match-time guards) as an immutable [`pattern::Pattern`] tree, plus named
//! [`pattern::Grammar`]s for recursive rules. The [`matcher`] module executes
//! patterns over text and produces a flat, ordered capture list. The
//! [`library`] module builds the reusable patterns lexers are written with
//! (identifiers, numbers, delimited ranges, keyword sets).

pub mod library;
pub mod matcher;
pub mod pattern;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

pub use matcher::{Match, Value};
pub use pattern::{Grammar, GrammarError, Pattern};

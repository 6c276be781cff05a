//! Resolving language names to lexers.
//!
//! Language definitions are plain functions registered by name; this is the
//! Rust rendition of a definition-file search path. [`Registry::load`] runs
//! the definition once, performs the proxy/parent reassignment for lexers
//! that re-point their identity, and caches the result for the lifetime of
//! the registry. A failing definition leaves nothing behind.

use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::lexer::{Lexer, Registry};

/// A language definition: builds a lexer in the given registry under the
/// given name. The name is the requested one or, for definitions loaded for
/// embedding, the alias the outer definition chose.
pub(crate) type Definition = Arc<dyn Fn(&mut Registry, &str) -> Result<Lexer> + Send + Sync>;

impl Registry {
    /// Registers a language definition under `name`. Definitions registered
    /// earlier shadow later ones of the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: impl Fn(&mut Registry, &str) -> Result<Lexer> + Send + Sync + 'static,
    ) {
        let name = name.into();
        tracing::debug!(%name, "registered language definition");
        self.definitions.entry(name).or_insert_with(|| Arc::new(definition));
    }

    /// The names of all registered language definitions, in registration
    /// order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.definitions.keys().map(String::as_str)
    }

    /// Resolves `name` to a lexer, building it on first use.
    ///
    /// The definition receives `alt_name` instead of `name` when given;
    /// parent definitions use this to load a child under an alias. When the
    /// built lexer declared a parent (a proxy, or a child that embedded
    /// itself into another language), the parent's name is recorded so that
    /// lexing starts in the parent's grammar.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn load(&mut self, name: &str, alt_name: Option<&str>) -> Result<Lexer> {
        if let Some(&cached) = self.loaded.get(name) {
            return Ok(cached);
        }
        let Some(definition) = self.definitions.get(name).map(Arc::clone) else {
            return Err(Error::new(ErrorKind::UnknownLanguage(name.to_string())));
        };
        let lexer = definition(self, alt_name.unwrap_or(name)).map_err(|source| {
            Error::for_lexer(
                name,
                ErrorKind::Definition {
                    name: name.to_string(),
                    source: Box::new(source),
                },
            )
        })?;

        let data = self.data(lexer)?;
        if data.parent_name.is_none() {
            if let Some(parent) = data.parent {
                let parent_name = self.data(parent)?.name.clone();
                tracing::debug!(lexer = name, parent = %parent_name, "re-pointing to parent");
                self.lexers[lexer].parent_name = Some(parent_name);
            }
        }

        self.loaded.insert(name.to_string(), lexer);
        Ok(lexer)
    }

    /// Whether `name` has already been loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }
}

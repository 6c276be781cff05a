use thiserror::Error;

use lexweave_peg::GrammarError;

/// An error surfaced to the host by registry operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// The lexer the operation was addressed to, when known.
    pub lexer: Option<String>,
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error { lexer: None, kind }
    }

    pub(crate) fn for_lexer(name: impl Into<String>, kind: ErrorKind) -> Self {
        Error {
            lexer: Some(name.into()),
            kind,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error("no language definition registered for `{0}`")]
    UnknownLanguage(String),

    #[error("rule `{0}` does not exist")]
    RuleNotFound(String),

    #[error("word list `{0}` does not exist")]
    WordListNotFound(String),

    #[error("cannot embed a lexer with no rules")]
    EmbedWithoutRules,

    #[error("cannot register more than {} tags", crate::tags::MAX_STYLES)]
    TooManyStyles,

    #[error("stale lexer handle")]
    StaleLexer,

    #[error("language definition for `{name}` failed: {source}")]
    Definition {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("grammar construction failed: {0}")]
    Grammar(#[from] GrammarError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

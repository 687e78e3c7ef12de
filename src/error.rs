//! Error types for grammar construction, parsing, and ABNF compilation.
use displaydoc::Display;
use thiserror::Error;

/// Errors raised while assembling a [`Grammar`](crate::element::Grammar) from a
/// [`GrammarBuilder`](crate::element::GrammarBuilder).
#[derive(Debug, Display, Error)]
pub enum GrammarError {
    /// a sequence or choice element must have at least one child
    EmptyChildren,
    /// a literal set must contain at least one alternative
    EmptyLiteralSet,
    /// invalid regular expression `{pattern}`: {source}
    InvalidRegex {
        /// the pattern that failed to compile
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// production `{0}` is referenced but never defined
    UndefinedProduction(String),
}

/// Errors raised by the packrat engine while matching input.
#[derive(Debug, Display, Error)]
pub enum EngineError {
    /// left recursion detected in production `{0}`; rewrite it as right recursion or a repetition
    LeftRecursion(String),
    /// `{0}` is not a production defined in this grammar
    UnknownGoal(String),
    /// ignore production `{0}` is not defined in this grammar
    UnknownIgnoreProduction(String),
}

/// Errors raised while compiling ABNF source text into a [`Grammar`](crate::element::Grammar).
#[derive(Debug, Display, Error)]
pub enum AbnfError {
    /// {0}
    Grammar(#[from] GrammarError),
    /// {0}
    Engine(#[from] EngineError),
    /// ABNF source is invalid; parsing stalled at byte offset {0}
    InvalidSource(usize),
    /// unsupported repetition bounds {min}*{max:?}; only 0..inf, 1..inf and 0..1 are implemented
    UnsupportedRepetition {
        /// the parsed lower bound
        min: usize,
        /// the parsed upper bound, if any
        max: Option<usize>,
    },
    /// invalid numeric literal `{0}`
    InvalidNumericLiteral(String),
}

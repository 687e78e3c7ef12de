//! Runtime configuration for [`Engine`](crate::engine::Engine).
use serde::{Deserialize, Serialize};

/// Tunables for a single [`Engine`](crate::engine::Engine) instance.
///
/// A `Config` is cheap to clone and is typically built once per grammar and
/// reused across every [`Engine::parse`](crate::engine::Engine::parse) call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Config {
    /// Names of productions that are transparently skipped before every
    /// named-goal or literal match attempt (typically whitespace and
    /// comments).
    pub ignore: Vec<String>,
    /// The production name used as the default parse goal by
    /// [`Engine::parse_default`](crate::engine::Engine::parse_default); plain
    /// [`Engine::parse`](crate::engine::Engine::parse) calls with an explicit
    /// goal ignore this field entirely.
    pub start: String,
    /// When set, the engine logs every production entry/exit via
    /// [`log::trace!`].
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            start: "start".to_string(),
            debug: false,
        }
    }
}

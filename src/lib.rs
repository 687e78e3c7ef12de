//! A packrat PEG parsing engine paired with an ABNF (RFC 5234, RFC 7405)
//! grammar compiler.
//!
//! A grammar is an immutable tree of [`element::Element`]s — literals,
//! sequences, prioritized choices, repetitions, and syntactic predicates —
//! assembled with [`element::GrammarBuilder`] and resolved into an
//! [`element::Grammar`]. An [`engine::Engine`] drives one [`element::Grammar`]
//! over one source string at a time, memoizing every `(position, goal)` pair
//! it visits so each one runs at most once (the "packrat" guarantee). After a
//! successful parse, [`engine::Engine::ast`] rebuilds a navigable
//! [`ast::Ast`] from the memo table on demand, without having tracked parse
//! tree structure during matching itself.
//!
//! Grammars can also be authored directly as ABNF source text and compiled
//! with [`abnf::compile`] (or the [`element::Grammar::compile_abnf`]
//! shorthand); the ABNF grammar itself is parsed with this crate's own
//! engine rather than a separate parser.
//!
//! # Example
//!
//! ```
//! use abnf_packrat::element::Grammar;
//! use abnf_packrat::engine::Engine;
//! use std::sync::Arc;
//!
//! let grammar = Grammar::compile_abnf(
//!     "greeting = \"hello\" \" \" name\r\nname = 1*ALPHA\r\n",
//! )
//! .unwrap();
//! let mut engine = Engine::new(Arc::new(grammar)).unwrap();
//! let end = engine.parse("greeting", "hello world", 0).unwrap();
//! assert_eq!(end, Some(11));
//! ```
#![warn(missing_docs)]

pub mod abnf;
pub mod ast;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
mod memo;

pub use ast::{Ast, AstNode, AstOptions};
pub use config::Config;
pub use element::{alt, alt as one, eof, lit, lit_regex, many, neg, opt, pos, reference, rep, seq, some, Element, Grammar, GrammarBuilder};
pub use engine::Engine;
pub use error::{AbnfError, EngineError, GrammarError};

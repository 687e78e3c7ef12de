//! The packrat engine: C2. Drives a [`Grammar`] over a source string,
//! memoizing every `(position, goal)` pair so each one runs at most once.
use std::sync::Arc;

use crate::ast::{build_ast, Ast, AstOptions};
use crate::config::Config;
use crate::element::{Grammar, LiteralValue, ProductionId, RNode};
use crate::error::EngineError;
use crate::memo::{MemoTable, Outcome};

/// `Ok(Some(end))` on a match ending at byte offset `end`, `Ok(None)` on a
/// plain parse miss, `Err` on a fatal grammar error (currently only left
/// recursion).
pub type StepResult = Result<Option<usize>, EngineError>;

/// Drives one grammar over one source string at a time. An `Engine` owns its
/// memo table and is reset on every call to [`parse`](Engine::parse); the
/// [`Grammar`] itself is immutable and may be shared across many engines via
/// `Arc`.
pub struct Engine {
    grammar: Arc<Grammar>,
    config: Config,
    source: String,
    memo: MemoTable,
    ignoring: bool,
    ignore_ids: Vec<ProductionId>,
    last_start: usize,
    last_end: Option<usize>,
    /// Depth of nested [`RNode::Positive`]/[`RNode::Negative`] evaluation.
    /// A goal that only ever matches while this is above zero was part of a
    /// discarded lookahead, not the winning derivation, and must not be
    /// recorded into the memo's `found_order` (see [`Self::match_goal`]).
    predicate_depth: usize,
}

impl Engine {
    /// Creates an engine with a default [`Config`] (no ignore productions).
    pub fn new(grammar: Arc<Grammar>) -> Result<Self, EngineError> {
        Self::with_config(grammar, Config::default())
    }

    /// Creates an engine, resolving `config.ignore` names against `grammar`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownIgnoreProduction`] if any name in
    /// `config.ignore` is not defined in `grammar`.
    pub fn with_config(grammar: Arc<Grammar>, config: Config) -> Result<Self, EngineError> {
        let mut ignore_ids = Vec::with_capacity(config.ignore.len());
        for name in &config.ignore {
            let id = grammar
                .lookup(name)
                .ok_or_else(|| EngineError::UnknownIgnoreProduction(name.clone()))?;
            ignore_ids.push(id);
        }
        Ok(Self {
            grammar,
            config,
            source: String::new(),
            memo: MemoTable::new(0),
            ignoring: false,
            ignore_ids,
            last_start: 0,
            last_end: None,
            predicate_depth: 0,
        })
    }

    /// The grammar this engine is driving.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// The source text of the most recent [`parse`](Self::parse) call.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parses `source` starting at `start_index`, matching the named
    /// production `goal`. Replaces the engine's source and resets its memo
    /// table, so nothing from a previous parse carries over.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownGoal`] if `goal` is not defined in the
    /// grammar, or [`EngineError::LeftRecursion`] if matching uncovers a
    /// production that calls itself at the same position without having
    /// consumed input first.
    pub fn parse(&mut self, goal: &str, source: impl Into<String>, start_index: usize) -> StepResult {
        let id = self
            .grammar
            .lookup(goal)
            .ok_or_else(|| EngineError::UnknownGoal(goal.to_string()))?;
        self.source = source.into();
        self.memo = MemoTable::new(self.source.len());
        self.ignoring = false;
        self.predicate_depth = 0;
        self.last_start = start_index;
        self.last_end = None;
        let result = self.match_goal(id, start_index)?;
        self.last_end = result;
        Ok(result)
    }

    /// Parses `source` starting at `start_index`, matching `self.config.start`
    /// rather than requiring the caller to name a goal. Equivalent to
    /// `self.parse(&self.config.start.clone(), source, start_index)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownGoal`] if `config.start` is not defined
    /// in the grammar, or [`EngineError::LeftRecursion`] under the same
    /// condition as [`parse`](Self::parse).
    pub fn parse_default(&mut self, source: impl Into<String>, start_index: usize) -> StepResult {
        let goal = self.config.start.clone();
        self.parse(&goal, source, start_index)
    }

    /// Rebuilds the AST of the most recent successful parse. Returns `None`
    /// if the last [`parse`](Self::parse) call has not run or did not match.
    pub fn ast(&self, options: AstOptions) -> Option<Ast<'_>> {
        let end = self.last_end?;
        build_ast(&self.source, &self.grammar, &self.memo, self.last_start, end, &options)
    }

    /// The highest byte offset at which any goal was attempted during the
    /// last parse. Used to report where an invalid input stalled.
    pub fn farthest_index(&self) -> usize {
        self.memo.farthest_index()
    }

    /// Total number of distinct `(position, production)` pairs evaluated
    /// during the last parse. Exposed so callers can confirm the engine
    /// isn't re-doing work on grammars with heavily shared sub-rules.
    pub fn production_match_count(&self) -> usize {
        self.memo.production_attempts()
    }

    /// Checks whether `goal` matches at `index` without consuming it:
    /// returns the would-be end index on success.
    pub fn check(&mut self, goal: &str, index: usize) -> StepResult {
        let id = self
            .grammar
            .lookup(goal)
            .ok_or_else(|| EngineError::UnknownGoal(goal.to_string()))?;
        self.match_goal(id, index)
    }

    /// Returns `index` if `goal` fails to match there, or `goal`'s match end
    /// otherwise. Never reports a miss.
    pub fn allow(&mut self, goal: &str, index: usize) -> Result<usize, EngineError> {
        Ok(self.check(goal, index)?.unwrap_or(index))
    }

    /// Negative lookahead: returns `index` if `goal` fails to match there,
    /// or reports a miss if it does match. The complement of [`check`](Self::check).
    pub fn disallow(&mut self, goal: &str, index: usize) -> StepResult {
        Ok(match self.check(goal, index)? {
            Some(_) => None,
            None => Some(index),
        })
    }

    fn skip_ignore(&mut self, index: usize) -> Result<usize, EngineError> {
        if self.ignoring || self.ignore_ids.is_empty() {
            return Ok(index);
        }
        self.ignoring = true;
        let ids = self.ignore_ids.clone();
        let mut idx = index;
        let outcome = (|| -> Result<usize, EngineError> {
            loop {
                let mut advanced = false;
                for &id in &ids {
                    if let Some(end) = self.match_goal(id, idx)? {
                        if end > idx {
                            idx = end;
                            advanced = true;
                        }
                    }
                }
                if !advanced {
                    break;
                }
            }
            Ok(idx)
        })();
        self.ignoring = false;
        outcome
    }

    fn match_goal(&mut self, id: ProductionId, index: usize) -> StepResult {
        let index = self.skip_ignore(index)?;
        if let Some(outcome) = self.memo.get_production(index, id) {
            return match outcome {
                Outcome::Match(end) => {
                    // A goal first discovered while evaluating a discarded
                    // Positive/Negative lookahead isn't part of the winning
                    // derivation yet; only once it's reached through a real
                    // (non-predicate) reference does it belong in
                    // `found_order`. `record_found` is idempotent, so a goal
                    // reached this way more than once still appears once.
                    if self.predicate_depth == 0 {
                        self.memo.record_found(index, id);
                    }
                    Ok(Some(end))
                }
                Outcome::NoMatch => Ok(None),
                Outcome::InUse => Err(EngineError::LeftRecursion(
                    self.grammar.production_name(id).to_string(),
                )),
            };
        }
        self.memo.set_production(index, id, Outcome::InUse);
        if self.config.debug {
            log::trace!("enter {} @ {}", self.grammar.production_name(id), index);
        }
        let grammar = self.grammar.clone();
        let body = grammar.body(id);
        let result = self.match_node(body, index)?;
        match result {
            Some(end) => {
                self.memo.set_production(index, id, Outcome::Match(end));
                if self.predicate_depth == 0 {
                    self.memo.record_found(index, id);
                }
                if self.config.debug {
                    log::trace!("match {} @ {}..{}", self.grammar.production_name(id), index, end);
                }
            }
            None => {
                self.memo.set_production(index, id, Outcome::NoMatch);
                if self.config.debug {
                    log::trace!("fail {} @ {}", self.grammar.production_name(id), index);
                }
            }
        }
        Ok(result)
    }

    fn match_literal(&mut self, id: crate::element::LiteralId, index: usize) -> StepResult {
        let index = self.skip_ignore(index)?;
        if let Some(outcome) = self.memo.get_literal(index, id) {
            return Ok(match outcome {
                Outcome::Match(end) => Some(end),
                _ => None,
            });
        }
        let grammar = self.grammar.clone();
        let result = match grammar.literal(id) {
            LiteralValue::Str(s) => {
                if self.source[index..].as_bytes().starts_with(s.as_bytes()) {
                    Some(index + s.len())
                } else {
                    None
                }
            }
            LiteralValue::Regex(re) => re.find(&self.source[index..]).map(|m| index + m.end()),
        };
        self.memo.set_literal(
            index,
            id,
            match result {
                Some(end) => Outcome::Match(end),
                None => Outcome::NoMatch,
            },
        );
        Ok(result)
    }

    fn match_node(&mut self, node: &RNode, index: usize) -> StepResult {
        Ok(match node {
            RNode::Literal(id) => self.match_literal(*id, index)?,
            RNode::Sequence(children) => {
                let mut cur = index;
                let mut ok = true;
                for child in children {
                    match self.match_node(child, cur)? {
                        Some(next) => cur = next,
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    Some(cur)
                } else {
                    None
                }
            }
            RNode::Choice(children) => {
                let mut result = None;
                for child in children {
                    if let Some(end) = self.match_node(child, index)? {
                        result = Some(end);
                        break;
                    }
                }
                result
            }
            RNode::Repetition { child, min, max } => {
                let mut count = 0usize;
                let mut cur = index;
                loop {
                    if let Some(max) = max {
                        if count >= *max {
                            break;
                        }
                    }
                    match self.match_node(child, cur)? {
                        Some(next) => {
                            let advanced = next > cur;
                            cur = next;
                            count += 1;
                            if !advanced {
                                // A successful child that consumed nothing would
                                // loop forever; count it once and stop.
                                break;
                            }
                        }
                        None => break,
                    }
                }
                if count >= *min {
                    Some(cur)
                } else {
                    None
                }
            }
            RNode::Positive(child) => {
                self.predicate_depth += 1;
                let child_result = self.match_node(child, index);
                self.predicate_depth -= 1;
                if child_result?.is_some() {
                    Some(index)
                } else {
                    None
                }
            }
            RNode::Negative(child) => {
                self.predicate_depth += 1;
                let child_result = self.match_node(child, index);
                self.predicate_depth -= 1;
                if child_result?.is_some() {
                    None
                } else {
                    Some(index)
                }
            }
            RNode::Reference(id) => self.match_goal(*id, index)?,
            RNode::Eof => {
                if index >= self.source.len() {
                    Some(index)
                } else {
                    None
                }
            }
        })
    }
}

//! The packrat memoization table: one record per source byte position,
//! keyed by production or literal goal.
use ahash::AHashMap;

use crate::element::{LiteralId, ProductionId};

/// The outcome of attempting a goal at a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The goal failed at this position.
    NoMatch,
    /// The goal is currently being evaluated at this position (left-recursion sentinel).
    InUse,
    /// The goal matched, ending at this byte offset.
    Match(usize),
}

#[derive(Default)]
struct PositionRecord {
    productions: AHashMap<ProductionId, Outcome>,
    literals: AHashMap<LiteralId, Outcome>,
    found_order: Vec<ProductionId>,
}

/// A dense array of [`PositionRecord`]s, one per byte offset `0..=len`, plus
/// the per-position `found_order` needed to rebuild an AST after a parse.
pub(crate) struct MemoTable {
    positions: Vec<PositionRecord>,
}

impl MemoTable {
    pub(crate) fn new(source_len: usize) -> Self {
        let mut positions = Vec::with_capacity(source_len + 1);
        positions.resize_with(source_len + 1, PositionRecord::default);
        Self { positions }
    }

    pub(crate) fn get_production(&self, index: usize, id: ProductionId) -> Option<Outcome> {
        self.positions[index].productions.get(&id).copied()
    }

    pub(crate) fn set_production(&mut self, index: usize, id: ProductionId, outcome: Outcome) {
        self.positions[index].productions.insert(id, outcome);
    }

    /// Appends `id` to the position's `found_order`, unless it is already
    /// present. A goal can be recorded on more than one call path (e.g. it
    /// is first reached through a discarded lookahead, then again through a
    /// real reference once matching continues) but must only ever occupy
    /// one slot in the order, per the no-duplicates invariant.
    pub(crate) fn record_found(&mut self, index: usize, id: ProductionId) {
        let found_order = &mut self.positions[index].found_order;
        if !found_order.contains(&id) {
            found_order.push(id);
        }
    }

    pub(crate) fn get_literal(&self, index: usize, id: LiteralId) -> Option<Outcome> {
        self.positions[index].literals.get(&id).copied()
    }

    pub(crate) fn set_literal(&mut self, index: usize, id: LiteralId, outcome: Outcome) {
        self.positions[index].literals.insert(id, outcome);
    }

    /// The `found_order` at `index`, reversed so the outermost (last-recorded)
    /// match comes first, as needed by AST reconstruction.
    pub(crate) fn found_order_rev(&self, index: usize) -> Vec<ProductionId> {
        let mut order = self.positions[index].found_order.clone();
        order.reverse();
        order
    }

    /// The highest index at which any goal was attempted, used to report
    /// where a failed parse stalled.
    pub(crate) fn farthest_index(&self) -> usize {
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.productions.is_empty() || !record.literals.is_empty())
            .map(|(index, _)| index)
            .max()
            .unwrap_or(0)
    }

    /// Total number of distinct `(position, production)` goals evaluated.
    /// Every goal runs its body at most once, so this is also the engine's
    /// total production-invocation count for the parse that built this table.
    pub(crate) fn production_attempts(&self) -> usize {
        self.positions.iter().map(|record| record.productions.len()).sum()
    }
}

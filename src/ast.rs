//! C3: on-demand AST reconstruction from a completed parse's memo table.
use std::ops::Range;

use ahash::AHashSet;

use crate::element::{Grammar, ProductionId};
use crate::memo::MemoTable;

/// Options controlling AST reconstruction, independent of any engine's own
/// ignore configuration (the two commonly name the same productions, but
/// either may be set without the other).
#[derive(Debug, Clone, Default)]
pub struct AstOptions {
    ignore: AHashSet<String>,
}

impl AstOptions {
    /// No productions suppressed from the tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the named productions as suppressed: they do not become nodes,
    /// and their span is excluded from their parent's
    /// [`stripped_text`](AstNode::stripped_text).
    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }
}

struct NodeData {
    name: String,
    range: Range<usize>,
    parent: Option<usize>,
    first_child: Option<usize>,
    next_sibling: Option<usize>,
}

/// The reconstructed parse tree for one successful parse.
pub struct Ast<'e> {
    source: &'e str,
    nodes: Vec<NodeData>,
    root: Option<usize>,
    ignored_spans: Vec<Range<usize>>,
}

impl<'e> Ast<'e> {
    /// The root node, covering the entire matched range.
    pub fn root(&self) -> Option<AstNode<'_, 'e>> {
        self.root.map(|id| AstNode { ast: self, id })
    }

    /// The full source text this tree was built over.
    pub fn source(&self) -> &'e str {
        self.source
    }
}

/// A single node in an [`Ast`]: a named production's match, with links to
/// its parent and children.
#[derive(Clone, Copy)]
pub struct AstNode<'a, 'e> {
    ast: &'a Ast<'e>,
    id: usize,
}

impl<'a, 'e> AstNode<'a, 'e> {
    fn data(&self) -> &'a NodeData {
        &self.ast.nodes[self.id]
    }

    /// The production name this node matched.
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// The byte range this node's match spans in the source text.
    pub fn range(&self) -> Range<usize> {
        self.data().range.clone()
    }

    /// The length in bytes of [`range`](Self::range).
    pub fn range_len(&self) -> usize {
        let range = self.data().range.clone();
        range.end - range.start
    }

    /// The raw matched source text, including any ignored sub-spans.
    pub fn text(&self) -> &'e str {
        &self.ast.source[self.data().range.clone()]
    }

    /// The matched source text with every ignored descendant span removed.
    pub fn stripped_text(&self) -> String {
        let range = self.data().range.clone();
        let mut out = String::with_capacity(range.len());
        let mut cursor = range.start;
        for span in self
            .ast
            .ignored_spans
            .iter()
            .filter(|span| span.start >= range.start && span.end <= range.end)
        {
            if span.start > cursor {
                out.push_str(&self.ast.source[cursor..span.start]);
            }
            cursor = cursor.max(span.end);
        }
        if cursor < range.end {
            out.push_str(&self.ast.source[cursor..range.end]);
        }
        out
    }

    /// This node's parent, if any.
    pub fn parent(&self) -> Option<AstNode<'a, 'e>> {
        self.data().parent.map(|id| AstNode { ast: self.ast, id })
    }

    /// Every direct child, in source order.
    pub fn children(&self) -> impl Iterator<Item = AstNode<'a, 'e>> + 'a {
        ChildrenIter {
            ast: self.ast,
            next: self.data().first_child,
        }
    }

    /// Direct children whose name equals `name`.
    pub fn children_named(&self, name: &str) -> impl Iterator<Item = AstNode<'a, 'e>> + 'a {
        let name = name.to_string();
        self.children().filter(move |child| child.name() == name)
    }

    /// Count of direct children named `name`.
    pub fn count_named(&self, name: &str) -> usize {
        self.children_named(name).count()
    }

    /// The first direct child named `name`, if any. Shallow: only this
    /// node's immediate children are considered, not deeper descendants.
    pub fn first_named(&self, name: &str) -> Option<AstNode<'a, 'e>> {
        self.children_named(name).next()
    }

    /// The last direct child, if any.
    pub fn last_child(&self) -> Option<AstNode<'a, 'e>> {
        self.children().last()
    }

    /// Distance to the root: `0` for the root itself.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent();
        }
        depth
    }
}

struct ChildrenIter<'a, 'e> {
    ast: &'a Ast<'e>,
    next: Option<usize>,
}

impl<'a, 'e> Iterator for ChildrenIter<'a, 'e> {
    type Item = AstNode<'a, 'e>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.ast.nodes[id].next_sibling;
        Some(AstNode { ast: self.ast, id })
    }
}

struct Builder<'g> {
    grammar: &'g Grammar,
    memo: &'g MemoTable,
    ignore: &'g AHashSet<ProductionId>,
    nodes: Vec<NodeData>,
    ignored_spans: Vec<Range<usize>>,
}

impl<'g> Builder<'g> {
    fn push_node(&mut self, id: ProductionId, range: Range<usize>, parent: Option<usize>) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(NodeData {
            name: self.grammar.production_name(id).to_string(),
            range,
            parent,
            first_child: None,
            next_sibling: None,
        });
        if let Some(parent_id) = parent {
            match self.nodes[parent_id].first_child {
                None => self.nodes[parent_id].first_child = Some(node_id),
                Some(first) => {
                    let mut cursor = first;
                    while let Some(next) = self.nodes[cursor].next_sibling {
                        cursor = next;
                    }
                    self.nodes[cursor].next_sibling = Some(node_id);
                }
            }
        }
        node_id
    }

    /// Scans `[start, limit)` left to right under `parent`, wrapping every
    /// production recorded as starting at each position it visits. Positions
    /// with nothing recorded are skipped one byte at a time (they belong to
    /// literal matches, which never get their own node).
    fn populate(&mut self, start: usize, limit: usize, parent: Option<usize>) {
        let mut cursor = start;
        while cursor < limit {
            let order = self.memo.found_order_rev(cursor);
            if order.is_empty() {
                cursor += 1;
                continue;
            }
            match self.build_chain(cursor, limit, parent, &order, 0) {
                Some(end) if end > cursor => cursor = end,
                _ => cursor += 1,
            }
        }
    }

    /// Consumes `order[skip]` — the outermost production of `order[skip..]`
    /// still nested at `index` — wraps it (unless ignored), then recurses in
    /// two directions: deeper into `order` for productions that share this
    /// same start index, and forward via [`populate`](Self::populate) for
    /// whatever begins after the deepest one of those ends. Returns the
    /// match's end index, or `None` if `order[skip]` doesn't exist or its
    /// match doesn't fit within `limit`.
    fn build_chain(
        &mut self,
        index: usize,
        limit: usize,
        parent: Option<usize>,
        order: &[ProductionId],
        skip: usize,
    ) -> Option<usize> {
        let goal = *order.get(skip)?;
        let end = match self.memo.get_production(index, goal) {
            Some(crate::memo::Outcome::Match(end)) if end <= limit => end,
            _ => return None,
        };
        let node_parent = if self.ignore.contains(&goal) {
            self.ignored_spans.push(index..end);
            parent
        } else {
            Some(self.push_node(goal, index..end, parent))
        };
        match self.build_chain(index, end, node_parent, order, skip + 1) {
            Some(inner_end) if inner_end < end => self.populate(inner_end, end, node_parent),
            None => self.populate(index + 1, end, node_parent),
            _ => {}
        }
        Some(end)
    }
}

pub(crate) fn build_ast<'e>(
    source: &'e str,
    grammar: &Grammar,
    memo: &MemoTable,
    start: usize,
    end: usize,
    options: &AstOptions,
) -> Option<Ast<'e>> {
    let ignore: AHashSet<ProductionId> = options
        .ignore
        .iter()
        .filter_map(|name| {
            let id = grammar.lookup(name);
            if id.is_none() {
                log::warn!("AstOptions::ignore names unknown production `{name}`");
            }
            id
        })
        .collect();
    let mut builder = Builder {
        grammar,
        memo,
        ignore: &ignore,
        nodes: Vec::new(),
        ignored_spans: Vec::new(),
    };
    builder.populate(start, end, None);
    if builder.nodes.is_empty() {
        return None;
    }
    builder.ignored_spans.sort_by_key(|span| span.start);
    Some(Ast {
        source,
        nodes: builder.nodes,
        root: Some(0),
        ignored_spans: builder.ignored_spans,
    })
}

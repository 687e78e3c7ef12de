//! The grammar element model: builder-facing [`Element`]s, the [`GrammarBuilder`]
//! that validates and resolves them, and the compiled, immutable [`Grammar`].
use ahash::AHashMap;
use regex::Regex;
use string_interner::{backend::StringBackend, DefaultSymbol, StringInterner, Symbol};

use crate::error::GrammarError;

type ProdInterner = StringInterner<StringBackend<DefaultSymbol>>;

/// Dense identifier for a named production, assigned once at
/// [`GrammarBuilder::build`] time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductionId(DefaultSymbol);

/// Dense identifier for a distinct literal value (string or regex),
/// assigned once at [`GrammarBuilder::build`] time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiteralId(u32);

/// A literal value matched directly against the source text.
#[derive(Debug, Clone)]
pub enum LiteralValue {
    /// An exact byte-for-byte string match.
    Str(String),
    /// A regular expression, anchored at the match's starting position.
    Regex(Regex),
}

/// A single node of a grammar element tree, as assembled by an embedder
/// through the free functions in this module ([`seq`], [`alt`], [`many`], ...).
///
/// `Element` trees are not executable on their own: they are validated and
/// resolved into a [`Grammar`] by [`GrammarBuilder::build`].
#[derive(Debug, Clone)]
pub enum Element {
    /// Matches a literal string or regex.
    Literal(LiteralValue),
    /// Matches every child in order, threading the index through each.
    Sequence(Vec<Element>),
    /// Matches the first child that succeeds, in order (prioritized choice).
    Choice(Vec<Element>),
    /// Matches `child` greedily, `min..=max` times (`max = None` means unbounded).
    Repetition {
        /// The repeated element.
        child: Box<Element>,
        /// Minimum number of repetitions required.
        min: usize,
        /// Maximum number of repetitions allowed, or unbounded.
        max: Option<usize>,
    },
    /// Succeeds without consuming input iff `child` matches (lookahead).
    Positive(Box<Element>),
    /// Succeeds without consuming input iff `child` fails (negative lookahead).
    Negative(Box<Element>),
    /// Refers to another production by name, resolved at build time.
    Reference(String),
    /// Matches only at the end of the source text.
    Eof,
}

/// Builds a sequence element. Errors if `children` is empty.
pub fn seq(children: Vec<Element>) -> Result<Element, GrammarError> {
    if children.is_empty() {
        return Err(GrammarError::EmptyChildren);
    }
    Ok(Element::Sequence(children))
}

/// Builds a prioritized-choice element. Errors if `children` is empty.
pub fn alt(children: Vec<Element>) -> Result<Element, GrammarError> {
    if children.is_empty() {
        return Err(GrammarError::EmptyChildren);
    }
    Ok(Element::Choice(children))
}

/// Builds a repetition element matching `child` between `min` and `max`
/// times (`max = None` for unbounded).
pub fn rep(child: Element, min: usize, max: Option<usize>) -> Element {
    Element::Repetition {
        child: Box::new(child),
        min,
        max,
    }
}

/// Zero-or-more repetitions of `child`.
pub fn many(child: Element) -> Element {
    rep(child, 0, None)
}

/// One-or-more repetitions of `child`.
pub fn some(child: Element) -> Element {
    rep(child, 1, None)
}

/// Zero-or-one repetitions of `child`.
pub fn opt(child: Element) -> Element {
    rep(child, 0, Some(1))
}

/// Positive lookahead: succeeds without consuming input iff `child` matches.
pub fn pos(child: Element) -> Element {
    Element::Positive(Box::new(child))
}

/// Negative lookahead: succeeds without consuming input iff `child` fails.
pub fn neg(child: Element) -> Element {
    Element::Negative(Box::new(child))
}

/// Matches only at the end of the source text.
pub fn eof() -> Element {
    Element::Eof
}

/// Refers to another production by name.
pub fn reference(name: impl Into<String>) -> Element {
    Element::Reference(name.into())
}

/// A literal match against one of `values` (a single value collapses to a
/// plain string literal; more than one becomes an alternation of literals).
/// Errors if `values` is empty.
pub fn lit(values: &[&str]) -> Result<Element, GrammarError> {
    if values.is_empty() {
        return Err(GrammarError::EmptyLiteralSet);
    }
    if values.len() == 1 {
        return Ok(Element::Literal(LiteralValue::Str(values[0].to_string())));
    }
    alt(values
        .iter()
        .map(|v| Element::Literal(LiteralValue::Str(v.to_string())))
        .collect())
}

/// A literal match against a regular expression, anchored so it can only
/// match starting at the position it is tried.
pub fn lit_regex(pattern: &str) -> Result<Element, GrammarError> {
    let anchored = format!("^(?:{pattern})");
    let re = Regex::new(&anchored).map_err(|source| GrammarError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(Element::Literal(LiteralValue::Regex(re)))
}

/// The resolved, executable counterpart of [`Element`]: production names are
/// replaced with dense [`ProductionId`]s and literal values are deduplicated
/// into a [`LiteralId`] table. Never constructed directly; produced by
/// [`GrammarBuilder::build`].
#[derive(Debug, Clone)]
pub(crate) enum RNode {
    Literal(LiteralId),
    Sequence(Vec<RNode>),
    Choice(Vec<RNode>),
    Repetition {
        child: Box<RNode>,
        min: usize,
        max: Option<usize>,
    },
    Positive(Box<RNode>),
    Negative(Box<RNode>),
    Reference(ProductionId),
    Eof,
}

/// Accumulates named productions before they are validated and resolved
/// into a [`Grammar`].
#[derive(Default)]
pub struct GrammarBuilder {
    bodies: AHashMap<String, Element>,
    order: Vec<String>,
}

impl GrammarBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a production. Later calls with the same name
    /// overwrite the earlier body but keep its original position in
    /// iteration order.
    pub fn define(&mut self, name: impl Into<String>, element: Element) -> &mut Self {
        let name = name.into();
        if !self.bodies.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.bodies.insert(name, element);
        self
    }

    /// Defines a production only if no body has been registered for `name`
    /// yet. Used to seed default productions (e.g. ABNF core rules) that an
    /// embedder may still override.
    pub fn define_if_absent(&mut self, name: impl Into<String>, element: Element) -> &mut Self {
        let name = name.into();
        if !self.bodies.contains_key(&name) {
            self.order.push(name.clone());
            self.bodies.insert(name, element);
        }
        self
    }

    /// Returns whether a production with this name has already been defined.
    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    /// Scans every defined body for a [`Element::Reference`] that names a
    /// production not (yet) defined on this builder, logging each one at
    /// `warn` level and returning the distinct set of names found.
    ///
    /// This is a non-fatal, best-effort check for embedders assembling a
    /// grammar across several calls before they are ready to finalize it;
    /// [`build`](Self::build) still performs its own eager, fatal check of
    /// the same condition and is the only place an undefined reference
    /// actually blocks grammar construction.
    pub fn undefined_references(&self) -> Vec<String> {
        fn walk(element: &Element, bodies: &AHashMap<String, Element>, out: &mut Vec<String>) {
            match element {
                Element::Reference(name) => {
                    if !bodies.contains_key(name) && !out.contains(name) {
                        out.push(name.clone());
                    }
                }
                Element::Sequence(children) | Element::Choice(children) => {
                    for child in children {
                        walk(child, bodies, out);
                    }
                }
                Element::Repetition { child, .. } | Element::Positive(child) | Element::Negative(child) => {
                    walk(child, bodies, out);
                }
                Element::Literal(_) | Element::Eof => {}
            }
        }
        let mut found = Vec::new();
        for name in &self.order {
            walk(&self.bodies[name], &self.bodies, &mut found);
        }
        for name in &found {
            log::warn!("production `{name}` is referenced but not yet defined on this builder");
        }
        found
    }

    /// Validates every reference and resolves the builder into an immutable,
    /// `Arc`-shareable [`Grammar`].
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UndefinedProduction`] if any [`Element::Reference`]
    /// names a production that was never [`define`](Self::define)d.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        let mut interner: ProdInterner = StringInterner::new();
        for name in &self.order {
            interner.get_or_intern(name.as_str());
        }
        let mut literals: Vec<LiteralValue> = Vec::new();
        let mut literal_index: AHashMap<String, u32> = AHashMap::default();
        let mut bodies = Vec::with_capacity(self.order.len());
        for name in &self.order {
            let element = &self.bodies[name];
            bodies.push(resolve(element, &interner, &mut literals, &mut literal_index)?);
        }
        Ok(Grammar {
            interner,
            bodies,
            literals,
        })
    }
}

fn literal_key(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Str(s) => format!("S:{s}"),
        LiteralValue::Regex(r) => format!("R:{}", r.as_str()),
    }
}

fn resolve(
    element: &Element,
    interner: &ProdInterner,
    literals: &mut Vec<LiteralValue>,
    literal_index: &mut AHashMap<String, u32>,
) -> Result<RNode, GrammarError> {
    Ok(match element {
        Element::Literal(value) => {
            let key = literal_key(value);
            let id = *literal_index.entry(key).or_insert_with(|| {
                literals.push(value.clone());
                (literals.len() - 1) as u32
            });
            RNode::Literal(LiteralId(id))
        }
        Element::Sequence(children) => RNode::Sequence(
            children
                .iter()
                .map(|c| resolve(c, interner, literals, literal_index))
                .collect::<Result<_, _>>()?,
        ),
        Element::Choice(children) => RNode::Choice(
            children
                .iter()
                .map(|c| resolve(c, interner, literals, literal_index))
                .collect::<Result<_, _>>()?,
        ),
        Element::Repetition { child, min, max } => RNode::Repetition {
            child: Box::new(resolve(child, interner, literals, literal_index)?),
            min: *min,
            max: *max,
        },
        Element::Positive(child) => {
            RNode::Positive(Box::new(resolve(child, interner, literals, literal_index)?))
        }
        Element::Negative(child) => {
            RNode::Negative(Box::new(resolve(child, interner, literals, literal_index)?))
        }
        Element::Reference(name) => {
            let sym = interner
                .get(name)
                .ok_or_else(|| GrammarError::UndefinedProduction(name.clone()))?;
            RNode::Reference(ProductionId(sym))
        }
        Element::Eof => RNode::Eof,
    })
}

/// An immutable, compiled grammar: every production is resolved to a dense
/// [`ProductionId`] and every literal deduplicated into a [`LiteralId`]
/// table. Cheap to share across engines via `Arc`.
pub struct Grammar {
    interner: ProdInterner,
    bodies: Vec<RNode>,
    literals: Vec<LiteralValue>,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("productions", &self.bodies.len())
            .field("literals", &self.literals.len())
            .finish()
    }
}

impl Grammar {
    /// Looks up the [`ProductionId`] for a production name.
    pub fn lookup(&self, name: &str) -> Option<ProductionId> {
        self.interner.get(name).map(ProductionId)
    }

    /// Returns the name a [`ProductionId`] was interned from.
    pub fn production_name(&self, id: ProductionId) -> &str {
        self.interner
            .resolve(id.0)
            .expect("ProductionId always resolves within its own Grammar")
    }

    /// Number of distinct productions in this grammar.
    pub fn production_count(&self) -> usize {
        self.bodies.len()
    }

    pub(crate) fn body(&self, id: ProductionId) -> &RNode {
        &self.bodies[id.0.to_usize()]
    }

    pub(crate) fn literal(&self, id: LiteralId) -> &LiteralValue {
        &self.literals[id.0 as usize]
    }
}

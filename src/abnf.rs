//! C4: an ABNF (RFC 5234, with the RFC 7405 case-sensitive string extension)
//! grammar compiler. The ABNF grammar itself is expressed with, and parsed
//! by, this crate's own [`GrammarBuilder`]/[`Engine`] (C1/C2) rather than an
//! external parser-combinator crate.
use std::sync::Arc;

use ahash::AHashSet;

use crate::ast::{Ast, AstNode, AstOptions};
use crate::element::{alt, eof, lit, lit_regex, many, neg, opt, reference, seq, some, Element, Grammar, GrammarBuilder};
use crate::engine::Engine;
use crate::error::AbnfError;

const WS_PATTERN: &str = r"(?:[ \t\r\n]|;[^\n]*\n?)+";
const PRODNAME_PATTERN: &str = r"[A-Za-z][A-Za-z0-9-]*";
const NUMLIT_PATTERN: &str = r"%[xX][0-9A-Fa-f]+(?:[-.][0-9A-Fa-f]+)*|%[dD][0-9]+(?:[-.][0-9]+)*";
const CASESE_PATTERN: &str = r#"%[sS]"[^"]*""#;
const CASEIN_PATTERN: &str = r#"(?:%[iI])?"[^"]*""#;
const PROSEVAL_PATTERN: &str = r"<[^>]*>";
const REPSPEC_PATTERN: &str = r"[0-9]*\*[0-9]*|[0-9]+";

/// Names reserved by [`crate::ast::AstNode`]'s own methods; an ABNF
/// production that collides with one is prefixed with `p_` so it can still
/// be reached as a plain grammar production.
const RESERVED_NAMES: &[&str] = &[
    "children",
    "children_named",
    "count_named",
    "first_named",
    "last_child",
    "depth",
    "range_len",
    "text",
    "stripped_text",
    "parent",
    "range",
    "name",
];

fn bootstrap_grammar() -> Result<Grammar, AbnfError> {
    let mut b = GrammarBuilder::new();
    b.define("ws", lit_regex(WS_PATTERN)?);
    b.define("s", opt(reference("ws")));
    b.define("prodname", lit_regex(PRODNAME_PATTERN)?);
    b.define("numlit", lit_regex(NUMLIT_PATTERN)?);
    b.define("casese", lit_regex(CASESE_PATTERN)?);
    b.define("casein", lit_regex(CASEIN_PATTERN)?);
    b.define("proseval", lit_regex(PROSEVAL_PATTERN)?);
    b.define("repspec", lit_regex(REPSPEC_PATTERN)?);

    b.define(
        "group",
        seq(vec![
            lit(&["("])?,
            reference("s"),
            reference("prodalt"),
            reference("s"),
            lit(&[")"])?,
        ])?,
    );
    b.define(
        "optgroup",
        seq(vec![
            lit(&["["])?,
            reference("s"),
            reference("prodalt"),
            reference("s"),
            lit(&["]"])?,
        ])?,
    );
    b.define(
        "repgroup",
        seq(vec![reference("repspec"), reference("prodatom")])?,
    );

    b.define(
        "prodatom",
        alt(vec![
            reference("numlit"),
            reference("casese"),
            reference("casein"),
            reference("proseval"),
            seq(vec![
                reference("prodname"),
                neg(seq(vec![reference("s"), lit(&["="])?])?),
            ])?,
            reference("optgroup"),
            reference("repgroup"),
            reference("group"),
        ])?,
    );
    b.define(
        "prodterm",
        seq(vec![
            reference("prodatom"),
            many(seq(vec![reference("s"), reference("prodatom")])?),
        ])?,
    );
    b.define(
        "prodalt",
        seq(vec![
            reference("prodterm"),
            many(seq(vec![
                reference("s"),
                lit(&["/"])?,
                reference("s"),
                reference("prodterm"),
            ])?),
        ])?,
    );
    b.define(
        "prod",
        seq(vec![
            reference("prodname"),
            reference("s"),
            lit(&["="])?,
            reference("s"),
            reference("prodalt"),
            reference("s"),
        ])?,
    );
    b.define(
        "grammar",
        seq(vec![reference("s"), some(reference("prod")), eof()])?,
    );

    Ok(b.build()?)
}

/// RFC 5234 Appendix B.1 core rules, keyed by the same lowercased,
/// dash-to-underscore name that [`normalize_name`] produces for any other
/// production reference, so a rule like `1*ALPHA` resolves correctly.
fn core_rules() -> Result<Vec<(&'static str, Element)>, AbnfError> {
    Ok(vec![
        ("alpha", lit_regex("[A-Za-z]")?),
        ("digit", lit_regex("[0-9]")?),
        ("hexdig", lit_regex("[0-9A-Fa-f]")?),
        ("dquote", lit(&["\""])?),
        ("sp", lit(&[" "])?),
        ("htab", lit(&["\t"])?),
        ("cr", lit(&["\r"])?),
        ("lf", lit(&["\n"])?),
        ("crlf", lit(&["\r\n"])?),
        ("wsp", alt(vec![reference("sp"), reference("htab")])?),
        ("vchar", lit_regex("[\\x21-\\x7E]")?),
        ("char", lit_regex("[\\x01-\\x7F]")?),
        ("ctl", lit_regex("[\\x00-\\x1F\\x7F]")?),
        ("octet", lit_regex("(?s).")?),
        ("bit", alt(vec![lit(&["0"])?, lit(&["1"])?])?),
    ])
}

fn normalize_name(raw: &str) -> String {
    let normalized = raw.to_lowercase().replace('-', "_");
    if RESERVED_NAMES.contains(&normalized.as_str()) {
        format!("p_{normalized}")
    } else {
        normalized
    }
}

fn strip_quoted(text: &str, prefix_len: usize) -> &str {
    &text[prefix_len..text.len() - 1]
}

fn lower_casese(node: &AstNode) -> Result<Element, AbnfError> {
    let text = node.text();
    let inner = strip_quoted(text, 3); // %s"
    Ok(lit(&[inner])?)
}

fn lower_casein(node: &AstNode) -> Result<Element, AbnfError> {
    let text = node.text();
    // A bare quoted string is implicitly case-insensitive per RFC 7405;
    // an explicit `%i` prefix just spells that out.
    let inner = match text.strip_prefix("%i").or_else(|| text.strip_prefix("%I")) {
        Some(rest) => strip_quoted(rest, 1),
        None => strip_quoted(text, 1),
    };
    if !inner.chars().any(|c| c.is_alphabetic()) {
        return Ok(lit(&[inner])?);
    }
    Ok(lit_regex(&format!("(?i){}", regex::escape(inner)))?)
}

fn lower_proseval(node: &AstNode) -> Result<Element, AbnfError> {
    log::warn!(
        "prose description `{}` lowered to an unconstrained single-line match",
        node.text()
    );
    Ok(lit_regex("[^\\n]*")?)
}

fn escape_class_char(c: char) -> String {
    match c {
        ']' | '^' | '-' | '\\' => format!("\\{c}"),
        other => other.to_string(),
    }
}

fn lower_numlit(node: &AstNode) -> Result<Element, AbnfError> {
    let text = node.text();
    let radix = match &text[1..2] {
        "x" | "X" => 16,
        "d" | "D" => 10,
        other => return Err(AbnfError::InvalidNumericLiteral(other.to_string())),
    };
    let rest = &text[2..];
    let parse_cp = |part: &str| -> Result<char, AbnfError> {
        let value = u32::from_str_radix(part, radix)
            .map_err(|_| AbnfError::InvalidNumericLiteral(text.to_string()))?;
        char::from_u32(value).ok_or_else(|| AbnfError::InvalidNumericLiteral(text.to_string()))
    };
    if let Some(dash) = rest.find('-') {
        let lo = parse_cp(&rest[..dash])?;
        let hi = parse_cp(&rest[dash + 1..])?;
        let pattern = format!("[{}-{}]", escape_class_char(lo), escape_class_char(hi));
        return Ok(lit_regex(&pattern)?);
    }
    if rest.contains('.') {
        let mut s = String::new();
        for part in rest.split('.') {
            s.push(parse_cp(part)?);
        }
        return Ok(lit(&[&s])?);
    }
    let c = parse_cp(rest)?;
    Ok(lit(&[&c.to_string()])?)
}

fn parse_repspec(text: &str) -> Result<(usize, Option<usize>), AbnfError> {
    match text.split_once('*') {
        Some((lo, hi)) => {
            let min = if lo.is_empty() {
                0
            } else {
                lo.parse()
                    .map_err(|_| AbnfError::InvalidNumericLiteral(text.to_string()))?
            };
            let max = if hi.is_empty() {
                None
            } else {
                Some(
                    hi.parse()
                        .map_err(|_| AbnfError::InvalidNumericLiteral(text.to_string()))?,
                )
            };
            Ok((min, max))
        }
        None => {
            let n: usize = text
                .parse()
                .map_err(|_| AbnfError::InvalidNumericLiteral(text.to_string()))?;
            Ok((n, Some(n)))
        }
    }
}

fn lower_repgroup(node: &AstNode) -> Result<Element, AbnfError> {
    let repspec = node
        .first_named("repspec")
        .ok_or_else(|| AbnfError::InvalidNumericLiteral(node.text().to_string()))?;
    let atom = node
        .first_named("prodatom")
        .ok_or_else(|| AbnfError::InvalidNumericLiteral(node.text().to_string()))?;
    let (min, max) = parse_repspec(repspec.text())?;
    let inner = lower_prodatom(&atom)?;
    match (min, max) {
        (0, None) => Ok(many(inner)),
        (1, None) => Ok(some(inner)),
        (0, Some(1)) => Ok(opt(inner)),
        (min, max) => Err(AbnfError::UnsupportedRepetition { min, max }),
    }
}

fn lower_prodatom(node: &AstNode) -> Result<Element, AbnfError> {
    let child = node
        .children()
        .next()
        .ok_or_else(|| AbnfError::InvalidNumericLiteral(node.text().to_string()))?;
    match child.name() {
        "numlit" => lower_numlit(&child),
        "casese" => lower_casese(&child),
        "casein" => lower_casein(&child),
        "proseval" => lower_proseval(&child),
        "prodname" => Ok(reference(normalize_name(child.text()))),
        "optgroup" => {
            let inner = child
                .first_named("prodalt")
                .ok_or_else(|| AbnfError::InvalidNumericLiteral(child.text().to_string()))?;
            Ok(opt(lower_prodalt(&inner)?))
        }
        "repgroup" => lower_repgroup(&child),
        "group" => {
            let inner = child
                .first_named("prodalt")
                .ok_or_else(|| AbnfError::InvalidNumericLiteral(child.text().to_string()))?;
            lower_prodalt(&inner)
        }
        other => Err(AbnfError::InvalidNumericLiteral(format!("unrecognized atom `{other}`"))),
    }
}

fn lower_prodterm(node: &AstNode) -> Result<Element, AbnfError> {
    let atoms: Vec<_> = node.children_named("prodatom").collect();
    if atoms.len() == 1 {
        return lower_prodatom(&atoms[0]);
    }
    let mut elements = Vec::with_capacity(atoms.len());
    for atom in &atoms {
        elements.push(lower_prodatom(atom)?);
    }
    Ok(seq(elements)?)
}

fn lower_prodalt(node: &AstNode) -> Result<Element, AbnfError> {
    let terms: Vec<_> = node.children_named("prodterm").collect();
    if terms.len() == 1 {
        return lower_prodterm(&terms[0]);
    }
    let mut elements = Vec::with_capacity(terms.len());
    for term in &terms {
        elements.push(lower_prodterm(term)?);
    }
    Ok(alt(elements)?)
}

/// Compiles ABNF source text into an executable [`Grammar`].
///
/// Productions are matched case-insensitively and normalized to lowercase
/// with dashes turned into underscores, per RFC 5234's name-matching rule.
/// RFC 5234 Appendix B.1's core rules (`ALPHA`, `DIGIT`, ...) are predefined
/// and may be overridden by the source.
///
/// # Errors
///
/// Returns [`AbnfError::InvalidSource`] if the source does not parse as
/// ABNF, or any of the lowering errors (unsupported repetition bounds,
/// invalid numeric literals) if a production body cannot be represented.
pub fn compile(source: &str) -> Result<Grammar, AbnfError> {
    let bootstrap = Arc::new(bootstrap_grammar()?);
    let config = crate::config::Config {
        ignore: vec!["ws".to_string()],
        start: "grammar".to_string(),
        debug: false,
    };
    let mut engine = Engine::with_config(bootstrap, config)?;
    let result = engine.parse_default(source, 0)?;
    if result.is_none() {
        return Err(AbnfError::InvalidSource(engine.farthest_index()));
    }
    let ast: Ast = engine
        .ast(AstOptions::new().ignore(["ws"]))
        .ok_or(AbnfError::InvalidSource(0))?;
    let root = ast.root().ok_or(AbnfError::InvalidSource(0))?;

    let prod_nodes: Vec<_> = root.children_named("prod").collect();
    let mut user_names: AHashSet<String> = AHashSet::default();
    for prod in &prod_nodes {
        let name_node = prod
            .first_named("prodname")
            .ok_or_else(|| AbnfError::InvalidSource(prod.range().start))?;
        user_names.insert(normalize_name(name_node.text()));
    }

    let mut builder = GrammarBuilder::new();
    for (name, element) in core_rules()? {
        if !user_names.contains(name) {
            builder.define_if_absent(name, element);
        }
    }
    for prod in &prod_nodes {
        let name_node = prod.first_named("prodname").unwrap();
        let alt_node = prod
            .first_named("prodalt")
            .ok_or_else(|| AbnfError::InvalidSource(prod.range().start))?;
        let name = normalize_name(name_node.text());
        let element = lower_prodalt(&alt_node)?;
        builder.define(name, element);
    }
    Ok(builder.build()?)
}

impl Grammar {
    /// Compiles ABNF source text into a [`Grammar`]. See [`compile`].
    pub fn compile_abnf(source: &str) -> Result<Grammar, AbnfError> {
        compile(source)
    }
}

//! HCL parser front door using tree-sitter
//!
//! This module parses HCL source with the
//! [tree-sitter-hcl](https://github.com/tree-sitter-grammars/tree-sitter-hcl)
//! grammar and lowers the concrete tree into the [`crate::syntax`] tree the
//! printer consumes. Three input modes are supported: a whole configuration
//! document, a bare expression and a bare template.
//!
//! The grammar only knows whole documents. Expressions are parsed as the value
//! of a synthetic attribute and templates as the content of a synthetic
//! heredoc; byte ranges and diagnostic positions are rebased so they refer to
//! the input exactly as it was given.
//!
//! # Example
//!
//! ```rust
//! use hclparse::parser::parse_expression;
//! use hclparse::syntax::Node;
//!
//! let parsed = parse_expression("a.b[0]").unwrap();
//! assert!(matches!(parsed.root, Node::ScopeTraversal(_)));
//! assert_eq!(parsed.source, b"a.b[0]");
//! ```

use crate::diagnostics::{Diagnostics, Position};
use crate::lower::{LowerError, Lowerer};
use crate::syntax::Node;
use once_cell::sync::Lazy;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;
use tree_sitter::{Language, LanguageError, Node as CstNode, Parser, Tree};

/// The HCL language definition for tree-sitter
pub static HCL_LANGUAGE: Lazy<Language> = Lazy::new(|| tree_sitter_hcl::LANGUAGE.into());

/// Origin used in diagnostics for expression input
pub const EXPRESSION_ORIGIN: &str = "<expr>";
/// Origin used in diagnostics for template input
pub const TEMPLATE_ORIGIN: &str = "<template>";

const EXPRESSION_ATTRIBUTE: &str = "hclparse_expr";
const TEMPLATE_ATTRIBUTE: &str = "hclparse_template";

/// A syntax tree together with the source its byte ranges point into
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    pub root: Node,
    pub source: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load the HCL grammar: {0}")]
    Language(#[from] LanguageError),
    #[error("tree-sitter returned no tree")]
    NoTree,
    #[error("{0}")]
    Syntax(Diagnostics),
    /// The grammar produced an operator the syntax tree has no entry for.
    /// This means the grammar and [`crate::syntax::Operation`] are out of
    /// sync, not that the input is wrong.
    #[error("{origin}:{position}: unsupported operator `{token}`")]
    UnsupportedOperator {
        origin: String,
        position: Position,
        token: String,
    },
}

impl ParseError {
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ParseError::Syntax(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }
}

/// Parsed text and the part of it that is the caller's input
struct Frame<'o> {
    text: Vec<u8>,
    input: Range<usize>,
    origin: &'o str,
}

impl<'o> Frame<'o> {
    fn wrap(origin: &'o str, prefix: &str, input: &[u8], suffix: &str) -> Self {
        let mut text = Vec::with_capacity(prefix.len() + input.len() + suffix.len());
        text.extend_from_slice(prefix.as_bytes());
        text.extend_from_slice(input);
        text.extend_from_slice(suffix.as_bytes());
        Self {
            text,
            input: prefix.len()..prefix.len() + input.len(),
            origin,
        }
    }

    fn input(&self) -> &[u8] {
        &self.text[self.input.clone()]
    }

    fn position(&self, offset: usize) -> Position {
        Position::at(self.input(), offset.saturating_sub(self.input.start))
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.origin)
    }

    fn lowerer(&self) -> Lowerer<'_> {
        Lowerer::new(&self.text, self.input.clone())
    }

    fn parse(&self) -> Result<Tree, ParseError> {
        let mut parser = Parser::new();
        parser.set_language(&HCL_LANGUAGE)?;
        parser.parse(&self.text, None).ok_or(ParseError::NoTree)
    }

    /// Fail with every ERROR and MISSING node in the tree
    fn check_syntax(&self, root: CstNode) -> Result<(), ParseError> {
        if !root.has_error() {
            return Ok(());
        }

        let mut diagnostics = self.diagnostics();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_missing() {
                diagnostics.push(
                    self.position(node.start_byte()),
                    format!("missing `{}`", node.kind()),
                );
            } else if node.is_error() {
                diagnostics.push(self.position(node.start_byte()), self.unexpected(node));
            } else if node.has_error() {
                let mut cursor = node.walk();
                let children: Vec<_> = node.children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
        debug!(origin = self.origin, count = diagnostics.len(), "syntax errors");
        Err(ParseError::Syntax(diagnostics))
    }

    fn unexpected(&self, node: CstNode) -> String {
        let range = node.start_byte().max(self.input.start)..node.end_byte().min(self.input.end);
        let text = self.text.get(range).map(String::from_utf8_lossy).unwrap_or_default();
        match text.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(line) if line.chars().count() > 24 => {
                let cut: String = line.chars().take(24).collect();
                format!("unexpected `{cut}...`")
            }
            Some(line) => format!("unexpected `{line}`"),
            None => "syntax error".to_string(),
        }
    }

    fn lower_error(&self, err: LowerError) -> ParseError {
        match err {
            LowerError::UnsupportedOperator { offset, token } => ParseError::UnsupportedOperator {
                origin: self.origin.to_string(),
                position: self.position(offset),
                token,
            },
            LowerError::Malformed { offset, message } => {
                let mut diagnostics = self.diagnostics();
                diagnostics.push(self.position(offset), message);
                ParseError::Syntax(diagnostics)
            }
        }
    }

    fn syntax_error(&self, offset: usize, message: &str) -> ParseError {
        let mut diagnostics = self.diagnostics();
        diagnostics.push(self.position(offset), message);
        ParseError::Syntax(diagnostics)
    }

    /// The value node of the single synthetic attribute
    fn wrapped_value<'t>(&self, root: CstNode<'t>, what: &str) -> Result<CstNode<'t>, ParseError> {
        let mut attributes = Vec::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "body" => pending.push(child),
                    "attribute" => attributes.push(child),
                    _ if child.is_extra() => {}
                    _ => return Err(self.syntax_error(child.start_byte(), &format!("expected {what}"))),
                }
            }
        }
        attributes.sort_by_key(|attr| attr.start_byte());

        if let Some(extra) = attributes.get(1) {
            return Err(self.syntax_error(
                extra.start_byte(),
                &format!("extra characters after {what}"),
            ));
        }
        let attribute = attributes
            .first()
            .ok_or_else(|| self.syntax_error(self.input.start, &format!("expected {what}")))?;

        let mut cursor = attribute.walk();
        let value = attribute.named_children(&mut cursor).filter(|c| !c.is_extra()).nth(1);
        value.ok_or_else(|| self.syntax_error(self.input.start, &format!("expected {what}")))
    }

    fn into_parsed(self, root: Node) -> Parsed {
        Parsed {
            root,
            source: self.input().to_vec(),
        }
    }
}

/// Parse a whole HCL configuration document.
///
/// The root of the returned tree is always a [`Node::Body`].
pub fn parse_config(source: impl Into<Vec<u8>>, origin: &str) -> Result<Parsed, ParseError> {
    let text = source.into();
    debug!(origin, bytes = text.len(), "parsing document");

    let frame = Frame {
        input: 0..text.len(),
        text,
        origin,
    };
    let tree = frame.parse()?;
    let root = tree.root_node();
    frame.check_syntax(root)?;

    let node = frame
        .lowerer()
        .document(root)
        .map_err(|err| frame.lower_error(err))?;
    Ok(frame.into_parsed(node))
}

/// Parse a single HCL expression
pub fn parse_expression(source: &str) -> Result<Parsed, ParseError> {
    debug!(bytes = source.len(), "parsing expression");

    let prefix = format!("{EXPRESSION_ATTRIBUTE} = ");
    let frame = Frame::wrap(EXPRESSION_ORIGIN, &prefix, source.as_bytes(), "\n");
    let tree = frame.parse()?;
    let root = tree.root_node();
    frame.check_syntax(root)?;

    let value = frame.wrapped_value(root, "an expression")?;
    let node = frame
        .lowerer()
        .expression(value)
        .map_err(|err| frame.lower_error(err))?;
    Ok(frame.into_parsed(node))
}

/// Parse a bare HCL template, i.e. the content of a string or heredoc with
/// `${...}` interpolations and `%{...}` directives
pub fn parse_template(source: &str) -> Result<Parsed, ParseError> {
    debug!(bytes = source.len(), "parsing template");

    let delimiter = heredoc_delimiter(source);
    let prefix = format!("{TEMPLATE_ATTRIBUTE} = <<{delimiter}\n");
    let suffix = format!("\n{delimiter}\n");
    let frame = Frame::wrap(TEMPLATE_ORIGIN, &prefix, source.as_bytes(), &suffix);
    let tree = frame.parse()?;
    let root = tree.root_node();
    frame.check_syntax(root)?;

    let value = frame.wrapped_value(root, "a template")?;
    let heredoc = find_descendant(value, "heredoc_template")
        .ok_or_else(|| frame.syntax_error(frame.input.start, "expected a template"))?;
    let node = frame
        .lowerer()
        .template(heredoc)
        .map_err(|err| frame.lower_error(err))?;
    Ok(frame.into_parsed(node))
}

/// A heredoc delimiter that does not occur in `template`
fn heredoc_delimiter(template: &str) -> String {
    let mut delimiter = String::from("EOT");
    while template.contains(&delimiter) {
        delimiter.push('X');
    }
    delimiter
}

fn find_descendant<'t>(node: CstNode<'t>, kind: &str) -> Option<CstNode<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_descendant(child, kind))
}

//! Syntax tree printer
//!
//! Renders a [`Node`] tree as an indented, parenthesized dump with one line per
//! node. Container nodes open a parenthesis on their own line, their children
//! follow two spaces deeper, and a lone `)` at the container's indentation
//! closes it. Leaf nodes close themselves on the line that opens them.
//!
//! ```text
//! (Body
//!   (Attribute "name"
//!     (LiteralValueExpr "bar")
//!   )
//! )
//! ```
//!
//! Literals and traversals show their raw text, sliced out of the source buffer
//! the tree was parsed from.
//!
//! # Example
//!
//! ```rust
//! use hclparse::printer::render_to_string;
//! use hclparse::syntax::{Attribute, Body, LiteralValue, Node};
//!
//! let source = b"name = 1";
//! let root = Node::Body(Body {
//!     items: vec![Node::Attribute(Attribute {
//!         name: "name".to_string(),
//!         value: Box::new(Node::LiteralValue(LiteralValue { range: 7..8 })),
//!     })],
//! });
//!
//! let dump = render_to_string(&root, source);
//! assert_eq!(dump, "(Body\n  (Attribute \"name\"\n    (LiteralValueExpr \"1\")\n  )\n)\n");
//! ```

use crate::syntax::Node;
use crate::walk::{Walker, walk};
use std::borrow::Cow;
use std::io::{self, Write};
use std::ops::Range;

/// Spaces added per nesting level
pub const INDENT_WIDTH: usize = 2;

/// Walker that writes the dump to `out` line by line.
///
/// A printer is meant for one traversal. [`render`] creates a fresh one for
/// every call.
#[derive(Debug)]
pub struct TreePrinter<'s, W> {
    out: W,
    source: &'s [u8],
    indent: usize,
    leaf: bool,
}

impl<'s, W: Write> TreePrinter<'s, W> {
    pub fn new(source: &'s [u8], out: W) -> Self {
        Self {
            out,
            source,
            indent: 0,
            leaf: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn snippet(&self, range: &Range<usize>) -> Cow<'s, str> {
        let bytes = self.source.get(range.clone()).unwrap_or_default();
        String::from_utf8_lossy(bytes)
    }

    fn write_opening(&mut self, node: &Node) -> io::Result<()> {
        let kind = node.kind_name();
        match node {
            Node::Attribute(attr) => write!(self.out, r#"({kind} "{}""#, attr.name),
            Node::Block(block) => write!(
                self.out,
                r#"({kind} "{}" [{}]"#,
                block.block_type,
                block.labels.join(" ")
            ),
            Node::LiteralValue(lit) => {
                let text = self.snippet(&lit.range);
                write!(self.out, r#"({kind} "{text}")"#)
            }
            Node::ScopeTraversal(traversal) => {
                let text = self.snippet(&traversal.range);
                write!(self.out, r#"({kind} "{text}")"#)
            }
            Node::RelativeTraversal(traversal) => {
                let text = self.snippet(&traversal.traversal);
                write!(self.out, r#"({kind} "{text}""#)
            }
            Node::FunctionCall(call) => write!(self.out, r#"({kind} "{}""#, call.name),
            Node::For(expr) => {
                write!(self.out, "({kind}")?;
                if let Some(key) = &expr.key_var {
                    write!(self.out, r#" key="{key}""#)?;
                }
                if let Some(val) = &expr.val_var {
                    write!(self.out, r#" val="{val}""#)?;
                }
                Ok(())
            }
            Node::AnonSymbol => write!(self.out, "({kind})"),
            Node::BinaryOp(op) => write!(self.out, r#"({kind} "{}""#, op.op.symbol()),
            Node::UnaryOp(op) => write!(self.out, r#"({kind} "{}""#, op.op.symbol()),
            Node::Body(_) | Node::Other(_) => write!(self.out, "({kind}"),
        }
    }
}

impl<W: Write> Walker for TreePrinter<'_, W> {
    type Error = io::Error;

    fn enter(&mut self, node: &Node) -> io::Result<()> {
        // A leaf's line is already closed, so nothing may nest under it.
        assert!(!self.leaf, "leaf node should not have children");

        write!(self.out, "{:indent$}", "", indent = self.indent)?;
        self.write_opening(node)?;
        writeln!(self.out)?;

        self.leaf = node.is_leaf();
        self.indent += INDENT_WIDTH;
        Ok(())
    }

    fn exit(&mut self, _node: &Node) -> io::Result<()> {
        self.indent -= INDENT_WIDTH;

        if self.leaf {
            self.leaf = false;
            return Ok(());
        }

        writeln!(self.out, "{:indent$})", "", indent = self.indent)
    }
}

/// Write the dump of `root` to `out`.
///
/// `source` must be the buffer the tree's byte ranges point into. Output is
/// written as it is produced; wrap `out` in a [`io::BufWriter`] when it is
/// unbuffered.
pub fn render<W: Write>(root: &Node, source: &[u8], out: W) -> io::Result<()> {
    let mut printer = TreePrinter::new(source, out);
    walk(root, &mut printer)
}

/// Render the dump of `root` into a string
pub fn render_to_string(root: &Node, source: &[u8]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec never fails.
    let _ = render(root, source, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::*;
    use indoc::indoc;

    fn lit(range: Range<usize>) -> Node {
        Node::LiteralValue(LiteralValue { range })
    }

    fn boxed(node: Node) -> Box<Node> {
        Box::new(node)
    }

    /// `resource "aws_instance" "foo" { name = "bar" }`
    fn resource_block() -> (Node, &'static [u8]) {
        let source: &[u8] = br#"resource "aws_instance" "foo" { name = "bar" }"#;
        let root = Node::Body(Body {
            items: vec![Node::Block(Block {
                block_type: "resource".to_string(),
                labels: vec!["aws_instance".to_string(), "foo".to_string()],
                body: Body {
                    items: vec![Node::Attribute(Attribute {
                        name: "name".to_string(),
                        value: boxed(lit(40..43)),
                    })],
                },
            })],
        });
        (root, source)
    }

    /// `1 + 2 * 3`
    fn arithmetic() -> (Node, &'static [u8]) {
        let source: &[u8] = b"1 + 2 * 3";
        let root = Node::BinaryOp(BinaryOp {
            op: Operation::Add,
            lhs: boxed(lit(0..1)),
            rhs: boxed(Node::BinaryOp(BinaryOp {
                op: Operation::Multiply,
                lhs: boxed(lit(4..5)),
                rhs: boxed(lit(8..9)),
            })),
        });
        (root, source)
    }

    /// Exercises every formatting rule at once
    fn kitchen_sink() -> (Node, &'static [u8]) {
        let source: &[u8] = b"x = [for k, v in f(a.b)[*].c : -v if !k]";
        let splat = Node::Other(Other::new(
            "SplatExpr",
            vec![
                Node::FunctionCall(FunctionCall {
                    name: "f".to_string(),
                    args: vec![Node::ScopeTraversal(ScopeTraversal { range: 19..22 })],
                }),
                Node::RelativeTraversal(RelativeTraversal {
                    traversal: 26..28,
                    source: boxed(Node::AnonSymbol),
                }),
            ],
        ));
        let root = Node::Body(Body {
            items: vec![Node::Attribute(Attribute {
                name: "x".to_string(),
                value: boxed(Node::For(ForExpr {
                    key_var: Some("k".to_string()),
                    val_var: Some("v".to_string()),
                    collection: boxed(splat),
                    key: None,
                    value: boxed(Node::UnaryOp(UnaryOp {
                        op: Operation::Negate,
                        operand: boxed(Node::ScopeTraversal(ScopeTraversal { range: 32..33 })),
                    })),
                    condition: Some(boxed(Node::UnaryOp(UnaryOp {
                        op: Operation::LogicalNot,
                        operand: boxed(Node::ScopeTraversal(ScopeTraversal { range: 38..39 })),
                    }))),
                })),
            })],
        });
        (root, source)
    }

    #[test]
    fn block_with_attribute() {
        let (root, source) = resource_block();
        let expected = indoc! {r#"
            (Body
              (Block "resource" [aws_instance foo]
                (Attribute "name"
                  (LiteralValueExpr "bar")
                )
              )
            )
        "#};
        assert_eq!(render_to_string(&root, source), expected);
    }

    #[test]
    fn nested_binary_operations() {
        let (root, source) = arithmetic();
        let expected = indoc! {r#"
            (BinaryOpExpr "+"
              (LiteralValueExpr "1")
              (BinaryOpExpr "*"
                (LiteralValueExpr "2")
                (LiteralValueExpr "3")
              )
            )
        "#};
        assert_eq!(render_to_string(&root, source), expected);
    }

    #[test]
    fn every_formatting_rule() {
        let (root, source) = kitchen_sink();
        let expected = indoc! {r#"
            (Body
              (Attribute "x"
                (ForExpr key="k" val="v"
                  (SplatExpr
                    (FunctionCallExpr "f"
                      (ScopeTraversalExpr "a.b")
                    )
                    (RelativeTraversalExpr ".c"
                      (AnonSymbolExpr)
                    )
                  )
                  (UnaryOpExpr "-"
                    (ScopeTraversalExpr "v")
                  )
                  (UnaryOpExpr "!"
                    (ScopeTraversalExpr "k")
                  )
                )
              )
            )
        "#};
        assert_eq!(render_to_string(&root, source), expected);
    }

    #[test]
    fn for_without_key_only_shows_value() {
        let root = Node::For(ForExpr {
            key_var: None,
            val_var: Some("s".to_string()),
            collection: boxed(Node::ScopeTraversal(ScopeTraversal { range: 10..14 })),
            key: None,
            value: boxed(Node::ScopeTraversal(ScopeTraversal { range: 17..18 })),
            condition: None,
        });
        let dump = render_to_string(&root, b"[for s in list : s]");
        assert_eq!(dump.lines().next(), Some(r#"(ForExpr val="s""#));
    }

    #[test]
    fn empty_containers_close_immediately() {
        let dump = render_to_string(&Node::Body(Body::default()), b"");
        assert_eq!(dump, "(Body\n)\n");

        let block = Node::Block(Block {
            block_type: "locals".to_string(),
            labels: Vec::new(),
            body: Body::default(),
        });
        assert_eq!(render_to_string(&block, b""), "(Block \"locals\" []\n)\n");
    }

    #[test]
    fn leaf_root_is_a_single_line() {
        let root = Node::ScopeTraversal(ScopeTraversal { range: 2..9 });
        let dump = render_to_string(&root, b"${foo.bar}");
        assert_eq!(dump, "(ScopeTraversalExpr \"foo.bar\")\n");
    }

    #[test]
    fn out_of_range_snippet_renders_empty() {
        let dump = render_to_string(&lit(3..10), b"abc");
        assert_eq!(dump, "(LiteralValueExpr \"\")\n");
    }

    #[test]
    fn closers_balance_openers_at_matching_indent() {
        for (root, source) in [resource_block(), arithmetic(), kitchen_sink()] {
            let dump = render_to_string(&root, source);
            let mut open = Vec::new();
            for line in dump.lines() {
                let indent = line.len() - line.trim_start().len();
                let text = line.trim_start();
                assert!(!line.contains('\t'));

                if text == ")" {
                    assert_eq!(open.pop(), Some(indent), "closer misaligned in\n{dump}");
                    continue;
                }

                // depth is the number of containers still open
                assert_eq!(indent, open.len() * INDENT_WIDTH, "bad depth in\n{dump}");
                if !text.ends_with(')') {
                    open.push(indent);
                }
            }
            assert!(open.is_empty(), "unclosed containers in\n{dump}");
        }
    }

    #[test]
    fn leaves_never_get_a_closing_line() {
        let (root, source) = kitchen_sink();
        let dump = render_to_string(&root, source);
        let closers = dump.lines().filter(|line| line.trim_start() == ")").count();
        let containers = dump
            .lines()
            .filter(|line| !line.ends_with(')'))
            .count();
        assert_eq!(closers, containers);
        // 4 traversals, 1 anon symbol
        let leaves = dump
            .lines()
            .filter(|line| line.trim_start() != ")" && line.ends_with(')'))
            .count();
        assert_eq!(leaves, 4);
    }

    #[test]
    fn rendering_is_deterministic() {
        let (root, source) = kitchen_sink();
        assert_eq!(render_to_string(&root, source), render_to_string(&root, source));
    }

    #[test]
    fn exit_of_leaf_writes_nothing() {
        let leaf = lit(0..1);
        let mut printer = TreePrinter::new(b"7", Vec::new());
        printer.enter(&leaf).unwrap();
        printer.exit(&leaf).unwrap();
        assert_eq!(printer.into_inner(), b"(LiteralValueExpr \"7\")\n");
    }

    #[test]
    #[should_panic(expected = "leaf node should not have children")]
    fn entering_under_a_leaf_panics() {
        let leaf = lit(0..1);
        let mut printer = TreePrinter::new(b"7", Vec::new());
        printer.enter(&leaf).unwrap();
        let _ = printer.enter(&leaf);
    }

    #[test]
    fn sink_errors_propagate() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (root, source) = arithmetic();
        let err = render(&root, source, Broken).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

//! Depth-first traversal of the syntax tree
//!
//! [`walk`] calls [`Walker::enter`] for a node, recurses into its children in
//! order, then calls [`Walker::exit`] for the same node. The first error
//! returned by either callback stops the traversal.

use crate::syntax::Node;

pub trait Walker {
    type Error;

    fn enter(&mut self, node: &Node) -> Result<(), Self::Error>;
    fn exit(&mut self, node: &Node) -> Result<(), Self::Error>;
}

pub fn walk<W: Walker>(node: &Node, walker: &mut W) -> Result<(), W::Error> {
    walker.enter(node)?;
    for child in node.children() {
        walk(child, walker)?;
    }
    walker.exit(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Attribute, Body, LiteralValue, UnaryOp, Operation};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Walker for Recorder {
        type Error = String;

        fn enter(&mut self, node: &Node) -> Result<(), String> {
            if self.fail_on == Some(node.kind_name()) {
                return Err(format!("refused {}", node.kind_name()));
            }
            self.events.push(format!("enter {}", node.kind_name()));
            Ok(())
        }

        fn exit(&mut self, node: &Node) -> Result<(), String> {
            self.events.push(format!("exit {}", node.kind_name()));
            Ok(())
        }
    }

    fn sample() -> Node {
        Node::Body(Body {
            items: vec![Node::Attribute(Attribute {
                name: "a".to_string(),
                value: Box::new(Node::UnaryOp(UnaryOp {
                    op: Operation::Negate,
                    operand: Box::new(Node::LiteralValue(LiteralValue { range: 5..6 })),
                })),
            })],
        })
    }

    #[test]
    fn enters_before_and_exits_after_children() {
        let mut recorder = Recorder::default();
        walk(&sample(), &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "enter Body",
                "enter Attribute",
                "enter UnaryOpExpr",
                "enter LiteralValueExpr",
                "exit LiteralValueExpr",
                "exit UnaryOpExpr",
                "exit Attribute",
                "exit Body",
            ]
        );
    }

    #[test]
    fn stops_at_first_error() {
        let mut recorder = Recorder {
            fail_on: Some("UnaryOpExpr"),
            ..Recorder::default()
        };
        let err = walk(&sample(), &mut recorder).unwrap_err();
        assert_eq!(err, "refused UnaryOpExpr");
        assert_eq!(recorder.events, vec!["enter Body", "enter Attribute"]);
    }
}

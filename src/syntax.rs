//! HCL native syntax tree
//!
//! This module holds the syntax tree the printer consumes. It mirrors the shape
//! of HCL's native syntax AST: bodies, attributes, blocks and the expression
//! nodes. The front door in [`crate::parser`] builds it from a tree-sitter
//! concrete syntax tree, but nothing here depends on tree-sitter, so trees can
//! also be constructed by hand.
//!
//! Source snippets are not copied into the tree. Nodes that need to show their
//! raw text carry a byte range into the source buffer that was parsed.
//!
//! # Example
//!
//! ```rust
//! use hclparse::syntax::{BinaryOp, LiteralValue, Node, Operation};
//!
//! // `1 + 2`
//! let expr = Node::BinaryOp(BinaryOp {
//!     op: Operation::Add,
//!     lhs: Box::new(Node::LiteralValue(LiteralValue { range: 0..1 })),
//!     rhs: Box::new(Node::LiteralValue(LiteralValue { range: 4..5 })),
//! });
//!
//! assert_eq!(expr.kind_name(), "BinaryOpExpr");
//! assert_eq!(expr.children().len(), 2);
//! ```

use std::ops::Range;

/// A node of the syntax tree
///
/// Leaf kinds ([`Node::LiteralValue`], [`Node::ScopeTraversal`] and
/// [`Node::AnonSymbol`]) never have children. Every other kind is treated as a
/// container, even when a particular instance happens to have none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Body(Body),
    Attribute(Attribute),
    Block(Block),
    LiteralValue(LiteralValue),
    ScopeTraversal(ScopeTraversal),
    RelativeTraversal(RelativeTraversal),
    FunctionCall(FunctionCall),
    For(ForExpr),
    AnonSymbol,
    BinaryOp(BinaryOp),
    UnaryOp(UnaryOp),
    /// Any construct without dedicated formatting: templates, collections,
    /// conditionals, index and splat expressions, and CST kinds the front
    /// door does not know about.
    Other(Other),
}

/// Attributes and blocks, in source order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    pub items: Vec<Node>,
}

/// `name = value`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Box<Node>,
}

/// `type "label" label { ... }`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub block_type: String,
    /// Labels with their quotes removed
    pub labels: Vec<String>,
    pub body: Body,
}

/// A literal number, bool, null or interpolation-free string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralValue {
    pub range: Range<usize>,
}

/// A variable together with any static attribute or index steps after it,
/// e.g. `var.list[0].name`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeTraversal {
    pub range: Range<usize>,
}

/// Static steps applied to the result of another expression, e.g. the
/// `.id` in `lookup(m, k).id`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativeTraversal {
    /// Range of the steps only, not of the source expression
    pub traversal: Range<usize>,
    pub source: Box<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Node>,
}

/// `[for k, v in coll : value if cond]` or the object form with `key => value`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForExpr {
    pub key_var: Option<String>,
    pub val_var: Option<String>,
    pub collection: Box<Node>,
    /// Only present in the object form
    pub key: Option<Box<Node>>,
    pub value: Box<Node>,
    pub condition: Option<Box<Node>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryOp {
    pub op: Operation,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnaryOp {
    pub op: Operation,
    pub operand: Box<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Other {
    pub kind: String,
    pub children: Vec<Node>,
}

impl Other {
    pub fn new(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            children,
        }
    }
}

impl Node {
    /// Name printed for this node's kind
    pub fn kind_name(&self) -> &str {
        match self {
            Node::Body(_) => "Body",
            Node::Attribute(_) => "Attribute",
            Node::Block(_) => "Block",
            Node::LiteralValue(_) => "LiteralValueExpr",
            Node::ScopeTraversal(_) => "ScopeTraversalExpr",
            Node::RelativeTraversal(_) => "RelativeTraversalExpr",
            Node::FunctionCall(_) => "FunctionCallExpr",
            Node::For(_) => "ForExpr",
            Node::AnonSymbol => "AnonSymbolExpr",
            Node::BinaryOp(_) => "BinaryOpExpr",
            Node::UnaryOp(_) => "UnaryOpExpr",
            Node::Other(other) => &other.kind,
        }
    }

    /// Whether this kind of node never has children.
    ///
    /// Decided by the variant alone, never by the instance.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Node::LiteralValue(_) | Node::ScopeTraversal(_) | Node::AnonSymbol
        )
    }

    /// Direct children in the order a traversal visits them
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Body(body) => body.items.iter().collect(),
            Node::Attribute(attr) => vec![&*attr.value],
            Node::Block(block) => block.body.items.iter().collect(),
            Node::LiteralValue(_) | Node::ScopeTraversal(_) | Node::AnonSymbol => Vec::new(),
            Node::RelativeTraversal(traversal) => vec![&*traversal.source],
            Node::FunctionCall(call) => call.args.iter().collect(),
            Node::For(expr) => {
                let mut children = vec![&*expr.collection];
                children.extend(expr.key.as_deref());
                children.push(&*expr.value);
                children.extend(expr.condition.as_deref());
                children
            }
            Node::BinaryOp(op) => vec![&*op.lhs, &*op.rhs],
            Node::UnaryOp(op) => vec![&*op.operand],
            Node::Other(other) => other.children.iter().collect(),
        }
    }
}

/// Operators of the HCL expression language
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    LogicalOr,
    LogicalAnd,
    LogicalNot,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::LogicalOr,
        Operation::LogicalAnd,
        Operation::LogicalNot,
        Operation::Equal,
        Operation::NotEqual,
        Operation::GreaterThan,
        Operation::GreaterThanOrEqual,
        Operation::LessThan,
        Operation::LessThanOrEqual,
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Modulo,
        Operation::Negate,
    ];

    /// Canonical source symbol of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::LogicalOr => "||",
            Operation::LogicalAnd => "&&",
            Operation::LogicalNot => "!",
            Operation::Equal => "==",
            Operation::NotEqual => "!=",
            Operation::GreaterThan => ">",
            Operation::GreaterThanOrEqual => ">=",
            Operation::LessThan => "<",
            Operation::LessThanOrEqual => "<=",
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Modulo => "%",
            Operation::Negate => "-",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operation::LogicalNot | Operation::Negate)
    }

    /// Operator for a binary operator token, if it is one
    pub fn from_binary_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| !op.is_unary() && op.symbol() == token)
    }

    /// Operator for a unary operator token, if it is one
    pub fn from_unary_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.is_unary() && op.symbol() == token)
    }
}

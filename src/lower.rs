//! Lowering of the tree-sitter concrete syntax tree into [`crate::syntax`]
//!
//! The HCL grammar produces a concrete tree: punctuation, comments and
//! grammar-only wrapper nodes (`expression`, `operation`, `collection_value`)
//! are all present, and postfix steps such as `.attr` or `[0]` appear as flat
//! siblings of the term they apply to. Lowering folds that into HCL's native
//! AST shape: traversals, index and splat expressions, templates and the rest.
//!
//! All byte ranges are rebased onto the input slice `base..limit` of the parsed
//! text, so the front door can wrap expressions and templates in synthetic
//! source without the wrapping leaking into the tree.

use crate::syntax::{
    Attribute, BinaryOp, Block, Body, ForExpr, FunctionCall, LiteralValue, Node, Operation,
    Other, RelativeTraversal, ScopeTraversal, UnaryOp,
};
use std::ops::Range;
use tracing::trace;
use tree_sitter::Node as CstNode;

#[derive(Debug)]
pub(crate) enum LowerError {
    /// An operator token with no entry in [`Operation`]
    UnsupportedOperator { offset: usize, token: String },
    /// A CST shape the lowering does not understand
    Malformed { offset: usize, message: String },
}

type Result<T> = std::result::Result<T, LowerError>;

fn malformed(node: CstNode, message: impl Into<String>) -> LowerError {
    LowerError::Malformed {
        offset: node.start_byte(),
        message: message.into(),
    }
}

/// All children except extras (comments)
fn children(node: CstNode) -> Vec<CstNode> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

fn named_children(node: CstNode) -> Vec<CstNode> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

fn first_named<'t>(node: CstNode<'t>, kind: &str) -> Option<CstNode<'t>> {
    named_children(node).into_iter().find(|child| child.kind() == kind)
}

/// Index and splat steps are wrapped in a choice node in some grammar
/// versions; look through it.
fn unwrap_step(node: CstNode) -> CstNode {
    match node.kind() {
        "index" | "splat" => named_children(node).first().copied().unwrap_or(node),
        _ => node,
    }
}

/// The grammar nests `a ? b : c ? d : e` to the left, but HCL reads it as
/// `a ? b : (c ? d : e)`. A parenthesized condition is a ParenthesesExpr and
/// stays where it is.
fn right_associate(condition: Node, then: Node, otherwise: Node) -> Node {
    match condition {
        Node::Other(inner) if inner.kind == "ConditionalExpr" => {
            match <[Node; 3]>::try_from(inner.children) {
                Ok([first, second, third]) => {
                    right_associate(first, second, right_associate(third, then, otherwise))
                }
                Err(children) => Node::Other(Other::new(
                    "ConditionalExpr",
                    vec![Node::Other(Other::new("ConditionalExpr", children)), then, otherwise],
                )),
            }
        }
        condition => Node::Other(Other::new(
            "ConditionalExpr",
            vec![condition, then, otherwise],
        )),
    }
}

/// Whether a template node holds any interpolation or directive
fn has_template_parts(node: CstNode) -> bool {
    named_children(node).into_iter().any(|child| match child.kind() {
        "template_interpolation" | "template_directive" | "template_for" | "template_if" => true,
        _ => has_template_parts(child),
    })
}

/// An interpolation or directive of a template. The literal text of the
/// template is whatever lies between them.
struct Part {
    range: Range<usize>,
    node: Node,
    interpolation: bool,
}

pub(crate) struct Lowerer<'a> {
    text: &'a [u8],
    base: usize,
    limit: usize,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(text: &'a [u8], input: Range<usize>) -> Self {
        Self {
            text,
            base: input.start,
            limit: input.end,
        }
    }

    fn span(&self, range: Range<usize>) -> Range<usize> {
        let start = range.start.clamp(self.base, self.limit);
        let end = range.end.clamp(start, self.limit);
        start - self.base..end - self.base
    }

    fn text(&self, node: CstNode) -> String {
        String::from_utf8_lossy(&self.text[node.byte_range()]).into_owned()
    }

    /// Content between the delimiters of a quoted string
    fn quoted_inner(node: CstNode) -> Range<usize> {
        let all = children(node);
        match (all.first(), all.last()) {
            (Some(open), Some(close)) if all.len() >= 2 => open.end_byte()..close.start_byte(),
            _ => node.byte_range(),
        }
    }

    /// A `config_file` or `body` node
    pub(crate) fn document(&self, node: CstNode) -> Result<Node> {
        Ok(Node::Body(self.body(node)?))
    }

    fn body(&self, node: CstNode) -> Result<Body> {
        let mut items = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "body" => items.extend(self.body(child)?.items),
                "attribute" => items.push(self.attribute(child)?),
                "block" => items.push(self.block(child)?),
                kind => return Err(malformed(child, format!("unexpected `{kind}` in body"))),
            }
        }
        Ok(Body { items })
    }

    fn attribute(&self, node: CstNode) -> Result<Node> {
        let named = named_children(node);
        let (Some(name), Some(value)) = (named.first(), named.get(1)) else {
            return Err(malformed(node, "attribute without a value"));
        };
        Ok(Node::Attribute(Attribute {
            name: self.text(*name),
            value: Box::new(self.expression(*value)?),
        }))
    }

    fn block(&self, node: CstNode) -> Result<Node> {
        let mut block_type = None;
        let mut labels = Vec::new();
        let mut body = Body::default();
        for child in named_children(node) {
            match child.kind() {
                "identifier" if block_type.is_none() => block_type = Some(self.text(child)),
                "identifier" => labels.push(self.text(child)),
                "string_lit" => {
                    let inner = Self::quoted_inner(child);
                    labels.push(String::from_utf8_lossy(&self.text[inner]).into_owned());
                }
                "body" => body = self.body(child)?,
                _ => {}
            }
        }
        let block_type = block_type.ok_or_else(|| malformed(node, "block without a type"))?;
        Ok(Node::Block(Block {
            block_type,
            labels,
            body,
        }))
    }

    /// Lower an `expression` node or a bare expression term
    pub(crate) fn expression(&self, node: CstNode) -> Result<Node> {
        match node.kind() {
            "expression" => self.sequence(node, &children(node)),
            _ => self.term(node),
        }
    }

    /// A term followed by any number of postfix steps, possibly with the term
    /// in parentheses
    fn sequence(&self, parent: CstNode, nodes: &[CstNode]) -> Result<Node> {
        let Some((first, rest)) = nodes.split_first() else {
            return Err(malformed(parent, "empty expression"));
        };

        let (base, steps) = match first.kind() {
            "(" => {
                let inner = rest
                    .first()
                    .ok_or_else(|| malformed(*first, "empty parentheses"))?;
                let inner = self.expression(*inner)?;
                let after = rest.get(2..).unwrap_or_default();
                (Node::Other(Other::new("ParenthesesExpr", vec![inner])), after)
            }
            "variable_expr" | "identifier" => {
                let count = rest.iter().take_while(|n| self.is_static_step(**n)).count();
                let end = rest[..count]
                    .last()
                    .map_or(first.end_byte(), |step| step.end_byte());
                let range = self.span(first.start_byte()..end);
                (Node::ScopeTraversal(ScopeTraversal { range }), &rest[count..])
            }
            _ => return self.attach(self.term(*first)?, rest),
        };

        self.postfix(base, steps)
    }

    /// Apply `steps` that follow an operation in the CST.
    ///
    /// The grammar reduces `a + b` before it sees the `.c` in `a + b.c`, so
    /// the steps end up beside the operation. Attribute and index steps bind
    /// tighter than any operator; they belong to the rightmost operand.
    fn attach(&self, base: Node, steps: &[CstNode]) -> Result<Node> {
        if steps.is_empty() {
            return Ok(base);
        }
        match base {
            Node::BinaryOp(mut op) => {
                op.rhs = Box::new(self.attach(*op.rhs, steps)?);
                Ok(Node::BinaryOp(op))
            }
            Node::UnaryOp(mut op) => {
                op.operand = Box::new(self.attach(*op.operand, steps)?);
                Ok(Node::UnaryOp(op))
            }
            base => self.postfix(base, steps),
        }
    }

    fn postfix(&self, base: Node, steps: &[CstNode]) -> Result<Node> {
        let mut current = base;
        let mut i = 0;
        while i < steps.len() {
            let run = steps[i..]
                .iter()
                .take_while(|n| self.is_static_step(**n))
                .count();
            if run > 0 {
                let traversal = self.span(steps[i].start_byte()..steps[i + run - 1].end_byte());
                current = match current {
                    // `b` in `a + b.c` was lowered on its own; it grows to `b.c`
                    Node::ScopeTraversal(scope) => Node::ScopeTraversal(ScopeTraversal {
                        range: scope.range.start..traversal.end,
                    }),
                    source => Node::RelativeTraversal(RelativeTraversal {
                        traversal,
                        source: Box::new(source),
                    }),
                };
                i += run;
                continue;
            }

            let step = unwrap_step(steps[i]);
            current = match step.kind() {
                "new_index" => {
                    let key = named_children(step)
                        .first()
                        .copied()
                        .ok_or_else(|| malformed(step, "index without a key"))?;
                    let key = self.expression(key)?;
                    Node::Other(Other::new("IndexExpr", vec![current, key]))
                }
                "attr_splat" | "full_splat" => {
                    let each = self.postfix(Node::AnonSymbol, &named_children(step))?;
                    Node::Other(Other::new("SplatExpr", vec![current, each]))
                }
                kind => {
                    return Err(malformed(step, format!("unexpected `{kind}` after expression")));
                }
            };
            i += 1;
        }
        Ok(current)
    }

    /// Attribute access and indexing with a literal key can be resolved
    /// without evaluating anything
    fn is_static_step(&self, node: CstNode) -> bool {
        let step = unwrap_step(node);
        match step.kind() {
            "get_attr" | "legacy_index" => true,
            "new_index" => named_children(step)
                .first()
                .is_some_and(|key| self.is_literal(*key)),
            _ => false,
        }
    }

    fn is_literal(&self, node: CstNode) -> bool {
        match node.kind() {
            "literal_value" | "string_lit" => true,
            "expression" | "template_expr" => {
                let named = named_children(node);
                named.len() == 1 && self.is_literal(named[0])
            }
            "quoted_template" => !has_template_parts(node),
            _ => false,
        }
    }

    /// A key written as a bare name, e.g. `Name` in `{ Name = "web" }`
    fn is_bare_name(node: CstNode) -> bool {
        match node.kind() {
            "variable_expr" | "identifier" => true,
            "expression" => match children(node).as_slice() {
                [only] => Self::is_bare_name(*only),
                _ => false,
            },
            _ => false,
        }
    }

    fn term(&self, node: CstNode) -> Result<Node> {
        match node.kind() {
            "expression" => self.expression(node),
            "template_expr" | "collection_value" | "operation" | "for_expr" => {
                let inner = named_children(node)
                    .first()
                    .copied()
                    .ok_or_else(|| malformed(node, format!("empty `{}`", node.kind())))?;
                self.term(inner)
            }
            "literal_value" => {
                let range = match first_named(node, "string_lit") {
                    Some(string) => Self::quoted_inner(string),
                    None => node.byte_range(),
                };
                Ok(Node::LiteralValue(LiteralValue {
                    range: self.span(range),
                }))
            }
            "string_lit" => Ok(Node::LiteralValue(LiteralValue {
                range: self.span(Self::quoted_inner(node)),
            })),
            "variable_expr" | "identifier" => Ok(Node::ScopeTraversal(ScopeTraversal {
                range: self.span(node.byte_range()),
            })),
            "quoted_template" => self.quoted_template(node),
            "heredoc_template" => self.template(node),
            "tuple" => {
                let items = named_children(node)
                    .into_iter()
                    .filter(|child| child.kind() == "expression")
                    .map(|child| self.expression(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Other(Other::new("TupleConsExpr", items)))
            }
            "object" => self.object(node),
            "function_call" => self.function_call(node),
            "for_tuple_expr" | "for_object_expr" => self.for_expr(node),
            "unary_operation" => self.unary_operation(node),
            "binary_operation" => self.binary_operation(node),
            "conditional" => self.conditional(node),
            kind => {
                trace!(kind, "no dedicated lowering, keeping CST kind");
                let items = named_children(node)
                    .into_iter()
                    .map(|child| self.expression(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Other(Other::new(kind, items)))
            }
        }
    }

    fn object(&self, node: CstNode) -> Result<Node> {
        let mut items = Vec::new();
        for elem in named_children(node) {
            if elem.kind() != "object_elem" {
                continue;
            }
            let exprs = named_children(elem);
            let key = elem
                .child_by_field_name("key")
                .or_else(|| exprs.first().copied())
                .ok_or_else(|| malformed(elem, "object item without a key"))?;
            let value = elem
                .child_by_field_name("val")
                .or_else(|| exprs.last().copied())
                .ok_or_else(|| malformed(elem, "object item without a value"))?;
            // A bare name is a keyword, not a variable, so there is nothing to walk.
            let wrapped = if Self::is_bare_name(key) {
                Vec::new()
            } else {
                vec![self.expression(key)?]
            };
            items.push(Node::Other(Other::new("ObjectConsKeyExpr", wrapped)));
            items.push(self.expression(value)?);
        }
        Ok(Node::Other(Other::new("ObjectConsExpr", items)))
    }

    fn function_call(&self, node: CstNode) -> Result<Node> {
        let name = first_named(node, "identifier")
            .ok_or_else(|| malformed(node, "function call without a name"))?;
        let args = match first_named(node, "function_arguments") {
            Some(arguments) => named_children(arguments)
                .into_iter()
                .filter(|arg| arg.kind() == "expression")
                .map(|arg| self.expression(arg))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Node::FunctionCall(FunctionCall {
            name: self.text(name),
            args,
        }))
    }

    /// Loop variables bound by a `for` intro: `for v in` or `for k, v in`
    fn loop_vars(&self, intro: CstNode) -> Result<(Option<String>, Option<String>)> {
        let names: Vec<String> = named_children(intro)
            .into_iter()
            .filter(|child| child.kind() == "identifier")
            .map(|child| self.text(child))
            .collect();
        match <[String; 2]>::try_from(names) {
            Ok([key, value]) => Ok((Some(key), Some(value))),
            Err(names) if names.len() == 1 => Ok((None, names.into_iter().next())),
            Err(_) => Err(malformed(intro, "expected one or two loop variables")),
        }
    }

    fn for_expr(&self, node: CstNode) -> Result<Node> {
        let intro = first_named(node, "for_intro")
            .ok_or_else(|| malformed(node, "for expression without an intro"))?;
        let (key_var, val_var) = self.loop_vars(intro)?;
        let collection = first_named(intro, "expression")
            .ok_or_else(|| malformed(intro, "for expression without a collection"))?;

        let mut exprs = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "expression")
            .map(|child| self.expression(child))
            .collect::<Result<Vec<_>>>()?;
        let key = if node.kind() == "for_object_expr" && exprs.len() > 1 {
            Some(Box::new(exprs.remove(0)))
        } else {
            None
        };
        let value = exprs
            .into_iter()
            .next()
            .ok_or_else(|| malformed(node, "for expression without a result"))?;

        let condition = match first_named(node, "for_cond").and_then(|cond| first_named(cond, "expression")) {
            Some(cond) => Some(Box::new(self.expression(cond)?)),
            None => None,
        };

        Ok(Node::For(ForExpr {
            key_var,
            val_var,
            collection: Box::new(self.expression(collection)?),
            key,
            value: Box::new(value),
            condition,
        }))
    }

    fn unary_operation(&self, node: CstNode) -> Result<Node> {
        let all = children(node);
        let Some((token, operand)) = all.split_first() else {
            return Err(malformed(node, "empty unary operation"));
        };
        let op = Operation::from_unary_token(token.kind()).ok_or_else(|| {
            LowerError::UnsupportedOperator {
                offset: token.start_byte(),
                token: token.kind().to_string(),
            }
        })?;
        Ok(Node::UnaryOp(UnaryOp {
            op,
            operand: Box::new(self.sequence(node, operand)?),
        }))
    }

    fn binary_operation(&self, node: CstNode) -> Result<Node> {
        let all = children(node);
        let at = all
            .iter()
            .position(|child| !child.is_named() && !matches!(child.kind(), "(" | ")"))
            .ok_or_else(|| malformed(node, "binary operation without an operator"))?;
        let token = all[at];
        let op = Operation::from_binary_token(token.kind()).ok_or_else(|| {
            LowerError::UnsupportedOperator {
                offset: token.start_byte(),
                token: token.kind().to_string(),
            }
        })?;
        Ok(Node::BinaryOp(BinaryOp {
            op,
            lhs: Box::new(self.sequence(node, &all[..at])?),
            rhs: Box::new(self.sequence(node, &all[at + 1..])?),
        }))
    }

    fn conditional(&self, node: CstNode) -> Result<Node> {
        let all = children(node);
        let branches = all
            .split(|child| !child.is_named() && matches!(child.kind(), "?" | ":"))
            .map(|operands| self.sequence(node, operands))
            .collect::<Result<Vec<_>>>()?;
        let Ok([condition, then, otherwise]) = <[Node; 3]>::try_from(branches) else {
            return Err(malformed(node, "conditional needs three operands"));
        };
        Ok(right_associate(condition, then, otherwise))
    }

    fn quoted_template(&self, node: CstNode) -> Result<Node> {
        let content = Self::quoted_inner(node);
        if !has_template_parts(node) {
            return Ok(Node::LiteralValue(LiteralValue {
                range: self.span(content),
            }));
        }
        let parts = self.parts(node)?;
        Ok(self.template_node(content, parts, true))
    }

    /// A heredoc, or the synthetic heredoc holding a bare template
    pub(crate) fn template(&self, node: CstNode) -> Result<Node> {
        let content = self.heredoc_inner(node);
        let parts = self.parts(node)?;
        Ok(self.template_node(content, parts, true))
    }

    /// From the line after the opening delimiter up to the closing one
    fn heredoc_inner(&self, node: CstNode) -> Range<usize> {
        let delimiters: Vec<_> = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "heredoc_identifier")
            .collect();
        let [open, .., close] = delimiters.as_slice() else {
            return node.byte_range();
        };
        let mut start = open.end_byte();
        let rest = self.text.get(start..).unwrap_or_default();
        if rest.starts_with(b"\r\n") {
            start += 2;
        } else if rest.starts_with(b"\n") {
            start += 1;
        }
        start..close.start_byte().max(start)
    }

    fn parts(&self, node: CstNode) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        for child in named_children(node) {
            self.collect_part(child, &mut parts)?;
        }
        Ok(parts)
    }

    fn collect_part(&self, node: CstNode, parts: &mut Vec<Part>) -> Result<()> {
        match node.kind() {
            "template_interpolation" => {
                if let Some(expr) = first_named(node, "expression") {
                    parts.push(Part {
                        range: node.byte_range(),
                        node: self.expression(expr)?,
                        interpolation: true,
                    });
                }
            }
            "template_for" => parts.push(Part {
                range: node.byte_range(),
                node: self.template_for(node)?,
                interpolation: false,
            }),
            "template_if" => parts.push(Part {
                range: node.byte_range(),
                node: self.template_if(node)?,
                interpolation: false,
            }),
            "template_directive" | "template" => {
                for child in named_children(node) {
                    self.collect_part(child, parts)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Template over `content`, with the text between `parts` as literals.
    ///
    /// Literal ranges come from the gaps between parts rather than from the
    /// grammar's literal tokens, which leave out whitespace next to `${` and `}`.
    fn template_node(
        &self,
        content: Range<usize>,
        parts: Vec<Part>,
        wrap_lone_interpolation: bool,
    ) -> Node {
        let lone = wrap_lone_interpolation && parts.len() == 1 && parts[0].interpolation;

        let mut nodes = Vec::new();
        let mut cursor = content.start;
        for part in parts {
            nodes.extend(self.literal_part(cursor..part.range.start));
            cursor = part.range.end;
            nodes.push(part.node);
        }
        nodes.extend(self.literal_part(cursor..content.end));

        if lone && nodes.len() == 1 {
            return Node::Other(Other::new("TemplateWrapExpr", nodes));
        }
        Node::Other(Other::new("TemplateExpr", nodes))
    }

    /// Literal chunk of a template, dropped when it is empty or lies outside
    /// the input
    fn literal_part(&self, range: Range<usize>) -> Option<Node> {
        let range = self.span(range);
        (!range.is_empty()).then_some(Node::LiteralValue(LiteralValue { range }))
    }

    fn template_for(&self, node: CstNode) -> Result<Node> {
        let mut intro = None;
        let mut end = None;
        let mut parts = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "template_for_start" => intro = Some(child),
                "template_for_end" => end = Some(child),
                _ => self.collect_part(child, &mut parts)?,
            }
        }
        let intro = intro.ok_or_else(|| malformed(node, "template for without an intro"))?;
        let (key_var, val_var) = self.loop_vars(intro)?;
        let collection = first_named(intro, "expression")
            .ok_or_else(|| malformed(intro, "template for without a collection"))?;
        let body = intro.end_byte()..end.map_or(node.end_byte(), |end| end.start_byte());

        let join = Node::For(ForExpr {
            key_var,
            val_var,
            collection: Box::new(self.expression(collection)?),
            key: None,
            value: Box::new(self.template_node(body, parts, false)),
            condition: None,
        });
        Ok(Node::Other(Other::new("TemplateJoinExpr", vec![join])))
    }

    fn template_if(&self, node: CstNode) -> Result<Node> {
        let mut intro = None;
        let mut else_intro = None;
        let mut end = None;
        let mut then_parts = Vec::new();
        let mut else_parts = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "template_if_intro" => intro = Some(child),
                "template_else_intro" => else_intro = Some(child),
                "template_if_end" => end = Some(child),
                _ if else_intro.is_some() => self.collect_part(child, &mut else_parts)?,
                _ => self.collect_part(child, &mut then_parts)?,
            }
        }
        let intro = intro.ok_or_else(|| malformed(node, "template if without an intro"))?;
        let condition = first_named(intro, "expression")
            .ok_or_else(|| malformed(intro, "template if without a condition"))?;

        let end = end.map_or(node.end_byte(), |end| end.start_byte());
        let then_end = else_intro.map_or(end, |else_intro| else_intro.start_byte());
        let otherwise = match else_intro {
            Some(else_intro) => self.template_node(else_intro.end_byte()..end, else_parts, false),
            None => Node::Other(Other::new("TemplateExpr", Vec::new())),
        };
        Ok(Node::Other(Other::new(
            "ConditionalExpr",
            vec![
                self.expression(condition)?,
                self.template_node(intro.end_byte()..then_end, then_parts, false),
                otherwise,
            ],
        )))
    }
}

use super::datatype::DataType;
use super::operators::Operator;

/// Every AST node has at most this many ordered children.
pub const MAX_CHILDREN: usize = 3;

/// Statement-level node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    If,
    While,
    Compound,
    Return,
    Function,
}

/// Expression-level node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Op,
    Const,
    Id,
    IdArray,
    Call,
    Assign,
    Var,
    VarArray,
    SingleParam,
    ArrayParam,
}

/// Top-level discriminant: every node is either a statement or an
/// expression, refined by an inner kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Statement(StatementKind),
    Expression(ExpressionKind),
}

/// Kind-specific attribute: a declaration/identifier name, a constant's
/// integer value, or an operator tag. Most node kinds carry none of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Name(String),
    Value(i64),
    Op(Operator),
    None,
}

/// A single AST node, as produced by the parser and consumed read-only by
/// the analyzer and generator (the analyzer may promote `Id` to `IdArray`
/// in place, see `promote_to_array`).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub lineno: usize,
    pub node_type: DataType,
    pub attr: Attribute,
    pub children: [Option<Box<Node>>; MAX_CHILDREN],
    pub sibling: Option<Box<Node>>,
}

impl Node {
    pub fn statement(kind: StatementKind, lineno: usize) -> Self {
        Node {
            kind: NodeKind::Statement(kind),
            lineno,
            node_type: DataType::Void,
            attr: Attribute::None,
            children: Default::default(),
            sibling: None,
        }
    }

    pub fn expression(kind: ExpressionKind, lineno: usize) -> Self {
        Node {
            kind: NodeKind::Expression(kind),
            lineno,
            node_type: DataType::Void,
            attr: Attribute::None,
            children: Default::default(),
            sibling: None,
        }
    }

    pub fn with_child(mut self, index: usize, child: Node) -> Self {
        self.children[index] = Some(Box::new(child));
        self
    }

    pub fn with_sibling(mut self, sibling: Node) -> Self {
        self.sibling = Some(Box::new(sibling));
        self
    }

    pub fn with_type(mut self, node_type: DataType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.attr = Attribute::Name(name.into());
        self
    }

    pub fn with_value(mut self, value: i64) -> Self {
        self.attr = Attribute::Value(value);
        self
    }

    pub fn with_op(mut self, op: Operator) -> Self {
        self.attr = Attribute::Op(op);
        self
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index).and_then(|c| c.as_deref())
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children.get_mut(index).and_then(|c| c.as_deref_mut())
    }

    /// Iterate this node's sibling chain, starting with `self`.
    pub fn siblings(&self) -> SiblingIter<'_> {
        SiblingIter { next: Some(self) }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.attr {
            Attribute::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<i64> {
        match &self.attr {
            Attribute::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn op(&self) -> Option<Operator> {
        match &self.attr {
            Attribute::Op(op) => Some(*op),
            _ => None,
        }
    }

    pub fn is_statement(&self, kind: StatementKind) -> bool {
        matches!(self.kind, NodeKind::Statement(k) if k == kind)
    }

    pub fn is_expression(&self, kind: ExpressionKind) -> bool {
        matches!(self.kind, NodeKind::Expression(k) if k == kind)
    }

    /// Promote a resolved `Id` reference in place to `IdArray`, the kind
    /// annotation the analyzer applies once it discovers the referent was
    /// declared as an array.
    pub fn promote_to_array(&mut self) {
        if self.is_expression(ExpressionKind::Id) {
            self.kind = NodeKind::Expression(ExpressionKind::IdArray);
        }
    }
}

/// Walks a node's `sibling` linked list front to back.
pub struct SiblingIter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for SiblingIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.sibling.as_deref();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_iter_walks_chain() {
        let chain = Node::statement(StatementKind::Return, 3).with_sibling(
            Node::statement(StatementKind::Return, 2).with_sibling(Node::statement(StatementKind::Return, 1)),
        );
        let lines: Vec<usize> = chain.siblings().map(|n| n.lineno).collect();
        assert_eq!(lines, vec![3, 2, 1]);
    }

    #[test]
    fn promote_to_array_only_affects_id() {
        let mut id = Node::expression(ExpressionKind::Id, 1).with_name("a");
        id.promote_to_array();
        assert!(id.is_expression(ExpressionKind::IdArray));

        let mut call = Node::expression(ExpressionKind::Call, 1).with_name("f");
        call.promote_to_array();
        assert!(call.is_expression(ExpressionKind::Call));
    }
}

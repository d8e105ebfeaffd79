pub mod ast_node;
pub mod datatype;
pub mod operators;
pub mod scope_tracker;
pub mod symbol_table;

pub use self::{
    ast_node::{Attribute, ExpressionKind, Node, NodeKind, StatementKind},
    datatype::DataType,
    operators::Operator,
    scope_tracker::ScopeCursor,
    symbol_table::{ScopePath, Symbol, SymbolTable},
};

/// Intermediate representation produced by the parser: a tree of `Node`s
/// rooted at the program's first top-level declaration, chained through
/// `Node::sibling`.
pub struct AbstractSyntaxTree {
    root: Node,
}

impl AbstractSyntaxTree {
    pub fn new(root: Node) -> Self {
        AbstractSyntaxTree { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }
}

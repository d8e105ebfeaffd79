use super::ast::ast_node::{ExpressionKind, Node, NodeKind, StatementKind, MAX_CHILDREN};
use super::ast::datatype::DataType;
use super::ast::scope_tracker::ScopeCursor;
use super::ast::symbol_table::{ScopePath, SymbolTable};
use super::ast::AbstractSyntaxTree;
use super::diagnostics::Listing;

/// Two-pass semantic analyzer: preorder declaration insertion populates the
/// symbol table and promotes resolved array `Id` references to `IdArray`;
/// postorder type checking then walks the (now fully resolved) tree
/// enforcing the type rules. Both passes share the same traversal order
/// (top-to-bottom siblings, left-to-right children) and carry an explicit
/// `ScopeCursor` rather than mutating process-wide state.
pub struct Analyzer {
    symbols: SymbolTable,
    listing: Listing,
    global_slots: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer { symbols: SymbolTable::new(), listing: Listing::new(), global_slots: 0 }
    }

    /// Runs both passes, consuming the parser's tree and handing back the
    /// annotated tree together with the populated symbol table and the
    /// diagnostics collected along the way.
    pub fn analyze(mut self, tree: AbstractSyntaxTree, trace_analyze: bool) -> AnalysisResult {
        let mut root = Self::prepend_builtins(tree.into_root());

        let final_cursor = self.build_symtab(&mut root, ScopeCursor::root());
        self.global_slots = final_cursor.location();

        if self.symbols.lookup(&ScopePath::root(), "main").is_none() {
            self.listing.fatal("There is no main function");
        }

        if trace_analyze {
            let mut dump = String::from("Symbol table:\n\n");
            self.symbols.print_all(&mut dump).ok();
            self.listing.trace(dump);
        }

        self.type_check(&root, ScopeCursor::root());

        AnalysisResult {
            tree: AbstractSyntaxTree::new(root),
            symbols: self.symbols,
            listing: self.listing,
            global_slots: self.global_slots,
        }
    }

    /// Two built-in declarations (`input: -> Integer`, `output: (Integer)
    /// -> Void`) are prepended to the top-level sibling chain before
    /// analysis begins.
    fn prepend_builtins(user_root: Node) -> Node {
        let arg = Node::expression(ExpressionKind::SingleParam, 0).with_type(DataType::Integer).with_name("arg");
        let output = Node::statement(StatementKind::Function, 0)
            .with_type(DataType::Void)
            .with_name("output")
            .with_child(0, arg)
            .with_sibling(user_root);
        Node::statement(StatementKind::Function, 0).with_type(DataType::Integer).with_name("input").with_sibling(output)
    }

    fn build_symtab(&mut self, node: &mut Node, mut cursor: ScopeCursor) -> ScopeCursor {
        self.insert_node(node, &mut cursor);

        let child_cursor = match node.kind {
            NodeKind::Statement(StatementKind::Function) => cursor.enter_function(node.name().unwrap_or("")),
            NodeKind::Statement(StatementKind::Compound) => cursor.enter_compound(node.lineno),
            _ => cursor.clone(),
        };

        for i in 0..MAX_CHILDREN {
            if let Some(child) = node.child_mut(i) {
                self.build_symtab(child, child_cursor.clone());
            }
        }

        match node.sibling.as_deref_mut() {
            Some(sibling) => self.build_symtab(sibling, cursor),
            None => cursor,
        }
    }

    fn insert_node(&mut self, node: &mut Node, cursor: &mut ScopeCursor) {
        match node.kind {
            NodeKind::Statement(StatementKind::Function) => {
                let name = node.name().unwrap_or_default().to_string();
                if self.symbols.lookup_local(cursor.path(), &name).is_some() {
                    self.listing.declaration_error(node.lineno, format!("{} is already declared", name));
                } else {
                    let location = cursor.next_location();
                    self.symbols.insert(cursor.path(), &name, node.node_type, node.lineno, location, false);
                }
            }
            NodeKind::Expression(
                ExpressionKind::Var | ExpressionKind::VarArray | ExpressionKind::SingleParam | ExpressionKind::ArrayParam,
            ) => {
                if let Some(name) = node.name().map(str::to_string) {
                    if self.symbols.lookup_local(cursor.path(), &name).is_some() {
                        self.listing.declaration_error(node.lineno, format!("{} is already declared", name));
                    } else {
                        let is_array = matches!(
                            node.kind,
                            NodeKind::Expression(ExpressionKind::VarArray | ExpressionKind::ArrayParam)
                        );
                        let slots = if is_array { node.child(0).and_then(Node::value).unwrap_or(1) as usize } else { 1 };
                        let location = cursor.reserve(slots);
                        self.symbols.insert(cursor.path(), &name, node.node_type, node.lineno, location, is_array);
                    }
                }
            }
            NodeKind::Expression(ExpressionKind::Id) | NodeKind::Expression(ExpressionKind::Call) => {
                let name = node.name().unwrap_or_default().to_string();
                if self.symbols.lookup(cursor.path(), &name).is_none() {
                    self.listing.declaration_error(node.lineno, format!("{} is not declared", name));
                } else {
                    self.symbols.add_line(cursor.path(), &name, node.lineno);
                    if node.is_expression(ExpressionKind::Id) && self.symbols.check_array(cursor.path(), &name) {
                        node.promote_to_array();
                    }
                }
            }
            NodeKind::Expression(ExpressionKind::IdArray) => {
                let name = node.name().unwrap_or_default().to_string();
                if self.symbols.lookup(cursor.path(), &name).is_none() {
                    self.listing.declaration_error(node.lineno, format!("{} is not declared", name));
                } else {
                    self.symbols.add_line(cursor.path(), &name, node.lineno);
                }
            }
            _ => {}
        }
    }

    fn type_check(&mut self, node: &Node, cursor: ScopeCursor) {
        let child_cursor = match node.kind {
            NodeKind::Statement(StatementKind::Function) => cursor.enter_function(node.name().unwrap_or("")),
            NodeKind::Statement(StatementKind::Compound) => cursor.enter_compound(node.lineno),
            _ => cursor.clone(),
        };

        for i in 0..MAX_CHILDREN {
            if let Some(child) = node.child(i) {
                self.type_check(child, child_cursor.clone());
            }
        }

        self.check_node(node, &cursor);

        if let Some(sibling) = node.sibling.as_deref() {
            self.type_check(sibling, cursor);
        }
    }

    fn check_node(&mut self, node: &Node, cursor: &ScopeCursor) {
        match node.kind {
            NodeKind::Expression(ExpressionKind::Var | ExpressionKind::VarArray) => {
                if node.node_type == DataType::Void {
                    self.listing.type_error(node.lineno, "variable can not be void type");
                }
            }
            NodeKind::Expression(ExpressionKind::Assign) => {
                if let Some(rhs) = node.child(1) {
                    if !self.rvalue_is_integer(rhs, cursor) {
                        self.listing.type_error(node.lineno, "rvalue must be integer type");
                    }
                }
            }
            NodeKind::Statement(StatementKind::Return) => self.check_return(node, cursor),
            _ => {}
        }
    }

    /// Only an identifier, call, or indexed access has its declared type
    /// looked up; every other expression form must carry `Integer` as its
    /// own intrinsic type. This intentionally does not recurse into
    /// arithmetic subexpressions.
    fn rvalue_is_integer(&self, rhs: &Node, cursor: &ScopeCursor) -> bool {
        match rhs.kind {
            NodeKind::Expression(ExpressionKind::Id | ExpressionKind::IdArray | ExpressionKind::Call) => rhs
                .name()
                .and_then(|name| self.symbols.lookup(cursor.path(), name))
                .map(|symbol| symbol.data_type == DataType::Integer)
                .unwrap_or(true),
            _ => rhs.node_type == DataType::Integer,
        }
    }

    fn check_return(&mut self, node: &Node, cursor: &ScopeCursor) {
        match cursor.path().enclosing_function_name() {
            Some(function_name) => match self.symbols.lookup(&ScopePath::root(), function_name) {
                Some(function) => {
                    if function.data_type == DataType::Void && node.child(0).is_some() {
                        self.listing.type_error(node.lineno, "Void function can not return a value");
                    }
                }
                None => self.listing.type_error(node.lineno, format!("there is no {}", function_name)),
            },
            None => self.listing.type_error(node.lineno, "there is no enclosing function"),
        }
    }
}

/// Outcome of a full analysis run: the annotated tree, the populated symbol
/// table, the diagnostics collected, and the root scope's total slot count.
pub struct AnalysisResult {
    pub tree: AbstractSyntaxTree,
    pub symbols: SymbolTable,
    pub listing: Listing,
    pub global_slots: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::ast::operators::Operator;

    fn const_node(lineno: usize, value: i64) -> Node {
        Node::expression(ExpressionKind::Const, lineno).with_type(DataType::Integer).with_value(value)
    }

    fn main_with_body(body: Node) -> Node {
        Node::statement(StatementKind::Function, 1)
            .with_type(DataType::Integer)
            .with_name("main")
            .with_child(1, Node::statement(StatementKind::Compound, 2).with_child(1, body))
    }

    #[test]
    fn undeclared_identifier_is_reported() {
        let assign = Node::expression(ExpressionKind::Assign, 2)
            .with_child(0, Node::expression(ExpressionKind::Id, 2).with_name("y"))
            .with_child(1, const_node(2, 1));
        let root = main_with_body(assign);
        let tree = AbstractSyntaxTree::new(root);

        let result = Analyzer::new().analyze(tree, false);
        assert!(result.listing.has_errors());
        assert!(result.listing.diagnostics().iter().any(|d| d.to_string().contains("y is not declared")));
    }

    #[test]
    fn missing_main_is_fatal() {
        let root = Node::statement(StatementKind::Function, 1).with_type(DataType::Void).with_name("f");
        let tree = AbstractSyntaxTree::new(root);

        let result = Analyzer::new().analyze(tree, false);
        assert!(result.listing.diagnostics().iter().any(|d| d.to_string() == "There is no main function"));
    }

    #[test]
    fn void_function_returning_a_value_is_a_type_error() {
        let ret = Node::statement(StatementKind::Return, 1).with_child(0, const_node(1, 1));
        let root = Node::statement(StatementKind::Function, 1)
            .with_type(DataType::Void)
            .with_name("f")
            .with_child(1, Node::statement(StatementKind::Compound, 1).with_child(1, ret))
            .with_sibling(Node::statement(StatementKind::Function, 2).with_type(DataType::Integer).with_name("main"));
        let tree = AbstractSyntaxTree::new(root);

        let result = Analyzer::new().analyze(tree, false);
        assert!(result
            .listing
            .diagnostics()
            .iter()
            .any(|d| d.to_string().contains("Void function can not return a value")));
    }

    #[test]
    fn array_identifier_reference_is_promoted_in_place() {
        let decl = Node::expression(ExpressionKind::VarArray, 1)
            .with_type(DataType::Integer)
            .with_name("a")
            .with_child(0, const_node(1, 10));
        let reference = Node::expression(ExpressionKind::Id, 3).with_name("a");
        let body = decl.with_sibling(Node::expression(ExpressionKind::Op, 3).with_op(Operator::Plus).with_child(0, reference));
        let root = main_with_body(body);
        let tree = AbstractSyntaxTree::new(root);

        let result = Analyzer::new().analyze(tree, false);
        assert!(!result.listing.has_errors());
        let compound = result.tree.root().child(1).unwrap();
        let stmts = compound.child(1).unwrap();
        let op_node = stmts.siblings().nth(1).unwrap();
        let id_ref = op_node.child(0).unwrap();
        assert!(id_ref.is_expression(ExpressionKind::IdArray));
    }
}

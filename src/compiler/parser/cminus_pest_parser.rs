use pest::iterators::Pair;
use pest::Parser;

use super::super::ast::ast_node::{ExpressionKind, Node, StatementKind};
use super::super::ast::datatype::DataType;
use super::super::ast::operators::Operator;
use super::super::ast::AbstractSyntaxTree;
use super::super::diagnostics::Diagnostic;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct CMinusParser;

/// Parses source text into the AST the analyzer and generator consume. A
/// parse failure is reported the same way every other diagnostic is
/// (`syntax error:<line>: <text>`) rather than a panic, since a malformed
/// program is ordinary input, not an implementation bug.
pub fn parse(source: &str) -> Result<AbstractSyntaxTree, Diagnostic> {
    let mut pairs = CMinusParser::parse(Rule::program, source).map_err(|error| {
        let line = match error.line_col {
            pest::error::LineColLocation::Pos((line, _)) => line,
            pest::error::LineColLocation::Span((line, _), _) => line,
        };
        Diagnostic::Fatal { message: format!("syntax error:{}: {}", line, error) }
    })?;

    let program = pairs.next().expect("program rule always produces one pair");
    let declaration_list =
        program.into_inner().find(|p| p.as_rule() == Rule::declaration_list).expect("declaration_list");

    let declarations: Vec<Pair<Rule>> = declaration_list.into_inner().collect();
    let mut root: Option<Node> = None;
    for declaration in declarations.into_iter().rev() {
        let mut node = parse_declaration(declaration);
        if let Some(sibling) = root.take() {
            node = node.with_sibling(sibling);
        }
        root = Some(node);
    }

    Ok(AbstractSyntaxTree::new(root.expect("a program declares at least one function")))
}

fn lineno(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

fn type_spec(pair: Pair<Rule>) -> DataType {
    match pair.as_str() {
        "int" => DataType::Integer,
        _ => DataType::Void,
    }
}

fn parse_declaration(pair: Pair<Rule>) -> Node {
    match pair.as_rule() {
        Rule::var_declaration => parse_var_declaration(pair),
        Rule::fun_declaration => parse_fun_declaration(pair),
        other => unreachable!("declaration_list only yields declarations, got {:?}", other),
    }
}

fn parse_var_declaration(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let data_type = type_spec(inner.next().expect("var type"));
    let name = inner.next().expect("var name").as_str().to_string();
    match inner.next() {
        Some(size_pair) => {
            let size: i64 = size_pair.as_str().parse().expect("array size is an integer literal");
            let size_node = Node::expression(ExpressionKind::Const, line).with_type(DataType::Integer).with_value(size);
            Node::expression(ExpressionKind::VarArray, line).with_type(data_type).with_name(name).with_child(0, size_node)
        }
        None => Node::expression(ExpressionKind::Var, line).with_type(data_type).with_name(name),
    }
}

fn parse_fun_declaration(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let data_type = type_spec(inner.next().expect("function return type"));
    let name = inner.next().expect("function name").as_str().to_string();
    let params_pair = inner.next().expect("function params");
    let compound_pair = inner.next().expect("function body");

    let mut function = Node::statement(StatementKind::Function, line).with_type(data_type).with_name(name);
    if let Some(params) = parse_params(params_pair) {
        function = function.with_child(0, params);
    }
    function.with_child(1, parse_compound_stmt(compound_pair))
}

fn parse_params(pair: Pair<Rule>) -> Option<Node> {
    let inner = pair.into_inner().next()?;
    if inner.as_rule() != Rule::param_list {
        return None;
    }
    let params: Vec<Pair<Rule>> = inner.into_inner().collect();
    let mut chain: Option<Node> = None;
    for param in params.into_iter().rev() {
        let mut node = parse_param(param);
        if let Some(sibling) = chain.take() {
            node = node.with_sibling(sibling);
        }
        chain = Some(node);
    }
    chain
}

fn parse_param(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let data_type = type_spec(inner.next().expect("param type"));
    let name = inner.next().expect("param name").as_str().to_string();
    let is_array = inner.next().is_some();
    let kind = if is_array { ExpressionKind::ArrayParam } else { ExpressionKind::SingleParam };
    Node::expression(kind, line).with_type(data_type).with_name(name)
}

fn parse_compound_stmt(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let local_declarations = inner.next().expect("local_declarations");
    let statement_list = inner.next().expect("statement_list");

    let mut compound = Node::statement(StatementKind::Compound, line);

    let declarations: Vec<Pair<Rule>> = local_declarations.into_inner().collect();
    let mut decl_chain: Option<Node> = None;
    for declaration in declarations.into_iter().rev() {
        let mut node = parse_var_declaration(declaration);
        if let Some(sibling) = decl_chain.take() {
            node = node.with_sibling(sibling);
        }
        decl_chain = Some(node);
    }
    if let Some(decl_chain) = decl_chain {
        compound = compound.with_child(0, decl_chain);
    }

    let statements: Vec<Pair<Rule>> = statement_list.into_inner().collect();
    let mut stmt_chain: Option<Node> = None;
    for statement in statements.into_iter().rev() {
        let mut node = parse_statement(statement);
        if let Some(sibling) = stmt_chain.take() {
            node = node.with_sibling(sibling);
        }
        stmt_chain = Some(node);
    }
    if let Some(stmt_chain) = stmt_chain {
        compound = compound.with_child(1, stmt_chain);
    }

    compound
}

fn parse_statement(pair: Pair<Rule>) -> Node {
    match pair.as_rule() {
        Rule::compound_stmt => parse_compound_stmt(pair),
        Rule::if_stmt => parse_if_stmt(pair),
        Rule::while_stmt => parse_while_stmt(pair),
        Rule::return_stmt => parse_return_stmt(pair),
        Rule::expression_stmt => parse_expression_stmt(pair),
        other => unreachable!("unexpected statement rule {:?}", other),
    }
}

fn parse_if_stmt(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let test = parse_expression(inner.next().expect("if test"));
    let then_branch = parse_statement(inner.next().expect("if then branch"));
    let mut node = Node::statement(StatementKind::If, line).with_child(0, test).with_child(1, then_branch);
    if let Some(else_pair) = inner.next() {
        node = node.with_child(2, parse_statement(else_pair));
    }
    node
}

fn parse_while_stmt(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let test = parse_expression(inner.next().expect("while test"));
    let body = parse_statement(inner.next().expect("while body"));
    Node::statement(StatementKind::While, line).with_child(0, test).with_child(1, body)
}

fn parse_return_stmt(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let mut node = Node::statement(StatementKind::Return, line);
    if let Some(value) = inner.next() {
        node = node.with_child(0, parse_expression(value));
    }
    node
}

fn parse_expression_stmt(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    match pair.into_inner().next() {
        Some(expression) => parse_expression(expression),
        None => Node::expression(ExpressionKind::Const, line).with_type(DataType::Integer).with_value(0),
    }
}

fn parse_expression(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    match pair.as_rule() {
        Rule::expression => {
            let mut inner = pair.into_inner();
            let first = inner.next().expect("expression has a first child");
            match inner.next() {
                Some(rhs_pair) => {
                    let lhs = parse_var(first);
                    let rhs = parse_expression(rhs_pair);
                    Node::expression(ExpressionKind::Assign, line).with_child(0, lhs).with_child(1, rhs)
                }
                None => parse_expression(first),
            }
        }
        Rule::simple_expression => parse_binary_chain(pair, parse_relop),
        Rule::additive_expression => parse_binary_chain(pair, parse_addop),
        Rule::term => parse_binary_chain(pair, parse_mulop),
        Rule::var => parse_var(pair),
        Rule::call => parse_call(pair),
        Rule::integer => {
            let value: i64 = pair.as_str().parse().expect("integer literal");
            Node::expression(ExpressionKind::Const, line).with_type(DataType::Integer).with_value(value)
        }
        other => unreachable!("unexpected expression rule {:?}", other),
    }
}

/// Flattens pest's left-recursion-free repetition (`term ~ (op ~ term)*`)
/// into a left-associative chain of binary `Op` nodes, the same pattern the
/// original pest grammar's `equality`/`comparison`/`term`/`factor` handling
/// used for its own binary operator precedence levels.
fn parse_binary_chain(pair: Pair<Rule>, op_of: fn(Pair<Rule>) -> Operator) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let mut lhs = parse_expression(inner.next().expect("binary chain has a first operand"));
    while let Some(op_pair) = inner.next() {
        let op = op_of(op_pair.into_inner().next().expect("operator token"));
        let rhs = parse_expression(inner.next().expect("binary chain operand after operator"));
        lhs = Node::expression(ExpressionKind::Op, line).with_op(op).with_child(0, lhs).with_child(1, rhs);
    }
    lhs
}

fn parse_relop(pair: Pair<Rule>) -> Operator {
    match pair.as_rule() {
        Rule::less_than => Operator::LessThan,
        Rule::greater_than => Operator::GreaterThan,
        _ => op_from_str(pair.as_str()),
    }
}

fn parse_addop(pair: Pair<Rule>) -> Operator {
    op_from_str(pair.as_str())
}

fn parse_mulop(pair: Pair<Rule>) -> Operator {
    op_from_str(pair.as_str())
}

fn op_from_str(symbol: &str) -> Operator {
    match symbol {
        "+" => Operator::Plus,
        "-" => Operator::Minus,
        "*" => Operator::Times,
        "/" => Operator::Over,
        "<=" => Operator::LessEqual,
        "<" => Operator::LessThan,
        ">=" => Operator::GreaterEqual,
        ">" => Operator::GreaterThan,
        "==" => Operator::Equal,
        "!=" => Operator::NotEqual,
        other => unreachable!("unexpected operator token {:?}", other),
    }
}

fn parse_var(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().expect("var name").as_str().to_string();
    match inner.next() {
        Some(index_pair) => {
            let index = parse_expression(index_pair);
            Node::expression(ExpressionKind::IdArray, line).with_name(name).with_child(0, index)
        }
        None => Node::expression(ExpressionKind::Id, line).with_name(name),
    }
}

fn parse_call(pair: Pair<Rule>) -> Node {
    let line = lineno(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().expect("call name").as_str().to_string();
    let args_pair = inner.next().expect("call args");

    let mut node = Node::expression(ExpressionKind::Call, line).with_name(name);
    if let Some(arg_list) = args_pair.into_inner().next() {
        let args: Vec<Pair<Rule>> = arg_list.into_inner().collect();
        let mut chain: Option<Node> = None;
        for arg in args.into_iter().rev() {
            let mut arg_node = parse_expression(arg);
            if let Some(sibling) = chain.take() {
                arg_node = arg_node.with_sibling(sibling);
            }
            chain = Some(arg_node);
        }
        if let Some(chain) = chain {
            node = node.with_child(0, chain);
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::ast::ast_node::NodeKind;

    #[test]
    fn parses_a_minimal_main_function() {
        let source = "int main(void) { return 0; }";
        let tree = parse(source).expect("valid program parses");
        let root = tree.root();
        assert!(root.is_statement(StatementKind::Function));
        assert_eq!(root.name(), Some("main"));
    }

    #[test]
    fn parses_array_declaration_and_indexing() {
        let source = "int main(void) { int a[10]; a[0] = 1; return 0; }";
        let tree = parse(source).expect("valid program parses");
        let compound = tree.root().child(1).unwrap();
        let decl = compound.child(0).unwrap();
        assert!(decl.is_expression(ExpressionKind::VarArray));
        let assign = compound.child(1).unwrap();
        assert!(assign.is_expression(ExpressionKind::Assign));
        assert!(assign.child(0).unwrap().is_expression(ExpressionKind::IdArray));
    }

    #[test]
    fn parses_two_functions_and_a_call() {
        let source = "int helper(int x) { return x; } int main(void) { return helper(1); }";
        let tree = parse(source).expect("valid program parses");
        assert_eq!(tree.root().name(), Some("helper"));
        let main_fn = tree.root().sibling.as_deref().unwrap();
        assert_eq!(main_fn.name(), Some("main"));
        let ret = main_fn.child(1).unwrap().child(1).unwrap();
        assert!(ret.is_statement(StatementKind::Return));
        let call = ret.child(0).unwrap();
        assert!(matches!(call.kind, NodeKind::Expression(ExpressionKind::Call)));
    }

    #[test]
    fn syntax_error_reports_fatal_diagnostic() {
        let result = parse("int main(void) { return 0 }");
        assert!(result.is_err());
    }
}

pub mod emitter;

use self::emitter::{Emitter, RmOp, RoOp, Register};
use super::ast::ast_node::{ExpressionKind, Node, NodeKind, StatementKind};
use super::ast::operators::Operator;
use super::ast::symbol_table::{ScopePath, SymbolTable};
use super::ast::AbstractSyntaxTree;

/// Mirrors the original compiler's `localNameStack`: every local declared in
/// a compound is recorded with the cumulative slot depth at the moment it
/// was allocated. Looking a name up later computes its current `[mp + i]`
/// offset as `current_depth - depth_at_declaration`, which is exactly how
/// far `mp` has moved on *past* that declaration by further nested
/// allocations.
struct LocalNameStack {
    entries: Vec<(String, usize)>,
    depth: usize,
}

impl LocalNameStack {
    fn new() -> Self {
        LocalNameStack { entries: Vec::new(), depth: 0 }
    }

    fn push(&mut self, name: &str, size: usize) {
        self.depth += size;
        self.entries.push((name.to_string(), self.depth));
    }

    fn pop(&mut self, count: usize, size: usize) {
        for _ in 0..count {
            self.entries.pop();
        }
        self.depth -= size;
    }

    fn offset(&self, name: &str) -> Option<i64> {
        self.entries.iter().rev().find(|(n, _)| n == name).map(|(_, depth_at_decl)| (self.depth - depth_at_decl) as i64)
    }
}

/// Per-activation bookkeeping: the parameter stack (static, built once from
/// the function's own scope in declaration order) and the local-name stack
/// (dynamic, grows/shrinks with nested compounds).
struct Frame {
    parameters: Vec<String>,
    locals: LocalNameStack,
}

impl Frame {
    fn new(parameters: Vec<String>) -> Self {
        Frame { parameters, locals: LocalNameStack::new() }
    }

    fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == name)
    }
}

/// Code generator. Consumes the analyzer's annotated tree and symbol table
/// and produces TM assembly text.
///
/// Node child-index convention expected of the parser:
/// `If`: test, then, else(opt). `While`: test, body. `Compound`:
/// declarations(sibling chain, opt), statements(sibling chain, opt).
/// `Return`: value(opt). `Function`: parameters(sibling chain, opt),
/// body(opt, absent for the two built-ins). `Assign`: lhs, rhs. `Op`: left,
/// right. `IdArray`: index. `Call`: first argument (sibling chain).
/// `VarArray`/`ArrayParam`: array length (`Const`).
pub struct Generator<'a> {
    emitter: Emitter,
    symbols: &'a SymbolTable,
    frame: Option<Frame>,
    for_function_table: usize,
    loc_main: Option<usize>,
    tmp_offset: i64,
}

impl<'a> Generator<'a> {
    fn new(symbols: &'a SymbolTable, trace_code: bool) -> Self {
        Generator {
            emitter: Emitter::new(trace_code),
            symbols,
            frame: None,
            for_function_table: 0,
            loc_main: None,
            tmp_offset: 0,
        }
    }

    /// Runs the full code generator over `tree`, returning rendered TM
    /// assembly text.
    pub fn generate(tree: &AbstractSyntaxTree, symbols: &SymbolTable, global_slots: usize, trace_code: bool) -> String {
        let mut generator = Generator::new(symbols, trace_code);

        generator.emitter.comment("Standard prelude:");
        generator.emitter.emit_rm(RmOp::LD, Register::mp, 0, Register::ac, "load maxaddress from location 0");
        generator.emitter.emit_rm(RmOp::ST, Register::ac, 0, Register::ac, "clear location 0");
        generator.emitter.comment("End of standard prelude.");

        generator.for_function_table = generator.emitter.skip(global_slots * 2 + 1);
        generator.gen_node(tree.root());

        let loc_main = generator.loc_main.unwrap_or(0) as i64;
        let patch_at = generator.for_function_table;
        generator.emitter.backup(patch_at);
        generator.emitter.emit_ldc(Register::pc, loc_main, "jump to main");
        generator.emitter.restore();

        generator.emitter.comment("End of execution.");
        generator.emitter.emit_ro(RoOp::HALT, Register::ac, Register::ac, Register::ac, "done");
        generator.emitter.render()
    }

    fn tmp_spill(&mut self) -> i64 {
        self.tmp_offset -= 1;
        self.tmp_offset
    }

    fn tmp_reload(&mut self) -> i64 {
        let value = self.tmp_offset;
        self.tmp_offset += 1;
        value
    }

    /// Dispatches one node by kind, then continues into its sibling chain —
    /// mirrors the original's `cGen` (the generic recursive walk) layered
    /// over `genStmt`/`genExp` (the single-node generators).
    fn gen_node(&mut self, node: &Node) {
        match node.kind {
            NodeKind::Statement(_) => self.gen_stmt(node),
            NodeKind::Expression(_) => self.gen_expr(node),
        }
        if let Some(sibling) = node.sibling.as_deref() {
            self.gen_node(sibling);
        }
    }

    fn gen_stmt(&mut self, node: &Node) {
        match node.kind {
            NodeKind::Statement(StatementKind::If) => self.gen_if(node),
            NodeKind::Statement(StatementKind::While) => self.gen_while(node),
            NodeKind::Statement(StatementKind::Compound) => self.gen_compound(node),
            NodeKind::Statement(StatementKind::Return) => {
                if let Some(value) = node.child(0) {
                    self.gen_expr(value);
                }
            }
            NodeKind::Statement(StatementKind::Function) => self.gen_function(node),
            NodeKind::Expression(_) => {}
        }
    }

    fn gen_if(&mut self, node: &Node) {
        self.emitter.comment("-> if start");
        self.gen_expr(node.child(0).expect("if test expression"));
        let reserved_else = self.emitter.skip(1);
        self.emitter.comment("if: jump to else belongs here");
        if let Some(then_branch) = node.child(1) {
            self.gen_stmt(then_branch);
        }
        let reserved_end = self.emitter.skip(1);
        self.emitter.comment("if: jump to end belongs here");

        let else_target = self.emitter.here();
        self.emitter.backup(reserved_else);
        self.emitter.emit_rm_abs(RmOp::JEQ, Register::ac, else_target, "if: jmp to else");
        self.emitter.restore();

        if let Some(else_branch) = node.child(2) {
            self.gen_stmt(else_branch);
        }

        let end_target = self.emitter.here();
        self.emitter.backup(reserved_end);
        self.emitter.emit_rm_abs(RmOp::LDA, Register::pc, end_target, "jmp to end");
        self.emitter.restore();
        self.emitter.comment("<- if end");
    }

    fn gen_while(&mut self, node: &Node) {
        self.emitter.comment("-> while start");
        let loop_top = self.emitter.here();
        self.emitter.comment("while : test expression start");
        self.gen_expr(node.child(0).expect("while test expression"));
        self.emitter.comment("while : test expression end");
        let reserved_exit = self.emitter.skip(1);
        self.emitter.comment("while : body start");
        if let Some(body) = node.child(1) {
            self.gen_stmt(body);
        }
        self.emitter.comment("while : body end");
        self.emitter.emit_ldc(Register::pc, loop_top as i64, "unconditional jump");

        let exit_target = self.emitter.here();
        self.emitter.backup(reserved_exit);
        self.emitter.emit_rm_abs(RmOp::JEQ, Register::ac, exit_target, "while : false");
        self.emitter.restore();
    }

    fn gen_compound(&mut self, node: &Node) {
        self.emitter.comment(&format!("-> compound {} start", node.lineno));

        let mut tmp_size: i64 = 0;
        let mut declared = 0usize;
        if let (Some(frame), Some(declarations)) = (self.frame.as_mut(), node.child(0)) {
            for decl in declarations.siblings() {
                let name = decl.name().unwrap_or_default();
                let size = if decl.is_expression(ExpressionKind::VarArray) {
                    decl.child(0).and_then(Node::value).unwrap_or(1)
                } else {
                    1
                };
                tmp_size += size;
                frame.locals.push(name, size as usize);
                declared += 1;
            }
        }

        self.emitter.emit_ldc(Register::ac1, tmp_size, "ac1 = sum of size of local variables");
        self.emitter.emit_ro(RoOp::SUB, Register::mp, Register::mp, Register::ac1, "allocate local variables");

        if let Some(statements) = node.child(1) {
            self.gen_node(statements);
        }

        self.emitter.emit_ldc(Register::ac1, tmp_size, "ac1 = sum of size of local variables");
        self.emitter.emit_ro(RoOp::ADD, Register::mp, Register::mp, Register::ac1, "free local variable");
        if let Some(frame) = self.frame.as_mut() {
            frame.locals.pop(declared, tmp_size as usize);
        }

        self.emitter.comment(&format!("<- compound {} end", node.lineno));
    }

    fn gen_function(&mut self, node: &Node) {
        let name = node.name().unwrap_or_default().to_string();
        self.emitter.comment(&format!("-> function declaration {}", name));

        let entry = self.emitter.here();
        self.insert_function_table_entry(&name, entry);
        if name == "main" {
            self.loc_main = Some(entry);
        }

        if name == "input" {
            self.emitter.emit_ro(RoOp::IN, Register::ac, Register::ac, Register::ac, "read integer value");
        } else if name == "output" {
            self.emitter.emit_rm(RmOp::LD, Register::ac, 1, Register::fp, "load first argument");
            self.emitter.emit_ro(RoOp::OUT, Register::ac, Register::ac, Register::ac, "write ac");
        } else {
            let function_scope = ScopePath::root().enter_function(&name);
            let parameters: Vec<String> =
                self.symbols.declarations_in(&function_scope).into_iter().map(|symbol| symbol.name.clone()).collect();
            let previous_frame = self.frame.replace(Frame::new(parameters));
            if let Some(body) = node.child(1) {
                self.gen_stmt(body);
            }
            self.frame = previous_frame;
        }

        self.emitter.emit_rm(RmOp::LDA, Register::mp, 0, Register::fp, "copy fp to sp");
        self.emitter.emit_rm(RmOp::LD, Register::fp, 0, Register::mp, "pop fp");
        self.emitter.emit_ldc(Register::ac1, 1, "ac1 = 1");
        self.emitter.emit_ro(RoOp::ADD, Register::mp, Register::mp, Register::ac1, "mp = mp + ac1");
        if name != "main" {
            self.emitter.emit_rm(RmOp::LD, Register::pc, -2, Register::mp, "jump to return address");
        }
        self.emitter.comment(&format!("<- function declaration {} end", name));
    }

    /// Patches the two reserved prelude instructions for `name`: load its
    /// entry address, then store it at its own global slot, so later `Call`
    /// sites can indirect through `gp`.
    fn insert_function_table_entry(&mut self, name: &str, entry_address: usize) {
        let location = self.symbols.get_location(&ScopePath::root(), name).unwrap_or(0) as i64;
        let patch_at = self.for_function_table;
        self.for_function_table += 2;
        self.emitter.backup(patch_at);
        self.emitter.emit_ldc(Register::ac, entry_address as i64, &format!("load function location({})", entry_address));
        self.emitter.emit_rm(RmOp::ST, Register::ac, location, Register::gp, "add into memory");
        self.emitter.restore();
    }

    fn gen_expr(&mut self, node: &Node) {
        match node.kind {
            NodeKind::Expression(ExpressionKind::Const) => {
                let value = node.value().unwrap_or(0);
                self.emitter.emit_ldc(Register::ac, value, "load const");
            }
            NodeKind::Expression(ExpressionKind::Id) => {
                self.resolve_and_load(node.name().unwrap_or_default(), Register::ac);
            }
            NodeKind::Expression(ExpressionKind::IdArray) => self.gen_array_read(node),
            NodeKind::Expression(ExpressionKind::Op) => self.gen_op(node),
            NodeKind::Expression(ExpressionKind::Call) => self.gen_call(node),
            NodeKind::Expression(ExpressionKind::Assign) => self.gen_assign(node),
            NodeKind::Expression(ExpressionKind::Var | ExpressionKind::VarArray) => {}
            NodeKind::Expression(ExpressionKind::SingleParam | ExpressionKind::ArrayParam) => {}
            NodeKind::Statement(_) => {}
        }
    }

    fn gen_array_read(&mut self, node: &Node) {
        self.emitter.comment("-> array");
        self.array_base_address(node.name().unwrap_or_default());
        if let Some(index) = node.child(0) {
            let spill = self.tmp_spill();
            self.emitter.emit_rm(RmOp::ST, Register::ac, spill, Register::mp, "op: push ac");
            self.gen_expr(index);
            self.emitter.emit_rm(RmOp::LDA, Register::ac1, 0, Register::ac, "save index to ac1");
            let reload = self.tmp_reload();
            self.emitter.emit_rm(RmOp::LD, Register::ac, reload, Register::mp, "op: load ac");
            self.emitter.emit_ro(RoOp::ADD, Register::ac1, Register::ac1, Register::ac, "get location");
            self.emitter.emit_rm(RmOp::LD, Register::ac, 0, Register::ac1, "get value");
        }
    }

    fn gen_op(&mut self, node: &Node) {
        self.emitter.comment("-> Op");
        self.gen_expr(node.child(0).expect("op left operand"));
        let spill = self.tmp_spill();
        self.emitter.emit_rm(RmOp::ST, Register::ac, spill, Register::mp, "op: push left");
        self.gen_expr(node.child(1).expect("op right operand"));
        let reload = self.tmp_reload();
        self.emitter.emit_rm(RmOp::LD, Register::ac1, reload, Register::mp, "op: load left");

        let op = node.op().expect("op attribute");
        if op.is_relational() {
            self.gen_relational(op);
        } else {
            match op {
                Operator::Plus => {
                    self.emitter.emit_ro(RoOp::ADD, Register::ac, Register::ac1, Register::ac, "op +");
                }
                Operator::Minus => {
                    self.emitter.emit_ro(RoOp::SUB, Register::ac, Register::ac1, Register::ac, "op -");
                }
                Operator::Times => {
                    self.emitter.emit_ro(RoOp::MUL, Register::ac, Register::ac1, Register::ac, "op *");
                }
                Operator::Over => {
                    self.emitter.emit_ro(RoOp::DIV, Register::ac, Register::ac1, Register::ac, "op /");
                }
                _ => unreachable!("relational operators are handled above"),
            }
        }
        self.emitter.comment("<- Op");
    }

    /// Materializes a 0/1 value: subtract, then skip the false case if the
    /// conditional branch fires.
    fn gen_relational(&mut self, op: Operator) {
        let branch = match op {
            Operator::LessThan => RmOp::JLT,
            Operator::LessEqual => RmOp::JLE,
            Operator::GreaterThan => RmOp::JGT,
            Operator::GreaterEqual => RmOp::JGE,
            Operator::Equal => RmOp::JEQ,
            Operator::NotEqual => RmOp::JNE,
            _ => unreachable!("arithmetic operators are handled by the caller"),
        };
        self.emitter.emit_ro(RoOp::SUB, Register::ac, Register::ac1, Register::ac, &format!("op {}", op));
        self.emitter.emit_rm(branch, Register::ac, 2, Register::pc, "br if true");
        self.emitter.emit_rm(RmOp::LDC, Register::ac, 0, Register::ac, "false case");
        self.emitter.emit_rm(RmOp::LDA, Register::pc, 1, Register::pc, "unconditional jmp");
        self.emitter.emit_rm(RmOp::LDC, Register::ac, 1, Register::ac, "true case");
    }

    fn gen_call(&mut self, node: &Node) {
        let name = node.name().unwrap_or_default().to_string();
        self.emitter.comment(&format!("-> call function {}", name));

        let arguments: Vec<&Node> = node.child(0).map(|first| first.siblings().collect()).unwrap_or_default();
        self.tmp_offset = 0;
        for argument in arguments.iter().rev() {
            self.gen_expr(argument);
            let spill = self.tmp_spill();
            self.emitter.emit_rm(RmOp::ST, Register::ac, spill, Register::mp, "op: push argument(reverse order)");
        }
        let argument_count = arguments.len() as i64;

        self.emitter.emit_rm(RmOp::LDA, Register::mp, -argument_count, Register::mp, "stack growth after push arguments");
        self.tmp_offset = 0;
        self.emitter.emit_ldc(Register::ac1, 1, "ac1 = 1");
        self.emitter.emit_ro(RoOp::SUB, Register::mp, Register::mp, Register::ac1, "mp = mp - ac1");
        self.emitter.emit_rm(RmOp::ST, Register::fp, 0, Register::mp, "push fp");
        self.emitter.emit_rm(RmOp::LDA, Register::fp, 0, Register::mp, "copy sp to fp");
        self.emitter.emit_ro(RoOp::SUB, Register::mp, Register::mp, Register::ac1, "mp = mp - ac1");
        self.emitter.emit_ldc(Register::ac1, 2, "ac1 = 2");
        self.emitter.emit_ro(RoOp::ADD, Register::ac1, Register::ac1, Register::pc, "calculate return address");
        self.emitter.emit_rm(RmOp::ST, Register::ac1, 0, Register::mp, "push return address");

        let location = self.symbols.get_location(&ScopePath::root(), &name).unwrap_or(0) as i64;
        self.emitter.emit_rm(RmOp::LD, Register::pc, location, Register::gp, &format!("jump to function at {}", location));

        if argument_count > 0 {
            self.emitter.emit_ldc(Register::ac1, argument_count, "ac1 = numberOfArguments");
            self.emitter.emit_ro(RoOp::ADD, Register::mp, Register::mp, Register::ac1, "pop arguments");
        }
        self.emitter.comment(&format!("<- call function {} end", name));
    }

    fn gen_assign(&mut self, node: &Node) {
        let lhs = node.child(0).expect("assign target");
        let rhs = node.child(1).expect("assign value");
        self.emitter.comment(&format!("-> assign to {}", lhs.name().unwrap_or_default()));
        self.gen_expr(rhs);

        if lhs.is_expression(ExpressionKind::IdArray) {
            self.emitter.comment("-> array");
            let spill = self.tmp_spill();
            self.emitter.emit_rm(RmOp::ST, Register::ac, spill, Register::mp, "op: push ac");
            if let Some(index) = lhs.child(0) {
                self.gen_expr(index);
            }
            self.emitter.emit_rm(RmOp::LDA, Register::ac1, 0, Register::ac, "save index to ac1");
            self.array_base_address(lhs.name().unwrap_or_default());
            self.emitter.emit_ro(RoOp::ADD, Register::ac1, Register::ac, Register::ac1, "ac1 = address + index");
            let reload = self.tmp_reload();
            self.emitter.emit_rm(RmOp::LD, Register::ac, reload, Register::mp, "op: load ac");
            self.emitter.emit_rm(RmOp::ST, Register::ac, 0, Register::ac1, "store");
        } else {
            self.resolve_and_store(lhs.name().unwrap_or_default(), Register::ac);
        }
        self.emitter.comment("<- assign");
    }

    /// Name resolution at code-gen: local-name stack, then parameter stack,
    /// then global.
    fn resolve_and_load(&mut self, name: &str, dest: Register) {
        if let Some(frame) = &self.frame {
            if let Some(offset) = frame.locals.offset(name) {
                self.emitter.emit_rm(RmOp::LD, dest, offset, Register::mp, "id: load value to ac");
                return;
            }
            if let Some(index) = frame.parameter_index(name) {
                self.emitter.emit_rm(RmOp::LD, dest, index as i64 + 1, Register::fp, "id: load value to ac");
                return;
            }
        }
        let location = self.symbols.get_location(&ScopePath::root(), name).unwrap_or(0) as i64;
        self.emitter.emit_rm(RmOp::LD, dest, location, Register::gp, "id: load value to ac");
    }

    fn resolve_and_store(&mut self, name: &str, src: Register) {
        if let Some(frame) = &self.frame {
            if let Some(offset) = frame.locals.offset(name) {
                self.emitter.emit_rm(RmOp::ST, src, offset, Register::mp, "assign: store value");
                return;
            }
            if let Some(index) = frame.parameter_index(name) {
                self.emitter.emit_rm(RmOp::ST, src, index as i64 + 1, Register::fp, "assign: store value");
                return;
            }
        }
        let location = self.symbols.get_location(&ScopePath::root(), name).unwrap_or(0) as i64;
        self.emitter.emit_rm(RmOp::ST, src, location, Register::gp, "assign: store value");
    }

    /// Array base *address* (not value): locals and globals store arrays
    /// inline, so their address is just their slot; array parameters hold a
    /// pointer already, so the slot itself must be loaded.
    fn array_base_address(&mut self, name: &str) {
        if let Some(frame) = &self.frame {
            if let Some(offset) = frame.locals.offset(name) {
                self.emitter.emit_rm(RmOp::LDA, Register::ac, offset, Register::mp, "id : load address to ac");
                return;
            }
            if let Some(index) = frame.parameter_index(name) {
                self.emitter.emit_rm(RmOp::LD, Register::ac, index as i64 + 1, Register::fp, "id : load address to ac");
                return;
            }
        }
        let location = self.symbols.get_location(&ScopePath::root(), name).unwrap_or(0) as i64;
        self.emitter.emit_rm(RmOp::LDA, Register::ac, location, Register::gp, "id : load address to ac");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::ast::datatype::DataType;
    use super::super::semantic_analyzer::Analyzer;

    fn compile(source_tree: Node) -> (String, bool) {
        let tree = AbstractSyntaxTree::new(source_tree);
        let result = Analyzer::new().analyze(tree, false);
        let has_errors = result.listing.has_errors();
        let code = Generator::generate(&result.tree, &result.symbols, result.global_slots, false);
        (code, has_errors)
    }

    #[test]
    fn builtins_only_program_ends_in_halt_with_one_jump_to_main() {
        let main_fn = Node::statement(StatementKind::Function, 1)
            .with_type(DataType::Integer)
            .with_name("main")
            .with_child(1, Node::statement(StatementKind::Compound, 1));
        let (code, has_errors) = compile(main_fn);
        assert!(!has_errors);
        let lines: Vec<&str> = code.lines().collect();
        assert!(lines.last().unwrap().ends_with("HALT ac,ac,ac ;done"));
        let jump_to_main_count = lines.iter().filter(|l| l.contains("jump to main")).count();
        assert_eq!(jump_to_main_count, 1);
    }

    #[test]
    fn simple_assignment_program_generates_a_store_instruction() {
        let declare_x = Node::expression(ExpressionKind::Var, 1).with_type(DataType::Integer).with_name("x");
        let assign = Node::expression(ExpressionKind::Assign, 1)
            .with_child(0, Node::expression(ExpressionKind::Id, 1).with_name("x"))
            .with_child(
                1,
                Node::expression(ExpressionKind::Op, 1)
                    .with_op(Operator::Plus)
                    .with_child(0, Node::expression(ExpressionKind::Const, 1).with_type(DataType::Integer).with_value(3))
                    .with_child(1, Node::expression(ExpressionKind::Const, 1).with_type(DataType::Integer).with_value(4)),
            );
        let ret = Node::statement(StatementKind::Return, 1)
            .with_child(0, Node::expression(ExpressionKind::Const, 1).with_type(DataType::Integer).with_value(0));
        let compound = Node::statement(StatementKind::Compound, 1).with_child(0, declare_x).with_child(1, assign.with_sibling(ret));
        let main_fn =
            Node::statement(StatementKind::Function, 1).with_type(DataType::Integer).with_name("main").with_child(1, compound);

        let (code, has_errors) = compile(main_fn);
        assert!(!has_errors);
        assert!(code.contains("assign: store value"));
        assert!(code.contains("ADD ac,ac1,ac"));
    }

    #[test]
    fn two_function_program_emits_call_protocol_and_both_function_table_entries() {
        let helper_body = Node::statement(StatementKind::Return, 2)
            .with_child(0, Node::expression(ExpressionKind::Const, 2).with_type(DataType::Integer).with_value(1));
        let helper = Node::statement(StatementKind::Function, 2)
            .with_type(DataType::Integer)
            .with_name("one")
            .with_child(1, Node::statement(StatementKind::Compound, 2).with_child(1, helper_body));

        let call = Node::expression(ExpressionKind::Call, 5).with_name("one");
        let ret = Node::statement(StatementKind::Return, 5).with_child(0, call);
        let main_compound = Node::statement(StatementKind::Compound, 5).with_child(1, ret);
        let main_fn = Node::statement(StatementKind::Function, 5)
            .with_type(DataType::Integer)
            .with_name("main")
            .with_child(1, main_compound)
            .with_sibling(helper);

        let (code, has_errors) = compile(main_fn);
        assert!(!has_errors);
        assert!(code.contains("jump to function at"));
        assert!(code.contains("push return address"));
        assert_eq!(code.matches("load function location").count(), 3);
    }
}

use std::fmt;
use strum_macros::Display;

/// TM machine registers.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Register {
    ac,
    ac1,
    gp,
    mp,
    fp,
    pc,
}

/// Register-memory instructions: `<op> <r>,<d>(<s>)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RmOp {
    LD,
    ST,
    LDA,
    LDC,
    JLT,
    JLE,
    JGT,
    JGE,
    JEQ,
    JNE,
}

/// Register-register instructions: `<op> <r>,<s>,<t>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RoOp {
    ADD,
    SUB,
    MUL,
    DIV,
    HALT,
    IN,
    OUT,
}

enum Line {
    Instruction(usize),
    Comment(String),
}

/// The code buffer: a linear array of TM instruction lines, indexed by
/// absolute instruction address, together with the moving write cursor.
///
/// `instructions[addr]` holds the rendered body of the instruction at that
/// address (everything after the `<addr>: ` prefix); its position in the
/// vector never moves once assigned, which is what lets `backup`/`restore`
/// overwrite an earlier address without disturbing anything emitted after
/// it. `output` records emission order, including interleaved comments,
/// which always equals address order for instructions because `cursor` only
/// ever points below the high-water mark while temporarily backed up.
pub struct Emitter {
    instructions: Vec<String>,
    output: Vec<Line>,
    cursor: usize,
    saved_cursor: Option<usize>,
    trace_code: bool,
}

impl Emitter {
    pub fn new(trace_code: bool) -> Self {
        Emitter { instructions: Vec::new(), output: Vec::new(), cursor: 0, saved_cursor: None, trace_code }
    }

    fn next_address(&mut self) -> usize {
        let addr = self.cursor;
        if addr == self.instructions.len() {
            self.instructions.push(String::new());
            self.output.push(Line::Instruction(addr));
        }
        self.cursor += 1;
        addr
    }

    pub fn emit_rm(&mut self, op: RmOp, r: Register, d: i64, s: Register, comment: &str) -> usize {
        let addr = self.next_address();
        self.instructions[addr] = format!("{} {},{}({}) ;{}", op, r, d, s, comment);
        addr
    }

    pub fn emit_ro(&mut self, op: RoOp, r: Register, s: Register, t: Register, comment: &str) -> usize {
        let addr = self.next_address();
        self.instructions[addr] = format!("{} {},{},{} ;{}", op, r, s, t, comment);
        addr
    }

    /// `LDC r,value` — the `s` operand is unused by the TM's `LDC`
    /// instruction, so it is always rendered as `ac` here.
    pub fn emit_ldc(&mut self, r: Register, value: i64, comment: &str) -> usize {
        self.emit_rm(RmOp::LDC, r, value, Register::ac, comment)
    }

    /// Computes the displacement from `pc` such that `target = (addr+1) + d`,
    /// used for backpatched absolute jump targets.
    pub fn emit_rm_abs(&mut self, op: RmOp, r: Register, target: usize, comment: &str) -> usize {
        let addr = self.next_address();
        let displacement = target as i64 - (addr as i64 + 1);
        self.instructions[addr] = format!("{} {},{}(pc) ;{}", op, r, displacement, comment);
        addr
    }

    /// Emits a standalone comment line, gated on `TraceCode` like the
    /// original's `TraceCode`-conditional `emitComment` calls.
    pub fn comment(&mut self, text: &str) {
        if self.trace_code {
            self.output.push(Line::Comment(text.to_string()));
        }
    }

    /// Reserves `n` addresses and returns the first.
    pub fn skip(&mut self, n: usize) -> usize {
        let first = self.cursor;
        for _ in 0..n {
            self.next_address();
        }
        first
    }

    /// Temporarily relocates the cursor to `addr` for backpatching.
    pub fn backup(&mut self, addr: usize) {
        self.saved_cursor = Some(self.cursor);
        self.cursor = addr;
    }

    /// Returns the cursor to the high-water mark saved by the matching
    /// `backup` call.
    pub fn restore(&mut self) {
        if let Some(saved) = self.saved_cursor.take() {
            self.cursor = saved;
        }
    }

    /// Current high-water mark: the address the next sequentially-emitted
    /// instruction will land at.
    pub fn here(&self) -> usize {
        self.instructions.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.output {
            match line {
                Line::Instruction(addr) => {
                    out.push_str(&format!("{}: {}", addr, self.instructions[*addr]));
                }
                Line::Comment(text) => {
                    out.push('*');
                    out.push(' ');
                    out.push_str(text);
                }
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reserves_addresses_emit_fills_them_in_order() {
        let mut emitter = Emitter::new(false);
        emitter.emit_rm(RmOp::LD, Register::mp, 0, Register::ac, "load maxaddress");
        let reserved = emitter.skip(1);
        emitter.emit_ro(RoOp::HALT, Register::ac, Register::ac, Register::ac, "done");
        let current = emitter.here();
        emitter.backup(reserved);
        emitter.emit_rm_abs(RmOp::LDC, Register::pc, current, "jump to main");
        emitter.restore();

        let rendered = emitter.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1: LDC pc,1(pc)"));
        assert_eq!(current, 3);
    }

    #[test]
    fn comments_are_suppressed_without_trace_code() {
        let mut emitter = Emitter::new(false);
        emitter.comment("-> if start");
        emitter.emit_ro(RoOp::HALT, Register::ac, Register::ac, Register::ac, "done");
        assert_eq!(emitter.render().lines().count(), 1);
    }

    #[test]
    fn comments_interleave_with_trace_code_on() {
        let mut emitter = Emitter::new(true);
        emitter.comment("-> const 7");
        emitter.emit_rm(RmOp::LDC, Register::ac, 7, Register::ac, "load const");
        let rendered = emitter.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "* -> const 7");
        assert!(lines[1].starts_with("0: LDC ac,7(ac)"));
    }
}

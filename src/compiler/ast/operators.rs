use std::fmt;

/// Binary operator tag carried by an `Op` expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Over,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Operator {
    /// True for the relational operators, which materialize a 0/1 value
    /// rather than mapping directly onto an arithmetic TM opcode.
    pub fn is_relational(&self) -> bool {
        !matches!(self, Operator::Plus | Operator::Minus | Operator::Times | Operator::Over)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "*",
            Operator::Over => "/",
            Operator::LessThan => "<",
            Operator::LessEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterEqual => ">=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
        };
        write!(f, "{}", symbol)
    }
}

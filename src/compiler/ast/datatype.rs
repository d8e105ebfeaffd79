use std::fmt;

/// Declared type of a statement or expression node.
///
/// The source language only has two types: integer (scalar or array) and
/// the absence of a value. Arrayness is tracked separately by the node kind
/// (`Var` vs `VarArray`, `Id` vs `IdArray`,...) and by `Symbol::is_array`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Void,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "Integer"),
            DataType::Void => write!(f, "Void"),
        }
    }
}

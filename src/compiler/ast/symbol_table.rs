use super::datatype::DataType;
use std::collections::HashMap;
use std::fmt;

/// A `:`-delimited lexical scope path, e.g. `~`, `~:main`, `~:main:12`.
/// Represented as a vector of segments rather than doing string surgery on
/// a single `String` the way the original TINY compiler's `getParentScope`
/// did.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// Name of the single top-level scope every program shares.
    pub const ROOT_NAME: &'static str = "~";

    pub fn root() -> Self {
        ScopePath(vec![Self::ROOT_NAME.to_string()])
    }

    /// Scope entered by a `Function` node named `name`.
    pub fn enter_function(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        ScopePath(segments)
    }

    /// Scope entered by a `Compound` node starting at `lineno`.
    /// Two blocks can never start on the same line, so `lineno` alone
    /// disambiguates siblings.
    pub fn enter_compound(&self, lineno: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(lineno.to_string());
        ScopePath(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// The scope path obtained by stripping the last `:`-delimited segment.
    /// `None` for the root scope, which has no parent.
    pub fn parent_path(&self) -> Option<ScopePath> {
        if self.is_root() {
            None
        } else {
            Some(ScopePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The function name this scope (or one of its ancestors) is nested
    /// directly under the root within, i.e. the first segment after `~`.
    /// Used by the analyzer to find the enclosing function of a `Return`.
    pub fn enclosing_function_name(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// One declared name within one scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub data_type: DataType,
    pub location: usize,
    pub is_array: bool,
    /// Append-only, monotonic non-decreasing list of line numbers the name
    /// appears at.
    pub lines: Vec<usize>,
}

struct Scope {
    /// Declaration order, so callers that need dense slot enumeration (the
    /// code generator's parameter stack) can recover it without relying on
    /// hash iteration order.
    declared: Vec<String>,
    symbols: HashMap<String, Symbol>,
}

impl Scope {
    fn new() -> Self {
        Scope { declared: Vec::new(), symbols: HashMap::new() }
    }
}

/// Hierarchical, lexically-scoped symbol table.
///
/// Scope records are created lazily on first insertion. A scope's parent is
/// *not* stored as a pointer: it is recomputed on demand by stripping
/// `:`-segments off the scope path until a registered scope is found,
/// exactly mirroring the original `getParentScope` string-surgery algorithm
/// while keeping the data structure a plain tree rather than a graph of
/// back-pointers.
#[derive(Default)]
pub struct SymbolTable {
    scopes: HashMap<ScopePath, Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: HashMap::new() }
    }

    /// Ensure `scope` (and only `scope`, not its ancestors) exists, and
    /// insert or extend `name`'s bucket within it.
    pub fn insert(
        &mut self,
        scope: &ScopePath,
        name: &str,
        data_type: DataType,
        lineno: usize,
        location: usize,
        is_array: bool,
    ) {
        let entry = self.scopes.entry(scope.clone()).or_insert_with(Scope::new);
        match entry.symbols.get_mut(name) {
            Some(symbol) => symbol.lines.push(lineno),
            None => {
                entry.declared.push(name.to_string());
                entry.symbols.insert(
                    name.to_string(),
                    Symbol { name: name.to_string(), data_type, location, is_array, lines: vec![lineno] },
                );
            }
        }
    }

    /// Resolve `name` in `scope`, walking up through parent scopes.
    pub fn lookup(&self, scope: &ScopePath, name: &str) -> Option<&Symbol> {
        let owner = self.scope_owning(scope, name)?;
        self.scopes.get(&owner).and_then(|s| s.symbols.get(name))
    }

    /// Resolve `name` only within `scope` itself, used for redeclaration
    /// checks.
    pub fn lookup_local(&self, scope: &ScopePath, name: &str) -> Option<&Symbol> {
        self.scopes.get(scope).and_then(|s| s.symbols.get(name))
    }

    /// Append `lineno` to the line list of the symbol that resolves `name`
    /// from `scope`.
    pub fn add_line(&mut self, scope: &ScopePath, name: &str, lineno: usize) {
        if let Some(owner) = self.scope_owning(scope, name) {
            if let Some(symbol) = self.scopes.get_mut(&owner).and_then(|s| s.symbols.get_mut(name)) {
                symbol.lines.push(lineno);
            }
        }
    }

    /// Shorthand for `lookup(scope, name).location`.
    pub fn get_location(&self, scope: &ScopePath, name: &str) -> Option<usize> {
        self.lookup(scope, name).map(|s| s.location)
    }

    /// True if the resolved entry was declared as an array.
    pub fn check_array(&self, scope: &ScopePath, name: &str) -> bool {
        self.lookup(scope, name).map(|s| s.is_array).unwrap_or(false)
    }

    /// Declarations within `scope` in the order they were inserted.
    pub fn declarations_in(&self, scope: &ScopePath) -> Vec<&Symbol> {
        match self.scopes.get(scope) {
            Some(s) => s.declared.iter().filter_map(|name| s.symbols.get(name)).collect(),
            None => Vec::new(),
        }
    }

    /// Dump every scope and its buckets for diagnostics.
    pub fn print_all(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let mut scope_names: Vec<&ScopePath> = self.scopes.keys().collect();
        scope_names.sort_by_key(|path| path.to_string());
        for scope in scope_names {
            writeln!(out, "Scope name : {}", scope)?;
            writeln!(out, "----------------------------------")?;
            writeln!(out, "Variable Name Variable Type Location Line Numbers")?;
            writeln!(out, "------------- ------------- -------- ------------")?;
            for symbol in self.declarations_in(scope) {
                write!(out, "{:<14} {:<13} {:<8} ", symbol.name, symbol.data_type, symbol.location)?;
                for lineno in &symbol.lines {
                    write!(out, "{:>4} ", lineno)?;
                }
                writeln!(out)?;
            }
            writeln!(out, "----------------------------------\n")?;
        }
        Ok(())
    }

    /// Nearest registered scope reachable from `scope` by repeatedly
    /// stripping trailing segments.
    fn nearest_existing_scope(&self, scope: &ScopePath) -> Option<ScopePath> {
        let mut candidate = scope.clone();
        loop {
            if self.scopes.contains_key(&candidate) {
                return Some(candidate);
            }
            candidate = candidate.parent_path()?;
        }
    }

    fn scope_owning(&self, scope: &ScopePath, name: &str) -> Option<ScopePath> {
        let mut current = self.nearest_existing_scope(scope)?;
        loop {
            if self.scopes.get(&current).map_or(false, |s| s.symbols.contains_key(name)) {
                return Some(current);
            }
            current = self.nearest_existing_scope(&current.parent_path()?)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_scopes() {
        let mut table = SymbolTable::new();
        let root = ScopePath::root();
        let main_scope = root.enter_function("main");
        let block_scope = main_scope.enter_compound(3);

        table.insert(&root, "x", DataType::Integer, 1, 0, false);
        assert_eq!(table.lookup(&block_scope, "x").unwrap().location, 0);
        assert!(table.lookup_local(&block_scope, "x").is_none());
    }

    #[test]
    fn lookup_local_does_not_see_parent() {
        let mut table = SymbolTable::new();
        let root = ScopePath::root();
        table.insert(&root, "f", DataType::Void, 1, 0, false);
        let fn_scope = root.enter_function("f");
        assert!(table.lookup_local(&fn_scope, "f").is_none());
        assert!(table.lookup(&fn_scope, "f").is_some());
    }

    #[test]
    fn add_line_is_monotonic_and_targets_the_declaring_scope() {
        let mut table = SymbolTable::new();
        let root = ScopePath::root();
        table.insert(&root, "x", DataType::Integer, 1, 0, false);
        table.add_line(&root, "x", 5);
        table.add_line(&root, "x", 9);
        let lines = table.lookup(&root, "x").unwrap().lines.clone();
        assert_eq!(lines, vec![1, 5, 9]);
    }

    #[test]
    fn check_array_reflects_declaration() {
        let mut table = SymbolTable::new();
        let root = ScopePath::root();
        table.insert(&root, "a", DataType::Integer, 1, 0, true);
        table.insert(&root, "b", DataType::Integer, 2, 10, false);
        assert!(table.check_array(&root, "a"));
        assert!(!table.check_array(&root, "b"));
    }

    #[test]
    fn missing_intermediate_scope_resolves_via_ancestor_prefix() {
        // No declarations ever happen directly in ~:main (only in its
        // nested compound), so the ~:main scope record is never created —
        // lookup must still find globals via ~.
        let mut table = SymbolTable::new();
        let root = ScopePath::root();
        let main_scope = root.enter_function("main");
        let block_scope = main_scope.enter_compound(4);

        table.insert(&root, "g", DataType::Integer, 1, 0, false);
        table.insert(&block_scope, "y", DataType::Integer, 4, 0, false);

        assert_eq!(table.lookup(&block_scope, "g").unwrap().location, 0);
    }
}

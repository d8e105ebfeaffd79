use std::fmt;

/// Distinguishes redeclaration/undeclared-use errors (`error:<line>:
/// <text>`) from type errors (`Type error at line <line>: <text>`); a few
/// diagnostics (missing `main`) have no line at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Declaration { line: usize, message: String },
    Type { line: usize, message: String },
    Fatal { message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Declaration { line, message } => write!(f, "error:{}: {}", line, message),
            Diagnostic::Type { line, message } => write!(f, "Type error at line {}: {}", line, message),
            Diagnostic::Fatal { message } => write!(f, "{}", message),
        }
    }
}

/// The "listing" sink: an ordered record of every diagnostic plus the
/// running error state. Rather than a global mutable flag, `Listing` is
/// threaded explicitly through the analyzer and generator and queried once
/// at the end.
#[derive(Debug, Default)]
pub struct Listing {
    diagnostics: Vec<Diagnostic>,
    trace: Vec<String>,
}

impl Listing {
    pub fn new() -> Self {
        Listing::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn declaration_error(&mut self, line: usize, message: impl Into<String>) {
        self.report(Diagnostic::Declaration { line, message: message.into() });
    }

    pub fn type_error(&mut self, line: usize, message: impl Into<String>) {
        self.report(Diagnostic::Type { line, message: message.into() });
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        self.report(Diagnostic::Fatal { message: message.into() });
    }

    /// Additional listing entries gated on `TraceAnalyze`/`TraceCode`
    /// (symbol table dumps, per-construct comments) rather than errors.
    pub fn trace(&mut self, text: impl Into<String>) {
        self.trace.push(text.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn trace_lines(&self) -> &[String] {
        &self.trace
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.trace {
            out.push_str(entry);
            out.push('\n');
        }
        for diagnostic in &self.diagnostics {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_flag_tracks_any_reported_diagnostic() {
        let mut listing = Listing::new();
        assert!(!listing.has_errors());
        listing.declaration_error(3, "x is already declared");
        assert!(listing.has_errors());
    }

    #[test]
    fn renders_stable_error_strings() {
        let mut listing = Listing::new();
        listing.declaration_error(3, "x is already declared");
        listing.type_error(7, "Void function can not return a value");
        listing.fatal("There is no main function");
        let rendered = listing.render();
        assert!(rendered.contains("error:3: x is already declared"));
        assert!(rendered.contains("Type error at line 7: Void function can not return a value"));
        assert!(rendered.contains("There is no main function"));
    }
}

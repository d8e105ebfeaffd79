pub mod ast;
pub mod backend;
pub mod diagnostics;
pub mod parser;
pub mod semantic_analyzer;

use self::ast::AbstractSyntaxTree;
use self::backend::Generator;
use self::diagnostics::Listing;
use self::semantic_analyzer::Analyzer;

/// Outcome of compiling one source file: the rendered TM listing (empty if
/// compilation never reached code generation) and the accumulated
/// diagnostics.
pub struct CompileOutcome {
    pub code: String,
    pub listing: Listing,
}

impl CompileOutcome {
    pub fn has_errors(&self) -> bool {
        self.listing.has_errors()
    }
}

/// Runs the three stages in sequence — parse, analyze, generate — stopping
/// early if a stage reports an error, since code generation assumes a tree
/// the analyzer has already resolved.
pub fn compile(source: &str, trace_analyze: bool, trace_code: bool) -> CompileOutcome {
    let tree: AbstractSyntaxTree = match parser::parse(source) {
        Ok(tree) => tree,
        Err(diagnostic) => {
            let mut listing = Listing::new();
            listing.report(diagnostic);
            return CompileOutcome { code: String::new(), listing };
        }
    };

    let analysis = Analyzer::new().analyze(tree, trace_analyze);
    if analysis.listing.has_errors() {
        return CompileOutcome { code: String::new(), listing: analysis.listing };
    }

    let code = Generator::generate(&analysis.tree, &analysis.symbols, analysis.global_slots, trace_code);
    CompileOutcome { code, listing: analysis.listing }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_program_compiles_without_errors() {
        let outcome = compile("int main(void) { return 0; }", false, false);
        assert!(!outcome.has_errors());
        assert!(outcome.code.contains("HALT"));
    }

    #[test]
    fn undeclared_identifier_is_reported_and_no_code_is_emitted() {
        let outcome = compile("int main(void) { x = 1; return 0; }", false, false);
        assert!(outcome.has_errors());
        assert!(outcome.code.is_empty());
    }

    #[test]
    fn missing_main_is_reported() {
        let outcome = compile("int f(void) { return; }", false, false);
        assert!(outcome.has_errors());
        assert!(outcome.listing.render().contains("There is no main function"));
    }
}

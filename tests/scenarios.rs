use tm_compiler::compile;

#[test]
fn scenario_1_simple_assignment_reports_no_errors_and_generates_code() {
    let outcome = compile("int main(void){ int x; x = 3 + 4; return 0; }", false, false);
    assert!(!outcome.has_errors());
    assert!(outcome.listing.diagnostics().is_empty());
    assert!(outcome.code.contains("HALT"));
    assert!(outcome.code.contains("assign: store value"));
}

#[test]
fn scenario_2_undeclared_identifier_is_reported() {
    let outcome = compile("int main(void){ y = 1; }", false, false);
    assert!(outcome.has_errors());
    let rendered = outcome.listing.render();
    assert!(rendered.contains("y is not declared"));
    assert!(outcome.code.is_empty());
}

#[test]
fn scenario_3_void_function_cannot_return_a_value() {
    let outcome = compile("void f(void){ return 1; } int main(void){ return 0; }", false, false);
    assert!(outcome.has_errors());
    let rendered = outcome.listing.render();
    assert!(rendered.contains("Void function can not return a value"));
}

#[test]
fn scenario_4_missing_main_is_reported() {
    let outcome = compile("int f(void){ return 0; }", false, false);
    assert!(outcome.has_errors());
    assert!(outcome.listing.render().contains("There is no main function"));
}

#[test]
fn scenario_5_global_array_indexing_generates_address_computation() {
    let source = "int a[10]; int main(void){ a[3] = a[2] + 1; return 0; }";
    let outcome = compile(source, false, false);
    assert!(!outcome.has_errors());
    assert!(outcome.code.contains("get location"));
    assert!(outcome.code.contains("get value"));
    assert!(outcome.code.contains("id : load address to ac"));
}

#[test]
fn scenario_6_call_pushes_arguments_in_reverse_order_and_indirects_through_function_table() {
    let source = "int f(int a, int b){ return a + b; } int main(void){ return f(1, 2); }";
    let outcome = compile(source, false, false);
    assert!(!outcome.has_errors());
    assert!(outcome.code.contains("op: push argument(reverse order)"));
    assert!(outcome.code.contains("push return address"));
    assert!(outcome.code.contains("jump to function at"));
}

#[test]
fn builtins_only_program_emits_prelude_stub_and_halt() {
    let outcome = compile("int main(void){ return 0; }", false, false);
    assert!(!outcome.has_errors());
    assert!(outcome.code.contains("IN ac,ac,ac"));
    assert!(outcome.code.contains("OUT ac,ac,ac"));
    assert!(outcome.code.trim_end().lines().last().unwrap().ends_with("HALT ac,ac,ac ;done"));
}

#[test]
fn trace_analyze_dumps_the_symbol_table() {
    let outcome = compile("int main(void){ return 0; }", true, false);
    assert!(!outcome.listing.trace_lines().is_empty());
}

#[test]
fn trace_code_interleaves_construct_boundary_comments() {
    let outcome = compile("int main(void){ int x; x = 1; return 0; }", false, true);
    assert!(outcome.code.contains("-> assign to x"));
    assert!(outcome.code.contains("<- assign"));
}

#[test]
fn double_declaration_is_an_error() {
    let outcome = compile("int main(void){ int x; int x; return 0; }", false, false);
    assert!(outcome.has_errors());
    assert!(outcome.listing.render().contains("already declared"));
}

//! Evaluation and resolution tests: expressions are parsed, bound, and
//! evaluated against the real built-in environment with a null back-end.

use std::cmp::Ordering;

use crate::builtins::{BuiltinFn, Builtins};
use crate::diag::{BufferConsumer, DiagEngine, DiagKind, Diagnostic};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::render::NullBackend;
use crate::sema::Sema;
use crate::source::SourceBuffer;
use crate::symbols::SymbolTable;
use crate::types::{Type, TypedValue, Value};

fn eval_with<F>(input: &str, prepare: F) -> (Option<TypedValue>, Vec<Diagnostic>)
where
    F: FnOnce(&mut SymbolTable),
{
    let src = SourceBuffer::from_str("test.sk", input);
    let consumer = BufferConsumer::new();
    let engine = DiagEngine::new(Some(&src), &consumer);
    let mut table = SymbolTable::new();
    let builtins = Builtins::install(&mut table, Box::<NullBackend>::default());
    prepare(&mut table);
    let mut sema = Sema::new(&engine, table, builtins);
    let lexer = Lexer::new(src.bytes(), &engine);
    let mut parser = Parser::new(lexer);
    let result = parser.parse_expr().and_then(|e| {
        if sema.bind_expr_variables(&e) {
            sema.evaluate(&e)
        } else {
            None
        }
    });
    (result, consumer.diags())
}

fn eval(input: &str) -> (Option<TypedValue>, Vec<Diagnostic>) {
    eval_with(input, |_| {})
}

fn eval_ok(input: &str) -> TypedValue {
    let (result, diags) = eval(input);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    result.expect("evaluation failed")
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

#[test]
fn integer_literal() {
    let tv = eval_ok("1");
    assert_eq!(tv.ty, Type::Integer);
    assert_eq!(tv.value, Value::Int(1));
    assert!(tv.is_constant());
}

#[test]
fn dotted_literal_is_double() {
    let tv = eval_ok("1.0");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(1.0));
}

#[test]
fn literal_too_big_for_i32_is_double() {
    let tv = eval_ok("2147483648");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(2_147_483_648.0));
}

#[test]
fn parenthesised_literal_collapses() {
    let tv = eval_ok("(1.5)");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(1.5));
}

// ---------------------------------------------------------------------------
// Tuples
// ---------------------------------------------------------------------------

#[test]
fn homogeneous_tuple() {
    let tv = eval_ok("(1, 2, 3)");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert!(tv.is_constant());
}

#[test]
fn mixed_numeric_tuple_unifies_to_double() {
    let tv = eval_ok("(1, 2.0, 3)");
    assert_eq!(tv.ty, Type::tuple(Type::Double));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![
            Value::Double(1.0),
            Value::Double(2.0),
            Value::Double(3.0),
        ])
    );
}

#[test]
fn nested_tuple() {
    let tv = eval_ok("((1, 2), (3, 4))");
    assert_eq!(tv.ty, Type::tuple(Type::tuple(Type::Integer)));
}

#[test]
fn nested_tuple_unifies_elementwise() {
    let tv = eval_ok("((1, 2), (3.5, 4))");
    assert_eq!(tv.ty, Type::tuple(Type::tuple(Type::Double)));
}

#[test]
fn conflicting_tuple_elements_are_rejected() {
    let (result, diags) = eval("(1, \"a\")");
    assert!(result.is_none());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagKind::ConflictTupleElemType);
    assert_eq!(
        diags[0].message,
        "conflicting tuple element types 'Integer' and 'String'"
    );
}

// ---------------------------------------------------------------------------
// Numeric operators
// ---------------------------------------------------------------------------

#[test]
fn integer_arithmetic_stays_integer() {
    assert_eq!(eval_ok("1 + 2").value, Value::Int(3));
    assert_eq!(eval_ok("2 * 3 + 4").value, Value::Int(10));
    assert_eq!(eval_ok("6 / 2").value, Value::Int(3));
    assert_eq!(eval_ok("2 ** 3").value, Value::Int(8));
    assert_eq!(eval_ok("1 - -2").value, Value::Int(3));
}

#[test]
fn mixed_arithmetic_is_double() {
    assert_eq!(eval_ok("1 + 2.5").value, Value::Double(3.5));
    assert_eq!(eval_ok("7 / 2").value, Value::Double(3.5));
}

#[test]
fn int_overflow_escapes_to_double() {
    let tv = eval_ok("2147483647 + 1");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(2_147_483_648.0));

    let tv = eval_ok("-2147483648 - 1");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(-2_147_483_649.0));
}

#[test]
fn pow_with_integer_base_can_stay_integer() {
    let tv = eval_ok("4 ** 0.5");
    assert_eq!(tv.ty, Type::Integer);
    assert_eq!(tv.value, Value::Int(2));

    let tv = eval_ok("2 ** -1");
    assert_eq!(tv.ty, Type::Double);
    assert_eq!(tv.value, Value::Double(0.5));

    // Double base never demotes.
    let tv = eval_ok("4.0 ** 0.5");
    assert_eq!(tv.ty, Type::Double);
}

#[test]
fn division_by_zero_warns_then_fails() {
    let (result, diags) = eval("3 / 0");
    assert!(result.is_none());
    assert_eq!(diags.len(), 2);
    assert_eq!(diags[0].kind, DiagKind::DivZero);
    assert_eq!(diags[1].kind, DiagKind::InvalidBinaryResult);
}

#[test]
fn unary_minus_preserves_integer_when_it_fits() {
    assert_eq!(eval_ok("-3").value, Value::Int(-3));
    let tv = eval_ok("-(1, 2)");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert_eq!(tv.value, Value::Tuple(vec![Value::Int(-1), Value::Int(-2)]));
}

#[test]
fn unary_on_string_is_rejected() {
    let (result, diags) = eval("+\"a\"");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::InvalidUnaryOperand);
}

// ---------------------------------------------------------------------------
// String operators
// ---------------------------------------------------------------------------

#[test]
fn string_concatenation() {
    assert_eq!(eval_ok("\"a\" + \"b\"").value, Value::Str("ab".into()));
    assert_eq!(eval_ok("\"a\" + 1").value, Value::Str("a1".into()));
    assert_eq!(eval_ok("2.5 + \"a\"").value, Value::Str("2.5a".into()));
}

#[test]
fn string_repetition() {
    assert_eq!(eval_ok("\"ab\" * 2").value, Value::Str("abab".into()));
    assert_eq!(eval_ok("3 * \"x\"").value, Value::Str("xxx".into()));
    assert_eq!(eval_ok("\"ab\" * 0").value, Value::Str(String::new()));
}

#[test]
fn negative_string_repetition_is_rejected() {
    let (result, diags) = eval("\"ab\" * -1");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::MulStrNegativeNum);
    assert_eq!(diags[0].message, "cannot repeat a string -1 times");
}

#[test]
fn invalid_string_operands() {
    let (_, diags) = eval("\"a\" - \"b\"");
    assert_eq!(diags[0].kind, DiagKind::InvalidBinaryOperand);
    assert_eq!(
        diags[0].message,
        "invalid operand types 'String' and 'String' to binary expression"
    );

    let (_, diags) = eval("\"a\" * 1.5");
    assert_eq!(diags[0].kind, DiagKind::InvalidBinaryOperand);
}

// ---------------------------------------------------------------------------
// Tuple operators
// ---------------------------------------------------------------------------

#[test]
fn tuple_plus_scalar_is_elementwise() {
    let tv = eval_ok("(1, 2, 3) + 10");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![Value::Int(11), Value::Int(12), Value::Int(13)])
    );
}

#[test]
fn tuple_plus_tuple_concatenates() {
    let tv = eval_ok("(1, 2, 3) + (4, 5)");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert_eq!(tv.value.as_tuple().len(), 5);
}

#[test]
fn tuple_concatenation_unifies_element_types() {
    let tv = eval_ok("(1, 2, 3) + (4.0, 5)");
    assert_eq!(tv.ty, Type::tuple(Type::Double));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![
            Value::Double(1.0),
            Value::Double(2.0),
            Value::Double(3.0),
            Value::Double(4.0),
            Value::Double(5.0),
        ])
    );
}

#[test]
fn tuple_scalar_arithmetic() {
    assert_eq!(
        eval_ok("(2, 4) / 2").value,
        Value::Tuple(vec![Value::Int(1), Value::Int(2)])
    );
    let tv = eval_ok("(1, 2) * 2.0");
    assert_eq!(tv.ty, Type::tuple(Type::Double));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![Value::Double(2.0), Value::Double(4.0)])
    );
    assert_eq!(
        eval_ok("(3, 4) - 1").value,
        Value::Tuple(vec![Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn string_tuple_repetition_is_elementwise() {
    assert_eq!(
        eval_ok("(\"a\", \"b\") * 2").value,
        Value::Tuple(vec![Value::Str("aa".into()), Value::Str("bb".into())])
    );
}

#[test]
fn invalid_tuple_operands() {
    let (_, diags) = eval("(1, 2) - (1, 2)");
    assert_eq!(diags[0].kind, DiagKind::InvalidBinaryOperand);

    let (_, diags) = eval("1 - (1, 2)");
    assert_eq!(diags[0].kind, DiagKind::InvalidBinaryOperand);

    let (_, diags) = eval("(1, 2) + (\"a\", \"b\")");
    assert_eq!(diags[0].kind, DiagKind::InvalidBinaryOperand);
}

// ---------------------------------------------------------------------------
// Variables and binding
// ---------------------------------------------------------------------------

#[test]
fn predefined_variable_reads() {
    let tv = eval_ok("origin");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert!(!tv.is_constant());

    let tv = eval_ok("PI");
    assert_eq!(tv.ty, Type::Double);
    assert!(tv.is_constant());
}

#[test]
fn constness_propagates_through_operators() {
    assert!(eval_ok("1 + 2 * 3").is_constant());
    assert!(eval_ok("PI * 2").is_constant());
    assert!(!eval_ok("t + 1").is_constant());
    assert!(!eval_ok("(1, t)").is_constant());
    assert!(eval_ok("(1, 2)").is_constant());
}

#[test]
fn unknown_variable_with_unique_hint_binds() {
    let (result, diags) = eval("oigin");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifierWithHint);
    assert_eq!(
        diags[0].message,
        "use of unknown identifier; did you mean 'origin'?"
    );
    let fix = diags[0].fix.as_ref().expect("fix-it");
    assert_eq!(fix.text, "origin");
    // bound to the suggestion, so evaluation proceeds
    let tv = result.expect("bound to suggestion");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
}

#[test]
fn unknown_variable_without_hint() {
    let (result, diags) = eval("completely_unrelated");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifier);
}

#[test]
fn function_name_as_variable_is_rejected() {
    let (result, diags) = eval("print + 1");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::UseFuncAsVar);
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[test]
fn math_builtins() {
    assert_eq!(eval_ok("abs(-3)").value, Value::Int(3));
    assert_eq!(eval_ok("abs(-2.5)").value, Value::Double(2.5));
    assert_eq!(eval_ok("cos(0)").value, Value::Double(1.0));
    assert_eq!(eval_ok("sin(0)").value, Value::Double(0.0));
    assert_eq!(eval_ok("ln(E)").ty, Type::Double);
}

#[test]
fn color_builtin() {
    let tv = eval_ok("color(\"red\")");
    assert_eq!(tv.ty, Type::tuple(Type::Integer));
    assert_eq!(
        tv.value,
        Value::Tuple(vec![Value::Int(255), Value::Int(0), Value::Int(0)])
    );
}

#[test]
fn void_call_result() {
    let tv = eval_ok("print(1)");
    assert_eq!(tv.ty, Type::Void);
}

#[test]
fn call_argument_narrowing_warns_with_values() {
    let (result, diags) = eval("rand_int(1.5, 2)");
    assert!(result.is_some());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagKind::NarrowConversion);
    assert_eq!(
        diags[0].message,
        "implicit conversion from 'Double' to 'Integer' changes value from 1.5 to 1"
    );
}

#[test]
fn exact_integer_argument_conversion_is_silent() {
    // 4/2 evaluates to Integer 2, so no conversion happens at all.
    let (_, diags) = eval("rand_int(4 / 2, 3)");
    assert!(diags.is_empty(), "{diags:?}");

    // 2.0 converts to Integer 2 exactly, which stays silent.
    let (_, diags) = eval("rand_int(2.0, 3)");
    assert!(diags.is_empty(), "{diags:?}");
}

#[test]
fn unknown_function_with_hint() {
    let (result, diags) = eval("pirnt(1)");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifierWithHint);
    assert_eq!(
        diags[0].message,
        "use of unknown identifier; did you mean 'print'?"
    );
}

#[test]
fn variable_as_function_is_rejected() {
    let (result, diags) = eval("origin(1)");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::UseVarAsFunc);
}

#[test]
fn wrong_arity_reports_candidates() {
    let (result, diags) = eval("print(1, 2)");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::NoMatchFunc);
    assert_eq!(diags[0].message, "no matching function for call to 'print'");
    // one count-mismatch note per print overload
    assert_eq!(diags.len(), 6);
    for note in &diags[1..] {
        assert_eq!(note.kind, DiagKind::CandidateParamCountMismatch);
        assert_eq!(
            note.message,
            "candidate function not viable: requires 1 arguments, but 2 were provided"
        );
    }
}

#[test]
fn wrong_argument_type_reports_candidates() {
    let (result, diags) = eval("abs(\"x\")");
    assert!(result.is_none());
    assert_eq!(diags[0].kind, DiagKind::NoMatchFunc);
    assert_eq!(diags.len(), 3);
    assert_eq!(diags[1].kind, DiagKind::CandidateParamTypeMismatch);
    assert!(diags[1]
        .message
        .contains("no known conversion from 'String' to 'Integer' for the 1st argument"));
}

// ---------------------------------------------------------------------------
// Overload resolution over synthetic sets
// ---------------------------------------------------------------------------

fn add_triples(table: &mut SymbolTable, int_first: bool) {
    let int_params = vec![Type::Integer, Type::Integer, Type::Integer];
    let dbl_params = vec![Type::Double, Type::Double, Type::Double];
    if int_first {
        table.add_function("f", Type::Void, int_params, BuiltinFn::Stub);
        table.add_function("f", Type::Void, dbl_params, BuiltinFn::Stub);
    } else {
        table.add_function("f", Type::Void, dbl_params, BuiltinFn::Stub);
        table.add_function("f", Type::Void, int_params, BuiltinFn::Stub);
    }
}

#[test]
fn exact_match_wins_over_conversion() {
    for int_first in [true, false] {
        let (result, diags) = eval_with("f(1, 2, 3)", |t| add_triples(t, int_first));
        assert!(diags.is_empty(), "{diags:?}");
        assert!(result.is_some());
    }
}

#[test]
fn mixed_arguments_are_ambiguous() {
    // Each overload is preferred at some argument position, so neither is
    // strictly better; declaration order must not change the outcome.
    for int_first in [true, false] {
        let (result, diags) = eval_with("f(1, 2.5, 3)", |t| add_triples(t, int_first));
        assert!(result.is_none());
        assert_eq!(diags[0].kind, DiagKind::AmbiguousCall);
        assert_eq!(diags[0].message, "call to 'f(Integer, Double, Integer)' is ambiguous");
        let mut notes: Vec<&str> = diags[1..].iter().map(|d| d.message.as_str()).collect();
        notes.sort_unstable();
        assert_eq!(
            notes,
            vec![
                "candidate: Void f(Double, Double, Double)",
                "candidate: Void f(Integer, Integer, Integer)",
            ]
        );
    }
}

#[test]
fn all_double_arguments_pick_the_double_overload() {
    let (result, diags) = eval_with("f(1.0, 2.0, 3.0)", |t| add_triples(t, true));
    assert!(diags.is_empty(), "{diags:?}");
    assert!(result.is_some());
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn compare(lhs: &str, rhs: &str) -> Option<Ordering> {
    let src = SourceBuffer::from_str("test.sk", "1");
    let consumer = BufferConsumer::new();
    let engine = DiagEngine::new(Some(&src), &consumer);
    let mut table = SymbolTable::new();
    let builtins = Builtins::install(&mut table, Box::<NullBackend>::default());
    let mut sema = Sema::new(&engine, table, builtins);

    fn eval_text(sema: &mut Sema<'_>, text: &str) -> TypedValue {
        let src = SourceBuffer::from_str("cmp.sk", text);
        let consumer = BufferConsumer::new();
        let engine = DiagEngine::new(Some(&src), &consumer);
        let lexer = Lexer::new(src.bytes(), &engine);
        let mut parser = Parser::new(lexer);
        let e = parser.parse_expr().expect("parse");
        assert!(sema.bind_expr_variables(&e));
        sema.evaluate(&e).expect("evaluate")
    }
    let l = eval_text(&mut sema, lhs);
    let r = eval_text(&mut sema, rhs);
    sema.compare(&l.ty, &l.value, &r.ty, &r.value)
}

#[test]
fn numeric_comparison() {
    assert_eq!(compare("1", "2"), Some(Ordering::Less));
    assert_eq!(compare("2", "2.0"), Some(Ordering::Equal));
    assert_eq!(compare("3.5", "2"), Some(Ordering::Greater));
}

#[test]
fn string_comparison_is_lexicographic() {
    assert_eq!(compare("\"abc\"", "\"abd\""), Some(Ordering::Less));
    assert_eq!(compare("\"b\"", "\"a\""), Some(Ordering::Greater));
    assert_eq!(compare("\"a\"", "\"a\""), Some(Ordering::Equal));
}

#[test]
fn tuple_comparison_is_lexicographic_with_prefix_rule() {
    assert_eq!(compare("(1, 2)", "(1, 3)"), Some(Ordering::Less));
    assert_eq!(compare("(1, 2)", "(1, 2)"), Some(Ordering::Equal));
    assert_eq!(compare("(1, 2)", "(1, 2, 0)"), Some(Ordering::Less));
    assert_eq!(compare("(2, 0)", "(1, 9)"), Some(Ordering::Greater));
}

#[test]
fn mixed_shapes_are_incomparable() {
    assert_eq!(compare("1", "\"a\""), None);
    assert_eq!(compare("(1, 2)", "1"), None);
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

#[test]
fn conversion_lattice() {
    let src = SourceBuffer::from_str("t", "1");
    let consumer = BufferConsumer::new();
    let engine = DiagEngine::new(Some(&src), &consumer);
    let mut table = SymbolTable::new();
    let builtins = Builtins::install(&mut table, Box::<NullBackend>::default());
    let sema = Sema::new(&engine, table, builtins);

    assert!(sema.can_convert_to(&Type::Integer, &Type::Double));
    assert!(sema.can_convert_to(&Type::Double, &Type::Integer));
    assert!(sema.can_convert_to(
        &Type::tuple(Type::Integer),
        &Type::tuple(Type::Double)
    ));
    assert!(!sema.can_convert_to(&Type::Integer, &Type::String));
    assert!(!sema.can_convert_to(&Type::String, &Type::Double));
    assert!(!sema.can_convert_to(&Type::Void, &Type::Integer));
    assert!(!sema.can_convert_to(&Type::tuple(Type::Integer), &Type::Integer));

    assert_eq!(
        sema.find_common_type(&Type::Integer, &Type::Double),
        Some(Type::Double)
    );
    assert_eq!(
        sema.find_common_type(&Type::tuple(Type::Integer), &Type::tuple(Type::Double)),
        Some(Type::tuple(Type::Double))
    );
    assert_eq!(sema.find_common_type(&Type::Integer, &Type::String), None);

    let (converted, narrow) =
        sema.convert_to(TypedValue::new(Type::Double, Value::Double(2.0)), &Type::Integer);
    assert_eq!(converted.value, Value::Int(2));
    assert!(!narrow, "exact conversion must not flag narrowing");

    let (converted, narrow) =
        sema.convert_to(TypedValue::new(Type::Double, Value::Double(2.5)), &Type::Integer);
    assert_eq!(converted.value, Value::Int(2));
    assert!(narrow);
}

#[test]
fn check_double_to_int_bounds() {
    assert!(Sema::check_double_to_int(0.0));
    assert!(Sema::check_double_to_int(2_147_483_647.0));
    assert!(Sema::check_double_to_int(-2_147_483_648.0));
    assert!(!Sema::check_double_to_int(2_147_483_648.0));
    assert!(!Sema::check_double_to_int(-2_147_483_649.0));
    assert!(!Sema::check_double_to_int(0.5));
}

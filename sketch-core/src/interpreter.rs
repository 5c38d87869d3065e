//! Statement execution.
//!
//! The interpreter walks the statement list and drives the semantic layer:
//! binding on demand, evaluation, assignment (introducing runtime variables
//! on first write to an unbound name), and `for` loops. Every statement
//! executes independently: a failure abandons that statement but never its
//! siblings.

use std::cmp::Ordering;

use crate::ast::{Expr, ExprKind, Stmt};
use crate::diag::DiagKind;
use crate::sema::Sema;
use crate::symbols::DiagPack;
use crate::token::Span;
use crate::types::{Type, TypedValue, Value};

/// Executes a program against a [`Sema`] instance.
pub struct Interpreter<'a> {
    sema: Sema<'a>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter around the semantic state.
    #[must_use]
    pub fn new(sema: Sema<'a>) -> Self {
        Self { sema }
    }

    /// The semantic state, for inspection after a run.
    #[must_use]
    pub fn sema(&self) -> &Sema<'a> {
        &self.sema
    }

    /// Run every statement in order.
    pub fn run(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.exec_stmt(stmt);
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty { .. } => {}
            Stmt::Assign { lhs, rhs, .. } => self.exec_assign(lhs, rhs),
            Stmt::Expr { expr, .. } => self.exec_expr(expr),
            Stmt::For { .. } => self.exec_for(stmt),
        }
    }

    /// Evaluate an expression statement for its side effects.
    fn exec_expr(&mut self, expr: &Expr) {
        if !self.sema.bind_expr_variables(expr) {
            return;
        }
        let _ = self.sema.evaluate(expr);
    }

    /// Execute `lhs is rhs`.
    ///
    /// The right-hand side is bound and evaluated first. An unbound
    /// left-hand side either resolves to a near-miss of an existing
    /// variable (with a spelling hint) or introduces a new variable of the
    /// inferred type.
    fn exec_assign(&mut self, lhs: &Expr, rhs: &Expr) {
        if !self.sema.bind_expr_variables(rhs) {
            return;
        }
        let Some(value) = self.sema.evaluate(rhs) else {
            return;
        };
        let ExprKind::Var { name, binding } = &lhs.kind else {
            // The parser only builds assignments with a variable target.
            return;
        };
        if self.sema.try_bind_expr_variables(lhs) || self.sema.bind_typo_suggestion(lhs) {
            self.assign_to_variable(lhs, value, rhs.span);
        } else {
            if !value.ty.is_assignable() {
                self.sema
                    .diag_engine()
                    .create_at(DiagKind::DeducedVariableType, lhs.span.start)
                    .arg_str(value.ty.to_string())
                    .finish();
                return;
            }
            let id = self.sema.add_new_variable(value, name);
            binding.set(Some(id));
        }
    }

    /// Write an evaluated value into a bound variable, converting to the
    /// variable's declared type. Narrowing warns; an impossible conversion
    /// or a vetoed write fails the statement.
    fn assign_to_variable(&mut self, lhs: &Expr, value: TypedValue, rhs_span: Span) -> bool {
        let ExprKind::Var { binding, .. } = &lhs.kind else {
            return false;
        };
        let Some(id) = binding.get() else {
            return false;
        };
        let to = self.sema.table.var_type(id).clone();
        let final_value = if value.ty == to {
            value.value
        } else {
            if !self.sema.can_convert_to(&value.ty, &to) {
                self.sema
                    .diag_engine()
                    .create_range(
                        DiagKind::AssignIncompatibleType,
                        rhs_span.start,
                        rhs_span.end,
                    )
                    .arg_str(to.to_string())
                    .arg_str(value.ty.to_string())
                    .finish();
                return false;
            }
            let from_ty = value.ty.to_string();
            let from_spelling = value.value.spelling();
            let (converted, narrow) = self.sema.convert_to(value, &to);
            if narrow {
                self.sema
                    .diag_engine()
                    .create_range(DiagKind::NarrowConversion, rhs_span.start, rhs_span.end)
                    .arg_str(from_ty)
                    .arg_str(converted.ty.to_string())
                    .arg_str(from_spelling)
                    .arg_str(converted.value.spelling())
                    .finish();
            }
            converted.value
        };
        let mut pack = DiagPack::new(vec![lhs.span.start, rhs_span.start]);
        self.sema.set_variable(id, &mut pack, final_value);
        pack.success
    }

    /// Execute a `for` loop.
    ///
    /// The loop variable must already be bound. `from` (when present) is
    /// assigned once up front; the variable is then re-read on every
    /// iteration, compared against `to`, and advanced by `step` (default
    /// `Integer 1`) with the same rules as the `+` operator and an
    /// assignment back through the variable's declared type. The body runs
    /// while the variable has not passed `to`; a zero or negative step that
    /// never passes it simply keeps the loop running.
    fn exec_for(&mut self, stmt: &Stmt) {
        let Stmt::For {
            var,
            from,
            to,
            to_loc,
            step,
            step_loc,
            body,
            ..
        } = stmt
        else {
            return;
        };

        let mut bound = self.sema.bind_expr_variables(var);
        if let Some(from_expr) = from {
            bound &= self.sema.bind_expr_variables(from_expr);
        }
        bound &= self.sema.bind_expr_variables(to);
        if let Some(step_expr) = step {
            bound &= self.sema.bind_expr_variables(step_expr);
        }
        if !bound {
            return;
        }
        let ExprKind::Var { binding, .. } = &var.kind else {
            return;
        };
        let Some(var_id) = binding.get() else {
            return;
        };

        let from_value = match from {
            Some(from_expr) => match self.sema.evaluate(from_expr) {
                Some(v) => Some(v),
                None => return,
            },
            None => None,
        };
        let Some(to_value) = self.sema.evaluate(to) else {
            return;
        };
        let step_value = match step {
            Some(step_expr) => match self.sema.evaluate(step_expr) {
                Some(v) => v,
                None => return,
            },
            None => TypedValue::constant(Type::Integer, Value::Int(1)),
        };

        if let (Some(value), Some(from_expr)) = (from_value, from.as_ref()) {
            if !self.assign_to_variable(var, value, from_expr.span) {
                return;
            }
        }

        loop {
            let var_ty = self.sema.table.var_type(var_id).clone();
            let var_value = self.sema.table.var_value(var_id).clone();
            match self
                .sema
                .compare(&var_ty, &var_value, &to_value.ty, &to_value.value)
            {
                None => {
                    self.sema
                        .diag_engine()
                        .create_at(DiagKind::InvalidCompareType, *to_loc)
                        .arg_str(var_ty.to_string())
                        .arg_str(to_value.ty.to_string())
                        .finish();
                    return;
                }
                Some(Ordering::Greater) => break,
                Some(_) => {}
            }

            for body_stmt in body {
                self.exec_stmt(body_stmt);
            }

            let report_loc = if step.is_some() {
                *step_loc
            } else {
                var.span.start
            };
            if !self.sema.can_add(&var_ty, &step_value.ty) {
                self.sema
                    .diag_engine()
                    .create_at(DiagKind::InvalidBinaryOperand, report_loc)
                    .arg_str(var_ty.to_string())
                    .arg_str(step_value.ty.to_string())
                    .finish();
                return;
            }
            // Re-read: the body may have written the loop variable.
            let current = self.sema.table.var_value(var_id).clone();
            let Some(next) = self.sema.add_unchecked(
                &var_ty,
                current,
                &step_value.ty,
                step_value.value.clone(),
                report_loc,
            ) else {
                return;
            };
            if !self.assign_to_variable(var, next, Span::new(report_loc, report_loc + 1)) {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::diag::{BufferConsumer, DiagEngine, Diagnostic};
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::render::NullBackend;
    use crate::source::SourceBuffer;
    use crate::symbols::SymbolTable;
    use std::collections::HashMap;

    /// Run a whole program and snapshot every variable's final value.
    fn run_program(input: &str) -> (HashMap<String, (Type, Value)>, Vec<Diagnostic>) {
        let src = SourceBuffer::from_str("test.sk", input);
        let consumer = BufferConsumer::new();
        let engine = DiagEngine::new(Some(&src), &consumer);
        let mut table = SymbolTable::new();
        let builtins = Builtins::install(&mut table, Box::<NullBackend>::default());
        let sema = Sema::new(&engine, table, builtins);
        let lexer = Lexer::new(src.bytes(), &engine);
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program();
        let mut interp = Interpreter::new(sema);
        interp.run(&program);

        let table = &interp.sema().table;
        let vars = table
            .variables()
            .map(|(id, name)| {
                (
                    name.to_owned(),
                    (table.var_type(id).clone(), table.var_value(id).clone()),
                )
            })
            .collect();
        (vars, consumer.diags())
    }

    fn value_of(vars: &HashMap<String, (Type, Value)>, name: &str) -> Value {
        vars.get(name).unwrap_or_else(|| panic!("no var {name}")).1.clone()
    }

    // -- assignment --

    #[test]
    fn first_assignment_introduces_variable() {
        let (vars, diags) = run_program("a is 1;");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(vars["a"].0, Type::Integer);
        assert_eq!(value_of(&vars, "a"), Value::Int(1));
    }

    #[test]
    fn assignment_converts_to_declared_type() {
        // `a` is deduced Double; assigning Integer 2 widens silently.
        let (vars, diags) = run_program("a is 1.5; b is 2; a is b;");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(vars["a"].0, Type::Double);
        assert_eq!(value_of(&vars, "a"), Value::Double(2.0));
    }

    #[test]
    fn integer_expression_widens_without_warning() {
        let (vars, diags) = run_program("a is 1.5; a is 2 / 1;");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value_of(&vars, "a"), Value::Double(2.0));
    }

    #[test]
    fn narrowing_assignment_warns() {
        let (vars, diags) = run_program("line_width is 2.5;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::NarrowConversion);
        assert_eq!(
            diags[0].message,
            "implicit conversion from 'Double' to 'Integer' changes value from 2.5 to 2"
        );
        assert_eq!(value_of(&vars, "line_width"), Value::Int(2));
    }

    #[test]
    fn incompatible_assignment_is_rejected() {
        let (vars, diags) = run_program("a is 1; a is \"text\";");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::AssignIncompatibleType);
        assert_eq!(
            diags[0].message,
            "cannot assign a value of type 'String' to a variable of type 'Integer'"
        );
        assert_eq!(value_of(&vars, "a"), Value::Int(1));
    }

    #[test]
    fn constants_cannot_be_assigned() {
        let (vars, diags) = run_program("PI is 3;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::AssignConstant);
        assert_eq!(
            value_of(&vars, "PI"),
            Value::Double(std::f64::consts::PI)
        );
    }

    #[test]
    fn void_result_cannot_define_a_variable() {
        let (vars, diags) = run_program("v is print(1);");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::DeducedVariableType);
        assert!(!vars.contains_key("v"));
    }

    #[test]
    fn assignment_to_near_miss_binds_with_hint() {
        let (vars, diags) = run_program("oigin is (1, 2);");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifierWithHint);
        let fix = diags[0].fix.as_ref().expect("fix-it");
        assert_eq!(fix.text, "origin");
        assert_eq!(fix.replace_range, (0, 5));
        // the assignment lands on `origin`; no variable `oigin` appears
        assert!(!vars.contains_key("oigin"));
        assert_eq!(
            value_of(&vars, "origin"),
            Value::Tuple(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn typo_corrected_keyword_still_assigns() {
        let (vars, diags) = run_program("abc it 123;");
        assert_eq!(diags.len(), 1); // the parser's fix-it
        assert_eq!(vars["abc"].0, Type::Integer);
        assert_eq!(value_of(&vars, "abc"), Value::Int(123));
    }

    // -- value filters --

    #[test]
    fn origin_size_filter_vetoes_write() {
        let (vars, diags) = run_program("origin is (1, 2, 3);");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::AssignElemCount);
        assert_eq!(
            value_of(&vars, "origin"),
            Value::Tuple(vec![Value::Int(0), Value::Int(0)])
        );
    }

    #[test]
    fn background_locked_after_first_draw() {
        let (vars, diags) =
            run_program("draw(1.0, 2.0); background_size is (300, 300);");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::SetAfterDrawing);
        assert_eq!(
            value_of(&vars, "background_size"),
            Value::Tuple(vec![Value::Int(500), Value::Int(500)])
        );
    }

    #[test]
    fn background_adjustable_before_first_draw() {
        let (vars, diags) = run_program("background_size is (300, 200);");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(
            value_of(&vars, "background_size"),
            Value::Tuple(vec![Value::Int(300), Value::Int(200)])
        );
    }

    // -- statement independence --

    #[test]
    fn failed_statement_does_not_stop_the_program() {
        let (vars, diags) = run_program("x + 1; a is 2;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifier);
        assert_eq!(value_of(&vars, "a"), Value::Int(2));
    }

    // -- for loops --

    #[test]
    fn for_loop_runs_inclusive_of_bound() {
        let (vars, diags) = run_program("i is 0; n is 0; for i from 1 to 3 { n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value_of(&vars, "n"), Value::Int(3));
        assert_eq!(value_of(&vars, "i"), Value::Int(4));
    }

    #[test]
    fn for_loop_with_step() {
        let (vars, diags) = run_program("i is 0; n is 0; for i from 1 to 10 step 4 { n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        // iterations at 1, 5, 9
        assert_eq!(value_of(&vars, "n"), Value::Int(3));
        assert_eq!(value_of(&vars, "i"), Value::Int(13));
    }

    #[test]
    fn for_loop_default_from_uses_current_value() {
        let (vars, diags) = run_program("i is 2; n is 0; for i to 3 { n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value_of(&vars, "n"), Value::Int(2));
    }

    #[test]
    fn for_loop_past_bound_never_runs() {
        let (vars, diags) = run_program("i is 5; n is 0; for i to 3 { n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value_of(&vars, "n"), Value::Int(0));
        assert_eq!(value_of(&vars, "i"), Value::Int(5));
    }

    #[test]
    fn for_loop_body_sees_fresh_variable_value() {
        // the body advances the loop variable itself
        let (vars, diags) = run_program("i is 0; n is 0; for i from 1 to 10 { i is i + 4; n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        // i: 1 -> body sets 5, step -> 6 -> body sets 10, step -> 11
        assert_eq!(value_of(&vars, "n"), Value::Int(2));
    }

    #[test]
    fn for_loop_incomparable_bound_is_reported() {
        let (_, diags) = run_program("s is \"x\"; for s to 3;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::InvalidCompareType);
        assert_eq!(diags[0].message, "cannot compare 'String' with 'Integer'");
    }

    #[test]
    fn for_loop_over_unknown_variable_is_reported() {
        let (_, diags) = run_program("for zz_loop to 3;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::UseUnknownIdentifier);
    }

    #[test]
    fn for_loop_with_double_variable() {
        let (vars, diags) =
            run_program("x is 0.0; n is 0; for x from 0.5 to 2.0 step 0.5 { n is n + 1; }");
        assert!(diags.is_empty(), "{diags:?}");
        // iterations at 0.5, 1.0, 1.5, 2.0
        assert_eq!(value_of(&vars, "n"), Value::Int(4));
    }
}

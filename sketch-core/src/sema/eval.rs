//! Expression evaluation.
//!
//! Walks a bound expression tree and produces a [`TypedValue`], threading
//! constness through operators, converting call arguments to parameter
//! types (with narrowing warnings), and dispatching built-in calls. A
//! `None` result means a diagnostic has already been reported.

use crate::ast::{Expr, ExprKind};
use crate::diag::DiagKind;
use crate::symbols::DiagPack;
use crate::types::{Type, TypedValue, Value};

use super::Sema;

impl Sema<'_> {
    /// Evaluate a bound expression. Variable nodes must have been bound via
    /// [`Self::bind_expr_variables`] first; call nodes bind their overload
    /// lazily on first evaluation.
    pub fn evaluate(&mut self, e: &Expr) -> Option<TypedValue> {
        match &e.kind {
            ExprKind::Num { value, has_dot } => {
                if !has_dot && Self::check_double_to_int(*value) {
                    #[allow(clippy::cast_possible_truncation)]
                    return Some(TypedValue::constant(Type::Integer, Value::Int(*value as i32)));
                }
                Some(TypedValue::constant(Type::Double, Value::Double(*value)))
            }
            ExprKind::Str(text) => {
                Some(TypedValue::constant(Type::String, Value::Str(text.clone())))
            }
            ExprKind::Var { binding, .. } => {
                let id = binding.get()?;
                let ty = self.table.var_type(id).clone();
                let value = self.table.var_value(id).clone();
                Some(if self.table.is_constant(id) {
                    TypedValue::constant(ty, value)
                } else {
                    TypedValue::new(ty, value)
                })
            }
            ExprKind::Tuple(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                let mut failed = false;
                for elem in elems {
                    match self.evaluate(elem) {
                        Some(v) => values.push(v),
                        None => failed = true,
                    }
                }
                if failed {
                    return None;
                }
                let locs: Vec<usize> = elems.iter().map(|e| e.span.start).collect();
                self.tidy_tuple(values, Some(&locs))
            }
            ExprKind::Call {
                name,
                name_span,
                args,
                binding,
            } => self.eval_call(name, name_span.start, args, binding),
            ExprKind::Binary {
                op,
                op_loc,
                lhs,
                rhs,
            } => {
                // Evaluate both sides before failing so each reports its
                // own problems.
                let l = self.evaluate(lhs);
                let r = self.evaluate(rhs);
                let (l, r) = (l?, r?);
                if !self.can_binary(*op, &l.ty, &r.ty) {
                    self.diag_engine()
                        .create_at(DiagKind::InvalidBinaryOperand, *op_loc)
                        .arg_str(l.ty.to_string())
                        .arg_str(r.ty.to_string())
                        .finish();
                    return None;
                }
                let constant = l.is_constant() && r.is_constant();
                let mut result = self.binary_unchecked(*op, &l.ty, l.value, &r.ty, r.value, *op_loc)?;
                if constant {
                    result.make_constant();
                }
                Some(result)
            }
            ExprKind::Unary { op, op_loc, operand } => {
                let operand_value = self.evaluate(operand)?;
                if !self.can_unary(*op, &operand_value.ty) {
                    self.diag_engine()
                        .create_at(DiagKind::InvalidUnaryOperand, *op_loc)
                        .arg_str(operand_value.ty.to_string())
                        .finish();
                    return None;
                }
                let constant = operand_value.is_constant();
                let mut result =
                    self.unary_unchecked(*op, &operand_value.ty, operand_value.value, *op_loc)?;
                if constant {
                    result.make_constant();
                }
                Some(result)
            }
            ExprKind::Error => None,
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        name_loc: usize,
        args: &[Expr],
        binding: &std::cell::Cell<Option<crate::symbols::FnId>>,
    ) -> Option<TypedValue> {
        let mut values = Vec::with_capacity(args.len());
        let mut failed = false;
        for arg in args {
            match self.evaluate(arg) {
                Some(v) => values.push(v),
                None => failed = true,
            }
        }
        if failed {
            return None;
        }

        if binding.get().is_none() {
            let arg_types: Vec<&Type> = values.iter().map(|v| &v.ty).collect();
            let resolved = self.overload_resolution(name, name_loc, &arg_types)?;
            binding.set(Some(resolved));
        }
        let fn_id = binding.get()?;
        let (ret, params, imp) = {
            let info = self.table.function(fn_id);
            (info.ret().clone(), info.params().to_vec(), info.imp())
        };

        // Convert each argument to its parameter type, warning when a
        // narrowing conversion changes the value.
        let mut call_args = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let from_ty = value.ty.to_string();
            let from_spelling = value.value.spelling();
            let (converted, narrow) = self.convert_to(value, &params[i]);
            if narrow {
                self.diag_engine()
                    .create_range(
                        DiagKind::NarrowConversion,
                        args[i].span.start,
                        args[i].span.end,
                    )
                    .arg_str(from_ty)
                    .arg_str(converted.ty.to_string())
                    .arg_str(from_spelling)
                    .arg_str(converted.value.spelling())
                    .finish();
            }
            call_args.push(converted.value);
        }

        let locs: Vec<usize> = args
            .iter()
            .flat_map(|a| [a.span.start, a.span.end])
            .collect();
        let mut pack = DiagPack::new(locs);
        let result = self
            .builtins
            .call(imp, self.diag, &mut pack, &call_args, &self.table);
        if pack.success {
            Some(TypedValue::new(ret, result))
        } else {
            None
        }
    }
}

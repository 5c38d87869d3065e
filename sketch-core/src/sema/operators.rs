//! Operator typing and arithmetic.
//!
//! Each operator comes in two halves: a `can_*` predicate over operand
//! types (consulted before evaluation so the diagnostic can cite both
//! spellings) and an `*_unchecked` evaluator that assumes the predicate
//! held. Operators recurse structurally over tuples: `tuple ⊕ scalar`
//! applies `⊕` element-wise, and `+` on two tuples concatenates them.
//!
//! Numeric evaluation widens to `f64`, computes, and then demotes back to
//! `Integer` when both operands were integers (for `**`: when the base
//! was) and the result is exactly representable. Non-finite results are
//! reported as errors, never propagated.

use std::cmp::Ordering;

use super::Sema;
use crate::ast::{BinOp, UnOp};
use crate::diag::DiagKind;
use crate::types::{Type, TypedValue, Value};

impl Sema<'_> {
    // =======================================================================
    // Operand-type predicates
    // =======================================================================

    /// Whether `op` accepts the given operand types.
    #[must_use]
    pub fn can_binary(&self, op: BinOp, lhs: &Type, rhs: &Type) -> bool {
        match op {
            BinOp::Add => self.can_add(lhs, rhs),
            BinOp::Sub => self.can_sub(lhs, rhs),
            BinOp::Mul => self.can_mul(lhs, rhs),
            BinOp::Div => self.can_div(lhs, rhs),
            BinOp::Pow => self.can_pow(lhs, rhs),
        }
    }

    /// Whether the unary operator accepts the operand type.
    #[must_use]
    pub fn can_unary(&self, op: UnOp, operand: &Type) -> bool {
        match op {
            UnOp::Plus => self.can_unary_plus(operand),
            UnOp::Minus => self.can_unary_minus(operand),
        }
    }

    /// `+` accepts numbers, strings (concatenation, also with a number on
    /// either side), two tuples with a common type (concatenation), and
    /// tuple ⊕ scalar element-wise.
    #[must_use]
    pub fn can_add(&self, lhs: &Type, rhs: &Type) -> bool {
        if *lhs == Type::Void || *rhs == Type::Void {
            return false;
        }
        match (lhs.is_tuple(), rhs.is_tuple()) {
            (false, false) => true,
            (true, true) => self.find_common_type(lhs, rhs).is_some(),
            (true, false) => self.can_add(lhs.elem(), rhs),
            (false, true) => self.can_add(lhs, rhs.elem()),
        }
    }

    /// `-` accepts numbers and tuple − scalar.
    #[must_use]
    pub fn can_sub(&self, lhs: &Type, rhs: &Type) -> bool {
        if *lhs == Type::Void || *rhs == Type::Void {
            return false;
        }
        if !lhs.is_tuple() && !rhs.is_tuple() {
            return *lhs != Type::String && *rhs != Type::String;
        }
        // tuple − tuple and scalar − tuple are errors
        if rhs.is_tuple() {
            return false;
        }
        self.can_sub(lhs.elem(), rhs)
    }

    /// `*` accepts numbers, string × integer repetition (either order), and
    /// tuple × scalar.
    #[must_use]
    pub fn can_mul(&self, lhs: &Type, rhs: &Type) -> bool {
        if *lhs == Type::Void || *rhs == Type::Void {
            return false;
        }
        match (lhs.is_tuple(), rhs.is_tuple()) {
            (false, false) => {
                if *lhs == Type::String {
                    *rhs == Type::Integer
                } else if *rhs == Type::String {
                    *lhs == Type::Integer
                } else {
                    true
                }
            }
            (true, true) => false,
            (true, false) => self.can_mul(lhs.elem(), rhs),
            (false, true) => self.can_mul(lhs, rhs.elem()),
        }
    }

    /// `/` accepts numbers and tuple ÷ scalar.
    #[must_use]
    pub fn can_div(&self, lhs: &Type, rhs: &Type) -> bool {
        if *lhs == Type::Void || *rhs == Type::Void {
            return false;
        }
        if !lhs.is_tuple() && !rhs.is_tuple() {
            return *lhs != Type::String && *rhs != Type::String;
        }
        if rhs.is_tuple() {
            return false;
        }
        self.can_div(lhs.elem(), rhs)
    }

    /// `**` accepts numbers and tuple ** scalar.
    #[must_use]
    pub fn can_pow(&self, lhs: &Type, rhs: &Type) -> bool {
        if *lhs == Type::Void || *rhs == Type::Void {
            return false;
        }
        if !lhs.is_tuple() && !rhs.is_tuple() {
            return *lhs != Type::String && *rhs != Type::String;
        }
        if rhs.is_tuple() {
            return false;
        }
        self.can_pow(lhs.elem(), rhs)
    }

    /// Unary `+` accepts numbers and tuples of numbers.
    #[must_use]
    pub fn can_unary_plus(&self, operand: &Type) -> bool {
        match operand {
            Type::Tuple(elem) => self.can_unary_plus(elem),
            Type::Void | Type::String => false,
            _ => true,
        }
    }

    /// Unary `-` accepts numbers and tuples of numbers.
    #[must_use]
    pub fn can_unary_minus(&self, operand: &Type) -> bool {
        self.can_unary_plus(operand)
    }

    // =======================================================================
    // Evaluation
    // =======================================================================

    /// Evaluate `op` on type-checked operands.
    pub(super) fn binary_unchecked(
        &self,
        op: BinOp,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        match op {
            BinOp::Add => self.add_unchecked(lhs_ty, lhs, rhs_ty, rhs, op_loc),
            BinOp::Sub => self.sub_unchecked(lhs_ty, lhs, rhs_ty, rhs, op_loc),
            BinOp::Mul => self.mul_unchecked(lhs_ty, lhs, rhs_ty, rhs, op_loc),
            BinOp::Div => self.div_unchecked(lhs_ty, lhs, rhs_ty, rhs, op_loc),
            BinOp::Pow => self.pow_unchecked(lhs_ty, lhs, rhs_ty, rhs, op_loc),
        }
    }

    /// Evaluate a unary operator on a type-checked operand.
    pub(super) fn unary_unchecked(
        &self,
        op: UnOp,
        ty: &Type,
        value: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        match op {
            UnOp::Plus => Some(TypedValue::new(ty.clone(), value)),
            UnOp::Minus => self.unary_minus_unchecked(ty, value, op_loc),
        }
    }

    /// Addition: tuple++tuple concatenates (after unifying the element
    /// types); otherwise basic or element-wise.
    pub(crate) fn add_unchecked(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        match (lhs_ty.is_tuple(), rhs_ty.is_tuple()) {
            (false, false) => self.binary_on_basic(lhs_ty, lhs, rhs_ty, rhs, op_loc, BinOp::Add),
            (true, true) => {
                let common = self.find_common_type(lhs_ty, rhs_ty)?;
                let (lhs, _) = self.convert_to(TypedValue::new(lhs_ty.clone(), lhs), &common);
                let (rhs, _) = self.convert_to(TypedValue::new(rhs_ty.clone(), rhs), &common);
                let mut elems = match lhs.value {
                    Value::Tuple(v) => v,
                    _ => return None,
                };
                match rhs.value {
                    Value::Tuple(v) => elems.extend(v),
                    _ => return None,
                }
                Some(TypedValue::new(common, Value::Tuple(elems)))
            }
            _ => self.binary_tuple_scalar(lhs_ty, lhs, rhs_ty, rhs, op_loc, Self::add_unchecked),
        }
    }

    fn sub_unchecked(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        if !lhs_ty.is_tuple() && !rhs_ty.is_tuple() {
            self.binary_on_basic(lhs_ty, lhs, rhs_ty, rhs, op_loc, BinOp::Sub)
        } else {
            self.binary_tuple_scalar(lhs_ty, lhs, rhs_ty, rhs, op_loc, Self::sub_unchecked)
        }
    }

    fn mul_unchecked(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        if !lhs_ty.is_tuple() && !rhs_ty.is_tuple() {
            self.binary_on_basic(lhs_ty, lhs, rhs_ty, rhs, op_loc, BinOp::Mul)
        } else {
            self.binary_tuple_scalar(lhs_ty, lhs, rhs_ty, rhs, op_loc, Self::mul_unchecked)
        }
    }

    fn div_unchecked(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        if !lhs_ty.is_tuple() && !rhs_ty.is_tuple() {
            self.binary_on_basic(lhs_ty, lhs, rhs_ty, rhs, op_loc, BinOp::Div)
        } else {
            self.binary_tuple_scalar(lhs_ty, lhs, rhs_ty, rhs, op_loc, Self::div_unchecked)
        }
    }

    fn pow_unchecked(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        if !lhs_ty.is_tuple() && !rhs_ty.is_tuple() {
            self.binary_on_basic(lhs_ty, lhs, rhs_ty, rhs, op_loc, BinOp::Pow)
        } else {
            self.binary_tuple_scalar(lhs_ty, lhs, rhs_ty, rhs, op_loc, Self::pow_unchecked)
        }
    }

    /// Unary minus on numbers or tuples of numbers. Negating an `Integer`
    /// stays `Integer` while the result fits (so `-(-2147483648)` becomes
    /// Double).
    pub(crate) fn unary_minus_unchecked(
        &self,
        ty: &Type,
        value: Value,
        op_loc: usize,
    ) -> Option<TypedValue> {
        if let Type::Tuple(_) = ty {
            return self.unary_on_tuple(ty, value, op_loc, Self::unary_minus_unchecked);
        }
        let negated = -value.as_number();
        if *ty == Type::Integer && Self::check_double_to_int(negated) {
            #[allow(clippy::cast_possible_truncation)]
            return Some(TypedValue::new(Type::Integer, Value::Int(negated as i32)));
        }
        Some(TypedValue::new(Type::Double, Value::Double(negated)))
    }

    // -- scalar arithmetic --

    fn binary_on_basic(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
        op: BinOp,
    ) -> Option<TypedValue> {
        if *lhs_ty != Type::String && *rhs_ty != Type::String {
            return self.binary_on_numbers(lhs_ty, &lhs, rhs_ty, &rhs, op_loc, op);
        }
        if *lhs_ty == Type::String && *rhs_ty == Type::String {
            // only `+` reaches here
            let mut text = match lhs {
                Value::Str(s) => s,
                _ => return None,
            };
            text.push_str(rhs.as_str());
            return Some(TypedValue::new(Type::String, Value::Str(text)));
        }
        // one string, one number
        match op {
            BinOp::Add => {
                let text = if *lhs_ty == Type::String {
                    format!("{}{}", lhs.as_str(), number_spelling(&rhs))
                } else {
                    format!("{}{}", number_spelling(&lhs), rhs.as_str())
                };
                Some(TypedValue::new(Type::String, Value::Str(text)))
            }
            BinOp::Mul => {
                let (text, count) = if *lhs_ty == Type::String {
                    (lhs.as_str(), rhs.as_int())
                } else {
                    (rhs.as_str(), lhs.as_int())
                };
                if count < 0 {
                    self.diag_engine()
                        .create_at(DiagKind::MulStrNegativeNum, op_loc)
                        .arg_int(i64::from(count))
                        .finish();
                    return None;
                }
                #[allow(clippy::cast_sign_loss)]
                let repeated = text.repeat(count as usize);
                Some(TypedValue::new(Type::String, Value::Str(repeated)))
            }
            _ => None,
        }
    }

    /// Arithmetic on two numbers, with the Integer-preservation rule.
    #[allow(clippy::float_cmp)]
    fn binary_on_numbers(
        &self,
        lhs_ty: &Type,
        lhs: &Value,
        rhs_ty: &Type,
        rhs: &Value,
        op_loc: usize,
        op: BinOp,
    ) -> Option<TypedValue> {
        let l = lhs.as_number();
        let r = rhs.as_number();
        // For `**`, a Double exponent can still produce an integer
        // (4 ** 0.5 == 2), so only the base's type matters.
        let keep_integer = if op == BinOp::Pow {
            *lhs_ty == Type::Integer
        } else {
            *lhs_ty == Type::Integer && *rhs_ty == Type::Integer
        };
        let (op_name, result) = match op {
            BinOp::Add => ("adding", l + r),
            BinOp::Sub => ("subtracting", l - r),
            BinOp::Mul => ("multiplying", l * r),
            BinOp::Div => {
                if r == 0.0 {
                    self.diag_engine()
                        .create_at(DiagKind::DivZero, op_loc)
                        .finish();
                }
                ("dividing", l / r)
            }
            BinOp::Pow => ("exponentiating", l.powf(r)),
        };
        if !result.is_finite() {
            self.diag_engine()
                .create_at(DiagKind::InvalidBinaryResult, op_loc)
                .arg_str(op_name)
                .arg_double(l)
                .arg_double(r)
                .finish();
            return None;
        }
        if keep_integer && Self::check_double_to_int(result) {
            #[allow(clippy::cast_possible_truncation)]
            return Some(TypedValue::new(Type::Integer, Value::Int(result as i32)));
        }
        Some(TypedValue::new(Type::Double, Value::Double(result)))
    }

    // -- tuple recursion --

    /// Apply `op` between each element of the tuple side and the scalar
    /// side, preserving operand order, then re-unify the element types.
    fn binary_tuple_scalar(
        &self,
        lhs_ty: &Type,
        lhs: Value,
        rhs_ty: &Type,
        rhs: Value,
        op_loc: usize,
        op: fn(&Self, &Type, Value, &Type, Value, usize) -> Option<TypedValue>,
    ) -> Option<TypedValue> {
        debug_assert!(lhs_ty.is_tuple() != rhs_ty.is_tuple());
        let tuple_on_left = lhs_ty.is_tuple();
        let (tuple_ty, tuple_val, other_ty, other_val) = if tuple_on_left {
            (lhs_ty, lhs, rhs_ty, rhs)
        } else {
            (rhs_ty, rhs, lhs_ty, lhs)
        };
        let elems = match tuple_val {
            Value::Tuple(v) => v,
            _ => return None,
        };
        let mut results = Vec::with_capacity(elems.len());
        for elem in elems {
            let result = if tuple_on_left {
                op(self, tuple_ty.elem(), elem, other_ty, other_val.clone(), op_loc)?
            } else {
                op(self, other_ty, other_val.clone(), tuple_ty.elem(), elem, op_loc)?
            };
            results.push(result);
        }
        self.tidy_tuple(results, None)
    }

    fn unary_on_tuple(
        &self,
        ty: &Type,
        value: Value,
        op_loc: usize,
        op: fn(&Self, &Type, Value, usize) -> Option<TypedValue>,
    ) -> Option<TypedValue> {
        let elems = match value {
            Value::Tuple(v) => v,
            _ => return None,
        };
        let mut results = Vec::with_capacity(elems.len());
        for elem in elems {
            results.push(op(self, ty.elem(), elem, op_loc)?);
        }
        self.tidy_tuple(results, None)
    }

    // =======================================================================
    // Comparison
    // =======================================================================

    /// Three-way comparison used by `for` loops. `None` means the values
    /// are incomparable (any `Void`, string vs number, tuple vs scalar).
    #[must_use]
    pub fn compare(&self, lhs_ty: &Type, lhs: &Value, rhs_ty: &Type, rhs: &Value) -> Option<Ordering> {
        if *lhs_ty == Type::Void || *rhs_ty == Type::Void {
            return None;
        }
        match (lhs_ty.is_tuple(), rhs_ty.is_tuple()) {
            (false, false) => {
                if *lhs_ty != Type::String && *rhs_ty != Type::String {
                    lhs.as_number().partial_cmp(&rhs.as_number())
                } else if *lhs_ty == Type::String && *rhs_ty == Type::String {
                    Some(lhs.as_str().cmp(rhs.as_str()))
                } else {
                    None
                }
            }
            (true, true) => {
                let l = lhs.as_tuple();
                let r = rhs.as_tuple();
                for (le, re) in l.iter().zip(r.iter()) {
                    match self.compare(lhs_ty.elem(), le, rhs_ty.elem(), re)? {
                        Ordering::Equal => {}
                        other => return Some(other),
                    }
                }
                // A shorter prefix compares less.
                Some(l.len().cmp(&r.len()))
            }
            _ => None,
        }
    }
}

/// Rendering of a number glued to a string by `+`.
fn number_spelling(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Double(v) => format!("{v}"),
        other => other.spelling(),
    }
}

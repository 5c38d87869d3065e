//! Semantic analysis.
//!
//! Three jobs live here, mirroring the phases a statement goes through
//! before it has an effect:
//!
//! - **Binding** ([`Sema::bind_expr_variables`]): attach symbol-table
//!   handles to `Var` nodes, with edit-distance typo hints for unknown
//!   names.
//! - **Conversions**: the implicit-conversion lattice (`Integer → Double`
//!   losslessly, `Double → Integer` narrowing, tuples element-wise) and the
//!   common-type computation used by tuple literals and mixed arithmetic.
//! - **Overload resolution** ([`Sema::overload_resolution`]): C++-style
//!   candidate/viable/best phases over the built-in overload sets.
//!
//! Expression evaluation is in the `eval` submodule, operator typing and
//! arithmetic in `operators`.

mod eval;
mod operators;
#[cfg(test)]
mod tests;

use crate::ast::{Expr, ExprKind};
use crate::builtins::Builtins;
use crate::diag::{DiagEngine, DiagKind};
use crate::edit::edit_distance;
use crate::symbols::{DiagPack, FnId, SymbolTable, VarId};
use crate::types::{Type, TypedValue, Value};

/// Maximum edit distance considered for identifier typo hints.
const TYPO_DISTANCE: usize = 5;

/// The semantic analyzer: owns the symbol table and the built-in drawing
/// state, borrows the diagnostic engine.
pub struct Sema<'a> {
    diag: &'a DiagEngine<'a>,
    /// Symbol table; predefined entries installed before parsing, runtime
    /// variables added as assignments execute.
    pub table: SymbolTable,
    /// Built-in drawing state and back-end.
    pub builtins: Builtins,
}

impl<'a> Sema<'a> {
    /// Create the analyzer.
    #[must_use]
    pub fn new(diag: &'a DiagEngine<'a>, table: SymbolTable, builtins: Builtins) -> Self {
        Self {
            diag,
            table,
            builtins,
        }
    }

    /// The diagnostic engine.
    #[must_use]
    pub fn diag_engine(&self) -> &'a DiagEngine<'a> {
        self.diag
    }

    /// Whether `value` is exactly representable as a 32-bit integer.
    #[must_use]
    pub fn check_double_to_int(value: f64) -> bool {
        if value > f64::from(i32::MAX) || value < f64::from(i32::MIN) {
            return false;
        }
        #[allow(clippy::cast_possible_truncation)]
        let truncated = value as i32;
        f64::from(truncated) == value
    }

    // =======================================================================
    // Binding
    // =======================================================================

    /// Bind every variable name in `e` to its symbol-table entry, reporting
    /// unknown names (with a spelling hint where a unique near-miss
    /// exists). Returns whether every name bound.
    pub fn bind_expr_variables(&self, e: &Expr) -> bool {
        self.bind_visit(e, true)
    }

    /// Like [`Self::bind_expr_variables`] but silent; used by assignment to
    /// detect whether the left-hand side names a new variable.
    pub fn try_bind_expr_variables(&self, e: &Expr) -> bool {
        self.bind_visit(e, false)
    }

    fn bind_visit(&self, e: &Expr, make_diag: bool) -> bool {
        match &e.kind {
            ExprKind::Num { .. } | ExprKind::Str(_) => true,
            ExprKind::Var { name, binding } => {
                if binding.get().is_some() {
                    return true;
                }
                if let Some(id) = self.table.var_id(name) {
                    binding.set(Some(id));
                    return true;
                }
                if !make_diag {
                    return false;
                }
                if self.table.has_function(name) {
                    self.diag
                        .create_at(DiagKind::UseFuncAsVar, e.span.start)
                        .finish();
                    return false;
                }
                if let Some((suggestion, id)) = self.variable_typo(name) {
                    let fix = self
                        .diag
                        .replacement(e.span.start, e.span.end, &suggestion);
                    self.diag
                        .create_at(DiagKind::UseUnknownIdentifierWithHint, e.span.start)
                        .arg_str(suggestion)
                        .fix(fix)
                        .finish();
                    binding.set(Some(id));
                    return true;
                }
                self.diag
                    .create_at(DiagKind::UseUnknownIdentifier, e.span.start)
                    .finish();
                false
            }
            ExprKind::Tuple(elems) => {
                let mut ok = true;
                for elem in elems {
                    ok &= self.bind_visit(elem, make_diag);
                }
                ok
            }
            ExprKind::Call { args, .. } => {
                let mut ok = true;
                for arg in args {
                    ok &= self.bind_visit(arg, make_diag);
                }
                ok
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                // Visit both sides so each bad name gets its own report.
                let l = self.bind_visit(lhs, make_diag);
                let r = self.bind_visit(rhs, make_diag);
                l && r
            }
            ExprKind::Unary { operand, .. } => self.bind_visit(operand, make_diag),
            ExprKind::Error => false,
        }
    }

    /// Last resort for an assignment target that did not bind: when the
    /// name is a unique near-miss of an existing variable, report the hint
    /// with a fix-it, bind to the suggestion, and return `true`. Otherwise
    /// leave the node unbound so the assignment introduces a new variable.
    pub fn bind_typo_suggestion(&self, e: &Expr) -> bool {
        let ExprKind::Var { name, binding } = &e.kind else {
            return false;
        };
        let Some((suggestion, id)) = self.variable_typo(name) else {
            return false;
        };
        let fix = self.diag.replacement(e.span.start, e.span.end, &suggestion);
        self.diag
            .create_at(DiagKind::UseUnknownIdentifierWithHint, e.span.start)
            .arg_str(suggestion)
            .fix(fix)
            .finish();
        binding.set(Some(id));
        true
    }

    /// The unique best near-miss among variable names, if one exists.
    fn variable_typo(&self, spelling: &str) -> Option<(String, VarId)> {
        let mut best: Option<(String, VarId, usize)> = None;
        let mut tied = false;
        for (id, name) in self.table.variables() {
            let distance = edit_distance(spelling, name, false);
            if distance > TYPO_DISTANCE || distance >= spelling.len().min(name.len()) {
                continue;
            }
            match &best {
                Some((_, _, d)) if *d < distance => {}
                Some((_, _, d)) if *d == distance => tied = true,
                _ => {
                    best = Some((name.to_owned(), id, distance));
                    tied = false;
                }
            }
        }
        if tied {
            return None;
        }
        best.map(|(name, id, _)| (name, id))
    }

    /// The unique best near-miss among function names, if one exists.
    fn function_typo(&self, spelling: &str) -> Option<String> {
        let mut best: Option<(String, usize)> = None;
        let mut tied = false;
        for name in self.table.function_names() {
            let distance = edit_distance(spelling, name, false);
            if distance > TYPO_DISTANCE || distance >= spelling.len().min(name.len()) {
                continue;
            }
            match &best {
                Some((_, d)) if *d < distance => {}
                Some((_, d)) if *d == distance => tied = true,
                _ => {
                    best = Some((name.to_owned(), distance));
                    tied = false;
                }
            }
        }
        if tied {
            return None;
        }
        best.map(|(name, _)| name)
    }

    /// Introduce a runtime variable from the first value assigned to it.
    pub fn add_new_variable(&mut self, init: TypedValue, name: &str) -> VarId {
        self.table.add_runtime_variable(name, init.ty, init.value)
    }

    /// Write to a variable, routing constant checks and value filters
    /// through the symbol table.
    pub fn set_variable(&mut self, id: VarId, pack: &mut DiagPack, value: Value) {
        let drawn = self.builtins.have_drawn();
        self.table.set_variable(id, self.diag, pack, value, drawn);
    }

    // =======================================================================
    // Conversions
    // =======================================================================

    /// Whether `from` implicitly converts to `to`.
    ///
    /// Numeric types convert into each other (`Double → Integer` narrows);
    /// tuples convert element-wise; nothing converts to or from `String`
    /// or `Void`.
    #[must_use]
    pub fn can_convert_to(&self, from: &Type, to: &Type) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            (Type::Tuple(f), Type::Tuple(t)) => self.can_convert_to(f, t),
            (Type::Tuple(_), _) | (_, Type::Tuple(_)) => false,
            (Type::Void, _) | (_, Type::Void) => false,
            (Type::String, _) | (_, Type::String) => false,
            _ => true,
        }
    }

    /// The least type both operands convert to without information loss,
    /// or `None` when there is none.
    #[must_use]
    pub fn find_common_type(&self, lhs: &Type, rhs: &Type) -> Option<Type> {
        if lhs == rhs {
            return Some(lhs.clone());
        }
        if *lhs == Type::Void || *rhs == Type::Void {
            return None;
        }
        match (lhs, rhs) {
            (Type::Tuple(l), Type::Tuple(r)) => {
                Some(Type::tuple(self.find_common_type(l, r)?))
            }
            (Type::Tuple(_), _) | (_, Type::Tuple(_)) => None,
            (Type::String, _) | (_, Type::String) => None,
            // Integer and Double unify to Double.
            _ => Some(Type::Double),
        }
    }

    /// Convert `from` to type `to`. The second component reports whether a
    /// narrowing conversion changed the value.
    ///
    /// The caller must have checked [`Self::can_convert_to`].
    #[must_use]
    pub fn convert_to(&self, from: TypedValue, to: &Type) -> (TypedValue, bool) {
        let constant = from.is_constant();
        let mut narrow = false;
        let value = Self::convert_value(from.value, &from.ty, to, &mut narrow);
        let converted = if constant {
            TypedValue::constant(to.clone(), value)
        } else {
            TypedValue::new(to.clone(), value)
        };
        (converted, narrow)
    }

    fn convert_value(value: Value, from: &Type, to: &Type, narrow: &mut bool) -> Value {
        if from == to {
            return value;
        }
        match (from, to) {
            (Type::Tuple(f), Type::Tuple(t)) => {
                let elems = match value {
                    Value::Tuple(v) => v,
                    other => return other,
                };
                Value::Tuple(
                    elems
                        .into_iter()
                        .map(|e| Self::convert_value(e, f, t, narrow))
                        .collect(),
                )
            }
            (Type::Integer, Type::Double) => Value::Double(f64::from(value.as_int())),
            (Type::Double, Type::Integer) => {
                let d = value.as_double();
                #[allow(clippy::cast_possible_truncation)]
                let i = d as i32;
                if f64::from(i) != d {
                    *narrow = true;
                }
                Value::Int(i)
            }
            _ => {
                debug_assert!(false, "conversion {from} -> {to} not checked");
                value
            }
        }
    }

    /// Unify the element types of a freshly built tuple value and convert
    /// every element to the common type. `locs` carries each element's
    /// start offset when a conflict should be reported (operator-internal
    /// calls pass `None` and stay silent).
    #[must_use]
    pub fn tidy_tuple(
        &self,
        elems: Vec<TypedValue>,
        locs: Option<&[usize]>,
    ) -> Option<TypedValue> {
        debug_assert!(!elems.is_empty());
        let mut common = elems[0].ty.clone();
        for (i, elem) in elems.iter().enumerate().skip(1) {
            match self.find_common_type(&common, &elem.ty) {
                Some(c) => common = c,
                None => {
                    if let Some(locs) = locs {
                        self.diag
                            .create_at(DiagKind::ConflictTupleElemType, locs[i])
                            .arg_str(common.to_string())
                            .arg_str(elem.ty.to_string())
                            .finish();
                    }
                    return None;
                }
            }
        }
        let mut constant = true;
        let mut values = Vec::with_capacity(elems.len());
        for elem in elems {
            constant &= elem.is_constant();
            let (converted, narrow) = self.convert_to(elem, &common);
            // Unifying upward can never narrow.
            debug_assert!(!narrow);
            values.push(converted.value);
        }
        let ty = Type::tuple(common);
        let value = Value::Tuple(values);
        Some(if constant {
            TypedValue::constant(ty, value)
        } else {
            TypedValue::new(ty, value)
        })
    }

    // =======================================================================
    // Overload resolution
    // =======================================================================

    /// Match quality of one argument against one parameter:
    /// 0 exact, 1 convertible, -1 rejected.
    fn match_level(&self, arg: &Type, param: &Type) -> i32 {
        if arg == param {
            0
        } else if self.can_convert_to(arg, param) {
            1
        } else {
            -1
        }
    }

    /// Resolve a call of `name` with the given argument types to a single
    /// overload, or report why none fits.
    #[must_use]
    pub fn overload_resolution(
        &self,
        name: &str,
        name_loc: usize,
        arg_types: &[&Type],
    ) -> Option<FnId> {
        let candidates = self.candidate_functions(name, name_loc);
        if candidates.is_empty() {
            return None;
        }
        let viable = self.viable_functions(&candidates, arg_types, name, name_loc);
        if viable.is_empty() {
            return None;
        }
        self.best_viable_function(&viable, arg_types, name, name_loc)
    }

    /// Phase 1: everything registered under `name`. An empty result means a
    /// diagnostic was already reported (variable used as function, unknown
    /// identifier, possibly with a spelling hint).
    fn candidate_functions(&self, name: &str, name_loc: usize) -> Vec<FnId> {
        let set = self.table.overloads(name);
        if !set.is_empty() {
            return set.to_vec();
        }
        if self.table.has_variable(name) {
            self.diag
                .create_at(DiagKind::UseVarAsFunc, name_loc)
                .finish();
            return Vec::new();
        }
        if let Some(suggestion) = self.function_typo(name) {
            self.diag
                .create_at(DiagKind::UseUnknownIdentifierWithHint, name_loc)
                .arg_str(suggestion)
                .finish();
        } else {
            self.diag
                .create_at(DiagKind::UseUnknownIdentifier, name_loc)
                .finish();
        }
        Vec::new()
    }

    /// Phase 2: keep candidates whose arity matches and whose parameters
    /// all accept the argument types. Mismatch notes are held back and
    /// flushed only when no candidate survives.
    fn viable_functions(
        &self,
        candidates: &[FnId],
        arg_types: &[&Type],
        name: &str,
        name_loc: usize,
    ) -> Vec<FnId> {
        let mut viable = Vec::new();
        let mut pending_notes = Vec::new();
        for &id in candidates {
            let info = self.table.function(id);
            if info.params().len() != arg_types.len() {
                pending_notes.push(
                    self.diag
                        .create_at(DiagKind::CandidateParamCountMismatch, name_loc)
                        .arg_int(info.params().len() as i64)
                        .arg_int(arg_types.len() as i64),
                );
                continue;
            }
            let mismatch = (0..arg_types.len())
                .find(|&i| !self.can_convert_to(arg_types[i], &info.params()[i]));
            if let Some(i) = mismatch {
                pending_notes.push(
                    self.diag
                        .create_at(DiagKind::CandidateParamTypeMismatch, name_loc)
                        .arg_str(arg_types[i].to_string())
                        .arg_str(info.params()[i].to_string())
                        .arg_str(ordinal(i + 1)),
                );
                continue;
            }
            viable.push(id);
        }
        if viable.is_empty() {
            self.diag
                .create_at(DiagKind::NoMatchFunc, name_loc)
                .arg_str(name)
                .finish();
            for note in pending_notes {
                note.finish();
            }
        }
        viable
    }

    /// Phase 3: pick the unique best candidate by per-argument match
    /// levels, using an iterative fixed point so the outcome does not
    /// depend on declaration order. More than one tentative best means the
    /// call is ambiguous.
    fn best_viable_function(
        &self,
        viable: &[FnId],
        arg_types: &[&Type],
        name: &str,
        name_loc: usize,
    ) -> Option<FnId> {
        // Is `a` strictly better than `b`? No argument position may prefer
        // `b`, and the level sum must be strictly smaller.
        let better = |a: FnId, b: FnId| -> bool {
            let fa = self.table.function(a);
            let fb = self.table.function(b);
            let mut sum_a = 0;
            let mut sum_b = 0;
            for (i, arg) in arg_types.iter().enumerate() {
                let la = self.match_level(arg, &fa.params()[i]);
                let lb = self.match_level(arg, &fb.params()[i]);
                if la > lb {
                    return false;
                }
                sum_a += la;
                sum_b += lb;
            }
            sum_a < sum_b
        };

        let mut best = 0;
        for i in 1..viable.len() {
            if better(viable[i], viable[best]) {
                best = i;
            }
        }
        let mut marked = vec![false; viable.len()];
        marked[best] = true;
        let mut pending = vec![best];
        let mut ambiguous = false;
        while let Some(cur) = pending.pop() {
            for i in 0..viable.len() {
                if !marked[i] && !better(viable[cur], viable[i]) {
                    marked[i] = true;
                    pending.push(i);
                    ambiguous = true;
                }
            }
        }
        if !ambiguous {
            return Some(viable[best]);
        }

        let arg_list: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
        self.diag
            .create_at(DiagKind::AmbiguousCall, name_loc)
            .arg_str(format!("{name}({})", arg_list.join(", ")))
            .finish();
        for (i, &id) in viable.iter().enumerate() {
            if marked[i] {
                self.diag
                    .create(DiagKind::Candidate)
                    .arg_str(self.table.function(id).signature())
                    .finish();
            }
        }
        None
    }
}

/// English ordinal rendering: 1st, 2nd, 3rd, 4th, …
fn ordinal(i: usize) -> String {
    let suffix = match (i % 10, i % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{i}{suffix}")
}

//! Symbol table: variables, constants, and function overload sets.
//!
//! Entries are addressed by copyable handles ([`VarId`], [`FnId`]) that AST
//! nodes store in their late-binding cells; the table itself owns every
//! entry. Variables are either **predefined** (installed before parsing,
//! possibly carrying a value filter), **constants** (rejecting mutation), or
//! **runtime** (introduced by the first assignment to an unbound name).

use std::collections::HashMap;

use crate::builtins::{self, BuiltinFn, ValueFilter};
use crate::diag::{DiagEngine, DiagKind};
use crate::types::{Type, Value};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle of a variable or constant entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

/// Handle of one function overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(u32);

// ---------------------------------------------------------------------------
// Diagnostic pack
// ---------------------------------------------------------------------------

/// Location context handed to value filters and built-in functions so they
/// can report diagnostics against the caller's source.
///
/// For a call with `n` arguments, `locs` holds `2n` offsets (start and end
/// of each argument). For an assignment it holds two: the start of the
/// left-hand side and the start of the right-hand side.
#[derive(Debug)]
pub struct DiagPack {
    /// Flat list of byte offsets, see above.
    pub locs: Vec<usize>,
    /// Cleared by the callee to veto the write or fail the call.
    pub success: bool,
}

impl DiagPack {
    /// A pack over the given offsets.
    #[must_use]
    pub fn new(locs: Vec<usize>) -> Self {
        Self {
            locs,
            success: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum VarClass {
    /// Predefined constant; writes are rejected.
    Constant,
    /// Predefined variable, with an optional write filter.
    Predefined(Option<ValueFilter>),
    /// Introduced by assignment at runtime.
    Runtime,
}

/// One variable or constant.
#[derive(Debug)]
pub struct VarEntry {
    name: String,
    ty: Type,
    value: Value,
    class: VarClass,
}

/// One function overload: its signature and implementation.
#[derive(Debug)]
pub struct FnEntry {
    name: String,
    ret: Type,
    params: Vec<Type>,
    imp: BuiltinFn,
}

impl FnEntry {
    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return type.
    #[must_use]
    pub fn ret(&self) -> &Type {
        &self.ret
    }

    /// Parameter types, in order.
    #[must_use]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// The built-in behind this overload.
    #[must_use]
    pub fn imp(&self) -> BuiltinFn {
        self.imp
    }

    /// `Ret name(P0, P1)` rendering used by candidate notes.
    #[must_use]
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{} {}({})", self.ret, self.name, params.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// The symbol table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: Vec<VarEntry>,
    var_names: HashMap<String, VarId>,
    fns: Vec<FnEntry>,
    fn_names: HashMap<String, Vec<FnId>>,
}

impl SymbolTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration --

    /// Install a predefined variable.
    pub fn add_predefined(
        &mut self,
        name: &str,
        ty: Type,
        value: Value,
        filter: Option<ValueFilter>,
    ) -> VarId {
        self.add_var_entry(name, ty, value, VarClass::Predefined(filter))
    }

    /// Install a predefined constant.
    pub fn add_constant(&mut self, name: &str, ty: Type, value: Value) -> VarId {
        self.add_var_entry(name, ty, value, VarClass::Constant)
    }

    /// Introduce a runtime variable from its first assigned value.
    pub fn add_runtime_variable(&mut self, name: &str, ty: Type, value: Value) -> VarId {
        self.add_var_entry(name, ty, value, VarClass::Runtime)
    }

    fn add_var_entry(&mut self, name: &str, ty: Type, value: Value, class: VarClass) -> VarId {
        debug_assert!(
            !self.var_names.contains_key(name),
            "duplicate variable '{name}'"
        );
        let id = VarId(u32::try_from(self.vars.len()).unwrap_or(u32::MAX));
        self.vars.push(VarEntry {
            name: name.to_owned(),
            ty,
            value,
            class,
        });
        self.var_names.insert(name.to_owned(), id);
        id
    }

    /// Add one overload to a function's overload set.
    ///
    /// Two overloads of the same name may not share a parameter-type
    /// sequence.
    pub fn add_function(&mut self, name: &str, ret: Type, params: Vec<Type>, imp: BuiltinFn) -> FnId {
        let set = self.fn_names.entry(name.to_owned()).or_default();
        debug_assert!(
            set.iter()
                .all(|id| self.fns[id.0 as usize].params != params),
            "duplicate overload for '{name}'"
        );
        let id = FnId(u32::try_from(self.fns.len()).unwrap_or(u32::MAX));
        self.fns.push(FnEntry {
            name: name.to_owned(),
            ret,
            params,
            imp,
        });
        set.push(id);
        id
    }

    // -- lookup --

    /// Handle of the variable called `name`, if any.
    #[must_use]
    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.var_names.get(name).copied()
    }

    /// Whether a variable of this name exists.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.var_names.contains_key(name)
    }

    /// Whether a function of this name exists.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.fn_names.contains_key(name)
    }

    /// The overload set of `name` (empty when unknown).
    #[must_use]
    pub fn overloads(&self, name: &str) -> &[FnId] {
        self.fn_names.get(name).map_or(&[], Vec::as_slice)
    }

    /// Access one overload.
    #[must_use]
    pub fn function(&self, id: FnId) -> &FnEntry {
        &self.fns[id.0 as usize]
    }

    /// Declared type of a variable.
    #[must_use]
    pub fn var_type(&self, id: VarId) -> &Type {
        &self.vars[id.0 as usize].ty
    }

    /// Current value of a variable.
    #[must_use]
    pub fn var_value(&self, id: VarId) -> &Value {
        &self.vars[id.0 as usize].value
    }

    /// Name of a variable.
    #[must_use]
    pub fn var_name(&self, id: VarId) -> &str {
        &self.vars[id.0 as usize].name
    }

    /// Whether the entry is a predefined constant.
    #[must_use]
    pub fn is_constant(&self, id: VarId) -> bool {
        matches!(self.vars[id.0 as usize].class, VarClass::Constant)
    }

    /// Iterate `(id, name)` over all variables, in registration order.
    pub fn variables(&self) -> impl Iterator<Item = (VarId, &str)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, e)| (VarId(u32::try_from(i).unwrap_or(u32::MAX)), e.name.as_str()))
    }

    /// Iterate the distinct function names.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.fn_names.keys().map(String::as_str)
    }

    // -- mutation --

    /// Write `value` to the variable, consulting the constant flag and the
    /// value filter. On rejection the write is suppressed, a diagnostic has
    /// been emitted, and `pack.success` is cleared.
    ///
    /// `drawn` reports whether any drawing has happened yet; some filters
    /// reject writes after that point.
    pub fn set_variable(
        &mut self,
        id: VarId,
        diag: &DiagEngine<'_>,
        pack: &mut DiagPack,
        value: Value,
        drawn: bool,
    ) {
        let (constant, filter) = match &self.vars[id.0 as usize].class {
            VarClass::Constant => (true, None),
            VarClass::Predefined(filter) => (false, *filter),
            VarClass::Runtime => (false, None),
        };
        if constant {
            diag.create_at(DiagKind::AssignConstant, pack.locs[0]).finish();
            pack.success = false;
            return;
        }
        if let Some(filter) = filter {
            if !builtins::apply_filter(filter, diag, pack, &value, drawn) {
                pack.success = false;
                return;
            }
        }
        self.vars[id.0 as usize].value = value;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

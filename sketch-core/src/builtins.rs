//! Predefined variables, constants, and functions.
//!
//! [`Builtins::install`] populates a [`SymbolTable`] with everything the
//! language offers out of the box and returns the drawing state that the
//! `draw`/`save` built-ins operate on. The rendering back-end is injected
//! behind [`RenderBackend`]; the core never encodes pixels itself.
//!
//! Writes to predefined variables go through **value filters**: predicates
//! that can veto a write and report why through the caller's [`DiagPack`].

use rand::{thread_rng, Rng};

use crate::diag::{DiagEngine, DiagKind};
use crate::render::RenderBackend;
use crate::symbols::{DiagPack, SymbolTable, VarId};
use crate::types::{Type, Value};

// ---------------------------------------------------------------------------
// Value filters
// ---------------------------------------------------------------------------

/// Validation attached to a predefined variable, consulted on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFilter {
    /// Exactly two elements (`origin`, `scale`).
    Pair(&'static str),
    /// Two positive elements; frozen once drawing has started.
    CanvasSize,
    /// 3 or 4 channels in `[0, 255]`; frozen once drawing has started.
    CanvasColor,
    /// An integer in `[1, 10]`.
    StrokeWidth,
    /// 3 or 4 channels in `[0, 255]`.
    StrokeColor,
}

/// Run `filter` against `value`. Returns `false` (after reporting) when the
/// write must be suppressed. `drawn` tells whether any drawing has happened.
pub fn apply_filter(
    filter: ValueFilter,
    diag: &DiagEngine<'_>,
    pack: &DiagPack,
    value: &Value,
    drawn: bool,
) -> bool {
    match filter {
        ValueFilter::Pair(name) => check_len(diag, pack, name, value, 2),
        ValueFilter::CanvasSize => {
            if !check_len(diag, pack, "background_size", value, 2) {
                return false;
            }
            for elem in value.as_tuple() {
                let v = elem.as_int();
                if v <= 0 {
                    diag.create_at(DiagKind::SizeValue, pack.locs[1])
                        .arg_int(i64::from(v))
                        .arg_str("background_size")
                        .finish();
                    return false;
                }
            }
            check_not_drawn(diag, pack, "background_size", drawn)
        }
        ValueFilter::CanvasColor => {
            check_channels(diag, pack, "background_color", value)
                && check_not_drawn(diag, pack, "background_color", drawn)
        }
        ValueFilter::StrokeWidth => {
            let v = value.as_int();
            if (1..=10).contains(&v) {
                true
            } else {
                diag.create_at(DiagKind::LineWidth, pack.locs[1])
                    .arg_int(i64::from(v))
                    .finish();
                false
            }
        }
        ValueFilter::StrokeColor => check_channels(diag, pack, "line_color", value),
    }
}

fn check_len(
    diag: &DiagEngine<'_>,
    pack: &DiagPack,
    name: &str,
    value: &Value,
    expected: usize,
) -> bool {
    let len = value.as_tuple().len();
    if len == expected {
        return true;
    }
    diag.create_at(DiagKind::AssignElemCount, pack.locs[1])
        .arg_str(name)
        .arg_int(expected as i64)
        .arg_int(len as i64)
        .finish();
    false
}

fn check_channels(diag: &DiagEngine<'_>, pack: &DiagPack, name: &str, value: &Value) -> bool {
    let elems = value.as_tuple();
    if elems.len() != 3 && elems.len() != 4 {
        diag.create_at(DiagKind::AssignElemCount, pack.locs[1])
            .arg_str(name)
            .arg_str("3 or 4")
            .arg_int(elems.len() as i64)
            .finish();
        return false;
    }
    for elem in elems {
        let v = elem.as_int();
        if !(0..=255).contains(&v) {
            diag.create_at(DiagKind::ColorValue, pack.locs[1])
                .arg_int(i64::from(v))
                .finish();
            return false;
        }
    }
    true
}

fn check_not_drawn(diag: &DiagEngine<'_>, pack: &DiagPack, name: &str, drawn: bool) -> bool {
    if drawn {
        diag.create_at(DiagKind::SetAfterDrawing, pack.locs[0])
            .arg_str(name)
            .finish();
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Built-in functions
// ---------------------------------------------------------------------------

/// Implementation selector for one function overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFn {
    PrintInt,
    PrintDouble,
    PrintStr,
    PrintIntTuple,
    PrintDoubleTuple,
    ColorFromStr,
    AbsInt,
    AbsDouble,
    Cos,
    Sin,
    Tan,
    Ln,
    RandInt,
    Draw,
    Save,
    /// Does nothing and returns no value. Tests use this to register
    /// synthetic overload sets.
    Stub,
}

// ---------------------------------------------------------------------------
// Drawing state
// ---------------------------------------------------------------------------

/// The drawing side of the built-ins: the injected back-end, the
/// "has anything been drawn yet" latch, and handles to the predefined
/// variables that `draw` reads.
pub struct Builtins {
    backend: Box<dyn RenderBackend>,
    have_drawn: bool,
    origin: VarId,
    scale: VarId,
    rot: VarId,
    background_size: VarId,
    background_color: VarId,
    line_width: VarId,
    line_color: VarId,
}

impl std::fmt::Debug for Builtins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtins")
            .field("have_drawn", &self.have_drawn)
            .finish_non_exhaustive()
    }
}

impl Builtins {
    /// Register every predefined symbol in `table` and return the drawing
    /// state wired to `backend`.
    pub fn install(table: &mut SymbolTable, backend: Box<dyn RenderBackend>) -> Self {
        let int_pair = || Type::tuple(Type::Integer);
        let origin = table.add_predefined(
            "origin",
            int_pair(),
            Value::Tuple(vec![Value::Int(0), Value::Int(0)]),
            Some(ValueFilter::Pair("origin")),
        );
        let rot = table.add_predefined("rot", Type::Double, Value::Double(0.0), None);
        let scale = table.add_predefined(
            "scale",
            Type::tuple(Type::Double),
            Value::Tuple(vec![Value::Double(1.0), Value::Double(1.0)]),
            Some(ValueFilter::Pair("scale")),
        );
        table.add_predefined("t", Type::Double, Value::Double(0.0), None);
        table.add_predefined(
            "P",
            Type::tuple(Type::Double),
            Value::Tuple(vec![Value::Double(0.0)]),
            None,
        );
        let background_size = table.add_predefined(
            "background_size",
            int_pair(),
            Value::Tuple(vec![Value::Int(500), Value::Int(500)]),
            Some(ValueFilter::CanvasSize),
        );
        let background_color = table.add_predefined(
            "background_color",
            int_pair(),
            Value::Tuple(vec![Value::Int(255), Value::Int(255), Value::Int(255)]),
            Some(ValueFilter::CanvasColor),
        );
        let line_width = table.add_predefined(
            "line_width",
            Type::Integer,
            Value::Int(1),
            Some(ValueFilter::StrokeWidth),
        );
        let line_color = table.add_predefined(
            "line_color",
            int_pair(),
            Value::Tuple(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
            Some(ValueFilter::StrokeColor),
        );

        table.add_constant("PI", Type::Double, Value::Double(std::f64::consts::PI));
        table.add_constant("E", Type::Double, Value::Double(2.718_281_828_459));

        table.add_function("print", Type::Void, vec![Type::Integer], BuiltinFn::PrintInt);
        table.add_function("print", Type::Void, vec![Type::Double], BuiltinFn::PrintDouble);
        table.add_function("print", Type::Void, vec![Type::String], BuiltinFn::PrintStr);
        table.add_function(
            "print",
            Type::Void,
            vec![Type::tuple(Type::Integer)],
            BuiltinFn::PrintIntTuple,
        );
        table.add_function(
            "print",
            Type::Void,
            vec![Type::tuple(Type::Double)],
            BuiltinFn::PrintDoubleTuple,
        );
        table.add_function(
            "color",
            Type::tuple(Type::Integer),
            vec![Type::String],
            BuiltinFn::ColorFromStr,
        );
        table.add_function("abs", Type::Integer, vec![Type::Integer], BuiltinFn::AbsInt);
        table.add_function("abs", Type::Double, vec![Type::Double], BuiltinFn::AbsDouble);
        table.add_function("cos", Type::Double, vec![Type::Double], BuiltinFn::Cos);
        table.add_function("sin", Type::Double, vec![Type::Double], BuiltinFn::Sin);
        table.add_function("tan", Type::Double, vec![Type::Double], BuiltinFn::Tan);
        table.add_function("ln", Type::Double, vec![Type::Double], BuiltinFn::Ln);
        table.add_function(
            "rand_int",
            Type::Integer,
            vec![Type::Integer, Type::Integer],
            BuiltinFn::RandInt,
        );
        table.add_function(
            "draw",
            Type::Void,
            vec![Type::Double, Type::Double],
            BuiltinFn::Draw,
        );
        table.add_function("save", Type::Void, vec![Type::String], BuiltinFn::Save);

        Self {
            backend,
            have_drawn: false,
            origin,
            scale,
            rot,
            background_size,
            background_color,
            line_width,
            line_color,
        }
    }

    /// Whether any drawing (or canvas creation) has happened yet.
    #[must_use]
    pub fn have_drawn(&self) -> bool {
        self.have_drawn
    }

    /// Dispatch one built-in call. Arguments have already been converted to
    /// the overload's parameter types. A failed call reports through `pack`
    /// and clears `pack.success`.
    pub fn call(
        &mut self,
        imp: BuiltinFn,
        diag: &DiagEngine<'_>,
        pack: &mut DiagPack,
        args: &[Value],
        table: &SymbolTable,
    ) -> Value {
        match imp {
            BuiltinFn::PrintInt
            | BuiltinFn::PrintDouble
            | BuiltinFn::PrintStr
            | BuiltinFn::PrintIntTuple
            | BuiltinFn::PrintDoubleTuple => {
                println!("print: {}", args[0]);
                Value::Void
            }
            BuiltinFn::ColorFromStr => {
                let text = args[0].as_str();
                parse_color(text).map_or_else(
                    || {
                        diag.create_range(DiagKind::ColorStr, pack.locs[0], pack.locs[1])
                            .arg_str(text)
                            .finish();
                        pack.success = false;
                        Value::Tuple(Vec::new())
                    },
                    |rgb| Value::Tuple(rgb.into_iter().map(Value::Int).collect()),
                )
            }
            BuiltinFn::AbsInt => {
                let v = args[0].as_int();
                if v == i32::MIN {
                    diag.create_range(DiagKind::ParamValue, pack.locs[0], pack.locs[1])
                        .arg_int(-i64::from(v))
                        .arg_str("abs")
                        .finish();
                    pack.success = false;
                    return Value::Int(0);
                }
                Value::Int(v.abs())
            }
            BuiltinFn::AbsDouble => Value::Double(args[0].as_double().abs()),
            BuiltinFn::Cos => Value::Double(args[0].as_double().cos()),
            BuiltinFn::Sin => Value::Double(args[0].as_double().sin()),
            BuiltinFn::Tan => {
                self.checked_unary_math(diag, pack, "tan", args[0].as_double(), f64::tan)
            }
            BuiltinFn::Ln => {
                self.checked_unary_math(diag, pack, "ln", args[0].as_double(), f64::ln)
            }
            BuiltinFn::RandInt => {
                let a = args[0].as_int();
                let b = args[1].as_int();
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                Value::Int(thread_rng().gen_range(lo..=hi))
            }
            BuiltinFn::Draw => {
                self.draw_point(table, args[0].as_double(), args[1].as_double());
                Value::Void
            }
            BuiltinFn::Save => {
                let path = args[0].as_str().to_owned();
                self.ensure_canvas(table);
                if let Err(err) = self.backend.flush(&path) {
                    diag.create_range(DiagKind::SaveImage, pack.locs[0], pack.locs[1])
                        .arg_str(&path)
                        .arg_str(err.message)
                        .finish();
                    pack.success = false;
                }
                Value::Void
            }
            BuiltinFn::Stub => Value::Void,
        }
    }

    fn checked_unary_math(
        &self,
        diag: &DiagEngine<'_>,
        pack: &mut DiagPack,
        name: &str,
        arg: f64,
        f: fn(f64) -> f64,
    ) -> Value {
        let result = f(arg);
        if !result.is_finite() {
            diag.create_range(DiagKind::ParamValue, pack.locs[0], pack.locs[1])
                .arg_double(arg)
                .arg_str(name)
                .finish();
            pack.success = false;
        }
        Value::Double(result)
    }

    /// Allocate the canvas from `background_size`/`background_color` if it
    /// does not exist yet. Creation latches `have_drawn`, which freezes the
    /// background variables.
    fn ensure_canvas(&mut self, table: &SymbolTable) {
        if self.have_drawn {
            return;
        }
        let size = pair(table.var_value(self.background_size));
        let color = rgba(table.var_value(self.background_color));
        self.backend.create_canvas(
            to_dimension(size.0),
            to_dimension(size.1),
            color,
        );
        self.have_drawn = true;
    }

    fn draw_point(&mut self, table: &SymbolTable, x: f64, y: f64) {
        self.ensure_canvas(table);
        let origin = pair(table.var_value(self.origin));
        let scale = pair(table.var_value(self.scale));
        let rot = table.var_value(self.rot).as_double();
        let width = table.var_value(self.line_width).as_int();
        let color = rgba(table.var_value(self.line_color));
        let point = self.backend.transform((x, y), origin, rot, scale);
        self.backend.put_point(point, width, color);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pair(value: &Value) -> (f64, f64) {
    let elems = value.as_tuple();
    (elems[0].as_number(), elems[1].as_number())
}

fn rgba(value: &Value) -> [u8; 4] {
    let elems = value.as_tuple();
    let chan = |i: usize| -> u8 {
        elems
            .get(i)
            .map_or(255, |v| u8::try_from(v.as_int()).unwrap_or(255))
    };
    [chan(0), chan(1), chan(2), chan(3)]
}

fn to_dimension(v: f64) -> u32 {
    if v < 1.0 {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let dim = v as u32;
    dim
}

/// Parse `#RRGGBB` or one of the predefined color names.
fn parse_color(text: &str) -> Option<[i32; 3]> {
    let hex = match text {
        "red" => "#FF0000",
        "green" => "#00FF00",
        "blue" => "#0000FF",
        other => other,
    };
    let rest = hex.strip_prefix('#')?;
    if rest.len() != 6 || !rest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let part = |range: std::ops::Range<usize>| i32::from_str_radix(&rest[range], 16).ok();
    Some([part(0..2)?, part(2..4)?, part(4..6)?])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

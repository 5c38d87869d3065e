//! Runtime value types.
//!
//! Every expression evaluates to a [`Value`] of some [`Type`]. Types form a
//! small algebra: the basic kinds plus an arbitrarily nested homogeneous
//! `Tuple`. Type equality is structural.

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The type of a value or variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// No value (the return type of side-effecting functions).
    Void,
    /// 32-bit signed integer.
    Integer,
    /// IEEE-754 binary64.
    Double,
    /// UTF-8 text.
    String,
    /// Homogeneous list; the element type may itself be a tuple.
    Tuple(Box<Type>),
}

impl Type {
    /// Convenience constructor for `Tuple(elem)`.
    #[must_use]
    pub fn tuple(elem: Self) -> Self {
        Self::Tuple(Box::new(elem))
    }

    /// Whether this is a tuple type.
    #[must_use]
    pub const fn is_tuple(&self) -> bool {
        matches!(self, Self::Tuple(_))
    }

    /// The element type of a tuple.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a tuple.
    #[must_use]
    pub fn elem(&self) -> &Self {
        match self {
            Self::Tuple(sub) => sub,
            _ => panic!("elem() on non-tuple type"),
        }
    }

    /// Whether a runtime variable of this type can be created.
    /// Only `Void` cannot.
    #[must_use]
    pub const fn is_assignable(&self) -> bool {
        !matches!(self, Self::Void)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "Void"),
            Self::Integer => write!(f, "Integer"),
            Self::Double => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::Tuple(sub) => write!(f, "Tuple<{sub}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A dynamically tagged runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Void,
    /// Integer payload.
    Int(i32),
    /// Double payload.
    Double(f64),
    /// String payload.
    Str(String),
    /// Tuple payload; all elements share the declared element type.
    Tuple(Vec<Value>),
}

impl Value {
    /// Extract an integer payload.
    ///
    /// # Panics
    ///
    /// Panics if the value is not an `Int`; callers rely on the type system
    /// having matched value and type already.
    #[must_use]
    pub fn as_int(&self) -> i32 {
        match self {
            Self::Int(v) => *v,
            _ => panic!("as_int() on {self:?}"),
        }
    }

    /// Extract a double payload (see [`Self::as_int`] for the contract).
    #[must_use]
    pub fn as_double(&self) -> f64 {
        match self {
            Self::Double(v) => *v,
            _ => panic!("as_double() on {self:?}"),
        }
    }

    /// Extract a string payload (see [`Self::as_int`] for the contract).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Str(v) => v,
            _ => panic!("as_str() on {self:?}"),
        }
    }

    /// Extract tuple elements (see [`Self::as_int`] for the contract).
    #[must_use]
    pub fn as_tuple(&self) -> &[Self] {
        match self {
            Self::Tuple(v) => v,
            _ => panic!("as_tuple() on {self:?}"),
        }
    }

    /// A numeric payload widened to `f64`, for `Int` and `Double` values.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Int(v) => f64::from(*v),
            Self::Double(v) => *v,
            _ => panic!("as_number() on {self:?}"),
        }
    }

    /// Rendering used in diagnostics and by `print`.
    #[must_use]
    pub fn spelling(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// A value paired with its type and a compile-time-constant flag.
///
/// The constant flag propagates through operators: an expression is constant
/// exactly when every leaf it was computed from is a literal or a predefined
/// constant.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    /// The static type.
    pub ty: Type,
    /// The payload; its shape matches `ty`.
    pub value: Value,
    constant: bool,
}

impl TypedValue {
    /// A non-constant typed value.
    #[must_use]
    pub fn new(ty: Type, value: Value) -> Self {
        Self {
            ty,
            value,
            constant: false,
        }
    }

    /// A compile-time-constant typed value.
    #[must_use]
    pub fn constant(ty: Type, value: Value) -> Self {
        Self {
            ty,
            value,
            constant: true,
        }
    }

    /// Whether this value is a compile-time constant.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        self.constant
    }

    /// Mark the value as a compile-time constant.
    pub fn make_constant(&mut self) {
        self.constant = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

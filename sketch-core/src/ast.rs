//! Abstract syntax tree.
//!
//! Statements and expressions are tagged enums rather than a class
//! hierarchy; every node carries its `[start, end)` byte span. Name
//! references are bound late: `Var` and `Call` nodes hold a `Cell` with an
//! optional symbol-table handle that the semantic layer fills in on first
//! visit.

use std::cell::Cell;

use crate::symbols::{FnId, VarId};
use crate::token::Span;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    /// Source spelling.
    #[must_use]
    pub const fn spelling(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "**",
        }
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
}

impl UnOp {
    /// Source spelling.
    #[must_use]
    pub const fn spelling(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// An expression node.
#[derive(Debug)]
pub struct Expr {
    /// What the expression is.
    pub kind: ExprKind,
    /// Source range of the whole expression.
    pub span: Span,
}

/// Expression variants.
#[derive(Debug)]
pub enum ExprKind {
    /// A numeric literal. `has_dot` records whether the source spelling
    /// contained a decimal point, which decides Integer vs Double.
    Num { value: f64, has_dot: bool },
    /// A string literal (escapes already decoded, adjacent literals fused).
    Str(String),
    /// A variable reference; `binding` is filled by the semantic layer.
    Var {
        name: String,
        binding: Cell<Option<VarId>>,
    },
    /// A tuple literal with at least two elements.
    Tuple(Vec<Expr>),
    /// A function call; `binding` is filled by overload resolution.
    Call {
        name: String,
        name_span: Span,
        args: Vec<Expr>,
        binding: Cell<Option<FnId>>,
    },
    /// A binary operation.
    Binary {
        op: BinOp,
        op_loc: usize,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A unary prefix operation.
    Unary {
        op: UnOp,
        op_loc: usize,
        operand: Box<Expr>,
    },
    /// Placeholder for a subexpression that failed to parse. Never survives
    /// into a statement handed to the interpreter.
    Error,
}

impl Expr {
    /// Create an expression node.
    #[must_use]
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// An error sentinel covering `span`.
    #[must_use]
    pub fn error(span: Span) -> Self {
        Self {
            kind: ExprKind::Error,
            span,
        }
    }

    /// Whether this node is a plain variable reference.
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self.kind, ExprKind::Var { .. })
    }

    /// Postfix rendering of the expression, used by parser tests.
    #[must_use]
    pub fn postfix(&self) -> String {
        match &self.kind {
            ExprKind::Num { value, .. } => format!("{value}"),
            ExprKind::Str(s) => format!("{s:?}"),
            ExprKind::Var { name, .. } => name.clone(),
            ExprKind::Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(Self::postfix).collect();
                format!("({})", inner.join(" "))
            }
            ExprKind::Call { name, args, .. } => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&arg.postfix());
                    out.push(' ');
                }
                out.push_str(name);
                out.push_str("()");
                out
            }
            ExprKind::Binary { op, lhs, rhs, .. } => {
                format!("{} {} {}", lhs.postfix(), rhs.postfix(), op.spelling())
            }
            ExprKind::Unary { op, operand, .. } => {
                format!("{} u{}", operand.postfix(), op.spelling())
            }
            ExprKind::Error => "<error>".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A statement node.
#[derive(Debug)]
pub enum Stmt {
    /// A lone `;`.
    Empty {
        /// Location of the semicolon.
        span: Span,
    },
    /// `lhs is rhs ;` — `lhs` is always a `Var` expression.
    Assign {
        lhs: Expr,
        /// Location of the `is` keyword.
        is_loc: usize,
        rhs: Expr,
        /// Location of the terminating semicolon (possibly synthesized).
        semi_loc: usize,
    },
    /// An expression evaluated for its side effects.
    Expr { expr: Expr, semi_loc: usize },
    /// `for var (from e)? to e (step e)? body`
    For {
        for_loc: usize,
        var: Expr,
        from: Option<Expr>,
        from_loc: usize,
        to: Expr,
        to_loc: usize,
        step: Option<Expr>,
        step_loc: usize,
        body: Vec<Stmt>,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The catalogue of reportable diagnostics.
//!
//! Each kind carries a fixed severity and a message template. Templates use
//! positional placeholders: `%N` expands to the Nth argument, `%%` is a
//! literal percent sign, and anything else after `%` is copied verbatim.

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A hard error; the surrounding statement is abandoned.
    Error,
    /// Execution continues.
    Warning,
    /// Additional context for a preceding error or warning.
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

macro_rules! diag_kinds {
    ($($name:ident => ($severity:ident, $template:literal),)*) => {
        /// Every diagnostic the interpreter can produce.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum DiagKind {
            $($name,)*
        }

        impl DiagKind {
            /// Severity of this kind.
            #[must_use]
            pub const fn severity(self) -> Severity {
                match self {
                    $(Self::$name => Severity::$severity,)*
                }
            }

            /// Raw message template with `%N` placeholders.
            #[must_use]
            pub const fn template(self) -> &'static str {
                match self {
                    $(Self::$name => $template,)*
                }
            }
        }
    };
}

diag_kinds! {
    // Driver
    NoInputFile => (Error, "no input file"),
    OpenFile => (Error, "cannot open file '%0'"),

    // Lexical
    NullInFile => (Warning, "ignoring null character in source"),
    UnknownChar => (Error, "unknown character '%0'"),
    UnterminatedString => (Warning, "missing terminating '\"' character"),
    UnknownEscape => (Warning, "unknown escape sequence '%0'"),

    // Syntactic
    Expect => (Error, "expected '%0'"),
    ExpectExpr => (Error, "expected expression"),
    ExpectSemiAfter => (Error, "expected ';' after %0"),
    ExpectVariable => (Error, "expected a variable"),
    ConstantTooLarge => (Error, "constant too large"),
    CannotBeUnary => (Error, "'%0' cannot be used as a unary operator"),
    MatchLParen => (Note, "to match this '('"),
    MatchLBrace => (Note, "to match this '{'"),

    // Semantic
    UseUnknownIdentifier => (Error, "use of unknown identifier"),
    UseUnknownIdentifierWithHint => (Error, "use of unknown identifier; did you mean '%0'?"),
    UseFuncAsVar => (Error, "a function name cannot be used as a variable"),
    UseVarAsFunc => (Error, "a variable cannot be used as a function"),
    NoMatchFunc => (Error, "no matching function for call to '%0'"),
    AmbiguousCall => (Error, "call to '%0' is ambiguous"),
    Candidate => (Note, "candidate: %0"),
    CandidateParamCountMismatch =>
        (Note, "candidate function not viable: requires %0 arguments, but %1 were provided"),
    CandidateParamTypeMismatch =>
        (Note, "candidate function not viable: no known conversion from '%0' to '%1' for the %2 argument"),
    ConflictTupleElemType => (Error, "conflicting tuple element types '%0' and '%1'"),
    InvalidBinaryOperand => (Error, "invalid operand types '%0' and '%1' to binary expression"),
    InvalidUnaryOperand => (Error, "invalid operand type '%0' to unary expression"),
    InvalidBinaryResult => (Error, "%0 %1 and %2 produces an unrepresentable result"),
    MulStrNegativeNum => (Error, "cannot repeat a string %0 times"),
    DivZero => (Warning, "division by zero"),
    InvalidCompareType => (Error, "cannot compare '%0' with '%1'"),
    DeducedVariableType => (Error, "cannot create a variable of type '%0'"),

    // Runtime
    AssignIncompatibleType =>
        (Error, "cannot assign a value of type '%1' to a variable of type '%0'"),
    AssignConstant => (Error, "cannot assign to a constant"),
    AssignElemCount => (Error, "'%0' expects %1 elements, but %2 were given"),
    SizeValue => (Error, "invalid size %0 for '%1'"),
    LineWidth => (Error, "line width must be between 1 and 10, but %0 was given"),
    ColorValue => (Error, "color component %0 is out of range [0, 255]"),
    ColorStr => (Error, "invalid color string \"%0\""),
    ParamValue => (Error, "invalid argument value %0 for '%1'"),
    SaveImage => (Error, "cannot save image to '%0': %1"),
    NarrowConversion =>
        (Warning, "implicit conversion from '%0' to '%1' changes value from %2 to %3"),
    SetAfterDrawing => (Warning, "'%0' cannot be changed after drawing has started"),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities() {
        assert_eq!(DiagKind::ExpectExpr.severity(), Severity::Error);
        assert_eq!(DiagKind::DivZero.severity(), Severity::Warning);
        assert_eq!(DiagKind::MatchLParen.severity(), Severity::Note);
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Note.to_string(), "note");
    }
}

//! Diagnostic engine.
//!
//! Diagnostics are built in three steps:
//!
//! 1. [`DiagEngine::create`] (or `create_at` / `create_range`) resolves the
//!    byte offsets to a line, a column range, and the source line text.
//! 2. The returned [`DiagBuilder`] accumulates positional arguments and an
//!    optional [`FixHint`].
//! 3. [`DiagBuilder::finish`] substitutes the `%N` placeholders and hands the
//!    rendered [`Diagnostic`] to the installed [`DiagConsumer`].
//!
//! Builders may be held unfinished and emitted later; overload resolution
//! uses this to attach candidate notes only when no viable function remains.

mod kinds;

pub use kinds::{DiagKind, Severity};

use std::cell::RefCell;
use std::fmt::Write as _;

use crate::source::SourceBuffer;

// ---------------------------------------------------------------------------
// Fix-it hints
// ---------------------------------------------------------------------------

/// A machine-actionable replacement suggestion anchored to a column range
/// on the diagnostic's line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixHint {
    /// Half-open column range `[start, end)` to replace.
    pub replace_range: (usize, usize),
    /// Replacement text.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Rendered diagnostic
// ---------------------------------------------------------------------------

/// A fully rendered diagnostic, ready for a consumer.
///
/// Line and column indices are stored zero-based; consumers add one when
/// displaying them.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Error, warning, or note.
    pub severity: Severity,
    /// Which diagnostic this is.
    pub kind: DiagKind,
    /// Name of the source file, when one is attached to the engine.
    pub file_name: Option<String>,
    /// Zero-based line index, when the location resolved.
    pub line: Option<usize>,
    /// Zero-based column range on that line.
    pub col_range: (usize, usize),
    /// Text of the source line, without its newline.
    pub source_line: Option<String>,
    /// Message after placeholder substitution.
    pub message: String,
    /// Attached fix-it hint, if any.
    pub fix: Option<FixHint>,
    /// Set when the location or column range did not resolve cleanly.
    /// The diagnostic is still delivered.
    pub invalid: bool,
}

impl Diagnostic {
    /// Whether the diagnostic carries a resolved source line.
    #[must_use]
    pub fn has_line(&self) -> bool {
        self.source_line.is_some()
    }

    /// Whether the column range spans more than one column.
    #[must_use]
    pub fn is_col_range(&self) -> bool {
        self.has_line() && self.col_range.1 > self.col_range.0 + 1
    }
}

// ---------------------------------------------------------------------------
// Consumers
// ---------------------------------------------------------------------------

/// Receiver of rendered diagnostics.
///
/// Implementations must not mutate the diagnostic; they only observe it.
pub trait DiagConsumer {
    /// Deliver one diagnostic.
    fn report(&self, diag: &Diagnostic);
}

/// Writes diagnostics to standard error in Clang style:
///
/// ```text
/// file:line:col: severity: message
/// source line
///       ^~~~
///       fix-it text
/// ```
#[derive(Debug, Default)]
pub struct StderrConsumer;

impl StderrConsumer {
    fn render(diag: &Diagnostic) -> String {
        let mut out = String::new();
        if let Some(name) = &diag.file_name {
            let _ = write!(out, "{name}:");
        }
        if let Some(line) = diag.line {
            let _ = write!(out, "{}:", line + 1);
            let col = diag
                .fix
                .as_ref()
                .map_or(diag.col_range.0 + 1, |f| f.replace_range.0 + 1);
            let _ = write!(out, "{col}: ");
        }
        let _ = writeln!(out, "{}: {}", diag.severity, diag.message);
        if let Some(src) = &diag.source_line {
            let _ = writeln!(out, "{src}");
            if let Some(fix) = &diag.fix {
                let _ = write!(out, "{}^", " ".repeat(fix.replace_range.0));
                for _ in fix.replace_range.0 + 1..fix.replace_range.1 {
                    out.push('~');
                }
                out.push('\n');
                let _ = writeln!(out, "{}{}", " ".repeat(fix.replace_range.0), fix.text);
            } else {
                let _ = write!(out, "{}^", " ".repeat(diag.col_range.0));
                if diag.is_col_range() {
                    for _ in diag.col_range.0 + 1..diag.col_range.1 {
                        out.push('~');
                    }
                }
                out.push('\n');
            }
        }
        out
    }
}

impl DiagConsumer for StderrConsumer {
    fn report(&self, diag: &Diagnostic) {
        eprint!("{}", Self::render(diag));
    }
}

/// Buffers diagnostics in memory. Used by tests and by callers that want to
/// inspect what a run produced.
#[derive(Debug, Default)]
pub struct BufferConsumer {
    collected: RefCell<Vec<Diagnostic>>,
}

impl BufferConsumer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics reported so far.
    #[must_use]
    pub fn diags(&self) -> Vec<Diagnostic> {
        self.collected.borrow().clone()
    }

    /// Number of diagnostics reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collected.borrow().len()
    }

    /// Whether nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collected.borrow().is_empty()
    }

    /// Drop everything collected so far.
    pub fn clear(&self) {
        self.collected.borrow_mut().clear();
    }
}

impl DiagConsumer for BufferConsumer {
    fn report(&self, diag: &Diagnostic) {
        self.collected.borrow_mut().push(diag.clone());
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Creates diagnostics and resolves byte offsets to line/column positions.
pub struct DiagEngine<'a> {
    source: Option<&'a SourceBuffer>,
    consumer: &'a dyn DiagConsumer,
}

impl<'a> DiagEngine<'a> {
    /// Create an engine. `source` may be absent for diagnostics produced
    /// before any file is loaded (e.g. a missing command-line argument).
    #[must_use]
    pub fn new(source: Option<&'a SourceBuffer>, consumer: &'a dyn DiagConsumer) -> Self {
        Self { source, consumer }
    }

    /// Start a diagnostic with no source location.
    #[must_use]
    pub fn create(&self, kind: DiagKind) -> DiagBuilder<'a, '_> {
        self.create_impl(kind, 1, 0)
    }

    /// Start a diagnostic pointing at a single byte offset.
    #[must_use]
    pub fn create_at(&self, kind: DiagKind, loc: usize) -> DiagBuilder<'a, '_> {
        self.create_impl(kind, loc, loc + 1)
    }

    /// Start a diagnostic covering the byte range `[start, end)`.
    #[must_use]
    pub fn create_range(&self, kind: DiagKind, start: usize, end: usize) -> DiagBuilder<'a, '_> {
        self.create_impl(kind, start, end)
    }

    fn create_impl(&self, kind: DiagKind, start: usize, end: usize) -> DiagBuilder<'a, '_> {
        let mut diag = Diagnostic {
            severity: kind.severity(),
            kind,
            file_name: self.source.map(|s| s.name().to_owned()),
            line: None,
            col_range: (0, 0),
            source_line: None,
            message: String::new(),
            fix: None,
            invalid: false,
        };
        if start <= end {
            if let Some(src) = self.source {
                if let Some(line) = src.line_of(start) {
                    let line_start = src.line_start(line);
                    let text = src.line_text(line).to_owned();
                    diag.line = Some(line);
                    diag.col_range = (start - line_start, end - line_start);
                    if diag.col_range.1 > text.len() + 1 {
                        diag.invalid = true;
                    }
                    diag.source_line = Some(text);
                } else {
                    diag.invalid = true;
                }
            }
        }
        DiagBuilder {
            engine: self,
            diag,
            args: Vec::new(),
        }
    }

    /// A fix-it hint that inserts `text` immediately after the byte at
    /// `loc`.
    #[must_use]
    pub fn insertion_after(&self, loc: usize, text: &str) -> Option<FixHint> {
        let src = self.source?;
        let line = src.line_of(loc)?;
        let col = loc - src.line_start(line);
        Some(FixHint {
            replace_range: (col + 1, col + 2),
            text: text.to_owned(),
        })
    }

    /// A fix-it hint replacing the byte range `[start, end)` with `text`.
    ///
    /// Returns `None` (a disabled hint) when the range is inverted or does
    /// not resolve to a line.
    #[must_use]
    pub fn replacement(&self, start: usize, end: usize, text: &str) -> Option<FixHint> {
        if start > end {
            return None;
        }
        let src = self.source?;
        let line = src.line_of(start)?;
        let line_start = src.line_start(line);
        Some(FixHint {
            replace_range: (start - line_start, end - line_start),
            text: text.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum DiagArg {
    Str(String),
    Int(i64),
    Double(f64),
    Char(char),
}

impl DiagArg {
    fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(v) => v.to_string(),
            // Shortest representation that round-trips.
            Self::Double(v) => format!("{v}"),
            Self::Char(c) => c.to_string(),
        }
    }
}

/// Accumulates the arguments of one diagnostic.
///
/// Dropping a builder without calling [`finish`](Self::finish) discards the
/// diagnostic silently; pending candidate notes rely on this.
#[must_use = "a diagnostic is only reported when finish() is called"]
pub struct DiagBuilder<'a, 'e> {
    engine: &'e DiagEngine<'a>,
    diag: Diagnostic,
    args: Vec<DiagArg>,
}

impl DiagBuilder<'_, '_> {
    /// Append a string argument.
    pub fn arg_str(mut self, value: impl Into<String>) -> Self {
        self.args.push(DiagArg::Str(value.into()));
        self
    }

    /// Append an integer argument (rendered in decimal).
    pub fn arg_int(mut self, value: i64) -> Self {
        self.args.push(DiagArg::Int(value));
        self
    }

    /// Append a floating-point argument (shortest round-trip rendering).
    pub fn arg_double(mut self, value: f64) -> Self {
        self.args.push(DiagArg::Double(value));
        self
    }

    /// Append a single-character argument.
    pub fn arg_char(mut self, value: char) -> Self {
        self.args.push(DiagArg::Char(value));
        self
    }

    /// Attach a fix-it hint. A `None` hint (disabled) is ignored.
    pub fn fix(mut self, hint: Option<FixHint>) -> Self {
        if hint.is_some() {
            self.diag.fix = hint;
        }
        self
    }

    /// Substitute placeholders and deliver the diagnostic to the consumer.
    pub fn finish(mut self) {
        self.diag.message = substitute(self.diag.kind.template(), &self.args);
        self.engine.consumer.report(&self.diag);
    }
}

/// Expand `%N` placeholders in `template` with `args`.
///
/// `%%` yields a literal `%`. A `%` followed by anything else (or nothing)
/// is copied verbatim, as is an out-of-range `%N`.
fn substitute(template: &str, args: &[DiagArg]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(d @ '0'..='9') => {
                let idx = d as usize - '0' as usize;
                if let Some(arg) = args.get(idx) {
                    out.push_str(&arg.render());
                } else {
                    out.push('%');
                    out.push(d);
                }
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Recursive-descent parser.
//!
//! Statements are parsed by dedicated routines; expressions use an explicit
//! operand/operator stack with precedence climbing. The parser is total: any
//! input produces a (possibly partial) statement list plus diagnostics.
//!
//! Two recovery mechanisms keep going after an error:
//!
//! - **Typo correction**: when an expected keyword or punctuation is
//!   missing, the current token may be recognised as a misspelling (small
//!   case-insensitive edit distance for keywords, a fixed confusion table
//!   for punctuation). A fix-it hint is attached and parsing proceeds as if
//!   the expected token had been seen.
//! - **`skip_until`**: skips forward to a stop set, descending into bracket
//!   pairs so that a stray `;` inside parentheses does not end the
//!   enclosing statement.

use crate::ast::{BinOp, Expr, ExprKind, Stmt, UnOp};
use crate::diag::{DiagEngine, DiagKind};
use crate::edit::edit_distance;
use crate::lexer::Lexer;
use crate::token::{Keyword, Op, Span, Token, TokenKind};

// ---------------------------------------------------------------------------
// Operator precedence
// ---------------------------------------------------------------------------

enum PendingOp {
    Binary(BinOp),
    Unary(UnOp),
}

struct OpEntry {
    op: PendingOp,
    loc: usize,
    prec: i32,
}

/// Precedence and associativity of `op` in binary or unary position.
/// Returns `None` when the operator cannot appear in that position.
fn op_entry(op: Op, is_binary: bool) -> Option<(PendingOp, i32, bool)> {
    if is_binary {
        match op {
            Op::Plus => Some((PendingOp::Binary(BinOp::Add), 10, false)),
            Op::Minus => Some((PendingOp::Binary(BinOp::Sub), 10, false)),
            Op::Star => Some((PendingOp::Binary(BinOp::Mul), 20, false)),
            Op::Slash => Some((PendingOp::Binary(BinOp::Div), 20, false)),
            Op::StarStar => Some((PendingOp::Binary(BinOp::Pow), 40, true)),
            _ => None,
        }
    } else {
        match op {
            Op::Plus => Some((PendingOp::Unary(UnOp::Plus), 30, true)),
            Op::Minus => Some((PendingOp::Unary(UnOp::Minus), 30, true)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parser over a token stream.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    diag: &'a DiagEngine<'a>,
    /// The current (not yet consumed) token.
    tok: Token,
    /// End offset of the most recently consumed token.
    prev_tok_loc: usize,
    /// Open-parenthesis depth, bounds error-recovery scans.
    paren_depth: u32,
    /// Open-brace depth, bounds error-recovery scans.
    brace_depth: u32,
}

impl<'a> Parser<'a> {
    /// Create a parser; pulls the first token immediately.
    #[must_use]
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let diag = lexer.diag_engine();
        let tok = lexer.next();
        Self {
            lexer,
            diag,
            tok,
            prev_tok_loc: 0,
            paren_depth: 0,
            brace_depth: 0,
        }
    }

    /// Parse the whole program.
    pub fn parse_program(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.tok.is(TokenKind::Eof) {
            let before = self.tok.span;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            } else if self.tok.span == before && !self.tok.is(TokenKind::Eof) {
                // The failed statement consumed nothing; drop one token so
                // the loop makes progress.
                self.consume_token();
            }
        }
        stmts
    }

    // -- token plumbing --

    fn consume_token(&mut self) -> usize {
        match self.tok.kind {
            TokenKind::Op(Op::LParen) => self.paren_depth += 1,
            TokenKind::Op(Op::RParen) => self.paren_depth = self.paren_depth.saturating_sub(1),
            TokenKind::Op(Op::LBrace) => self.brace_depth += 1,
            TokenKind::Op(Op::RBrace) => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
        self.prev_tok_loc = self.tok.span.end;
        self.tok = self.lexer.next();
        self.prev_tok_loc
    }

    fn next_token(&mut self) -> Token {
        self.lexer.peek(0).clone()
    }

    // -- expectation helpers --

    /// Consume `expected`, correcting a recognised typo with a fix-it.
    /// On failure reports `expected '<spelling>'` and returns `false`.
    fn expect_and_consume(&mut self, expected: TokenKind, spelling: &str, check_typo: bool) -> bool {
        if self.tok.is(expected) {
            self.consume_token();
            return true;
        }
        if check_typo && self.maybe_typo(&self.tok, expected) {
            let fix = self
                .diag
                .replacement(self.tok.span.start, self.tok.span.end, spelling);
            self.diag
                .create_range(DiagKind::Expect, self.tok.span.start, self.tok.span.start)
                .arg_str(spelling)
                .fix(fix)
                .finish();
            self.consume_token();
            return true;
        }
        self.diag
            .create_at(DiagKind::Expect, self.prev_tok_loc)
            .arg_str(spelling)
            .finish();
        false
    }

    fn expect_right_paren_and_consume(&mut self, l_paren_loc: usize) -> bool {
        if self.tok.is(TokenKind::Op(Op::RParen)) {
            self.consume_token();
            return true;
        }
        self.diag
            .create_at(DiagKind::Expect, self.tok.span.start)
            .arg_char(')')
            .finish();
        self.diag
            .create_at(DiagKind::MatchLParen, l_paren_loc)
            .finish();
        false
    }

    fn expect_right_brace_and_consume(&mut self, l_brace_loc: usize) -> bool {
        if self.tok.is(TokenKind::Op(Op::RBrace)) {
            self.consume_token();
            return true;
        }
        self.diag
            .create_at(DiagKind::Expect, self.tok.span.start)
            .arg_char('}')
            .finish();
        self.diag
            .create_at(DiagKind::MatchLBrace, l_brace_loc)
            .finish();
        false
    }

    /// Consume the statement-terminating semicolon. A missing semicolon is
    /// reported with an insert-after-previous-token fix-it and parsing
    /// proceeds as if it had been present. Returns the semicolon location.
    fn expect_semi_and_consume(&mut self, after: &str) -> usize {
        if self.tok.is(TokenKind::Op(Op::Semi)) {
            let loc = self.tok.span.start;
            self.consume_token();
            return loc;
        }
        if self.maybe_typo(&self.tok, TokenKind::Op(Op::Semi)) {
            let fix = self
                .diag
                .replacement(self.tok.span.start, self.tok.span.end, ";");
            self.diag
                .create_range(DiagKind::Expect, self.tok.span.start, self.tok.span.start)
                .arg_char(';')
                .fix(fix)
                .finish();
            let loc = self.tok.span.start;
            self.consume_token();
            return loc;
        }
        let fix = self
            .diag
            .insertion_after(self.prev_tok_loc.saturating_sub(1), ";");
        self.diag
            .create_range(
                DiagKind::ExpectSemiAfter,
                self.tok.span.start,
                self.tok.span.start,
            )
            .arg_str(after)
            .fix(fix)
            .finish();
        self.prev_tok_loc
    }

    /// Whether `input` looks like a misspelling of `expected`.
    fn maybe_typo(&self, input: &Token, expected: TokenKind) -> bool {
        match expected {
            // ':' or '.' for ';'
            TokenKind::Op(Op::Semi) => input.lexeme == ":" || input.lexeme == ".",
            // '.' for ','
            TokenKind::Op(Op::Comma) => input.lexeme == ".",
            // '\' for '/'
            TokenKind::Op(Op::Slash) => input.lexeme == "\\",
            TokenKind::Keyword(kw) => {
                let spelling = kw.spelling();
                let distance = edit_distance(&input.lexeme, spelling, true);
                distance <= 3 && distance < input.lexeme.len() && distance < spelling.len()
            }
            _ => false,
        }
    }

    // -- error recovery --

    /// Skip forward until a token in `kinds` (or end of input). Bracket
    /// pairs are descended into before the stop set is considered, and a
    /// closing bracket of an enclosing pair stops the scan. Returns whether
    /// a stop token was found.
    fn skip_until(&mut self, kinds: &[TokenKind], stop_before_match: bool, stop_before_semi: bool) -> bool {
        let mut first_token = true;
        loop {
            for &kind in kinds {
                if self.tok.is(kind) {
                    if !stop_before_match {
                        self.consume_token();
                    }
                    return true;
                }
            }
            match self.tok.kind {
                TokenKind::Eof => return false,
                TokenKind::Op(Op::LParen) => {
                    self.consume_token();
                    self.skip_until(&[TokenKind::Op(Op::RParen)], false, false);
                }
                TokenKind::Op(Op::LBrace) => {
                    self.consume_token();
                    self.skip_until(&[TokenKind::Op(Op::RBrace)], false, false);
                }
                TokenKind::Op(Op::RParen) => {
                    if self.paren_depth > 0 && !first_token {
                        return false;
                    }
                    self.consume_token();
                }
                TokenKind::Op(Op::RBrace) => {
                    if self.brace_depth > 0 && !first_token {
                        return false;
                    }
                    self.consume_token();
                }
                TokenKind::Op(Op::Semi) if stop_before_semi => return false,
                _ => {
                    self.consume_token();
                }
            }
            first_token = false;
        }
    }

    /// Recovery after a broken statement: skip to `;` or `}` and eat the
    /// semicolon if that is what stopped us.
    fn stmt_skip(&mut self) {
        self.skip_until(
            &[TokenKind::Op(Op::Semi), TokenKind::Op(Op::RBrace)],
            true,
            false,
        );
        if self.tok.is(TokenKind::Op(Op::Semi)) {
            self.consume_token();
        }
    }

    // -- statements --

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.tok.kind {
            TokenKind::Op(Op::Semi) => self.parse_empty_stmt(),
            TokenKind::Ident
            | TokenKind::Keyword(Keyword::Origin | Keyword::Scale | Keyword::Rot) => {
                let next = self.next_token();
                if next.is(TokenKind::Keyword(Keyword::Is))
                    || self.maybe_typo(&next, TokenKind::Keyword(Keyword::Is))
                {
                    self.parse_assignment_stmt()
                } else {
                    self.parse_expr_stmt()
                }
            }
            TokenKind::Keyword(Keyword::For) => self.parse_for_stmt(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_empty_stmt(&mut self) -> Option<Stmt> {
        let span = self.tok.span;
        self.consume_token();
        Some(Stmt::Empty { span })
    }

    /// `lhs 'is' expr ';'`
    fn parse_assignment_stmt(&mut self) -> Option<Stmt> {
        let lhs = self.parse_expr();
        let mut invalid = false;
        if let Some(e) = &lhs {
            if !e.is_variable() {
                self.diag
                    .create_at(DiagKind::ExpectVariable, e.span.start)
                    .finish();
                invalid = true;
            }
        } else {
            invalid = true;
        }
        let is_loc = self.tok.span.start;
        if !self.expect_and_consume(TokenKind::Keyword(Keyword::Is), "is", true) {
            self.stmt_skip();
            return None;
        }
        let rhs = self.parse_expr();
        let Some(rhs) = rhs else {
            self.stmt_skip();
            return None;
        };
        // Types are not checked here; the interpreter does that when the
        // statement runs.
        let semi_loc = self.expect_semi_and_consume("statement");
        if invalid {
            return None;
        }
        Some(Stmt::Assign {
            lhs: lhs.expect("checked above"),
            is_loc,
            rhs,
            semi_loc,
        })
    }

    /// `'for' var ('from' expr)? 'to' expr ('step' expr)? (stmt | '{' stmt+ '}')`
    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        debug_assert!(self.tok.is(TokenKind::Keyword(Keyword::For)));
        let mut invalid = false;
        let for_loc = self.tok.span.start;
        self.consume_token();

        // Only a plain variable can drive the loop, but parse a general
        // expression so a wrong operand gets a targeted diagnostic.
        let var = self.parse_expr();
        if let Some(e) = &var {
            if !e.is_variable() {
                self.diag
                    .create_at(DiagKind::ExpectVariable, e.span.start)
                    .finish();
                invalid = true;
            }
        } else {
            invalid = true;
        }

        // Optional 'from' clause; a close misspelling counts as well.
        let from_loc = self.tok.span.start;
        let mut from = None;
        if self.tok.is(TokenKind::Keyword(Keyword::From))
            || self.maybe_typo(&self.tok, TokenKind::Keyword(Keyword::From))
        {
            self.consume_token();
            from = self.parse_expr();
            if from.is_none() {
                invalid = true;
            }
        }

        let to_loc = self.tok.span.start;
        if !self.expect_and_consume(TokenKind::Keyword(Keyword::To), "to", false) {
            self.stmt_skip();
            return None;
        }
        let to = self.parse_expr();
        if to.is_none() {
            invalid = true;
        }

        // Optional 'step' clause. No typo check: an expression head could
        // be mistaken for a misspelled keyword here.
        let step_loc = self.tok.span.start;
        let mut step = None;
        if self.tok.is(TokenKind::Keyword(Keyword::Step)) {
            self.consume_token();
            step = self.parse_expr();
            if step.is_none() {
                invalid = true;
            }
        }

        let body = if self.tok.is(TokenKind::Op(Op::LBrace)) {
            self.parse_stmt_list()
        } else {
            self.parse_stmt().into_iter().collect()
        };

        if invalid {
            return None;
        }
        Some(Stmt::For {
            for_loc,
            var: var.expect("checked above"),
            from,
            from_loc,
            to: to.expect("checked above"),
            to_loc,
            step,
            step_loc,
            body,
        })
    }

    fn parse_expr_stmt(&mut self) -> Option<Stmt> {
        let Some(expr) = self.parse_expr() else {
            self.stmt_skip();
            return None;
        };
        let semi_loc = self.expect_semi_and_consume("expression");
        Some(Stmt::Expr { expr, semi_loc })
    }

    fn parse_stmt_list(&mut self) -> Vec<Stmt> {
        debug_assert!(self.tok.is(TokenKind::Op(Op::LBrace)));
        let l_brace_loc = self.tok.span.start;
        self.consume_token();
        let mut stmts = Vec::new();
        while !self.tok.is(TokenKind::Op(Op::RBrace)) && !self.tok.is(TokenKind::Eof) {
            let before = self.tok.span;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            } else if self.tok.span == before
                && !self.tok.is(TokenKind::Op(Op::RBrace))
                && !self.tok.is(TokenKind::Eof)
            {
                self.consume_token();
            }
        }
        self.expect_right_brace_and_consume(l_brace_loc);
        stmts
    }

    // -- expressions --

    /// Precedence-climbing expression parser over explicit operand and
    /// operator stacks.
    pub fn parse_expr(&mut self) -> Option<Expr> {
        let mut operands: Vec<Expr> = Vec::new();
        let mut ops: Vec<OpEntry> = Vec::new();
        let mut invalid = false;
        let mut expect_op = false;

        loop {
            let starts_primary = matches!(
                self.tok.kind,
                TokenKind::Ident
                    | TokenKind::Number
                    | TokenKind::Str
                    | TokenKind::Op(Op::LParen)
                    | TokenKind::Keyword(
                        Keyword::Origin | Keyword::Scale | Keyword::Rot | Keyword::Draw | Keyword::T
                    )
            );
            if starts_primary {
                if expect_op {
                    break;
                }
                let parsed = match self.tok.kind {
                    TokenKind::Number => self.parse_constant_value(),
                    TokenKind::Str => Some(self.parse_string_value()),
                    TokenKind::Op(Op::LParen) => self.parse_paren_expr(),
                    _ => self.parse_identifier_expr(),
                };
                match parsed {
                    Some(e) => operands.push(e),
                    None => {
                        invalid = true;
                        operands.push(Expr::error(Span::at(self.prev_tok_loc)));
                    }
                }
                expect_op = true;
                continue;
            }

            if let TokenKind::Op(
                op @ (Op::Plus | Op::Minus | Op::Star | Op::Slash | Op::StarStar),
            ) = self.tok.kind
            {
                let Some((pending, prec, right_assoc)) = op_entry(op, expect_op) else {
                    // e.g. `2 + * 3`: discard the operator and keep going to
                    // surface further errors in the same expression.
                    self.diag
                        .create_at(DiagKind::CannotBeUnary, self.tok.span.start)
                        .arg_str(op.spelling())
                        .finish();
                    invalid = true;
                    self.consume_token();
                    continue;
                };
                if expect_op {
                    while let Some(top) = ops.last() {
                        if top.prec > prec || (!right_assoc && top.prec == prec) {
                            let entry = ops.pop().expect("just observed");
                            Self::combine(&mut operands, entry);
                        } else {
                            break;
                        }
                    }
                }
                ops.push(OpEntry {
                    op: pending,
                    loc: self.tok.span.start,
                    prec,
                });
                expect_op = false;
                self.consume_token();
                continue;
            }

            break;
        }

        if !expect_op {
            // A primary expression is still owed.
            self.diag
                .create_at(DiagKind::ExpectExpr, self.tok.span.start)
                .finish();
            return None;
        }
        if invalid {
            return None;
        }
        while let Some(entry) = ops.pop() {
            Self::combine(&mut operands, entry);
        }
        debug_assert_eq!(operands.len(), 1);
        operands.pop()
    }

    /// Pop one operator entry and fold the top of the operand stack.
    fn combine(operands: &mut Vec<Expr>, entry: OpEntry) {
        let fallback = |loc: usize| Expr::error(Span::at(loc));
        match entry.op {
            PendingOp::Binary(op) => {
                let rhs = operands.pop().unwrap_or_else(|| fallback(entry.loc));
                let lhs = operands.pop().unwrap_or_else(|| fallback(entry.loc));
                let span = Span::new(lhs.span.start, rhs.span.end);
                operands.push(Expr::new(
                    ExprKind::Binary {
                        op,
                        op_loc: entry.loc,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                ));
            }
            PendingOp::Unary(op) => {
                let operand = operands.pop().unwrap_or_else(|| fallback(entry.loc));
                let span = Span::new(entry.loc, operand.span.end);
                operands.push(Expr::new(
                    ExprKind::Unary {
                        op,
                        op_loc: entry.loc,
                        operand: Box::new(operand),
                    },
                    span,
                ));
            }
        }
    }

    /// A numeric literal token.
    fn parse_constant_value(&mut self) -> Option<Expr> {
        debug_assert!(self.tok.is(TokenKind::Number));
        let tok = self.tok.clone();
        self.consume_token();
        let value: f64 = tok.lexeme.parse().unwrap_or(f64::INFINITY);
        if !value.is_finite() {
            self.diag
                .create_range(DiagKind::ConstantTooLarge, tok.span.start, tok.span.end)
                .finish();
            return None;
        }
        let has_dot = tok.lexeme.contains('.');
        Some(Expr::new(ExprKind::Num { value, has_dot }, tok.span))
    }

    /// One or more adjacent string literal tokens, fused into a single
    /// string expression.
    fn parse_string_value(&mut self) -> Expr {
        debug_assert!(self.tok.is(TokenKind::Str));
        let start = self.tok.span.start;
        let mut text = String::new();
        while self.tok.is(TokenKind::Str) {
            text.push_str(&self.decode_string(&self.tok.clone()));
            self.consume_token();
        }
        Expr::new(ExprKind::Str(text), Span::new(start, self.prev_tok_loc))
    }

    /// Decode the escape sequences of a string token. Unknown escapes warn
    /// and yield the escaped character verbatim.
    fn decode_string(&self, tok: &Token) -> String {
        let bytes = tok.lexeme.as_bytes();
        let mut content = &bytes[1..]; // opening quote
        if content.last() == Some(&b'"') {
            content = &content[..content.len() - 1];
        }
        let base = tok.span.start + 1;
        let mut out: Vec<u8> = Vec::with_capacity(content.len());
        let mut i = 0;
        while i < content.len() {
            let b = content[i];
            if b == b'\\' && i + 1 < content.len() {
                let esc = content[i + 1];
                match esc {
                    b'\'' | b'"' | b'?' | b'\\' => out.push(esc),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0B),
                    other => {
                        let pos = base + i;
                        self.diag
                            .create_range(DiagKind::UnknownEscape, pos, pos + 2)
                            .arg_str(format!("\\{}", char::from(other)))
                            .finish();
                        out.push(other);
                    }
                }
                i += 2;
            } else {
                out.push(b);
                i += 1;
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// An identifier head: a variable reference or a function call,
    /// depending on whether a `(` follows.
    fn parse_identifier_expr(&mut self) -> Option<Expr> {
        if self.next_token().is(TokenKind::Op(Op::LParen)) {
            self.parse_call_expr()
        } else {
            Some(self.parse_variable_expr())
        }
    }

    fn parse_variable_expr(&mut self) -> Expr {
        let name = self.tok.spelling().to_owned();
        let span = self.tok.span;
        self.consume_token();
        Expr::new(
            ExprKind::Var {
                name,
                binding: std::cell::Cell::new(None),
            },
            span,
        )
    }

    fn parse_call_expr(&mut self) -> Option<Expr> {
        let name = self.tok.spelling().to_owned();
        let name_span = self.tok.span;
        self.consume_token();
        debug_assert!(self.tok.is(TokenKind::Op(Op::LParen)));
        let l_paren_loc = self.tok.span.start;
        self.consume_token();

        let mut args = Vec::new();
        if !self.tok.is(TokenKind::Op(Op::RParen)) && !self.tok.is(TokenKind::Eof) {
            let mut list_invalid = false;
            args = self.parse_expr_list(&mut list_invalid);
            if list_invalid {
                self.skip_until(&[TokenKind::Op(Op::RParen)], false, true);
                return None;
            }
        }
        let r_paren_loc = self.tok.span.start;
        if !self.expect_right_paren_and_consume(l_paren_loc) {
            self.skip_until(&[TokenKind::Op(Op::RParen)], false, true);
            return None;
        }
        Some(Expr::new(
            ExprKind::Call {
                name,
                name_span,
                args,
                binding: std::cell::Cell::new(None),
            },
            Span::new(name_span.start, r_paren_loc + 1),
        ))
    }

    /// `'(' expr (',' expr)* ')'` — a parenthesised expression or a tuple.
    /// Single-element parentheses collapse to the inner expression.
    fn parse_paren_expr(&mut self) -> Option<Expr> {
        debug_assert!(self.tok.is(TokenKind::Op(Op::LParen)));
        let l_paren_loc = self.tok.span.start;
        self.consume_token();
        let mut invalid = false;
        let mut elems = self.parse_expr_list(&mut invalid);
        if invalid {
            self.skip_until(&[TokenKind::Op(Op::RParen)], false, true);
            return None;
        }
        let r_paren_loc = self.tok.span.start;
        if !self.expect_right_paren_and_consume(l_paren_loc) {
            self.skip_until(&[TokenKind::Op(Op::RParen)], false, true);
            return None;
        }
        debug_assert!(!elems.is_empty());
        if elems.len() == 1 {
            return elems.pop();
        }
        Some(Expr::new(
            ExprKind::Tuple(elems),
            Span::new(l_paren_loc, r_paren_loc + 1),
        ))
    }

    fn parse_expr_list(&mut self, invalid: &mut bool) -> Vec<Expr> {
        let mut result = Vec::new();
        loop {
            if let Some(expr) = self.parse_expr() {
                result.push(expr);
            } else {
                // Resynchronise on ',' or ')' to surface further errors in
                // the remaining elements.
                self.skip_until(
                    &[TokenKind::Op(Op::Comma), TokenKind::Op(Op::RParen)],
                    true,
                    true,
                );
                *invalid = true;
            }
            if !self.tok.is(TokenKind::Op(Op::Comma)) {
                break;
            }
            self.consume_token();
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{BufferConsumer, Diagnostic};
    use crate::source::SourceBuffer;

    fn parse(input: &str) -> (Vec<Stmt>, Vec<Diagnostic>) {
        let src = SourceBuffer::from_str("test.sk", input);
        let consumer = BufferConsumer::new();
        let engine = DiagEngine::new(Some(&src), &consumer);
        let lexer = Lexer::new(src.bytes(), &engine);
        let mut parser = Parser::new(lexer);
        let stmts = parser.parse_program();
        (stmts, consumer.diags())
    }

    fn parse_one_expr(input: &str) -> (Option<Expr>, Vec<Diagnostic>) {
        let src = SourceBuffer::from_str("test.sk", input);
        let consumer = BufferConsumer::new();
        let engine = DiagEngine::new(Some(&src), &consumer);
        let lexer = Lexer::new(src.bytes(), &engine);
        let mut parser = Parser::new(lexer);
        let expr = parser.parse_expr();
        (expr, consumer.diags())
    }

    fn postfix(input: &str) -> String {
        let (expr, diags) = parse_one_expr(input);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        expr.expect("expression").postfix()
    }

    // -- precedence and associativity --

    #[test]
    fn mul_binds_tighter_than_add() {
        assert_eq!(postfix("1 + 2 * 3"), "1 2 3 * +");
        assert_eq!(postfix("1 * 2 + 3"), "1 2 * 3 +");
    }

    #[test]
    fn add_and_sub_are_left_associative() {
        assert_eq!(postfix("1 - 2 - 3"), "1 2 - 3 -");
        assert_eq!(postfix("1 + 2 - 3"), "1 2 + 3 -");
    }

    #[test]
    fn pow_is_right_associative() {
        assert_eq!(postfix("2 ** 3 ** 2"), "2 3 2 ** **");
    }

    #[test]
    fn unary_binds_between_mul_and_pow() {
        // -2 ** 2 parses as -(2 ** 2)
        assert_eq!(postfix("-2 ** 2"), "2 2 ** u-");
        // -2 * 3 parses as (-2) * 3
        assert_eq!(postfix("-2 * 3"), "2 u- 3 *");
        assert_eq!(postfix("+ - 2"), "2 u- u+");
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(postfix("(1 + 2) * 3"), "1 2 + 3 *");
    }

    #[test]
    fn single_element_parens_collapse() {
        assert_eq!(postfix("((1.5))"), "1.5");
    }

    #[test]
    fn reparse_is_stable() {
        for input in ["1 + 2 * 3", "-2 ** 2", "(1, 2) + 3", "f(1, 2) * 4"] {
            assert_eq!(postfix(input), postfix(input));
        }
    }

    // -- primaries --

    #[test]
    fn tuple_literal() {
        assert_eq!(postfix("(1, 2, 3)"), "(1 2 3)");
    }

    #[test]
    fn call_with_args() {
        assert_eq!(postfix("f(1, 2 + 3)"), "1 2 3 + f()");
    }

    #[test]
    fn call_without_args() {
        assert_eq!(postfix("f()"), "f()");
    }

    #[test]
    fn keyword_identifiers_normalize_to_lower_case() {
        assert_eq!(postfix("ORIGIN"), "origin");
        assert_eq!(postfix("T + 1"), "t 1 +");
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let (expr, diags) = parse_one_expr("\"ab\" \"cd\"");
        assert!(diags.is_empty());
        match expr.expect("expr").kind {
            ExprKind::Str(s) => assert_eq!(s, "abcd"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn escape_sequences_decode() {
        let (expr, diags) = parse_one_expr(r#""a\tb\nc\\d\"e""#);
        assert!(diags.is_empty());
        match expr.expect("expr").kind {
            ExprKind::Str(s) => assert_eq!(s, "a\tb\nc\\d\"e"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn unknown_escape_warns_and_keeps_char() {
        let (expr, diags) = parse_one_expr(r#""a\xb""#);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::UnknownEscape);
        assert_eq!(diags[0].message, "unknown escape sequence '\\x'");
        match expr.expect("expr").kind {
            ExprKind::Str(s) => assert_eq!(s, "axb"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn huge_constant_is_rejected() {
        let huge = "9".repeat(400);
        let (expr, diags) = parse_one_expr(&huge);
        assert!(expr.is_none());
        assert_eq!(diags[0].kind, DiagKind::ConstantTooLarge);
    }

    // -- spans --

    #[test]
    fn spans_nest_within_parents() {
        let (expr, _) = parse_one_expr("1 + f(2, 3)");
        let expr = expr.expect("expr");
        fn check(e: &Expr) {
            match &e.kind {
                ExprKind::Binary { lhs, rhs, .. } => {
                    for child in [lhs.as_ref(), rhs.as_ref()] {
                        assert!(child.span.start >= e.span.start);
                        assert!(child.span.end <= e.span.end);
                        check(child);
                    }
                }
                ExprKind::Call { args, .. } => {
                    for arg in args {
                        assert!(arg.span.start >= e.span.start);
                        assert!(arg.span.end <= e.span.end);
                        check(arg);
                    }
                }
                _ => {}
            }
            assert!(e.span.start <= e.span.end);
        }
        check(&expr);
    }

    // -- statements --

    #[test]
    fn statement_kinds() {
        let (stmts, diags) = parse("; a is 1; draw(1, 2); for t to 3 step 1 { ; }");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0], Stmt::Empty { .. }));
        assert!(matches!(stmts[1], Stmt::Assign { .. }));
        assert!(matches!(stmts[2], Stmt::Expr { .. }));
        assert!(matches!(stmts[3], Stmt::For { .. }));
    }

    #[test]
    fn for_clauses_are_recorded() {
        let (stmts, diags) = parse("for t from 1 to 3 step 2 ;");
        assert!(diags.is_empty());
        match &stmts[0] {
            Stmt::For {
                from, step, body, ..
            } => {
                assert!(from.is_some());
                assert!(step.is_some());
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn for_without_optional_clauses() {
        let (stmts, diags) = parse("for t to 3;");
        assert!(diags.is_empty());
        match &stmts[0] {
            Stmt::For { from, step, .. } => {
                assert!(from.is_none());
                assert!(step.is_none());
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn for_over_non_variable_is_rejected() {
        let (stmts, diags) = parse("for 1 to 3;");
        assert!(stmts.is_empty());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::ExpectVariable));
    }

    // -- typo correction --

    #[test]
    fn keyword_typo_gets_fixit_and_parse_continues() {
        let (stmts, diags) = parse("abc it 123;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::Expect);
        assert_eq!(diags[0].message, "expected 'is'");
        let fix = diags[0].fix.as_ref().expect("fix-it");
        assert_eq!(fix.replace_range, (4, 6));
        assert_eq!(fix.text, "is");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Assign { .. }));
    }

    #[test]
    fn colon_for_semicolon_is_corrected() {
        // ':' is not a token of the language, so the lexer reports it as an
        // unknown character; the parser then recognises it as a typo of ';'.
        let (stmts, diags) = parse("a is 1:");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].kind, DiagKind::UnknownChar);
        assert_eq!(diags[1].kind, DiagKind::Expect);
        assert!(diags[1].fix.is_some());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn missing_semicolon_gets_insertion_fixit() {
        let (stmts, diags) = parse("a is 1\nb is 2;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::ExpectSemiAfter);
        let fix = diags[0].fix.as_ref().expect("fix-it");
        assert_eq!(fix.text, ";");
        // inserted right after `1` on the first line
        assert_eq!(fix.replace_range, (6, 7));
        assert_eq!(stmts.len(), 2);
    }

    // -- error recovery --

    #[test]
    fn unclosed_paren_reports_match_note() {
        let (_, diags) = parse("(2 + 3");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].kind, DiagKind::Expect);
        assert_eq!(diags[0].message, "expected ')'");
        assert_eq!(diags[1].kind, DiagKind::MatchLParen);
        assert_eq!(diags[1].col_range.0, 0);
    }

    #[test]
    fn statement_error_does_not_poison_followers() {
        let (stmts, diags) = parse("1 + ; a is 2;");
        assert!(!diags.is_empty());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Assign { .. }));
    }

    #[test]
    fn cannot_be_unary_reports_and_continues() {
        let (_, diags) = parse("2 + * 3;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagKind::CannotBeUnary);
        assert_eq!(diags[0].message, "'*' cannot be used as a unary operator");
    }

    #[test]
    fn stray_close_brace_is_skipped() {
        let (stmts, diags) = parse("} a is 1;");
        assert_eq!(stmts.len(), 1);
        assert!(!diags.is_empty());
    }

    #[test]
    fn error_inside_call_resynchronises() {
        let (stmts, diags) = parse("f(1, +); b is 2;");
        assert!(!diags.is_empty());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Assign { .. }));
    }
}

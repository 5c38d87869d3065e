//! Frontend and evaluator for the `sketch` drawing language.
//!
//! A program is a sequence of assignment, loop, and draw statements over a
//! fixed set of built-in variables (`origin`, `rot`, `scale`, line and
//! background settings) and built-in functions (trigonometry, `rand_int`,
//! `print`, `draw`, `save`). User variables appear implicitly on first
//! assignment.
//!
//! The pipeline is the usual one: bytes → tokens → AST → bound and typed
//! AST → execution side effects. Every stage recovers locally and keeps
//! going; diagnostics accumulate in a pluggable consumer rather than
//! aborting the run.
//!
//! ```no_run
//! use sketch_core::builtins::Builtins;
//! use sketch_core::diag::{DiagEngine, StderrConsumer};
//! use sketch_core::interpreter::Interpreter;
//! use sketch_core::lexer::Lexer;
//! use sketch_core::parser::Parser;
//! use sketch_core::render::NullBackend;
//! use sketch_core::sema::Sema;
//! use sketch_core::source::SourceBuffer;
//! use sketch_core::symbols::SymbolTable;
//!
//! let source = SourceBuffer::from_str("demo.sk", "a is 1; print(a);");
//! let consumer = StderrConsumer;
//! let engine = DiagEngine::new(Some(&source), &consumer);
//! let mut table = SymbolTable::new();
//! let builtins = Builtins::install(&mut table, Box::new(NullBackend::default()));
//! let sema = Sema::new(&engine, table, builtins);
//! let mut parser = Parser::new(Lexer::new(source.bytes(), &engine));
//! let program = parser.parse_program();
//! Interpreter::new(sema).run(&program);
//! ```

pub mod ast;
pub mod builtins;
pub mod diag;
pub mod edit;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod sema;
pub mod source;
pub mod symbols;
pub mod token;
pub mod types;

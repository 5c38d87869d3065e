//! `sketch` CLI — run drawing-language programs.
//!
//! Usage: `sketch <source-file>`. Diagnostics go to standard error in
//! Clang style; the process always exits 0, even when the program had
//! errors (the image may then be partial or absent).

use std::env;
use std::path::Path;

use sketch_core::builtins::Builtins;
use sketch_core::diag::{DiagEngine, DiagKind, StderrConsumer};
use sketch_core::interpreter::Interpreter;
use sketch_core::lexer::Lexer;
use sketch_core::parser::Parser;
use sketch_core::sema::Sema;
use sketch_core::source::SourceBuffer;
use sketch_core::symbols::SymbolTable;
use sketch_raster::Canvas;

fn main() {
    let args: Vec<String> = env::args().collect();
    let consumer = StderrConsumer;

    if args.len() < 2 {
        DiagEngine::new(None, &consumer)
            .create(DiagKind::NoInputFile)
            .finish();
        return;
    }

    let source = match SourceBuffer::from_file(Path::new(&args[1])) {
        Ok(source) => source,
        Err(_) => {
            DiagEngine::new(None, &consumer)
                .create(DiagKind::OpenFile)
                .arg_str(args[1].clone())
                .finish();
            return;
        }
    };

    let engine = DiagEngine::new(Some(&source), &consumer);
    let mut table = SymbolTable::new();
    let builtins = Builtins::install(&mut table, Box::new(Canvas::new()));
    let sema = Sema::new(&engine, table, builtins);

    let mut parser = Parser::new(Lexer::new(source.bytes(), &engine));
    let program = parser.parse_program();

    Interpreter::new(sema).run(&program);
}

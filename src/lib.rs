// Lento Language Interpreter Library
//
// Core library for the Lento interpreter: a small dynamically typed scripting
// language with closures, arrays and objects, parsed by a Pratt parser and
// evaluated by a tree walker.

// Public modules
pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod logging;
pub mod natives;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, Stmt};
pub use environment::{EnvRef, Environment};
pub use error::{ErrorCode, ErrorKind, ErrorSink, LentoError, Span};
pub use evaluator::{evaluate, Evaluator};
pub use lexer::{tokenize, Lexer, Token, TokenType};
pub use parser::{produce_ast, Parser};
pub use value::Value;

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::{interpret, run, RunOptions, Session};

use crate::environment::{EnvRef, Environment};
use crate::error::{ErrorSink, LentoError};
use crate::evaluator::evaluate;
use crate::lexer::tokenize;
use crate::parser::produce_ast;
use crate::value::Value;

/// Debug output switches for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

/// Runs a whole program in a fresh global environment and returns the value of
/// its last top-level statement, or the first error of the run.
pub fn run(source: &str, filename: Option<&str>, options: RunOptions) -> Result<Value, LentoError> {
    tracing::debug!(file = filename.unwrap_or("<input>"), "running program");
    let environment = Environment::global();
    let mut sink = ErrorSink::new();
    execute(source, &environment, &mut sink, options)
}

/// `run` with no file name and no dumps.
pub fn interpret(source: &str) -> Result<Value, LentoError> {
    run(source, None, RunOptions::default())
}

fn execute(
    source: &str,
    environment: &EnvRef,
    sink: &mut ErrorSink,
    options: RunOptions,
) -> Result<Value, LentoError> {
    // Lexical analysis
    let tokens = tokenize(source, sink);
    if options.dump_tokens {
        for token in &tokens {
            eprintln!("{:?}", token);
        }
    }
    if let Some(error) = sink.take() {
        return Err(error);
    }

    // Parsing
    let program = produce_ast(tokens, sink);
    if options.dump_ast {
        eprintln!("{:#?}", program);
    }
    if let Some(error) = sink.take() {
        return Err(error);
    }

    // Evaluation
    let value = evaluate(&program, environment, sink);
    match sink.take() {
        Some(error) => Err(error),
        None => Ok(value),
    }
}

/// Interactive state: one global environment and one error sink for the whole
/// session, so declarations survive from line to line.
pub struct Session {
    environment: EnvRef,
    sink: ErrorSink,
    options: RunOptions,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_options(RunOptions::default())
    }

    pub fn with_options(options: RunOptions) -> Self {
        Self {
            environment: Environment::global(),
            sink: ErrorSink::new(),
            options,
        }
    }

    pub fn environment(&self) -> &EnvRef {
        &self.environment
    }

    /// Evaluates one input. The sink is cleared first so an earlier failure
    /// does not block this line.
    pub fn eval(&mut self, line: &str) -> Result<Value, LentoError> {
        self.sink.clear();
        execute(line, &self.environment, &mut self.sink, self.options)
    }
}

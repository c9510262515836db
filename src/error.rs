use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Character offsets into the source plus the line the construct starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize) -> Self {
        Self { start, end, line }
    }

    pub fn single(pos: usize, line: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
            line,
        }
    }

    /// Span covering `self` through `other`, keeping the first line.
    pub fn to(&self, other: &Span) -> Span {
        Span::new(self.start, other.end.max(self.end), self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Runtime,
}

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Lexical | ErrorKind::Syntax => 65,
            ErrorKind::Runtime => 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnterminatedString,
    UnknownToken,
    MalformedNumber,
    UnexpectedToken,
    InvalidAssignmentTarget,
    UndefinedVariable,
    Redeclaration,
    ConstantReassignment,
    NativeReassignment,
    TypeMismatch,
    DivisionByZero,
    ArgumentCount,
    NotCallable,
    ArrayIndex,
    ObjectKey,
    IllegalStatement,
    NativeFunction,
    StackOverflow,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnterminatedString => "UNTERMINATED_ERR",
            ErrorCode::UnknownToken => "UNKNOWN_TOKEN_ERR",
            ErrorCode::MalformedNumber => "MALFORMED_NUMBER_ERR",
            ErrorCode::UnexpectedToken => "UNEXPECTED_TOKEN_ERR",
            ErrorCode::InvalidAssignmentTarget => "INVALID_ASSIGNMENT_ERR",
            ErrorCode::UndefinedVariable => "UNDEFINED_VARIABLE_ERR",
            ErrorCode::Redeclaration => "VARIABLE_DECL_ERR",
            ErrorCode::ConstantReassignment => "CONSTANT_REASSIGN_ERR",
            ErrorCode::NativeReassignment => "NATIVE_REASSIGN_ERR",
            ErrorCode::TypeMismatch => "EXPECTED_TYPE_ERR",
            ErrorCode::DivisionByZero => "DIVISION_BY_ZERO_ERR",
            ErrorCode::ArgumentCount => "LENGTH_ARGS_ERR",
            ErrorCode::NotCallable => "NON_FUNCTION_EXPR_ERR",
            ErrorCode::ArrayIndex => "ARRAY_INDEXING_ERR",
            ErrorCode::ObjectKey => "OBJECT_KEY_ERR",
            ErrorCode::IllegalStatement => "ILLEGAL_STATEMENT_ERR",
            ErrorCode::NativeFunction => "NATIVE_FUNCTION_ERR",
            ErrorCode::StackOverflow => "STACK_OVERFLOW_ERR",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LentoError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl LentoError {
    pub fn new(kind: ErrorKind, code: ErrorCode, span: Span, message: String) -> Self {
        Self {
            kind,
            code,
            span,
            message,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn lex_error(code: ErrorCode, span: Span, message: String) -> Self {
        Self::new(ErrorKind::Lexical, code, span, message)
    }

    pub fn parse_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::Syntax, ErrorCode::UnexpectedToken, span, message)
    }

    pub fn parse_error_with_help(span: Span, message: String, help: String) -> Self {
        Self::parse_error(span, message).with_help(help)
    }

    pub fn runtime_error(code: ErrorCode, span: Span, message: String) -> Self {
        Self::new(ErrorKind::Runtime, code, span, message)
    }

    pub fn runtime_error_with_help(
        code: ErrorCode,
        span: Span,
        message: String,
        help: String,
    ) -> Self {
        Self::runtime_error(code, span, message).with_help(help)
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn report(&self, source: &str, filename: Option<&str>) -> std::io::Result<()> {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.kind {
            ErrorKind::Lexical => Color::Red,
            ErrorKind::Syntax => Color::Yellow,
            ErrorKind::Runtime => Color::Magenta,
        };

        let kind_str = match self.kind {
            ErrorKind::Lexical => "Lexical Error",
            ErrorKind::Syntax => "Parse Error",
            ErrorKind::Runtime => "Runtime Error",
        };

        // Clamp the label so an end-of-input span still points inside the source.
        let len = source.chars().count();
        let start = self.span.start.min(len);
        let end = self.span.end.clamp(start, len.max(start));

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_code(self.code.as_str())
            .with_message(format!(
                "{} on line {}: {}",
                kind_str.fg(color),
                self.span.line,
                self.message
            ))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .eprint((filename, Source::from(source)))
    }
}

/// First-error-wins latch shared by the lexer, parser and evaluator of one run.
///
/// Once an error is recorded every later report is dropped (and counted), so a
/// failing input yields exactly one diagnostic. A REPL clears the sink between
/// lines.
#[derive(Debug, Default)]
pub struct ErrorSink {
    first: Option<LentoError>,
    suppressed: usize,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: LentoError) {
        if self.first.is_some() {
            self.suppressed += 1;
            tracing::debug!(
                line = error.span.line,
                code = error.code.as_str(),
                "suppressed follow-up error: {}",
                error.message
            );
            return;
        }
        tracing::debug!(
            line = error.span.line,
            code = error.code.as_str(),
            "error recorded: {}",
            error.message
        );
        self.first = Some(error);
    }

    /// Plain runtime report carrying only a line number.
    pub fn report_line(&mut self, line: usize, message: impl Into<String>) {
        self.report(LentoError::runtime_error(
            ErrorCode::NativeFunction,
            Span::new(0, 0, line),
            message.into(),
        ));
    }

    pub fn had_error(&self) -> bool {
        self.first.is_some()
    }

    pub fn error(&self) -> Option<&LentoError> {
        self.first.as_ref()
    }

    pub fn take(&mut self) -> Option<LentoError> {
        self.suppressed = 0;
        self.first.take()
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn clear(&mut self) {
        self.first = None;
        self.suppressed = 0;
    }

    /// Process exit status for the recorded error, 0 when the run was clean.
    pub fn exit_code(&self) -> i32 {
        self.first.as_ref().map_or(0, LentoError::exit_code)
    }
}

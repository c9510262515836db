use crate::error::{ErrorCode, ErrorSink, LentoError, Span};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Dot,
    Semicolon,

    // One or two character tokens
    Minus,
    MinusEqual,
    MinusMinus,
    Plus,
    PlusEqual,
    PlusPlus,
    Slash,
    SlashEqual,
    Star,
    StarEqual,
    Percent,
    PercentEqual,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier,
    String,
    Number,

    // Keywords
    And,
    Break,
    Const,
    Continue,
    Else,
    False,
    Fn,
    For,
    If,
    Nil,
    Not,
    Or,
    Return,
    True,
    Var,
    While,

    // Special
    Eof,
}

impl TokenType {
    /// Reserved-word table.
    pub fn keyword(text: &str) -> Option<TokenType> {
        let token_type = match text {
            "and" => TokenType::And,
            "break" => TokenType::Break,
            "const" => TokenType::Const,
            "continue" => TokenType::Continue,
            "else" => TokenType::Else,
            "false" => TokenType::False,
            "fn" => TokenType::Fn,
            "for" => TokenType::For,
            "if" => TokenType::If,
            "nil" => TokenType::Nil,
            "not" => TokenType::Not,
            "or" => TokenType::Or,
            "return" => TokenType::Return,
            "true" => TokenType::True,
            "var" => TokenType::Var,
            "while" => TokenType::While,
            _ => return None,
        };
        Some(token_type)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            TokenType::LeftParen => "'('",
            TokenType::RightParen => "')'",
            TokenType::LeftBrace => "'{'",
            TokenType::RightBrace => "'}'",
            TokenType::LeftBracket => "'['",
            TokenType::RightBracket => "']'",
            TokenType::Comma => "','",
            TokenType::Colon => "':'",
            TokenType::Dot => "'.'",
            TokenType::Semicolon => "';'",
            TokenType::Minus => "'-'",
            TokenType::MinusEqual => "'-='",
            TokenType::MinusMinus => "'--'",
            TokenType::Plus => "'+'",
            TokenType::PlusEqual => "'+='",
            TokenType::PlusPlus => "'++'",
            TokenType::Slash => "'/'",
            TokenType::SlashEqual => "'/='",
            TokenType::Star => "'*'",
            TokenType::StarEqual => "'*='",
            TokenType::Percent => "'%'",
            TokenType::PercentEqual => "'%='",
            TokenType::Bang => "'!'",
            TokenType::BangEqual => "'!='",
            TokenType::Equal => "'='",
            TokenType::EqualEqual => "'=='",
            TokenType::Greater => "'>'",
            TokenType::GreaterEqual => "'>='",
            TokenType::Less => "'<'",
            TokenType::LessEqual => "'<='",
            TokenType::Identifier => "identifier",
            TokenType::String => "string",
            TokenType::Number => "number",
            TokenType::And => "'and'",
            TokenType::Break => "'break'",
            TokenType::Const => "'const'",
            TokenType::Continue => "'continue'",
            TokenType::Else => "'else'",
            TokenType::False => "'false'",
            TokenType::Fn => "'fn'",
            TokenType::For => "'for'",
            TokenType::If => "'if'",
            TokenType::Nil => "'nil'",
            TokenType::Not => "'not'",
            TokenType::Or => "'or'",
            TokenType::Return => "'return'",
            TokenType::True => "'true'",
            TokenType::Var => "'var'",
            TokenType::While => "'while'",
            TokenType::Eof => "end of file",
        };
        write!(f, "{}", text)
    }
}

/// Typed literal payload carried by number, string and identifier tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, literal: Option<Literal>, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            literal,
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}

/// Tokenizes `source`, reporting lexical errors into `sink`. The result always
/// ends with an `Eof` token.
pub fn tokenize(source: &str, sink: &mut ErrorSink) -> Vec<Token> {
    Lexer::new(source, sink).scan_tokens()
}

pub struct Lexer<'s> {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    start_line: usize,
    sink: &'s mut ErrorSink,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &str, sink: &'s mut ErrorSink) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            start_line: 1,
            sink,
        }
    }

    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            None,
            Span::new(self.current, self.current, self.line),
        ));

        tracing::debug!(tokens = self.tokens.len(), lines = self.line, "tokenized source");
        self.tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            ':' => self.add_token(TokenType::Colon),
            '.' => self.add_token(TokenType::Dot),
            ';' => self.add_token(TokenType::Semicolon),
            '-' => {
                let token_type = if self.match_char('-') {
                    TokenType::MinusMinus
                } else {
                    self.compound(TokenType::Minus, TokenType::MinusEqual)
                };
                self.add_token(token_type);
            }
            '+' => {
                let token_type = if self.match_char('+') {
                    TokenType::PlusPlus
                } else {
                    self.compound(TokenType::Plus, TokenType::PlusEqual)
                };
                self.add_token(token_type);
            }
            '*' => {
                let token_type = self.compound(TokenType::Star, TokenType::StarEqual);
                self.add_token(token_type);
            }
            '%' => {
                let token_type = self.compound(TokenType::Percent, TokenType::PercentEqual);
                self.add_token(token_type);
            }
            '!' => {
                let token_type = self.compound(TokenType::Bang, TokenType::BangEqual);
                self.add_token(token_type);
            }
            '=' => {
                let token_type = self.compound(TokenType::Equal, TokenType::EqualEqual);
                self.add_token(token_type);
            }
            '<' => {
                let token_type = self.compound(TokenType::Less, TokenType::LessEqual);
                self.add_token(token_type);
            }
            '>' => {
                let token_type = self.compound(TokenType::Greater, TokenType::GreaterEqual);
                self.add_token(token_type);
            }
            '/' => {
                if self.match_char('/') {
                    // Comment goes until end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('*') {
                    self.block_comment();
                } else {
                    let token_type = self.compound(TokenType::Slash, TokenType::SlashEqual);
                    self.add_token(token_type);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' | '\'' => self.string(c),
            '`' => self.multiline_string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => {
                self.sink.report(LentoError::lex_error(
                    ErrorCode::UnknownToken,
                    Span::single(self.start, self.line),
                    format!("Unrecognized token found '{}'", c),
                ));
            }
        }
    }

    fn compound(&mut self, single: TokenType, with_equal: TokenType) -> TokenType {
        if self.match_char('=') {
            with_equal
        } else {
            single
        }
    }

    fn advance(&mut self) -> char {
        match self.source.get(self.current) {
            Some(&c) => {
                self.current += 1;
                c
            }
            None => '\0',
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.current += 1;
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn text(&self, from: usize, to: usize) -> String {
        self.source[from..to].iter().collect()
    }

    // An unterminated block comment runs to end of input silently.
    fn block_comment(&mut self) {
        while !self.is_at_end() && !(self.peek() == '*' && self.peek_next() == '/') {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }
        self.match_char('*');
        self.match_char('/');
    }

    fn string(&mut self, quote: char) {
        while self.peek() != quote && self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }

        if self.is_at_end() || self.peek() == '\n' {
            self.sink.report(
                LentoError::lex_error(
                    ErrorCode::UnterminatedString,
                    Span::new(self.start, self.current, self.line),
                    "Unterminated string".to_string(),
                )
                .with_help(format!(
                    "Strings quoted with {} must close on the same line; use backticks for multi-line strings.",
                    quote
                )),
            );
            let content = self.text(self.start + 1, self.current);
            self.add_token_with_literal(TokenType::String, Literal::String(content));
            return;
        }

        // Consume the closing quote
        self.advance();
        let content = self.text(self.start + 1, self.current - 1);
        self.add_token_with_literal(TokenType::String, Literal::String(content));
    }

    fn multiline_string(&mut self) {
        while self.peek() != '`' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.sink.report(LentoError::lex_error(
                ErrorCode::UnterminatedString,
                Span::new(self.start, self.current, self.start_line),
                "Unterminated multiline string".to_string(),
            ));
            let content = self.text(self.start + 1, self.current);
            self.add_token_with_literal(TokenType::String, Literal::String(content));
            return;
        }

        self.advance();
        let content = self.text(self.start + 1, self.current - 1);
        self.add_token_with_literal(TokenType::String, Literal::String(content));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' {
            if !self.peek_next().is_ascii_digit() {
                self.sink.report(
                    LentoError::lex_error(
                        ErrorCode::MalformedNumber,
                        Span::new(self.start, self.current + 1, self.line),
                        "Expected digit after '.' in number literal".to_string(),
                    )
                    .with_help("Write fractional numbers with digits on both sides: 42.0"),
                );
                // Swallow the dot so scanning keeps moving forward.
                self.advance();
                let digits = self.text(self.start, self.current - 1);
                let value = digits.parse::<f64>().unwrap_or(0.0);
                self.add_token_with_literal(TokenType::Number, Literal::Number(value));
                return;
            }

            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let number_text = self.text(self.start, self.current);
        match number_text.parse::<f64>() {
            Ok(value) => self.add_token_with_literal(TokenType::Number, Literal::Number(value)),
            Err(_) => self.sink.report(LentoError::lex_error(
                ErrorCode::MalformedNumber,
                Span::new(self.start, self.current, self.line),
                format!("Invalid number: {}", number_text),
            )),
        }
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.text(self.start, self.current);
        match TokenType::keyword(&text) {
            Some(token_type) => self.add_token(token_type),
            None => self.add_token_with_literal(TokenType::Identifier, Literal::Identifier(text)),
        }
    }

    fn add_token(&mut self, token_type: TokenType) {
        let lexeme = self.text(self.start, self.current);
        self.push(token_type, lexeme, None);
    }

    fn add_token_with_literal(&mut self, token_type: TokenType, literal: Literal) {
        let lexeme = self.text(self.start, self.current);
        self.push(token_type, lexeme, Some(literal));
    }

    fn push(&mut self, token_type: TokenType, lexeme: String, literal: Option<Literal>) {
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            literal,
            Span::new(self.start, self.current, self.start_line),
        ));
    }
}

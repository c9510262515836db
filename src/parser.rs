use crate::ast::{BinaryOp, Expr, PostfixOp, Stmt, UnaryOp};
use crate::error::{ErrorCode, ErrorKind, ErrorSink, LentoError, Span};
use crate::lexer::{Literal, Token, TokenType};
use std::rc::Rc;

pub type ParseResult<T> = Result<T, LentoError>;

/// Precedence levels, lowest first. An infix handler only runs while its token
/// binds tighter than the level the caller is parsing at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BindingPower {
    Default,
    Comma,
    Assignment,
    Logical,
    Relational,
    Additive,
    Multiplicative,
    Unary,
    Postfix,
    Call,
    Member,
    Primary,
}

impl BindingPower {
    /// One level looser; right-associative operators parse their right side here.
    pub fn below(self) -> BindingPower {
        match self {
            BindingPower::Default | BindingPower::Comma => BindingPower::Default,
            BindingPower::Assignment => BindingPower::Comma,
            BindingPower::Logical => BindingPower::Assignment,
            BindingPower::Relational => BindingPower::Logical,
            BindingPower::Additive => BindingPower::Relational,
            BindingPower::Multiplicative => BindingPower::Additive,
            BindingPower::Unary => BindingPower::Multiplicative,
            BindingPower::Postfix => BindingPower::Unary,
            BindingPower::Call => BindingPower::Postfix,
            BindingPower::Member => BindingPower::Call,
            BindingPower::Primary => BindingPower::Member,
        }
    }
}

type NudHandler = fn(&mut Parser) -> ParseResult<Expr>;
type LedHandler = fn(&mut Parser, Expr, BindingPower) -> ParseResult<Expr>;
type StatementHandler = fn(&mut Parser) -> ParseResult<Stmt>;

/// Prefix table: handlers for tokens that can start an expression.
fn nud_lookup(token_type: TokenType) -> Option<NudHandler> {
    let handler: NudHandler = match token_type {
        TokenType::Number
        | TokenType::String
        | TokenType::Identifier
        | TokenType::True
        | TokenType::False
        | TokenType::Nil => Parser::primary_expression,
        TokenType::LeftParen => Parser::grouping_expression,
        TokenType::LeftBracket => Parser::array_expression,
        TokenType::LeftBrace => Parser::object_expression,
        TokenType::Minus | TokenType::Plus | TokenType::Not | TokenType::Bang => {
            Parser::unary_expression
        }
        _ => return None,
    };
    Some(handler)
}

/// Infix table: binding power and handler for tokens that continue an expression.
fn led_lookup(token_type: TokenType) -> Option<(BindingPower, LedHandler)> {
    let entry: (BindingPower, LedHandler) = match token_type {
        TokenType::Equal
        | TokenType::PlusEqual
        | TokenType::MinusEqual
        | TokenType::StarEqual
        | TokenType::SlashEqual
        | TokenType::PercentEqual => (BindingPower::Assignment, Parser::assignment_expression),
        TokenType::And | TokenType::Or => (BindingPower::Logical, Parser::binary_expression),
        TokenType::Less
        | TokenType::LessEqual
        | TokenType::Greater
        | TokenType::GreaterEqual
        | TokenType::EqualEqual
        | TokenType::BangEqual => (BindingPower::Relational, Parser::binary_expression),
        TokenType::Plus | TokenType::Minus => (BindingPower::Additive, Parser::binary_expression),
        TokenType::Star | TokenType::Slash | TokenType::Percent => {
            (BindingPower::Multiplicative, Parser::binary_expression)
        }
        TokenType::PlusPlus | TokenType::MinusMinus => {
            (BindingPower::Postfix, Parser::postfix_expression)
        }
        TokenType::LeftParen => (BindingPower::Call, Parser::call_expression),
        TokenType::LeftBracket => (BindingPower::Call, Parser::index_expression),
        TokenType::Dot => (BindingPower::Member, Parser::member_expression),
        _ => return None,
    };
    Some(entry)
}

/// Statement table keyed by the leading token.
fn statement_lookup(token_type: TokenType) -> Option<StatementHandler> {
    let handler: StatementHandler = match token_type {
        TokenType::Var | TokenType::Const => Parser::var_declaration,
        TokenType::If => Parser::if_statement,
        TokenType::Fn => Parser::function_declaration,
        TokenType::While => Parser::while_statement,
        TokenType::For => Parser::for_statement,
        TokenType::Return => Parser::return_statement,
        TokenType::Break => Parser::break_statement,
        TokenType::Continue => Parser::continue_statement,
        TokenType::LeftBrace => Parser::block_statement,
        _ => return None,
    };
    Some(handler)
}

fn binary_operator(token_type: TokenType) -> Option<BinaryOp> {
    let operator = match token_type {
        TokenType::Plus | TokenType::PlusEqual => BinaryOp::Add,
        TokenType::Minus | TokenType::MinusEqual => BinaryOp::Subtract,
        TokenType::Star | TokenType::StarEqual => BinaryOp::Multiply,
        TokenType::Slash | TokenType::SlashEqual => BinaryOp::Divide,
        TokenType::Percent | TokenType::PercentEqual => BinaryOp::Modulo,
        TokenType::EqualEqual => BinaryOp::Equal,
        TokenType::BangEqual => BinaryOp::NotEqual,
        TokenType::Less => BinaryOp::Less,
        TokenType::LessEqual => BinaryOp::LessEqual,
        TokenType::Greater => BinaryOp::Greater,
        TokenType::GreaterEqual => BinaryOp::GreaterEqual,
        TokenType::And => BinaryOp::And,
        TokenType::Or => BinaryOp::Or,
        _ => return None,
    };
    Some(operator)
}

/// Parses a token stream into the top-level block, reporting syntax errors
/// into `sink`.
pub fn produce_ast(tokens: Vec<Token>, sink: &mut ErrorSink) -> Stmt {
    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    for error in parser.take_errors() {
        sink.report(error);
    }
    program
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    line: usize,
    errors: Vec<LentoError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.token_type) != Some(TokenType::Eof) {
            let end = tokens.last().map_or(Span::default(), |t| t.span);
            tokens.push(Token::new(
                TokenType::Eof,
                String::new(),
                None,
                Span::new(end.end, end.end, end.line.max(1)),
            ));
        }
        Self {
            tokens,
            current: 0,
            line: 1,
            errors: Vec::new(),
        }
    }

    /// Parses every top-level statement. A malformed statement is recorded and
    /// skipped up to the next `;` so later statements still get parsed.
    pub fn parse(&mut self) -> Stmt {
        let start = self.peek().span;
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }

        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );

        Stmt::Block {
            statements,
            span: start.to(&self.peek().span),
        }
    }

    pub fn errors(&self) -> &[LentoError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LentoError> {
        std::mem::take(&mut self.errors)
    }

    fn synchronize(&mut self) {
        let skipped_from = self.line;
        while !self.is_at_end() {
            if self.advance().token_type == TokenType::Semicolon {
                break;
            }
        }
        tracing::debug!(from_line = skipped_from, to_line = self.line, "parser resynchronized");
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn parse_statement(&mut self) -> ParseResult<Stmt> {
        if let Some(handler) = statement_lookup(self.peek().token_type) {
            return handler(self);
        }
        self.expression_statement()
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.peek().span;
        let expr = self.parse_expression(BindingPower::Default)?;
        self.consume_with_help(
            TokenType::Semicolon,
            "Expected ';' after expression",
            "Every expression statement ends with a semicolon: x = 1;".to_string(),
        )?;

        Ok(Stmt::Expression {
            expr,
            span: start.to(&self.previous().span),
        })
    }

    fn block_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.consume_with_help(
            TokenType::RightBrace,
            "Expected '}' after block",
            "Block statements must be closed with '}' after the opening '{'.".to_string(),
        )?;

        Ok(Stmt::Block {
            statements,
            span: start.to(&self.previous().span),
        })
    }

    /// A brace-delimited block or a single statement.
    fn body(&mut self) -> ParseResult<Stmt> {
        if self.check(TokenType::LeftBrace) {
            self.block_statement()
        } else {
            self.parse_statement()
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let is_constant = keyword.token_type == TokenType::Const;
        let name = self.identifier("Expected variable name after declaration keyword")?;

        let initializer = if self.match_type(TokenType::Equal) {
            Some(self.parse_expression(BindingPower::Default)?)
        } else if is_constant {
            return Err(LentoError::parse_error_with_help(
                self.peek().span,
                format!("Constant '{}' must be initialized", name),
                "Give constants a value where they are declared: const x = 1;".to_string(),
            ));
        } else {
            None
        };

        self.consume_with_help(
            TokenType::Semicolon,
            "Expected ';' after variable declaration",
            "Declarations end with a semicolon: var x = 1;".to_string(),
        )?;

        Ok(Stmt::VarDeclaration {
            name,
            is_constant,
            initializer,
            span: keyword.span.to(&self.previous().span),
        })
    }

    // A condition that opens with '(' ends at the matching ')'.
    fn condition(&mut self, keyword: &str) -> ParseResult<Expr> {
        if self.match_type(TokenType::LeftParen) {
            let condition = self.parse_expression(BindingPower::Default)?;
            self.consume_with_help(
                TokenType::RightParen,
                &format!("Expected ')' after {} condition", keyword),
                format!(
                    "Conditions opened with '(' must be closed: {} (condition) {{ ... }}",
                    keyword
                ),
            )?;
            Ok(condition)
        } else {
            self.parse_expression(BindingPower::Default)
        }
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let condition = self.condition("if")?;
        let then_branch = Box::new(self.body()?);

        let else_branch = if self.match_type(TokenType::Else) {
            Some(Box::new(self.body()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: start.to(&self.previous().span),
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let condition = self.condition("while")?;
        let body = Box::new(self.body()?);

        Ok(Stmt::While {
            condition,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.consume_with_help(
            TokenType::LeftParen,
            "Expected '(' after 'for'",
            "For loops use three clauses: for (var i = 0; i < 10; i++) { ... }".to_string(),
        )?;

        let initializer = match self.peek().token_type {
            TokenType::Var => self.var_declaration()?,
            TokenType::Const => {
                return Err(LentoError::parse_error_with_help(
                    self.peek().span,
                    "For-loop initializer cannot be a constant".to_string(),
                    "The loop variable changes every iteration; declare it with 'var'.".to_string(),
                ))
            }
            _ => {
                return Err(LentoError::parse_error_with_help(
                    self.peek().span,
                    format!(
                        "Expected variable declaration in for-loop initializer, found '{}'",
                        self.peek().lexeme
                    ),
                    "For loops use three clauses: for (var i = 0; i < 10; i++) { ... }".to_string(),
                ))
            }
        };

        let condition = self.parse_expression(BindingPower::Default)?;
        self.consume(TokenType::Semicolon, "Expected ';' after loop condition")?;
        let increment = self.parse_expression(BindingPower::Default)?;
        self.consume(TokenType::RightParen, "Expected ')' after for clauses")?;

        let body = Box::new(self.body()?);

        Ok(Stmt::For {
            initializer: Box::new(initializer),
            condition,
            increment,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let name = self.identifier("Expected function name after 'fn'")?;

        self.consume_with_help(
            TokenType::LeftParen,
            "Expected '(' after function name",
            "Functions declare their parameters in parentheses: fn add(a, b) { ... }".to_string(),
        )?;

        let mut parameters = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                let parameter = self.identifier("Expected parameter name")?;
                parameters.push(parameter);
                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightParen,
            "Expected ')' after parameters",
            "Parameters are identifiers separated by commas: fn add(a, b) { ... }".to_string(),
        )?;

        let body = Rc::new(self.body()?);

        Ok(Stmt::FunctionDeclaration {
            name,
            parameters,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression(BindingPower::Default)?)
        };
        self.consume(TokenType::Semicolon, "Expected ';' after return value")?;

        Ok(Stmt::Return {
            value,
            span: start.to(&self.previous().span),
        })
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.consume(TokenType::Semicolon, "Expected ';' after 'break'")?;
        Ok(Stmt::Break {
            span: start.to(&self.previous().span),
        })
    }

    fn continue_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.consume(TokenType::Semicolon, "Expected ';' after 'continue'")?;
        Ok(Stmt::Continue {
            span: start.to(&self.previous().span),
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self, binding_power: BindingPower) -> ParseResult<Expr> {
        let token = self.peek().clone();

        if self.is_at_end() {
            return Err(LentoError::parse_error_with_help(
                self.end_of_input_span(),
                "Unexpected end of input".to_string(),
                "Expected an expression here. Check for unmatched parentheses, brackets, or incomplete statements.".to_string(),
            ));
        }

        let nud = nud_lookup(token.token_type).ok_or_else(|| {
            let help_msg = match token.token_type {
                TokenType::RightParen => "Found ')' without matching '('. Check for unbalanced parentheses.",
                TokenType::RightBrace => "Found '}' without matching '{'. Check for unbalanced braces.",
                TokenType::RightBracket => "Found ']' without matching '['. Check for unbalanced brackets.",
                _ => "Expected a literal value, variable, or parenthesized expression here.",
            };
            LentoError::parse_error_with_help(
                token.span,
                format!("Expected expression, found '{}'", token.lexeme),
                help_msg.to_string(),
            )
        })?;

        let mut left = nud(self)?;

        while let Some((led_power, led)) = led_lookup(self.peek().token_type) {
            if led_power <= binding_power {
                break;
            }
            left = led(self, left, led_power)?;
        }

        Ok(left)
    }

    fn primary_expression(&mut self) -> ParseResult<Expr> {
        let token = self.advance().clone();

        match (token.token_type, token.literal) {
            (TokenType::Number, Some(Literal::Number(value))) => Ok(Expr::Number {
                value,
                span: token.span,
            }),
            (TokenType::String, Some(Literal::String(value))) => Ok(Expr::String {
                value,
                span: token.span,
            }),
            (TokenType::Identifier, Some(Literal::Identifier(name))) => Ok(Expr::Symbol {
                name,
                span: token.span,
            }),
            // Reserved literals resolve through the global constants.
            (TokenType::True | TokenType::False | TokenType::Nil, _) => Ok(Expr::Symbol {
                name: token.lexeme,
                span: token.span,
            }),
            _ => Err(LentoError::parse_error(
                token.span,
                format!("Unrecognized primary token: '{}'", token.lexeme),
            )),
        }
    }

    fn grouping_expression(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;

        if self.check(TokenType::RightParen) {
            return Err(LentoError::parse_error_with_help(
                start.to(&self.peek().span),
                "Empty parentheses are not allowed".to_string(),
                "Parentheses must contain an expression. Use 'nil' for a null value: (nil)".to_string(),
            ));
        }

        let expr = self.parse_expression(BindingPower::Default)?;
        self.consume_with_help(
            TokenType::RightParen,
            "Expected ')' after expression",
            "Every opening parenthesis '(' must have a matching closing parenthesis ')'.".to_string(),
        )?;
        Ok(expr)
    }

    fn unary_expression(&mut self) -> ParseResult<Expr> {
        let token = self.advance().clone();
        let operator = match token.token_type {
            TokenType::Minus => UnaryOp::Negate,
            TokenType::Plus => UnaryOp::Plus,
            _ => UnaryOp::Not,
        };

        let operand = self.parse_expression(BindingPower::Unary).map_err(|error| {
            if self.is_at_end() {
                LentoError::parse_error(
                    token.span,
                    format!("Expected expression after '{}'", token.lexeme),
                )
            } else {
                error
            }
        })?;

        Ok(Expr::Unary {
            operator,
            span: token.span.to(operand.span()),
            operand: Box::new(operand),
        })
    }

    fn array_expression(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut elements = Vec::new();

        if !self.check(TokenType::RightBracket) {
            loop {
                elements.push(self.parse_expression(BindingPower::Comma)?);
                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightBracket,
            "Expected ']' after array elements",
            "Array literals must be closed with ']' after the opening '['. Example: [1, 2, 3]".to_string(),
        )?;

        Ok(Expr::Array {
            elements,
            span: start.to(&self.previous().span),
        })
    }

    fn object_expression(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut pairs = Vec::new();

        if !self.check(TokenType::RightBrace) {
            loop {
                let key_token = self.advance().clone();
                let key = match (key_token.token_type, key_token.literal) {
                    (TokenType::Identifier, Some(Literal::Identifier(name))) => name,
                    (TokenType::String, Some(Literal::String(text))) => text,
                    _ => {
                        return Err(LentoError::parse_error_with_help(
                            key_token.span,
                            format!("Expected object key, found '{}'", key_token.lexeme),
                            "Object keys are identifiers or strings: { name: \"lento\", \"a b\": 1 }".to_string(),
                        ))
                    }
                };

                self.consume_with_help(
                    TokenType::Colon,
                    "Expected ':' after object key",
                    "Object entries require a colon ':' between key and value. Example: { key: 1 }".to_string(),
                )?;
                let value = self.parse_expression(BindingPower::Comma)?;
                pairs.push((key, value));

                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightBrace,
            "Expected '}' after object entries",
            "Object literals must be closed with '}' after the opening '{'. Example: { key: 1 }".to_string(),
        )?;

        Ok(Expr::Object {
            pairs,
            span: start.to(&self.previous().span),
        })
    }

    fn binary_expression(&mut self, left: Expr, binding_power: BindingPower) -> ParseResult<Expr> {
        let operator_token = self.advance().clone();
        let operator = binary_operator(operator_token.token_type).ok_or_else(|| {
            LentoError::parse_error(
                operator_token.span,
                format!("Unsupported binary operator '{}'", operator_token.lexeme),
            )
        })?;

        // Recursing at the operator's own power keeps equal-precedence chains left-associative.
        let right = self.parse_expression(binding_power).map_err(|error| {
            if self.is_at_end() {
                LentoError::parse_error_with_help(
                    operator_token.span,
                    format!("Expected expression after '{}'", operator_token.lexeme),
                    "Binary operators require expressions on both sides.".to_string(),
                )
            } else {
                error
            }
        })?;

        Ok(Expr::Binary {
            span: left.span().to(right.span()),
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn assignment_expression(&mut self, left: Expr, binding_power: BindingPower) -> ParseResult<Expr> {
        let operator_token = self.advance().clone();

        if !left.is_assignable() {
            return Err(LentoError::new(
                ErrorKind::Syntax,
                ErrorCode::InvalidAssignmentTarget,
                operator_token.span,
                "Invalid left-hand side in assignment".to_string(),
            )
            .with_help("Only variables, index targets and members can be assigned to: x = 1, a[0] = 1, o.k = 1"));
        }

        let operator = match operator_token.token_type {
            TokenType::Equal => None,
            other => binary_operator(other),
        };

        let value = self.parse_expression(binding_power.below())?;

        Ok(Expr::Assignment {
            span: left.span().to(value.span()),
            target: Box::new(left),
            operator,
            value: Box::new(value),
        })
    }

    fn postfix_expression(&mut self, left: Expr, _binding_power: BindingPower) -> ParseResult<Expr> {
        let operator_token = self.advance().clone();

        if !left.is_assignable() {
            return Err(LentoError::new(
                ErrorKind::Syntax,
                ErrorCode::InvalidAssignmentTarget,
                operator_token.span,
                format!("Invalid operand for postfix '{}'", operator_token.lexeme),
            ));
        }

        let operator = if operator_token.token_type == TokenType::PlusPlus {
            PostfixOp::Increment
        } else {
            PostfixOp::Decrement
        };

        Ok(Expr::Postfix {
            span: left.span().to(&operator_token.span),
            target: Box::new(left),
            operator,
        })
    }

    fn call_expression(&mut self, callee: Expr, _binding_power: BindingPower) -> ParseResult<Expr> {
        self.advance();
        let mut args = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                if self.is_at_end() {
                    return Err(LentoError::parse_error_with_help(
                        self.end_of_input_span(),
                        "Unexpected end of input in function call".to_string(),
                        "Function calls must be closed with ')' after the arguments. Example: func(arg1, arg2)".to_string(),
                    ));
                }
                args.push(self.parse_expression(BindingPower::Comma)?);
                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightParen,
            "Expected ')' after arguments",
            "Function calls must be closed with ')' after the arguments. Example: func(arg1, arg2)".to_string(),
        )?;

        Ok(Expr::Call {
            span: callee.span().to(&self.previous().span),
            callee: Box::new(callee),
            args,
        })
    }

    fn index_expression(&mut self, target: Expr, _binding_power: BindingPower) -> ParseResult<Expr> {
        self.advance();
        let index = self.parse_expression(BindingPower::Default)?;
        self.consume_with_help(
            TokenType::RightBracket,
            "Expected ']' after index",
            "Index expressions look like: items[0] or object[\"key\"]".to_string(),
        )?;

        Ok(Expr::Index {
            span: target.span().to(&self.previous().span),
            target: Box::new(target),
            index: Box::new(index),
        })
    }

    fn member_expression(&mut self, object: Expr, _binding_power: BindingPower) -> ParseResult<Expr> {
        self.advance();
        let property = self.identifier("Expected property name after '.'")?;

        Ok(Expr::Member {
            span: object.span().to(&self.previous().span),
            object: Box::new(object),
            property,
        })
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn identifier(&mut self, message: &str) -> ParseResult<String> {
        let token = self.consume(TokenType::Identifier, message)?;
        Ok(token.lexeme.clone())
    }

    fn match_type(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            let line = self.tokens[self.current].line();
            if line > self.line {
                self.line = line;
            }
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn end_of_input_span(&self) -> Span {
        if self.current > 0 {
            let last = &self.tokens[self.current - 1];
            Span::single(last.span.end, last.line())
        } else {
            self.peek().span
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected(token_type, message))
        }
    }

    fn consume_with_help(
        &mut self,
        token_type: TokenType,
        message: &str,
        help: String,
    ) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected(token_type, message).with_help(help))
        }
    }

    fn expected(&self, token_type: TokenType, message: &str) -> LentoError {
        let (span, found) = if self.is_at_end() {
            (self.end_of_input_span(), "end of file".to_string())
        } else {
            (self.peek().span, format!("'{}'", self.peek().lexeme))
        };
        tracing::trace!(expected = %token_type, line = self.line, "unexpected token");
        LentoError::parse_error(span, format!("{}, found {}", message, found))
    }
}

use crate::error::Span;
use std::rc::Rc;

/// Expression and statement trees produced by the parser. Every node carries the
/// span (and so the line) it was parsed from.

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block {
        statements: Vec<Stmt>,
        span: Span,
    },
    Expression {
        expr: Expr,
        span: Span,
    },
    VarDeclaration {
        name: String,
        is_constant: bool,
        initializer: Option<Expr>,
        span: Span,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    FunctionDeclaration {
        name: String,
        parameters: Vec<String>,
        /// Shared with every function value created from this declaration.
        body: Rc<Stmt>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    For {
        initializer: Box<Stmt>,
        condition: Expr,
        increment: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::Block { span, .. } => span,
            Stmt::Expression { span, .. } => span,
            Stmt::VarDeclaration { span, .. } => span,
            Stmt::If { span, .. } => span,
            Stmt::FunctionDeclaration { span, .. } => span,
            Stmt::While { span, .. } => span,
            Stmt::For { span, .. } => span,
            Stmt::Return { span, .. } => span,
            Stmt::Break { span } => span,
            Stmt::Continue { span } => span,
        }
    }

    pub fn line(&self) -> usize {
        self.span().line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        value: f64,
        span: Span,
    },
    String {
        value: String,
        span: Span,
    },
    Symbol {
        name: String,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `target = value`, or `target op= value` when `operator` is set.
    Assignment {
        target: Box<Expr>,
        operator: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Object {
        pairs: Vec<(String, Expr)>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    Postfix {
        target: Box<Expr>,
        operator: PostfixOp,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Number { span, .. } => span,
            Expr::String { span, .. } => span,
            Expr::Symbol { span, .. } => span,
            Expr::Binary { span, .. } => span,
            Expr::Unary { span, .. } => span,
            Expr::Assignment { span, .. } => span,
            Expr::Call { span, .. } => span,
            Expr::Array { span, .. } => span,
            Expr::Index { span, .. } => span,
            Expr::Object { span, .. } => span,
            Expr::Member { span, .. } => span,
            Expr::Postfix { span, .. } => span,
        }
    }

    pub fn line(&self) -> usize {
        self.span().line
    }

    /// Symbols, index targets and member targets can stand left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Symbol { .. } | Expr::Index { .. } | Expr::Member { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

use crate::ast::{BinaryOp, Expr, PostfixOp, Stmt, UnaryOp};
use crate::environment::{EnvRef, Environment};
use crate::error::{ErrorCode, ErrorSink, LentoError, Span};
use crate::value::{object_get, object_set, ControlFlow, Function, Value};
use std::rc::Rc;

/// Deepest chain of nested user-function calls before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 200;

/// Evaluates a parsed program in `environment`. Top-level declarations land in
/// `environment` itself so a REPL can reuse it across inputs.
pub fn evaluate(statement: &Stmt, environment: &EnvRef, sink: &mut ErrorSink) -> Value {
    Evaluator::new(Rc::clone(environment), sink).evaluate_program(statement)
}

/// A resolved assignment target, evaluated once and then read and/or written.
enum Place {
    Variable(String),
    Element(Value, Value),
    Member(Value, String),
}

pub struct Evaluator<'s> {
    environment: EnvRef,
    sink: &'s mut ErrorSink,
    inside_loop: bool,
    inside_function: bool,
    call_depth: usize,
    span: Span,
}

impl<'s> Evaluator<'s> {
    pub fn new(environment: EnvRef, sink: &'s mut ErrorSink) -> Self {
        Self {
            environment,
            sink,
            inside_loop: false,
            inside_function: false,
            call_depth: 0,
            span: Span::default(),
        }
    }

    /// Reports a runtime error at the node currently being evaluated and yields nil.
    /// Native functions use this for their own failures.
    pub fn report(&mut self, code: ErrorCode, message: impl Into<String>) -> Value {
        let span = self.span;
        self.error_at(span, code, message.into())
    }

    fn error_at(&mut self, span: Span, code: ErrorCode, message: String) -> Value {
        self.sink.report(LentoError::runtime_error(code, span, message));
        Value::Nil
    }

    fn error_with_help(&mut self, span: Span, code: ErrorCode, message: String, help: &str) -> Value {
        self.sink.report(LentoError::runtime_error_with_help(
            code,
            span,
            message,
            help.to_string(),
        ));
        Value::Nil
    }

    fn in_environment<T>(&mut self, environment: EnvRef, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = f(self);
        self.environment = previous;
        result
    }

    /// Runs the top-level block's statements directly in the current environment.
    pub fn evaluate_program(&mut self, program: &Stmt) -> Value {
        match program {
            Stmt::Block { statements, .. } => {
                tracing::debug!(statements = statements.len(), "evaluating program");
                self.evaluate_statements(statements)
            }
            other => self.evaluate_statement(other),
        }
    }

    fn evaluate_statements(&mut self, statements: &[Stmt]) -> Value {
        let mut last = Value::Nil;
        for statement in statements {
            last = self.evaluate_statement(statement);
            if last.is_control_flow() || self.sink.had_error() {
                break;
            }
        }
        last
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn evaluate_statement(&mut self, stmt: &Stmt) -> Value {
        self.span = *stmt.span();
        tracing::trace!(line = stmt.line(), "evaluating statement");

        match stmt {
            Stmt::Block { statements, .. } => {
                let scope = Environment::child(&self.environment);
                self.in_environment(scope, |this| this.evaluate_statements(statements))
            }
            Stmt::Expression { expr, .. } => self.evaluate_expression(expr),
            Stmt::VarDeclaration {
                name,
                is_constant,
                initializer,
                span,
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_expression(expr),
                    None => Value::Nil,
                };
                self.declare(name, value.clone(), *is_constant, *span);
                value
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition_value = self.evaluate_expression(condition);
                if self.sink.had_error() {
                    return Value::Nil;
                }
                if condition_value.is_truthy() {
                    self.evaluate_statement(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.evaluate_statement(else_stmt)
                } else {
                    Value::Nil
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                let was_in_loop = std::mem::replace(&mut self.inside_loop, true);
                let result = self.run_loop(condition, body, None);
                self.inside_loop = was_in_loop;
                result
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // One scope for the whole loop so the loop variable carries across iterations.
                let scope = Environment::child(&self.environment);
                let was_in_loop = std::mem::replace(&mut self.inside_loop, true);
                let result = self.in_environment(scope, |this| {
                    this.evaluate_statement(initializer);
                    this.run_loop(condition, body, Some(increment))
                });
                self.inside_loop = was_in_loop;
                result
            }
            Stmt::FunctionDeclaration {
                name,
                parameters,
                body,
                span,
            } => {
                let function = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: Rc::clone(body),
                    closure: Rc::clone(&self.environment),
                }));
                self.declare(name, function.clone(), true, *span);
                function
            }
            Stmt::Return { value, span } => {
                if !self.inside_function {
                    return self.error_with_help(
                        *span,
                        ErrorCode::IllegalStatement,
                        "'return' used outside of a function".to_string(),
                        "Only function bodies can return a value.",
                    );
                }
                let value = match value {
                    Some(expr) => self.evaluate_expression(expr),
                    None => Value::Nil,
                };
                Value::ControlFlow(ControlFlow::Return(Box::new(value)))
            }
            Stmt::Break { span } => {
                if !self.inside_loop {
                    return self.error_at(
                        *span,
                        ErrorCode::IllegalStatement,
                        "'break' used outside of a loop".to_string(),
                    );
                }
                Value::ControlFlow(ControlFlow::Break)
            }
            Stmt::Continue { span } => {
                if !self.inside_loop {
                    return self.error_at(
                        *span,
                        ErrorCode::IllegalStatement,
                        "'continue' used outside of a loop".to_string(),
                    );
                }
                Value::ControlFlow(ControlFlow::Continue)
            }
        }
    }

    fn declare(&mut self, name: &str, value: Value, is_constant: bool, span: Span) {
        let declared = self
            .environment
            .borrow_mut()
            .declare(name, value, is_constant, false);
        if let Err(error) = declared {
            self.sink.report(error.at(span));
        }
    }

    /// Shared by `while` and `for`: break ends the loop with nil, continue moves on
    /// to the increment, return unwinds to the caller.
    fn run_loop(&mut self, condition: &Expr, body: &Stmt, increment: Option<&Expr>) -> Value {
        loop {
            if self.sink.had_error() {
                return Value::Nil;
            }
            let condition_value = self.evaluate_expression(condition);
            if self.sink.had_error() || !condition_value.is_truthy() {
                return Value::Nil;
            }

            match self.evaluate_statement(body) {
                Value::ControlFlow(ControlFlow::Break) => return Value::Nil,
                signal @ Value::ControlFlow(ControlFlow::Return(_)) => return signal,
                _ => {}
            }

            if let Some(increment) = increment {
                self.evaluate_expression(increment);
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Value {
        self.span = *expr.span();

        match expr {
            Expr::Number { value, .. } => Value::Number(*value),
            Expr::String { value, .. } => Value::String(value.clone()),
            Expr::Symbol { name, span } => match Environment::lookup(&self.environment, name) {
                Ok(value) => value,
                Err(error) => {
                    self.sink.report(error.at(*span));
                    Value::Nil
                }
            },
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                // Both operands are always evaluated; and/or do not short-circuit.
                let left_value = self.evaluate_expression(left);
                let right_value = self.evaluate_expression(right);
                self.binary_op(*operator, left_value, right_value, *span)
            }
            Expr::Unary {
                operator,
                operand,
                span,
            } => {
                let value = self.evaluate_expression(operand);
                self.unary_op(*operator, value, *span)
            }
            Expr::Assignment {
                target,
                operator,
                value,
                span,
            } => {
                let Some(place) = self.resolve_place(target) else {
                    return Value::Nil;
                };
                let new_value = match operator {
                    Some(operator) => {
                        let current = self.read_place(&place, *span);
                        let rhs = self.evaluate_expression(value);
                        self.binary_op(*operator, current, rhs, *span)
                    }
                    None => self.evaluate_expression(value),
                };
                if self.sink.had_error() {
                    return Value::Nil;
                }
                self.write_place(place, new_value.clone(), *span);
                new_value
            }
            Expr::Postfix {
                target,
                operator,
                span,
            } => {
                let Some(place) = self.resolve_place(target) else {
                    return Value::Nil;
                };
                let n = match self.read_place(&place, *span) {
                    Value::Number(n) => n,
                    other => {
                        return self.error_at(
                            *span,
                            ErrorCode::TypeMismatch,
                            format!("Cannot apply postfix operator to {}", other.type_name()),
                        )
                    }
                };
                let updated = match operator {
                    PostfixOp::Increment => n + 1.0,
                    PostfixOp::Decrement => n - 1.0,
                };
                self.write_place(place, Value::Number(updated), *span);
                Value::Number(n)
            }
            Expr::Call { callee, args, span } => {
                let function = self.evaluate_expression(callee);
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate_expression(arg));
                }
                self.span = *span;
                self.call_value(function, arguments)
            }
            Expr::Array { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expression(element));
                }
                Value::array(values)
            }
            Expr::Object { pairs, .. } => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, value_expr) in pairs {
                    entries.push((key.clone(), self.evaluate_expression(value_expr)));
                }
                Value::object(entries)
            }
            Expr::Index {
                target,
                index,
                span,
            } => {
                let container = self.evaluate_expression(target);
                let index_value = self.evaluate_expression(index);
                self.read_place(&Place::Element(container, index_value), *span)
            }
            Expr::Member {
                object,
                property,
                span,
            } => {
                let object_value = self.evaluate_expression(object);
                self.read_place(&Place::Member(object_value, property.clone()), *span)
            }
        }
    }

    fn resolve_place(&mut self, target: &Expr) -> Option<Place> {
        match target {
            Expr::Symbol { name, .. } => Some(Place::Variable(name.clone())),
            Expr::Index { target, index, .. } => {
                let container = self.evaluate_expression(target);
                let index_value = self.evaluate_expression(index);
                Some(Place::Element(container, index_value))
            }
            Expr::Member {
                object, property, ..
            } => {
                let object_value = self.evaluate_expression(object);
                Some(Place::Member(object_value, property.clone()))
            }
            other => {
                self.error_at(
                    *other.span(),
                    ErrorCode::InvalidAssignmentTarget,
                    "Invalid assignment target".to_string(),
                );
                None
            }
        }
    }

    fn read_place(&mut self, place: &Place, span: Span) -> Value {
        match place {
            Place::Variable(name) => match Environment::lookup(&self.environment, name) {
                Ok(value) => value,
                Err(error) => {
                    self.sink.report(error.at(span));
                    Value::Nil
                }
            },
            Place::Element(Value::Array(elements), index) => {
                let Some(position) = self.array_position(index, elements.borrow().len(), span) else {
                    return Value::Nil;
                };
                let element = elements.borrow()[position].clone();
                element
            }
            Place::Element(Value::Object(entries), key) => match key {
                Value::String(key) => object_get(entries, key).unwrap_or(Value::Nil),
                other => self.object_key_error(other, span),
            },
            Place::Element(container, _) => self.error_at(
                span,
                ErrorCode::TypeMismatch,
                format!("Cannot index into {}", container.type_name()),
            ),
            Place::Member(Value::Object(entries), property) => {
                object_get(entries, property).unwrap_or(Value::Nil)
            }
            Place::Member(other, property) => self.error_at(
                span,
                ErrorCode::TypeMismatch,
                format!("Cannot read property '{}' of {}", property, other.type_name()),
            ),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, span: Span) {
        match place {
            Place::Variable(name) => {
                if let Err(error) = Environment::assign(&self.environment, &name, value) {
                    self.sink.report(error.at(span));
                }
            }
            Place::Element(Value::Array(elements), index) => {
                let len = elements.borrow().len();
                if let Some(position) = self.array_position(&index, len, span) {
                    elements.borrow_mut()[position] = value;
                }
            }
            Place::Element(Value::Object(entries), key) => match key {
                Value::String(key) => object_set(&entries, key, value),
                other => {
                    self.object_key_error(&other, span);
                }
            },
            Place::Element(container, _) => {
                self.error_at(
                    span,
                    ErrorCode::TypeMismatch,
                    format!("Cannot assign by index into {}", container.type_name()),
                );
            }
            Place::Member(Value::Object(entries), property) => object_set(&entries, property, value),
            Place::Member(other, property) => {
                self.error_at(
                    span,
                    ErrorCode::TypeMismatch,
                    format!("Cannot set property '{}' on {}", property, other.type_name()),
                );
            }
        }
    }

    fn array_position(&mut self, index: &Value, len: usize, span: Span) -> Option<usize> {
        let Value::Number(n) = index else {
            self.error_with_help(
                span,
                ErrorCode::ArrayIndex,
                format!("Array index must be a number, got {}", index.type_name()),
                "Arrays are indexed by position: items[0]",
            );
            return None;
        };

        if n.fract() != 0.0 || *n < 0.0 || *n >= len as f64 {
            self.error_at(
                span,
                ErrorCode::ArrayIndex,
                format!(
                    "Array index {} out of range for array of length {}",
                    crate::value::format_number(*n),
                    len
                ),
            );
            return None;
        }
        Some(*n as usize)
    }

    fn object_key_error(&mut self, key: &Value, span: Span) -> Value {
        self.error_with_help(
            span,
            ErrorCode::ObjectKey,
            format!("Object key must be a string, got {}", key.type_name()),
            "Use string keys with objects: person[\"name\"] or person.name",
        )
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Calls `callee` with already evaluated arguments.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Value {
        if self.sink.had_error() {
            return Value::Nil;
        }

        match callee {
            Value::NativeFunction(native) => {
                tracing::debug!(function = native.name, args = args.len(), "calling native function");
                let caller = Rc::clone(&self.environment);
                (native.call)(&args, &caller, self)
            }
            Value::Function(function) => self.call_function(&function, args),
            other => {
                let span = self.span;
                self.error_at(
                    span,
                    ErrorCode::NotCallable,
                    format!("Cannot call a value of type {}", other.type_name()),
                )
            }
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Value {
        let span = self.span;

        if args.len() != function.parameters.len() {
            return self.error_at(
                span,
                ErrorCode::ArgumentCount,
                format!(
                    "Function '{}' expects {} argument(s) but got {}",
                    function.name,
                    function.parameters.len(),
                    args.len()
                ),
            );
        }

        if self.call_depth >= MAX_CALL_DEPTH {
            return self.error_at(
                span,
                ErrorCode::StackOverflow,
                format!("Maximum call depth of {} exceeded in '{}'", MAX_CALL_DEPTH, function.name),
            );
        }

        tracing::debug!(function = %function.name, depth = self.call_depth, "calling function");

        // Parent is the captured scope, not the caller's.
        let frame = Environment::child(&function.closure);
        for (parameter, argument) in function.parameters.iter().zip(args) {
            let declared = frame.borrow_mut().declare(parameter, argument, false, false);
            if let Err(error) = declared {
                self.sink.report(error.at(span));
                return Value::Nil;
            }
        }

        let was_in_loop = std::mem::replace(&mut self.inside_loop, false);
        let was_in_function = std::mem::replace(&mut self.inside_function, true);
        self.call_depth += 1;

        let result = self.in_environment(frame, |this| this.evaluate_statement(&function.body));

        self.call_depth -= 1;
        self.inside_function = was_in_function;
        self.inside_loop = was_in_loop;

        match result {
            Value::ControlFlow(ControlFlow::Return(value)) => *value,
            Value::ControlFlow(_) => Value::Nil,
            value => value,
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn binary_op(&mut self, operator: BinaryOp, left: Value, right: Value, span: Span) -> Value {
        match operator {
            BinaryOp::And => return Value::Boolean(left.is_truthy() && right.is_truthy()),
            BinaryOp::Or => return Value::Boolean(left.is_truthy() || right.is_truthy()),
            BinaryOp::Equal | BinaryOp::NotEqual => return self.equality(operator, &left, &right, span),
            _ => {}
        }

        match (left, right) {
            (Value::Number(l), Value::Number(r)) => self.numeric_op(operator, l, r, span),
            (Value::String(l), Value::String(r)) => match operator {
                BinaryOp::Add => Value::String(l + &r),
                BinaryOp::Less => Value::Boolean(l < r),
                BinaryOp::LessEqual => Value::Boolean(l <= r),
                BinaryOp::Greater => Value::Boolean(l > r),
                BinaryOp::GreaterEqual => Value::Boolean(l >= r),
                _ => self.error_at(
                    span,
                    ErrorCode::TypeMismatch,
                    format!("Cannot apply '{}' to string and string", operator.symbol()),
                ),
            },
            (l, r) => self.error_with_help(
                span,
                ErrorCode::TypeMismatch,
                format!(
                    "Cannot apply '{}' to {} and {}",
                    operator.symbol(),
                    l.type_name(),
                    r.type_name()
                ),
                "Arithmetic needs two numbers; '+' also joins two strings. Convert with str() or num().",
            ),
        }
    }

    /// Equality is only defined between values of the same type.
    fn equality(&mut self, operator: BinaryOp, left: &Value, right: &Value, span: Span) -> Value {
        if left.type_name() != right.type_name() {
            return self.error_with_help(
                span,
                ErrorCode::TypeMismatch,
                format!(
                    "Cannot compare {} with {} using '{}'",
                    left.type_name(),
                    right.type_name(),
                    operator.symbol()
                ),
                "Both sides of '==' and '!=' must have the same type. Convert with str() or num().",
            );
        }
        let equal = left == right;
        Value::Boolean(if operator == BinaryOp::Equal { equal } else { !equal })
    }

    fn numeric_op(&mut self, operator: BinaryOp, l: f64, r: f64, span: Span) -> Value {
        match operator {
            BinaryOp::Add => Value::Number(l + r),
            BinaryOp::Subtract => Value::Number(l - r),
            BinaryOp::Multiply => Value::Number(l * r),
            BinaryOp::Divide => {
                if r == 0.0 {
                    return self.error_at(span, ErrorCode::DivisionByZero, "Division by zero".to_string());
                }
                Value::Number(l / r)
            }
            BinaryOp::Modulo => {
                if r == 0.0 {
                    return self.error_at(span, ErrorCode::DivisionByZero, "Modulo by zero".to_string());
                }
                Value::Number(l % r)
            }
            BinaryOp::Less => Value::Boolean(l < r),
            BinaryOp::LessEqual => Value::Boolean(l <= r),
            BinaryOp::Greater => Value::Boolean(l > r),
            BinaryOp::GreaterEqual => Value::Boolean(l >= r),
            BinaryOp::Equal => Value::Boolean(l == r),
            BinaryOp::NotEqual => Value::Boolean(l != r),
            BinaryOp::And | BinaryOp::Or => Value::Boolean(true),
        }
    }

    fn unary_op(&mut self, operator: UnaryOp, operand: Value, span: Span) -> Value {
        match (operator, operand) {
            (UnaryOp::Plus, Value::Number(n)) => Value::Number(n),
            (UnaryOp::Negate, Value::Number(n)) => Value::Number(-n),
            (UnaryOp::Not, Value::Boolean(b)) => Value::Boolean(!b),
            (UnaryOp::Not, other) => self.error_at(
                span,
                ErrorCode::TypeMismatch,
                format!("Operator 'not' expects a boolean, got {}", other.type_name()),
            ),
            (_, other) => self.error_at(
                span,
                ErrorCode::TypeMismatch,
                format!("Unary '+'/'-' expects a number, got {}", other.type_name()),
            ),
        }
    }
}

use crate::environment::EnvRef;
use crate::error::ErrorCode;
use crate::evaluator::Evaluator;
use crate::value::{NativeFn, NativeFunction, Value};

const CATALOGUE: &[(&str, NativeFn)] = &[
    ("print", native_print),
    ("len", native_len),
    ("toUpper", native_to_upper),
    ("toLower", native_to_lower),
    ("str", native_str),
    ("num", native_num),
    ("type", native_type),
    ("push", native_push),
];

/// Seeds the global frame with the literal constants and the native catalogue.
pub fn install(env: &EnvRef) {
    let mut frame = env.borrow_mut();

    let constants = [
        ("nil", Value::Nil),
        ("true", Value::Boolean(true)),
        ("false", Value::Boolean(false)),
    ];
    // The frame is fresh, so none of these names can already be bound.
    for (name, value) in constants {
        let _ = frame.declare(name, value, true, true);
    }
    for &(name, call) in CATALOGUE {
        let native = Value::NativeFunction(NativeFunction { name, call });
        let _ = frame.declare(name, native, true, true);
    }

    tracing::debug!(natives = CATALOGUE.len(), "seeded global environment");
}

fn expect_args(name: &str, args: &[Value], count: usize, evaluator: &mut Evaluator<'_>) -> bool {
    if args.len() == count {
        return true;
    }
    evaluator.report(
        ErrorCode::ArgumentCount,
        format!("{}() expects {} argument(s) but got {}", name, count, args.len()),
    );
    false
}

fn native_print(args: &[Value], _env: &EnvRef, _evaluator: &mut Evaluator<'_>) -> Value {
    let line: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    println!("{}", line.join(" "));
    Value::Nil
}

fn native_len(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("len", args, 1, evaluator) {
        return Value::Nil;
    }
    match &args[0] {
        Value::String(s) => Value::Number(s.chars().count() as f64),
        Value::Array(elements) => Value::Number(elements.borrow().len() as f64),
        Value::Object(entries) => Value::Number(entries.borrow().len() as f64),
        other => evaluator.report(
            ErrorCode::NativeFunction,
            format!("len() is not defined for {}", other.type_name()),
        ),
    }
}

fn native_to_upper(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("toUpper", args, 1, evaluator) {
        return Value::Nil;
    }
    match &args[0] {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => evaluator.report(
            ErrorCode::NativeFunction,
            format!("toUpper() expects a string, got {}", other.type_name()),
        ),
    }
}

fn native_to_lower(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("toLower", args, 1, evaluator) {
        return Value::Nil;
    }
    match &args[0] {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => evaluator.report(
            ErrorCode::NativeFunction,
            format!("toLower() expects a string, got {}", other.type_name()),
        ),
    }
}

fn native_str(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("str", args, 1, evaluator) {
        return Value::Nil;
    }
    Value::String(args[0].to_string())
}

fn native_num(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("num", args, 1, evaluator) {
        return Value::Nil;
    }
    if let Some(n) = args[0].as_number() {
        return Value::Number(n);
    }
    match &args[0] {
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => evaluator.report(
                ErrorCode::NativeFunction,
                format!("num() cannot convert \"{}\" to a number", s),
            ),
        },
        other => evaluator.report(
            ErrorCode::NativeFunction,
            format!("num() cannot convert {} to a number", other.type_name()),
        ),
    }
}

fn native_type(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("type", args, 1, evaluator) {
        return Value::Nil;
    }
    Value::string(args[0].type_name())
}

fn native_push(args: &[Value], _env: &EnvRef, evaluator: &mut Evaluator<'_>) -> Value {
    if !expect_args("push", args, 2, evaluator) {
        return Value::Nil;
    }
    match &args[0] {
        Value::Array(elements) => {
            elements.borrow_mut().push(args[1].clone());
            args[0].clone()
        }
        other => evaluator.report(
            ErrorCode::NativeFunction,
            format!("push() expects an array, got {}", other.type_name()),
        ),
    }
}

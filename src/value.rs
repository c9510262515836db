use crate::ast::Stmt;
use crate::environment::EnvRef;
use crate::evaluator::Evaluator;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Host callable behind a native function: arguments, caller environment, evaluator.
pub type NativeFn = fn(&[Value], &EnvRef, &mut Evaluator<'_>) -> Value;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Reference type: clones share the same elements.
    Array(Rc<RefCell<Vec<Value>>>),
    /// Reference type: ordered entries, keys unique (last write wins).
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    Function(Rc<Function>),
    NativeFunction(NativeFunction),
    /// Internal signal from break/continue/return; never user visible.
    ControlFlow(ControlFlow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Box<Value>),
}

pub struct Function {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Rc<Stmt>,
    /// Scope active at the declaration site, shared with every call.
    pub closure: EnvRef,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // The closure may hold this very function; don't walk it.
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub call: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl Value {
    pub fn string(text: impl Into<String>) -> Value {
        Value::String(text.into())
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object(entries: Vec<(String, Value)>) -> Value {
        let object = Rc::new(RefCell::new(Vec::with_capacity(entries.len())));
        for (key, value) in entries {
            object_set(&object, key, value);
        }
        Value::Object(object)
    }

    /// `nil` and `false` are falsy; everything else, zero and "" included, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self, Value::ControlFlow(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native_function",
            Value::ControlFlow(_) => "control_flow",
        }
    }
}

pub fn object_get(object: &RefCell<Vec<(String, Value)>>, key: &str) -> Option<Value> {
    object
        .borrow()
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

pub fn object_set(object: &RefCell<Vec<(String, Value)>>, key: String, value: Value) {
    let mut entries = object.borrow_mut();
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Identity of a shared container, used to notice cycles.
type Address = *const ();

fn address<T>(shared: &Rc<T>) -> Address {
    Rc::as_ptr(shared) as Address
}

impl Value {
    /// Structural equality. A pair of containers already under comparison is
    /// taken as equal, so self-referencing arrays and objects terminate.
    fn equals(&self, other: &Value, seen: &mut Vec<(Address, Address)>) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => {
                let pair = (address(l), address(r));
                if Rc::ptr_eq(l, r) || seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (l, r) = (l.borrow(), r.borrow());
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a.equals(b, seen))
            }
            (Value::Object(l), Value::Object(r)) => {
                let pair = (address(l), address(r));
                if Rc::ptr_eq(l, r) || seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (l, r) = (l.borrow(), r.borrow());
                l.len() == r.len()
                    && l.iter()
                        .zip(r.iter())
                        .all(|((lk, lv), (rk, rv))| lk == rk && lv.equals(rv, seen))
            }
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            (Value::NativeFunction(l), Value::NativeFunction(r)) => l.name == r.name,
            (Value::ControlFlow(l), Value::ControlFlow(r)) => l == r,
            _ => false,
        }
    }

    /// Renders `self`; `nested` quotes strings. Containers already on the
    /// rendering path print as `[...]` or `{...}`.
    fn render(&self, f: &mut fmt::Formatter, nested: bool, path: &mut Vec<Address>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) if nested => write!(f, "\"{}\"", s),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                let id = address(elements);
                if path.contains(&id) {
                    return write!(f, "[...]");
                }
                path.push(id);
                write!(f, "[")?;
                for (i, item) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.render(f, true, path)?;
                }
                path.pop();
                write!(f, "]")
            }
            Value::Object(entries) => {
                let id = address(entries);
                if path.contains(&id) {
                    return write!(f, "{{...}}");
                }
                let entries = entries.borrow();
                if entries.is_empty() {
                    return write!(f, "{{}}");
                }
                path.push(id);
                write!(f, "{{ ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.render(f, true, path)?;
                }
                path.pop();
                write!(f, " }}")
            }
            Value::Function(function) => write!(f, "<fn {}>", function.name),
            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),
            Value::ControlFlow(ControlFlow::Break) => write!(f, "<break>"),
            Value::ControlFlow(ControlFlow::Continue) => write!(f, "<continue>"),
            Value::ControlFlow(ControlFlow::Return(value)) => {
                write!(f, "<return ")?;
                value.render(f, false, path)?;
                write!(f, ">")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.render(f, false, &mut Vec::new())
    }
}

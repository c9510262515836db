use crate::error::{ErrorCode, LentoError, Span};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Shared handle to a scope frame. Closures hold one, so a frame lives as long as
/// its longest holder.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("Cannot declare variable '{0}' as it already exists in this scope")]
    AlreadyDeclared(String),
    #[error("Cannot resolve variable '{0}'")]
    Undefined(String),
    #[error("Cannot reassign constant '{0}'")]
    Constant(String),
    #[error("Cannot reassign native binding '{0}'")]
    Native(String),
}

impl EnvironmentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EnvironmentError::AlreadyDeclared(_) => ErrorCode::Redeclaration,
            EnvironmentError::Undefined(_) => ErrorCode::UndefinedVariable,
            EnvironmentError::Constant(_) => ErrorCode::ConstantReassignment,
            EnvironmentError::Native(_) => ErrorCode::NativeReassignment,
        }
    }

    pub fn at(self, span: Span) -> LentoError {
        LentoError::runtime_error(self.code(), span, self.to_string())
    }
}

/// One frame of the lexical scope chain.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvRef>,
    bindings: HashMap<String, Value>,
    constants: HashSet<String>,
    natives: HashSet<String>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Environment {
    /// A bare frame with no parent and no bindings.
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// The global frame: `nil`, `true`, `false` and the native catalogue, all
    /// constant and native.
    pub fn global() -> EnvRef {
        let env = Environment::root();
        crate::natives::install(&env);
        env
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            parent: Some(Rc::clone(parent)),
            ..Environment::default()
        }))
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Binds `name` in this frame. Shadowing an enclosing frame is fine; a second
    /// declaration in the same frame is rejected without touching the first.
    pub fn declare(
        &mut self,
        name: &str,
        value: Value,
        is_constant: bool,
        is_native: bool,
    ) -> Result<(), EnvironmentError> {
        if self.bindings.contains_key(name) {
            return Err(EnvironmentError::AlreadyDeclared(name.to_string()));
        }

        if is_constant {
            self.constants.insert(name.to_string());
        }
        if is_native {
            self.natives.insert(name.to_string());
        }

        tracing::trace!(name, is_constant, is_native, "declared binding");
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    pub fn is_native(&self, name: &str) -> bool {
        self.natives.contains(name)
    }

    /// Walks outward from `env` to the first frame that binds `name`.
    pub fn resolve(env: &EnvRef, name: &str) -> Option<EnvRef> {
        let mut current = Rc::clone(env);
        loop {
            if current.borrow().has_own(name) {
                return Some(current);
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    pub fn lookup(env: &EnvRef, name: &str) -> Result<Value, EnvironmentError> {
        let owner =
            Environment::resolve(env, name).ok_or_else(|| EnvironmentError::Undefined(name.to_string()))?;
        let value = owner.borrow().bindings.get(name).cloned();
        value.ok_or_else(|| EnvironmentError::Undefined(name.to_string()))
    }

    /// Rebinds `name` in the frame that owns it.
    pub fn assign(env: &EnvRef, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let owner =
            Environment::resolve(env, name).ok_or_else(|| EnvironmentError::Undefined(name.to_string()))?;
        let mut frame = owner.borrow_mut();

        if frame.is_native(name) {
            return Err(EnvironmentError::Native(name.to_string()));
        }
        if frame.is_constant(name) {
            return Err(EnvironmentError::Constant(name.to_string()));
        }

        frame.bindings.insert(name.to_string(), value);
        Ok(())
    }
}

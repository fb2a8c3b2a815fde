use crate::interpreter::{RuntimeError, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;
use log::error;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// One lexical scope plus a link to the scope enclosing it.
///
/// Cloning an `Environment` shares the scope: a closure keeps its defining
/// scope (and everything enclosing it) alive after the block that created it
/// has finished.
#[derive(Clone)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

struct Scope {
    values: BTreeMap<String, Value>,
    enclosing: Option<Environment>,
}

// Scopes routinely reach themselves through closures, so only the shape is
// printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.scope.borrow();
        f.debug_struct("Environment")
            .field("names", &scope.values.keys().collect::<Vec<_>>())
            .field("depth", &self.depth())
            .finish()
    }
}

impl Environment {
    /// A scope with no parent: the globals.
    pub fn new() -> Environment {
        Environment {
            scope: Rc::new(RefCell::new(Scope {
                values: BTreeMap::new(),
                enclosing: None,
            })),
        }
    }
    pub fn new_child(&self) -> Environment {
        Environment {
            scope: Rc::new(RefCell::new(Scope {
                values: BTreeMap::new(),
                enclosing: Some(self.clone()),
            })),
        }
    }
    pub fn enclosing(&self) -> Option<Environment> {
        self.scope.borrow().enclosing.clone()
    }
    /// Number of enclosing links between this scope and the globals.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.enclosing();
        while let Some(env) = cur {
            depth += 1;
            cur = env.enclosing();
        }
        depth
    }
    pub fn define(&self, name: &str, value: Value) {
        self.scope
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(x) = self.scope.borrow().values.get(&name.lexeme) {
            return Ok(x.clone());
        }
        match self.enclosing() {
            Some(enclosing) => enclosing.get(name),
            None => Err(undefined(name)),
        }
    }
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(x) = self.scope.borrow_mut().values.get_mut(&name.lexeme) {
            *x = value;
            return Ok(());
        }
        match self.enclosing() {
            Some(enclosing) => enclosing.assign(name, value),
            None => Err(undefined(name)),
        }
    }
    /// Reads `name` from the scope exactly `distance` links out. The name
    /// must be there: the resolver computed the distance from the same
    /// scope structure.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        let env = self.ancestor(distance, name)?;
        let scope = env.scope.borrow();
        match scope.values.get(&name.lexeme) {
            Some(x) => Ok(x.clone()),
            None => Err(mismatch(distance, name)),
        }
    }
    pub fn assign_at(
        &self,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let env = self.ancestor(distance, name)?;
        let mut scope = env.scope.borrow_mut();
        match scope.values.get_mut(&name.lexeme) {
            Some(x) => {
                *x = value;
                Ok(())
            }
            None => Err(mismatch(distance, name)),
        }
    }
    fn ancestor(&self, distance: usize, name: &Token) -> Result<Environment, RuntimeError> {
        let mut env = self.clone();
        for _ in 0..distance {
            env = env.enclosing().ok_or_else(|| mismatch(distance, name))?;
        }
        Ok(env)
    }
    pub fn equals(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(
        name,
        RuntimeErrorKind::UndefinedVariable(name.lexeme.clone()),
    )
}

fn mismatch(distance: usize, name: &Token) -> RuntimeError {
    error!(
        "'{}' is not bound {} scopes out at line {}",
        name.lexeme, distance, name.line
    );
    RuntimeError::new(
        name,
        RuntimeErrorKind::ScopeMismatch {
            name: name.lexeme.clone(),
            distance,
        },
    )
}

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::instance::Instance;
use crate::interpreter::{Flow, Interpreter, RuntimeError};
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::fmt;
use std::fmt::Debug;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Anything a call expression can invoke.
pub trait Callable {
    fn arity(&self) -> usize;
    fn call(
        &self,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError>;
}

/// A user-declared function or method together with the scope it closes over.
#[derive(Clone, Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    is_initializer: bool,
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Environment,
        is_initializer: bool,
    ) -> LoxFunction {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }
    /// The same function with `this` bound to `instance` in a scope of its own.
    pub fn bind(&self, instance: Instance) -> LoxFunction {
        let environment = self.closure.new_child();
        environment.define("this", Value::Instance(instance));
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
    pub fn equals(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.declaration, &other.declaration) && self.closure.equals(&other.closure)
    }
    fn this(&self) -> Result<Value, RuntimeError> {
        self.closure.get_at(0, &Token::synthetic("this"))
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }
    fn call(
        &self,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = self.closure.new_child();
        for (param, value) in self.declaration.params.iter().zip(arguments.into_iter()) {
            environment.define(&param.lexeme, value);
        }
        debug!(
            "calling {} at scope depth {}",
            self,
            environment.depth()
        );
        let flow = interpreter.execute_block(&self.declaration.body, environment)?;
        // An initializer hands back its instance however it exits.
        if self.is_initializer {
            return self.this();
        }
        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// A function provided by the host rather than declared in source.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: fn(&[Value]) -> Value,
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }
    fn call(
        &self,
        _interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        Ok((self.function)(&arguments))
    }
}

fn clock(_arguments: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Number(seconds)
}

/// Natives installed in the global scope before any user code runs.
pub fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        function: clock,
    }]
}

#[cfg(test)]
mod tests {
    use crate::callable::natives;
    use crate::value::Value;

    #[test]
    fn clock_returns_seconds_since_epoch() {
        let clock = natives().into_iter().find(|n| n.name == "clock").unwrap();
        assert_eq!(clock.arity, 0);
        match (clock.function)(&[]) {
            // 2001-09-09, comfortably in the past.
            Value::Number(x) => assert!(x > 1_000_000_000.0),
            other => panic!("expected a number, got {:?}", other),
        }
    }
}

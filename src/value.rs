use crate::ast::LiteralValue;
use crate::callable::{Callable, LoxFunction, NativeFunction};
use crate::class::Class;
use crate::instance::Instance;
use std::fmt;
use std::fmt::Formatter;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Function(LoxFunction),
    NativeFunction(NativeFunction),
    Class(Class),
    Instance(Instance),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(x) => write!(f, "{}", x),
            // f64's Display already drops the fraction of integral values.
            Value::Number(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
            Value::Function(x) => write!(f, "{}", x),
            Value::NativeFunction(x) => write!(f, "{}", x),
            Value::Class(x) => write!(f, "{}", x),
            Value::Instance(x) => write!(f, "{}", x),
        }
    }
}

impl From<&LiteralValue> for Value {
    fn from(literal: &LiteralValue) -> Value {
        match literal {
            LiteralValue::Nil => Value::Nil,
            LiteralValue::Boolean(x) => Value::Boolean(*x),
            LiteralValue::Number(x) => Value::Number(*x),
            LiteralValue::String(x) => Value::String(x.clone()),
        }
    }
}

impl Value {
    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(x) => *x,
            _ => true,
        }
    }
    /// Equality without coercion. Functions, classes and instances compare
    /// by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.equals(b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a.name == b.name,
            (Value::Class(a), Value::Class(b)) => a.equals(b),
            (Value::Instance(a), Value::Instance(b)) => a.equals(b),
            _ => false,
        }
    }
    pub fn as_callable(&self) -> Option<&dyn Callable> {
        match self {
            Value::Function(x) => Some(x),
            Value::NativeFunction(x) => Some(x),
            Value::Class(x) => Some(x),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Value;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn equality_does_not_coerce() {
        assert!(Value::Nil.equals(&Value::Nil));
        assert!(!Value::Nil.equals(&Value::Boolean(false)));
        assert!(!Value::Number(1.0).equals(&Value::String("1".to_string())));
        assert!(Value::String("a".to_string()).equals(&Value::String("a".to_string())));
        assert!(!Value::Number(0.0).equals(&Value::Boolean(false)));
    }

    #[test]
    fn integral_numbers_print_without_fraction() {
        assert_eq!(Value::Number(6.0).to_string(), "6");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }
}

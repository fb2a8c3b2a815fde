use crate::callable::{Callable, LoxFunction};
use crate::instance::Instance;
use crate::interpreter::{Interpreter, RuntimeError};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct Class {
    data: Rc<ClassImpl>,
}

#[derive(Debug)]
struct ClassImpl {
    name: String,
    superclass: Option<Class>,
    methods: BTreeMap<String, LoxFunction>,
}

impl Class {
    pub fn new(
        name: &str,
        superclass: Option<Class>,
        methods: BTreeMap<String, LoxFunction>,
    ) -> Class {
        Class {
            data: Rc::new(ClassImpl {
                name: name.to_string(),
                superclass,
                methods,
            }),
        }
    }
    pub fn name(&self) -> &str {
        &self.data.name
    }
    /// Looks the method up on this class, then on each ancestor in turn.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        match self.data.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => match &self.data.superclass {
                Some(superclass) => superclass.find_method(name),
                None => None,
            },
        }
    }
    pub fn equals(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Callable for Class {
    fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
    fn call(
        &self,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Instance::new(self.clone());
        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(instance.clone())
                .call(interpreter, arguments)?;
        }
        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.name)
    }
}

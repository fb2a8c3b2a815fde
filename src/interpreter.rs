use crate::ast::{AstPrinter, ExprId, Expression, FunctionDecl, Statement, Visitor};
use crate::callable::{natives, LoxFunction};
use crate::class::Class;
use crate::environment::Environment;
use crate::parser::MAX_ARGUMENTS;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;

/// Deepest chain of nested calls a program may build. Each call recurses on
/// the host stack, so the thread running the interpreter needs room for this
/// many frames.
pub const MAX_CALL_DEPTH: usize = 2000;

#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand of '{0}' must be a number.")]
    OperandMustBeNumber(String),
    #[error("Operands of '{0}' must be numbers.")]
    OperandsMustBeNumbers(String),
    #[error("Operands of '+' must be two numbers or two strings.")]
    InvalidAddition,
    #[error("Division by zero.")]
    DivideByZero,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Only instances have properties.")]
    NotAnInstance,
    #[error("Only instances have fields.")]
    FieldOnNonInstance,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Superclass must be a class.")]
    SuperclassNotClass,
    #[error("Internal error: '{name}' is not bound {distance} scopes out.")]
    ScopeMismatch { name: String, distance: usize },
    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),
}

#[derive(Debug)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub token: Option<Token>,
}

impl RuntimeError {
    pub fn new(token: &Token, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError {
            kind,
            token: Some(token.clone()),
        }
    }
    pub fn line(&self) -> u32 {
        self.token.as_ref().map_or(0, |t| t.line)
    }
    pub fn column(&self) -> u32 {
        self.token.as_ref().map_or(0, |t| t.column)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            None => write!(f, "Error: {}", self.kind),
            Some(token) => write!(
                f,
                "[line {}:{}] Error {}: {}",
                token.line,
                token.column,
                token.location(),
                self.kind
            ),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.kind.source()
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError {
            kind: RuntimeErrorKind::Output(e),
            token: None,
        }
    }
}

/// How a statement finished. `Return` unwinds to the nearest function call
/// and is never treated as an error.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

type EvalResult = Result<Value, RuntimeError>;
type ExecResult = Result<Flow, RuntimeError>;

pub struct Interpreter<'o> {
    globals: Environment,
    environment: Environment,
    locals: Locals,
    call_depth: usize,
    out: &'o mut dyn Write,
}

impl<'o> fmt::Debug for Interpreter<'o> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals)
            .field("environment", &self.environment)
            .field("locals", &self.locals.len())
            .field("call_depth", &self.call_depth)
            .finish()
    }
}

impl<'o> Visitor<Expression, EvalResult> for Interpreter<'o> {
    fn visit(&mut self, expr: &Expression) -> EvalResult {
        match expr {
            Expression::Literal(x) => Ok(Value::from(x)),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Unary { operator, right } => {
                let rv = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => match rv {
                        Value::Number(r) => Ok(Value::Number(-r)),
                        _ => Err(RuntimeError::new(
                            operator,
                            RuntimeErrorKind::OperandMustBeNumber(operator.lexeme.clone()),
                        )),
                    },
                    _ => Ok(Value::Boolean(!rv.is_truthy())),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let lv = self.evaluate(left)?;
                let rv = self.evaluate(right)?;
                binary(operator, lv, rv)
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                match operator.tokentype {
                    TokenType::Or if left.is_truthy() => Ok(left),
                    TokenType::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Expression::Variable { id, name } => self.look_up_variable(*id, name),
            Expression::This { id, keyword } => self.look_up_variable(*id, keyword),
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(distance) => self.environment.assign_at(*distance, name, value.clone())?,
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expression::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                if arguments.len() > MAX_ARGUMENTS {
                    warn!(
                        "call at line {} passes {} arguments; only the first {} are used",
                        paren.line,
                        arguments.len(),
                        MAX_ARGUMENTS
                    );
                }
                let mut evaluated_arguments: Vec<Value> = Vec::new();
                for argument in arguments.iter().take(MAX_ARGUMENTS) {
                    evaluated_arguments.push(self.evaluate(argument)?);
                }
                let function = callee
                    .as_callable()
                    .ok_or_else(|| RuntimeError::new(paren, RuntimeErrorKind::NotCallable))?;
                if function.arity() != evaluated_arguments.len() {
                    return Err(RuntimeError::new(
                        paren,
                        RuntimeErrorKind::ArityMismatch {
                            expected: function.arity(),
                            got: evaluated_arguments.len(),
                        },
                    ));
                }
                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(RuntimeError::new(paren, RuntimeErrorKind::StackOverflow));
                }
                self.call_depth += 1;
                let result = function.call(self, evaluated_arguments);
                self.call_depth -= 1;
                result
            }
            Expression::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::new(name, RuntimeErrorKind::NotAnInstance)),
            },
            Expression::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }
                _ => Err(RuntimeError::new(name, RuntimeErrorKind::FieldOnNonInstance)),
            },
            Expression::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method),
        }
    }
}

impl<'o> Visitor<Statement, ExecResult> for Interpreter<'o> {
    fn visit(&mut self, stmt: &Statement) -> ExecResult {
        match stmt {
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Statement::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                Ok(Flow::Normal)
            }
            Statement::Var { name, initializer } => {
                let value = match initializer {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Flow::Normal)
            }
            Statement::Block(statements) => {
                let environment = self.environment.new_child();
                self.execute_block(statements, environment)
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(x) = else_branch {
                    self.execute(x)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Function(declaration) => {
                let function =
                    LoxFunction::new(Rc::clone(declaration), self.environment.clone(), false);
                self.environment
                    .define(&declaration.name.lexeme, Value::Function(function));
                Ok(Flow::Normal)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                self.class_declaration(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
        }
    }
}

impl<'o> Interpreter<'o> {
    /// An interpreter writing `print` output to `out`, with the natives
    /// already defined as globals.
    pub fn new(out: &'o mut dyn Write) -> Interpreter<'o> {
        let globals = Environment::new();
        for native in natives() {
            globals.define(native.name, Value::NativeFunction(native));
        }
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: Locals::new(),
            call_depth: 0,
            out,
        }
    }
    /// Records binding distances produced by the resolver. Earlier entries
    /// stay: functions from previous runs still need theirs.
    pub fn resolve(&mut self, locals: Locals) {
        self.locals.extend(locals);
    }
    pub fn globals(&self) -> &Environment {
        &self.globals
    }
    /// Runs a statement list, stopping at the first runtime error.
    pub fn interpret(&mut self, statements: &[Statement]) -> Result<(), RuntimeError> {
        debug!("interpreting {} statements", statements.len());
        for statement in statements {
            self.execute(statement)?;
        }
        self.out.flush()?;
        Ok(())
    }
    /// Executes `statements` in `environment`, then puts the previous
    /// environment back however the block was left.
    pub fn execute_block(&mut self, statements: &[Statement], environment: Environment) -> ExecResult {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.run_statements(statements);
        self.environment = previous;
        result
    }
    fn run_statements(&mut self, statements: &[Statement]) -> ExecResult {
        for statement in statements {
            if let Flow::Return(value) = self.execute(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }
    fn execute(&mut self, stmt: &Statement) -> ExecResult {
        trace!("executing {}", AstPrinter {}.print_statement(stmt));
        stmt.accept(self)
    }
    fn evaluate(&mut self, expr: &Expression) -> EvalResult {
        expr.accept(self)
    }
    fn look_up_variable(&self, id: ExprId, name: &Token) -> EvalResult {
        match self.locals.get(&id) {
            Some(distance) => self.environment.get_at(*distance, name),
            None => self.globals.get(name),
        }
    }
    fn super_method(&self, id: ExprId, keyword: &Token, method: &Token) -> EvalResult {
        let distance = match self.locals.get(&id) {
            Some(distance) if *distance > 0 => *distance,
            _ => {
                return Err(RuntimeError::new(
                    keyword,
                    RuntimeErrorKind::ScopeMismatch {
                        name: keyword.lexeme.clone(),
                        distance: 0,
                    },
                ))
            }
        };
        let superclass = match self.environment.get_at(distance, keyword)? {
            Value::Class(class) => class,
            _ => return Err(RuntimeError::new(keyword, RuntimeErrorKind::SuperclassNotClass)),
        };
        // `this` is always bound one scope inside `super`.
        let instance = match self
            .environment
            .get_at(distance - 1, &Token::synthetic("this"))?
        {
            Value::Instance(instance) => instance,
            _ => return Err(RuntimeError::new(keyword, RuntimeErrorKind::NotAnInstance)),
        };
        superclass
            .find_method(&method.lexeme)
            .map(|m| Value::Function(m.bind(instance)))
            .ok_or_else(|| {
                RuntimeError::new(
                    method,
                    RuntimeErrorKind::UndefinedProperty(method.lexeme.clone()),
                )
            })
    }
    fn class_declaration(
        &mut self,
        name: &Token,
        superclass: Option<&Expression>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), RuntimeError> {
        let superclass = match superclass {
            None => None,
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token = match expr {
                        Expression::Variable { name, .. } => name,
                        _ => name,
                    };
                    return Err(RuntimeError::new(
                        token,
                        RuntimeErrorKind::SuperclassNotClass,
                    ));
                }
            },
        };
        self.environment.define(&name.lexeme, Value::Nil);

        let method_environment = match &superclass {
            Some(class) => {
                let environment = self.environment.new_child();
                environment.define("super", Value::Class(class.clone()));
                environment
            }
            None => self.environment.clone(),
        };
        let mut table = BTreeMap::new();
        for method in methods {
            let function = LoxFunction::new(
                Rc::clone(method),
                method_environment.clone(),
                method.name.lexeme == "init",
            );
            table.insert(method.name.lexeme.clone(), function);
        }
        let class = Class::new(&name.lexeme, superclass, table);
        self.environment.assign(name, Value::Class(class))
    }
}

#[cfg(test)]
mod interpreter_tests {
    use crate::ast::NodeIds;
    use crate::interpreter::{Interpreter, RuntimeError, RuntimeErrorKind};
    use crate::parser;
    use crate::resolver;
    use crate::scanner;

    // Parse errors are deliberately ignored so that trees the driver would
    // refuse can still be evaluated here.
    fn interpret(source: &str) -> (String, Result<(), RuntimeError>) {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let mut ids = NodeIds::new();
        let (statements, _) = parser::parse(&tokens, &mut ids);
        let locals = resolver::resolve(&statements).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let result = {
            let mut interpreter = Interpreter::new(&mut out);
            interpreter.resolve(locals);
            interpreter.interpret(&statements)
        };
        (String::from_utf8(out).unwrap(), result)
    }

    fn output(source: &str) -> String {
        let (out, result) = interpret(source);
        if let Err(e) = result {
            panic!("unexpected runtime error: {}", e);
        }
        out
    }

    fn error(source: &str) -> RuntimeErrorKind {
        interpret(source).1.unwrap_err().kind
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(output("print 1 + 2 * 3;"), "7\n");
        assert_eq!(output("print (1 + 2) * 3;"), "9\n");
        assert_eq!(output("print 6.0;"), "6\n");
        assert_eq!(output("print 7 / 2;"), "3.5\n");
        assert_eq!(output("print -(2 - 5);"), "3\n");
    }

    #[test]
    fn strings_and_equality() {
        assert_eq!(output("print \"a\" + \"b\";"), "ab\n");
        assert_eq!(output("print nil == nil;"), "true\n");
        assert_eq!(output("print nil == false;"), "false\n");
        assert_eq!(output("print 1 == \"1\";"), "false\n");
        assert_eq!(output("print \"x\" != \"y\";"), "true\n");
        assert_eq!(output("print !nil;"), "true\n");
        assert_eq!(output("print !0;"), "false\n");
    }

    #[test]
    fn typed_operand_errors() {
        assert!(matches!(
            error("print 1 - \"a\";"),
            RuntimeErrorKind::OperandsMustBeNumbers(ref op) if op == "-"
        ));
        assert!(matches!(
            error("print 1 + \"a\";"),
            RuntimeErrorKind::InvalidAddition
        ));
        assert!(matches!(
            error("print -\"a\";"),
            RuntimeErrorKind::OperandMustBeNumber(_)
        ));
        assert!(matches!(
            error("print true < 1;"),
            RuntimeErrorKind::OperandsMustBeNumbers(_)
        ));
    }

    #[test]
    fn divide_by_zero() {
        let (out, result) = interpret("print 1 / 0;");
        assert_eq!(out, "");
        assert!(matches!(
            result.unwrap_err().kind,
            RuntimeErrorKind::DivideByZero
        ));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(output("print nil or \"yes\";"), "yes\n");
        assert_eq!(output("print 0 or \"no\";"), "0\n");
        assert_eq!(output("print nil and undefined;"), "nil\n");
        assert_eq!(output("print 1 and 2;"), "2\n");
    }

    #[test]
    fn runtime_error_stops_the_statement_list() {
        let (out, result) = interpret("print 1; print missing; print 2;");
        assert_eq!(out, "1\n");
        let err = result.unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::UndefinedVariable(_)));
        assert_eq!((err.line(), err.column()), (1, 16));
    }

    #[test]
    fn block_restores_environment_after_error() {
        let (tokens, _) = scanner::scan_tokens("var a = 1; { var a = 2; print nope; }");
        let mut ids = NodeIds::new();
        let (statements, _) = parser::parse(&tokens, &mut ids);
        let locals = resolver::resolve(&statements).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);
        interpreter.resolve(locals);
        assert!(interpreter.interpret(&statements).is_err());
        assert!(interpreter.environment.equals(interpreter.globals()));
    }

    #[test]
    fn arity_and_callee_errors() {
        assert!(matches!(
            error("fun f(a) {} f();"),
            RuntimeErrorKind::ArityMismatch {
                expected: 1,
                got: 0
            }
        ));
        assert!(matches!(error("\"str\"();"), RuntimeErrorKind::NotCallable));
        assert!(matches!(error("clock(1);"), RuntimeErrorKind::ArityMismatch { .. }));
    }

    #[test]
    fn excess_arguments_are_dropped() {
        let params = (0..255)
            .map(|i| format!("p{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let args = (0..256)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let source = format!("fun f({}) {{ print p254; }} f({});", params, args);
        assert_eq!(output(&source), "254\n");
    }

    #[test]
    fn functions_and_recursion() {
        assert_eq!(
            output("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"),
            "55\n"
        );
        assert_eq!(output("fun f() {} print f();"), "nil\n");
        assert_eq!(output("fun f() {} print f;"), "<fn f>\n");
        assert_eq!(output("print clock;"), "<native fn>\n");
    }

    #[test]
    fn return_unwinds_through_loops_and_blocks() {
        assert_eq!(
            output("fun f() { while (true) { { return \"out\"; } } } print f();"),
            "out\n"
        );
        assert_eq!(
            output("fun f() { for (var i = 0; ; i = i + 1) if (i == 3) return i; } print f();"),
            "3\n"
        );
    }

    #[test]
    fn resolved_bindings_ignore_later_shadowing() {
        let source = "var a = \"global\"; { fun show() { print a; } show(); var a = \"block\"; show(); }";
        assert_eq!(output(source), "global\nglobal\n");
    }

    #[test]
    fn property_errors_are_distinct() {
        assert!(matches!(
            error("class Foo {} var f = Foo(); print f.nope;"),
            RuntimeErrorKind::UndefinedProperty(_)
        ));
        assert!(matches!(
            error("var x = 1; print x.nope;"),
            RuntimeErrorKind::NotAnInstance
        ));
        assert!(matches!(
            error("var x = 1; x.y = 2;"),
            RuntimeErrorKind::FieldOnNonInstance
        ));
    }

    #[test]
    fn runaway_recursion_is_a_runtime_error() {
        let session = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let (tokens, _) = scanner::scan_tokens("fun f(n) { return f(n + 1); } f(0);");
                let mut ids = NodeIds::new();
                let (statements, _) = parser::parse(&tokens, &mut ids);
                let locals = resolver::resolve(&statements).unwrap();
                let mut out: Vec<u8> = Vec::new();
                let mut interpreter = Interpreter::new(&mut out);
                interpreter.resolve(locals);
                let err = interpreter.interpret(&statements).unwrap_err();
                (err.kind, interpreter.call_depth)
            })
            .unwrap();
        let (kind, depth) = session.join().unwrap();
        assert!(matches!(kind, RuntimeErrorKind::StackOverflow));
        assert_eq!(depth, 0);
    }

    #[test]
    fn superclass_must_be_a_class() {
        assert!(matches!(
            error("var NotAClass = 1; class B < NotAClass {}"),
            RuntimeErrorKind::SuperclassNotClass
        ));
    }

    #[test]
    fn output_formats_for_classes() {
        assert_eq!(
            output("class Foo { bar() {} } print Foo; print Foo(); print Foo().bar;"),
            "Foo\nFoo instance\n<fn bar>\n"
        );
    }
}

fn binary(operator: &Token, lv: Value, rv: Value) -> EvalResult {
    let numbers = |operator: &Token| {
        RuntimeError::new(
            operator,
            RuntimeErrorKind::OperandsMustBeNumbers(operator.lexeme.clone()),
        )
    };
    match operator.tokentype {
        TokenType::EqualEqual => Ok(Value::Boolean(lv.equals(&rv))),
        TokenType::BangEqual => Ok(Value::Boolean(!lv.equals(&rv))),
        TokenType::Plus => match (lv, rv) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => {
                let mut joined = l;
                joined.push_str(r.as_str());
                Ok(Value::String(joined))
            }
            _ => Err(RuntimeError::new(operator, RuntimeErrorKind::InvalidAddition)),
        },
        _ => {
            let (l, r) = match (lv, rv) {
                (Value::Number(l), Value::Number(r)) => (l, r),
                _ => return Err(numbers(operator)),
            };
            match operator.tokentype {
                TokenType::Minus => Ok(Value::Number(l - r)),
                TokenType::Star => Ok(Value::Number(l * r)),
                TokenType::Slash => {
                    if r == 0.0 {
                        Err(RuntimeError::new(operator, RuntimeErrorKind::DivideByZero))
                    } else {
                        Ok(Value::Number(l / r))
                    }
                }
                TokenType::Greater => Ok(Value::Boolean(l > r)),
                TokenType::GreaterEqual => Ok(Value::Boolean(l >= r)),
                TokenType::Less => Ok(Value::Boolean(l < r)),
                TokenType::LessEqual => Ok(Value::Boolean(l <= r)),
                _ => Err(numbers(operator)),
            }
        }
    }
}

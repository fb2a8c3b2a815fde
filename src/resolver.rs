use crate::ast::{ExprId, Expression, FunctionDecl, Statement, Visitor};
use crate::token::Token;
use log::debug;
use std::collections::BTreeMap;
use strum_macros::Display;
use thiserror::Error;

/// Binding distance per variable-reference node. A node with no entry is a
/// global.
pub type Locals = BTreeMap<ExprId, usize>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] Error {location}: {kind}")]
pub struct ResolveError {
    pub line: u32,
    pub column: u32,
    pub location: String,
    pub kind: ResolveErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveErrorKind {
    #[error("Already a variable named '{0}' in this scope.")]
    AlreadyDeclared(String),
    #[error("Can't read local variable in its own initializer.")]
    ReadInOwnInitializer,
    #[error("Can't return from top-level code.")]
    TopLevelReturn,
    #[error("Can't return a value from an initializer.")]
    ReturnFromInitializer,
    #[error("Can't use 'this' outside of a class.")]
    ThisOutsideClass,
    #[error("Can't use 'super' outside of a class.")]
    SuperOutsideClass,
    #[error("Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass,
    #[error("A class can't inherit from itself.")]
    InheritFromSelf,
}

impl ResolveError {
    fn new(token: &Token, kind: ResolveErrorKind) -> ResolveError {
        ResolveError {
            line: token.line,
            column: token.column,
            location: token.location(),
            kind,
        }
    }
}

type ResolveResult = Result<(), ResolveError>;

#[derive(Clone, Copy, Debug, Display)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Static pass computing how many scopes out each local reference lives.
///
/// Each scope maps a name to whether its declaration has finished; a name
/// mapped to `false` is being initialized right now.
pub struct Resolver {
    scopes: Vec<BTreeMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    locals: Locals,
}

/// Resolves a whole program, stopping at the first static error.
pub fn resolve(statements: &[Statement]) -> Result<Locals, ResolveError> {
    let mut resolver = Resolver::new();
    resolver.resolve(statements)?;
    debug!("resolved {} local bindings", resolver.locals.len());
    Ok(resolver.into_locals())
}

impl Visitor<Expression, ResolveResult> for Resolver {
    fn visit(&mut self, expr: &Expression) -> ResolveResult {
        match expr {
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expression::Grouping(expr) => self.resolve_expr(expr),
            Expression::Literal(_) => Ok(()),
            Expression::Unary { right, .. } => self.resolve_expr(right),
            Expression::Variable { id, name } => {
                if let Some(x) = self.scopes.last() {
                    if !x.get(&name.lexeme).cloned().unwrap_or(true) {
                        return Err(ResolveError::new(
                            name,
                            ResolveErrorKind::ReadInOwnInitializer,
                        ));
                    }
                }
                self.resolve_local(*id, name);
                Ok(())
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for argument in arguments {
                    self.resolve_expr(argument)?
                }
                Ok(())
            }
            Expression::Get { object, .. } => self.resolve_expr(object),
            Expression::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)
            }
            Expression::This { id, keyword } => match self.current_class {
                ClassType::None => Err(ResolveError::new(
                    keyword,
                    ResolveErrorKind::ThisOutsideClass,
                )),
                ClassType::Class | ClassType::Subclass => {
                    self.resolve_local(*id, keyword);
                    Ok(())
                }
            },
            Expression::Super { id, keyword, .. } => match self.current_class {
                ClassType::None => Err(ResolveError::new(
                    keyword,
                    ResolveErrorKind::SuperOutsideClass,
                )),
                ClassType::Class => Err(ResolveError::new(
                    keyword,
                    ResolveErrorKind::SuperWithoutSuperclass,
                )),
                ClassType::Subclass => {
                    self.resolve_local(*id, keyword);
                    Ok(())
                }
            },
        }
    }
}

impl Visitor<Statement, ResolveResult> for Resolver {
    fn visit(&mut self, stmt: &Statement) -> ResolveResult {
        match stmt {
            Statement::Print(expr) => self.resolve_expr(expr),
            Statement::Expression(expr) => self.resolve_expr(expr),
            Statement::Var { name, initializer } => {
                self.declare(name)?;
                if let Some(x) = initializer {
                    self.resolve_expr(x)?;
                }
                self.define(name);
                Ok(())
            }
            Statement::Block(stmts) => {
                self.begin_scope();
                let result = self.resolve(stmts);
                self.end_scope();
                result
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(some_else) = else_branch {
                    self.resolve_stmt(some_else)?
                }
                Ok(())
            }
            Statement::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }
            Statement::Function(fun) => {
                self.declare(&fun.name)?;
                self.define(&fun.name);
                self.resolve_function(fun, FunctionType::Function)
            }
            Statement::Return { keyword, value } => match (self.current_function, value) {
                (FunctionType::None, _) => Err(ResolveError::new(
                    keyword,
                    ResolveErrorKind::TopLevelReturn,
                )),
                (_, None) => Ok(()),
                (FunctionType::Initializer, Some(_)) => Err(ResolveError::new(
                    keyword,
                    ResolveErrorKind::ReturnFromInitializer,
                )),
                (_, Some(x)) => self.resolve_expr(x),
            },
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;
                let result = self.resolve_class(name, superclass.as_ref(), methods);
                self.current_class = enclosing_class;
                result
            }
        }
    }
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            locals: Locals::new(),
        }
    }
    pub fn resolve(&mut self, statements: &[Statement]) -> ResolveResult {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }
    pub fn into_locals(self) -> Locals {
        self.locals
    }
    fn resolve_expr(&mut self, expr: &Expression) -> ResolveResult {
        expr.accept(self)
    }
    fn resolve_stmt(&mut self, stmt: &Statement) -> ResolveResult {
        stmt.accept(self)
    }
    fn begin_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }
    fn end_scope(&mut self) {
        self.scopes.pop();
    }
    // Globals are not tracked: redeclaring one at the top level is allowed.
    fn declare(&mut self, name: &Token) -> ResolveResult {
        self.scopes.last_mut().map_or(Ok(()), |scope| {
            match scope.insert(name.lexeme.clone(), false) {
                None => Ok(()),
                Some(_) => Err(ResolveError::new(
                    name,
                    ResolveErrorKind::AlreadyDeclared(name.lexeme.clone()),
                )),
            }
        })
    }
    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
    fn define_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (i, cur_scope) in self.scopes.iter().enumerate().rev() {
            if cur_scope.contains_key(&name.lexeme) {
                self.locals.insert(id, self.scopes.len() - 1 - i);
                return;
            }
        }
    }
    fn resolve_function(&mut self, function: &FunctionDecl, fn_type: FunctionType) -> ResolveResult {
        let enclosing_fn = self.current_function;
        self.current_function = fn_type;
        debug!("resolving {} '{}'", fn_type, function.name.lexeme);
        self.begin_scope();
        let mut result = Ok(());
        for param in function.params.iter() {
            result = self.declare(param);
            if result.is_err() {
                break;
            }
            self.define(param);
        }
        if result.is_ok() {
            result = self.resolve(&function.body);
        }
        self.end_scope();
        self.current_function = enclosing_fn;
        result
    }
    // Method closures sit inside a scope binding `super` (subclasses only)
    // and, when bound, a scope binding `this`. Mirror both here.
    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expression>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) -> ResolveResult {
        self.declare(name)?;
        self.define(name);
        if let Some(superclass) = superclass {
            if let Expression::Variable {
                name: superclass_name,
                ..
            } = superclass
            {
                if superclass_name.lexeme == name.lexeme {
                    return Err(ResolveError::new(
                        superclass_name,
                        ResolveErrorKind::InheritFromSelf,
                    ));
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass)?;
            self.begin_scope();
            self.define_implicit("super");
        }
        self.begin_scope();
        self.define_implicit("this");
        let mut result = Ok(());
        for method in methods {
            let function_type = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            result = self.resolve_function(method, function_type);
            if result.is_err() {
                break;
            }
        }
        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }
        result
    }
}

#[cfg(test)]
mod resolver_tests {
    use crate::ast::{Expression, NodeIds, Statement};
    use crate::parser;
    use crate::resolver::{self, Locals, ResolveError, ResolveErrorKind};
    use crate::scanner;

    fn resolve(source: &str) -> (Vec<Statement>, Result<Locals, ResolveError>) {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty());
        let mut ids = NodeIds::new();
        let (statements, errors) = parser::parse(&tokens, &mut ids);
        assert!(errors.is_empty(), "{:?}", errors);
        let result = resolver::resolve(&statements);
        (statements, result)
    }

    fn expect_error(source: &str, expected_error: ResolveErrorKind) {
        let (_, result) = resolve(source);
        match result {
            Err(err) => assert_eq!(err.kind, expected_error),
            Ok(_) => panic!("expected {:?} for {}", expected_error, source),
        }
    }

    #[test]
    fn variable_referenced_in_initializer() {
        expect_error("{ var a = a; }", ResolveErrorKind::ReadInOwnInitializer);
    }

    #[test]
    fn multiple_declarations() {
        expect_error(
            "{ var a = 1; var a = 2; }",
            ResolveErrorKind::AlreadyDeclared("a".to_string()),
        );
    }

    #[test]
    fn duplicate_parameters() {
        expect_error(
            "fun f(a, a) {}",
            ResolveErrorKind::AlreadyDeclared("a".to_string()),
        );
    }

    #[test]
    fn top_level_return() {
        expect_error("return 1;", ResolveErrorKind::TopLevelReturn);
    }

    #[test]
    fn return_value_from_initializer() {
        expect_error(
            "class A { init() { return 1; } }",
            ResolveErrorKind::ReturnFromInitializer,
        );
        let (_, result) = resolve("class A { init() { return; } }");
        assert!(result.is_ok());
    }

    #[test]
    fn this_and_super_outside_classes() {
        expect_error("print this;", ResolveErrorKind::ThisOutsideClass);
        expect_error("fun f() { this; }", ResolveErrorKind::ThisOutsideClass);
        expect_error("super.m();", ResolveErrorKind::SuperOutsideClass);
        expect_error(
            "class A { m() { super.m(); } }",
            ResolveErrorKind::SuperWithoutSuperclass,
        );
        expect_error("class A < A {}", ResolveErrorKind::InheritFromSelf);
    }

    #[test]
    fn error_carries_position() {
        let (_, result) = resolve("{\n  var x = 1;\n  var x = 2;\n}");
        let err = result.unwrap_err();
        assert_eq!((err.line, err.column), (3, 7));
        assert_eq!(
            err.to_string(),
            "[line 3:7] Error at 'x': Already a variable named 'x' in this scope."
        );
    }

    #[test]
    fn globals_have_no_entry_and_may_be_redeclared() {
        let (statements, result) = resolve("var a = 1; var a = 2; print a;");
        let locals = result.unwrap();
        assert!(locals.is_empty());
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn distances_count_enclosing_scopes() {
        let (statements, result) = resolve("{ var a = 1; { { print a; } } }");
        let locals = result.unwrap();
        let reference = match &statements[0] {
            Statement::Block(outer) => match &outer[1] {
                Statement::Block(middle) => match &middle[0] {
                    Statement::Block(inner) => match &inner[0] {
                        Statement::Print(Expression::Variable { id, .. }) => *id,
                        other => panic!("unexpected {:?}", other),
                    },
                    other => panic!("unexpected {:?}", other),
                },
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(locals.get(&reference), Some(&2));
    }

    #[test]
    fn method_bodies_see_this_one_scope_out() {
        let (_, result) = resolve("class A { m(x) { return this; } }");
        let locals = result.unwrap();
        // `this` is the only local reference; the parameter scope sits between.
        assert_eq!(locals.values().cloned().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn super_sits_outside_this() {
        let (_, result) = resolve("class A {} class B < A { m() { return super.m; } }");
        let locals = result.unwrap();
        assert_eq!(locals.values().cloned().collect::<Vec<_>>(), vec![2]);
    }
}

use super::token::Token;
use std::fmt;
use std::fmt::Formatter;
use std::rc::Rc;

/// Identity of an expression node that refers to a binding.
///
/// Two textually identical references at different places in the source get
/// different ids, so the resolver can key its binding-distance table by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(usize);

/// Hands out `ExprId`s. One generator lives as long as the session, so ids
/// stay unique across every piece of source parsed into it.
#[derive(Debug, Default)]
pub struct NodeIds {
    next: usize,
}

impl NodeIds {
    pub fn new() -> NodeIds {
        NodeIds { next: 0 }
    }
    pub fn fresh(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Nil => write!(f, "nil"),
            LiteralValue::Boolean(x) => write!(f, "{}", x),
            LiteralValue::Number(x) => write!(f, "{}", x),
            LiteralValue::String(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug)]
pub enum Expression {
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        paren: Token,
        arguments: Vec<Expression>,
    },
    Get {
        object: Box<Expression>,
        name: Token,
    },
    Grouping(Box<Expression>),
    Literal(LiteralValue),
    Logical {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Set {
        object: Box<Expression>,
        name: Token,
        value: Box<Expression>,
    },
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    Unary {
        operator: Token,
        right: Box<Expression>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
}

pub trait Visitor<T, Output> {
    fn visit(&mut self, n: &T) -> Output;
}

impl Expression {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Expression, T>) -> T {
        v.visit(self)
    }
}

/// A function or method declaration. Shared between the tree and every
/// function value created from it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    Block(Vec<Statement>),
    Class {
        name: Token,
        superclass: Option<Expression>,
        methods: Vec<Rc<FunctionDecl>>,
    },
    Expression(Expression),
    Function(Rc<FunctionDecl>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    Print(Expression),
    Return {
        keyword: Token,
        value: Option<Expression>,
    },
    Var {
        name: Token,
        initializer: Option<Expression>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
}

impl Statement {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Statement, T>) -> T {
        v.visit(self)
    }
}

/// Renders expressions as parenthesized prefix text. Debugging aid only.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print(&mut self, expr: &Expression) -> String {
        expr.accept(self)
    }
    pub fn print_statement(&mut self, stmt: &Statement) -> String {
        stmt.accept(self)
    }
    fn block(&mut self, name: &str, statements: &[Statement]) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for stmt in statements {
            x.push_str(" ");
            x.push_str(stmt.accept(self).as_str());
        }
        x.push_str(")");
        x
    }
    fn function(&mut self, keyword: &str, decl: &FunctionDecl) -> String {
        let params = decl
            .params
            .iter()
            .map(|p| p.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let header = format!("{} {} ({})", keyword, decl.name.lexeme, params);
        self.block(&header, &decl.body)
    }
    fn parenthesize(&mut self, name: &str, args: Vec<&Expression>) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for arg in args {
            x.push_str(" ");
            x.push_str(arg.accept(self).as_str());
        }
        x.push_str(")");
        x
    }
}

impl Visitor<Expression, String> for AstPrinter {
    fn visit(&mut self, n: &Expression) -> String {
        match n {
            Expression::Binary {
                left,
                operator,
                right,
            }
            | Expression::Logical {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Grouping(x) => self.parenthesize("group", vec![x.as_ref()]),
            Expression::Literal(x) => match x {
                LiteralValue::String(y) => format!("\"{}\"", y),
                _ => x.to_string(),
            },
            Expression::Unary { operator, right } => {
                self.parenthesize(&operator.lexeme, vec![right.as_ref()])
            }
            Expression::Variable { name, .. } => name.lexeme.clone(),
            Expression::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, value.accept(self))
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                let mut args = vec![callee.as_ref()];
                args.extend(arguments.iter());
                self.parenthesize("call", args)
            }
            Expression::Get { object, name } => {
                format!("(. {} {})", object.accept(self), name.lexeme)
            }
            Expression::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                object.accept(self),
                name.lexeme,
                value.accept(self)
            ),
            Expression::This { .. } => "this".to_string(),
            Expression::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }
}

impl Visitor<Statement, String> for AstPrinter {
    fn visit(&mut self, n: &Statement) -> String {
        match n {
            Statement::Block(statements) => self.block("block", statements),
            Statement::Class {
                name,
                superclass,
                methods,
            } => {
                let mut x = format!("(class {}", name.lexeme);
                if let Some(superclass) = superclass {
                    x.push_str(&format!(" < {}", superclass.accept(self)));
                }
                for method in methods {
                    x.push_str(" ");
                    x.push_str(&self.function("method", method));
                }
                x.push_str(")");
                x
            }
            Statement::Expression(expr) => format!("(; {})", expr.accept(self)),
            Statement::Function(decl) => self.function("fun", decl),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    condition.accept(self),
                    then_branch.accept(self),
                    else_branch.accept(self)
                ),
                None => format!(
                    "(if {} {})",
                    condition.accept(self),
                    then_branch.accept(self)
                ),
            },
            Statement::Print(expr) => self.parenthesize("print", vec![expr]),
            Statement::Return { value, .. } => match value {
                Some(x) => self.parenthesize("return", vec![x]),
                None => "(return)".to_string(),
            },
            Statement::Var { name, initializer } => match initializer {
                Some(x) => format!("(var {} {})", name.lexeme, x.accept(self)),
                None => format!("(var {})", name.lexeme),
            },
            Statement::While { condition, body } => format!(
                "(while {} {})",
                condition.accept(self),
                body.accept(self)
            ),
        }
    }
}

#[cfg(test)]
mod ast_tests {
    use crate::ast::{AstPrinter, Expression, LiteralValue, NodeIds, Statement};
    use crate::token::{Token, TokenType};

    #[test]
    fn basic_ast_test() {
        let expression = Expression::Binary {
            left: Box::new(Expression::Unary {
                operator: Token::new(TokenType::Minus, "-", 1, 1),
                right: Box::new(Expression::Literal(LiteralValue::Number(123.0))),
            }),
            operator: Token::new(TokenType::Star, "*", 1, 6),
            right: Box::new(Expression::Grouping(Box::new(Expression::Literal(
                LiteralValue::Number(45.67),
            )))),
        };
        let mut visitor = AstPrinter {};
        assert_eq!(visitor.print(&expression), "(* (- 123) (group 45.67))");
    }

    #[test]
    fn prints_property_assignment_and_calls() {
        let mut ids = NodeIds::new();
        let expression = Expression::Set {
            object: Box::new(Expression::Variable {
                id: ids.fresh(),
                name: Token::new(TokenType::Identifier, "point", 1, 1),
            }),
            name: Token::new(TokenType::Identifier, "x", 1, 7),
            value: Box::new(Expression::Call {
                callee: Box::new(Expression::Variable {
                    id: ids.fresh(),
                    name: Token::new(TokenType::Identifier, "f", 1, 11),
                }),
                paren: Token::new(TokenType::RightParen, ")", 1, 16),
                arguments: vec![
                    Expression::Literal(LiteralValue::String("a".to_string())),
                    Expression::Literal(LiteralValue::Nil),
                ],
            }),
        };
        let mut visitor = AstPrinter {};
        assert_eq!(
            visitor.print(&expression),
            "(= (. point x) (call f \"a\" nil))"
        );
    }

    #[test]
    fn node_ids_are_distinct() {
        let mut ids = NodeIds::new();
        let a = ids.fresh();
        let b = ids.fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn prints_statements() {
        let stmt = Statement::If {
            condition: Expression::Literal(LiteralValue::Boolean(true)),
            then_branch: Box::new(Statement::Print(Expression::Literal(
                LiteralValue::Number(1.0),
            ))),
            else_branch: Some(Box::new(Statement::Block(vec![Statement::Var {
                name: Token::new(TokenType::Identifier, "a", 1, 20),
                initializer: None,
            }]))),
        };
        let mut visitor = AstPrinter {};
        assert_eq!(
            visitor.print_statement(&stmt),
            "(if true (print 1) (block (var a)))"
        );
    }
}

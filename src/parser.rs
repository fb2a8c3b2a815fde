use super::ast::{Expression, FunctionDecl, LiteralValue, NodeIds, Statement};
use super::token::{Literal, Token, TokenType};
use log::debug;
use std::rc::Rc;
use thiserror::Error;

/// Calls and declarations accept at most this many arguments / parameters.
pub const MAX_ARGUMENTS: usize = 255;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] Error {location}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub location: String,
    pub message: String,
}

impl ParseError {
    fn at(token: &Token, message: &str) -> ParseError {
        ParseError {
            line: token.line,
            column: token.column,
            location: token.location(),
            message: message.to_string(),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    ids: &'a mut NodeIds,
    errors: Vec<ParseError>,
}

/// Parses a whole program. Syntax errors are collected rather than returned
/// one at a time: after each one the parser skips to the next statement
/// boundary and carries on, so the statement list holds everything that did
/// parse.
pub fn parse(tokens: &[Token], ids: &mut NodeIds) -> (Vec<Statement>, Vec<ParseError>) {
    let mut parser = Parser::new(tokens, ids);
    let statements = parser.parse();
    debug!(
        "parsed {} statements with {} errors",
        statements.len(),
        parser.errors.len()
    );
    (statements, parser.errors)
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], ids: &'a mut NodeIds) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            ids,
            errors: Vec::new(),
        }
    }
    pub fn parse(&mut self) -> Vec<Statement> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }
    fn declaration(&mut self) -> Option<Statement> {
        let result = match self.peek().tokentype {
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            TokenType::Fun => {
                self.advance();
                self.function("function").map(Statement::Function)
            }
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            _ => self.statement(),
        };
        match result {
            Ok(statement) => Some(statement),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }
    fn class_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if self.next_if(TokenType::Less) {
            let superclass_name =
                self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expression::Variable {
                id: self.ids.fresh(),
                name: superclass_name,
            })
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Statement::Class {
            name,
            superclass,
            methods,
        })
    }
    fn function(&mut self, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() == MAX_ARGUMENTS {
                    let e = self.error("Can't have more than 255 parameters.");
                    self.errors.push(e);
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.next_if(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }
    fn var_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.next_if(TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                self.advance();
                self.print_statement()
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block()?))
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            _ => self.expression_statement(),
        }
    }
    // A for loop has no node of its own: it becomes a while loop, wrapped in
    // a block when there is an initializer.
    fn for_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer: Option<Statement> = match self.peek().tokentype {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        let condition = match self.peek().tokentype {
            TokenType::Semicolon => Expression::Literal(LiteralValue::Boolean(true)),
            _ => self.expression()?,
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment: Option<Expression> = match self.peek().tokentype {
            TokenType::RightParen => None,
            _ => Some(self.expression()?),
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(x) = increment {
            body = Statement::Block(vec![body, Statement::Expression(x)])
        }
        body = Statement::While {
            condition,
            body: Box::new(body),
        };
        match initializer {
            None => Ok(body),
            Some(x) => Ok(Statement::Block(vec![x, body])),
        }
    }
    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }
    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = match self.peek().tokentype {
            TokenType::Else => {
                self.advance();
                Some(Box::new(self.statement()?))
            }
            _ => None,
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }
    fn block(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn print_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Statement::Print(expr))
    }
    fn return_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = match self.peek().tokentype {
            TokenType::Semicolon => None,
            _ => Some(self.expression()?),
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }
    fn expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    fn expression(&mut self) -> ParseResult<Expression> {
        self.assignment()
    }
    fn assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.or()?;
        match self.peek().tokentype {
            TokenType::Equal => {
                let equals = self.advance().clone();
                let value = Box::new(self.assignment()?);
                match expr {
                    Expression::Variable { id, name } => Ok(Expression::Assign { id, name, value }),
                    Expression::Get { object, name } => Ok(Expression::Set {
                        object,
                        name,
                        value,
                    }),
                    _ => {
                        // Reported, but the parser is not confused: no need to synchronize.
                        self.errors
                            .push(ParseError::at(&equals, "Invalid assignment target."));
                        Ok(expr)
                    }
                }
            }
            _ => Ok(expr),
        }
    }
    fn or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.and()?;
        while let TokenType::Or = self.peek().tokentype {
            let operator = self.advance().clone();
            let right = self.and()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.equality()?;
        while let TokenType::And = self.peek().tokentype {
            let operator = self.advance().clone();
            let right = self.equality()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn equality(&mut self) -> ParseResult<Expression> {
        let mut expr = self.comparison()?;
        loop {
            match self.peek().tokentype {
                TokenType::BangEqual | TokenType::EqualEqual => {
                    let operator = self.advance().clone();
                    let right = self.comparison()?;
                    expr = Expression::Binary {
                        left: Box::new(expr),
                        operator,
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn comparison(&mut self) -> ParseResult<Expression> {
        let mut expr = self.addition()?;
        loop {
            match self.peek().tokentype {
                TokenType::Greater
                | TokenType::GreaterEqual
                | TokenType::Less
                | TokenType::LessEqual => {
                    let operator = self.advance().clone();
                    let right = self.addition()?;
                    expr = Expression::Binary {
                        left: Box::new(expr),
                        operator,
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn addition(&mut self) -> ParseResult<Expression> {
        let mut expr = self.multiplication()?;
        loop {
            match self.peek().tokentype {
                TokenType::Minus | TokenType::Plus => {
                    let operator = self.advance().clone();
                    let right = self.multiplication()?;
                    expr = Expression::Binary {
                        left: Box::new(expr),
                        operator,
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn multiplication(&mut self) -> ParseResult<Expression> {
        let mut expr = self.unary()?;
        loop {
            match self.peek().tokentype {
                TokenType::Slash | TokenType::Star => {
                    let operator = self.advance().clone();
                    let right = self.unary()?;
                    expr = Expression::Binary {
                        left: Box::new(expr),
                        operator,
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression> {
        match self.peek().tokentype {
            TokenType::Bang | TokenType::Minus => {
                let operator = self.advance().clone();
                let right = self.unary()?;
                Ok(Expression::Unary {
                    operator,
                    right: Box::new(right),
                })
            }
            _ => self.call(),
        }
    }
    fn call(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().tokentype {
                TokenType::LeftParen => {
                    self.advance();
                    expr = self.finish_call(expr)?;
                }
                TokenType::Dot => {
                    self.advance();
                    let name =
                        self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                    expr = Expression::Get {
                        object: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn finish_call(&mut self, callee: Expression) -> ParseResult<Expression> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() == MAX_ARGUMENTS {
                    let e = self.error("Can't have more than 255 arguments.");
                    self.errors.push(e);
                }
                arguments.push(self.expression()?);
                if !self.next_if(TokenType::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expression::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }
    fn primary(&mut self) -> ParseResult<Expression> {
        let token = self.peek();
        let expr = match token.tokentype {
            TokenType::False => Expression::Literal(LiteralValue::Boolean(false)),
            TokenType::True => Expression::Literal(LiteralValue::Boolean(true)),
            TokenType::Nil => Expression::Literal(LiteralValue::Nil),
            TokenType::Number | TokenType::String => match &token.literal {
                Some(Literal::Number(x)) => Expression::Literal(LiteralValue::Number(*x)),
                Some(Literal::String(x)) => Expression::Literal(LiteralValue::String(x.clone())),
                None => return Err(self.error("Expect literal value.")),
            },
            TokenType::Identifier => Expression::Variable {
                id: self.ids.fresh(),
                name: token.clone(),
            },
            TokenType::This => Expression::This {
                id: self.ids.fresh(),
                keyword: token.clone(),
            },
            TokenType::Super => {
                let keyword = self.advance().clone();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method =
                    self.consume(TokenType::Identifier, "Expect superclass method name.")?;
                return Ok(Expression::Super {
                    id: self.ids.fresh(),
                    keyword,
                    method,
                });
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                return Ok(Expression::Grouping(Box::new(expr)));
            }
            _ => return Err(self.error("Expect expression.")),
        };
        self.advance();
        Ok(expr)
    }
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if let TokenType::Semicolon = self.previous().tokentype {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn consume(&mut self, tokentype: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(tokentype) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(message))
        }
    }
    fn next_if(&mut self, tokentype: TokenType) -> bool {
        if self.check(tokentype) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn check(&self, tokentype: TokenType) -> bool {
        self.peek().tokentype == tokentype
    }
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        match self.peek().tokentype {
            TokenType::EOF => true,
            _ => false,
        }
    }
    // The scanner always terminates the stream with EOF, and the parser
    // never moves past it.
    fn peek(&self) -> &'a Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }
    fn previous(&self) -> &'a Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
    fn error(&self, msg: &str) -> ParseError {
        ParseError::at(self.peek(), msg)
    }
}

use std::fmt;
use strum_macros::Display;

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier, String, Number,

    // Keywords.
    And, Class, Else, False, Fun, For, If, Nil, Or,
    Print, Return, Super, This, True, Var, While,

    EOF
}

/// Value carried by string and number tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(x) => write!(f, "{}", x),
            Literal::String(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(tokentype: TokenType, lexeme: &str, line: u32, column: u32) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            literal: None,
            line,
            column,
        }
    }

    /// Synthetic identifier token, used for the implicit `this` and `super` bindings.
    pub fn synthetic(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, 0, 0)
    }

    /// Describes where an error was found, in the form used by diagnostics.
    pub fn location(&self) -> String {
        match self.tokentype {
            TokenType::EOF => "at end".to_string(),
            _ => format!("at '{}'", self.lexeme),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tokentype {
            TokenType::EOF => write!(f, "{}", self.tokentype),
            _ => write!(f, "{} '{}'", self.tokentype, self.lexeme),
        }
    }
}

use crate::token::{Literal, Token, TokenType};
use log::{debug, trace};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] Error: {kind}")]
pub struct ScanError {
    pub line: u32,
    pub column: u32,
    pub kind: ScanErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanErrorKind {
    #[error("Unexpected character '{0}'.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Unterminated block comment.")]
    UnterminatedComment,
    #[error("Expect digit after '.' in number literal '{0}'.")]
    MalformedNumber(String),
}

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    start_line: u32,
    start_column: u32,
    line: u32,
    column: u32,
}

/// Scans the whole source. Errors do not stop the scan; the returned tokens
/// are whatever could be recognized and always end with an EOF token.
pub fn scan_tokens(source: &str) -> (Vec<Token>, Vec<ScanError>) {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        start_line: 1,
        start_column: 1,
        line: 1,
        column: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<ScanError> = Vec::new();

    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        scanner.start_line = scanner.line;
        scanner.start_column = scanner.column;
        match scanner.scan_token() {
            Ok(Some(token)) => {
                trace!("{} at {}:{}", token, token.line, token.column);
                tokens.push(token)
            }
            Ok(None) => (),
            Err(e) => errors.push(e),
        }
    }
    tokens.push(Token::new(TokenType::EOF, "", scanner.line, scanner.column));
    debug!(
        "scanned {} tokens with {} errors",
        tokens.len(),
        errors.len()
    );
    (tokens, errors)
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token>, ScanError> {
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '!' => Ok(Some(self.either('=', TokenType::BangEqual, TokenType::Bang))),
            '=' => Ok(Some(self.either('=', TokenType::EqualEqual, TokenType::Equal))),
            '<' => Ok(Some(self.either('=', TokenType::LessEqual, TokenType::Less))),
            '>' => Ok(Some(self.either('=', TokenType::GreaterEqual, TokenType::Greater))),
            '/' => {
                if self.next_if('/') {
                    while let Some((_, c)) = self.iter.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    Ok(None)
                } else if self.next_if('*') {
                    self.block_comment()
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' | '\n' => Ok(None),
            '"' => Ok(Some(self.string()?)),
            '0'..='9' => self.number(),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier())),
            _ => Err(self.error(ScanErrorKind::UnexpectedCharacter(c))),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn lexeme(&mut self) -> &'a str {
        let current = self.current();
        &self.source[self.start..current]
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        let lexeme = self.lexeme();
        Token::new(token_type, lexeme, self.start_line, self.start_column)
    }
    fn literal_token(&mut self, token_type: TokenType, literal: Literal) -> Token {
        let mut token = self.token(token_type);
        token.literal = Some(literal);
        token
    }
    fn error(&self, kind: ScanErrorKind) -> ScanError {
        ScanError {
            line: self.start_line,
            column: self.start_column,
            kind,
        }
    }
    fn either(&mut self, expected: char, matched: TokenType, otherwise: TokenType) -> Token {
        if self.next_if(expected) {
            self.token(matched)
        } else {
            self.token(otherwise)
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        match self.iter.peek() {
            Some((_, c)) if *c == expected => {
                self.advance();
                true
            }
            _ => false,
        }
    }
    fn peek_is_digit(&mut self) -> bool {
        matches!(self.iter.peek(), Some((_, '0'..='9')))
    }
    // Every newline in the source passes through here, including those
    // inside strings and comments.
    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
    fn block_comment(&mut self) -> Result<Option<Token>, ScanError> {
        while let Some(c) = self.advance() {
            if c == '*' && self.next_if('/') {
                return Ok(None);
            }
        }
        Err(self.error(ScanErrorKind::UnterminatedComment))
    }
    fn string(&mut self) -> Result<Token, ScanError> {
        loop {
            match self.advance() {
                Some('"') => break,
                Some(_) => (),
                None => return Err(self.error(ScanErrorKind::UnterminatedString)),
            }
        }
        let lexeme = self.lexeme();
        let contents = lexeme[1..lexeme.len() - 1].to_string();
        Ok(self.literal_token(TokenType::String, Literal::String(contents)))
    }
    fn number(&mut self) -> Result<Option<Token>, ScanError> {
        while self.peek_is_digit() {
            self.advance();
        }

        if let Some((_, '.')) = self.iter.peek() {
            let mut lookahead = self.iter.clone();
            lookahead.next();
            match lookahead.peek() {
                Some((_, '0'..='9')) => {
                    self.advance();
                    while self.peek_is_digit() {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                    let lexeme = self.lexeme().to_string();
                    return Err(self.error(ScanErrorKind::MalformedNumber(lexeme)));
                }
            }
        }

        let lexeme = self.lexeme();
        match lexeme.parse::<f64>() {
            Ok(x) => Ok(Some(self.literal_token(TokenType::Number, Literal::Number(x)))),
            Err(_) => Err(self.error(ScanErrorKind::MalformedNumber(lexeme.to_string()))),
        }
    }
    fn identifier(&mut self) -> Token {
        while let Some((_, c)) = self.iter.peek() {
            match c {
                '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' => {
                    self.advance();
                }
                _ => {
                    break;
                }
            }
        }
        let lexeme = self.lexeme();
        match KEYWORDS.get(lexeme) {
            None => self.token(TokenType::Identifier),
            Some(x) => self.token(*x),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[cfg(test)]
mod scanner_tests {
    use crate::scanner::{self, ScanErrorKind};
    use crate::token::{Literal, TokenType};

    fn types(source: &str) -> Vec<TokenType> {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty(), "{:?}", errors);
        tokens.iter().map(|t| t.tokentype).collect()
    }

    #[test]
    fn basic_scanner_test() {
        let (tokens, errors) = scanner::scan_tokens("x = 2");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].tokentype, TokenType::Identifier);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[1].tokentype, TokenType::Equal);
        assert_eq!(tokens[2].tokentype, TokenType::Number);
        assert_eq!(tokens[2].literal, Some(Literal::Number(2.0)));
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn tokens_display_their_type() {
        let (tokens, _) = scanner::scan_tokens("var x >= \"s\"");
        let shown: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            shown,
            vec!["Var 'var'", "Identifier 'x'", "GreaterEqual '>='", "String '\"s\"'", "EOF"]
        );
    }

    #[test]
    fn number_parsing() {
        let (tokens, errors) = scanner::scan_tokens("1+2.5");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, Some(Literal::Number(1.0)));
        assert_eq!(tokens[1].tokentype, TokenType::Plus);
        assert_eq!(tokens[2].literal, Some(Literal::Number(2.5)));
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn number_literals_keep_their_magnitude() {
        for source in &["0", "7", "123", "3.25", "0.5", "1000000", "12.125"] {
            let (tokens, errors) = scanner::scan_tokens(source);
            assert!(errors.is_empty());
            let literal = tokens[0].literal.as_ref().unwrap();
            assert_eq!(literal.to_string(), *source);
        }
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            types("! != = == > >= < <="),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            types("class classy fun _x while"),
            vec![
                TokenType::Class,
                TokenType::Identifier,
                TokenType::Fun,
                TokenType::Identifier,
                TokenType::While,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            types("a // rest of line\n/* block\n * / still comment */ b"),
            vec![TokenType::Identifier, TokenType::Identifier, TokenType::EOF]
        );
    }

    #[test]
    fn block_comments_do_not_nest() {
        assert_eq!(
            types("/* outer /* inner */ x"),
            vec![TokenType::Identifier, TokenType::EOF]
        );
    }

    #[test]
    fn tracks_lines_and_columns() {
        let (tokens, _) = scanner::scan_tokens("var a;\n  \"two\nlines\" b");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!(tokens[3].literal, Some(Literal::String("two\nlines".to_string())));
        assert_eq!((tokens[4].line, tokens[4].column), (3, 8));
        let eof = tokens.last().unwrap();
        assert_eq!((eof.line, eof.column), (3, 9));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, errors) = scanner::scan_tokens("print \"oops");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ScanErrorKind::UnterminatedString);
        assert_eq!(errors[0].column, 7);
        assert_eq!(tokens.last().unwrap().tokentype, TokenType::EOF);
    }

    #[test]
    fn unterminated_comment_is_reported() {
        let (_, errors) = scanner::scan_tokens("/* never closed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ScanErrorKind::UnterminatedComment);
    }

    #[test]
    fn trailing_dot_is_malformed() {
        let (_, errors) = scanner::scan_tokens("12.;");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind,
            ScanErrorKind::MalformedNumber("12.".to_string())
        );
    }

    #[test]
    fn unexpected_characters_do_not_stop_scanning() {
        let (tokens, errors) = scanner::scan_tokens("a @ b # c");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ScanErrorKind::UnexpectedCharacter('@'));
        assert_eq!(errors[1].kind, ScanErrorKind::UnexpectedCharacter('#'));
        assert_eq!(tokens.len(), 4);
    }
}

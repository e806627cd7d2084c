//! FILENAME: core/parser/src/lexer.rs
//! PURPOSE: Scans a raw formula string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, number parsing (including exponents), identifiers
//! and multi-character operators like ** // <= >= ==.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % ( ) , < >
//! - Multi char: ** // <= >= ==

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.input.next() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('%') => Token::Percent,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some(',') => Token::Comma,

            // * or **
            Some('*') => self.read_doubled('*', Token::Asterisk, Token::DoubleAsterisk),

            // / or //
            Some('/') => self.read_doubled('/', Token::Slash, Token::DoubleSlash),

            // A lone '=' is not an operator, only '=='
            Some('=') => match self.input.peek() {
                Some('=') => {
                    self.input.next();
                    Token::EqualEqual
                }
                _ => Token::Illegal('='),
            },

            Some('<') => self.read_doubled('=', Token::LessThan, Token::LessEqual),
            Some('>') => self.read_doubled('=', Token::GreaterThan, Token::GreaterEqual),

            // Handle Numbers (starts with digit or dot)
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.read_number(ch),

            // Handle Identifiers (starts with letter or underscore)
            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            // End of input
            None => Token::EOF,

            // Unknown character
            Some(ch) => Token::Illegal(ch),
        }
    }

    /// Collects every remaining token, EOF excluded.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Token::EOF => return tokens,
                token => tokens.push(token),
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    /// Returns `double` if the next char is `second`, consuming it, else `single`.
    fn read_doubled(&mut self, second: char, single: Token, double: Token) -> Token {
        if self.input.peek() == Some(&second) {
            self.input.next();
            double
        } else {
            single
        }
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        // Exponent part: only consumed when digits actually follow, so that
        // "2e" stays a number followed by an identifier.
        if matches!(self.input.peek(), Some('e') | Some('E')) {
            let mut ahead = self.input.clone();
            ahead.next();
            let mut exponent = String::from("e");
            if let Some(&sign) = ahead.peek() {
                if sign == '+' || sign == '-' {
                    exponent.push(sign);
                    ahead.next();
                }
            }
            if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                while let Some(&ch) = ahead.peek() {
                    if !ch.is_ascii_digit() {
                        break;
                    }
                    exponent.push(ch);
                    ahead.next();
                }
                number_str.push_str(&exponent);
                self.input = ahead;
            }
        }

        if let Ok(n) = number_str.parse::<f64>() {
            Token::Number(n)
        } else {
            // Fallback if parsing fails (e.g. just ".")
            Token::Illegal(first_char)
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        // Parameter names are case-sensitive, only the boolean keywords are not.
        match ident.to_lowercase().as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            _ => Token::Identifier(ident),
        }
    }
}

/// Returns true if `ch` can start an identifier.
fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

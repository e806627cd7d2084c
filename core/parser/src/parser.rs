//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds an Expression tree that can be evaluated.
//!
//! GRAMMAR:
//!   expression     --> comparison
//!   comparison     --> additive ( ("==" | "<" | ">" | "<=" | ">=") additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/" | "//" | "%") unary )*
//!   unary          --> ("-" | "+") unary | power
//!   power          --> primary ( "**" unary )?
//!   primary        --> NUMBER | BOOLEAN | IDENTIFIER | function_call | group
//!   group          --> "(" expression ( "," expression )* ")"
//!   function_call  --> IDENTIFIER "(" arguments? ")"
//!   arguments      --> expression ("," expression)*
//!
//! A group with more than one element is a tuple; tuples are only accepted
//! as direct arguments of piecewise.
//!
//! Nesting and tree height are both capped at MAX_DEPTH, so a hostile
//! formula fails with a ParseError instead of exhausting the stack.

use crate::ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator, MAX_DEPTH};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    /// Current nesting of groups, argument lists, signs and exponents.
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            depth: 0,
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?.expr;

        // Ensure we consumed all tokens
        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {}",
                self.current_token
            )));
        }

        check_tuples(&expr, false)?;
        Ok(expr)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    /// Entry point for expression parsing.
    fn parse_expression(&mut self) -> ParseResult<Node> {
        self.parse_comparison()
    }

    /// Enters one level of nested syntax (group, argument list, sign,
    /// exponent). Fails once the nesting passes MAX_DEPTH.
    fn descend(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(too_deep());
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Parses comparison expressions (==, <, >, <=, >=).
    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token {
                Token::EqualEqual => BinaryOperator::Equal,
                Token::LessThan => BinaryOperator::LessThan,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;
            left = Node::binary(left, op, right)?;
        }

        Ok(left)
    }

    /// Parses additive expressions (+ and -).
    fn parse_additive(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = Node::binary(left, op, right)?;
        }

        Ok(left)
    }

    /// Parses multiplicative expressions (*, /, // and %).
    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::DoubleSlash => BinaryOperator::FloorDivide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;
            left = Node::binary(left, op, right)?;
        }

        Ok(left)
    }

    /// Parses unary sign expressions.
    fn parse_unary(&mut self) -> ParseResult<Node> {
        let op = match self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.advance();
        self.descend()?;
        let operand = self.parse_unary()?;
        self.ascend();

        Node::wrap(
            operand.height,
            Expression::UnaryOp {
                op,
                operand: Box::new(operand.expr),
            },
        )
    }

    /// Parses power/exponentiation expressions (**).
    /// The exponent goes through parse_unary, which makes ** right associative.
    fn parse_power(&mut self) -> ParseResult<Node> {
        let left = self.parse_primary()?;

        if self.current_token == Token::DoubleAsterisk {
            self.advance();
            self.descend()?;
            let right = self.parse_unary()?;
            self.ascend();

            return Node::binary(left, BinaryOperator::Power, right);
        }

        Ok(left)
    }

    /// Parses primary expressions (literals, references, function calls, groups).
    fn parse_primary(&mut self) -> ParseResult<Node> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Node::leaf(Expression::Number(n)))
            }

            Token::Boolean(b) => {
                self.advance();
                Ok(Node::leaf(Expression::Boolean(b)))
            }

            Token::Identifier(name) => {
                self.advance();

                if self.current_token == Token::LParen {
                    return self.parse_function_call(name);
                }

                Ok(Node::leaf(match name.as_str() {
                    "pi" => Expression::Number(std::f64::consts::PI),
                    "E" => Expression::Number(std::f64::consts::E),
                    _ => Expression::Identifier(name),
                }))
            }

            Token::LParen => {
                self.advance();
                self.descend()?;
                let first = self.parse_expression()?;

                if self.current_token != Token::Comma {
                    self.expect(Token::RParen)?;
                    self.ascend();
                    return Ok(first);
                }

                let mut items = vec![first];
                while self.current_token == Token::Comma {
                    self.advance();
                    items.push(self.parse_expression()?);
                }
                self.expect(Token::RParen)?;
                self.ascend();

                let (height, items) = Node::unzip(items);
                Node::wrap(height, Expression::Tuple(items))
            }

            // Error cases
            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            token => Err(ParseError::new(format!("Unexpected token: {}", token))),
        }
    }

    /// Parses a function call like max(a, b, 10).
    fn parse_function_call(&mut self, name: String) -> ParseResult<Node> {
        let func = BuiltinFunction::from_name(&name)
            .ok_or_else(|| ParseError::new(format!("Unknown function: {}", name)))?;

        // Consume the '('
        self.advance();
        self.descend()?;

        let mut args = Vec::new();

        if self.current_token != Token::RParen {
            args.push(self.parse_expression()?);

            while self.current_token == Token::Comma {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(Token::RParen)?;
        self.ascend();

        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ParseError::new(format!(
                "Function {} does not accept {} argument(s)",
                func,
                args.len()
            )));
        }

        let (height, args) = Node::unzip(args);
        Node::wrap(height, Expression::FunctionCall { func, args })
    }
}

/// A parsed subtree together with its height. Leaves have height 1.
struct Node {
    expr: Expression,
    height: usize,
}

impl Node {
    fn leaf(expr: Expression) -> Self {
        Node { expr, height: 1 }
    }

    /// Puts `expr` one level above a child of height `child_height`.
    fn wrap(child_height: usize, expr: Expression) -> ParseResult<Self> {
        let height = child_height + 1;
        if height > MAX_DEPTH {
            return Err(too_deep());
        }
        Ok(Node { expr, height })
    }

    fn binary(left: Node, op: BinaryOperator, right: Node) -> ParseResult<Self> {
        Node::wrap(
            left.height.max(right.height),
            Expression::BinaryOp {
                left: Box::new(left.expr),
                op,
                right: Box::new(right.expr),
            },
        )
    }

    /// Splits a node list into the tallest height and the bare expressions.
    fn unzip(nodes: Vec<Node>) -> (usize, Vec<Expression>) {
        let height = nodes.iter().map(|node| node.height).max().unwrap_or(0);
        (height, nodes.into_iter().map(|node| node.expr).collect())
    }
}

fn too_deep() -> ParseError {
    ParseError::new(format!(
        "Expression nested deeper than {} levels",
        MAX_DEPTH
    ))
}

/// Rejects tuples anywhere but as piecewise arguments, and checks the
/// piecewise argument shapes: every argument is a (value, condition) pair
/// except the last one, which may be a bare fallback value.
fn check_tuples(expr: &Expression, tuple_allowed: bool) -> ParseResult<()> {
    match expr {
        Expression::Number(_) | Expression::Boolean(_) | Expression::Identifier(_) => Ok(()),
        Expression::BinaryOp { left, right, .. } => {
            check_tuples(left, false)?;
            check_tuples(right, false)
        }
        Expression::UnaryOp { operand, .. } => check_tuples(operand, false),
        Expression::Tuple(items) => {
            if !tuple_allowed {
                return Err(ParseError::new("Tuples are only allowed as piecewise arguments"));
            }
            if items.len() != 2 {
                return Err(ParseError::new(format!(
                    "A piecewise branch needs exactly (value, condition), got {} elements",
                    items.len()
                )));
            }
            items.iter().try_for_each(|item| check_tuples(item, false))
        }
        Expression::FunctionCall { func, args } => {
            let is_piecewise = *func == BuiltinFunction::Piecewise;
            for (i, arg) in args.iter().enumerate() {
                let is_last = i + 1 == args.len();
                if is_piecewise && !is_last && !matches!(arg, Expression::Tuple(_)) {
                    return Err(ParseError::new(
                        "Only the last piecewise argument may be a bare fallback value",
                    ));
                }
                check_tuples(arg, is_piecewise)?;
            }
            Ok(())
        }
    }
}

/// Convenience function to parse a formula string directly.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}

//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the parameter formula parser.
//! CONTEXT: This module exposes the grammar validator, lexer, parser, and
//! AST components needed to convert formula strings into evaluatable
//! expression trees.
//!
//! PIPELINE: Formula String --> Grammar check --> Lexer --> Tokens --> Parser --> AST
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, // (floor division), % (modulo), ** (power)
//! - Comparison: ==, <, >, <=, >=
//! - Parameter references: cuda_core, architecture_Pascal
//! - Allow-listed function calls: sqrt(x), max(a, b), piecewise((1, c), (0, true))
//! - Parentheses for grouping
//! - Unary sign: -5, +x

pub mod ast;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod token;

// Register the separate tests module
#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use ast::{
    BinaryOperator, BuiltinFunction, Expression, UnaryOperator, FUNCTION_SET_VERSION, MAX_DEPTH,
};
pub use grammar::{check_formula, is_valid_formula, GrammarError, TokenKind};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser};
pub use token::Token;

//! FILENAME: core/parser/src/grammar.rs
//! PURPOSE: Lexical and grammar validation of formula strings.
//! CONTEXT: Runs before the recursive descent parser. The string is cut
//! left-to-right with an ordered list of token patterns, and every
//! non-whitespace token is checked against the set of token kinds allowed
//! to immediately precede it. Function identifiers must belong to the
//! builtin allow-list.
//!
//! PREDECESSOR GRAMMAR:
//!   identifier, function id, number --> operator | "(" | ","
//!   "("                             --> operator | identifier | "(" | "," | function id
//!   ")", ",", operator              --> number | identifier | ")"
//!
//! The first token has no predecessor. A "+" or "-" in prefix position
//! (first token, or after "(", "," or another operator) is a sign.
//!
//! Open parentheses and runs of consecutive signs are limited to MAX_DEPTH.

use crate::ast::{BuiltinFunction, MAX_DEPTH};
use once_cell::sync::Lazy;
use regex::Regex;

/// Token kinds recognized by the validator, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    FunctionId,
    Identifier,
    Number,
    LParen,
    RParen,
    Operator,
    Comma,
    Whitespace,
}

impl TokenKind {
    /// Token kinds allowed to immediately precede this one.
    pub fn allowed_predecessors(self) -> &'static [TokenKind] {
        use TokenKind::*;
        match self {
            FunctionId | Identifier | Number => &[Operator, LParen, Comma],
            LParen => &[Operator, Identifier, LParen, Comma, FunctionId],
            RParen | Comma | Operator => &[Number, Identifier, RParen],
            Whitespace => &[],
        }
    }

    /// Whether a formula may end on this token kind.
    fn can_end(self) -> bool {
        matches!(self, TokenKind::Number | TokenKind::Identifier | TokenKind::RParen)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TokenKind::FunctionId => "function",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Operator => "operator",
            TokenKind::Comma => "','",
            TokenKind::Whitespace => "whitespace",
        };
        write!(f, "{}", label)
    }
}

/// Why a formula string was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
    Empty,
    UnexpectedCharacter { position: usize, found: char },
    UnexpectedToken {
        position: usize,
        token: String,
        after: TokenKind,
    },
    UnexpectedEnd { last: TokenKind },
    UnbalancedParentheses,
    UnknownFunction(String),
    /// More than MAX_DEPTH open parentheses or consecutive signs.
    TooDeep { position: usize },
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarError::Empty => write!(f, "empty expression"),
            GrammarError::UnexpectedCharacter { position, found } => {
                write!(f, "unexpected character '{}' at position {}", found, position)
            }
            GrammarError::UnexpectedToken {
                position,
                token,
                after,
            } => write!(
                f,
                "'{}' at position {} cannot follow a {}",
                token, position, after
            ),
            GrammarError::UnexpectedEnd { last } => {
                write!(f, "expression cannot end with a {}", last)
            }
            GrammarError::UnbalancedParentheses => write!(f, "unbalanced parentheses"),
            GrammarError::UnknownFunction(name) => {
                write!(f, "function '{}' is not allowed", name)
            }
            GrammarError::TooDeep { position } => write!(
                f,
                "expression nested deeper than {} levels at position {}",
                MAX_DEPTH, position
            ),
        }
    }
}

impl std::error::Error for GrammarError {}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("static identifier pattern"));

/// Ordered patterns for everything but identifiers, which need the
/// function-id lookahead and are matched first.
static TOKEN_PATTERNS: Lazy<Vec<(TokenKind, Regex)>> = Lazy::new(|| {
    [
        (
            TokenKind::Number,
            r"^(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?",
        ),
        (TokenKind::LParen, r"^\("),
        (TokenKind::RParen, r"^\)"),
        (TokenKind::Operator, r"^(?:\*\*|\*|//|/|%|\+|-|<=|>=|<|>|==)"),
        (TokenKind::Comma, r"^,"),
        (TokenKind::Whitespace, r"^\s+"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("static token pattern")))
    .collect()
});

/// Matches the token at the start of `rest`, returning its kind and byte length.
fn match_token(rest: &str) -> Option<(TokenKind, usize)> {
    if let Some(m) = IDENTIFIER.find(rest) {
        let kind = if rest[m.end()..].starts_with('(') {
            TokenKind::FunctionId
        } else {
            TokenKind::Identifier
        };
        return Some((kind, m.end()));
    }

    TOKEN_PATTERNS
        .iter()
        .find_map(|(kind, re)| re.find(rest).map(|m| (*kind, m.end())))
}

fn is_sign(lexeme: &str) -> bool {
    lexeme == "+" || lexeme == "-"
}

/// Validates a formula and explains the first violation found.
pub fn check_formula(text: &str) -> Result<(), GrammarError> {
    if text.trim().is_empty() {
        return Err(GrammarError::Empty);
    }

    let mut position = 0;
    let mut previous: Option<TokenKind> = None;
    let mut depth: i64 = 0;
    let mut sign_run = 0;
    let mut function_names = Vec::new();

    while position < text.len() {
        let rest = &text[position..];
        let (kind, len) = match match_token(rest) {
            Some(found) => found,
            None => {
                return Err(GrammarError::UnexpectedCharacter {
                    position,
                    found: rest.chars().next().unwrap_or_default(),
                })
            }
        };
        let lexeme = &rest[..len];

        if kind == TokenKind::Whitespace {
            position += len;
            continue;
        }

        let prefix_sign = kind == TokenKind::Operator
            && is_sign(lexeme)
            && previous.map_or(true, |prev| {
                matches!(
                    prev,
                    TokenKind::LParen | TokenKind::Comma | TokenKind::Operator
                )
            });

        if let Some(prev) = previous {
            if !prefix_sign && !kind.allowed_predecessors().contains(&prev) {
                return Err(GrammarError::UnexpectedToken {
                    position,
                    token: lexeme.to_string(),
                    after: prev,
                });
            }
        }

        if prefix_sign {
            sign_run += 1;
            if sign_run > MAX_DEPTH {
                return Err(GrammarError::TooDeep { position });
            }
        } else {
            sign_run = 0;
        }

        match kind {
            TokenKind::LParen => {
                depth += 1;
                if depth > MAX_DEPTH as i64 {
                    return Err(GrammarError::TooDeep { position });
                }
            }
            TokenKind::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(GrammarError::UnbalancedParentheses);
                }
            }
            TokenKind::FunctionId => function_names.push(lexeme),
            _ => {}
        }

        previous = Some(kind);
        position += len;
    }

    if depth != 0 {
        return Err(GrammarError::UnbalancedParentheses);
    }

    if let Some(last) = previous {
        if !last.can_end() {
            return Err(GrammarError::UnexpectedEnd { last });
        }
    }

    match function_names
        .into_iter()
        .find(|name| BuiltinFunction::from_name(name).is_none())
    {
        Some(name) => Err(GrammarError::UnknownFunction(name.to_string())),
        None => Ok(()),
    }
}

/// Returns true if `text` is a well-formed formula over allow-listed functions.
pub fn is_valid_formula(text: &str) -> bool {
    check_formula(text).is_ok()
}

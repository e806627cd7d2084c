//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for parameter formulas.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. The engine's evaluator then
//! traverses this tree with the values of the referenced parameters.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: Numbers, Booleans (true/false), named constants (pi, E)
//! - Parameter references: cuda_core, architecture_Pascal
//! - Binary operations: + - * / // % ** < <= > >= ==
//! - Unary operations: - and + (sign)
//! - Function calls from the builtin allow-list: sqrt(x), max(a, b)
//! - Tuples, only as piecewise arguments: piecewise((1, c), (0, true))

use std::collections::BTreeSet;

/// Version of the builtin function allow-list. Bump whenever a function is
/// added to or removed from [`BuiltinFunction::ALL`].
pub const FUNCTION_SET_VERSION: u32 = 1;

/// Deepest nesting a formula may have: parentheses, sign runs, and the
/// height of the expression tree are all capped at this value so that
/// every recursive walk over the tree stays within a small stack.
pub const MAX_DEPTH: usize = 256;

/// Represents a parsed formula expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(f64),

    Boolean(bool),

    /// A reference to another parameter or to a derived enum flag.
    Identifier(String),

    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A call to an allow-listed builtin, resolved at parse time.
    FunctionCall {
        func: BuiltinFunction,
        args: Vec<Expression>,
    },

    /// A parenthesized, comma separated group: (value, condition).
    Tuple(Vec<Expression>),
}

impl Expression {
    /// Returns the names of every parameter referenced by this expression.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, symbols: &mut BTreeSet<String>) {
        match self {
            Expression::Number(_) | Expression::Boolean(_) => {}
            Expression::Identifier(name) => {
                symbols.insert(name.clone());
            }
            Expression::BinaryOp { left, right, .. } => {
                left.collect_symbols(symbols);
                right.collect_symbols(symbols);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_symbols(symbols),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_symbols(symbols);
                }
            }
            Expression::Tuple(items) => {
                for item in items {
                    item.collect_symbols(symbols);
                }
            }
        }
    }
}

/// Binary operators for expressions.
/// Listed in order of precedence groups (comparison is lowest).
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    // Comparison operators (lowest precedence)
    Equal,        // ==
    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    // Arithmetic operators
    Add,         // +
    Subtract,    // -
    Multiply,    // *
    Divide,      // /
    FloorDivide, // //
    Modulo,      // %
    Power,       // ** (highest precedence among binary ops)
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
    Plus,   // +
}

/// Builtin functions a formula may call. Anything else is rejected by
/// both the grammar validator and the parser.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BuiltinFunction {
    Abs,
    Sign,
    Sqrt,
    Cbrt,
    Exp,
    Ln,
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Floor,
    Ceil,
    Round,
    Trunc,
    Min,
    Max,
    Pow,
    Hypot,
    /// piecewise((value, condition), ..., [fallback])
    Piecewise,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 28] = [
        BuiltinFunction::Abs,
        BuiltinFunction::Sign,
        BuiltinFunction::Sqrt,
        BuiltinFunction::Cbrt,
        BuiltinFunction::Exp,
        BuiltinFunction::Ln,
        BuiltinFunction::Log,
        BuiltinFunction::Log10,
        BuiltinFunction::Log2,
        BuiltinFunction::Sin,
        BuiltinFunction::Cos,
        BuiltinFunction::Tan,
        BuiltinFunction::Asin,
        BuiltinFunction::Acos,
        BuiltinFunction::Atan,
        BuiltinFunction::Atan2,
        BuiltinFunction::Sinh,
        BuiltinFunction::Cosh,
        BuiltinFunction::Tanh,
        BuiltinFunction::Floor,
        BuiltinFunction::Ceil,
        BuiltinFunction::Round,
        BuiltinFunction::Trunc,
        BuiltinFunction::Min,
        BuiltinFunction::Max,
        BuiltinFunction::Pow,
        BuiltinFunction::Hypot,
        BuiltinFunction::Piecewise,
    ];

    /// Resolves a function name, case-insensitively. `ceiling` is accepted
    /// as an alias of `ceil`.
    pub fn from_name(name: &str) -> Option<BuiltinFunction> {
        let lower = name.to_lowercase();
        if lower == "ceiling" {
            return Some(BuiltinFunction::Ceil);
        }
        BuiltinFunction::ALL
            .iter()
            .copied()
            .find(|func| func.name() == lower)
    }

    /// Canonical (lowercase) name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Sign => "sign",
            BuiltinFunction::Sqrt => "sqrt",
            BuiltinFunction::Cbrt => "cbrt",
            BuiltinFunction::Exp => "exp",
            BuiltinFunction::Ln => "ln",
            BuiltinFunction::Log => "log",
            BuiltinFunction::Log10 => "log10",
            BuiltinFunction::Log2 => "log2",
            BuiltinFunction::Sin => "sin",
            BuiltinFunction::Cos => "cos",
            BuiltinFunction::Tan => "tan",
            BuiltinFunction::Asin => "asin",
            BuiltinFunction::Acos => "acos",
            BuiltinFunction::Atan => "atan",
            BuiltinFunction::Atan2 => "atan2",
            BuiltinFunction::Sinh => "sinh",
            BuiltinFunction::Cosh => "cosh",
            BuiltinFunction::Tanh => "tanh",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Trunc => "trunc",
            BuiltinFunction::Min => "min",
            BuiltinFunction::Max => "max",
            BuiltinFunction::Pow => "pow",
            BuiltinFunction::Hypot => "hypot",
            BuiltinFunction::Piecewise => "piecewise",
        }
    }

    /// Accepted argument count as (min, max); `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            BuiltinFunction::Log | BuiltinFunction::Round => (1, Some(2)),
            BuiltinFunction::Atan2 | BuiltinFunction::Pow | BuiltinFunction::Hypot => {
                (2, Some(2))
            }
            BuiltinFunction::Min | BuiltinFunction::Max | BuiltinFunction::Piecewise => (1, None),
            _ => (1, Some(1)),
        }
    }
}

impl std::fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::FloorDivide => write!(f, "//"),
            BinaryOperator::Modulo => write!(f, "%"),
            BinaryOperator::Power => write!(f, "**"),
            BinaryOperator::Equal => write!(f, "=="),
            BinaryOperator::LessThan => write!(f, "<"),
            BinaryOperator::GreaterThan => write!(f, ">"),
            BinaryOperator::LessEqual => write!(f, "<="),
            BinaryOperator::GreaterEqual => write!(f, ">="),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Plus => write!(f, "+"),
        }
    }
}

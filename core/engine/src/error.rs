//! FILENAME: core/engine/src/error.rs
//! PURPOSE: Error taxonomy for expression parsing, evaluation and batch resolution.
//! CONTEXT: Parse failures and post-evaluation failures are always reported
//! as complete lists; nothing in this crate surfaces them one at a time.

use crate::value::Value;
use thiserror::Error;

fn join<T: std::fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

// ============================================================================
// EXPRESSION PARSING
// ============================================================================

/// What is wrong with an expression. `code()` gives the stable identifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidExprKind {
    #[error("invalid float expression ({reason})")]
    InvalidExpr { reason: String },

    #[error("no such parameter: {}", join(.parameters, ", "))]
    NoSuchParam { parameters: Vec<String> },

    #[error(
        "invalid type for the dependencies {}, expected type {required_type}",
        join(.parameters, ", ")
    )]
    DependenciesType {
        parameters: Vec<String>,
        required_type: &'static str,
    },

    #[error("required 1 dependency, got {found}")]
    TooManyDependencies { found: usize },

    #[error("missing options [{}]", join(.missing, ", "))]
    EnumExprMissingOptions {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error(
        "the options [{}] are extra options and are not allowed",
        join(.extra, ", ")
    )]
    EnumExprExtraOptions {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error(
        "the options [{}] don't have associated sub expressions",
        join(.options, ", ")
    )]
    EnumExprEmptyOptions { options: Vec<String> },
}

impl InvalidExprKind {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidExprKind::InvalidExpr { .. } => "invalid_expr",
            InvalidExprKind::NoSuchParam { .. } => "no_such_param",
            InvalidExprKind::DependenciesType { .. } => "dependencies_type",
            InvalidExprKind::TooManyDependencies { .. } => "too_many_dependencies",
            InvalidExprKind::EnumExprMissingOptions { .. } => "enum_expr_missing_options",
            InvalidExprKind::EnumExprExtraOptions { .. } => "enum_expr_extra_options",
            InvalidExprKind::EnumExprEmptyOptions { .. } => "enum_expr_empty_options",
        }
    }
}

/// One invalid expression, with the parameter it was bound to.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid expression {expression} for the parameter {target_parameter}: {kind}")]
pub struct InvalidExpression {
    pub kind: InvalidExprKind,
    pub target_parameter: String,
    /// The offending expression, rendered from its raw form.
    pub expression: String,
}

impl InvalidExpression {
    pub fn new(
        kind: InvalidExprKind,
        target_parameter: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        InvalidExpression {
            kind,
            target_parameter: target_parameter.into(),
            expression: expression.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Every failure found while parsing one expression or one expression set.
#[derive(Error, Debug, Clone, PartialEq, Default)]
#[error("{} invalid expression(s): {}", .errors.len(), join(.errors, "; "))]
pub struct ExpressionErrors {
    pub errors: Vec<InvalidExpression>,
}

impl ExpressionErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: InvalidExpression) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ExpressionErrors) {
        self.errors.extend(other.errors);
    }

    /// Ok when nothing was collected.
    pub fn into_result(self) -> Result<(), ExpressionErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<InvalidExpression> for ExpressionErrors {
    fn from(error: InvalidExpression) -> Self {
        ExpressionErrors {
            errors: vec![error],
        }
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Catalog construction failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    #[error("Enum parameter {0} declares no options")]
    EmptyOptions(String),

    #[error("Default value {default} of the parameter {parameter} is not one of its options")]
    InvalidDefault { parameter: String, default: String },
}

/// Failure to map a token back to exactly one catalog parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("No such parameter: {0}")]
    NotFound(String),

    #[error("Token {token} matches several parameters: {}", join(.candidates, ", "))]
    Ambiguous {
        token: String,
        candidates: Vec<String>,
    },
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Failures while computing the value of a single expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("no value available for {0}")]
    MissingValue(String),

    #[error("{0} does not hold a float value")]
    NotAFloat(String),

    #[error("{selector} = {value} has no matching branch")]
    UnknownOption { selector: String, value: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a number")]
    NotANumber,

    #[error("no piecewise condition holds and no fallback is given")]
    NoPiecewiseBranch,

    #[error("a tuple cannot be used as a value")]
    UnexpectedTuple,
}

/// An evaluation failure attributed to the parameter being computed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot evaluate the expression {expression} for the parameter {parameter}: {source}")]
pub struct EvaluationError {
    pub parameter: String,
    pub expression: String,
    #[source]
    pub source: EvalError,
}

/// A dependency cycle, with its members in cycle order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "The expressions for the parameters ({}) are inter-dependent",
    join(.parameters, ", ")
)]
pub struct DependencyCycleError {
    pub parameters: Vec<String>,
}

/// Failures of a single expression set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Cycle(#[from] DependencyCycleError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

// ============================================================================
// BATCH
// ============================================================================

/// An error tagged with the batch index it was found at.
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed<E> {
    pub index: usize,
    pub error: E,
}

impl<E: std::fmt::Display> std::fmt::Display for Indexed<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[index {}] {}", self.index, self.error)
    }
}

/// A resolved Enum value that is not one of the declared options.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidEnumValue {
    #[error("Invalid value {value} for the parameter {parameter} (index {index})")]
    Constant {
        parameter: String,
        index: usize,
        value: Value,
    },

    #[error(
        "Invalid value {value}, got after evaluating the expression {expression}, for the parameter {parameter} (index {index})"
    )]
    Derived {
        parameter: String,
        index: usize,
        value: Value,
        expression: String,
    },
}

/// Fatal batch resolution failures. Each variant carries the complete list
/// of offenders found in its phase.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error(
        "The values for the parameters {} can't be empty lists",
        join(.parameters, ", ")
    )]
    EmptyValues { parameters: Vec<String> },

    #[error("List values must have matching sizes, got {}", format_lengths(.lengths))]
    SizeMismatch { lengths: Vec<(String, usize)> },

    #[error("{}", join(.0, "; "))]
    InvalidExpressions(Vec<Indexed<InvalidExpression>>),

    #[error("{}", join(.0, "; "))]
    DependencyCycles(Vec<Indexed<DependencyCycleError>>),

    #[error("{}", join(.0, "; "))]
    Resolution(Vec<Indexed<ResolveError>>),

    #[error("{}", join(.0, "; "))]
    InvalidValues(Vec<InvalidEnumValue>),
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{}: {}", name, len))
        .collect::<Vec<_>>()
        .join(", ")
}

//! FILENAME: core/engine/src/raw.rs
//! PURPOSE: Unparsed expression shapes as produced by scenario loaders.
//! CONTEXT: The wire shape for one parameter is a number, a string, an
//! enum-branch mapping {selector: {option: sub_expression}}, or a sequence
//! of any of those (one element per batch index).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options of an enum-branch mapping. A `None` branch is kept so that it
/// can be reported instead of failing deserialization.
pub type RawBranches = BTreeMap<String, Option<RawExpression>>;

/// One unparsed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawExpression {
    Number(f64),
    Text(String),
    /// {selector: {option: sub_expression}}; exactly one selector is valid.
    Branch(BTreeMap<String, RawBranches>),
}

impl RawExpression {
    /// Builds a single-selector enum-branch mapping.
    pub fn branch<I, K>(selector: &str, branches: I) -> Self
    where
        I: IntoIterator<Item = (K, RawExpression)>,
        K: Into<String>,
    {
        let options = branches
            .into_iter()
            .map(|(option, expr)| (option.into(), Some(expr)))
            .collect();
        let mut outer = BTreeMap::new();
        outer.insert(selector.to_string(), options);
        RawExpression::Branch(outer)
    }

    /// True for values that cannot stand as a branch sub-expression.
    pub fn is_empty(&self) -> bool {
        match self {
            RawExpression::Number(_) => false,
            RawExpression::Text(s) => s.trim().is_empty(),
            RawExpression::Branch(outer) => outer.is_empty(),
        }
    }
}

impl std::fmt::Display for RawExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawExpression::Number(n) => write!(f, "{}", n),
            RawExpression::Text(s) => write!(f, "{}", s),
            RawExpression::Branch(outer) => {
                write!(f, "{{")?;
                for (i, (selector, branches)) in outer.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {{", selector)?;
                    for (j, (option, sub)) in branches.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        match sub {
                            Some(sub) => write!(f, "{}: {}", option, sub)?,
                            None => write!(f, "{}: null", option)?,
                        }
                    }
                    write!(f, "}}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<f64> for RawExpression {
    fn from(value: f64) -> Self {
        RawExpression::Number(value)
    }
}

impl From<&str> for RawExpression {
    fn from(value: &str) -> Self {
        RawExpression::Text(value.to_string())
    }
}

impl From<String> for RawExpression {
    fn from(value: String) -> Self {
        RawExpression::Text(value)
    }
}

/// Input for one parameter of a batch: a scalar broadcast to every index,
/// or one expression per index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Sequence(Vec<RawExpression>),
    Single(RawExpression),
}

impl RawValue {
    /// Length of the sequence, `None` for scalars.
    pub fn sequence_len(&self) -> Option<usize> {
        match self {
            RawValue::Sequence(items) => Some(items.len()),
            RawValue::Single(_) => None,
        }
    }

    /// The expression used at `index`; scalars broadcast.
    pub fn at(&self, index: usize) -> Option<&RawExpression> {
        match self {
            RawValue::Sequence(items) => items.get(index),
            RawValue::Single(expr) => Some(expr),
        }
    }
}

impl From<RawExpression> for RawValue {
    fn from(value: RawExpression) -> Self {
        RawValue::Single(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Single(value.into())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Single(value.into())
    }
}

impl From<Vec<RawExpression>> for RawValue {
    fn from(values: Vec<RawExpression>) -> Self {
        RawValue::Sequence(values)
    }
}

impl From<Vec<f64>> for RawValue {
    fn from(values: Vec<f64>) -> Self {
        RawValue::Sequence(values.into_iter().map(RawExpression::from).collect())
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        RawValue::Sequence(values.into_iter().map(RawExpression::from).collect())
    }
}

/// Raw batch input: parameter name -> scalar or sequence.
pub type RawInput = BTreeMap<String, RawValue>;

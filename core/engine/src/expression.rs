//! FILENAME: core/engine/src/expression.rs
//! PURPOSE: The expression bound to a parameter, parsed from its raw form.
//! CONTEXT: The variant is picked from the shape of the raw input:
//! - mapping             --> EnumBranch
//! - string, Enum target --> EnumConstant (an option name, no grammar check)
//! - string, Float target --> FloatFormula
//! - number              --> FloatConstant
//!
//! Expressions are immutable once parsed. Parsing reports every problem it
//! finds rather than stopping at the first one.

use crate::catalog::ParameterCatalog;
use crate::error::{EvalError, ExpressionErrors, InvalidExprKind, InvalidExpression};
use crate::evaluator::Evaluator;
use crate::raw::{RawBranches, RawExpression};
use crate::value::{Value, ValueMap};
use param_parser::{check_formula, Expression};
use std::collections::{BTreeMap, BTreeSet};

/// An arithmetic formula over Float parameters and derived flags.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatFormula {
    text: String,
    ast: Expression,
    dependencies: BTreeSet<String>,
}

impl FloatFormula {
    /// Validates the grammar, parses the formula, and checks that every
    /// referenced name is a Float parameter or a derived flag.
    pub fn parse(
        text: &str,
        target: &str,
        catalog: &ParameterCatalog,
    ) -> Result<FloatFormula, ExpressionErrors> {
        let invalid = |kind| InvalidExpression::new(kind, target, text);

        check_formula(text).map_err(|e| {
            invalid(InvalidExprKind::InvalidExpr {
                reason: e.to_string(),
            })
        })?;
        let ast = param_parser::parse(text).map_err(|e| {
            invalid(InvalidExprKind::InvalidExpr { reason: e.message })
        })?;
        let dependencies = ast.free_symbols();

        let mut unknown = Vec::new();
        let mut wrong_type = Vec::new();
        for dependency in &dependencies {
            if catalog.find_corresponding(dependency).is_err() {
                unknown.push(dependency.clone());
            } else if catalog.get(dependency).is_some_and(|p| p.is_enum()) {
                wrong_type.push(dependency.clone());
            }
        }

        let mut errors = ExpressionErrors::default();
        if !unknown.is_empty() {
            errors.push(invalid(InvalidExprKind::NoSuchParam {
                parameters: unknown,
            }));
        }
        if !wrong_type.is_empty() {
            errors.push(invalid(InvalidExprKind::DependenciesType {
                parameters: wrong_type,
                required_type: "float or flag",
            }));
        }
        errors.into_result()?;

        Ok(FloatFormula {
            text: text.to_string(),
            ast,
            dependencies,
        })
    }

    /// The formula as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> &Expression {
        &self.ast
    }
}

/// A categorical expression: one sub-expression per option of the selector.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumBranch {
    selector: String,
    branches: BTreeMap<String, ParamExpr>,
}

impl EnumBranch {
    fn parse(
        outer: &BTreeMap<String, RawBranches>,
        raw: &RawExpression,
        target: &str,
        catalog: &ParameterCatalog,
    ) -> Result<EnumBranch, ExpressionErrors> {
        let rendered = raw.to_string();
        let invalid = |kind| InvalidExpression::new(kind, target, rendered.clone());
        let mut errors = ExpressionErrors::default();

        let (selector, options) = match outer.iter().next() {
            Some(entry) if outer.len() == 1 => entry,
            _ => {
                errors.push(invalid(InvalidExprKind::TooManyDependencies {
                    found: outer.len(),
                }));
                return Err(errors);
            }
        };

        match catalog.get(selector) {
            None => errors.push(invalid(InvalidExprKind::NoSuchParam {
                parameters: vec![selector.clone()],
            })),
            Some(parameter) if !parameter.is_enum() => {
                errors.push(invalid(InvalidExprKind::DependenciesType {
                    parameters: vec![selector.clone()],
                    required_type: "enum",
                }))
            }
            Some(parameter) => {
                let declared: BTreeSet<&String> = parameter.options().iter().collect();
                let given: BTreeSet<&String> = options.keys().collect();
                let missing: Vec<String> = declared.difference(&given).map(|s| s.to_string()).collect();
                let extra: Vec<String> = given.difference(&declared).map(|s| s.to_string()).collect();

                if !missing.is_empty() {
                    errors.push(invalid(InvalidExprKind::EnumExprMissingOptions {
                        missing: missing.clone(),
                        extra: extra.clone(),
                    }));
                }
                if !extra.is_empty() {
                    errors.push(invalid(InvalidExprKind::EnumExprExtraOptions { missing, extra }));
                }
            }
        }

        let empty: Vec<String> = options
            .iter()
            .filter(|(_, sub)| match sub {
                Some(sub) => sub.is_empty(),
                None => true,
            })
            .map(|(option, _)| option.clone())
            .collect();
        if !empty.is_empty() {
            errors.push(invalid(InvalidExprKind::EnumExprEmptyOptions { options: empty }));
        }

        // Sub-expressions are bound to the target parameter, not the selector
        let mut branches = BTreeMap::new();
        for (option, sub) in options {
            let sub = match sub {
                Some(sub) if !sub.is_empty() => sub,
                _ => continue,
            };
            match ParamExpr::parse(sub, target, catalog) {
                Ok(expr) => {
                    branches.insert(option.clone(), expr);
                }
                Err(sub_errors) => errors.extend(sub_errors),
            }
        }

        errors.into_result()?;
        Ok(EnumBranch {
            selector: selector.clone(),
            branches,
        })
    }

    /// The Enum parameter whose value picks the branch.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The sub-expression used when the selector equals `option`.
    pub fn branch(&self, option: &str) -> Option<&ParamExpr> {
        self.branches.get(option)
    }
}

/// The symbolic definition bound to one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamExpr {
    FloatConstant(f64),
    EnumConstant(String),
    FloatFormula(FloatFormula),
    EnumBranch(EnumBranch),
}

impl ParamExpr {
    /// Parses the raw expression bound to `parameter`.
    pub fn parse(
        raw: &RawExpression,
        parameter: &str,
        catalog: &ParameterCatalog,
    ) -> Result<ParamExpr, ExpressionErrors> {
        match raw {
            RawExpression::Branch(outer) => {
                EnumBranch::parse(outer, raw, parameter, catalog).map(ParamExpr::EnumBranch)
            }
            RawExpression::Text(text) => match catalog.get(parameter) {
                Some(target) if target.is_enum() => Ok(ParamExpr::EnumConstant(text.clone())),
                Some(_) => FloatFormula::parse(text, parameter, catalog).map(ParamExpr::FloatFormula),
                None => Err(InvalidExpression::new(
                    InvalidExprKind::NoSuchParam {
                        parameters: vec![parameter.to_string()],
                    },
                    parameter,
                    text.as_str(),
                )
                .into()),
            },
            RawExpression::Number(n) => Ok(ParamExpr::FloatConstant(*n)),
        }
    }

    /// Names this expression needs the value of. Flag tokens are kept as
    /// written; mapping them to their owning parameter is the graph's job.
    pub fn dependencies(&self) -> BTreeSet<String> {
        match self {
            ParamExpr::FloatConstant(_) | ParamExpr::EnumConstant(_) => BTreeSet::new(),
            ParamExpr::FloatFormula(formula) => formula.dependencies.clone(),
            ParamExpr::EnumBranch(branch) => {
                let mut deps = BTreeSet::new();
                deps.insert(branch.selector.clone());
                for sub in branch.branches.values() {
                    deps.extend(sub.dependencies());
                }
                deps
            }
        }
    }

    /// True for formulas and enum branches; only changes diagnostic wording.
    pub fn is_complex(&self) -> bool {
        matches!(self, ParamExpr::FloatFormula(_) | ParamExpr::EnumBranch(_))
    }

    /// The raw form this expression can be parsed back from.
    pub fn raw_version(&self) -> RawExpression {
        match self {
            ParamExpr::FloatConstant(n) => RawExpression::Number(*n),
            ParamExpr::EnumConstant(s) => RawExpression::Text(s.clone()),
            ParamExpr::FloatFormula(formula) => RawExpression::Text(formula.text.clone()),
            ParamExpr::EnumBranch(branch) => RawExpression::branch(
                &branch.selector,
                branch
                    .branches
                    .iter()
                    .map(|(option, sub)| (option.clone(), sub.raw_version())),
            ),
        }
    }

    /// Computes the value from the values of the dependencies.
    pub fn evaluate(&self, values: &ValueMap) -> Result<Value, EvalError> {
        match self {
            ParamExpr::FloatConstant(n) => Ok(Value::Float(*n)),
            ParamExpr::EnumConstant(s) => Ok(Value::Text(s.clone())),
            ParamExpr::FloatFormula(formula) => Evaluator::new(values)
                .evaluate_number(&formula.ast)
                .map(Value::Float),
            ParamExpr::EnumBranch(branch) => {
                let selected = values
                    .get(&branch.selector)
                    .ok_or_else(|| EvalError::MissingValue(branch.selector.clone()))?;
                let sub = selected
                    .as_text()
                    .and_then(|option| branch.branches.get(option))
                    .ok_or_else(|| EvalError::UnknownOption {
                        selector: branch.selector.clone(),
                        value: selected.to_string(),
                    })?;
                sub.evaluate(values)
            }
        }
    }
}

impl std::fmt::Display for ParamExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_version())
    }
}

//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Evaluates formula ASTs against the values of their dependencies.
//! CONTEXT: After a formula is parsed into an AST, this module traverses
//! the tree and computes a float. Parameter references are looked up in
//! the running value map of the scenario being resolved.
//!
//! SUPPORTED FEATURES:
//! - Literal evaluation: Numbers, Booleans
//! - Parameter and flag lookup (flags hold 1.0 / 0.0)
//! - Binary operations: + - * / // % ** == < > <= >=
//! - Unary operations: - +
//! - Builtins: abs, sign, sqrt, cbrt, exp, ln, log, log10, log2, trigonometry,
//!   floor, ceil, round, trunc, min, max, pow, hypot, piecewise
//!
//! NUMERIC SEMANTICS:
//! - Booleans coerce to 1.0 / 0.0 in arithmetic.
//! - A value is truthy when it is true or a non-zero, non-NaN number.
//! - // and % are floored (the result of % takes the sign of the divisor).
//! - round() rounds half to even.

use crate::error::EvalError;
use crate::value::{Value, ValueMap};
use param_parser::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator};

/// The result of evaluating a (sub-)expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalResult {
    Number(f64),
    Boolean(bool),
}

impl EvalResult {
    /// Booleans count as 1.0 and 0.0.
    pub fn as_number(&self) -> f64 {
        match self {
            EvalResult::Number(n) => *n,
            EvalResult::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            EvalResult::Number(n) => *n != 0.0 && !n.is_nan(),
            EvalResult::Boolean(b) => *b,
        }
    }
}

/// The formula evaluator.
/// Holds a reference to the values resolved so far.
pub struct Evaluator<'a> {
    values: &'a ValueMap,
}

impl<'a> Evaluator<'a> {
    pub fn new(values: &'a ValueMap) -> Self {
        Evaluator { values }
    }

    /// Evaluates an expression down to a float. NaN results are errors.
    pub fn evaluate_number(&self, expr: &Expression) -> Result<f64, EvalError> {
        let n = self.evaluate(expr)?.as_number();
        if n.is_nan() {
            return Err(EvalError::NotANumber);
        }
        Ok(n)
    }

    /// Evaluates an AST expression and returns the result.
    ///
    /// # Arguments
    /// * `expr` - A parsed formula. Identifiers are looked up in the values
    ///   this evaluator was created with.
    ///
    /// # Returns
    /// A number or a boolean. Missing values, division by zero and a
    /// piecewise with no matching branch are errors.
    pub fn evaluate(&self, expr: &Expression) -> Result<EvalResult, EvalError> {
        match expr {
            Expression::Number(n) => Ok(EvalResult::Number(*n)),
            Expression::Boolean(b) => Ok(EvalResult::Boolean(*b)),
            Expression::Identifier(name) => self.eval_identifier(name),
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right),
            Expression::UnaryOp { op, operand } => self.eval_unary_op(*op, operand),
            Expression::FunctionCall { func, args } => self.eval_function(*func, args),
            Expression::Tuple(_) => Err(EvalError::UnexpectedTuple),
        }
    }

    fn eval_identifier(&self, name: &str) -> Result<EvalResult, EvalError> {
        match self.values.get(name) {
            Some(Value::Float(n)) => Ok(EvalResult::Number(*n)),
            Some(Value::Text(_)) => Err(EvalError::NotAFloat(name.to_string())),
            None => Err(EvalError::MissingValue(name.to_string())),
        }
    }

    fn number(&self, expr: &Expression) -> Result<f64, EvalError> {
        Ok(self.evaluate(expr)?.as_number())
    }

    /// Evaluates a binary operation.
    fn eval_binary_op(
        &self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
    ) -> Result<EvalResult, EvalError> {
        let l = self.number(left)?;
        let r = self.number(right)?;

        let result = match op {
            // Arithmetic operations
            BinaryOperator::Add => EvalResult::Number(l + r),
            BinaryOperator::Subtract => EvalResult::Number(l - r),
            BinaryOperator::Multiply => EvalResult::Number(l * r),
            BinaryOperator::Divide => EvalResult::Number(checked_divisor(r).map(|r| l / r)?),
            BinaryOperator::FloorDivide => {
                EvalResult::Number(checked_divisor(r).map(|r| (l / r).floor())?)
            }
            BinaryOperator::Modulo => EvalResult::Number(floored_mod(l, checked_divisor(r)?)),
            BinaryOperator::Power => EvalResult::Number(l.powf(r)),

            // Comparison operations
            BinaryOperator::Equal => EvalResult::Boolean(l == r),
            BinaryOperator::LessThan => EvalResult::Boolean(l < r),
            BinaryOperator::GreaterThan => EvalResult::Boolean(l > r),
            BinaryOperator::LessEqual => EvalResult::Boolean(l <= r),
            BinaryOperator::GreaterEqual => EvalResult::Boolean(l >= r),
        };

        Ok(result)
    }

    /// Evaluates a unary operation.
    fn eval_unary_op(&self, op: UnaryOperator, operand: &Expression) -> Result<EvalResult, EvalError> {
        let n = self.number(operand)?;
        match op {
            UnaryOperator::Negate => Ok(EvalResult::Number(-n)),
            UnaryOperator::Plus => Ok(EvalResult::Number(n)),
        }
    }

    /// Evaluates a function call. Arity was checked by the parser.
    fn eval_function(
        &self,
        func: BuiltinFunction,
        args: &[Expression],
    ) -> Result<EvalResult, EvalError> {
        let arg = |i: usize| -> Result<f64, EvalError> {
            args.get(i).map_or(Ok(f64::NAN), |expr| self.number(expr))
        };

        let n = match func {
            BuiltinFunction::Piecewise => return self.fn_piecewise(args),

            BuiltinFunction::Abs => arg(0)?.abs(),
            BuiltinFunction::Sign => {
                let x = arg(0)?;
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
            BuiltinFunction::Sqrt => arg(0)?.sqrt(),
            BuiltinFunction::Cbrt => arg(0)?.cbrt(),
            BuiltinFunction::Exp => arg(0)?.exp(),
            BuiltinFunction::Ln => arg(0)?.ln(),
            BuiltinFunction::Log => match args.len() {
                2 => arg(0)?.ln() / arg(1)?.ln(),
                _ => arg(0)?.ln(),
            },
            BuiltinFunction::Log10 => arg(0)?.log10(),
            BuiltinFunction::Log2 => arg(0)?.log2(),

            // Trigonometry
            BuiltinFunction::Sin => arg(0)?.sin(),
            BuiltinFunction::Cos => arg(0)?.cos(),
            BuiltinFunction::Tan => arg(0)?.tan(),
            BuiltinFunction::Asin => arg(0)?.asin(),
            BuiltinFunction::Acos => arg(0)?.acos(),
            BuiltinFunction::Atan => arg(0)?.atan(),
            BuiltinFunction::Atan2 => arg(0)?.atan2(arg(1)?),
            BuiltinFunction::Sinh => arg(0)?.sinh(),
            BuiltinFunction::Cosh => arg(0)?.cosh(),
            BuiltinFunction::Tanh => arg(0)?.tanh(),

            // Rounding
            BuiltinFunction::Floor => arg(0)?.floor(),
            BuiltinFunction::Ceil => arg(0)?.ceil(),
            BuiltinFunction::Round => match args.len() {
                2 => {
                    let factor = 10f64.powi(arg(1)? as i32);
                    (arg(0)? * factor).round_ties_even() / factor
                }
                _ => arg(0)?.round_ties_even(),
            },
            BuiltinFunction::Trunc => arg(0)?.trunc(),

            BuiltinFunction::Min => self
                .collect_numbers(args)?
                .into_iter()
                .fold(f64::INFINITY, f64::min),
            BuiltinFunction::Max => self
                .collect_numbers(args)?
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max),
            BuiltinFunction::Pow => arg(0)?.powf(arg(1)?),
            BuiltinFunction::Hypot => arg(0)?.hypot(arg(1)?),
        };

        Ok(EvalResult::Number(n))
    }

    /// Evaluates every argument to a float.
    fn collect_numbers(&self, args: &[Expression]) -> Result<Vec<f64>, EvalError> {
        args.iter().map(|arg| self.number(arg)).collect()
    }

    /// Returns the value of the first (value, condition) branch whose
    /// condition is truthy, else the bare fallback if one is given.
    /// Only the selected branch value is evaluated.
    fn fn_piecewise(&self, args: &[Expression]) -> Result<EvalResult, EvalError> {
        for arg in args {
            match arg {
                Expression::Tuple(pair) => {
                    if let [value, condition] = pair.as_slice() {
                        if self.evaluate(condition)?.is_truthy() {
                            return self.evaluate(value);
                        }
                    } else {
                        return Err(EvalError::UnexpectedTuple);
                    }
                }
                fallback => return self.evaluate(fallback),
            }
        }
        Err(EvalError::NoPiecewiseBranch)
    }
}

fn checked_divisor(r: f64) -> Result<f64, EvalError> {
    if r == 0.0 {
        Err(EvalError::DivisionByZero)
    } else {
        Ok(r)
    }
}

/// Modulo whose result has the sign of the divisor.
fn floored_mod(l: f64, r: f64) -> f64 {
    let m = l % r;
    if m != 0.0 && (m < 0.0) != (r < 0.0) {
        m + r
    } else {
        m
    }
}

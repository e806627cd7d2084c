//! FILENAME: core/engine/src/batch.rs
//! PURPOSE: Resolves a whole batch of scenarios, one expression set per index.
//! CONTEXT: The batch size comes from the sequences in the input; scalars and
//! parameters missing from the input are broadcast to every index. Indices are
//! independent of each other, so each phase fans out over them and collects
//! results back in index order before anything is reported.
//!
//! PHASES:
//! 1. Shape checks: empty sequences, mismatched lengths
//! 2. Build one expression set per index (all parse errors, all indices)
//! 3. Cycle detection (every index is checked; lookup failures are reported
//!    together with the cycles found at other indices)
//! 4. Evaluation
//! 5. Validation: bounds warnings, invalid Enum values (fatal, all at once)

use crate::catalog::{ParameterCatalog, ParameterKind};
use crate::config::ResolverConfig;
use crate::error::{BatchError, DependencyCycleError, Indexed, InvalidEnumValue, ResolveError};
use crate::expression_set::ExpressionSet;
use crate::raw::{RawExpression, RawInput};
use crate::value::Value;
use log::{debug, warn};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

// ============================================================================
// WARNINGS
// ============================================================================

/// Non-fatal findings of the validation phase.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundsWarning {
    /// Emitted once per Float parameter missing its `min`, its `max`, or both.
    /// A declared side is still checked.
    MissingBounds { parameter: String },
    /// `expression` is set when the value was derived from a formula or branch.
    OutOfBounds {
        parameter: String,
        index: usize,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
        expression: Option<String>,
    },
}

fn format_bound(bound: Option<f64>) -> String {
    bound.map_or_else(|| "-".to_string(), |b| b.to_string())
}

impl std::fmt::Display for BoundsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundsWarning::MissingBounds { parameter } => write!(
                f,
                "The parameter {} does not have valid bounds, both min and max are needed for a full range check",
                parameter
            ),
            BoundsWarning::OutOfBounds {
                parameter,
                index,
                value,
                min,
                max,
                expression: None,
            } => write!(
                f,
                "The value {} for the parameter {} (index {}) is outside its bounds [{}, {}]",
                value,
                parameter,
                index,
                format_bound(*min),
                format_bound(*max)
            ),
            BoundsWarning::OutOfBounds {
                parameter,
                index,
                value,
                min,
                max,
                expression: Some(expression),
            } => write!(
                f,
                "The value {}, got after evaluating the expression {}, for the parameter {} (index {}) is outside its bounds [{}, {}]",
                value,
                expression,
                parameter,
                index,
                format_bound(*min),
                format_bound(*max)
            ),
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// Resolved values: one list per catalog parameter, all of length `batch_size`.
/// Serializes as `{name: [values...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBatch {
    values: BTreeMap<String, Vec<Value>>,
    warnings: Vec<BoundsWarning>,
    batch_size: usize,
}

impl ResolvedBatch {
    /// Number of scenarios, which is the length of every value list.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The values of one parameter, index by index.
    ///
    /// # Arguments
    /// * `name` - A catalog parameter name. Flags are not part of the result.
    ///
    /// # Returns
    /// The value list, or None if `name` is not a catalog parameter.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// (name, values) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Every parameter's value at `index`.
    pub fn scenario(&self, index: usize) -> Option<BTreeMap<&str, &Value>> {
        if index >= self.batch_size {
            return None;
        }
        self.values
            .iter()
            .map(|(name, values)| values.get(index).map(|value| (name.as_str(), value)))
            .collect()
    }

    /// Non-fatal findings, in index then parameter order.
    pub fn warnings(&self) -> &[BoundsWarning] {
        &self.warnings
    }

    /// Consumes the batch, dropping its warnings.
    pub fn into_values(self) -> BTreeMap<String, Vec<Value>> {
        self.values
    }
}

impl Serialize for ResolvedBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves raw input against a catalog.
#[derive(Debug, Clone, Default)]
pub struct BatchResolver {
    config: ResolverConfig,
}

/// Resolves `input` with the default configuration.
pub fn resolve_batch(
    catalog: &ParameterCatalog,
    input: &RawInput,
) -> Result<ResolvedBatch, BatchError> {
    BatchResolver::default().resolve(catalog, input)
}

impl BatchResolver {
    /// Creates a resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Self {
        BatchResolver { config }
    }

    /// The configuration this resolver runs with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves every scenario of `input`.
    ///
    /// # Arguments
    /// * `catalog` - The parameters expressions may refer to.
    /// * `input` - Raw expressions per parameter: a single expression, broadcast
    ///   to every index, or a sequence with one expression per index.
    ///
    /// # Returns
    /// One value list per catalog parameter, plus the bounds warnings. Errors
    /// carry every failure of the first phase that failed, across all indices.
    pub fn resolve(
        &self,
        catalog: &ParameterCatalog,
        input: &RawInput,
    ) -> Result<ResolvedBatch, BatchError> {
        let batch_size = batch_size(input)?;
        debug!(
            "Resolving {} input parameter(s) over {} index(es)",
            input.len(),
            batch_size
        );

        let scenarios: Vec<BTreeMap<String, RawExpression>> = (0..batch_size)
            .map(|index| raw_scenario(catalog, input, index))
            .collect();

        // Phase 2: build
        let built = self.map_indices(&scenarios, |raw| ExpressionSet::build(raw, catalog));
        let mut sets = Vec::with_capacity(batch_size);
        let mut invalid = Vec::new();
        for (index, result) in built.into_iter().enumerate() {
            match result {
                Ok(set) => sets.push(set),
                Err(errors) => invalid.extend(
                    errors
                        .errors
                        .into_iter()
                        .map(|error| Indexed { index, error }),
                ),
            }
        }
        if !invalid.is_empty() {
            debug!("{} invalid expression(s)", invalid.len());
            return Err(BatchError::InvalidExpressions(invalid));
        }

        // Phase 3: cycles. A lookup failure at any index turns the whole
        // report into a Resolution error, cycles of other indices included.
        let mut cycles = Vec::new();
        let mut graph_failures = Vec::new();
        let mut lookup_failed = false;
        for (index, result) in self
            .map_indices(&sets, ExpressionSet::dependency_cycle)
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(parameters) if parameters.is_empty() => {}
                Ok(parameters) => {
                    let error = DependencyCycleError { parameters };
                    graph_failures.push(Indexed {
                        index,
                        error: ResolveError::Cycle(error.clone()),
                    });
                    cycles.push(Indexed { index, error });
                }
                Err(error) => {
                    lookup_failed = true;
                    graph_failures.push(Indexed {
                        index,
                        error: ResolveError::Lookup(error),
                    });
                }
            }
        }
        if lookup_failed {
            debug!("Dependency lookups failed, {} index(es) reported", graph_failures.len());
            return Err(BatchError::Resolution(graph_failures));
        }
        if !cycles.is_empty() {
            debug!("Dependency cycles at {} index(es)", cycles.len());
            return Err(BatchError::DependencyCycles(cycles));
        }

        // Phase 4: evaluation
        let mut resolved = Vec::with_capacity(batch_size);
        let mut failures = Vec::new();
        for (index, result) in self
            .map_indices(&sets, ExpressionSet::evaluate)
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(values) => resolved.push(values),
                Err(error) => failures.push(Indexed { index, error }),
            }
        }
        if !failures.is_empty() {
            return Err(BatchError::Resolution(failures));
        }

        // Flags are not catalog parameters and are dropped here
        let mut values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for name in catalog.names() {
            let column = resolved
                .iter_mut()
                .filter_map(|scenario| scenario.remove(name))
                .collect();
            values.insert(name.to_string(), column);
        }

        // Phase 5: validation
        let warnings = validate(catalog, &sets, &values)?;
        debug!("Resolved batch with {} warning(s)", warnings.len());

        Ok(ResolvedBatch {
            values,
            warnings,
            batch_size,
        })
    }

    /// Applies `f` to every item, on the rayon pool when the batch is large
    /// enough. The output keeps the input order either way.
    fn map_indices<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if self.config.use_parallel(items.len()) {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }
}

/// Checks sequence shapes and returns the batch size.
fn batch_size(input: &RawInput) -> Result<usize, BatchError> {
    let lengths: Vec<(String, usize)> = input
        .iter()
        .filter_map(|(name, value)| value.sequence_len().map(|len| (name.clone(), len)))
        .collect();

    let empty: Vec<String> = lengths
        .iter()
        .filter(|(_, len)| *len == 0)
        .map(|(name, _)| name.clone())
        .collect();
    if !empty.is_empty() {
        return Err(BatchError::EmptyValues { parameters: empty });
    }

    let distinct: FxHashSet<usize> = lengths.iter().map(|(_, len)| *len).collect();
    if distinct.len() > 1 {
        return Err(BatchError::SizeMismatch { lengths });
    }

    Ok(lengths.iter().map(|(_, len)| *len).max().unwrap_or(1))
}

/// The raw expressions used at `index`. Catalog parameters missing from the
/// input get their default.
fn raw_scenario(
    catalog: &ParameterCatalog,
    input: &RawInput,
    index: usize,
) -> BTreeMap<String, RawExpression> {
    let mut raw: BTreeMap<String, RawExpression> = input
        .iter()
        .filter_map(|(name, value)| value.at(index).map(|expr| (name.clone(), expr.clone())))
        .collect();

    for parameter in catalog.iter() {
        raw.entry(parameter.name.clone())
            .or_insert_with(|| parameter.default_raw());
    }
    raw
}

/// Checks every value, index first then parameter name. Out-of-bounds values
/// are warnings; Enum values outside the options are collected and fail the
/// batch together.
fn validate(
    catalog: &ParameterCatalog,
    sets: &[ExpressionSet<'_>],
    values: &BTreeMap<String, Vec<Value>>,
) -> Result<Vec<BoundsWarning>, BatchError> {
    let mut warnings = Vec::new();
    let mut invalid = Vec::new();
    let mut unbounded: FxHashSet<&str> = FxHashSet::default();

    for (index, set) in sets.iter().enumerate() {
        for (name, column) in values {
            let (Some(parameter), Some(value)) = (catalog.get(name), column.get(index)) else {
                continue;
            };
            let derived = set
                .get(name)
                .filter(|expr| expr.is_complex())
                .map(|expr| expr.to_string());

            match &parameter.kind {
                ParameterKind::Float { min, max, .. } => {
                    if (min.is_none() || max.is_none()) && unbounded.insert(name.as_str()) {
                        let warning = BoundsWarning::MissingBounds {
                            parameter: name.clone(),
                        };
                        warn!("{}", warning);
                        warnings.push(warning);
                    }
                    let Some(n) = value.as_float() else {
                        continue;
                    };
                    let below = min.is_some_and(|lower| n < lower);
                    let above = max.is_some_and(|upper| n > upper);
                    if below || above {
                        let warning = BoundsWarning::OutOfBounds {
                            parameter: name.clone(),
                            index,
                            value: n,
                            min: *min,
                            max: *max,
                            expression: derived,
                        };
                        warn!("{}", warning);
                        warnings.push(warning);
                    }
                }
                ParameterKind::Enum { options, .. } => {
                    let known = value.as_text().is_some_and(|v| options.iter().any(|o| o == v));
                    if !known {
                        invalid.push(match derived {
                            Some(expression) => InvalidEnumValue::Derived {
                                parameter: name.clone(),
                                index,
                                value: value.clone(),
                                expression,
                            },
                            None => InvalidEnumValue::Constant {
                                parameter: name.clone(),
                                index,
                                value: value.clone(),
                            },
                        });
                    }
                }
            }
        }
    }

    if !invalid.is_empty() {
        return Err(BatchError::InvalidValues(invalid));
    }
    Ok(warnings)
}

//! FILENAME: core/engine/src/expression_set.rs
//! PURPOSE: The expressions of one scenario and their joint evaluation.
//! CONTEXT: One set holds at most one expression per parameter. Catalog
//! parameters without an expression resolve to their default. Evaluation
//! walks the dependency graph so that every parameter is computed after
//! everything it references, injecting the derived flags of each Enum
//! value as soon as that value is known.

use crate::catalog::ParameterCatalog;
use crate::dependency_graph::DependencyGraph;
use crate::error::{
    EvaluationError, ExpressionErrors, InvalidExprKind, InvalidExpression, LookupError,
    ResolveError,
};
use crate::expression::ParamExpr;
use crate::raw::RawExpression;
use crate::value::{Value, ValueMap};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ExpressionSet<'c> {
    expressions: BTreeMap<String, ParamExpr>,
    catalog: &'c ParameterCatalog,
}

impl<'c> ExpressionSet<'c> {
    /// Parses every entry. All failures of all entries are returned together.
    pub fn build(
        raw: &BTreeMap<String, RawExpression>,
        catalog: &'c ParameterCatalog,
    ) -> Result<ExpressionSet<'c>, ExpressionErrors> {
        let mut errors = ExpressionErrors::default();
        let mut expressions = BTreeMap::new();

        for (name, raw_expr) in raw {
            if !catalog.contains(name) {
                errors.push(InvalidExpression::new(
                    InvalidExprKind::NoSuchParam {
                        parameters: vec![name.clone()],
                    },
                    name.as_str(),
                    raw_expr.to_string(),
                ));
                continue;
            }

            match ParamExpr::parse(raw_expr, name, catalog) {
                Ok(expr) => {
                    expressions.insert(name.clone(), expr);
                }
                Err(parse_errors) => errors.extend(parse_errors),
            }
        }

        errors.into_result()?;
        Ok(ExpressionSet {
            expressions,
            catalog,
        })
    }

    /// Graph over canonical parameter names. Flag tokens become an edge to
    /// the Enum parameter that owns them.
    pub fn dependency_graph(&self) -> Result<DependencyGraph, LookupError> {
        let mut graph = DependencyGraph::new();

        for (name, expr) in &self.expressions {
            graph.add_node(name.as_str());
            for token in expr.dependencies() {
                let owner = self.catalog.find_corresponding(&token)?;
                graph.add_dependency(name.as_str(), owner.name.as_str());
            }
        }

        Ok(graph)
    }

    /// Members of a dependency cycle in cycle order, empty when there is none.
    pub fn dependency_cycle(&self) -> Result<Vec<String>, LookupError> {
        Ok(self.dependency_graph()?.find_cycle().unwrap_or_default())
    }

    /// Resolves every catalog parameter (and the flags derived from Enum
    /// values) to a concrete value.
    pub fn evaluate(&self) -> Result<BTreeMap<String, Value>, ResolveError> {
        let graph = self.dependency_graph()?;
        let mut order = graph.topological_order()?;

        // Parameters outside the graph go last, once each
        let mut seen: FxHashSet<String> = order.iter().cloned().collect();
        for name in self.expressions.keys().map(String::as_str).chain(self.catalog.names()) {
            if seen.insert(name.to_string()) {
                order.push(name.to_string());
            }
        }

        let mut values = ValueMap::default();
        for name in &order {
            let value = match self.expressions.get(name) {
                Some(expr) => expr.evaluate(&values).map_err(|source| EvaluationError {
                    parameter: name.clone(),
                    expression: expr.to_string(),
                    source,
                })?,
                None => match self.catalog.get(name) {
                    Some(parameter) => parameter.default_value(),
                    None => continue,
                },
            };

            if let (Some(parameter), Value::Text(option)) = (self.catalog.get(name), &value) {
                if parameter.is_enum() {
                    for (flag, bit) in parameter.one_hot(option) {
                        values.insert(flag, Value::Float(bit));
                    }
                }
            }
            values.insert(name.clone(), value);
        }

        Ok(values.into_iter().collect())
    }

    /// The expression bound to `name`, if the input gave one.
    pub fn get(&self, name: &str) -> Option<&ParamExpr> {
        self.expressions.get(name)
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Expressions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamExpr)> {
        self.expressions.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    /// The catalog the set was built against.
    pub fn catalog(&self) -> &'c ParameterCatalog {
        self.catalog
    }

    /// The raw input this set can be rebuilt from.
    pub fn raw_version(&self) -> BTreeMap<String, RawExpression> {
        self.expressions
            .iter()
            .map(|(name, expr)| (name.clone(), expr.raw_version()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Parameter;
    use crate::error::EvalError;

    fn catalog() -> ParameterCatalog {
        ParameterCatalog::new(vec![
            Parameter::float("cuda_core", 0.0),
            Parameter::float("lifespan", 5.0).with_bounds(1.0, 10.0),
            Parameter::float("power", 250.0),
            Parameter::enumeration("architecture", "Pascal", ["Pascal", "Maxwell"]),
        ])
        .unwrap()
    }

    fn raw(entries: &[(&str, RawExpression)]) -> BTreeMap<String, RawExpression> {
        entries
            .iter()
            .map(|(name, expr)| (name.to_string(), expr.clone()))
            .collect()
    }

    #[test]
    fn test_build_aggregates_every_failure() {
        let catalog = catalog();
        let input = raw(&[
            ("cuda_core", "1 +".into()),
            ("ghost", 3.0.into()),
            ("power", "lifespan * watts".into()),
        ]);

        let errors = ExpressionSet::build(&input, &catalog).unwrap_err();
        let found: Vec<(&str, &str)> = errors
            .errors
            .iter()
            .map(|e| (e.target_parameter.as_str(), e.code()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("cuda_core", "invalid_expr"),
                ("ghost", "no_such_param"),
                ("power", "no_such_param"),
            ]
        );
    }

    #[test]
    fn test_piecewise_on_flags() {
        let catalog = catalog();
        let formula = "piecewise((1000, architecture_Pascal), (100, true))";

        for (architecture, expected) in [("Maxwell", 100.0), ("Pascal", 1000.0)] {
            let input = raw(&[
                ("cuda_core", formula.into()),
                ("architecture", architecture.into()),
            ]);
            let set = ExpressionSet::build(&input, &catalog).unwrap();
            let values = set.evaluate().unwrap();
            assert_eq!(values["cuda_core"], Value::Float(expected));
        }
    }

    #[test]
    fn test_evaluate_injects_flags_and_defaults() {
        let catalog = catalog();
        let input = raw(&[("architecture", "Maxwell".into())]);
        let values = ExpressionSet::build(&input, &catalog)
            .unwrap()
            .evaluate()
            .unwrap();

        assert_eq!(values["architecture"], Value::from("Maxwell"));
        assert_eq!(values["architecture_Maxwell"], Value::Float(1.0));
        assert_eq!(values["architecture_Pascal"], Value::Float(0.0));
        assert_eq!(values["lifespan"], Value::Float(5.0));
        assert_eq!(values["power"], Value::Float(250.0));
    }

    #[test]
    fn test_chained_formulas() {
        let catalog = catalog();
        let input = raw(&[
            ("power", "cuda_core / 4".into()),
            ("cuda_core", "lifespan * 100".into()),
            ("lifespan", 2.0.into()),
        ]);
        let values = ExpressionSet::build(&input, &catalog)
            .unwrap()
            .evaluate()
            .unwrap();
        assert_eq!(values["power"], Value::Float(50.0));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let catalog = catalog();
        let input = raw(&[
            ("cuda_core", "lifespan ** 2 % 7".into()),
            ("power", "cuda_core // 3 + architecture_Maxwell".into()),
        ]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();
        let first = set.evaluate().unwrap();
        for _ in 0..5 {
            assert_eq!(set.evaluate().unwrap(), first);
        }
    }

    #[test]
    fn test_mutual_reference_cycle() {
        let catalog = catalog();
        let input = raw(&[
            ("cuda_core", "power + 1".into()),
            ("power", "cuda_core * 2".into()),
        ]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();

        let cycle = set.dependency_cycle().unwrap();
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&"cuda_core".to_string()));
        assert!(cycle.contains(&"power".to_string()));

        assert!(matches!(set.evaluate(), Err(ResolveError::Cycle(_))));
    }

    #[test]
    fn test_cycle_through_flag() {
        let catalog = catalog();
        let input = raw(&[
            ("cuda_core", "architecture_Pascal * 10".into()),
            (
                "architecture",
                RawExpression::branch(
                    "architecture",
                    [
                        ("Pascal", RawExpression::from("Maxwell")),
                        ("Maxwell", RawExpression::from("Pascal")),
                    ],
                ),
            ),
        ]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();
        assert_eq!(set.dependency_cycle().unwrap(), vec!["architecture"]);
    }

    #[test]
    fn test_acyclic_set_has_no_cycle() {
        let catalog = catalog();
        let input = raw(&[("cuda_core", "lifespan + power".into())]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();
        assert!(set.dependency_cycle().unwrap().is_empty());
    }

    #[test]
    fn test_isolated_parameter_appears_once() {
        let catalog = catalog();
        let input = raw(&[("power", 12.0.into()), ("cuda_core", "lifespan".into())]);
        let values = ExpressionSet::build(&input, &catalog)
            .unwrap()
            .evaluate()
            .unwrap();

        // 4 parameters + 2 flags
        assert_eq!(values.len(), 6);
        assert_eq!(values["power"], Value::Float(12.0));
    }

    #[test]
    fn test_evaluation_error_names_parameter() {
        let catalog = catalog();
        let input = raw(&[("power", "lifespan / (cuda_core - cuda_core)".into())]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();

        match set.evaluate() {
            Err(ResolveError::Evaluation(error)) => {
                assert_eq!(error.parameter, "power");
                assert_eq!(error.source, EvalError::DivisionByZero);
            }
            other => panic!("Expected evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_version_rebuilds_same_values() {
        let catalog = catalog();
        let input = raw(&[
            ("cuda_core", "round(lifespan * 3.5)".into()),
            (
                "power",
                RawExpression::branch(
                    "architecture",
                    [
                        ("Pascal", RawExpression::from("cuda_core + 1")),
                        ("Maxwell", RawExpression::from(80.0)),
                    ],
                ),
            ),
        ]);
        let set = ExpressionSet::build(&input, &catalog).unwrap();
        let rebuilt = ExpressionSet::build(&set.raw_version(), &catalog).unwrap();

        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        let names: Vec<&str> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["cuda_core", "power"]);
        assert_eq!(set.catalog().len(), catalog.len());
        assert_eq!(rebuilt.evaluate().unwrap(), set.evaluate().unwrap());
    }
}

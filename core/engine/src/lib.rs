//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the parameter resolution engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//! The usual entry point is `resolve_batch`, which takes a catalog and the
//! raw per-parameter input and returns one value list per parameter.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod expression_set;
pub mod raw;
pub mod value;

// Re-export commonly used types at the crate root
pub use batch::{resolve_batch, BatchResolver, BoundsWarning, ResolvedBatch};
pub use catalog::{Parameter, ParameterCatalog, ParameterKind};
pub use config::ResolverConfig;
pub use dependency_graph::DependencyGraph;
pub use error::{
    BatchError, CatalogError, DependencyCycleError, EvalError, EvaluationError, ExpressionErrors,
    Indexed, InvalidEnumValue, InvalidExprKind, InvalidExpression, LookupError, ResolveError,
};
pub use evaluator::{EvalResult, Evaluator};
pub use expression::{EnumBranch, FloatFormula, ParamExpr};
pub use expression_set::ExpressionSet;
pub use raw::{RawBranches, RawExpression, RawInput, RawValue};
pub use value::{Value, ValueMap};

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_catalog() -> ParameterCatalog {
        serde_json::from_str(
            r#"[
                {"name": "cuda_core", "type": "float", "default": 0, "min": 0, "max": 5000},
                {"name": "lifespan", "type": "float", "default": 5, "min": 1, "max": 10},
                {"name": "usage", "type": "float", "default": 0.5, "min": 0, "max": 1},
                {"name": "architecture", "type": "enum", "default": "Pascal", "options": ["Pascal", "Maxwell"]}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn integration_test_json_workflow() {
        let catalog = gpu_catalog();
        let input: RawInput = serde_json::from_str(
            r#"{
                "architecture": ["Maxwell", "Pascal", "Pascal"],
                "cuda_core": "piecewise((1000, architecture_Pascal), (100, true))",
                "lifespan": {"architecture": {"Pascal": "usage * 10", "Maxwell": 3}},
                "usage": [0.2, 0.4, 0.9]
            }"#,
        )
        .unwrap();

        let batch = resolve_batch(&catalog, &input).unwrap();

        assert_eq!(batch.batch_size(), 3);
        assert_eq!(
            batch.get("cuda_core").unwrap(),
            &[Value::Float(100.0), Value::Float(1000.0), Value::Float(1000.0)]
        );
        assert_eq!(
            batch.get("lifespan").unwrap(),
            &[Value::Float(3.0), Value::Float(4.0), Value::Float(9.0)]
        );
        assert_eq!(
            batch.get("architecture").unwrap(),
            &[
                Value::from("Maxwell"),
                Value::from("Pascal"),
                Value::from("Pascal")
            ]
        );
        assert!(batch.warnings().is_empty());
    }

    #[test]
    fn integration_test_errors_are_collected_before_failing() {
        let catalog = gpu_catalog();
        let input: RawInput = serde_json::from_str(
            r#"{
                "cuda_core": ["2*x +*", "architecture * 2", "foo(lifespan)"],
                "lifespan": {"architecture": {"Pascal": 4}}
            }"#,
        )
        .unwrap();

        match resolve_batch(&catalog, &input) {
            Err(BatchError::InvalidExpressions(errors)) => {
                let found: Vec<(usize, &str, &str)> = errors
                    .iter()
                    .map(|e| (e.index, e.error.target_parameter.as_str(), e.error.code()))
                    .collect();
                assert_eq!(
                    found,
                    vec![
                        (0, "cuda_core", "invalid_expr"),
                        (0, "lifespan", "enum_expr_missing_options"),
                        (1, "cuda_core", "dependencies_type"),
                        (1, "lifespan", "enum_expr_missing_options"),
                        (2, "cuda_core", "invalid_expr"),
                        (2, "lifespan", "enum_expr_missing_options"),
                    ]
                );
            }
            other => panic!("Expected invalid expressions, got {:?}", other),
        }
    }

    #[test]
    fn integration_test_deep_nesting_is_rejected() {
        let catalog = gpu_catalog();
        let mut input = RawInput::new();
        input.insert(
            "cuda_core".to_string(),
            RawValue::Sequence(vec![
                RawExpression::from(format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000))),
                RawExpression::from(format!("{}usage", "-".repeat(10_000))),
            ]),
        );

        match resolve_batch(&catalog, &input) {
            Err(BatchError::InvalidExpressions(errors)) => {
                let found: Vec<(usize, &str)> =
                    errors.iter().map(|e| (e.index, e.error.code())).collect();
                assert_eq!(found, vec![(0, "invalid_expr"), (1, "invalid_expr")]);
            }
            other => panic!("Expected invalid expressions, got {:?}", other),
        }
    }

    #[test]
    fn integration_test_expression_set_by_hand() {
        let catalog = gpu_catalog();
        let mut raw = std::collections::BTreeMap::new();
        raw.insert("usage".to_string(), RawExpression::from("lifespan / 10"));
        raw.insert("lifespan".to_string(), RawExpression::from(8.0));

        let set = ExpressionSet::build(&raw, &catalog).unwrap();
        assert!(set.dependency_cycle().unwrap().is_empty());

        let values = set.evaluate().unwrap();
        assert_eq!(values["usage"], Value::Float(0.8));
        // Flags of the default architecture are part of the raw evaluation
        assert_eq!(values["architecture_Pascal"], Value::Float(1.0));
    }

    #[test]
    fn integration_test_out_of_bounds_is_not_fatal() {
        let catalog = gpu_catalog();
        let input: RawInput =
            serde_json::from_str(r#"{"usage": [0.5, 1.5], "lifespan": "usage * 30"}"#).unwrap();

        let batch = resolve_batch(&catalog, &input).unwrap();
        let out_of_bounds: Vec<(&str, usize)> = batch
            .warnings()
            .iter()
            .filter_map(|w| match w {
                BoundsWarning::OutOfBounds {
                    parameter, index, ..
                } => Some((parameter.as_str(), *index)),
                BoundsWarning::MissingBounds { .. } => None,
            })
            .collect();
        assert_eq!(
            out_of_bounds,
            vec![("lifespan", 0), ("lifespan", 1), ("usage", 1)]
        );
    }

    #[test]
    fn integration_test_config_from_json() {
        let config: ResolverConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        let batch = BatchResolver::new(config)
            .resolve(&gpu_catalog(), &RawInput::new())
            .unwrap();
        assert_eq!(batch.get("usage").unwrap(), &[Value::Float(0.5)]);
    }
}

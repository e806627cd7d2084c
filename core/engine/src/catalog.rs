//! FILENAME: core/engine/src/catalog.rs
//! PURPOSE: Read-only catalog of the parameters expressions may refer to.
//! CONTEXT: Every Enum parameter expands into one derived flag per option,
//! named `{parameter}_{option}`. Flags are never declared here but the
//! catalog knows how to map a flag token back to its owning parameter.

use crate::error::{CatalogError, LookupError};
use crate::raw::RawExpression;
use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Kind-specific data of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    Float {
        default: f64,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Enum {
        default: String,
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Parameter {
            name: name.into(),
            kind: ParameterKind::Float {
                default,
                min: None,
                max: None,
            },
        }
    }

    /// Sets the [min, max] range of a Float parameter; no-op for Enums.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        if let ParameterKind::Float { min, max, .. } = &mut self.kind {
            *min = Some(lower);
            *max = Some(upper);
        }
        self
    }

    pub fn enumeration<I, S>(name: impl Into<String>, default: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Parameter {
            name: name.into(),
            kind: ParameterKind::Enum {
                default: default.into(),
                options: options.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ParameterKind::Enum { .. })
    }

    /// Declared options, in declaration order. Empty for Float parameters.
    pub fn options(&self) -> &[String] {
        match &self.kind {
            ParameterKind::Enum { options, .. } => options,
            ParameterKind::Float { .. } => &[],
        }
    }

    /// Declared (min, max) of a Float parameter. Always (None, None) for Enums.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match &self.kind {
            ParameterKind::Float { min, max, .. } => (*min, *max),
            ParameterKind::Enum { .. } => (None, None),
        }
    }

    pub fn default_value(&self) -> Value {
        match &self.kind {
            ParameterKind::Float { default, .. } => Value::Float(*default),
            ParameterKind::Enum { default, .. } => Value::Text(default.clone()),
        }
    }

    /// The default as raw input, so it goes through the same parsing as user input.
    pub fn default_raw(&self) -> RawExpression {
        match &self.kind {
            ParameterKind::Float { default, .. } => RawExpression::Number(*default),
            ParameterKind::Enum { default, .. } => RawExpression::Text(default.clone()),
        }
    }

    pub fn flag_name(&self, option: &str) -> String {
        format!("{}_{}", self.name, option)
    }

    /// Derived flag names, one per option.
    pub fn flag_names(&self) -> Vec<String> {
        self.options()
            .iter()
            .map(|option| self.flag_name(option))
            .collect()
    }

    /// One-hot encoding of an Enum value: one (flag, 1.0 | 0.0) pair per option.
    pub fn one_hot(&self, value: &str) -> Vec<(String, f64)> {
        self.options()
            .iter()
            .map(|option| {
                let flag = if option == value { 1.0 } else { 0.0 };
                (self.flag_name(option), flag)
            })
            .collect()
    }
}

/// The parameters of a model, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct ParameterCatalog {
    parameters: Vec<Parameter>,
    /// Exact name -> position.
    index: FxHashMap<String, usize>,
    /// Name or flag token -> positions of the parameters it may designate.
    tokens: FxHashMap<String, Vec<usize>>,
}

impl ParameterCatalog {
    /// Builds the catalog and its token index.
    ///
    /// # Returns
    /// An error for duplicate names, an Enum without options, or an Enum
    /// default that is not one of its options.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, CatalogError> {
        let mut index = FxHashMap::default();
        let mut tokens: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (position, parameter) in parameters.iter().enumerate() {
            if index.insert(parameter.name.clone(), position).is_some() {
                return Err(CatalogError::DuplicateParameter(parameter.name.clone()));
            }

            if let ParameterKind::Enum { default, options } = &parameter.kind {
                if options.is_empty() {
                    return Err(CatalogError::EmptyOptions(parameter.name.clone()));
                }
                if !options.contains(default) {
                    return Err(CatalogError::InvalidDefault {
                        parameter: parameter.name.clone(),
                        default: default.clone(),
                    });
                }
                for flag in parameter.flag_names() {
                    tokens.entry(flag).or_default().push(position);
                }
            }

            tokens
                .entry(parameter.name.clone())
                .or_default()
                .push(position);
        }

        for positions in tokens.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }

        Ok(ParameterCatalog {
            parameters,
            index,
            tokens,
        })
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    /// True when `name` is a declared parameter. Flag tokens do not count.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Finds the single parameter a token designates: the parameter itself,
    /// or the Enum parameter owning a `{parameter}_{option}` flag.
    pub fn find_corresponding(&self, token: &str) -> Result<&Parameter, LookupError> {
        match self.tokens.get(token).map(Vec::as_slice) {
            None | Some([]) => Err(LookupError::NotFound(token.to_string())),
            Some([single]) => Ok(&self.parameters[*single]),
            Some(many) => Err(LookupError::Ambiguous {
                token: token.to_string(),
                candidates: many
                    .iter()
                    .map(|&i| self.parameters[i].name.clone())
                    .collect(),
            }),
        }
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Number of declared parameters; flags are not counted.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl TryFrom<Vec<Parameter>> for ParameterCatalog {
    type Error = CatalogError;

    fn try_from(parameters: Vec<Parameter>) -> Result<Self, Self::Error> {
        ParameterCatalog::new(parameters)
    }
}

impl From<ParameterCatalog> for Vec<Parameter> {
    fn from(catalog: ParameterCatalog) -> Self {
        catalog.parameters
    }
}

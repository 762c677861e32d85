//! Dynamic call arguments.
//!
//! A [`ParameterSet`] is one unit of work handed to a task: a keyword map, a
//! positional tuple or a single scalar. Converting it into [`Arguments`]
//! applies the dispatch rule:
//!
//! - a keyword map becomes keyword arguments,
//! - a positional tuple becomes positional arguments,
//! - any other value becomes the single positional argument.
//!
//! ```rust
//! use ham_core::args::{Arguments, ParameterSet};
//! use serde_json::json;
//!
//! let args: Arguments = ParameterSet::from(json!({"a": 1, "b": 2})).into();
//! assert_eq!(args.kwarg::<i64>("b").unwrap(), 2);
//!
//! let args: Arguments = ParameterSet::positional([json!(1), json!(2)]).into();
//! assert_eq!(args.arg::<i64>(1).unwrap(), 2);
//!
//! let args: Arguments = ParameterSet::from(json!(5)).into();
//! assert_eq!(args.arg::<i64>(0).unwrap(), 5);
//! ```

use crate::errors::{HamError, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use serde_json::Value;

/// Keyword arguments, in insertion order.
pub type KeywordArgs = IndexMap<String, Value>;

/// Positional arguments keyed by their position.
pub type IndexedArgs = BTreeMap<usize, Value>;

/// One unit of work for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterSet {
    /// Expanded as keyword arguments.
    Keyword(KeywordArgs),
    /// Expanded as positional arguments.
    Positional(Vec<Value>),
    /// Passed as the single positional argument.
    Single(Value),
}

impl ParameterSet {
    /// Create a keyword parameter set.
    pub fn keyword<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Keyword(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a positional parameter set.
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Positional(values.into_iter().collect())
    }

    /// Create a single-value parameter set.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }

    /// Get the kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Keyword(_) => "keyword",
            Self::Positional(_) => "positional",
            Self::Single(_) => "single",
        }
    }
}

/// JSON objects map to keyword sets; everything else, arrays included, is a
/// single value. Use [`ParameterSet::positional`] for tuple-style expansion.
impl From<Value> for ParameterSet {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Keyword(map.into_iter().collect()),
            other => Self::Single(other),
        }
    }
}

impl From<KeywordArgs> for ParameterSet {
    fn from(map: KeywordArgs) -> Self {
        Self::Keyword(map)
    }
}

impl From<Vec<Value>> for ParameterSet {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

/// Materialized arguments for a single call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    /// Positional arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional: Vec<Value>,
    /// Keyword arguments.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub keyword: KeywordArgs,
}

impl Arguments {
    /// Create empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    #[must_use]
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Number of arguments of both kinds.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// Check if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Raw positional argument.
    pub fn arg_value(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Raw keyword argument.
    pub fn kwarg_value(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.arg_value(index).ok_or_else(|| {
            HamError::invalid_argument(format!(
                "missing positional argument {} (got {})",
                index,
                self.positional.len()
            ))
        })?;
        T::deserialize(value).map_err(|e| {
            HamError::invalid_argument(format!("positional argument {}: {}", index, e))
        })
    }

    /// Deserialize the keyword argument `name`.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.kwarg_value(name).ok_or_else(|| {
            HamError::invalid_argument(format!("missing keyword argument `{}`", name))
        })?;
        T::deserialize(value)
            .map_err(|e| HamError::invalid_argument(format!("keyword argument `{}`: {}", name, e)))
    }

    /// Deserialize the keyword argument `name`, or `default` when absent.
    pub fn kwarg_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        match self.kwarg_value(name) {
            Some(_) => self.kwarg(name),
            None => Ok(default),
        }
    }

    /// Split into positional arguments keyed by position plus keyword arguments.
    pub fn into_indexed(self) -> (IndexedArgs, KeywordArgs) {
        (self.positional.into_iter().enumerate().collect(), self.keyword)
    }

    /// Rebuild from [`Arguments::into_indexed`] parts.
    ///
    /// Positions are taken in ascending key order; gaps are closed.
    pub fn from_indexed(positional: IndexedArgs, keyword: KeywordArgs) -> Self {
        Self {
            positional: positional.into_values().collect(),
            keyword,
        }
    }
}

impl From<ParameterSet> for Arguments {
    fn from(params: ParameterSet) -> Self {
        match params {
            ParameterSet::Keyword(keyword) => Self {
                positional: Vec::new(),
                keyword,
            },
            ParameterSet::Positional(positional) => Self {
                positional,
                keyword: KeywordArgs::new(),
            },
            ParameterSet::Single(value) => Self {
                positional: vec![value],
                keyword: KeywordArgs::new(),
            },
        }
    }
}

impl From<Value> for Arguments {
    fn from(value: Value) -> Self {
        ParameterSet::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::keyword(
        ParameterSet::from(json!({"a": 1, "b": 2})),
        Arguments::new().with_kwarg("a", 1).with_kwarg("b", 2)
    )]
    #[case::positional(
        ParameterSet::positional([json!(1), json!(2)]),
        Arguments::new().with_arg(1).with_arg(2)
    )]
    #[case::scalar(ParameterSet::from(json!(5)), Arguments::new().with_arg(5))]
    #[case::list_is_scalar(
        ParameterSet::from(json!([1, 2])),
        Arguments::new().with_arg(json!([1, 2]))
    )]
    fn test_dispatch_rule(#[case] params: ParameterSet, #[case] expected: Arguments) {
        assert_eq!(Arguments::from(params), expected);
    }

    #[test]
    fn test_keyword_order_preserved() {
        let params = ParameterSet::keyword([("z", json!(1)), ("a", json!(2)), ("m", json!(3))]);
        let args = Arguments::from(params);
        let names: Vec<_> = args.keyword.keys().cloned().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_typed_access() {
        let args = Arguments::new()
            .with_arg("https://example.com")
            .with_kwarg("timeout", 30);

        assert_eq!(args.arg::<String>(0).unwrap(), "https://example.com");
        assert_eq!(args.kwarg::<u64>("timeout").unwrap(), 30);
        assert_eq!(args.kwarg_or::<u64>("retries", 3).unwrap(), 3);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_typed_access_errors() {
        let args = Arguments::new().with_arg("text");

        let err = args.arg::<u32>(0).unwrap_err();
        assert!(matches!(err, HamError::InvalidArgument(_)));

        let err = args.arg::<String>(3).unwrap_err();
        assert!(err.to_string().contains("missing positional argument 3"));

        let err = args.kwarg::<String>("name").unwrap_err();
        assert!(err.to_string().contains("`name`"));
    }

    #[test]
    fn test_indexed_roundtrip_with_edit() {
        let args = Arguments::new().with_arg(1).with_arg(2).with_kwarg("k", "v");
        let (mut positional, keyword) = args.into_indexed();
        assert_eq!(positional.get(&1), Some(&json!(2)));

        positional.insert(1, json!(20));
        let rebuilt = Arguments::from_indexed(positional, keyword);
        assert_eq!(rebuilt, Arguments::new().with_arg(1).with_arg(20).with_kwarg("k", "v"));
    }

    #[test]
    fn test_from_indexed_closes_gaps() {
        let mut positional = IndexedArgs::new();
        positional.insert(4, json!("b"));
        positional.insert(0, json!("a"));
        let args = Arguments::from_indexed(positional, KeywordArgs::new());
        assert_eq!(args.positional, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_parameter_set_serde() {
        let params = ParameterSet::positional([json!(1), json!("x")]);
        let encoded = serde_json::to_value(&params).unwrap();
        assert_eq!(encoded, json!({"kind": "positional", "value": [1, "x"]}));
        assert_eq!(params.kind(), "positional");
    }
}

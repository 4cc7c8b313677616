//! Per-invocation argument bindings
//!
//! Whether an argument is bound to one value or an ordered sequence is decided
//! at bind time from the argument's declared multiplicity, never from the
//! shape of the value.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingValue {
    Scalar(String),
    Sequence(Vec<String>),
}

impl BindingValue {
    /// All bound values in argument order (one for a scalar)
    pub fn values(&self) -> &[String] {
        match self {
            BindingValue::Scalar(value) => std::slice::from_ref(value),
            BindingValue::Sequence(values) => values,
        }
    }

    pub fn values_mut(&mut self) -> &mut [String] {
        match self {
            BindingValue::Scalar(value) => std::slice::from_mut(value),
            BindingValue::Sequence(values) => values,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            BindingValue::Scalar(value) => Some(value),
            BindingValue::Sequence(_) => None,
        }
    }
}

impl fmt::Display for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingValue::Scalar(value) => f.write_str(value),
            BindingValue::Sequence(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// Identifier -> bound value(s) for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, BindingValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, value: BindingValue) -> Option<BindingValue> {
        self.values.insert(identifier.into(), value)
    }

    pub fn get(&self, identifier: &str) -> Option<&BindingValue> {
        self.values.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut BindingValue> {
        self.values.get_mut(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.values.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Value of a single-valued binding
    pub fn scalar(&self, identifier: &str) -> Option<&str> {
        self.get(identifier).and_then(BindingValue::as_scalar)
    }

    /// Bound values of an argument interpreted as paths
    pub fn paths(&self, identifier: &str) -> Vec<PathBuf> {
        self.get(identifier)
            .map(|value| value.values().iter().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    /// Parse a single-valued binding into a typed value
    pub fn parse<T: FromStr>(&self, identifier: &str) -> Option<Result<T, T::Err>> {
        self.scalar(identifier).map(str::parse)
    }
}

impl FromIterator<(String, BindingValue)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, BindingValue)>>(iter: I) -> Self {
        Bindings {
            values: iter.into_iter().collect(),
        }
    }
}

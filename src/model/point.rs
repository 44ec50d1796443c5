//! Named values of model variables at a single evaluation point

use crate::error::{ModelError, Result};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map from variable name to its array value
///
/// Scalars are zero-dimensional arrays, per-origin and per-development values
/// are vectors, per-cell values are (origin, development) matrices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    values: BTreeMap<String, ArrayD<f64>>,
}

impl Point {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: ArrayD<f64>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.values.get(name)
    }

    /// Value for `name` or a `MissingValue` error
    pub fn require(&self, name: &str) -> Result<&ArrayD<f64>> {
        self.values
            .get(name)
            .ok_or_else(|| ModelError::MissingValue(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

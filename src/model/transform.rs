//! Deterministic computation nodes
//!
//! A node names its parents instead of holding their values, so any node can
//! be re-evaluated against a `Point` without re-running the builder.

use super::coords::Dim;
use super::point::Point;
use crate::error::{ModelError, Result};
use ndarray::{Array2, ArrayD, Ix1};
use serde::{Deserialize, Serialize};

/// Pure function of already-declared variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Elementwise exponential
    Exp { input: String },
    /// `out[o, d] = rows[o] * cols[d]`
    Outer { rows: String, cols: String },
}

impl Transform {
    pub fn exp(input: impl Into<String>) -> Self {
        Transform::Exp { input: input.into() }
    }

    pub fn outer(rows: impl Into<String>, cols: impl Into<String>) -> Self {
        Transform::Outer {
            rows: rows.into(),
            cols: cols.into(),
        }
    }

    pub fn parents(&self) -> Vec<&str> {
        match self {
            Transform::Exp { input } => vec![input.as_str()],
            Transform::Outer { rows, cols } => vec![rows.as_str(), cols.as_str()],
        }
    }

    /// Dims of the output given the dims of each parent, in `parents()` order
    pub fn output_dims(&self, name: &str, parent_dims: &[&[Dim]]) -> Result<Vec<Dim>> {
        match self {
            Transform::Exp { .. } => Ok(parent_dims[0].to_vec()),
            Transform::Outer { rows, cols } => {
                let (row_dims, col_dims) = (parent_dims[0], parent_dims[1]);
                if row_dims.len() != 1 || col_dims.len() != 1 || row_dims[0] == col_dims[0] {
                    return Err(ModelError::AxisMismatch(format!(
                        "`{name}` needs `{rows}` and `{cols}` to be vectors over different axes, got {row_dims:?} and {col_dims:?}"
                    )));
                }
                Ok(vec![row_dims[0], col_dims[0]])
            }
        }
    }

    /// Compute the node's value from the parent values in `point`
    pub fn evaluate(&self, point: &Point) -> Result<ArrayD<f64>> {
        match self {
            Transform::Exp { input } => Ok(point.require(input)?.mapv(f64::exp)),
            Transform::Outer { rows, cols } => {
                let r = as_vector(rows, point.require(rows)?)?;
                let c = as_vector(cols, point.require(cols)?)?;
                let out = Array2::from_shape_fn((r.len(), c.len()), |(i, j)| r[i] * c[j]);
                Ok(out.into_dyn())
            }
        }
    }
}

fn as_vector<'a>(name: &str, value: &'a ArrayD<f64>) -> Result<ndarray::ArrayView1<'a, f64>> {
    value
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| ModelError::DimensionMismatch {
            variable: name.to_string(),
            expected: vec![value.len()],
            actual: value.shape().to_vec(),
        })
}

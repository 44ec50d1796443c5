//! Loss triangle values and CSV loading

pub mod loader;

pub use loader::{load_triangle, load_triangle_from_reader};

use crate::error::{ModelError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A loss matrix with its axis labels
///
/// Cells that have not been observed yet hold NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub origin_period: Vec<String>,
    pub development_period: Vec<String>,
    pub values: Array2<f64>,
}

impl Triangle {
    /// Number of cells with a value
    pub fn observed_cells(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Re-index onto another set of axis labels
    ///
    /// Labels missing from this triangle become unobserved (NaN) cells. A label
    /// in this triangle that the target axes do not contain is an error, since
    /// its data would otherwise be dropped silently.
    pub fn align_to(&self, origin_period: &[String], development_period: &[String]) -> Result<Triangle> {
        for (axis, own, target) in [
            ("origin_period", &self.origin_period, origin_period),
            ("development_period", &self.development_period, development_period),
        ] {
            if let Some(label) = own.iter().find(|l| !target.contains(l)) {
                return Err(ModelError::AxisMismatch(format!(
                    "{axis} label `{label}` is not present on the target axis"
                )));
            }
        }

        let position = |labels: &[String], label: &String| labels.iter().position(|l| l == label);
        let values = Array2::from_shape_fn(
            (origin_period.len(), development_period.len()),
            |(i, j)| {
                match (
                    position(self.origin_period.as_slice(), &origin_period[i]),
                    position(self.development_period.as_slice(), &development_period[j]),
                ) {
                    (Some(o), Some(d)) => self.values[[o, d]],
                    _ => f64::NAN,
                }
            },
        );

        Ok(Triangle {
            origin_period: origin_period.to_vec(),
            development_period: development_period.to_vec(),
            values,
        })
    }
}

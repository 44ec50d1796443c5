//! Joint log density and the flat-vector interface for external samplers
//!
//! `Model::log_prob` works on named, constrained values. `UnconstrainedDensity`
//! lays the free variables out as one real vector, maps each element onto its
//! prior's support and adds the log-Jacobian of that map, which is what
//! gradient-based samplers expect.

use super::coords::Dim;
use super::distribution::Constraint;
use super::graph::{Model, VariableKind};
use super::point::Point;
use crate::error::{ModelError, Result};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;

/// A log density over a flat parameter vector
pub trait LogDensity {
    /// Length of the parameter vector
    fn dim(&self) -> usize;

    /// One name per element of the parameter vector
    fn parameter_names(&self) -> Vec<String>;

    /// Log density (up to a constant) at `theta`
    fn log_density(&self, theta: &[f64]) -> Result<f64>;
}

impl Model {
    /// Per-variable contributions to the joint log density
    ///
    /// `point` must hold every free variable; deterministic values are
    /// recomputed from them.
    pub fn log_prob_terms(&self, point: &Point) -> Result<BTreeMap<String, f64>> {
        let point = self.evaluate_deterministics(point)?;
        let mut terms = BTreeMap::new();

        for var in self.variables() {
            match &var.kind {
                VariableKind::Free { distribution } => {
                    let value = point.require(&var.name)?;
                    let lp: f64 = value.iter().map(|&x| distribution.log_density(x)).sum();
                    terms.insert(var.name.clone(), lp);
                }
                VariableKind::Observed {
                    likelihood,
                    data,
                    mask,
                } => {
                    terms.insert(var.name.clone(), likelihood.log_likelihood(&point, data, mask)?);
                }
                VariableKind::Deterministic { .. } => {}
            }
        }
        Ok(terms)
    }

    /// Joint log density: priors plus likelihood
    pub fn log_prob(&self, point: &Point) -> Result<f64> {
        Ok(self.log_prob_terms(point)?.values().sum())
    }

    /// Every free variable at its prior's default starting value
    pub fn initial_point(&self) -> Point {
        let mut point = Point::new();
        for var in self.free_variables() {
            if let Some(distribution) = var.distribution() {
                point.insert(
                    var.name.clone(),
                    ArrayD::from_elem(IxDyn(&var.shape), distribution.initial_value()),
                );
            }
        }
        point
    }

    pub fn unconstrained(&self) -> UnconstrainedDensity<'_> {
        UnconstrainedDensity::new(self)
    }
}

#[derive(Debug, Clone)]
struct Block {
    name: String,
    dims: Vec<Dim>,
    shape: Vec<usize>,
    offset: usize,
    size: usize,
    constraint: Constraint,
}

/// Free variables of a model flattened onto the real line
#[derive(Debug, Clone)]
pub struct UnconstrainedDensity<'a> {
    model: &'a Model,
    blocks: Vec<Block>,
    dim: usize,
}

impl<'a> UnconstrainedDensity<'a> {
    pub fn new(model: &'a Model) -> Self {
        let mut blocks = Vec::new();
        let mut offset = 0;
        for var in model.free_variables() {
            if let Some(distribution) = var.distribution() {
                let size = var.size();
                blocks.push(Block {
                    name: var.name.clone(),
                    dims: var.dims.clone(),
                    shape: var.shape.clone(),
                    offset,
                    size,
                    constraint: distribution.constraint(),
                });
                offset += size;
            }
        }
        Self {
            model,
            blocks,
            dim: offset,
        }
    }

    /// Support bounds of each element on the constrained scale
    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = Vec::with_capacity(self.dim);
        for var in self.model.free_variables() {
            if let Some(distribution) = var.distribution() {
                bounds.extend(std::iter::repeat(distribution.bounds()).take(var.size()));
            }
        }
        bounds
    }

    /// Unconstrained image of the model's initial point
    pub fn initial_position(&self) -> Result<Vec<f64>> {
        self.to_unconstrained(&self.model.initial_point())
    }

    /// Map a flat unconstrained vector to constrained free values
    pub fn to_point(&self, theta: &[f64]) -> Result<Point> {
        self.check_len(theta)?;
        let mut point = Point::new();
        for block in &self.blocks {
            let values: Vec<f64> = theta[block.offset..block.offset + block.size]
                .iter()
                .map(|&z| block.constraint.forward(z))
                .collect();
            let array = ArrayD::from_shape_vec(IxDyn(&block.shape), values).map_err(|_| {
                ModelError::DimensionMismatch {
                    variable: block.name.clone(),
                    expected: block.shape.clone(),
                    actual: vec![block.size],
                }
            })?;
            point.insert(block.name.clone(), array);
        }
        Ok(point)
    }

    /// Flatten constrained free values onto the unconstrained scale
    pub fn to_unconstrained(&self, point: &Point) -> Result<Vec<f64>> {
        let mut theta = Vec::with_capacity(self.dim);
        for block in &self.blocks {
            let value = point.require(&block.name)?;
            self.model.require(&block.name)?.check_shape(value)?;
            theta.extend(value.iter().map(|&x| block.constraint.inverse(x)));
        }
        Ok(theta)
    }

    fn check_len(&self, theta: &[f64]) -> Result<()> {
        if theta.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                variable: "theta".to_string(),
                expected: vec![self.dim],
                actual: vec![theta.len()],
            });
        }
        Ok(())
    }

    fn element_name(&self, block: &Block, flat: usize) -> String {
        if block.shape.is_empty() {
            return block.name.clone();
        }
        let coords = self.model.coords();
        let mut rem = flat;
        let mut labels = vec![String::new(); block.shape.len()];
        for axis in (0..block.shape.len()).rev() {
            let i = rem % block.shape[axis];
            rem /= block.shape[axis];
            labels[axis] = coords.labels(block.dims[axis])[i].clone();
        }
        format!("{}[{}]", block.name, labels.join(", "))
    }
}

impl LogDensity for UnconstrainedDensity<'_> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.dim);
        for block in &self.blocks {
            for flat in 0..block.size {
                names.push(self.element_name(block, flat));
            }
        }
        names
    }

    fn log_density(&self, theta: &[f64]) -> Result<f64> {
        let point = self.to_point(theta)?;
        let log_jacobian: f64 = self
            .blocks
            .iter()
            .flat_map(|b| {
                theta[b.offset..b.offset + b.size]
                    .iter()
                    .map(move |&z| b.constraint.log_abs_det_jacobian(z))
            })
            .sum();
        Ok(self.model.log_prob(&point)? + log_jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::coords::Coords;
    use crate::model::graph::ModelBuilder;
    use crate::model::likelihood::GammaLikelihood;
    use crate::model::transform::Transform;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    const CELL: [Dim; 2] = [Dim::OriginPeriod, Dim::DevelopmentPeriod];

    fn small_model() -> Model {
        let mut b = ModelBuilder::new(Coords::new(["AY1", "AY2"], ["12"]).unwrap());
        let log_u = b.normal("log_u", 0.0, 10.0, &[Dim::OriginPeriod]).unwrap();
        let u = b.deterministic("u", Transform::exp(&log_u)).unwrap();
        let pct = b.uniform("pct", 0.0, 2.0, &[Dim::DevelopmentPeriod]).unwrap();
        let mu = b.deterministic("mu", Transform::outer(&u, &pct)).unwrap();
        let sigma = b.half_normal("sigma", 10.0, &CELL).unwrap();
        b.observed_gamma(
            "y",
            GammaLikelihood::new(&mu, &sigma),
            arr2(&[[3.0], [5.0]]).into_dyn(),
            &CELL,
        )
        .unwrap();
        b.build()
    }

    fn point() -> Point {
        Point::new()
            .with("log_u", arr1(&[1.0, 2.0]).into_dyn())
            .with("pct", arr1(&[0.5]).into_dyn())
            .with("sigma", arr2(&[[1.5], [0.5]]).into_dyn())
    }

    #[test]
    fn test_log_prob_is_sum_of_terms() {
        let model = small_model();
        let terms = model.log_prob_terms(&point()).unwrap();
        assert_eq!(terms.len(), 4);
        let total: f64 = terms.values().sum();
        assert_relative_eq!(model.log_prob(&point()).unwrap(), total);
        assert_relative_eq!(terms["pct"], -(2.0f64).ln());
    }

    #[test]
    fn test_out_of_support_is_neg_infinity() {
        let model = small_model();
        let p = point().with("pct", arr1(&[2.5]).into_dyn());
        assert_eq!(model.log_prob(&p).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_missing_free_value_errors() {
        let model = small_model();
        let p = Point::new().with("log_u", arr1(&[1.0, 2.0]).into_dyn());
        assert!(matches!(model.log_prob(&p), Err(ModelError::MissingValue(_))));
    }

    #[test]
    fn test_unconstrained_layout() {
        let model = small_model();
        let density = model.unconstrained();
        assert_eq!(density.dim(), 5);
        assert_eq!(
            density.parameter_names(),
            vec![
                "log_u[AY1]",
                "log_u[AY2]",
                "pct[12]",
                "sigma[AY1, 12]",
                "sigma[AY2, 12]"
            ]
        );
        let bounds = density.parameter_bounds();
        assert_eq!(bounds[2], (0.0, 2.0));
        assert_eq!(bounds[4], (0.0, f64::INFINITY));
    }

    #[test]
    fn test_unconstrained_roundtrip_and_jacobian() {
        let model = small_model();
        let density = model.unconstrained();
        let theta = density.to_unconstrained(&point()).unwrap();
        let back = density.to_point(&theta).unwrap();
        assert_relative_eq!(back.require("pct").unwrap()[[0]], 0.5, epsilon = 1e-12);
        assert_relative_eq!(back.require("sigma").unwrap()[[1, 0]], 0.5, epsilon = 1e-12);

        // pct = 0.5 on (0, 2) sits at sigmoid(z) = 0.25; sigma contributes ln(sigma)
        let expected = model.log_prob(&point()).unwrap()
            + (2.0f64 * 0.25 * 0.75).ln()
            + 1.5f64.ln()
            + 0.5f64.ln();
        assert_relative_eq!(density.log_density(&theta).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_initial_position_is_finite() {
        let model = small_model();
        let density = model.unconstrained();
        let theta = density.initial_position().unwrap();
        assert_eq!(theta.len(), density.dim());
        assert_eq!(theta, density.to_unconstrained(&model.initial_point()).unwrap());
        assert!(density.log_density(&theta).unwrap().is_finite());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let model = small_model();
        assert!(model.unconstrained().log_density(&[0.0; 3]).is_err());
    }
}

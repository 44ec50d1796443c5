//! Explicit model builder and the immutable model graph
//!
//! Variables register into the builder in declaration order. Every node may
//! only reference variables declared before it, so declaration order is also a
//! valid evaluation order for deterministic nodes.

use super::coords::{Coords, Dim};
use super::distribution::Distribution;
use super::likelihood::GammaLikelihood;
use super::point::Point;
use super::transform::Transform;
use crate::error::{ModelError, Result};
use log::{debug, info};
use ndarray::{ArrayD, Dimension};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Handle to a declared variable, used to wire parents into later nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef(String);

impl VarRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&VarRef> for String {
    fn from(v: &VarRef) -> Self {
        v.0.clone()
    }
}

/// What a variable is and how its value arises
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum VariableKind {
    /// Latent parameter with a prior
    Free { distribution: Distribution },
    /// Pure function of other variables
    Deterministic { transform: Transform },
    /// Likelihood term fixed at observed data
    Observed {
        likelihood: GammaLikelihood,
        data: ArrayD<f64>,
        /// true where the cell was observed (data is not NaN)
        mask: ArrayD<bool>,
    },
}

impl VariableKind {
    pub fn role(&self) -> &'static str {
        match self {
            VariableKind::Free { .. } => "free",
            VariableKind::Deterministic { .. } => "deterministic",
            VariableKind::Observed { .. } => "observed",
        }
    }
}

/// A named, dimensioned node in the model
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<Dim>,
    pub shape: Vec<usize>,
    #[serde(flatten)]
    pub kind: VariableKind,
}

impl Variable {
    pub fn is_free(&self) -> bool {
        matches!(self.kind, VariableKind::Free { .. })
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self.kind, VariableKind::Deterministic { .. })
    }

    pub fn is_observed(&self) -> bool {
        matches!(self.kind, VariableKind::Observed { .. })
    }

    /// Number of scalar elements
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Prior of a free variable
    pub fn distribution(&self) -> Option<&Distribution> {
        match &self.kind {
            VariableKind::Free { distribution } => Some(distribution),
            _ => None,
        }
    }

    /// Observed data of a likelihood term
    pub fn observed_data(&self) -> Option<&ArrayD<f64>> {
        match &self.kind {
            VariableKind::Observed { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Check a candidate value has this variable's shape
    pub fn check_shape(&self, value: &ArrayD<f64>) -> Result<()> {
        if value.shape() != self.shape.as_slice() {
            return Err(ModelError::DimensionMismatch {
                variable: self.name.clone(),
                expected: self.shape.clone(),
                actual: value.shape().to_vec(),
            });
        }
        Ok(())
    }
}

/// Collects declarations for a single model
///
/// The builder is owned by the construction call; dropping it on an error
/// discards everything declared so far.
#[derive(Debug)]
pub struct ModelBuilder {
    coords: Coords,
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    options: BTreeMap<String, serde_json::Value>,
}

impl ModelBuilder {
    pub fn new(coords: Coords) -> Self {
        Self {
            coords,
            variables: Vec::new(),
            index: HashMap::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    /// Attach pass-through options to the finished model
    pub fn options(&mut self, options: BTreeMap<String, serde_json::Value>) -> &mut Self {
        self.options = options;
        self
    }

    /// Declare a latent variable with the given prior
    pub fn free(&mut self, name: &str, distribution: Distribution, dims: &[Dim]) -> Result<VarRef> {
        distribution.validate()?;
        self.register(name, dims.to_vec(), VariableKind::Free { distribution })
    }

    pub fn normal(&mut self, name: &str, mu: f64, sigma: f64, dims: &[Dim]) -> Result<VarRef> {
        self.free(name, Distribution::Normal { mu, sigma }, dims)
    }

    pub fn uniform(&mut self, name: &str, lower: f64, upper: f64, dims: &[Dim]) -> Result<VarRef> {
        self.free(name, Distribution::Uniform { lower, upper }, dims)
    }

    pub fn half_normal(&mut self, name: &str, sigma: f64, dims: &[Dim]) -> Result<VarRef> {
        self.free(name, Distribution::HalfNormal { sigma }, dims)
    }

    /// Declare a deterministic node; its dims follow from its parents
    pub fn deterministic(&mut self, name: &str, transform: Transform) -> Result<VarRef> {
        let parent_dims = transform
            .parents()
            .into_iter()
            .map(|p| self.lookup(p).map(|v| v.dims.as_slice()))
            .collect::<Result<Vec<_>>>()?;
        let dims = transform.output_dims(name, &parent_dims)?;
        self.register(name, dims, VariableKind::Deterministic { transform })
    }

    /// Declare a Gamma likelihood fixed at `data`
    ///
    /// `data` must have the shape of `dims`. Every non-NaN entry must be
    /// positive and finite. NaN marks an unobserved cell: it is marginalised
    /// out of the likelihood rather than imputed, so no latent variable is
    /// declared for it and the model yields no values for those cells.
    pub fn observed_gamma(
        &mut self,
        name: &str,
        likelihood: GammaLikelihood,
        data: ArrayD<f64>,
        dims: &[Dim],
    ) -> Result<VarRef> {
        for parent in likelihood.parents() {
            let parent_dims = &self.lookup(parent)?.dims;
            if parent_dims.as_slice() != dims {
                return Err(ModelError::AxisMismatch(format!(
                    "`{name}` is indexed by {dims:?} but its parameter `{parent}` is indexed by {parent_dims:?}"
                )));
            }
        }

        let expected = self.coords.shape(dims);
        if data.shape() != expected.as_slice() {
            return Err(ModelError::DimensionMismatch {
                variable: name.to_string(),
                expected,
                actual: data.shape().to_vec(),
            });
        }

        for (idx, &value) in data.indexed_iter() {
            if value.is_nan() {
                continue;
            }
            if !(value.is_finite() && value > 0.0) {
                return Err(self.domain_error(name, dims, idx.slice(), value));
            }
        }

        let mask = data.mapv(|v| !v.is_nan());
        let observed = mask.iter().filter(|&&m| m).count();
        if observed == 0 {
            let origin = vec![0; dims.len()];
            return Err(self.domain_error(name, dims, &origin, f64::NAN));
        }
        if observed < mask.len() {
            debug!("{}: {} of {} cells unobserved", name, mask.len() - observed, mask.len());
        }

        self.register(
            name,
            dims.to_vec(),
            VariableKind::Observed {
                likelihood,
                data,
                mask,
            },
        )
    }

    /// Freeze the declarations into a model
    pub fn build(self) -> Model {
        info!(
            "Built model with {} variables over {} origin x {} development periods",
            self.variables.len(),
            self.coords.len(Dim::OriginPeriod),
            self.coords.len(Dim::DevelopmentPeriod),
        );
        Model {
            coords: self.coords,
            variables: self.variables,
            index: self.index,
            options: self.options,
        }
    }

    fn lookup(&self, name: &str) -> Result<&Variable> {
        self.index
            .get(name)
            .map(|&i| &self.variables[i])
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }

    fn register(&mut self, name: &str, dims: Vec<Dim>, kind: VariableKind) -> Result<VarRef> {
        if self.index.contains_key(name) {
            return Err(ModelError::DuplicateVariable(name.to_string()));
        }
        let shape = self.coords.shape(&dims);
        debug!("Declared {} `{}` with dims {:?} shape {:?}", kind.role(), name, dims, shape);

        self.index.insert(name.to_string(), self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            dims,
            shape,
            kind,
        });
        Ok(VarRef(name.to_string()))
    }

    fn domain_error(&self, name: &str, dims: &[Dim], idx: &[usize], value: f64) -> ModelError {
        let label = |axis: Dim| {
            dims.iter()
                .position(|&d| d == axis)
                .and_then(|pos| self.coords.labels(axis).get(idx[pos]).cloned())
                .unwrap_or_default()
        };
        ModelError::Domain {
            variable: name.to_string(),
            origin: label(Dim::OriginPeriod),
            development: label(Dim::DevelopmentPeriod),
            value,
        }
    }
}

/// Immutable declarative description of a joint model
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    coords: Coords,
    variables: Vec<Variable>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    options: BTreeMap<String, serde_json::Value>,
}

/// One-line view of a variable for logs and reports
#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub role: &'static str,
    pub dims: Vec<Dim>,
    pub shape: Vec<usize>,
    pub detail: String,
}

impl Model {
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    /// All variables in declaration order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    /// Variable by name or an `UnknownVariable` error
    pub fn require(&self, name: &str) -> Result<&Variable> {
        self.variable(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn free_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_free())
    }

    pub fn deterministics(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_deterministic())
    }

    pub fn observed(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_observed())
    }

    pub fn shape_of(&self, name: &str) -> Option<&[usize]> {
        self.variable(name).map(|v| v.shape.as_slice())
    }

    /// Options passed through at construction, unused by the model itself
    pub fn options(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.options
    }

    /// Fill in every deterministic node from the free values in `point`
    ///
    /// Free values are checked against their declared shapes; existing
    /// deterministic entries are recomputed.
    pub fn evaluate_deterministics(&self, point: &Point) -> Result<Point> {
        let mut out = point.clone();
        for var in &self.variables {
            match &var.kind {
                VariableKind::Free { .. } => var.check_shape(point.require(&var.name)?)?,
                VariableKind::Deterministic { transform } => {
                    let value = transform.evaluate(&out)?;
                    var.check_shape(&value)?;
                    out.insert(var.name.clone(), value);
                }
                VariableKind::Observed { .. } => {}
            }
        }
        Ok(out)
    }

    pub fn describe(&self) -> Vec<VariableSummary> {
        self.variables
            .iter()
            .map(|v| {
                let detail = match &v.kind {
                    VariableKind::Free { distribution } => format!("{distribution:?}"),
                    VariableKind::Deterministic { transform } => format!("{transform:?}"),
                    VariableKind::Observed { likelihood, mask, .. } => format!(
                        "Gamma(mu={}, sigma={}, {:?}), {} of {} cells observed",
                        likelihood.mu,
                        likelihood.sigma,
                        likelihood.parameterization,
                        mask.iter().filter(|&&m| m).count(),
                        mask.len()
                    ),
                };
                VariableSummary {
                    name: v.name.clone(),
                    role: v.kind.role(),
                    dims: v.dims.clone(),
                    shape: v.shape.clone(),
                    detail,
                }
            })
            .collect()
    }

    /// JSON description of the whole graph including observed data
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    const CELL: [Dim; 2] = [Dim::OriginPeriod, Dim::DevelopmentPeriod];

    fn builder() -> ModelBuilder {
        ModelBuilder::new(Coords::new(["AY1", "AY2"], ["12", "24", "36"]).unwrap())
    }

    #[test]
    fn test_declaration_order_and_shapes() {
        let mut b = builder();
        let log_u = b.normal("log_u", 0.0, 10.0, &[Dim::OriginPeriod]).unwrap();
        let u = b.deterministic("u", Transform::exp(&log_u)).unwrap();
        let pct = b.uniform("pct", 0.0, 2.0, &[Dim::DevelopmentPeriod]).unwrap();
        let mu = b.deterministic("mu", Transform::outer(&u, &pct)).unwrap();
        b.half_normal("sigma", 10.0, &CELL).unwrap();
        let model = b.build();

        assert_eq!(model.names(), vec!["log_u", "u", "pct", "mu", "sigma"]);
        assert_eq!(model.shape_of("u"), Some(&[2][..]));
        assert_eq!(model.shape_of("pct"), Some(&[3][..]));
        assert_eq!(model.shape_of(mu.name()), Some(&[2, 3][..]));
        assert_eq!(model.free_variables().count(), 3);
        assert_eq!(model.deterministics().count(), 2);
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let mut b = builder();
        b.normal("x", 0.0, 1.0, &[]).unwrap();
        assert!(matches!(
            b.normal("x", 0.0, 1.0, &[]),
            Err(ModelError::DuplicateVariable(_))
        ));
        assert!(matches!(
            b.deterministic("y", Transform::exp("missing")),
            Err(ModelError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_invalid_prior_rejected() {
        let mut b = builder();
        assert!(b.half_normal("s", 0.0, &[]).is_err());
        assert!(b.uniform("p", 1.0, 0.5, &[]).is_err());
    }

    fn cell_builder() -> ModelBuilder {
        let mut b = builder();
        b.half_normal("mu", 10.0, &CELL).unwrap();
        b.half_normal("sigma", 10.0, &CELL).unwrap();
        b
    }

    #[test]
    fn test_observed_shape_checked() {
        let mut b = cell_builder();
        let data = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let err = b
            .observed_gamma("y", GammaLikelihood::new("mu", "sigma"), data, &CELL)
            .unwrap_err();
        match err {
            ModelError::DimensionMismatch { expected, actual, .. } => {
                assert_eq!(expected, vec![2, 3]);
                assert_eq!(actual, vec![2, 2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_observed_domain_checked() {
        let mut b = cell_builder();
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 0.0, 6.0]]).into_dyn();
        let err = b
            .observed_gamma("y", GammaLikelihood::new("mu", "sigma"), data, &CELL)
            .unwrap_err();
        match err {
            ModelError::Domain { origin, development, value, .. } => {
                assert_eq!(origin, "AY2");
                assert_eq!(development, "24");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_observed_nan_is_masked() {
        let mut b = cell_builder();
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, f64::NAN]]).into_dyn();
        b.observed_gamma("y", GammaLikelihood::new("mu", "sigma"), data, &CELL)
            .unwrap();
        let model = b.build();
        match &model.variable("y").unwrap().kind {
            VariableKind::Observed { mask, .. } => {
                assert!(mask[[0, 2]]);
                assert!(!mask[[1, 2]]);
            }
            _ => panic!("y should be observed"),
        }
        assert_eq!(model.names(), vec!["mu", "sigma", "y"]);
        assert_eq!(model.free_variables().count(), 2);
    }

    #[test]
    fn test_all_nan_rejected() {
        let mut b = cell_builder();
        let data = ArrayD::from_elem(vec![2, 3], f64::NAN);
        assert!(matches!(
            b.observed_gamma("y", GammaLikelihood::new("mu", "sigma"), data, &CELL),
            Err(ModelError::Domain { .. })
        ));
    }

    #[test]
    fn test_observed_parent_dims_must_match() {
        let mut b = builder();
        b.half_normal("mu", 10.0, &[Dim::OriginPeriod]).unwrap();
        b.half_normal("sigma", 10.0, &CELL).unwrap();
        let data = ArrayD::from_elem(vec![2, 3], 1.0);
        assert!(matches!(
            b.observed_gamma("y", GammaLikelihood::new("mu", "sigma"), data, &CELL),
            Err(ModelError::AxisMismatch(_))
        ));
    }

    #[test]
    fn test_evaluate_deterministics() {
        let mut b = builder();
        let log_u = b.normal("log_u", 0.0, 10.0, &[Dim::OriginPeriod]).unwrap();
        b.deterministic("u", Transform::exp(&log_u)).unwrap();
        let model = b.build();

        let point = Point::new().with("log_u", arr1(&[0.0, 2.0f64.ln()]).into_dyn());
        let full = model.evaluate_deterministics(&point).unwrap();
        let u = full.require("u").unwrap();
        assert!((u[[0]] - 1.0).abs() < 1e-12);
        assert!((u[[1]] - 2.0).abs() < 1e-12);

        let bad = Point::new().with("log_u", arr1(&[0.0]).into_dyn());
        assert!(matches!(
            model.evaluate_deterministics(&bad),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }
}

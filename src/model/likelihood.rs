//! Gamma likelihood expressed through a mean and a dispersion variable

use super::distribution::Distribution;
use super::point::Point;
use crate::error::{ModelError, Result};
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// How (mu, sigma) map onto the Gamma shape and rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaParameterization {
    /// `alpha = mu / sigma^2`, `beta = sigma^2 / mu`
    ///
    /// Implied mean is `alpha / beta = mu^2 / sigma^4`.
    #[default]
    MeanOverVariance,
    /// `alpha = mu^2 / sigma^2`, `beta = mu / sigma^2`
    ///
    /// Mean `mu`, standard deviation `sigma`.
    MeanStdDev,
}

impl GammaParameterization {
    /// Shape and rate for one cell
    pub fn shape_rate(&self, mu: f64, sigma: f64) -> (f64, f64) {
        let var = sigma * sigma;
        match self {
            GammaParameterization::MeanOverVariance => (mu / var, var / mu),
            GammaParameterization::MeanStdDev => (mu * mu / var, mu / var),
        }
    }
}

/// Observed Gamma term whose parameters come from two named variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaLikelihood {
    /// Variable holding the per-cell location
    pub mu: String,
    /// Variable holding the per-cell dispersion
    pub sigma: String,
    #[serde(default)]
    pub parameterization: GammaParameterization,
}

impl GammaLikelihood {
    pub fn new(mu: impl Into<String>, sigma: impl Into<String>) -> Self {
        Self {
            mu: mu.into(),
            sigma: sigma.into(),
            parameterization: GammaParameterization::default(),
        }
    }

    pub fn with_parameterization(mut self, parameterization: GammaParameterization) -> Self {
        self.parameterization = parameterization;
        self
    }

    pub fn parents(&self) -> Vec<&str> {
        vec![self.mu.as_str(), self.sigma.as_str()]
    }

    /// Per-cell (alpha, beta) arrays at `point`
    pub fn parameters(&self, point: &Point) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        let mu = point.require(&self.mu)?;
        let sigma = point.require(&self.sigma)?;
        if mu.shape() != sigma.shape() {
            return Err(ModelError::DimensionMismatch {
                variable: self.sigma.clone(),
                expected: mu.shape().to_vec(),
                actual: sigma.shape().to_vec(),
            });
        }

        let mut alpha: ArrayD<f64> = ArrayD::zeros(mu.raw_dim());
        let mut beta: ArrayD<f64> = ArrayD::zeros(mu.raw_dim());
        Zip::from(&mut alpha)
            .and(&mut beta)
            .and(mu)
            .and(sigma)
            .for_each(|a, b, &m, &s| {
                let (shape, rate) = self.parameterization.shape_rate(m, s);
                *a = shape;
                *b = rate;
            });
        Ok((alpha, beta))
    }

    /// `alpha / beta` for every cell
    pub fn implied_mean(&self, point: &Point) -> Result<ArrayD<f64>> {
        let (alpha, beta) = self.parameters(point)?;
        Ok(alpha / beta)
    }

    /// Per-cell distributions at `point`
    pub fn cell_distributions(&self, point: &Point) -> Result<ArrayD<Distribution>> {
        let (alpha, beta) = self.parameters(point)?;
        let mut out = ArrayD::from_elem(alpha.raw_dim(), Distribution::Gamma { alpha: 1.0, beta: 1.0 });
        Zip::from(&mut out)
            .and(&alpha)
            .and(&beta)
            .for_each(|d, &a, &b| *d = Distribution::Gamma { alpha: a, beta: b });
        Ok(out)
    }

    /// Sum of cell log densities over cells where `mask` is true
    ///
    /// A cell whose parameters are not positive and finite contributes `-inf`.
    pub fn log_likelihood(
        &self,
        point: &Point,
        data: &ArrayD<f64>,
        mask: &ArrayD<bool>,
    ) -> Result<f64> {
        let (alpha, beta) = self.parameters(point)?;
        if alpha.shape() != data.shape() {
            return Err(ModelError::DimensionMismatch {
                variable: self.mu.clone(),
                expected: data.shape().to_vec(),
                actual: alpha.shape().to_vec(),
            });
        }

        let mut total = 0.0;
        Zip::from(&alpha)
            .and(&beta)
            .and(data)
            .and(mask)
            .for_each(|&a, &b, &x, &observed| {
                if !observed {
                    return;
                }
                let cell = Distribution::Gamma { alpha: a, beta: b };
                total += if cell.validate().is_ok() {
                    cell.log_density(x)
                } else {
                    f64::NEG_INFINITY
                };
            });
        Ok(total)
    }
}

//! Distribution primitives used by model variables
//!
//! Every random variable in a model carries one of these variants together with
//! its dims. The variant knows its own log density, support, default starting
//! value, how to draw from itself, and how to map its support onto the real line
//! for gradient-based samplers.

use crate::error::{ModelError, Result};
use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::{FRAC_2_PI, PI};

/// Tagged distribution variant with its scalar hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Normal(mu, sigma)
    Normal { mu: f64, sigma: f64 },
    /// Continuous uniform on [lower, upper]
    Uniform { lower: f64, upper: f64 },
    /// Normal(0, sigma) folded onto [0, inf)
    HalfNormal { sigma: f64 },
    /// Gamma with shape `alpha` and rate `beta`
    Gamma { alpha: f64, beta: f64 },
}

impl Distribution {
    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Normal { .. } => "normal",
            Distribution::Uniform { .. } => "uniform",
            Distribution::HalfNormal { .. } => "half_normal",
            Distribution::Gamma { .. } => "gamma",
        }
    }

    /// Check hyperparameters
    pub fn validate(&self) -> Result<()> {
        match *self {
            Distribution::Normal { mu, sigma } => {
                finite("mu", mu)?;
                positive("sigma", sigma)
            }
            Distribution::Uniform { lower, upper } => {
                finite("lower", lower)?;
                finite("upper", upper)?;
                if lower >= upper {
                    return Err(ModelError::InvalidParameter {
                        param: "upper".to_string(),
                        value: upper,
                        constraint: "must be greater than lower",
                    });
                }
                Ok(())
            }
            Distribution::HalfNormal { sigma } => positive("sigma", sigma),
            Distribution::Gamma { alpha, beta } => {
                positive("alpha", alpha)?;
                positive("beta", beta)
            }
        }
    }

    /// Closed support bounds (lower, upper)
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Distribution::Normal { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Distribution::Uniform { lower, upper } => (lower, upper),
            Distribution::HalfNormal { .. } => (0.0, f64::INFINITY),
            Distribution::Gamma { .. } => (0.0, f64::INFINITY),
        }
    }

    pub fn in_support(&self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        match *self {
            Distribution::Normal { .. } => x.is_finite(),
            Distribution::Uniform { lower, upper } => (lower..=upper).contains(&x),
            Distribution::HalfNormal { .. } => x >= 0.0 && x.is_finite(),
            Distribution::Gamma { .. } => x > 0.0 && x.is_finite(),
        }
    }

    /// Log density at `x`; `-inf` outside the support
    pub fn log_density(&self, x: f64) -> f64 {
        if !self.in_support(x) {
            return f64::NEG_INFINITY;
        }
        match *self {
            Distribution::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                -0.5 * (2.0 * PI).ln() - sigma.ln() - 0.5 * z * z
            }
            Distribution::Uniform { lower, upper } => -(upper - lower).ln(),
            Distribution::HalfNormal { sigma } => {
                let z = x / sigma;
                0.5 * FRAC_2_PI.ln() - sigma.ln() - 0.5 * z * z
            }
            Distribution::Gamma { alpha, beta } => {
                alpha * beta.ln() - ln_gamma(alpha) + (alpha - 1.0) * x.ln() - beta * x
            }
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Normal { mu, .. } => mu,
            Distribution::Uniform { lower, upper } => 0.5 * (lower + upper),
            Distribution::HalfNormal { sigma } => sigma * FRAC_2_PI.sqrt(),
            Distribution::Gamma { alpha, beta } => alpha / beta,
        }
    }

    /// Default starting value for samplers and optimisers
    pub fn initial_value(&self) -> f64 {
        match *self {
            Distribution::HalfNormal { sigma } => sigma,
            _ => self.mean(),
        }
    }

    /// Draw one value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.validate()?;
        let value = match *self {
            Distribution::Normal { mu, sigma } => rand_distr::Normal::new(mu, sigma)
                .map_err(|_| invalid("sigma", sigma, "normal scale rejected"))?
                .sample(rng),
            Distribution::Uniform { lower, upper } => {
                rand_distr::Uniform::new_inclusive(lower, upper).sample(rng)
            }
            Distribution::HalfNormal { sigma } => rand_distr::Normal::new(0.0, sigma)
                .map_err(|_| invalid("sigma", sigma, "normal scale rejected"))?
                .sample(rng)
                .abs(),
            Distribution::Gamma { alpha, beta } => rand_distr::Gamma::new(alpha, 1.0 / beta)
                .map_err(|_| invalid("alpha", alpha, "gamma shape/scale rejected"))?
                .sample(rng),
        };
        Ok(value)
    }

    /// Transform that maps the support onto the real line
    pub fn constraint(&self) -> Constraint {
        match *self {
            Distribution::Normal { .. } => Constraint::Real,
            Distribution::Uniform { lower, upper } => Constraint::Interval { lower, upper },
            Distribution::HalfNormal { .. } | Distribution::Gamma { .. } => Constraint::Positive,
        }
    }
}

/// Bijection between an unconstrained real and a distribution's support
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Identity
    Real,
    /// Scaled logistic onto (lower, upper)
    Interval { lower: f64, upper: f64 },
    /// Exponential onto (0, inf)
    Positive,
}

impl Constraint {
    /// Unconstrained -> constrained
    pub fn forward(&self, z: f64) -> f64 {
        match *self {
            Constraint::Real => z,
            Constraint::Interval { lower, upper } => lower + (upper - lower) * sigmoid(z),
            Constraint::Positive => z.exp(),
        }
    }

    /// Constrained -> unconstrained
    pub fn inverse(&self, x: f64) -> f64 {
        match *self {
            Constraint::Real => x,
            Constraint::Interval { lower, upper } => ((x - lower) / (upper - x)).ln(),
            Constraint::Positive => x.ln(),
        }
    }

    /// log |dx/dz| at `z`
    pub fn log_abs_det_jacobian(&self, z: f64) -> f64 {
        match *self {
            Constraint::Real => 0.0,
            // log(sigmoid(z)) + log(1 - sigmoid(z)) = -softplus(-z) - softplus(z)
            Constraint::Interval { lower, upper } => {
                (upper - lower).ln() - softplus(-z) - softplus(z)
            }
            Constraint::Positive => z,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn invalid(param: &str, value: f64, constraint: &'static str) -> ModelError {
    ModelError::InvalidParameter {
        param: param.to_string(),
        value,
        constraint,
    }
}

fn finite(param: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(param, value, "must be finite"))
    }
}

fn positive(param: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(param, value, "must be finite and > 0"))
    }
}

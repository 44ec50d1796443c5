//! Configuration for the paid/reported loss model

use crate::error::Result;
use crate::model::GammaParameterization;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prior hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Mean of the Normal prior on log expected ultimate loss
    pub log_ultimate_mu: f64,

    /// Std dev of the Normal prior on log expected ultimate loss
    pub log_ultimate_sigma: f64,

    /// Upper bound of the Uniform(0, upper) prior on % of ultimate reported
    /// Reported can exceed ultimate when case reserves are set conservatively
    pub pct_reported_upper: f64,

    /// Upper bound of the Uniform(0, upper) prior on % of ultimate paid
    /// Paid rarely exceeds ultimate, but it is not ruled out
    pub pct_paid_upper: f64,

    /// Scale of the HalfNormal prior on reported-loss dispersion
    pub sigma_reported_scale: f64,

    /// Scale of the HalfNormal prior on paid-loss dispersion
    pub sigma_paid_scale: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            log_ultimate_mu: 0.0,
            log_ultimate_sigma: 10.0,
            pct_reported_upper: 2.0,
            pct_paid_upper: 1.2,
            sigma_reported_scale: 10.0,
            sigma_paid_scale: 10.0,
        }
    }
}

/// Everything `build_model` accepts beyond the axes and triangles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Prior hyperparameters
    pub priors: PriorConfig,

    /// Mapping of (mu, sigma) onto Gamma shape/rate for both likelihoods
    pub gamma_parameterization: GammaParameterization,

    /// Extra keyword options, stored on the model but not interpreted
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ModelConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Attach a pass-through option
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priors() {
        let priors = PriorConfig::default();
        assert_eq!(priors.log_ultimate_mu, 0.0);
        assert_eq!(priors.log_ultimate_sigma, 10.0);
        assert_eq!(priors.pct_reported_upper, 2.0);
        assert_eq!(priors.pct_paid_upper, 1.2);
        assert_eq!(priors.sigma_reported_scale, 10.0);
        assert_eq!(priors.sigma_paid_scale, 10.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ModelConfig::from_json_str(
            r#"{ "priors": { "pct_paid_upper": 1.5 }, "options": { "chains": 4 } }"#,
        )
        .unwrap();
        assert_eq!(config.priors.pct_paid_upper, 1.5);
        assert_eq!(config.priors.pct_reported_upper, 2.0);
        assert_eq!(
            config.gamma_parameterization,
            GammaParameterization::MeanOverVariance
        );
        assert_eq!(config.options["chains"], serde_json::json!(4));
    }

    #[test]
    fn test_parameterization_from_json() {
        let config =
            ModelConfig::from_json_str(r#"{ "gamma_parameterization": "mean_std_dev" }"#).unwrap();
        assert_eq!(config.gamma_parameterization, GammaParameterization::MeanStdDev);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ModelConfig::from_json_str("{}").unwrap(), ModelConfig::default());
    }
}

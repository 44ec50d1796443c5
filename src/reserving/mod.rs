//! Single-level paid/reported loss reserving model
//!
//! Expected ultimate loss per origin period is log-normal. Each development
//! period has an expected percentage of ultimate reported and paid. Observed
//! reported and paid losses are Gamma distributed around
//! `ultimate[o] * pct[d]` with a per-cell dispersion.
//!
//! # Example
//!
//! ```rust,ignore
//! use loss_reserving::reserving::{build_model, ModelConfig};
//! use ndarray::arr2;
//!
//! let reported = arr2(&[[100.0, 150.0], [120.0, 180.0], [90.0, 140.0]]);
//! let paid = arr2(&[[80.0, 130.0], [90.0, 150.0], [70.0, 110.0]]);
//! let model = build_model(
//!     [2019, 2020, 2021],
//!     [12, 24],
//!     reported,
//!     paid,
//!     &ModelConfig::default(),
//! )?;
//! let lp = model.log_prob(&model.initial_point())?;
//! ```

mod config;

pub use config::{ModelConfig, PriorConfig};

use crate::error::{ModelError, Result};
use crate::model::{Coords, Dim, GammaLikelihood, Model, ModelBuilder, Transform};
use log::info;
use ndarray::Array2;

pub const LOG_EXPECTED_ULTIMATE_LOSS: &str = "log_expected_ultimate_loss";
pub const EXPECTED_PCT_ULTIMATE_REPORTED: &str = "expected_pct_ultimate_reported";
pub const EXPECTED_PCT_ULTIMATE_PAID: &str = "expected_pct_ultimate_paid";
pub const SIGMA_REPORTED: &str = "sigma_reported";
pub const SIGMA_PAID: &str = "sigma_paid";
pub const EXPECTED_ULTIMATE_LOSS: &str = "expected_ultimate_loss";
pub const MU_REPORTED: &str = "mu_reported";
pub const MU_PAID: &str = "mu_paid";
pub const REPORTED_LOSS: &str = "reported_loss";
pub const PAID_LOSS: &str = "paid_loss";

/// Every variable the model declares, in declaration order
pub const VARIABLE_NAMES: [&str; 10] = [
    LOG_EXPECTED_ULTIMATE_LOSS,
    EXPECTED_PCT_ULTIMATE_REPORTED,
    EXPECTED_PCT_ULTIMATE_PAID,
    SIGMA_REPORTED,
    SIGMA_PAID,
    EXPECTED_ULTIMATE_LOSS,
    MU_REPORTED,
    MU_PAID,
    REPORTED_LOSS,
    PAID_LOSS,
];

const ORIGIN: [Dim; 1] = [Dim::OriginPeriod];
const DEVELOPMENT: [Dim; 1] = [Dim::DevelopmentPeriod];
const CELL: [Dim; 2] = [Dim::OriginPeriod, Dim::DevelopmentPeriod];

/// Build the joint paid/reported loss model
///
/// `observed_reported_loss` and `observed_paid_loss` must both have shape
/// (origin periods, development periods). Entries must be positive and
/// finite; NaN marks a cell that has not been observed yet.
pub fn build_model<O, D>(
    origin_period: O,
    development_period: D,
    observed_reported_loss: Array2<f64>,
    observed_paid_loss: Array2<f64>,
    config: &ModelConfig,
) -> Result<Model>
where
    O: IntoIterator,
    O::Item: ToString,
    D: IntoIterator,
    D::Item: ToString,
{
    let coords = Coords::new(origin_period, development_period)?;
    let expected = coords.shape(&CELL);
    for (name, data) in [
        (REPORTED_LOSS, &observed_reported_loss),
        (PAID_LOSS, &observed_paid_loss),
    ] {
        if data.shape() != expected.as_slice() {
            return Err(ModelError::DimensionMismatch {
                variable: name.to_string(),
                expected,
                actual: data.shape().to_vec(),
            });
        }
    }

    let priors = &config.priors;
    let mut b = ModelBuilder::new(coords);
    b.options(config.options.clone());

    // ---- priors ----
    let log_ultimate = b.normal(
        LOG_EXPECTED_ULTIMATE_LOSS,
        priors.log_ultimate_mu,
        priors.log_ultimate_sigma,
        &ORIGIN,
    )?;
    let pct_reported = b.uniform(
        EXPECTED_PCT_ULTIMATE_REPORTED,
        0.0,
        priors.pct_reported_upper,
        &DEVELOPMENT,
    )?;
    let pct_paid = b.uniform(EXPECTED_PCT_ULTIMATE_PAID, 0.0, priors.pct_paid_upper, &DEVELOPMENT)?;
    let sigma_reported = b.half_normal(SIGMA_REPORTED, priors.sigma_reported_scale, &CELL)?;
    let sigma_paid = b.half_normal(SIGMA_PAID, priors.sigma_paid_scale, &CELL)?;

    // ---- deterministic ----
    let ultimate = b.deterministic(EXPECTED_ULTIMATE_LOSS, Transform::exp(&log_ultimate))?;
    let mu_reported = b.deterministic(MU_REPORTED, Transform::outer(&ultimate, &pct_reported))?;
    let mu_paid = b.deterministic(MU_PAID, Transform::outer(&ultimate, &pct_paid))?;

    // ---- likelihood ----
    b.observed_gamma(
        REPORTED_LOSS,
        GammaLikelihood::new(&mu_reported, &sigma_reported)
            .with_parameterization(config.gamma_parameterization),
        observed_reported_loss.into_dyn(),
        &CELL,
    )?;
    b.observed_gamma(
        PAID_LOSS,
        GammaLikelihood::new(&mu_paid, &sigma_paid)
            .with_parameterization(config.gamma_parameterization),
        observed_paid_loss.into_dyn(),
        &CELL,
    )?;

    let model = b.build();
    info!(
        "Paid/reported loss model ready: {} free parameters, Gamma {:?}",
        model.free_variables().map(|v| v.size()).sum::<usize>(),
        config.gamma_parameterization
    );
    Ok(model)
}

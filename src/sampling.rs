//! Forward simulation from the model's priors
//!
//! Draws free variables from their priors, recomputes deterministic nodes, and
//! optionally draws every cell of each likelihood term. Useful for checking
//! that priors imply plausible triangles before handing the model to a sampler.

use crate::error::{ModelError, Result};
use crate::model::{Model, Point, VariableKind};
use log::debug;
use ndarray::{ArrayD, IxDyn, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Draw every free variable and evaluate the deterministic nodes
pub fn sample_prior<R: Rng + ?Sized>(model: &Model, rng: &mut R) -> Result<Point> {
    let mut point = Point::new();
    for var in model.free_variables() {
        let distribution = var
            .distribution()
            .ok_or_else(|| ModelError::UnknownVariable(var.name.clone()))?;
        let values = (0..var.size())
            .map(|_| distribution.sample(rng))
            .collect::<Result<Vec<f64>>>()?;
        let array = ArrayD::from_shape_vec(IxDyn(&var.shape), values).map_err(|_| {
            ModelError::DimensionMismatch {
                variable: var.name.clone(),
                expected: var.shape.clone(),
                actual: vec![var.size()],
            }
        })?;
        point.insert(var.name.clone(), array);
    }
    model.evaluate_deterministics(&point)
}

/// Prior draw plus a simulated value for every cell of each observed variable
///
/// Cells whose Gamma parameters are not positive and finite (e.g. after an
/// overflowing `exp`) are returned as NaN.
pub fn sample_prior_predictive<R: Rng + ?Sized>(model: &Model, rng: &mut R) -> Result<Point> {
    let mut point = sample_prior(model, rng)?;
    for var in model.observed() {
        if let VariableKind::Observed { likelihood, .. } = &var.kind {
            let cells = likelihood.cell_distributions(&point)?;
            let mut draws = ArrayD::from_elem(cells.raw_dim(), f64::NAN);
            let mut failed = 0usize;
            Zip::from(&mut draws).and(&cells).for_each(|x, cell| {
                if cell.validate().is_ok() {
                    // validated above, sampling cannot fail
                    *x = cell.sample(rng).unwrap_or(f64::NAN);
                } else {
                    failed += 1;
                }
            });
            if failed > 0 {
                debug!("{}: {} cells with degenerate Gamma parameters", var.name, failed);
            }
            point.insert(var.name.clone(), draws);
        }
    }
    Ok(point)
}

/// Batch prior-predictive simulation
///
/// Each draw gets its own generator seeded from the batch seed and the draw
/// index, so results are reproducible regardless of thread scheduling.
#[derive(Debug, Clone)]
pub struct PriorPredictive<'a> {
    model: &'a Model,
    /// Also simulate the observed variables
    include_observed: bool,
}

impl<'a> PriorPredictive<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            include_observed: true,
        }
    }

    /// Only draw priors and deterministic nodes
    pub fn prior_only(mut self) -> Self {
        self.include_observed = false;
        self
    }

    /// Generator for draw `index` of a batch seeded with `seed`
    pub fn draw_rng(seed: u64, index: usize) -> StdRng {
        StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Run `draws` simulations in parallel
    pub fn run(&self, draws: usize, seed: u64) -> Result<Vec<Point>> {
        debug!("Simulating {} prior draws (seed {})", draws, seed);
        (0..draws)
            .into_par_iter()
            .map(|i| {
                let mut rng = Self::draw_rng(seed, i);
                if self.include_observed {
                    sample_prior_predictive(self.model, &mut rng)
                } else {
                    sample_prior(self.model, &mut rng)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserving::{self, build_model, ModelConfig};
    use ndarray::arr2;

    fn model() -> Model {
        build_model(
            ["2019", "2020", "2021"],
            ["12", "24"],
            arr2(&[[100.0, 150.0], [120.0, 180.0], [90.0, 140.0]]),
            arr2(&[[80.0, 130.0], [90.0, 150.0], [70.0, 110.0]]),
            &ModelConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_prior_draw_respects_supports_and_shapes() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let point = sample_prior(&model, &mut rng).unwrap();
            for var in model.free_variables() {
                let value = point.require(&var.name).unwrap();
                assert_eq!(value.shape(), var.shape.as_slice());
                let d = var.distribution().unwrap();
                assert!(value.iter().all(|&x| d.in_support(x)), "{}", var.name);
            }
            assert!(point.contains(reserving::MU_PAID));
            assert!(!point.contains(reserving::PAID_LOSS));
        }
    }

    #[test]
    fn test_deterministics_hold_across_prior_draws() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let point = sample_prior(&model, &mut rng).unwrap();
            let log_ult = point.require(reserving::LOG_EXPECTED_ULTIMATE_LOSS).unwrap();
            let ult = point.require(reserving::EXPECTED_ULTIMATE_LOSS).unwrap();
            for o in 0..3 {
                assert_eq!(ult[[o]], log_ult[[o]].exp());
            }
            for (mu, pct) in [
                (reserving::MU_REPORTED, reserving::EXPECTED_PCT_ULTIMATE_REPORTED),
                (reserving::MU_PAID, reserving::EXPECTED_PCT_ULTIMATE_PAID),
            ] {
                let mu = point.require(mu).unwrap();
                let pct = point.require(pct).unwrap();
                for o in 0..3 {
                    for d in 0..2 {
                        assert_eq!(mu[[o, d]], ult[[o]] * pct[[d]]);
                    }
                }
            }
            assert!(!model.log_prob(&point).unwrap().is_nan());
        }
    }

    #[test]
    fn test_prior_predictive_fills_observed_variables() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(1);
        let point = sample_prior_predictive(&model, &mut rng).unwrap();
        for name in reserving::VARIABLE_NAMES {
            assert!(point.contains(name), "{name} missing");
        }
        let paid = point.require(reserving::PAID_LOSS).unwrap();
        assert_eq!(paid.shape(), &[3, 2]);
        assert!(paid.iter().all(|&x| x.is_nan() || x >= 0.0));
    }

    #[test]
    fn test_batch_is_reproducible() {
        let model = model();
        let runner = PriorPredictive::new(&model);
        let a = runner.run(16, 2024).unwrap();
        let b = runner.run(16, 2024).unwrap();
        assert_eq!(a.len(), 16);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(
                x.require(reserving::LOG_EXPECTED_ULTIMATE_LOSS).unwrap(),
                y.require(reserving::LOG_EXPECTED_ULTIMATE_LOSS).unwrap()
            );
        }

        let c = runner.run(16, 2025).unwrap();
        assert_ne!(
            a[0].require(reserving::LOG_EXPECTED_ULTIMATE_LOSS).unwrap(),
            c[0].require(reserving::LOG_EXPECTED_ULTIMATE_LOSS).unwrap()
        );
    }

    #[test]
    fn test_prior_only_skips_observed() {
        let model = model();
        let draws = PriorPredictive::new(&model).prior_only().run(4, 7).unwrap();
        assert!(draws.iter().all(|p| !p.contains(reserving::REPORTED_LOSS)));
    }
}

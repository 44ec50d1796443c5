//! Loss Reserving - Bayesian paid/reported loss model for loss triangles
//!
//! This library provides:
//! - A declarative model graph with an explicit builder (priors, deterministic nodes, likelihoods)
//! - The single-level paid/reported loss reserving model over origin and development periods
//! - Joint log density and an unconstrained flat-vector interface for external samplers
//! - Seeded prior and prior-predictive simulation
//! - Long-format CSV loading of loss triangles

pub mod error;
pub mod model;
pub mod reserving;
pub mod sampling;
pub mod triangle;

// Re-export commonly used types
pub use error::{ModelError, Result};
pub use model::{LogDensity, Model, ModelBuilder, Point};
pub use reserving::{build_model, ModelConfig, PriorConfig};
pub use sampling::PriorPredictive;
pub use triangle::Triangle;

//! Declarative probabilistic model graph
//!
//! A model is a set of named variables over the origin and development axes:
//! - **Free** variables carry a prior distribution
//! - **Deterministic** variables are pure functions of earlier variables
//! - **Observed** variables are Gamma likelihood terms fixed at data
//!
//! Models are declared through an explicit [`ModelBuilder`] and frozen into an
//! immutable [`Model`]. Inference is left to external samplers, which consume
//! the model through [`LogDensity`].

mod coords;
mod distribution;
mod transform;
mod likelihood;
mod point;
mod graph;
mod density;

pub use coords::{Coords, Dim};
pub use distribution::{Constraint, Distribution};
pub use transform::Transform;
pub use likelihood::{GammaLikelihood, GammaParameterization};
pub use point::Point;
pub use graph::{Model, ModelBuilder, VarRef, Variable, VariableKind, VariableSummary};
pub use density::{LogDensity, UnconstrainedDensity};

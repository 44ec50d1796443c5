//! Error type for model construction and evaluation

use thiserror::Error;

/// Errors raised while declaring or evaluating a model
#[derive(Debug, Error)]
pub enum ModelError {
    /// An axis was supplied with no labels
    #[error("axis `{axis}` has no labels")]
    EmptyAxis { axis: &'static str },

    /// The same label appears twice on one axis
    #[error("axis `{axis}` contains duplicate label `{label}`")]
    DuplicateLabel { axis: &'static str, label: String },

    /// An array does not have the shape implied by its dims
    #[error("dimension mismatch for `{variable}`: expected shape {expected:?}, got {actual:?}")]
    DimensionMismatch {
        variable: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// An observed value lies outside the likelihood's support
    #[error("domain error for `{variable}` at [{origin}, {development}]: {value} is not a positive finite value")]
    Domain {
        variable: String,
        origin: String,
        development: String,
        value: f64,
    },

    /// A distribution hyperparameter is out of range
    #[error("invalid parameter `{param}` = {value}: {constraint}")]
    InvalidParameter {
        param: String,
        value: f64,
        constraint: &'static str,
    },

    /// A variable name was registered twice
    #[error("variable `{0}` is already declared")]
    DuplicateVariable(String),

    /// A node refers to a variable that was never declared
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// An evaluation point lacks a value the computation needs
    #[error("no value supplied for `{0}`")]
    MissingValue(String),

    /// Two inputs that must share axes do not
    #[error("axis mismatch: {0}")]
    AxisMismatch(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ModelError>;

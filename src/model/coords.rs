//! Named axes of a loss triangle and shape resolution

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A named dimension a variable can be indexed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    /// Origin period (e.g. accident year)
    OriginPeriod,
    /// Development period (age since origin)
    DevelopmentPeriod,
}

impl Dim {
    pub fn name(&self) -> &'static str {
        match self {
            Dim::OriginPeriod => "origin_period",
            Dim::DevelopmentPeriod => "development_period",
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis labels shared by every variable in a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coords {
    origin_period: Vec<String>,
    development_period: Vec<String>,
}

impl Coords {
    /// Build coords from label sequences
    ///
    /// Both axes must be non-empty and free of duplicate labels.
    pub fn new<O, D>(origin_period: O, development_period: D) -> Result<Self>
    where
        O: IntoIterator,
        O::Item: ToString,
        D: IntoIterator,
        D::Item: ToString,
    {
        let origin_period: Vec<String> = origin_period.into_iter().map(|l| l.to_string()).collect();
        let development_period: Vec<String> =
            development_period.into_iter().map(|l| l.to_string()).collect();

        check_axis(Dim::OriginPeriod.name(), &origin_period)?;
        check_axis(Dim::DevelopmentPeriod.name(), &development_period)?;

        Ok(Self {
            origin_period,
            development_period,
        })
    }

    pub fn origin_period(&self) -> &[String] {
        &self.origin_period
    }

    pub fn development_period(&self) -> &[String] {
        &self.development_period
    }

    /// Labels along a dimension
    pub fn labels(&self, dim: Dim) -> &[String] {
        match dim {
            Dim::OriginPeriod => &self.origin_period,
            Dim::DevelopmentPeriod => &self.development_period,
        }
    }

    /// Number of labels along a dimension
    pub fn len(&self, dim: Dim) -> usize {
        self.labels(dim).len()
    }

    /// Concrete array shape for a list of dims
    pub fn shape(&self, dims: &[Dim]) -> Vec<usize> {
        dims.iter().map(|&d| self.len(d)).collect()
    }
}

fn check_axis(axis: &'static str, labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Err(ModelError::EmptyAxis { axis });
    }
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(ModelError::DuplicateLabel {
                axis,
                label: label.clone(),
            });
        }
    }
    Ok(())
}

use serde::{Deserialize, Serialize};

use crate::errors::{LRError, Result};

pub const DEFAULT_TOLERANCE: f64 = 1.0e-3;
pub const DEFAULT_SMOOTHING_WEIGHT: f64 = 1.0e-9;
pub const DEFAULT_MIN_ELEMENT_FRACTION: f64 = 1.0e-3;

/// How the distance between a data point and the surface is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyMode
{
    /// Distance to the closest point on the surface.
    #[default]
    ClosestPoint,
    /// Distance to the surface evaluated at the point's own parameter.
    Parametric,
}

///
/// Tunable parameters of a surface approximation.
///
/// Missing fields take their default values when deserialized.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproxConfig
{
    /// Requested approximation accuracy.
    pub epsge: f64,
    /// Weight of the smoothing term, clamped to `[0, 1]` when fitting.
    pub smoothing_weight: f64,
    pub accuracy_mode: AccuracyMode,
    /// Move parameter values to their footpoints after every fit.
    pub reparameterize: bool,
    /// Fixation level per edge, counter-clockwise from `v = vmin`.
    pub edge_fix: [i32; 4],
    /// Elements are not refined in a direction where they are at most this
    /// fraction of the domain.
    pub min_element_fraction: f64,
}

impl Default for ApproxConfig
{
    fn default() -> Self
    {
        Self
        {
            epsge: DEFAULT_TOLERANCE,
            smoothing_weight: DEFAULT_SMOOTHING_WEIGHT,
            accuracy_mode: AccuracyMode::default(),
            reparameterize: false,
            edge_fix: [0; 4],
            min_element_fraction: DEFAULT_MIN_ELEMENT_FRACTION,
        }
    }
}

impl ApproxConfig
{
    pub fn new(epsge: f64) -> Self
    {
        Self { epsge, ..Default::default() }
    }

    pub fn with_accuracy_mode(mut self, mode: AccuracyMode) -> Self
    {
        self.accuracy_mode = mode;
        self
    }

    pub fn with_reparameterization(mut self, reparameterize: bool) -> Self
    {
        self.reparameterize = reparameterize;
        self
    }

    pub fn with_smoothing_weight(mut self, weight: f64) -> Self
    {
        self.smoothing_weight = weight;
        self
    }

    pub fn with_edge_fix(mut self, edge_fix: [i32; 4]) -> Self
    {
        self.edge_fix = edge_fix;
        self
    }

    pub fn validate(&self) -> Result<()>
    {
        if !(self.epsge.is_finite() && self.epsge > 0.0)
        {
            return Err(LRError::invalid(format!("tolerance must be positive, got {}", self.epsge)));
        }
        if !self.smoothing_weight.is_finite()
        {
            return Err(LRError::invalid("smoothing weight must be finite"));
        }
        if !(self.min_element_fraction > 0.0 && self.min_element_fraction < 1.0)
        {
            return Err(LRError::invalid(format!("minimum element fraction must lie in (0, 1), got {}", self.min_element_fraction)));
        }
        Ok(())
    }
}

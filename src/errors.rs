use thiserror::Error;

pub type Result<T> = std::result::Result<T, LRError>;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum LRError
{
    /// Malformed point array, dimension, order, coefficient count or knots.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// All samples collapse onto a parameter rectangle of zero area.
    #[error("degenerate parameter domain [{umin}, {umax}] x [{vmin}, {vmax}]")]
    DegenerateDomain { umin: f64, umax: f64, vmin: f64, vmax: f64 },
    /// The least squares system could not be solved.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

impl LRError
{
    pub(crate) fn invalid(msg: impl Into<String>) -> Self
    {
        LRError::InvalidInput(msg.into())
    }
}

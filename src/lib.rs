//! Adaptive approximation of scattered, parameterized data by locally refined
//! (LR) B-spline surfaces.

pub mod approx;
pub mod basis;
pub mod errors;
pub mod surface;

pub use crate::approx::{AccuracyMode, AccuracyReport, ApproxConfig, ApproxResult, InitialSurface, SurfaceApprox};
pub use crate::errors::{LRError, Result};
pub use crate::surface::handle::SurfaceHandle;
pub use crate::surface::lr_spline::LRSplineSurface;
pub use crate::surface::traits::LRSurface;

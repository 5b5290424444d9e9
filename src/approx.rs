pub mod accuracy;
pub mod coef_known;
pub mod config;
pub mod init;
pub mod refinement;
pub mod smoothing;
pub mod solver;
pub mod surface_approx;

pub use accuracy::{AccuracyEvaluator, AccuracyReport};
pub use config::{AccuracyMode, ApproxConfig};
pub use init::InitialSurface;
pub use surface_approx::{ApproxPhase, ApproxResult, SurfaceApprox};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::approx::accuracy::{AccuracyEvaluator, AccuracyReport};
use crate::approx::coef_known::{clamp_fix_level, CoefKnown};
use crate::approx::config::{AccuracyMode, ApproxConfig};
use crate::approx::init::{build_initial_surface, check_points, check_points_in_domain, InitialSurface};
use crate::approx::refinement::RefinementEngine;
use crate::approx::smoothing::SmoothingApproximator;
use crate::errors::{LRError, Result};
use crate::surface::handle::SurfaceHandle;
use crate::surface::lr_spline::LRSplineSurface;
use crate::surface::traits::{Edge, LRSurface};

/// Stage of the approximation loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApproxPhase
{
    #[default]
    Fitting,
    Evaluating,
    Refining,
    Done,
}

/// Outcome of `SurfaceApprox::get_approx_surf`.
#[derive(Debug)]
pub struct ApproxResult<S>
{
    pub surface: SurfaceHandle<S>,
    pub report: AccuracyReport,
    /// Number of fits performed.
    pub iterations: usize,
    /// Number of refinement rounds performed.
    pub refinements: usize,
}

///
/// Adaptive approximation of parameterized points by an LR spline surface.
///
/// Each iteration fits the free coefficients, optionally moves the point
/// parameters to their footpoints, and measures the distances. Elements
/// containing points outside the tolerance are refined and the loop repeats
/// until every point is within tolerance or the iteration bound is reached.
/// Ending with points outside the tolerance is not an error; inspect the
/// returned report.
///
/// The points are borrowed for the lifetime of the approximation and only
/// their parameter values are ever modified.
///
pub struct SurfaceApprox<'a, S: LRSurface + Sync = LRSplineSurface>
{
    surface: SurfaceHandle<S>,
    points: &'a mut [f64],
    dim: usize,
    config: ApproxConfig,
    coef_known: CoefKnown,
    report: AccuracyReport,
    exhausted: Vec<bool>,
    phase: ApproxPhase,
}

impl<'a> SurfaceApprox<'a, LRSplineSurface>
{
    ///
    /// Approximate `points`, records `(u, v, x_1, ..., x_dim)`, starting from
    /// the surface described by `initial`.
    ///
    pub fn new(points: &'a mut [f64], dim: usize, config: ApproxConfig, initial: &InitialSurface) -> Result<Self>
    {
        config.validate()?;
        let surface = build_initial_surface(points, dim, initial)?;
        Self::from_parts(SurfaceHandle::new(surface), points, dim, config)
    }
}

impl<'a, S: LRSurface + Sync> SurfaceApprox<'a, S>
{
    ///
    /// Approximate `points` starting from an existing surface. The surface is
    /// shared: clones of `surface` held by the caller observe the new
    /// coefficients and refinements.
    ///
    pub fn with_surface(surface: SurfaceHandle<S>, points: &'a mut [f64], config: ApproxConfig) -> Result<Self>
    {
        config.validate()?;
        let (dim, domain) =
        {
            let s = surface.borrow();
            (s.dim(), s.domain())
        };
        check_points(points, dim)?;
        check_points_in_domain(points, dim, &domain)?;
        Self::from_parts(surface, points, dim, config)
    }

    fn from_parts(surface: SurfaceHandle<S>, points: &'a mut [f64], dim: usize, mut config: ApproxConfig) -> Result<Self>
    {
        let npoints = check_points(points, dim)?;
        let weight = SmoothingApproximator::new(config.smoothing_weight).weight();
        if weight != config.smoothing_weight
        {
            warn!("smoothing weight {} clamped to {weight}", config.smoothing_weight);
            config.smoothing_weight = weight;
        }
        config.edge_fix = config.edge_fix.map(clamp_fix_level);
        let coef_known =
        {
            let s = surface.borrow();
            let mut coef_known = CoefKnown::new(&*s);
            coef_known.set_coef_known(&*s, &config.edge_fix);
            coef_known
        };
        Ok(Self { surface, points, dim, config, coef_known, report: AccuracyReport::default(), exhausted: vec![false; npoints], phase: ApproxPhase::Fitting })
    }

    ///
    /// Run the approximation for at most `max_iter` fits and return the
    /// surface with its final accuracy.
    ///
    pub fn get_approx_surf(&mut self, max_iter: usize) -> Result<ApproxResult<S>>
    {
        if max_iter == 0
        {
            return Err(LRError::invalid("at least one iteration is required"));
        }
        let smoothing = SmoothingApproximator::new(self.config.smoothing_weight);
        let evaluator = AccuracyEvaluator::new(self.config.accuracy_mode, self.config.epsge);
        let engine = RefinementEngine::new(self.config.epsge).with_min_element_fraction(self.config.min_element_fraction);

        let mut iterations = 0;
        let mut refinements = 0;
        loop
        {
            self.phase = ApproxPhase::Fitting;
            smoothing.fit(&mut *self.surface.borrow_mut(), &*self.points, self.coef_known.flags())?;
            iterations += 1;

            self.phase = ApproxPhase::Evaluating;
            let surface = self.surface.borrow();
            if self.config.reparameterize
            {
                let moved = evaluator.reparameterize(&*surface, self.points);
                debug!("moved {moved} parameter values to their footpoints");
            }
            let (report, distances) = evaluator.evaluate(&*surface, &*self.points);
            drop(surface);
            self.report = report;
            debug!("iteration {iterations}: {} coefficients ({} fixed), maxdist {:e}, avdist {:e}, {} points outside tolerance",
                self.coef_known.len(), self.coef_known.num_fixed(), report.maxdist, report.avdist, report.nmb_out_eps);

            if report.within_tolerance() || iterations >= max_iter
            {
                break;
            }

            self.phase = ApproxPhase::Refining;
            let mut surface = self.surface.borrow_mut();
            let outcome = engine.refine(&mut *surface, &*self.points, &distances, &mut self.exhausted)?;
            if outcome.num_refined_elements == 0
            {
                debug!("no element left to refine");
                break;
            }
            self.coef_known.update_coef_known(&*surface, &outcome.map);
            refinements += 1;
        }
        self.phase = ApproxPhase::Done;
        info!("approximation finished after {iterations} iterations and {refinements} refinements: maxdist {:e}, avdist {:e}, {} points outside tolerance {:e}",
            self.report.maxdist, self.report.avdist, self.report.nmb_out_eps, self.config.epsge);
        Ok(ApproxResult { surface: self.surface.clone(), report: self.report, iterations, refinements })
    }

    /// Accuracy after the latest fit.
    pub fn report(&self) -> AccuracyReport
    {
        self.report
    }

    pub fn surface(&self) -> SurfaceHandle<S>
    {
        self.surface.clone()
    }

    /// Fixation flags of the current surface coefficients.
    pub fn coef_known(&self) -> &[i32]
    {
        self.coef_known.flags()
    }

    pub fn phase(&self) -> ApproxPhase
    {
        self.phase
    }

    pub fn config(&self) -> &ApproxConfig
    {
        &self.config
    }

    pub fn dim(&self) -> usize
    {
        self.dim
    }

    pub fn points(&self) -> &[f64]
    {
        &*self.points
    }

    /// The weight is clamped to `[0, 1]`.
    pub fn set_smoothing_weight(&mut self, weight: f64)
    {
        let clamped = SmoothingApproximator::new(weight).weight();
        if clamped != weight
        {
            warn!("smoothing weight {weight} clamped to {clamped}");
        }
        self.config.smoothing_weight = clamped;
    }

    /// Fix or release the coefficients along all four edges.
    pub fn set_fix_boundary(&mut self, fix: bool)
    {
        self.edge_fix([i32::from(fix); 4]);
    }

    ///
    /// Set the fixation level per edge, ordered
    /// `[v = vmin, u = umax, v = vmax, u = umin]`. Flags are recomputed from
    /// the current mesh.
    ///
    pub fn edge_fix(&mut self, edge_fix: [i32; 4])
    {
        self.config.edge_fix = edge_fix.map(clamp_fix_level);
        self.coef_known.set_coef_known(&*self.surface.borrow(), &self.config.edge_fix);
    }

    /// Fix the coefficients along one edge in addition to those already fixed.
    pub fn fix_edge(&mut self, edge: Edge, level: i32)
    {
        let level = clamp_fix_level(level);
        self.config.edge_fix[edge as usize] = self.config.edge_fix[edge as usize].max(level);
        self.coef_known.set_coef_known_edge(&*self.surface.borrow(), edge, level);
    }

    pub fn set_min_element_fraction(&mut self, fraction: f64) -> Result<()>
    {
        if !(fraction > 0.0 && fraction < 1.0)
        {
            return Err(LRError::invalid(format!("minimum element fraction must lie in (0, 1), got {fraction}")));
        }
        self.config.min_element_fraction = fraction;
        Ok(())
    }

    pub fn set_accuracy_mode(&mut self, mode: AccuracyMode)
    {
        self.config.accuracy_mode = mode;
    }

    pub fn set_reparameterize(&mut self, reparameterize: bool)
    {
        self.config.reparameterize = reparameterize;
    }
}

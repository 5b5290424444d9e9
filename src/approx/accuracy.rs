use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};
use serde::{Deserialize, Serialize};

use crate::approx::config::AccuracyMode;
use crate::surface::projection::{closest_point_on_graph, ClosestPoint};
use crate::surface::traits::LRSurface;

/// Aggregated distances between the data points and the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport
{
    pub maxdist: f64,
    pub avdist: f64,
    /// Number of points farther than the tolerance from the surface.
    pub nmb_out_eps: usize,
}

impl AccuracyReport
{
    pub fn from_distances(distances: &[f64], epsge: f64) -> Self
    {
        if distances.is_empty()
        {
            return Self::default();
        }
        let mut report = Self::default();
        let mut sum = 0.0;
        for &dist in distances
        {
            report.maxdist = report.maxdist.max(dist);
            sum += dist;
            if dist > epsge
            {
                report.nmb_out_eps += 1;
            }
        }
        report.avdist = sum / distances.len() as f64;
        report
    }

    pub fn within_tolerance(&self) -> bool
    {
        self.nmb_out_eps == 0
    }
}

///
/// Measures how well a surface fits a set of parameterized points.
///
/// Distances are computed in parallel but collected in point order, and the
/// aggregation is sequential, so reports do not depend on scheduling.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccuracyEvaluator
{
    pub mode: AccuracyMode,
    pub epsge: f64,
}

impl AccuracyEvaluator
{
    pub fn new(mode: AccuracyMode, epsge: f64) -> Self
    {
        Self { mode, epsge }
    }

    /// Distance from each point to the surface, in point order.
    pub fn distances<S: LRSurface + Sync + ?Sized>(&self, surface: &S, points: &[f64]) -> Vec<f64>
    {
        let dim = surface.dim();
        match self.mode
        {
            AccuracyMode::ClosestPoint => points.par_chunks_exact(dim + 2).map(|record| footpoint(surface, record).distance).collect(),
            AccuracyMode::Parametric => points.par_chunks_exact(dim + 2)
                .map(|record|
                {
                    let mut value = vec![0.0; dim];
                    surface.evaluate(record[0], record[1], &mut value);
                    value.iter().zip(&record[2..]).map(|(s, x)| (s - x) * (s - x)).sum::<f64>().sqrt()
                })
                .collect(),
        }
    }

    pub fn evaluate<S: LRSurface + Sync + ?Sized>(&self, surface: &S, points: &[f64]) -> (AccuracyReport, Vec<f64>)
    {
        let distances = self.distances(surface, points);
        (AccuracyReport::from_distances(&distances, self.epsge), distances)
    }

    ///
    /// Move the parameter of every point to its footpoint on the surface.
    /// Returns the number of points whose parameter changed.
    ///
    /// Function valued surfaces (`dim == 1`) are left alone: their parameter
    /// is part of the sample, so moving it would move the data.
    ///
    pub fn reparameterize<S: LRSurface + Sync + ?Sized>(&self, surface: &S, points: &mut [f64]) -> usize
    {
        let dim = surface.dim();
        if dim == 1
        {
            return 0;
        }
        let mut moved = vec![false; points.len() / (dim + 2)];
        points.par_chunks_exact_mut(dim + 2).zip(moved.par_iter_mut()).for_each(|(record, moved)|
        {
            let cp = footpoint(surface, record);
            if cp.u != record[0] || cp.v != record[1]
            {
                record[0] = cp.u;
                record[1] = cp.v;
                *moved = true;
            }
        });
        moved.iter().filter(|&&m| m).count()
    }
}

///
/// Closest point to a record `(u, v, x_1, ..., x_dim)`, searching from its own
/// parameter. Function valued surfaces are measured as graphs.
///
fn footpoint<S: LRSurface + ?Sized>(surface: &S, record: &[f64]) -> ClosestPoint
{
    if surface.dim() == 1
    {
        closest_point_on_graph(surface, record)
    }
    else
    {
        surface.closest_point(&record[2..], (record[0], record[1]))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::surface::lr_spline::LRSplineSurface;
    use crate::surface::tensor::SplineBasis;
    use ::approx::assert_abs_diff_eq;

    /// The graph of `f(u, v) = u` over the unit square.
    fn ramp() -> LRSplineSurface
    {
        let bu = SplineBasis::uniform(2, 2, 0.0, 1.0).unwrap();
        let bv = SplineBasis::uniform(2, 2, 0.0, 1.0).unwrap();
        LRSplineSurface::new(bu, bv, vec![0.0, 1.0, 0.0, 1.0], 1).unwrap()
    }

    #[test]
    fn check_report_aggregation()
    {
        let report = AccuracyReport::from_distances(&[0.0, 0.5, 2.0, 0.1], 0.2);
        assert_eq!(report.maxdist, 2.0);
        assert_abs_diff_eq!(report.avdist, 0.65, epsilon = 1e-15);
        assert_eq!(report.nmb_out_eps, 2);
        assert!(!report.within_tolerance());
    }

    #[test]
    fn check_modes()
    {
        let surface = ramp();
        let points = [0.5, 0.5, 1.5, 0.25, 0.75, 0.25];
        let (parametric, distances) = AccuracyEvaluator::new(AccuracyMode::Parametric, 0.1).evaluate(&surface, &points);
        assert_abs_diff_eq!(distances[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(distances[1], 0.0, epsilon = 1e-14);
        assert_eq!(parametric.nmb_out_eps, 1);

        // the graph of f(u, v) = u is a plane at 45 degrees
        let (closest, distances) = AccuracyEvaluator::new(AccuracyMode::ClosestPoint, 0.1).evaluate(&surface, &points);
        assert_abs_diff_eq!(distances[0], 0.5_f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(distances[1], 0.0, epsilon = 1e-14);
        assert!(closest.maxdist <= parametric.maxdist);
    }

    #[test]
    fn check_reparameterization()
    {
        // the plane z = 0 in R^3, S(u, v) = (u, v, 0)
        let bu = SplineBasis::uniform(2, 2, 0.0, 1.0).unwrap();
        let bv = SplineBasis::uniform(2, 2, 0.0, 1.0).unwrap();
        let coefs = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let surface = LRSplineSurface::new(bu, bv, coefs, 3).unwrap();
        let mut points = [0.5, 0.5, 0.75, 0.5, 0.25, 0.25, 0.5, 0.25, 0.5, 0.0];
        let evaluator = AccuracyEvaluator::new(AccuracyMode::Parametric, 1e-3);
        let moved = evaluator.reparameterize(&surface, &mut points);
        assert_eq!(moved, 1);
        assert_abs_diff_eq!(points[0], 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(points[1], 0.5, epsilon = 1e-9);
        assert_eq!(&points[2..5], &[0.75, 0.5, 0.25]);
        assert_eq!(&points[5..], &[0.25, 0.5, 0.25, 0.5, 0.0]);
        let (report, _) = evaluator.evaluate(&surface, &points);
        assert_abs_diff_eq!(report.maxdist, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn check_function_samples_keep_parameters()
    {
        let surface = ramp();
        let mut points = [0.5, 0.5, 0.75, 0.25, 0.5, 0.25];
        let original = points;
        let evaluator = AccuracyEvaluator::new(AccuracyMode::ClosestPoint, 1e-3);
        let (first, distances) = evaluator.evaluate(&surface, &points);
        for _ in 0..2
        {
            assert_eq!(evaluator.reparameterize(&surface, &mut points), 0);
            assert_eq!(points, original);
            let (report, again) = evaluator.evaluate(&surface, &points);
            assert_eq!(report, first);
            assert_eq!(again, distances);
        }
    }
}

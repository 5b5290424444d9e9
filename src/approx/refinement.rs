use std::collections::BTreeMap;

use log::{trace, warn};

use crate::approx::config::DEFAULT_MIN_ELEMENT_FRACTION;
use crate::errors::{LRError, Result};
use crate::surface::mesh::Element;
use crate::surface::traits::{Direction, LRSurface, RefinementMap};

/// Relative difference below which two measures count as equal.
const TIE_TOLERANCE: f64 = 1.0e-12;

fn nearly_equal(a: f64, b: f64) -> bool
{
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs())
}

#[inline]
fn norm(x: &[f64]) -> f64
{
    x.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Result of one refinement round.
#[derive(Clone, Debug, Default)]
pub struct RefinementOutcome
{
    /// Expansion of the basis functions existing before the round.
    pub map: RefinementMap,
    pub num_refined_elements: usize,
    /// Points that became exhausted during this round.
    pub exhausted: Vec<usize>,
}

///
/// Refines the elements containing points outside the tolerance.
///
/// Every element holding at least one offending point is split once through
/// its midpoint, in the direction chosen by `choose_direction`. Elements that
/// have reached the minimum size in both directions are left alone and their
/// points are marked exhausted; exhausted points never trigger refinement
/// again.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefinementEngine
{
    pub epsge: f64,
    /// Smallest element extent, as a fraction of the domain, that may still be halved.
    pub min_element_fraction: f64,
}

impl RefinementEngine
{
    pub fn new(epsge: f64) -> Self
    {
        Self { epsge, min_element_fraction: DEFAULT_MIN_ELEMENT_FRACTION }
    }

    pub fn with_min_element_fraction(mut self, fraction: f64) -> Self
    {
        self.min_element_fraction = fraction;
        self
    }

    ///
    /// Direction in which to split `element`.
    ///
    /// Only directions where the element is wider than the minimum fraction of
    /// the domain qualify. Of those, the one with the larger extent relative to
    /// the domain wins. On a tie the surface variation across the element
    /// decides, `|S_u| * extent_u` against `|S_v| * extent_v` at the center,
    /// and `U` is taken if that ties as well.
    ///
    pub fn choose_direction<S: LRSurface + ?Sized>(&self, surface: &S, element: &Element) -> Option<Direction>
    {
        let domain = surface.domain();
        let refinable = |dir: Direction| element.extent(dir) > self.min_element_fraction * domain.width(dir);
        match (refinable(Direction::U), refinable(Direction::V))
        {
            (false, false) => None,
            (true, false) => Some(Direction::U),
            (false, true) => Some(Direction::V),
            (true, true) =>
            {
                let rel_u = element.extent(Direction::U) / domain.width(Direction::U);
                let rel_v = element.extent(Direction::V) / domain.width(Direction::V);
                if !nearly_equal(rel_u, rel_v)
                {
                    return Some(if rel_u > rel_v { Direction::U } else { Direction::V });
                }
                let (u, v) = element.center();
                let derivs = surface.evaluate_derivs(u, v);
                let var_u = norm(&derivs.du) * element.extent(Direction::U);
                let var_v = norm(&derivs.dv) * element.extent(Direction::V);
                if !nearly_equal(var_u, var_v) && var_v > var_u
                {
                    Some(Direction::V)
                }
                else
                {
                    Some(Direction::U)
                }
            }
        }
    }

    ///
    /// Refine around the points with `distances` above the tolerance.
    ///
    /// `exhausted` has one entry per point and is updated in place. Elements
    /// are processed in index order and all split lines are computed from the
    /// mesh as it was before the round.
    ///
    pub fn refine<S: LRSurface + ?Sized>(&self, surface: &mut S, points: &[f64], distances: &[f64], exhausted: &mut [bool]) -> Result<RefinementOutcome>
    {
        let stride = surface.dim() + 2;
        let npoints = points.len() / stride;
        if points.len() % stride != 0 || distances.len() != npoints || exhausted.len() != npoints
        {
            return Err(LRError::invalid(format!("{} distances and {} exhaustion flags for {} values of stride {stride}",
                distances.len(), exhausted.len(), points.len())));
        }
        let mut offending: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, record) in points.chunks_exact(stride).enumerate()
        {
            if distances[i] <= self.epsge || exhausted[i]
            {
                continue;
            }
            if let Some(e) = surface.locate_element(record[0], record[1])
            {
                offending.entry(e).or_default().push(i);
            }
        }

        let mut requests = Vec::with_capacity(offending.len());
        let mut newly_exhausted = Vec::new();
        for (&e, members) in &offending
        {
            match self.choose_direction(&*surface, &surface.elements()[e])
            {
                Some(dir) => requests.push((e, dir)),
                None =>
                {
                    for &i in members
                    {
                        exhausted[i] = true;
                    }
                    newly_exhausted.extend_from_slice(members);
                }
            }
        }
        if !newly_exhausted.is_empty()
        {
            warn!("{} points lie in elements of minimum size and stay outside the tolerance", newly_exhausted.len());
        }

        let map = surface.refine_elements(&requests)?;
        trace!("refined {} elements, {} coefficients", requests.len(), surface.num_coefs());
        Ok(RefinementOutcome { map, num_refined_elements: requests.len(), exhausted: newly_exhausted })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::surface::lr_spline::LRSplineSurface;
    use crate::surface::tensor::SplineBasis;

    fn flat(umax: f64, vmax: f64) -> LRSplineSurface
    {
        let bu = SplineBasis::uniform(3, 3, 0.0, umax).unwrap();
        let bv = SplineBasis::uniform(3, 3, 0.0, vmax).unwrap();
        LRSplineSurface::new(bu, bv, vec![0.0; 9], 1).unwrap()
    }

    #[test]
    fn check_direction_prefers_relative_extent()
    {
        let mut surface = flat(1.0, 1.0);
        surface.refine_elements(&[(0, Direction::U)]).unwrap();
        let engine = RefinementEngine::new(1e-3);
        // both halves are now narrower in u than in v
        for element in surface.elements()
        {
            assert_eq!(engine.choose_direction(&surface, element), Some(Direction::V));
        }
    }

    #[test]
    fn check_direction_ties()
    {
        let engine = RefinementEngine::new(1e-3);
        let mut surface = flat(1.0, 4.0);
        let element = surface.elements()[0].clone();
        // flat surface: equal relative extents and no variation, u wins
        assert_eq!(engine.choose_direction(&surface, &element), Some(Direction::U));
        // coefficients increasing in v only
        surface.set_coefs(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(engine.choose_direction(&surface, &element), Some(Direction::V));
        // the choice only depends on the surface
        assert_eq!(engine.choose_direction(&surface, &element), engine.choose_direction(&surface.clone(), &element));
    }

    #[test]
    fn check_refines_offending_elements_only()
    {
        let mut surface = flat(1.0, 1.0);
        surface.refine_elements(&[(0, Direction::U)]).unwrap();
        let points = [0.1, 0.5, 1.0, 0.9, 0.5, 0.0];
        let mut exhausted = [false; 2];
        let engine = RefinementEngine::new(0.5);
        let outcome = engine.refine(&mut surface, &points, &[1.0, 0.0], &mut exhausted).unwrap();
        assert_eq!(outcome.num_refined_elements, 1);
        assert!(outcome.exhausted.is_empty());
        assert_eq!(surface.elements().len(), 3);
        assert!(surface.elements().iter().any(|e| e.umin == 0.5 && e.umax == 1.0 && e.vmin == 0.0 && e.vmax == 1.0));
    }

    #[test]
    fn check_minimum_size_exhausts_points()
    {
        let mut surface = flat(1.0, 1.0);
        let points = [0.3, 0.3, 1.0];
        let mut exhausted = [false];
        let engine = RefinementEngine::new(1e-3).with_min_element_fraction(0.6);
        let outcome = engine.refine(&mut surface, &points, &[1.0], &mut exhausted).unwrap();
        assert_eq!(outcome.num_refined_elements, 1);
        let outcome = engine.refine(&mut surface, &points, &[1.0], &mut exhausted).unwrap();
        assert_eq!(outcome.num_refined_elements, 1);
        // both directions are now at most 0.5 wide
        let outcome = engine.refine(&mut surface, &points, &[1.0], &mut exhausted).unwrap();
        assert_eq!(outcome.num_refined_elements, 0);
        assert_eq!(outcome.exhausted, vec![0]);
        assert!(exhausted[0]);
        assert!(outcome.map.is_identity());
        let outcome = engine.refine(&mut surface, &points, &[1.0], &mut exhausted).unwrap();
        assert!(outcome.exhausted.is_empty());
        assert_eq!(surface.elements().len(), 3);
    }

    #[test]
    fn check_mismatched_lengths()
    {
        let mut surface = flat(1.0, 1.0);
        let points = [0.3, 0.3, 1.0, 0.7, 0.7, 1.0];
        let engine = RefinementEngine::new(1e-3);
        let mut exhausted = [false; 2];
        assert!(matches!(engine.refine(&mut surface, &points, &[1.0], &mut exhausted), Err(LRError::InvalidInput(_))));
        let mut exhausted = [false; 3];
        assert!(matches!(engine.refine(&mut surface, &points, &[1.0, 1.0], &mut exhausted), Err(LRError::InvalidInput(_))));
        assert!(matches!(engine.refine(&mut surface, &points[..5], &[1.0, 1.0], &mut exhausted[..2]), Err(LRError::InvalidInput(_))));
        assert_eq!(surface.elements().len(), 1);
    }
}

//! Construction of the surface an approximation starts from.

use crate::errors::{LRError, Result};
use crate::surface::lr_spline::LRSplineSurface;
use crate::surface::tensor::{SplineBasis, SplineSurface};
use crate::surface::traits::{Domain, LRSurface};

/// Order used in both directions when no initial surface is given.
pub const DEFAULT_ORDER: usize = 3;
/// Relative margin by which a synthesized domain exceeds the parameter bounds.
pub const DOMAIN_MARGIN: f64 = 1.0e-8;

/// Starting point of an approximation, apart from an existing LR surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InitialSurface
{
    /// One Bezier patch of order `DEFAULT_ORDER` over the inferred domain.
    #[default]
    Default,
    /// A tensor-product surface, used as a single-patch LR mesh.
    Tensor(SplineSurface),
    /// Uniform open knot vectors over the inferred domain.
    Size { ncoef_u: usize, order_u: usize, ncoef_v: usize, order_v: usize },
    /// Explicit knot vectors.
    Knots { ncoef_u: usize, order_u: usize, knots_u: Vec<f64>, ncoef_v: usize, order_v: usize, knots_v: Vec<f64> },
}

///
/// Check that `points` holds records `(u, v, x_1, ..., x_dim)` and return the
/// number of records.
///
pub fn check_points(points: &[f64], dim: usize) -> Result<usize>
{
    if dim == 0
    {
        return Err(LRError::invalid("dimension must be positive"));
    }
    let stride = dim + 2;
    if points.is_empty()
    {
        return Err(LRError::invalid("no data points given"));
    }
    if points.len() % stride != 0
    {
        return Err(LRError::invalid(format!("point array of length {} is not a multiple of {stride}", points.len())));
    }
    if points.iter().any(|x| !x.is_finite())
    {
        return Err(LRError::invalid("point array contains non-finite values"));
    }
    Ok(points.len() / stride)
}

/// Bounding rectangle of the parameter values.
pub fn parameter_bounds(points: &[f64], dim: usize) -> Result<Domain>
{
    check_points(points, dim)?;
    let mut bounds = Domain::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for record in points.chunks_exact(dim + 2)
    {
        bounds.umin = bounds.umin.min(record[0]);
        bounds.umax = bounds.umax.max(record[0]);
        bounds.vmin = bounds.vmin.min(record[1]);
        bounds.vmax = bounds.vmax.max(record[1]);
    }
    if !(bounds.umin < bounds.umax && bounds.vmin < bounds.vmax)
    {
        return Err(LRError::DegenerateDomain { umin: bounds.umin, umax: bounds.umax, vmin: bounds.vmin, vmax: bounds.vmax });
    }
    Ok(bounds)
}

///
/// Parameter domain surrounding all data points. The bounding rectangle is
/// widened on every side so that no point lies on the boundary.
///
pub fn compute_par_domain(points: &[f64], dim: usize) -> Result<Domain>
{
    let bounds = parameter_bounds(points, dim)?;
    let du = margin(bounds.umin, bounds.umax);
    let dv = margin(bounds.vmin, bounds.vmax);
    Ok(Domain::new(bounds.umin - du, bounds.umax + du, bounds.vmin - dv, bounds.vmax + dv))
}

/// Widening of `[min, max]`, never less than two units in the last place of either end.
fn margin(min: f64, max: f64) -> f64
{
    (DOMAIN_MARGIN * (max - min)).max(2.0 * f64::EPSILON * min.abs().max(max.abs()))
}

/// Mean of the point values.
pub fn mean_value(points: &[f64], dim: usize) -> Vec<f64>
{
    let mut mean = vec![0.0; dim];
    let mut count = 0;
    for record in points.chunks_exact(dim + 2)
    {
        mean.iter_mut().zip(&record[2..]).for_each(|(m, x)| *m += x);
        count += 1;
    }
    if count > 0
    {
        mean.iter_mut().for_each(|m| *m /= count as f64);
    }
    mean
}

/// Fails unless every parameter pair lies inside `domain`.
pub fn check_points_in_domain(points: &[f64], dim: usize, domain: &Domain) -> Result<()>
{
    match points.chunks_exact(dim + 2).position(|record| !domain.contains(record[0], record[1]))
    {
        Some(i) => Err(LRError::invalid(format!("point {i} lies outside the surface domain {domain:?}"))),
        None => Ok(()),
    }
}

fn constant_surface(basis_u: SplineBasis, basis_v: SplineBasis, value: &[f64]) -> Result<LRSplineSurface>
{
    let ncoef = basis_u.ncoef * basis_v.ncoef;
    let coefs = value.iter().copied().cycle().take(ncoef * value.len()).collect();
    LRSplineSurface::new(basis_u, basis_v, coefs, value.len())
}

///
/// Build the initial LR surface for `points`.
///
/// Synthesized surfaces start with every coefficient equal to the mean point
/// value. Given surfaces keep their coefficients and must contain all
/// parameter values.
///
pub fn build_initial_surface(points: &[f64], dim: usize, initial: &InitialSurface) -> Result<LRSplineSurface>
{
    check_points(points, dim)?;
    let mean = mean_value(points, dim);
    let surface = match initial
    {
        InitialSurface::Default =>
        {
            let domain = compute_par_domain(points, dim)?;
            constant_surface(
                SplineBasis::uniform(DEFAULT_ORDER, DEFAULT_ORDER, domain.umin, domain.umax)?,
                SplineBasis::uniform(DEFAULT_ORDER, DEFAULT_ORDER, domain.vmin, domain.vmax)?,
                &mean)?
        }
        InitialSurface::Size { ncoef_u, order_u, ncoef_v, order_v } =>
        {
            let domain = compute_par_domain(points, dim)?;
            constant_surface(
                SplineBasis::uniform(*ncoef_u, *order_u, domain.umin, domain.umax)?,
                SplineBasis::uniform(*ncoef_v, *order_v, domain.vmin, domain.vmax)?,
                &mean)?
        }
        InitialSurface::Knots { ncoef_u, order_u, knots_u, ncoef_v, order_v, knots_v } =>
        {
            parameter_bounds(points, dim)?;
            constant_surface(
                SplineBasis::new(*ncoef_u, *order_u, knots_u.clone())?,
                SplineBasis::new(*ncoef_v, *order_v, knots_v.clone())?,
                &mean)?
        }
        InitialSurface::Tensor(tensor) =>
        {
            if tensor.dim() != dim
            {
                return Err(LRError::invalid(format!("surface dimension {} does not match point dimension {dim}", tensor.dim())));
            }
            parameter_bounds(points, dim)?;
            LRSplineSurface::from_tensor(tensor)
        }
    };
    check_points_in_domain(points, dim, &surface.domain())?;
    Ok(surface)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn grid_points(n: usize, umin: f64, umax: f64, vmin: f64, vmax: f64) -> Vec<f64>
    {
        let mut points = Vec::new();
        for i in 0..n
        {
            for j in 0..n
            {
                let u = umin + (umax - umin) * i as f64 / (n - 1) as f64;
                let v = vmin + (vmax - vmin) * j as f64 / (n - 1) as f64;
                points.extend([u, v, u * v]);
            }
        }
        points
    }

    #[test]
    fn check_domain_contains_parameters()
    {
        let points = grid_points(5, -1.0, 2.0, 0.5, 0.75);
        let bounds = parameter_bounds(&points, 1).unwrap();
        let surface = build_initial_surface(&points, 1, &InitialSurface::Default).unwrap();
        let domain = surface.domain();
        assert!(domain.contains_domain(&bounds));
        assert!(domain.umin < bounds.umin && bounds.umax < domain.umax);
        assert!(domain.vmin < bounds.vmin && bounds.vmax < domain.vmax);
        assert_eq!(surface.num_coefs(), DEFAULT_ORDER * DEFAULT_ORDER);
    }

    #[test]
    fn check_domain_contains_offset_parameters()
    {
        let points = grid_points(4, 1.0e9, 1.0e9 + 1.0, -2.0e12, -2.0e12 + 0.5);
        let bounds = parameter_bounds(&points, 1).unwrap();
        let domain = compute_par_domain(&points, 1).unwrap();
        assert!(domain.umin < bounds.umin && bounds.umax < domain.umax);
        assert!(domain.vmin < bounds.vmin && bounds.vmax < domain.vmax);
        let surface = build_initial_surface(&points, 1, &InitialSurface::Default).unwrap();
        assert_eq!(surface.domain(), domain);
    }

    #[test]
    fn check_invalid_point_arrays()
    {
        let points = grid_points(3, 0.0, 1.0, 0.0, 1.0);
        assert!(matches!(build_initial_surface(&points[..points.len() - 1], 1, &InitialSurface::Default), Err(LRError::InvalidInput(_))));
        assert!(matches!(build_initial_surface(&points, 0, &InitialSurface::Default), Err(LRError::InvalidInput(_))));
        assert!(matches!(build_initial_surface(&[], 1, &InitialSurface::Default), Err(LRError::InvalidInput(_))));
    }

    #[test]
    fn check_degenerate_domain()
    {
        let points = [0.5, 0.0, 1.0, 0.5, 0.5, 2.0, 0.5, 1.0, 3.0];
        assert!(matches!(build_initial_surface(&points, 1, &InitialSurface::Default), Err(LRError::DegenerateDomain { .. })));
    }

    #[test]
    fn check_explicit_sizes_and_knots()
    {
        let points = grid_points(4, 0.0, 1.0, 0.0, 1.0);
        let size = InitialSurface::Size { ncoef_u: 5, order_u: 3, ncoef_v: 4, order_v: 2 };
        let surface = build_initial_surface(&points, 1, &size).unwrap();
        assert_eq!(surface.num_coefs(), 20);
        assert_eq!(surface.orders(), (3, 2));

        let bad_order = InitialSurface::Size { ncoef_u: 5, order_u: 1, ncoef_v: 4, order_v: 2 };
        assert!(matches!(build_initial_surface(&points, 1, &bad_order), Err(LRError::InvalidInput(_))));

        let bad_knots = InitialSurface::Knots { ncoef_u: 3, order_u: 2, knots_u: vec![0.0, 0.0, 1.0, 1.0], ncoef_v: 2, order_v: 2, knots_v: vec![0.0, 0.0, 1.0, 1.0] };
        assert!(matches!(build_initial_surface(&points, 1, &bad_knots), Err(LRError::InvalidInput(_))));

        let knots = InitialSurface::Knots { ncoef_u: 3, order_u: 2, knots_u: vec![0.0, 0.0, 0.3, 1.0, 1.0], ncoef_v: 2, order_v: 2, knots_v: vec![0.0, 0.0, 1.0, 1.0] };
        let surface = build_initial_surface(&points, 1, &knots).unwrap();
        assert_eq!(surface.num_coefs(), 6);
        assert_eq!(surface.elements().len(), 2);
    }

    #[test]
    fn check_points_outside_given_surface()
    {
        let points = grid_points(4, 0.0, 2.0, 0.0, 1.0);
        let knots = InitialSurface::Knots { ncoef_u: 2, order_u: 2, knots_u: vec![0.0, 0.0, 1.0, 1.0], ncoef_v: 2, order_v: 2, knots_v: vec![0.0, 0.0, 1.0, 1.0] };
        assert!(matches!(build_initial_surface(&points, 1, &knots), Err(LRError::InvalidInput(_))));
    }

    #[test]
    fn check_initial_coefficients_are_mean()
    {
        let points = [0.0, 0.0, 1.0, 4.0, 1.0, 0.0, 3.0, 8.0, 0.0, 1.0, 2.0, 6.0];
        let surface = build_initial_surface(&points, 2, &InitialSurface::Default).unwrap();
        assert_eq!(surface.coef(0), &[2.0, 6.0]);
    }
}

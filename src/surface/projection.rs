//! Closest point computation by damped Gauss-Newton iteration in the
//! parameter domain.

use crate::surface::traits::{Domain, LRSurface};

const MAX_ITERATIONS: usize = 30;
const MAX_HALVINGS: usize = 12;
/// Relative parameter step below which the iteration stops.
const PARAM_TOLERANCE: f64 = 1.0e-13;

/// Position and first derivatives of a surface at one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDerivs
{
    pub position: Vec<f64>,
    pub du: Vec<f64>,
    pub dv: Vec<f64>,
}

impl SurfaceDerivs
{
    pub fn zeros(dim: usize) -> Self
    {
        Self { position: vec![0.0; dim], du: vec![0.0; dim], dv: vec![0.0; dim] }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClosestPoint
{
    pub u: f64,
    pub v: f64,
    pub point: Vec<f64>,
    pub distance: f64,
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64
{
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn distance_squared(a: &[f64], b: &[f64]) -> f64
{
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

///
/// Minimize `|S(u, v) - target|` over `domain`, starting at `seed`.
///
/// `eval` returns position and first derivatives. Steps are clamped to the
/// domain and halved until the distance decreases, so the returned distance
/// never exceeds the distance at the (clamped) seed.
///
pub fn closest_point<F>(eval: F, target: &[f64], seed: (f64, f64), domain: &Domain) -> ClosestPoint
where F: Fn(f64, f64) -> SurfaceDerivs
{
    let (mut u, mut v) = domain.clamp(seed.0, seed.1);
    let mut current = eval(u, v);
    let mut dist2 = distance_squared(&current.position, target);
    let scale = domain.diagonal();

    for _ in 0..MAX_ITERATIONS
    {
        if dist2 == 0.0
        {
            break;
        }
        let residual: Vec<f64> = current.position.iter().zip(target).map(|(p, t)| p - t).collect();
        let a11 = dot(&current.du, &current.du);
        let a12 = dot(&current.du, &current.dv);
        let a22 = dot(&current.dv, &current.dv);
        let g1 = dot(&current.du, &residual);
        let g2 = dot(&current.dv, &residual);
        if a11 + a22 == 0.0
        {
            break;
        }
        // Levenberg damping keeps the 2x2 system regular on degenerate patches.
        let damping = 1.0e-12 * (a11 + a22);
        let (a11, a22) = (a11 + damping, a22 + damping);
        let det = a11 * a22 - a12 * a12;
        if det <= 0.0
        {
            break;
        }
        let delta_u = -(a22 * g1 - a12 * g2) / det;
        let delta_v = -(a11 * g2 - a12 * g1) / det;

        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_HALVINGS
        {
            let (nu, nv) = domain.clamp(u + step * delta_u, v + step * delta_v);
            let candidate = eval(nu, nv);
            let candidate_dist2 = distance_squared(&candidate.position, target);
            if candidate_dist2 < dist2
            {
                accepted = Some((nu, nv, candidate, candidate_dist2));
                break;
            }
            step *= 0.5;
        }
        let Some((nu, nv, candidate, candidate_dist2)) = accepted else { break };
        let moved = (nu - u).hypot(nv - v);
        u = nu;
        v = nv;
        current = candidate;
        dist2 = candidate_dist2;
        if moved <= PARAM_TOLERANCE * scale
        {
            break;
        }
    }
    ClosestPoint { u, v, point: current.position, distance: dist2.sqrt() }
}

///
/// Closest point on the graph `(u, v, f(u, v))` of a surface with values in
/// `R^dim` to `target = (u, v, x_1, ..., x_dim)`.
///
/// This is the geometric distance used for function-valued surfaces, where a
/// closest point in the value space alone is not meaningful.
///
pub fn closest_point_on_graph<S: LRSurface + ?Sized>(surface: &S, target: &[f64]) -> ClosestPoint
{
    let dim = surface.dim();
    let lift = |u: f64, v: f64|
    {
        let derivs = surface.evaluate_derivs(u, v);
        let mut lifted = SurfaceDerivs::zeros(dim + 2);
        lifted.position[0] = u;
        lifted.position[1] = v;
        lifted.du[0] = 1.0;
        lifted.dv[1] = 1.0;
        lifted.position[2..].copy_from_slice(&derivs.position);
        lifted.du[2..].copy_from_slice(&derivs.du);
        lifted.dv[2..].copy_from_slice(&derivs.dv);
        lifted
    };
    closest_point(lift, target, (target[0], target[1]), &surface.domain())
}

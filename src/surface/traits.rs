use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::surface::basis_function::BasisKey;
use crate::surface::mesh::Element;
use crate::surface::projection::{self, ClosestPoint, SurfaceDerivs};

/// Rectangular parameter domain `[umin, umax] x [vmin, vmax]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain
{
    pub umin: f64,
    pub umax: f64,
    pub vmin: f64,
    pub vmax: f64,
}

impl Domain
{
    pub fn new(umin: f64, umax: f64, vmin: f64, vmax: f64) -> Self
    {
        Self { umin, umax, vmin, vmax }
    }

    #[inline]
    pub fn width(&self, dir: Direction) -> f64
    {
        match dir
        {
            Direction::U => self.umax - self.umin,
            Direction::V => self.vmax - self.vmin,
        }
    }

    #[inline]
    pub fn contains(&self, u: f64, v: f64) -> bool
    {
        self.umin <= u && u <= self.umax && self.vmin <= v && v <= self.vmax
    }

    /// Returns true if `other` lies inside this domain.
    pub fn contains_domain(&self, other: &Domain) -> bool
    {
        self.umin <= other.umin && other.umax <= self.umax && self.vmin <= other.vmin && other.vmax <= self.vmax
    }

    #[inline]
    pub fn clamp(&self, u: f64, v: f64) -> (f64, f64)
    {
        (u.clamp(self.umin, self.umax), v.clamp(self.vmin, self.vmax))
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f64
    {
        self.width(Direction::U).hypot(self.width(Direction::V))
    }

    /// Constant parameter value of a boundary edge.
    pub fn edge_value(&self, edge: Edge) -> f64
    {
        match edge
        {
            Edge::VMin => self.vmin,
            Edge::UMax => self.umax,
            Edge::VMax => self.vmax,
            Edge::UMin => self.umin,
        }
    }
}

/// Parametric direction. Refining an element in direction `U` inserts a knot
/// in `u`, i.e. a mesh line of constant `u`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction
{
    U,
    V,
}

impl Direction
{
    pub fn other(self) -> Self
    {
        match self
        {
            Direction::U => Direction::V,
            Direction::V => Direction::U,
        }
    }
}

/// Boundary edges in counter-clockwise order starting with `v = vmin`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge
{
    VMin = 0,
    UMax = 1,
    VMax = 2,
    UMin = 3,
}

impl Edge
{
    pub const ALL: [Edge; 4] = [Edge::VMin, Edge::UMax, Edge::VMax, Edge::UMin];

    /// The direction whose knots are constant along this edge.
    pub fn across(self) -> Direction
    {
        match self
        {
            Edge::VMin | Edge::VMax => Direction::V,
            Edge::UMin | Edge::UMax => Direction::U,
        }
    }
}

/// Support information of one basis function.
#[derive(Clone, Debug, PartialEq)]
pub struct BasisSupport
{
    pub key: BasisKey,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
}

impl BasisSupport
{
    pub fn knots(&self, dir: Direction) -> &[f64]
    {
        match dir
        {
            Direction::U => &self.knots_u,
            Direction::V => &self.knots_v,
        }
    }

    pub fn support(&self) -> Domain
    {
        Domain::new(self.knots_u[0], self.knots_u[self.knots_u.len() - 1], self.knots_v[0], self.knots_v[self.knots_v.len() - 1])
    }

    /// Number of local knots equal to the value of `edge` in `domain`.
    pub fn edge_multiplicity(&self, edge: Edge, domain: &Domain) -> usize
    {
        crate::basis::bspline::multiplicity(self.knots(edge.across()), domain.edge_value(edge))
    }
}

/// A basis function that is nonzero at some parameter, scaled by its weight.
///
/// `values` holds `[B, B_u, B_v, B_uu, B_uv, B_vv]`; derivatives beyond the
/// requested order are zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasisValue
{
    pub index: usize,
    pub values: [f64; 6],
}

///
/// Expansion of every basis function existing before a refinement into the
/// basis functions existing after it. Untouched functions expand into
/// themselves.
///
#[derive(Clone, Debug, Default)]
pub struct RefinementMap
{
    pub(crate) expansions: FxHashMap<BasisKey, Vec<BasisKey>>,
}

impl RefinementMap
{
    pub fn children(&self, parent: &BasisKey) -> &[BasisKey]
    {
        self.expansions.get(parent).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize
    {
        self.expansions.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.expansions.is_empty()
    }

    /// Returns true if no basis function was split.
    pub fn is_identity(&self) -> bool
    {
        self.expansions.iter().all(|(parent, children)| children.len() == 1 && &children[0] == parent)
    }
}

///
/// Capabilities of a locally refined spline surface as consumed by the
/// approximation. Coefficients are ordered as the basis functions returned by
/// `basis_functions`, `dim` values per basis function.
///
pub trait LRSurface
{
    /// Dimension of the geometry space.
    fn dim(&self) -> usize;

    fn domain(&self) -> Domain;

    /// Polynomial orders (degree + 1) in `u` and `v`.
    fn orders(&self) -> (usize, usize);

    fn num_coefs(&self) -> usize;

    /// Coefficient of basis function `index`.
    fn coef(&self, index: usize) -> &[f64];

    /// Replace all coefficients. Topology is left untouched.
    fn set_coefs(&mut self, coefs: &[f64]) -> Result<()>;

    fn basis_functions(&self) -> Vec<BasisSupport>;

    /// Basis functions nonzero at `(u, v)` with derivatives up to `nderiv` (at most 2).
    fn basis_values(&self, u: f64, v: f64, nderiv: usize) -> Vec<BasisValue>;

    fn elements(&self) -> &[Element];

    /// Index of the element containing `(u, v)`.
    fn locate_element(&self, u: f64, v: f64) -> Option<usize>;

    ///
    /// Refine each requested element in the given direction. All requests
    /// refer to the mesh as it was before the call. Refinement never removes
    /// basis functions from the spanned space and leaves the surface unchanged.
    ///
    fn refine_elements(&mut self, requests: &[(usize, Direction)]) -> Result<RefinementMap>;

    fn coefs(&self) -> Vec<f64>
    {
        (0..self.num_coefs()).flat_map(|i| self.coef(i).to_vec()).collect()
    }

    fn evaluate(&self, u: f64, v: f64, result: &mut [f64])
    {
        result.iter_mut().for_each(|r| *r = 0.0);
        for basis in self.basis_values(u, v, 0)
        {
            for (r, c) in result.iter_mut().zip(self.coef(basis.index))
            {
                *r += c * basis.values[0];
            }
        }
    }

    fn evaluate_derivs(&self, u: f64, v: f64) -> SurfaceDerivs
    {
        let dim = self.dim();
        let mut derivs = SurfaceDerivs::zeros(dim);
        for basis in self.basis_values(u, v, 1)
        {
            let coef = self.coef(basis.index);
            for d in 0..dim
            {
                derivs.position[d] += coef[d] * basis.values[0];
                derivs.du[d] += coef[d] * basis.values[1];
                derivs.dv[d] += coef[d] * basis.values[2];
            }
        }
        derivs
    }

    /// Closest point on the surface to `target`, searching from `seed`.
    fn closest_point(&self, target: &[f64], seed: (f64, f64)) -> ClosestPoint
    {
        projection::closest_point(|u, v| self.evaluate_derivs(u, v), target, seed, &self.domain())
    }
}

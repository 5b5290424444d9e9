use crate::basis::bspline;
use crate::surface::mesh::Element;
use crate::surface::traits::{Direction, Domain};

#[inline]
fn knot_bits(t: f64) -> u64
{
    // -0.0 and 0.0 describe the same knot
    if t == 0.0 { 0.0_f64.to_bits() } else { t.to_bits() }
}

///
/// Identity of a basis function: its local knot vectors compared bitwise.
/// Two basis functions with equal keys span the same function up to scaling.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisKey
{
    knots_u: Vec<u64>,
    knots_v: Vec<u64>,
}

impl BasisKey
{
    pub fn new(knots_u: &[f64], knots_v: &[f64]) -> Self
    {
        Self { knots_u: knots_u.iter().map(|&t| knot_bits(t)).collect(), knots_v: knots_v.iter().map(|&t| knot_bits(t)).collect() }
    }
}

///
/// Scaled tensor-product B-spline `weight * B[knots_u](u) * B[knots_v](v)`
/// together with its coefficient.
///
#[derive(Clone, Debug, PartialEq)]
pub struct BasisFunction
{
    pub(crate) knots_u: Vec<f64>,
    pub(crate) knots_v: Vec<f64>,
    pub(crate) weight: f64,
    pub(crate) coef: Vec<f64>,
}

impl BasisFunction
{
    pub fn new(knots_u: Vec<f64>, knots_v: Vec<f64>, weight: f64, coef: Vec<f64>) -> Self
    {
        Self { knots_u, knots_v, weight, coef }
    }

    pub fn key(&self) -> BasisKey
    {
        BasisKey::new(&self.knots_u, &self.knots_v)
    }

    #[inline]
    pub fn knots(&self, dir: Direction) -> &[f64]
    {
        match dir
        {
            Direction::U => &self.knots_u,
            Direction::V => &self.knots_v,
        }
    }

    pub fn weight(&self) -> f64
    {
        self.weight
    }

    pub fn coef(&self) -> &[f64]
    {
        &self.coef
    }

    #[inline]
    pub fn support_start(&self, dir: Direction) -> f64
    {
        self.knots(dir)[0]
    }

    #[inline]
    pub fn support_end(&self, dir: Direction) -> f64
    {
        let knots = self.knots(dir);
        knots[knots.len() - 1]
    }

    #[inline]
    pub fn extent(&self, dir: Direction) -> f64
    {
        self.support_end(dir) - self.support_start(dir)
    }

    /// Returns true if the support of this function covers `element`.
    pub fn covers(&self, element: &Element) -> bool
    {
        self.support_start(Direction::U) <= element.umin && element.umax <= self.support_end(Direction::U)
            && self.support_start(Direction::V) <= element.vmin && element.vmax <= self.support_end(Direction::V)
    }

    ///
    /// Weighted value and derivatives at `(u, v)`, ordered
    /// `[B, B_u, B_v, B_uu, B_uv, B_vv]`.
    ///
    pub fn evaluate(&self, u: f64, v: f64, domain: &Domain, nderiv: usize) -> [f64; 6]
    {
        let bu = bspline::evaluate_with_derivs(&self.knots_u, u, domain.umax, nderiv);
        let bv = bspline::evaluate_with_derivs(&self.knots_v, v, domain.vmax, nderiv);
        let w = self.weight;
        [w * bu[0] * bv[0], w * bu[1] * bv[0], w * bu[0] * bv[1], w * bu[2] * bv[0], w * bu[1] * bv[1], w * bu[0] * bv[2]]
    }

    ///
    /// Split this function by inserting `x` into its knots in direction
    /// `dir`. The children carry the parent's coefficient, so their weighted
    /// sum reproduces the parent exactly.
    ///
    pub fn split(&self, dir: Direction, x: f64) -> [BasisFunction; 2]
    {
        let ((knots1, alpha1), (knots2, alpha2)) = bspline::insert_knot(self.knots(dir), x);
        let child = |knots: Vec<f64>, alpha: f64| match dir
        {
            Direction::U => BasisFunction::new(knots, self.knots_v.clone(), self.weight * alpha, self.coef.clone()),
            Direction::V => BasisFunction::new(self.knots_u.clone(), knots, self.weight * alpha, self.coef.clone()),
        };
        [child(knots1, alpha1), child(knots2, alpha2)]
    }

    ///
    /// Merge a function with the same knots into this one. Weights add and the
    /// coefficient becomes the weighted mean, which keeps the sum
    /// `weight * coef` unchanged. Equal coefficients are kept bit-identical.
    ///
    pub fn absorb(&mut self, other: BasisFunction)
    {
        let total = self.weight + other.weight;
        for (c, oc) in self.coef.iter_mut().zip(other.coef)
        {
            if *c != oc
            {
                *c = (self.weight * *c + other.weight * oc) / total;
            }
        }
        self.weight = total;
    }
}

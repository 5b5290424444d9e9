use crate::basis::bspline;
use crate::surface::basis_function::BasisFunction;
use crate::surface::traits::{Direction, Domain};

///
/// A mesh line segment. A line in direction `U` has constant `u = value` and
/// runs from `v = start` to `v = stop`; a line in direction `V` has constant
/// `v`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct MeshLine
{
    pub dir: Direction,
    pub value: f64,
    pub start: f64,
    pub stop: f64,
    pub multiplicity: usize,
}

impl MeshLine
{
    pub fn new(dir: Direction, value: f64, start: f64, stop: f64, multiplicity: usize) -> Self
    {
        Self { dir, value, start, stop, multiplicity }
    }

    /// Returns true if this segment already contains `other`.
    pub fn covers(&self, other: &MeshLine) -> bool
    {
        self.dir == other.dir && self.value == other.value && self.start <= other.start && other.stop <= self.stop
            && self.multiplicity >= other.multiplicity
    }

    /// Collinear segments of equal multiplicity that overlap or touch.
    pub fn can_merge(&self, other: &MeshLine) -> bool
    {
        self.dir == other.dir && self.value == other.value && self.multiplicity == other.multiplicity
            && self.start <= other.stop && other.start <= self.stop
    }

    ///
    /// Returns true if this line traverses the support of `basis` and its
    /// multiplicity is not yet reflected in the basis function's knots.
    ///
    pub fn splits(&self, basis: &BasisFunction) -> bool
    {
        let knots = basis.knots(self.dir);
        let across = self.dir.other();
        knots[0] < self.value && self.value < knots[knots.len() - 1]
            && self.start <= basis.support_start(across) && basis.support_end(across) <= self.stop
            && bspline::multiplicity(knots, self.value) < self.multiplicity
    }
}

///
/// A rectangular face of the mesh together with the indices of the basis
/// functions whose support covers it.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Element
{
    pub umin: f64,
    pub umax: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub(crate) support: Vec<usize>,
}

impl Element
{
    pub fn new(umin: f64, umax: f64, vmin: f64, vmax: f64) -> Self
    {
        Self { umin, umax, vmin, vmax, support: Vec::new() }
    }

    /// Indices of the basis functions nonzero on this element.
    pub fn support(&self) -> &[usize]
    {
        &self.support
    }

    #[inline]
    pub fn start(&self, dir: Direction) -> f64
    {
        match dir
        {
            Direction::U => self.umin,
            Direction::V => self.vmin,
        }
    }

    #[inline]
    pub fn end(&self, dir: Direction) -> f64
    {
        match dir
        {
            Direction::U => self.umax,
            Direction::V => self.vmax,
        }
    }

    #[inline]
    pub fn extent(&self, dir: Direction) -> f64
    {
        self.end(dir) - self.start(dir)
    }

    #[inline]
    pub fn midpoint(&self, dir: Direction) -> f64
    {
        0.5 * (self.start(dir) + self.end(dir))
    }

    pub fn center(&self) -> (f64, f64)
    {
        (self.midpoint(Direction::U), self.midpoint(Direction::V))
    }

    ///
    /// Element membership is half open, `[umin, umax) x [vmin, vmax)`, except
    /// on the upper boundaries of `domain` where it is closed.
    ///
    pub fn contains(&self, u: f64, v: f64, domain: &Domain) -> bool
    {
        let in_u = self.umin <= u && (u < self.umax || (u == self.umax && u == domain.umax));
        let in_v = self.vmin <= v && (v < self.vmax || (v == self.vmax && v == domain.vmax));
        in_u && in_v
    }

    /// Returns true if `line` cuts through the interior of this element.
    pub fn is_cut_by(&self, line: &MeshLine) -> bool
    {
        let across = line.dir.other();
        self.start(line.dir) < line.value && line.value < self.end(line.dir)
            && line.start <= self.start(across) && self.end(across) <= line.stop
    }

    /// Split along `line`; the caller checks `is_cut_by` first.
    pub fn split(&self, line: &MeshLine) -> [Element; 2]
    {
        match line.dir
        {
            Direction::U => [Element::new(self.umin, line.value, self.vmin, self.vmax), Element::new(line.value, self.umax, self.vmin, self.vmax)],
            Direction::V => [Element::new(self.umin, self.umax, self.vmin, line.value), Element::new(self.umin, self.umax, line.value, self.vmax)],
        }
    }
}

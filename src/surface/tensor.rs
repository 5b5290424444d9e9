use crate::basis::bspline;
use crate::errors::{LRError, Result};
use crate::surface::traits::{Direction, Domain};

/// Knot vector of one parameter direction.
#[derive(Clone, Debug, PartialEq)]
pub struct SplineBasis
{
    pub ncoef: usize,
    pub order: usize,
    pub knots: Vec<f64>,
}

impl SplineBasis
{
    pub fn new(ncoef: usize, order: usize, knots: Vec<f64>) -> Result<Self>
    {
        if order < 2
        {
            return Err(LRError::invalid(format!("order must be at least 2, got {order}")));
        }
        if ncoef < order
        {
            return Err(LRError::invalid(format!("{ncoef} coefficients is too few for order {order}")));
        }
        if knots.len() != ncoef + order
        {
            return Err(LRError::invalid(format!("expected {} knots, got {}", ncoef + order, knots.len())));
        }
        if knots.iter().any(|t| !t.is_finite()) || knots.windows(2).any(|w| w[0] > w[1])
        {
            return Err(LRError::invalid("knots must be finite and non-decreasing"));
        }
        if knots[order - 1] >= knots[ncoef]
        {
            return Err(LRError::invalid("knot vector spans an empty parameter interval"));
        }
        if knots[0] != knots[order - 1] || knots[ncoef] != knots[ncoef + order - 1]
        {
            return Err(LRError::invalid(format!("knot vector must have {order}-fold end knots")));
        }
        let interior = &knots[order..ncoef];
        if interior.iter().any(|&t| bspline::multiplicity(&knots, t) > order)
        {
            return Err(LRError::invalid(format!("interior knot multiplicity exceeds order {order}")));
        }
        Ok(Self { ncoef, order, knots })
    }

    /// Uniform open knot vector over `[start, end]`.
    pub fn uniform(ncoef: usize, order: usize, start: f64, end: f64) -> Result<Self>
    {
        if order < 2 || ncoef < order
        {
            return Err(LRError::invalid(format!("invalid size: {ncoef} coefficients of order {order}")));
        }
        Self::new(ncoef, order, bspline::uniform_open_knots(ncoef, order, start, end))
    }

    pub fn start(&self) -> f64
    {
        self.knots[self.order - 1]
    }

    pub fn end(&self) -> f64
    {
        self.knots[self.ncoef]
    }

    /// Local knots of basis function `i`.
    pub fn local_knots(&self, i: usize) -> &[f64]
    {
        &self.knots[i..=i + self.order]
    }
}

///
/// Tensor-product B-spline surface. Coefficients are stored with the `u` index
/// running fastest, `dim` values per coefficient.
///
#[derive(Clone, Debug, PartialEq)]
pub struct SplineSurface
{
    dim: usize,
    basis_u: SplineBasis,
    basis_v: SplineBasis,
    coefs: Vec<f64>,
}

impl SplineSurface
{
    pub fn new(basis_u: SplineBasis, basis_v: SplineBasis, coefs: Vec<f64>, dim: usize) -> Result<Self>
    {
        if dim == 0
        {
            return Err(LRError::invalid("dimension must be positive"));
        }
        let expected = basis_u.ncoef * basis_v.ncoef * dim;
        if coefs.len() != expected
        {
            return Err(LRError::invalid(format!("expected {expected} coefficient values, got {}", coefs.len())));
        }
        Ok(Self { dim, basis_u, basis_v, coefs })
    }

    pub fn dim(&self) -> usize
    {
        self.dim
    }

    pub fn basis(&self, dir: Direction) -> &SplineBasis
    {
        match dir
        {
            Direction::U => &self.basis_u,
            Direction::V => &self.basis_v,
        }
    }

    pub fn coefs(&self) -> &[f64]
    {
        &self.coefs
    }

    pub fn domain(&self) -> Domain
    {
        Domain::new(self.basis_u.start(), self.basis_u.end(), self.basis_v.start(), self.basis_v.end())
    }

    /// Coefficient of basis function `(i, j)`.
    pub fn coef(&self, i: usize, j: usize) -> &[f64]
    {
        let start = (j * self.basis_u.ncoef + i) * self.dim;
        &self.coefs[start..start + self.dim]
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn check_knot_validation()
    {
        assert!(matches!(SplineBasis::new(3, 1, vec![0.0, 0.5, 1.0, 1.0]), Err(LRError::InvalidInput(_))));
        assert!(matches!(SplineBasis::new(3, 2, vec![0.0, 0.0, 1.0, 1.0]), Err(LRError::InvalidInput(_))));
        assert!(matches!(SplineBasis::new(2, 2, vec![0.0, 1.0, 0.5, 1.0]), Err(LRError::InvalidInput(_))));
        assert!(SplineBasis::new(3, 2, vec![0.0, 0.0, 0.5, 1.0, 1.0]).is_ok());
    }

    #[test]
    fn check_coefficient_layout()
    {
        let bu = SplineBasis::uniform(3, 2, 0.0, 1.0).unwrap();
        let bv = SplineBasis::uniform(2, 2, 0.0, 1.0).unwrap();
        let coefs: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let surface = SplineSurface::new(bu, bv, coefs, 1).unwrap();
        assert_eq!(surface.coef(2, 0), &[2.0]);
        assert_eq!(surface.coef(0, 1), &[3.0]);
        assert!(matches!(SplineSurface::new(surface.basis(Direction::U).clone(), surface.basis(Direction::V).clone(), vec![0.0; 5], 1),
            Err(LRError::InvalidInput(_))));
    }
}
